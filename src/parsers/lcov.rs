//! Parser for the LCOV tracefile format.
//!
//! Reference: https://ltp.sourceforge.net/coverage/lcov/geninfo.1.php
//!
//! Key records:
//!   TN:<test name>
//!   SF:<path to source file>
//!   FN:<line>,[<end line>,]<function name>
//!   FNDA:<execution count>,<function name>
//!   FNF:<number of functions found>
//!   FNH:<number of functions hit>
//!   DA:<line number>,<execution count>[,<checksum>]
//!   BRDA:<line>,<block>,<branch>,<taken>   ("-" means 0)
//!   BRF:<branches found>
//!   BRH:<branches hit>
//!   LF:<lines found>
//!   LH:<lines hit>
//!   end_of_record

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::Parser;
use crate::error::{CovdiffError, Result};
use crate::model::*;

/// LCOV format parser. Absolute `SF:` paths inside `root` are made relative
/// to it before normalization.
#[derive(Debug, Default)]
pub struct LcovParser {
    pub root: Option<PathBuf>,
}

impl LcovParser {
    pub fn new(root: Option<PathBuf>) -> Self {
        Self { root }
    }

    fn source_path(&self, value: &str) -> String {
        if let Some(root) = &self.root {
            if let Ok(relative) = Path::new(value).strip_prefix(root) {
                return normalize_path(&relative.to_string_lossy());
            }
        }
        normalize_path(value)
    }
}

impl Parser for LcovParser {
    fn parse(&self, source: &Path, input: &[u8]) -> Result<CoverageReport> {
        let mut report = CoverageReport::new();
        let mut current: Option<Record> = None;

        for (idx, raw) in input.split(|b| *b == b'\n').enumerate() {
            let line_no = idx + 1;
            let err = |message: String| CovdiffError::CoverageReportParse {
                path: source.to_path_buf(),
                line: line_no,
                message,
            };

            let line = std::str::from_utf8(raw)
                .map_err(|_| err("invalid UTF-8".to_string()))?
                .trim();
            if line.is_empty() {
                continue;
            }

            if line == "end_of_record" {
                if let Some(record) = current.take() {
                    emit(&mut report, record);
                }
                continue;
            }

            let Some((tag, value)) = line.split_once(':') else {
                return Err(err(format!("unrecognized line '{line}'")));
            };

            if tag == "SF" {
                if let Some(record) = current.take() {
                    emit(&mut report, record);
                }
                current = Some(Record::new(self.source_path(value)));
                continue;
            }
            if tag == "TN" {
                continue;
            }

            let Some(record) = current.as_mut() else {
                if is_data_tag(tag) {
                    return Err(err(format!("{tag} record outside of a source file section")));
                }
                continue;
            };
            record.apply(tag, value).map_err(err)?;
        }

        // Handle a file that ends without end_of_record
        if let Some(record) = current.take() {
            emit(&mut report, record);
        }

        Ok(report)
    }
}

/// Read and parse an LCOV tracefile from disk.
pub fn load(path: &Path, root: Option<&Path>) -> Result<CoverageReport> {
    let content = std::fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => CovdiffError::CoverageReportMissing(path.to_path_buf()),
        _ => CovdiffError::Io(e),
    })?;
    let report = LcovParser::new(root.map(Path::to_path_buf)).parse(path, &content)?;
    log::debug!(
        "Loaded coverage for {} files from {}",
        report.len(),
        path.display()
    );
    Ok(report)
}

fn is_data_tag(tag: &str) -> bool {
    matches!(
        tag,
        "FN" | "FNDA" | "FNF" | "FNH" | "DA" | "LF" | "LH" | "BRDA" | "BRF" | "BRH"
    )
}

fn emit(report: &mut CoverageReport, record: Record) {
    let file = record.finish();
    let path = file.path.clone();
    if !report.insert(file) {
        log::warn!("Duplicate coverage record for {path}; keeping the first one");
    }
}

/// In-progress state for one `SF:` .. `end_of_record` section.
struct Record {
    file: FileCoverage,
    line_index: HashMap<u32, usize>,
    function_index: HashMap<String, usize>,
    lines_found: Option<u64>,
    lines_hit: Option<u64>,
    functions_found: Option<u64>,
    functions_hit: Option<u64>,
    branches_found: Option<u64>,
    branches_hit: Option<u64>,
}

impl Record {
    fn new(path: String) -> Self {
        Self {
            file: FileCoverage::new(path),
            line_index: HashMap::new(),
            function_index: HashMap::new(),
            lines_found: None,
            lines_hit: None,
            functions_found: None,
            functions_hit: None,
            branches_found: None,
            branches_hit: None,
        }
    }

    fn apply(&mut self, tag: &str, value: &str) -> std::result::Result<(), String> {
        match tag {
            "FN" => {
                // FN:<line>,<name> or FN:<line>,<end line>,<name>
                let (line_str, rest) = value
                    .split_once(',')
                    .ok_or_else(|| format!("malformed FN record '{value}'"))?;
                let line = parse_number::<u32>(line_str, "FN line")?;
                let name = match rest.split_once(',') {
                    Some((end, name)) if end.parse::<u32>().is_ok() => name,
                    _ => rest,
                };
                if !self.function_index.contains_key(name) {
                    self.function_index
                        .insert(name.to_string(), self.file.functions.details.len());
                    self.file.functions.details.push(FunctionRecord {
                        line,
                        hit: 0,
                        name: name.to_string(),
                    });
                }
            }
            "FNDA" => {
                let (count_str, name) = value
                    .split_once(',')
                    .ok_or_else(|| format!("malformed FNDA record '{value}'"))?;
                let hit = parse_number::<u64>(count_str, "FNDA count")?;
                match self.function_index.get(name) {
                    Some(&idx) => self.file.functions.details[idx].hit += hit,
                    None => log::debug!(
                        "{}: FNDA for undeclared function '{name}' ignored",
                        self.file.path
                    ),
                }
            }
            "DA" => {
                let mut parts = value.splitn(3, ',');
                let line = parse_number::<u32>(parts.next().unwrap_or(""), "DA line")?;
                let count = parse_number::<i64>(parts.next().unwrap_or(""), "DA count")?;
                // Negative counts mark non-instrumentable lines.
                if count >= 0 {
                    let hit = count as u64;
                    match self.line_index.get(&line) {
                        Some(&idx) => self.file.lines.details[idx].hit += hit,
                        None => {
                            self.line_index.insert(line, self.file.lines.details.len());
                            self.file.lines.details.push(LineRecord { line, hit });
                        }
                    }
                }
            }
            "BRDA" => {
                let parts: Vec<&str> = value.splitn(4, ',').collect();
                if parts.len() != 4 {
                    return Err(format!("malformed BRDA record '{value}'"));
                }
                let taken = if parts[3] == "-" {
                    0
                } else {
                    parse_number::<u64>(parts[3], "BRDA taken")?
                };
                self.file.branches.details.push(BranchRecord {
                    line: parse_number(parts[0], "BRDA line")?,
                    block: parse_number(parts[1], "BRDA block")?,
                    branch: parse_number(parts[2], "BRDA branch")?,
                    taken,
                });
            }
            "LF" => self.lines_found = Some(parse_number(value, "LF")?),
            "LH" => self.lines_hit = Some(parse_number(value, "LH")?),
            "FNF" => self.functions_found = Some(parse_number(value, "FNF")?),
            "FNH" => self.functions_hit = Some(parse_number(value, "FNH")?),
            "BRF" => self.branches_found = Some(parse_number(value, "BRF")?),
            "BRH" => self.branches_hit = Some(parse_number(value, "BRH")?),
            // VER, FNL, FNA and other extensions carry nothing we use.
            _ => {}
        }
        Ok(())
    }

    fn finish(mut self) -> FileCoverage {
        let file = &mut self.file;
        file.lines.found = self
            .lines_found
            .unwrap_or(file.lines.details.len() as u64);
        file.lines.hit = self
            .lines_hit
            .unwrap_or(file.lines.details.iter().filter(|l| l.hit > 0).count() as u64);
        file.functions.found = self
            .functions_found
            .unwrap_or(file.functions.details.len() as u64);
        file.functions.hit = self
            .functions_hit
            .unwrap_or(file.functions.details.iter().filter(|f| f.hit > 0).count() as u64);
        file.branches.found = self
            .branches_found
            .unwrap_or(file.branches.details.len() as u64);
        file.branches.hit = self
            .branches_hit
            .unwrap_or(file.branches.details.iter().filter(|b| b.taken > 0).count() as u64);
        self.file
    }
}

fn parse_number<T: std::str::FromStr>(s: &str, what: &str) -> std::result::Result<T, String> {
    s.trim()
        .parse::<T>()
        .map_err(|_| format!("invalid {what} '{s}'"))
}
