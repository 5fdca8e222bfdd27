//! Orchestration of one diff-coverage run.
//!
//! ```text
//! Idle → ResolvingRefs → CollectingChanges → Filtering → LoadingCoverage
//!      → Aggregating → Reporting → Done
//! ```
//!
//! Any stage may end in `Failed`. A failed run reports the error through the
//! configured reporters' `error` channel and never renders a partial result.

use std::fmt;

use thiserror::Error;

use crate::aggregate::{aggregate, SkippedFile};
use crate::config::Settings;
use crate::error::CovdiffError;
use crate::filter::FileFilter;
use crate::git::{self, ChangeSource, ExplicitChanges, GitChanges};
use crate::model::CoverageResult;
use crate::parsers::lcov;
use crate::reporters::{QualityGate, Reporter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    ResolvingRefs,
    CollectingChanges,
    Filtering,
    LoadingCoverage,
    Aggregating,
    Reporting,
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Idle => "idle",
            Stage::ResolvingRefs => "resolving refs",
            Stage::CollectingChanges => "collecting changes",
            Stage::Filtering => "filtering",
            Stage::LoadingCoverage => "loading coverage",
            Stage::Aggregating => "aggregating",
            Stage::Reporting => "reporting",
            Stage::Done => "done",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A fatal error, tagged with the stage it happened in.
#[derive(Debug, Error)]
#[error("diff coverage failed while {stage}: {source}")]
pub struct StageError {
    pub stage: Stage,
    #[source]
    pub source: CovdiffError,
}

/// What a completed run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub result: CoverageResult,
    pub skipped: Vec<SkippedFile>,
    pub gate_passed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The root is not a git working tree; nothing was done.
    /// Deliberately a successful no-op: goes `Idle` to `Done`, never `Failed`.
    NotARepository,
    Reported(Report),
}

pub struct Orchestrator<'a> {
    settings: &'a Settings,
    reporters: &'a [Box<dyn Reporter>],
    stage: Stage,
}

impl<'a> Orchestrator<'a> {
    pub fn new(settings: &'a Settings, reporters: &'a [Box<dyn Reporter>]) -> Self {
        Self {
            settings,
            reporters,
            stage: Stage::Idle,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    fn enter(&mut self, stage: Stage) {
        log::debug!("Stage: {} -> {}", self.stage, stage);
        self.stage = stage;
    }

    /// Run every stage to completion.
    pub fn run(&mut self) -> Result<Outcome, StageError> {
        match self.pipeline() {
            Ok(outcome) => {
                self.enter(Stage::Done);
                Ok(outcome)
            }
            Err(source) => {
                let stage = self.stage;
                self.enter(Stage::Failed);
                let err = StageError { stage, source };
                dispatch_error(self.reporters, &err.to_string(), &[]);
                Err(err)
            }
        }
    }

    fn pipeline(&mut self) -> Result<Outcome, CovdiffError> {
        let settings = self.settings;
        let root = settings.root.as_path();

        if !git::is_repository(root) {
            log::info!(
                "{} is not a git repository, skipping diff coverage",
                root.display()
            );
            return Ok(Outcome::NotARepository);
        }

        self.enter(Stage::ResolvingRefs);
        let head = git::resolve_ref(root, &settings.head)?;
        let base = git::resolve_ref(root, &settings.base)?;
        log::debug!("Head SHA: {head}");
        log::debug!("Base SHA: {base}");

        self.enter(Stage::CollectingChanges);
        let files = match &settings.changed_files {
            Some(list) => ExplicitChanges::from_list(root, list).changed_files()?,
            None => GitChanges {
                root: root.to_path_buf(),
                head: head.clone(),
                base: base.clone(),
            }
            .changed_files()?,
        };
        log::debug!(
            "Changed files: {}",
            files
                .iter()
                .map(|f| f.path.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        self.enter(Stage::Filtering);
        let filter = FileFilter::new(&settings.include, &settings.exclude)?;
        let files = filter.apply(files);

        self.enter(Stage::LoadingCoverage);
        let report = lcov::load(&settings.path(&settings.coverage_file), Some(root))?;

        self.enter(Stage::Aggregating);
        let aggregation = aggregate(&files, &report, &head, &base);
        log::info!(
            "Diff coverage over {} files: lines {}/{}, functions {}/{}, branches {}/{}",
            aggregation.result.files.len(),
            aggregation.result.lines.covered,
            aggregation.result.lines.total,
            aggregation.result.functions.covered,
            aggregation.result.functions.total,
            aggregation.result.branches.covered,
            aggregation.result.branches.total,
        );

        self.enter(Stage::Reporting);
        if !aggregation.skipped.is_empty() {
            let details: Vec<String> = aggregation.skipped.iter().map(ToString::to_string).collect();
            dispatch_error(
                self.reporters,
                &format!(
                    "{} changed file(s) were skipped because their diff or coverage data is malformed",
                    details.len()
                ),
                &details,
            );
        }
        dispatch(self.reporters, &aggregation.result);

        let gate_passed = QualityGate::new(settings.quality_gate).passes(&aggregation.result);
        Ok(Outcome::Reported(Report {
            result: aggregation.result,
            skipped: aggregation.skipped,
            gate_passed,
        }))
    }
}

/// Hand `result` to every reporter. A failing reporter is logged and does
/// not stop the others.
pub fn dispatch(reporters: &[Box<dyn Reporter>], result: &CoverageResult) {
    for reporter in reporters {
        if let Err(e) = reporter.report(result) {
            log::error!("Reporter '{}' failed: {e:#}", reporter.name());
        }
    }
}

/// Surface an error through every reporter, or the log when there are none.
pub fn dispatch_error(reporters: &[Box<dyn Reporter>], message: &str, details: &[String]) {
    if reporters.is_empty() {
        log::error!("{message}");
        for detail in details {
            log::error!("  {detail}");
        }
        return;
    }
    for reporter in reporters {
        reporter.error(message, details);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    use crate::config::{CiEnvironment, ConfigFile, Overrides};

    #[derive(Default)]
    struct Calls {
        reports: usize,
        errors: Vec<String>,
    }

    struct Recording {
        calls: Rc<RefCell<Calls>>,
        fail: bool,
    }

    impl Reporter for Recording {
        fn name(&self) -> &'static str {
            "recording"
        }

        fn report(&self, _result: &CoverageResult) -> anyhow::Result<()> {
            self.calls.borrow_mut().reports += 1;
            if self.fail {
                anyhow::bail!("boom");
            }
            Ok(())
        }

        fn error(&self, message: &str, _details: &[String]) {
            self.calls.borrow_mut().errors.push(message.to_string());
        }
    }

    fn settings(root: &std::path::Path) -> Settings {
        Settings::resolve(
            root,
            ConfigFile::default(),
            Overrides::default(),
            CiEnvironment::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_not_a_repository() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(dir.path());
        let calls = Rc::new(RefCell::new(Calls::default()));
        let reporters: Vec<Box<dyn Reporter>> = vec![Box::new(Recording {
            calls: calls.clone(),
            fail: false,
        })];

        let mut orchestrator = Orchestrator::new(&settings, &reporters);
        assert_eq!(orchestrator.run().unwrap(), Outcome::NotARepository);
        assert_eq!(orchestrator.stage(), Stage::Done);
        assert_eq!(calls.borrow().reports, 0);
        assert!(calls.borrow().errors.is_empty());
    }

    #[test]
    fn test_dispatch_continues_after_failure() {
        let calls = Rc::new(RefCell::new(Calls::default()));
        let reporters: Vec<Box<dyn Reporter>> = vec![
            Box::new(Recording {
                calls: calls.clone(),
                fail: true,
            }),
            Box::new(Recording {
                calls: calls.clone(),
                fail: false,
            }),
        ];
        dispatch(&reporters, &crate::reporters::tests::sample_result());
        assert_eq!(calls.borrow().reports, 2);
    }

    #[test]
    fn test_dispatch_error_reaches_every_reporter() {
        let calls = Rc::new(RefCell::new(Calls::default()));
        let reporters: Vec<Box<dyn Reporter>> = vec![
            Box::new(Recording {
                calls: calls.clone(),
                fail: false,
            }),
            Box::new(Recording {
                calls: calls.clone(),
                fail: false,
            }),
        ];
        dispatch_error(&reporters, "coverage missing", &[]);
        assert_eq!(calls.borrow().errors, vec!["coverage missing", "coverage missing"]);
        dispatch_error(&[], "no reporters", &[]);
    }

    #[test]
    fn test_stage_error_message() {
        let err = StageError {
            stage: Stage::LoadingCoverage,
            source: CovdiffError::CoverageReportMissing("coverage/lcov.info".into()),
        };
        assert_eq!(
            err.to_string(),
            "diff coverage failed while loading coverage: Coverage report not found: coverage/lcov.info"
        );
    }
}
