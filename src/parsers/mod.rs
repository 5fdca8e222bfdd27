pub mod lcov;

use std::path::Path;

use crate::error::Result;
use crate::model::CoverageReport;

/// Every coverage trace parser implements this trait.
pub trait Parser {
    /// Parse the input bytes into our coverage model. `source` names the
    /// input in error messages.
    fn parse(&self, source: &Path, input: &[u8]) -> Result<CoverageReport>;
}
