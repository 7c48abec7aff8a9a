use std::path::Path;

use crate::detect::{detect_format, Format};
use crate::error::{CovtrackError, Result};
use crate::model::CoverageData;
use crate::parsers::cobertura::CoberturaParser;
use crate::parsers::lcov::LcovParser;
use crate::parsers::Parser;

/// Read a coverage file, auto-detect its format (or use the override) and
/// parse it. Records for the same path are merged.
pub fn load_coverage(file_path: &Path, format_override: Option<&str>) -> Result<(CoverageData, Format)> {
    let content = std::fs::read(file_path)?;

    let format = match format_override {
        Some(fmt_str) => fmt_str.parse::<Format>()?,
        None => detect_format(file_path, &content).ok_or(CovtrackError::UnknownFormat)?,
    };

    let data = parse_with_format(format, &content)?.merged();
    tracing::debug!(
        path = %file_path.display(),
        %format,
        files = data.files.len(),
        "loaded coverage"
    );
    Ok((data, format))
}

fn parse_with_format(format: Format, content: &[u8]) -> Result<CoverageData> {
    match format {
        Format::Cobertura => CoberturaParser.parse(content),
        Format::Lcov => LcovParser.parse(content),
    }
}
