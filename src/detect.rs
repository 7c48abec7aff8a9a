//! Coverage format detection.
//!
//! The file name is consulted first, then the leading bytes of the report.
//! An explicit `--format` always wins and is handled by the caller.
use std::path::Path;

use crate::error::CovtrackError;

/// How many bytes of a report are inspected when sniffing its format.
const SNIFF_LEN: usize = 4096;

/// Supported coverage formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Cobertura,
    Lcov,
}

impl Format {
    const ALL: [Format; 2] = [Format::Cobertura, Format::Lcov];

    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Cobertura => "cobertura",
            Format::Lcov => "lcov",
        }
    }
}

impl std::str::FromStr for Format {
    type Err = CovtrackError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Format::ALL
            .into_iter()
            .find(|f| f.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                CovtrackError::Parse(format!(
                    "Unknown coverage format '{s}' (expected cobertura or lcov)"
                ))
            })
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Guess the format of a coverage report from its path and content.
pub fn detect_format(path: &Path, content: &[u8]) -> Option<Format> {
    from_file_name(path).or_else(|| sniff(content))
}

fn from_file_name(path: &Path) -> Option<Format> {
    let name = path.file_name()?.to_str()?.to_ascii_lowercase();
    if name.ends_with(".info") || name.ends_with(".lcov") {
        return Some(Format::Lcov);
    }
    if name == "cobertura.xml" || name.ends_with(".cobertura.xml") {
        return Some(Format::Cobertura);
    }
    None
}

fn sniff(content: &[u8]) -> Option<Format> {
    let head = String::from_utf8_lossy(&content[..content.len().min(SNIFF_LEN)]);
    let trimmed = head.trim_start_matches('\u{feff}').trim_start();

    if trimmed.starts_with('<') {
        return head.contains("<coverage").then_some(Format::Cobertura);
    }

    // Tags must open a line; a source file mentioning "SF:" is not a report.
    let mut source = false;
    let mut records = false;
    for line in head.lines().map(str::trim_start) {
        source |= line.starts_with("SF:");
        records |= ["DA:", "FN:", "BRDA:"].iter().any(|tag| line.starts_with(tag));
    }
    (source && records).then_some(Format::Lcov)
}
