/// Parser for the LCOV `.info` format.
///
/// Only line records matter for annotations and snapshots:
///   SF:<path to source file>
///   DA:<line number>,<execution count>[,<checksum>]
///   end_of_record
///
/// Function, branch and summary records (FN, FNDA, BRDA, LF, LH, ...) are
/// skipped; totals are derived from the DA lines.
use crate::error::{CovtrackError, Result};
use crate::model::{CoverageData, FileCoverage, LineCoverage};
use crate::parsers::Parser;

pub struct LcovParser;

impl Parser for LcovParser {
    fn parse(&self, input: &[u8]) -> Result<CoverageData> {
        let text = std::str::from_utf8(input)
            .map_err(|e| CovtrackError::Parse(format!("Invalid UTF-8 in LCOV data: {e}")))?;
        Ok(parse_lcov(text))
    }
}

fn parse_lcov(text: &str) -> CoverageData {
    let mut data = CoverageData::new();
    let mut current: Option<FileCoverage> = None;

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if line == "end_of_record" {
            data.files.extend(current.take());
            continue;
        }

        let Some((tag, value)) = line.split_once(':') else {
            continue;
        };

        match tag {
            "SF" => {
                data.files.extend(current.take());
                current = Some(FileCoverage::new(value.to_string()));
            }
            "DA" => {
                if let (Some(file), Some(line)) = (current.as_mut(), parse_da(value)) {
                    file.lines.push(line);
                }
            }
            _ => {}
        }
    }

    // Tolerate a missing final end_of_record.
    data.files.extend(current);
    data
}

/// Parse the value of a `DA:` record. Negative counts mark lines some
/// instrumenters consider non-instrumentable; those are skipped.
fn parse_da(value: &str) -> Option<LineCoverage> {
    let mut parts = value.splitn(3, ',');
    let line_number = parts.next()?.trim().parse::<u32>().ok()?;
    let count = parts.next()?.trim().parse::<i64>().ok()?;
    let hit_count = u64::try_from(count).ok()?;
    Some(LineCoverage {
        line_number,
        hit_count,
    })
}
