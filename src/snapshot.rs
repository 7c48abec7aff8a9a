//! Recorded coverage summary for one commit.
//!
//! Snapshots are stored one JSON object per line in the commit's note,
//! newest first. Only the first line is authoritative.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CovtrackError, Result};
use crate::model::CoverageTotals;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// RFC 3339 time the snapshot was recorded.
    pub timestamp: String,
    /// Line coverage as a decimal string, e.g. `"84.21"`.
    pub coverage_percentage: String,
    pub total_lines: u64,
    pub covered_lines: u64,
    pub commit: String,
}

impl Snapshot {
    pub fn new(commit: impl Into<String>, totals: &CoverageTotals, at: DateTime<Utc>) -> Self {
        Self {
            timestamp: at.to_rfc3339_opts(SecondsFormat::Secs, true),
            coverage_percentage: totals.percentage(),
            total_lines: totals.total_lines,
            covered_lines: totals.covered_lines,
            commit: commit.into(),
        }
    }

    /// The percentage as a number.
    pub fn percentage(&self) -> Result<f64> {
        parse_percentage(&self.coverage_percentage)
    }

    /// Serialize to a single JSON line.
    pub fn to_line(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|source| CovtrackError::Snapshot {
            commit: self.commit.clone(),
            source,
        })
    }

    /// Parse the authoritative (first non-blank) line of a note attached to
    /// `commit`.
    pub fn from_note(commit: &str, note: &str) -> Result<Self> {
        let line = note
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .ok_or_else(|| CovtrackError::Parse(format!("empty snapshot note at {commit}")))?;

        let snapshot: Snapshot =
            serde_json::from_str(line).map_err(|source| CovtrackError::Snapshot {
                commit: commit.to_string(),
                source,
            })?;
        snapshot.percentage()?;
        Ok(snapshot)
    }
}

fn parse_percentage(value: &str) -> Result<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|p| p.is_finite())
        .ok_or_else(|| CovtrackError::Parse(format!("invalid coverage percentage '{value}'")))
}
