//! Uniform in-memory representation of coverage data, independent of any
//! specific format. Parsers produce a `CoverageData` which then feeds the
//! annotation engine and the snapshot totals.

use std::collections::BTreeMap;

use crate::ranges::LineRange;

/// Compute a coverage rate, returning 0.0 when the total is zero.
#[must_use]
pub fn rate(covered: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        covered as f64 / total as f64
    }
}

/// A single line that was instrumentable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineCoverage {
    pub line_number: u32,
    pub hit_count: u64,
}

/// Coverage data for a single source file.
#[derive(Debug, Clone, Default)]
pub struct FileCoverage {
    pub path: String,
    pub lines: Vec<LineCoverage>,
}

impl FileCoverage {
    pub fn new(path: String) -> Self {
        Self {
            path,
            ..Default::default()
        }
    }

    /// Builds a file record from `(line, hits)` pairs.
    pub fn from_hits(path: impl Into<String>, hits: &[(u32, u64)]) -> Self {
        let mut file = Self::new(path.into());
        file.lines = hits
            .iter()
            .map(|&(line_number, hit_count)| LineCoverage {
                line_number,
                hit_count,
            })
            .collect();
        file.lines.sort_by_key(|l| l.line_number);
        file
    }

    /// Sorted, deduplicated line numbers the coverage tool instrumented.
    #[must_use]
    pub fn executable_lines(&self) -> Vec<u32> {
        let mut lines: Vec<u32> = self.lines.iter().map(|l| l.line_number).collect();
        lines.sort_unstable();
        lines.dedup();
        lines
    }

    /// Sorted executable lines with zero hits.
    #[must_use]
    pub fn missing_lines(&self) -> Vec<u32> {
        let mut lines: Vec<u32> = self
            .lines
            .iter()
            .filter(|l| l.hit_count == 0)
            .map(|l| l.line_number)
            .collect();
        lines.sort_unstable();
        lines.dedup();
        lines
    }

    #[must_use]
    pub fn covered_line_count(&self) -> usize {
        self.lines.iter().filter(|l| l.hit_count > 0).count()
    }
}

/// The complete result of parsing a single coverage file.
#[derive(Debug, Clone, Default)]
pub struct CoverageData {
    pub files: Vec<FileCoverage>,
}

impl CoverageData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge records that describe the same path (LCOV emits one record per
    /// test name), summing hit counts per line. File order follows first
    /// appearance; lines come out sorted.
    #[must_use]
    pub fn merged(self) -> Self {
        let mut order: Vec<String> = Vec::new();
        let mut by_path: BTreeMap<String, BTreeMap<u32, u64>> = BTreeMap::new();

        for file in self.files {
            let entry = by_path.entry(file.path.clone()).or_insert_with(|| {
                order.push(file.path.clone());
                BTreeMap::new()
            });
            for line in file.lines {
                *entry.entry(line.line_number).or_insert(0) += line.hit_count;
            }
        }

        let files = order
            .into_iter()
            .map(|path| {
                let lines = by_path
                    .remove(&path)
                    .unwrap_or_default()
                    .into_iter()
                    .map(|(line_number, hit_count)| LineCoverage {
                        line_number,
                        hit_count,
                    })
                    .collect();
                FileCoverage { path, lines }
            })
            .collect();

        Self { files }
    }

    #[must_use]
    pub fn totals(&self) -> CoverageTotals {
        let total_lines = self.files.iter().map(|f| f.lines.len() as u64).sum();
        let covered_lines = self
            .files
            .iter()
            .map(|f| f.covered_line_count() as u64)
            .sum();
        CoverageTotals {
            total_files: self.files.len() as u64,
            total_lines,
            covered_lines,
        }
    }
}

/// Line totals across a whole coverage file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoverageTotals {
    pub total_files: u64,
    pub total_lines: u64,
    pub covered_lines: u64,
}

impl CoverageTotals {
    #[must_use]
    pub fn line_rate(&self) -> f64 {
        rate(self.covered_lines, self.total_lines)
    }

    /// Line coverage as a percentage with two decimals, e.g. `"83.33"`.
    #[must_use]
    pub fn percentage(&self) -> String {
        format!("{:.2}", self.line_rate() * 100.0)
    }
}

/// A single annotation to attach to a pull request.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    /// Source file path relative to the repo root.
    pub path: String,
    /// Start line of the annotation range.
    pub start_line: u32,
    /// End line of the annotation range.
    pub end_line: u32,
    /// Annotation message.
    pub message: String,
}

impl Annotation {
    /// The annotated lines as a range.
    #[must_use]
    pub fn range(&self) -> LineRange {
        LineRange::new(self.start_line, self.end_line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_line_sets() {
        let file = FileCoverage::from_hits("a.rs", &[(4, 0), (1, 2), (2, 0), (3, 1)]);
        assert_eq!(file.executable_lines(), vec![1, 2, 3, 4]);
        assert_eq!(file.missing_lines(), vec![2, 4]);
        assert_eq!(file.covered_line_count(), 2);
    }

    #[test]
    fn test_merged_sums_duplicate_paths() {
        let data = CoverageData {
            files: vec![
                FileCoverage::from_hits("b.rs", &[(1, 0), (2, 0)]),
                FileCoverage::from_hits("a.rs", &[(1, 1)]),
                FileCoverage::from_hits("b.rs", &[(2, 3), (3, 0)]),
            ],
        }
        .merged();

        assert_eq!(data.files.len(), 2);
        assert_eq!(data.files[0].path, "b.rs");
        assert_eq!(data.files[0].missing_lines(), vec![1, 3]);
        assert_eq!(data.files[0].covered_line_count(), 1);
        assert_eq!(data.files[1].path, "a.rs");
    }

    #[test]
    fn test_totals_percentage() {
        let data = CoverageData {
            files: vec![
                FileCoverage::from_hits("a.rs", &[(1, 1), (2, 0), (3, 4)]),
                FileCoverage::from_hits("b.rs", &[(1, 0), (2, 0), (3, 9)]),
            ],
        };
        let totals = data.totals();
        assert_eq!(totals.total_files, 2);
        assert_eq!(totals.total_lines, 6);
        assert_eq!(totals.covered_lines, 3);
        assert_eq!(totals.percentage(), "50.00");
    }

    #[test]
    fn test_totals_empty_is_zero_percent() {
        assert_eq!(CoverageData::new().totals().percentage(), "0.00");
    }
}
