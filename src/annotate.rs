//! Turns per-file coverage and the lines a pull request added into the
//! minimal set of "these lines are not covered" annotations.

use std::collections::HashMap;

use crate::model::{Annotation, FileCoverage};
use crate::ranges::{coalesce, intersect, LineRange};

/// Message for a touched file with no covered lines at all. Always reported
/// as a single annotation on line 1.
pub const NO_COVERAGE_MESSAGE: &str = "This file has no test coverage";

/// Build annotations for every file present in both `files` and `added`.
///
/// Annotations are produced only for lines that were added, are executable
/// and have zero hits. A file whose executable lines are all uncovered gets a
/// single annotation pinned to line 1 instead.
///
/// Output follows the order of `files`; within a file, ranges ascend.
#[must_use]
pub fn build_annotations(
    files: &[FileCoverage],
    added: &HashMap<String, Vec<u32>>,
) -> Vec<Annotation> {
    files
        .iter()
        .filter_map(|file| added.get(&file.path).map(|lines| (file, lines)))
        .flat_map(|(file, lines)| annotate_file(file, lines))
        .collect()
}

fn annotate_file(file: &FileCoverage, added_lines: &[u32]) -> Vec<Annotation> {
    let missing = file.missing_lines();

    if !missing.is_empty() && file.covered_line_count() == 0 {
        return vec![Annotation {
            path: file.path.clone(),
            start_line: 1,
            end_line: 1,
            message: NO_COVERAGE_MESSAGE.to_string(),
        }];
    }

    let executable = file.executable_lines();
    let mut touched: Vec<u32> = added_lines
        .iter()
        .copied()
        .filter(|l| executable.binary_search(l).is_ok())
        .collect();
    if touched.is_empty() {
        return Vec::new();
    }
    touched.sort_unstable();
    touched.dedup();

    let missing_ranges = coalesce(&missing, Some(&executable));
    let touched_ranges = coalesce(&touched, Some(&executable));

    intersect(&missing_ranges, &touched_ranges)
        .into_iter()
        .map(|range| Annotation {
            path: file.path.clone(),
            start_line: range.start,
            end_line: range.end,
            message: uncovered_message(range),
        })
        .collect()
}

fn uncovered_message(range: LineRange) -> String {
    if range.is_single() {
        format!("Line {} is not covered by tests", range.start)
    } else {
        format!("Lines {}-{} are not covered by tests", range.start, range.end)
    }
}
