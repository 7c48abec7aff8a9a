//! Line-range arithmetic: coalescing sorted line numbers into ranges and
//! intersecting two range lists.
//!
//! A range list is always sorted ascending, pairwise disjoint and
//! non-adjacent. Both functions build fresh lists and never mutate their
//! inputs.

use std::fmt;

/// Maximum number of consecutive non-executable lines that can be bridged
/// when coalescing. Gaps of up to this many lines (where none of the gap
/// lines are executable) are merged into a single range.
pub const MAX_BRIDGE_GAP: u32 = 5;

/// Inclusive range of 1-based line numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct LineRange {
    pub start: u32,
    pub end: u32,
}

impl LineRange {
    #[must_use]
    pub fn new(start: u32, end: u32) -> Self {
        debug_assert!(start <= end, "LineRange start {start} > end {end}");
        Self { start, end }
    }

    #[must_use]
    pub fn is_single(&self) -> bool {
        self.start == self.end
    }

    pub fn lines(&self) -> impl Iterator<Item = u32> {
        self.start..=self.end
    }
}

impl fmt::Display for LineRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_single() {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// Coalesce sorted line numbers into ranges.
///
/// Without `executable`, only adjacent numbers merge. With `executable`
/// (sorted, deduplicated), a gap between two input lines is bridged when it
/// is at most [`MAX_BRIDGE_GAP`] lines wide AND no line inside it is
/// executable.
///
/// `lines` must be sorted and deduplicated.
#[must_use]
pub fn coalesce(lines: &[u32], executable: Option<&[u32]>) -> Vec<LineRange> {
    let Some((&first, rest)) = lines.split_first() else {
        return Vec::new();
    };

    debug_assert!(
        lines.windows(2).all(|w| w[0] < w[1]),
        "coalesce requires sorted, deduplicated input"
    );

    let mut ranges = Vec::new();
    let mut start = first;
    let mut end = first;

    for &line in rest {
        if line == end + 1 || can_bridge(end, line, executable) {
            end = line;
        } else {
            ranges.push(LineRange::new(start, end));
            start = line;
            end = line;
        }
    }

    ranges.push(LineRange::new(start, end));
    ranges
}

fn can_bridge(end: u32, next: u32, executable: Option<&[u32]>) -> bool {
    let Some(executable) = executable else {
        return false;
    };
    let gap = next - end - 1;
    gap <= MAX_BRIDGE_GAP && (end + 1..next).all(|l| executable.binary_search(&l).is_err())
}

/// Intersect two sorted, disjoint range lists with a two-pointer sweep.
#[must_use]
pub fn intersect(a: &[LineRange], b: &[LineRange]) -> Vec<LineRange> {
    let mut result = Vec::new();
    let (mut i, mut j) = (0, 0);

    while i < a.len() && j < b.len() {
        let (x, y) = (a[i], b[j]);
        let start = x.start.max(y.start);
        let end = x.end.min(y.end);
        if start <= end {
            result.push(LineRange::new(start, end));
        }
        if x.end <= y.end {
            i += 1;
        } else {
            j += 1;
        }
    }

    result
}
