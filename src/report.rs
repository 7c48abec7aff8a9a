//! Output formatting for coverage checks: totals, baseline delta, trend and
//! uncovered-line annotations.

use std::fmt::Write;

use crate::baseline::{format_delta, BaselineOutcome};
use crate::model::{Annotation, CoverageTotals};
use crate::snapshot::Snapshot;

const SPARK_TICKS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Everything a coverage check produced, ready to be formatted.
pub struct CoverageReport {
    /// Totals of the current coverage file.
    pub totals: CoverageTotals,
    /// Baseline resolution, if one was attempted.
    pub baseline: Option<BaselineOutcome>,
    /// Decimals in the rendered delta.
    pub precision: usize,
    /// Recorded snapshots, oldest first.
    pub history: Vec<Snapshot>,
    /// Uncovered added lines.
    pub annotations: Vec<Annotation>,
    /// Commit SHA to display and link against.
    pub sha: Option<String>,
}

impl CoverageReport {
    /// Format using a specific formatter.
    #[must_use]
    pub fn format(&self, formatter: &dyn ReportFormatter) -> String {
        formatter.format(self)
    }

    /// Signed difference from the baseline, when one was found and parses.
    #[must_use]
    pub fn delta(&self) -> Option<String> {
        let baseline = self.baseline.as_ref()?.snapshot()?.percentage().ok()?;
        Some(format_delta(
            self.totals.line_rate() * 100.0,
            baseline,
            self.precision,
        ))
    }

    fn trend(&self) -> Vec<f64> {
        self.history
            .iter()
            .filter_map(|s| s.percentage().ok())
            .collect()
    }
}

/// Trait for formatting coverage reports.
pub trait ReportFormatter {
    /// Format the report to a string.
    fn format(&self, report: &CoverageReport) -> String;
}

/// Plain text formatter.
pub struct TextFormatter;

impl ReportFormatter for TextFormatter {
    fn format(&self, report: &CoverageReport) -> String {
        let mut out = String::new();
        let totals = &report.totals;

        write!(
            out,
            "Coverage: {}% ({}/{} lines, {} files)",
            totals.percentage(),
            totals.covered_lines,
            totals.total_lines,
            totals.total_files
        )
        .unwrap();
        if let Some(delta) = report.delta() {
            write!(out, " {delta}").unwrap();
        }
        out.push('\n');

        match &report.baseline {
            Some(BaselineOutcome::Found {
                snapshot, commit, ..
            }) => {
                writeln!(
                    out,
                    "Baseline: {}% at {}",
                    snapshot.coverage_percentage,
                    short_sha(commit)
                )
                .unwrap();
            }
            Some(other) => writeln!(out, "Baseline: {}", other.describe()).unwrap(),
            None => {}
        }

        let trend = report.trend();
        if !trend.is_empty() {
            writeln!(out, "Trend:    {} ({} snapshots)", sparkline(&trend), trend.len()).unwrap();
        }

        if report.annotations.is_empty() {
            out.push_str("\nNo uncovered added lines.\n");
        } else {
            writeln!(out, "\nUncovered added lines:").unwrap();
            for a in &report.annotations {
                writeln!(out, "  {}:{}  {}", a.path, a.range(), a.message).unwrap();
            }
        }

        out
    }
}

/// Markdown formatter, used for pull request comments.
pub struct MarkdownFormatter;

impl ReportFormatter for MarkdownFormatter {
    fn format(&self, report: &CoverageReport) -> String {
        let mut md = String::new();
        let totals = &report.totals;

        write!(md, "### Coverage: {}%", totals.percentage()).unwrap();
        if let Some(delta) = report.delta() {
            write!(md, " ({delta})").unwrap();
        }
        md.push_str("\n\n");

        write!(
            md,
            "**{}** of **{}** lines covered",
            totals.covered_lines, totals.total_lines
        )
        .unwrap();
        if let Some(ref sha) = report.sha {
            write!(md, " ({})", short_sha(sha)).unwrap();
        }
        md.push('\n');

        match &report.baseline {
            Some(BaselineOutcome::Found {
                snapshot, commit, ..
            }) => {
                writeln!(
                    md,
                    "\nCompared with `{}` at **{}%**.",
                    short_sha(commit),
                    snapshot.coverage_percentage
                )
                .unwrap();
            }
            Some(other) => writeln!(md, "\n_{}._", capitalize(&other.describe())).unwrap(),
            None => {}
        }

        let trend = report.trend();
        if let (Some(first), Some(last)) = (trend.first(), trend.last()) {
            writeln!(
                md,
                "\nTrend: `{}` {first:.2}% → {last:.2}%",
                sparkline(&trend)
            )
            .unwrap();
        }

        if report.annotations.is_empty() {
            md.push_str("\nAll added lines are covered! 🎉\n");
        } else {
            md.push_str("\n<details>\n<summary>Uncovered added lines</summary>\n\n");
            md.push_str("| File | Lines |\n");
            md.push_str("|:-----|:------|\n");
            for a in &report.annotations {
                let range = a.range().to_string();
                let lines = match report.sha {
                    Some(ref sha) => format!(
                        "[{range}](../blob/{sha}/{}#L{}-L{})",
                        a.path, a.start_line, a.end_line
                    ),
                    None => range,
                };
                writeln!(md, "| `{}` | {lines} |", a.path).unwrap();
            }
            md.push_str("\n</details>\n");
        }

        md.push_str("\n<sub>covtrack</sub>\n");
        md
    }
}

/// Render annotations as GitHub Actions workflow commands.
#[must_use]
pub fn github_commands(annotations: &[Annotation]) -> String {
    let mut out = String::new();
    for a in annotations {
        writeln!(
            out,
            "::warning file={},line={},endLine={}::{}",
            escape_property(&a.path),
            a.start_line,
            a.end_line,
            escape_data(&a.message)
        )
        .unwrap();
    }
    out
}

/// One character per value, scaled between the series minimum and maximum.
/// A flat series renders at mid-height.
#[must_use]
pub fn sparkline(values: &[f64]) -> String {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = max - min;
    let top = (SPARK_TICKS.len() - 1) as f64;

    values
        .iter()
        .map(|v| {
            if span < f64::EPSILON {
                SPARK_TICKS[SPARK_TICKS.len() / 2 - 1]
            } else {
                SPARK_TICKS[(((v - min) / span) * top).round() as usize]
            }
        })
        .collect()
}

fn escape_data(s: &str) -> String {
    s.replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

fn escape_property(s: &str) -> String {
    escape_data(s).replace(':', "%3A").replace(',', "%2C")
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn short_sha(sha: &str) -> &str {
    sha.get(..7).unwrap_or(sha)
}
