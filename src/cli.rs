//! Command handler functions for the covtrack CLI.
//!
//! Each `cmd_*` function returns its output as a `String`, making them easy
//! to test without capturing stdout. Handlers that touch notes are generic
//! over [`Git`] so tests can run them against an in-memory repository.

use std::fmt::Write;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::ValueEnum;

use crate::annotate::build_annotations;
use crate::baseline::{BaselineManager, BaselineOutcome};
use crate::config::Settings;
use crate::diff;
use crate::git::{self, Git};
use crate::model::{Annotation, CoverageData};
use crate::notes::notes_ref;
use crate::report::{self, sparkline, CoverageReport, MarkdownFormatter, TextFormatter};
use crate::retry::PushOutcome;
use crate::snapshot::Snapshot;

/// Output style for the `check` command.
#[derive(Clone, ValueEnum)]
pub enum Style {
    Text,
    Markdown,
}

/// Output format for the `annotate` command.
#[derive(Clone, ValueEnum)]
pub enum Output {
    Text,
    Json,
    /// GitHub Actions workflow commands.
    Github,
}

/// Parse `diff_text` and annotate the uncovered lines it added.
pub fn annotations_for(
    data: &CoverageData,
    diff_text: &str,
    path_prefix: Option<&str>,
) -> Vec<Annotation> {
    let mut files = diff::parse_diff(diff_text);
    if let Some(prefix) = path_prefix {
        files = diff::apply_path_prefix(files, prefix);
    }
    build_annotations(&data.files, &diff::added_lines(&files))
}

pub fn cmd_annotate(
    data: &CoverageData,
    diff_text: &str,
    path_prefix: Option<&str>,
    output: &Output,
) -> Result<String> {
    let annotations = annotations_for(data, diff_text, path_prefix);

    let out = match output {
        Output::Json => {
            let mut json = serde_json::to_string_pretty(&annotations)
                .context("Failed to serialize annotations")?;
            json.push('\n');
            json
        }
        Output::Github => report::github_commands(&annotations),
        Output::Text if annotations.is_empty() => "No uncovered added lines.\n".to_string(),
        Output::Text => {
            let mut out = String::new();
            for a in &annotations {
                writeln!(out, "{}:{}  {}", a.path, a.range(), a.message).unwrap();
            }
            out
        }
    };
    Ok(out)
}

/// Record a snapshot of `data` on `rev` and push it.
///
/// Losing every push race is not an error: the snapshot is best-effort and
/// the command still succeeds.
pub fn cmd_store<G: Git>(
    manager: &mut BaselineManager<G>,
    settings: &Settings,
    data: &CoverageData,
    rev: &str,
    now: DateTime<Utc>,
) -> Result<String> {
    let commit = git::rev_parse(manager.store().git(), rev)
        .with_context(|| format!("Failed to resolve '{rev}'"))?;
    let snapshot = Snapshot::new(commit, &data.totals(), now);

    let outcome = manager
        .store_snapshot(&snapshot, &settings.namespace, settings.max_retries)
        .context("Failed to record coverage snapshot")?;

    let short = short_sha(&snapshot.commit);
    let target = notes_ref(&settings.namespace);
    Ok(match outcome {
        PushOutcome::Pushed { attempts } => format!(
            "Recorded {}% for {short} in {target} ({attempts} attempt{})\n",
            snapshot.coverage_percentage,
            if attempts == 1 { "" } else { "s" },
        ),
        PushOutcome::Exhausted { attempts } => format!(
            "Could not record coverage for {short} in {target}: push rejected {attempts} times\n"
        ),
    })
}

/// Gather everything `check` reports: annotations, baseline and history.
pub fn check_report<G: Git>(
    manager: &BaselineManager<G>,
    settings: &Settings,
    data: &CoverageData,
    diff_text: Option<&str>,
    path_prefix: Option<&str>,
    sha: Option<String>,
) -> Result<CoverageReport> {
    let annotations = diff_text
        .map(|text| annotations_for(data, text, path_prefix))
        .unwrap_or_default();

    let baseline = manager
        .load_baseline(
            &settings.namespace,
            &settings.target_branch,
            settings.max_lookback,
        )
        .context("Failed to load coverage baseline")?;
    tracing::info!(namespace = %settings.namespace, "{}", baseline.describe());

    let history = if baseline == BaselineOutcome::NoHistory {
        Vec::new()
    } else {
        manager
            .collect_history("HEAD", &settings.namespace, settings.history_len)
            .context("Failed to collect coverage history")?
    };

    let sha = sha.or_else(|| git::rev_parse(manager.store().git(), "HEAD").ok());

    Ok(CoverageReport {
        totals: data.totals(),
        baseline: Some(baseline),
        precision: settings.precision,
        history,
        annotations,
        sha,
    })
}

pub fn cmd_check<G: Git>(
    manager: &BaselineManager<G>,
    settings: &Settings,
    data: &CoverageData,
    diff_text: Option<&str>,
    path_prefix: Option<&str>,
    style: &Style,
    sha: Option<String>,
) -> Result<String> {
    let report = check_report(manager, settings, data, diff_text, path_prefix, sha)?;
    Ok(match style {
        Style::Text => report.format(&TextFormatter),
        Style::Markdown => report.format(&MarkdownFormatter),
    })
}

pub fn cmd_show<G: Git>(
    manager: &BaselineManager<G>,
    settings: &Settings,
    rev: &str,
) -> Result<String> {
    let store = manager.store();
    let namespace = &settings.namespace;
    if !store.fetch(namespace).context("Failed to fetch notes")? {
        return Ok(format!("No coverage recorded in {} yet.\n", notes_ref(namespace)));
    }

    let commit = git::rev_parse(store.git(), rev)
        .with_context(|| format!("Failed to resolve '{rev}'"))?;
    let Some(note) = store.read(&commit, namespace).context("Failed to read note")? else {
        return Ok(format!("No snapshot recorded for {}.\n", short_sha(&commit)));
    };
    let snapshot = Snapshot::from_note(&commit, &note)?;

    let mut out = String::new();
    writeln!(out, "Commit:     {}", snapshot.commit).unwrap();
    writeln!(out, "Recorded:   {}", snapshot.timestamp).unwrap();
    writeln!(
        out,
        "Lines:      {}/{} ({}%)",
        snapshot.covered_lines, snapshot.total_lines, snapshot.coverage_percentage
    )
    .unwrap();
    Ok(out)
}

pub fn cmd_history<G: Git>(
    manager: &BaselineManager<G>,
    settings: &Settings,
    rev: &str,
) -> Result<String> {
    let namespace = &settings.namespace;
    if !manager
        .store()
        .fetch(namespace)
        .context("Failed to fetch notes")?
    {
        return Ok(format!("No coverage recorded in {} yet.\n", notes_ref(namespace)));
    }

    let history = manager
        .collect_history(rev, namespace, settings.history_len)
        .context("Failed to collect coverage history")?;
    if history.is_empty() {
        return Ok(format!("No snapshots reachable from {rev}.\n"));
    }

    let mut out = String::new();
    writeln!(out, "{:<9} {:<22} {:>8}", "COMMIT", "RECORDED", "COVERAGE").unwrap();
    writeln!(out, "{}", "-".repeat(41)).unwrap();
    for s in &history {
        writeln!(
            out,
            "{:<9} {:<22} {:>7}%",
            short_sha(&s.commit),
            s.timestamp,
            s.coverage_percentage
        )
        .unwrap();
    }

    let values: Vec<f64> = history.iter().filter_map(|s| s.percentage().ok()).collect();
    writeln!(out, "\nTrend: {}", sparkline(&values)).unwrap();
    Ok(out)
}

fn short_sha(sha: &str) -> &str {
    sha.get(..7).unwrap_or(sha)
}
