/// Parse a unified diff to extract which lines were added and deleted in
/// each file. Added lines feed the annotation engine.
///
/// Also provides a [`DiffSource`] trait that abstracts over different
/// ways to obtain a diff (stdin, git, GitHub API).
use std::collections::HashMap;
use std::process::Command;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;

use crate::github;

/// Hunk header: `@@ -old_start[,old_count] +new_start[,new_count] @@`.
static HUNK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^@@ -(\d+)(?:,\d+)? \+(\d+)(?:,\d+)? @@").unwrap());

// ---------------------------------------------------------------------------
// Diff sources
// ---------------------------------------------------------------------------

/// A source for obtaining a unified diff.
pub trait DiffSource {
    /// Fetch the diff text.
    fn fetch_diff(&self) -> Result<String>;

    /// Get the commit SHA, if available.
    fn sha(&self) -> Option<&str> {
        None
    }
}

/// Diff from stdin.
pub struct StdinDiff;

impl DiffSource for StdinDiff {
    fn fetch_diff(&self) -> Result<String> {
        std::io::read_to_string(std::io::stdin()).context("Failed to read diff from stdin")
    }
}

/// Diff from a git command (e.g., `git diff origin/main...HEAD`).
pub struct GitDiff {
    /// Arguments to pass to `git diff`.
    pub args: String,
}

impl DiffSource for GitDiff {
    fn fetch_diff(&self) -> Result<String> {
        let diff_args: Vec<&str> = self.args.split_whitespace().collect();
        tracing::debug!(args = %self.args, "running git diff");
        let output = Command::new("git")
            .arg("diff")
            .args(&diff_args)
            .output()
            .context("Failed to run git diff")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("git diff failed: {stderr}");
        }

        String::from_utf8(output.stdout).context("git diff output not valid UTF-8")
    }
}

/// Diff from a GitHub pull request.
pub struct GitHubDiff {
    /// The resolved GitHub context.
    pub context: github::Context,
}

impl GitHubDiff {
    /// Create from environment variables.
    pub fn from_env() -> Result<Self> {
        let context = github::Context::from_env()?;
        Ok(Self { context })
    }
}

impl DiffSource for GitHubDiff {
    fn fetch_diff(&self) -> Result<String> {
        self.context.fetch_diff()
    }

    fn sha(&self) -> Option<&str> {
        self.context.sha.as_deref()
    }
}

// ---------------------------------------------------------------------------
// Diff parsing
// ---------------------------------------------------------------------------

/// Lines a diff touches in one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffFile {
    /// Path in the new tree.
    pub path: String,
    /// Added line numbers in the new file, in file order.
    pub added_lines: Vec<u32>,
    /// Deleted line numbers in the old file, in file order.
    pub deleted_lines: Vec<u32>,
}

/// Prepend a path prefix to all file paths in a diff result.
pub fn apply_path_prefix(files: Vec<DiffFile>, prefix: &str) -> Vec<DiffFile> {
    let prefix = prefix.trim_end_matches('/');
    files
        .into_iter()
        .map(|file| DiffFile {
            path: format!("{prefix}/{}", file.path),
            ..file
        })
        .collect()
}

/// Map of path -> added lines. Files the diff touches without adding
/// anything map to an empty list.
pub fn added_lines(files: &[DiffFile]) -> HashMap<String, Vec<u32>> {
    let mut result: HashMap<String, Vec<u32>> = HashMap::new();
    for file in files {
        result
            .entry(file.path.clone())
            .or_default()
            .extend_from_slice(&file.added_lines);
    }
    result
}

/// Parse a unified diff (e.g., `git diff`) into one [`DiffFile`] per file
/// that received a `+++` header, in diff order. Deleted files are dropped.
pub fn parse_diff(diff_text: &str) -> Vec<DiffFile> {
    let mut result: Vec<DiffFile> = Vec::new();
    let mut current: Option<DiffFile> = None;
    let mut old_line_number: u32 = 0;
    let mut new_line_number: u32 = 0;

    for line in diff_text.lines() {
        if line.starts_with("diff --git ") {
            result.extend(current.take());
        } else if let Some(rest) = line.strip_prefix("+++ ") {
            result.extend(current.take());
            // Drop a trailing tab-separated timestamp (`diff -u` output).
            let rest = rest.split('\t').next().unwrap_or(rest);
            if rest != "/dev/null" {
                // Strip common VCS prefixes: "b/" (default git), "a/" (some tools).
                // Also handles --no-prefix diffs where no prefix is present.
                let path = rest
                    .strip_prefix("b/")
                    .or_else(|| rest.strip_prefix("a/"))
                    .unwrap_or(rest);
                current = Some(DiffFile {
                    path: path.to_string(),
                    ..Default::default()
                });
            }
        } else if line.starts_with("@@") {
            let (old_start, new_start) = parse_hunk_header(line).unwrap_or((0, 0));
            old_line_number = old_start;
            new_line_number = new_start;
        } else if let Some(file) = current.as_mut() {
            if line.starts_with('\\') {
                // "\ No newline at end of file" is metadata, not a line
            } else if line.starts_with('+') {
                file.added_lines.push(new_line_number);
                new_line_number += 1;
            } else if line.starts_with('-') {
                if !line.starts_with("--- ") {
                    file.deleted_lines.push(old_line_number);
                }
                old_line_number += 1;
            } else {
                old_line_number += 1;
                new_line_number += 1;
            }
        }
    }

    result.extend(current);
    result
}

/// Parse `(old_start, new_start)` from a hunk header like "@@ -10,5 +20,8 @@".
fn parse_hunk_header(line: &str) -> Option<(u32, u32)> {
    let caps = HUNK_RE.captures(line)?;
    let old_start = caps[1].parse().ok()?;
    let new_start = caps[2].parse().ok()?;
    Some((old_start, new_start))
}
