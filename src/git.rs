//! Process boundary to the `git` executable.
//!
//! Everything that touches the repository goes through the [`Git`] trait so
//! the notes store and baseline logic can run against an in-memory fake in
//! tests. A non-zero exit becomes a [`GitError`] carrying stderr, which
//! [`GitError::kind`] classifies for the callers' control flow.

use std::path::PathBuf;
use std::process::Command;

use thiserror::Error;

/// How a failed git invocation should be treated by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GitErrorKind {
    /// The ref, note or object does not exist.
    NotFound,
    /// The remote rejected a non-fast-forward update; retryable.
    Conflict,
    /// Anything else.
    Fatal,
}

#[derive(Error, Debug)]
pub enum GitError {
    #[error("failed to spawn git: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("git {args} exited with {code}: {stderr}")]
    Command {
        args: String,
        code: i32,
        stderr: String,
    },

    #[error("git {args} produced non UTF-8 output")]
    Utf8 { args: String },
}

const NOT_FOUND_SIGNATURES: &[&str] = &[
    "couldn't find remote ref",
    "no note found",
    "no such ref",
    "not a valid object name",
    "unknown revision",
];

// Only a stale ref is retryable. "failed to push some refs" follows every
// failed push, hook and permission refusals included, so it is not listed.
const CONFLICT_SIGNATURES: &[&str] = &[
    "non-fast-forward",
    "fetch first",
    "! [rejected]",
    "cannot lock ref",
    "timed out",
];

impl GitError {
    pub fn command(args: &[&str], code: i32, stderr: impl Into<String>) -> Self {
        GitError::Command {
            args: args.join(" "),
            code,
            stderr: stderr.into(),
        }
    }

    /// Classify by the diagnostic git printed.
    #[must_use]
    pub fn kind(&self) -> GitErrorKind {
        let GitError::Command { stderr, .. } = self else {
            return GitErrorKind::Fatal;
        };
        let stderr = stderr.to_lowercase();
        if CONFLICT_SIGNATURES.iter().any(|s| stderr.contains(s)) {
            GitErrorKind::Conflict
        } else if NOT_FOUND_SIGNATURES.iter().any(|s| stderr.contains(s)) {
            GitErrorKind::NotFound
        } else {
            GitErrorKind::Fatal
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.kind() == GitErrorKind::NotFound
    }

    #[must_use]
    pub fn is_conflict(&self) -> bool {
        self.kind() == GitErrorKind::Conflict
    }
}

/// Runs git subcommands against one repository.
pub trait Git {
    /// Run `git <args>` and return trimmed stdout.
    fn run(&self, args: &[&str]) -> Result<String, GitError>;
}

/// [`Git`] implementation that spawns the real executable.
#[derive(Debug, Clone)]
pub struct ProcessGit {
    dir: PathBuf,
}

impl ProcessGit {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl Git for ProcessGit {
    fn run(&self, args: &[&str]) -> Result<String, GitError> {
        tracing::debug!(dir = %self.dir.display(), "git {}", args.join(" "));
        let output = Command::new("git")
            .arg("-C")
            .arg(&self.dir)
            .args(args)
            .output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(GitError::command(
                args,
                output.status.code().unwrap_or(-1),
                stderr,
            ));
        }

        String::from_utf8(output.stdout)
            .map(|s| s.trim_end().to_string())
            .map_err(|_| GitError::Utf8 {
                args: args.join(" "),
            })
    }
}

/// Resolve a revision (e.g. `HEAD`) to a full commit sha.
pub fn rev_parse(git: &dyn Git, rev: &str) -> Result<String, GitError> {
    let spec = format!("{rev}^{{commit}}");
    git.run(&["rev-parse", "--verify", &spec])
}

/// Nearest common ancestor of two revisions, or `None` when the histories
/// are unrelated.
pub fn merge_base(git: &dyn Git, a: &str, b: &str) -> Result<Option<String>, GitError> {
    match git.run(&["merge-base", a, b]) {
        Ok(sha) if sha.is_empty() => Ok(None),
        Ok(sha) => Ok(Some(sha)),
        // merge-base exits 1 without a diagnostic when there is no common ancestor.
        Err(GitError::Command { code: 1, stderr, .. }) if stderr.is_empty() => Ok(None),
        Err(e) => Err(e),
    }
}

/// Up to `limit` commits reachable from `start`, newest first, starting with
/// `start` itself.
pub fn ancestors(git: &dyn Git, start: &str, limit: usize) -> Result<Vec<String>, GitError> {
    if limit == 0 {
        return Ok(Vec::new());
    }
    let max_count = format!("--max-count={limit}");
    let out = git.run(&["rev-list", "--first-parent", &max_count, start])?;
    Ok(out
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}
