//! Resolving a comparison baseline for the current branch, recording new
//! snapshots, and collecting a short history for trend display.

use crate::error::Result;
use crate::git::{self, Git, GitError};
use crate::notes::NotesStore;
use crate::retry::PushOutcome;
use crate::snapshot::Snapshot;

pub const DEFAULT_MAX_LOOKBACK: usize = 50;
pub const DEFAULT_PRECISION: usize = 2;

/// History walks this many times more commits than snapshots requested,
/// since not every commit has one.
const HISTORY_OVERFETCH: usize = 3;

/// How loading a baseline ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BaselineOutcome {
    /// A snapshot was found `searched_commits - 1` commits above the merge-base.
    Found {
        snapshot: Snapshot,
        commit: String,
        searched_commits: usize,
    },
    /// The namespace has never been pushed to the remote.
    NoHistory,
    /// HEAD and the target branch share no ancestor.
    NoMergeBase,
    /// No readable snapshot at the merge-base or within the lookback window.
    NoBaseline {
        merge_base: String,
        searched_commits: usize,
    },
    /// The nearest recorded snapshot is corrupt.
    ParseError { commit: String, message: String },
}

impl BaselineOutcome {
    #[must_use]
    pub fn snapshot(&self) -> Option<&Snapshot> {
        match self {
            BaselineOutcome::Found { snapshot, .. } => Some(snapshot),
            _ => None,
        }
    }

    /// One-line description for logs and reports.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            BaselineOutcome::Found {
                commit,
                searched_commits,
                ..
            } => format!(
                "baseline {} found after searching {searched_commits} commit(s)",
                short_sha(commit)
            ),
            BaselineOutcome::NoHistory => "no coverage history recorded yet".to_string(),
            BaselineOutcome::NoMergeBase => "no merge-base with the target branch".to_string(),
            BaselineOutcome::NoBaseline {
                merge_base,
                searched_commits,
            } => format!(
                "no baseline within {searched_commits} commit(s) of {}",
                short_sha(merge_base)
            ),
            BaselineOutcome::ParseError { commit, message } => {
                format!("corrupt snapshot at {}: {message}", short_sha(commit))
            }
        }
    }
}

enum NoteRead {
    Missing,
    Valid(Snapshot),
    Malformed(String),
}

pub struct BaselineManager<G> {
    store: NotesStore<G>,
}

impl<G: Git> BaselineManager<G> {
    pub fn new(store: NotesStore<G>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &NotesStore<G> {
        &self.store
    }

    /// Find the snapshot to compare HEAD against.
    ///
    /// Reads the merge-base of HEAD and `<remote>/<target_branch>` first,
    /// then walks up to `max_lookback` of its ancestors. A malformed note
    /// stops the search.
    pub fn load_baseline(
        &self,
        namespace: &str,
        target_branch: &str,
        max_lookback: usize,
    ) -> std::result::Result<BaselineOutcome, GitError> {
        if !self.store.fetch(namespace)? {
            return Ok(BaselineOutcome::NoHistory);
        }

        let target = format!("{}/{target_branch}", self.store.remote());
        let Some(base) = git::merge_base(self.store.git(), "HEAD", &target)? else {
            return Ok(BaselineOutcome::NoMergeBase);
        };

        match self.read_snapshot(&base, namespace)? {
            NoteRead::Valid(snapshot) => {
                return Ok(BaselineOutcome::Found {
                    snapshot,
                    commit: base,
                    searched_commits: 1,
                })
            }
            NoteRead::Malformed(message) => {
                return Ok(BaselineOutcome::ParseError {
                    commit: base,
                    message,
                })
            }
            NoteRead::Missing => {}
        }

        if max_lookback == 0 {
            return Ok(BaselineOutcome::NoBaseline {
                merge_base: base,
                searched_commits: 1,
            });
        }

        // rev-list includes the merge-base itself, already checked above.
        let walk = git::ancestors(self.store.git(), &base, max_lookback + 1)?;
        let mut searched = 1;
        for (distance, commit) in walk.into_iter().enumerate().skip(1) {
            searched = distance + 1;
            match self.read_snapshot(&commit, namespace)? {
                NoteRead::Valid(snapshot) => {
                    tracing::info!(%commit, distance, "using ancestor snapshot as baseline");
                    return Ok(BaselineOutcome::Found {
                        snapshot,
                        commit,
                        searched_commits: searched,
                    });
                }
                NoteRead::Malformed(message) => {
                    return Ok(BaselineOutcome::ParseError { commit, message });
                }
                NoteRead::Missing => {}
            }
        }

        Ok(BaselineOutcome::NoBaseline {
            merge_base: base,
            searched_commits: searched,
        })
    }

    /// Record `snapshot` on its commit and publish it.
    ///
    /// Returns the push outcome; [`PushOutcome::Exhausted`] means other
    /// writers kept winning the race and the snapshot was not recorded.
    pub fn store_snapshot(
        &mut self,
        snapshot: &Snapshot,
        namespace: &str,
        max_retries: u32,
    ) -> Result<PushOutcome> {
        let line = snapshot.to_line()?;
        self.store.fetch(namespace)?;
        self.store.append(&snapshot.commit, &line, namespace)?;
        let outcome = self.store.push(namespace, max_retries)?;
        match outcome {
            PushOutcome::Pushed { attempts } => {
                tracing::info!(commit = %snapshot.commit, namespace, attempts, "snapshot recorded");
            }
            PushOutcome::Exhausted { attempts } => {
                tracing::warn!(commit = %snapshot.commit, namespace, attempts, "snapshot not recorded: push kept conflicting");
            }
        }
        Ok(outcome)
    }

    /// Up to `count` snapshots reachable from `start`, oldest first.
    /// Commits without a snapshot or with a corrupt one are skipped.
    pub fn collect_history(
        &self,
        start: &str,
        namespace: &str,
        count: usize,
    ) -> std::result::Result<Vec<Snapshot>, GitError> {
        if count == 0 {
            return Ok(Vec::new());
        }

        let walk = git::ancestors(self.store.git(), start, count * HISTORY_OVERFETCH)?;
        let mut history = Vec::with_capacity(count);
        for commit in walk {
            match self.read_snapshot(&commit, namespace)? {
                NoteRead::Valid(snapshot) => history.push(snapshot),
                NoteRead::Malformed(message) => {
                    tracing::debug!(%commit, "skipping corrupt snapshot in history: {message}");
                }
                NoteRead::Missing => {}
            }
            if history.len() == count {
                break;
            }
        }

        history.reverse();
        Ok(history)
    }

    fn read_snapshot(
        &self,
        commit: &str,
        namespace: &str,
    ) -> std::result::Result<NoteRead, GitError> {
        let Some(note) = self.store.read(commit, namespace)? else {
            return Ok(NoteRead::Missing);
        };
        Ok(match Snapshot::from_note(commit, &note) {
            Ok(snapshot) => NoteRead::Valid(snapshot),
            Err(e) => NoteRead::Malformed(e.to_string()),
        })
    }
}

/// `current - baseline` with an explicit sign and `precision` decimals.
/// A delta that rounds to zero is rendered as `+0.00`.
#[must_use]
pub fn format_delta(current: f64, baseline: f64, precision: usize) -> String {
    let delta = current - baseline;
    let scale = 10f64.powi(precision as i32);
    let rounded = (delta * scale).round() / scale;
    let rounded = if rounded == 0.0 { 0.0 } else { rounded };
    format!("{rounded:+.precision$}")
}

fn short_sha(sha: &str) -> &str {
    sha.get(..7).unwrap_or(sha)
}
