//! Commit-addressed key/value store on top of `git notes`.
//!
//! Each namespace maps to its own ref, `refs/notes/<namespace>`, shared
//! through the remote. Every operation takes the namespace explicitly.
//! Writes are applied locally right away and also staged, so that
//! [`NotesStore::push`] can replay them on top of a freshly fetched ref
//! when the remote moved underneath us.

use std::collections::HashMap;

use crate::git::{Git, GitError};
use crate::retry::{retry_on_conflict, PushOutcome};

/// The notes ref backing a namespace.
#[must_use]
pub fn notes_ref(namespace: &str) -> String {
    format!("refs/notes/{namespace}")
}

#[derive(Debug, Clone)]
enum StagedOp {
    Replace(String),
    Append(String),
}

#[derive(Debug, Clone)]
struct StagedNote {
    commit: String,
    op: StagedOp,
}

pub struct NotesStore<G> {
    git: G,
    remote: String,
    staged: HashMap<String, Vec<StagedNote>>,
}

impl<G: Git> NotesStore<G> {
    pub fn new(git: G, remote: impl Into<String>) -> Self {
        Self {
            git,
            remote: remote.into(),
            staged: HashMap::new(),
        }
    }

    pub fn git(&self) -> &G {
        &self.git
    }

    pub fn remote(&self) -> &str {
        &self.remote
    }

    /// Force-fetch the namespace's ref from the remote, replacing the local
    /// copy. Returns `false` when the remote has no such ref yet.
    pub fn fetch(&self, namespace: &str) -> Result<bool, GitError> {
        let r = notes_ref(namespace);
        let refspec = format!("+{r}:{r}");
        match self.git.run(&["fetch", "--quiet", &self.remote, &refspec]) {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => {
                tracing::debug!(namespace, "no notes ref on remote yet");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Raw note attached to `commit`, or `None` if there is none.
    pub fn read(&self, commit: &str, namespace: &str) -> Result<Option<String>, GitError> {
        let r = notes_ref(namespace);
        match self.git.run(&["notes", "--ref", &r, "show", commit]) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Attach `content` to `commit`. Without `force`, an existing note is an
    /// error rather than being overwritten.
    pub fn write(
        &mut self,
        commit: &str,
        content: &str,
        namespace: &str,
        force: bool,
    ) -> Result<(), GitError> {
        self.add_note(commit, content, namespace, force)?;
        self.stage(namespace, commit, StagedOp::Replace(content.to_string()));
        Ok(())
    }

    /// Prepend `content` as a new line to whatever is attached to `commit`.
    pub fn append(&mut self, commit: &str, content: &str, namespace: &str) -> Result<(), GitError> {
        self.apply_append(commit, content, namespace)?;
        self.stage(namespace, commit, StagedOp::Append(content.to_string()));
        Ok(())
    }

    /// Publish staged writes for `namespace`.
    ///
    /// Each attempt force-fetches the remote ref, replays the staged writes
    /// on top of it and pushes. Calls for a namespace must follow the order
    /// fetch, write, push. Conflicting pushes are retried up to
    /// `max_retries` times; running out yields [`PushOutcome::Exhausted`].
    pub fn push(&mut self, namespace: &str, max_retries: u32) -> Result<PushOutcome, GitError> {
        let staged = self.staged.get(namespace).cloned().unwrap_or_default();
        let r = notes_ref(namespace);
        let refspec = format!("{r}:{r}");

        let outcome = retry_on_conflict(max_retries, |attempt| {
            // With no remote ref there is nothing to reset to: the local ref
            // already carries every staged write.
            if self.fetch(namespace)? {
                for note in &staged {
                    self.replay(note, namespace)?;
                }
            }
            tracing::debug!(namespace, attempt, notes = staged.len(), "pushing notes");
            self.git.run(&["push", "--quiet", &self.remote, &refspec])?;
            Ok(())
        })?;

        if outcome.is_pushed() {
            self.staged.remove(namespace);
        }
        Ok(outcome)
    }

    /// Number of writes waiting for a push in `namespace`.
    #[must_use]
    pub fn staged_count(&self, namespace: &str) -> usize {
        self.staged.get(namespace).map_or(0, Vec::len)
    }

    fn stage(&mut self, namespace: &str, commit: &str, op: StagedOp) {
        self.staged
            .entry(namespace.to_string())
            .or_default()
            .push(StagedNote {
                commit: commit.to_string(),
                op,
            });
    }

    fn replay(&self, note: &StagedNote, namespace: &str) -> Result<(), GitError> {
        match &note.op {
            StagedOp::Replace(content) => self.add_note(&note.commit, content, namespace, true),
            StagedOp::Append(content) => self.apply_append(&note.commit, content, namespace),
        }
    }

    fn apply_append(&self, commit: &str, content: &str, namespace: &str) -> Result<(), GitError> {
        let combined = match self.read(commit, namespace)? {
            Some(existing) if !existing.trim().is_empty() => format!("{content}\n{existing}"),
            _ => content.to_string(),
        };
        self.add_note(commit, &combined, namespace, true)
    }

    fn add_note(
        &self,
        commit: &str,
        content: &str,
        namespace: &str,
        force: bool,
    ) -> Result<(), GitError> {
        let r = notes_ref(namespace);
        let mut args = vec!["notes", "--ref", r.as_str(), "add"];
        if force {
            args.push("--force");
        }
        args.extend(["--message", content, commit]);
        self.git.run(&args)?;
        Ok(())
    }
}
