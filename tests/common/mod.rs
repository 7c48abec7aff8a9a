#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use covtrack::git::{Git, GitError};
use covtrack::notes::notes_ref;

/// A notes ref: commit -> note content, plus a version bumped on every
/// accepted push so stale pushes can be detected.
#[derive(Debug, Clone, Default)]
struct NotesRef {
    version: u64,
    notes: BTreeMap<String, String>,
}

#[derive(Debug, Default)]
struct RemoteState {
    refs: HashMap<String, NotesRef>,
    reject_pushes: u32,
    pushes: u32,
}

/// Shared remote that several [`FakeGit`] clones push to.
#[derive(Debug, Clone, Default)]
pub struct FakeRemote(Arc<Mutex<RemoteState>>);

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a note directly, as if another writer had pushed it.
    pub fn set_note(&self, namespace: &str, commit: &str, content: &str) {
        let mut state = self.0.lock().unwrap();
        let r = state.refs.entry(notes_ref(namespace)).or_default();
        r.notes.insert(commit.to_string(), content.to_string());
        r.version += 1;
    }

    pub fn note(&self, namespace: &str, commit: &str) -> Option<String> {
        let state = self.0.lock().unwrap();
        state
            .refs
            .get(&notes_ref(namespace))
            .and_then(|r| r.notes.get(commit).cloned())
    }

    pub fn has_ref(&self, namespace: &str) -> bool {
        self.0.lock().unwrap().refs.contains_key(&notes_ref(namespace))
    }

    /// Reject the next `n` pushes as if another writer got there first.
    pub fn reject_next_pushes(&self, n: u32) {
        self.0.lock().unwrap().reject_pushes = n;
    }

    /// Number of push attempts that reached the remote.
    pub fn push_count(&self) -> u32 {
        self.0.lock().unwrap().pushes
    }
}

#[derive(Debug, Default)]
struct LocalRef {
    /// Remote version this copy was fetched at; `None` if created locally.
    base: Option<u64>,
    notes: BTreeMap<String, String>,
}

/// In-memory stand-in for a clone: a linear first-parent history, local
/// notes refs and a shared [`FakeRemote`]. Understands exactly the git
/// invocations the notes store and baseline manager make.
pub struct FakeGit {
    remote: FakeRemote,
    commits: Vec<String>,
    merge_base: Option<usize>,
    local: Mutex<HashMap<String, LocalRef>>,
    calls: Mutex<Vec<String>>,
}

impl FakeGit {
    /// A clone with `commit_count` commits whose merge-base with the target
    /// branch is HEAD.
    pub fn new(commit_count: usize) -> Self {
        Self::with_remote(commit_count, FakeRemote::new())
    }

    pub fn with_remote(commit_count: usize, remote: FakeRemote) -> Self {
        assert!(commit_count > 0);
        Self {
            remote,
            commits: (0..commit_count).map(commit_id).collect(),
            merge_base: Some(commit_count - 1),
            local: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Set the index of the merge-base with the target branch; `None` makes
    /// the histories unrelated.
    pub fn merge_base_at(mut self, index: Option<usize>) -> Self {
        self.merge_base = index;
        self
    }

    pub fn remote(&self) -> FakeRemote {
        self.remote.clone()
    }

    /// Commit id at `index` (0 is the root).
    pub fn commit(&self, index: usize) -> String {
        self.commits[index].clone()
    }

    pub fn head(&self) -> String {
        self.commits[self.commits.len() - 1].clone()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of calls whose arguments start with `prefix`.
    pub fn count_calls(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    fn resolve(&self, rev: &str) -> Option<usize> {
        if rev == "HEAD" {
            return Some(self.commits.len() - 1);
        }
        self.commits.iter().position(|c| c == rev)
    }

    fn fetch(&self, args: &[&str], refspec: &str) -> Result<String, GitError> {
        let name = refspec.trim_start_matches('+').split(':').next().unwrap_or("");
        let remote = self.remote.0.lock().unwrap();
        match remote.refs.get(name) {
            Some(r) => {
                self.local.lock().unwrap().insert(
                    name.to_string(),
                    LocalRef {
                        base: Some(r.version),
                        notes: r.notes.clone(),
                    },
                );
                Ok(String::new())
            }
            None => Err(GitError::command(
                args,
                128,
                format!("fatal: couldn't find remote ref {name}"),
            )),
        }
    }

    fn push(&self, args: &[&str], refspec: &str) -> Result<String, GitError> {
        let name = refspec.split(':').next().unwrap_or("");
        let mut remote = self.remote.0.lock().unwrap();
        remote.pushes += 1;

        let rejected = || {
            GitError::command(
                args,
                1,
                format!(
                    " ! [rejected]        {name} -> {name} (fetch first)\n\
                     error: failed to push some refs to 'origin'"
                ),
            )
        };

        if remote.reject_pushes > 0 {
            remote.reject_pushes -= 1;
            return Err(rejected());
        }

        let mut local = self.local.lock().unwrap();
        let Some(mine) = local.get_mut(name) else {
            return Err(GitError::command(
                args,
                1,
                format!("error: src refspec {name} does not match any"),
            ));
        };
        let current = remote.refs.get(name).map(|r| r.version);
        if current.is_some() && current != mine.base {
            return Err(rejected());
        }

        let version = current.unwrap_or(0) + 1;
        remote.refs.insert(
            name.to_string(),
            NotesRef {
                version,
                notes: mine.notes.clone(),
            },
        );
        mine.base = Some(version);
        Ok(String::new())
    }

    fn notes(&self, args: &[&str]) -> Result<String, GitError> {
        // notes --ref <ref> show <commit>
        // notes --ref <ref> add [--force] --message <content> <commit>
        let name = args[2];
        let mut local = self.local.lock().unwrap();
        match args[3] {
            "show" => {
                let commit = args[4];
                local
                    .get(name)
                    .and_then(|r| r.notes.get(commit).cloned())
                    .ok_or_else(|| {
                        GitError::command(
                            args,
                            1,
                            format!("error: no note found for object {commit}."),
                        )
                    })
            }
            "add" => {
                let force = args.contains(&"--force");
                let message_at = args
                    .iter()
                    .position(|a| *a == "--message")
                    .expect("notes add without --message");
                let content = args[message_at + 1];
                let commit = args[args.len() - 1];
                let r = local.entry(name.to_string()).or_default();
                if r.notes.contains_key(commit) && !force {
                    return Err(GitError::command(
                        args,
                        1,
                        format!(
                            "error: Cannot add notes. Found existing notes for object {commit}. \
                             Use '-f' to overwrite existing notes"
                        ),
                    ));
                }
                r.notes.insert(commit.to_string(), content.to_string());
                Ok(String::new())
            }
            other => panic!("unexpected notes subcommand {other}"),
        }
    }

    fn rev_list(&self, args: &[&str]) -> Result<String, GitError> {
        let limit: usize = args
            .iter()
            .find_map(|a| a.strip_prefix("--max-count="))
            .and_then(|n| n.parse().ok())
            .unwrap_or(usize::MAX);
        let start = args[args.len() - 1];
        let Some(index) = self.resolve(start) else {
            return Err(GitError::command(
                args,
                128,
                format!("fatal: bad revision '{start}'"),
            ));
        };
        Ok(self.commits[..=index]
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

impl Git for FakeGit {
    fn run(&self, args: &[&str]) -> Result<String, GitError> {
        self.calls.lock().unwrap().push(args.join(" "));
        match args {
            ["fetch", "--quiet", _, refspec] => self.fetch(args, refspec),
            ["push", "--quiet", _, refspec] => self.push(args, refspec),
            ["notes", "--ref", ..] => self.notes(args),
            ["merge-base", "HEAD", _] => match self.merge_base {
                Some(index) => Ok(self.commits[index].clone()),
                None => Err(GitError::command(args, 1, "")),
            },
            ["rev-list", ..] => self.rev_list(args),
            ["rev-parse", "--verify", spec] => {
                let rev = spec.trim_end_matches("^{commit}");
                self.resolve(rev)
                    .map(|i| self.commits[i].clone())
                    .ok_or_else(|| {
                        GitError::command(args, 128, "fatal: Needed a single revision")
                    })
            }
            _ => panic!("unexpected git invocation: git {}", args.join(" ")),
        }
    }
}

/// 40 hex digits whose 7-character abbreviation is unique per index.
fn commit_id(index: usize) -> String {
    format!("{:07x}{:033x}", 0x100_0000 + index * 0x11111, index)
}

/// A snapshot note line as another writer would have recorded it.
pub fn snapshot_line(commit: &str, percentage: &str) -> String {
    format!(
        r#"{{"timestamp":"2026-01-01T00:00:00Z","coveragePercentage":"{percentage}","totalLines":100,"coveredLines":80,"commit":"{commit}"}}"#
    )
}
