mod common;

use chrono::TimeZone;
use common::{snapshot_line, FakeGit, FakeRemote};
use covtrack::baseline::{BaselineManager, BaselineOutcome};
use covtrack::model::CoverageTotals;
use covtrack::notes::NotesStore;
use covtrack::retry::PushOutcome;
use covtrack::snapshot::Snapshot;
use pretty_assertions::assert_eq;

const NS: &str = "coverage";

fn manager(git: FakeGit) -> BaselineManager<FakeGit> {
    BaselineManager::new(NotesStore::new(git, "origin"))
}

fn load(manager: &BaselineManager<FakeGit>, lookback: usize) -> BaselineOutcome {
    manager.load_baseline(NS, "main", lookback).unwrap()
}

#[test]
fn no_history_without_remote_ref() {
    let m = manager(FakeGit::new(5));
    assert_eq!(load(&m, 50), BaselineOutcome::NoHistory);
    assert_eq!(m.store().git().count_calls("merge-base"), 0);
}

#[test]
fn no_merge_base_with_unrelated_history() {
    let git = FakeGit::new(5).merge_base_at(None);
    git.remote()
        .set_note(NS, &git.commit(2), &snapshot_line(&git.commit(2), "70.00"));
    assert_eq!(load(&manager(git), 50), BaselineOutcome::NoMergeBase);
}

#[test]
fn found_at_merge_base() {
    let git = FakeGit::new(10).merge_base_at(Some(7));
    let base = git.commit(7);
    git.remote().set_note(NS, &base, &snapshot_line(&base, "82.50"));
    let m = manager(git);

    match load(&m, 50) {
        BaselineOutcome::Found {
            snapshot,
            commit,
            searched_commits,
        } => {
            assert_eq!(commit, base);
            assert_eq!(searched_commits, 1);
            assert_eq!(snapshot.coverage_percentage, "82.50");
        }
        other => panic!("expected a baseline, got {other:?}"),
    }
    assert_eq!(m.store().git().count_calls("rev-list"), 0);
}

#[test]
fn searches_ancestors_of_merge_base() {
    let git = FakeGit::new(10).merge_base_at(Some(7));
    let target = git.commit(4);
    let remote = git.remote();
    remote.set_note(NS, &target, &snapshot_line(&target, "75.00"));
    // Newer than the merge-base: never considered.
    remote.set_note(NS, &git.commit(9), &snapshot_line(&git.commit(9), "99.00"));
    let m = manager(git);

    match load(&m, 50) {
        BaselineOutcome::Found {
            commit,
            searched_commits,
            ..
        } => {
            assert_eq!(commit, target);
            assert_eq!(searched_commits, 4);
        }
        other => panic!("expected a baseline, got {other:?}"),
    }
}

#[test]
fn lookback_bounds_the_search() {
    let git = FakeGit::new(10).merge_base_at(Some(7));
    let base = git.commit(7);
    let target = git.commit(4);
    git.remote()
        .set_note(NS, &target, &snapshot_line(&target, "75.00"));
    let m = manager(git);

    assert_eq!(
        load(&m, 2),
        BaselineOutcome::NoBaseline {
            merge_base: base,
            searched_commits: 3,
        }
    );
    assert!(matches!(load(&m, 3), BaselineOutcome::Found { .. }));
}

#[test]
fn zero_lookback_checks_only_the_merge_base() {
    let git = FakeGit::new(10).merge_base_at(Some(7));
    let base = git.commit(7);
    let parent = git.commit(6);
    git.remote()
        .set_note(NS, &parent, &snapshot_line(&parent, "75.00"));
    let m = manager(git);

    assert_eq!(
        load(&m, 0),
        BaselineOutcome::NoBaseline {
            merge_base: base,
            searched_commits: 1,
        }
    );
    assert_eq!(m.store().git().count_calls("rev-list"), 0);
}

#[test]
fn search_stops_at_root_commit() {
    let git = FakeGit::new(4).merge_base_at(Some(3));
    let base = git.commit(3);
    git.remote()
        .set_note(NS, &"f".repeat(40), &snapshot_line("unrelated", "1.00"));

    assert_eq!(
        load(&manager(git), 50),
        BaselineOutcome::NoBaseline {
            merge_base: base,
            searched_commits: 4,
        }
    );
}

#[test]
fn empty_note_is_a_parse_error() {
    let git = FakeGit::new(4);
    let head = git.head();
    git.remote().set_note(NS, &head, "\n");

    assert!(matches!(
        load(&manager(git), 50),
        BaselineOutcome::ParseError { commit, .. } if commit == head
    ));
}

#[test]
fn corrupt_snapshot_stops_the_search() {
    let git = FakeGit::new(10).merge_base_at(Some(7));
    let corrupt = git.commit(6);
    let remote = git.remote();
    remote.set_note(NS, &corrupt, "{not json");
    remote.set_note(NS, &git.commit(5), &snapshot_line(&git.commit(5), "75.00"));

    match load(&manager(git), 50) {
        BaselineOutcome::ParseError { commit, .. } => assert_eq!(commit, corrupt),
        other => panic!("expected a parse error, got {other:?}"),
    }
}

#[test]
fn only_the_first_note_line_counts() {
    let git = FakeGit::new(3);
    let head = git.head();
    let note = format!(
        "{}\n{}",
        snapshot_line(&head, "90.00"),
        snapshot_line(&head, "10.00")
    );
    git.remote().set_note(NS, &head, &note);

    let outcome = load(&manager(git), 50);
    assert_eq!(
        outcome.snapshot().map(|s| s.coverage_percentage.as_str()),
        Some("90.00")
    );
}

#[test]
fn stored_snapshot_becomes_baseline_for_another_clone() {
    let remote = FakeRemote::new();
    let writer_git = FakeGit::with_remote(6, remote.clone());
    let head = writer_git.head();
    let mut writer = manager(writer_git);

    let totals = CoverageTotals {
        total_files: 2,
        total_lines: 40,
        covered_lines: 30,
    };
    let at = chrono::Utc.with_ymd_and_hms(2026, 2, 1, 9, 30, 0).unwrap();
    let snapshot = Snapshot::new(head.clone(), &totals, at);
    let outcome = writer.store_snapshot(&snapshot, NS, 3).unwrap();
    assert_eq!(outcome, PushOutcome::Pushed { attempts: 1 });

    let reader = manager(FakeGit::with_remote(6, remote));
    match load(&reader, 50) {
        BaselineOutcome::Found {
            snapshot: found,
            commit,
            ..
        } => {
            assert_eq!(commit, head);
            assert_eq!(found, snapshot);
        }
        other => panic!("expected a baseline, got {other:?}"),
    }
}

#[test]
fn store_snapshot_keeps_previous_lines() {
    let git = FakeGit::new(3);
    let head = git.head();
    let remote = git.remote();
    remote.set_note(NS, &head, &snapshot_line(&head, "50.00"));
    let mut m = manager(git);

    let totals = CoverageTotals {
        total_files: 1,
        total_lines: 4,
        covered_lines: 3,
    };
    let at = chrono::Utc.with_ymd_and_hms(2026, 2, 1, 9, 30, 0).unwrap();
    m.store_snapshot(&Snapshot::new(head.clone(), &totals, at), NS, 3)
        .unwrap();

    let note = remote.note(NS, &head).unwrap();
    let lines: Vec<&str> = note.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("\"coveragePercentage\":\"75.00\""));
    assert!(lines[1].contains("\"coveragePercentage\":\"50.00\""));
}

#[test]
fn store_snapshot_reports_exhaustion() {
    let git = FakeGit::new(3);
    let head = git.head();
    let remote = git.remote();
    remote.set_note(NS, &git.commit(0), &snapshot_line(&git.commit(0), "50.00"));
    remote.reject_next_pushes(u32::MAX);
    let mut m = manager(git);

    let totals = CoverageTotals {
        total_files: 1,
        total_lines: 4,
        covered_lines: 3,
    };
    let at = chrono::Utc.with_ymd_and_hms(2026, 2, 1, 9, 30, 0).unwrap();
    let outcome = m
        .store_snapshot(&Snapshot::new(head.clone(), &totals, at), NS, 2)
        .unwrap();

    assert_eq!(outcome, PushOutcome::Exhausted { attempts: 2 });
    assert_eq!(remote.note(NS, &head), None);
}

#[test]
fn history_is_oldest_first_and_skips_corrupt_notes() {
    let git = FakeGit::new(6);
    let remote = git.remote();
    for (index, pct) in [(1, "70.00"), (3, "75.00"), (5, "80.00")] {
        let commit = git.commit(index);
        remote.set_note(NS, &commit, &snapshot_line(&commit, pct));
    }
    remote.set_note(NS, &git.commit(4), "garbage");
    let m = manager(git);
    assert!(m.store().fetch(NS).unwrap());

    let all: Vec<String> = m
        .collect_history("HEAD", NS, 10)
        .unwrap()
        .into_iter()
        .map(|s| s.coverage_percentage)
        .collect();
    assert_eq!(all, vec!["70.00", "75.00", "80.00"]);

    let latest: Vec<String> = m
        .collect_history("HEAD", NS, 2)
        .unwrap()
        .into_iter()
        .map(|s| s.coverage_percentage)
        .collect();
    assert_eq!(latest, vec!["75.00", "80.00"]);

    assert!(m.collect_history("HEAD", NS, 0).unwrap().is_empty());
}
