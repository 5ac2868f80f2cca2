use assert_fs::TempDir;
use predicates::prelude::predicate;
use pretty_assertions::assert_eq;
use rstest::rstest;

mod common;

use common::command::{
    head_oid, init_repository_dir, read_ref, run_rvs_command, rvs_commit, stdout_of,
};
use common::file::{FileSpec, read_file, write_file};
use std::path::{Path, PathBuf};

fn add_worktree(main: &Path, parent: &TempDir, name: &str, start: &str) -> PathBuf {
    let wt_path = parent.path().join(name);
    run_rvs_command(
        main,
        &["worktree", "add", wt_path.to_str().unwrap(), start],
    )
    .assert()
    .success();

    wt_path
}

#[rstest]
fn linked_worktree_shares_history_but_isolates_head(init_repository_dir: TempDir) {
    let main = init_repository_dir;
    let wt_parent = TempDir::new().unwrap();
    run_rvs_command(main.path(), &["branch", "feature"])
        .assert()
        .success();
    let main_head_before = head_oid(main.path());

    let wt = add_worktree(main.path(), &wt_parent, "wt", "feature");

    // the linked worktree's `.rvs` is a pointer file, not a directory
    assert!(wt.join(".rvs").is_file());
    let pointer = read_file(&wt.join(".rvs"));
    assert!(pointer.starts_with("rvsdir: "));

    // the checked-out content matches the start point
    assert_eq!(read_file(&wt.join("1.txt")), "one\n");

    // a commit made in the worktree advances refs/heads/feature in the
    // main repository
    write_file(FileSpec::new(wt.join("wt.txt"), "from wt\n".to_string()));
    run_rvs_command(&wt, &["add", "wt.txt"]).assert().success();
    rvs_commit(&wt, "worktree commit").assert().success();

    let feature_oid = read_ref(main.path(), "refs/heads/feature");
    assert_ne!(feature_oid, main_head_before);

    // while the main worktree's HEAD and index are untouched
    assert_eq!(head_oid(main.path()), main_head_before);
    run_rvs_command(main.path(), &["status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("nothing to commit, working tree clean"));
}

#[rstest]
fn worktree_list_shows_every_checkout(init_repository_dir: TempDir) {
    let main = init_repository_dir;
    let wt_parent = TempDir::new().unwrap();
    run_rvs_command(main.path(), &["branch", "feature"])
        .assert()
        .success();
    let wt = add_worktree(main.path(), &wt_parent, "listed-wt", "feature");

    let listing = stdout_of(&mut run_rvs_command(main.path(), &["worktree", "list"]));

    assert!(listing.contains(&main.path().display().to_string()));
    assert!(listing.contains(&wt.display().to_string()));
    assert!(listing.contains("[main]"));
    assert!(listing.contains("[feature]"));
}

#[rstest]
fn checked_out_branches_are_exclusive_across_worktrees(init_repository_dir: TempDir) {
    let main = init_repository_dir;
    let wt_parent = TempDir::new().unwrap();
    run_rvs_command(main.path(), &["branch", "feature"])
        .assert()
        .success();
    add_worktree(main.path(), &wt_parent, "exclusive-wt", "feature");

    run_rvs_command(main.path(), &["checkout", "feature"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("already checked out"));
}

#[rstest]
fn locked_worktrees_resist_removal(init_repository_dir: TempDir) {
    let main = init_repository_dir;
    let wt_parent = TempDir::new().unwrap();
    run_rvs_command(main.path(), &["branch", "feature"])
        .assert()
        .success();
    let wt = add_worktree(main.path(), &wt_parent, "locked-wt", "feature");
    let wt_arg = wt.to_str().unwrap().to_string();

    run_rvs_command(main.path(), &["worktree", "lock", &wt_arg])
        .assert()
        .success();
    run_rvs_command(main.path(), &["worktree", "remove", &wt_arg])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("locked"));
    assert!(wt.exists());

    run_rvs_command(main.path(), &["worktree", "unlock", &wt_arg])
        .assert()
        .success();
    run_rvs_command(main.path(), &["worktree", "remove", &wt_arg])
        .assert()
        .success();
    assert!(!wt.exists());
}

#[rstest]
fn prune_drops_stale_registrations(init_repository_dir: TempDir) {
    let main = init_repository_dir;
    let wt_parent = TempDir::new().unwrap();
    run_rvs_command(main.path(), &["branch", "feature"])
        .assert()
        .success();
    let wt = add_worktree(main.path(), &wt_parent, "stale-wt", "feature");

    std::fs::remove_dir_all(&wt).unwrap();
    run_rvs_command(main.path(), &["worktree", "prune"])
        .assert()
        .success();

    let listing = stdout_of(&mut run_rvs_command(main.path(), &["worktree", "list"]));
    assert!(!listing.contains("stale-wt"));
}

#[rstest]
fn detached_worktree_status_mentions_no_branch(init_repository_dir: TempDir) {
    let main = init_repository_dir;
    let wt_parent = TempDir::new().unwrap();
    let oid = head_oid(main.path());

    let wt = add_worktree(main.path(), &wt_parent, "detached-wt", &oid[..10]);

    run_rvs_command(&wt, &["status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Not currently on any branch."));
}
