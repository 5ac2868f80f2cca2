use assert_fs::TempDir;
use predicates::prelude::predicate;
use pretty_assertions::assert_eq;
use rstest::rstest;

mod common;

use common::command::{init_repository_dir, run_rvs_command, stdout_of};
use common::file::{FileSpec, read_file, write_file};

#[rstest]
fn push_saves_changes_and_cleans_the_worktree(init_repository_dir: TempDir) {
    let dir = init_repository_dir;
    write_file(FileSpec::new(
        dir.path().join("1.txt"),
        "dirty\n".to_string(),
    ));

    run_rvs_command(dir.path(), &["stash", "push"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Saved working directory and index state WIP on main:",
        ));

    // the worktree is back at HEAD
    assert_eq!(read_file(&dir.path().join("1.txt")), "one\n");
    run_rvs_command(dir.path(), &["status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("nothing to commit, working tree clean"));

    let listing = stdout_of(&mut run_rvs_command(dir.path(), &["stash", "list"]));
    assert!(listing.starts_with("stash@{0}: WIP on main:"));
}

#[rstest]
fn push_with_message_labels_the_entry(init_repository_dir: TempDir) {
    let dir = init_repository_dir;
    write_file(FileSpec::new(
        dir.path().join("1.txt"),
        "dirty\n".to_string(),
    ));

    run_rvs_command(dir.path(), &["stash", "push", "-m", "wip on parser"])
        .assert()
        .success();

    let listing = stdout_of(&mut run_rvs_command(dir.path(), &["stash", "list"]));
    assert_eq!(listing, "stash@{0}: On main: wip on parser\n");
}

#[rstest]
fn push_without_changes_saves_nothing(init_repository_dir: TempDir) {
    run_rvs_command(init_repository_dir.path(), &["stash", "push"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No local changes to save"));

    let listing = stdout_of(&mut run_rvs_command(
        init_repository_dir.path(),
        &["stash", "list"],
    ));
    assert_eq!(listing, "");
}

#[rstest]
fn pop_reinstates_the_change_unstaged_and_drops_the_entry(init_repository_dir: TempDir) {
    let dir = init_repository_dir;
    write_file(FileSpec::new(
        dir.path().join("1.txt"),
        "stashed edit\n".to_string(),
    ));

    run_rvs_command(dir.path(), &["stash", "push"])
        .assert()
        .success();
    run_rvs_command(dir.path(), &["stash", "pop"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Dropped refs/stash@{0}"));

    // the edit is back, as an unstaged modification
    assert_eq!(read_file(&dir.path().join("1.txt")), "stashed edit\n");
    let status = stdout_of(&mut run_rvs_command(dir.path(), &["status", "--short"]));
    assert_eq!(status, " M 1.txt\n");

    // the stack is empty again
    let listing = stdout_of(&mut run_rvs_command(dir.path(), &["stash", "list"]));
    assert_eq!(listing, "");
}

#[rstest]
fn apply_keeps_the_entry_on_the_stack(init_repository_dir: TempDir) {
    let dir = init_repository_dir;
    write_file(FileSpec::new(
        dir.path().join("1.txt"),
        "kept around\n".to_string(),
    ));

    run_rvs_command(dir.path(), &["stash", "push"])
        .assert()
        .success();
    run_rvs_command(dir.path(), &["stash", "apply"])
        .assert()
        .success();

    assert_eq!(read_file(&dir.path().join("1.txt")), "kept around\n");
    let listing = stdout_of(&mut run_rvs_command(dir.path(), &["stash", "list"]));
    assert!(listing.starts_with("stash@{0}:"));
}

#[rstest]
fn drop_removes_an_entry_without_applying_it(init_repository_dir: TempDir) {
    let dir = init_repository_dir;
    write_file(FileSpec::new(
        dir.path().join("1.txt"),
        "dropped edit\n".to_string(),
    ));

    run_rvs_command(dir.path(), &["stash", "push"])
        .assert()
        .success();
    run_rvs_command(dir.path(), &["stash", "drop"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Dropped stash@{0}"));

    // the worktree stays clean, the edit is gone
    assert_eq!(read_file(&dir.path().join("1.txt")), "one\n");
    let listing = stdout_of(&mut run_rvs_command(dir.path(), &["stash", "list"]));
    assert_eq!(listing, "");
}

#[rstest]
fn stash_survives_version_header_round_trip(init_repository_dir: TempDir) {
    let dir = init_repository_dir;
    write_file(FileSpec::new(
        dir.path().join("1.txt"),
        "layered\n".to_string(),
    ));
    run_rvs_command(dir.path(), &["stash", "push"])
        .assert()
        .success();

    // the on-disk stack is versioned
    let stash_file = read_file(&dir.path().join(".rvs/stash"));
    assert!(stash_file.starts_with("rvs-stash 1\n"));
}
