use assert_fs::TempDir;
use predicates::prelude::predicate;
use pretty_assertions::assert_eq;
use rstest::rstest;

mod common;

use common::command::{head_oid, init_repository_dir, read_ref, run_rvs_command, rvs_commit};
use common::file::{FileSpec, read_file, write_file};

#[rstest]
fn switching_branches_materializes_their_trees(init_repository_dir: TempDir) {
    let dir = init_repository_dir;

    run_rvs_command(dir.path(), &["checkout", "-b", "topic"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Switched to a new branch 'topic'"));

    write_file(FileSpec::new(
        dir.path().join("topic-only.txt"),
        "topic\n".to_string(),
    ));
    run_rvs_command(dir.path(), &["add", "topic-only.txt"])
        .assert()
        .success();
    rvs_commit(dir.path(), "topic work").assert().success();

    run_rvs_command(dir.path(), &["checkout", "main"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Switched to branch 'main'"));
    assert!(!dir.path().join("topic-only.txt").exists());

    run_rvs_command(dir.path(), &["checkout", "topic"])
        .assert()
        .success();
    assert_eq!(read_file(&dir.path().join("topic-only.txt")), "topic\n");
}

#[rstest]
fn detached_checkout_stores_the_oid_in_head(init_repository_dir: TempDir) {
    let dir = init_repository_dir;
    let commit_oid = head_oid(dir.path());

    run_rvs_command(dir.path(), &["checkout", "--detach", "HEAD"])
        .assert()
        .success();

    // HEAD now holds the oid directly
    assert_eq!(read_ref(dir.path(), "HEAD"), commit_oid);

    run_rvs_command(dir.path(), &["status"])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!(
            "HEAD detached at {}",
            &commit_oid[..7]
        )));
}

#[rstest]
fn plain_revision_checkout_detaches_with_a_notice(init_repository_dir: TempDir) {
    let dir = init_repository_dir;
    let commit_oid = head_oid(dir.path());

    run_rvs_command(dir.path(), &["checkout", &commit_oid[..10]])
        .assert()
        .success()
        .stderr(predicate::str::contains("detached HEAD"));

    assert_eq!(read_ref(dir.path(), "HEAD"), commit_oid);
}

#[rstest]
fn checkout_refuses_to_overwrite_local_changes(init_repository_dir: TempDir) {
    let dir = init_repository_dir;

    run_rvs_command(dir.path(), &["checkout", "-b", "topic"])
        .assert()
        .success();
    write_file(FileSpec::new(
        dir.path().join("1.txt"),
        "topic version\n".to_string(),
    ));
    run_rvs_command(dir.path(), &["add", "1.txt"]).assert().success();
    rvs_commit(dir.path(), "change 1.txt").assert().success();

    run_rvs_command(dir.path(), &["checkout", "main"])
        .assert()
        .success();

    // dirty local edit to the file the switch would rewrite
    write_file(FileSpec::new(
        dir.path().join("1.txt"),
        "uncommitted\n".to_string(),
    ));

    run_rvs_command(dir.path(), &["checkout", "topic"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains(
            "Your local changes to the following files would be overwritten by checkout:",
        ))
        .stderr(predicate::str::contains("1.txt"));

    // nothing moved
    assert_eq!(read_file(&dir.path().join("1.txt")), "uncommitted\n");
    assert_eq!(read_ref(dir.path(), "HEAD"), "ref: refs/heads/main");
}

#[rstest]
fn checkout_paths_restores_files_without_moving_head(init_repository_dir: TempDir) {
    let dir = init_repository_dir;
    let before = head_oid(dir.path());

    write_file(FileSpec::new(
        dir.path().join("1.txt"),
        "scribbled\n".to_string(),
    ));

    run_rvs_command(dir.path(), &["checkout", "HEAD", "--", "1.txt"])
        .assert()
        .success();

    assert_eq!(read_file(&dir.path().join("1.txt")), "one\n");
    assert_eq!(head_oid(dir.path()), before);
}

#[rstest]
fn unknown_revision_fails_fatally(init_repository_dir: TempDir) {
    run_rvs_command(init_repository_dir.path(), &["checkout", "does-not-exist"])
        .assert()
        .code(128)
        .stderr(predicate::str::contains("unknown revision"));
}
