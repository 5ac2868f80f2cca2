use assert_fs::TempDir;
use predicates::prelude::predicate;
use rstest::rstest;

mod common;

use common::command::{repository_dir, run_rvs_command};

#[rstest]
fn init_creates_the_repository_layout(repository_dir: TempDir) {
    run_rvs_command(repository_dir.path(), &["init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized empty RVS repository in"));

    let rvs = repository_dir.path().join(".rvs");
    assert!(rvs.is_dir());
    assert!(rvs.join("objects").is_dir());
    assert!(rvs.join("objects/info").is_dir());
    assert!(rvs.join("objects/pack").is_dir());
    assert!(rvs.join("refs/heads").is_dir());
    assert!(rvs.join("refs/tags").is_dir());
    assert!(rvs.join("config").is_file());
    assert!(rvs.join("description").is_file());

    let head = std::fs::read_to_string(rvs.join("HEAD")).unwrap();
    assert_eq!(head.trim(), "ref: refs/heads/main");
}

#[rstest]
fn reinitializing_is_reported_and_harmless(repository_dir: TempDir) {
    run_rvs_command(repository_dir.path(), &["init"])
        .assert()
        .success();

    run_rvs_command(repository_dir.path(), &["init"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Reinitialized existing RVS repository in",
        ));
}

#[rstest]
fn commands_outside_a_repository_fail_fatally(repository_dir: TempDir) {
    run_rvs_command(repository_dir.path(), &["status"])
        .assert()
        .code(128)
        .stderr(predicate::str::contains("not a rvs repository"));
}
