use assert_fs::TempDir;
use predicates::prelude::predicate;
use pretty_assertions::assert_eq;
use rstest::rstest;

mod common;

use common::command::{repository_dir, run_rvs_command, stdout_of};
use common::file::{FileSpec, write_file};

#[rstest]
fn add_single_file_stores_its_blob(repository_dir: TempDir) {
    run_rvs_command(repository_dir.path(), &["init"])
        .assert()
        .success();
    write_file(FileSpec::new(
        repository_dir.path().join("hello.txt"),
        "Hello\n".to_string(),
    ));

    run_rvs_command(repository_dir.path(), &["add", "hello.txt"])
        .assert()
        .success();

    // the blob of "Hello\n" has a well-known object id
    let object_path = repository_dir
        .path()
        .join(".rvs/objects/ce/013625030ba8dba906f756967f9e9ca394464a");
    assert!(object_path.is_file());

    let listed = stdout_of(&mut run_rvs_command(repository_dir.path(), &["ls-files"]));
    assert_eq!(listed, "hello.txt\n");
}

#[rstest]
fn add_directory_recurses_into_nested_files(repository_dir: TempDir) {
    run_rvs_command(repository_dir.path(), &["init"])
        .assert()
        .success();
    write_file(FileSpec::new(
        repository_dir.path().join("src/deep/inner.txt"),
        "inner\n".to_string(),
    ));
    write_file(FileSpec::new(
        repository_dir.path().join("src/top.txt"),
        "top\n".to_string(),
    ));

    run_rvs_command(repository_dir.path(), &["add", "src"])
        .assert()
        .success();

    let listed = stdout_of(&mut run_rvs_command(repository_dir.path(), &["ls-files"]));
    assert_eq!(listed, "src/deep/inner.txt\nsrc/top.txt\n");
}

#[rstest]
fn add_normalizes_redundant_path_segments(repository_dir: TempDir) {
    run_rvs_command(repository_dir.path(), &["init"])
        .assert()
        .success();
    std::fs::create_dir_all(repository_dir.path().join("sub")).unwrap();
    write_file(FileSpec::new(
        repository_dir.path().join("a.txt"),
        "content\n".to_string(),
    ));

    run_rvs_command(repository_dir.path(), &["add", "./sub/../a.txt"])
        .assert()
        .success();

    // the path appears exactly once, in normalized form
    let listed = stdout_of(&mut run_rvs_command(repository_dir.path(), &["ls-files"]));
    assert_eq!(listed, "a.txt\n");
}

#[rstest]
fn adding_an_unchanged_file_leaves_the_index_byte_identical(repository_dir: TempDir) {
    run_rvs_command(repository_dir.path(), &["init"])
        .assert()
        .success();
    write_file(FileSpec::new(
        repository_dir.path().join("stable.txt"),
        "same\n".to_string(),
    ));

    run_rvs_command(repository_dir.path(), &["add", "stable.txt"])
        .assert()
        .success();
    let before = std::fs::read(repository_dir.path().join(".rvs/index")).unwrap();

    run_rvs_command(repository_dir.path(), &["add", "stable.txt"])
        .assert()
        .success();
    let after = std::fs::read(repository_dir.path().join(".rvs/index")).unwrap();

    assert_eq!(before, after);
}

#[rstest]
fn add_refuses_paths_outside_the_worktree(repository_dir: TempDir) {
    run_rvs_command(repository_dir.path(), &["init"])
        .assert()
        .success();

    run_rvs_command(repository_dir.path(), &["add", "../escape.txt"])
        .assert()
        .code(128)
        .stderr(predicate::str::contains("outside repository"));
}

#[rstest]
fn add_respects_ignore_patterns(repository_dir: TempDir) {
    run_rvs_command(repository_dir.path(), &["init"])
        .assert()
        .success();
    write_file(FileSpec::new(
        repository_dir.path().join(".rvsignore"),
        "*.log\n".to_string(),
    ));
    write_file(FileSpec::new(
        repository_dir.path().join("kept.txt"),
        "kept\n".to_string(),
    ));
    write_file(FileSpec::new(
        repository_dir.path().join("debug.log"),
        "noise\n".to_string(),
    ));

    run_rvs_command(repository_dir.path(), &["add", "."])
        .assert()
        .success();

    let listed = stdout_of(&mut run_rvs_command(repository_dir.path(), &["ls-files"]));
    assert_eq!(listed, ".rvsignore\nkept.txt\n");
}
