use assert_fs::TempDir;
use predicates::prelude::predicate;
use pretty_assertions::assert_eq;
use rstest::rstest;

mod common;

use common::command::{
    head_oid, init_repository_dir, repository_dir, run_rvs_command, rvs_commit, stdout_of,
};
use common::file::{FileSpec, write_file};

#[rstest]
fn unstaged_modification_produces_a_unified_hunk(init_repository_dir: TempDir) {
    let dir = init_repository_dir;
    write_file(FileSpec::new(
        dir.path().join("1.txt"),
        "uno\n".to_string(),
    ));

    let diff = stdout_of(&mut run_rvs_command(dir.path(), &["diff"]));

    assert!(diff.contains("diff --git a/1.txt b/1.txt"));
    assert!(diff.contains("--- a/1.txt"));
    assert!(diff.contains("+++ b/1.txt"));
    assert!(diff.contains("@@ -1 +1 @@"));
    assert!(diff.contains("-one"));
    assert!(diff.contains("+uno"));
}

#[rstest]
fn clean_worktree_produces_no_diff(init_repository_dir: TempDir) {
    let diff = stdout_of(&mut run_rvs_command(init_repository_dir.path(), &["diff"]));
    assert_eq!(diff, "");
}

#[rstest]
fn cached_diff_compares_index_against_head(init_repository_dir: TempDir) {
    let dir = init_repository_dir;
    write_file(FileSpec::new(
        dir.path().join("staged.txt"),
        "staged\n".to_string(),
    ));
    run_rvs_command(dir.path(), &["add", "staged.txt"])
        .assert()
        .success();

    // the plain diff is silent, the cached diff shows the addition
    assert_eq!(stdout_of(&mut run_rvs_command(dir.path(), &["diff"])), "");

    let cached = stdout_of(&mut run_rvs_command(dir.path(), &["diff", "--cached"]));
    assert!(cached.contains("diff --git a/staged.txt b/staged.txt"));
    assert!(cached.contains("new file mode 100644"));
    assert!(cached.contains("+staged"));
}

#[rstest]
fn diff_against_revision_compares_the_worktree(init_repository_dir: TempDir) {
    let dir = init_repository_dir;
    write_file(FileSpec::new(
        dir.path().join("1.txt"),
        "working copy\n".to_string(),
    ));

    let diff = stdout_of(&mut run_rvs_command(dir.path(), &["diff", "HEAD"]));

    assert!(diff.contains("-one"));
    assert!(diff.contains("+working copy"));
}

#[rstest]
fn path_filter_limits_the_diff(init_repository_dir: TempDir) {
    let dir = init_repository_dir;
    write_file(FileSpec::new(dir.path().join("1.txt"), "x\n".to_string()));
    write_file(FileSpec::new(
        dir.path().join("a/2.txt"),
        "y\n".to_string(),
    ));

    let diff = stdout_of(&mut run_rvs_command(dir.path(), &["diff", "--", "a"]));

    assert!(diff.contains("a/2.txt"));
    assert!(!diff.contains("1.txt"));
}

#[rstest]
fn binary_contents_short_circuit(init_repository_dir: TempDir) {
    let dir = init_repository_dir;
    std::fs::write(dir.path().join("1.txt"), b"\x00\x01\x02binary").unwrap();

    let diff = stdout_of(&mut run_rvs_command(dir.path(), &["diff"]));

    assert!(diff.contains("Binary files a/1.txt and b/1.txt differ"));
    assert!(!diff.contains("@@"));
}

#[rstest]
fn diff_tree_lists_changes_between_commit_and_parent(init_repository_dir: TempDir) {
    let dir = init_repository_dir;
    write_file(FileSpec::new(
        dir.path().join("1.txt"),
        "changed\n".to_string(),
    ));
    write_file(FileSpec::new(
        dir.path().join("added.txt"),
        "added\n".to_string(),
    ));
    std::fs::remove_file(dir.path().join("a/2.txt")).unwrap();
    run_rvs_command(dir.path(), &["add", "."]).assert().success();
    rvs_commit(dir.path(), "mixed change").assert().success();

    let oid = head_oid(dir.path());
    let output = stdout_of(&mut run_rvs_command(
        dir.path(),
        &["diff-tree", "-r", "--name-status", &oid],
    ));

    let mut lines: Vec<&str> = output.lines().collect();
    assert_eq!(lines.remove(0), oid.as_str());
    assert_eq!(lines, vec!["M\t1.txt", "D\ta/2.txt", "A\tadded.txt"]);
}

#[rstest]
fn diff_tree_no_commit_id_omits_the_header_line(init_repository_dir: TempDir) {
    let dir = init_repository_dir;
    write_file(FileSpec::new(
        dir.path().join("1.txt"),
        "changed\n".to_string(),
    ));
    run_rvs_command(dir.path(), &["add", "."]).assert().success();
    rvs_commit(dir.path(), "change").assert().success();

    let output = stdout_of(&mut run_rvs_command(
        dir.path(),
        &["diff-tree", "-r", "--name-status", "--no-commit-id", "HEAD"],
    ));

    assert_eq!(output, "M\t1.txt\n");
}

#[rstest]
fn show_prints_commit_header_and_patch(repository_dir: TempDir) {
    let dir = repository_dir;
    run_rvs_command(dir.path(), &["init"]).assert().success();
    write_file(FileSpec::new(
        dir.path().join("only.txt"),
        "only\n".to_string(),
    ));
    run_rvs_command(dir.path(), &["add", "."]).assert().success();
    rvs_commit(dir.path(), "root with file").assert().success();

    let output = stdout_of(&mut run_rvs_command(dir.path(), &["show", "HEAD"]));

    assert!(output.contains("commit "));
    assert!(output.contains("    root with file"));
    // a root commit diffs against the empty tree
    assert!(output.contains("new file mode 100644"));
    assert!(output.contains("+only"));
}

#[rstest]
fn show_name_status_lists_changed_paths(init_repository_dir: TempDir) {
    let dir = init_repository_dir;
    write_file(FileSpec::new(
        dir.path().join("1.txt"),
        "changed\n".to_string(),
    ));
    run_rvs_command(dir.path(), &["add", "."]).assert().success();
    rvs_commit(dir.path(), "change 1").assert().success();

    run_rvs_command(dir.path(), &["show", "HEAD", "--name-status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("M\t1.txt"));
}

#[rstest]
fn show_stat_summarizes_the_change(init_repository_dir: TempDir) {
    let dir = init_repository_dir;
    write_file(FileSpec::new(
        dir.path().join("1.txt"),
        "changed\n".to_string(),
    ));
    run_rvs_command(dir.path(), &["add", "."]).assert().success();
    rvs_commit(dir.path(), "change 1").assert().success();

    run_rvs_command(dir.path(), &["show", "HEAD", "--stat"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1.txt | 2 +-"))
        .stdout(predicate::str::contains(
            "1 file changed, 1 insertion(+), 1 deletion(-)",
        ));
}
