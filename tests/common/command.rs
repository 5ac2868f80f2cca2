use crate::common::file::{FileSpec, write_file};
use assert_cmd::Command;
use assert_fs::TempDir;
use derive_new::new;
use rstest::fixture;
use std::path::Path;

#[fixture]
pub fn repository_dir() -> TempDir {
    TempDir::new().expect("failed to create temp dir")
}

/// A repository with three committed files: `1.txt`, `a/2.txt` and
/// `a/b/3.txt`.
#[fixture]
pub fn init_repository_dir(repository_dir: TempDir) -> TempDir {
    run_rvs_command(repository_dir.path(), &["init"])
        .assert()
        .success();

    write_file(FileSpec::new(
        repository_dir.path().join("1.txt"),
        "one\n".to_string(),
    ));
    write_file(FileSpec::new(
        repository_dir.path().join("a").join("2.txt"),
        "two\n".to_string(),
    ));
    write_file(FileSpec::new(
        repository_dir.path().join("a").join("b").join("3.txt"),
        "three\n".to_string(),
    ));

    run_rvs_command(repository_dir.path(), &["add", "."])
        .assert()
        .success();
    rvs_commit(repository_dir.path(), "Initial commit")
        .assert()
        .success();

    repository_dir
}

pub fn run_rvs_command(dir: &Path, args: &[&str]) -> Command {
    let mut cmd = Command::cargo_bin("rvs").expect("failed to find rvs binary");
    cmd.current_dir(dir);
    for arg in args {
        cmd.arg(arg);
    }
    cmd
}

#[derive(Debug, Clone, new)]
pub struct TestAuthor {
    pub name: String,
    pub email: String,
}

pub fn generate_author() -> TestAuthor {
    use fake::Fake;
    use fake::faker::internet::en::FreeEmail;
    use fake::faker::name::en::Name;

    let name = Name().fake::<String>().replace(' ', "_");
    let email = FreeEmail().fake::<String>();
    TestAuthor::new(name, email)
}

pub fn rvs_commit(dir: &Path, message: &str) -> Command {
    let author = generate_author();
    let mut cmd = run_rvs_command(dir, &["commit", "-m", message]);
    cmd.envs(vec![
        ("RVS_AUTHOR_NAME", author.name.as_str()),
        ("RVS_AUTHOR_EMAIL", author.email.as_str()),
    ]);
    cmd
}

/// Current oid of a ref, read straight from the repository layout.
pub fn read_ref(dir: &Path, reference: &str) -> String {
    let content = std::fs::read_to_string(dir.join(".rvs").join(reference))
        .unwrap_or_else(|e| panic!("failed to read ref {}: {}", reference, e));
    content.trim().to_string()
}

pub fn head_oid(dir: &Path) -> String {
    let head = read_ref(dir, "HEAD");
    match head.strip_prefix("ref: ") {
        Some(target) => read_ref(dir, target),
        None => head,
    }
}

pub fn stdout_of(cmd: &mut Command) -> String {
    let output = cmd.assert().success();
    String::from_utf8(output.get_output().stdout.clone()).expect("stdout is valid UTF-8")
}
