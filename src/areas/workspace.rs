//! Working tree adapter
//!
//! File system access for everything under the worktree root: path
//! normalization, directory scans, blob hashing and materialization.
//! The `.rvs` entry is invisible to every scan and refused as a write
//! target, and `.rvsignore` patterns filter untracked enumeration.

use crate::artifacts::index::entry_mode::EntryMode;
use crate::artifacts::index::index_entry::EntryMetadata;
use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::object::Object;
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::RvsError;
use anyhow::Context;
use bytes::Bytes;
use regex::Regex;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// Metadata entry name, both the main repository directory and the
/// linked-worktree pointer file.
const METADATA_NAME: &str = ".rvs";

/// Name of the ignore file read from the worktree root.
const IGNORE_FILE: &str = ".rvsignore";

#[derive(Debug)]
pub struct Workspace {
    root: Box<Path>,
}

impl Workspace {
    pub fn new(root: Box<Path>) -> Self {
        Workspace { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Normalize a user-supplied path into the canonical worktree
    /// relative form: forward slashes, no `.`/`..` segments, no leading
    /// `./`. Rejects paths escaping the root and paths into `.rvs`.
    pub fn normalize_path(&self, input: &Path) -> anyhow::Result<PathBuf> {
        let joined = if input.is_absolute() {
            input.to_path_buf()
        } else {
            self.root.join(input)
        };

        let mut normalized = PathBuf::new();
        for component in joined.components() {
            match component {
                Component::CurDir => {}
                Component::ParentDir => {
                    if !normalized.pop() {
                        anyhow::bail!(RvsError::PathOutsideRepo(input.to_path_buf()));
                    }
                }
                other => normalized.push(other),
            }
        }

        let relative = normalized
            .strip_prefix(&self.root)
            .map_err(|_| RvsError::PathOutsideRepo(input.to_path_buf()))?
            .to_path_buf();

        if relative.components().next().is_some_and(|c| c.as_os_str() == METADATA_NAME) {
            anyhow::bail!(RvsError::PathOutsideRepo(input.to_path_buf()));
        }

        Ok(relative)
    }

    pub fn ignore(&self) -> Ignore {
        Ignore::load(&self.root)
    }

    /// All files under the given worktree-relative path (or the whole
    /// tree), relative to the root, skipping `.rvs` and ignored entries.
    pub fn list_files(&self, within: Option<&Path>) -> anyhow::Result<Vec<PathBuf>> {
        let ignore = self.ignore();
        let start = match within {
            Some(p) => self.root.join(p),
            None => self.root.to_path_buf(),
        };

        if !start.exists() {
            anyhow::bail!("pathspec '{}' did not match any files", start.display());
        }

        if start.is_file() {
            let relative = start.strip_prefix(&self.root)?.to_path_buf();
            return Ok(vec![relative]);
        }

        let mut files = Vec::new();
        let walker = WalkDir::new(&start).into_iter().filter_entry(|entry| {
            let Ok(relative) = entry.path().strip_prefix(&self.root) else {
                return true;
            };
            if relative.as_os_str().is_empty() {
                return true;
            }
            if relative.components().next().is_some_and(|c| c.as_os_str() == METADATA_NAME) {
                return false;
            }
            !ignore.is_ignored(relative, entry.path().is_dir())
        });

        for entry in walker.filter_map(|e| e.ok()) {
            if entry.path().is_file() {
                files.push(entry.path().strip_prefix(&self.root)?.to_path_buf());
            }
        }

        files.sort();
        Ok(files)
    }

    /// One directory level, worktree-relative, `.rvs` and ignored
    /// entries excluded.
    pub fn list_dir(&self, dir: Option<&Path>) -> anyhow::Result<Vec<PathBuf>> {
        let ignore = self.ignore();
        let dir_path = match dir {
            Some(p) => self.root.join(p),
            None => self.root.to_path_buf(),
        };

        if !dir_path.is_dir() {
            anyhow::bail!("not a directory: {}", dir_path.display());
        }

        let mut paths = Vec::new();
        for entry in std::fs::read_dir(&dir_path)? {
            let entry = entry?;
            let relative = entry.path().strip_prefix(&self.root)?.to_path_buf();

            if relative.components().next().is_some_and(|c| c.as_os_str() == METADATA_NAME) {
                continue;
            }
            if ignore.is_ignored(&relative, entry.path().is_dir()) {
                continue;
            }

            paths.push(relative);
        }

        paths.sort();
        Ok(paths)
    }

    pub fn file_exists(&self, path: &Path) -> bool {
        self.root.join(path).is_file()
    }

    pub fn read_file(&self, path: &Path) -> anyhow::Result<Bytes> {
        let file_path = self.root.join(path);
        let content = std::fs::read(&file_path)
            .map_err(|source| RvsError::io(file_path.clone(), source))?;

        Ok(Bytes::from(content))
    }

    pub fn stat_file(&self, path: &Path) -> anyhow::Result<EntryMetadata> {
        let file_path = self.root.join(path);
        let metadata = std::fs::metadata(&file_path)
            .map_err(|source| RvsError::io(file_path.clone(), source))?;

        (file_path.as_path(), metadata).try_into()
    }

    /// Blob oid of a working file without writing the object.
    pub fn hash_file(&self, path: &Path) -> anyhow::Result<ObjectId> {
        Blob::new(self.read_file(path)?).object_id()
    }

    /// Write blob content to a working file, creating parents and
    /// applying the executable bit where supported.
    pub fn write_file(&self, path: &Path, data: &[u8], mode: EntryMode) -> anyhow::Result<()> {
        let file_path = self.root.join(path);
        if let Some(parent) = file_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        // a directory in the way of a file is replaced wholesale
        if file_path.is_dir() {
            std::fs::remove_dir_all(&file_path)
                .with_context(|| format!("failed to replace directory {}", file_path.display()))?;
        }

        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&file_path)
            .map_err(|source| RvsError::io(file_path.clone(), source))?;
        file.write_all(data)
            .map_err(|source| RvsError::io(file_path.clone(), source))?;
        drop(file);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let bits = if mode.is_executable() { 0o755 } else { 0o644 };
            std::fs::set_permissions(&file_path, std::fs::Permissions::from_mode(bits))
                .map_err(|source| RvsError::io(file_path.clone(), source))?;
        }
        #[cfg(not(unix))]
        let _ = mode;

        Ok(())
    }

    /// Remove a working file and any directories the removal leaves
    /// empty.
    pub fn remove_file(&self, path: &Path) -> anyhow::Result<()> {
        let file_path = self.root.join(path);
        if file_path.is_file() {
            std::fs::remove_file(&file_path)
                .map_err(|source| RvsError::io(file_path.clone(), source))?;
        }
        self.prune_empty_dirs(path);

        Ok(())
    }

    pub fn make_dir(&self, path: &Path) -> anyhow::Result<()> {
        let dir_path = self.root.join(path);

        if dir_path.is_file() {
            std::fs::remove_file(&dir_path)
                .map_err(|source| RvsError::io(dir_path.clone(), source))?;
        }
        if !dir_path.exists() {
            std::fs::create_dir_all(&dir_path)
                .map_err(|source| RvsError::io(dir_path.clone(), source))?;
        }

        Ok(())
    }

    pub fn remove_dir(&self, path: &Path) -> anyhow::Result<()> {
        let dir_path = self.root.join(path);
        if dir_path.is_dir() {
            std::fs::remove_dir_all(&dir_path)
                .map_err(|source| RvsError::io(dir_path.clone(), source))?;
        }

        Ok(())
    }

    fn prune_empty_dirs(&self, path: &Path) {
        let mut parent = path.parent();
        while let Some(dir) = parent {
            if dir.as_os_str().is_empty() {
                break;
            }
            let dir_path = self.root.join(dir);
            match std::fs::read_dir(&dir_path) {
                Ok(mut entries) => {
                    if entries.next().is_none() {
                        let _ = std::fs::remove_dir(&dir_path);
                    } else {
                        break;
                    }
                }
                _ => break,
            }
            parent = dir.parent();
        }
    }
}

/// Parsed `.rvsignore` patterns.
///
/// Supported grammar is the Git subset that matters for untracked
/// enumeration: blank lines and `#` comments are skipped, `*` and `?`
/// glob within one path segment, a leading `/` anchors the pattern to
/// the worktree root, a trailing `/` restricts it to directories.
#[derive(Debug, Default)]
pub struct Ignore {
    patterns: Vec<IgnorePattern>,
}

#[derive(Debug)]
struct IgnorePattern {
    regex: Regex,
    dir_only: bool,
    anchored: bool,
}

impl Ignore {
    pub fn load(root: &Path) -> Self {
        let Ok(content) = std::fs::read_to_string(root.join(IGNORE_FILE)) else {
            return Ignore::default();
        };

        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Self {
        let patterns = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(IgnorePattern::compile)
            .collect();

        Ignore { patterns }
    }

    pub fn is_ignored(&self, path: &Path, is_dir: bool) -> bool {
        if self.patterns.is_empty() {
            return false;
        }

        // a path inside an ignored directory is ignored too
        for ancestor in path.ancestors() {
            if ancestor.as_os_str().is_empty() {
                break;
            }
            let ancestor_is_dir = is_dir || ancestor != path;
            if self
                .patterns
                .iter()
                .any(|p| p.matches(ancestor, ancestor_is_dir))
            {
                return true;
            }
        }

        false
    }
}

impl IgnorePattern {
    fn compile(line: &str) -> Option<IgnorePattern> {
        let dir_only = line.ends_with('/');
        let line = line.trim_end_matches('/');
        let anchored = line.starts_with('/') || line.chars().skip(1).any(|c| c == '/');
        let line = line.trim_start_matches('/');
        if line.is_empty() {
            return None;
        }

        let mut pattern = String::from("^");
        for c in line.chars() {
            match c {
                '*' => pattern.push_str("[^/]*"),
                '?' => pattern.push_str("[^/]"),
                c if "\\.+()|[]{}^$".contains(c) => {
                    pattern.push('\\');
                    pattern.push(c);
                }
                c => pattern.push(c),
            }
        }
        pattern.push('$');

        Regex::new(&pattern).ok().map(|regex| IgnorePattern {
            regex,
            dir_only,
            anchored,
        })
    }

    fn matches(&self, path: &Path, is_dir: bool) -> bool {
        if self.dir_only && !is_dir {
            return false;
        }

        let candidate = if self.anchored {
            path.to_string_lossy().replace('\\', "/")
        } else {
            match path.file_name() {
                Some(name) => name.to_string_lossy().into_owned(),
                None => return false,
            }
        };

        self.regex.is_match(&candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::TempDir;
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};

    #[fixture]
    fn workspace() -> (TempDir, Workspace) {
        let dir = TempDir::new().unwrap();
        let workspace = Workspace::new(dir.path().to_path_buf().into_boxed_path());
        (dir, workspace)
    }

    #[rstest]
    fn normalization_collapses_dot_segments(workspace: (TempDir, Workspace)) {
        let (_dir, workspace) = workspace;

        assert_eq!(
            workspace.normalize_path(Path::new("./sub/../a.txt")).unwrap(),
            PathBuf::from("a.txt")
        );
        assert_eq!(
            workspace.normalize_path(Path::new("a/./b/c.txt")).unwrap(),
            PathBuf::from("a/b/c.txt")
        );
    }

    #[rstest]
    fn normalization_rejects_escapes_and_metadata(workspace: (TempDir, Workspace)) {
        let (_dir, workspace) = workspace;

        assert!(workspace.normalize_path(Path::new("../outside.txt")).is_err());
        assert!(workspace.normalize_path(Path::new(".rvs/HEAD")).is_err());
        assert!(workspace.normalize_path(Path::new("a/../../b")).is_err());
    }

    #[rstest]
    fn file_scans_skip_metadata_directory(workspace: (TempDir, Workspace)) {
        let (dir, workspace) = workspace;
        std::fs::create_dir_all(dir.path().join(".rvs/objects")).unwrap();
        std::fs::write(dir.path().join(".rvs/HEAD"), "ref: refs/heads/main").unwrap();
        std::fs::create_dir_all(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("top.txt"), "top").unwrap();
        std::fs::write(dir.path().join("sub/nested.txt"), "nested").unwrap();

        let files = workspace.list_files(None).unwrap();
        assert_eq!(
            files,
            vec![PathBuf::from("sub/nested.txt"), PathBuf::from("top.txt")]
        );
    }

    #[rstest]
    fn hashing_matches_stored_blob_id(workspace: (TempDir, Workspace)) {
        let (dir, workspace) = workspace;
        std::fs::write(dir.path().join("hello.txt"), "Hello\n").unwrap();

        let oid = workspace.hash_file(Path::new("hello.txt")).unwrap();
        assert_eq!(oid.as_ref(), "ce013625030ba8dba906f756967f9e9ca394464a");
    }

    #[rstest]
    fn removing_last_file_prunes_empty_directories(workspace: (TempDir, Workspace)) {
        let (dir, workspace) = workspace;
        std::fs::create_dir_all(dir.path().join("a/b")).unwrap();
        std::fs::write(dir.path().join("a/b/f.txt"), "x").unwrap();

        workspace.remove_file(Path::new("a/b/f.txt")).unwrap();

        assert!(!dir.path().join("a").exists());
    }

    #[test]
    fn ignore_patterns_follow_git_subset() {
        let ignore = Ignore::parse("# comment\n\n*.log\nbuild/\n/top-only.txt\n");

        assert!(ignore.is_ignored(Path::new("debug.log"), false));
        assert!(ignore.is_ignored(Path::new("sub/deep.log"), false));
        assert!(ignore.is_ignored(Path::new("build"), true));
        assert!(ignore.is_ignored(Path::new("build/artifact.bin"), false));
        assert!(!ignore.is_ignored(Path::new("build"), false));
        assert!(ignore.is_ignored(Path::new("top-only.txt"), false));
        assert!(!ignore.is_ignored(Path::new("sub/top-only.txt"), false));
        assert!(!ignore.is_ignored(Path::new("kept.txt"), false));
    }
}
