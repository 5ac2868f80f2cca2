//! Worktree registry and repository discovery
//!
//! Every command starts by locating its enclosing worktree. Walking up
//! from the working directory, the first `.rvs` entry decides the
//! context: a directory marks the main repository, a file holds a
//! `rvsdir:` pointer into the main repository's `worktrees/<name>/`
//! metadata directory. The metadata directory carries the worktree's
//! own `HEAD` and `index` plus `commondir`/`rvsdir` pointers; the main
//! repository owns the single object store and the branch namespace.

use crate::areas::refs::{RefValue, Refs};
use crate::artifacts::branch::branch_name::BranchName;
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::RvsError;
use anyhow::Context;
use std::path::{Path, PathBuf};

/// Metadata entry name used by both repository layouts.
pub const METADATA_NAME: &str = ".rvs";

/// Prefix of the pointer line inside a linked worktree's `.rvs` file.
const RVSDIR_PREFIX: &str = "rvsdir: ";

/// Resolved location of the worktree a command operates on.
#[derive(Debug, Clone)]
pub struct WorktreeContext {
    /// Worktree root directory.
    pub root: PathBuf,
    /// Per-worktree metadata directory (the `.rvs` directory itself for
    /// the main worktree).
    pub gitdir: PathBuf,
    /// Main repository metadata directory owning objects and refs.
    pub commondir: PathBuf,
    /// Whether this is a linked worktree rather than the main checkout.
    pub is_linked: bool,
}

impl WorktreeContext {
    /// Discover the enclosing worktree by walking parents from `start`.
    ///
    /// `RVS_DIR` overrides discovery entirely, naming the metadata
    /// directory directly.
    pub fn discover(start: &Path) -> anyhow::Result<Self> {
        if let Ok(dir) = std::env::var("RVS_DIR") {
            let gitdir = PathBuf::from(dir);
            if !gitdir.is_dir() {
                anyhow::bail!(RvsError::NotARepository);
            }
            let root = gitdir.parent().unwrap_or(&gitdir).to_path_buf();
            return Ok(WorktreeContext {
                root,
                commondir: gitdir.clone(),
                gitdir,
                is_linked: false,
            });
        }

        for ancestor in start.ancestors() {
            let marker = ancestor.join(METADATA_NAME);

            if marker.is_dir() {
                return Ok(WorktreeContext {
                    root: ancestor.to_path_buf(),
                    gitdir: marker.clone(),
                    commondir: marker,
                    is_linked: false,
                });
            }

            if marker.is_file() {
                return Self::from_pointer_file(ancestor, &marker);
            }
        }

        anyhow::bail!(RvsError::NotARepository)
    }

    fn from_pointer_file(root: &Path, marker: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(marker)
            .map_err(|source| RvsError::io(marker.to_path_buf(), source))?;
        let gitdir = content
            .trim()
            .strip_prefix(RVSDIR_PREFIX)
            .map(PathBuf::from)
            .ok_or_else(|| {
                RvsError::RepositoryCorrupt(format!("invalid {} file", marker.display()))
            })?;

        let commondir_file = gitdir.join("commondir");
        let commondir = std::fs::read_to_string(&commondir_file)
            .map(|s| PathBuf::from(s.trim()))
            .map_err(|_| {
                RvsError::RepositoryCorrupt(format!(
                    "worktree metadata missing commondir: {}",
                    gitdir.display()
                ))
            })?;

        if !commondir.is_dir() {
            anyhow::bail!(RvsError::RepositoryCorrupt(format!(
                "main repository not found at {}",
                commondir.display()
            )));
        }

        Ok(WorktreeContext {
            root: root.to_path_buf(),
            gitdir,
            commondir,
            is_linked: true,
        })
    }
}

/// One registered worktree as reported by `worktree list`.
#[derive(Debug, Clone)]
pub struct WorktreeInfo {
    pub path: PathBuf,
    pub head_oid: Option<ObjectId>,
    pub branch: Option<BranchName>,
    pub locked: bool,
}

/// Registry of linked worktrees under `<commondir>/worktrees/`.
#[derive(Debug)]
pub struct Worktrees {
    commondir: PathBuf,
}

impl Worktrees {
    pub fn new(commondir: PathBuf) -> Self {
        Worktrees { commondir }
    }

    fn registry_dir(&self) -> PathBuf {
        self.commondir.join("worktrees")
    }

    /// Register a new linked worktree rooted at `worktree_root`,
    /// creating its metadata directory and the `.rvs` pointer file.
    /// Returns the metadata directory.
    pub fn register(
        &self,
        worktree_root: &Path,
        head: RefValue,
    ) -> anyhow::Result<PathBuf> {
        let name = worktree_root
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| anyhow::anyhow!("invalid worktree path"))?
            .to_string();

        let metadata_dir = self.registry_dir().join(&name);
        if metadata_dir.exists() {
            anyhow::bail!(RvsError::WorktreeExists(worktree_root.to_path_buf()));
        }

        std::fs::create_dir_all(&metadata_dir)
            .with_context(|| format!("failed to create {}", metadata_dir.display()))?;

        let pointer_file = worktree_root.join(METADATA_NAME);
        std::fs::write(
            &pointer_file,
            format!("{}{}\n", RVSDIR_PREFIX, metadata_dir.display()),
        )
        .map_err(|source| RvsError::io(pointer_file.clone(), source))?;

        std::fs::write(
            metadata_dir.join("commondir"),
            format!("{}\n", self.commondir.display()),
        )?;
        std::fs::write(
            metadata_dir.join("rvsdir"),
            format!("{}\n", pointer_file.display()),
        )?;

        let head_content = match head {
            RefValue::Symbolic(target) => format!("ref: {}\n", target),
            RefValue::Direct(oid) => format!("{}\n", oid),
        };
        std::fs::write(metadata_dir.join("HEAD"), head_content)?;

        Ok(metadata_dir)
    }

    /// Linked worktrees in registration order, skipping entries whose
    /// metadata is unreadable.
    pub fn list(&self) -> anyhow::Result<Vec<WorktreeInfo>> {
        let registry = self.registry_dir();
        if !registry.is_dir() {
            return Ok(Vec::new());
        }

        let mut infos = Vec::new();
        let mut entries: Vec<_> = std::fs::read_dir(&registry)?
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_dir())
            .collect();
        entries.sort_by_key(|e| e.file_name());

        for entry in entries {
            if let Some(info) = self.read_info(&entry.path())? {
                infos.push(info);
            }
        }

        Ok(infos)
    }

    fn read_info(&self, metadata_dir: &Path) -> anyhow::Result<Option<WorktreeInfo>> {
        let rvsdir_file = metadata_dir.join("rvsdir");
        let Ok(pointer) = std::fs::read_to_string(&rvsdir_file) else {
            return Ok(None);
        };
        let worktree_root = PathBuf::from(pointer.trim())
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        let refs = Refs::new(
            metadata_dir.to_path_buf().into_boxed_path(),
            self.commondir.clone().into_boxed_path(),
        );
        let (branch, head_oid) = refs.head()?;

        Ok(Some(WorktreeInfo {
            path: worktree_root,
            head_oid,
            branch,
            locked: metadata_dir.join("locked").exists(),
        }))
    }

    /// Resolve a user-supplied worktree path to its metadata directory.
    pub fn find_metadata_dir(&self, worktree_path: &Path) -> anyhow::Result<PathBuf> {
        let pointer_file = worktree_path.join(METADATA_NAME);
        if !pointer_file.is_file() {
            anyhow::bail!("'{}' is not a working tree", worktree_path.display());
        }

        let content = std::fs::read_to_string(&pointer_file)
            .map_err(|source| RvsError::io(pointer_file.clone(), source))?;
        content
            .trim()
            .strip_prefix(RVSDIR_PREFIX)
            .map(PathBuf::from)
            .ok_or_else(|| {
                RvsError::RepositoryCorrupt(format!("invalid {} file", pointer_file.display()))
                    .into()
            })
    }

    pub fn is_locked(&self, worktree_path: &Path) -> anyhow::Result<bool> {
        let metadata_dir = self.find_metadata_dir(worktree_path)?;
        Ok(metadata_dir.join("locked").exists())
    }

    pub fn lock(&self, worktree_path: &Path, reason: Option<&str>) -> anyhow::Result<()> {
        let metadata_dir = self.find_metadata_dir(worktree_path)?;
        std::fs::write(metadata_dir.join("locked"), reason.unwrap_or_default())?;

        Ok(())
    }

    pub fn unlock(&self, worktree_path: &Path) -> anyhow::Result<bool> {
        let metadata_dir = self.find_metadata_dir(worktree_path)?;
        let lock_file = metadata_dir.join("locked");

        if lock_file.exists() {
            std::fs::remove_file(&lock_file)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Remove a worktree: its directory contents and its registration.
    /// Refuses while the worktree is locked unless forced.
    pub fn remove(&self, worktree_path: &Path, force: bool) -> anyhow::Result<()> {
        let metadata_dir = self.find_metadata_dir(worktree_path)?;

        if metadata_dir.join("locked").exists() && !force {
            anyhow::bail!(RvsError::WorktreeLocked(worktree_path.to_path_buf()));
        }

        std::fs::remove_dir_all(worktree_path)
            .with_context(|| format!("failed to remove {}", worktree_path.display()))?;
        std::fs::remove_dir_all(&metadata_dir)
            .with_context(|| format!("failed to remove {}", metadata_dir.display()))?;

        Ok(())
    }

    /// Drop registrations whose worktree directory no longer exists.
    /// Locked registrations survive pruning.
    pub fn prune(&self) -> anyhow::Result<Vec<PathBuf>> {
        let registry = self.registry_dir();
        if !registry.is_dir() {
            return Ok(Vec::new());
        }

        let mut pruned = Vec::new();
        for entry in std::fs::read_dir(&registry)?.filter_map(|e| e.ok()) {
            let metadata_dir = entry.path();
            if !metadata_dir.is_dir() || metadata_dir.join("locked").exists() {
                continue;
            }

            let gone = match std::fs::read_to_string(metadata_dir.join("rvsdir")) {
                Ok(pointer) => !PathBuf::from(pointer.trim()).exists(),
                Err(_) => true,
            };

            if gone {
                let root = std::fs::read_to_string(metadata_dir.join("rvsdir"))
                    .map(|p| {
                        PathBuf::from(p.trim())
                            .parent()
                            .map(Path::to_path_buf)
                            .unwrap_or_default()
                    })
                    .unwrap_or_else(|_| metadata_dir.clone());
                std::fs::remove_dir_all(&metadata_dir)?;
                pruned.push(root);
            }
        }

        Ok(pruned)
    }

    /// The worktree whose HEAD points symbolically at the given branch,
    /// if any. `exclude_gitdir` skips the asking worktree itself.
    pub fn branch_in_use(
        &self,
        branch: &BranchName,
        exclude_gitdir: &Path,
    ) -> anyhow::Result<Option<PathBuf>> {
        let expected = format!("refs/heads/{}", branch);

        // the main worktree's HEAD lives in the common directory
        let mut candidates: Vec<PathBuf> = vec![self.commondir.clone()];
        candidates.extend(self.metadata_dirs()?);

        for gitdir in candidates {
            if gitdir == exclude_gitdir {
                continue;
            }
            if let Some(RefValue::Symbolic(target)) =
                Refs::read_ref_file(&gitdir.join("HEAD"))?
                && target == expected
            {
                let root = if gitdir == self.commondir {
                    self.commondir.parent().map(Path::to_path_buf).unwrap_or_default()
                } else {
                    std::fs::read_to_string(gitdir.join("rvsdir"))
                        .map(|p| {
                            PathBuf::from(p.trim())
                                .parent()
                                .map(Path::to_path_buf)
                                .unwrap_or_default()
                        })
                        .unwrap_or_default()
                };
                return Ok(Some(root));
            }
        }

        Ok(None)
    }

    fn metadata_dirs(&self) -> anyhow::Result<Vec<PathBuf>> {
        let registry = self.registry_dir();
        if !registry.is_dir() {
            return Ok(Vec::new());
        }

        Ok(std::fs::read_dir(&registry)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::TempDir;
    use pretty_assertions::assert_eq;

    fn oid(seed: u8) -> ObjectId {
        ObjectId::try_parse(format!("{:02x}", seed).repeat(20)).unwrap()
    }

    fn init_main(dir: &Path) -> PathBuf {
        let commondir = dir.join(".rvs");
        std::fs::create_dir_all(commondir.join("refs").join("heads")).unwrap();
        std::fs::create_dir_all(commondir.join("objects")).unwrap();
        std::fs::write(commondir.join("HEAD"), "ref: refs/heads/main\n").unwrap();
        commondir
    }

    #[test]
    fn discovery_walks_up_to_the_main_repository() {
        let dir = TempDir::new().unwrap();
        init_main(dir.path());
        let nested = dir.path().join("a/b");
        std::fs::create_dir_all(&nested).unwrap();

        let ctx = WorktreeContext::discover(&nested).unwrap();

        assert_eq!(ctx.root, dir.path());
        assert_eq!(ctx.gitdir, dir.path().join(".rvs"));
        assert_eq!(ctx.commondir, dir.path().join(".rvs"));
        assert!(!ctx.is_linked);
    }

    #[test]
    fn discovery_fails_outside_any_repository() {
        let dir = TempDir::new().unwrap();
        assert!(WorktreeContext::discover(dir.path()).is_err());
    }

    #[test]
    fn registered_worktree_discovers_through_pointer_file() {
        let main = TempDir::new().unwrap();
        let commondir = init_main(main.path());
        let worktrees = Worktrees::new(commondir.clone());

        let wt_dir = TempDir::new().unwrap();
        let wt_root = wt_dir.path().join("feature-wt");
        std::fs::create_dir_all(&wt_root).unwrap();

        let metadata_dir = worktrees
            .register(
                &wt_root,
                RefValue::Symbolic("refs/heads/feature".to_string()),
            )
            .unwrap();

        assert!(wt_root.join(".rvs").is_file());
        assert!(metadata_dir.join("HEAD").exists());
        assert!(metadata_dir.join("commondir").exists());

        let ctx = WorktreeContext::discover(&wt_root).unwrap();
        assert!(ctx.is_linked);
        assert_eq!(ctx.root, wt_root);
        assert_eq!(ctx.gitdir, metadata_dir);
        assert_eq!(ctx.commondir, commondir);
    }

    #[test]
    fn lock_blocks_removal_until_unlocked() {
        let main = TempDir::new().unwrap();
        let commondir = init_main(main.path());
        let worktrees = Worktrees::new(commondir);

        let wt_root = main.path().join("wt");
        std::fs::create_dir_all(&wt_root).unwrap();
        worktrees
            .register(&wt_root, RefValue::Direct(oid(1)))
            .unwrap();

        worktrees.lock(&wt_root, Some("testing")).unwrap();
        assert!(worktrees.is_locked(&wt_root).unwrap());
        assert!(worktrees.remove(&wt_root, false).is_err());

        assert!(worktrees.unlock(&wt_root).unwrap());
        worktrees.remove(&wt_root, false).unwrap();
        assert!(!wt_root.exists());
    }

    #[test]
    fn branch_in_use_sees_other_worktrees_heads() {
        let main = TempDir::new().unwrap();
        let commondir = init_main(main.path());
        let worktrees = Worktrees::new(commondir.clone());

        let wt_root = main.path().join("wt");
        std::fs::create_dir_all(&wt_root).unwrap();
        let metadata_dir = worktrees
            .register(
                &wt_root,
                RefValue::Symbolic("refs/heads/topic".to_string()),
            )
            .unwrap();

        let topic = BranchName::try_parse("topic".into()).unwrap();
        let main_branch = BranchName::try_parse("main".into()).unwrap();

        let holder = worktrees
            .branch_in_use(&topic, &commondir)
            .unwrap()
            .expect("topic is held by the linked worktree");
        assert_eq!(holder, wt_root);

        // the linked worktree itself is excluded from the scan
        assert!(
            worktrees
                .branch_in_use(&topic, &metadata_dir)
                .unwrap()
                .is_none()
        );

        // main holds `main`, seen from the linked worktree's perspective
        assert!(
            worktrees
                .branch_in_use(&main_branch, &metadata_dir)
                .unwrap()
                .is_some()
        );
    }

    #[test]
    fn prune_drops_stale_unlocked_registrations() {
        let main = TempDir::new().unwrap();
        let commondir = init_main(main.path());
        let worktrees = Worktrees::new(commondir);

        let wt_root = main.path().join("gone");
        std::fs::create_dir_all(&wt_root).unwrap();
        worktrees
            .register(&wt_root, RefValue::Direct(oid(3)))
            .unwrap();
        std::fs::remove_dir_all(&wt_root).unwrap();

        let pruned = worktrees.prune().unwrap();

        assert_eq!(pruned.len(), 1);
        assert!(worktrees.list().unwrap().is_empty());
    }
}
