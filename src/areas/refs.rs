//! Reference store
//!
//! References are text files naming commits: `HEAD` lives in the
//! per-worktree metadata directory, branches live in the shared
//! `refs/heads/` namespace of the main repository. A reference is either
//! symbolic (`ref: refs/heads/<name>`) or direct (a 40-hex oid); a
//! detached HEAD stores the oid directly. All updates go through a
//! `.lock` sibling and an atomic rename.

use crate::artifacts::branch::branch_name::BranchName;
use crate::artifacts::core::lockfile::Lockfile;
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::RvsError;
use anyhow::Context;
use regex::Regex;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Pattern of a symbolic reference line.
const SYMREF_REGEX: &str = r"^ref: (.+)$";

/// Value of a reference file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefValue {
    /// Points at another ref, e.g. `ref: refs/heads/main`.
    Symbolic(String),
    /// Points directly at a commit.
    Direct(ObjectId),
}

#[derive(Debug)]
pub struct Refs {
    /// Per-worktree metadata directory holding `HEAD`.
    gitdir: Box<Path>,
    /// Main repository metadata directory holding `refs/`.
    commondir: Box<Path>,
}

impl Refs {
    pub fn new(gitdir: Box<Path>, commondir: Box<Path>) -> Self {
        Refs { gitdir, commondir }
    }

    pub fn head_path(&self) -> PathBuf {
        self.gitdir.join("HEAD")
    }

    pub fn heads_path(&self) -> PathBuf {
        self.commondir.join("refs").join("heads")
    }

    fn branch_path(&self, name: &BranchName) -> PathBuf {
        self.commondir.join(name.ref_path())
    }

    /// Read a reference file into its symbolic or direct value.
    pub fn read_ref_file(path: &Path) -> anyhow::Result<Option<RefValue>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read ref file {}", path.display()))?;
        let content = content.trim();
        if content.is_empty() {
            return Ok(None);
        }

        let symref = Regex::new(SYMREF_REGEX).expect("symref pattern is valid");
        if let Some(captures) = symref.captures(content) {
            return Ok(Some(RefValue::Symbolic(captures[1].to_string())));
        }

        let oid = ObjectId::try_parse(content.to_string())
            .map_err(|_| RvsError::RepositoryCorrupt(format!("malformed ref {}", path.display())))?;

        Ok(Some(RefValue::Direct(oid)))
    }

    fn write_ref_file(path: &Path, content: &str) -> anyhow::Result<()> {
        let mut lock = Lockfile::acquire(path)?;
        lock.write(content.as_bytes())?;
        lock.write(b"\n")?;
        lock.commit()
    }

    /// HEAD's value: the current branch when symbolic, the detached oid
    /// otherwise. Both sides may be absent in an empty repository.
    pub fn head(&self) -> anyhow::Result<(Option<BranchName>, Option<ObjectId>)> {
        match Self::read_ref_file(&self.head_path())? {
            Some(RefValue::Symbolic(target)) => {
                let name = target
                    .strip_prefix("refs/heads/")
                    .unwrap_or(target.as_str())
                    .to_string();
                let branch = BranchName::try_parse(name)?;
                let oid = self.read_branch(&branch)?;
                Ok((Some(branch), oid))
            }
            Some(RefValue::Direct(oid)) => Ok((None, Some(oid))),
            None => Ok((None, None)),
        }
    }

    /// The oid HEAD resolves to, following the symbolic indirection.
    pub fn read_head(&self) -> anyhow::Result<Option<ObjectId>> {
        Ok(self.head()?.1)
    }

    /// The branch HEAD points at, `None` when detached or unborn.
    pub fn current_branch(&self) -> anyhow::Result<Option<BranchName>> {
        Ok(self.head()?.0)
    }

    pub fn is_detached(&self) -> anyhow::Result<bool> {
        Ok(matches!(
            Self::read_ref_file(&self.head_path())?,
            Some(RefValue::Direct(_))
        ))
    }

    pub fn set_head_to_branch(&self, name: &BranchName) -> anyhow::Result<()> {
        Self::write_ref_file(&self.head_path(), &format!("ref: refs/heads/{}", name))
    }

    pub fn set_head_detached(&self, oid: &ObjectId) -> anyhow::Result<()> {
        Self::write_ref_file(&self.head_path(), oid.as_ref())
    }

    /// Advance HEAD after a commit: the current branch when HEAD is
    /// symbolic, HEAD itself when detached or unborn.
    pub fn update_head(&self, oid: &ObjectId) -> anyhow::Result<()> {
        match Self::read_ref_file(&self.head_path())? {
            Some(RefValue::Symbolic(target)) => {
                let name = target
                    .strip_prefix("refs/heads/")
                    .unwrap_or(target.as_str())
                    .to_string();
                let branch = BranchName::try_parse(name)?;
                Self::write_ref_file(&self.branch_path(&branch), oid.as_ref())
            }
            Some(RefValue::Direct(_)) | None => self.set_head_detached(oid),
        }
    }

    pub fn read_branch(&self, name: &BranchName) -> anyhow::Result<Option<ObjectId>> {
        match Self::read_ref_file(&self.branch_path(name))? {
            Some(RefValue::Direct(oid)) => Ok(Some(oid)),
            Some(RefValue::Symbolic(_)) => Err(RvsError::RepositoryCorrupt(format!(
                "branch {} is a symbolic ref",
                name
            ))
            .into()),
            None => Ok(None),
        }
    }

    pub fn branch_exists(&self, name: &BranchName) -> bool {
        self.branch_path(name).exists()
    }

    pub fn create_branch(
        &self,
        name: &BranchName,
        oid: &ObjectId,
        force: bool,
    ) -> anyhow::Result<()> {
        if self.branch_exists(name) && !force {
            anyhow::bail!(RvsError::BranchExists(name.to_string()));
        }

        Self::write_ref_file(&self.branch_path(name), oid.as_ref())
    }

    pub fn update_branch(&self, name: &BranchName, oid: &ObjectId) -> anyhow::Result<()> {
        Self::write_ref_file(&self.branch_path(name), oid.as_ref())
    }

    /// Delete a branch ref, returning the oid it pointed at.
    pub fn delete_branch(&self, name: &BranchName) -> anyhow::Result<ObjectId> {
        let branch_path = self.branch_path(name);

        match Self::read_ref_file(&branch_path)? {
            Some(RefValue::Direct(oid)) => {
                std::fs::remove_file(&branch_path)
                    .with_context(|| format!("failed to delete {}", branch_path.display()))?;
                self.prune_empty_parent_dirs(&branch_path)?;

                Ok(oid)
            }
            _ => anyhow::bail!("branch '{}' not found", name),
        }
    }

    /// Branches in the shared namespace, sorted by name.
    pub fn list_branches(&self) -> anyhow::Result<Vec<(BranchName, ObjectId)>> {
        let heads = self.heads_path();
        if !heads.exists() {
            return Ok(Vec::new());
        }

        let mut branches = Vec::new();
        for entry in WalkDir::new(&heads).into_iter().filter_map(|e| e.ok()) {
            if !entry.path().is_file() {
                continue;
            }

            let relative = entry.path().strip_prefix(&heads)?;
            let name = BranchName::try_parse(relative.to_string_lossy().replace('\\', "/"))?;
            if let Some(oid) = self.read_branch(&name)? {
                branches.push((name, oid));
            }
        }

        branches.sort();
        Ok(branches)
    }

    fn prune_empty_parent_dirs(&self, path: &Path) -> anyhow::Result<()> {
        let heads = self.heads_path();

        if let Some(parent) = path.parent()
            && parent != heads.as_path()
            && parent.read_dir()?.next().is_none()
        {
            std::fs::remove_dir(parent)
                .with_context(|| format!("failed to remove {}", parent.display()))?;
            self.prune_empty_parent_dirs(parent)?;
        }

        Ok(())
    }
}
