//! Revision grammar
//!
//! A revision names a commit: `HEAD` (or the `@` alias), a branch name,
//! a full or abbreviated object id, or one of those suffixed with parent
//! (`^`) and ancestor (`~N`) notation. Names are preferred over object
//! ids when both could apply, matching Git.

use crate::areas::repository::Repository;
use crate::artifacts::branch::branch_name::BranchName;
use crate::artifacts::branch::{ANCESTOR_REGEX, PARENT_REGEX, expand_alias};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::{MIN_OID_PREFIX, OBJECT_ID_LENGTH};
use crate::errors::RvsError;
use anyhow::Context;
use regex::Regex;

#[derive(Debug, Clone)]
pub enum Revision {
    /// A branch name, `HEAD`, or something that may turn out to be an
    /// object id during resolution.
    Ref(String),
    /// First parent of a revision (`<rev>^`).
    Parent(Box<Revision>),
    /// Nth first-parent ancestor of a revision (`<rev>~N`).
    Ancestor(Box<Revision>, usize),
}

impl Revision {
    pub fn try_parse(revision: &str) -> anyhow::Result<Revision> {
        if revision.is_empty() {
            anyhow::bail!(RvsError::Usage("empty revision".to_string()));
        }

        let parent = Regex::new(PARENT_REGEX).expect("parent pattern is valid");
        if let Some(captures) = parent.captures(revision) {
            let base = Self::try_parse(&captures[1])?;
            return Ok(Revision::Parent(Box::new(base)));
        }

        let ancestor = Regex::new(ANCESTOR_REGEX).expect("ancestor pattern is valid");
        if let Some(captures) = ancestor.captures(revision) {
            let base = Self::try_parse(&captures[1])?;
            let generations: usize = captures[2]
                .parse()
                .with_context(|| format!("invalid ancestor count in '{}'", revision))?;
            return Ok(Revision::Ancestor(Box::new(base), generations));
        }

        Ok(Revision::Ref(expand_alias(revision).to_string()))
    }

    /// Parse and resolve in one step.
    pub fn resolve_str(revision: &str, repository: &Repository) -> anyhow::Result<ObjectId> {
        Self::try_parse(revision)?.resolve(repository)
    }

    /// Resolve to an object id, failing with `UnknownRev` when the
    /// revision names nothing.
    pub fn resolve(&self, repository: &Repository) -> anyhow::Result<ObjectId> {
        match self {
            Revision::Ref(name) => Self::resolve_name(name, repository),
            Revision::Parent(base) => {
                let oid = base.resolve(repository)?;
                Self::first_parent(&oid, repository)
            }
            Revision::Ancestor(base, generations) => {
                let mut oid = base.resolve(repository)?;
                for _ in 0..*generations {
                    oid = Self::first_parent(&oid, repository)?;
                }
                Ok(oid)
            }
        }
    }

    fn resolve_name(name: &str, repository: &Repository) -> anyhow::Result<ObjectId> {
        if name == "HEAD" {
            return repository
                .refs()
                .read_head()?
                .ok_or_else(|| RvsError::UnknownRev("HEAD".to_string()).into());
        }

        if let Ok(branch) = BranchName::try_parse(name.to_string())
            && let Some(oid) = repository.refs().read_branch(&branch)?
        {
            return Ok(oid);
        }

        if Self::looks_like_oid(name) {
            return repository.database().resolve_prefix(name);
        }

        anyhow::bail!(RvsError::UnknownRev(name.to_string()))
    }

    fn first_parent(oid: &ObjectId, repository: &Repository) -> anyhow::Result<ObjectId> {
        let commit = repository.database().load_commit(oid)?;

        commit
            .parent()
            .cloned()
            .ok_or_else(|| RvsError::UnknownRev(format!("{}^", oid.to_short_oid())).into())
    }

    fn looks_like_oid(s: &str) -> bool {
        s.len() >= MIN_OID_PREFIX
            && s.len() <= OBJECT_ID_LENGTH
            && s.chars().all(|c| c.is_ascii_hexdigit())
    }
}
