//! Repository facade
//!
//! Bundles the per-worktree context with the stores every operation
//! needs: the shared object database, the worktree-scoped index and
//! HEAD, the workspace adapter and the reference store. Discovery runs
//! once at command entry; the resulting context value is threaded
//! through explicitly, never held in process-wide state.

use crate::areas::database::Database;
use crate::areas::index::Index;
use crate::areas::refs::Refs;
use crate::areas::workspace::Workspace;
use crate::areas::worktrees::{WorktreeContext, Worktrees};
use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::object_id::ObjectId;
use std::cell::{RefCell, RefMut};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Object database directory name inside the common directory.
const DATABASE_DIR: &str = "objects";

/// Index file name inside the per-worktree metadata directory.
const INDEX_FILE: &str = "index";

pub struct Repository {
    ctx: WorktreeContext,
    /// Output writer, stdout in production and a capture buffer in tests.
    writer: RefCell<Box<dyn Write>>,
    index: RefCell<Index>,
    database: Database,
    workspace: Workspace,
    refs: Refs,
}

impl Repository {
    /// Open the repository enclosing the current working directory.
    pub fn discover(writer: Box<dyn Write>) -> anyhow::Result<Self> {
        let cwd = std::env::current_dir()?;
        Self::open(&cwd, writer)
    }

    /// Open the repository enclosing `start`.
    pub fn open(start: &Path, writer: Box<dyn Write>) -> anyhow::Result<Self> {
        let ctx = WorktreeContext::discover(start)?;
        Ok(Self::from_context(ctx, writer))
    }

    pub fn from_context(ctx: WorktreeContext, writer: Box<dyn Write>) -> Self {
        let index = Index::new(ctx.gitdir.join(INDEX_FILE).into_boxed_path());
        let database = Database::new(ctx.commondir.join(DATABASE_DIR).into_boxed_path());
        let workspace = Workspace::new(ctx.root.clone().into_boxed_path());
        let refs = Refs::new(
            ctx.gitdir.clone().into_boxed_path(),
            ctx.commondir.clone().into_boxed_path(),
        );

        Repository {
            ctx,
            writer: RefCell::new(writer),
            index: RefCell::new(index),
            database,
            workspace,
            refs,
        }
    }

    /// Worktree root directory.
    pub fn path(&self) -> &Path {
        &self.ctx.root
    }

    /// Per-worktree metadata directory.
    pub fn gitdir(&self) -> &Path {
        &self.ctx.gitdir
    }

    /// Main repository metadata directory.
    pub fn commondir(&self) -> &Path {
        &self.ctx.commondir
    }

    pub fn is_linked_worktree(&self) -> bool {
        self.ctx.is_linked
    }

    pub fn writer(&self) -> RefMut<'_, Box<dyn Write>> {
        self.writer.borrow_mut()
    }

    /// Borrow the index mutably; commands load it once per operation via
    /// [`Index::rehydrate`] and persist it with [`Index::write_updates`].
    pub fn index_mut(&self) -> RefMut<'_, Index> {
        self.index.borrow_mut()
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn refs(&self) -> &Refs {
        &self.refs
    }

    pub fn worktrees(&self) -> Worktrees {
        Worktrees::new(self.ctx.commondir.clone())
    }

    /// HEAD's commit, if the repository has any history.
    pub fn head_commit(&self) -> anyhow::Result<Option<(ObjectId, Commit)>> {
        match self.refs.read_head()? {
            Some(oid) => {
                let commit = self.database.load_commit(&oid)?;
                Ok(Some((oid, commit)))
            }
            None => Ok(None),
        }
    }

    /// Tree oid of HEAD's commit, `None` on an unborn branch.
    pub fn head_tree_oid(&self) -> anyhow::Result<Option<ObjectId>> {
        Ok(self
            .head_commit()?
            .map(|(_, commit)| commit.tree_oid().clone()))
    }

    /// Path of the pending-merge marker recording the second parent of
    /// the next commit.
    pub fn merge_head_path(&self) -> PathBuf {
        self.ctx.gitdir.join("MERGE_HEAD")
    }

    /// Path of the saved message for the pending merge commit.
    pub fn merge_msg_path(&self) -> PathBuf {
        self.ctx.gitdir.join("MERGE_MSG")
    }

    pub fn pending_merge_head(&self) -> anyhow::Result<Option<ObjectId>> {
        let path = self.merge_head_path();
        if !path.is_file() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&path)?;
        Ok(Some(ObjectId::try_parse(content.trim().to_string())?))
    }

    pub fn clear_pending_merge(&self) -> anyhow::Result<()> {
        for path in [self.merge_head_path(), self.merge_msg_path()] {
            if path.exists() {
                std::fs::remove_file(&path)?;
            }
        }

        Ok(())
    }
}
