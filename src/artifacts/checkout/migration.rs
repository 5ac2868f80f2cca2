//! Checkout migration
//!
//! Turns a tree diff into a plan of file actions, refuses the plan when
//! it would lose local changes, and applies it to the working tree
//! first and the index second. A failed plan reports every conflicting
//! path grouped by conflict kind before anything is modified.

use crate::areas::index::Index;
use crate::areas::repository::Repository;
use crate::artifacts::checkout::conflict::{ConflictMessage, ConflictType};
use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::diff::tree_diff::{ChangeSet, TreeChangeType};
use crate::artifacts::index::index_entry::IndexEntry;
use crate::artifacts::status::file_change::{IndexChangeType, WorkspaceChangeType};
use crate::artifacts::status::inspector::Inspector;
use crate::errors::RvsError;
use anyhow::Context;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

/// Kind of file-system action a migration performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionType {
    Add,
    Delete,
    Modify,
}

type ActionsSet = HashMap<ActionType, Vec<(PathBuf, Option<DatabaseEntry>)>>;
type ConflictsSet = BTreeMap<ConflictType, BTreeSet<PathBuf>>;

pub struct Migration<'r> {
    repository: &'r Repository,
    index: &'r mut Index,
    changes: ChangeSet,
    inspector: Inspector<'r>,
    actions: ActionsSet,
    conflicts: ConflictsSet,
    mkdirs: BTreeSet<PathBuf>,
    rmdirs: BTreeSet<PathBuf>,
    /// What to blame in the refusal message, e.g. "checkout" or "merge".
    operation: &'static str,
}

impl<'r> Migration<'r> {
    pub fn new(
        repository: &'r Repository,
        index: &'r mut Index,
        changes: ChangeSet,
        operation: &'static str,
    ) -> Self {
        Self {
            repository,
            index,
            changes,
            inspector: Inspector::new(repository),
            actions: HashMap::new(),
            conflicts: BTreeMap::new(),
            mkdirs: BTreeSet::new(),
            rmdirs: BTreeSet::new(),
            operation,
        }
    }

    /// Plan, verify and apply the migration.
    pub fn apply_changes(&mut self) -> anyhow::Result<()> {
        self.plan_changes()?;
        self.update_workspace()?;
        self.update_index()?;

        Ok(())
    }

    fn plan_changes(&mut self) -> anyhow::Result<()> {
        let changes: Vec<(PathBuf, TreeChangeType)> = self
            .changes
            .iter()
            .map(|(path, change)| (path.clone(), change.clone()))
            .collect();

        for (path, change) in &changes {
            self.check_for_conflict(path, change)?;
            self.record_change(path, change);
        }

        let errors = self.collect_errors();
        if !errors.is_empty() {
            for error in &errors {
                eprintln!("error: {}", error);
            }
            eprintln!("Aborting");
            anyhow::bail!(RvsError::DirtyWorkingTree(self.operation.to_string()));
        }

        Ok(())
    }

    fn collect_errors(&self) -> Vec<String> {
        self.conflicts
            .iter()
            .filter(|(_, paths)| !paths.is_empty())
            .map(|(conflict_type, paths)| {
                let listing = paths
                    .iter()
                    .map(|p| format!("\t{}", p.display()))
                    .collect::<Vec<_>>()
                    .join("\n");

                let ConflictMessage { header, footer } = conflict_type.into();
                if footer.is_empty() {
                    format!("{}\n{}", header, listing)
                } else {
                    format!("{}\n{}\n{}", header, listing, footer)
                }
            })
            .collect()
    }

    fn check_for_conflict(&mut self, path: &Path, change: &TreeChangeType) -> anyhow::Result<()> {
        let entry = self.index.entry_by_path(path).cloned();
        let old_entry = change.old_entry();
        let new_entry = change.new_entry();

        if self.index_differs_from_trees(entry.as_ref(), old_entry, new_entry) {
            self.conflicts
                .entry(ConflictType::StaleFile)
                .or_default()
                .insert(path.to_path_buf());
            return Ok(());
        }

        let stat = self.repository.workspace().stat_file(path).ok();
        let conflict_type = ConflictType::classify(stat.as_ref(), entry.as_ref(), new_entry);

        match stat.as_ref() {
            Some(stat) if stat.mode.is_tree() => {
                if self.inspector.is_indirectly_tracked(path, self.index)? {
                    self.conflicts
                        .entry(conflict_type)
                        .or_default()
                        .insert(path.to_path_buf());
                }
            }
            Some(stat) => {
                let change_type = self
                    .inspector
                    .check_index_against_workspace(entry.as_ref(), Some(stat))?;
                if change_type != WorkspaceChangeType::None {
                    self.conflicts
                        .entry(conflict_type)
                        .or_default()
                        .insert(path.to_path_buf());
                }
            }
            None => {
                if let Some(parent) = self.untracked_parent(path)? {
                    let conflicting = if entry.is_some() {
                        path.to_path_buf()
                    } else {
                        parent
                    };
                    self.conflicts
                        .entry(conflict_type)
                        .or_default()
                        .insert(conflicting);
                }
            }
        }

        Ok(())
    }

    /// An ancestor of `path` that exists as an untracked regular file
    /// would be destroyed by creating the path.
    fn untracked_parent(&self, path: &Path) -> anyhow::Result<Option<PathBuf>> {
        let Some(parent) = path.parent() else {
            return Ok(None);
        };

        for ancestor in parent.ancestors() {
            if ancestor.as_os_str().is_empty() {
                break;
            }

            match self.repository.workspace().stat_file(ancestor) {
                Ok(stat) if stat.mode.is_tree() => continue,
                Ok(_) => {
                    if !self.index.is_tracked(ancestor) {
                        return Ok(Some(ancestor.to_path_buf()));
                    }
                }
                Err(_) => continue,
            }
        }

        Ok(None)
    }

    fn index_differs_from_trees(
        &self,
        index_entry: Option<&IndexEntry>,
        old_entry: Option<&DatabaseEntry>,
        new_entry: Option<&DatabaseEntry>,
    ) -> bool {
        self.inspector
            .check_index_against_head_tree(index_entry, old_entry)
            != IndexChangeType::None
            && self
                .inspector
                .check_index_against_head_tree(index_entry, new_entry)
                != IndexChangeType::None
    }

    fn record_change(&mut self, path: &Path, change: &TreeChangeType) {
        let (action, entry) = match change {
            TreeChangeType::Added(new_entry) => {
                self.record_mkdirs(path);
                (ActionType::Add, Some(new_entry.clone()))
            }
            TreeChangeType::Deleted(_) => {
                self.record_rmdirs(path);
                (ActionType::Delete, None)
            }
            TreeChangeType::Modified { new, .. } => {
                self.record_mkdirs(path);
                (ActionType::Modify, Some(new.clone()))
            }
            // a blob/tree flip is a delete of the blob side or an add of
            // the new blob; directory content flows through recursion
            TreeChangeType::TypeChanged { old: Some(_), new: None } => {
                self.record_rmdirs(path);
                (ActionType::Delete, None)
            }
            TreeChangeType::TypeChanged { new, .. } => {
                self.record_mkdirs(path);
                (ActionType::Add, new.clone())
            }
        };

        self.actions.entry(action).or_default().push((path.to_path_buf(), entry));
    }

    fn record_mkdirs(&mut self, path: &Path) {
        for ancestor in path.ancestors().skip(1) {
            if ancestor.as_os_str().is_empty() {
                break;
            }
            self.mkdirs.insert(ancestor.to_path_buf());
        }
    }

    fn record_rmdirs(&mut self, path: &Path) {
        for ancestor in path.ancestors().skip(1) {
            if ancestor.as_os_str().is_empty() {
                break;
            }
            self.rmdirs.insert(ancestor.to_path_buf());
        }
    }

    fn update_workspace(&self) -> anyhow::Result<()> {
        let workspace = self.repository.workspace();

        for (path, _) in self.actions_of(ActionType::Delete) {
            workspace.remove_file(path)?;
        }

        // directories left empty by deletions disappear deepest-first
        for dir in self.rmdirs.iter().rev() {
            let dir_path = workspace.root().join(dir);
            if let Ok(mut entries) = std::fs::read_dir(&dir_path)
                && entries.next().is_none()
            {
                let _ = std::fs::remove_dir(&dir_path);
            }
        }

        for dir in &self.mkdirs {
            workspace.make_dir(dir)?;
        }

        for action in [ActionType::Modify, ActionType::Add] {
            for (path, entry) in self.actions_of(action) {
                let entry = entry
                    .as_ref()
                    .context("add and modify actions carry an entry")?;
                let blob = self
                    .repository
                    .database()
                    .parse_object_as_blob(&entry.oid)?
                    .ok_or_else(|| anyhow::anyhow!("object {} is not a blob", entry.oid))?;

                workspace.write_file(path, blob.content(), entry.mode)?;
            }
        }

        Ok(())
    }

    fn update_index(&mut self) -> anyhow::Result<()> {
        for (path, _) in self.actions_of(ActionType::Delete).to_vec() {
            self.index.remove(&path);
        }

        for action in [ActionType::Add, ActionType::Modify] {
            for (path, entry) in self.actions_of(action).to_vec() {
                let entry = entry.context("add and modify actions carry an entry")?;
                let stat = self.repository.workspace().stat_file(&path)?;
                self.index
                    .add(IndexEntry::new(path, entry.oid, 0, stat))?;
            }
        }

        Ok(())
    }

    fn actions_of(&self, action: ActionType) -> &[(PathBuf, Option<DatabaseEntry>)] {
        self.actions
            .get(&action)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}
