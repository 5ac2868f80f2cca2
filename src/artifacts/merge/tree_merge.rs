//! Tree-level three-way merge
//!
//! Classifies every path across (base, ours, theirs) flattened
//! snapshots: unchanged, taken from one side, changed identically on
//! both sides, changed differently (resolved by the blob merge), or one
//! of the conflict shapes: content, add/add, modify/delete and
//! file/directory. Clean results land in the merged entry set; each
//! conflicted path carries its stage entries, the working tree content
//! to materialize and a `CONFLICT` message.

use crate::areas::database::Database;
use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::merge::diff3;
use bytes::Bytes;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// Stage entries of one conflicted path.
#[derive(Debug, Clone)]
pub struct ConflictEntry {
    pub base: Option<DatabaseEntry>,
    pub ours: Option<DatabaseEntry>,
    pub theirs: Option<DatabaseEntry>,
}

/// Outcome of merging two snapshots against their base.
#[derive(Debug, Default)]
pub struct MergedTree {
    /// Clean result entries, the snapshot a merge commit would record.
    pub entries: BTreeMap<PathBuf, DatabaseEntry>,
    /// Conflicted paths with their stage 1/2/3 entries.
    pub conflicts: BTreeMap<PathBuf, ConflictEntry>,
    /// Content to materialize for conflicted paths (markers, or the
    /// surviving side for modify/delete).
    pub conflicted_files: BTreeMap<PathBuf, Bytes>,
    /// Human-facing `CONFLICT (...)` lines in path order.
    pub messages: Vec<String>,
}

impl MergedTree {
    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty()
    }
}

type FlatTree = BTreeMap<PathBuf, DatabaseEntry>;

/// Merge `ours` and `theirs` relative to `base`, storing any newly
/// merged blobs into the database.
pub fn merge_trees(
    database: &Database,
    base: &FlatTree,
    ours: &FlatTree,
    theirs: &FlatTree,
) -> anyhow::Result<MergedTree> {
    let mut result = MergedTree::default();

    let paths: BTreeSet<&PathBuf> = base.keys().chain(ours.keys()).chain(theirs.keys()).collect();

    for path in paths {
        let base_entry = base.get(path);
        let ours_entry = ours.get(path);
        let theirs_entry = theirs.get(path);

        merge_path(
            database,
            &mut result,
            path,
            base_entry,
            ours_entry,
            theirs_entry,
        )?;
    }

    resolve_directory_file_collisions(database, &mut result)?;

    Ok(result)
}

fn merge_path(
    database: &Database,
    result: &mut MergedTree,
    path: &Path,
    base: Option<&DatabaseEntry>,
    ours: Option<&DatabaseEntry>,
    theirs: Option<&DatabaseEntry>,
) -> anyhow::Result<()> {
    // unchanged on at least one side resolves without content merging
    if ours == theirs {
        if let Some(entry) = ours {
            result.entries.insert(path.to_path_buf(), entry.clone());
        }
        return Ok(());
    }
    if ours == base {
        if let Some(entry) = theirs {
            result.entries.insert(path.to_path_buf(), entry.clone());
        }
        return Ok(());
    }
    if theirs == base {
        if let Some(entry) = ours {
            result.entries.insert(path.to_path_buf(), entry.clone());
        }
        return Ok(());
    }

    // both sides changed, and differently
    match (ours, theirs) {
        (Some(ours_entry), Some(theirs_entry)) => {
            let base_content = read_blob(database, base)?;
            let ours_content = read_blob(database, Some(ours_entry))?;
            let theirs_content = read_blob(database, Some(theirs_entry))?;

            let merged = diff3::merge_blobs(&base_content, &ours_content, &theirs_content);
            let mode = if base.map(|e| e.mode) == Some(ours_entry.mode) {
                theirs_entry.mode
            } else {
                ours_entry.mode
            };

            if merged.conflicted {
                let kind = if base.is_none() {
                    "add/add"
                } else {
                    "content"
                };
                result.messages.push(format!(
                    "CONFLICT ({}): Merge conflict in {}",
                    kind,
                    path.display()
                ));
                result
                    .conflicted_files
                    .insert(path.to_path_buf(), merged.content);
                result.conflicts.insert(
                    path.to_path_buf(),
                    ConflictEntry {
                        base: base.cloned(),
                        ours: Some(ours_entry.clone()),
                        theirs: Some(theirs_entry.clone()),
                    },
                );
            } else {
                let oid = database.store_blob(merged.content)?;
                result
                    .entries
                    .insert(path.to_path_buf(), DatabaseEntry::new(oid, mode));
            }
        }
        // modify/delete: keep the surviving side's content in the tree
        (surviving, None) | (None, surviving) => {
            let deleted_ours = ours.is_none();
            result.messages.push(format!(
                "CONFLICT (modify/delete): {} deleted in {} and modified in {}",
                path.display(),
                if deleted_ours { "ours" } else { "theirs" },
                if deleted_ours { "theirs" } else { "ours" },
            ));

            let survivor = surviving.expect("one side survives a modify/delete conflict");
            result.conflicted_files.insert(
                path.to_path_buf(),
                read_blob(database, Some(survivor))?,
            );
            result.conflicts.insert(
                path.to_path_buf(),
                ConflictEntry {
                    base: base.cloned(),
                    ours: ours.cloned(),
                    theirs: theirs.cloned(),
                },
            );
        }
    }

    Ok(())
}

/// A merged file colliding with a merged directory of the same name
/// cannot both exist; the file side becomes a conflict and the
/// directory wins the tree.
fn resolve_directory_file_collisions(
    database: &Database,
    result: &mut MergedTree,
) -> anyhow::Result<()> {
    let colliding: Vec<PathBuf> = result
        .entries
        .keys()
        .filter(|path| {
            result
                .entries
                .range::<PathBuf, _>((
                    std::ops::Bound::Excluded((*path).clone()),
                    std::ops::Bound::Unbounded,
                ))
                .take_while(|(other, _)| other.starts_with(path))
                .next()
                .is_some()
        })
        .cloned()
        .collect();

    for path in colliding {
        let entry = result
            .entries
            .remove(&path)
            .expect("collision scan found the entry");

        result.messages.push(format!(
            "CONFLICT (file/directory): {} exists as both a file and a directory",
            path.display()
        ));
        result
            .conflicted_files
            .insert(path.clone(), read_blob(database, Some(&entry))?);
        result.conflicts.insert(
            path,
            ConflictEntry {
                base: None,
                ours: Some(entry),
                theirs: None,
            },
        );
    }

    result.messages.sort();
    Ok(())
}

fn read_blob(database: &Database, entry: Option<&DatabaseEntry>) -> anyhow::Result<Bytes> {
    match entry {
        None => Ok(Bytes::new()),
        Some(entry) => {
            let blob = database
                .parse_object_as_blob(&entry.oid)?
                .ok_or_else(|| anyhow::anyhow!("object {} is not a blob", entry.oid))?;
            Ok(blob.into_content())
        }
    }
}
