//! Diff sides and unified patch rendering
//!
//! A `DiffTarget` is one side of a file-level diff regardless of where
//! it lives, whether a stored blob, an index entry or a working file. The
//! formatter renders git-style patches over pairs of targets: header,
//! mode lines, index line, unified hunks, and the binary short-circuit
//! for contents with NUL bytes in their leading window.

use crate::areas::database::Database;
use crate::areas::workspace::Workspace;
use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::diff::HUNK_CONTEXT;
use crate::artifacts::diff::myers::{self, EditKind};
use crate::artifacts::diff::tree_diff::ChangeSet;
use crate::artifacts::index::entry_mode::EntryMode;
use crate::artifacts::index::index_entry::IndexEntry;
use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::object::Object;
use crate::artifacts::objects::object_id::ObjectId;
use bytes::Bytes;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Placeholder oid printed for an absent diff side.
const NULL_OID_ABBREV: &str = "0000000";

/// One side of a file diff.
#[derive(Debug, Clone)]
pub struct DiffTarget {
    pub path: PathBuf,
    pub oid: Option<ObjectId>,
    pub mode: Option<EntryMode>,
    pub content: Bytes,
}

impl DiffTarget {
    pub fn absent(path: &Path) -> Self {
        DiffTarget {
            path: path.to_path_buf(),
            oid: None,
            mode: None,
            content: Bytes::new(),
        }
    }

    pub fn from_database_entry(
        database: &Database,
        path: &Path,
        entry: &DatabaseEntry,
    ) -> anyhow::Result<Self> {
        let blob = database
            .parse_object_as_blob(&entry.oid)?
            .ok_or_else(|| anyhow::anyhow!("object {} is not a blob", entry.oid))?;

        Ok(DiffTarget {
            path: path.to_path_buf(),
            oid: Some(entry.oid.clone()),
            mode: Some(entry.mode),
            content: blob.into_content(),
        })
    }

    pub fn from_index_entry(
        database: &Database,
        entry: &IndexEntry,
    ) -> anyhow::Result<Self> {
        let blob = database
            .parse_object_as_blob(&entry.oid)?
            .ok_or_else(|| anyhow::anyhow!("object {} is not a blob", entry.oid))?;

        Ok(DiffTarget {
            path: entry.path.clone(),
            oid: Some(entry.oid.clone()),
            mode: Some(entry.metadata.mode),
            content: blob.into_content(),
        })
    }

    pub fn from_working_file(workspace: &Workspace, path: &Path) -> anyhow::Result<Self> {
        let content = workspace.read_file(path)?;
        let stat = workspace.stat_file(path)?;
        let oid = Blob::new(content.clone()).object_id()?;

        Ok(DiffTarget {
            path: path.to_path_buf(),
            oid: Some(oid),
            mode: Some(stat.mode),
            content,
        })
    }

    fn exists(&self) -> bool {
        self.oid.is_some()
    }

    fn oid_abbrev(&self) -> String {
        self.oid
            .as_ref()
            .map(|oid| oid.to_short_oid())
            .unwrap_or_else(|| NULL_OID_ABBREV.to_string())
    }

    fn is_binary(&self) -> bool {
        Blob::new(self.content.clone()).is_binary()
    }
}

/// Renders git-style patches.
pub struct PatchFormatter<'r> {
    database: &'r Database,
}

impl<'r> PatchFormatter<'r> {
    pub fn new(database: &'r Database) -> Self {
        PatchFormatter { database }
    }

    /// Render a whole change set as a patch, old side from the stored
    /// entries.
    pub fn print_changes(&self, writer: &mut dyn Write, changes: &ChangeSet) -> anyhow::Result<()> {
        for (path, change) in changes {
            let a = match change.old_entry() {
                Some(entry) => DiffTarget::from_database_entry(self.database, path, entry)?,
                None => DiffTarget::absent(path),
            };
            let b = match change.new_entry() {
                Some(entry) => DiffTarget::from_database_entry(self.database, path, entry)?,
                None => DiffTarget::absent(path),
            };

            self.print_file_diff(writer, &a, &b)?;
        }

        Ok(())
    }

    /// Render one file-level diff between two targets.
    pub fn print_file_diff(
        &self,
        writer: &mut dyn Write,
        a: &DiffTarget,
        b: &DiffTarget,
    ) -> anyhow::Result<()> {
        if a.oid == b.oid && a.mode == b.mode {
            return Ok(());
        }

        writeln!(
            writer,
            "diff --git a/{} b/{}",
            a.path.display(),
            b.path.display()
        )?;

        let mode_suffix = self.print_mode_lines(writer, a, b)?;
        writeln!(
            writer,
            "index {}..{}{}",
            a.oid_abbrev(),
            b.oid_abbrev(),
            mode_suffix
        )?;

        if a.is_binary() || b.is_binary() {
            writeln!(
                writer,
                "Binary files a/{} and b/{} differ",
                a.path.display(),
                b.path.display()
            )?;
            return Ok(());
        }

        if a.oid == b.oid {
            // pure mode change, no content hunks
            return Ok(());
        }

        match a.exists() {
            true => writeln!(writer, "--- a/{}", a.path.display())?,
            false => writeln!(writer, "--- /dev/null")?,
        }
        match b.exists() {
            true => writeln!(writer, "+++ b/{}", b.path.display())?,
            false => writeln!(writer, "+++ /dev/null")?,
        }

        let a_lines = myers::split_lines(&a.content);
        let b_lines = myers::split_lines(&b.content);
        let edits = myers::diff_lines(&a_lines, &b_lines);

        for hunk in myers::hunks(&edits, HUNK_CONTEXT) {
            writeln!(writer, "{}", hunk.header())?;
            for edit in &hunk.edits {
                let sigil = match edit.kind {
                    EditKind::Eq => ' ',
                    EditKind::Del => '-',
                    EditKind::Ins => '+',
                };
                write!(writer, "{}", sigil)?;
                writer.write_all(edit.text)?;
                if !edit.text.ends_with(b"\n") {
                    write!(writer, "\n\\ No newline at end of file\n")?;
                }
            }
        }

        Ok(())
    }

    /// Mode lines for creations, deletions and mode flips. Returns the
    /// ` 100644`-style suffix for the index line when modes are equal.
    fn print_mode_lines(
        &self,
        writer: &mut dyn Write,
        a: &DiffTarget,
        b: &DiffTarget,
    ) -> anyhow::Result<String> {
        match (a.mode, b.mode) {
            (None, Some(mode)) => {
                writeln!(writer, "new file mode {}", mode.as_padded_str())?;
                Ok(String::new())
            }
            (Some(mode), None) => {
                writeln!(writer, "deleted file mode {}", mode.as_padded_str())?;
                Ok(String::new())
            }
            (Some(old), Some(new)) if old != new => {
                writeln!(writer, "old mode {}", old.as_padded_str())?;
                writeln!(writer, "new mode {}", new.as_padded_str())?;
                Ok(String::new())
            }
            (Some(mode), Some(_)) => Ok(format!(" {}", mode.as_padded_str())),
            (None, None) => Ok(String::new()),
        }
    }

    /// `--name-status` rendering of a change set.
    pub fn print_name_status(
        writer: &mut dyn Write,
        changes: &ChangeSet,
    ) -> anyhow::Result<()> {
        for (path, change) in changes {
            writeln!(writer, "{}\t{}", change.status_char(), path.display())?;
        }

        Ok(())
    }

    /// `--name-only` rendering of a change set.
    pub fn print_name_only(writer: &mut dyn Write, changes: &ChangeSet) -> anyhow::Result<()> {
        for path in changes.keys() {
            writeln!(writer, "{}", path.display())?;
        }

        Ok(())
    }

    /// `--stat` rendering: per-file change counts and a summary line.
    pub fn print_stat(&self, writer: &mut dyn Write, changes: &ChangeSet) -> anyhow::Result<()> {
        let mut files = 0usize;
        let mut insertions = 0usize;
        let mut deletions = 0usize;

        for (path, change) in changes {
            let a = match change.old_entry() {
                Some(entry) => DiffTarget::from_database_entry(self.database, path, entry)?,
                None => DiffTarget::absent(path),
            };
            let b = match change.new_entry() {
                Some(entry) => DiffTarget::from_database_entry(self.database, path, entry)?,
                None => DiffTarget::absent(path),
            };

            let (added, removed) = if a.is_binary() || b.is_binary() {
                (0, 0)
            } else {
                let a_lines = myers::split_lines(&a.content);
                let b_lines = myers::split_lines(&b.content);
                let edits = myers::diff_lines(&a_lines, &b_lines);

                (
                    edits.iter().filter(|e| e.kind == EditKind::Ins).count(),
                    edits.iter().filter(|e| e.kind == EditKind::Del).count(),
                )
            };

            files += 1;
            insertions += added;
            deletions += removed;

            let graph = format!("{}{}", "+".repeat(added.min(40)), "-".repeat(removed.min(40)));
            writeln!(
                writer,
                " {} | {} {}",
                path.display(),
                added + removed,
                graph
            )?;
        }

        if files > 0 {
            let mut summary = format!(
                " {} file{} changed",
                files,
                if files == 1 { "" } else { "s" }
            );
            if insertions > 0 {
                summary.push_str(&format!(
                    ", {} insertion{}(+)",
                    insertions,
                    if insertions == 1 { "" } else { "s" }
                ));
            }
            if deletions > 0 {
                summary.push_str(&format!(
                    ", {} deletion{}(-)",
                    deletions,
                    if deletions == 1 { "" } else { "s" }
                ));
            }
            writeln!(writer, "{}", summary)?;
        }

        Ok(())
    }
}
