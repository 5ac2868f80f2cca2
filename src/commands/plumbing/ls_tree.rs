use crate::areas::repository::Repository;
use crate::artifacts::branch::revision::Revision;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use std::io::Write;
use std::path::{Path, PathBuf};

impl Repository {
    /// List a revision's tree, one level deep or recursively with
    /// `-r`.
    pub fn ls_tree(&self, rev: &str, recursive: bool) -> anyhow::Result<()> {
        let oid = Revision::resolve_str(rev, self)?;
        let tree_oid = self.database().tree_oid_of(&oid)?;

        self.print_tree_level(&tree_oid, Path::new(""), recursive)
    }

    fn print_tree_level(
        &self,
        tree_oid: &ObjectId,
        prefix: &Path,
        recursive: bool,
    ) -> anyhow::Result<()> {
        let tree = self
            .database()
            .parse_object_as_tree(tree_oid)?
            .ok_or_else(|| anyhow::anyhow!("object {} is not a tree", tree_oid))?;

        for (name, entry) in tree.entries() {
            let path: PathBuf = if prefix.as_os_str().is_empty() {
                PathBuf::from(name)
            } else {
                prefix.join(name)
            };

            if entry.is_tree() && recursive {
                self.print_tree_level(&entry.oid, &path, recursive)?;
                continue;
            }

            let object_type = if entry.is_tree() {
                ObjectType::Tree
            } else {
                ObjectType::Blob
            };
            writeln!(
                self.writer(),
                "{} {} {}\t{}",
                entry.mode.as_padded_str(),
                object_type,
                entry.oid,
                path.display()
            )?;
        }

        Ok(())
    }
}
