use crate::areas::repository::Repository;
use crate::artifacts::log::rev_list::RevList;
use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::object_id::ObjectId;
use std::collections::HashMap;
use std::io::Write;

impl Repository {
    /// Print history from HEAD, newest first by commit date.
    pub fn log(&self, oneline: bool, max_count: Option<usize>) -> anyhow::Result<()> {
        let Some(head_oid) = self.refs().read_head()? else {
            writeln!(self.writer(), "No commits found")?;
            return Ok(());
        };

        let decorations = self.ref_decorations(&head_oid)?;
        let rev_list = RevList::new(self.database(), [head_oid.clone()], max_count)?;

        let mut first = true;
        for item in rev_list {
            let (oid, commit) = item?;
            let decoration = decorations.get(&oid).cloned().unwrap_or_default();

            if oneline {
                writeln!(
                    self.writer(),
                    "{}{} {}",
                    oid.to_short_oid(),
                    decoration,
                    commit.short_message()
                )?;
            } else {
                if !first {
                    writeln!(self.writer())?;
                }
                self.print_full_commit(&oid, &commit, &decoration)?;
            }
            first = false;
        }

        Ok(())
    }

    fn print_full_commit(
        &self,
        oid: &ObjectId,
        commit: &Commit,
        decoration: &str,
    ) -> anyhow::Result<()> {
        let mut writer = self.writer();

        writeln!(writer, "commit {}{}", oid, decoration)?;
        if commit.is_merge() {
            let parents = commit
                .parents()
                .iter()
                .map(|p| p.to_short_oid())
                .collect::<Vec<_>>()
                .join(" ");
            writeln!(writer, "Merge: {}", parents)?;
        }
        writeln!(writer, "Author: {}", commit.author().display_name())?;
        writeln!(writer, "Date:   {}", commit.author().readable_timestamp())?;
        writeln!(writer)?;
        for line in commit.message().lines() {
            writeln!(writer, "    {}", line)?;
        }

        Ok(())
    }

    /// Decoration suffixes per oid: ` (HEAD -> main, topic)` style.
    fn ref_decorations(&self, head_oid: &ObjectId) -> anyhow::Result<HashMap<ObjectId, String>> {
        let mut names: HashMap<ObjectId, Vec<String>> = HashMap::new();

        let head_branch = self.refs().current_branch()?;
        match &head_branch {
            Some(branch) => names
                .entry(head_oid.clone())
                .or_default()
                .push(format!("HEAD -> {}", branch)),
            None => names
                .entry(head_oid.clone())
                .or_default()
                .push("HEAD".to_string()),
        }

        for (branch, oid) in self.refs().list_branches()? {
            if head_branch.as_ref() == Some(&branch) {
                continue; // already shown in the HEAD arrow
            }
            names.entry(oid).or_default().push(branch.to_string());
        }

        Ok(names
            .into_iter()
            .map(|(oid, refs)| (oid, format!(" ({})", refs.join(", "))))
            .collect())
    }
}
