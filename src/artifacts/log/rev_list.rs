//! Commit-date ordered history walk
//!
//! Walks the parent DAG from a set of tips, yielding each commit once,
//! newest first by committer date with oid as the tiebreaker. Merge
//! parents are all followed, so diamonds deduplicate naturally.

use crate::areas::database::Database;
use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::object_id::ObjectId;
use std::collections::{BinaryHeap, HashSet};

pub struct RevList<'r> {
    database: &'r Database,
    queue: BinaryHeap<(chrono::DateTime<chrono::FixedOffset>, ObjectId)>,
    seen: HashSet<ObjectId>,
    remaining: Option<usize>,
}

impl<'r> RevList<'r> {
    pub fn new(
        database: &'r Database,
        start: impl IntoIterator<Item = ObjectId>,
        limit: Option<usize>,
    ) -> anyhow::Result<Self> {
        let mut queue = BinaryHeap::new();
        let mut seen = HashSet::new();

        for oid in start {
            if seen.insert(oid.clone()) {
                let commit = database.load_commit(&oid)?;
                queue.push((commit.timestamp(), oid));
            }
        }

        Ok(RevList {
            database,
            queue,
            seen,
            remaining: limit,
        })
    }

    fn next_commit(&mut self) -> anyhow::Result<Option<(ObjectId, Commit)>> {
        if self.remaining == Some(0) {
            return Ok(None);
        }

        let Some((_, oid)) = self.queue.pop() else {
            return Ok(None);
        };
        let commit = self.database.load_commit(&oid)?;

        for parent in commit.parents() {
            if self.seen.insert(parent.clone()) {
                let parent_commit = self.database.load_commit(parent)?;
                self.queue.push((parent_commit.timestamp(), parent.clone()));
            }
        }

        if let Some(remaining) = &mut self.remaining {
            *remaining -= 1;
        }

        Ok(Some((oid, commit)))
    }
}

impl Iterator for RevList<'_> {
    type Item = anyhow::Result<(ObjectId, Commit)>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_commit().transpose()
    }
}
