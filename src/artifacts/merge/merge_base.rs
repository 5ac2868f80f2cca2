//! Merge-base search
//!
//! Finds the lowest common ancestor of two commits with an interleaved
//! breadth-first walk: both frontiers expand one generation per round
//! and the first commits seen from both sides are the candidates. The
//! result is deterministic: a side's own starting commit wins outright
//! (the ancestor case), remaining ties resolve to the smallest oid.

use crate::artifacts::merge::debug_log;
use crate::artifacts::objects::commit::SlimCommit;
use crate::artifacts::objects::object_id::ObjectId;
use std::collections::{HashSet, VecDeque};

pub struct MergeBaseFinder<LoaderFn>
where
    LoaderFn: FnMut(&ObjectId) -> anyhow::Result<SlimCommit>,
{
    load: LoaderFn,
}

impl<LoaderFn> MergeBaseFinder<LoaderFn>
where
    LoaderFn: FnMut(&ObjectId) -> anyhow::Result<SlimCommit>,
{
    pub fn new(load: LoaderFn) -> Self {
        Self { load }
    }

    /// The merge base of `a` and `b`, or `None` for unrelated
    /// histories.
    pub fn find(&mut self, a: &ObjectId, b: &ObjectId) -> anyhow::Result<Option<ObjectId>> {
        if a == b {
            return Ok(Some(a.clone()));
        }

        let mut seen_a: HashSet<ObjectId> = HashSet::from([a.clone()]);
        let mut seen_b: HashSet<ObjectId> = HashSet::from([b.clone()]);
        let mut frontier_a: VecDeque<ObjectId> = VecDeque::from([a.clone()]);
        let mut frontier_b: VecDeque<ObjectId> = VecDeque::from([b.clone()]);

        while !frontier_a.is_empty() || !frontier_b.is_empty() {
            self.expand_one_generation(&mut frontier_a, &mut seen_a)?;
            self.expand_one_generation(&mut frontier_b, &mut seen_b)?;

            let mut candidates: Vec<&ObjectId> = seen_a.intersection(&seen_b).collect();
            if candidates.is_empty() {
                continue;
            }
            candidates.sort();

            debug_log!(
                "merge-base candidates: {}",
                candidates
                    .iter()
                    .map(|oid| oid.to_short_oid())
                    .collect::<Vec<_>>()
                    .join(", ")
            );

            // a starting commit among the candidates means one side is
            // an ancestor of the other
            if candidates.contains(&a) {
                return Ok(Some(a.clone()));
            }
            if candidates.contains(&b) {
                return Ok(Some(b.clone()));
            }

            return Ok(candidates.first().map(|oid| (*oid).clone()));
        }

        Ok(None)
    }

    /// Whether `ancestor` is reachable from `descendant`.
    pub fn is_ancestor(
        &mut self,
        ancestor: &ObjectId,
        descendant: &ObjectId,
    ) -> anyhow::Result<bool> {
        Ok(self.find(ancestor, descendant)?.as_ref() == Some(ancestor))
    }

    fn expand_one_generation(
        &mut self,
        frontier: &mut VecDeque<ObjectId>,
        seen: &mut HashSet<ObjectId>,
    ) -> anyhow::Result<()> {
        let mut next = VecDeque::new();

        while let Some(oid) = frontier.pop_front() {
            let commit = (self.load)(&oid)?;
            for parent in commit.parents {
                if seen.insert(parent.clone()) {
                    next.push_back(parent);
                }
            }
        }

        *frontier = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct Graph {
        commits: HashMap<ObjectId, Vec<ObjectId>>,
    }

    impl Graph {
        fn new() -> Self {
            Graph {
                commits: HashMap::new(),
            }
        }

        fn add(&mut self, oid: &ObjectId, parents: &[&ObjectId]) {
            self.commits
                .insert(oid.clone(), parents.iter().map(|&p| p.clone()).collect());
        }

        fn finder(&self) -> MergeBaseFinder<impl FnMut(&ObjectId) -> anyhow::Result<SlimCommit> + '_> {
            MergeBaseFinder::new(move |oid| {
                let parents = self
                    .commits
                    .get(oid)
                    .cloned()
                    .ok_or_else(|| anyhow::anyhow!("unknown commit {}", oid))?;
                Ok(SlimCommit {
                    oid: oid.clone(),
                    parents,
                    timestamp: chrono::DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
                        .unwrap(),
                })
            })
        }
    }

    fn oid(name: &str) -> ObjectId {
        let mut hex: String = name.bytes().map(|b| format!("{:02x}", b)).collect();
        while hex.len() < 40 {
            hex.push('0');
        }
        hex.truncate(40);
        ObjectId::try_parse(hex).unwrap()
    }

    #[test]
    fn linear_history_base_is_the_older_commit() {
        // a <- b <- c <- d
        let (a, b, c, d) = (oid("a"), oid("b"), oid("c"), oid("d"));
        let mut graph = Graph::new();
        graph.add(&a, &[]);
        graph.add(&b, &[&a]);
        graph.add(&c, &[&b]);
        graph.add(&d, &[&c]);

        let mut finder = graph.finder();
        assert_eq!(finder.find(&b, &d).unwrap(), Some(b.clone()));
        assert_eq!(finder.find(&d, &b).unwrap(), Some(b.clone()));
        assert_eq!(finder.find(&c, &c).unwrap(), Some(c.clone()));
        assert!(finder.is_ancestor(&a, &d).unwrap());
        assert!(!finder.is_ancestor(&d, &a).unwrap());
    }

    #[test]
    fn forked_history_base_is_the_fork_point() {
        //     a
        //    / \
        //   b   c
        let (a, b, c) = (oid("a"), oid("b"), oid("c"));
        let mut graph = Graph::new();
        graph.add(&a, &[]);
        graph.add(&b, &[&a]);
        graph.add(&c, &[&a]);

        let mut finder = graph.finder();
        assert_eq!(finder.find(&b, &c).unwrap(), Some(a.clone()));
        assert_eq!(finder.find(&c, &b).unwrap(), Some(a));
    }

    #[test]
    fn merge_commit_with_redundant_parent_still_prefers_the_side() {
        // x <- o; m = merge(o, x): o is an ancestor of m even though x
        // is a common ancestor candidate discovered in the same round
        let (x, o, m) = (oid("x"), oid("o"), oid("m"));
        let mut graph = Graph::new();
        graph.add(&x, &[]);
        graph.add(&o, &[&x]);
        graph.add(&m, &[&o, &x]);

        let mut finder = graph.finder();
        assert_eq!(finder.find(&o, &m).unwrap(), Some(o.clone()));
        assert_eq!(finder.find(&m, &o).unwrap(), Some(o));
    }

    #[test]
    fn unrelated_roots_have_no_base() {
        let (a, b) = (oid("a"), oid("b"));
        let mut graph = Graph::new();
        graph.add(&a, &[]);
        graph.add(&b, &[]);

        let mut finder = graph.finder();
        assert_eq!(finder.find(&a, &b).unwrap(), None);
    }

    #[test]
    fn criss_cross_resolves_deterministically() {
        //     a
        //    / \
        //   b   c
        //   |\ /|
        //   | X |
        //   |/ \|
        //   d   e
        let (a, b, c, d, e) = (oid("a"), oid("b"), oid("c"), oid("d"), oid("e"));
        let mut graph = Graph::new();
        graph.add(&a, &[]);
        graph.add(&b, &[&a]);
        graph.add(&c, &[&a]);
        graph.add(&d, &[&b, &c]);
        graph.add(&e, &[&c, &b]);

        let mut finder = graph.finder();
        let forward = finder.find(&d, &e).unwrap().unwrap();
        let backward = finder.find(&e, &d).unwrap().unwrap();

        assert_eq!(forward, backward);
        assert!(forward == b || forward == c);
    }
}
