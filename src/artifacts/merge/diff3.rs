//! Three-way line merge
//!
//! Pure function of three byte sequences. Both sides are aligned
//! against the base through equal-line match maps; regions where only
//! one side changed take that side, regions where both sides changed
//! identically collapse, and overlapping changes become conflict hunks
//! delimited by `<<<<<<<`/`=======`/`>>>>>>>` markers.

use crate::artifacts::diff::myers::{match_map, split_lines};
use bytes::Bytes;
use std::collections::HashMap;

/// Marker label for our side of a conflict.
pub const OURS_LABEL: &str = "ours";

/// Marker label for their side of a conflict.
pub const THEIRS_LABEL: &str = "theirs";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeResult {
    pub content: Bytes,
    pub conflicted: bool,
}

#[derive(Debug)]
enum Chunk<'a> {
    Clean(Vec<&'a [u8]>),
    Conflict {
        ours: Vec<&'a [u8]>,
        theirs: Vec<&'a [u8]>,
    },
}

/// Merge `ours` and `theirs` relative to `base`.
pub fn merge_blobs(base: &[u8], ours: &[u8], theirs: &[u8]) -> MergeResult {
    merge_blobs_with_labels(base, ours, theirs, OURS_LABEL, THEIRS_LABEL)
}

pub fn merge_blobs_with_labels(
    base: &[u8],
    ours: &[u8],
    theirs: &[u8],
    ours_label: &str,
    theirs_label: &str,
) -> MergeResult {
    // the trivial resolutions need no line analysis
    if ours == theirs {
        return MergeResult {
            content: Bytes::copy_from_slice(ours),
            conflicted: false,
        };
    }
    if ours == base {
        return MergeResult {
            content: Bytes::copy_from_slice(theirs),
            conflicted: false,
        };
    }
    if theirs == base {
        return MergeResult {
            content: Bytes::copy_from_slice(ours),
            conflicted: false,
        };
    }

    let chunks = Diff3::new(base, ours, theirs).generate_chunks();

    let mut content = Vec::new();
    let mut conflicted = false;
    for chunk in &chunks {
        match chunk {
            Chunk::Clean(lines) => {
                for line in lines {
                    content.extend_from_slice(line);
                }
            }
            Chunk::Conflict { ours, theirs } => {
                conflicted = true;
                append_marker(&mut content, b'<', ours_label);
                for line in ours {
                    content.extend_from_slice(line);
                }
                ensure_newline(&mut content);
                content.extend_from_slice(b"=======\n");
                for line in theirs {
                    content.extend_from_slice(line);
                }
                ensure_newline(&mut content);
                append_marker(&mut content, b'>', theirs_label);
            }
        }
    }

    MergeResult {
        content: Bytes::from(content),
        conflicted,
    }
}

fn append_marker(content: &mut Vec<u8>, sigil: u8, label: &str) {
    ensure_newline(content);
    content.extend(std::iter::repeat_n(sigil, 7));
    content.push(b' ');
    content.extend_from_slice(label.as_bytes());
    content.push(b'\n');
}

fn ensure_newline(content: &mut Vec<u8>) {
    if !content.is_empty() && content.last() != Some(&b'\n') {
        content.push(b'\n');
    }
}

/// The chunk generator. Line bookkeeping is 1-based: `line_*` counts
/// lines already consumed on each of the three sequences.
struct Diff3<'a> {
    base: Vec<&'a [u8]>,
    ours: Vec<&'a [u8]>,
    theirs: Vec<&'a [u8]>,
    /// base line number → ours line number for equal lines
    match_ours: HashMap<usize, usize>,
    /// base line number → theirs line number for equal lines
    match_theirs: HashMap<usize, usize>,
    line_base: usize,
    line_ours: usize,
    line_theirs: usize,
    chunks: Vec<Chunk<'a>>,
}

impl<'a> Diff3<'a> {
    fn new(base: &'a [u8], ours: &'a [u8], theirs: &'a [u8]) -> Self {
        let base = split_lines(base);
        let ours = split_lines(ours);
        let theirs = split_lines(theirs);

        let match_ours = match_map(&base, &ours);
        let match_theirs = match_map(&base, &theirs);

        Diff3 {
            base,
            ours,
            theirs,
            match_ours,
            match_theirs,
            line_base: 0,
            line_ours: 0,
            line_theirs: 0,
            chunks: Vec::new(),
        }
    }

    fn generate_chunks(mut self) -> Vec<Chunk<'a>> {
        loop {
            match self.find_next_mismatch() {
                Some(1) => {
                    let (base, ours, theirs) = self.find_next_match();
                    match (ours, theirs) {
                        (Some(ours), Some(theirs)) => self.emit_chunk(base, ours, theirs),
                        _ => {
                            self.emit_final_chunk();
                            return self.chunks;
                        }
                    }
                }
                Some(i) => self.emit_chunk(
                    self.line_base + i,
                    self.line_ours + i,
                    self.line_theirs + i,
                ),
                None => {
                    self.emit_final_chunk();
                    return self.chunks;
                }
            }
        }
    }

    /// Offset of the first line (1-based, relative to the consumed
    /// position) where either side stops matching the base.
    fn find_next_mismatch(&self) -> Option<usize> {
        let mut i = 1;

        while self.in_bounds(i)
            && Self::matches_at(&self.match_ours, self.line_base, self.line_ours, i)
            && Self::matches_at(&self.match_theirs, self.line_base, self.line_theirs, i)
        {
            i += 1;
        }

        if self.in_bounds(i) { Some(i) } else { None }
    }

    fn in_bounds(&self, i: usize) -> bool {
        self.line_base + i <= self.base.len()
            || self.line_ours + i <= self.ours.len()
            || self.line_theirs + i <= self.theirs.len()
    }

    fn matches_at(
        matches: &HashMap<usize, usize>,
        line_base: usize,
        line_side: usize,
        i: usize,
    ) -> bool {
        matches.get(&(line_base + i)) == Some(&(line_side + i))
    }

    /// Next base line matched by both sides, with the side line
    /// numbers it maps to.
    fn find_next_match(&self) -> (usize, Option<usize>, Option<usize>) {
        let mut base_line = self.line_base + 1;

        while base_line <= self.base.len()
            && !(self.match_ours.contains_key(&base_line)
                && self.match_theirs.contains_key(&base_line))
        {
            base_line += 1;
        }

        (
            base_line,
            self.match_ours.get(&base_line).copied(),
            self.match_theirs.get(&base_line).copied(),
        )
    }

    /// Emit the chunk ending just before the given 1-based line numbers.
    fn emit_chunk(&mut self, base_end: usize, ours_end: usize, theirs_end: usize) {
        let base = self.base[self.line_base..base_end - 1].to_vec();
        let ours = self.ours[self.line_ours..ours_end - 1].to_vec();
        let theirs = self.theirs[self.line_theirs..theirs_end - 1].to_vec();

        self.write_chunk(base, ours, theirs);

        self.line_base = base_end - 1;
        self.line_ours = ours_end - 1;
        self.line_theirs = theirs_end - 1;
    }

    fn emit_final_chunk(&mut self) {
        let base = self.base[self.line_base..].to_vec();
        let ours = self.ours[self.line_ours..].to_vec();
        let theirs = self.theirs[self.line_theirs..].to_vec();

        self.write_chunk(base, ours, theirs);
    }

    fn write_chunk(&mut self, base: Vec<&'a [u8]>, ours: Vec<&'a [u8]>, theirs: Vec<&'a [u8]>) {
        if ours == base || ours == theirs {
            self.push_clean(theirs);
        } else if theirs == base {
            self.push_clean(ours);
        } else {
            self.chunks.push(Chunk::Conflict { ours, theirs });
        }
    }

    fn push_clean(&mut self, lines: Vec<&'a [u8]>) {
        if lines.is_empty() {
            return;
        }
        match self.chunks.last_mut() {
            Some(Chunk::Clean(existing)) => existing.extend(lines),
            _ => self.chunks.push(Chunk::Clean(lines)),
        }
    }
}
