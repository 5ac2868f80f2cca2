//! Myers shortest edit script over byte-split lines
//!
//! The forward O(ND) algorithm with a full trace for backtracking.
//! Lines keep their terminating newline so diff output can reproduce
//! content byte-for-byte, including a missing final newline.

use std::collections::HashMap;

/// Split content into lines, each keeping its trailing `\n` when
/// present. The final line may lack one.
pub fn split_lines(data: &[u8]) -> Vec<&[u8]> {
    let mut lines = Vec::new();
    let mut start = 0;

    for (i, &byte) in data.iter().enumerate() {
        if byte == b'\n' {
            lines.push(&data[start..=i]);
            start = i + 1;
        }
    }
    if start < data.len() {
        lines.push(&data[start..]);
    }

    lines
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditKind {
    Eq,
    Del,
    Ins,
}

/// One line of the edit script. Line numbers are 1-based; deletions
/// carry only an `a` line, insertions only a `b` line.
#[derive(Debug, Clone, Copy)]
pub struct Edit<'a> {
    pub kind: EditKind,
    pub a_line: Option<usize>,
    pub b_line: Option<usize>,
    pub text: &'a [u8],
}

/// Shortest edit script turning `a` into `b`.
pub fn diff_lines<'a>(a: &[&'a [u8]], b: &[&'a [u8]]) -> Vec<Edit<'a>> {
    let trace = shortest_edit_trace(a, b);
    backtrack(a, b, &trace)
}

/// For each pair of equal lines, map the `a` line number to the `b`
/// line number. Used by the three-way merge to align both sides against
/// the base.
pub fn match_map(a: &[&[u8]], b: &[&[u8]]) -> HashMap<usize, usize> {
    diff_lines(a, b)
        .into_iter()
        .filter(|edit| edit.kind == EditKind::Eq)
        .filter_map(|edit| Some((edit.a_line?, edit.b_line?)))
        .collect()
}

/// Signed-index view over the `v` array of the Myers algorithm.
fn get(v: &[usize], k: isize) -> usize {
    let offset = (v.len() / 2) as isize;
    v[(k + offset) as usize]
}

fn set(v: &mut [usize], k: isize, value: usize) {
    let offset = (v.len() / 2) as isize;
    v[(k + offset) as usize] = value;
}

fn shortest_edit_trace(a: &[&[u8]], b: &[&[u8]]) -> Vec<Vec<usize>> {
    let n = a.len();
    let m = b.len();
    let max = n + m;

    let mut v = vec![0usize; 2 * max + 3];
    let mut trace = Vec::new();

    for d in 0..=(max as isize) {
        trace.push(v.clone());

        let mut k = -d;
        while k <= d {
            let mut x = if k == -d || (k != d && get(&v, k - 1) < get(&v, k + 1)) {
                get(&v, k + 1)
            } else {
                get(&v, k - 1) + 1
            };
            let mut y = (x as isize - k) as usize;

            while x < n && y < m && a[x] == b[y] {
                x += 1;
                y += 1;
            }

            set(&mut v, k, x);

            if x >= n && y >= m {
                return trace;
            }

            k += 2;
        }
    }

    trace
}

fn backtrack<'a>(a: &[&'a [u8]], b: &[&'a [u8]], trace: &[Vec<usize>]) -> Vec<Edit<'a>> {
    let mut edits = Vec::new();
    let mut x = a.len();
    let mut y = b.len();

    for (d, v) in trace.iter().enumerate().rev() {
        if d == 0 {
            // depth zero leaves only the shared diagonal prefix
            while x > 0 && y > 0 {
                edits.push(Edit {
                    kind: EditKind::Eq,
                    a_line: Some(x),
                    b_line: Some(y),
                    text: a[x - 1],
                });
                x -= 1;
                y -= 1;
            }
            break;
        }

        let d = d as isize;
        let k = x as isize - y as isize;

        let prev_k = if k == -d || (k != d && get(v, k - 1) < get(v, k + 1)) {
            k + 1
        } else {
            k - 1
        };
        let prev_x = get(v, prev_k);
        let prev_y = (prev_x as isize - prev_k) as usize;

        while x > prev_x && y > prev_y {
            edits.push(Edit {
                kind: EditKind::Eq,
                a_line: Some(x),
                b_line: Some(y),
                text: a[x - 1],
            });
            x -= 1;
            y -= 1;
        }

        if d > 0 {
            if x == prev_x {
                edits.push(Edit {
                    kind: EditKind::Ins,
                    a_line: None,
                    b_line: Some(y),
                    text: b[y - 1],
                });
                y -= 1;
            } else {
                edits.push(Edit {
                    kind: EditKind::Del,
                    a_line: Some(x),
                    b_line: None,
                    text: a[x - 1],
                });
                x -= 1;
            }
        }
    }

    edits.reverse();
    edits
}

/// A run of edits surrounded by up to `context` lines of unchanged
/// text, as rendered in unified output.
#[derive(Debug, Clone)]
pub struct Hunk<'a> {
    pub a_start: usize,
    pub a_count: usize,
    pub b_start: usize,
    pub b_count: usize,
    pub edits: Vec<Edit<'a>>,
}

impl Hunk<'_> {
    /// Unified hunk header, counts of one elided per convention.
    pub fn header(&self) -> String {
        let a = Self::format_range(self.a_start, self.a_count);
        let b = Self::format_range(self.b_start, self.b_count);
        format!("@@ -{} +{} @@", a, b)
    }

    fn format_range(start: usize, count: usize) -> String {
        if count == 1 {
            format!("{}", start)
        } else {
            format!("{},{}", start, count)
        }
    }
}

/// Group an edit script into hunks with the given context width.
/// Neighboring changes closer than `2 * context` share one hunk.
pub fn hunks<'a>(edits: &[Edit<'a>], context: usize) -> Vec<Hunk<'a>> {
    let change_positions: Vec<usize> = edits
        .iter()
        .enumerate()
        .filter(|(_, edit)| edit.kind != EditKind::Eq)
        .map(|(i, _)| i)
        .collect();

    if change_positions.is_empty() {
        return Vec::new();
    }

    let mut groups: Vec<(usize, usize)> = Vec::new();
    for &pos in &change_positions {
        let start = pos.saturating_sub(context);
        let end = (pos + context).min(edits.len().saturating_sub(1));

        match groups.last_mut() {
            Some((_, group_end)) if start <= *group_end + 1 => *group_end = (*group_end).max(end),
            _ => groups.push((start, end)),
        }
    }

    groups
        .into_iter()
        .map(|(start, end)| {
            let slice = &edits[start..=end];

            let a_before = edits[..start]
                .iter()
                .filter(|e| e.kind != EditKind::Ins)
                .count();
            let b_before = edits[..start]
                .iter()
                .filter(|e| e.kind != EditKind::Del)
                .count();

            let a_count = slice.iter().filter(|e| e.kind != EditKind::Ins).count();
            let b_count = slice.iter().filter(|e| e.kind != EditKind::Del).count();

            Hunk {
                a_start: if a_count == 0 { a_before } else { a_before + 1 },
                a_count,
                b_start: if b_count == 0 { b_before } else { b_before + 1 },
                b_count,
                edits: slice.to_vec(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn lines(text: &str) -> Vec<&[u8]> {
        split_lines(text.as_bytes())
    }

    fn script(a: &str, b: &str) -> String {
        let a = lines(a);
        let b = lines(b);
        diff_lines(&a, &b)
            .iter()
            .map(|edit| {
                let sigil = match edit.kind {
                    EditKind::Eq => ' ',
                    EditKind::Del => '-',
                    EditKind::Ins => '+',
                };
                format!("{}{}", sigil, String::from_utf8_lossy(edit.text).trim_end())
            })
            .collect::<Vec<_>>()
            .join("|")
    }

    #[test]
    fn split_keeps_newlines_and_partial_final_line() {
        let lines = split_lines(b"a\nb\nc");
        assert_eq!(lines, vec![b"a\n".as_slice(), b"b\n".as_slice(), b"c".as_slice()]);

        assert_eq!(split_lines(b""), Vec::<&[u8]>::new());
        assert_eq!(split_lines(b"x\n"), vec![b"x\n".as_slice()]);
    }

    #[test]
    fn identical_inputs_produce_only_equal_edits() {
        let a = lines("a\nb\n");
        let b = lines("a\nb\n");
        let edits = diff_lines(&a, &b);

        assert!(edits.iter().all(|e| e.kind == EditKind::Eq));
        assert_eq!(edits.len(), 2);
    }

    #[test]
    fn single_line_replacement() {
        assert_eq!(script("a\nb\nc\n", "a\nx\nc\n"), " a|-b|+x| c");
    }

    #[test]
    fn pure_insertion_and_deletion() {
        assert_eq!(script("a\nc\n", "a\nb\nc\n"), " a|+b| c");
        assert_eq!(script("a\nb\nc\n", "a\nc\n"), " a|-b| c");
    }

    #[test]
    fn empty_sides() {
        assert_eq!(script("", "a\nb\n"), "+a|+b");
        assert_eq!(script("a\nb\n", ""), "-a|-b");
    }

    #[test]
    fn edit_line_numbers_are_one_based_and_monotonic() {
        let a = lines("a\nb\nc\n");
        let b = lines("a\nx\nc\n");
        let edits = diff_lines(&a, &b);

        assert_eq!(edits[0].a_line, Some(1));
        assert_eq!(edits[0].b_line, Some(1));
        assert_eq!(edits[1].a_line, Some(2)); // deleted `b`
        assert_eq!(edits[2].b_line, Some(2)); // inserted `x`
        assert_eq!(edits[3].a_line, Some(3));
        assert_eq!(edits[3].b_line, Some(3));
    }

    #[test]
    fn match_map_aligns_equal_lines() {
        let a = lines("a\nb\nc\n");
        let b = lines("b\nc\nd\n");
        let map = match_map(&a, &b);

        assert_eq!(map.get(&2), Some(&1));
        assert_eq!(map.get(&3), Some(&2));
        assert_eq!(map.get(&1), None);
    }

    #[test]
    fn distant_changes_produce_separate_hunks() {
        let a = lines("1\n2\n3\n4\n5\n6\n7\n8\n9\n10\n11\n12\n13\n14\n15\n");
        let b = lines("x\n2\n3\n4\n5\n6\n7\n8\n9\n10\n11\n12\n13\n14\ny\n");
        let edits = diff_lines(&a, &b);
        let hunks = hunks(&edits, 3);

        assert_eq!(hunks.len(), 2);
        assert_eq!(hunks[0].header(), "@@ -1,4 +1,4 @@");
        assert_eq!(hunks[1].header(), "@@ -12,4 +12,4 @@");
    }

    #[test]
    fn nearby_changes_merge_into_one_hunk() {
        let a = lines("1\n2\n3\n4\n5\n6\n");
        let b = lines("x\n2\n3\n4\n5\ny\n");
        let edits = diff_lines(&a, &b);
        let hunks = hunks(&edits, 3);

        assert_eq!(hunks.len(), 1);
        assert_eq!(hunks[0].header(), "@@ -1,6 +1,6 @@");
    }

    #[test]
    fn pure_append_hunk_header() {
        let a = lines("");
        let b = lines("new\n");
        let edits = diff_lines(&a, &b);
        let hunks = hunks(&edits, 3);

        assert_eq!(hunks.len(), 1);
        assert_eq!(hunks[0].header(), "@@ -0,0 +1 @@");
    }
}
