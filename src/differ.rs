//! Three-way differ (spec §4.5, component C5): a linear merge over two
//! path-sorted `(path, entry)` sequences.

use crate::format::Entry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffKind {
    Unchanged,
    Modified,
    Added,
    Deleted,
}

/// One diff event. `left`/`right` hold whichever side(s) the kind implies
/// are present: `Deleted` only `left`, `Added` only `right`, the other two
/// both.
#[derive(Debug, Clone)]
pub struct DiffEvent<'a> {
    pub path: &'a str,
    pub kind: DiffKind,
    pub left: Option<&'a Entry>,
    pub right: Option<&'a Entry>,
}

/// Merge `left` and `right`, both already sorted ascending by path, calling
/// `callback` once per event in ascending path order. `callback` returns
/// `false` to stop early. O(n+m), single pass, no per-entry allocation
/// beyond the borrowed event itself (spec §4.5).
pub fn diff<'a, L, R, F>(left: L, right: R, mut callback: F)
where
    L: IntoIterator<Item = (&'a str, &'a Entry)>,
    R: IntoIterator<Item = (&'a str, &'a Entry)>,
    F: FnMut(DiffEvent<'a>) -> bool,
{
    let mut left_iter = left.into_iter().peekable();
    let mut right_iter = right.into_iter().peekable();

    loop {
        match (left_iter.peek(), right_iter.peek()) {
            (None, None) => break,
            (Some(&(lp, le)), None) => {
                if !callback(DiffEvent {
                    path: lp,
                    kind: DiffKind::Deleted,
                    left: Some(le),
                    right: None,
                }) {
                    return;
                }
                left_iter.next();
            }
            (None, Some(&(rp, re))) => {
                if !callback(DiffEvent {
                    path: rp,
                    kind: DiffKind::Added,
                    left: None,
                    right: Some(re),
                }) {
                    return;
                }
                right_iter.next();
            }
            (Some(&(lp, le)), Some(&(rp, re))) => {
                if lp < rp {
                    if !callback(DiffEvent {
                        path: lp,
                        kind: DiffKind::Deleted,
                        left: Some(le),
                        right: None,
                    }) {
                        return;
                    }
                    left_iter.next();
                } else if lp > rp {
                    if !callback(DiffEvent {
                        path: rp,
                        kind: DiffKind::Added,
                        left: None,
                        right: Some(re),
                    }) {
                        return;
                    }
                    right_iter.next();
                } else {
                    let kind = if le.same_content(re) {
                        DiffKind::Unchanged
                    } else {
                        DiffKind::Modified
                    };
                    if !callback(DiffEvent {
                        path: lp,
                        kind,
                        left: Some(le),
                        right: Some(re),
                    }) {
                        return;
                    }
                    left_iter.next();
                    right_iter.next();
                }
            }
        }
    }
}
