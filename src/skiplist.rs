//! In-memory ordered index keyed by path (spec §4.3, component C3): a
//! probabilistic skip list, same shape as the teacher's on-disk
//! block/codec indexes but held in memory as the scan/merge working set
//! rather than serialized directly.
//!
//! The teacher has no skip list of its own to generalize from (its
//! `FileIndex` is a flat sorted `Vec`), so this is an arena-backed skip
//! list in the usual textbook shape, adapted to the safe-Rust idiom the
//! rest of this crate follows: nodes live in a `Vec<Node>` and links are
//! `Option<usize>` indices rather than raw or `unsafe` pointers, so there's
//! no `unsafe` anywhere in this module.

use rand::Rng;

use crate::format::Entry;

const MAX_HEIGHT: usize = 16;
const PROMOTE_PROBABILITY: f64 = 0.5;

/// Which on-disk file an in-memory index stands in for, used by the
/// iteration API to report where a given entry came from (spec §4.8).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndexTag {
    Main,
    Cache,
    Scan(String),
}

struct Node {
    path: String,
    entry: Entry,
    /// `forward[level]` is the index of the next node at that level, or
    /// `None` at the tail.
    forward: Vec<Option<usize>>,
    deleted: bool,
}

/// An ordered, path-keyed in-memory map backed by a skip list. Used to hold
/// a decoded index file (main, cache, or a scan output) while the update
/// protocol merges two or three of these together (spec §4.6).
pub struct OrderedIndex {
    nodes: Vec<Node>,
    /// `head[level]` is the index of the first node at that level.
    head: Vec<Option<usize>>,
    len: usize,
    tombstones: usize,
}

impl Default for OrderedIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderedIndex {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            head: vec![None; MAX_HEIGHT],
            len: 0,
            tombstones: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Live (non-tombstoned) entry count.
    pub fn live_len(&self) -> usize {
        self.len - self.tombstones
    }

    fn random_height<R: Rng>(rng: &mut R) -> usize {
        let mut height = 1;
        while height < MAX_HEIGHT && rng.gen_bool(PROMOTE_PROBABILITY) {
            height += 1;
        }
        height
    }

    /// Find, for each level, the last node whose path is strictly less than
    /// `path` — the standard skip list search, returning the predecessor
    /// chain used by both `get` and `insert`.
    fn find_predecessors(&self, path: &str) -> [Option<usize>; MAX_HEIGHT] {
        let mut update = [None; MAX_HEIGHT];
        let mut cursor: Option<usize> = None;

        for level in (0..MAX_HEIGHT).rev() {
            loop {
                let next = match cursor {
                    Some(idx) => self.nodes[idx].forward[level],
                    None => self.head[level],
                };
                match next {
                    Some(idx) if self.nodes[idx].path.as_str() < path => {
                        cursor = Some(idx);
                    }
                    _ => break,
                }
            }
            update[level] = cursor;
        }
        update
    }

    pub fn get(&self, path: &str) -> Option<&Entry> {
        let update = self.find_predecessors(path);
        let candidate = match update[0] {
            Some(idx) => self.nodes[idx].forward[0],
            None => self.head[0],
        };
        candidate
            .filter(|&idx| self.nodes[idx].path == path)
            .map(|idx| &self.nodes[idx].entry)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// Insert or replace the entry for `path`. Returns the previous entry,
    /// if any.
    pub fn insert(&mut self, path: String, entry: Entry) -> Option<Entry> {
        self.insert_with_rng(&mut rand::thread_rng(), path, entry)
    }

    fn insert_with_rng<R: Rng>(&mut self, rng: &mut R, path: String, entry: Entry) -> Option<Entry> {
        let update = self.find_predecessors(&path);
        let existing = match update[0] {
            Some(idx) => self.nodes[idx].forward[0],
            None => self.head[0],
        };

        if let Some(idx) = existing {
            if self.nodes[idx].path == path {
                let was_deleted = self.nodes[idx].deleted;
                let old = std::mem::replace(&mut self.nodes[idx].entry, entry);
                self.nodes[idx].deleted = false;
                if was_deleted {
                    self.tombstones -= 1;
                }
                return Some(old);
            }
        }

        let height = Self::random_height(rng);
        let new_idx = self.nodes.len();
        let mut forward = vec![None; height];
        for level in 0..height {
            let prev = update[level];
            let next = match prev {
                Some(idx) => self.nodes[idx].forward.get(level).copied().flatten(),
                None => self.head[level],
            };
            forward[level] = next;
            match prev {
                Some(idx) => {
                    if level < self.nodes[idx].forward.len() {
                        self.nodes[idx].forward[level] = Some(new_idx);
                    }
                }
                None => self.head[level] = Some(new_idx),
            }
        }

        self.nodes.push(Node {
            path,
            entry,
            forward,
            deleted: false,
        });
        self.len += 1;
        None
    }

    /// Mark `path`'s entry as soft-deleted without removing it from the
    /// structure (spec §3 "Soft delete", §4.3). No-op if the path is
    /// absent.
    pub fn mark_deleted(&mut self, path: &str) -> bool {
        let update = self.find_predecessors(path);
        let candidate = match update[0] {
            Some(idx) => self.nodes[idx].forward[0],
            None => self.head[0],
        };
        match candidate.filter(|&idx| self.nodes[idx].path == path) {
            Some(idx) if !self.nodes[idx].deleted => {
                self.nodes[idx].deleted = true;
                self.nodes[idx].entry.set_deleted(true);
                self.tombstones += 1;
                true
            }
            _ => false,
        }
    }

    pub fn is_tombstoned(&self, path: &str) -> bool {
        let update = self.find_predecessors(path);
        let candidate = match update[0] {
            Some(idx) => self.nodes[idx].forward[0],
            None => self.head[0],
        };
        candidate
            .filter(|&idx| self.nodes[idx].path == path)
            .map(|idx| self.nodes[idx].deleted)
            .unwrap_or(false)
    }

    /// Visit every entry in path order, tombstones included. `f` returns
    /// `false` to stop early (spec §4.3 "for_each with early stop").
    pub fn for_each<F: FnMut(&str, &Entry, bool) -> bool>(&self, mut f: F) {
        let mut cursor = self.head[0];
        while let Some(idx) = cursor {
            let node = &self.nodes[idx];
            if !f(&node.path, &node.entry, node.deleted) {
                return;
            }
            cursor = node.forward[0];
        }
    }

    /// Build an ordered index from an already sorted `(path, entry)` stream
    /// (e.g. a decoded index file), rather than inserting one at a time.
    pub fn from_sorted(entries: impl IntoIterator<Item = (String, Entry)>) -> Self {
        let mut index = Self::new();
        let mut rng = rand::thread_rng();
        for (path, entry) in entries {
            let deleted = entry.is_deleted();
            index.insert_with_rng(&mut rng, path.clone(), entry);
            if deleted {
                index.mark_deleted(&path);
            }
        }
        index
    }

    /// Rebuild this index with tombstoned entries physically removed
    /// (spec §9 "Compaction"). Returns the number of entries dropped.
    pub fn compact(&mut self) -> usize {
        let mut live = Vec::with_capacity(self.live_len());
        self.for_each(|path, entry, deleted| {
            if !deleted {
                live.push((path.to_owned(), entry.clone()));
            }
            true
        });
        let dropped = self.len - live.len();
        *self = Self::from_sorted(live);
        dropped
    }

    /// Iterate entries in order as owned path/entry pairs, tombstones
    /// included — convenience for callers that want a `Vec` rather than a
    /// callback (the differ and the update protocol's encode step).
    pub fn to_sorted_vec(&self) -> Vec<(String, Entry)> {
        let mut out = Vec::with_capacity(self.len);
        self.for_each(|path, entry, _deleted| {
            out.push((path.to_owned(), entry.clone()));
            true
        });
        out
    }
}
