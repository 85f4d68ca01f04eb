//! Read-only iteration API (spec §4.8, component C8): a callback-driven
//! walk over any index file, used by higher-level query tools.
//!
//! Reads the file whole rather than memory-mapping it — bounds-checking is
//! identical either way per spec §4.8, and reading avoids an `unsafe`
//! `mmap` dependency this crate otherwise has no use for.

use std::fs;
use std::path::Path;

use crate::error::Result;
use crate::format::{decode_entry, decode_header, verify_file, Entry, HEADER_SIZE};
use crate::hash::DIGEST_BUF_LEN;
use crate::layout::tag_for_filename;
use crate::skiplist::IndexTag;

/// Borrowed view of one entry handed to the iteration callback, plus which
/// index file it came from (spec §6 "visitor receives an abstract entry
/// view").
pub struct EntryView<'a> {
    pub path: &'a str,
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub dev: u32,
    pub file_size: u64,
    pub mtime_wall: u64,
    pub ctime_wall: u64,
    pub hash_type: u16,
    pub hash: &'a [u8; DIGEST_BUF_LEN],
    pub is_deleted: bool,
    pub index_tag: &'a IndexTag,
}

impl<'a> EntryView<'a> {
    /// Lower-case hex encoding of the full 64-byte hash buffer, the `hash
    /// (hex)` field the query front-end's entry view exposes (spec §6).
    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash)
    }
}

impl<'a> From<(&'a Entry, &'a IndexTag)> for EntryView<'a> {
    fn from((entry, tag): (&'a Entry, &'a IndexTag)) -> Self {
        Self {
            path: &entry.path,
            mode: entry.mode,
            uid: entry.uid,
            gid: entry.gid,
            dev: entry.dev,
            file_size: entry.file_size,
            mtime_wall: entry.mtime_wall,
            ctime_wall: entry.ctime_wall,
            hash_type: entry.hash_type,
            hash: &entry.hash,
            is_deleted: entry.is_deleted(),
            index_tag: tag,
        }
    }
}

/// Read `path`, verify its header and digest, then invoke `callback` once
/// per entry in path order. `callback` returns `false` to stop early. A
/// structural decode failure or digest mismatch is returned as an error
/// after any callbacks already fired for entries preceding it (spec §4.8
/// last bullet).
pub fn iterate<F>(path: &Path, mut callback: F) -> Result<()>
where
    F: FnMut(EntryView) -> bool,
{
    let buf = fs::read(path)?;
    let tag = path
        .file_name()
        .map(|n| tag_for_filename(&n.to_string_lossy()))
        .unwrap_or_else(|| IndexTag::Scan(path.display().to_string()));

    decode_header(&buf)?;

    let mut offset = HEADER_SIZE;
    while offset < buf.len() {
        let (entry, next) = decode_entry(&buf, offset)?;
        let view = EntryView::from((&entry, &tag));
        if !callback(view) {
            return Ok(());
        }
        offset = next;
    }

    verify_file(&buf)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::encode_file;
    use crate::hash::{HashAlgorithm, HASH_TYPE_BLAKE3};
    use tempfile::NamedTempFile;

    fn sample_entry(path: &str) -> Entry {
        Entry {
            ctime_wall: 1,
            mtime_wall: 2,
            dev: 0,
            ino: 0,
            mode: 0o100644,
            uid: 0,
            gid: 0,
            file_size: 10,
            entry_flags: 0,
            hash_type: HASH_TYPE_BLAKE3,
            hash: [3u8; DIGEST_BUF_LEN],
            path: path.to_owned(),
        }
    }

    #[test]
    fn iterate_visits_entries_in_order() {
        let entries = vec![sample_entry("a"), sample_entry("b"), sample_entry("c")];
        let bytes = encode_file(HashAlgorithm::Blake3, &entries).unwrap();

        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), &bytes).unwrap();

        let mut seen = Vec::new();
        iterate(file.path(), |view| {
            seen.push(view.path.to_owned());
            true
        })
        .unwrap();

        assert_eq!(seen, vec!["a", "b", "c"]);
    }

    #[test]
    fn iterate_stops_early_on_false() {
        let entries = vec![sample_entry("a"), sample_entry("b"), sample_entry("c")];
        let bytes = encode_file(HashAlgorithm::Blake3, &entries).unwrap();

        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), &bytes).unwrap();

        let mut seen = Vec::new();
        iterate(file.path(), |view| {
            seen.push(view.path.to_owned());
            view.path != "b"
        })
        .unwrap();

        assert_eq!(seen, vec!["a", "b"]);
    }

    #[test]
    fn hash_hex_matches_manual_encoding() {
        let entries = vec![sample_entry("a")];
        let bytes = encode_file(HashAlgorithm::Blake3, &entries).unwrap();

        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), &bytes).unwrap();

        let mut hex_seen = String::new();
        iterate(file.path(), |view| {
            hex_seen = view.hash_hex();
            true
        })
        .unwrap();

        assert_eq!(hex_seen, hex::encode([3u8; DIGEST_BUF_LEN]));
    }

    #[test]
    fn iterate_reports_digest_mismatch_after_partial_callbacks() {
        let entries = vec![sample_entry("a"), sample_entry("b")];
        let bytes = encode_file(HashAlgorithm::Blake3, &entries).unwrap();
        let mut corrupted = bytes.clone();
        *corrupted.last_mut().unwrap() ^= 0xFF;

        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), &corrupted).unwrap();

        let mut seen = Vec::new();
        let result = iterate(file.path(), |view| {
            seen.push(view.path.to_owned());
            true
        });

        assert_eq!(seen, vec!["a", "b"]);
        assert!(result.is_err());
    }
}
