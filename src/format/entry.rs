//! Entry records (spec §3 "Entry", §4.1 `encode_entry`/`decode_entry`).
//!
//! Layout (host byte order, see `header.rs`):
//!
//! ```text
//! offset  size  field
//!      0     4  size          total record bytes, including padding
//!      4     8  ctime_wall
//!     12     8  mtime_wall
//!     20     4  dev
//!     24     4  ino
//!     28     4  mode
//!     32     4  uid
//!     36     4  gid
//!     40     8  file_size
//!     48     2  entry_flags
//!     50     2  hash_type
//!     52    64  hash
//!    116     -  path (UTF-8, NUL-terminated, zero-padded to 8 bytes)
//! ```

use byteorder::{ByteOrder, NativeEndian};

use crate::error::{DcfhError, Result};
use crate::hash::{HashAlgorithm, DIGEST_BUF_LEN};

/// Bytes of fixed-width fields before the variable-length path, including
/// the leading `size` field itself.
pub const FIXED_PREFIX: usize = 4 + 8 + 8 + 4 + 4 + 4 + 4 + 4 + 8 + 2 + 2 + DIGEST_BUF_LEN; // 116

/// Decode rejects any entry whose declared `size` is below this (spec §4.1:
/// "EntryTooSmall if size < fixed_prefix + 9"). Encode always rounds up to
/// at least this many bytes (then to the next 8-byte boundary), so a
/// legitimately encoded entry — however short its path — never trips this
/// check; see DESIGN.md for why the literal "+9" threshold and the 8-byte
/// alignment invariant only reconcile this way.
pub const MIN_ENTRY_SIZE_THRESHOLD: usize = FIXED_PREFIX + 9;

pub const MAX_ENTRY_SIZE: usize = 4096;

/// Longest path `encode_entry` will accept: the largest that still fits a
/// fixed-prefix + path + NUL inside `MAX_ENTRY_SIZE`.
pub const MAX_PATH_LEN: usize = MAX_ENTRY_SIZE - FIXED_PREFIX - 1;

pub const ENTRY_FLAG_DELETED: u16 = 0x0001;

#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub ctime_wall: u64,
    pub mtime_wall: u64,
    pub dev: u32,
    pub ino: u32,
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub file_size: u64,
    pub entry_flags: u16,
    pub hash_type: u16,
    pub hash: [u8; DIGEST_BUF_LEN],
    pub path: String,
}

impl Entry {
    pub fn is_deleted(&self) -> bool {
        self.entry_flags & ENTRY_FLAG_DELETED != 0
    }

    pub fn set_deleted(&mut self, deleted: bool) {
        if deleted {
            self.entry_flags |= ENTRY_FLAG_DELETED;
        } else {
            self.entry_flags &= !ENTRY_FLAG_DELETED;
        }
    }

    pub fn hash_algorithm(&self) -> Option<HashAlgorithm> {
        HashAlgorithm::from_tag(self.hash_type)
    }

    /// Byte length of a name-checked on-disk encoding of this entry,
    /// without actually encoding it — used by callers sizing buffers ahead
    /// of a bulk rewrite.
    pub fn encoded_len(&self) -> usize {
        round_up_8(std::cmp::max(
            FIXED_PREFIX + self.path.len() + 1,
            MIN_ENTRY_SIZE_THRESHOLD,
        ))
    }

    /// Compare the fields spec §4.5 designates as "content" for the
    /// differ's unchanged/modified decision: size, both timestamps, mode,
    /// uid, gid, hash type, and the hash truncated to that type's digest
    /// length.
    pub fn same_content(&self, other: &Entry) -> bool {
        if self.file_size != other.file_size
            || self.mtime_wall != other.mtime_wall
            || self.ctime_wall != other.ctime_wall
            || self.mode != other.mode
            || self.uid != other.uid
            || self.gid != other.gid
            || self.hash_type != other.hash_type
        {
            return false;
        }
        let len = HashAlgorithm::from_tag(self.hash_type)
            .map(|a| a.digest_len())
            .unwrap_or(DIGEST_BUF_LEN);
        self.hash[..len] == other.hash[..len]
    }
}

fn round_up_8(n: usize) -> usize {
    (n + 7) & !7
}

/// Encode one entry, zero-padding to an 8-byte boundary (spec §3 Entry,
/// invariant 2). Returns `InvalidFieldValue` if the path is too long to fit
/// any entry.
pub fn encode_entry(entry: &Entry) -> Result<Vec<u8>> {
    let path_bytes = entry.path.as_bytes();
    if path_bytes.len() > MAX_PATH_LEN {
        return Err(DcfhError::InvalidFieldValue {
            field: "path".to_owned(),
            value: format!("{} bytes exceeds max {}", path_bytes.len(), MAX_PATH_LEN),
        });
    }

    let body_len = FIXED_PREFIX + path_bytes.len() + 1; // + NUL
    let size = round_up_8(std::cmp::max(body_len, MIN_ENTRY_SIZE_THRESHOLD));
    debug_assert!(size <= MAX_ENTRY_SIZE);
    debug_assert_eq!(size % 8, 0);

    let mut buf = vec![0u8; size];
    let mut pos = 0;

    NativeEndian::write_u32(&mut buf[pos..pos + 4], size as u32);
    pos += 4;

    NativeEndian::write_u64(&mut buf[pos..pos + 8], entry.ctime_wall);
    pos += 8;
    NativeEndian::write_u64(&mut buf[pos..pos + 8], entry.mtime_wall);
    pos += 8;

    NativeEndian::write_u32(&mut buf[pos..pos + 4], entry.dev);
    pos += 4;
    NativeEndian::write_u32(&mut buf[pos..pos + 4], entry.ino);
    pos += 4;
    NativeEndian::write_u32(&mut buf[pos..pos + 4], entry.mode);
    pos += 4;
    NativeEndian::write_u32(&mut buf[pos..pos + 4], entry.uid);
    pos += 4;
    NativeEndian::write_u32(&mut buf[pos..pos + 4], entry.gid);
    pos += 4;

    NativeEndian::write_u64(&mut buf[pos..pos + 8], entry.file_size);
    pos += 8;

    NativeEndian::write_u16(&mut buf[pos..pos + 2], entry.entry_flags);
    pos += 2;
    NativeEndian::write_u16(&mut buf[pos..pos + 2], entry.hash_type);
    pos += 2;

    buf[pos..pos + DIGEST_BUF_LEN].copy_from_slice(&entry.hash);
    pos += DIGEST_BUF_LEN;

    debug_assert_eq!(pos, FIXED_PREFIX);

    buf[pos..pos + path_bytes.len()].copy_from_slice(path_bytes);
    // buf[pos + path_bytes.len()] is the NUL terminator; already zero.
    // Everything after that to `size` is zero padding.

    Ok(buf)
}

/// Decode one entry starting at `offset`, returning the entry and the
/// offset of the next record (spec §4.1).
pub fn decode_entry(buf: &[u8], offset: usize) -> Result<(Entry, usize)> {
    if offset + 4 > buf.len() {
        return Err(DcfhError::TruncatedEntry { offset });
    }

    let size = NativeEndian::read_u32(&buf[offset..offset + 4]);

    if (size as usize) < MIN_ENTRY_SIZE_THRESHOLD {
        return Err(DcfhError::EntryTooSmall { offset, size });
    }
    if size as usize > MAX_ENTRY_SIZE {
        return Err(DcfhError::EntryTooLarge { offset, size });
    }
    if offset + size as usize > buf.len() {
        return Err(DcfhError::EntryOverflow {
            offset,
            size,
            buffer_len: buf.len(),
        });
    }

    let record = &buf[offset..offset + size as usize];

    let ctime_wall = NativeEndian::read_u64(&record[4..12]);
    let mtime_wall = NativeEndian::read_u64(&record[12..20]);
    let dev = NativeEndian::read_u32(&record[20..24]);
    let ino = NativeEndian::read_u32(&record[24..28]);
    let mode = NativeEndian::read_u32(&record[28..32]);
    let uid = NativeEndian::read_u32(&record[32..36]);
    let gid = NativeEndian::read_u32(&record[36..40]);
    let file_size = NativeEndian::read_u64(&record[40..48]);
    let entry_flags = NativeEndian::read_u16(&record[48..50]);
    let hash_type = NativeEndian::read_u16(&record[50..52]);

    let mut hash = [0u8; DIGEST_BUF_LEN];
    hash.copy_from_slice(&record[52..52 + DIGEST_BUF_LEN]);

    let path_region = &record[FIXED_PREFIX..];
    let nul_pos = path_region.iter().position(|&b| b == 0).ok_or({
        DcfhError::EntryOverflow {
            offset,
            size,
            buffer_len: buf.len(),
        }
    })?;
    let path = String::from_utf8(path_region[..nul_pos].to_vec()).map_err(|e| {
        DcfhError::InvalidFieldValue {
            field: "path".to_owned(),
            value: format!("not valid UTF-8: {e}"),
        }
    })?;

    let entry = Entry {
        ctime_wall,
        mtime_wall,
        dev,
        ino,
        mode,
        uid,
        gid,
        file_size,
        entry_flags,
        hash_type,
        hash,
        path,
    };

    Ok((entry, offset + size as usize))
}
