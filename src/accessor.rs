//! Bounds-checked accessor over a raw entry record (spec §4.2, component
//! C2). Used by the repair engine to read and patch individual fields of a
//! salvaged entry without fully decoding (and re-encoding) it, and without
//! resorting to the teacher's raw-pointer field punning (`block.rs` reads
//! its header with `bytemuck`-free manual slicing already; this generalizes
//! that into a named, validated accessor rather than ad hoc slicing at each
//! call site).
//!
//! Every getter and setter re-validates its field's byte range against the
//! accessor's recorded `size`, so a corrupt or adversarial `size` field can
//! never make a getter read, or a setter write, outside the record's own
//! bytes.

use byteorder::{ByteOrder, NativeEndian};

use crate::error::{DcfhError, Result};
use crate::format::entry::{FIXED_PREFIX, MIN_ENTRY_SIZE_THRESHOLD};
use crate::hash::DIGEST_BUF_LEN;

const OFF_SIZE: usize = 0;
const OFF_CTIME: usize = 4;
const OFF_MTIME: usize = 12;
const OFF_DEV: usize = 20;
const OFF_INO: usize = 24;
const OFF_MODE: usize = 28;
const OFF_UID: usize = 32;
const OFF_GID: usize = 36;
const OFF_FILE_SIZE: usize = 40;
const OFF_ENTRY_FLAGS: usize = 48;
const OFF_HASH_TYPE: usize = 50;
const OFF_HASH: usize = 52;

/// A validated view over one entry record's bytes. Construction checks that
/// `size` is self-consistent with the slice; every subsequent access is
/// additionally checked against that `size`, so a field read never escapes
/// `[offset, offset + size)` even if the slice handed in is longer (as it
/// always is mid-scan, where `buf` is the whole remaining file).
pub struct EntryAccessor<'a> {
    buf: &'a [u8],
    offset: usize,
    size: usize,
}

impl<'a> EntryAccessor<'a> {
    /// Build an accessor over the record starting at `offset` in `buf`.
    /// Validates only that a `size` field is present and that the record it
    /// claims fits in `buf` — the caller (`repair::scan`) decides what to do
    /// with a `size` outside the normal min/max range, since corrupt sizes
    /// are exactly what repair exists to handle.
    pub fn new(buf: &'a [u8], offset: usize) -> Result<Self> {
        if offset + 4 > buf.len() {
            return Err(DcfhError::TruncatedEntry { offset });
        }
        let size = NativeEndian::read_u32(&buf[offset..offset + 4]) as usize;
        if offset + size > buf.len() || size < OFF_HASH + DIGEST_BUF_LEN {
            return Err(DcfhError::EntryOverflow {
                offset,
                size: size as u32,
                buffer_len: buf.len(),
            });
        }
        Ok(Self { buf, offset, size })
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn next_offset(&self) -> usize {
        self.offset + self.size
    }

    pub fn is_plausible(&self) -> bool {
        self.size >= MIN_ENTRY_SIZE_THRESHOLD && self.size <= crate::format::entry::MAX_ENTRY_SIZE
    }

    fn field(&self, field_offset: usize, field_len: usize) -> Result<&'a [u8]> {
        if field_offset + field_len > self.size {
            return Err(DcfhError::EntryOverflow {
                offset: self.offset,
                size: self.size as u32,
                buffer_len: self.buf.len(),
            });
        }
        let start = self.offset + field_offset;
        Ok(&self.buf[start..start + field_len])
    }

    pub fn ctime_wall(&self) -> Result<u64> {
        Ok(NativeEndian::read_u64(self.field(OFF_CTIME, 8)?))
    }
    pub fn mtime_wall(&self) -> Result<u64> {
        Ok(NativeEndian::read_u64(self.field(OFF_MTIME, 8)?))
    }
    pub fn dev(&self) -> Result<u32> {
        Ok(NativeEndian::read_u32(self.field(OFF_DEV, 4)?))
    }
    pub fn ino(&self) -> Result<u32> {
        Ok(NativeEndian::read_u32(self.field(OFF_INO, 4)?))
    }
    pub fn mode(&self) -> Result<u32> {
        Ok(NativeEndian::read_u32(self.field(OFF_MODE, 4)?))
    }
    pub fn uid(&self) -> Result<u32> {
        Ok(NativeEndian::read_u32(self.field(OFF_UID, 4)?))
    }
    pub fn gid(&self) -> Result<u32> {
        Ok(NativeEndian::read_u32(self.field(OFF_GID, 4)?))
    }
    pub fn file_size(&self) -> Result<u64> {
        Ok(NativeEndian::read_u64(self.field(OFF_FILE_SIZE, 8)?))
    }
    pub fn entry_flags(&self) -> Result<u16> {
        Ok(NativeEndian::read_u16(self.field(OFF_ENTRY_FLAGS, 2)?))
    }
    pub fn hash_type(&self) -> Result<u16> {
        Ok(NativeEndian::read_u16(self.field(OFF_HASH_TYPE, 2)?))
    }
    pub fn hash(&self) -> Result<[u8; DIGEST_BUF_LEN]> {
        let mut out = [0u8; DIGEST_BUF_LEN];
        out.copy_from_slice(self.field(OFF_HASH, DIGEST_BUF_LEN)?);
        Ok(out)
    }

    /// Raw path bytes, from the end of the fixed prefix to the record's own
    /// `size`, NUL and padding included — callers look for the NUL
    /// themselves since a corrupt record may not have one.
    pub fn raw_path_region(&self) -> Result<&'a [u8]> {
        self.field(FIXED_PREFIX, self.size.saturating_sub(FIXED_PREFIX))
    }
}

/// Mutable counterpart used by repair's field-patching operations
/// (spec §4.7 "mutable fields"). Only the fields repair is allowed to touch
/// get a setter; anything else is rejected by the caller before it ever
/// reaches here.
pub struct EntryAccessorMut<'a> {
    buf: &'a mut [u8],
    offset: usize,
    size: usize,
}

impl<'a> EntryAccessorMut<'a> {
    pub fn new(buf: &'a mut [u8], offset: usize) -> Result<Self> {
        if offset + 4 > buf.len() {
            return Err(DcfhError::TruncatedEntry { offset });
        }
        let size = NativeEndian::read_u32(&buf[offset..offset + 4]) as usize;
        if offset + size > buf.len() || size < OFF_HASH + DIGEST_BUF_LEN {
            return Err(DcfhError::EntryOverflow {
                offset,
                size: size as u32,
                buffer_len: buf.len(),
            });
        }
        Ok(Self { buf, offset, size })
    }

    fn field_mut(&mut self, field_offset: usize, field_len: usize) -> Result<&mut [u8]> {
        if field_offset + field_len > self.size {
            return Err(DcfhError::EntryOverflow {
                offset: self.offset,
                size: self.size as u32,
                buffer_len: self.buf.len(),
            });
        }
        let start = self.offset + field_offset;
        Ok(&mut self.buf[start..start + field_len])
    }

    pub fn set_ctime_wall(&mut self, v: u64) -> Result<()> {
        NativeEndian::write_u64(self.field_mut(OFF_CTIME, 8)?, v);
        Ok(())
    }
    pub fn set_mtime_wall(&mut self, v: u64) -> Result<()> {
        NativeEndian::write_u64(self.field_mut(OFF_MTIME, 8)?, v);
        Ok(())
    }
    pub fn set_mode(&mut self, v: u32) -> Result<()> {
        NativeEndian::write_u32(self.field_mut(OFF_MODE, 4)?, v);
        Ok(())
    }
    pub fn set_uid(&mut self, v: u32) -> Result<()> {
        NativeEndian::write_u32(self.field_mut(OFF_UID, 4)?, v);
        Ok(())
    }
    pub fn set_gid(&mut self, v: u32) -> Result<()> {
        NativeEndian::write_u32(self.field_mut(OFF_GID, 4)?, v);
        Ok(())
    }
    pub fn set_file_size(&mut self, v: u64) -> Result<()> {
        NativeEndian::write_u64(self.field_mut(OFF_FILE_SIZE, 8)?, v);
        Ok(())
    }
    pub fn set_deleted(&mut self, deleted: bool) -> Result<()> {
        let flags = NativeEndian::read_u16(self.field_mut(OFF_ENTRY_FLAGS, 2)?);
        let flags = if deleted {
            flags | crate::format::entry::ENTRY_FLAG_DELETED
        } else {
            flags & !crate::format::entry::ENTRY_FLAG_DELETED
        };
        NativeEndian::write_u16(self.field_mut(OFF_ENTRY_FLAGS, 2)?, flags);
        Ok(())
    }

    pub fn offset(&self) -> usize {
        self.offset
    }
    pub fn size(&self) -> usize {
        self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::entry::{encode_entry, Entry};
    use crate::hash::DIGEST_BUF_LEN;

    fn sample_entry(path: &str) -> Entry {
        Entry {
            ctime_wall: 1,
            mtime_wall: 2,
            dev: 3,
            ino: 4,
            mode: 0o100644,
            uid: 1000,
            gid: 1000,
            file_size: 42,
            entry_flags: 0,
            hash_type: crate::hash::HASH_TYPE_BLAKE3,
            hash: [7u8; DIGEST_BUF_LEN],
            path: path.to_owned(),
        }
    }

    #[test]
    fn accessor_matches_decoded_fields() {
        let entry = sample_entry("src/main.rs");
        let bytes = encode_entry(&entry).unwrap();
        let acc = EntryAccessor::new(&bytes, 0).unwrap();
        assert_eq!(acc.mode().unwrap(), entry.mode);
        assert_eq!(acc.uid().unwrap(), entry.uid);
        assert_eq!(acc.file_size().unwrap(), entry.file_size);
        assert_eq!(acc.hash().unwrap(), entry.hash);
    }

    #[test]
    fn accessor_rejects_size_overflowing_buffer() {
        let entry = sample_entry("a");
        let mut bytes = encode_entry(&entry).unwrap();
        NativeEndian::write_u32(&mut bytes[0..4], 1_000_000);
        assert!(EntryAccessor::new(&bytes, 0).is_err());
    }

    #[test]
    fn mutator_round_trips_deleted_flag() {
        let entry = sample_entry("a/b/c");
        let mut bytes = encode_entry(&entry).unwrap();
        {
            let mut acc = EntryAccessorMut::new(&mut bytes, 0).unwrap();
            acc.set_deleted(true).unwrap();
        }
        let acc = EntryAccessor::new(&bytes, 0).unwrap();
        assert_ne!(acc.entry_flags().unwrap() & crate::format::entry::ENTRY_FLAG_DELETED, 0);
    }
}
