//! Index file header (spec §3 "Header", §4.1 `encode_header`/`decode_header`).
//!
//! All multi-byte numeric fields are in **host byte order**; the
//! `byte_order_magic` sentinel is how a reader detects it opened a file
//! written on a differently-endian host, the same way the teacher's
//! `Superblock` uses a fixed magic to detect a garbled/foreign file
//! (`superblock.rs`) — except here the sentinel exists specifically to
//! catch endianness, not just format identity, so every multi-byte field in
//! the rest of the file (header and entries alike) shares that same host
//! order rather than the teacher's frozen little-endian choice.

use byteorder::{ByteOrder, NativeEndian};

use crate::error::{DcfhError, Result};
use crate::hash::{algorithm_for_tag, HashAlgorithm, DIGEST_BUF_LEN};

pub const SIGNATURE: [u8; 4] = *b"dcfh";
pub const BYTE_ORDER_MAGIC: u64 = 0x0102_0304_0506_0708;
pub const HEADER_SIZE: usize = 4 + 8 + 4 + 4 + 2 + 2 + DIGEST_BUF_LEN; // 88

/// Header bit: set only after the trailing digest has been written and
/// verified consistent (spec §3 "Clean flag").
pub const FLAG_CLEAN: u16 = 0x0001;

pub const CURRENT_VERSION: u32 = 1;

#[derive(Debug, Clone)]
pub struct Header {
    pub version: u32,
    pub entry_count: u32,
    pub flags: u16,
    pub checksum_type: u16,
    pub checksum: [u8; DIGEST_BUF_LEN],
}

impl Header {
    pub fn new(checksum_type: HashAlgorithm) -> Self {
        Self {
            version: CURRENT_VERSION,
            entry_count: 0,
            flags: 0,
            checksum_type: checksum_type.tag(),
            checksum: [0u8; DIGEST_BUF_LEN],
        }
    }

    pub fn is_clean(&self) -> bool {
        self.flags & FLAG_CLEAN != 0
    }

    pub fn set_clean(&mut self, clean: bool) {
        if clean {
            self.flags |= FLAG_CLEAN;
        } else {
            self.flags &= !FLAG_CLEAN;
        }
    }

    pub fn checksum_algorithm(&self) -> Result<HashAlgorithm> {
        algorithm_for_tag(self.checksum_type)
    }
}

/// Encode the header into a fixed `HEADER_SIZE`-byte buffer with all
/// padding (there is none beyond the fixed fields) zeroed, per spec §4.1.
pub fn encode_header(header: &Header) -> [u8; HEADER_SIZE] {
    let mut buf = [0u8; HEADER_SIZE];
    let mut pos = 0;

    buf[pos..pos + 4].copy_from_slice(&SIGNATURE);
    pos += 4;

    NativeEndian::write_u64(&mut buf[pos..pos + 8], BYTE_ORDER_MAGIC);
    pos += 8;

    NativeEndian::write_u32(&mut buf[pos..pos + 4], header.version);
    pos += 4;

    NativeEndian::write_u32(&mut buf[pos..pos + 4], header.entry_count);
    pos += 4;

    NativeEndian::write_u16(&mut buf[pos..pos + 2], header.flags);
    pos += 2;

    NativeEndian::write_u16(&mut buf[pos..pos + 2], header.checksum_type);
    pos += 2;

    buf[pos..pos + DIGEST_BUF_LEN].copy_from_slice(&header.checksum);
    pos += DIGEST_BUF_LEN;

    debug_assert_eq!(pos, HEADER_SIZE);
    buf
}

/// Decode and structurally validate a header. Does **not** verify the
/// digest — that is `verify_file`'s job (spec §4.1).
pub fn decode_header(buf: &[u8]) -> Result<Header> {
    if buf.len() < HEADER_SIZE {
        return Err(DcfhError::TruncatedFile {
            expected: HEADER_SIZE,
            found: buf.len(),
        });
    }

    let mut pos = 0;

    if buf[pos..pos + 4] != SIGNATURE {
        return Err(DcfhError::InvalidSignature);
    }
    pos += 4;

    let mut expected_magic = [0u8; 8];
    NativeEndian::write_u64(&mut expected_magic, BYTE_ORDER_MAGIC);
    if buf[pos..pos + 8] != expected_magic {
        return Err(DcfhError::ByteOrderMismatch);
    }
    pos += 8;

    let version = NativeEndian::read_u32(&buf[pos..pos + 4]);
    pos += 4;
    if version == 0 || version > CURRENT_VERSION {
        return Err(DcfhError::UnsupportedVersion(version));
    }

    let entry_count = NativeEndian::read_u32(&buf[pos..pos + 4]);
    pos += 4;

    let flags = NativeEndian::read_u16(&buf[pos..pos + 2]);
    pos += 2;

    let checksum_type = NativeEndian::read_u16(&buf[pos..pos + 2]);
    pos += 2;
    if algorithm_for_tag(checksum_type).is_err() {
        return Err(DcfhError::UnsupportedChecksumType(checksum_type));
    }

    let mut checksum = [0u8; DIGEST_BUF_LEN];
    checksum.copy_from_slice(&buf[pos..pos + DIGEST_BUF_LEN]);

    Ok(Header {
        version,
        entry_count,
        flags,
        checksum_type,
        checksum,
    })
}
