//! Binary index format: header + packed entry stream + trailing digest
//! (spec §3, §4.1 — component C1).

pub mod entry;
pub mod header;

pub use entry::{
    decode_entry, encode_entry, Entry, ENTRY_FLAG_DELETED, FIXED_PREFIX, MAX_ENTRY_SIZE,
    MAX_PATH_LEN, MIN_ENTRY_SIZE_THRESHOLD,
};
pub use header::{decode_header, encode_header, Header, CURRENT_VERSION, FLAG_CLEAN, HEADER_SIZE};

use crate::error::{DcfhError, Result};
use crate::hash::digests_equal;

/// An index file fully decoded into memory: the header plus every entry in
/// on-disk order.
#[derive(Debug, Clone)]
pub struct DecodedFile {
    pub header: Header,
    pub entries: Vec<Entry>,
}

/// Recompute the trailing digest over the header (with its `checksum` field
/// zeroed) followed by the packed entry bytes, exactly as `verify_file` and
/// the update protocol's finalize step both require (spec §4.1, §4.6).
pub fn digest_file(algorithm: crate::hash::HashAlgorithm, header_bytes: &[u8; HEADER_SIZE], entry_bytes: &[u8]) -> [u8; crate::hash::DIGEST_BUF_LEN] {
    let mut zeroed = *header_bytes;
    zeroed[HEADER_SIZE - crate::hash::DIGEST_BUF_LEN..].fill(0);

    let mut hasher = algorithm.streaming();
    hasher.update(&zeroed);
    hasher.update(entry_bytes);
    hasher.finalize_into_buf()
}

/// Decode and fully verify an index file's bytes: header structure, every
/// entry in sequence, and the trailing digest over the whole thing. Returns
/// the first structural error encountered; does not attempt resync (that's
/// `repair`'s job).
pub fn decode_file(buf: &[u8]) -> Result<DecodedFile> {
    let header = decode_header(buf)?;
    let algorithm = header.checksum_algorithm()?;

    let mut entries = Vec::with_capacity(header.entry_count as usize);
    let mut offset = HEADER_SIZE;
    let mut prev_path: Option<String> = None;

    while offset < buf.len() {
        let (entry, next) = decode_entry(buf, offset)?;
        if let Some(prev) = &prev_path {
            if *prev >= entry.path {
                return Err(DcfhError::UnsortedEntries {
                    prev: prev.clone(),
                    next: entry.path,
                });
            }
        }
        prev_path = Some(entry.path.clone());
        entries.push(entry);
        offset = next;
    }

    let header_bytes: [u8; HEADER_SIZE] = buf[..HEADER_SIZE].try_into().expect("slice has HEADER_SIZE bytes");
    let computed = digest_file(algorithm, &header_bytes, &buf[HEADER_SIZE..]);
    if !digests_equal(&computed, &header.checksum, algorithm.digest_len()) {
        return Err(DcfhError::DigestMismatch);
    }

    Ok(DecodedFile { header, entries })
}

/// Verify an already-decoded header/entry-bytes pair without re-decoding
/// every entry — used by callers (`iterate`) that decode entries themselves
/// one at a time and only need the final digest check.
pub fn verify_file(buf: &[u8]) -> Result<()> {
    let header = decode_header(buf)?;
    let algorithm = header.checksum_algorithm()?;
    let header_bytes: [u8; HEADER_SIZE] = buf[..HEADER_SIZE].try_into().expect("slice has HEADER_SIZE bytes");
    let computed = digest_file(algorithm, &header_bytes, &buf[HEADER_SIZE..]);
    if !digests_equal(&computed, &header.checksum, algorithm.digest_len()) {
        return Err(DcfhError::DigestMismatch);
    }
    Ok(())
}

/// Encode a full index file: header (with `entry_count` and `checksum`
/// filled in) followed by every entry, in the order given. Callers must
/// pass entries already sorted by path.
pub fn encode_file(algorithm: crate::hash::HashAlgorithm, entries: &[Entry]) -> Result<Vec<u8>> {
    let mut entry_bytes = Vec::new();
    for entry in entries {
        entry_bytes.extend_from_slice(&encode_entry(entry)?);
    }

    let mut header = Header::new(algorithm);
    header.entry_count = entries.len() as u32;
    header.set_clean(true);

    let header_bytes = encode_header(&header);
    header.checksum = digest_file(algorithm, &header_bytes, &entry_bytes);

    let mut out = Vec::with_capacity(HEADER_SIZE + entry_bytes.len());
    out.extend_from_slice(&encode_header(&header));
    out.extend_from_slice(&entry_bytes);
    Ok(out)
}
