//! Digest algorithm identities shared by the header's `checksum_type` and
//! every entry's `hash_type` (spec §3, §9 "Hash algorithm identification").
//!
//! The spec pins bit widths (160/256/512) but deliberately leaves the
//! concrete algorithm an implementation choice. This crate fixes:
//!
//! - tag 1 → SHA-1   (160 bit) — `sha1`, the ecosystem-standard choice at
//!   this width for content-addressed tooling.
//! - tag 2 → BLAKE3  (256 bit) — the teacher's own content-hash algorithm
//!   (`blake3::hash` in the reference archive format's block header).
//! - tag 3 → SHA-512 (512 bit) — `sha2`, already pulled in by
//!   `Dicklesworthstone-glibc_rust` elsewhere in this retrieval pack.
//!
//! All three produce digests that fit left-aligned in the spec's 64-byte
//! `hash`/`checksum` buffers with the remainder zeroed.

use crate::error::{DcfhError, Result};
use sha1::Sha1;
use sha2::Sha512;
use sha2::Digest as Sha2Digest;
use subtle::ConstantTimeEq;

pub const HASH_TYPE_SHA1: u16 = 1;
pub const HASH_TYPE_BLAKE3: u16 = 2;
pub const HASH_TYPE_SHA512: u16 = 3;

/// Fixed-capacity digest buffer matching the on-disk `hash`/`checksum` field.
pub const DIGEST_BUF_LEN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Sha1,
    Blake3,
    Sha512,
}

impl HashAlgorithm {
    pub fn from_tag(tag: u16) -> Option<Self> {
        match tag {
            HASH_TYPE_SHA1 => Some(Self::Sha1),
            HASH_TYPE_BLAKE3 => Some(Self::Blake3),
            HASH_TYPE_SHA512 => Some(Self::Sha512),
            _ => None,
        }
    }

    pub fn tag(self) -> u16 {
        match self {
            Self::Sha1 => HASH_TYPE_SHA1,
            Self::Blake3 => HASH_TYPE_BLAKE3,
            Self::Sha512 => HASH_TYPE_SHA512,
        }
    }

    /// Digest length in bytes for this algorithm (20 / 32 / 64).
    pub fn digest_len(self) -> usize {
        match self {
            Self::Sha1 => 20,
            Self::Blake3 => 32,
            Self::Sha512 => 64,
        }
    }

    /// Hash `data` in one shot and left-align the result in a zeroed 64-byte
    /// buffer, matching the on-disk `hash`/`checksum` layout.
    pub fn hash_into_buf(self, data: &[u8]) -> [u8; DIGEST_BUF_LEN] {
        let mut buf = [0u8; DIGEST_BUF_LEN];
        let len = self.digest_len();
        match self {
            Self::Sha1 => {
                let digest = Sha1::digest(data);
                buf[..len].copy_from_slice(&digest);
            }
            Self::Blake3 => {
                let digest = blake3::hash(data);
                buf[..len].copy_from_slice(digest.as_bytes());
            }
            Self::Sha512 => {
                let digest = Sha512::digest(data);
                buf[..len].copy_from_slice(&digest);
            }
        }
        buf
    }

    /// Start a streaming hasher for this algorithm, used by the scanner to
    /// avoid buffering whole files in memory.
    pub fn streaming(self) -> StreamingHasher {
        match self {
            Self::Sha1 => StreamingHasher::Sha1(Sha1::new()),
            Self::Blake3 => StreamingHasher::Blake3(blake3::Hasher::new()),
            Self::Sha512 => StreamingHasher::Sha512(Sha512::new()),
        }
    }
}

pub enum StreamingHasher {
    Sha1(Sha1),
    Blake3(blake3::Hasher),
    Sha512(Sha512),
}

impl StreamingHasher {
    pub fn update(&mut self, chunk: &[u8]) {
        match self {
            Self::Sha1(h) => Sha2Digest::update(h, chunk),
            Self::Blake3(h) => {
                h.update(chunk);
            }
            Self::Sha512(h) => Sha2Digest::update(h, chunk),
        }
    }

    pub fn finalize_into_buf(self) -> [u8; DIGEST_BUF_LEN] {
        let mut buf = [0u8; DIGEST_BUF_LEN];
        match self {
            Self::Sha1(h) => {
                let digest = h.finalize();
                buf[..20].copy_from_slice(&digest);
            }
            Self::Blake3(h) => {
                let digest = h.finalize();
                buf[..32].copy_from_slice(digest.as_bytes());
            }
            Self::Sha512(h) => {
                let digest = h.finalize();
                buf[..64].copy_from_slice(&digest);
            }
        }
        buf
    }
}

/// Compare two digest buffers in constant time, each truncated to `len`
/// bytes — spec §4.1 requires `verify_file` to compare this way.
pub fn digests_equal(a: &[u8; DIGEST_BUF_LEN], b: &[u8; DIGEST_BUF_LEN], len: usize) -> bool {
    let len = len.min(DIGEST_BUF_LEN);
    a[..len].ct_eq(&b[..len]).into()
}

pub fn algorithm_for_tag(tag: u16) -> Result<HashAlgorithm> {
    HashAlgorithm::from_tag(tag).ok_or(DcfhError::UnsupportedChecksumType(tag))
}
