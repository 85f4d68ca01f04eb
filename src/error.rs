//! Crate-wide error vocabulary.
//!
//! One enum rather than one-per-module (contrast the teacher's
//! `SuperblockError`/`CodecError`/`CryptoError` split): the error kinds here
//! cut across every component, and the repair engine (`repair.rs`) and update
//! protocol (`update.rs`) both need to pattern-match on *which* structural
//! error fired to decide whether to resync, retry, or surface.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DcfhError {
    #[error("not a dcfh index file: bad signature")]
    InvalidSignature,

    #[error("byte order mismatch: file was written on a different-endian host")]
    ByteOrderMismatch,

    #[error("unsupported index version {0}")]
    UnsupportedVersion(u32),

    #[error("unsupported checksum type {0}")]
    UnsupportedChecksumType(u16),

    #[error("truncated file: expected at least {expected} bytes, found {found}")]
    TruncatedFile { expected: usize, found: usize },

    #[error("truncated entry at offset {offset}: not enough bytes remain for a size field")]
    TruncatedEntry { offset: usize },

    #[error("entry at offset {offset} too small: size={size}")]
    EntryTooSmall { offset: usize, size: u32 },

    #[error("entry at offset {offset} too large: size={size}")]
    EntryTooLarge { offset: usize, size: u32 },

    #[error("entry at offset {offset} overflows buffer: size={size}, buffer_len={buffer_len}")]
    EntryOverflow {
        offset: usize,
        size: u32,
        buffer_len: usize,
    },

    #[error("digest mismatch: stored checksum does not match recomputed digest")]
    DigestMismatch,

    #[error("entries are not sorted by path: {prev:?} appears before {next:?}")]
    UnsortedEntries { prev: String, next: String },

    #[error("duplicate path in index: {0}")]
    DuplicatePath(String),

    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("atomic rename of {from:?} to {to:?} failed: {source}")]
    AtomicRenameFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("another writer already holds {0:?}")]
    ConcurrentWriter(PathBuf),

    #[error("repair gave up after {discarded} discarded entries (limit {limit})")]
    RepairGiveUp { discarded: usize, limit: usize },

    #[error("field {0:?} is not mutable through the repair path")]
    UnsupportedField(String),

    #[error("invalid value {value:?} for field {field:?}")]
    InvalidFieldValue { field: String, value: String },

    #[error("operation cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, DcfhError>;
