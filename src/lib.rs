//! # dcfh-core — on-disk index engine for a content-addressed directory cache
//!
//! Format guarantees:
//! - All numeric fields are host byte order; a `byte_order_magic` sentinel
//!   in the header lets a reader detect a file written on a different-endian
//!   host, rather than negotiating or converting.
//! - Every entry is self-describing: its own `size` is the first field, so
//!   forward iteration never depends on a side table.
//! - The file's integrity is one digest covering the header (with its own
//!   digest field zeroed) and the whole entry stream — not per-entry.
//! - `main.idx` is replaced only by rename; readers that already opened it
//!   keep seeing their snapshot even after a writer swaps in a new one.
//! - The repair engine tolerates structurally damaged files by resyncing on
//!   plausible entry boundaries rather than failing the whole file.

pub mod accessor;
pub mod differ;
pub mod error;
pub mod format;
pub mod hash;
pub mod iterate;
pub mod layout;
pub mod repair;
pub mod scanner;
pub mod skiplist;
pub mod update;

pub use error::{DcfhError, Result};
pub use format::{decode_entry, decode_file, decode_header, encode_entry, encode_file, encode_header, verify_file, Entry, Header};
pub use hash::HashAlgorithm;
pub use iterate::{iterate, EntryView};
pub use differ::{diff, DiffEvent, DiffKind};
pub use repair::{repair_bytes, repair_file, FieldEdit, RepairOptions, RepairReport};
pub use scanner::{scan, scan_to_file, CancelToken, ScanOptions};
pub use skiplist::{IndexTag, OrderedIndex};
pub use update::{compact_main_index, status, update, update_using_cache, DiffSummary, UpdateOptions, UpdateStats};
