//! Names and paths of the three index files under `<repo>/.dcfh/` (spec §3
//! "Lifecycle"). Repository-root discovery itself is out of scope (spec §1,
//! §6) — every function here takes the already-resolved `.dcfh` directory.

use std::path::{Path, PathBuf};

pub const DCFH_DIR: &str = ".dcfh";
pub const MAIN_INDEX: &str = "main.idx";
pub const CACHE_INDEX: &str = "cache.idx";

pub fn main_index_path(dcfh_dir: &Path) -> PathBuf {
    dcfh_dir.join(MAIN_INDEX)
}

pub fn main_index_tmp_path(dcfh_dir: &Path) -> PathBuf {
    dcfh_dir.join("main.idx.tmp")
}

pub fn cache_index_path(dcfh_dir: &Path) -> PathBuf {
    dcfh_dir.join(CACHE_INDEX)
}

/// Transient scan output path, named after the owning process and thread so
/// concurrent scanners (in different processes) never collide.
pub fn scan_index_path(dcfh_dir: &Path, pid: u32, tid: u64) -> PathBuf {
    dcfh_dir.join(format!("scan-{pid}-{tid}.idx"))
}

/// Best-effort numeric id for the current thread, used only to name scan
/// files uniquely; not exposed or relied on for ordering.
pub fn current_thread_tag() -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    std::thread::current().id().hash(&mut hasher);
    hasher.finish()
}

/// Derive the `(main|cache|scan-<id>)` tag used by the iteration API (spec
/// §4.8) from an index file's name.
pub fn tag_for_filename(file_name: &str) -> crate::skiplist::IndexTag {
    use crate::skiplist::IndexTag;
    if file_name == MAIN_INDEX {
        IndexTag::Main
    } else if file_name == CACHE_INDEX {
        IndexTag::Cache
    } else {
        IndexTag::Scan(file_name.to_owned())
    }
}
