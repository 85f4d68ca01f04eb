//! Update protocol (spec §4.6, component C6): scan → cache → main,
//! finishing with an atomic rename and a durable digest.

use std::fs::{self, OpenOptions};
use std::path::Path;

use crate::differ::{diff, DiffKind};
use crate::error::{DcfhError, Result};
use crate::format::{decode_file, encode_file, Entry};
use crate::hash::HashAlgorithm;
use crate::layout;
use crate::scanner::{scan, CancelToken, ScanOptions};
use crate::skiplist::{IndexTag, OrderedIndex};

#[derive(Debug, Clone)]
pub struct UpdateOptions {
    pub algorithm: HashAlgorithm,
    pub scan: ScanOptions,
}

impl Default for UpdateOptions {
    fn default() -> Self {
        Self {
            algorithm: HashAlgorithm::Blake3,
            scan: ScanOptions::default(),
        }
    }
}

/// One differ event reduced to owned data, for callers that can't borrow
/// from the two in-memory indexes (status checks crossing an API
/// boundary).
#[derive(Debug, Clone)]
pub struct DiffSummary {
    pub path: String,
    pub kind: DiffKind,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateStats {
    pub entry_count: usize,
    pub added: usize,
    pub modified: usize,
    pub deleted: usize,
    pub unchanged: usize,
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(DcfhError::Io(e)),
    }
}

/// Delete a leftover `main.idx.tmp` from a prior crashed run (spec §4.6
/// "Crash between 5 and 6"). Must run before phase 1 of every update.
fn remove_stale_tmp(dcfh_dir: &Path) -> Result<()> {
    let tmp_path = layout::main_index_tmp_path(dcfh_dir);
    if tmp_path.exists() {
        log::warn!("update: removing stale tmp index {}", tmp_path.display());
    }
    remove_if_exists(&tmp_path)
}

fn load_index(path: &Path, tag: &IndexTag) -> Result<OrderedIndex> {
    let bytes = fs::read(path)?;
    let decoded = decode_file(&bytes)?;
    let _ = tag; // tag carried by caller for reporting; loading itself is tag-agnostic.
    Ok(OrderedIndex::from_sorted(
        decoded.entries.into_iter().map(|e| (e.path.clone(), e)),
    ))
}

fn load_index_or_empty(path: &Path, tag: &IndexTag) -> Result<OrderedIndex> {
    if path.exists() {
        load_index(path, tag)
    } else {
        Ok(OrderedIndex::new())
    }
}

/// Phases 1-2: run a scan, write it to a uniquely named scan file, then
/// rename it over `cache.idx`.
fn scan_and_finalize(
    dcfh_dir: &Path,
    root: &Path,
    options: &ScanOptions,
    cancel: &dyn CancelToken,
) -> Result<()> {
    let pid = std::process::id();
    let tid = layout::current_thread_tag();
    let scan_path = layout::scan_index_path(dcfh_dir, pid, tid);

    let entries = scan(root, options, cancel)?;
    let only_entries: Vec<Entry> = entries.into_iter().map(|(_, e)| e).collect();
    let bytes = encode_file(options.algorithm, &only_entries)?;
    fs::write(&scan_path, &bytes)?;

    let cache_path = layout::cache_index_path(dcfh_dir);
    fs::rename(&scan_path, &cache_path).map_err(|e| DcfhError::AtomicRenameFailed {
        from: scan_path,
        to: cache_path,
        source: e,
    })?;
    Ok(())
}

/// Phases 1-4: scan, finalize, load both indexes, merge. Returns the prior
/// (main) and fresh (cache) indexes plus the diff events, without writing
/// anything to `main.idx` — shared by both `status` and `update`.
fn scan_load_and_diff(
    dcfh_dir: &Path,
    root: &Path,
    options: &UpdateOptions,
    cancel: &dyn CancelToken,
    skip_scan: bool,
) -> Result<(OrderedIndex, OrderedIndex, Vec<DiffSummary>)> {
    remove_stale_tmp(dcfh_dir)?;

    if !skip_scan {
        scan_and_finalize(dcfh_dir, root, &options.scan, cancel)?;
    }
    if cancel.is_cancelled() {
        return Err(DcfhError::Cancelled);
    }

    let main = load_index_or_empty(&layout::main_index_path(dcfh_dir), &IndexTag::Main)?;
    let cache = load_index(&layout::cache_index_path(dcfh_dir), &IndexTag::Cache)?;

    let left = main.to_sorted_vec();
    let right = cache.to_sorted_vec();
    let left_refs: Vec<(&str, &Entry)> = left.iter().map(|(p, e)| (p.as_str(), e)).collect();
    let right_refs: Vec<(&str, &Entry)> = right.iter().map(|(p, e)| (p.as_str(), e)).collect();

    let mut events = Vec::new();
    diff(left_refs, right_refs, |ev| {
        events.push(DiffSummary {
            path: ev.path.to_owned(),
            kind: ev.kind,
        });
        true
    });

    Ok((main, cache, events))
}

/// Run phases 1-3 and the differ, returning the event list without writing
/// a new `main.idx` (spec §4.6 "status check variant"). Leaves `cache.idx`
/// on disk.
pub fn status(root: &Path, options: &UpdateOptions, cancel: &dyn CancelToken) -> Result<Vec<DiffSummary>> {
    let dcfh_dir = root.join(layout::DCFH_DIR);
    let (_main, _cache, events) = scan_load_and_diff(&dcfh_dir, root, options, cancel, false)?;
    Ok(events)
}

/// Like `update`, but reuses an existing `cache.idx` instead of running a
/// fresh scan — the "follow-up update can skip phase 1" path after a prior
/// `status` call (spec §4.6).
pub fn update_using_cache(root: &Path, options: &UpdateOptions, cancel: &dyn CancelToken) -> Result<UpdateStats> {
    run_update(root, options, cancel, true)
}

/// Run the full update protocol: scan, finalize, load, merge, emit, swap
/// (spec §4.6). On success, `cache.idx` has been deleted and `main.idx`
/// reflects the fresh scan.
pub fn update(root: &Path, options: &UpdateOptions, cancel: &dyn CancelToken) -> Result<UpdateStats> {
    run_update(root, options, cancel, false)
}

fn run_update(root: &Path, options: &UpdateOptions, cancel: &dyn CancelToken, skip_scan: bool) -> Result<UpdateStats> {
    log::debug!("update: starting for {} (skip_scan={skip_scan})", root.display());
    let dcfh_dir = root.join(layout::DCFH_DIR);
    fs::create_dir_all(&dcfh_dir)?;

    let (main, cache, events) = scan_load_and_diff(&dcfh_dir, root, options, cancel, skip_scan)?;
    let _ = events;

    let (merged, mut stats) = merge_indexes(&main, &cache);
    log::debug!(
        "update: merged {} added, {} modified, {} deleted, {} unchanged",
        stats.added, stats.modified, stats.deleted, stats.unchanged
    );

    if cancel.is_cancelled() {
        return Err(DcfhError::Cancelled);
    }

    let entries: Vec<Entry> = merged.to_sorted_vec().into_iter().map(|(_, e)| e).collect();
    stats.entry_count = entries.len();
    let bytes = encode_file(options.algorithm, &entries)?;

    let tmp_path = layout::main_index_tmp_path(&dcfh_dir);
    let main_path = layout::main_index_path(&dcfh_dir);

    write_tmp_atomically(&tmp_path, &bytes)?;

    fs::rename(&tmp_path, &main_path).map_err(|e| DcfhError::AtomicRenameFailed {
        from: tmp_path.clone(),
        to: main_path.clone(),
        source: e,
    })?;

    remove_if_exists(&layout::cache_index_path(&dcfh_dir))?;

    Ok(stats)
}

/// Create `tmp_path` with `O_CREAT|O_EXCL` semantics (failing with
/// `ConcurrentWriter` if another writer already holds it), write `bytes`,
/// and fsync before returning (spec §4.6 phase 5, §5 "Writers must use
/// O_CREAT|O_EXCL").
fn write_tmp_atomically(tmp_path: &Path, bytes: &[u8]) -> Result<()> {
    use std::io::Write;

    let mut file = match OpenOptions::new().write(true).create_new(true).open(tmp_path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            log::warn!("update: concurrent writer holds {}", tmp_path.display());
            return Err(DcfhError::ConcurrentWriter(tmp_path.to_path_buf()));
        }
        Err(e) => return Err(DcfhError::Io(e)),
    };

    file.write_all(bytes)?;
    file.sync_all()?;
    Ok(())
}

/// Merge a main and cache index in memory without touching disk, exposed
/// for the repair/compaction tooling and tests that want the merge logic
/// without the filesystem side effects.
pub fn merge_indexes(main: &OrderedIndex, cache: &OrderedIndex) -> (OrderedIndex, UpdateStats) {
    let mut stats = UpdateStats::default();
    let mut merged = OrderedIndex::new();

    let left = main.to_sorted_vec();
    let right = cache.to_sorted_vec();
    let left_refs: Vec<(&str, &Entry)> = left.iter().map(|(p, e)| (p.as_str(), e)).collect();
    let right_refs: Vec<(&str, &Entry)> = right.iter().map(|(p, e)| (p.as_str(), e)).collect();

    diff(left_refs, right_refs, |ev| {
        match ev.kind {
            DiffKind::Unchanged => {
                stats.unchanged += 1;
                merged.insert(ev.path.to_owned(), ev.left.unwrap().clone());
            }
            DiffKind::Modified => {
                stats.modified += 1;
                merged.insert(ev.path.to_owned(), ev.right.unwrap().clone());
            }
            DiffKind::Added => {
                stats.added += 1;
                merged.insert(ev.path.to_owned(), ev.right.unwrap().clone());
            }
            DiffKind::Deleted => {
                stats.deleted += 1;
                let mut entry = ev.left.unwrap().clone();
                entry.set_deleted(true);
                merged.insert(ev.path.to_owned(), entry);
            }
        }
        true
    });

    stats.entry_count = merged.len();
    (merged, stats)
}

/// Drop soft-deleted entries from `main.idx` and rewrite it in place
/// (spec §9 "compaction pass... triggered by policy, not automatically").
pub fn compact_main_index(root: &Path, algorithm: HashAlgorithm) -> Result<usize> {
    let dcfh_dir = root.join(layout::DCFH_DIR);
    let main_path = layout::main_index_path(&dcfh_dir);

    let mut index = load_index_or_empty(&main_path, &IndexTag::Main)?;
    let dropped = index.compact();

    let entries: Vec<Entry> = index.to_sorted_vec().into_iter().map(|(_, e)| e).collect();
    let bytes = encode_file(algorithm, &entries)?;

    let tmp_path = layout::main_index_tmp_path(&dcfh_dir);
    remove_if_exists(&tmp_path)?;
    write_tmp_atomically(&tmp_path, &bytes)?;
    fs::rename(&tmp_path, &main_path).map_err(|e| DcfhError::AtomicRenameFailed {
        from: tmp_path,
        to: main_path,
        source: e,
    })?;

    Ok(dropped)
}
