//! Repair engine (spec §4.7, component C7): entry-by-entry salvage across
//! a structurally damaged index file, with resync heuristics and a bounded
//! discard counter.

use std::collections::BTreeSet;
use std::fs::{self, OpenOptions};
use std::path::Path;

use byteorder::{ByteOrder, NativeEndian};

use crate::accessor::EntryAccessor;
use crate::error::{DcfhError, Result};
use crate::format::entry::{encode_entry, Entry, MAX_ENTRY_SIZE, MIN_ENTRY_SIZE_THRESHOLD};
use crate::format::header::{decode_header, Header, HEADER_SIZE};
use crate::format::{digest_file, encode_header};
use crate::hash::{HashAlgorithm, DIGEST_BUF_LEN};

const MAX_PATH_LEN_REPAIR: usize = 4000;
const DISCARD_LIMIT: usize = 100;

/// A single field mutation requested by the repair CLI: parse `value`
/// against `field`'s type and apply it to matching entries (spec §4.7
/// "Mutation operations").
#[derive(Debug, Clone)]
pub struct FieldEdit {
    pub path: String,
    pub field: String,
    pub value: String,
}

#[derive(Debug, Clone, Default)]
pub struct RepairOptions {
    pub edits: Vec<FieldEdit>,
    /// Entries whose path is in this set are dropped from the output
    /// (spec §4.7 "remove mode").
    pub remove_paths: BTreeSet<String>,
    /// Entries appended verbatim after salvage, ahead of the final sort
    /// (spec §4.7 "append mode").
    pub append_entries: Vec<Entry>,
    /// Suppress per-entry discard warnings.
    pub quiet: bool,
    /// Salvage and compute the rewritten bytes but do not rename over the
    /// original file.
    pub dry_run: bool,
}

#[derive(Debug, Clone, Default)]
pub struct RepairReport {
    pub salvaged: usize,
    pub discarded: usize,
    pub edits_applied: usize,
    pub edits_failed: Vec<(String, String)>,
    pub rewritten_bytes: Vec<u8>,
}

fn parse_field_value(field: &str, value: &str) -> Result<ParsedField> {
    let invalid = |field: &str, value: &str| DcfhError::InvalidFieldValue {
        field: field.to_owned(),
        value: value.to_owned(),
    };
    match field {
        "ctime" => value
            .parse::<u64>()
            .map(ParsedField::U64)
            .map_err(|_| invalid(field, value)),
        "mtime" => value
            .parse::<u64>()
            .map(ParsedField::U64)
            .map_err(|_| invalid(field, value)),
        "mode" => {
            let v = value
                .strip_prefix("0o")
                .map(|s| u32::from_str_radix(s, 8))
                .unwrap_or_else(|| value.parse::<u32>());
            v.map(ParsedField::U32).map_err(|_| invalid(field, value))
        }
        "uid" => value
            .parse::<u32>()
            .map(ParsedField::U32)
            .map_err(|_| invalid(field, value)),
        "gid" => value
            .parse::<u32>()
            .map(ParsedField::U32)
            .map_err(|_| invalid(field, value)),
        "file_size" => value
            .parse::<u64>()
            .map(ParsedField::U64)
            .map_err(|_| invalid(field, value)),
        "deleted" => match value {
            "true" | "1" => Ok(ParsedField::Bool(true)),
            "false" | "0" => Ok(ParsedField::Bool(false)),
            _ => Err(invalid(field, value)),
        },
        other => Err(DcfhError::UnsupportedField(other.to_owned())),
    }
}

enum ParsedField {
    U32(u32),
    U64(u64),
    Bool(bool),
}

fn apply_edit(entry: &mut Entry, field: &str, parsed: ParsedField) {
    match (field, parsed) {
        ("ctime", ParsedField::U64(v)) => entry.ctime_wall = v,
        ("mtime", ParsedField::U64(v)) => entry.mtime_wall = v,
        ("mode", ParsedField::U32(v)) => entry.mode = v,
        ("uid", ParsedField::U32(v)) => entry.uid = v,
        ("gid", ParsedField::U32(v)) => entry.gid = v,
        ("file_size", ParsedField::U64(v)) => entry.file_size = v,
        ("deleted", ParsedField::Bool(v)) => entry.set_deleted(v),
        _ => unreachable!("parse_field_value and apply_edit must agree on field/type pairing"),
    }
}

/// Try to read a plausible candidate `size` at `offset`: in-range and
/// fitting the remaining buffer (spec §4.7 step 3).
fn candidate_size_ok(buf: &[u8], offset: usize) -> bool {
    if offset + 4 > buf.len() {
        return false;
    }
    let size = NativeEndian::read_u32(&buf[offset..offset + 4]) as usize;
    size >= MIN_ENTRY_SIZE_THRESHOLD && size <= MAX_ENTRY_SIZE && offset + size <= buf.len()
}

/// Scan forward in 8-byte increments from `offset` for the next position
/// where a plausible entry size sits (spec §4.7 step 3). Returns `None` if
/// the buffer ends before one is found. Bounded by `buf.len()`, so this
/// always terminates regardless of the discard limit, which is tracked by
/// the caller at entry granularity rather than per 8-byte hop.
fn resync(buf: &[u8], start: usize) -> Option<usize> {
    let mut offset = start;
    while offset < buf.len() {
        if candidate_size_ok(buf, offset) {
            return Some(offset);
        }
        offset += 8;
    }
    None
}

/// Bump the discard counter by one skipped entry and turn it into
/// `RepairGiveUp` once the fixed limit (100) is exceeded.
fn bump_discard(discarded: &mut usize, quiet: bool) -> Result<()> {
    *discarded += 1;
    if !quiet {
        log::warn!("repair: discarding entry ({} so far)", *discarded);
    }
    if *discarded > DISCARD_LIMIT {
        log::warn!("repair: giving up after {} discards (limit {DISCARD_LIMIT})", *discarded);
        return Err(DcfhError::RepairGiveUp {
            discarded: *discarded,
            limit: DISCARD_LIMIT,
        });
    }
    Ok(())
}

/// Run the salvage pass over `buf` (spec §4.7 steps 1-3): parse the header
/// if possible, walk entries applying edits, skipping and resyncing past
/// anything unreadable. Does not write anything — `repair_file` drives the
/// rewrite.
fn salvage(buf: &[u8], options: &RepairOptions) -> Result<(HashAlgorithm, Vec<Entry>, RepairReport)> {
    let mut report = RepairReport::default();

    let (algorithm, mut offset) = match decode_header(buf) {
        Ok(header) => match header.checksum_algorithm() {
            Ok(a) => (a, HEADER_SIZE),
            Err(_) => (HashAlgorithm::Blake3, HEADER_SIZE),
        },
        Err(_) => (HashAlgorithm::Blake3, HEADER_SIZE),
    };

    let mut salvaged = Vec::new();
    let mut discarded = 0usize;

    while offset < buf.len() {
        let accessor = match EntryAccessor::new(buf, offset) {
            Ok(a) if a.is_plausible() => a,
            _ => {
                bump_discard(&mut discarded, options.quiet)?;
                match resync(buf, offset + 8) {
                    Some(next) => {
                        offset = next;
                        continue;
                    }
                    None => break,
                }
            }
        };

        match try_extract(&accessor, buf) {
            Ok(mut entry) => {
                if options.remove_paths.contains(&entry.path) {
                    offset = accessor.next_offset();
                    continue;
                }
                if entry.path.is_empty() || entry.path.len() > MAX_PATH_LEN_REPAIR {
                    bump_discard(&mut discarded, options.quiet)?;
                    match resync(buf, accessor.next_offset()) {
                        Some(next) => {
                            offset = next;
                            continue;
                        }
                        None => break,
                    }
                }

                let mut mutation_failed = false;
                for edit in &options.edits {
                    if edit.path != entry.path {
                        continue;
                    }
                    match parse_field_value(&edit.field, &edit.value) {
                        Ok(parsed) => {
                            apply_edit(&mut entry, &edit.field, parsed);
                            report.edits_applied += 1;
                        }
                        Err(e) => {
                            mutation_failed = true;
                            report.edits_failed.push((edit.path.clone(), e.to_string()));
                        }
                    }
                }

                if mutation_failed {
                    bump_discard(&mut discarded, options.quiet)?;
                    match resync(buf, accessor.next_offset()) {
                        Some(next) => {
                            offset = next;
                            continue;
                        }
                        None => break,
                    }
                }

                salvaged.push(entry);
                offset = accessor.next_offset();
            }
            Err(_) => {
                bump_discard(&mut discarded, options.quiet)?;
                match resync(buf, accessor.next_offset()) {
                    Some(next) => {
                        offset = next;
                        continue;
                    }
                    None => break,
                }
            }
        }
    }

    salvaged.extend(options.append_entries.iter().cloned());
    salvaged.sort_by(|a, b| a.path.cmp(&b.path));
    salvaged.dedup_by(|a, b| a.path == b.path);

    log::info!("repair: salvaged {} entries, discarded {discarded}", salvaged.len());
    report.salvaged = salvaged.len();
    report.discarded = discarded;

    Ok((algorithm, salvaged, report))
}

fn try_extract(accessor: &EntryAccessor, buf: &[u8]) -> Result<Entry> {
    let path_region = accessor.raw_path_region()?;
    let nul_pos = path_region
        .iter()
        .position(|&b| b == 0)
        .ok_or(DcfhError::EntryOverflow {
            offset: accessor.offset(),
            size: accessor.size() as u32,
            buffer_len: buf.len(),
        })?;
    let path = String::from_utf8(path_region[..nul_pos].to_vec()).map_err(|e| {
        DcfhError::InvalidFieldValue {
            field: "path".to_owned(),
            value: format!("not valid UTF-8: {e}"),
        }
    })?;

    Ok(Entry {
        ctime_wall: accessor.ctime_wall()?,
        mtime_wall: accessor.mtime_wall()?,
        dev: accessor.dev()?,
        ino: accessor.ino()?,
        mode: accessor.mode()?,
        uid: accessor.uid()?,
        gid: accessor.gid()?,
        file_size: accessor.file_size()?,
        entry_flags: accessor.entry_flags()?,
        hash_type: accessor.hash_type()?,
        hash: accessor.hash()?,
        path,
    })
}

/// Run the full repair pipeline over `buf`: salvage, rebuild a clean
/// header and digest, and return the rewritten bytes alongside a report
/// (spec §4.7 step 4). Never reads or writes outside `buf`'s bounds
/// (testable property 7).
pub fn repair_bytes(buf: &[u8], options: &RepairOptions) -> Result<RepairReport> {
    let (algorithm, entries, mut report) = salvage(buf, options)?;

    let mut entry_bytes = Vec::new();
    for entry in &entries {
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

    report.rewritten_bytes = out;
    Ok(report)
}

/// Repair the index file at `path` in place: read it whole, salvage, and
/// (unless `options.dry_run`) atomically replace it with the rewritten
/// bytes.
pub fn repair_file(path: &Path, options: &RepairOptions) -> Result<RepairReport> {
    let buf = fs::read(path)?;
    let report = repair_bytes(&buf, options)?;

    if !options.dry_run {
        let tmp_path = path.with_extension("idx.repair.tmp");
        {
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&tmp_path)?;
            use std::io::Write;
            file.write_all(&report.rewritten_bytes)?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, path).map_err(|e| DcfhError::AtomicRenameFailed {
            from: tmp_path,
            to: path.to_path_buf(),
            source: e,
        })?;
    }

    Ok(report)
}
