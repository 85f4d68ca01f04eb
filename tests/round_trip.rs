//! Round-trip and digest properties (testable properties 1-2).

use dcfh_core::{decode_file, encode_file, verify_file, Entry, HashAlgorithm};
use proptest::prelude::*;

fn arb_path() -> impl Strategy<Value = String> {
    "[a-z]{1,6}(/[a-z]{1,6}){0,3}"
}

fn arb_entry(path: String) -> Entry {
    Entry {
        ctime_wall: 1_700_000_000_000_000_000,
        mtime_wall: 1_700_000_000_000_000_001,
        dev: 42,
        ino: 7,
        mode: 0o100644,
        uid: 1000,
        gid: 1000,
        file_size: path.len() as u64,
        entry_flags: 0,
        hash_type: dcfh_core::hash::HASH_TYPE_BLAKE3,
        hash: HashAlgorithm::Blake3.hash_into_buf(path.as_bytes()),
        path,
    }
}

fn sorted_unique_entries(mut paths: Vec<String>) -> Vec<Entry> {
    paths.sort();
    paths.dedup();
    paths.into_iter().map(arb_entry).collect()
}

proptest! {
    #[test]
    fn round_trip_preserves_entries(paths in prop::collection::vec(arb_path(), 0..20)) {
        let entries = sorted_unique_entries(paths);
        let bytes = encode_file(HashAlgorithm::Blake3, &entries).unwrap();
        let decoded = decode_file(&bytes).unwrap();
        prop_assert_eq!(decoded.entries, entries);
    }

    #[test]
    fn encoded_entries_are_eight_byte_aligned(paths in prop::collection::vec(arb_path(), 0..20)) {
        let entries = sorted_unique_entries(paths);
        let bytes = encode_file(HashAlgorithm::Blake3, &entries).unwrap();
        let decoded = decode_file(&bytes).unwrap();
        prop_assert_eq!(decoded.entries.len(), entries.len());
    }

    #[test]
    fn verify_succeeds_on_freshly_encoded_file(paths in prop::collection::vec(arb_path(), 0..20)) {
        let entries = sorted_unique_entries(paths);
        let bytes = encode_file(HashAlgorithm::Blake3, &entries).unwrap();
        prop_assert!(verify_file(&bytes).is_ok());
    }

    #[test]
    fn flipping_a_bit_outside_the_digest_breaks_verification(
        paths in prop::collection::vec(arb_path(), 1..10),
        raw_index in any::<u32>(),
    ) {
        let entries = sorted_unique_entries(paths);
        prop_assume!(!entries.is_empty());
        let mut bytes = encode_file(HashAlgorithm::Blake3, &entries).unwrap();

        // Flip a bit anywhere in the file except inside the checksum field
        // itself — header or entry stream alike — so this actually
        // exercises the digest-over-the-entry-region path, not just the
        // header's fixed prefix.
        let checksum_start = dcfh_core::format::HEADER_SIZE - dcfh_core::hash::DIGEST_BUF_LEN;
        let checksum_end = dcfh_core::format::HEADER_SIZE;
        let offsets: Vec<usize> = (0..bytes.len())
            .filter(|&i| !(checksum_start..checksum_end).contains(&i))
            .collect();
        prop_assume!(!offsets.is_empty());
        let byte = offsets[raw_index as usize % offsets.len()];
        let bit = (raw_index as usize / offsets.len()) % 8;
        bytes[byte] ^= 1 << bit;

        prop_assert!(verify_file(&bytes).is_err());
    }
}

#[test]
fn empty_index_round_trips() {
    let bytes = encode_file(HashAlgorithm::Blake3, &[]).unwrap();
    let decoded = decode_file(&bytes).unwrap();
    assert_eq!(decoded.header.entry_count, 0);
    assert!(decoded.entries.is_empty());
    assert!(verify_file(&bytes).is_ok());
}

#[test]
fn short_paths_do_not_trip_the_minimum_size_threshold() {
    // Regression: a single-character path must not be rejected as
    // EntryTooSmall even though fixed_prefix + 1 + padding is below the
    // fixed_prefix + 9 decode threshold on its own.
    let entries = vec![arb_entry("a".to_owned()), arb_entry("b/c".to_owned())];
    let bytes = encode_file(HashAlgorithm::Blake3, &entries).unwrap();
    let decoded = decode_file(&bytes).unwrap();
    assert_eq!(decoded.entries.len(), 2);
}
