use criterion::{black_box, criterion_group, criterion_main, Criterion};

use dcfh_core::{decode_file, diff, encode_file, Entry, HashAlgorithm};

fn make_entries(count: usize) -> Vec<Entry> {
    (0..count)
        .map(|i| {
            let path = format!("dir{:04}/file{:04}.bin", i / 100, i);
            let hash = HashAlgorithm::Blake3.hash_into_buf(path.as_bytes());
            Entry {
                ctime_wall: 1,
                mtime_wall: 2,
                dev: 1,
                ino: i as u32,
                mode: 0o100644,
                uid: 1000,
                gid: 1000,
                file_size: i as u64,
                entry_flags: 0,
                hash_type: dcfh_core::hash::HASH_TYPE_BLAKE3,
                hash,
                path,
            }
        })
        .collect()
}

fn bench_encode_decode(c: &mut Criterion) {
    let entries = make_entries(10_000);

    c.bench_function("encode_file 10k entries", |b| {
        b.iter(|| {
            let bytes = encode_file(HashAlgorithm::Blake3, black_box(&entries)).unwrap();
            black_box(bytes);
        })
    });

    let bytes = encode_file(HashAlgorithm::Blake3, &entries).unwrap();
    c.bench_function("decode_file 10k entries", |b| {
        b.iter(|| {
            let decoded = decode_file(black_box(&bytes)).unwrap();
            black_box(decoded);
        })
    });
}

fn bench_differ(c: &mut Criterion) {
    let left = make_entries(10_000);
    let mut right = make_entries(10_000);
    for i in (0..right.len()).step_by(50) {
        right[i].file_size += 1;
        right[i].hash[0] ^= 1;
    }

    let left_refs: Vec<(&str, &Entry)> = left.iter().map(|e| (e.path.as_str(), e)).collect();
    let right_refs: Vec<(&str, &Entry)> = right.iter().map(|e| (e.path.as_str(), e)).collect();

    c.bench_function("diff 10k vs 10k entries", |b| {
        b.iter(|| {
            let mut count = 0usize;
            diff(left_refs.clone(), right_refs.clone(), |_ev| {
                count += 1;
                true
            });
            black_box(count);
        })
    });
}

criterion_group!(benches, bench_encode_decode, bench_differ);
criterion_main!(benches);
