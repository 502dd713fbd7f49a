//! Fan-out benchmarks: wrapping cost as groups and shared keys grow.
//!
//! Every operation here should scale linearly with the number of holders.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tokio::runtime::Runtime;

use sable_core::EncryptOptions;
use sable_perms::{
    create_signature_group, encrypt_for_signature_group, rotate_group_keys, Capability,
    GroupOptions, HolderSpec, KeyStore, MemberSpec, Role, SharedKeyManager, SharedKeySpec,
};
use sable_store::MemoryStore;
use sable_testkit::fixtures::{alice, multi_party_fixtures, random_payload};

const SIZES: [usize; 4] = [2, 8, 32, 64];

fn members(count: usize) -> Vec<MemberSpec> {
    multi_party_fixtures(count)
        .iter()
        .map(|p| MemberSpec::new(p.public_key(), Role::Member))
        .collect()
}

fn bench_group_create(c: &mut Criterion) {
    let owner = alice();
    let mut group = c.benchmark_group("group_create");
    for size in SIZES {
        let specs = members(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &specs, |b, specs| {
            b.iter(|| create_signature_group("bench", &owner, specs, GroupOptions::default()).unwrap())
        });
    }
    group.finish();
}

fn bench_group_rotate(c: &mut Criterion) {
    let owner = alice();
    let mut group = c.benchmark_group("group_rotate");
    for size in SIZES {
        let signature_group = create_signature_group("bench", &owner, &members(size), GroupOptions::default()).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(size), &signature_group, |b, g| {
            b.iter(|| rotate_group_keys(g, &owner).unwrap())
        });
    }
    group.finish();
}

fn bench_group_encrypt(c: &mut Criterion) {
    let owner = alice();
    let signature_group = create_signature_group("bench", &owner, &members(8), GroupOptions::default()).unwrap();
    let payload = random_payload(4096);
    let options = EncryptOptions::default();
    c.bench_function("group_encrypt_4k", |b| {
        b.iter(|| encrypt_for_signature_group(black_box(&payload), &signature_group, &owner, &options).unwrap())
    });
}

fn bench_shared_key_create(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let creator = alice();
    let manager = SharedKeyManager::new(Arc::new(KeyStore::new(Arc::new(MemoryStore::new()))));
    let mut group = c.benchmark_group("shared_key_create");
    for size in SIZES {
        let holders: Vec<HolderSpec> = multi_party_fixtures(size)
            .iter()
            .map(|p| HolderSpec::new(p.public_key(), Capability::read_write()))
            .collect();
        group.bench_with_input(BenchmarkId::from_parameter(size), &holders, |b, holders| {
            b.iter(|| {
                rt.block_on(manager.create_shared_key(SharedKeySpec::new("bench", "fanout"), holders, &creator))
                    .unwrap()
            })
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_group_create,
    bench_group_rotate,
    bench_group_encrypt,
    bench_shared_key_create
);
criterion_main!(benches);
