//! Run-once guard overhead
//!
//! Measures what a traced call costs on top of the call itself:
//!
//! 1. Fingerprint construction from an explicit caller context
//! 2. `claim` on the in-memory ledger (hit and miss)
//! 3. `claim` on a file ledger that already holds N entries
//!
//! ```bash
//! cargo bench --bench ledger_overhead
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use runledger::call_site::{CallSite, CallerContext};
use runledger::fingerprint::{Fingerprint, FingerprintBuilder};
use runledger::ledger::{FileLedger, InvocationLedger, MemoryLedger};
use tempfile::TempDir;

fn login_ctx(line: u32) -> CallerContext {
    CallerContext::new(CallSite::new("tests/test_login.rs", line, "test_login"))
        .with_receiver_text("suite::test_login::LoginTest")
}

fn bench_fingerprint_build(c: &mut Criterion) {
    let builder = FingerprintBuilder::new("test_").unwrap();
    let ctx = login_ctx(42);

    c.bench_function("fingerprint_build", |b| {
        b.iter(|| black_box(builder.build(black_box(&ctx), "Page", "click")));
    });
}

fn bench_memory_claim(c: &mut Criterion) {
    let mut group = c.benchmark_group("memory_ledger_claim");

    let ledger = MemoryLedger::new();
    let fp = Fingerprint::new("tests/test_login.rs", "LoginTest", "test_login", "Page", "click", 42);
    ledger.claim(&fp).unwrap();
    group.bench_function("hit", |b| {
        b.iter(|| black_box(ledger.claim(black_box(&fp)).unwrap()));
    });

    group.bench_function("miss", |b| {
        let ledger = MemoryLedger::new();
        let mut line = 0u32;
        b.iter(|| {
            line = line.wrapping_add(1);
            let fp = Fingerprint::new("a.rs", "", "f", "C", "m", line);
            black_box(ledger.claim(&fp).unwrap())
        });
    });

    group.finish();
}

fn bench_file_claim(c: &mut Criterion) {
    let mut group = c.benchmark_group("file_ledger_claim_hit");

    for entries in [10u32, 100, 1000] {
        let dir = TempDir::new().unwrap();
        let ledger = FileLedger::new(dir.path().join("ledger.log"));
        for line in 0..entries {
            let fp = Fingerprint::new("a.rs", "", "f", "C", "m", line);
            ledger.record(&fp).unwrap();
        }
        let last = Fingerprint::new("a.rs", "", "f", "C", "m", entries - 1);

        group.bench_with_input(BenchmarkId::from_parameter(entries), &last, |b, fp| {
            b.iter(|| black_box(ledger.claim(fp).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_fingerprint_build, bench_memory_claim, bench_file_claim);
criterion_main!(benches);
