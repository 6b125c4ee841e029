use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use std::sync::Arc;

use chrono::Utc;
use loomerp_core::YarnId;
use loomerp_infra::{
    InMemoryInventoryStore, InMemoryYarnCatalog, LedgerFilter, TransactionCoordinator,
    TransactionFilter,
};
use loomerp_inventory::{
    RawTransactionRequest, StockMetrics, TransactionKind, YarnCatalogEntry, YarnLedger, apply,
};
use rust_decimal_macros::dec;
use tokio::runtime::Runtime;

type Coordinator = TransactionCoordinator<Arc<InMemoryInventoryStore>, Arc<InMemoryYarnCatalog>>;

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .build()
        .unwrap()
}

fn setup(yarns: usize) -> (Coordinator, Vec<YarnId>) {
    let catalog = Arc::new(InMemoryYarnCatalog::new());
    let ids: Vec<YarnId> = (0..yarns)
        .map(|i| {
            let id = YarnId::new();
            catalog
                .upsert(YarnCatalogEntry::new(id, format!("Yarn {i:05}"), dec!(50)))
                .unwrap();
            id
        })
        .collect();
    let coordinator = TransactionCoordinator::new(Arc::new(InMemoryInventoryStore::new()), catalog);
    (coordinator, ids)
}

fn stocked(yarn: YarnId) -> RawTransactionRequest {
    RawTransactionRequest::new("stocked", yarn)
        .with_net_weight(dec!(100))
        .with_total_weight(dec!(104.5))
        .with_cones(dec!(10))
}

fn bench_commit_latency(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("commit_latency");
    group.sample_size(500);

    // First commit for a yarn: ledger initialized inside the scope
    group.bench_function("stocked_fresh_ledger", |b| {
        let (coordinator, _) = setup(0);
        let catalog = coordinator.catalog().clone();
        b.iter(|| {
            let yarn = YarnId::new();
            catalog
                .upsert(YarnCatalogEntry::new(yarn, "Fresh", dec!(0)))
                .unwrap();
            rt.block_on(coordinator.create_transaction(black_box(&stocked(yarn))))
                .unwrap();
        });
    });

    // Repeated reservations against one yarn with a growing journal
    group.bench_function("blocked_with_history", |b| {
        let (coordinator, ids) = setup(1);
        let yarn = ids[0];
        rt.block_on(coordinator.create_transaction(&stocked(yarn))).unwrap();
        let request =
            RawTransactionRequest::new("blocked", yarn).with_blocked_net_weight(dec!(0.5));

        b.iter(|| {
            rt.block_on(coordinator.create_transaction(black_box(&request)))
                .unwrap();
        });
    });

    group.finish();
}

fn bench_bucket_application(c: &mut Criterion) {
    let mut group = c.benchmark_group("bucket_application");
    group.throughput(Throughput::Elements(1));

    let delta = StockMetrics::new(dec!(44), dec!(4), dec!(40), dec!(4));
    for kind in [
        TransactionKind::Stocked,
        TransactionKind::Transferred,
        TransactionKind::Issued,
        TransactionKind::Blocked,
    ] {
        group.bench_with_input(
            BenchmarkId::new("apply_and_total", kind.as_str()),
            &kind,
            |b, &kind| {
                let mut ledger = YarnLedger::new(YarnId::new(), "Bench", Utc::now());
                b.iter(|| {
                    apply(&mut ledger, kind, black_box(&delta)).unwrap();
                    ledger.recompute_total().unwrap();
                });
            },
        );
    }

    group.finish();
}

fn bench_queries(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("queries");

    for yarn_count in [10, 100, 1000].iter() {
        let (coordinator, ids) = setup(*yarn_count);
        for yarn in &ids {
            rt.block_on(coordinator.create_transaction(&stocked(*yarn))).unwrap();
        }

        group.throughput(Throughput::Elements(*yarn_count as u64));
        group.bench_with_input(
            BenchmarkId::new("ledger_page", yarn_count),
            yarn_count,
            |b, _| {
                b.iter(|| {
                    black_box(
                        rt.block_on(coordinator.query_ledgers(
                            &LedgerFilter::default(),
                            coordinator.pagination(None, None),
                        ))
                        .unwrap(),
                    );
                });
            },
        );
        group.bench_with_input(
            BenchmarkId::new("journal_by_name", yarn_count),
            yarn_count,
            |b, _| {
                let filter = TransactionFilter {
                    yarn_name: Some("yarn 0000".to_string()),
                    ..Default::default()
                };
                b.iter(|| {
                    black_box(rt.block_on(coordinator.query_transactions(&filter)).unwrap());
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_commit_latency,
    bench_bucket_application,
    bench_queries
);
criterion_main!(benches);
