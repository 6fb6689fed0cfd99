use std::sync::Arc;

use common::{BranchId, Money, Quantity, WarehouseId};
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{
    Aggregate, ApproveTraspaso, CajaAccount, CajaEvent, CajaService, CreditStock, DomainConfig,
    EntryKind, InMemoryWarehouseDirectory, InventoryService, OpenCaja, PostEntry, RequestLine,
    RequestTraspaso, StockReason, TraspasoWorkflow,
};
use event_store::{EventStore, InMemoryEventStore};

fn caja_service(store: &InMemoryEventStore) -> CajaService {
    CajaService::new(Arc::new(store.clone()), DomainConfig::default())
}

fn bench_open_caja(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("domain/open_caja", |b| {
        b.iter(|| {
            rt.block_on(async {
                let store = InMemoryEventStore::new();
                caja_service(&store)
                    .open(OpenCaja::new("SUC-1", "op-1", Money::from_cents(10_000)))
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_post_entry(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryEventStore::new();
    let service = caja_service(&store);
    let caja_id = rt.block_on(async {
        service
            .open(OpenCaja::new("SUC-1", "op-1", Money::zero()))
            .await
            .unwrap()
            .aggregate
            .id()
            .unwrap()
    });

    c.bench_function("domain/post_entry", |b| {
        b.iter(|| {
            rt.block_on(async {
                service
                    .post(PostEntry::new(
                        caja_id,
                        EntryKind::SaleCash,
                        Money::from_cents(1_250),
                    ))
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_ledger_fold(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryEventStore::new();
    let service = caja_service(&store);

    // 1 open + 200 postings across every kind
    let caja_id = rt.block_on(async {
        let caja_id = service
            .open(OpenCaja::new("SUC-1", "op-1", Money::from_cents(5_000)))
            .await
            .unwrap()
            .aggregate
            .id()
            .unwrap();
        for i in 0..200 {
            let kind = EntryKind::ALL[i % EntryKind::ALL.len()];
            service
                .post(PostEntry::new(caja_id, kind, Money::from_cents(100 + i as i64)))
                .await
                .unwrap();
        }
        caja_id
    });

    c.bench_function("domain/reconstruct_caja_200_entries", |b| {
        b.iter(|| {
            rt.block_on(async {
                let events = store.get_events_for_aggregate(caja_id).await.unwrap();
                let mut caja = CajaAccount::default();
                for event in &events {
                    let domain_event: CajaEvent = event.decode().unwrap();
                    caja.apply(domain_event);
                }
                caja.balance()
            })
        });
    });

    c.bench_function("domain/get_balance_with_snapshot", |b| {
        b.iter(|| rt.block_on(async { service.get_balance(caja_id).await.unwrap() }));
    });
}

fn bench_traspaso_cycle(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("domain/traspaso_request_approve", |b| {
        b.iter(|| {
            rt.block_on(async {
                let store = InMemoryEventStore::new();
                let shared: Arc<dyn EventStore> = Arc::new(store);
                let config = DomainConfig::default();
                let directory = InMemoryWarehouseDirectory::with_entries([
                    (WarehouseId::new("ALM-1"), BranchId::new("SUC-1")),
                    (WarehouseId::new("ALM-2"), BranchId::new("SUC-2")),
                ]);
                let inventory = InventoryService::new(shared.clone(), &config);
                let workflow = TraspasoWorkflow::new(shared, Arc::new(directory), config);

                for article in ["A", "B", "C"] {
                    inventory
                        .credit(CreditStock::new(
                            "ALM-1",
                            article,
                            Quantity::new(100),
                            StockReason::Purchase,
                        ))
                        .await
                        .unwrap();
                }
                let lines = ["A", "B", "C"]
                    .into_iter()
                    .map(|article| RequestLine::new(article, Quantity::new(10)))
                    .collect();
                let requested = workflow
                    .request(RequestTraspaso::new("ALM-1", "ALM-2", "op-1", lines))
                    .await
                    .unwrap();
                workflow
                    .approve(ApproveTraspaso::new(requested.aggregate.id().unwrap()))
                    .await
                    .unwrap();
            });
        });
    });
}

criterion_group!(
    benches,
    bench_open_caja,
    bench_post_entry,
    bench_ledger_fold,
    bench_traspaso_cycle,
);
criterion_main!(benches);
