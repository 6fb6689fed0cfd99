//! Integration tests for the caja lifecycle.
//!
//! These tests run the service against the in-memory store and check the
//! ledger fold, the single-open-register rule and idempotent retries.

use std::sync::Arc;
use std::time::Duration;

use common::{AggregateId, BranchId, Money, OperatorId};
use domain::{
    Aggregate, CajaError, CajaEvent, CajaService, CajaStatus, CloseCaja, DomainConfig,
    DomainError, EntryKind, ErrorKind, OpenCaja, PostEntry,
};
use event_store::{EventStore, InMemoryEventStore, TimeoutEventStore, Version};

fn create_service(store: &InMemoryEventStore) -> CajaService {
    CajaService::new(Arc::new(store.clone()), DomainConfig::default())
}

async fn open(service: &CajaService, branch: &str, operator: &str, cents: i64) -> AggregateId {
    service
        .open(OpenCaja::new(branch, operator, Money::from_cents(cents)))
        .await
        .unwrap()
        .aggregate
        .id()
        .unwrap()
}

async fn post(service: &CajaService, caja_id: AggregateId, kind: EntryKind, cents: i64) {
    service
        .post(PostEntry::new(caja_id, kind, Money::from_cents(cents)))
        .await
        .unwrap();
}

mod ledger {
    use super::*;

    #[tokio::test]
    async fn balance_matches_worked_example() {
        let store = InMemoryEventStore::new();
        let service = create_service(&store);
        let caja_id = open(&service, "SUC-1", "op-1", 10_000).await;

        post(&service, caja_id, EntryKind::SaleCash, 5_000).await;
        post(&service, caja_id, EntryKind::Withdrawal, 2_000).await;
        post(&service, caja_id, EntryKind::PurchaseCredit, 3_000).await;

        let balance = service.get_balance(caja_id).await.unwrap();
        assert_eq!(balance, Money::from_cents(10_000));
        assert_eq!(balance.to_string(), "100.00");
    }

    #[tokio::test]
    async fn balance_equals_independent_fold_of_stored_entries() {
        let store = InMemoryEventStore::new();
        let service = create_service(&store);
        let caja_id = open(&service, "SUC-1", "op-1", 2_500).await;

        let postings = [
            (EntryKind::SaleCash, 1_250),
            (EntryKind::SaleQr, 990),
            (EntryKind::SaleCredit, 0),
            (EntryKind::Deposit, 5_000),
            (EntryKind::PurchaseCash, 730),
            (EntryKind::PurchaseCredit, 4_100),
            (EntryKind::Withdrawal, 15),
            (EntryKind::SaleCash, 3),
        ];
        for (kind, cents) in postings {
            post(&service, caja_id, kind, cents).await;
        }

        let entries = service.get_entries(caja_id).await.unwrap();
        let expected = entries.iter().fold(Money::from_cents(2_500), |acc, entry| {
            if entry.kind.is_sale() || entry.kind == EntryKind::Deposit {
                acc + entry.amount
            } else {
                acc - entry.amount
            }
        });

        let summary = service.get_summary(caja_id).await.unwrap();
        assert_eq!(summary.net_balance, expected);
        assert_eq!(service.get_balance(caja_id).await.unwrap(), expected);
        assert_eq!(summary.entry_count, postings.len());
        assert_eq!(
            summary.total_sales,
            summary.totals.sale_cash + summary.totals.sale_credit + summary.totals.sale_qr
        );
        assert_eq!(
            entries.iter().map(|e| e.sequence).collect::<Vec<_>>(),
            (1..=postings.len() as u32).collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn reference_and_description_are_kept() {
        let store = InMemoryEventStore::new();
        let service = create_service(&store);
        let caja_id = open(&service, "SUC-1", "op-1", 0).await;

        service
            .post(
                PostEntry::new(caja_id, EntryKind::SaleCash, Money::from_cents(4_500))
                    .with_reference("VENTA-77")
                    .with_description("mostrador"),
            )
            .await
            .unwrap();

        let entries = service.get_entries(caja_id).await.unwrap();
        assert_eq!(entries[0].reference.as_deref(), Some("VENTA-77"));
        assert_eq!(entries[0].description.as_deref(), Some("mostrador"));
        assert_eq!(entries[0].caja_id, caja_id);
    }

    #[tokio::test]
    async fn invalid_amounts_are_validation_errors() {
        let store = InMemoryEventStore::new();
        let service = create_service(&store);
        let caja_id = open(&service, "SUC-1", "op-1", 0).await;

        let err = service
            .post(PostEntry::new(caja_id, EntryKind::Deposit, Money::zero()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = service
            .post(PostEntry::new(caja_id, EntryKind::SaleCash, Money::from_cents(-1)))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");

        assert!(service.get_entries(caja_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn concurrent_posts_all_land() {
        let store = InMemoryEventStore::new();
        let service = create_service(&store);
        let caja_id = open(&service, "SUC-1", "op-1", 0).await;

        let mut handles = Vec::new();
        for _ in 0..3 {
            let service = service.clone();
            handles.push(tokio::spawn(async move {
                post(&service, caja_id, EntryKind::Deposit, 100).await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let caja = service.get_caja(caja_id).await.unwrap();
        assert_eq!(caja.balance(), Money::from_cents(300));
        assert_eq!(caja.version(), Version::new(4));
    }
}

mod lifecycle {
    use super::*;

    #[tokio::test]
    async fn second_open_conflicts_until_first_is_closed() {
        let store = InMemoryEventStore::new();
        let service = create_service(&store);
        let first = open(&service, "SUC-1", "op-1", 0).await;

        let err = service
            .open(OpenCaja::new("SUC-1", "op-1", Money::zero()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::Caja(CajaError::AlreadyOpen { caja_id, .. }) if caja_id == first
        ));
        assert_eq!(err.kind(), ErrorKind::Conflict);

        // Other operators and branches are independent.
        open(&service, "SUC-1", "op-2", 0).await;
        open(&service, "SUC-2", "op-1", 0).await;

        service.close(CloseCaja::new(first)).await.unwrap();
        let second = open(&service, "SUC-1", "op-1", 0).await;
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn concurrent_opens_for_same_pair_commit_once() {
        let store = InMemoryEventStore::new();
        let service = create_service(&store);

        let (a, b) = tokio::join!(
            service.open(OpenCaja::new("SUC-1", "op-1", Money::zero())),
            service.open(OpenCaja::new("SUC-1", "op-1", Money::zero())),
        );

        let successes = [&a, &b].iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1);
        let failure = (if a.is_err() { a } else { b }).unwrap_err();
        assert!(matches!(
            failure.kind(),
            ErrorKind::Conflict | ErrorKind::ConcurrencyConflict
        ));
        // One CajaOpened and one SlotClaimed.
        assert_eq!(store.event_count().await, 2);
    }

    #[tokio::test]
    async fn posting_to_closed_caja_is_invalid_state() {
        let store = InMemoryEventStore::new();
        let service = create_service(&store);
        let caja_id = open(&service, "SUC-1", "op-1", 1_000).await;
        service.close(CloseCaja::new(caja_id)).await.unwrap();

        let err = service
            .post(PostEntry::new(caja_id, EntryKind::SaleCash, Money::from_cents(100)))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert!(service.get_entries(caja_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn closing_twice_is_invalid_state() {
        let store = InMemoryEventStore::new();
        let service = create_service(&store);
        let caja_id = open(&service, "SUC-1", "op-1", 0).await;

        service.close(CloseCaja::new(caja_id)).await.unwrap();
        let err = service.close(CloseCaja::new(caja_id)).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[tokio::test]
    async fn close_records_count_and_timestamps() {
        let store = InMemoryEventStore::new();
        let service = create_service(&store);
        let caja_id = open(&service, "SUC-1", "op-1", 10_000).await;
        post(&service, caja_id, EntryKind::SaleCash, 2_000).await;
        post(&service, caja_id, EntryKind::SaleQr, 500).await;

        let result = service
            .close(CloseCaja::new(caja_id).with_counted_cash(Money::from_cents(11_900)))
            .await
            .unwrap();

        let CajaEvent::CajaClosed(data) = &result.events[0] else {
            panic!("expected CajaClosed");
        };
        assert_eq!(data.count.expected_cash, Money::from_cents(12_000));
        assert_eq!(data.count.difference, Some(Money::from_cents(-100)));

        let summary = service.get_summary(caja_id).await.unwrap();
        assert_eq!(summary.status, CajaStatus::Closed);
        assert!(summary.closed_at.is_some());
        assert!(summary.closed_at >= Some(summary.opened_at));
    }

    #[tokio::test]
    async fn negative_close_follows_configuration() {
        let store = InMemoryEventStore::new();
        let strict = create_service(&store);
        let caja_id = open(&strict, "SUC-1", "op-1", 0).await;
        post(&strict, caja_id, EntryKind::PurchaseCredit, 700).await;

        let err = strict.close(CloseCaja::new(caja_id)).await.unwrap_err();
        assert!(matches!(
            err,
            DomainError::Caja(CajaError::NegativeBalance { .. })
        ));

        let lenient = CajaService::new(
            Arc::new(store.clone()),
            DomainConfig {
                allow_negative_close: true,
                ..DomainConfig::default()
            },
        );
        let closed = lenient.close(CloseCaja::new(caja_id)).await.unwrap();
        assert_eq!(closed.aggregate.balance(), Money::from_cents(-700));
    }

    #[tokio::test]
    async fn open_caja_lookup() {
        let store = InMemoryEventStore::new();
        let service = create_service(&store);
        let branch = BranchId::new("SUC-1");
        let operator = OperatorId::new("op-1");

        assert!(service.get_open_caja(&branch, &operator).await.unwrap().is_none());
        let caja_id = open(&service, "SUC-1", "op-1", 0).await;
        let open_caja = service.get_open_caja(&branch, &operator).await.unwrap();
        assert_eq!(open_caja.and_then(|c| c.id()), Some(caja_id));
    }
}

mod idempotency {
    use super::*;

    #[tokio::test]
    async fn retried_post_is_applied_once() {
        let store = InMemoryEventStore::new();
        let service = create_service(&store);
        let caja_id = open(&service, "SUC-1", "op-1", 0).await;

        let cmd = PostEntry::new(caja_id, EntryKind::Deposit, Money::from_cents(1_000))
            .with_idempotency_key("dep-1");
        let first = service.post(cmd.clone()).await.unwrap();
        let retry = service.post(cmd).await.unwrap();

        assert!(!first.replayed);
        assert!(retry.replayed);
        assert_eq!(retry.new_version, first.new_version);
        assert_eq!(service.get_entries(caja_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn key_of_a_posting_does_not_close_the_caja() {
        let store = InMemoryEventStore::new();
        let service = create_service(&store);
        let caja_id = open(&service, "SUC-1", "op-1", 0).await;
        service
            .post(
                PostEntry::new(caja_id, EntryKind::Deposit, Money::from_cents(500))
                    .with_idempotency_key("k"),
            )
            .await
            .unwrap();

        let err = service
            .close(CloseCaja::new(caja_id).with_idempotency_key("k"))
            .await
            .unwrap_err();

        assert!(matches!(err, DomainError::IdempotencyKeyReused { .. }));
        assert_eq!(err.kind(), ErrorKind::Conflict);
        let summary = service.get_summary(caja_id).await.unwrap();
        assert_eq!(summary.status, CajaStatus::Open);

        let closed = service.close(CloseCaja::new(caja_id)).await.unwrap();
        assert!(!closed.replayed);
        assert_eq!(closed.aggregate.status(), CajaStatus::Closed);
    }

    #[tokio::test]
    async fn key_of_a_posting_does_not_replay_on_another_caja() {
        let store = InMemoryEventStore::new();
        let service = create_service(&store);
        let first = open(&service, "SUC-1", "op-1", 0).await;
        let second = open(&service, "SUC-1", "op-2", 0).await;

        let cmd = |caja_id| {
            PostEntry::new(caja_id, EntryKind::SaleCash, Money::from_cents(700))
                .with_idempotency_key("venta-9")
        };
        service.post(cmd(first)).await.unwrap();
        let err = service.post(cmd(second)).await.unwrap_err();

        assert!(matches!(err, DomainError::IdempotencyKeyReused { .. }));
        assert!(service.get_entries(second).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn key_reused_for_another_aggregate_type_is_conflict() {
        let store = InMemoryEventStore::new();
        let service = create_service(&store);
        let caja_id = open(&service, "SUC-1", "op-1", 0).await;
        service
            .post(
                PostEntry::new(caja_id, EntryKind::Deposit, Money::from_cents(1))
                    .with_idempotency_key("shared"),
            )
            .await
            .unwrap();

        let inventory =
            domain::InventoryService::new(Arc::new(store.clone()), &DomainConfig::default());
        let err = inventory
            .credit(
                domain::CreditStock::new(
                    "ALM-1",
                    "A",
                    common::Quantity::new(1),
                    domain::StockReason::Purchase,
                )
                .with_idempotency_key("shared"),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, DomainError::IdempotencyKeyReused { .. }));
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }
}

mod infrastructure {
    use super::*;

    #[tokio::test]
    async fn timeout_wrapped_store_serves_normal_traffic() {
        let store = InMemoryEventStore::new();
        let timed: Arc<dyn EventStore> =
            Arc::new(TimeoutEventStore::new(store.clone(), Duration::from_secs(1)));
        let service = CajaService::new(timed, DomainConfig::default());

        let caja_id = open(&service, "SUC-1", "op-1", 500).await;
        post(&service, caja_id, EntryKind::SaleCash, 500).await;

        assert_eq!(
            service.get_balance(caja_id).await.unwrap(),
            Money::from_cents(1_000)
        );
    }
}
