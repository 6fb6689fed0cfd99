//! Caja service: open, post, close and the read-side queries.

use std::sync::Arc;

use common::{AggregateId, BranchId, Money, OperatorId};
use event_store::EventStore;

use crate::aggregate::Aggregate;
use crate::command::{
    CommandHandler, CommandResult, CommitOutcome, Operation, UnitOfWork, find_replay, load,
    load_existing, with_conflict_retry,
};
use crate::config::DomainConfig;
use crate::error::DomainError;

use super::{CajaAccount, CajaSlot, CajaSummary, CloseCaja, LedgerEntry, OpenCaja, PostEntry};

const OPEN: Operation = Operation::create("caja.open");
const CLOSE: &str = "caja.close";

/// Service for managing cajas.
///
/// Open and close touch two streams (the caja and its register slot) and are
/// committed as one batch; postings only touch the caja stream.
#[derive(Clone)]
pub struct CajaService {
    store: Arc<dyn EventStore>,
    accounts: CommandHandler<CajaAccount>,
    config: DomainConfig,
}

impl CajaService {
    pub fn new(store: Arc<dyn EventStore>, config: DomainConfig) -> Self {
        Self {
            accounts: CommandHandler::new(store.clone(), config.max_conflict_retries),
            store,
            config,
        }
    }

    fn store(&self) -> &dyn EventStore {
        self.store.as_ref()
    }

    /// Opens a caja, claiming the register slot of its branch and operator.
    #[tracing::instrument(skip(self, cmd), fields(caja_id = %cmd.caja_id, branch = %cmd.branch, operator = %cmd.operator))]
    pub async fn open(&self, cmd: OpenCaja) -> Result<CommandResult<CajaAccount>, DomainError> {
        let key = cmd.idempotency_key.as_ref();
        if let Some(caja) = find_replay::<CajaAccount>(self.store(), key, OPEN).await? {
            return Ok(CommandResult::replay(caja));
        }

        let cmd = &cmd;
        let result = with_conflict_retry(OPEN.name, self.config.max_conflict_retries, || {
            self.try_open(cmd)
        })
        .await
        .inspect_err(|error| tracing::warn!(%error, "caja open rejected"))?;

        if !result.replayed {
            metrics::counter!("caja_opened_total").increment(1);
            tracing::info!(opening_balance = %cmd.opening_balance, "caja opened");
        }
        Ok(result)
    }

    async fn try_open(&self, cmd: &OpenCaja) -> Result<CommandResult<CajaAccount>, DomainError> {
        let mut caja: CajaAccount = load(self.store(), cmd.caja_id).await?;
        let slot_id = CajaSlot::id_for(&cmd.branch, &cmd.operator);
        let slot: CajaSlot = load(self.store(), slot_id).await?;

        let events = caja.open(
            cmd.caja_id,
            cmd.branch.clone(),
            cmd.operator.clone(),
            cmd.opening_balance,
        )?;
        let slot_events = slot.claim(&cmd.branch, &cmd.operator, cmd.caja_id)?;

        let mut unit = UnitOfWork::new();
        let new_version = unit.record::<CajaAccount>(cmd.caja_id, caja.version(), &events)?;
        unit.record::<CajaSlot>(slot_id, slot.version(), &slot_events)?;

        let key = cmd.idempotency_key.as_ref();
        match unit
            .commit_or_replay::<CajaAccount>(self.store(), key, OPEN)
            .await?
        {
            CommitOutcome::Replayed(caja) => Ok(CommandResult::replay(caja)),
            CommitOutcome::Committed(_) => {
                caja.apply_events(events.iter().cloned());
                caja.set_version(new_version);
                Ok(CommandResult {
                    aggregate: caja,
                    events,
                    new_version,
                    replayed: false,
                })
            }
        }
    }

    /// Posts a ledger entry to an open caja.
    #[tracing::instrument(skip(self, cmd), fields(caja_id = %cmd.caja_id, kind = %cmd.kind, amount = %cmd.amount))]
    pub async fn post(&self, cmd: PostEntry) -> Result<CommandResult<CajaAccount>, DomainError> {
        let PostEntry {
            caja_id,
            kind,
            amount,
            reference,
            description,
            idempotency_key,
        } = cmd;

        let result = self
            .accounts
            .execute_with_snapshot("caja.post", caja_id, idempotency_key.as_ref(), |caja| {
                caja.post(kind, amount, reference.clone(), description.clone())
            })
            .await
            .inspect_err(|error| tracing::warn!(%error, "posting rejected"))?;

        if !result.replayed {
            metrics::counter!("caja_postings_total", "kind" => kind.as_str()).increment(1);
            tracing::debug!(version = %result.new_version, "entry posted");
        }
        Ok(result)
    }

    /// Closes a caja and releases its register slot.
    #[tracing::instrument(skip(self, cmd), fields(caja_id = %cmd.caja_id))]
    pub async fn close(&self, cmd: CloseCaja) -> Result<CommandResult<CajaAccount>, DomainError> {
        let key = cmd.idempotency_key.as_ref();
        let operation = Operation::on(CLOSE, cmd.caja_id);
        if let Some(caja) = find_replay::<CajaAccount>(self.store(), key, operation).await? {
            return Ok(CommandResult::replay(caja));
        }

        let cmd = &cmd;
        let result = with_conflict_retry(CLOSE, self.config.max_conflict_retries, || {
            self.try_close(cmd)
        })
        .await
        .inspect_err(|error| tracing::warn!(%error, "caja close rejected"))?;

        if !result.replayed {
            metrics::counter!("caja_closed_total").increment(1);
            tracing::info!(balance = %result.aggregate.balance(), "caja closed");
        }
        Ok(result)
    }

    async fn try_close(&self, cmd: &CloseCaja) -> Result<CommandResult<CajaAccount>, DomainError> {
        let mut caja: CajaAccount = load_existing(self.store(), cmd.caja_id).await?;
        let events = caja.close(cmd.counted_cash, self.config.allow_negative_close)?;

        let (Some(branch), Some(operator)) = (caja.branch(), caja.operator()) else {
            return Err(DomainError::not_found(CajaSlot::aggregate_type(), cmd.caja_id));
        };
        let slot_id = CajaSlot::id_for(branch, operator);
        let slot: CajaSlot = load(self.store(), slot_id).await?;
        let slot_events = slot.release(cmd.caja_id)?;

        let mut unit = UnitOfWork::new();
        let new_version = unit.record::<CajaAccount>(cmd.caja_id, caja.version(), &events)?;
        unit.record::<CajaSlot>(slot_id, slot.version(), &slot_events)?;

        let key = cmd.idempotency_key.as_ref();
        let operation = Operation::on(CLOSE, cmd.caja_id);
        match unit
            .commit_or_replay::<CajaAccount>(self.store(), key, operation)
            .await?
        {
            CommitOutcome::Replayed(caja) => Ok(CommandResult::replay(caja)),
            CommitOutcome::Committed(_) => {
                caja.apply_events(events.iter().cloned());
                caja.set_version(new_version);
                Ok(CommandResult {
                    aggregate: caja,
                    events,
                    new_version,
                    replayed: false,
                })
            }
        }
    }

    /// Gets a caja by ID.
    #[tracing::instrument(skip(self))]
    pub async fn get_caja(&self, caja_id: AggregateId) -> Result<CajaAccount, DomainError> {
        load_existing(self.store(), caja_id).await
    }

    /// Net balance recomputed from the caja's entries.
    #[tracing::instrument(skip(self))]
    pub async fn get_balance(&self, caja_id: AggregateId) -> Result<Money, DomainError> {
        Ok(self.get_caja(caja_id).await?.balance())
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_summary(&self, caja_id: AggregateId) -> Result<CajaSummary, DomainError> {
        self.get_caja(caja_id)
            .await?
            .summary()
            .ok_or_else(|| DomainError::not_found(CajaAccount::aggregate_type(), caja_id))
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_entries(&self, caja_id: AggregateId) -> Result<Vec<LedgerEntry>, DomainError> {
        Ok(self.get_caja(caja_id).await?.entries().to_vec())
    }

    /// The caja currently open for a branch and operator, if any.
    #[tracing::instrument(skip(self))]
    pub async fn get_open_caja(
        &self,
        branch: &BranchId,
        operator: &OperatorId,
    ) -> Result<Option<CajaAccount>, DomainError> {
        let slot: CajaSlot = load(self.store(), CajaSlot::id_for(branch, operator)).await?;
        match slot.holder() {
            Some(caja_id) => Ok(Some(self.get_caja(caja_id).await?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caja::{CajaStatus, EntryKind};
    use crate::error::ErrorKind;
    use event_store::InMemoryEventStore;

    fn service(store: &InMemoryEventStore) -> CajaService {
        CajaService::new(Arc::new(store.clone()), DomainConfig::default())
    }

    #[tokio::test]
    async fn open_claims_slot_in_same_batch() {
        let store = InMemoryEventStore::new();
        let service = service(&store);

        let result = service
            .open(OpenCaja::new("SUC-1", "op-1", Money::from_cents(10_000)))
            .await
            .unwrap();

        assert_eq!(result.aggregate.status(), CajaStatus::Open);
        assert_eq!(store.event_count().await, 2);
        let open = service
            .get_open_caja(&BranchId::new("SUC-1"), &OperatorId::new("op-1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(open.id(), result.aggregate.id());
    }

    #[tokio::test]
    async fn second_open_for_same_pair_conflicts() {
        let store = InMemoryEventStore::new();
        let service = service(&store);
        service
            .open(OpenCaja::new("SUC-1", "op-1", Money::zero()))
            .await
            .unwrap();

        let err = service
            .open(OpenCaja::new("SUC-1", "op-1", Money::zero()))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(store.event_count().await, 2);
    }

    #[tokio::test]
    async fn close_releases_slot() {
        let store = InMemoryEventStore::new();
        let service = service(&store);
        let caja_id = service
            .open(OpenCaja::new("SUC-1", "op-1", Money::from_cents(500)))
            .await
            .unwrap()
            .aggregate
            .id()
            .unwrap();

        let closed = service.close(CloseCaja::new(caja_id)).await.unwrap();
        assert_eq!(closed.aggregate.status(), CajaStatus::Closed);

        let branch = BranchId::new("SUC-1");
        let operator = OperatorId::new("op-1");
        assert!(service.get_open_caja(&branch, &operator).await.unwrap().is_none());
        assert!(
            service
                .open(OpenCaja::new("SUC-1", "op-1", Money::zero()))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn post_to_unknown_caja_is_not_found() {
        let store = InMemoryEventStore::new();
        let err = service(&store)
            .post(PostEntry::new(
                AggregateId::new(),
                EntryKind::Deposit,
                Money::from_cents(100),
            ))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn replayed_open_returns_same_caja() {
        let store = InMemoryEventStore::new();
        let service = service(&store);
        let cmd = OpenCaja::new("SUC-1", "op-1", Money::zero()).with_idempotency_key("open-1");

        let first = service.open(cmd.clone()).await.unwrap();
        let second = service.open(cmd).await.unwrap();

        assert!(second.replayed);
        assert_eq!(first.aggregate.id(), second.aggregate.id());
        assert_eq!(store.event_count().await, 2);
    }
}
