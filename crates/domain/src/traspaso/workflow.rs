//! Traspaso workflow: drives the state machine and moves the stock.

use std::sync::Arc;

use common::{AggregateId, ArticleId, BranchId, IdempotencyKey, OperatorId, Quantity, WarehouseId};
use event_store::EventStore;

use crate::aggregate::Aggregate;
use crate::command::{
    CommandResult, CommitOutcome, Operation, UnitOfWork, find_replay, load, load_existing,
    with_conflict_retry,
};
use crate::config::DomainConfig;
use crate::error::DomainError;
use crate::inventory::{
    InventoryError, InventoryLot, StockMovement, StockReason, record_movement,
};

use super::directory::resolve_branch;
use super::{
    ApproveTraspaso, LineQuantity, ReceiveTraspaso, RejectTraspaso, RequestTraspaso, Traspaso,
    TraspasoError, TraspasoEvent, WarehouseDirectory,
};

const REQUEST: Operation = Operation::create("traspaso.request");

#[derive(Debug, Clone, Copy)]
enum Direction {
    Debit,
    Credit,
}

impl Direction {
    fn as_str(&self) -> &'static str {
        match self {
            Direction::Debit => "debit",
            Direction::Credit => "credit",
        }
    }
}

/// A lot movement implied by a traspaso transition.
#[derive(Debug, Clone)]
struct LotChange {
    warehouse: WarehouseId,
    article: ArticleId,
    direction: Direction,
    movement: StockMovement,
}

/// Runs traspaso transitions.
///
/// Every transition that moves stock commits the traspaso stream and all
/// affected lot streams in one batch, so readers never see a half-applied
/// transfer and two racing transitions cannot both commit.
#[derive(Clone)]
pub struct TraspasoWorkflow {
    store: Arc<dyn EventStore>,
    directory: Arc<dyn WarehouseDirectory>,
    config: DomainConfig,
}

impl TraspasoWorkflow {
    pub fn new(
        store: Arc<dyn EventStore>,
        directory: Arc<dyn WarehouseDirectory>,
        config: DomainConfig,
    ) -> Self {
        Self {
            store,
            directory,
            config,
        }
    }

    fn store(&self) -> &dyn EventStore {
        self.store.as_ref()
    }

    /// Requests a transfer, checking the origin stock as it is right now.
    ///
    /// The stock check is advisory; nothing is reserved until approval.
    #[tracing::instrument(skip(self, cmd), fields(traspaso_id = %cmd.traspaso_id, origin = %cmd.origin, destination = %cmd.destination))]
    pub async fn request(
        &self,
        cmd: RequestTraspaso,
    ) -> Result<CommandResult<Traspaso>, DomainError> {
        let key = cmd.idempotency_key.as_ref();
        if let Some(traspaso) = find_replay::<Traspaso>(self.store(), key, REQUEST).await? {
            return Ok(CommandResult::replay(traspaso));
        }

        let origin_branch = resolve_branch(self.directory.as_ref(), &cmd.origin).await?;
        let destination_branch = resolve_branch(self.directory.as_ref(), &cmd.destination).await?;

        let cmd = &cmd;
        let branches = (&origin_branch, &destination_branch);
        let result = with_conflict_retry(
            REQUEST.name,
            self.config.max_conflict_retries,
            || self.try_request(cmd, branches),
        )
        .await
        .inspect_err(|error| tracing::warn!(%error, "traspaso request rejected"))?;

        self.record_transition("request", &result);
        Ok(result)
    }

    async fn try_request(
        &self,
        cmd: &RequestTraspaso,
        (origin_branch, destination_branch): (&BranchId, &BranchId),
    ) -> Result<CommandResult<Traspaso>, DomainError> {
        let traspaso: Traspaso = load(self.store(), cmd.traspaso_id).await?;
        let events = traspaso.request(
            cmd.traspaso_id,
            cmd.origin.clone(),
            origin_branch.clone(),
            cmd.destination.clone(),
            destination_branch.clone(),
            cmd.requester.clone(),
            cmd.lines.clone(),
        )?;

        for line in &cmd.lines {
            self.check_available(&cmd.origin, &line.article, line.quantity)
                .await?;
        }

        let unit = self.unit_of_work(Some(&cmd.requester));
        self.commit(
            unit,
            traspaso,
            events,
            cmd.traspaso_id,
            (cmd.idempotency_key.as_ref(), REQUEST),
            vec![],
        )
        .await
    }

    /// Approves a pending traspaso and debits every origin lot.
    ///
    /// Stock is re-checked against the current lots; if any line is short the
    /// whole approval fails and no lot is touched.
    #[tracing::instrument(skip(self, cmd), fields(traspaso_id = %cmd.traspaso_id))]
    pub async fn approve(
        &self,
        cmd: ApproveTraspaso,
    ) -> Result<CommandResult<Traspaso>, DomainError> {
        let approver = cmd.approver.clone();
        self.transition(
            "traspaso.approve",
            cmd.traspaso_id,
            cmd.idempotency_key.as_ref(),
            cmd.approver.as_ref(),
            |traspaso| traspaso.approve(approver.clone()),
        )
        .await
    }

    /// Receives an in-transit traspaso and credits the destination lots.
    #[tracing::instrument(skip(self, cmd), fields(traspaso_id = %cmd.traspaso_id))]
    pub async fn receive(
        &self,
        cmd: ReceiveTraspaso,
    ) -> Result<CommandResult<Traspaso>, DomainError> {
        let receiver = cmd.receiver.clone();
        self.transition(
            "traspaso.receive",
            cmd.traspaso_id,
            cmd.idempotency_key.as_ref(),
            cmd.receiver.as_ref(),
            |traspaso| traspaso.receive(receiver.clone()),
        )
        .await
    }

    /// Rejects a traspaso; after approval the origin lots are credited back.
    #[tracing::instrument(skip(self, cmd), fields(traspaso_id = %cmd.traspaso_id, reason = %cmd.reason))]
    pub async fn reject(
        &self,
        cmd: RejectTraspaso,
    ) -> Result<CommandResult<Traspaso>, DomainError> {
        let rejected_by = cmd.rejected_by.clone();
        self.transition(
            "traspaso.reject",
            cmd.traspaso_id,
            cmd.idempotency_key.as_ref(),
            cmd.rejected_by.as_ref(),
            |traspaso| traspaso.reject(cmd.reason.as_str(), rejected_by.clone()),
        )
        .await
    }

    /// Gets a traspaso by ID.
    #[tracing::instrument(skip(self))]
    pub async fn get_traspaso(&self, traspaso_id: AggregateId) -> Result<Traspaso, DomainError> {
        load_existing(self.store(), traspaso_id).await
    }

    async fn transition<F>(
        &self,
        operation: &'static str,
        traspaso_id: AggregateId,
        key: Option<&IdempotencyKey>,
        actor: Option<&OperatorId>,
        decide: F,
    ) -> Result<CommandResult<Traspaso>, DomainError>
    where
        F: Fn(&Traspaso) -> Result<Vec<TraspasoEvent>, TraspasoError>,
    {
        let bound = Operation::on(operation, traspaso_id);
        if let Some(traspaso) = find_replay::<Traspaso>(self.store(), key, bound).await? {
            return Ok(CommandResult::replay(traspaso));
        }

        let action = operation.trim_start_matches("traspaso.");
        let decide = &decide;
        let result = with_conflict_retry(operation, self.config.max_conflict_retries, || {
            self.try_transition(traspaso_id, (key, bound), actor, decide)
        })
        .await
        .inspect_err(|error| tracing::warn!(action, %error, "traspaso transition rejected"))?;

        self.record_transition(action, &result);
        Ok(result)
    }

    async fn try_transition<F>(
        &self,
        traspaso_id: AggregateId,
        idempotency: (Option<&IdempotencyKey>, Operation),
        actor: Option<&OperatorId>,
        decide: &F,
    ) -> Result<CommandResult<Traspaso>, DomainError>
    where
        F: Fn(&Traspaso) -> Result<Vec<TraspasoEvent>, TraspasoError>,
    {
        let traspaso: Traspaso = load_existing(self.store(), traspaso_id).await?;
        let events = decide(&traspaso)?;
        let changes = lot_changes(&traspaso, &events);

        let unit = self.unit_of_work(actor);
        self.commit(unit, traspaso, events, traspaso_id, idempotency, changes)
            .await
    }

    /// Records the traspaso stream first, then every lot it moves, and
    /// commits them together.
    async fn commit(
        &self,
        mut unit: UnitOfWork,
        mut traspaso: Traspaso,
        events: Vec<TraspasoEvent>,
        traspaso_id: AggregateId,
        (key, operation): (Option<&IdempotencyKey>, Operation),
        changes: Vec<LotChange>,
    ) -> Result<CommandResult<Traspaso>, DomainError> {
        let new_version = unit.record::<Traspaso>(traspaso_id, traspaso.version(), &events)?;

        for change in &changes {
            let lot_id = InventoryLot::id_for(&change.warehouse, &change.article);
            let lot: InventoryLot = load(self.store(), lot_id).await?;
            let movement = change.movement.clone();
            let lot_events = match change.direction {
                Direction::Debit => lot.debit(&change.warehouse, &change.article, movement)?,
                Direction::Credit => lot.credit(&change.warehouse, &change.article, movement)?,
            };
            unit.record::<InventoryLot>(lot_id, lot.version(), &lot_events)?;
        }

        match unit
            .commit_or_replay::<Traspaso>(self.store(), key, operation)
            .await?
        {
            CommitOutcome::Replayed(traspaso) => Ok(CommandResult::replay(traspaso)),
            CommitOutcome::Committed(_) => {
                for change in &changes {
                    record_movement(change.direction.as_str(), change.movement.reason.as_str());
                }
                traspaso.apply_events(events.iter().cloned());
                traspaso.set_version(new_version);
                Ok(CommandResult {
                    aggregate: traspaso,
                    events,
                    new_version,
                    replayed: false,
                })
            }
        }
    }

    async fn check_available(
        &self,
        warehouse: &WarehouseId,
        article: &ArticleId,
        requested: Quantity,
    ) -> Result<(), DomainError> {
        let lot: InventoryLot = load(self.store(), InventoryLot::id_for(warehouse, article)).await?;
        if lot.quantity() < requested {
            return Err(InventoryError::InsufficientStock {
                warehouse: warehouse.clone(),
                article: article.clone(),
                available: lot.quantity(),
                requested,
            }
            .into());
        }
        Ok(())
    }

    fn unit_of_work(&self, actor: Option<&OperatorId>) -> UnitOfWork {
        match actor {
            Some(actor) => UnitOfWork::new().with_metadata("actor", serde_json::json!(actor)),
            None => UnitOfWork::new(),
        }
    }

    fn record_transition(&self, action: &'static str, result: &CommandResult<Traspaso>) {
        if result.replayed {
            return;
        }
        metrics::counter!("traspaso_transitions_total", "transition" => action).increment(1);
        tracing::info!(
            action,
            state = %result.aggregate.state(),
            version = %result.new_version,
            "traspaso transition committed"
        );
    }
}

/// Lot movements implied by a transition's events.
fn lot_changes(traspaso: &Traspaso, events: &[TraspasoEvent]) -> Vec<LotChange> {
    let (Some(origin), Some(destination)) = (traspaso.origin(), traspaso.destination()) else {
        return vec![];
    };
    let reference = traspaso.id().map(|id| id.to_string());

    let moves = |warehouse: &WarehouseId,
                 lines: Vec<LineQuantity>,
                 direction: Direction,
                 reason: StockReason| {
        lines
            .into_iter()
            .filter(|line| !line.quantity.is_zero())
            .map(|line| {
                let mut movement = StockMovement::new(line.quantity, reason);
                movement.reference = reference.clone();
                LotChange {
                    warehouse: warehouse.clone(),
                    article: line.article,
                    direction,
                    movement,
                }
            })
            .collect::<Vec<_>>()
    };

    events
        .iter()
        .flat_map(|event| match event {
            TraspasoEvent::TraspasoApproved(data) => moves(
                origin,
                data.lines.clone(),
                Direction::Debit,
                StockReason::TraspasoOut,
            ),
            TraspasoEvent::TraspasoReceived(data) => moves(
                destination,
                data.lines.clone(),
                Direction::Credit,
                StockReason::TraspasoIn,
            ),
            TraspasoEvent::TraspasoRejected(data) => moves(
                origin,
                data.restocked.clone(),
                Direction::Credit,
                StockReason::TraspasoReturn,
            ),
            TraspasoEvent::TraspasoRequested(_) | TraspasoEvent::TraspasoDispatched(_) => vec![],
        })
        .collect()
}
