//! Command handling infrastructure.
//!
//! Single-aggregate commands go through [`CommandHandler`]. Commands that touch
//! several aggregates (opening a caja claims its slot, approving a traspaso
//! debits every origin lot) stage their events in a [`UnitOfWork`] and commit
//! them as one atomic batch.

use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use common::{AggregateId, IdempotencyKey};
use event_store::{
    AppendBatch, AppendOptions, EventEnvelope, EventStore, EventStoreError, EventStoreExt,
    IdempotencyRecord, Snapshot, Version,
};
use serde::de::DeserializeOwned;

use crate::aggregate::{Aggregate, DomainEvent, SnapshotCapable};
use crate::error::DomainError;

/// Result of command execution.
#[derive(Debug)]
pub struct CommandResult<A: Aggregate> {
    /// The aggregate after applying the new events.
    pub aggregate: A,

    /// The events that were generated and persisted.
    pub events: Vec<A::Event>,

    /// The new version of the aggregate after the command.
    pub new_version: Version,

    /// True when the idempotency key had already been committed and the
    /// aggregate was returned as-is, with nothing new written.
    pub replayed: bool,
}

impl<A: Aggregate> CommandResult<A> {
    /// Result for a request whose idempotency key was already committed.
    pub fn replay(aggregate: A) -> Self {
        let new_version = aggregate.version();
        Self {
            aggregate,
            events: vec![],
            new_version,
            replayed: true,
        }
    }
}

/// A request to change one aggregate.
pub trait Command: Send + Sync {
    /// The type of aggregate this command targets.
    type Aggregate: Aggregate;

    /// Returns the ID of the aggregate this command targets.
    fn aggregate_id(&self) -> AggregateId;

    /// Caller-supplied key that makes retries of this command safe.
    fn idempotency_key(&self) -> Option<&IdempotencyKey> {
        None
    }
}

/// Rebuilds an aggregate from its snapshot (if any) and subsequent events.
///
/// Returns a default instance when the stream is empty. A stream holding a
/// different aggregate type reads as not found.
pub async fn load<A>(store: &dyn EventStore, aggregate_id: AggregateId) -> Result<A, DomainError>
where
    A: Aggregate + DeserializeOwned,
{
    let (snapshot, events) = store.load_aggregate(aggregate_id).await?;

    let mut aggregate = match snapshot {
        Some(snapshot) if snapshot.is_for(A::aggregate_type()) => {
            let version = snapshot.version;
            let mut aggregate: A = snapshot.restore()?;
            aggregate.set_version(version);
            aggregate
        }
        Some(_) => return Err(DomainError::not_found(A::aggregate_type(), aggregate_id)),
        None => A::default(),
    };

    for envelope in events {
        if envelope.aggregate_type != A::aggregate_type() {
            return Err(DomainError::not_found(A::aggregate_type(), aggregate_id));
        }
        let event: A::Event = envelope.decode()?;
        aggregate.apply(event);
        aggregate.set_version(envelope.version);
    }

    Ok(aggregate)
}

/// Loads an aggregate, failing with `NotFound` if it has no events.
pub async fn load_existing<A>(
    store: &dyn EventStore,
    aggregate_id: AggregateId,
) -> Result<A, DomainError>
where
    A: Aggregate + DeserializeOwned,
{
    let aggregate: A = load(store, aggregate_id).await?;
    if aggregate.exists() {
        Ok(aggregate)
    } else {
        Err(DomainError::not_found(A::aggregate_type(), aggregate_id))
    }
}

/// The operation an idempotency key is committed for.
///
/// A key replays only for the same operation on the same target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operation {
    pub name: &'static str,
    /// Aggregate acted on; None when the operation creates a new one.
    pub target: Option<AggregateId>,
}

impl Operation {
    /// An operation that creates its aggregate under a fresh id.
    pub const fn create(name: &'static str) -> Self {
        Self { name, target: None }
    }

    /// An operation on a known aggregate.
    pub const fn on(name: &'static str, target: AggregateId) -> Self {
        Self {
            name,
            target: Some(target),
        }
    }

    fn matches(&self, record: &IdempotencyRecord) -> bool {
        record.operation == self.name
            && self.target.is_none_or(|target| target == record.aggregate_id)
    }
}

/// Looks up an idempotency key and, if it was already committed by the same
/// operation, loads the primary aggregate of that commit.
///
/// A key committed by any other operation fails with `IdempotencyKeyReused`.
pub async fn find_replay<A>(
    store: &dyn EventStore,
    key: Option<&IdempotencyKey>,
    operation: Operation,
) -> Result<Option<A>, DomainError>
where
    A: Aggregate + DeserializeOwned,
{
    let Some(key) = key else {
        return Ok(None);
    };
    let Some(record) = store.find_idempotency_key(key.as_str()).await? else {
        return Ok(None);
    };
    if !operation.matches(&record) {
        tracing::warn!(
            key = %key,
            committed_by = %record.operation,
            requested = operation.name,
            "idempotency key reused"
        );
        return Err(DomainError::IdempotencyKeyReused {
            key: key.to_string(),
        });
    }

    let aggregate_id = record.aggregate_id;
    match load_existing::<A>(store, aggregate_id).await {
        Ok(aggregate) => {
            tracing::debug!(key = %key, %aggregate_id, "replaying committed request");
            Ok(Some(aggregate))
        }
        Err(DomainError::NotFound { .. }) => Err(DomainError::IdempotencyKeyReused {
            key: key.to_string(),
        }),
        Err(e) => Err(e),
    }
}

/// Runs `attempt` again while it fails with a concurrency conflict, at most
/// `max_retries` extra times.
///
/// Each attempt must reload whatever aggregates it reads; the last conflict is
/// returned once retries are exhausted.
pub async fn with_conflict_retry<T, F, Fut>(
    operation: &'static str,
    max_retries: u32,
    mut attempt: F,
) -> Result<T, DomainError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DomainError>>,
{
    let mut retries = 0;
    loop {
        match attempt().await {
            Err(e) if e.is_concurrency_conflict() && retries < max_retries => {
                retries += 1;
                metrics::counter!("command_conflict_retries_total", "operation" => operation)
                    .increment(1);
                tracing::debug!(operation, retries, "concurrency conflict, retrying");
            }
            result => return result,
        }
    }
}

/// Events for several aggregate streams, committed all-or-nothing.
#[derive(Debug, Default)]
pub struct UnitOfWork {
    batch: AppendBatch,
    metadata: HashMap<String, serde_json::Value>,
}

impl UnitOfWork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a metadata entry to every event recorded afterwards.
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Stages `events` for an aggregate currently at `current_version`.
    ///
    /// The first stream recorded is the one an idempotency key resolves to.
    /// Returns the version the aggregate will have once committed.
    pub fn record<A: Aggregate>(
        &mut self,
        aggregate_id: AggregateId,
        current_version: Version,
        events: &[A::Event],
    ) -> Result<Version, DomainError> {
        let mut envelopes = Vec::with_capacity(events.len());
        let mut version = current_version;

        for event in events {
            version = version.next();
            let mut builder = EventEnvelope::builder()
                .aggregate_id(aggregate_id)
                .aggregate_type(A::aggregate_type())
                .event_type(event.event_type())
                .version(version)
                .payload(event)?;
            for (key, value) in &self.metadata {
                builder = builder.metadata(key.clone(), value.clone());
            }
            envelopes.push(builder.build()?);
        }

        self.batch = std::mem::take(&mut self.batch)
            .stream(envelopes, AppendOptions::expect_version(current_version));
        Ok(version)
    }

    pub fn is_empty(&self) -> bool {
        self.batch.streams.is_empty()
    }

    /// Commits every staged stream in one batch, recording the idempotency
    /// key against `operation`.
    pub async fn commit(
        self,
        store: &dyn EventStore,
        idempotency_key: Option<&IdempotencyKey>,
        operation: Operation,
    ) -> Result<Vec<Version>, DomainError> {
        let mut batch = self.batch;
        if let Some(key) = idempotency_key {
            batch = batch.idempotency_key(key.as_str()).operation(operation.name);
        }
        Ok(store.append_batch(batch).await?)
    }

    /// Commits, or loads the primary aggregate of the earlier commit if a
    /// concurrent request with the same idempotency key won the race.
    pub async fn commit_or_replay<A>(
        self,
        store: &dyn EventStore,
        idempotency_key: Option<&IdempotencyKey>,
        operation: Operation,
    ) -> Result<CommitOutcome<A>, DomainError>
    where
        A: Aggregate + DeserializeOwned,
    {
        match self.commit(store, idempotency_key, operation).await {
            Ok(versions) => Ok(CommitOutcome::Committed(versions)),
            Err(e) if e.is_duplicate_request() => match find_replay::<A>(
                store,
                idempotency_key,
                operation,
            )
            .await?
            {
                Some(aggregate) => Ok(CommitOutcome::Replayed(aggregate)),
                None => Err(e),
            },
            Err(e) => Err(e),
        }
    }
}

/// Outcome of [`UnitOfWork::commit_or_replay`].
#[derive(Debug)]
pub enum CommitOutcome<A> {
    /// New versions of every stream, in recording order.
    Committed(Vec<Version>),
    /// The request had already been committed; this is its primary aggregate.
    Replayed(A),
}

/// Handler for executing commands against one aggregate type.
pub struct CommandHandler<A: Aggregate> {
    store: Arc<dyn EventStore>,
    max_conflict_retries: u32,
    _phantom: PhantomData<fn() -> A>,
}

impl<A: Aggregate> Clone for CommandHandler<A> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            max_conflict_retries: self.max_conflict_retries,
            _phantom: PhantomData,
        }
    }
}

impl<A> CommandHandler<A>
where
    A: Aggregate + DeserializeOwned,
{
    pub fn new(store: Arc<dyn EventStore>, max_conflict_retries: u32) -> Self {
        Self {
            store,
            max_conflict_retries,
            _phantom: PhantomData,
        }
    }

    pub fn store(&self) -> &dyn EventStore {
        self.store.as_ref()
    }

    /// Loads an aggregate, returning a default instance if it has no events.
    pub async fn load(&self, aggregate_id: AggregateId) -> Result<A, DomainError> {
        load(self.store.as_ref(), aggregate_id).await
    }

    /// Loads an aggregate, returning None if it doesn't exist.
    pub async fn load_existing(&self, aggregate_id: AggregateId) -> Result<Option<A>, DomainError> {
        let aggregate = self.load(aggregate_id).await?;
        Ok(aggregate.exists().then_some(aggregate))
    }

    /// Executes a command that may create the aggregate.
    ///
    /// `command_fn` sees the current state and returns the events to persist.
    /// It is called again with fresh state after a concurrency conflict.
    /// `operation` names the command for idempotency and retry metrics.
    pub async fn execute<F>(
        &self,
        operation: &'static str,
        aggregate_id: AggregateId,
        idempotency_key: Option<&IdempotencyKey>,
        command_fn: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        F: Fn(&A) -> Result<Vec<A::Event>, A::Error>,
        DomainError: From<A::Error>,
    {
        self.run(operation, aggregate_id, idempotency_key, false, &command_fn)
            .await
    }

    /// Executes a command against an aggregate that must already exist.
    pub async fn execute_existing<F>(
        &self,
        operation: &'static str,
        aggregate_id: AggregateId,
        idempotency_key: Option<&IdempotencyKey>,
        command_fn: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        F: Fn(&A) -> Result<Vec<A::Event>, A::Error>,
        DomainError: From<A::Error>,
    {
        self.run(operation, aggregate_id, idempotency_key, true, &command_fn)
            .await
    }

    async fn run<F>(
        &self,
        operation: &'static str,
        aggregate_id: AggregateId,
        idempotency_key: Option<&IdempotencyKey>,
        require_existing: bool,
        command_fn: &F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        F: Fn(&A) -> Result<Vec<A::Event>, A::Error>,
        DomainError: From<A::Error>,
    {
        let operation = Operation::on(operation, aggregate_id);
        if let Some(aggregate) = find_replay::<A>(self.store(), idempotency_key, operation).await? {
            return Ok(CommandResult::replay(aggregate));
        }

        with_conflict_retry(operation.name, self.max_conflict_retries, || {
            self.try_execute(
                operation,
                aggregate_id,
                idempotency_key,
                require_existing,
                command_fn,
            )
        })
        .await
    }

    async fn try_execute<F>(
        &self,
        operation: Operation,
        aggregate_id: AggregateId,
        idempotency_key: Option<&IdempotencyKey>,
        require_existing: bool,
        command_fn: &F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        F: Fn(&A) -> Result<Vec<A::Event>, A::Error>,
        DomainError: From<A::Error>,
    {
        let mut aggregate = self.load(aggregate_id).await?;
        if require_existing && !aggregate.exists() {
            return Err(DomainError::not_found(A::aggregate_type(), aggregate_id));
        }
        let current_version = aggregate.version();

        let events = command_fn(&aggregate)?;
        if events.is_empty() {
            return Ok(CommandResult {
                aggregate,
                events: vec![],
                new_version: current_version,
                replayed: false,
            });
        }

        let mut unit = UnitOfWork::new();
        let new_version = unit.record::<A>(aggregate_id, current_version, &events)?;
        if let CommitOutcome::Replayed(aggregate) =
            unit.commit_or_replay::<A>(self.store(), idempotency_key, operation).await?
        {
            return Ok(CommandResult::replay(aggregate));
        }

        aggregate.apply_events(events.iter().cloned());
        aggregate.set_version(new_version);

        Ok(CommandResult {
            aggregate,
            events,
            new_version,
            replayed: false,
        })
    }
}

impl<A> CommandHandler<A>
where
    A: SnapshotCapable,
{
    /// Executes a command against an existing aggregate and snapshots it
    /// when its version reaches the snapshot interval.
    ///
    /// A failed snapshot write is logged, not returned: the events are already
    /// committed and the snapshot is only an optimization.
    pub async fn execute_with_snapshot<F>(
        &self,
        operation: &'static str,
        aggregate_id: AggregateId,
        idempotency_key: Option<&IdempotencyKey>,
        command_fn: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        F: Fn(&A) -> Result<Vec<A::Event>, A::Error>,
        DomainError: From<A::Error>,
    {
        let result = self
            .execute_existing(operation, aggregate_id, idempotency_key, command_fn)
            .await?;

        if !result.replayed && result.aggregate.should_snapshot() {
            let snapshot = Snapshot::capture(
                aggregate_id,
                A::aggregate_type(),
                result.new_version,
                &result.aggregate,
            )?;
            if let Err(error) = self.store.save_snapshot(snapshot).await {
                tracing::warn!(%aggregate_id, %error, "failed to save snapshot");
            }
        }

        Ok(result)
    }
}

impl DomainError {
    pub(crate) fn is_duplicate_request(&self) -> bool {
        matches!(
            self,
            DomainError::EventStore(EventStoreError::DuplicateRequest { .. })
        )
    }
}
