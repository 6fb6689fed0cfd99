use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use crate::{
    AggregateId, EventEnvelope, EventId, EventStoreError, Result, Snapshot, Version,
    store::{
        AppendBatch, EventStore, EventStream, IdempotencyRecord, StreamAppend, validate_batch,
    },
};

/// PostgreSQL-backed event store implementation.
///
/// Each [`AppendBatch`] runs in a single transaction. The
/// `unique_aggregate_version` constraint backstops the version check, and
/// the `idempotency_keys` primary key backstops duplicate requests.
#[derive(Clone)]
pub struct PostgresEventStore {
    pool: PgPool,
}

impl PostgresEventStore {
    /// Creates a new PostgreSQL event store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_event(row: PgRow) -> Result<EventEnvelope> {
        let metadata_json: serde_json::Value = row.try_get("metadata")?;
        let metadata: HashMap<String, serde_json::Value> = serde_json::from_value(metadata_json)?;

        Ok(EventEnvelope {
            event_id: EventId::from_uuid(row.try_get::<Uuid, _>("id")?),
            event_type: row.try_get("event_type")?,
            aggregate_id: AggregateId::from_uuid(row.try_get::<Uuid, _>("aggregate_id")?),
            aggregate_type: row.try_get("aggregate_type")?,
            version: Version::new(row.try_get("version")?),
            timestamp: row.try_get("timestamp")?,
            payload: row.try_get("payload")?,
            metadata,
        })
    }

    async fn current_version(
        tx: &mut Transaction<'_, Postgres>,
        aggregate_id: AggregateId,
    ) -> Result<Version> {
        let version: Option<i64> =
            sqlx::query_scalar("SELECT MAX(version) FROM events WHERE aggregate_id = $1")
                .bind(aggregate_id.as_uuid())
                .fetch_one(&mut **tx)
                .await?;
        Ok(Version::new(version.unwrap_or(0)))
    }

    async fn append_stream(
        tx: &mut Transaction<'_, Postgres>,
        stream: &StreamAppend,
    ) -> Result<Version> {
        let first = &stream.events[0];
        let aggregate_id = first.aggregate_id;

        let current = Self::current_version(tx, aggregate_id).await?;
        let conflict = match stream.options.expected_version {
            Some(expected) => current != expected,
            None => first.version <= current,
        };
        if conflict {
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected: stream.options.expected_version.unwrap_or(current),
                actual: current,
            });
        }

        let mut last_version = current;
        for event in &stream.events {
            let metadata_json = serde_json::to_value(&event.metadata)?;

            sqlx::query(
                r#"
                INSERT INTO events (id, event_type, aggregate_id, aggregate_type, version, timestamp, payload, metadata)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(event.event_id.as_uuid())
            .bind(&event.event_type)
            .bind(event.aggregate_id.as_uuid())
            .bind(&event.aggregate_type)
            .bind(event.version.as_i64())
            .bind(event.timestamp)
            .bind(&event.payload)
            .bind(metadata_json)
            .execute(&mut **tx)
            .await
            .map_err(|e| {
                // A concurrent writer won the race between our version read and the insert.
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.constraint() == Some("unique_aggregate_version")
                {
                    return EventStoreError::ConcurrencyConflict {
                        aggregate_id,
                        expected: stream.options.expected_version.unwrap_or(current),
                        actual: event.version,
                    };
                }
                EventStoreError::Database(e)
            })?;

            last_version = event.version;
        }

        Ok(last_version)
    }
}

#[async_trait]
impl EventStore for PostgresEventStore {
    #[tracing::instrument(skip(self, batch), fields(streams = batch.streams.len(), events = batch.event_count()))]
    async fn append_batch(&self, batch: AppendBatch) -> Result<Vec<Version>> {
        validate_batch(&batch)?;

        let mut tx = self.pool.begin().await?;

        if let (Some(key), Some(record)) = (&batch.idempotency_key, batch.idempotency_record()) {
            let inserted = sqlx::query(
                r#"
                INSERT INTO idempotency_keys (key, aggregate_id, operation, recorded_at)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (key) DO NOTHING
                "#,
            )
            .bind(key)
            .bind(record.aggregate_id.as_uuid())
            .bind(&record.operation)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;

            if inserted.rows_affected() == 0 {
                return Err(EventStoreError::DuplicateRequest { key: key.clone() });
            }
        }

        let mut versions = Vec::with_capacity(batch.streams.len());
        for stream in &batch.streams {
            versions.push(Self::append_stream(&mut tx, stream).await?);
        }

        tx.commit().await?;
        metrics::counter!("event_store_events_appended_total").increment(batch.event_count() as u64);
        Ok(versions)
    }

    async fn get_events_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>> {
        let rows = sqlx::query(
            r#"
            SELECT id, event_type, aggregate_id, aggregate_type, version, timestamp, payload, metadata
            FROM events
            WHERE aggregate_id = $1
            ORDER BY version ASC
            "#,
        )
        .bind(aggregate_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_event).collect()
    }

    async fn get_events_for_aggregate_from_version(
        &self,
        aggregate_id: AggregateId,
        from_version: Version,
    ) -> Result<Vec<EventEnvelope>> {
        let rows = sqlx::query(
            r#"
            SELECT id, event_type, aggregate_id, aggregate_type, version, timestamp, payload, metadata
            FROM events
            WHERE aggregate_id = $1 AND version >= $2
            ORDER BY version ASC
            "#,
        )
        .bind(aggregate_id.as_uuid())
        .bind(from_version.as_i64())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_event).collect()
    }

    async fn stream_all_events(&self) -> Result<EventStream> {
        use futures_util::StreamExt;

        let stream = sqlx::query(
            r#"
            SELECT id, event_type, aggregate_id, aggregate_type, version, timestamp, payload, metadata
            FROM events
            ORDER BY sequence ASC
            "#,
        )
        .fetch(&self.pool)
        .map(|result| match result {
            Ok(row) => Self::row_to_event(row),
            Err(e) => Err(EventStoreError::Database(e)),
        });

        Ok(Box::pin(stream))
    }

    async fn get_aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>> {
        let version: Option<i64> =
            sqlx::query_scalar("SELECT MAX(version) FROM events WHERE aggregate_id = $1")
                .bind(aggregate_id.as_uuid())
                .fetch_one(&self.pool)
                .await?;

        Ok(version.map(Version::new))
    }

    async fn find_idempotency_key(&self, key: &str) -> Result<Option<IdempotencyRecord>> {
        let row: Option<(Uuid, String)> = sqlx::query_as(
            "SELECT aggregate_id, operation FROM idempotency_keys WHERE key = $1",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(aggregate_id, operation)| IdempotencyRecord {
            aggregate_id: AggregateId::from_uuid(aggregate_id),
            operation,
        }))
    }

    async fn save_snapshot(&self, snapshot: Snapshot) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO snapshots (aggregate_id, aggregate_type, version, timestamp, state)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (aggregate_id) DO UPDATE SET
                aggregate_type = EXCLUDED.aggregate_type,
                version = EXCLUDED.version,
                timestamp = EXCLUDED.timestamp,
                state = EXCLUDED.state
            "#,
        )
        .bind(snapshot.aggregate_id.as_uuid())
        .bind(&snapshot.aggregate_type)
        .bind(snapshot.version.as_i64())
        .bind(snapshot.timestamp)
        .bind(&snapshot.state)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_snapshot(&self, aggregate_id: AggregateId) -> Result<Option<Snapshot>> {
        let row: Option<PgRow> = sqlx::query(
            r#"
            SELECT aggregate_id, aggregate_type, version, timestamp, state
            FROM snapshots
            WHERE aggregate_id = $1
            "#,
        )
        .bind(aggregate_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(Snapshot {
                aggregate_id: AggregateId::from_uuid(row.try_get::<Uuid, _>("aggregate_id")?),
                aggregate_type: row.try_get("aggregate_type")?,
                version: Version::new(row.try_get("version")?),
                timestamp: row.try_get::<DateTime<Utc>, _>("timestamp")?,
                state: row.try_get("state")?,
            })),
            None => Ok(None),
        }
    }
}
