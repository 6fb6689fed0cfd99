pub mod error;
pub mod event;
pub mod memory;
pub mod postgres;
pub mod snapshot;
pub mod store;
pub mod timeout;

pub use common::AggregateId;
pub use error::{EventStoreError, Result};
pub use event::{EventEnvelope, EventEnvelopeBuilder, EventId, Version};
pub use memory::InMemoryEventStore;
pub use postgres::PostgresEventStore;
pub use snapshot::Snapshot;
pub use store::{
    AppendBatch, AppendOptions, EventStore, EventStoreExt, EventStream, IdempotencyRecord,
    StreamAppend,
};
pub use timeout::TimeoutEventStore;
