//! Core aggregate and domain event traits.

use common::AggregateId;
use event_store::Version;
use serde::{Serialize, de::DeserializeOwned};

/// A fact recorded against an aggregate stream.
///
/// Events are immutable and named in past tense.
pub trait DomainEvent: Serialize + DeserializeOwned + Send + Sync + Clone {
    /// Returns the event type name stored alongside the payload.
    fn event_type(&self) -> &'static str;
}

/// An event-sourced consistency boundary.
///
/// Aggregates are rebuilt by replaying their events through [`Aggregate::apply`]
/// and decide on new events in plain command methods that return
/// `Result<Vec<Event>, Error>`. Command methods never mutate state; only
/// `apply` does.
pub trait Aggregate: Default + Send + Sync + Sized {
    /// The type of events this aggregate produces and consumes.
    type Event: DomainEvent;

    /// The type of errors its command methods can produce.
    type Error: std::error::Error + Send + Sync;

    /// Returns the aggregate type name stored on every envelope.
    fn aggregate_type() -> &'static str;

    /// Returns the aggregate's identifier, None before its first event.
    fn id(&self) -> Option<AggregateId>;

    /// Returns the version of the last applied event (0 for a new aggregate).
    fn version(&self) -> Version;

    /// Sets the aggregate version after loading or committing events.
    fn set_version(&mut self, version: Version);

    /// Applies an event to the aggregate.
    ///
    /// Must be pure and infallible: events are facts that already happened.
    fn apply(&mut self, event: Self::Event);

    /// Applies multiple events in sequence.
    fn apply_events(&mut self, events: impl IntoIterator<Item = Self::Event>) {
        for event in events {
            self.apply(event);
        }
    }

    /// Returns true once the aggregate has at least one event.
    fn exists(&self) -> bool {
        self.id().is_some()
    }
}

/// Aggregates whose state can be serialized into a snapshot.
pub trait SnapshotCapable: Aggregate + Serialize + DeserializeOwned {
    /// Number of events between snapshots.
    fn snapshot_interval() -> usize {
        100
    }

    /// Returns whether a snapshot should be taken at the current version.
    fn should_snapshot(&self) -> bool {
        self.version().as_i64() > 0
            && (self.version().as_i64() as usize).is_multiple_of(Self::snapshot_interval())
    }
}
