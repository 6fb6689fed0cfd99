//! Core projection trait and position tracking.

use async_trait::async_trait;
use event_store::EventEnvelope;

use crate::Result;

/// How far into the global event stream a projection has read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct ProjectionPosition {
    pub events_processed: u64,
}

impl ProjectionPosition {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn advance(&self) -> Self {
        Self {
            events_processed: self.events_processed + 1,
        }
    }

    /// Whether the event at 1-based `index` in the global stream is still unseen.
    pub fn is_behind(&self, index: u64) -> bool {
        self.events_processed < index
    }
}

impl std::fmt::Display for ProjectionPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "position({})", self.events_processed)
    }
}

/// Folds events into a read model.
///
/// A projection sees every event of the store in order and must advance its
/// position even for events of streams it ignores, so catch-up can resume.
#[async_trait]
pub trait Projection: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(&self, event: &EventEnvelope) -> Result<()>;

    async fn position(&self) -> ProjectionPosition;

    /// Drops all state and rewinds to position zero.
    async fn reset(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advancing_moves_past_index() {
        let pos = ProjectionPosition::zero();
        assert!(pos.is_behind(1));

        let pos = pos.advance().advance();
        assert_eq!(pos.events_processed, 2);
        assert!(!pos.is_behind(2));
        assert!(pos.is_behind(3));
    }

    #[test]
    fn display() {
        let pos = ProjectionPosition {
            events_processed: 7,
        };
        assert_eq!(pos.to_string(), "position(7)");
    }
}
