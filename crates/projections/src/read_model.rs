//! Query-side view contract.

/// A denormalized view fed by a [`Projection`](crate::Projection).
pub trait ReadModel: Send + Sync {
    fn name(&self) -> &'static str;

    /// Rows currently held; 0 while a writer holds the view.
    fn count(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.count() == 0
    }
}
