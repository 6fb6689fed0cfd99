//! Warehouse directory collaborator.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{BranchId, WarehouseId};
use tokio::sync::RwLock;

use crate::error::DomainError;

/// Resolves which branch owns a warehouse.
#[async_trait]
pub trait WarehouseDirectory: Send + Sync {
    /// Returns the owning branch, or None for an unknown warehouse.
    async fn branch_of(&self, warehouse: &WarehouseId) -> Result<Option<BranchId>, DomainError>;
}

/// Resolves a warehouse or fails with `NotFound`.
pub(crate) async fn resolve_branch(
    directory: &dyn WarehouseDirectory,
    warehouse: &WarehouseId,
) -> Result<BranchId, DomainError> {
    directory
        .branch_of(warehouse)
        .await?
        .ok_or_else(|| DomainError::not_found("Warehouse", warehouse))
}

/// In-memory directory, seeded from configuration or registered at runtime.
#[derive(Debug, Clone, Default)]
pub struct InMemoryWarehouseDirectory {
    entries: Arc<RwLock<HashMap<WarehouseId, BranchId>>>,
}

impl InMemoryWarehouseDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(entries: impl IntoIterator<Item = (WarehouseId, BranchId)>) -> Self {
        Self {
            entries: Arc::new(RwLock::new(entries.into_iter().collect())),
        }
    }

    /// Registers or moves a warehouse to a branch.
    pub async fn register(&self, warehouse: WarehouseId, branch: BranchId) {
        tracing::debug!(%warehouse, %branch, "warehouse registered");
        self.entries.write().await.insert(warehouse, branch);
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl WarehouseDirectory for InMemoryWarehouseDirectory {
    async fn branch_of(&self, warehouse: &WarehouseId) -> Result<Option<BranchId>, DomainError> {
        Ok(self.entries.read().await.get(warehouse).cloned())
    }
}
