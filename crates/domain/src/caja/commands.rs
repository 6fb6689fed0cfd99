//! Caja commands.

use common::{AggregateId, BranchId, IdempotencyKey, Money, OperatorId};

use crate::command::Command;

use super::{CajaAccount, EntryKind};

/// Command to open a caja for a branch and operator.
#[derive(Debug, Clone)]
pub struct OpenCaja {
    /// The caja ID to create.
    pub caja_id: AggregateId,

    pub branch: BranchId,
    pub operator: OperatorId,
    pub opening_balance: Money,

    pub idempotency_key: Option<IdempotencyKey>,
}

impl OpenCaja {
    /// Creates an OpenCaja command with a generated caja ID.
    pub fn new(
        branch: impl Into<BranchId>,
        operator: impl Into<OperatorId>,
        opening_balance: Money,
    ) -> Self {
        Self {
            caja_id: AggregateId::new(),
            branch: branch.into(),
            operator: operator.into(),
            opening_balance,
            idempotency_key: None,
        }
    }

    pub fn with_idempotency_key(mut self, key: impl Into<IdempotencyKey>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

impl Command for OpenCaja {
    type Aggregate = CajaAccount;

    fn aggregate_id(&self) -> AggregateId {
        self.caja_id
    }

    fn idempotency_key(&self) -> Option<&IdempotencyKey> {
        self.idempotency_key.as_ref()
    }
}

/// Command to post a ledger entry to an open caja.
#[derive(Debug, Clone)]
pub struct PostEntry {
    pub caja_id: AggregateId,
    pub kind: EntryKind,
    pub amount: Money,

    /// Sale or purchase document the posting comes from.
    pub reference: Option<String>,
    pub description: Option<String>,

    pub idempotency_key: Option<IdempotencyKey>,
}

impl PostEntry {
    pub fn new(caja_id: AggregateId, kind: EntryKind, amount: Money) -> Self {
        Self {
            caja_id,
            kind,
            amount,
            reference: None,
            description: None,
            idempotency_key: None,
        }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_idempotency_key(mut self, key: impl Into<IdempotencyKey>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

impl Command for PostEntry {
    type Aggregate = CajaAccount;

    fn aggregate_id(&self) -> AggregateId {
        self.caja_id
    }

    fn idempotency_key(&self) -> Option<&IdempotencyKey> {
        self.idempotency_key.as_ref()
    }
}

/// Command to close a caja.
#[derive(Debug, Clone)]
pub struct CloseCaja {
    pub caja_id: AggregateId,

    /// Cash the operator counted in the drawer, if any.
    pub counted_cash: Option<Money>,

    pub idempotency_key: Option<IdempotencyKey>,
}

impl CloseCaja {
    pub fn new(caja_id: AggregateId) -> Self {
        Self {
            caja_id,
            counted_cash: None,
            idempotency_key: None,
        }
    }

    pub fn with_counted_cash(mut self, counted_cash: Money) -> Self {
        self.counted_cash = Some(counted_cash);
        self
    }

    pub fn with_idempotency_key(mut self, key: impl Into<IdempotencyKey>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

impl Command for CloseCaja {
    type Aggregate = CajaAccount;

    fn aggregate_id(&self) -> AggregateId {
        self.caja_id
    }

    fn idempotency_key(&self) -> Option<&IdempotencyKey> {
        self.idempotency_key.as_ref()
    }
}
