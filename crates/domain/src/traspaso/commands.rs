//! Traspaso commands.

use common::{AggregateId, ArticleId, IdempotencyKey, OperatorId, Quantity, WarehouseId};
use serde::Deserialize;

use crate::command::Command;

use super::Traspaso;

/// One article and quantity of a transfer request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RequestLine {
    pub article: ArticleId,
    pub quantity: Quantity,
}

impl RequestLine {
    pub fn new(article: impl Into<ArticleId>, quantity: Quantity) -> Self {
        Self {
            article: article.into(),
            quantity,
        }
    }
}

/// Command to request a transfer between two warehouses.
#[derive(Debug, Clone)]
pub struct RequestTraspaso {
    /// The traspaso ID to create.
    pub traspaso_id: AggregateId,

    pub origin: WarehouseId,
    pub destination: WarehouseId,
    pub requester: OperatorId,
    pub lines: Vec<RequestLine>,

    pub idempotency_key: Option<IdempotencyKey>,
}

impl RequestTraspaso {
    /// Creates a new RequestTraspaso command with a generated ID.
    pub fn new(
        origin: impl Into<WarehouseId>,
        destination: impl Into<WarehouseId>,
        requester: impl Into<OperatorId>,
        lines: Vec<RequestLine>,
    ) -> Self {
        Self {
            traspaso_id: AggregateId::new(),
            origin: origin.into(),
            destination: destination.into(),
            requester: requester.into(),
            lines,
            idempotency_key: None,
        }
    }

    pub fn with_idempotency_key(mut self, key: impl Into<IdempotencyKey>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

impl Command for RequestTraspaso {
    type Aggregate = Traspaso;

    fn aggregate_id(&self) -> AggregateId {
        self.traspaso_id
    }

    fn idempotency_key(&self) -> Option<&IdempotencyKey> {
        self.idempotency_key.as_ref()
    }
}

/// Command to approve a pending traspaso.
#[derive(Debug, Clone)]
pub struct ApproveTraspaso {
    pub traspaso_id: AggregateId,
    pub approver: Option<OperatorId>,
    pub idempotency_key: Option<IdempotencyKey>,
}

impl ApproveTraspaso {
    pub fn new(traspaso_id: AggregateId) -> Self {
        Self {
            traspaso_id,
            approver: None,
            idempotency_key: None,
        }
    }

    pub fn by(mut self, approver: impl Into<OperatorId>) -> Self {
        self.approver = Some(approver.into());
        self
    }

    pub fn with_idempotency_key(mut self, key: impl Into<IdempotencyKey>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

impl Command for ApproveTraspaso {
    type Aggregate = Traspaso;

    fn aggregate_id(&self) -> AggregateId {
        self.traspaso_id
    }

    fn idempotency_key(&self) -> Option<&IdempotencyKey> {
        self.idempotency_key.as_ref()
    }
}

/// Command to receive a traspaso at its destination.
#[derive(Debug, Clone)]
pub struct ReceiveTraspaso {
    pub traspaso_id: AggregateId,
    pub receiver: Option<OperatorId>,
    pub idempotency_key: Option<IdempotencyKey>,
}

impl ReceiveTraspaso {
    pub fn new(traspaso_id: AggregateId) -> Self {
        Self {
            traspaso_id,
            receiver: None,
            idempotency_key: None,
        }
    }

    pub fn by(mut self, receiver: impl Into<OperatorId>) -> Self {
        self.receiver = Some(receiver.into());
        self
    }

    pub fn with_idempotency_key(mut self, key: impl Into<IdempotencyKey>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

impl Command for ReceiveTraspaso {
    type Aggregate = Traspaso;

    fn aggregate_id(&self) -> AggregateId {
        self.traspaso_id
    }

    fn idempotency_key(&self) -> Option<&IdempotencyKey> {
        self.idempotency_key.as_ref()
    }
}

/// Command to reject a traspaso.
#[derive(Debug, Clone)]
pub struct RejectTraspaso {
    pub traspaso_id: AggregateId,
    pub reason: String,
    pub rejected_by: Option<OperatorId>,
    pub idempotency_key: Option<IdempotencyKey>,
}

impl RejectTraspaso {
    pub fn new(traspaso_id: AggregateId, reason: impl Into<String>) -> Self {
        Self {
            traspaso_id,
            reason: reason.into(),
            rejected_by: None,
            idempotency_key: None,
        }
    }

    pub fn by(mut self, rejected_by: impl Into<OperatorId>) -> Self {
        self.rejected_by = Some(rejected_by.into());
        self
    }

    pub fn with_idempotency_key(mut self, key: impl Into<IdempotencyKey>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

impl Command for RejectTraspaso {
    type Aggregate = Traspaso;

    fn aggregate_id(&self) -> AggregateId {
        self.traspaso_id
    }

    fn idempotency_key(&self) -> Option<&IdempotencyKey> {
        self.idempotency_key.as_ref()
    }
}
