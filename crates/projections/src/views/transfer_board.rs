//! Traspaso board: every transfer with its current status.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{AggregateId, BranchId, OperatorId, Quantity, WarehouseId};
use domain::{Aggregate, Traspaso, TraspasoEvent, TraspasoState};
use event_store::EventEnvelope;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::projection::{Projection, ProjectionPosition};
use crate::read_model::ReadModel;
use crate::{ProjectionError, Result};

/// Board entry for one traspaso.
#[derive(Debug, Clone, Serialize)]
pub struct TransferCard {
    pub traspaso_id: AggregateId,
    pub origin: WarehouseId,
    pub origin_branch: BranchId,
    pub destination: WarehouseId,
    pub destination_branch: BranchId,
    pub requester: OperatorId,
    pub state: TraspasoState,
    pub line_count: usize,
    pub requested_units: Quantity,
    pub in_transit: Quantity,
    pub rejection_reason: Option<String>,
    pub requested_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Default)]
struct BoardState {
    cards: HashMap<AggregateId, TransferCard>,
    position: ProjectionPosition,
}

/// Transfers grouped by status for the board screen.
#[derive(Clone, Default)]
pub struct TransferBoardView {
    state: Arc<RwLock<BoardState>>,
}

impl TransferBoardView {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, traspaso_id: AggregateId) -> Option<TransferCard> {
        self.state.read().await.cards.get(&traspaso_id).cloned()
    }

    /// Cards in request order, optionally restricted to one status.
    pub async fn list(&self, status: Option<TraspasoState>) -> Vec<TransferCard> {
        let state = self.state.read().await;
        let mut cards: Vec<_> = state
            .cards
            .values()
            .filter(|card| status.is_none_or(|s| card.state == s))
            .cloned()
            .collect();
        cards.sort_by_key(|card| card.requested_at);
        cards
    }

    pub async fn counts_by_state(&self) -> HashMap<TraspasoState, usize> {
        let state = self.state.read().await;
        let mut counts = HashMap::new();
        for card in state.cards.values() {
            *counts.entry(card.state).or_insert(0) += 1;
        }
        counts
    }

    /// Units on their way to a warehouse.
    pub async fn incoming_to(&self, destination: &WarehouseId) -> Quantity {
        self.state
            .read()
            .await
            .cards
            .values()
            .filter(|card| &card.destination == destination)
            .map(|card| card.in_transit)
            .sum()
    }
}

fn apply(cards: &mut HashMap<AggregateId, TransferCard>, id: AggregateId, event: TraspasoEvent) {
    if let TraspasoEvent::TraspasoRequested(data) = event {
        let requested_units = data.lines.iter().map(|line| line.quantity).sum();
        cards.insert(
            id,
            TransferCard {
                traspaso_id: data.traspaso_id,
                origin: data.origin,
                origin_branch: data.origin_branch,
                destination: data.destination,
                destination_branch: data.destination_branch,
                requester: data.requester,
                state: TraspasoState::Pendiente,
                line_count: data.lines.len(),
                requested_units,
                in_transit: Quantity::zero(),
                rejection_reason: None,
                requested_at: data.requested_at,
                updated_at: data.requested_at,
            },
        );
        return;
    }

    let Some(card) = cards.get_mut(&id) else {
        tracing::warn!(traspaso_id = %id, "transition for unknown traspaso on board");
        return;
    };
    match event {
        TraspasoEvent::TraspasoApproved(data) => {
            card.state = TraspasoState::Aprobado;
            card.in_transit = data.lines.iter().map(|line| line.quantity).sum();
            card.updated_at = data.approved_at;
        }
        TraspasoEvent::TraspasoDispatched(data) => {
            card.state = TraspasoState::EnTransito;
            card.updated_at = data.dispatched_at;
        }
        TraspasoEvent::TraspasoReceived(data) => {
            card.state = TraspasoState::Recibido;
            card.in_transit = Quantity::zero();
            card.updated_at = data.received_at;
        }
        TraspasoEvent::TraspasoRejected(data) => {
            card.state = TraspasoState::Rechazado;
            card.in_transit = Quantity::zero();
            card.rejection_reason = Some(data.reason);
            card.updated_at = data.rejected_at;
        }
        TraspasoEvent::TraspasoRequested(_) => {}
    }
}

#[async_trait]
impl Projection for TransferBoardView {
    fn name(&self) -> &'static str {
        "TransferBoardView"
    }

    async fn handle(&self, event: &EventEnvelope) -> Result<()> {
        let mut state = self.state.write().await;

        if event.aggregate_type == Traspaso::aggregate_type() {
            let traspaso_event: TraspasoEvent = event
                .decode()
                .map_err(|e| ProjectionError::decode(&event.event_type, e))?;
            apply(&mut state.cards, event.aggregate_id, traspaso_event);
        }

        state.position = state.position.advance();
        Ok(())
    }

    async fn position(&self) -> ProjectionPosition {
        self.state.read().await.position
    }

    async fn reset(&self) -> Result<()> {
        let mut state = self.state.write().await;
        state.cards.clear();
        state.position = ProjectionPosition::zero();
        Ok(())
    }
}

impl ReadModel for TransferBoardView {
    fn name(&self) -> &'static str {
        "TransferBoardView"
    }

    fn count(&self) -> usize {
        self.state.try_read().map(|s| s.cards.len()).unwrap_or(0)
    }
}
