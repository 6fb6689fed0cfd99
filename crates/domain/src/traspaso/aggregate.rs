//! Traspaso aggregate implementation.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use common::{AggregateId, ArticleId, BranchId, OperatorId, Quantity, WarehouseId};
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;
use crate::inventory::InventoryLot;

use super::{
    LineQuantity, RequestLine, RequestedLine, TraspasoApprovedData, TraspasoDispatchedData,
    TraspasoError, TraspasoEvent, TraspasoReceivedData, TraspasoRejectedData,
    TraspasoRequestedData, TraspasoState,
};

/// One article moving between the two warehouses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraspasoLine {
    pub article: ArticleId,
    /// Origin lot the stock is taken from.
    pub source_lot: AggregateId,
    pub requested: Quantity,
    pub approved: Quantity,
    pub received: Quantity,
}

/// A stock transfer between warehouses of different branches.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Traspaso {
    id: Option<AggregateId>,

    #[serde(default)]
    version: Version,

    origin: Option<WarehouseId>,
    origin_branch: Option<BranchId>,
    destination: Option<WarehouseId>,
    destination_branch: Option<BranchId>,
    requester: Option<OperatorId>,
    state: TraspasoState,
    lines: Vec<TraspasoLine>,

    requested_at: Option<DateTime<Utc>>,
    approved_at: Option<DateTime<Utc>>,
    approved_by: Option<OperatorId>,
    dispatched_at: Option<DateTime<Utc>>,
    received_at: Option<DateTime<Utc>>,
    received_by: Option<OperatorId>,
    rejected_at: Option<DateTime<Utc>>,
    rejected_by: Option<OperatorId>,
    rejection_reason: Option<String>,
}

impl Aggregate for Traspaso {
    type Event = TraspasoEvent;
    type Error = TraspasoError;

    fn aggregate_type() -> &'static str {
        "Traspaso"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            TraspasoEvent::TraspasoRequested(data) => {
                self.id = Some(data.traspaso_id);
                self.origin = Some(data.origin);
                self.origin_branch = Some(data.origin_branch);
                self.destination = Some(data.destination);
                self.destination_branch = Some(data.destination_branch);
                self.requester = Some(data.requester);
                self.state = TraspasoState::Pendiente;
                self.requested_at = Some(data.requested_at);
                self.lines = data
                    .lines
                    .into_iter()
                    .map(|line| TraspasoLine {
                        article: line.article,
                        source_lot: line.source_lot,
                        requested: line.quantity,
                        approved: Quantity::zero(),
                        received: Quantity::zero(),
                    })
                    .collect();
            }
            TraspasoEvent::TraspasoApproved(data) => {
                self.state = TraspasoState::Aprobado;
                self.approved_at = Some(data.approved_at);
                self.approved_by = data.approved_by;
                for approved in data.lines {
                    if let Some(line) = self.line_mut(&approved.article) {
                        line.approved = approved.quantity;
                    }
                }
            }
            TraspasoEvent::TraspasoDispatched(data) => {
                self.state = TraspasoState::EnTransito;
                self.dispatched_at = Some(data.dispatched_at);
            }
            TraspasoEvent::TraspasoReceived(data) => {
                self.state = TraspasoState::Recibido;
                self.received_at = Some(data.received_at);
                self.received_by = data.received_by;
                for received in data.lines {
                    if let Some(line) = self.line_mut(&received.article) {
                        line.received = received.quantity;
                    }
                }
            }
            TraspasoEvent::TraspasoRejected(data) => {
                self.state = TraspasoState::Rechazado;
                self.rejected_at = Some(data.rejected_at);
                self.rejected_by = data.rejected_by;
                self.rejection_reason = Some(data.reason);
            }
        }
    }
}

// Query methods
impl Traspaso {
    pub fn state(&self) -> TraspasoState {
        self.state
    }

    pub fn origin(&self) -> Option<&WarehouseId> {
        self.origin.as_ref()
    }

    pub fn origin_branch(&self) -> Option<&BranchId> {
        self.origin_branch.as_ref()
    }

    pub fn destination(&self) -> Option<&WarehouseId> {
        self.destination.as_ref()
    }

    pub fn destination_branch(&self) -> Option<&BranchId> {
        self.destination_branch.as_ref()
    }

    pub fn requester(&self) -> Option<&OperatorId> {
        self.requester.as_ref()
    }

    pub fn lines(&self) -> &[TraspasoLine] {
        &self.lines
    }

    pub fn requested_at(&self) -> Option<DateTime<Utc>> {
        self.requested_at
    }

    pub fn approved_at(&self) -> Option<DateTime<Utc>> {
        self.approved_at
    }

    pub fn approved_by(&self) -> Option<&OperatorId> {
        self.approved_by.as_ref()
    }

    pub fn dispatched_at(&self) -> Option<DateTime<Utc>> {
        self.dispatched_at
    }

    pub fn received_at(&self) -> Option<DateTime<Utc>> {
        self.received_at
    }

    pub fn received_by(&self) -> Option<&OperatorId> {
        self.received_by.as_ref()
    }

    pub fn rejected_at(&self) -> Option<DateTime<Utc>> {
        self.rejected_at
    }

    pub fn rejected_by(&self) -> Option<&OperatorId> {
        self.rejected_by.as_ref()
    }

    pub fn rejection_reason(&self) -> Option<&str> {
        self.rejection_reason.as_deref()
    }

    /// Units debited from the origin that have not reached the destination
    /// nor been returned.
    pub fn in_transit(&self) -> Quantity {
        if !self.state.holds_stock() {
            return Quantity::zero();
        }
        self.lines
            .iter()
            .map(|line| line.approved.checked_sub(line.received).unwrap_or_default())
            .sum()
    }

    fn line_mut(&mut self, article: &ArticleId) -> Option<&mut TraspasoLine> {
        self.lines.iter_mut().find(|line| &line.article == article)
    }

    fn transition_error(&self, action: &'static str) -> TraspasoError {
        TraspasoError::InvalidTransition {
            current: self.state,
            action,
        }
    }
}

// Command methods (return events)
impl Traspaso {
    /// Creates a new traspaso in `Pendiente`.
    ///
    /// Branches are resolved by the caller through the warehouse directory.
    #[allow(clippy::too_many_arguments)]
    pub fn request(
        &self,
        traspaso_id: AggregateId,
        origin: WarehouseId,
        origin_branch: BranchId,
        destination: WarehouseId,
        destination_branch: BranchId,
        requester: OperatorId,
        lines: Vec<RequestLine>,
    ) -> Result<Vec<TraspasoEvent>, TraspasoError> {
        if self.id.is_some() {
            return Err(TraspasoError::AlreadyCreated);
        }
        if origin.is_blank() {
            return Err(TraspasoError::MissingField("origin"));
        }
        if destination.is_blank() {
            return Err(TraspasoError::MissingField("destination"));
        }
        if requester.is_blank() {
            return Err(TraspasoError::MissingField("requester"));
        }
        if origin == destination {
            return Err(TraspasoError::SameWarehouse { warehouse: origin });
        }
        if origin_branch == destination_branch {
            return Err(TraspasoError::SameBranch {
                branch: origin_branch,
            });
        }
        if lines.is_empty() {
            return Err(TraspasoError::NoLines);
        }

        let mut seen = HashSet::new();
        let mut requested = Vec::with_capacity(lines.len());
        for line in lines {
            if line.article.is_blank() {
                return Err(TraspasoError::MissingField("article"));
            }
            if line.quantity.is_zero() {
                return Err(TraspasoError::ZeroQuantity {
                    article: line.article,
                });
            }
            if !seen.insert(line.article.clone()) {
                return Err(TraspasoError::DuplicateArticle {
                    article: line.article,
                });
            }
            requested.push(RequestedLine {
                source_lot: InventoryLot::id_for(&origin, &line.article),
                article: line.article,
                quantity: line.quantity,
            });
        }

        Ok(vec![TraspasoEvent::TraspasoRequested(TraspasoRequestedData {
            traspaso_id,
            origin,
            origin_branch,
            destination,
            destination_branch,
            requester,
            lines: requested,
            requested_at: Utc::now(),
        })])
    }

    /// Approves every line in full and dispatches the stock.
    pub fn approve(&self, approver: Option<OperatorId>) -> Result<Vec<TraspasoEvent>, TraspasoError> {
        if !self.state.can_approve() {
            return Err(self.transition_error("approve"));
        }

        let now = Utc::now();
        let lines = self
            .lines
            .iter()
            .map(|line| LineQuantity {
                article: line.article.clone(),
                quantity: line.requested,
            })
            .collect();

        Ok(vec![
            TraspasoEvent::TraspasoApproved(TraspasoApprovedData {
                approved_by: approver,
                lines,
                approved_at: now,
            }),
            TraspasoEvent::TraspasoDispatched(TraspasoDispatchedData { dispatched_at: now }),
        ])
    }

    /// Receives every approved line at the destination.
    pub fn receive(&self, receiver: Option<OperatorId>) -> Result<Vec<TraspasoEvent>, TraspasoError> {
        if !self.state.can_receive() {
            return Err(self.transition_error("receive"));
        }

        Ok(vec![TraspasoEvent::TraspasoReceived(TraspasoReceivedData {
            received_by: receiver,
            lines: self.approved_lines(),
            received_at: Utc::now(),
        })])
    }

    /// Rejects the traspaso, returning any debited stock to the origin.
    pub fn reject(
        &self,
        reason: impl Into<String>,
        rejected_by: Option<OperatorId>,
    ) -> Result<Vec<TraspasoEvent>, TraspasoError> {
        let reason = reason.into();
        if reason.trim().is_empty() {
            return Err(TraspasoError::EmptyRejectReason);
        }
        if !self.state.can_reject() {
            return Err(self.transition_error("reject"));
        }

        let restocked = if self.state.holds_stock() {
            self.approved_lines()
        } else {
            vec![]
        };

        Ok(vec![TraspasoEvent::TraspasoRejected(TraspasoRejectedData {
            rejected_by,
            reason: reason.trim().to_string(),
            restocked,
            rejected_at: Utc::now(),
        })])
    }

    fn approved_lines(&self) -> Vec<LineQuantity> {
        self.lines
            .iter()
            .map(|line| LineQuantity {
                article: line.article.clone(),
                quantity: line.approved,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(article: &str, units: u64) -> RequestLine {
        RequestLine::new(article, Quantity::new(units))
    }

    fn request(traspaso: &Traspaso, lines: Vec<RequestLine>) -> Result<Vec<TraspasoEvent>, TraspasoError> {
        traspaso.request(
            AggregateId::new(),
            WarehouseId::new("ALM-1"),
            BranchId::new("SUC-1"),
            WarehouseId::new("ALM-2"),
            BranchId::new("SUC-2"),
            OperatorId::new("op-1"),
            lines,
        )
    }

    fn pending() -> Traspaso {
        let mut traspaso = Traspaso::default();
        let events = request(&traspaso, vec![line("A", 4), line("B", 2)]).unwrap();
        traspaso.apply_events(events);
        traspaso
    }

    fn step(traspaso: &mut Traspaso, events: Result<Vec<TraspasoEvent>, TraspasoError>) {
        traspaso.apply_events(events.unwrap());
    }

    #[test]
    fn request_records_lines_with_source_lots() {
        let traspaso = pending();
        assert_eq!(traspaso.state(), TraspasoState::Pendiente);
        assert_eq!(traspaso.lines().len(), 2);
        assert_eq!(
            traspaso.lines()[0].source_lot,
            InventoryLot::id_for(&WarehouseId::new("ALM-1"), &ArticleId::new("A"))
        );
        assert_eq!(traspaso.in_transit(), Quantity::zero());
    }

    #[test]
    fn request_validation() {
        let traspaso = Traspaso::default();
        assert!(matches!(request(&traspaso, vec![]), Err(TraspasoError::NoLines)));
        assert!(matches!(
            request(&traspaso, vec![line("A", 0)]),
            Err(TraspasoError::ZeroQuantity { .. })
        ));
        assert!(matches!(
            request(&traspaso, vec![line("A", 1), line("A", 2)]),
            Err(TraspasoError::DuplicateArticle { .. })
        ));

        let same_warehouse = traspaso.request(
            AggregateId::new(),
            WarehouseId::new("ALM-1"),
            BranchId::new("SUC-1"),
            WarehouseId::new("ALM-1"),
            BranchId::new("SUC-1"),
            OperatorId::new("op-1"),
            vec![line("A", 1)],
        );
        assert!(matches!(same_warehouse, Err(TraspasoError::SameWarehouse { .. })));

        let same_branch = traspaso.request(
            AggregateId::new(),
            WarehouseId::new("ALM-1"),
            BranchId::new("SUC-1"),
            WarehouseId::new("ALM-3"),
            BranchId::new("SUC-1"),
            OperatorId::new("op-1"),
            vec![line("A", 1)],
        );
        assert!(matches!(same_branch, Err(TraspasoError::SameBranch { .. })));
    }

    #[test]
    fn approve_lands_in_transit() {
        let mut traspaso = pending();
        let events = traspaso.approve(Some(OperatorId::new("jefe"))).unwrap();
        assert_eq!(events.len(), 2);

        traspaso.apply_events(events);
        assert_eq!(traspaso.state(), TraspasoState::EnTransito);
        assert_eq!(traspaso.lines()[0].approved, Quantity::new(4));
        assert_eq!(traspaso.in_transit(), Quantity::new(6));
    }

    #[test]
    fn receive_completes_transfer() {
        let mut traspaso = pending();
        let events = traspaso.approve(None);
        step(&mut traspaso, events);
        let events = traspaso.receive(Some(OperatorId::new("op-2")));
        step(&mut traspaso, events);

        assert_eq!(traspaso.state(), TraspasoState::Recibido);
        assert_eq!(traspaso.lines()[1].received, Quantity::new(2));
        assert_eq!(traspaso.in_transit(), Quantity::zero());
    }

    #[test]
    fn receive_before_approve_is_invalid() {
        let traspaso = pending();
        assert!(matches!(
            traspaso.receive(None),
            Err(TraspasoError::InvalidTransition { current: TraspasoState::Pendiente, .. })
        ));
    }

    #[test]
    fn reject_restocks_only_after_approval() {
        let traspaso = pending();
        let events = traspaso.reject("sin stock", None).unwrap();
        let TraspasoEvent::TraspasoRejected(data) = &events[0] else {
            panic!("expected TraspasoRejected");
        };
        assert!(data.restocked.is_empty());

        let mut approved = pending();
        let events = approved.approve(None);
        step(&mut approved, events);
        let events = approved.reject("dañado", None).unwrap();
        let TraspasoEvent::TraspasoRejected(data) = &events[0] else {
            panic!("expected TraspasoRejected");
        };
        assert_eq!(data.restocked.len(), 2);
        assert_eq!(data.restocked[0].quantity, Quantity::new(4));
    }

    #[test]
    fn terminal_states_accept_nothing() {
        let mut traspaso = pending();
        let events = traspaso.reject("no", None);
        step(&mut traspaso, events);

        assert!(traspaso.approve(None).is_err());
        assert!(traspaso.receive(None).is_err());
        assert!(traspaso.reject("again", None).is_err());
        assert_eq!(traspaso.rejection_reason(), Some("no"));
    }

    #[test]
    fn empty_reject_reason_is_rejected() {
        let traspaso = pending();
        assert!(matches!(
            traspaso.reject("  ", None),
            Err(TraspasoError::EmptyRejectReason)
        ));
    }
}
