//! Register slot: which caja currently holds a (branch, operator) pair.

use chrono::Utc;
use common::{AggregateId, BranchId, OperatorId};
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;

use super::{CajaError, SlotEvent};

/// Guards the one-open-caja-per-operator rule.
///
/// The slot id is derived from the pair, so two concurrent opens load the same
/// slot at the same version and only one of their batches can commit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CajaSlot {
    id: Option<AggregateId>,
    #[serde(default)]
    version: Version,
    holder: Option<AggregateId>,
}

impl CajaSlot {
    /// Stable slot id for a branch and operator.
    pub fn id_for(branch: &BranchId, operator: &OperatorId) -> AggregateId {
        AggregateId::derive("caja-slot", &[branch.as_str(), operator.as_str()])
    }

    /// The caja currently open on this slot.
    pub fn holder(&self) -> Option<AggregateId> {
        self.holder
    }

    pub fn claim(
        &self,
        branch: &BranchId,
        operator: &OperatorId,
        caja_id: AggregateId,
    ) -> Result<Vec<SlotEvent>, CajaError> {
        if let Some(holder) = self.holder {
            return Err(CajaError::AlreadyOpen {
                branch: branch.clone(),
                operator: operator.clone(),
                caja_id: holder,
            });
        }

        Ok(vec![SlotEvent::SlotClaimed {
            slot_id: Self::id_for(branch, operator),
            branch: branch.clone(),
            operator: operator.clone(),
            caja_id,
            claimed_at: Utc::now(),
        }])
    }

    pub fn release(&self, caja_id: AggregateId) -> Result<Vec<SlotEvent>, CajaError> {
        if self.holder != Some(caja_id) {
            return Err(CajaError::SlotNotHeld { caja_id });
        }

        Ok(vec![SlotEvent::SlotReleased {
            caja_id,
            released_at: Utc::now(),
        }])
    }
}

impl Aggregate for CajaSlot {
    type Event = SlotEvent;
    type Error = CajaError;

    fn aggregate_type() -> &'static str {
        "CajaSlot"
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
            SlotEvent::SlotClaimed {
                slot_id, caja_id, ..
            } => {
                self.id = Some(slot_id);
                self.holder = Some(caja_id);
            }
            SlotEvent::SlotReleased { .. } => self.holder = None,
        }
    }
}
