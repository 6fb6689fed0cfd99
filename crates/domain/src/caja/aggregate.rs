//! Caja account aggregate.

use chrono::{DateTime, Utc};
use common::{AggregateId, BranchId, Money, OperatorId};
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::{Aggregate, SnapshotCapable};

use super::{
    CajaClosedData, CajaError, CajaEvent, CajaOpenedData, CajaStatus, CajaSummary, CajaTotals,
    CashCount, EntryKind, EntryPostedData, LedgerEntry,
};

/// One cash-register session of an operator at a branch.
///
/// Holds the immutable entry list; balances are folded from it on every read.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CajaAccount {
    id: Option<AggregateId>,

    #[serde(default)]
    version: Version,

    branch: Option<BranchId>,
    operator: Option<OperatorId>,
    status: CajaStatus,
    opening_balance: Money,
    opened_at: Option<DateTime<Utc>>,
    closed_at: Option<DateTime<Utc>>,
    entries: Vec<LedgerEntry>,
    closing: Option<CashCount>,
}

impl Aggregate for CajaAccount {
    type Event = CajaEvent;
    type Error = CajaError;

    fn aggregate_type() -> &'static str {
        "CajaAccount"
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
            CajaEvent::CajaOpened(data) => {
                self.id = Some(data.caja_id);
                self.branch = Some(data.branch);
                self.operator = Some(data.operator);
                self.status = CajaStatus::Open;
                self.opening_balance = data.opening_balance;
                self.opened_at = Some(data.opened_at);
            }
            CajaEvent::EntryPosted(data) => {
                if let Some(caja_id) = self.id {
                    self.entries.push(LedgerEntry {
                        sequence: data.sequence,
                        caja_id,
                        kind: data.kind,
                        amount: data.amount,
                        timestamp: data.posted_at,
                        reference: data.reference,
                        description: data.description,
                    });
                }
            }
            CajaEvent::CajaClosed(data) => {
                self.status = CajaStatus::Closed;
                self.closed_at = Some(data.closed_at);
                self.closing = Some(data.count);
            }
        }
    }
}

impl SnapshotCapable for CajaAccount {
    fn snapshot_interval() -> usize {
        50
    }
}

// Query methods
impl CajaAccount {
    pub fn branch(&self) -> Option<&BranchId> {
        self.branch.as_ref()
    }

    pub fn operator(&self) -> Option<&OperatorId> {
        self.operator.as_ref()
    }

    pub fn status(&self) -> CajaStatus {
        self.status
    }

    pub fn is_open(&self) -> bool {
        self.exists() && self.status == CajaStatus::Open
    }

    pub fn opening_balance(&self) -> Money {
        self.opening_balance
    }

    pub fn opened_at(&self) -> Option<DateTime<Utc>> {
        self.opened_at
    }

    pub fn closed_at(&self) -> Option<DateTime<Utc>> {
        self.closed_at
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn closing(&self) -> Option<&CashCount> {
        self.closing.as_ref()
    }

    pub fn totals(&self) -> CajaTotals {
        CajaTotals::fold(&self.entries)
    }

    /// Net balance folded from the entries.
    pub fn balance(&self) -> Money {
        self.totals().net_balance(self.opening_balance)
    }

    pub fn cash_on_hand(&self) -> Money {
        self.totals().cash_on_hand(self.opening_balance)
    }

    /// Full summary; None until the caja has been opened.
    pub fn summary(&self) -> Option<CajaSummary> {
        let totals = self.totals();
        Some(CajaSummary {
            caja_id: self.id?,
            branch: self.branch.clone()?,
            operator: self.operator.clone()?,
            status: self.status,
            opening_balance: self.opening_balance,
            opened_at: self.opened_at?,
            closed_at: self.closed_at,
            totals,
            total_sales: totals.total_sales(),
            total_purchases: totals.total_purchases(),
            net_balance: totals.net_balance(self.opening_balance),
            cash_on_hand: totals.cash_on_hand(self.opening_balance),
            entry_count: self.entries.len(),
            closing: self.closing,
        })
    }
}

// Command methods (return events)
impl CajaAccount {
    /// Opens a new caja session.
    pub fn open(
        &self,
        caja_id: AggregateId,
        branch: BranchId,
        operator: OperatorId,
        opening_balance: Money,
    ) -> Result<Vec<CajaEvent>, CajaError> {
        if self.id.is_some() {
            return Err(CajaError::AlreadyCreated);
        }
        if branch.is_blank() {
            return Err(CajaError::MissingField("branch"));
        }
        if operator.is_blank() {
            return Err(CajaError::MissingField("operator"));
        }
        if opening_balance.is_negative() {
            return Err(CajaError::NegativeOpeningBalance {
                amount: opening_balance,
            });
        }

        Ok(vec![CajaEvent::CajaOpened(CajaOpenedData {
            caja_id,
            branch,
            operator,
            opening_balance,
            opened_at: Utc::now(),
        })])
    }

    /// Posts an entry to an open caja.
    pub fn post(
        &self,
        kind: EntryKind,
        amount: Money,
        reference: Option<String>,
        description: Option<String>,
    ) -> Result<Vec<CajaEvent>, CajaError> {
        self.ensure_open()?;

        if amount.is_negative() {
            return Err(CajaError::InvalidAmount {
                kind,
                amount,
                reason: "cannot be negative",
            });
        }
        if kind.is_manual() && amount.is_zero() {
            return Err(CajaError::InvalidAmount {
                kind,
                amount,
                reason: "must be greater than zero",
            });
        }
        if self
            .totals()
            .try_record(kind, amount, self.opening_balance)
            .is_none()
        {
            return Err(CajaError::InvalidAmount {
                kind,
                amount,
                reason: "out of range",
            });
        }

        let sequence = self.entries.len() as u32 + 1;
        Ok(vec![CajaEvent::EntryPosted(EntryPostedData {
            sequence,
            kind,
            amount,
            reference: reference.filter(|r| !r.trim().is_empty()),
            description: description.filter(|d| !d.trim().is_empty()),
            posted_at: Utc::now(),
        })])
    }

    /// Closes the caja, recording the expected and counted cash.
    pub fn close(
        &self,
        counted_cash: Option<Money>,
        allow_negative_balance: bool,
    ) -> Result<Vec<CajaEvent>, CajaError> {
        let caja_id = self.ensure_open()?;

        if let Some(counted) = counted_cash
            && counted.is_negative()
        {
            return Err(CajaError::NegativeCountedCash { amount: counted });
        }

        let totals = self.totals();
        let net_balance = totals.net_balance(self.opening_balance);
        if net_balance.is_negative() && !allow_negative_balance {
            return Err(CajaError::NegativeBalance {
                caja_id,
                net_balance,
            });
        }

        let expected_cash = totals.cash_on_hand(self.opening_balance);
        if let Some(counted) = counted_cash
            && counted.checked_sub(expected_cash).is_none()
        {
            return Err(CajaError::CountedCashOutOfRange { amount: counted });
        }

        Ok(vec![CajaEvent::CajaClosed(CajaClosedData {
            closed_at: Utc::now(),
            net_balance,
            count: CashCount::new(expected_cash, counted_cash),
        })])
    }

    fn ensure_open(&self) -> Result<AggregateId, CajaError> {
        let caja_id = self.id.ok_or(CajaError::MissingField("caja"))?;
        if !self.status.accepts_postings() {
            return Err(CajaError::Closed { caja_id });
        }
        Ok(caja_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opened(opening_cents: i64) -> CajaAccount {
        let mut caja = CajaAccount::default();
        let events = caja
            .open(
                AggregateId::new(),
                BranchId::new("SUC-1"),
                OperatorId::new("op-1"),
                Money::from_cents(opening_cents),
            )
            .unwrap();
        caja.apply_events(events);
        caja
    }

    fn post(caja: &mut CajaAccount, kind: EntryKind, cents: i64) {
        let events = caja
            .post(kind, Money::from_cents(cents), None, None)
            .unwrap();
        caja.apply_events(events);
    }

    #[test]
    fn balance_is_fold_of_entries() {
        let mut caja = opened(10_000);
        post(&mut caja, EntryKind::SaleCash, 5_000);
        post(&mut caja, EntryKind::Withdrawal, 2_000);
        post(&mut caja, EntryKind::PurchaseCredit, 3_000);

        assert_eq!(caja.balance(), Money::from_cents(10_000));
        assert_eq!(caja.entries().len(), 3);
        assert_eq!(caja.entries()[2].sequence, 3);
    }

    #[test]
    fn open_validates_input() {
        let caja = CajaAccount::default();
        let result = caja.open(
            AggregateId::new(),
            BranchId::new(" "),
            OperatorId::new("op"),
            Money::zero(),
        );
        assert!(matches!(result, Err(CajaError::MissingField("branch"))));

        let result = caja.open(
            AggregateId::new(),
            BranchId::new("SUC-1"),
            OperatorId::new("op"),
            Money::from_cents(-1),
        );
        assert!(matches!(
            result,
            Err(CajaError::NegativeOpeningBalance { .. })
        ));
    }

    #[test]
    fn open_twice_is_rejected() {
        let caja = opened(0);
        let result = caja.open(
            AggregateId::new(),
            BranchId::new("SUC-1"),
            OperatorId::new("op-1"),
            Money::zero(),
        );
        assert!(matches!(result, Err(CajaError::AlreadyCreated)));
    }

    #[test]
    fn manual_postings_must_be_positive() {
        let caja = opened(0);
        for kind in [EntryKind::Deposit, EntryKind::Withdrawal] {
            let result = caja.post(kind, Money::zero(), None, None);
            assert!(matches!(result, Err(CajaError::InvalidAmount { .. })));
        }
        // Document postings carry the document total, which may be zero.
        assert!(caja.post(EntryKind::SaleCredit, Money::zero(), None, None).is_ok());
    }

    #[test]
    fn negative_amounts_are_rejected_for_every_kind() {
        let caja = opened(0);
        for kind in EntryKind::ALL {
            let result = caja.post(kind, Money::from_cents(-100), None, None);
            assert!(matches!(result, Err(CajaError::InvalidAmount { .. })));
        }
    }

    #[test]
    fn postings_that_would_overflow_the_ledger_are_rejected() {
        let mut caja = opened(0);
        let half = i64::MAX / 2 + 1;
        post(&mut caja, EntryKind::SaleCash, half);

        let result = caja.post(EntryKind::SaleCash, Money::from_cents(half), None, None);
        assert!(matches!(
            result,
            Err(CajaError::InvalidAmount {
                reason: "out of range",
                ..
            })
        ));
        assert!(matches!(
            caja.post(EntryKind::SaleCredit, Money::from_cents(half), None, None),
            Err(CajaError::InvalidAmount { .. })
        ));

        // The caja stays readable and closable.
        assert_eq!(caja.balance(), Money::from_cents(half));
        assert!(caja.summary().is_some());
        assert!(caja.close(None, false).is_ok());
    }

    #[test]
    fn counted_cash_out_of_range_is_rejected() {
        let mut caja = opened(0);
        post(&mut caja, EntryKind::Withdrawal, i64::MAX);

        let result = caja.close(Some(Money::from_cents(i64::MAX)), true);
        assert!(matches!(
            result,
            Err(CajaError::CountedCashOutOfRange { .. })
        ));
        assert!(caja.close(Some(Money::zero()), true).is_ok());
    }

    #[test]
    fn closed_caja_rejects_postings_and_second_close() {
        let mut caja = opened(1_000);
        let events = caja.close(None, false).unwrap();
        caja.apply_events(events);

        assert_eq!(caja.status(), CajaStatus::Closed);
        assert!(matches!(
            caja.post(EntryKind::Deposit, Money::from_cents(100), None, None),
            Err(CajaError::Closed { .. })
        ));
        assert!(matches!(caja.close(None, false), Err(CajaError::Closed { .. })));
    }

    #[test]
    fn close_records_cash_count() {
        let mut caja = opened(10_000);
        post(&mut caja, EntryKind::SaleCash, 2_500);
        post(&mut caja, EntryKind::SaleQr, 1_000);

        let events = caja
            .close(Some(Money::from_cents(12_400)), false)
            .unwrap();
        let CajaEvent::CajaClosed(data) = &events[0] else {
            panic!("expected CajaClosed");
        };
        assert_eq!(data.net_balance, Money::from_cents(13_500));
        assert_eq!(data.count.expected_cash, Money::from_cents(12_500));
        assert_eq!(data.count.difference, Some(Money::from_cents(-100)));
    }

    #[test]
    fn negative_balance_blocks_close_unless_allowed() {
        let mut caja = opened(1_000);
        post(&mut caja, EntryKind::PurchaseCredit, 5_000);

        assert!(matches!(
            caja.close(None, false),
            Err(CajaError::NegativeBalance { .. })
        ));
        assert!(caja.close(None, true).is_ok());
    }

    #[test]
    fn summary_matches_totals() {
        let mut caja = opened(10_000);
        post(&mut caja, EntryKind::SaleCash, 5_000);
        post(&mut caja, EntryKind::Deposit, 1_000);

        let summary = caja.summary().unwrap();
        assert_eq!(summary.net_balance, caja.balance());
        assert_eq!(summary.total_sales, Money::from_cents(5_000));
        assert_eq!(summary.cash_on_hand, Money::from_cents(16_000));
        assert_eq!(summary.entry_count, 2);
        assert!(CajaAccount::default().summary().is_none());
    }
}
