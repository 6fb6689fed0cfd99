//! Ledger entries and the balance fold.
//!
//! Every derived figure of a caja is recomputed from its entries on demand.
//! Nothing here caches a running balance.

use chrono::{DateTime, Utc};
use common::{AggregateId, BranchId, Money, OperatorId};
use serde::{Deserialize, Serialize};

use super::CajaStatus;

/// Kind of a ledger posting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryKind {
    SaleCash,
    SaleCredit,
    SaleQr,
    PurchaseCash,
    PurchaseCredit,
    Deposit,
    Withdrawal,
}

impl EntryKind {
    pub const ALL: [EntryKind; 7] = [
        EntryKind::SaleCash,
        EntryKind::SaleCredit,
        EntryKind::SaleQr,
        EntryKind::PurchaseCash,
        EntryKind::PurchaseCredit,
        EntryKind::Deposit,
        EntryKind::Withdrawal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::SaleCash => "SALE_CASH",
            EntryKind::SaleCredit => "SALE_CREDIT",
            EntryKind::SaleQr => "SALE_QR",
            EntryKind::PurchaseCash => "PURCHASE_CASH",
            EntryKind::PurchaseCredit => "PURCHASE_CREDIT",
            EntryKind::Deposit => "DEPOSIT",
            EntryKind::Withdrawal => "WITHDRAWAL",
        }
    }

    /// Deposits and withdrawals are entered by hand and must be positive.
    pub fn is_manual(&self) -> bool {
        matches!(self, EntryKind::Deposit | EntryKind::Withdrawal)
    }

    pub fn is_sale(&self) -> bool {
        matches!(
            self,
            EntryKind::SaleCash | EntryKind::SaleCredit | EntryKind::SaleQr
        )
    }

    pub fn is_purchase(&self) -> bool {
        matches!(self, EntryKind::PurchaseCash | EntryKind::PurchaseCredit)
    }

    /// Whether the posting moves physical cash in or out of the drawer.
    pub fn moves_cash(&self) -> bool {
        matches!(
            self,
            EntryKind::SaleCash
                | EntryKind::PurchaseCash
                | EntryKind::Deposit
                | EntryKind::Withdrawal
        )
    }
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable posting against a caja.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Position of the entry in its caja, starting at 1.
    pub sequence: u32,
    pub caja_id: AggregateId,
    pub kind: EntryKind,
    /// Always non-negative.
    pub amount: Money,
    pub timestamp: DateTime<Utc>,
    /// Originating sale or purchase document.
    pub reference: Option<String>,
    pub description: Option<String>,
}

/// Per-kind subtotals of a caja's entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CajaTotals {
    pub sale_cash: Money,
    pub sale_credit: Money,
    pub sale_qr: Money,
    pub purchase_cash: Money,
    pub purchase_credit: Money,
    pub deposits: Money,
    pub withdrawals: Money,
}

impl CajaTotals {
    /// Folds entries into subtotals.
    pub fn fold<'a>(entries: impl IntoIterator<Item = &'a LedgerEntry>) -> Self {
        entries.into_iter().fold(Self::default(), |mut totals, entry| {
            *totals.slot_mut(entry.kind) += entry.amount;
            totals
        })
    }

    /// Totals after one more posting, or None if the posting would push a
    /// subtotal or a derived figure out of range.
    ///
    /// Mirrors the evaluation order of the getters below, so totals accepted
    /// here can always be read back.
    pub fn try_record(
        &self,
        kind: EntryKind,
        amount: Money,
        opening_balance: Money,
    ) -> Option<Self> {
        let mut next = *self;
        let slot = next.slot_mut(kind);
        *slot = slot.checked_add(amount)?;

        let sales = next
            .sale_cash
            .checked_add(next.sale_credit)?
            .checked_add(next.sale_qr)?;
        let purchases = next.purchase_cash.checked_add(next.purchase_credit)?;
        opening_balance
            .checked_add(sales)?
            .checked_add(next.deposits)?
            .checked_sub(purchases)?
            .checked_sub(next.withdrawals)?;
        opening_balance
            .checked_add(next.sale_cash)?
            .checked_add(next.deposits)?
            .checked_sub(next.purchase_cash)?
            .checked_sub(next.withdrawals)?;
        Some(next)
    }

    fn slot_mut(&mut self, kind: EntryKind) -> &mut Money {
        match kind {
            EntryKind::SaleCash => &mut self.sale_cash,
            EntryKind::SaleCredit => &mut self.sale_credit,
            EntryKind::SaleQr => &mut self.sale_qr,
            EntryKind::PurchaseCash => &mut self.purchase_cash,
            EntryKind::PurchaseCredit => &mut self.purchase_credit,
            EntryKind::Deposit => &mut self.deposits,
            EntryKind::Withdrawal => &mut self.withdrawals,
        }
    }

    pub fn total_sales(&self) -> Money {
        self.sale_cash + self.sale_credit + self.sale_qr
    }

    pub fn total_purchases(&self) -> Money {
        self.purchase_cash + self.purchase_credit
    }

    /// `opening + sales + deposits − purchases − withdrawals`
    pub fn net_balance(&self, opening_balance: Money) -> Money {
        opening_balance + self.total_sales() + self.deposits
            - self.total_purchases()
            - self.withdrawals
    }

    /// Cash expected in the drawer: only the postings that move cash.
    pub fn cash_on_hand(&self, opening_balance: Money) -> Money {
        opening_balance + self.sale_cash + self.deposits - self.purchase_cash - self.withdrawals
    }
}

/// Cash count taken when a caja is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CashCount {
    pub expected_cash: Money,
    pub counted_cash: Option<Money>,
    /// `counted − expected`, when a count was supplied.
    pub difference: Option<Money>,
}

impl CashCount {
    pub fn new(expected_cash: Money, counted_cash: Option<Money>) -> Self {
        Self {
            expected_cash,
            counted_cash,
            difference: counted_cash.map(|counted| counted - expected_cash),
        }
    }
}

/// Read-only view of a caja with every derived figure recomputed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CajaSummary {
    pub caja_id: AggregateId,
    pub branch: BranchId,
    pub operator: OperatorId,
    pub status: CajaStatus,
    pub opening_balance: Money,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub totals: CajaTotals,
    pub total_sales: Money,
    pub total_purchases: Money,
    pub net_balance: Money,
    pub cash_on_hand: Money,
    pub entry_count: usize,
    pub closing: Option<CashCount>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(kind: EntryKind, cents: i64) -> LedgerEntry {
        LedgerEntry {
            sequence: 1,
            caja_id: AggregateId::new(),
            kind,
            amount: Money::from_cents(cents),
            timestamp: Utc::now(),
            reference: None,
            description: None,
        }
    }

    #[test]
    fn fold_sums_each_kind() {
        let entries: Vec<_> = EntryKind::ALL
            .iter()
            .enumerate()
            .map(|(i, kind)| entry(*kind, (i as i64 + 1) * 100))
            .collect();

        let totals = CajaTotals::fold(&entries);

        assert_eq!(totals.sale_cash, Money::from_cents(100));
        assert_eq!(totals.sale_qr, Money::from_cents(300));
        assert_eq!(totals.withdrawals, Money::from_cents(700));
        assert_eq!(totals.total_sales(), Money::from_cents(600));
        assert_eq!(totals.total_purchases(), Money::from_cents(900));
    }

    #[test]
    fn net_balance_and_cash_on_hand() {
        let entries = vec![
            entry(EntryKind::SaleCash, 5_000),
            entry(EntryKind::SaleCredit, 1_000),
            entry(EntryKind::Withdrawal, 2_000),
            entry(EntryKind::PurchaseCredit, 3_000),
        ];
        let totals = CajaTotals::fold(&entries);
        let opening = Money::from_cents(10_000);

        assert_eq!(totals.net_balance(opening), Money::from_cents(11_000));
        // Credit sales and credit purchases never touch the drawer.
        assert_eq!(totals.cash_on_hand(opening), Money::from_cents(13_000));
    }

    #[test]
    fn net_balance_can_go_negative() {
        let totals = CajaTotals::fold(&[entry(EntryKind::Withdrawal, 500)]);
        assert!(totals.net_balance(Money::zero()).is_negative());
    }

    #[test]
    fn try_record_rejects_overflowing_postings() {
        let half = Money::from_cents(i64::MAX / 2 + 1);
        let totals = CajaTotals::default()
            .try_record(EntryKind::SaleCash, half, Money::zero())
            .unwrap();

        assert_eq!(totals.try_record(EntryKind::SaleCash, half, Money::zero()), None);
        // Each subtotal fits, but total sales would not.
        assert_eq!(totals.try_record(EntryKind::SaleQr, half, Money::zero()), None);
        // The net balance has to fit together with the opening balance.
        assert_eq!(
            CajaTotals::default().try_record(EntryKind::Deposit, half, half),
            None
        );
    }

    #[test]
    fn try_record_matches_fold() {
        let entries = vec![
            entry(EntryKind::SaleCash, 5_000),
            entry(EntryKind::PurchaseCash, 1_200),
            entry(EntryKind::Withdrawal, 300),
        ];
        let recorded = entries.iter().try_fold(CajaTotals::default(), |totals, e| {
            totals.try_record(e.kind, e.amount, Money::from_cents(1_000))
        });
        assert_eq!(recorded, Some(CajaTotals::fold(&entries)));
    }

    #[test]
    fn cash_count_difference() {
        let count = CashCount::new(Money::from_cents(10_000), Some(Money::from_cents(9_950)));
        assert_eq!(count.difference, Some(Money::from_cents(-50)));
        assert_eq!(CashCount::new(Money::zero(), None).difference, None);
    }

    #[test]
    fn kind_classification() {
        assert!(EntryKind::Deposit.is_manual());
        assert!(!EntryKind::SaleCash.is_manual());
        assert!(EntryKind::SaleQr.is_sale());
        assert!(EntryKind::PurchaseCredit.is_purchase());
        assert!(!EntryKind::SaleCredit.moves_cash());
        assert_eq!(
            serde_json::to_string(&EntryKind::PurchaseCash).unwrap(),
            "\"PURCHASE_CASH\""
        );
    }
}
