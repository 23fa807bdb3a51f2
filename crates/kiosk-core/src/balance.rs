//! # Balances
//!
//! Derives customer balances from the transaction log and applies the
//! billing-cycle transitions.
//!
//! ## Recompute-From-Log
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Transactions (append + flag-mutate log)                                │
//! │                                                                         │
//! │   T1  100  paid=false pending=false  ──► outstanding      += 100       │
//! │   T2   50  paid=false pending=true   ──► pending_invoice  +=  50       │
//! │   T3   30  paid=true  pending=true   ──► (settled, ignored)            │
//! │                                                                         │
//! │  Nothing is cached: every read folds the log again.                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The persistence layer runs the same fold as a grouped SQL query; these
//! functions are the reference semantics and serve in-memory callers.

use std::collections::BTreeMap;
use std::iter::Sum;
use std::ops::Add;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::types::{CustomerBalance, PaymentState, Transaction};

/// The two open figures of a customer's tab.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct BalanceSummary {
    /// Unbilled and unpaid.
    pub outstanding: Money,
    /// Invoiced and unpaid.
    pub pending_invoice: Money,
}

impl BalanceSummary {
    /// Adds one transaction to the summary according to its payment state.
    pub fn record(&mut self, transaction: &Transaction) {
        match transaction.state() {
            PaymentState::Unbilled => self.outstanding += transaction.total,
            PaymentState::PendingInvoice => self.pending_invoice += transaction.total,
            PaymentState::Paid => {}
        }
    }

    /// Outstanding plus pending invoice.
    pub fn total_unpaid(&self) -> Money {
        self.outstanding + self.pending_invoice
    }
}

impl Add for BalanceSummary {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        BalanceSummary {
            outstanding: self.outstanding + other.outstanding,
            pending_invoice: self.pending_invoice + other.pending_invoice,
        }
    }
}

impl Sum for BalanceSummary {
    fn sum<I: Iterator<Item = BalanceSummary>>(iter: I) -> Self {
        iter.fold(BalanceSummary::default(), |acc, s| acc + s)
    }
}

// =============================================================================
// Aggregation
// =============================================================================

/// Sums one customer's transactions by payment state.
///
/// ## Example
/// ```rust
/// use kiosk_core::balance::aggregate;
///
/// let summary = aggregate("c1", &[]);
/// assert!(summary.outstanding.is_zero());
/// ```
pub fn aggregate<'a, I>(customer_id: &str, transactions: I) -> BalanceSummary
where
    I: IntoIterator<Item = &'a Transaction>,
{
    let mut summary = BalanceSummary::default();
    for tx in transactions.into_iter().filter(|t| t.belongs_to(customer_id)) {
        summary.record(tx);
    }
    summary
}

/// Sums every customer's transactions in one pass.
///
/// Guest transactions (no customer id) are skipped. Customers whose
/// transactions are all paid still appear, with zero figures.
pub fn aggregate_by_customer<'a, I>(transactions: I) -> BTreeMap<String, BalanceSummary>
where
    I: IntoIterator<Item = &'a Transaction>,
{
    let mut balances: BTreeMap<String, BalanceSummary> = BTreeMap::new();
    for tx in transactions {
        if let Some(customer_id) = &tx.customer_id {
            balances.entry(customer_id.clone()).or_default().record(tx);
        }
    }
    balances
}

/// Sum of outstanding balances over a list of customers.
pub fn total_outstanding(balances: &[CustomerBalance]) -> Money {
    balances.iter().map(|b| b.balance).sum()
}

/// Sorts customers by outstanding balance, largest first.
pub fn sort_by_balance_desc(balances: &mut [CustomerBalance]) {
    balances.sort_by(|a, b| b.balance.cmp(&a.balance));
}

// =============================================================================
// State Transitions
// =============================================================================

/// Invoice sent: every unpaid transaction of the customer becomes pending.
///
/// Returns the number of transactions whose flags changed. Calling it
/// again is a no-op.
pub fn mark_invoice_sent(customer_id: &str, transactions: &mut [Transaction]) -> usize {
    transactions
        .iter_mut()
        .filter(|t| t.belongs_to(customer_id))
        .map(|t| t.send_invoice())
        .filter(|changed| *changed)
        .count()
}

/// Payment received: every pending transaction of the customer becomes paid.
pub fn mark_customer_paid(customer_id: &str, transactions: &mut [Transaction]) -> usize {
    transactions
        .iter_mut()
        .filter(|t| t.belongs_to(customer_id))
        .map(|t| t.settle())
        .filter(|changed| *changed)
        .count()
}

/// Bulk reconciliation: every pending, unpaid transaction becomes paid.
pub fn mark_all_paid(transactions: &mut [Transaction]) -> usize {
    transactions
        .iter_mut()
        .map(|t| t.settle())
        .filter(|settled| *settled)
        .count()
}

/// Amount a customer owes on pending invoices; the figure a payment
/// confirmation reports.
pub fn pending_amount<'a, I>(customer_id: &str, transactions: I) -> Money
where
    I: IntoIterator<Item = &'a Transaction>,
{
    aggregate(customer_id, transactions).pending_invoice
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Customer, CustomerRole};
    use chrono::Utc;

    fn tx(id: &str, customer: Option<&str>, total: i64, paid: bool, pending: bool) -> Transaction {
        Transaction {
            id: id.to_string(),
            customer_id: customer.map(str::to_string),
            customer_name: customer.unwrap_or("Guest").to_string(),
            items: vec![],
            total: Money::from_major(total),
            timestamp: Utc::now(),
            paid,
            pending,
        }
    }

    fn scenario() -> Vec<Transaction> {
        vec![
            tx("t1", Some("c"), 100, false, false),
            tx("t2", Some("c"), 50, false, true),
            tx("t3", Some("c"), 30, true, true),
            tx("t4", Some("other"), 70, false, false),
            tx("t5", None, 20, false, false),
        ]
    }

    #[test]
    fn test_end_to_end_scenario() {
        let summary = aggregate("c", &scenario());
        assert_eq!(summary.outstanding, Money::from_major(100));
        assert_eq!(summary.pending_invoice, Money::from_major(50));
        assert_eq!(summary.total_unpaid(), Money::from_major(150));
    }

    #[test]
    fn test_paid_never_contributes() {
        let txs = vec![
            tx("a", Some("c"), 10, true, false),
            tx("b", Some("c"), 20, true, true),
        ];
        assert_eq!(aggregate("c", &txs), BalanceSummary::default());
    }

    #[test]
    fn test_aggregate_is_additive() {
        let txs = scenario();
        for split in 0..=txs.len() {
            let (left, right) = txs.split_at(split);
            assert_eq!(
                aggregate("c", left) + aggregate("c", right),
                aggregate("c", &txs),
                "split at {}",
                split
            );
        }
    }

    #[test]
    fn test_aggregate_unknown_customer_is_zero() {
        assert_eq!(aggregate("nobody", &scenario()), BalanceSummary::default());
    }

    #[test]
    fn test_aggregate_by_customer_skips_guests() {
        let balances = aggregate_by_customer(&scenario());
        assert_eq!(balances.len(), 2);
        assert_eq!(balances["c"].outstanding, Money::from_major(100));
        assert_eq!(balances["other"].outstanding, Money::from_major(70));

        let total: BalanceSummary = balances.values().copied().sum();
        assert_eq!(total.outstanding, Money::from_major(170));
        assert_eq!(total.pending_invoice, Money::from_major(50));
    }

    #[test]
    fn test_invoice_then_payment_cycle() {
        let mut txs = scenario();

        assert_eq!(mark_invoice_sent("c", &mut txs), 1);
        assert_eq!(mark_invoice_sent("c", &mut txs), 0);
        let summary = aggregate("c", &txs);
        assert_eq!(summary.outstanding, Money::zero());
        assert_eq!(summary.pending_invoice, Money::from_major(150));
        assert_eq!(pending_amount("c", &txs), Money::from_major(150));

        assert_eq!(mark_customer_paid("c", &mut txs), 2);
        assert_eq!(aggregate("c", &txs), BalanceSummary::default());

        // Untouched
        assert_eq!(aggregate("other", &txs).outstanding, Money::from_major(70));
    }

    #[test]
    fn test_customer_paid_leaves_unbilled_alone() {
        let mut txs = scenario();
        assert_eq!(mark_customer_paid("c", &mut txs), 1);
        let summary = aggregate("c", &txs);
        assert_eq!(summary.outstanding, Money::from_major(100));
        assert_eq!(summary.pending_invoice, Money::zero());
    }

    #[test]
    fn test_mark_all_paid_only_settles_pending() {
        let mut txs = scenario();
        mark_invoice_sent("other", &mut txs);
        assert_eq!(mark_all_paid(&mut txs), 2);
        assert_eq!(aggregate("c", &txs).outstanding, Money::from_major(100));
        assert_eq!(aggregate("other", &txs), BalanceSummary::default());
        assert!(!txs[4].paid);
    }

    #[test]
    fn test_total_outstanding_and_sort() {
        let customer = |id: &str| Customer {
            id: id.to_string(),
            name: id.to_string(),
            email: None,
            role: CustomerRole::User,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let mut balances = vec![
            CustomerBalance {
                customer: customer("a"),
                balance: Money::from_major(5),
                invoice_balance: Money::zero(),
            },
            CustomerBalance {
                customer: customer("b"),
                balance: Money::from_major(40),
                invoice_balance: Money::from_major(3),
            },
        ];
        assert_eq!(total_outstanding(&balances), Money::from_major(45));
        sort_by_balance_desc(&mut balances);
        assert_eq!(balances[0].customer.id, "b");
    }
}
