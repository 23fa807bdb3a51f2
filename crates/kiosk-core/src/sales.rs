//! # Sales Statistics
//!
//! Folds transaction lines into per-product and per-variant sales figures,
//! plus the totals shown on the inventory and dashboard views.
//!
//! Paid/pending status is ignored here: every historical sale counts.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::types::{CartLine, Product, Transaction};

/// Units sold and revenue for one variant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct VariantSales {
    pub total_sold: i64,
    pub total_revenue: Money,
}

/// Units sold and revenue for one product, broken down by variant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ProductSales {
    pub total_sold: i64,
    pub total_revenue: Money,
    /// Empty when no line referenced a variant.
    pub variant_sales: BTreeMap<String, VariantSales>,
}

impl ProductSales {
    /// Adds one line to the product figures (and its variant, if any).
    pub fn record(&mut self, line: &CartLine) {
        let revenue = line.line_total();
        self.total_sold += line.quantity;
        self.total_revenue += revenue;

        if let Some(variant_id) = &line.variant_id {
            let variant = self.variant_sales.entry(variant_id.clone()).or_default();
            variant.total_sold += line.quantity;
            variant.total_revenue += revenue;
        }
    }
}

/// Product ID → sales figures.
pub type SalesStatistics = BTreeMap<String, ProductSales>;

/// A units/revenue pair summed over several products.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SalesTotals {
    pub total_sold: i64,
    pub total_revenue: Money,
}

/// Builds sales statistics from every line of every transaction.
///
/// ## Example
/// ```rust
/// use kiosk_core::sales::compute_sales_statistics;
///
/// assert!(compute_sales_statistics(&[]).is_empty());
/// ```
pub fn compute_sales_statistics<'a, I>(transactions: I) -> SalesStatistics
where
    I: IntoIterator<Item = &'a Transaction>,
{
    let mut stats = SalesStatistics::new();
    for line in transactions.into_iter().flat_map(|t| t.items.iter()) {
        stats.entry(line.product_id.clone()).or_default().record(line);
    }
    stats
}

/// Totals for products that have sales but are not in `listed_product_ids`
/// (deleted products, or products hidden by a filter).
pub fn unlisted_sales<'a, I>(stats: &SalesStatistics, listed_product_ids: I) -> SalesTotals
where
    I: IntoIterator<Item = &'a str>,
{
    let listed: std::collections::HashSet<&str> = listed_product_ids.into_iter().collect();

    stats
        .iter()
        .filter(|(id, _)| !listed.contains(id.as_str()))
        .fold(SalesTotals::default(), |mut acc, (_, sales)| {
            acc.total_sold += sales.total_sold;
            acc.total_revenue += sales.total_revenue;
            acc
        })
}

/// Revenue summed over all products.
pub fn total_sales_revenue(stats: &SalesStatistics) -> Money {
    stats.values().map(|s| s.total_revenue).sum()
}

/// Stock valued at sale price, per variant when a product has variants.
pub fn inventory_value(products: &[Product]) -> Money {
    products.iter().map(Product::stock_value).sum()
}

// =============================================================================
// Dashboard
// =============================================================================

/// Headline figures for the admin dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_revenue: Money,
    /// Revenue of transactions in the seven days before `now`.
    pub weekly_revenue: Money,
    pub customer_count: i64,
    pub product_count: i64,
    pub transaction_count: i64,
}

/// Revenue booked on one calendar day (UTC).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct DailyRevenue {
    #[ts(as = "String")]
    pub date: NaiveDate,
    pub revenue: Money,
}

pub fn dashboard_stats(
    transactions: &[Transaction],
    customer_count: i64,
    product_count: i64,
    now: DateTime<Utc>,
) -> DashboardStats {
    let week_ago = now - Duration::days(7);

    DashboardStats {
        total_revenue: transactions.iter().map(|t| t.total).sum(),
        weekly_revenue: transactions
            .iter()
            .filter(|t| t.timestamp >= week_ago)
            .map(|t| t.total)
            .sum(),
        customer_count,
        product_count,
        transaction_count: transactions.len() as i64,
    }
}

/// Revenue per day for the `days` days ending with `today`, oldest first.
///
/// Days without sales are present with zero revenue.
pub fn daily_revenue(transactions: &[Transaction], today: NaiveDate, days: u32) -> Vec<DailyRevenue> {
    let mut buckets: BTreeMap<NaiveDate, Money> = (0..days as i64)
        .rev()
        .map(|back| (today - Duration::days(back), Money::zero()))
        .collect();

    for tx in transactions {
        if let Some(revenue) = buckets.get_mut(&tx.timestamp.date_naive()) {
            *revenue += tx.total;
        }
    }

    buckets
        .into_iter()
        .map(|(date, revenue)| DailyRevenue { date, revenue })
        .collect()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal::Decimal;

    fn line(product: &str, variant: Option<&str>, price: i64, qty: i64) -> CartLine {
        CartLine {
            product_id: product.to_string(),
            name: product.to_string(),
            price: Money::from_major(price),
            quantity: qty,
            image: String::new(),
            variant_id: variant.map(str::to_string),
            variant_name: variant.map(str::to_string),
        }
    }

    fn tx(items: Vec<CartLine>, paid: bool, at: DateTime<Utc>) -> Transaction {
        let total = items.iter().map(CartLine::line_total).sum();
        Transaction {
            id: uuid::Uuid::new_v4().to_string(),
            customer_id: Some("c".to_string()),
            customer_name: "C".to_string(),
            items,
            total,
            timestamp: at,
            paid,
            pending: false,
        }
    }

    #[test]
    fn test_empty_log_gives_empty_statistics() {
        assert!(compute_sales_statistics(&[]).is_empty());
    }

    #[test]
    fn test_plain_lines_have_no_variant_sales() {
        let now = Utc::now();
        let txs = vec![
            tx(vec![line("cola", None, 15, 2), line("chips", None, 20, 1)], false, now),
            tx(vec![line("cola", None, 15, 1)], true, now),
        ];
        let stats = compute_sales_statistics(&txs);

        assert_eq!(stats.len(), 2);
        assert_eq!(stats["cola"].total_sold, 3);
        assert_eq!(stats["cola"].total_revenue, Money::from_major(45));
        assert!(stats.values().all(|s| s.variant_sales.is_empty()));
    }

    #[test]
    fn test_variant_lines_roll_up_to_product() {
        let txs = vec![tx(
            vec![
                line("soda", Some("lime"), 15, 2),
                line("soda", Some("cherry"), 15, 1),
                line("soda", Some("lime"), 15, 1),
            ],
            false,
            Utc::now(),
        )];
        let stats = compute_sales_statistics(&txs);
        let soda = &stats["soda"];

        assert_eq!(soda.total_sold, 4);
        assert_eq!(soda.total_revenue, Money::from_major(60));
        assert_eq!(soda.variant_sales["lime"].total_sold, 3);
        assert_eq!(soda.variant_sales["cherry"].total_revenue, Money::from_major(15));
        assert_eq!(total_sales_revenue(&stats), Money::from_major(60));
    }

    #[test]
    fn test_unlisted_sales() {
        let txs = vec![tx(
            vec![line("a", None, 10, 1), line("b", None, 5, 2), line("gone", None, 7, 3)],
            false,
            Utc::now(),
        )];
        let stats = compute_sales_statistics(&txs);

        let totals = unlisted_sales(&stats, ["a", "b"]);
        assert_eq!(totals.total_sold, 3);
        assert_eq!(totals.total_revenue, Money::from_major(21));

        assert_eq!(unlisted_sales(&stats, ["a", "b", "gone"]), SalesTotals::default());
    }

    #[test]
    fn test_inventory_value() {
        let product = Product {
            id: "p".to_string(),
            name: "Cola".to_string(),
            price: Money::from_major(15),
            image: String::new(),
            stock: 10,
            purchase_price: Decimal::from(8),
            category_id: None,
            related_product_ids: vec![],
            variants: vec![],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(inventory_value(&[product.clone(), product]), Money::from_major(300));
        assert_eq!(inventory_value(&[]), Money::zero());
    }

    #[test]
    fn test_dashboard_stats_weekly_window() {
        let now = Utc.with_ymd_and_hms(2024, 5, 20, 12, 0, 0).unwrap();
        let txs = vec![
            tx(vec![line("a", None, 10, 1)], false, now - Duration::days(1)),
            tx(vec![line("a", None, 20, 1)], true, now - Duration::days(6)),
            tx(vec![line("a", None, 40, 1)], true, now - Duration::days(8)),
        ];
        let stats = dashboard_stats(&txs, 4, 9, now);

        assert_eq!(stats.total_revenue, Money::from_major(70));
        assert_eq!(stats.weekly_revenue, Money::from_major(30));
        assert_eq!(stats.transaction_count, 3);
        assert_eq!(stats.customer_count, 4);
        assert_eq!(stats.product_count, 9);
    }

    #[test]
    fn test_daily_revenue_fills_gaps() {
        let today = NaiveDate::from_ymd_opt(2024, 5, 20).unwrap();
        let at = |d: u32, h: u32| Utc.with_ymd_and_hms(2024, 5, d, h, 0, 0).unwrap();
        let txs = vec![
            tx(vec![line("a", None, 10, 1)], false, at(20, 9)),
            tx(vec![line("a", None, 5, 1)], false, at(20, 23)),
            tx(vec![line("a", None, 7, 1)], false, at(18, 1)),
            tx(vec![line("a", None, 99, 1)], false, at(1, 1)),
        ];
        let days = daily_revenue(&txs, today, 7);

        assert_eq!(days.len(), 7);
        assert_eq!(days[0].date, NaiveDate::from_ymd_opt(2024, 5, 14).unwrap());
        assert_eq!(days[6].date, today);
        assert_eq!(days[6].revenue, Money::from_major(15));
        assert_eq!(days[4].revenue, Money::from_major(7));
        assert_eq!(days[5].revenue, Money::zero());
    }
}
