//! Dashboard command: headline figures and the last week's revenue chart.

use chrono::Utc;
use kiosk_core::sales::{daily_revenue, dashboard_stats, DailyRevenue, DashboardStats};
use serde::Serialize;
use tracing::debug;

use crate::error::ApiError;
use crate::state::DbState;

/// Days shown in the revenue chart, today included.
pub const CHART_DAYS: u32 = 7;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardReport {
    pub stats: DashboardStats,
    pub daily_revenue: Vec<DailyRevenue>,
}

pub async fn dashboard(db: &DbState) -> Result<DashboardReport, ApiError> {
    debug!("dashboard command");

    let transactions = db.inner().transactions().list().await?;
    let customer_count = db.inner().customers().count().await?;
    let product_count = db.inner().products().count().await?;

    let now = Utc::now();
    Ok(DashboardReport {
        stats: dashboard_stats(&transactions, customer_count, product_count, now),
        daily_revenue: daily_revenue(&transactions, now.date_naive(), CHART_DAYS),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::checkout::process_guest_payment;
    use crate::commands::test_support::{customer, line, product, state};
    use kiosk_core::Money;

    #[tokio::test]
    async fn test_empty_dashboard() {
        let (db, _) = state().await;

        let report = dashboard(&db).await.unwrap();
        assert_eq!(report.stats, DashboardStats::default());
        assert_eq!(report.daily_revenue.len(), CHART_DAYS as usize);
        assert!(report.daily_revenue.iter().all(|d| d.revenue.is_zero()));
    }

    #[tokio::test]
    async fn test_todays_sales_show_up() {
        let (db, config) = state().await;
        let cola = product(&db, "Cola", 2, 10).await;
        product(&db, "Chips", 3, 10).await;
        customer(&db, "Ann").await;

        process_guest_payment(&db, &config, "Zed", vec![line(&cola, 3)])
            .await
            .unwrap();

        let report = dashboard(&db).await.unwrap();
        assert_eq!(report.stats.total_revenue, Money::from_major(6));
        assert_eq!(report.stats.weekly_revenue, Money::from_major(6));
        assert_eq!(report.stats.customer_count, 1);
        assert_eq!(report.stats.product_count, 2);
        assert_eq!(report.stats.transaction_count, 1);

        let today = report.daily_revenue.last().unwrap();
        assert_eq!(today.date, Utc::now().date_naive());
        assert_eq!(today.revenue, Money::from_major(6));
    }
}
