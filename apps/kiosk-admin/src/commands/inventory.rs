//! # Inventory Commands
//!
//! Restocking, price previews and the sales report.
//!
//! ## Restock
//! ```text
//! RestockInput ──► markup (input or config) ──► kiosk-db restock
//!                                               (read, reprice, CAS write)
//! ```

use kiosk_core::repricing::{reprice, StockBatch};
use kiosk_core::sales::{inventory_value, total_sales_revenue, unlisted_sales};
use kiosk_core::{Money, RepricedStock, SalesStatistics, SalesTotals};
use kiosk_db::RestockRequest;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ApiError;
use crate::state::{ConfigState, DbState};

/// A delivery as entered by the operator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestockInput {
    pub product_id: String,
    pub variant_id: Option<String>,
    pub incoming_stock: i64,
    pub incoming_purchase_price: Option<Decimal>,
    /// Overrides the configured markup.
    pub markup: Option<Decimal>,
}

impl RestockInput {
    fn into_request(self, config: &ConfigState) -> RestockRequest {
        RestockRequest {
            product_id: self.product_id,
            variant_id: self.variant_id,
            incoming_stock: self.incoming_stock,
            incoming_purchase_price: self.incoming_purchase_price,
            markup: self.markup.unwrap_or(config.markup),
        }
    }
}

/// Sales figures for the inventory screen.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesReport {
    pub statistics: SalesStatistics,
    /// Sales of products no longer in the catalog.
    pub unlisted: SalesTotals,
    /// Stock valued at sale price.
    pub inventory_value: Money,
    pub total_sales: Money,
}

/// Books a delivery and reprices the item.
pub async fn restock(
    db: &DbState,
    config: &ConfigState,
    input: RestockInput,
) -> Result<RepricedStock, ApiError> {
    debug!(product_id = %input.product_id, variant_id = ?input.variant_id, "restock command");

    let request = input.into_request(config);
    let repriced = db.inner().products().restock(&request).await?;

    info!(
        product_id = %request.product_id,
        added = request.incoming_stock,
        stock = repriced.stock,
        price = %repriced.price,
        "Stock received"
    );
    Ok(repriced)
}

/// Computes what [`restock`] would write, without writing it.
pub async fn reprice_preview(
    db: &DbState,
    config: &ConfigState,
    input: RestockInput,
) -> Result<RepricedStock, ApiError> {
    debug!(product_id = %input.product_id, "reprice_preview command");

    let product = db
        .inner()
        .products()
        .get_by_id(&input.product_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Product", &input.product_id))?;

    let (stock, cost) = match input.variant_id.as_deref() {
        Some(variant_id) => {
            let variant = product
                .variant(variant_id)
                .ok_or_else(|| ApiError::not_found("Variant", variant_id))?;
            (variant.stock, variant.purchase_price)
        }
        None if product.has_variants() => {
            return Err(ApiError::validation(
                "Product has variants; choose one to restock",
            ))
        }
        None => (product.stock, product.purchase_price),
    };

    let batch = StockBatch::restock(
        stock,
        cost,
        input.incoming_stock,
        input.incoming_purchase_price,
        input.markup.unwrap_or(config.markup),
    );
    Ok(reprice(&batch)?)
}

/// Builds the sales report from the whole transaction history.
pub async fn sales_report(db: &DbState) -> Result<SalesReport, ApiError> {
    debug!("sales_report command");

    let statistics = db.inner().transactions().sales_statistics().await?;
    let products = db.inner().products().list().await?;

    let unlisted = unlisted_sales(&statistics, products.iter().map(|p| p.id.as_str()));
    let report = SalesReport {
        unlisted,
        inventory_value: inventory_value(&products),
        total_sales: total_sales_revenue(&statistics),
        statistics,
    };

    debug!(
        products = report.statistics.len(),
        total_sales = %report.total_sales,
        "Sales report built"
    );
    Ok(report)
}
