//! # Product Request Commands
//!
//! Customers ask for out-of-stock items from the kiosk; admins see the
//! tally and get an alert per request.

use kiosk_core::{notification, ProductRequest};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::ApiError;
use crate::state::{ConfigState, DbState};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestResponse {
    pub request: ProductRequest,
    /// Alerts queued, one per admin recipient.
    pub notifications_queued: usize,
}

/// Records a request for a product (or one of its variants) and alerts
/// the admins.
///
/// With no admin recipients configured a single unaddressed alert is
/// queued for the chat channel.
pub async fn request_product(
    db: &DbState,
    config: &ConfigState,
    product_id: &str,
    variant_id: Option<&str>,
) -> Result<RequestResponse, ApiError> {
    debug!(product_id = %product_id, variant_id = ?variant_id, "request_product command");

    let product = db
        .inner()
        .products()
        .get_by_id(product_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Product", product_id))?;

    let variant_name = match variant_id {
        Some(id) => Some(
            product
                .variant(id)
                .map(|v| v.name.clone())
                .ok_or_else(|| ApiError::not_found("Variant", id))?,
        ),
        None => None,
    };

    let request = db
        .inner()
        .requests()
        .record(&product.id, &product.name, variant_id, variant_name.as_deref())
        .await?;

    let alert = notification::product_request(&product.name, variant_name.as_deref());
    let mut notifications_queued = 0;
    if config.admin_emails.is_empty() {
        if super::queue_notification(db, &alert).await {
            notifications_queued += 1;
        }
    } else {
        for email in &config.admin_emails {
            if super::queue_notification(db, &alert.addressed_to(email)).await {
                notifications_queued += 1;
            }
        }
    }

    info!(
        product_id = %product.id,
        variant_id = ?variant_id,
        count = request.count,
        "Product requested"
    );

    Ok(RequestResponse {
        request,
        notifications_queued,
    })
}

/// Lists open requests, oldest first.
pub async fn list_requests(db: &DbState) -> Result<Vec<ProductRequest>, ApiError> {
    debug!("list_requests command");
    Ok(db.inner().requests().list().await?)
}

/// Removes one request, e.g. once the item is back in stock.
pub async fn dismiss_request(db: &DbState, request_id: &str) -> Result<(), ApiError> {
    debug!(request_id = %request_id, "dismiss_request command");
    db.inner().requests().delete(request_id).await?;
    Ok(())
}

/// Removes every request. Returns how many were removed.
pub async fn clear_requests(db: &DbState) -> Result<u64, ApiError> {
    debug!("clear_requests command");
    let removed = db.inner().requests().clear_all().await?;
    info!(removed, "Product requests cleared");
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{pending_outbox, product, state};
    use crate::error::ErrorCode;
    use kiosk_core::NotificationKind;

    #[tokio::test]
    async fn test_repeat_requests_are_counted() {
        let (db, config) = state().await;
        let cola = product(&db, "Cola", 2, 0).await;

        request_product(&db, &config, &cola.id, None).await.unwrap();
        let second = request_product(&db, &config, &cola.id, None).await.unwrap();
        assert_eq!(second.request.count, 2);
        assert_eq!(second.notifications_queued, 2);

        let requests = list_requests(&db).await.unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].product_name, "Cola");

        let outbox = pending_outbox(&db).await;
        assert_eq!(outbox.len(), 4);
        assert!(outbox.iter().all(|e| e.kind == NotificationKind::ProductRequest));
        assert!(outbox
            .iter()
            .any(|e| e.recipient.as_deref() == Some("ops@example.com")));
    }

    #[tokio::test]
    async fn test_without_admins_alert_goes_to_chat() {
        let (db, mut config) = state().await;
        config.admin_emails.clear();
        let cola = product(&db, "Cola", 2, 0).await;

        let response = request_product(&db, &config, &cola.id, None).await.unwrap();
        assert_eq!(response.notifications_queued, 1);
        assert_eq!(pending_outbox(&db).await[0].recipient, None);
    }

    #[tokio::test]
    async fn test_unknown_product_or_variant() {
        let (db, config) = state().await;
        let cola = product(&db, "Cola", 2, 0).await;

        let err = request_product(&db, &config, "nope", None).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);

        let err = request_product(&db, &config, &cola.id, Some("nope")).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
        assert!(list_requests(&db).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dismiss_and_clear() {
        let (db, config) = state().await;
        let cola = product(&db, "Cola", 2, 0).await;
        let chips = product(&db, "Chips", 3, 0).await;

        let first = request_product(&db, &config, &cola.id, None).await.unwrap();
        request_product(&db, &config, &chips.id, None).await.unwrap();

        dismiss_request(&db, &first.request.id).await.unwrap();
        assert_eq!(list_requests(&db).await.unwrap().len(), 1);

        assert_eq!(clear_requests(&db).await.unwrap(), 1);
        assert!(list_requests(&db).await.unwrap().is_empty());
    }
}
