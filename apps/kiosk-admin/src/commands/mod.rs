//! # Commands Module
//!
//! The operations behind the kiosk and its admin screens.
//!
//! ## Command Organization
//! ```text
//! commands/
//! ├── mod.rs        ◄─── You are here (exports, notification queueing)
//! ├── balance.rs    ◄─── Balances, invoices, settling
//! ├── checkout.rs   ◄─── Customer and guest purchases
//! ├── inventory.rs  ◄─── Restock, repricing preview, sales report
//! ├── dashboard.rs  ◄─── Headline figures and revenue chart
//! ├── request.rs    ◄─── Out-of-stock requests
//! └── transaction.rs ◄── Transaction log and manual corrections
//! ```
//!
//! ## How Commands Work
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  caller (CLI, or an HTTP/IPC layer in front of this crate)             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  pub async fn send_invoice(                                            │
//! │      db: &DbState,          ◄── shared pool                            │
//! │      config: &ConfigState,  ◄── currency, payment link, ...            │
//! │      customer_id: &str,                                                │
//! │  ) -> Result<InvoiceResponse, ApiError>                                │
//! │       │                                                                 │
//! │       ├── business change (kiosk-db, one transaction)                  │
//! │       └── queue_notification (best effort, after commit)               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Serialize-able response DTO                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod balance;
pub mod checkout;
pub mod dashboard;
pub mod inventory;
pub mod request;
pub mod transaction;

use kiosk_core::notification::Notification;
use tracing::{debug, warn};

use crate::state::DbState;

/// Queues a rendered notification in the outbox.
///
/// Runs after the business change has committed. A failure is logged and
/// reported as `false`; it never fails the command.
pub(crate) async fn queue_notification(db: &DbState, notification: &Notification) -> bool {
    match db.inner().outbox().queue(notification).await {
        Ok(entry) => {
            debug!(id = %entry.id, kind = ?entry.kind, "Notification queued");
            true
        }
        Err(e) => {
            warn!(
                error = %e,
                kind = ?notification.kind,
                recipient = ?notification.recipient,
                "Failed to queue notification"
            );
            false
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Fixtures shared by the command tests.

    use kiosk_core::{CartLine, Customer, CustomerRole, Money, Product, ProductDraft};
    use kiosk_db::{Database, DbConfig};
    use rust_decimal::Decimal;

    use crate::state::{ConfigState, DbState};

    pub async fn state() -> (DbState, ConfigState) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let config = ConfigState {
            payment_link: Some("https://pay.example/?amount={AMOUNT}".to_string()),
            admin_emails: vec!["boss@example.com".to_string(), "ops@example.com".to_string()],
            ..ConfigState::default()
        };
        (DbState::new(db), config)
    }

    pub async fn customer(db: &DbState, name: &str) -> Customer {
        db.inner()
            .customers()
            .create(name, Some(&format!("{}@example.com", name.to_lowercase())), CustomerRole::User)
            .await
            .unwrap()
    }

    pub async fn product(db: &DbState, name: &str, price: i64, stock: i64) -> Product {
        db.inner()
            .products()
            .create(ProductDraft {
                name: name.to_string(),
                price: Money::from_major(price),
                image: String::new(),
                stock,
                purchase_price: Decimal::ONE,
                category_id: None,
                related_product_ids: vec![],
                variants: vec![],
            })
            .await
            .unwrap()
    }

    pub fn line(product: &Product, quantity: i64) -> CartLine {
        CartLine {
            product_id: product.id.clone(),
            name: product.name.clone(),
            price: product.price,
            quantity,
            image: product.image.clone(),
            variant_id: None,
            variant_name: None,
        }
    }

    pub async fn pending_outbox(db: &DbState) -> Vec<kiosk_core::NotificationOutboxEntry> {
        db.inner().outbox().get_pending(100).await.unwrap()
    }

    /// Makes every later outbox write fail.
    pub async fn break_outbox(db: &DbState) {
        sqlx::query("DROP TABLE notification_outbox")
            .execute(db.inner().pool())
            .await
            .unwrap();
    }
}
