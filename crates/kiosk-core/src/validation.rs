//! # Validation Module
//!
//! Input validation for admin forms and kiosk checkout.
//!
//! ## Where Validation Happens
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Admin command / kiosk checkout                                         │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  THIS MODULE: field rules (names, prices, stock, ids)                  │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  SQLite: NOT NULL, CHECK, UNIQUE, foreign keys                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use kiosk_core::validation::{validate_customer_name, validate_quantity};
//!
//! validate_customer_name("Ada Lovelace").unwrap();
//! validate_quantity(2).unwrap();
//! ```

use rust_decimal::Decimal;

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::{ProductDraft, VariantDraft};
use crate::{MAX_CART_LINES, MAX_ITEM_QUANTITY};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

const MAX_NAME_LEN: usize = 200;
const MAX_EMAIL_LEN: usize = 254;

// =============================================================================
// String Validators
// =============================================================================

fn validate_name(field: &str, value: &str) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_NAME_LEN,
        });
    }

    Ok(())
}

/// Validates a product or variant name.
///
/// ## Example
/// ```rust
/// use kiosk_core::validation::validate_product_name;
///
/// assert!(validate_product_name("Cola Zero").is_ok());
/// assert!(validate_product_name("   ").is_err());
/// ```
pub fn validate_product_name(name: &str) -> ValidationResult<()> {
    validate_name("name", name)
}

/// Validates a customer name.
pub fn validate_customer_name(name: &str) -> ValidationResult<()> {
    validate_name("customer name", name)
}

/// Validates a category title.
pub fn validate_category_title(title: &str) -> ValidationResult<()> {
    validate_name("title", title)
}

/// Validates an optional email address.
///
/// Only the shape `local@domain.tld` is checked; deliverability is the
/// notification worker's problem.
pub fn validate_email(email: &str) -> ValidationResult<()> {
    let email = email.trim();

    if email.len() > MAX_EMAIL_LEN {
        return Err(ValidationError::TooLong {
            field: "email".to_string(),
            max: MAX_EMAIL_LEN,
        });
    }

    let well_formed = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    };

    if !well_formed {
        return Err(ValidationError::InvalidFormat {
            field: "email".to_string(),
            reason: "must look like name@example.com".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a quantity on a cart line.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY (999)
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a sale price. Zero is allowed (free items).
pub fn validate_sale_price(price: Money) -> ValidationResult<()> {
    if price.is_negative() {
        return Err(ValidationError::MustNotBeNegative {
            field: "price".to_string(),
        });
    }
    Ok(())
}

/// Validates a corrected transaction total. Zero is allowed (waived).
pub fn validate_transaction_total(total: Money) -> ValidationResult<()> {
    if total.is_negative() {
        return Err(ValidationError::MustNotBeNegative {
            field: "total".to_string(),
        });
    }
    Ok(())
}

/// Validates a purchase cost.
pub fn validate_purchase_price(cost: Decimal) -> ValidationResult<()> {
    if cost < Decimal::ZERO {
        return Err(ValidationError::MustNotBeNegative {
            field: "purchase price".to_string(),
        });
    }
    Ok(())
}

/// Validates a stock level.
pub fn validate_stock(stock: i64) -> ValidationResult<()> {
    if stock < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: "stock".to_string(),
        });
    }
    Ok(())
}

/// Validates a markup factor (must be > 0).
pub fn validate_markup(markup: Decimal) -> ValidationResult<()> {
    if markup <= Decimal::ZERO {
        return Err(ValidationError::MustBePositive {
            field: "markup".to_string(),
        });
    }
    Ok(())
}

/// Validates the number of distinct lines in a cart.
pub fn validate_cart_size(lines: usize) -> ValidationResult<()> {
    if lines > MAX_CART_LINES {
        return Err(ValidationError::OutOfRange {
            field: "cart lines".to_string(),
            min: 0,
            max: MAX_CART_LINES as i64,
        });
    }
    Ok(())
}

// =============================================================================
// Composite Validators
// =============================================================================

/// Validates every field of a product draft, variants included.
pub fn validate_product_draft(draft: &ProductDraft) -> ValidationResult<()> {
    validate_product_name(&draft.name)?;
    validate_sale_price(draft.price)?;
    validate_stock(draft.stock)?;
    validate_purchase_price(draft.purchase_price)?;
    draft.variants.iter().try_for_each(validate_variant_draft)
}

fn validate_variant_draft(variant: &VariantDraft) -> ValidationResult<()> {
    validate_product_name(&variant.name)?;
    validate_sale_price(variant.price)?;
    validate_stock(variant.stock)?;
    validate_purchase_price(variant.purchase_price)
}

// =============================================================================
// UUID Validators
// =============================================================================

/// Validates a UUID string.
///
/// ## Example
/// ```rust
/// use kiosk_core::validation::validate_uuid;
///
/// assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("not-a-uuid").is_err());
/// ```
pub fn validate_uuid(id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "id".to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: "id".to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
