//! # Validation Module
//!
//! Boundary validation for everything that enters the core.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Caller (order lifecycle, purchasing, reporting UI)           │
//! │  └── Deserialization into typed records (OrderLineItem, ...)           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  └── Required ids, positive quantities, bounded sizes                  │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK constraints (one-sided lines, amount_paid <= total)         │
//! │  ├── UNIQUE constraints (account number, live reference)               │
//! │  └── Triggers (posted entries and movements are immutable)             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use cafe_core::validation::{validate_order_lines, validate_account_number};
//! use cafe_core::OrderLineItem;
//!
//! assert!(validate_order_lines(&[OrderLineItem::new("espresso", 1)]).is_ok());
//! assert!(validate_order_lines(&[OrderLineItem::new("espresso", 0)]).is_err());
//! assert!(validate_account_number("5100").is_ok());
//! ```

use crate::error::ValidationError;
use crate::types::OrderLineItem;
use crate::{MAX_LINE_QUANTITY, MAX_ORDER_LINES};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Non-empty after trimming.
pub fn validate_required(field: &str, value: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Non-empty and at most `max` characters.
pub fn validate_name(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    validate_required(field, value)?;
    if value.trim().chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }
    Ok(())
}

/// Account numbers: 1 to 20 characters of digits, letters, `-` or `.`.
pub fn validate_account_number(number: &str) -> ValidationResult<()> {
    let number = number.trim();
    validate_name("account_number", number, 20)?;
    if !number
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
    {
        return Err(ValidationError::InvalidFormat {
            field: "account_number".to_string(),
            reason: "must contain only letters, digits, '-' and '.'".to_string(),
        });
    }
    Ok(())
}

/// Idempotency key parts for automatic postings.
pub fn validate_reference(reference_type: &str, reference_id: &str) -> ValidationResult<()> {
    validate_name("reference_type", reference_type, 50)?;
    validate_name("reference_id", reference_id, 200)
}

/// Stocking / recipe units. Any non-empty token is accepted; unknown units
/// fail open at conversion time.
pub fn validate_unit(unit: &str) -> ValidationResult<()> {
    validate_name("unit", unit, 20)
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Order line and add-on quantities: 1..=MAX_LINE_QUANTITY.
pub fn validate_quantity(field: &str, qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }
    if qty > MAX_LINE_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 1,
            max: MAX_LINE_QUANTITY,
        });
    }
    Ok(())
}

/// Recipe quantities and stock received: finite and strictly positive.
pub fn validate_measure(field: &str, quantity: f64) -> ValidationResult<()> {
    if !quantity.is_finite() {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "must be a finite number".to_string(),
        });
    }
    if quantity <= 0.0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Stock deltas: finite and non-zero, either sign.
pub fn validate_delta(delta: f64) -> ValidationResult<()> {
    if !delta.is_finite() || delta == 0.0 {
        return Err(ValidationError::InvalidFormat {
            field: "delta".to_string(),
            reason: "must be a finite, non-zero number".to_string(),
        });
    }
    Ok(())
}

/// Prices and costs: zero allowed, negative not.
pub fn validate_price_cents(field: &str, cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: i64::MAX,
        });
    }
    Ok(())
}

/// Must be > 0.
pub fn validate_amount_cents(field: &str, cents: i64) -> ValidationResult<()> {
    if cents <= 0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// 0..=10000 bps.
pub fn validate_tax_rate_bps(bps: u32) -> ValidationResult<()> {
    if bps > 10000 {
        return Err(ValidationError::OutOfRange {
            field: "tax_rate".to_string(),
            min: 0,
            max: 10000,
        });
    }
    Ok(())
}

// =============================================================================
// Order Validators
// =============================================================================

/// Validates an order before any costing I/O.
///
/// ## Rules
/// - At least one line, at most MAX_ORDER_LINES
/// - Every product and add-on id is present
/// - Every line and add-on quantity is within 1..=MAX_LINE_QUANTITY
pub fn validate_order_lines(lines: &[OrderLineItem]) -> ValidationResult<()> {
    if lines.is_empty() {
        return Err(ValidationError::Required {
            field: "line_items".to_string(),
        });
    }
    if lines.len() > MAX_ORDER_LINES {
        return Err(ValidationError::OutOfRange {
            field: "line_items".to_string(),
            min: 1,
            max: MAX_ORDER_LINES as i64,
        });
    }

    for line in lines {
        validate_required("product_id", &line.product_id)?;
        validate_quantity("quantity", line.quantity)?;
        for addon in &line.addons {
            validate_required("addon_id", &addon.addon_id)?;
            validate_quantity("addon quantity", addon.quantity)?;
        }
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
