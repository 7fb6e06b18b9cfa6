//! # Error Types
//!
//! Domain-specific error types for cafe-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  cafe-core errors (this file)                                          │
//! │  ├── CoreError        - Ledger invariant violations (fatal, rejected)  │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  cafe-db errors (separate crate)                                       │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  cafe-ledger errors                                                    │
//! │  └── LedgerError      - What callers of the engines see                │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → LedgerError → caller              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Recoverable conditions (missing raw item, unmatched unit, shortage) are
//! NOT errors. They travel as warnings inside the costing report.

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business rule violations.
///
/// Every variant is an invariant violation: the operation is rejected and
/// nothing is written.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Σ debit ≠ Σ credit across the lines of an entry.
    ///
    /// ## When This Occurs
    /// ```text
    /// Dr Cash      1,000
    /// Cr Sales       900
    ///      │
    ///      ▼
    /// UnbalancedEntry { debit: 1000, credit: 900 }
    /// ```
    #[error("Unbalanced entry: debits {debit} != credits {credit}")]
    UnbalancedEntry { debit: i64, credit: i64 },

    /// Entry has fewer than two lines or moves no money.
    #[error("Journal entry must have at least two lines and a non-zero amount")]
    EmptyEntry,

    /// A single line breaks the one-sided, non-negative line convention.
    #[error("Invalid journal line {line}: {reason}")]
    InvalidLine { line: usize, reason: String },

    /// Entry is not in a state that allows the requested operation.
    ///
    /// ## When This Occurs
    /// - Posting an entry that is already posted
    /// - Voiding a posted entry (use a reversal instead)
    /// - Reversing a draft
    #[error("Journal entry {entry_id} is {status}, cannot {operation}")]
    InvalidEntryStatus {
        entry_id: String,
        status: String,
        operation: String,
    },

    /// Payment would push amount paid above the invoice total.
    #[error("Payment of {amount_paid} exceeds invoice {invoice_id} total of {total}")]
    PaymentExceedsTotal {
        invoice_id: String,
        amount_paid: i64,
        total: i64,
    },

    /// Amount paid may only grow.
    #[error("Invoice {invoice_id} already has {current} paid, cannot lower it to {requested}")]
    PaymentDecrease {
        invoice_id: String,
        current: i64,
        requested: i64,
    },

    /// Invoice is not in a state that allows the requested operation.
    #[error("Invoice {invoice_id} is {status}, cannot {operation}")]
    InvalidInvoiceStatus {
        invoice_id: String,
        status: String,
        operation: String,
    },

    /// Expense is not in a state that allows the requested operation.
    #[error("Expense {expense_id} is {status}, cannot {operation}")]
    InvalidExpenseStatus {
        expense_id: String,
        status: String,
        operation: String,
    },

    /// A parent account must have the same type as its children.
    #[error("Account {account} is {account_type} but parent {parent} is {parent_type}")]
    AccountTypeMismatch {
        account: String,
        account_type: String,
        parent: String,
        parent_type: String,
    },

    /// Re-parenting would make an account its own ancestor.
    #[error("Account {account} cannot be placed under {parent}: cycle in account tree")]
    AccountCycle { account: String, parent: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when caller input doesn't meet requirements.
/// Used for early validation before any I/O runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID, non-finite quantity).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Duplicate value (e.g., duplicate account number).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::UnbalancedEntry {
            debit: 1000,
            credit: 900,
        };
        assert_eq!(
            err.to_string(),
            "Unbalanced entry: debits 1000 != credits 900"
        );

        let err = CoreError::PaymentExceedsTotal {
            invoice_id: "INV-1".to_string(),
            amount_paid: 1200,
            total: 1100,
        };
        assert_eq!(
            err.to_string(),
            "Payment of 1200 exceeds invoice INV-1 total of 1100"
        );
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "product_id".to_string(),
        };
        assert_eq!(err.to_string(), "product_id is required");

        let err = ValidationError::MustBePositive {
            field: "quantity".to_string(),
        };
        assert_eq!(err.to_string(), "quantity must be positive");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "account_number".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
