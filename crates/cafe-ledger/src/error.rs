//! # Ledger Error Types
//!
//! What callers of the engines see.
//!
//! ## Error Categories
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Ledger Error Categories                            │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │   Invariant     │  │   Concurrency   │  │     Configuration       │ │
//! │  │   (rejected)    │  │   (retried)     │  │                         │ │
//! │  │                 │  │                 │  │  InvalidConfig          │ │
//! │  │  Core(..)       │  │  Db(Conflict)   │  │  ConfigLoadFailed       │ │
//! │  │  Validation(..) │  │  Db(PoolExh.)   │  │  ConfigSaveFailed       │ │
//! │  │  UnmatchedUnit  │  │                 │  │  AccountNotConfigured   │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  Recoverable data problems (missing raw item, unmatched unit outside   │
//! │  strict mode, shortage) are not errors: they are report warnings.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use cafe_core::{CoreError, ValidationError};
use cafe_db::DbError;
use thiserror::Error;

/// Result type alias for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Ledger error type covering all engine failures.
#[derive(Debug, Error)]
pub enum LedgerError {
    // =========================================================================
    // Domain Errors
    // =========================================================================
    /// A ledger invariant was violated (unbalanced entry, overpayment, ...).
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Input failed boundary validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Strict unit mode refused a quantity it could not convert.
    #[error("No conversion from '{from_unit}' to '{to_unit}' for raw item {raw_item_id}")]
    UnmatchedUnit {
        raw_item_id: String,
        from_unit: String,
        to_unit: String,
    },

    /// A record the operation needs does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// An automatic posting needs an account the tenant does not have.
    #[error("Account {number} is not configured for tenant {tenant_id}")]
    AccountNotConfigured { tenant_id: String, number: String },

    // =========================================================================
    // Database Errors
    // =========================================================================
    /// Persistence failure.
    #[error(transparent)]
    Db(#[from] DbError),

    /// A conflicting operation kept failing.
    #[error("{operation} failed after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        last_error: String,
    },

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid ledger configuration.
    #[error("Invalid ledger configuration: {0}")]
    InvalidConfig(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),
}

impl LedgerError {
    /// Creates a NotFound error.
    pub fn not_found(entity: &str, id: impl Into<String>) -> Self {
        LedgerError::NotFound {
            entity: entity.to_string(),
            id: id.into(),
        }
    }

    /// Returns true if repeating the single operation may succeed.
    ///
    /// Only store-level conflicts qualify (SQLite busy/locked, pool
    /// exhausted). Invariant violations never do.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::Db(e) if e.is_conflict())
    }

    /// Returns true if the operation was rejected to protect a ledger rule.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            LedgerError::Core(_)
                | LedgerError::Validation(_)
                | LedgerError::UnmatchedUnit { .. }
                | LedgerError::Db(DbError::CheckViolation { .. })
        )
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            LedgerError::InvalidConfig(_)
                | LedgerError::ConfigLoadFailed(_)
                | LedgerError::ConfigSaveFailed(_)
                | LedgerError::AccountNotConfigured { .. }
        )
    }
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        LedgerError::Db(DbError::from(err))
    }
}

impl From<std::io::Error> for LedgerError {
    fn from(err: std::io::Error) -> Self {
        LedgerError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for LedgerError {
    fn from(err: toml::de::Error) -> Self {
        LedgerError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for LedgerError {
    fn from(err: toml::ser::Error) -> Self {
        LedgerError::ConfigSaveFailed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(LedgerError::Db(DbError::Conflict("database is locked".into())).is_retryable());
        assert!(LedgerError::Db(DbError::PoolExhausted).is_retryable());

        assert!(!LedgerError::Core(CoreError::EmptyEntry).is_retryable());
        assert!(!LedgerError::Db(DbError::not_found("Account", "a1")).is_retryable());
        assert!(!LedgerError::InvalidConfig("bad".into()).is_retryable());
    }

    #[test]
    fn test_invariant_violations() {
        let unbalanced = LedgerError::Core(CoreError::UnbalancedEntry {
            debit: 100,
            credit: 90,
        });
        assert!(unbalanced.is_invariant_violation());
        assert!(unbalanced.to_string().contains("Unbalanced"));

        let unmatched = LedgerError::UnmatchedUnit {
            raw_item_id: "beans".into(),
            from_unit: "scoop".into(),
            to_unit: "g".into(),
        };
        assert!(unmatched.is_invariant_violation());
        assert!(unmatched.to_string().contains("scoop"));

        assert!(!LedgerError::not_found("Invoice", "INV-1").is_invariant_violation());
    }

    #[test]
    fn test_config_errors() {
        let err = LedgerError::AccountNotConfigured {
            tenant_id: "t1".into(),
            number: "5100".into(),
        };
        assert!(err.is_config_error());
        assert!(err.to_string().contains("5100"));
        assert!(!LedgerError::Db(DbError::PoolExhausted).is_config_error());
    }
}
