//! # cafe-db: Database Layer for the Cafe Ledger
//!
//! SQLite persistence for the catalog, branch stock, order costing, chart of
//! accounts, journal and subledgers, via sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Cafe Ledger Data Flow                            │
//! │                                                                         │
//! │  cafe-ledger engines (CostingEngine, JournalEngine, ...)               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     cafe-db (THIS CRATE)                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ catalog stock │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ costing       │    │ 001_initial_ │  │   │
//! │  │   │ Transactions  │    │ account       │    │   schema.sql │  │   │
//! │  │   │               │    │ journal       │    │              │  │   │
//! │  │   │               │    │ invoice exp.  │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database file (WAL)                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cafe_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("ledger.db")).await?;
//! let beans = db.stock().quantity("branch-1", "beans").await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::account::AccountRepository;
pub use repository::catalog::CatalogRepository;
pub use repository::costing::CostingRepository;
pub use repository::expense::ExpenseRepository;
pub use repository::invoice::InvoiceRepository;
pub use repository::journal::JournalRepository;
pub use repository::stock::StockRepository;
