//! # Repository Module
//!
//! Database repository implementations for the ledger.
//!
//! ## Two Call Styles
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Pool-level: one call, one unit of work                                │
//! │                                                                         │
//! │    db.stock().adjust("b1", "beans", -18.0, Deduction, Some("O1"), ..)  │
//! │                                                                         │
//! │  Connection-level: compose several writes into one transaction         │
//! │                                                                         │
//! │    let mut tx = db.begin().await?;                                     │
//! │    costing::claim(&mut tx, "O1", "b1", "pos").await?;                  │
//! │    stock::adjust_in(&mut tx, "b1", "beans", -18.0, ..).await?;         │
//! │    costing::store_report(&mut tx, &report).await?;                     │
//! │    tx.commit().await?;                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`CatalogRepository`](catalog::CatalogRepository) - Raw items, products, add-ons, recipes
//! - [`StockRepository`](stock::StockRepository) - Branch balances and movements
//! - [`CostingRepository`](costing::CostingRepository) - At-most-once costing claims
//! - [`AccountRepository`](account::AccountRepository) - Chart of accounts
//! - [`JournalRepository`](journal::JournalRepository) - Entries, lines, posted activity
//! - [`InvoiceRepository`](invoice::InvoiceRepository) - Sales invoices
//! - [`ExpenseRepository`](expense::ExpenseRepository) - Operating expenses

pub mod account;
pub mod catalog;
pub mod costing;
pub mod expense;
pub mod invoice;
pub mod journal;
pub mod stock;
