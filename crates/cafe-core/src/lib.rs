//! # cafe-core: Pure Business Logic for the Cafe Ledger
//!
//! This crate is the **heart** of the order-costing and double-entry ledger
//! engine. It contains all business rules as pure functions with zero I/O
//! dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Cafe Ledger Architecture                         │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │            Order lifecycle / Purchasing / Reporting UI          │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │            cafe-ledger (Costing + Journal Engines)              │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ cafe-core (THIS CRATE) ★                        │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌──────────┐          │   │
//! │  │   │  units   │ │  recipe  │ │ costing  │ │ journal  │          │   │
//! │  │   │ convert  │ │ resolve  │ │   plan   │ │ validate │          │   │
//! │  │   └──────────┘ └──────────┘ └──────────┘ └──────────┘          │   │
//! │  │   ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌──────────┐          │   │
//! │  │   │  chart   │ │reporting │ │subledger │ │  money   │          │   │
//! │  │   │  rollup  │ │ TB/IS/BS │ │ invoices │ │  cents   │          │   │
//! │  │   └──────────┘ └──────────┘ └──────────┘ └──────────┘          │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    cafe-db (Database Layer)                     │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (RawItem, JournalEntry, Invoice, etc.)
//! - [`money`] - Integer money (cents) and raw-material unit cost (millicents)
//! - [`units`] - Mass/volume unit conversion, fail-open on unknown units
//! - [`recipe`] - Expands an order line into raw-material requirements
//! - [`costing`] - Requirement accumulation and the costing report
//! - [`journal`] - Journal entry construction and the debit = credit rule
//! - [`chart`] - Default chart of accounts, tree building, balance rollup
//! - [`reporting`] - Trial balance, income statement, balance sheet
//! - [`subledger`] - Invoice totals, payment and expense state rules
//! - [`validation`] - Boundary validation
//!
//! ## Example Usage
//!
//! ```rust
//! use cafe_core::money::{Money, UnitCost};
//! use cafe_core::units::convert;
//!
//! // 0.018 kg of beans in grams
//! let grams = convert(0.018, "kg", "g").quantity;
//! assert!((grams - 18.0).abs() < 1e-9);
//!
//! // Beans cost 2.5 cents per gram
//! let cost = UnitCost::from_millicents(2_500).cost_of(grams);
//! assert_eq!(cost, Money::from_cents(45));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod chart;
pub mod costing;
pub mod error;
pub mod journal;
pub mod money;
pub mod recipe;
pub mod reporting;
pub mod subledger;
pub mod types;
pub mod units;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use cafe_core::Money` instead of
// `use cafe_core::money::Money`

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::{Money, UnitCost};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Default tenant ID (single-tenant deployments with a multi-tenant schema).
pub const DEFAULT_TENANT_ID: &str = "00000000-0000-0000-0000-000000000001";

/// Maximum line items accepted in a single order.
pub const MAX_ORDER_LINES: usize = 200;

/// Maximum quantity of a single order line or selected add-on.
pub const MAX_LINE_QUANTITY: i64 = 999;

/// Tolerance used when comparing stock quantities (stocking units).
pub const QUANTITY_EPSILON: f64 = 1e-9;
