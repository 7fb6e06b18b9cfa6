//! # cafe-ledger: Costing & Double-Entry Ledger Engines
//!
//! This crate turns completed cafe orders into stock movements and journal
//! entries, and keeps the books those entries build.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Ledger (facade)                                │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                      complete_order()                            │  │
//! │  │                                                                  │  │
//! │  │  CostingEngine ─────► Postings::post_order_cogs                  │  │
//! │  │  recipe → plan → deduct → report      Dr COGS / Cr Inventory     │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │                                         │
//! │         ┌─────────────────────┼─────────────────────┐                  │
//! │         ▼                     ▼                     ▼                   │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐    │
//! │  │  StockLedger   │  │ JournalEngine  │  │  Subledgers            │    │
//! │  │                │  │                │  │                        │    │
//! │  │ Atomic adjust  │  │ Balanced,      │  │ Invoices, expenses,    │    │
//! │  │ Transfers      │  │ idempotent,    │  │ purchases. Each status │    │
//! │  │ Low stock      │  │ reversible     │  │ change posts its entry │    │
//! │  └────────────────┘  └────────────────┘  └────────────────────────┘    │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    FinancialReports                              │   │
//! │  │ Trial balance, income statement, balance sheet over posted lines │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`config`] - Ledger configuration (database, accounts, costing, retry)
//! - [`error`] - Engine error types
//! - [`retry`] - Backoff on busy/locked SQLite
//! - [`chart`] - Chart of accounts, balances
//! - [`journal`] - Journal engine
//! - [`recipe`] - Catalog and recipe maintenance, recipe resolution
//! - [`costing`] - Order costing engine
//! - [`stock`] - Branch stock ledger
//! - [`posting`] - Automatic order postings
//! - [`subledger`] - Invoices and expenses
//! - [`purchasing`] - Goods receipt
//! - [`reporting`] - Financial reports
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cafe_ledger::{CostOrderRequest, Ledger, LedgerConfig};
//! use cafe_core::OrderLineItem;
//!
//! let ledger = Ledger::open(LedgerConfig::load_or_default(None)).await?;
//! ledger.chart().seed_default_chart("tenant-1").await?;
//!
//! let request = CostOrderRequest::new("O1", "branch-1", "barista")
//!     .line(OrderLineItem::new("espresso", 1));
//! let done = ledger.complete_order("tenant-1", &request, today).await?;
//! println!("COGS: {}", done.report.cost_of_goods());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod retry;

pub mod chart;
pub mod costing;
pub mod journal;
pub mod recipe;
pub mod stock;

pub mod posting;
pub mod purchasing;
pub mod reporting;
pub mod subledger;

#[cfg(test)]
mod test_support;

// =============================================================================
// Re-exports
// =============================================================================

pub use chart::{ChartOfAccounts, NewAccount};
pub use config::{AccountSettings, CostingSettings, LedgerConfig, RetrySettings};
pub use costing::{CostOrderRequest, CostingEngine};
pub use error::{LedgerError, LedgerResult};
pub use journal::JournalEngine;
pub use posting::{OrderSale, Postings};
pub use purchasing::{PurchaseLine, PurchaseReceipt, PurchaseResult, Purchasing, Settlement};
pub use recipe::{RecipeBook, RecipeResolver};
pub use reporting::FinancialReports;
pub use stock::{StockLedger, Transfer};
pub use subledger::{ExpenseService, InvoiceService, NewExpense, NewInvoice};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use cafe_core::costing::CostingReport;
use cafe_core::JournalEntry;
use cafe_db::Database;

// =============================================================================
// Ledger
// =============================================================================

/// Outcome of [`Ledger::complete_order`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCompletion {
    pub report: CostingReport,
    /// `None` when the order consumed nothing with a cost.
    pub cogs_entry: Option<JournalEntry>,
}

/// Entry point: one database, one configuration, every engine.
///
/// Cheap to clone; engines handed out share the pool.
#[derive(Debug, Clone)]
pub struct Ledger {
    db: Database,
    config: Arc<LedgerConfig>,
}

impl Ledger {
    /// Validates the config, opens the pool and runs migrations.
    pub async fn open(config: LedgerConfig) -> LedgerResult<Self> {
        config.validate()?;
        let db = Database::new(config.database.db_config()).await?;
        info!(path = ?config.database.path, "Ledger opened");
        Ok(Ledger::from_database(db, Arc::new(config)))
    }

    pub fn from_database(db: Database, config: Arc<LedgerConfig>) -> Self {
        Ledger { db, config }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn chart(&self) -> ChartOfAccounts {
        ChartOfAccounts::new(self.db.clone())
    }

    pub fn journal(&self) -> JournalEngine {
        JournalEngine::new(self.db.clone(), self.config.clone())
    }

    pub fn recipes(&self) -> RecipeBook {
        RecipeBook::new(self.db.clone())
    }

    pub fn costing(&self) -> CostingEngine {
        CostingEngine::new(self.db.clone(), self.config.clone())
    }

    pub fn stock(&self) -> StockLedger {
        StockLedger::new(self.db.clone(), self.config.clone())
    }

    pub fn postings(&self) -> Postings {
        Postings::new(self.db.clone(), self.config.clone())
    }

    pub fn invoices(&self) -> InvoiceService {
        InvoiceService::new(self.db.clone(), self.config.clone())
    }

    pub fn expenses(&self) -> ExpenseService {
        ExpenseService::new(self.db.clone(), self.config.clone())
    }

    pub fn purchasing(&self) -> Purchasing {
        Purchasing::new(self.db.clone(), self.config.clone())
    }

    pub fn reports(&self) -> FinancialReports {
        FinancialReports::new(self.db.clone(), self.config.clone())
    }

    /// Costs an order, deducts its stock and posts its cost of goods.
    ///
    /// Both steps are keyed by the order id, so calling this again after a
    /// failure between them finishes the posting without deducting twice.
    pub async fn complete_order(
        &self,
        tenant_id: &str,
        request: &CostOrderRequest,
        entry_date: NaiveDate,
    ) -> LedgerResult<OrderCompletion> {
        let report = self.costing().cost_order(request).await?;
        let cogs_entry = self
            .postings()
            .post_order_cogs(tenant_id, &report, entry_date, &request.actor)
            .await?;

        Ok(OrderCompletion { report, cogs_entry })
    }
}

/// Installs the global fmt subscriber.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=cafe=trace` - Show trace for cafe crates only
/// - Default: `info,cafe=debug,sqlx=warn`
///
/// Does nothing if a subscriber is already installed.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,cafe=debug,sqlx=warn"));

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{cafe_catalog, seeded_ledger, BRANCH, TENANT};
    use cafe_core::chart::numbers;
    use cafe_core::{Money, MovementType, OrderLineItem};

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()
    }

    #[tokio::test]
    async fn test_complete_order_costs_and_posts() {
        let ledger = seeded_ledger().await;
        let cafe = cafe_catalog(&ledger).await;
        ledger
            .stock()
            .adjust(BRANCH, &cafe.beans.id, 1_000.0, MovementType::Purchase, None, "clerk")
            .await
            .unwrap();
        ledger
            .stock()
            .adjust(BRANCH, &cafe.milk.id, 5.0, MovementType::Purchase, None, "clerk")
            .await
            .unwrap();

        let request = CostOrderRequest::new("O1", BRANCH, "barista").line(OrderLineItem::new(&cafe.latte.id, 1));
        let done = ledger.complete_order(TENANT, &request, date()).await.unwrap();
        // 18 g × 2.5¢ + 0.2 l × 120¢
        assert_eq!(done.report.cost_of_goods(), Money::from_cents(69));
        let entry = done.cogs_entry.clone().unwrap();
        assert_eq!(entry.total_debits(), Money::from_cents(69));

        let again = ledger.complete_order(TENANT, &request, date()).await.unwrap();
        assert_eq!(again.report, done.report);
        assert_eq!(again.cogs_entry.unwrap().id, entry.id);

        let inventory = ledger.chart().account_by_number(TENANT, numbers::INVENTORY).await.unwrap().unwrap();
        let balance = ledger.chart().get_balance(&inventory.id, date()).await.unwrap();
        assert_eq!(balance.balance_cents, -69);
    }

    #[tokio::test]
    async fn test_open_rejects_invalid_config() {
        let mut config = LedgerConfig::in_memory();
        config.retry.max_attempts = 0;
        let err = Ledger::open(config).await.unwrap_err();
        assert!(matches!(err, LedgerError::InvalidConfig(_)));
    }
}
