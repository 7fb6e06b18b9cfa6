//! # Automatic Postings
//!
//! Journal entries the order lifecycle triggers, each keyed by its business
//! reference so retried calls never double-post.
//!
//! | Event        | Key                        | Lines                               |
//! |--------------|----------------------------|-------------------------------------|
//! | order costed | `('order_cogs', order_id)` | Dr COGS / Cr Inventory              |
//! | order sold   | `('order_sale', order_id)` | Dr Cash / Cr Sales, Cr VAT payable  |

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use cafe_core::costing::CostingReport;
use cafe_core::journal::{NewJournalEntry, NewJournalLine};
use cafe_core::types::reference;
use cafe_core::validation::{validate_price_cents, validate_required};
use cafe_core::{JournalEntry, Money};
use cafe_db::Database;

use crate::chart::resolve_account;
use crate::config::LedgerConfig;
use crate::error::LedgerResult;
use crate::journal::post_if_absent_in;
use crate::retry::with_retry;

/// A completed sale to recognise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSale {
    pub tenant_id: String,
    pub order_id: String,
    pub branch_id: String,
    pub entry_date: NaiveDate,
    /// Sales amount before VAT.
    pub net_cents: i64,
    pub vat_cents: i64,
    pub actor: String,
}

/// Automatic posting service.
#[derive(Debug, Clone)]
pub struct Postings {
    db: Database,
    config: Arc<LedgerConfig>,
}

impl Postings {
    pub fn new(db: Database, config: Arc<LedgerConfig>) -> Self {
        Postings { db, config }
    }

    /// Posts the cost of goods of a costed order. A zero-cost order posts
    /// nothing and returns `None`.
    pub async fn post_order_cogs(
        &self,
        tenant_id: &str,
        report: &CostingReport,
        entry_date: NaiveDate,
        actor: &str,
    ) -> LedgerResult<Option<JournalEntry>> {
        validate_required("tenant_id", tenant_id)?;
        validate_required("actor", actor)?;

        let cogs = report.cost_of_goods();
        if !cogs.is_positive() {
            debug!(order_id = %report.order_id, "Zero cost of goods; nothing to post");
            return Ok(None);
        }

        let accounts = &self.config.accounts;
        let entry = with_retry(&self.config.retry, "post_order_cogs", || async {
            let mut tx = self.db.begin().await?;
            let cogs_account = resolve_account(&mut tx, tenant_id, &accounts.cogs).await?;
            let inventory = resolve_account(&mut tx, tenant_id, &accounts.inventory).await?;

            let (entry, _) = post_if_absent_in(
                &mut tx,
                tenant_id,
                reference::ORDER_COGS,
                &report.order_id,
                actor,
                || {
                    NewJournalEntry::new(
                        tenant_id,
                        entry_date,
                        format!("Cost of goods for order {}", report.order_id),
                        actor,
                    )
                    .line(NewJournalLine::debit(&cogs_account, cogs))
                    .line(NewJournalLine::credit(&inventory, cogs))
                    .for_branch(&report.branch_id)
                },
            )
            .await?;
            tx.commit().await?;
            Ok(entry)
        })
        .await?;

        Ok(Some(entry))
    }

    /// Recognises a sale: Dr Cash for the gross, Cr Sales for the net, Cr
    /// VAT payable for the tax when there is any.
    pub async fn post_order_sale(&self, sale: &OrderSale) -> LedgerResult<JournalEntry> {
        validate_required("tenant_id", &sale.tenant_id)?;
        validate_required("order_id", &sale.order_id)?;
        validate_required("actor", &sale.actor)?;
        validate_price_cents("net_cents", sale.net_cents)?;
        validate_price_cents("vat_cents", sale.vat_cents)?;

        let net = Money::from_cents(sale.net_cents);
        let vat = Money::from_cents(sale.vat_cents);
        let gross = net + vat;
        let accounts = &self.config.accounts;

        with_retry(&self.config.retry, "post_order_sale", || async {
            let mut tx = self.db.begin().await?;
            let cash = resolve_account(&mut tx, &sale.tenant_id, &accounts.cash).await?;
            let sales = resolve_account(&mut tx, &sale.tenant_id, &accounts.sales).await?;
            let vat_payable = resolve_account(&mut tx, &sale.tenant_id, &accounts.vat_payable).await?;

            let (entry, _) = post_if_absent_in(
                &mut tx,
                &sale.tenant_id,
                reference::ORDER_SALE,
                &sale.order_id,
                &sale.actor,
                || {
                    NewJournalEntry::new(
                        &sale.tenant_id,
                        sale.entry_date,
                        format!("Sale for order {}", sale.order_id),
                        &sale.actor,
                    )
                    .line(NewJournalLine::debit(&cash, gross))
                    .line(NewJournalLine::credit(&sales, net))
                    .line_if_nonzero(NewJournalLine::credit(&vat_payable, vat))
                    .for_branch(&sale.branch_id)
                },
            )
            .await?;
            tx.commit().await?;
            Ok(entry)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LedgerError;
    use crate::test_support::{seeded_ledger, BRANCH, TENANT};
    use cafe_core::chart::numbers;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()
    }

    fn costed(order_id: &str, cogs_cents: i64) -> CostingReport {
        let mut report = CostingReport::new(order_id, BRANCH);
        report.cost_of_goods_cents = cogs_cents;
        report
    }

    #[tokio::test]
    async fn test_order_cogs_posts_once() {
        let ledger = seeded_ledger().await;
        let postings = ledger.postings();
        let report = costed("O1", 45);

        let first = postings.post_order_cogs(TENANT, &report, date(), "pos").await.unwrap().unwrap();
        let second = postings.post_order_cogs(TENANT, &report, date(), "pos").await.unwrap().unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.total_debits(), Money::from_cents(45));
        assert!(first.lines.iter().all(|l| l.branch_id.as_deref() == Some(BRANCH)));

        let cogs = ledger.chart().account_by_number(TENANT, numbers::COGS).await.unwrap().unwrap();
        let balance = ledger.chart().get_balance(&cogs.id, date()).await.unwrap();
        assert_eq!(balance.balance_cents, 45);
    }

    #[tokio::test]
    async fn test_zero_cogs_posts_nothing() {
        let ledger = seeded_ledger().await;
        let entry = ledger
            .postings()
            .post_order_cogs(TENANT, &costed("O0", 0), date(), "pos")
            .await
            .unwrap();
        assert!(entry.is_none());
    }

    #[tokio::test]
    async fn test_order_sale_splits_vat() {
        let ledger = seeded_ledger().await;
        let sale = OrderSale {
            tenant_id: TENANT.to_string(),
            order_id: "O9".to_string(),
            branch_id: BRANCH.to_string(),
            entry_date: date(),
            net_cents: 1_000,
            vat_cents: 140,
            actor: "pos".to_string(),
        };
        let entry = ledger.postings().post_order_sale(&sale).await.unwrap();
        assert_eq!(entry.lines.len(), 3);
        assert_eq!(entry.total_debits(), Money::from_cents(1_140));
        assert_eq!(entry.total_credits(), Money::from_cents(1_140));

        let untaxed = OrderSale {
            order_id: "O10".to_string(),
            vat_cents: 0,
            ..sale
        };
        let entry = ledger.postings().post_order_sale(&untaxed).await.unwrap();
        assert_eq!(entry.lines.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_account_is_config_error() {
        let ledger = seeded_ledger().await;
        let err = ledger
            .postings()
            .post_order_cogs("unseeded-tenant", &costed("O1", 45), date(), "pos")
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::AccountNotConfigured { .. }));
        assert!(err.is_config_error());
    }
}
