//! # Purchasing Receipts
//!
//! Receives supplier deliveries into branch stock and books them.
//!
//! ```text
//!   receive_purchase(receipt)
//!     BEGIN
//!       ('purchase', reference) already posted? ──► return it, no stock moved
//!       per line: convert to stocking unit ──► adjust_in(+qty, purchase)
//!                 update unit cost (optional)
//!       post Dr Inventory, Dr VAT receivable / Cr Payable (or Cash)
//!     COMMIT
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use cafe_core::journal::{NewJournalEntry, NewJournalLine};
use cafe_core::types::reference;
use cafe_core::units::convert;
use cafe_core::validation::{
    validate_amount_cents, validate_measure, validate_price_cents, validate_reference, validate_required,
    validate_unit,
};
use cafe_core::{JournalEntry, Money, MovementType, StockAdjustment, UnitCost, ValidationError};
use cafe_db::repository::{catalog, journal, stock};
use cafe_db::Database;

use crate::chart::resolve_account;
use crate::config::LedgerConfig;
use crate::error::{LedgerError, LedgerResult};
use crate::journal::post_if_absent_in;
use crate::retry::with_retry;

/// One delivered raw item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseLine {
    pub raw_item_id: String,
    /// Delivered quantity in `unit`, converted to the stocking unit on receipt.
    pub quantity: f64,
    pub unit: String,
    /// Net cost of the whole line.
    pub total_cost_cents: i64,
}

/// How the supplier is settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Settlement {
    /// On account: credits Accounts Payable.
    #[default]
    Payable,
    /// Paid on delivery: credits Cash.
    Cash,
}

/// A supplier delivery to one branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseReceipt {
    pub tenant_id: String,
    pub branch_id: String,
    /// Supplier invoice or delivery note number. Idempotency key.
    pub reference: String,
    pub entry_date: NaiveDate,
    pub lines: Vec<PurchaseLine>,
    pub vat_cents: i64,
    pub settlement: Settlement,
    pub actor: String,
}

/// Outcome of a receipt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseResult {
    pub entry: JournalEntry,
    pub adjustments: Vec<StockAdjustment>,
    /// True when the reference had already been received: nothing moved.
    pub already_recorded: bool,
    pub warnings: Vec<String>,
}

/// Purchase receipt service.
#[derive(Debug, Clone)]
pub struct Purchasing {
    db: Database,
    config: Arc<LedgerConfig>,
}

impl Purchasing {
    pub fn new(db: Database, config: Arc<LedgerConfig>) -> Self {
        Purchasing { db, config }
    }

    /// Receives a delivery at most once per reference.
    pub async fn receive_purchase(&self, receipt: &PurchaseReceipt) -> LedgerResult<PurchaseResult> {
        validate_required("tenant_id", &receipt.tenant_id)?;
        validate_required("branch_id", &receipt.branch_id)?;
        validate_required("actor", &receipt.actor)?;
        validate_reference(reference::PURCHASE, &receipt.reference)?;
        validate_price_cents("vat_cents", receipt.vat_cents)?;
        if receipt.lines.is_empty() {
            return Err(ValidationError::Required {
                field: "lines".to_string(),
            }
            .into());
        }
        for line in &receipt.lines {
            validate_required("raw_item_id", &line.raw_item_id)?;
            validate_measure("quantity", line.quantity)?;
            validate_unit(&line.unit)?;
            validate_price_cents("total_cost_cents", line.total_cost_cents)?;
        }
        let total: i64 = receipt.lines.iter().map(|l| l.total_cost_cents).sum();
        validate_amount_cents("purchase total", total + receipt.vat_cents)?;

        with_retry(&self.config.retry, "receive_purchase", || self.try_receive(receipt)).await
    }

    async fn try_receive(&self, receipt: &PurchaseReceipt) -> LedgerResult<PurchaseResult> {
        let mut tx = self.db.begin().await?;

        if let Some(entry) =
            journal::find_live_by_reference(&mut tx, &receipt.tenant_id, reference::PURCHASE, &receipt.reference)
                .await?
        {
            tx.commit().await?;
            return Ok(PurchaseResult {
                entry,
                adjustments: Vec::new(),
                already_recorded: true,
                warnings: Vec::new(),
            });
        }

        let mut adjustments = Vec::with_capacity(receipt.lines.len());
        let mut warnings = Vec::new();
        let mut inventory_total = Money::zero();

        for line in &receipt.lines {
            let item = catalog::raw_items_by_ids(&mut tx, std::slice::from_ref(&line.raw_item_id))
                .await?
                .into_iter()
                .find(|item| item.tenant_id == receipt.tenant_id)
                .ok_or_else(|| LedgerError::not_found("Raw item", &line.raw_item_id))?;

            let conversion = convert(line.quantity, &line.unit, &item.unit);
            if conversion.is_unmatched() {
                if self.config.costing.strict_units {
                    return Err(LedgerError::UnmatchedUnit {
                        raw_item_id: item.id,
                        from_unit: line.unit.clone(),
                        to_unit: item.unit,
                    });
                }
                warn!(
                    reference = %receipt.reference,
                    raw_item_id = %item.id,
                    from_unit = %line.unit,
                    to_unit = %item.unit,
                    "Unmatched unit conversion on receipt; quantity used unconverted"
                );
                warnings.push(format!(
                    "No conversion from '{}' to '{}' for {}; quantity used unconverted",
                    line.unit, item.unit, item.name
                ));
            }

            let adjustment = stock::adjust_in(
                &mut tx,
                &receipt.branch_id,
                &item.id,
                conversion.quantity,
                MovementType::Purchase,
                Some(&receipt.reference),
                &receipt.actor,
            )
            .await?;
            adjustments.push(adjustment);

            let line_cost = Money::from_cents(line.total_cost_cents);
            inventory_total += line_cost;
            // An unconverted quantity is not in the stocking unit.
            if self.config.costing.update_unit_cost_on_purchase && !conversion.is_unmatched() {
                if let Some(cost) = UnitCost::from_purchase(line_cost, conversion.quantity) {
                    catalog::set_unit_cost(&mut tx, &item.id, cost.millicents()).await?;
                }
            }
        }

        let accounts = &self.config.accounts;
        let tenant = receipt.tenant_id.as_str();
        let inventory = resolve_account(&mut tx, tenant, &accounts.inventory).await?;
        let vat_receivable = resolve_account(&mut tx, tenant, &accounts.vat_receivable).await?;
        let credit_number = match receipt.settlement {
            Settlement::Payable => &accounts.payable,
            Settlement::Cash => &accounts.cash,
        };
        let credit_account = resolve_account(&mut tx, tenant, credit_number).await?;
        let vat = Money::from_cents(receipt.vat_cents);

        let (entry, _) = post_if_absent_in(
            &mut tx,
            tenant,
            reference::PURCHASE,
            &receipt.reference,
            &receipt.actor,
            || {
                NewJournalEntry::new(
                    tenant,
                    receipt.entry_date,
                    format!("Purchase {}", receipt.reference),
                    &receipt.actor,
                )
                .line_if_nonzero(NewJournalLine::debit(&inventory, inventory_total))
                .line_if_nonzero(NewJournalLine::debit(&vat_receivable, vat))
                .line(NewJournalLine::credit(&credit_account, inventory_total + vat))
                .for_branch(&receipt.branch_id)
            },
        )
        .await?;
        tx.commit().await?;

        info!(
            reference = %receipt.reference,
            branch_id = %receipt.branch_id,
            lines = adjustments.len(),
            amount_cents = (inventory_total + vat).cents(),
            "Purchase received"
        );
        Ok(PurchaseResult {
            entry,
            adjustments,
            already_recorded: false,
            warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LedgerConfig;
    use crate::test_support::{cafe_catalog, seeded_ledger, BRANCH, TENANT};
    use crate::Ledger;
    use cafe_core::chart::numbers;

    fn receipt(reference: &str, lines: Vec<PurchaseLine>) -> PurchaseReceipt {
        PurchaseReceipt {
            tenant_id: TENANT.to_string(),
            branch_id: BRANCH.to_string(),
            reference: reference.to_string(),
            entry_date: NaiveDate::from_ymd_opt(2024, 6, 2).unwrap(),
            lines,
            vat_cents: 350,
            settlement: Settlement::Payable,
            actor: "clerk".to_string(),
        }
    }

    #[tokio::test]
    async fn test_receipt_stocks_costs_and_posts_once() {
        let ledger = seeded_ledger().await;
        let cafe = cafe_catalog(&ledger).await;
        let delivery = receipt(
            "SUP-100",
            vec![PurchaseLine {
                raw_item_id: cafe.beans.id.clone(),
                quantity: 2.0,
                unit: "kg".to_string(),
                total_cost_cents: 6_000,
            }],
        );

        let result = ledger.purchasing().receive_purchase(&delivery).await.unwrap();
        assert!(!result.already_recorded);
        assert_eq!(result.adjustments.len(), 1);
        assert_eq!(result.adjustments[0].new_quantity, 2_000.0);
        assert_eq!(result.entry.total_debits(), Money::from_cents(6_350));

        // 6000 cents over 2000 g
        let beans = ledger.database().catalog().get_raw_item(&cafe.beans.id).await.unwrap().unwrap();
        assert_eq!(beans.unit_cost_millicents, 3_000);

        let again = ledger.purchasing().receive_purchase(&delivery).await.unwrap();
        assert!(again.already_recorded);
        assert_eq!(again.entry.id, result.entry.id);
        let on_hand = ledger.database().stock().quantity(BRANCH, &cafe.beans.id).await.unwrap();
        assert_eq!(on_hand, 2_000.0);

        let payable = ledger
            .chart()
            .account_by_number(TENANT, numbers::ACCOUNTS_PAYABLE)
            .await
            .unwrap()
            .unwrap();
        let balance = ledger.chart().get_balance(&payable.id, delivery.entry_date).await.unwrap();
        assert_eq!(balance.balance_cents, 6_350);
    }

    #[tokio::test]
    async fn test_unknown_raw_item_rolls_back() {
        let ledger = seeded_ledger().await;
        let cafe = cafe_catalog(&ledger).await;
        let delivery = receipt(
            "SUP-101",
            vec![
                PurchaseLine {
                    raw_item_id: cafe.milk.id.clone(),
                    quantity: 10.0,
                    unit: "l".to_string(),
                    total_cost_cents: 1_200,
                },
                PurchaseLine {
                    raw_item_id: "missing".to_string(),
                    quantity: 1.0,
                    unit: "g".to_string(),
                    total_cost_cents: 10,
                },
            ],
        );

        let err = ledger.purchasing().receive_purchase(&delivery).await.unwrap_err();
        assert!(matches!(err, LedgerError::NotFound { .. }));
        let on_hand = ledger.database().stock().quantity(BRANCH, &cafe.milk.id).await.unwrap();
        assert_eq!(on_hand, 0.0);
    }

    #[tokio::test]
    async fn test_cash_settlement_and_unit_warning() {
        let mut config = LedgerConfig::in_memory();
        config.costing.update_unit_cost_on_purchase = false;
        let ledger = Ledger::open(config).await.unwrap();
        ledger.chart().seed_default_chart(TENANT).await.unwrap();
        let cafe = cafe_catalog(&ledger).await;

        let mut delivery = receipt(
            "SUP-102",
            vec![PurchaseLine {
                raw_item_id: cafe.syrup.id.clone(),
                quantity: 3.0,
                unit: "bottle".to_string(),
                total_cost_cents: 2_400,
            }],
        );
        delivery.settlement = Settlement::Cash;
        delivery.vat_cents = 0;

        let result = ledger.purchasing().receive_purchase(&delivery).await.unwrap();
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.entry.lines.len(), 2);

        let syrup = ledger.database().catalog().get_raw_item(&cafe.syrup.id).await.unwrap().unwrap();
        assert_eq!(syrup.unit_cost_millicents, cafe.syrup.unit_cost_millicents);

        let cash = ledger.chart().account_by_number(TENANT, numbers::CASH).await.unwrap().unwrap();
        let balance = ledger.chart().get_balance(&cash.id, delivery.entry_date).await.unwrap();
        assert_eq!(balance.balance_cents, -2_400);
    }

    #[tokio::test]
    async fn test_unmatched_unit_keeps_unit_cost() {
        let ledger = seeded_ledger().await;
        assert!(ledger.config().costing.update_unit_cost_on_purchase);
        let cafe = cafe_catalog(&ledger).await;

        let delivery = receipt(
            "SUP-103",
            vec![PurchaseLine {
                raw_item_id: cafe.syrup.id.clone(),
                quantity: 3.0,
                unit: "bottle".to_string(),
                total_cost_cents: 2_400,
            }],
        );
        let result = ledger.purchasing().receive_purchase(&delivery).await.unwrap();
        assert_eq!(result.warnings.len(), 1);

        let syrup = ledger.database().catalog().get_raw_item(&cafe.syrup.id).await.unwrap().unwrap();
        assert_eq!(syrup.unit_cost_millicents, 1_500);
    }
}
