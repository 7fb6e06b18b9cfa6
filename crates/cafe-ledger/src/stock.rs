//! # Branch Stock Ledger
//!
//! Validated, retried stock adjustments and branch-to-branch transfers on
//! top of the atomic `adjust_in` increment.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use cafe_core::validation::{validate_delta, validate_measure, validate_required};
use cafe_core::{BranchStock, MovementType, StockAdjustment, StockMovement, ValidationError};
use cafe_db::repository::stock;
use cafe_db::Database;

use crate::config::LedgerConfig;
use crate::error::LedgerResult;
use crate::retry::with_retry;

/// Both sides of a transfer, sharing one reference id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transfer {
    pub reference_id: String,
    pub outbound: StockAdjustment,
    pub inbound: StockAdjustment,
}

/// Branch stock service.
#[derive(Debug, Clone)]
pub struct StockLedger {
    db: Database,
    config: Arc<LedgerConfig>,
}

impl StockLedger {
    pub fn new(db: Database, config: Arc<LedgerConfig>) -> Self {
        StockLedger { db, config }
    }

    /// Applies one atomic adjustment and appends its movement.
    ///
    /// The ledger stores negative results as-is; whether that is a shortage
    /// is the caller's decision.
    pub async fn adjust(
        &self,
        branch_id: &str,
        raw_item_id: &str,
        delta: f64,
        movement_type: MovementType,
        reference_id: Option<&str>,
        actor: &str,
    ) -> LedgerResult<StockAdjustment> {
        validate_required("branch_id", branch_id)?;
        validate_required("raw_item_id", raw_item_id)?;
        validate_required("actor", actor)?;
        validate_delta(delta)?;

        let stock = self.db.stock();
        with_retry(&self.config.retry, "stock_adjust", || async {
            Ok(stock
                .adjust(branch_id, raw_item_id, delta, movement_type, reference_id, actor)
                .await?)
        })
        .await
    }

    /// Moves `quantity` of a raw item from one branch to another.
    ///
    /// Both movements commit together under a shared `transfer:` reference.
    pub async fn transfer(
        &self,
        from_branch: &str,
        to_branch: &str,
        raw_item_id: &str,
        quantity: f64,
        actor: &str,
    ) -> LedgerResult<Transfer> {
        validate_required("from_branch", from_branch)?;
        validate_required("to_branch", to_branch)?;
        validate_required("raw_item_id", raw_item_id)?;
        validate_measure("quantity", quantity)?;
        if from_branch == to_branch {
            return Err(ValidationError::InvalidFormat {
                field: "to_branch".to_string(),
                reason: "must differ from from_branch".to_string(),
            }
            .into());
        }

        let reference_id = format!("transfer:{}", Uuid::new_v4());
        let transfer = with_retry(&self.config.retry, "stock_transfer", || async {
            let mut tx = self.db.begin().await?;
            let outbound = stock::adjust_in(
                &mut tx,
                from_branch,
                raw_item_id,
                -quantity,
                MovementType::Transfer,
                Some(&reference_id),
                actor,
            )
            .await?;
            let inbound = stock::adjust_in(
                &mut tx,
                to_branch,
                raw_item_id,
                quantity,
                MovementType::Transfer,
                Some(&reference_id),
                actor,
            )
            .await?;
            tx.commit().await?;

            Ok(Transfer {
                reference_id: reference_id.clone(),
                outbound,
                inbound,
            })
        })
        .await?;

        info!(
            reference_id = %transfer.reference_id,
            from = %from_branch,
            to = %to_branch,
            raw_item_id = %raw_item_id,
            quantity,
            "Stock transferred"
        );
        Ok(transfer)
    }

    pub async fn get_stock(&self, branch_id: &str, raw_item_id: &str) -> LedgerResult<Option<BranchStock>> {
        Ok(self.db.stock().get(branch_id, raw_item_id).await?)
    }

    pub async fn set_min_stock_level(
        &self,
        branch_id: &str,
        raw_item_id: &str,
        min_stock_level: f64,
    ) -> LedgerResult<()> {
        if !min_stock_level.is_finite() || min_stock_level < 0.0 {
            return Err(ValidationError::InvalidFormat {
                field: "min_stock_level".to_string(),
                reason: "must be a finite, non-negative number".to_string(),
            }
            .into());
        }
        Ok(self
            .db
            .stock()
            .set_min_level(branch_id, raw_item_id, min_stock_level)
            .await?)
    }

    /// Items at or below their restock threshold, most depleted first.
    pub async fn low_stock(&self, branch_id: &str) -> LedgerResult<Vec<BranchStock>> {
        Ok(self.db.stock().low_stock(branch_id).await?)
    }

    pub async fn movements_for(&self, branch_id: &str, raw_item_id: &str) -> LedgerResult<Vec<StockMovement>> {
        Ok(self.db.stock().movements_for(branch_id, raw_item_id).await?)
    }

    pub async fn movements_by_reference(&self, reference_id: &str) -> LedgerResult<Vec<StockMovement>> {
        Ok(self.db.stock().movements_by_reference(reference_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LedgerError;
    use crate::test_support::{cafe_catalog, file_ledger, seeded_ledger, BRANCH};

    #[tokio::test]
    async fn test_adjust_records_movement() {
        let ledger = seeded_ledger().await;
        let cafe = cafe_catalog(&ledger).await;
        let stock = ledger.stock();

        let first = stock
            .adjust(BRANCH, &cafe.beans.id, 500.0, MovementType::Purchase, Some("PO-1"), "clerk")
            .await
            .unwrap();
        assert_eq!(first.previous_quantity, 0.0);
        assert_eq!(first.new_quantity, 500.0);

        let second = stock
            .adjust(BRANCH, &cafe.beans.id, -12.5, MovementType::Adjustment, None, "clerk")
            .await
            .unwrap();
        assert_eq!(second.previous_quantity, 500.0);
        assert_eq!(second.new_quantity, 487.5);

        let history = stock.movements_for(BRANCH, &cafe.beans.id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].reference_id.as_deref(), Some("PO-1"));
        assert_eq!(history[1].movement_type, MovementType::Adjustment);

        let err = stock
            .adjust(BRANCH, &cafe.beans.id, 0.0, MovementType::Adjustment, None, "clerk")
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }

    #[tokio::test]
    async fn test_transfer_moves_between_branches() {
        let ledger = seeded_ledger().await;
        let cafe = cafe_catalog(&ledger).await;
        let stock = ledger.stock();
        stock
            .adjust(BRANCH, &cafe.milk.id, 12.0, MovementType::Purchase, None, "clerk")
            .await
            .unwrap();

        let transfer = stock.transfer(BRANCH, "branch-2", &cafe.milk.id, 4.0, "clerk").await.unwrap();
        assert_eq!(transfer.outbound.new_quantity, 8.0);
        assert_eq!(transfer.inbound.new_quantity, 4.0);
        assert!(transfer.reference_id.starts_with("transfer:"));

        let moved = stock.movements_by_reference(&transfer.reference_id).await.unwrap();
        assert_eq!(moved.len(), 2);
        assert!(moved.iter().all(|m| m.movement_type == MovementType::Transfer));

        assert!(stock.transfer(BRANCH, BRANCH, &cafe.milk.id, 1.0, "clerk").await.is_err());
    }

    #[tokio::test]
    async fn test_low_stock_report() {
        let ledger = seeded_ledger().await;
        let cafe = cafe_catalog(&ledger).await;
        let stock = ledger.stock();

        stock
            .adjust(BRANCH, &cafe.beans.id, 300.0, MovementType::Purchase, None, "clerk")
            .await
            .unwrap();
        stock
            .adjust(BRANCH, &cafe.milk.id, 20.0, MovementType::Purchase, None, "clerk")
            .await
            .unwrap();
        stock.set_min_stock_level(BRANCH, &cafe.beans.id, 500.0).await.unwrap();
        stock.set_min_stock_level(BRANCH, &cafe.milk.id, 5.0).await.unwrap();

        let low = stock.low_stock(BRANCH).await.unwrap();
        assert_eq!(low.len(), 1);
        assert_eq!(low[0].raw_item_id, cafe.beans.id);
        assert!(low[0].is_low());

        assert!(stock.set_min_stock_level(BRANCH, &cafe.milk.id, -1.0).await.is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_adjustments_are_atomic() {
        let (ledger, _dir) = file_ledger().await;
        let cafe = cafe_catalog(&ledger).await;

        let mut handles = Vec::new();
        for _ in 0..40 {
            let stock = ledger.stock();
            let item = cafe.beans.id.clone();
            handles.push(tokio::spawn(async move {
                stock
                    .adjust(BRANCH, &item, -1.5, MovementType::Deduction, None, "pos")
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let quantity = ledger.database().stock().quantity(BRANCH, &cafe.beans.id).await.unwrap();
        assert!((quantity + 60.0).abs() < 1e-9);

        let history = ledger.stock().movements_for(BRANCH, &cafe.beans.id).await.unwrap();
        assert_eq!(history.len(), 40);
        // No two movements saw the same starting quantity.
        let mut starts: Vec<i64> = history.iter().map(|m| (m.previous_quantity * 10.0).round() as i64).collect();
        starts.sort();
        starts.dedup();
        assert_eq!(starts.len(), 40);
    }
}
