//! # Costing Engine
//!
//! Deducts branch stock for an order and computes its cost of goods.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         cost_order(request)                             │
//! │                                                                         │
//! │  validate lines (no I/O yet)                                            │
//! │       │                                                                 │
//! │  BEGIN ▼                                                                │
//! │  claim(order_id) ── already claimed ──► stored report, unchanged       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  resolve recipes ──► convert units ──► RequirementPlan (one per item)  │
//! │       │                 unmatched: warn, or abort in strict mode        │
//! │       ▼                                                                 │
//! │  for each requirement (raw item id order):                              │
//! │       adjust_in(-qty, deduction) ──► record cost, flag shortage         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  store report ──► COMMIT                                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The claim, every deduction and the stored report commit together, so a
//! rolled-back attempt leaves neither a claim nor a movement behind and the
//! whole attempt can be retried on a store conflict.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use cafe_core::costing::{CostingReport, RequirementPlan};
use cafe_core::recipe::IngredientSource;
use cafe_core::validation::{validate_order_lines, validate_required};
use cafe_core::{MovementType, OrderLineItem, RawItem, QUANTITY_EPSILON};
use cafe_db::repository::{catalog, costing, stock};
use cafe_db::{Database, DbError};

use crate::config::LedgerConfig;
use crate::error::{LedgerError, LedgerResult};
use crate::recipe::RecipeResolver;
use crate::retry::with_retry;

/// An order handed over by the order lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostOrderRequest {
    pub order_id: String,
    pub branch_id: String,
    pub line_items: Vec<OrderLineItem>,
    pub actor: String,
}

impl CostOrderRequest {
    pub fn new(order_id: impl Into<String>, branch_id: impl Into<String>, actor: impl Into<String>) -> Self {
        CostOrderRequest {
            order_id: order_id.into(),
            branch_id: branch_id.into(),
            line_items: Vec::new(),
            actor: actor.into(),
        }
    }

    pub fn line(mut self, line: OrderLineItem) -> Self {
        self.line_items.push(line);
        self
    }
}

/// Costing service.
#[derive(Debug, Clone)]
pub struct CostingEngine {
    db: Database,
    config: Arc<LedgerConfig>,
}

impl CostingEngine {
    pub fn new(db: Database, config: Arc<LedgerConfig>) -> Self {
        CostingEngine { db, config }
    }

    /// Costs an order at most once.
    ///
    /// Repeat calls for the same order return the first report unchanged
    /// and move no stock. `success = false` means a shortage occurred; the
    /// order is still served.
    pub async fn cost_order(&self, request: &CostOrderRequest) -> LedgerResult<CostingReport> {
        validate_required("order_id", &request.order_id)?;
        validate_required("branch_id", &request.branch_id)?;
        validate_required("actor", &request.actor)?;
        validate_order_lines(&request.line_items)?;

        with_retry(&self.config.retry, "cost_order", || self.try_cost_order(request)).await
    }

    /// The stored report of an already-costed order.
    pub async fn report(&self, order_id: &str) -> LedgerResult<Option<CostingReport>> {
        Ok(self.db.costings().get_report(order_id).await?)
    }

    async fn try_cost_order(&self, request: &CostOrderRequest) -> LedgerResult<CostingReport> {
        let mut tx = self.db.begin().await?;

        if !costing::claim(&mut tx, &request.order_id, &request.branch_id, &request.actor).await? {
            let report = costing::stored_report(&mut tx, &request.order_id)
                .await?
                .ok_or_else(|| {
                    DbError::Internal(format!("order {} claimed without a report", request.order_id))
                })?;
            tx.commit().await?;
            debug!(order_id = %request.order_id, "Order already costed");
            return Ok(report);
        }

        // ---------------------------------------------------------------------
        // 1. Resolve recipes and accumulate one requirement per raw item
        // ---------------------------------------------------------------------
        let mut resolved = Vec::new();
        let mut plan = RequirementPlan::new();
        for line in &request.line_items {
            let ingredients = RecipeResolver::resolve(&mut tx, line).await?;
            let has_recipe = ingredients
                .iter()
                .any(|i| matches!(i.source, IngredientSource::Product { .. }));
            if !has_recipe {
                warn!(
                    order_id = %request.order_id,
                    product_id = %line.product_id,
                    "Product has no recipe lines; no stock impact"
                );
                plan.warn(format!("Product {} has no recipe lines", line.product_id));
            }
            resolved.extend(ingredients);
        }

        let mut ids: Vec<String> = resolved.iter().map(|i| i.raw_item_id.clone()).collect();
        ids.sort();
        ids.dedup();
        let items: HashMap<String, RawItem> = catalog::raw_items_by_ids(&mut tx, &ids)
            .await?
            .into_iter()
            .map(|item| (item.id.clone(), item))
            .collect();

        for ingredient in &resolved {
            let item = items.get(&ingredient.raw_item_id);
            if item.is_none() {
                warn!(
                    order_id = %request.order_id,
                    raw_item_id = %ingredient.raw_item_id,
                    "Raw item referenced by recipe not found; line skipped"
                );
            }
            plan.add(ingredient, item);
        }

        for unmatched in plan.unmatched() {
            warn!(
                order_id = %request.order_id,
                raw_item_id = %unmatched.raw_item_id,
                from_unit = %unmatched.from_unit,
                to_unit = %unmatched.to_unit,
                quantity = unmatched.quantity,
                "Unmatched unit conversion; quantity used unconverted"
            );
        }

        if self.config.costing.strict_units {
            if let Some(unmatched) = plan.unmatched().first() {
                // Dropping the transaction rolls back the claim.
                return Err(LedgerError::UnmatchedUnit {
                    raw_item_id: unmatched.raw_item_id.clone(),
                    from_unit: unmatched.from_unit.clone(),
                    to_unit: unmatched.to_unit.clone(),
                });
            }
        }

        // ---------------------------------------------------------------------
        // 2. Deduct and cost
        // ---------------------------------------------------------------------
        let (requirements, mut report) = plan.into_report(&request.order_id, &request.branch_id);
        for requirement in &requirements {
            if requirement.quantity <= QUANTITY_EPSILON {
                continue;
            }

            let adjustment = stock::adjust_in(
                &mut tx,
                &request.branch_id,
                &requirement.raw_item_id,
                -requirement.quantity,
                MovementType::Deduction,
                Some(&request.order_id),
                &request.actor,
            )
            .await?;

            if let Some(shortage) = report.record_deduction(requirement, &adjustment) {
                warn!(
                    order_id = %request.order_id,
                    branch_id = %request.branch_id,
                    raw_item_id = %shortage.raw_item_id,
                    required = shortage.required,
                    available = shortage.available,
                    "Stock shortage"
                );
            }
        }

        costing::store_report(&mut tx, &report).await?;
        tx.commit().await?;

        info!(
            order_id = %report.order_id,
            branch_id = %report.branch_id,
            cogs_cents = report.cost_of_goods_cents,
            deductions = report.deduction_details.len(),
            shortages = report.shortages.len(),
            "Order costed"
        );
        Ok(report)
    }
}
