//! # Costing Plan and Report
//!
//! The pure half of order costing. The engine in `cafe-ledger` loads recipes
//! and performs the stock deductions; everything it decides is decided here.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  OrderLineItem ×N                                                       │
//! │       │  recipe::resolve                                                │
//! │       ▼                                                                 │
//! │  ResolvedIngredient ×M  (recipe unit)                                   │
//! │       │  RequirementPlan::add   (units::convert to stocking unit)       │
//! │       ▼                                                                 │
//! │  RequirementPlan        one Requirement per raw item, net of the order │
//! │       │  StockRepository::adjust (engine, one per requirement)          │
//! │       ▼                                                                 │
//! │  CostingReport::record_deduction                                        │
//! │       ├── line cost = unit cost × quantity  (rounded to cents)          │
//! │       └── new quantity < 0 → Shortage + warning                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `success == false` means a shortage occurred. The order itself stands.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use ts_rs::TS;

use crate::money::{Money, UnitCost};
use crate::recipe::ResolvedIngredient;
use crate::types::{RawItem, StockAdjustment};
use crate::units::{self, ConversionOutcome};
use crate::QUANTITY_EPSILON;

// =============================================================================
// Requirement Plan
// =============================================================================

/// Net quantity of one raw item needed by the whole order, in its stocking
/// unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Requirement {
    pub raw_item_id: String,
    pub raw_item_name: String,
    pub unit: String,
    pub quantity: f64,
    pub unit_cost: UnitCost,
}

/// A recipe unit that could not be converted to the stocking unit.
#[derive(Debug, Clone, PartialEq)]
pub struct UnmatchedConversion {
    pub raw_item_id: String,
    pub from_unit: String,
    pub to_unit: String,
    pub quantity: f64,
}

/// Accumulates resolved ingredients into one requirement per raw item.
///
/// Backed by a `BTreeMap` so deductions always run in raw-item id order.
/// Two orders touching the same pair of items lock rows in the same order.
#[derive(Debug, Default)]
pub struct RequirementPlan {
    requirements: BTreeMap<String, Requirement>,
    unmatched: Vec<UnmatchedConversion>,
    warnings: Vec<String>,
    errors: Vec<String>,
}

impl RequirementPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one ingredient. `item` is the catalog row for
    /// `ingredient.raw_item_id`, or `None` if it no longer exists.
    pub fn add(&mut self, ingredient: &ResolvedIngredient, item: Option<&RawItem>) {
        let Some(item) = item else {
            self.warnings.push(format!(
                "Raw item {} not found; recipe line skipped",
                ingredient.raw_item_id
            ));
            return;
        };

        let conversion = units::convert(ingredient.quantity, &ingredient.unit, &item.unit);
        if conversion.outcome == ConversionOutcome::Unmatched {
            self.warnings.push(format!(
                "No conversion from '{}' to '{}' for {}; quantity used unconverted",
                ingredient.unit, item.unit, item.name
            ));
            self.unmatched.push(UnmatchedConversion {
                raw_item_id: item.id.clone(),
                from_unit: ingredient.unit.clone(),
                to_unit: item.unit.clone(),
                quantity: ingredient.quantity,
            });
        }

        if !conversion.quantity.is_finite() || conversion.quantity < 0.0 {
            self.errors.push(format!(
                "Requirement for {} is not a valid quantity ({}); skipped",
                item.name, conversion.quantity
            ));
            return;
        }

        self.requirements
            .entry(item.id.clone())
            .and_modify(|r| r.quantity += conversion.quantity)
            .or_insert_with(|| Requirement {
                raw_item_id: item.id.clone(),
                raw_item_name: item.name.clone(),
                unit: item.unit.clone(),
                quantity: conversion.quantity,
                unit_cost: item.unit_cost(),
            });
    }

    /// Records a data-inconsistency warning raised outside of `add`.
    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn requirements(&self) -> impl Iterator<Item = &Requirement> {
        self.requirements.values()
    }

    pub fn requirement(&self, raw_item_id: &str) -> Option<&Requirement> {
        self.requirements.get(raw_item_id)
    }

    pub fn unmatched(&self) -> &[UnmatchedConversion] {
        &self.unmatched
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    /// Starts a report carrying this plan's warnings and errors.
    pub fn into_report(
        self,
        order_id: impl Into<String>,
        branch_id: impl Into<String>,
    ) -> (Vec<Requirement>, CostingReport) {
        let mut report = CostingReport::new(order_id, branch_id);
        report.warnings = self.warnings;
        report.errors = self.errors;
        (self.requirements.into_values().collect(), report)
    }
}

// =============================================================================
// Costing Report
// =============================================================================

/// One raw item deducted for an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DeductionDetail {
    pub raw_item_id: String,
    pub raw_item_name: String,
    /// Stocking-unit quantity deducted.
    pub quantity: f64,
    pub unit: String,
    pub previous_quantity: f64,
    pub new_quantity: f64,
    pub unit_cost_millicents: i64,
    pub line_cost_cents: i64,
    pub movement_id: String,
}

/// A deduction that took on-hand stock below zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Shortage {
    pub raw_item_id: String,
    pub raw_item_name: String,
    pub required: f64,
    /// On hand before the deduction, floored at zero.
    pub available: f64,
}

/// Outcome of costing one order.
///
/// Stored as JSON on first costing and returned verbatim for every repeat
/// call with the same order id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CostingReport {
    pub order_id: String,
    pub branch_id: String,
    /// False when any shortage occurred.
    pub success: bool,
    pub cost_of_goods_cents: i64,
    pub deduction_details: Vec<DeductionDetail>,
    pub shortages: Vec<Shortage>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    #[ts(as = "String")]
    pub costed_at: DateTime<Utc>,
}

impl CostingReport {
    pub fn new(order_id: impl Into<String>, branch_id: impl Into<String>) -> Self {
        CostingReport {
            order_id: order_id.into(),
            branch_id: branch_id.into(),
            success: true,
            cost_of_goods_cents: 0,
            deduction_details: Vec::new(),
            shortages: Vec::new(),
            warnings: Vec::new(),
            errors: Vec::new(),
            costed_at: Utc::now(),
        }
    }

    /// Records a completed deduction, costing it and flagging a shortage if
    /// the stock went negative. Returns the shortage when one was recorded.
    pub fn record_deduction(
        &mut self,
        requirement: &Requirement,
        adjustment: &StockAdjustment,
    ) -> Option<&Shortage> {
        let line_cost = requirement.unit_cost.cost_of(requirement.quantity);
        self.cost_of_goods_cents += line_cost.cents();

        self.deduction_details.push(DeductionDetail {
            raw_item_id: requirement.raw_item_id.clone(),
            raw_item_name: requirement.raw_item_name.clone(),
            quantity: requirement.quantity,
            unit: requirement.unit.clone(),
            previous_quantity: adjustment.previous_quantity,
            new_quantity: adjustment.new_quantity,
            unit_cost_millicents: requirement.unit_cost.millicents(),
            line_cost_cents: line_cost.cents(),
            movement_id: adjustment.movement.id.clone(),
        });

        if adjustment.new_quantity >= -QUANTITY_EPSILON {
            return None;
        }

        let available = adjustment.previous_quantity.max(0.0);
        self.warnings.push(format!(
            "Shortage of {}: required {} {}, available {} {}",
            requirement.raw_item_name,
            requirement.quantity,
            requirement.unit,
            available,
            requirement.unit
        ));
        self.shortages.push(Shortage {
            raw_item_id: requirement.raw_item_id.clone(),
            raw_item_name: requirement.raw_item_name.clone(),
            required: requirement.quantity,
            available,
        });
        self.success = false;
        self.shortages.last()
    }

    #[inline]
    pub fn cost_of_goods(&self) -> Money {
        Money::from_cents(self.cost_of_goods_cents)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
