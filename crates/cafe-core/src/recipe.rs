//! # Recipe Resolver
//!
//! Expands one order line into the raw materials it consumes.
//!
//! ## Scaling Rules
//! ```text
//! base line   : recipe.quantity × line.quantity
//! add-on line : selected.quantity × addon_recipe.quantity × line.quantity
//! ```
//!
//! Each quantity is scaled exactly once here. The costing engine only
//! converts units and sums; it never multiplies by the line quantity again.
//!
//! A product with no recipe lines resolves to an empty list. That is a valid
//! product with no inventory impact (a service fee, a gift card).

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::types::{AddonRecipeLine, OrderLineItem, RecipeLine};

/// Where a resolved requirement came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IngredientSource {
    Product { product_id: String },
    Addon { addon_id: String },
}

/// One raw-material requirement in the recipe's own unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ResolvedIngredient {
    pub raw_item_id: String,
    pub quantity: f64,
    pub unit: String,
    pub source: IngredientSource,
}

/// Resolves an order line against the product's recipe and the recipes of
/// the add-ons selected on it.
///
/// `addon_lines` may contain lines for add-ons that were not selected; only
/// selected add-ons contribute.
pub fn resolve(
    line: &OrderLineItem,
    recipe_lines: &[RecipeLine],
    addon_lines: &[AddonRecipeLine],
) -> Vec<ResolvedIngredient> {
    let line_qty = line.quantity as f64;

    let base = recipe_lines
        .iter()
        .filter(|r| r.product_id == line.product_id)
        .map(|r| ResolvedIngredient {
            raw_item_id: r.raw_item_id.clone(),
            quantity: r.quantity * line_qty,
            unit: r.unit.clone(),
            source: IngredientSource::Product {
                product_id: line.product_id.clone(),
            },
        });

    let addons = line.addons.iter().flat_map(|selected| {
        addon_lines
            .iter()
            .filter(move |a| a.addon_id == selected.addon_id)
            .map(move |a| ResolvedIngredient {
                raw_item_id: a.raw_item_id.clone(),
                quantity: selected.quantity as f64 * a.quantity * line_qty,
                unit: a.unit.clone(),
                source: IngredientSource::Addon {
                    addon_id: selected.addon_id.clone(),
                },
            })
    });

    base.chain(addons).collect()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn recipe(product: &str, item: &str, qty: f64, unit: &str) -> RecipeLine {
        RecipeLine {
            id: format!("{}-{}", product, item),
            product_id: product.to_string(),
            raw_item_id: item.to_string(),
            quantity: qty,
            unit: unit.to_string(),
            note: None,
        }
    }

    fn addon(addon: &str, item: &str, qty: f64, unit: &str) -> AddonRecipeLine {
        AddonRecipeLine {
            id: format!("{}-{}", addon, item),
            addon_id: addon.to_string(),
            raw_item_id: item.to_string(),
            quantity: qty,
            unit: unit.to_string(),
            note: None,
        }
    }

    #[test]
    fn test_base_recipe_scales_with_line_quantity() {
        let lines = vec![recipe("latte", "beans", 18.0, "g"), recipe("latte", "milk", 200.0, "ml")];
        let resolved = resolve(&OrderLineItem::new("latte", 2), &lines, &[]);

        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[0].raw_item_id, "beans");
        assert_eq!(resolved[0].quantity, 36.0);
        assert_eq!(resolved[1].quantity, 400.0);
        assert_eq!(resolved[1].unit, "ml");
    }

    #[test]
    fn test_addon_scaled_once_by_line_quantity() {
        let addons = vec![addon("vanilla", "syrup", 15.0, "ml")];
        // 3 lattes, 2 pumps of vanilla each.
        let line = OrderLineItem::new("latte", 3).with_addon("vanilla", 2);
        let resolved = resolve(&line, &[], &addons);

        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].quantity, 2.0 * 15.0 * 3.0);
        assert_eq!(
            resolved[0].source,
            IngredientSource::Addon {
                addon_id: "vanilla".to_string()
            }
        );
    }

    #[test]
    fn test_unselected_addons_ignored() {
        let addons = vec![addon("vanilla", "syrup", 15.0, "ml"), addon("caramel", "caramel", 15.0, "ml")];
        let line = OrderLineItem::new("latte", 1).with_addon("caramel", 1);
        let resolved = resolve(&line, &[], &addons);

        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].raw_item_id, "caramel");
    }

    #[test]
    fn test_product_without_recipe_is_empty() {
        let resolved = resolve(&OrderLineItem::new("service-fee", 1), &[], &[]);
        assert!(resolved.is_empty());
    }

    #[test]
    fn test_other_products_lines_ignored() {
        let lines = vec![recipe("espresso", "beans", 18.0, "g"), recipe("tea", "leaves", 3.0, "g")];
        let resolved = resolve(&OrderLineItem::new("espresso", 1), &lines, &[]);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].raw_item_id, "beans");
    }
}
