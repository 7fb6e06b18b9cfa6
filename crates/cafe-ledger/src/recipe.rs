//! # Recipes
//!
//! Loads recipe lines from the catalog for costing, and the validated
//! management operations behind them.

use sqlx::SqliteConnection;
use tracing::info;

use cafe_core::recipe::{resolve, ResolvedIngredient};
use cafe_core::validation::{
    validate_measure, validate_name, validate_price_cents, validate_required, validate_tax_rate_bps,
    validate_unit,
};
use cafe_core::{Addon, AddonRecipeLine, OrderLineItem, Product, RawItem, RawItemCategory, RecipeLine};
use cafe_db::repository::catalog;
use cafe_db::Database;

use crate::error::{LedgerError, LedgerResult};

/// Resolves order lines against the recipes stored in the catalog.
pub struct RecipeResolver;

impl RecipeResolver {
    /// Raw-material requirements of one order line in recipe units.
    ///
    /// A product without recipe lines resolves to nothing. Only add-ons
    /// selected on the line are loaded.
    pub async fn resolve(
        conn: &mut SqliteConnection,
        line: &OrderLineItem,
    ) -> LedgerResult<Vec<ResolvedIngredient>> {
        let recipe_lines = catalog::recipe_lines_for(&mut *conn, &line.product_id).await?;

        let mut addon_ids: Vec<String> = line.addons.iter().map(|a| a.addon_id.clone()).collect();
        addon_ids.sort();
        addon_ids.dedup();
        let addon_lines = catalog::addon_recipe_lines_for(&mut *conn, &addon_ids).await?;

        Ok(resolve(line, &recipe_lines, &addon_lines))
    }
}

/// Catalog management: raw items, products, add-ons and their recipes.
#[derive(Debug, Clone)]
pub struct RecipeBook {
    db: Database,
}

impl RecipeBook {
    pub fn new(db: Database) -> Self {
        RecipeBook { db }
    }

    pub async fn create_raw_item(
        &self,
        tenant_id: &str,
        name: &str,
        unit: &str,
        unit_cost_millicents: i64,
        category: RawItemCategory,
    ) -> LedgerResult<RawItem> {
        validate_required("tenant_id", tenant_id)?;
        validate_name("name", name, 200)?;
        validate_unit(unit)?;
        validate_price_cents("unit_cost_millicents", unit_cost_millicents)?;

        let item = self
            .db
            .catalog()
            .create_raw_item(tenant_id, name, unit, unit_cost_millicents, category)
            .await?;
        info!(raw_item_id = %item.id, name = %item.name, unit = %item.unit, "Raw item created");
        Ok(item)
    }

    pub async fn create_product(
        &self,
        tenant_id: &str,
        name: &str,
        price_cents: i64,
        tax_rate_bps: u32,
    ) -> LedgerResult<Product> {
        validate_required("tenant_id", tenant_id)?;
        validate_name("name", name, 200)?;
        validate_price_cents("price_cents", price_cents)?;
        validate_tax_rate_bps(tax_rate_bps)?;

        Ok(self
            .db
            .catalog()
            .create_product(tenant_id, name, price_cents, tax_rate_bps)
            .await?)
    }

    pub async fn create_addon(&self, tenant_id: &str, name: &str, price_cents: i64) -> LedgerResult<Addon> {
        validate_required("tenant_id", tenant_id)?;
        validate_name("name", name, 200)?;
        validate_price_cents("price_cents", price_cents)?;

        Ok(self.db.catalog().create_addon(tenant_id, name, price_cents).await?)
    }

    /// Adds one unit's consumption of a raw item to a product recipe.
    pub async fn add_recipe_line(
        &self,
        product_id: &str,
        raw_item_id: &str,
        quantity: f64,
        unit: &str,
        note: Option<&str>,
    ) -> LedgerResult<RecipeLine> {
        validate_measure("quantity", quantity)?;
        validate_unit(unit)?;

        let catalog = self.db.catalog();
        if catalog.get_product(product_id).await?.is_none() {
            return Err(LedgerError::not_found("Product", product_id));
        }
        if catalog.get_raw_item(raw_item_id).await?.is_none() {
            return Err(LedgerError::not_found("Raw item", raw_item_id));
        }

        Ok(catalog
            .add_recipe_line(product_id, raw_item_id, quantity, unit, note)
            .await?)
    }

    /// Adds one add-on unit's consumption of a raw item.
    pub async fn add_addon_recipe_line(
        &self,
        addon_id: &str,
        raw_item_id: &str,
        quantity: f64,
        unit: &str,
        note: Option<&str>,
    ) -> LedgerResult<AddonRecipeLine> {
        validate_measure("quantity", quantity)?;
        validate_unit(unit)?;

        let catalog = self.db.catalog();
        if catalog.get_addon(addon_id).await?.is_none() {
            return Err(LedgerError::not_found("Add-on", addon_id));
        }
        if catalog.get_raw_item(raw_item_id).await?.is_none() {
            return Err(LedgerError::not_found("Raw item", raw_item_id));
        }

        Ok(catalog
            .add_addon_recipe_line(addon_id, raw_item_id, quantity, unit, note)
            .await?)
    }

    pub async fn recipe_for(&self, product_id: &str) -> LedgerResult<Vec<RecipeLine>> {
        Ok(self.db.catalog().recipe_lines(product_id).await?)
    }

    /// Deletes a product and its recipe lines.
    pub async fn delete_product(&self, product_id: &str) -> LedgerResult<()> {
        self.db.catalog().delete_product(product_id).await?;
        info!(product_id = %product_id, "Product deleted");
        Ok(())
    }

    /// Deletes a raw item and every recipe line that uses it.
    pub async fn delete_raw_item(&self, raw_item_id: &str) -> LedgerResult<()> {
        self.db.catalog().delete_raw_item(raw_item_id).await?;
        info!(raw_item_id = %raw_item_id, "Raw item deleted");
        Ok(())
    }

    pub async fn update_unit_cost(&self, raw_item_id: &str, unit_cost_millicents: i64) -> LedgerResult<()> {
        validate_price_cents("unit_cost_millicents", unit_cost_millicents)?;
        Ok(self
            .db
            .catalog()
            .update_unit_cost(raw_item_id, unit_cost_millicents)
            .await?)
    }
}
