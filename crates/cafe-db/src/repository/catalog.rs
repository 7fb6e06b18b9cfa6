//! # Catalog Repository
//!
//! Raw items, products, add-ons and the recipe lines joining them.
//!
//! ## Recipe Shape
//! ```text
//!   products ──┐                       ┌── addons
//!              │ recipe_lines          │ addon_recipe_lines
//!              ▼                       ▼
//!            (raw_item_id, quantity, unit, note)
//!              │
//!              ▼
//!          raw_items (stocking unit, unit cost)
//! ```
//!
//! Deleting a product, add-on or raw item cascades its recipe lines.
//! Branch stock and movements are kept: they have no foreign key.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use cafe_core::{Addon, AddonRecipeLine, Product, RawItem, RawItemCategory, RecipeLine};

const RAW_ITEM_COLUMNS: &str = "id, tenant_id, name, unit, unit_cost_millicents, category, \
                                is_active, created_at, updated_at";

// =============================================================================
// Connection-level queries (usable inside a caller's transaction)
// =============================================================================

/// Loads the raw items with the given ids. Missing ids are simply absent.
pub async fn raw_items_by_ids(
    conn: &mut SqliteConnection,
    ids: &[String],
) -> DbResult<Vec<RawItem>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let placeholders = vec!["?"; ids.len()].join(", ");
    let sql = format!(
        "SELECT {} FROM raw_items WHERE id IN ({})",
        RAW_ITEM_COLUMNS, placeholders
    );

    let mut query = sqlx::query_as::<_, RawItem>(&sql);
    for id in ids {
        query = query.bind(id);
    }
    Ok(query.fetch_all(conn).await?)
}

/// Base recipe lines for a product, in insertion order.
pub async fn recipe_lines_for(
    conn: &mut SqliteConnection,
    product_id: &str,
) -> DbResult<Vec<RecipeLine>> {
    let lines = sqlx::query_as::<_, RecipeLine>(
        r#"
        SELECT id, product_id, raw_item_id, quantity, unit, note
        FROM recipe_lines
        WHERE product_id = ?1
        ORDER BY rowid
        "#,
    )
    .bind(product_id)
    .fetch_all(conn)
    .await?;

    Ok(lines)
}

/// Recipe lines for a set of add-ons.
pub async fn addon_recipe_lines_for(
    conn: &mut SqliteConnection,
    addon_ids: &[String],
) -> DbResult<Vec<AddonRecipeLine>> {
    if addon_ids.is_empty() {
        return Ok(Vec::new());
    }

    let placeholders = vec!["?"; addon_ids.len()].join(", ");
    let sql = format!(
        "SELECT id, addon_id, raw_item_id, quantity, unit, note \
         FROM addon_recipe_lines WHERE addon_id IN ({}) ORDER BY rowid",
        placeholders
    );

    let mut query = sqlx::query_as::<_, AddonRecipeLine>(&sql);
    for id in addon_ids {
        query = query.bind(id);
    }
    Ok(query.fetch_all(conn).await?)
}

/// Sets a raw item's cost per stocking unit.
pub async fn set_unit_cost(
    conn: &mut SqliteConnection,
    raw_item_id: &str,
    unit_cost_millicents: i64,
) -> DbResult<()> {
    let result = sqlx::query(
        "UPDATE raw_items SET unit_cost_millicents = ?1, updated_at = ?2 WHERE id = ?3",
    )
    .bind(unit_cost_millicents)
    .bind(Utc::now())
    .bind(raw_item_id)
    .execute(conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("RawItem", raw_item_id));
    }

    debug!(raw_item_id = %raw_item_id, unit_cost_millicents, "Unit cost updated");
    Ok(())
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for catalog and recipe operations.
#[derive(Debug, Clone)]
pub struct CatalogRepository {
    pool: SqlitePool,
}

impl CatalogRepository {
    /// Creates a new CatalogRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CatalogRepository { pool }
    }

    // -------------------------------------------------------------------------
    // Raw items
    // -------------------------------------------------------------------------

    /// Creates a raw item with a fresh id.
    pub async fn create_raw_item(
        &self,
        tenant_id: &str,
        name: &str,
        unit: &str,
        unit_cost_millicents: i64,
        category: RawItemCategory,
    ) -> DbResult<RawItem> {
        let now = Utc::now();
        let item = RawItem {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            name: name.trim().to_string(),
            unit: unit.trim().to_string(),
            unit_cost_millicents,
            category,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.insert_raw_item(&item).await?;
        Ok(item)
    }

    /// Inserts a raw item as given (caller picks the id).
    pub async fn insert_raw_item(&self, item: &RawItem) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO raw_items (
                id, tenant_id, name, unit, unit_cost_millicents, category,
                is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&item.id)
        .bind(&item.tenant_id)
        .bind(&item.name)
        .bind(&item.unit)
        .bind(item.unit_cost_millicents)
        .bind(item.category)
        .bind(item.is_active)
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&self.pool)
        .await?;

        debug!(id = %item.id, name = %item.name, unit = %item.unit, "Raw item inserted");
        Ok(())
    }

    /// Gets a raw item by ID.
    pub async fn get_raw_item(&self, id: &str) -> DbResult<Option<RawItem>> {
        let sql = format!("SELECT {} FROM raw_items WHERE id = ?1", RAW_ITEM_COLUMNS);
        let item = sqlx::query_as::<_, RawItem>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(item)
    }

    /// Active raw items of a tenant, by name.
    pub async fn list_raw_items(&self, tenant_id: &str) -> DbResult<Vec<RawItem>> {
        let sql = format!(
            "SELECT {} FROM raw_items WHERE tenant_id = ?1 AND is_active = 1 ORDER BY name",
            RAW_ITEM_COLUMNS
        );
        let items = sqlx::query_as::<_, RawItem>(&sql)
            .bind(tenant_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(items)
    }

    /// Sets a raw item's cost per stocking unit.
    pub async fn update_unit_cost(&self, id: &str, unit_cost_millicents: i64) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        set_unit_cost(&mut conn, id, unit_cost_millicents).await
    }

    /// Deletes a raw item. Recipe lines referencing it cascade.
    pub async fn delete_raw_item(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM raw_items WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("RawItem", id));
        }
        debug!(id = %id, "Raw item deleted");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Products and add-ons
    // -------------------------------------------------------------------------

    /// Creates a product with a fresh id.
    pub async fn create_product(
        &self,
        tenant_id: &str,
        name: &str,
        price_cents: i64,
        tax_rate_bps: u32,
    ) -> DbResult<Product> {
        let product = Product {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            name: name.trim().to_string(),
            price_cents,
            tax_rate_bps,
            is_active: true,
            created_at: Utc::now(),
        };
        self.insert_product(&product).await?;
        Ok(product)
    }

    /// Inserts a product as given.
    pub async fn insert_product(&self, product: &Product) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, tenant_id, name, price_cents, tax_rate_bps, is_active, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&product.id)
        .bind(&product.tenant_id)
        .bind(&product.name)
        .bind(product.price_cents)
        .bind(product.tax_rate_bps)
        .bind(product.is_active)
        .bind(product.created_at)
        .execute(&self.pool)
        .await?;

        debug!(id = %product.id, name = %product.name, "Product inserted");
        Ok(())
    }

    pub async fn get_product(&self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, tenant_id, name, price_cents, tax_rate_bps, is_active, created_at
            FROM products
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(product)
    }

    /// Deletes a product. Its recipe lines cascade.
    pub async fn delete_product(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM products WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }
        debug!(id = %id, "Product deleted");
        Ok(())
    }

    /// Creates an add-on with a fresh id.
    pub async fn create_addon(&self, tenant_id: &str, name: &str, price_cents: i64) -> DbResult<Addon> {
        let addon = Addon {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            name: name.trim().to_string(),
            price_cents,
            is_active: true,
            created_at: Utc::now(),
        };
        self.insert_addon(&addon).await?;
        Ok(addon)
    }

    /// Inserts an add-on as given.
    pub async fn insert_addon(&self, addon: &Addon) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO addons (id, tenant_id, name, price_cents, is_active, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&addon.id)
        .bind(&addon.tenant_id)
        .bind(&addon.name)
        .bind(addon.price_cents)
        .bind(addon.is_active)
        .bind(addon.created_at)
        .execute(&self.pool)
        .await?;

        debug!(id = %addon.id, name = %addon.name, "Add-on inserted");
        Ok(())
    }

    pub async fn get_addon(&self, id: &str) -> DbResult<Option<Addon>> {
        let addon = sqlx::query_as::<_, Addon>(
            "SELECT id, tenant_id, name, price_cents, is_active, created_at FROM addons WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(addon)
    }

    // -------------------------------------------------------------------------
    // Recipe lines
    // -------------------------------------------------------------------------

    /// Adds a base recipe line to a product.
    pub async fn add_recipe_line(
        &self,
        product_id: &str,
        raw_item_id: &str,
        quantity: f64,
        unit: &str,
        note: Option<&str>,
    ) -> DbResult<RecipeLine> {
        let line = RecipeLine {
            id: Uuid::new_v4().to_string(),
            product_id: product_id.to_string(),
            raw_item_id: raw_item_id.to_string(),
            quantity,
            unit: unit.trim().to_string(),
            note: note.map(str::to_string),
        };

        sqlx::query(
            r#"
            INSERT INTO recipe_lines (id, product_id, raw_item_id, quantity, unit, note)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&line.id)
        .bind(&line.product_id)
        .bind(&line.raw_item_id)
        .bind(line.quantity)
        .bind(&line.unit)
        .bind(&line.note)
        .execute(&self.pool)
        .await?;

        debug!(product_id = %product_id, raw_item_id = %raw_item_id, quantity, "Recipe line added");
        Ok(line)
    }

    /// Adds a per-unit recipe line to an add-on.
    pub async fn add_addon_recipe_line(
        &self,
        addon_id: &str,
        raw_item_id: &str,
        quantity: f64,
        unit: &str,
        note: Option<&str>,
    ) -> DbResult<AddonRecipeLine> {
        let line = AddonRecipeLine {
            id: Uuid::new_v4().to_string(),
            addon_id: addon_id.to_string(),
            raw_item_id: raw_item_id.to_string(),
            quantity,
            unit: unit.trim().to_string(),
            note: note.map(str::to_string),
        };

        sqlx::query(
            r#"
            INSERT INTO addon_recipe_lines (id, addon_id, raw_item_id, quantity, unit, note)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&line.id)
        .bind(&line.addon_id)
        .bind(&line.raw_item_id)
        .bind(line.quantity)
        .bind(&line.unit)
        .bind(&line.note)
        .execute(&self.pool)
        .await?;

        debug!(addon_id = %addon_id, raw_item_id = %raw_item_id, quantity, "Add-on recipe line added");
        Ok(line)
    }

    pub async fn recipe_lines(&self, product_id: &str) -> DbResult<Vec<RecipeLine>> {
        let mut conn = self.pool.acquire().await?;
        recipe_lines_for(&mut conn, product_id).await
    }

    pub async fn addon_recipe_lines(&self, addon_id: &str) -> DbResult<Vec<AddonRecipeLine>> {
        let mut conn = self.pool.acquire().await?;
        addon_recipe_lines_for(&mut conn, &[addon_id.to_string()]).await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::{Database, DbConfig};
    use cafe_core::{RawItemCategory, DEFAULT_TENANT_ID};

    #[tokio::test]
    async fn test_recipe_lines_round_trip() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let catalog = db.catalog();

        let beans = catalog
            .create_raw_item(DEFAULT_TENANT_ID, "Espresso Beans", "g", 2500, RawItemCategory::Ingredient)
            .await
            .unwrap();
        let espresso = catalog.create_product(DEFAULT_TENANT_ID, "Espresso", 300, 1400).await.unwrap();
        catalog
            .add_recipe_line(&espresso.id, &beans.id, 18.0, "g", Some("double shot"))
            .await
            .unwrap();

        let lines = catalog.recipe_lines(&espresso.id).await.unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].quantity, 18.0);
        assert_eq!(lines[0].note.as_deref(), Some("double shot"));

        let fetched = catalog.get_raw_item(&beans.id).await.unwrap().unwrap();
        assert_eq!(fetched.unit_cost_millicents, 2500);
        assert_eq!(fetched.category, RawItemCategory::Ingredient);
    }

    #[tokio::test]
    async fn test_delete_cascades_recipe_lines() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let catalog = db.catalog();

        let milk = catalog
            .create_raw_item(DEFAULT_TENANT_ID, "Milk", "l", 120_000, RawItemCategory::Ingredient)
            .await
            .unwrap();
        let latte = catalog.create_product(DEFAULT_TENANT_ID, "Latte", 450, 1400).await.unwrap();
        let syrup = catalog.create_addon(DEFAULT_TENANT_ID, "Extra milk", 50).await.unwrap();
        catalog.add_recipe_line(&latte.id, &milk.id, 200.0, "ml", None).await.unwrap();
        catalog.add_addon_recipe_line(&syrup.id, &milk.id, 50.0, "ml", None).await.unwrap();

        catalog.delete_raw_item(&milk.id).await.unwrap();

        assert!(catalog.recipe_lines(&latte.id).await.unwrap().is_empty());
        assert!(catalog.addon_recipe_lines(&syrup.id).await.unwrap().is_empty());
        assert!(catalog.get_product(&latte.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_update_unit_cost() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let catalog = db.catalog();

        let cups = catalog
            .create_raw_item(DEFAULT_TENANT_ID, "Cup 12oz", "pcs", 8_000, RawItemCategory::Packaging)
            .await
            .unwrap();
        catalog.update_unit_cost(&cups.id, 9_500).await.unwrap();

        let fetched = catalog.get_raw_item(&cups.id).await.unwrap().unwrap();
        assert_eq!(fetched.unit_cost_millicents, 9_500);

        assert!(catalog.update_unit_cost("missing", 1).await.is_err());
    }

    #[tokio::test]
    async fn test_raw_items_by_ids_skips_missing() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let catalog = db.catalog();
        let sugar = catalog
            .create_raw_item(DEFAULT_TENANT_ID, "Sugar", "kg", 150_000, RawItemCategory::Ingredient)
            .await
            .unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        let found = super::raw_items_by_ids(&mut conn, &[sugar.id.clone(), "ghost".to_string()])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Sugar");
    }
}
