//! # Stock Repository
//!
//! Per-branch raw-material balances and the append-only movement log.
//!
//! ## Atomic Adjust
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  adjust_in(conn, branch, item, delta, ...)                              │
//! │                                                                         │
//! │  1. INSERT INTO branch_stock ... VALUES (branch, item, delta)           │
//! │     ON CONFLICT (branch_id, raw_item_id)                                │
//! │     DO UPDATE SET current_quantity = current_quantity + delta           │
//! │     RETURNING current_quantity            ← one statement, one write    │
//! │                                                                         │
//! │  2. previous = new - delta                                              │
//! │                                                                         │
//! │  3. INSERT INTO stock_movements (...)     ← same transaction            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The increment happens inside SQLite under the write lock, so two
//! concurrent deductions can never observe the same "before" quantity.
//! Rows are created lazily by the first movement.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use cafe_core::{BranchStock, MovementType, StockAdjustment, StockMovement};

const MOVEMENT_COLUMNS: &str = "id, branch_id, raw_item_id, delta, previous_quantity, \
                                new_quantity, movement_type, reference_id, actor, created_at";

/// Applies `delta` to one (branch, raw item) balance and appends the
/// movement. Call inside a transaction so both writes commit together.
///
/// Negative results are stored as-is. Deciding whether that is a shortage
/// is the caller's job.
pub async fn adjust_in(
    conn: &mut SqliteConnection,
    branch_id: &str,
    raw_item_id: &str,
    delta: f64,
    movement_type: MovementType,
    reference_id: Option<&str>,
    actor: &str,
) -> DbResult<StockAdjustment> {
    let now = Utc::now();

    let new_quantity: f64 = sqlx::query_scalar(
        r#"
        INSERT INTO branch_stock (branch_id, raw_item_id, current_quantity, min_stock_level, updated_at)
        VALUES (?1, ?2, ?3, 0, ?4)
        ON CONFLICT (branch_id, raw_item_id) DO UPDATE SET
            current_quantity = current_quantity + excluded.current_quantity,
            updated_at = excluded.updated_at
        RETURNING CAST(current_quantity AS REAL)
        "#,
    )
    .bind(branch_id)
    .bind(raw_item_id)
    .bind(delta)
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;

    let movement = StockMovement {
        id: Uuid::new_v4().to_string(),
        branch_id: branch_id.to_string(),
        raw_item_id: raw_item_id.to_string(),
        delta,
        previous_quantity: new_quantity - delta,
        new_quantity,
        movement_type,
        reference_id: reference_id.map(str::to_string),
        actor: actor.to_string(),
        created_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO stock_movements (
            id, branch_id, raw_item_id, delta, previous_quantity, new_quantity,
            movement_type, reference_id, actor, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
    )
    .bind(&movement.id)
    .bind(&movement.branch_id)
    .bind(&movement.raw_item_id)
    .bind(movement.delta)
    .bind(movement.previous_quantity)
    .bind(movement.new_quantity)
    .bind(movement.movement_type)
    .bind(&movement.reference_id)
    .bind(&movement.actor)
    .bind(movement.created_at)
    .execute(&mut *conn)
    .await?;

    debug!(
        branch_id = %branch_id,
        raw_item_id = %raw_item_id,
        delta,
        previous = movement.previous_quantity,
        new = new_quantity,
        movement_type = %movement_type,
        "Stock adjusted"
    );

    Ok(StockAdjustment {
        previous_quantity: movement.previous_quantity,
        new_quantity,
        movement,
    })
}

/// Repository for branch stock operations.
#[derive(Debug, Clone)]
pub struct StockRepository {
    pool: SqlitePool,
}

impl StockRepository {
    /// Creates a new StockRepository.
    pub fn new(pool: SqlitePool) -> Self {
        StockRepository { pool }
    }

    /// Atomic adjust in its own transaction.
    pub async fn adjust(
        &self,
        branch_id: &str,
        raw_item_id: &str,
        delta: f64,
        movement_type: MovementType,
        reference_id: Option<&str>,
        actor: &str,
    ) -> DbResult<StockAdjustment> {
        let mut tx = self.pool.begin().await?;
        let adjustment = adjust_in(
            &mut tx,
            branch_id,
            raw_item_id,
            delta,
            movement_type,
            reference_id,
            actor,
        )
        .await?;
        tx.commit().await?;
        Ok(adjustment)
    }

    /// Current balance row, if any movement ever touched the pair.
    pub async fn get(&self, branch_id: &str, raw_item_id: &str) -> DbResult<Option<BranchStock>> {
        let stock = sqlx::query_as::<_, BranchStock>(
            r#"
            SELECT branch_id, raw_item_id,
                   CAST(current_quantity AS REAL) AS current_quantity,
                   CAST(min_stock_level AS REAL) AS min_stock_level,
                   updated_at
            FROM branch_stock
            WHERE branch_id = ?1 AND raw_item_id = ?2
            "#,
        )
        .bind(branch_id)
        .bind(raw_item_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(stock)
    }

    /// On-hand quantity, zero when the pair has never moved.
    pub async fn quantity(&self, branch_id: &str, raw_item_id: &str) -> DbResult<f64> {
        Ok(self
            .get(branch_id, raw_item_id)
            .await?
            .map(|s| s.current_quantity)
            .unwrap_or(0.0))
    }

    /// Sets the restock threshold, creating the row when needed.
    pub async fn set_min_level(
        &self,
        branch_id: &str,
        raw_item_id: &str,
        min_stock_level: f64,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO branch_stock (branch_id, raw_item_id, current_quantity, min_stock_level, updated_at)
            VALUES (?1, ?2, 0, ?3, ?4)
            ON CONFLICT (branch_id, raw_item_id) DO UPDATE SET
                min_stock_level = excluded.min_stock_level,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(branch_id)
        .bind(raw_item_id)
        .bind(min_stock_level)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        debug!(branch_id = %branch_id, raw_item_id = %raw_item_id, min_stock_level, "Min stock level set");
        Ok(())
    }

    /// Items at or below their restock threshold.
    pub async fn low_stock(&self, branch_id: &str) -> DbResult<Vec<BranchStock>> {
        let rows = sqlx::query_as::<_, BranchStock>(
            r#"
            SELECT branch_id, raw_item_id,
                   CAST(current_quantity AS REAL) AS current_quantity,
                   CAST(min_stock_level AS REAL) AS min_stock_level,
                   updated_at
            FROM branch_stock
            WHERE branch_id = ?1 AND current_quantity <= min_stock_level
            ORDER BY current_quantity - min_stock_level, raw_item_id
            "#,
        )
        .bind(branch_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Movement history for one pair, oldest first.
    pub async fn movements_for(
        &self,
        branch_id: &str,
        raw_item_id: &str,
    ) -> DbResult<Vec<StockMovement>> {
        let sql = format!(
            "SELECT {} FROM stock_movements WHERE branch_id = ?1 AND raw_item_id = ?2 \
             ORDER BY rowid",
            MOVEMENT_COLUMNS
        );
        let rows = sqlx::query_as::<_, StockMovement>(&sql)
            .bind(branch_id)
            .bind(raw_item_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// All movements sharing a reference (an order, a purchase, a transfer).
    pub async fn movements_by_reference(&self, reference_id: &str) -> DbResult<Vec<StockMovement>> {
        let sql = format!(
            "SELECT {} FROM stock_movements WHERE reference_id = ?1 ORDER BY rowid",
            MOVEMENT_COLUMNS
        );
        let rows = sqlx::query_as::<_, StockMovement>(&sql)
            .bind(reference_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
