//! # Costing Repository
//!
//! At-most-once claims for order costing.
//!
//! ```text
//!   BEGIN
//!     claim(order)          INSERT ... ON CONFLICT (order_id) DO NOTHING
//!       ├── 0 rows → stored_report(order) → return it unchanged
//!       └── 1 row  → deduct stock ... → store_report(order, report)
//!   COMMIT
//! ```
//!
//! The claim row and every deduction commit in one transaction, so a
//! crashed or rolled-back costing leaves no claim behind.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use cafe_core::costing::CostingReport;

/// Claims `order_id` for costing. Returns false when it was already claimed.
pub async fn claim(
    conn: &mut SqliteConnection,
    order_id: &str,
    branch_id: &str,
    actor: &str,
) -> DbResult<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO order_costings (order_id, branch_id, actor, costed_at)
        VALUES (?1, ?2, ?3, ?4)
        ON CONFLICT (order_id) DO NOTHING
        "#,
    )
    .bind(order_id)
    .bind(branch_id)
    .bind(actor)
    .bind(Utc::now())
    .execute(conn)
    .await?;

    let claimed = result.rows_affected() == 1;
    debug!(order_id = %order_id, claimed, "Costing claim");
    Ok(claimed)
}

/// The report stored for a claimed order.
pub async fn stored_report(
    conn: &mut SqliteConnection,
    order_id: &str,
) -> DbResult<Option<CostingReport>> {
    let json: Option<String> =
        sqlx::query_scalar("SELECT report_json FROM order_costings WHERE order_id = ?1")
            .bind(order_id)
            .fetch_optional(conn)
            .await?;

    match json {
        Some(json) if !json.is_empty() => Ok(Some(serde_json::from_str(&json)?)),
        _ => Ok(None),
    }
}

/// Saves the finished report onto the claim row.
pub async fn store_report(conn: &mut SqliteConnection, report: &CostingReport) -> DbResult<()> {
    let json = serde_json::to_string(report)?;

    let result = sqlx::query(
        r#"
        UPDATE order_costings
        SET cost_of_goods_cents = ?1, success = ?2, report_json = ?3, costed_at = ?4
        WHERE order_id = ?5
        "#,
    )
    .bind(report.cost_of_goods_cents)
    .bind(report.success)
    .bind(&json)
    .bind(report.costed_at)
    .bind(&report.order_id)
    .execute(conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("OrderCosting", &report.order_id));
    }
    Ok(())
}

/// Repository for costing reports.
#[derive(Debug, Clone)]
pub struct CostingRepository {
    pool: SqlitePool,
}

impl CostingRepository {
    /// Creates a new CostingRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CostingRepository { pool }
    }

    /// The report of an already-costed order.
    pub async fn get_report(&self, order_id: &str) -> DbResult<Option<CostingReport>> {
        let mut conn = self.pool.acquire().await?;
        stored_report(&mut conn, order_id).await
    }

    /// Whether the order has been costed.
    pub async fn is_costed(&self, order_id: &str) -> DbResult<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM order_costings WHERE order_id = ?1")
            .bind(order_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    #[tokio::test]
    async fn test_claim_is_exclusive() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut tx = db.begin().await.unwrap();

        assert!(claim(&mut tx, "O1", "b1", "pos").await.unwrap());
        assert!(!claim(&mut tx, "O1", "b1", "pos").await.unwrap());

        let mut report = CostingReport::new("O1", "b1");
        report.cost_of_goods_cents = 45;
        store_report(&mut tx, &report).await.unwrap();
        tx.commit().await.unwrap();

        let stored = db.costings().get_report("O1").await.unwrap().unwrap();
        assert_eq!(stored, report);
        assert!(db.costings().is_costed("O1").await.unwrap());
        assert!(!db.costings().is_costed("O2").await.unwrap());
    }

    #[tokio::test]
    async fn test_rolled_back_claim_is_released() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        {
            let mut tx = db.begin().await.unwrap();
            assert!(claim(&mut tx, "O9", "b1", "pos").await.unwrap());
            tx.rollback().await.unwrap();
        }
        assert!(!db.costings().is_costed("O9").await.unwrap());
    }
}
