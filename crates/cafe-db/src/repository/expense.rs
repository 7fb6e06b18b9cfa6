//! # Expense Repository

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use cafe_core::{Expense, ExpenseStatus};

const EXPENSE_COLUMNS: &str = "id, tenant_id, branch_id, category, description, amount_cents, \
                               vat_cents, expense_date, status, journal_entry_id, payment_entry_id, \
                               created_at, updated_at";

pub async fn get_in(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Expense>> {
    let sql = format!("SELECT {} FROM expenses WHERE id = ?1", EXPENSE_COLUMNS);
    let expense = sqlx::query_as::<_, Expense>(&sql)
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(expense)
}

/// Moves an expense from `expected` to `status`, linking the posted entry.
///
/// Approval fills `journal_entry_id`, payment fills `payment_entry_id`.
pub async fn transition(
    conn: &mut SqliteConnection,
    id: &str,
    expected: ExpenseStatus,
    status: ExpenseStatus,
    entry_id: &str,
    updated_at: DateTime<Utc>,
) -> DbResult<()> {
    let sql = match status {
        ExpenseStatus::Paid => {
            "UPDATE expenses SET status = ?1, payment_entry_id = ?2, updated_at = ?3 \
             WHERE id = ?4 AND status = ?5"
        }
        _ => {
            "UPDATE expenses SET status = ?1, journal_entry_id = ?2, updated_at = ?3 \
             WHERE id = ?4 AND status = ?5"
        }
    };

    let result = sqlx::query(sql)
        .bind(status)
        .bind(entry_id)
        .bind(updated_at)
        .bind(id)
        .bind(expected)
        .execute(conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::Conflict(format!(
            "expense {} is no longer {}",
            id, expected
        )));
    }

    debug!(expense_id = %id, from = %expected, to = %status, entry_id = %entry_id, "Expense updated");
    Ok(())
}

/// Repository for operating expenses.
#[derive(Debug, Clone)]
pub struct ExpenseRepository {
    pool: SqlitePool,
}

impl ExpenseRepository {
    /// Creates a new ExpenseRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ExpenseRepository { pool }
    }

    pub async fn insert(&self, expense: &Expense) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO expenses (
                id, tenant_id, branch_id, category, description, amount_cents, vat_cents,
                expense_date, status, journal_entry_id, payment_entry_id, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
        )
        .bind(&expense.id)
        .bind(&expense.tenant_id)
        .bind(&expense.branch_id)
        .bind(expense.category)
        .bind(&expense.description)
        .bind(expense.amount_cents)
        .bind(expense.vat_cents)
        .bind(expense.expense_date)
        .bind(expense.status)
        .bind(&expense.journal_entry_id)
        .bind(&expense.payment_entry_id)
        .bind(expense.created_at)
        .bind(expense.updated_at)
        .execute(&self.pool)
        .await?;

        debug!(
            expense_id = %expense.id,
            category = %expense.category,
            amount_cents = expense.amount_cents,
            "Expense recorded"
        );
        Ok(())
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<Expense>> {
        let mut conn = self.pool.acquire().await?;
        get_in(&mut conn, id).await
    }

    /// Expenses of a branch in a status, oldest first.
    pub async fn list_by_status(
        &self,
        tenant_id: &str,
        branch_id: &str,
        status: ExpenseStatus,
    ) -> DbResult<Vec<Expense>> {
        let sql = format!(
            "SELECT {} FROM expenses WHERE tenant_id = ?1 AND branch_id = ?2 AND status = ?3 \
             ORDER BY expense_date, rowid",
            EXPENSE_COLUMNS
        );
        let expenses = sqlx::query_as::<_, Expense>(&sql)
            .bind(tenant_id)
            .bind(branch_id)
            .bind(status)
            .fetch_all(&self.pool)
            .await?;
        Ok(expenses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use cafe_core::ExpenseCategory;
    use chrono::NaiveDate;

    fn expense(id: &str) -> Expense {
        let now = Utc::now();
        Expense {
            id: id.to_string(),
            tenant_id: "t1".to_string(),
            branch_id: "b1".to_string(),
            category: ExpenseCategory::Rent,
            description: "June rent".to_string(),
            amount_cents: 150_000,
            vat_cents: 0,
            expense_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            status: ExpenseStatus::Pending,
            journal_entry_id: None,
            payment_entry_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_insert_and_list() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.expenses().insert(&expense("E1")).await.unwrap();

        let fetched = db.expenses().get("E1").await.unwrap().unwrap();
        assert_eq!(fetched.category, ExpenseCategory::Rent);
        assert_eq!(fetched.gross().cents(), 150_000);

        let pending = db
            .expenses()
            .list_by_status("t1", "b1", ExpenseStatus::Pending)
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
    }

    #[tokio::test]
    async fn test_transition_requires_expected_status() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.expenses().insert(&expense("E2")).await.unwrap();

        // No journal entry exists, so the FK rejects the link.
        let mut conn = db.pool().acquire().await.unwrap();
        let err = transition(
            &mut conn,
            "E2",
            ExpenseStatus::Pending,
            ExpenseStatus::Approved,
            "no-such-entry",
            Utc::now(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DbError::ForeignKeyViolation { .. }));

        let err = transition(
            &mut conn,
            "E2",
            ExpenseStatus::Approved,
            ExpenseStatus::Paid,
            "no-such-entry",
            Utc::now(),
        )
        .await
        .unwrap_err();
        assert!(err.is_conflict());
    }
}
