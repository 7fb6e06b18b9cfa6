//! # Invoice Repository
//!
//! Sales invoices and their lines. Status rules live in
//! `cafe_core::subledger`; the table CHECK keeps `amount_paid_cents`
//! within `0..=total_cents` as a last line of defence.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use cafe_core::{Invoice, InvoiceLine, InvoiceStatus};

const INVOICE_COLUMNS: &str = "id, tenant_id, branch_id, customer_name, customer_email, \
                               customer_tax_id, issue_date, subtotal_cents, tax_cents, total_cents, \
                               amount_paid_cents, status, journal_entry_id, created_at, updated_at";

/// Inserts an invoice header and lines.
pub async fn insert(conn: &mut SqliteConnection, invoice: &Invoice) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO invoices (
            id, tenant_id, branch_id, customer_name, customer_email, customer_tax_id,
            issue_date, subtotal_cents, tax_cents, total_cents, amount_paid_cents,
            status, journal_entry_id, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
        "#,
    )
    .bind(&invoice.id)
    .bind(&invoice.tenant_id)
    .bind(&invoice.branch_id)
    .bind(&invoice.customer_name)
    .bind(&invoice.customer_email)
    .bind(&invoice.customer_tax_id)
    .bind(invoice.issue_date)
    .bind(invoice.subtotal_cents)
    .bind(invoice.tax_cents)
    .bind(invoice.total_cents)
    .bind(invoice.amount_paid_cents)
    .bind(invoice.status)
    .bind(&invoice.journal_entry_id)
    .bind(invoice.created_at)
    .bind(invoice.updated_at)
    .execute(&mut *conn)
    .await?;

    for line in &invoice.lines {
        sqlx::query(
            r#"
            INSERT INTO invoice_lines (
                id, invoice_id, line_number, description, quantity, unit_price_cents,
                tax_rate_bps, line_total_cents, tax_cents
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&line.id)
        .bind(&line.invoice_id)
        .bind(line.line_number)
        .bind(&line.description)
        .bind(line.quantity)
        .bind(line.unit_price_cents)
        .bind(line.tax_rate_bps)
        .bind(line.line_total_cents)
        .bind(line.tax_cents)
        .execute(&mut *conn)
        .await?;
    }

    debug!(
        invoice_id = %invoice.id,
        total_cents = invoice.total_cents,
        lines = invoice.lines.len(),
        "Invoice inserted"
    );
    Ok(())
}

/// Loads an invoice with its lines.
pub async fn get_in(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Invoice>> {
    let sql = format!("SELECT {} FROM invoices WHERE id = ?1", INVOICE_COLUMNS);
    let invoice = sqlx::query_as::<_, Invoice>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    let Some(mut invoice) = invoice else {
        return Ok(None);
    };

    invoice.lines = sqlx::query_as::<_, InvoiceLine>(
        r#"
        SELECT id, invoice_id, line_number, description, quantity, unit_price_cents,
               tax_rate_bps, line_total_cents, tax_cents
        FROM invoice_lines
        WHERE invoice_id = ?1
        ORDER BY line_number
        "#,
    )
    .bind(id)
    .fetch_all(conn)
    .await?;

    Ok(Some(invoice))
}

/// Writes status, paid amount and journal link in one statement.
///
/// `expected` guards against a concurrent writer having moved the invoice
/// since it was read.
pub async fn update_state(
    conn: &mut SqliteConnection,
    id: &str,
    expected: InvoiceStatus,
    status: InvoiceStatus,
    amount_paid_cents: i64,
    journal_entry_id: Option<&str>,
    updated_at: DateTime<Utc>,
) -> DbResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE invoices
        SET status = ?1,
            amount_paid_cents = ?2,
            journal_entry_id = COALESCE(?3, journal_entry_id),
            updated_at = ?4
        WHERE id = ?5 AND status = ?6
        "#,
    )
    .bind(status)
    .bind(amount_paid_cents)
    .bind(journal_entry_id)
    .bind(updated_at)
    .bind(id)
    .bind(expected)
    .execute(conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::Conflict(format!(
            "invoice {} is no longer {}",
            id, expected
        )));
    }

    debug!(invoice_id = %id, from = %expected, to = %status, amount_paid_cents, "Invoice updated");
    Ok(())
}

/// Repository for invoices.
#[derive(Debug, Clone)]
pub struct InvoiceRepository {
    pool: SqlitePool,
}

impl InvoiceRepository {
    /// Creates a new InvoiceRepository.
    pub fn new(pool: SqlitePool) -> Self {
        InvoiceRepository { pool }
    }

    pub async fn insert(&self, invoice: &Invoice) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;
        insert(&mut tx, invoice).await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<Invoice>> {
        let mut conn = self.pool.acquire().await?;
        get_in(&mut conn, id).await
    }

    /// Invoices of a branch still carrying a balance.
    pub async fn open_for_branch(&self, tenant_id: &str, branch_id: &str) -> DbResult<Vec<Invoice>> {
        let sql = format!(
            "SELECT {} FROM invoices WHERE tenant_id = ?1 AND branch_id = ?2 \
             AND status IN ('issued', 'partially_paid') ORDER BY issue_date, rowid",
            INVOICE_COLUMNS
        );
        let invoices = sqlx::query_as::<_, Invoice>(&sql)
            .bind(tenant_id)
            .bind(branch_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(invoices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use chrono::NaiveDate;

    fn invoice(id: &str, total: i64) -> Invoice {
        let now = Utc::now();
        Invoice {
            id: id.to_string(),
            tenant_id: "t1".to_string(),
            branch_id: "b1".to_string(),
            customer_name: "Acme Offices".to_string(),
            customer_email: Some("ap@acme.test".to_string()),
            customer_tax_id: None,
            issue_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            subtotal_cents: total,
            tax_cents: 0,
            total_cents: total,
            amount_paid_cents: 0,
            status: InvoiceStatus::Draft,
            journal_entry_id: None,
            created_at: now,
            updated_at: now,
            lines: vec![InvoiceLine {
                id: format!("{}-1", id),
                invoice_id: id.to_string(),
                line_number: 1,
                description: "Catering".to_string(),
                quantity: 1,
                unit_price_cents: total,
                tax_rate_bps: 0,
                line_total_cents: total,
                tax_cents: 0,
            }],
        }
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.invoices().insert(&invoice("INV-1", 10_000)).await.unwrap();

        let fetched = db.invoices().get("INV-1").await.unwrap().unwrap();
        assert_eq!(fetched.lines.len(), 1);
        assert_eq!(fetched.status, InvoiceStatus::Draft);
        assert_eq!(fetched.balance_due().cents(), 10_000);
    }

    #[tokio::test]
    async fn test_update_state_checks_expected_status() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.invoices().insert(&invoice("INV-2", 10_000)).await.unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        update_state(&mut conn, "INV-2", InvoiceStatus::Draft, InvoiceStatus::Issued, 0, None, Utc::now())
            .await
            .unwrap();
        let err = update_state(&mut conn, "INV-2", InvoiceStatus::Draft, InvoiceStatus::Issued, 0, None, Utc::now())
            .await
            .unwrap_err();
        assert!(err.is_conflict());
        drop(conn);

        let open = db.invoices().open_for_branch("t1", "b1").await.unwrap();
        assert_eq!(open.len(), 1);
    }

    #[tokio::test]
    async fn test_paid_above_total_rejected_by_schema() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.invoices().insert(&invoice("INV-3", 10_000)).await.unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        let err = update_state(
            &mut conn,
            "INV-3",
            InvoiceStatus::Draft,
            InvoiceStatus::Paid,
            10_001,
            None,
            Utc::now(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DbError::CheckViolation { .. }));
    }
}
