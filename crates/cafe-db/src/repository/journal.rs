//! # Journal Repository
//!
//! Journal entries, their lines, and the posted-activity aggregate that
//! every balance and report is derived from.
//!
//! ## Storage Guarantees
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  journal_entries                                                        │
//! │  ├── UNIQUE (tenant_id, reference_type, reference_id)                  │
//! │  │         WHERE status != 'void'    ← one live entry per event        │
//! │  ├── trigger: no UPDATE once status != 'draft'                         │
//! │  └── trigger: no DELETE of posted entries                              │
//! │                                                                         │
//! │  journal_lines                                                          │
//! │  ├── CHECK: non-negative, exactly one side non-zero                    │
//! │  └── triggers: no UPDATE/DELETE once the entry is posted               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Balance validation lives in `cafe_core::journal`; this layer only
//! stores what it is given.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use cafe_core::reporting::AccountActivity;
use cafe_core::{EntryStatus, JournalEntry, JournalLine};

const ENTRY_COLUMNS: &str = "id, tenant_id, entry_date, description, status, reference_type, \
                             reference_id, created_by, posted_by, posted_at, created_at";

// =============================================================================
// Connection-level queries
// =============================================================================

/// Inserts an entry header and all of its lines.
pub async fn insert_entry(conn: &mut SqliteConnection, entry: &JournalEntry) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO journal_entries (
            id, tenant_id, entry_date, description, status, reference_type,
            reference_id, created_by, posted_by, posted_at, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        "#,
    )
    .bind(&entry.id)
    .bind(&entry.tenant_id)
    .bind(entry.entry_date)
    .bind(&entry.description)
    .bind(entry.status)
    .bind(&entry.reference_type)
    .bind(&entry.reference_id)
    .bind(&entry.created_by)
    .bind(&entry.posted_by)
    .bind(entry.posted_at)
    .bind(entry.created_at)
    .execute(&mut *conn)
    .await?;

    for line in &entry.lines {
        sqlx::query(
            r#"
            INSERT INTO journal_lines (
                id, entry_id, line_number, account_id, debit_cents, credit_cents, description, branch_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&line.id)
        .bind(&line.entry_id)
        .bind(line.line_number)
        .bind(&line.account_id)
        .bind(line.debit_cents)
        .bind(line.credit_cents)
        .bind(&line.description)
        .bind(&line.branch_id)
        .execute(&mut *conn)
        .await?;
    }

    debug!(
        entry_id = %entry.id,
        status = %entry.status,
        lines = entry.lines.len(),
        reference_type = ?entry.reference_type,
        reference_id = ?entry.reference_id,
        "Journal entry inserted"
    );
    Ok(())
}

async fn lines_of(conn: &mut SqliteConnection, entry_id: &str) -> DbResult<Vec<JournalLine>> {
    let lines = sqlx::query_as::<_, JournalLine>(
        r#"
        SELECT id, entry_id, line_number, account_id, debit_cents, credit_cents, description, branch_id
        FROM journal_lines
        WHERE entry_id = ?1
        ORDER BY line_number
        "#,
    )
    .bind(entry_id)
    .fetch_all(conn)
    .await?;
    Ok(lines)
}

async fn with_lines(
    conn: &mut SqliteConnection,
    entry: Option<JournalEntry>,
) -> DbResult<Option<JournalEntry>> {
    match entry {
        Some(mut entry) => {
            entry.lines = lines_of(conn, &entry.id).await?;
            Ok(Some(entry))
        }
        None => Ok(None),
    }
}

/// Loads an entry with its lines.
pub async fn get_in(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<JournalEntry>> {
    let sql = format!("SELECT {} FROM journal_entries WHERE id = ?1", ENTRY_COLUMNS);
    let entry = sqlx::query_as::<_, JournalEntry>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    with_lines(conn, entry).await
}

/// The non-void entry recorded for a business event, drafts included.
pub async fn find_live_by_reference(
    conn: &mut SqliteConnection,
    tenant_id: &str,
    reference_type: &str,
    reference_id: &str,
) -> DbResult<Option<JournalEntry>> {
    let sql = format!(
        "SELECT {} FROM journal_entries \
         WHERE tenant_id = ?1 AND reference_type = ?2 AND reference_id = ?3 AND status != 'void'",
        ENTRY_COLUMNS
    );
    let entry = sqlx::query_as::<_, JournalEntry>(&sql)
        .bind(tenant_id)
        .bind(reference_type)
        .bind(reference_id)
        .fetch_optional(&mut *conn)
        .await?;
    with_lines(conn, entry).await
}

/// Moves a draft to posted. Fails if the entry is not a draft.
pub async fn mark_posted(
    conn: &mut SqliteConnection,
    id: &str,
    posted_by: &str,
    posted_at: DateTime<Utc>,
) -> DbResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE journal_entries
        SET status = 'posted', posted_by = ?1, posted_at = ?2
        WHERE id = ?3 AND status = 'draft'
        "#,
    )
    .bind(posted_by)
    .bind(posted_at)
    .bind(id)
    .execute(conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::Conflict(format!("journal entry {} is no longer a draft", id)));
    }
    debug!(entry_id = %id, posted_by = %posted_by, "Journal entry posted");
    Ok(())
}

/// Moves a draft to void. Fails if the entry is not a draft.
pub async fn mark_void(conn: &mut SqliteConnection, id: &str) -> DbResult<()> {
    let result = sqlx::query(
        "UPDATE journal_entries SET status = 'void' WHERE id = ?1 AND status = 'draft'",
    )
    .bind(id)
    .execute(conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::Conflict(format!("journal entry {} is no longer a draft", id)));
    }
    debug!(entry_id = %id, "Journal entry voided");
    Ok(())
}

/// Posted debit/credit totals per account in one consistent read.
///
/// Every account of the tenant is returned, with zero totals when it has no
/// activity in the window. `from = None` means since the beginning; both
/// bounds are inclusive. With `branch_id`, only lines tagged with that
/// branch count.
pub async fn account_activity_in(
    conn: &mut SqliteConnection,
    tenant_id: &str,
    branch_id: Option<&str>,
    from: Option<NaiveDate>,
    to: NaiveDate,
) -> DbResult<Vec<AccountActivity>> {
    let rows = sqlx::query_as::<_, AccountActivity>(
        r#"
        SELECT
            a.id AS account_id,
            a.account_number,
            a.name,
            a.account_type,
            a.parent_account_id,
            CAST(COALESCE(SUM(t.debit_cents), 0) AS INTEGER) AS debit_cents,
            CAST(COALESCE(SUM(t.credit_cents), 0) AS INTEGER) AS credit_cents
        FROM accounts a
        LEFT JOIN (
            SELECT l.account_id, l.debit_cents, l.credit_cents
            FROM journal_lines l
            JOIN journal_entries e ON e.id = l.entry_id
            WHERE e.tenant_id = ?1
              AND e.status = 'posted'
              AND (?2 IS NULL OR e.entry_date >= ?2)
              AND e.entry_date <= ?3
              AND (?4 IS NULL OR l.branch_id = ?4)
        ) t ON t.account_id = a.id
        WHERE a.tenant_id = ?1
        GROUP BY a.id, a.account_number, a.name, a.account_type, a.parent_account_id
        ORDER BY a.account_number
        "#,
    )
    .bind(tenant_id)
    .bind(from)
    .bind(to)
    .bind(branch_id)
    .fetch_all(conn)
    .await?;

    Ok(rows)
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for journal entries.
#[derive(Debug, Clone)]
pub struct JournalRepository {
    pool: SqlitePool,
}

impl JournalRepository {
    /// Creates a new JournalRepository.
    pub fn new(pool: SqlitePool) -> Self {
        JournalRepository { pool }
    }

    /// Gets an entry with its lines.
    pub async fn get(&self, id: &str) -> DbResult<Option<JournalEntry>> {
        let mut conn = self.pool.acquire().await?;
        get_in(&mut conn, id).await
    }

    pub async fn find_live_by_reference(
        &self,
        tenant_id: &str,
        reference_type: &str,
        reference_id: &str,
    ) -> DbResult<Option<JournalEntry>> {
        let mut conn = self.pool.acquire().await?;
        find_live_by_reference(&mut conn, tenant_id, reference_type, reference_id).await
    }

    /// Number of entries, any status, recorded for a reference.
    pub async fn count_by_reference(
        &self,
        tenant_id: &str,
        reference_type: &str,
        reference_id: &str,
    ) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM journal_entries
            WHERE tenant_id = ?1 AND reference_type = ?2 AND reference_id = ?3
            "#,
        )
        .bind(tenant_id)
        .bind(reference_type)
        .bind(reference_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Entries of a tenant in a status, oldest first. Lines are not loaded.
    pub async fn list_by_status(&self, tenant_id: &str, status: EntryStatus) -> DbResult<Vec<JournalEntry>> {
        let sql = format!(
            "SELECT {} FROM journal_entries WHERE tenant_id = ?1 AND status = ?2 \
             ORDER BY entry_date, rowid",
            ENTRY_COLUMNS
        );
        let entries = sqlx::query_as::<_, JournalEntry>(&sql)
            .bind(tenant_id)
            .bind(status)
            .fetch_all(&self.pool)
            .await?;
        Ok(entries)
    }

    pub async fn account_activity(
        &self,
        tenant_id: &str,
        branch_id: Option<&str>,
        from: Option<NaiveDate>,
        to: NaiveDate,
    ) -> DbResult<Vec<AccountActivity>> {
        let mut conn = self.pool.acquire().await?;
        account_activity_in(&mut conn, tenant_id, branch_id, from, to).await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use cafe_core::{Account, AccountType};

    async fn setup() -> (Database, Account, Account) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let cash = Account {
            id: "acc-cash".to_string(),
            tenant_id: "t1".to_string(),
            account_number: "1100".to_string(),
            name: "Cash".to_string(),
            account_type: AccountType::Asset,
            parent_account_id: None,
            is_active: true,
            created_at: Utc::now(),
        };
        let sales = Account {
            id: "acc-sales".to_string(),
            account_number: "4100".to_string(),
            name: "Sales".to_string(),
            account_type: AccountType::Revenue,
            ..cash.clone()
        };
        db.accounts().insert(&cash).await.unwrap();
        db.accounts().insert(&sales).await.unwrap();
        (db, cash, sales)
    }

    fn entry(id: &str, status: EntryStatus, date: NaiveDate, amount: i64, reference: Option<&str>) -> JournalEntry {
        let line = |n: i64, account: &str, debit: i64, credit: i64| JournalLine {
            id: format!("{}-{}", id, n),
            entry_id: id.to_string(),
            line_number: n,
            account_id: account.to_string(),
            debit_cents: debit,
            credit_cents: credit,
            description: None,
            branch_id: Some("b1".to_string()),
        };
        JournalEntry {
            id: id.to_string(),
            tenant_id: "t1".to_string(),
            entry_date: date,
            description: "Cash sale".to_string(),
            status,
            reference_type: reference.map(|_| "order_sale".to_string()),
            reference_id: reference.map(str::to_string),
            created_by: "tester".to_string(),
            posted_by: None,
            posted_at: None,
            created_at: Utc::now(),
            lines: vec![line(1, "acc-cash", amount, 0), line(2, "acc-sales", 0, amount)],
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_get_with_lines() {
        let (db, _, _) = setup().await;
        let mut conn = db.pool().acquire().await.unwrap();
        insert_entry(&mut conn, &entry("e1", EntryStatus::Draft, day(1), 500, None))
            .await
            .unwrap();
        drop(conn);

        let fetched = db.journal().get("e1").await.unwrap().unwrap();
        assert_eq!(fetched.lines.len(), 2);
        assert_eq!(fetched.total_debits(), fetched.total_credits());
        assert_eq!(fetched.entry_date, day(1));
    }

    #[tokio::test]
    async fn test_live_reference_is_unique() {
        let (db, _, _) = setup().await;
        let mut conn = db.pool().acquire().await.unwrap();

        insert_entry(&mut conn, &entry("e1", EntryStatus::Posted, day(1), 500, Some("O1")))
            .await
            .unwrap();
        let err = insert_entry(&mut conn, &entry("e2", EntryStatus::Posted, day(1), 500, Some("O1")))
            .await
            .unwrap_err();
        assert!(err.is_unique_violation());

        let live = find_live_by_reference(&mut conn, "t1", "order_sale", "O1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(live.id, "e1");
    }

    #[tokio::test]
    async fn test_voided_draft_releases_reference() {
        let (db, _, _) = setup().await;
        let mut conn = db.pool().acquire().await.unwrap();

        insert_entry(&mut conn, &entry("e1", EntryStatus::Draft, day(1), 500, Some("O2")))
            .await
            .unwrap();
        mark_void(&mut conn, "e1").await.unwrap();
        insert_entry(&mut conn, &entry("e2", EntryStatus::Draft, day(1), 500, Some("O2")))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_posted_entries_are_immutable() {
        let (db, _, _) = setup().await;
        let mut conn = db.pool().acquire().await.unwrap();

        insert_entry(&mut conn, &entry("e1", EntryStatus::Draft, day(1), 500, None))
            .await
            .unwrap();
        mark_posted(&mut conn, "e1", "manager", Utc::now()).await.unwrap();

        // Second transition finds no draft.
        let err = mark_posted(&mut conn, "e1", "manager", Utc::now()).await.unwrap_err();
        assert!(err.is_conflict());
        assert!(matches!(mark_void(&mut conn, "e1").await, Err(DbError::Conflict(_))));

        let err: DbError = sqlx::query("UPDATE journal_lines SET debit_cents = 1 WHERE entry_id = 'e1'")
            .execute(&mut *conn)
            .await
            .unwrap_err()
            .into();
        assert!(matches!(err, DbError::CheckViolation { .. }));

        let err: DbError = sqlx::query("DELETE FROM journal_entries WHERE id = 'e1'")
            .execute(&mut *conn)
            .await
            .unwrap_err()
            .into();
        assert!(matches!(err, DbError::CheckViolation { .. }));
    }

    #[tokio::test]
    async fn test_one_sided_lines_enforced() {
        let (db, _, _) = setup().await;
        let mut conn = db.pool().acquire().await.unwrap();

        let mut bad = entry("e1", EntryStatus::Draft, day(1), 500, None);
        bad.lines[0].credit_cents = 500;
        let err = insert_entry(&mut conn, &bad).await.unwrap_err();
        assert!(matches!(err, DbError::CheckViolation { .. }));
    }

    #[tokio::test]
    async fn test_activity_counts_posted_lines_in_window() {
        let (db, _, _) = setup().await;
        let mut conn = db.pool().acquire().await.unwrap();

        insert_entry(&mut conn, &entry("e1", EntryStatus::Posted, day(1), 500, None)).await.unwrap();
        insert_entry(&mut conn, &entry("e2", EntryStatus::Posted, day(10), 700, None)).await.unwrap();
        insert_entry(&mut conn, &entry("e3", EntryStatus::Draft, day(2), 9_000, None)).await.unwrap();
        drop(conn);

        let journal = db.journal();
        let rows = journal.account_activity("t1", None, None, day(5)).await.unwrap();
        assert_eq!(rows.len(), 2);
        let cash = rows.iter().find(|r| r.account_number == "1100").unwrap();
        assert_eq!(cash.debit_cents, 500);
        assert_eq!(cash.credit_cents, 0);

        let rows = journal.account_activity("t1", None, Some(day(2)), day(30)).await.unwrap();
        let sales = rows.iter().find(|r| r.account_number == "4100").unwrap();
        assert_eq!(sales.credit_cents, 700);
        assert_eq!(sales.balance_cents(), 700);

        let rows = journal.account_activity("t1", Some("b2"), None, day(30)).await.unwrap();
        assert!(rows.iter().all(|r| !r.has_activity()));
    }

    #[tokio::test]
    async fn test_list_by_status_and_count() {
        let (db, _, _) = setup().await;
        let mut conn = db.pool().acquire().await.unwrap();
        insert_entry(&mut conn, &entry("e1", EntryStatus::Posted, day(1), 500, Some("O3"))).await.unwrap();
        insert_entry(&mut conn, &entry("e2", EntryStatus::Draft, day(1), 500, None)).await.unwrap();
        drop(conn);

        let posted = db.journal().list_by_status("t1", EntryStatus::Posted).await.unwrap();
        assert_eq!(posted.len(), 1);
        assert_eq!(db.journal().count_by_reference("t1", "order_sale", "O3").await.unwrap(), 1);
    }
}
