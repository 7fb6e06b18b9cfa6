//! # Journal Engine
//!
//! Validated journal entries, the draft → posted/void state machine, and
//! idempotent posting keyed by business reference.
//!
//! ## post_if_absent
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BEGIN                                                                  │
//! │   ├── find live entry (tenant, reference_type, reference_id)           │
//! │   │       found ──────────────────────────────────────► return it       │
//! │   ├── build + validate (Σ debit == Σ credit, accounts in tenant)       │
//! │   ├── INSERT as posted                                                  │
//! │   │       UNIQUE violation ──► re-read ──► return the winner           │
//! │   │       busy / stale snapshot ──► Conflict ──► retry from BEGIN      │
//! │  COMMIT                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The partial unique index on the reference triple is what finally
//! guarantees at most one live entry per business event.

use chrono::{NaiveDate, Utc};
use sqlx::SqliteConnection;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use cafe_core::journal::{
    ensure_transition, reversal_lines, validate_entry, validate_lines, NewJournalEntry, NewJournalLine,
};
use cafe_core::types::reference;
use cafe_core::validation::validate_required;
use cafe_core::{CoreError, EntryStatus, JournalEntry, JournalLine, ValidationError};
use cafe_db::repository::{account, journal};
use cafe_db::{Database, DbError};

use crate::config::LedgerConfig;
use crate::error::{LedgerError, LedgerResult};
use crate::retry::with_retry;

const MAX_DESCRIPTION: usize = 500;

// =============================================================================
// Connection-level helpers (shared with the subledgers and postings)
// =============================================================================

/// Assigns ids and line numbers to a validated entry.
fn materialize(new: NewJournalEntry, status: EntryStatus, posted_by: Option<&str>) -> JournalEntry {
    let id = Uuid::new_v4().to_string();
    let now = Utc::now();

    let lines = new
        .lines
        .into_iter()
        .enumerate()
        .map(|(index, line)| JournalLine {
            id: Uuid::new_v4().to_string(),
            entry_id: id.clone(),
            line_number: index as i64 + 1,
            account_id: line.account_id,
            debit_cents: line.debit_cents,
            credit_cents: line.credit_cents,
            description: line.description,
            branch_id: line.branch_id,
        })
        .collect();

    JournalEntry {
        id,
        tenant_id: new.tenant_id,
        entry_date: new.entry_date,
        description: new.description.trim().to_string(),
        status,
        reference_type: new.reference_type,
        reference_id: new.reference_id,
        created_by: new.created_by,
        posted_by: posted_by.map(str::to_string),
        posted_at: posted_by.map(|_| now),
        created_at: now,
        lines,
    }
}

/// Every line must hit an active account of the entry's tenant.
async fn check_accounts(
    conn: &mut SqliteConnection,
    tenant_id: &str,
    lines: &[NewJournalLine],
) -> LedgerResult<()> {
    let accounts: HashMap<String, bool> = account::list_in(conn, tenant_id)
        .await?
        .into_iter()
        .map(|a| (a.id, a.is_active))
        .collect();

    for (index, line) in lines.iter().enumerate() {
        let reason = match accounts.get(&line.account_id) {
            Some(true) => continue,
            Some(false) => format!("account {} is inactive", line.account_id),
            None => format!("account {} does not belong to tenant {}", line.account_id, tenant_id),
        };
        return Err(CoreError::InvalidLine {
            line: index + 1,
            reason,
        }
        .into());
    }
    Ok(())
}

fn stored_lines(entry: &JournalEntry) -> Vec<NewJournalLine> {
    entry
        .lines
        .iter()
        .map(|l| NewJournalLine {
            account_id: l.account_id.clone(),
            debit_cents: l.debit_cents,
            credit_cents: l.credit_cents,
            description: l.description.clone(),
            branch_id: l.branch_id.clone(),
        })
        .collect()
}

/// Returns the live entry for the reference, or builds, validates and posts
/// a new one. The flag is true when this call created the entry.
///
/// Runs inside the caller's transaction so a subledger can post and update
/// its own row atomically.
pub(crate) async fn post_if_absent_in<F>(
    conn: &mut SqliteConnection,
    tenant_id: &str,
    reference_type: &str,
    reference_id: &str,
    posted_by: &str,
    build: F,
) -> LedgerResult<(JournalEntry, bool)>
where
    F: FnOnce() -> NewJournalEntry,
{
    if let Some(existing) =
        journal::find_live_by_reference(&mut *conn, tenant_id, reference_type, reference_id).await?
    {
        debug!(
            reference_type = %reference_type,
            reference_id = %reference_id,
            entry_id = %existing.id,
            "Entry already recorded for reference"
        );
        return Ok((existing, false));
    }

    let new = build().with_reference(reference_type, reference_id);
    if new.tenant_id != tenant_id {
        return Err(ValidationError::InvalidFormat {
            field: "tenant_id".to_string(),
            reason: format!("entry built for {} while posting for {}", new.tenant_id, tenant_id),
        }
        .into());
    }
    validate_entry(&new)?;
    check_accounts(&mut *conn, tenant_id, &new.lines).await?;

    let entry = materialize(new, EntryStatus::Posted, Some(posted_by));
    match journal::insert_entry(&mut *conn, &entry).await {
        Ok(()) => {}
        Err(err) if err.is_unique_violation() => {
            // Lost the race inside the unique index: the winner is visible now.
            return match journal::find_live_by_reference(&mut *conn, tenant_id, reference_type, reference_id)
                .await?
            {
                Some(winner) => Ok((winner, false)),
                None => Err(DbError::Conflict(format!(
                    "live entry for {}/{} vanished",
                    reference_type, reference_id
                ))
                .into()),
            };
        }
        Err(err) => return Err(err.into()),
    }

    info!(
        entry_id = %entry.id,
        reference_type = %reference_type,
        reference_id = %reference_id,
        amount_cents = entry.total_debits().cents(),
        "Journal entry posted"
    );
    Ok((entry, true))
}

/// Posts the mirror of a posted entry, keyed `('reversal', original id)`.
pub(crate) async fn reverse_in(
    conn: &mut SqliteConnection,
    original: &JournalEntry,
    posted_by: &str,
    entry_date: NaiveDate,
) -> LedgerResult<JournalEntry> {
    if original.status != EntryStatus::Posted {
        return Err(CoreError::InvalidEntryStatus {
            entry_id: original.id.clone(),
            status: original.status.to_string(),
            operation: "reverse".to_string(),
        }
        .into());
    }

    let description: String = format!("Reversal of {}", original.description)
        .chars()
        .take(MAX_DESCRIPTION)
        .collect();

    let (entry, _) = post_if_absent_in(
        conn,
        &original.tenant_id,
        reference::REVERSAL,
        &original.id,
        posted_by,
        || {
            let mut new = NewJournalEntry::new(&original.tenant_id, entry_date, description, posted_by);
            new.lines = reversal_lines(&original.lines);
            new
        },
    )
    .await?;
    Ok(entry)
}

// =============================================================================
// Journal Engine
// =============================================================================

/// Journal entry service.
#[derive(Debug, Clone)]
pub struct JournalEngine {
    db: Database,
    config: Arc<LedgerConfig>,
}

impl JournalEngine {
    pub fn new(db: Database, config: Arc<LedgerConfig>) -> Self {
        JournalEngine { db, config }
    }

    /// Validates and stores a draft. Drafts have no ledger effect.
    pub async fn create(&self, new: NewJournalEntry) -> LedgerResult<JournalEntry> {
        validate_entry(&new)?;

        let entry = with_retry(&self.config.retry, "journal_create", || async {
            let mut tx = self.db.begin().await?;
            check_accounts(&mut tx, &new.tenant_id, &new.lines).await?;

            let entry = materialize(new.clone(), EntryStatus::Draft, None);
            journal::insert_entry(&mut tx, &entry).await.map_err(|e| match e {
                DbError::UniqueViolation { .. } => LedgerError::Validation(ValidationError::Duplicate {
                    field: "reference".to_string(),
                    value: format!(
                        "{}/{}",
                        entry.reference_type.as_deref().unwrap_or_default(),
                        entry.reference_id.as_deref().unwrap_or_default()
                    ),
                }),
                other => other.into(),
            })?;
            tx.commit().await?;
            Ok(entry)
        })
        .await?;

        debug!(entry_id = %entry.id, lines = entry.lines.len(), "Draft journal entry created");
        Ok(entry)
    }

    /// Posts a draft. Posted entries can no longer change.
    pub async fn post(&self, entry_id: &str, posted_by: &str) -> LedgerResult<JournalEntry> {
        validate_required("posted_by", posted_by)?;

        with_retry(&self.config.retry, "journal_post", || async {
            let mut tx = self.db.begin().await?;
            let entry = journal::get_in(&mut tx, entry_id)
                .await?
                .ok_or_else(|| LedgerError::not_found("Journal entry", entry_id))?;
            ensure_transition(&entry.id, entry.status, EntryStatus::Posted)?;

            let lines = stored_lines(&entry);
            validate_lines(&lines)?;
            check_accounts(&mut tx, &entry.tenant_id, &lines).await?;

            journal::mark_posted(&mut tx, entry_id, posted_by, Utc::now()).await?;
            let posted = journal::get_in(&mut tx, entry_id)
                .await?
                .ok_or_else(|| LedgerError::not_found("Journal entry", entry_id))?;
            tx.commit().await?;

            info!(entry_id = %entry_id, posted_by = %posted_by, "Journal entry posted");
            Ok(posted)
        })
        .await
    }

    /// Voids a draft. Posted entries are corrected with `reverse` instead.
    pub async fn void(&self, entry_id: &str) -> LedgerResult<JournalEntry> {
        with_retry(&self.config.retry, "journal_void", || async {
            let mut tx = self.db.begin().await?;
            let entry = journal::get_in(&mut tx, entry_id)
                .await?
                .ok_or_else(|| LedgerError::not_found("Journal entry", entry_id))?;
            ensure_transition(&entry.id, entry.status, EntryStatus::Void)?;

            journal::mark_void(&mut tx, entry_id).await?;
            tx.commit().await?;

            info!(entry_id = %entry_id, "Journal entry voided");
            Ok(JournalEntry {
                status: EntryStatus::Void,
                ..entry
            })
        })
        .await
    }

    /// Posts a reversing entry for a posted one. Reversing twice returns the
    /// same reversal.
    pub async fn reverse(
        &self,
        entry_id: &str,
        posted_by: &str,
        entry_date: Option<NaiveDate>,
    ) -> LedgerResult<JournalEntry> {
        validate_required("posted_by", posted_by)?;
        let entry_date = entry_date.unwrap_or_else(|| Utc::now().date_naive());

        with_retry(&self.config.retry, "journal_reverse", || async {
            let mut tx = self.db.begin().await?;
            let original = journal::get_in(&mut tx, entry_id)
                .await?
                .ok_or_else(|| LedgerError::not_found("Journal entry", entry_id))?;
            let reversal = reverse_in(&mut tx, &original, posted_by, entry_date).await?;
            tx.commit().await?;
            Ok(reversal)
        })
        .await
    }

    /// Returns the live entry for (tenant, reference_type, reference_id), or
    /// posts the one `build` produces. `build` only runs when nothing exists.
    pub async fn post_if_absent<F>(
        &self,
        tenant_id: &str,
        reference_type: &str,
        reference_id: &str,
        posted_by: &str,
        build: F,
    ) -> LedgerResult<JournalEntry>
    where
        F: Fn() -> NewJournalEntry,
    {
        validate_required("posted_by", posted_by)?;

        with_retry(&self.config.retry, "post_if_absent", || async {
            let mut tx = self.db.begin().await?;
            let (entry, created) =
                post_if_absent_in(&mut tx, tenant_id, reference_type, reference_id, posted_by, &build)
                    .await?;
            if created {
                tx.commit().await?;
            }
            Ok(entry)
        })
        .await
    }

    /// Gets an entry with its lines.
    pub async fn get(&self, entry_id: &str) -> LedgerResult<JournalEntry> {
        self.db
            .journal()
            .get(entry_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Journal entry", entry_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{account_id, file_ledger, seeded_ledger, TENANT};
    use cafe_core::chart::numbers;
    use cafe_core::Money;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    async fn sale(ledger: &crate::Ledger, cents: i64) -> NewJournalEntry {
        let cash = account_id(ledger, numbers::CASH).await;
        let sales = account_id(ledger, numbers::SALES).await;
        NewJournalEntry::new(TENANT, date(), "Counter sale", "tester")
            .line(NewJournalLine::debit(cash, Money::from_cents(cents)))
            .line(NewJournalLine::credit(sales, Money::from_cents(cents)))
    }

    #[tokio::test]
    async fn test_create_rejects_unbalanced_entry() {
        let ledger = seeded_ledger().await;
        let cash = account_id(&ledger, numbers::CASH).await;
        let sales = account_id(&ledger, numbers::SALES).await;

        let entry = NewJournalEntry::new(TENANT, date(), "Broken", "tester")
            .line(NewJournalLine::debit(&cash, Money::from_cents(1_000)))
            .line(NewJournalLine::credit(&sales, Money::from_cents(900)));
        let err = ledger.journal().create(entry).await.unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Core(CoreError::UnbalancedEntry { debit: 1_000, credit: 900 })
        ));
        assert!(err.is_invariant_violation());

        // Nothing written.
        let drafts = ledger
            .database()
            .journal()
            .list_by_status(TENANT, EntryStatus::Draft)
            .await
            .unwrap();
        assert!(drafts.is_empty());
    }

    #[tokio::test]
    async fn test_create_rejects_foreign_account() {
        let ledger = seeded_ledger().await;
        ledger.chart().seed_default_chart("other-tenant").await.unwrap();
        let foreign = ledger
            .chart()
            .account_by_number("other-tenant", numbers::CASH)
            .await
            .unwrap()
            .unwrap();
        let sales = account_id(&ledger, numbers::SALES).await;

        let entry = NewJournalEntry::new(TENANT, date(), "Cross-tenant", "tester")
            .line(NewJournalLine::debit(foreign.id, Money::from_cents(100)))
            .line(NewJournalLine::credit(sales, Money::from_cents(100)));
        let err = ledger.journal().create(entry).await.unwrap_err();
        assert!(matches!(err, LedgerError::Core(CoreError::InvalidLine { line: 1, .. })));
    }

    #[tokio::test]
    async fn test_draft_post_and_immutability() {
        let ledger = seeded_ledger().await;
        let journal = ledger.journal();

        let draft = journal.create(sale(&ledger, 450).await).await.unwrap();
        assert_eq!(draft.status, EntryStatus::Draft);
        assert_eq!(draft.lines.len(), 2);

        let posted = journal.post(&draft.id, "manager").await.unwrap();
        assert_eq!(posted.status, EntryStatus::Posted);
        assert_eq!(posted.posted_by.as_deref(), Some("manager"));
        assert!(posted.posted_at.is_some());

        let err = journal.post(&draft.id, "manager").await.unwrap_err();
        assert!(matches!(err, LedgerError::Core(CoreError::InvalidEntryStatus { .. })));
        let err = journal.void(&draft.id).await.unwrap_err();
        assert!(matches!(err, LedgerError::Core(CoreError::InvalidEntryStatus { .. })));
    }

    #[tokio::test]
    async fn test_void_draft() {
        let ledger = seeded_ledger().await;
        let journal = ledger.journal();

        let draft = journal.create(sale(&ledger, 300).await).await.unwrap();
        let voided = journal.void(&draft.id).await.unwrap();
        assert_eq!(voided.status, EntryStatus::Void);
        assert_eq!(journal.get(&draft.id).await.unwrap().status, EntryStatus::Void);

        assert!(matches!(
            journal.void("missing").await.unwrap_err(),
            LedgerError::NotFound { .. }
        ));
    }

    #[tokio::test]
    async fn test_post_if_absent_is_idempotent() {
        let ledger = seeded_ledger().await;
        let journal = ledger.journal();
        let template = sale(&ledger, 1_250).await;
        let builds = std::sync::atomic::AtomicU32::new(0);

        let build = || {
            builds.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            template.clone()
        };
        let first = journal
            .post_if_absent(TENANT, reference::ORDER_COGS, "O1", "pos", build)
            .await
            .unwrap();
        let second = journal
            .post_if_absent(TENANT, reference::ORDER_COGS, "O1", "pos", build)
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.status, EntryStatus::Posted);
        assert_eq!(builds.load(std::sync::atomic::Ordering::SeqCst), 1);
        let count = ledger
            .database()
            .journal()
            .count_by_reference(TENANT, reference::ORDER_COGS, "O1")
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_post_if_absent_creates_one_entry() {
        let (ledger, _dir) = file_ledger().await;
        let template = sale(&ledger, 450).await;

        let mut handles = Vec::new();
        for _ in 0..8 {
            let journal = ledger.journal();
            let template = template.clone();
            handles.push(tokio::spawn(async move {
                journal
                    .post_if_absent(TENANT, reference::ORDER_COGS, "R1", "pos", move || template.clone())
                    .await
            }));
        }

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap().unwrap().id);
        }
        ids.dedup();
        assert_eq!(ids.len(), 1);

        let count = ledger
            .database()
            .journal()
            .count_by_reference(TENANT, reference::ORDER_COGS, "R1")
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_reverse_posts_mirror_once() {
        let ledger = seeded_ledger().await;
        let journal = ledger.journal();

        let template = sale(&ledger, 800).await;
        let original = journal
            .post_if_absent(TENANT, reference::ORDER_SALE, "O8", "pos", || template.clone())
            .await
            .unwrap();

        let reversal = journal.reverse(&original.id, "manager", Some(date())).await.unwrap();
        assert_eq!(reversal.reference_type.as_deref(), Some(reference::REVERSAL));
        assert_eq!(reversal.reference_id.as_deref(), Some(original.id.as_str()));
        assert_eq!(reversal.lines[0].credit_cents, original.lines[0].debit_cents);
        assert_eq!(reversal.lines[1].debit_cents, original.lines[1].credit_cents);

        let again = journal.reverse(&original.id, "manager", Some(date())).await.unwrap();
        assert_eq!(again.id, reversal.id);

        // The reversed entry stays posted.
        assert_eq!(journal.get(&original.id).await.unwrap().status, EntryStatus::Posted);

        let draft = journal.create(sale(&ledger, 100).await).await.unwrap();
        assert!(journal.reverse(&draft.id, "manager", None).await.is_err());
    }
}
