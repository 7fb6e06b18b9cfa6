//! # Account Repository
//!
//! Chart-of-accounts rows. Balances are never stored here: they are
//! derived from posted journal lines (see `JournalRepository::account_activity`).

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use cafe_core::chart::AccountTemplate;
use cafe_core::Account;

const ACCOUNT_COLUMNS: &str =
    "id, tenant_id, account_number, name, account_type, parent_account_id, is_active, created_at";

/// Inserts an account. Fails with `UniqueViolation` on a duplicate number.
pub async fn insert(conn: &mut SqliteConnection, account: &Account) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO accounts (
            id, tenant_id, account_number, name, account_type, parent_account_id, is_active, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&account.id)
    .bind(&account.tenant_id)
    .bind(&account.account_number)
    .bind(&account.name)
    .bind(account.account_type)
    .bind(&account.parent_account_id)
    .bind(account.is_active)
    .bind(account.created_at)
    .execute(conn)
    .await
    .map_err(|e| match DbError::from(e) {
        DbError::UniqueViolation { field, .. } => DbError::UniqueViolation {
            field,
            value: account.account_number.clone(),
        },
        other => other,
    })?;

    debug!(
        tenant_id = %account.tenant_id,
        account_number = %account.account_number,
        account_type = %account.account_type,
        "Account inserted"
    );
    Ok(())
}

/// Inserts unless the tenant already has the number. Returns true if inserted.
pub async fn insert_if_absent(conn: &mut SqliteConnection, account: &Account) -> DbResult<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO accounts (
            id, tenant_id, account_number, name, account_type, parent_account_id, is_active, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        ON CONFLICT (tenant_id, account_number) DO NOTHING
        "#,
    )
    .bind(&account.id)
    .bind(&account.tenant_id)
    .bind(&account.account_number)
    .bind(&account.name)
    .bind(account.account_type)
    .bind(&account.parent_account_id)
    .bind(account.is_active)
    .bind(account.created_at)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn by_number_in(
    conn: &mut SqliteConnection,
    tenant_id: &str,
    account_number: &str,
) -> DbResult<Option<Account>> {
    let sql = format!(
        "SELECT {} FROM accounts WHERE tenant_id = ?1 AND account_number = ?2",
        ACCOUNT_COLUMNS
    );
    let account = sqlx::query_as::<_, Account>(&sql)
        .bind(tenant_id)
        .bind(account_number)
        .fetch_optional(conn)
        .await?;
    Ok(account)
}

pub async fn list_in(conn: &mut SqliteConnection, tenant_id: &str) -> DbResult<Vec<Account>> {
    let sql = format!(
        "SELECT {} FROM accounts WHERE tenant_id = ?1 ORDER BY account_number",
        ACCOUNT_COLUMNS
    );
    let accounts = sqlx::query_as::<_, Account>(&sql)
        .bind(tenant_id)
        .fetch_all(conn)
        .await?;
    Ok(accounts)
}

/// Creates every template account the tenant does not have yet.
///
/// Templates must list parents before children. Existing numbers are left
/// untouched, so running this twice creates nothing the second time.
/// Returns the number of accounts created.
pub async fn seed_chart(
    conn: &mut SqliteConnection,
    tenant_id: &str,
    templates: &[AccountTemplate],
) -> DbResult<usize> {
    let mut created = 0;

    for template in templates {
        let parent_account_id = match template.parent {
            Some(number) => Some(
                by_number_in(&mut *conn, tenant_id, number)
                    .await?
                    .ok_or_else(|| DbError::not_found("Parent account", number))?
                    .id,
            ),
            None => None,
        };

        let account = Account {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            account_number: template.number.to_string(),
            name: template.name.to_string(),
            account_type: template.account_type,
            parent_account_id,
            is_active: true,
            created_at: Utc::now(),
        };

        if insert_if_absent(&mut *conn, &account).await? {
            created += 1;
        }
    }

    info!(tenant_id = %tenant_id, created, "Chart of accounts seeded");
    Ok(created)
}

/// Repository for chart-of-accounts rows.
#[derive(Debug, Clone)]
pub struct AccountRepository {
    pool: SqlitePool,
}

impl AccountRepository {
    /// Creates a new AccountRepository.
    pub fn new(pool: SqlitePool) -> Self {
        AccountRepository { pool }
    }

    pub async fn insert(&self, account: &Account) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        insert(&mut conn, account).await
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<Account>> {
        let sql = format!("SELECT {} FROM accounts WHERE id = ?1", ACCOUNT_COLUMNS);
        let account = sqlx::query_as::<_, Account>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(account)
    }

    pub async fn by_number(&self, tenant_id: &str, account_number: &str) -> DbResult<Option<Account>> {
        let mut conn = self.pool.acquire().await?;
        by_number_in(&mut conn, tenant_id, account_number).await
    }

    /// All accounts of a tenant, ordered by number.
    pub async fn list(&self, tenant_id: &str) -> DbResult<Vec<Account>> {
        let mut conn = self.pool.acquire().await?;
        list_in(&mut conn, tenant_id).await
    }

    /// Moves an account under a new parent (or to the root).
    pub async fn set_parent(&self, id: &str, parent_account_id: Option<&str>) -> DbResult<()> {
        let result = sqlx::query("UPDATE accounts SET parent_account_id = ?1 WHERE id = ?2")
            .bind(parent_account_id)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Account", id));
        }
        debug!(id = %id, parent = ?parent_account_id, "Account re-parented");
        Ok(())
    }

    /// Activates or deactivates an account. History is kept either way.
    pub async fn set_active(&self, id: &str, is_active: bool) -> DbResult<()> {
        let result = sqlx::query("UPDATE accounts SET is_active = ?1 WHERE id = ?2")
            .bind(is_active)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Account", id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::{Database, DbConfig, DbError};
    use uuid::Uuid;
    use cafe_core::chart::{numbers, DEFAULT_CHART};
    use cafe_core::{Account, AccountType};
    use chrono::Utc;

    fn account(tenant: &str, number: &str, kind: AccountType) -> Account {
        Account {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant.to_string(),
            account_number: number.to_string(),
            name: format!("Account {}", number),
            account_type: kind,
            parent_account_id: None,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_account_number_unique_per_tenant() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let accounts = db.accounts();

        accounts.insert(&account("t1", "1100", AccountType::Asset)).await.unwrap();
        let err = accounts
            .insert(&account("t1", "1100", AccountType::Asset))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { ref value, .. } if value == "1100"));

        // Another tenant may reuse the number.
        accounts.insert(&account("t2", "1100", AccountType::Asset)).await.unwrap();
        assert_eq!(accounts.list("t1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_insert_if_absent_and_lookup() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();

        let cash = account("t1", "1100", AccountType::Asset);
        assert!(super::insert_if_absent(&mut conn, &cash).await.unwrap());
        assert!(!super::insert_if_absent(&mut conn, &account("t1", "1100", AccountType::Asset))
            .await
            .unwrap());

        let found = super::by_number_in(&mut conn, "t1", "1100").await.unwrap().unwrap();
        assert_eq!(found.id, cash.id);
        assert_eq!(found.account_type, AccountType::Asset);
    }

    #[tokio::test]
    async fn test_seed_chart_is_idempotent() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut tx = db.begin().await.unwrap();

        let created = super::seed_chart(&mut tx, "t1", DEFAULT_CHART).await.unwrap();
        assert_eq!(created, DEFAULT_CHART.len());
        let again = super::seed_chart(&mut tx, "t1", DEFAULT_CHART).await.unwrap();
        assert_eq!(again, 0);
        tx.commit().await.unwrap();

        let accounts = db.accounts().list("t1").await.unwrap();
        assert_eq!(accounts.len(), DEFAULT_CHART.len());

        let cogs = db.accounts().by_number("t1", numbers::COGS).await.unwrap().unwrap();
        let root = db.accounts().by_number("t1", numbers::COGS_ROOT).await.unwrap().unwrap();
        assert_eq!(cogs.parent_account_id.as_deref(), Some(root.id.as_str()));
    }

    #[tokio::test]
    async fn test_set_parent() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let accounts = db.accounts();

        let root = account("t1", "5000", AccountType::Expense);
        let child = account("t1", "5100", AccountType::Expense);
        accounts.insert(&root).await.unwrap();
        accounts.insert(&child).await.unwrap();

        accounts.set_parent(&child.id, Some(&root.id)).await.unwrap();
        let fetched = accounts.get(&child.id).await.unwrap().unwrap();
        assert_eq!(fetched.parent_account_id.as_deref(), Some(root.id.as_str()));

        assert!(accounts.set_parent("missing", None).await.is_err());
    }
}
