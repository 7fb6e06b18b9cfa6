//! # Chart of Accounts
//!
//! Account creation, the account tree and derived balances.
//!
//! Balances are never stored. `get_balance` aggregates posted lines as of a
//! date in one read and rolls descendants up into their parents.

use chrono::NaiveDate;
use sqlx::SqliteConnection;
use std::collections::HashMap;
use tracing::{debug, info};
use uuid::Uuid;

use cafe_core::chart::{
    account_balance, build_tree, check_parent, check_reparent, AccountBalance, AccountNode, Totals,
    DEFAULT_CHART,
};
use cafe_core::validation::{validate_account_number, validate_name, validate_required};
use cafe_core::{Account, AccountType, ValidationError};
use cafe_db::repository::{account, journal};
use cafe_db::{Database, DbError};

use crate::error::{LedgerError, LedgerResult};

/// Input for a new account.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub tenant_id: String,
    pub account_number: String,
    pub name: String,
    pub account_type: AccountType,
    /// Number of the parent account, which must have the same type.
    pub parent_number: Option<String>,
}

impl NewAccount {
    pub fn new(
        tenant_id: impl Into<String>,
        account_number: impl Into<String>,
        name: impl Into<String>,
        account_type: AccountType,
    ) -> Self {
        NewAccount {
            tenant_id: tenant_id.into(),
            account_number: account_number.into(),
            name: name.into(),
            account_type,
            parent_number: None,
        }
    }

    pub fn under(mut self, parent_number: impl Into<String>) -> Self {
        self.parent_number = Some(parent_number.into());
        self
    }
}

/// Looks up an active account by number for an automatic posting.
pub(crate) async fn resolve_account(
    conn: &mut SqliteConnection,
    tenant_id: &str,
    number: &str,
) -> LedgerResult<String> {
    match account::by_number_in(conn, tenant_id, number).await? {
        Some(acc) if acc.is_active => Ok(acc.id),
        _ => Err(LedgerError::AccountNotConfigured {
            tenant_id: tenant_id.to_string(),
            number: number.to_string(),
        }),
    }
}

/// Chart-of-accounts service.
#[derive(Debug, Clone)]
pub struct ChartOfAccounts {
    db: Database,
}

impl ChartOfAccounts {
    pub fn new(db: Database) -> Self {
        ChartOfAccounts { db }
    }

    /// Creates an account, optionally under a parent of the same type.
    pub async fn create_account(&self, new: NewAccount) -> LedgerResult<Account> {
        validate_required("tenant_id", &new.tenant_id)?;
        validate_account_number(&new.account_number)?;
        validate_name("name", &new.name, 200)?;

        let number = new.account_number.trim().to_string();
        let mut tx = self.db.begin().await?;

        let parent_account_id = match new.parent_number.as_deref() {
            Some(parent_number) => {
                let parent = account::by_number_in(&mut tx, &new.tenant_id, parent_number)
                    .await?
                    .ok_or_else(|| LedgerError::not_found("Parent account", parent_number))?;
                check_parent(&number, new.account_type, &parent)?;
                Some(parent.id)
            }
            None => None,
        };

        let created = Account {
            id: Uuid::new_v4().to_string(),
            tenant_id: new.tenant_id.clone(),
            account_number: number,
            name: new.name.trim().to_string(),
            account_type: new.account_type,
            parent_account_id,
            is_active: true,
            created_at: chrono::Utc::now(),
        };

        account::insert(&mut tx, &created).await.map_err(|e| match e {
            DbError::UniqueViolation { value, .. } => LedgerError::Validation(ValidationError::Duplicate {
                field: "account_number".to_string(),
                value,
            }),
            other => other.into(),
        })?;
        tx.commit().await?;

        info!(
            tenant_id = %created.tenant_id,
            account_number = %created.account_number,
            account_type = %created.account_type,
            "Account created"
        );
        Ok(created)
    }

    /// The tenant's accounts as a forest ordered by account number.
    pub async fn get_tree(&self, tenant_id: &str) -> LedgerResult<Vec<AccountNode>> {
        let accounts = self.db.accounts().list(tenant_id).await?;
        Ok(build_tree(accounts))
    }

    /// Own and rolled-up balance of an account from entries posted up to
    /// and including `as_of`.
    pub async fn get_balance(&self, account_id: &str, as_of: NaiveDate) -> LedgerResult<AccountBalance> {
        let target = self
            .db
            .accounts()
            .get(account_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Account", account_id))?;

        // One read transaction so the tree and the totals share a snapshot.
        let mut tx = self.db.begin().await?;
        let accounts = account::list_in(&mut tx, &target.tenant_id).await?;
        let activity =
            journal::account_activity_in(&mut tx, &target.tenant_id, None, None, as_of).await?;
        tx.commit().await?;

        let totals: HashMap<String, Totals> = activity
            .into_iter()
            .map(|a| {
                (
                    a.account_id,
                    Totals {
                        debit_cents: a.debit_cents,
                        credit_cents: a.credit_cents,
                    },
                )
            })
            .collect();

        let balance = account_balance(&accounts, &target, &totals);
        debug!(
            account_number = %balance.account_number,
            %as_of,
            balance = balance.balance_cents,
            rollup = balance.rollup_balance_cents,
            "Account balance computed"
        );
        Ok(balance)
    }

    /// Creates any default-chart account the tenant is missing.
    pub async fn seed_default_chart(&self, tenant_id: &str) -> LedgerResult<usize> {
        validate_required("tenant_id", tenant_id)?;
        let mut tx = self.db.begin().await?;
        let created = account::seed_chart(&mut tx, tenant_id, DEFAULT_CHART).await?;
        tx.commit().await?;
        Ok(created)
    }

    pub async fn account_by_number(&self, tenant_id: &str, number: &str) -> LedgerResult<Option<Account>> {
        Ok(self.db.accounts().by_number(tenant_id, number).await?)
    }

    /// Moves an account under another parent, or to the root with `None`.
    pub async fn reparent(&self, account_id: &str, new_parent_id: Option<&str>) -> LedgerResult<()> {
        let accounts = self.db.accounts();
        let target = accounts
            .get(account_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Account", account_id))?;

        if let Some(parent_id) = new_parent_id {
            let parent = accounts
                .get(parent_id)
                .await?
                .filter(|p| p.tenant_id == target.tenant_id)
                .ok_or_else(|| LedgerError::not_found("Parent account", parent_id))?;
            check_parent(&target.account_number, target.account_type, &parent)?;

            let all = accounts.list(&target.tenant_id).await?;
            check_reparent(&all, &target.id, &parent.id)?;
        }

        accounts.set_parent(account_id, new_parent_id).await?;
        Ok(())
    }
}
