//! # Financial Reports
//!
//! Trial balance, income statement and balance sheet assembled from one
//! snapshot of posted account activity.
//!
//! ## Input
//! The database layer returns one [`AccountActivity`] row per account from a
//! single aggregate query over posted lines, so every figure in a report
//! comes from the same snapshot. Nothing here reads more than once.
//!
//! ## Balance Sheet Closing
//! Revenue and expense accounts are not closed into retained earnings by a
//! period-end entry. The balance sheet instead shows net income to date as
//! *current earnings* inside equity, which makes
//! `assets == liabilities + equity` hold for any history of balanced entries.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use ts_rs::TS;

use crate::chart::subtree_ids_by;
use crate::types::AccountType;

/// Posted debit/credit totals of one account inside a report window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct AccountActivity {
    pub account_id: String,
    pub account_number: String,
    pub name: String,
    pub account_type: AccountType,
    pub parent_account_id: Option<String>,
    pub debit_cents: i64,
    pub credit_cents: i64,
}

impl AccountActivity {
    /// Balance in the account type's normal direction.
    #[inline]
    pub fn balance_cents(&self) -> i64 {
        self.account_type
            .signed_balance(self.debit_cents, self.credit_cents)
    }

    #[inline]
    pub fn has_activity(&self) -> bool {
        self.debit_cents != 0 || self.credit_cents != 0
    }
}

/// One account on a statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReportLine {
    pub account_id: String,
    pub account_number: String,
    pub name: String,
    pub amount_cents: i64,
}

impl From<&AccountActivity> for ReportLine {
    fn from(a: &AccountActivity) -> Self {
        ReportLine {
            account_id: a.account_id.clone(),
            account_number: a.account_number.clone(),
            name: a.name.clone(),
            amount_cents: a.balance_cents(),
        }
    }
}

fn lines_of(activity: &[AccountActivity], keep: impl Fn(&AccountActivity) -> bool) -> Vec<ReportLine> {
    activity
        .iter()
        .filter(|a| a.has_activity() && keep(a))
        .map(ReportLine::from)
        .collect()
}

fn total(lines: &[ReportLine]) -> i64 {
    lines.iter().map(|l| l.amount_cents).sum()
}

// =============================================================================
// Trial Balance
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TrialBalanceRow {
    pub account_id: String,
    pub account_number: String,
    pub name: String,
    pub account_type: AccountType,
    pub debit_cents: i64,
    pub credit_cents: i64,
    /// Normal-direction balance.
    pub balance_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TrialBalance {
    pub tenant_id: String,
    pub branch_id: Option<String>,
    #[ts(as = "String")]
    pub as_of: NaiveDate,
    pub rows: Vec<TrialBalanceRow>,
    pub total_debit_cents: i64,
    pub total_credit_cents: i64,
    /// Σ debit == Σ credit across all accounts.
    pub is_balanced: bool,
}

impl TrialBalance {
    pub fn from_activity(
        tenant_id: &str,
        branch_id: Option<&str>,
        as_of: NaiveDate,
        activity: &[AccountActivity],
    ) -> Self {
        let rows: Vec<TrialBalanceRow> = activity
            .iter()
            .filter(|a| a.has_activity())
            .map(|a| TrialBalanceRow {
                account_id: a.account_id.clone(),
                account_number: a.account_number.clone(),
                name: a.name.clone(),
                account_type: a.account_type,
                debit_cents: a.debit_cents,
                credit_cents: a.credit_cents,
                balance_cents: a.balance_cents(),
            })
            .collect();

        let total_debit_cents = rows.iter().map(|r| r.debit_cents).sum();
        let total_credit_cents = rows.iter().map(|r| r.credit_cents).sum();

        TrialBalance {
            tenant_id: tenant_id.to_string(),
            branch_id: branch_id.map(str::to_string),
            as_of,
            rows,
            total_debit_cents,
            total_credit_cents,
            is_balanced: total_debit_cents == total_credit_cents,
        }
    }
}

// =============================================================================
// Income Statement
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct IncomeStatement {
    pub tenant_id: String,
    pub branch_id: Option<String>,
    #[ts(as = "Option<String>")]
    pub from: Option<NaiveDate>,
    #[ts(as = "String")]
    pub to: NaiveDate,
    pub revenue: Vec<ReportLine>,
    pub cost_of_goods_sold: Vec<ReportLine>,
    pub operating_expenses: Vec<ReportLine>,
    pub total_revenue_cents: i64,
    pub total_cogs_cents: i64,
    pub gross_profit_cents: i64,
    pub total_operating_expense_cents: i64,
    pub net_income_cents: i64,
}

impl IncomeStatement {
    /// `cogs_root_number` names the account whose subtree is reported as
    /// cost of goods sold; every other expense is operating.
    pub fn from_activity(
        tenant_id: &str,
        branch_id: Option<&str>,
        from: Option<NaiveDate>,
        to: NaiveDate,
        activity: &[AccountActivity],
        cogs_root_number: &str,
    ) -> Self {
        let cogs_ids: HashSet<String> = activity
            .iter()
            .find(|a| a.account_number == cogs_root_number)
            .map(|root| {
                subtree_ids_by(
                    activity
                        .iter()
                        .map(|a| (a.account_id.as_str(), a.parent_account_id.as_deref())),
                    &root.account_id,
                )
            })
            .unwrap_or_default();

        let revenue = lines_of(activity, |a| a.account_type == AccountType::Revenue);
        let cost_of_goods_sold = lines_of(activity, |a| {
            a.account_type == AccountType::Expense && cogs_ids.contains(&a.account_id)
        });
        let operating_expenses = lines_of(activity, |a| {
            a.account_type == AccountType::Expense && !cogs_ids.contains(&a.account_id)
        });

        let total_revenue_cents = total(&revenue);
        let total_cogs_cents = total(&cost_of_goods_sold);
        let total_operating_expense_cents = total(&operating_expenses);
        let gross_profit_cents = total_revenue_cents - total_cogs_cents;

        IncomeStatement {
            tenant_id: tenant_id.to_string(),
            branch_id: branch_id.map(str::to_string),
            from,
            to,
            revenue,
            cost_of_goods_sold,
            operating_expenses,
            total_revenue_cents,
            total_cogs_cents,
            gross_profit_cents,
            total_operating_expense_cents,
            net_income_cents: gross_profit_cents - total_operating_expense_cents,
        }
    }
}

// =============================================================================
// Balance Sheet
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BalanceSheet {
    pub tenant_id: String,
    pub branch_id: Option<String>,
    #[ts(as = "String")]
    pub as_of: NaiveDate,
    pub assets: Vec<ReportLine>,
    pub liabilities: Vec<ReportLine>,
    pub equity: Vec<ReportLine>,
    /// Revenue minus expenses to date, not yet closed to retained earnings.
    pub current_earnings_cents: i64,
    pub total_assets_cents: i64,
    pub total_liabilities_cents: i64,
    /// Equity accounts plus current earnings.
    pub total_equity_cents: i64,
    pub is_balanced: bool,
}

impl BalanceSheet {
    /// `activity` must cover every posting up to and including `as_of`.
    pub fn from_activity(
        tenant_id: &str,
        branch_id: Option<&str>,
        as_of: NaiveDate,
        activity: &[AccountActivity],
    ) -> Self {
        let assets = lines_of(activity, |a| a.account_type == AccountType::Asset);
        let liabilities = lines_of(activity, |a| a.account_type == AccountType::Liability);
        let equity = lines_of(activity, |a| a.account_type == AccountType::Equity);

        let current_earnings_cents: i64 = activity
            .iter()
            .map(|a| match a.account_type {
                AccountType::Revenue => a.balance_cents(),
                AccountType::Expense => -a.balance_cents(),
                _ => 0,
            })
            .sum();

        let total_assets_cents = total(&assets);
        let total_liabilities_cents = total(&liabilities);
        let total_equity_cents = total(&equity) + current_earnings_cents;

        BalanceSheet {
            tenant_id: tenant_id.to_string(),
            branch_id: branch_id.map(str::to_string),
            as_of,
            assets,
            liabilities,
            equity,
            current_earnings_cents,
            total_assets_cents,
            total_liabilities_cents,
            total_equity_cents,
            is_balanced: total_assets_cents == total_liabilities_cents + total_equity_cents,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
