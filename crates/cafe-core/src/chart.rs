//! # Chart of Accounts
//!
//! The default cafe chart, account tree assembly and balance rollup.
//!
//! ## Default Chart
//! ```text
//! 1000 Assets                    2000 Liabilities        3000 Equity
//! ├── 1100 Cash                  ├── 2100 Accounts Pay.  ├── 3100 Owner's Capital
//! ├── 1110 Bank                  └── 2200 VAT Payable    └── 3200 Retained Earnings
//! ├── 1200 Accounts Receivable
//! ├── 1300 Inventory             4000 Revenue            5000 Cost of Goods Sold
//! └── 1400 VAT Receivable        ├── 4100 Sales          └── 5100 COGS - Food & Bev
//!                                └── 4900 Other Income
//! 6000 Operating Expenses
//! ├── 6100 Rent   ├── 6200 Utilities   ├── 6300 Wages   ├── 6400 Supplies
//! ├── 6500 Maintenance   ├── 6600 Marketing   └── 6900 Other Expenses
//! ```
//!
//! A parent's reporting balance is its own postings plus every descendant's.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::types::{Account, AccountType};

/// Account numbers in the default chart referenced by automatic postings.
pub mod numbers {
    pub const CASH: &str = "1100";
    pub const BANK: &str = "1110";
    pub const ACCOUNTS_RECEIVABLE: &str = "1200";
    pub const INVENTORY: &str = "1300";
    pub const VAT_RECEIVABLE: &str = "1400";
    pub const ACCOUNTS_PAYABLE: &str = "2100";
    pub const VAT_PAYABLE: &str = "2200";
    pub const OWNER_CAPITAL: &str = "3100";
    pub const RETAINED_EARNINGS: &str = "3200";
    pub const SALES: &str = "4100";
    pub const COGS_ROOT: &str = "5000";
    pub const COGS: &str = "5100";
}

/// One row of the default chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountTemplate {
    pub number: &'static str,
    pub name: &'static str,
    pub account_type: AccountType,
    pub parent: Option<&'static str>,
}

const fn t(
    number: &'static str,
    name: &'static str,
    account_type: AccountType,
    parent: Option<&'static str>,
) -> AccountTemplate {
    AccountTemplate {
        number,
        name,
        account_type,
        parent,
    }
}

/// Parents precede children.
pub const DEFAULT_CHART: &[AccountTemplate] = &[
    t("1000", "Assets", AccountType::Asset, None),
    t("1100", "Cash", AccountType::Asset, Some("1000")),
    t("1110", "Bank", AccountType::Asset, Some("1000")),
    t("1200", "Accounts Receivable", AccountType::Asset, Some("1000")),
    t("1300", "Inventory", AccountType::Asset, Some("1000")),
    t("1400", "VAT Receivable", AccountType::Asset, Some("1000")),
    t("2000", "Liabilities", AccountType::Liability, None),
    t("2100", "Accounts Payable", AccountType::Liability, Some("2000")),
    t("2200", "VAT Payable", AccountType::Liability, Some("2000")),
    t("3000", "Equity", AccountType::Equity, None),
    t("3100", "Owner's Capital", AccountType::Equity, Some("3000")),
    t("3200", "Retained Earnings", AccountType::Equity, Some("3000")),
    t("4000", "Revenue", AccountType::Revenue, None),
    t("4100", "Sales", AccountType::Revenue, Some("4000")),
    t("4900", "Other Income", AccountType::Revenue, Some("4000")),
    t("5000", "Cost of Goods Sold", AccountType::Expense, None),
    t("5100", "COGS - Food & Beverage", AccountType::Expense, Some("5000")),
    t("6000", "Operating Expenses", AccountType::Expense, None),
    t("6100", "Rent", AccountType::Expense, Some("6000")),
    t("6200", "Utilities", AccountType::Expense, Some("6000")),
    t("6300", "Wages", AccountType::Expense, Some("6000")),
    t("6400", "Supplies", AccountType::Expense, Some("6000")),
    t("6500", "Maintenance", AccountType::Expense, Some("6000")),
    t("6600", "Marketing", AccountType::Expense, Some("6000")),
    t("6900", "Other Expenses", AccountType::Expense, Some("6000")),
];

// =============================================================================
// Tree
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AccountNode {
    pub account: Account,
    pub children: Vec<AccountNode>,
}

/// Builds the account forest ordered by account number. Accounts whose
/// parent is missing from `accounts` become roots.
pub fn build_tree(mut accounts: Vec<Account>) -> Vec<AccountNode> {
    accounts.sort_by(|a, b| a.account_number.cmp(&b.account_number));
    let known: HashSet<String> = accounts.iter().map(|a| a.id.clone()).collect();

    let mut children: HashMap<Option<String>, Vec<Account>> = HashMap::new();
    for account in accounts {
        let parent = account
            .parent_account_id
            .clone()
            .filter(|p| known.contains(p) && *p != account.id);
        children.entry(parent).or_default().push(account);
    }

    fn attach(
        parent: Option<String>,
        children: &mut HashMap<Option<String>, Vec<Account>>,
        depth: usize,
    ) -> Vec<AccountNode> {
        let accounts = children.remove(&parent).unwrap_or_default();
        accounts
            .into_iter()
            .map(|account| {
                // A stored cycle cannot be reached from a root; depth is a backstop.
                let kids = if depth < 64 {
                    attach(Some(account.id.clone()), children, depth + 1)
                } else {
                    Vec::new()
                };
                AccountNode {
                    account,
                    children: kids,
                }
            })
            .collect()
    }

    attach(None, &mut children, 0)
}

/// Ids of `root_id` and all of its descendants.
pub fn subtree_ids(accounts: &[Account], root_id: &str) -> HashSet<String> {
    subtree_ids_by(
        accounts
            .iter()
            .map(|a| (a.id.as_str(), a.parent_account_id.as_deref())),
        root_id,
    )
}

/// [`subtree_ids`] over bare `(id, parent_id)` edges.
pub fn subtree_ids_by<'a, I>(edges: I, root_id: &str) -> HashSet<String>
where
    I: IntoIterator<Item = (&'a str, Option<&'a str>)>,
{
    let mut by_parent: HashMap<&str, Vec<&str>> = HashMap::new();
    for (id, parent) in edges {
        if let Some(parent) = parent {
            by_parent.entry(parent).or_default().push(id);
        }
    }

    let mut seen = HashSet::new();
    let mut stack: Vec<&str> = vec![root_id];
    while let Some(id) = stack.pop() {
        if !seen.insert(id.to_string()) {
            continue;
        }
        if let Some(kids) = by_parent.get(id) {
            stack.extend(kids.iter().copied());
        }
    }
    seen
}

/// Checks that `child_type` may sit under `parent`.
pub fn check_parent(child_number: &str, child_type: AccountType, parent: &Account) -> CoreResult<()> {
    if parent.account_type != child_type {
        return Err(CoreError::AccountTypeMismatch {
            account: child_number.to_string(),
            account_type: child_type.to_string(),
            parent: parent.account_number.clone(),
            parent_type: parent.account_type.to_string(),
        });
    }
    Ok(())
}

/// Checks that moving `account_id` under `new_parent_id` keeps the tree
/// acyclic.
pub fn check_reparent(accounts: &[Account], account_id: &str, new_parent_id: &str) -> CoreResult<()> {
    if subtree_ids(accounts, account_id).contains(new_parent_id) {
        let number = |id: &str| {
            accounts
                .iter()
                .find(|a| a.id == id)
                .map(|a| a.account_number.clone())
                .unwrap_or_else(|| id.to_string())
        };
        return Err(CoreError::AccountCycle {
            account: number(account_id),
            parent: number(new_parent_id),
        });
    }
    Ok(())
}

// =============================================================================
// Balances
// =============================================================================

/// Posted debit and credit totals for one account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Totals {
    pub debit_cents: i64,
    pub credit_cents: i64,
}

impl Totals {
    pub fn add(&mut self, other: Totals) {
        self.debit_cents += other.debit_cents;
        self.credit_cents += other.credit_cents;
    }
}

/// Balance of one account as of a date, in its normal direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AccountBalance {
    pub account_id: String,
    pub account_number: String,
    pub name: String,
    pub account_type: AccountType,
    pub debit_cents: i64,
    pub credit_cents: i64,
    /// Own postings only.
    pub balance_cents: i64,
    /// Own postings plus all descendants.
    pub rollup_balance_cents: i64,
}

/// Computes the balance of `account` from per-account posted totals.
pub fn account_balance(
    accounts: &[Account],
    account: &Account,
    totals: &HashMap<String, Totals>,
) -> AccountBalance {
    let own = totals.get(&account.id).copied().unwrap_or_default();
    let mut rolled = Totals::default();
    for id in subtree_ids(accounts, &account.id) {
        if let Some(t) = totals.get(&id) {
            rolled.add(*t);
        }
    }

    AccountBalance {
        account_id: account.id.clone(),
        account_number: account.account_number.clone(),
        name: account.name.clone(),
        account_type: account.account_type,
        debit_cents: own.debit_cents,
        credit_cents: own.credit_cents,
        balance_cents: account.account_type.signed_balance(own.debit_cents, own.credit_cents),
        rollup_balance_cents: account
            .account_type
            .signed_balance(rolled.debit_cents, rolled.credit_cents),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn account(id: &str, number: &str, kind: AccountType, parent: Option<&str>) -> Account {
        Account {
            id: id.to_string(),
            tenant_id: "t".to_string(),
            account_number: number.to_string(),
            name: number.to_string(),
            account_type: kind,
            parent_account_id: parent.map(str::to_string),
            is_active: true,
            created_at: Utc::now(),
        }
    }

    fn sample() -> Vec<Account> {
        vec![
            account("a", "1000", AccountType::Asset, None),
            account("c", "1100", AccountType::Asset, Some("a")),
            account("i", "1300", AccountType::Asset, Some("a")),
            account("r", "4000", AccountType::Revenue, None),
            account("s", "4100", AccountType::Revenue, Some("r")),
        ]
    }

    #[test]
    fn test_default_chart_parents_precede_children() {
        let mut seen = HashSet::new();
        for row in DEFAULT_CHART {
            if let Some(parent) = row.parent {
                assert!(seen.contains(parent), "{} listed before {}", row.number, parent);
                let parent_row = DEFAULT_CHART.iter().find(|r| r.number == parent).unwrap();
                assert_eq!(parent_row.account_type, row.account_type);
            }
            assert!(seen.insert(row.number), "duplicate {}", row.number);
        }
    }

    #[test]
    fn test_default_chart_has_posting_accounts() {
        for number in [
            numbers::CASH,
            numbers::INVENTORY,
            numbers::VAT_PAYABLE,
            numbers::SALES,
            numbers::COGS,
            numbers::RETAINED_EARNINGS,
        ] {
            assert!(DEFAULT_CHART.iter().any(|r| r.number == number));
        }
    }

    #[test]
    fn test_build_tree() {
        let tree = build_tree(sample());
        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].account.account_number, "1000");
        assert_eq!(tree[0].children.len(), 2);
        assert_eq!(tree[0].children[0].account.account_number, "1100");
        assert_eq!(tree[1].children[0].account.account_number, "4100");
    }

    #[test]
    fn test_orphan_becomes_root() {
        let accounts = vec![account("x", "1500", AccountType::Asset, Some("missing"))];
        let tree = build_tree(accounts);
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_rollup_includes_descendants() {
        let accounts = sample();
        let mut totals = HashMap::new();
        totals.insert("c".to_string(), Totals { debit_cents: 1000, credit_cents: 200 });
        totals.insert("i".to_string(), Totals { debit_cents: 500, credit_cents: 0 });
        totals.insert("s".to_string(), Totals { debit_cents: 0, credit_cents: 800 });

        let root = &accounts[0];
        let balance = account_balance(&accounts, root, &totals);
        assert_eq!(balance.balance_cents, 0);
        assert_eq!(balance.rollup_balance_cents, 1300);

        let cash = account_balance(&accounts, &accounts[1], &totals);
        assert_eq!(cash.balance_cents, 800);
        assert_eq!(cash.rollup_balance_cents, 800);

        let revenue = account_balance(&accounts, &accounts[3], &totals);
        assert_eq!(revenue.rollup_balance_cents, 800);
    }

    #[test]
    fn test_type_mismatch_rejected() {
        let parent = account("a", "1000", AccountType::Asset, None);
        assert!(check_parent("4100", AccountType::Revenue, &parent).is_err());
        assert!(check_parent("1500", AccountType::Asset, &parent).is_ok());
    }

    #[test]
    fn test_cycle_rejected() {
        let accounts = sample();
        // 1000 under its own child 1100.
        let err = check_reparent(&accounts, "a", "c").unwrap_err();
        assert!(matches!(err, CoreError::AccountCycle { .. }));
        assert!(check_reparent(&accounts, "a", "a").is_err());
        assert!(check_reparent(&accounts, "i", "c").is_ok());
    }
}
