//! # Financial Reporting
//!
//! Read-only reports over posted journal lines. Drafts and voided entries
//! never count. Each report is built from one aggregate read, so its totals
//! come from a single snapshot.

use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{debug, error};

use cafe_core::reporting::{BalanceSheet, IncomeStatement, TrialBalance};
use cafe_core::validation::validate_required;
use cafe_core::ValidationError;
use cafe_db::Database;

use crate::config::LedgerConfig;
use crate::error::LedgerResult;

/// Report service.
#[derive(Debug, Clone)]
pub struct FinancialReports {
    db: Database,
    config: Arc<LedgerConfig>,
}

impl FinancialReports {
    pub fn new(db: Database, config: Arc<LedgerConfig>) -> Self {
        FinancialReports { db, config }
    }

    /// Every account with activity up to `as_of`, and the debit = credit check.
    pub async fn trial_balance(
        &self,
        tenant_id: &str,
        branch_id: Option<&str>,
        as_of: NaiveDate,
    ) -> LedgerResult<TrialBalance> {
        validate_required("tenant_id", tenant_id)?;
        let activity = self
            .db
            .journal()
            .account_activity(tenant_id, branch_id, None, as_of)
            .await?;

        let report = TrialBalance::from_activity(tenant_id, branch_id, as_of, &activity);
        if !report.is_balanced {
            error!(
                tenant_id = %tenant_id,
                %as_of,
                debit = report.total_debit_cents,
                credit = report.total_credit_cents,
                "Trial balance does not balance"
            );
        }
        debug!(tenant_id = %tenant_id, rows = report.rows.len(), "Trial balance built");
        Ok(report)
    }

    /// Revenue, cost of goods and operating expenses over `[from, to]`.
    /// `from = None` reports from the first posting.
    pub async fn income_statement(
        &self,
        tenant_id: &str,
        branch_id: Option<&str>,
        from: Option<NaiveDate>,
        to: NaiveDate,
    ) -> LedgerResult<IncomeStatement> {
        validate_required("tenant_id", tenant_id)?;
        if let Some(from) = from {
            if from > to {
                return Err(ValidationError::InvalidFormat {
                    field: "from".to_string(),
                    reason: format!("{} is after {}", from, to),
                }
                .into());
            }
        }

        let activity = self
            .db
            .journal()
            .account_activity(tenant_id, branch_id, from, to)
            .await?;
        Ok(IncomeStatement::from_activity(
            tenant_id,
            branch_id,
            from,
            to,
            &activity,
            &self.config.accounts.cogs_root,
        ))
    }

    /// Assets, liabilities and equity (with unclosed earnings) as of a date.
    pub async fn balance_sheet(
        &self,
        tenant_id: &str,
        branch_id: Option<&str>,
        as_of: NaiveDate,
    ) -> LedgerResult<BalanceSheet> {
        validate_required("tenant_id", tenant_id)?;
        let activity = self
            .db
            .journal()
            .account_activity(tenant_id, branch_id, None, as_of)
            .await?;

        let report = BalanceSheet::from_activity(tenant_id, branch_id, as_of, &activity);
        if !report.is_balanced {
            error!(
                tenant_id = %tenant_id,
                %as_of,
                assets = report.total_assets_cents,
                liabilities = report.total_liabilities_cents,
                equity = report.total_equity_cents,
                "Balance sheet does not balance"
            );
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::costing::CostOrderRequest;
    use crate::error::LedgerError;
    use crate::subledger::NewExpense;
    use crate::test_support::{cafe_catalog, post, seeded_ledger, BRANCH, TENANT};
    use cafe_core::chart::numbers;
    use cafe_core::{ExpenseCategory, MovementType, OrderLineItem};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    /// Small deterministic generator for posting sequences.
    struct Lcg(u64);

    impl Lcg {
        fn next(&mut self, bound: u64) -> u64 {
            self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (self.0 >> 33) % bound
        }
    }

    #[tokio::test]
    async fn test_reports_stay_balanced_for_random_histories() {
        let pairs = [
            (numbers::CASH, numbers::SALES),
            (numbers::INVENTORY, numbers::ACCOUNTS_PAYABLE),
            (numbers::COGS, numbers::INVENTORY),
            (numbers::ACCOUNTS_PAYABLE, numbers::BANK),
            (numbers::BANK, numbers::OWNER_CAPITAL),
            ("6100", numbers::CASH),
            (numbers::ACCOUNTS_RECEIVABLE, numbers::VAT_PAYABLE),
        ];

        for seed in 1..=3u64 {
            let ledger = seeded_ledger().await;
            let mut rng = Lcg(seed);
            for _ in 0..25 {
                let (debit, credit) = pairs[rng.next(pairs.len() as u64) as usize];
                let amount = 1 + rng.next(50_000) as i64;
                post(&ledger, day(1 + rng.next(28) as u32), debit, credit, amount).await;
            }

            let reports = ledger.reports();
            for as_of in [day(7), day(14), day(28)] {
                let trial = reports.trial_balance(TENANT, None, as_of).await.unwrap();
                assert!(trial.is_balanced);
                assert_eq!(trial.total_debit_cents, trial.total_credit_cents);

                let sheet = reports.balance_sheet(TENANT, None, as_of).await.unwrap();
                assert!(sheet.is_balanced, "seed {} as of {}", seed, as_of);
                assert_eq!(
                    sheet.total_assets_cents,
                    sheet.total_liabilities_cents + sheet.total_equity_cents
                );
            }
        }
    }

    #[tokio::test]
    async fn test_income_statement_for_a_trading_day() {
        let ledger = seeded_ledger().await;
        let cafe = cafe_catalog(&ledger).await;
        ledger
            .stock()
            .adjust(BRANCH, &cafe.beans.id, 1_000.0, MovementType::Purchase, None, "clerk")
            .await
            .unwrap();

        let request = CostOrderRequest::new("O1", BRANCH, "barista").line(OrderLineItem::new(&cafe.espresso.id, 2));
        ledger.complete_order(TENANT, &request, day(5)).await.unwrap();
        post(&ledger, day(5), numbers::CASH, numbers::SALES, 600).await;

        let rent = ledger
            .expenses()
            .record(NewExpense {
                tenant_id: TENANT.to_string(),
                branch_id: BRANCH.to_string(),
                category: ExpenseCategory::Rent,
                description: "Kiosk rent".to_string(),
                amount_cents: 200,
                vat_cents: 0,
                expense_date: day(5),
            })
            .await
            .unwrap();
        ledger.expenses().approve(&rent.id, "owner").await.unwrap();

        let statement = ledger
            .reports()
            .income_statement(TENANT, None, Some(day(1)), day(30))
            .await
            .unwrap();
        assert_eq!(statement.total_revenue_cents, 600);
        // 36 g × 2.5¢
        assert_eq!(statement.total_cogs_cents, 90);
        assert_eq!(statement.gross_profit_cents, 510);
        assert_eq!(statement.total_operating_expense_cents, 200);
        assert_eq!(statement.net_income_cents, 310);

        // Nothing before the trading day.
        let earlier = ledger
            .reports()
            .income_statement(TENANT, None, Some(day(1)), day(4))
            .await
            .unwrap();
        assert_eq!(earlier.net_income_cents, 0);

        // Branch filter sees the tagged COGS and expense only.
        let branch = ledger
            .reports()
            .income_statement(TENANT, Some(BRANCH), None, day(30))
            .await
            .unwrap();
        assert_eq!(branch.total_revenue_cents, 0);
        assert_eq!(branch.total_cogs_cents, 90);

        let err = ledger
            .reports()
            .income_statement(TENANT, None, Some(day(10)), day(1))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }

    #[tokio::test]
    async fn test_drafts_do_not_count() {
        let ledger = seeded_ledger().await;
        let cash = ledger.chart().account_by_number(TENANT, numbers::CASH).await.unwrap().unwrap();
        let sales = ledger.chart().account_by_number(TENANT, numbers::SALES).await.unwrap().unwrap();
        ledger
            .journal()
            .create(
                cafe_core::journal::NewJournalEntry::new(TENANT, day(3), "Unposted", "tester")
                    .line(cafe_core::journal::NewJournalLine::debit(cash.id, cafe_core::Money::from_cents(999)))
                    .line(cafe_core::journal::NewJournalLine::credit(sales.id, cafe_core::Money::from_cents(999))),
            )
            .await
            .unwrap();

        let trial = ledger.reports().trial_balance(TENANT, None, day(30)).await.unwrap();
        assert!(trial.rows.is_empty());
        assert_eq!(trial.total_debit_cents, 0);
    }
}
