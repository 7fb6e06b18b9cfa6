//! # ledger-report
//!
//! Prints a financial report for one tenant as JSON.
//!
//! ```text
//! ledger-report trial-balance --tenant tenant-1 --to 2024-06-30
//! ledger-report income-statement --branch branch-1 --from 2024-06-01 --to 2024-06-30
//! ledger-report balance-sheet --db ./cafe_ledger.db
//! ```
//!
//! `--to` is the as-of date for the trial balance and balance sheet.
//! `--from` only applies to the income statement.

use chrono::{Local, NaiveDate};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::process;
use tracing::{error, warn};

use cafe_ledger::{init_tracing, Ledger, LedgerConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Report {
    /// Debit and credit totals per account
    TrialBalance,
    /// Revenue, cost of goods and expenses over a period
    IncomeStatement,
    /// Assets, liabilities and equity
    BalanceSheet,
}

#[derive(Parser)]
#[command(name = "ledger-report")]
#[command(about = "Financial reports from the cafe ledger")]
#[command(version)]
struct Cli {
    #[arg(value_enum)]
    report: Report,

    /// Tenant id (default: `[tenant] id` from the config)
    #[arg(long)]
    tenant: Option<String>,

    /// Restrict to lines tagged with this branch
    #[arg(long)]
    branch: Option<String>,

    /// First day of the period (default: first posting)
    #[arg(long)]
    from: Option<NaiveDate>,

    /// Last day of the period (default: today)
    #[arg(long)]
    to: Option<NaiveDate>,

    /// SQLite database file, overriding the config
    #[arg(long)]
    db: Option<PathBuf>,

    /// Path to ledger.toml (default: platform config directory)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(json) => println!("{}", json),
        Err(e) => {
            error!(error = %e, "Report failed");
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

async fn run(cli: Cli) -> Result<String, Box<dyn std::error::Error>> {
    let mut config = LedgerConfig::load(cli.config)?;
    if let Some(db) = cli.db {
        config.database.path = db;
    }
    let tenant = cli.tenant.unwrap_or_else(|| config.tenant.id.clone());

    let ledger = Ledger::open(config).await?;
    let reports = ledger.reports();
    let branch = cli.branch.as_deref();
    let to = cli.to.unwrap_or_else(|| Local::now().date_naive());

    if cli.from.is_some() && cli.report != Report::IncomeStatement {
        warn!("--from is ignored for point-in-time reports");
    }

    let json = match cli.report {
        Report::TrialBalance => {
            serde_json::to_string_pretty(&reports.trial_balance(&tenant, branch, to).await?)?
        }
        Report::IncomeStatement => serde_json::to_string_pretty(
            &reports.income_statement(&tenant, branch, cli.from, to).await?,
        )?,
        Report::BalanceSheet => {
            serde_json::to_string_pretty(&reports.balance_sheet(&tenant, branch, to).await?)?
        }
    };
    Ok(json)
}
