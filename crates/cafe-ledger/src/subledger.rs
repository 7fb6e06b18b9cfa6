//! # Invoice & Expense Subledgers
//!
//! Documents that only touch the ledger on an explicit transition.
//!
//! ## Invoice lifecycle
//! ```text
//!   draft ──issue──► issued ──pay──► partially_paid ──pay──► paid
//!     │                │   └──────────────pay (full)────────────┘
//!     └──void──► void ◄┘ (no payments yet: the issue entry is reversed)
//! ```
//!
//! ## Expense lifecycle
//! ```text
//!   pending ──approve──► approved ──mark_paid──► paid
//! ```
//!
//! Each transition posts its journal entry and updates the document in one
//! transaction. A guarded status update that finds the document already
//! moved surfaces as a store conflict, so the retry re-reads it and fails
//! with the proper status error.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use cafe_core::journal::{NewJournalEntry, NewJournalLine};
use cafe_core::subledger::{
    ensure_expense_transition, ensure_issuable, ensure_voidable, invoice_totals, payment_status,
    NewInvoiceLine,
};
use cafe_core::types::reference;
use cafe_core::validation::{
    validate_amount_cents, validate_name, validate_price_cents, validate_quantity, validate_required,
    validate_tax_rate_bps,
};
use cafe_core::{
    Expense, ExpenseCategory, ExpenseStatus, Invoice, InvoiceLine, InvoiceStatus, Money, ValidationError,
};
use cafe_db::repository::{expense, invoice, journal};
use cafe_db::Database;

use crate::chart::resolve_account;
use crate::config::LedgerConfig;
use crate::error::{LedgerError, LedgerResult};
use crate::journal::{post_if_absent_in, reverse_in};
use crate::retry::with_retry;

// =============================================================================
// Invoices
// =============================================================================

/// A sales invoice before it is saved as a draft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewInvoice {
    pub tenant_id: String,
    pub branch_id: String,
    pub customer_name: String,
    pub customer_email: Option<String>,
    pub customer_tax_id: Option<String>,
    pub issue_date: NaiveDate,
    pub lines: Vec<NewInvoiceLine>,
}

/// Sales invoice service.
#[derive(Debug, Clone)]
pub struct InvoiceService {
    db: Database,
    config: Arc<LedgerConfig>,
}

impl InvoiceService {
    pub fn new(db: Database, config: Arc<LedgerConfig>) -> Self {
        InvoiceService { db, config }
    }

    /// Saves a draft with totals computed from its lines. No ledger effect.
    pub async fn create(&self, new: NewInvoice) -> LedgerResult<Invoice> {
        validate_required("tenant_id", &new.tenant_id)?;
        validate_required("branch_id", &new.branch_id)?;
        validate_name("customer_name", &new.customer_name, 200)?;
        if new.lines.is_empty() {
            return Err(ValidationError::Required {
                field: "lines".to_string(),
            }
            .into());
        }
        for line in &new.lines {
            validate_name("description", &line.description, 500)?;
            validate_quantity("quantity", line.quantity)?;
            validate_price_cents("unit_price_cents", line.unit_price_cents)?;
            validate_tax_rate_bps(line.tax_rate_bps)?;
        }

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let totals = invoice_totals(&new.lines);
        let lines = new
            .lines
            .iter()
            .enumerate()
            .map(|(index, line)| {
                let (net, tax) = line.amounts();
                InvoiceLine {
                    id: Uuid::new_v4().to_string(),
                    invoice_id: id.clone(),
                    line_number: index as i64 + 1,
                    description: line.description.trim().to_string(),
                    quantity: line.quantity,
                    unit_price_cents: line.unit_price_cents,
                    tax_rate_bps: line.tax_rate_bps,
                    line_total_cents: net.cents(),
                    tax_cents: tax.cents(),
                }
            })
            .collect();

        let created = Invoice {
            id,
            tenant_id: new.tenant_id,
            branch_id: new.branch_id,
            customer_name: new.customer_name.trim().to_string(),
            customer_email: new.customer_email,
            customer_tax_id: new.customer_tax_id,
            issue_date: new.issue_date,
            subtotal_cents: totals.subtotal_cents,
            tax_cents: totals.tax_cents,
            total_cents: totals.total_cents,
            amount_paid_cents: 0,
            status: InvoiceStatus::Draft,
            journal_entry_id: None,
            created_at: now,
            updated_at: now,
            lines,
        };

        self.db.invoices().insert(&created).await?;
        info!(invoice_id = %created.id, total_cents = created.total_cents, "Invoice drafted");
        Ok(created)
    }

    /// Issues a draft: Dr Receivable / Cr Sales, Cr VAT payable.
    pub async fn issue(&self, invoice_id: &str, actor: &str) -> LedgerResult<Invoice> {
        validate_required("actor", actor)?;
        let accounts = &self.config.accounts;

        with_retry(&self.config.retry, "invoice_issue", || async {
            let mut tx = self.db.begin().await?;
            let current = invoice::get_in(&mut tx, invoice_id)
                .await?
                .ok_or_else(|| LedgerError::not_found("Invoice", invoice_id))?;
            ensure_issuable(&current)?;

            let tenant = current.tenant_id.as_str();
            let receivable = resolve_account(&mut tx, tenant, &accounts.receivable).await?;
            let sales = resolve_account(&mut tx, tenant, &accounts.sales).await?;
            let vat_payable = resolve_account(&mut tx, tenant, &accounts.vat_payable).await?;

            let (entry, _) = post_if_absent_in(&mut tx, tenant, reference::INVOICE, &current.id, actor, || {
                NewJournalEntry::new(
                    tenant,
                    current.issue_date,
                    format!("Invoice {} to {}", current.id, current.customer_name),
                    actor,
                )
                .line(NewJournalLine::debit(&receivable, current.total()))
                .line(NewJournalLine::credit(&sales, Money::from_cents(current.subtotal_cents)))
                .line_if_nonzero(NewJournalLine::credit(&vat_payable, Money::from_cents(current.tax_cents)))
                .for_branch(&current.branch_id)
            })
            .await?;

            invoice::update_state(
                &mut tx,
                &current.id,
                InvoiceStatus::Draft,
                InvoiceStatus::Issued,
                0,
                Some(&entry.id),
                Utc::now(),
            )
            .await?;
            let issued = invoice::get_in(&mut tx, invoice_id)
                .await?
                .ok_or_else(|| LedgerError::not_found("Invoice", invoice_id))?;
            tx.commit().await?;

            info!(invoice_id = %invoice_id, entry_id = %entry.id, "Invoice issued");
            Ok(issued)
        })
        .await
    }

    /// Sets the absolute amount paid so far and posts the increase
    /// (Dr Cash / Cr Receivable).
    ///
    /// Amounts above the total and decreases are rejected. Reaching the total
    /// moves the invoice to `paid`.
    pub async fn record_payment(
        &self,
        invoice_id: &str,
        amount_paid: Money,
        actor: &str,
        entry_date: Option<NaiveDate>,
    ) -> LedgerResult<Invoice> {
        validate_required("actor", actor)?;
        let entry_date = entry_date.unwrap_or_else(|| Utc::now().date_naive());
        let accounts = &self.config.accounts;

        with_retry(&self.config.retry, "invoice_payment", || async {
            let mut tx = self.db.begin().await?;
            let current = invoice::get_in(&mut tx, invoice_id)
                .await?
                .ok_or_else(|| LedgerError::not_found("Invoice", invoice_id))?;
            let status = payment_status(&current, amount_paid)?;

            let delta = amount_paid - current.amount_paid();
            if delta.is_zero() {
                return Ok(current);
            }

            let tenant = current.tenant_id.as_str();
            let cash = resolve_account(&mut tx, tenant, &accounts.cash).await?;
            let receivable = resolve_account(&mut tx, tenant, &accounts.receivable).await?;

            let key = format!("{}:{}", current.id, amount_paid.cents());
            let (entry, _) = post_if_absent_in(&mut tx, tenant, reference::INVOICE_PAYMENT, &key, actor, || {
                NewJournalEntry::new(tenant, entry_date, format!("Payment on invoice {}", current.id), actor)
                    .line(NewJournalLine::debit(&cash, delta))
                    .line(NewJournalLine::credit(&receivable, delta))
                    .for_branch(&current.branch_id)
            })
            .await?;

            invoice::update_state(
                &mut tx,
                &current.id,
                current.status,
                status,
                amount_paid.cents(),
                None,
                Utc::now(),
            )
            .await?;
            let updated = invoice::get_in(&mut tx, invoice_id)
                .await?
                .ok_or_else(|| LedgerError::not_found("Invoice", invoice_id))?;
            tx.commit().await?;

            info!(
                invoice_id = %invoice_id,
                entry_id = %entry.id,
                amount_paid_cents = amount_paid.cents(),
                status = %status,
                "Invoice payment recorded"
            );
            Ok(updated)
        })
        .await
    }

    /// Voids a draft, or an issued invoice with no payments by reversing
    /// its issue entry.
    pub async fn void(
        &self,
        invoice_id: &str,
        actor: &str,
        entry_date: Option<NaiveDate>,
    ) -> LedgerResult<Invoice> {
        validate_required("actor", actor)?;
        let entry_date = entry_date.unwrap_or_else(|| Utc::now().date_naive());

        with_retry(&self.config.retry, "invoice_void", || async {
            let mut tx = self.db.begin().await?;
            let current = invoice::get_in(&mut tx, invoice_id)
                .await?
                .ok_or_else(|| LedgerError::not_found("Invoice", invoice_id))?;
            ensure_voidable(&current)?;

            if let Some(entry_id) = current.journal_entry_id.as_deref() {
                let issued = journal::get_in(&mut tx, entry_id)
                    .await?
                    .ok_or_else(|| LedgerError::not_found("Journal entry", entry_id))?;
                reverse_in(&mut tx, &issued, actor, entry_date).await?;
            }

            invoice::update_state(
                &mut tx,
                &current.id,
                current.status,
                InvoiceStatus::Void,
                current.amount_paid_cents,
                None,
                Utc::now(),
            )
            .await?;
            tx.commit().await?;

            info!(invoice_id = %invoice_id, from = %current.status, "Invoice voided");
            Ok(Invoice {
                status: InvoiceStatus::Void,
                ..current
            })
        })
        .await
    }

    pub async fn get(&self, invoice_id: &str) -> LedgerResult<Invoice> {
        self.db
            .invoices()
            .get(invoice_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Invoice", invoice_id))
    }

    /// Issued or partially paid invoices of a branch.
    pub async fn open_for_branch(&self, tenant_id: &str, branch_id: &str) -> LedgerResult<Vec<Invoice>> {
        Ok(self.db.invoices().open_for_branch(tenant_id, branch_id).await?)
    }
}

// =============================================================================
// Expenses
// =============================================================================

/// An expense before it is recorded. `amount_cents` is net of VAT.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewExpense {
    pub tenant_id: String,
    pub branch_id: String,
    pub category: ExpenseCategory,
    pub description: String,
    pub amount_cents: i64,
    pub vat_cents: i64,
    pub expense_date: NaiveDate,
}

/// Operating expense service.
#[derive(Debug, Clone)]
pub struct ExpenseService {
    db: Database,
    config: Arc<LedgerConfig>,
}

impl ExpenseService {
    pub fn new(db: Database, config: Arc<LedgerConfig>) -> Self {
        ExpenseService { db, config }
    }

    /// Records a pending expense. No ledger effect.
    pub async fn record(&self, new: NewExpense) -> LedgerResult<Expense> {
        validate_required("tenant_id", &new.tenant_id)?;
        validate_required("branch_id", &new.branch_id)?;
        validate_name("description", &new.description, 500)?;
        validate_amount_cents("amount_cents", new.amount_cents)?;
        validate_price_cents("vat_cents", new.vat_cents)?;

        let now = Utc::now();
        let recorded = Expense {
            id: Uuid::new_v4().to_string(),
            tenant_id: new.tenant_id,
            branch_id: new.branch_id,
            category: new.category,
            description: new.description.trim().to_string(),
            amount_cents: new.amount_cents,
            vat_cents: new.vat_cents,
            expense_date: new.expense_date,
            status: ExpenseStatus::Pending,
            journal_entry_id: None,
            payment_entry_id: None,
            created_at: now,
            updated_at: now,
        };
        self.db.expenses().insert(&recorded).await?;
        Ok(recorded)
    }

    /// Approves a pending expense: Dr category account, Dr VAT receivable /
    /// Cr Payable for the gross.
    pub async fn approve(&self, expense_id: &str, actor: &str) -> LedgerResult<Expense> {
        validate_required("actor", actor)?;
        let accounts = &self.config.accounts;

        with_retry(&self.config.retry, "expense_approve", || async {
            let mut tx = self.db.begin().await?;
            let current = expense::get_in(&mut tx, expense_id)
                .await?
                .ok_or_else(|| LedgerError::not_found("Expense", expense_id))?;
            ensure_expense_transition(&current.id, current.status, ExpenseStatus::Approved)?;

            let tenant = current.tenant_id.as_str();
            let expense_account =
                resolve_account(&mut tx, tenant, accounts.expense_account(current.category)).await?;
            let vat_receivable = resolve_account(&mut tx, tenant, &accounts.vat_receivable).await?;
            let payable = resolve_account(&mut tx, tenant, &accounts.payable).await?;

            let (entry, _) = post_if_absent_in(&mut tx, tenant, reference::EXPENSE, &current.id, actor, || {
                NewJournalEntry::new(
                    tenant,
                    current.expense_date,
                    format!("{} expense: {}", current.category, current.description),
                    actor,
                )
                .line(NewJournalLine::debit(&expense_account, Money::from_cents(current.amount_cents)))
                .line_if_nonzero(NewJournalLine::debit(&vat_receivable, Money::from_cents(current.vat_cents)))
                .line(NewJournalLine::credit(&payable, current.gross()))
                .for_branch(&current.branch_id)
            })
            .await?;

            expense::transition(
                &mut tx,
                &current.id,
                ExpenseStatus::Pending,
                ExpenseStatus::Approved,
                &entry.id,
                Utc::now(),
            )
            .await?;
            tx.commit().await?;

            info!(expense_id = %expense_id, entry_id = %entry.id, "Expense approved");
            Ok(Expense {
                status: ExpenseStatus::Approved,
                journal_entry_id: Some(entry.id),
                ..current
            })
        })
        .await
    }

    /// Pays an approved expense: Dr Payable / Cr Cash.
    pub async fn mark_paid(
        &self,
        expense_id: &str,
        actor: &str,
        entry_date: Option<NaiveDate>,
    ) -> LedgerResult<Expense> {
        validate_required("actor", actor)?;
        let entry_date = entry_date.unwrap_or_else(|| Utc::now().date_naive());
        let accounts = &self.config.accounts;

        with_retry(&self.config.retry, "expense_paid", || async {
            let mut tx = self.db.begin().await?;
            let current = expense::get_in(&mut tx, expense_id)
                .await?
                .ok_or_else(|| LedgerError::not_found("Expense", expense_id))?;
            ensure_expense_transition(&current.id, current.status, ExpenseStatus::Paid)?;

            let tenant = current.tenant_id.as_str();
            let payable = resolve_account(&mut tx, tenant, &accounts.payable).await?;
            let cash = resolve_account(&mut tx, tenant, &accounts.cash).await?;

            let (entry, _) =
                post_if_absent_in(&mut tx, tenant, reference::EXPENSE_PAYMENT, &current.id, actor, || {
                    NewJournalEntry::new(
                        tenant,
                        entry_date,
                        format!("Payment of expense: {}", current.description),
                        actor,
                    )
                    .line(NewJournalLine::debit(&payable, current.gross()))
                    .line(NewJournalLine::credit(&cash, current.gross()))
                    .for_branch(&current.branch_id)
                })
                .await?;

            expense::transition(
                &mut tx,
                &current.id,
                ExpenseStatus::Approved,
                ExpenseStatus::Paid,
                &entry.id,
                Utc::now(),
            )
            .await?;
            tx.commit().await?;

            info!(expense_id = %expense_id, entry_id = %entry.id, "Expense paid");
            Ok(Expense {
                status: ExpenseStatus::Paid,
                payment_entry_id: Some(entry.id),
                ..current
            })
        })
        .await
    }

    pub async fn get(&self, expense_id: &str) -> LedgerResult<Expense> {
        self.db
            .expenses()
            .get(expense_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Expense", expense_id))
    }

    pub async fn list_by_status(
        &self,
        tenant_id: &str,
        branch_id: &str,
        status: ExpenseStatus,
    ) -> LedgerResult<Vec<Expense>> {
        Ok(self.db.expenses().list_by_status(tenant_id, branch_id, status).await?)
    }
}
