//! # Invoice and Expense Rules
//!
//! ## Invoice Lifecycle
//! ```text
//!            issue               pay (partial)          pay (rest)
//!   draft ──────────► issued ───────────────► partially_paid ─────► paid
//!     │                 │  └──────────────── pay (full) ─────────────┘
//!     │ void            │ void (nothing paid)
//!     ▼                 ▼
//!   void              void
//! ```
//!
//! Payment is recorded as the new absolute `amount_paid`. It may only grow,
//! may never exceed the total, and reaching the total is the only way to
//! `paid`.
//!
//! ## Expense Lifecycle
//! `pending → approved → paid`. Approval is the first ledger impact.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{ExpenseStatus, Invoice, InvoiceStatus, TaxRate};

/// An invoice line before it is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewInvoiceLine {
    pub description: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub tax_rate_bps: u32,
}

impl NewInvoiceLine {
    /// Net line total and its VAT.
    pub fn amounts(&self) -> (Money, Money) {
        let net = Money::from_cents(self.unit_price_cents).multiply_quantity(self.quantity);
        let tax = net.calculate_tax(TaxRate::from_bps(self.tax_rate_bps));
        (net, tax)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InvoiceTotals {
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
}

/// VAT is computed and rounded per line, then summed.
///
/// ```rust
/// use cafe_core::subledger::{invoice_totals, NewInvoiceLine};
///
/// let totals = invoice_totals(&[NewInvoiceLine {
///     description: "Catering: 20 lattes".to_string(),
///     quantity: 20,
///     unit_price_cents: 450,
///     tax_rate_bps: 1400,
/// }]);
/// assert_eq!(totals.subtotal_cents, 9000);
/// assert_eq!(totals.tax_cents, 1260);
/// assert_eq!(totals.total_cents, 10260);
/// ```
pub fn invoice_totals(lines: &[NewInvoiceLine]) -> InvoiceTotals {
    let (subtotal, tax) = lines.iter().fold((Money::zero(), Money::zero()), |(s, t), line| {
        let (net, vat) = line.amounts();
        (s + net, t + vat)
    });
    InvoiceTotals {
        subtotal_cents: subtotal.cents(),
        tax_cents: tax.cents(),
        total_cents: (subtotal + tax).cents(),
    }
}

fn invoice_status_error(invoice: &Invoice, operation: &str) -> CoreError {
    CoreError::InvalidInvoiceStatus {
        invoice_id: invoice.id.clone(),
        status: invoice.status.to_string(),
        operation: operation.to_string(),
    }
}

/// Only drafts can be issued, and only if there is something to bill.
pub fn ensure_issuable(invoice: &Invoice) -> CoreResult<()> {
    if invoice.status != InvoiceStatus::Draft {
        return Err(invoice_status_error(invoice, "issue"));
    }
    if invoice.total_cents <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "invoice total".to_string(),
        }
        .into());
    }
    Ok(())
}

/// Status after setting the absolute amount paid to `new_amount_paid`.
///
/// Returns the current status unchanged when the amount is unchanged.
pub fn payment_status(invoice: &Invoice, new_amount_paid: Money) -> CoreResult<InvoiceStatus> {
    match invoice.status {
        InvoiceStatus::Issued | InvoiceStatus::PartiallyPaid | InvoiceStatus::Paid => {}
        InvoiceStatus::Draft | InvoiceStatus::Void => {
            return Err(invoice_status_error(invoice, "record a payment"))
        }
    }

    if new_amount_paid.is_negative() {
        return Err(ValidationError::OutOfRange {
            field: "amount_paid".to_string(),
            min: 0,
            max: invoice.total_cents,
        }
        .into());
    }
    if new_amount_paid > invoice.total() {
        return Err(CoreError::PaymentExceedsTotal {
            invoice_id: invoice.id.clone(),
            amount_paid: new_amount_paid.cents(),
            total: invoice.total_cents,
        });
    }
    if new_amount_paid < invoice.amount_paid() {
        return Err(CoreError::PaymentDecrease {
            invoice_id: invoice.id.clone(),
            current: invoice.amount_paid_cents,
            requested: new_amount_paid.cents(),
        });
    }

    Ok(if new_amount_paid == invoice.total() {
        InvoiceStatus::Paid
    } else if new_amount_paid.is_positive() {
        InvoiceStatus::PartiallyPaid
    } else {
        InvoiceStatus::Issued
    })
}

/// Drafts and issued-but-unpaid invoices can be voided.
pub fn ensure_voidable(invoice: &Invoice) -> CoreResult<()> {
    match invoice.status {
        InvoiceStatus::Draft => Ok(()),
        InvoiceStatus::Issued if invoice.amount_paid_cents == 0 => Ok(()),
        _ => Err(invoice_status_error(invoice, "void")),
    }
}

/// Checks an expense status transition.
pub fn ensure_expense_transition(
    expense_id: &str,
    from: ExpenseStatus,
    to: ExpenseStatus,
) -> CoreResult<()> {
    match (from, to) {
        (ExpenseStatus::Pending, ExpenseStatus::Approved)
        | (ExpenseStatus::Approved, ExpenseStatus::Paid) => Ok(()),
        _ => Err(CoreError::InvalidExpenseStatus {
            expense_id: expense_id.to_string(),
            status: from.to_string(),
            operation: match to {
                ExpenseStatus::Approved => "approve",
                ExpenseStatus::Paid => "mark paid",
                ExpenseStatus::Pending => "reopen",
            }
            .to_string(),
        }),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
