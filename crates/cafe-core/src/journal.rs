//! # Journal Rules
//!
//! Construction and validation of journal entries before they touch the
//! database.
//!
//! ## State Machine
//! ```text
//!            post              reverse (new entry)
//!   draft ─────────► posted ─────────────────────► posted mirror
//!     │
//!     │ void
//!     ▼
//!   void
//! ```
//!
//! ## Line Convention
//! Each line is one-sided: exactly one of `debit_cents` / `credit_cents` is
//! non-zero, and neither is negative. An entry needs at least two lines and
//! Σ debit == Σ credit > 0.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{EntryStatus, JournalLine};
use crate::validation::{validate_name, validate_reference, validate_required};

// =============================================================================
// Builders
// =============================================================================

/// A line of an entry that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewJournalLine {
    pub account_id: String,
    pub debit_cents: i64,
    pub credit_cents: i64,
    pub description: Option<String>,
    pub branch_id: Option<String>,
}

impl NewJournalLine {
    pub fn debit(account_id: impl Into<String>, amount: Money) -> Self {
        NewJournalLine {
            account_id: account_id.into(),
            debit_cents: amount.cents(),
            credit_cents: 0,
            description: None,
            branch_id: None,
        }
    }

    pub fn credit(account_id: impl Into<String>, amount: Money) -> Self {
        NewJournalLine {
            account_id: account_id.into(),
            debit_cents: 0,
            credit_cents: amount.cents(),
            description: None,
            branch_id: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_branch(mut self, branch_id: Option<impl Into<String>>) -> Self {
        self.branch_id = branch_id.map(Into::into);
        self
    }
}

/// An entry that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewJournalEntry {
    pub tenant_id: String,
    #[ts(as = "String")]
    pub entry_date: NaiveDate,
    pub description: String,
    pub reference_type: Option<String>,
    pub reference_id: Option<String>,
    pub created_by: String,
    pub lines: Vec<NewJournalLine>,
}

impl NewJournalEntry {
    pub fn new(
        tenant_id: impl Into<String>,
        entry_date: NaiveDate,
        description: impl Into<String>,
        created_by: impl Into<String>,
    ) -> Self {
        NewJournalEntry {
            tenant_id: tenant_id.into(),
            entry_date,
            description: description.into(),
            reference_type: None,
            reference_id: None,
            created_by: created_by.into(),
            lines: Vec::new(),
        }
    }

    pub fn with_reference(
        mut self,
        reference_type: impl Into<String>,
        reference_id: impl Into<String>,
    ) -> Self {
        self.reference_type = Some(reference_type.into());
        self.reference_id = Some(reference_id.into());
        self
    }

    pub fn line(mut self, line: NewJournalLine) -> Self {
        self.lines.push(line);
        self
    }

    /// Adds a line only when the amount is non-zero. For optional VAT lines.
    pub fn line_if_nonzero(self, line: NewJournalLine) -> Self {
        if line.debit_cents == 0 && line.credit_cents == 0 {
            self
        } else {
            self.line(line)
        }
    }

    /// Tags every line with a branch.
    pub fn for_branch(mut self, branch_id: &str) -> Self {
        for line in &mut self.lines {
            line.branch_id = Some(branch_id.to_string());
        }
        self
    }

    pub fn total_debits(&self) -> Money {
        self.lines.iter().map(|l| Money::from_cents(l.debit_cents)).sum()
    }

    pub fn total_credits(&self) -> Money {
        self.lines.iter().map(|l| Money::from_cents(l.credit_cents)).sum()
    }
}

// =============================================================================
// Validation
// =============================================================================

/// Checks every line and the entry totals.
///
/// ```rust
/// use cafe_core::journal::{validate_lines, NewJournalLine};
/// use cafe_core::Money;
///
/// let ok = vec![
///     NewJournalLine::debit("cogs", Money::from_cents(45)),
///     NewJournalLine::credit("inventory", Money::from_cents(45)),
/// ];
/// assert!(validate_lines(&ok).is_ok());
///
/// let bad = vec![
///     NewJournalLine::debit("cogs", Money::from_cents(45)),
///     NewJournalLine::credit("inventory", Money::from_cents(40)),
/// ];
/// assert!(validate_lines(&bad).is_err());
/// ```
pub fn validate_lines(lines: &[NewJournalLine]) -> CoreResult<()> {
    if lines.len() < 2 {
        return Err(CoreError::EmptyEntry);
    }

    for (index, line) in lines.iter().enumerate() {
        let number = index + 1;
        if line.account_id.trim().is_empty() {
            return Err(CoreError::InvalidLine {
                line: number,
                reason: "account is required".to_string(),
            });
        }
        if line.debit_cents < 0 || line.credit_cents < 0 {
            return Err(CoreError::InvalidLine {
                line: number,
                reason: "amounts cannot be negative".to_string(),
            });
        }
        match (line.debit_cents, line.credit_cents) {
            (0, 0) => {
                return Err(CoreError::InvalidLine {
                    line: number,
                    reason: "line has no amount".to_string(),
                })
            }
            (d, c) if d != 0 && c != 0 => {
                return Err(CoreError::InvalidLine {
                    line: number,
                    reason: "line cannot be both debit and credit".to_string(),
                })
            }
            _ => {}
        }
    }

    let debit: i64 = lines.iter().map(|l| l.debit_cents).sum();
    let credit: i64 = lines.iter().map(|l| l.credit_cents).sum();
    if debit != credit {
        return Err(CoreError::UnbalancedEntry { debit, credit });
    }

    Ok(())
}

/// Validates a full entry: header fields and lines.
pub fn validate_entry(entry: &NewJournalEntry) -> CoreResult<()> {
    validate_name("description", &entry.description, 500)?;
    validate_required("tenant_id", &entry.tenant_id)?;
    validate_required("created_by", &entry.created_by)?;
    match (&entry.reference_type, &entry.reference_id) {
        (Some(kind), Some(id)) => validate_reference(kind, id)?,
        (None, None) => {}
        _ => {
            return Err(ValidationError::Required {
                field: "reference".to_string(),
            }
            .into())
        }
    }
    validate_lines(&entry.lines)
}

/// Checks a status transition on an existing entry.
pub fn ensure_transition(entry_id: &str, from: EntryStatus, to: EntryStatus) -> CoreResult<()> {
    match (from, to) {
        (EntryStatus::Draft, EntryStatus::Posted) | (EntryStatus::Draft, EntryStatus::Void) => {
            Ok(())
        }
        _ => Err(CoreError::InvalidEntryStatus {
            entry_id: entry_id.to_string(),
            status: from.to_string(),
            operation: match to {
                EntryStatus::Posted => "post",
                EntryStatus::Void => "void",
                EntryStatus::Draft => "reopen",
            }
            .to_string(),
        }),
    }
}

/// Mirror lines for a reversing entry: every debit becomes a credit and
/// vice versa. Branch tags carry over.
pub fn reversal_lines(lines: &[JournalLine]) -> Vec<NewJournalLine> {
    lines
        .iter()
        .map(|l| NewJournalLine {
            account_id: l.account_id.clone(),
            debit_cents: l.credit_cents,
            credit_cents: l.debit_cents,
            description: l.description.clone(),
            branch_id: l.branch_id.clone(),
        })
        .collect()
}

// =============================================================================
// Unit Tests
// =============================================================================
