//! # Domain Types
//!
//! Core domain types shared by the costing engine and the ledger.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  CATALOG                 STOCK                    LEDGER                │
//! │  ─────────────────       ─────────────────        ─────────────────     │
//! │  RawItem                 BranchStock              Account               │
//! │  Product ──┐             StockMovement            JournalEntry          │
//! │  Addon ────┤             StockAdjustment          └── JournalLine       │
//! │            ▼                                                            │
//! │  RecipeLine / AddonRecipeLine                     SUBLEDGERS            │
//! │                                                   ─────────────────     │
//! │  ORDER INPUT                                      Invoice               │
//! │  ─────────────────                                └── InvoiceLine       │
//! │  OrderLineItem                                    Expense               │
//! │  └── SelectedAddon                                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! All ids are UUID v4 strings. Money fields are integer cents with a
//! `_cents` suffix; raw-material cost is millicents.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::money::{Money, UnitCost};

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// 1 basis point = 0.01%, so 1400 bps = 14% VAT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

// =============================================================================
// Catalog
// =============================================================================

/// What a raw item is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum RawItemCategory {
    /// Beans, milk, syrups.
    #[default]
    Ingredient,
    /// Cups, lids, sleeves.
    Packaging,
    /// Napkins, stirrers, cleaning supplies.
    Consumable,
    Other,
}

/// A raw material held in stock and consumed by recipes.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct RawItem {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    /// Stocking unit. Branch stock and movements are measured in this unit.
    pub unit: String,
    /// Cost per stocking unit in millicents. Updated on purchase receipt.
    pub unit_cost_millicents: i64,
    pub category: RawItemCategory,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl RawItem {
    #[inline]
    pub fn unit_cost(&self) -> UnitCost {
        UnitCost::from_millicents(self.unit_cost_millicents)
    }
}

/// A sellable menu product.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub price_cents: i64,
    pub tax_rate_bps: u32,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Product {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    #[inline]
    pub fn tax_rate(&self) -> TaxRate {
        TaxRate::from_bps(self.tax_rate_bps)
    }
}

/// An optional extra selectable on an order line (extra shot, syrup).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Addon {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub price_cents: i64,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Raw-material consumption of one unit of a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct RecipeLine {
    pub id: String,
    pub product_id: String,
    pub raw_item_id: String,
    pub quantity: f64,
    /// Recipe unit; converted to the raw item's stocking unit at costing time.
    pub unit: String,
    pub note: Option<String>,
}

/// Raw-material consumption of one unit of an add-on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct AddonRecipeLine {
    pub id: String,
    pub addon_id: String,
    pub raw_item_id: String,
    pub quantity: f64,
    pub unit: String,
    pub note: Option<String>,
}

// =============================================================================
// Order Input
// =============================================================================

/// An add-on chosen on an order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SelectedAddon {
    pub addon_id: String,
    /// Add-on units per product unit (two extra shots = 2).
    pub quantity: i64,
}

/// One line of an order handed to the costing engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderLineItem {
    pub product_id: String,
    pub quantity: i64,
    #[serde(default)]
    pub addons: Vec<SelectedAddon>,
}

impl OrderLineItem {
    pub fn new(product_id: impl Into<String>, quantity: i64) -> Self {
        OrderLineItem {
            product_id: product_id.into(),
            quantity,
            addons: Vec::new(),
        }
    }

    pub fn with_addon(mut self, addon_id: impl Into<String>, quantity: i64) -> Self {
        self.addons.push(SelectedAddon {
            addon_id: addon_id.into(),
            quantity,
        });
        self
    }
}

// =============================================================================
// Branch Stock
// =============================================================================

/// Why stock moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum MovementType {
    Purchase,
    /// Manual count correction, waste.
    Adjustment,
    /// Consumed by an order.
    Deduction,
    /// Moved between branches.
    Transfer,
}

impl MovementType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            MovementType::Purchase => "purchase",
            MovementType::Adjustment => "adjustment",
            MovementType::Deduction => "deduction",
            MovementType::Transfer => "transfer",
        }
    }
}

impl fmt::Display for MovementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// On-hand quantity of one raw item at one branch.
///
/// `current_quantity` goes negative only through a deduction that was
/// reported as a shortage. It is never clamped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct BranchStock {
    pub branch_id: String,
    pub raw_item_id: String,
    pub current_quantity: f64,
    pub min_stock_level: f64,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl BranchStock {
    /// At or below the restock threshold.
    pub fn is_low(&self) -> bool {
        self.current_quantity <= self.min_stock_level
    }
}

/// Append-only record of a single stock adjustment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockMovement {
    pub id: String,
    pub branch_id: String,
    pub raw_item_id: String,
    pub delta: f64,
    pub previous_quantity: f64,
    pub new_quantity: f64,
    pub movement_type: MovementType,
    pub reference_id: Option<String>,
    pub actor: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Result of an atomic stock adjustment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockAdjustment {
    pub previous_quantity: f64,
    pub new_quantity: f64,
    pub movement: StockMovement,
}

// =============================================================================
// Chart of Accounts
// =============================================================================

/// The five account classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    Asset,
    Liability,
    Equity,
    Revenue,
    Expense,
}

impl AccountType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            AccountType::Asset => "asset",
            AccountType::Liability => "liability",
            AccountType::Equity => "equity",
            AccountType::Revenue => "revenue",
            AccountType::Expense => "expense",
        }
    }

    /// Assets and expenses grow with debits; the rest grow with credits.
    pub const fn is_debit_normal(&self) -> bool {
        matches!(self, AccountType::Asset | AccountType::Expense)
    }

    /// Balance in this type's normal direction.
    ///
    /// ```rust
    /// use cafe_core::AccountType;
    ///
    /// assert_eq!(AccountType::Asset.signed_balance(500, 200), 300);
    /// assert_eq!(AccountType::Revenue.signed_balance(500, 200), -300);
    /// ```
    pub const fn signed_balance(&self, debit_cents: i64, credit_cents: i64) -> i64 {
        if self.is_debit_normal() {
            debit_cents - credit_cents
        } else {
            credit_cents - debit_cents
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A ledger account. Balances are derived from posted lines, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Account {
    pub id: String,
    pub tenant_id: String,
    /// Unique per tenant.
    pub account_number: String,
    pub name: String,
    pub account_type: AccountType,
    pub parent_account_id: Option<String>,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Journal
// =============================================================================

/// Journal entry lifecycle: draft → posted, or draft → void.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    #[default]
    Draft,
    /// Immutable. Corrected only by a reversing entry.
    Posted,
    Void,
}

impl EntryStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::Draft => "draft",
            EntryStatus::Posted => "posted",
            EntryStatus::Void => "void",
        }
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A balanced, multi-line journal entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct JournalEntry {
    pub id: String,
    pub tenant_id: String,
    #[ts(as = "String")]
    pub entry_date: NaiveDate,
    pub description: String,
    pub status: EntryStatus,
    /// Business event kind, e.g. `order_cogs`. See [`reference`].
    pub reference_type: Option<String>,
    pub reference_id: Option<String>,
    pub created_by: String,
    pub posted_by: Option<String>,
    #[ts(as = "Option<String>")]
    pub posted_at: Option<DateTime<Utc>>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    pub lines: Vec<JournalLine>,
}

impl JournalEntry {
    pub fn total_debits(&self) -> Money {
        self.lines.iter().map(|l| Money::from_cents(l.debit_cents)).sum()
    }

    pub fn total_credits(&self) -> Money {
        self.lines.iter().map(|l| Money::from_cents(l.credit_cents)).sum()
    }
}

/// One side of a journal entry. Exactly one of debit/credit is non-zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct JournalLine {
    pub id: String,
    pub entry_id: String,
    pub line_number: i64,
    pub account_id: String,
    pub debit_cents: i64,
    pub credit_cents: i64,
    pub description: Option<String>,
    pub branch_id: Option<String>,
}

/// Reference types used as idempotency keys for automatic postings.
pub mod reference {
    pub const ORDER_COGS: &str = "order_cogs";
    pub const ORDER_SALE: &str = "order_sale";
    pub const INVOICE: &str = "invoice";
    pub const INVOICE_PAYMENT: &str = "invoice_payment";
    pub const EXPENSE: &str = "expense";
    pub const EXPENSE_PAYMENT: &str = "expense_payment";
    pub const PURCHASE: &str = "purchase";
    pub const REVERSAL: &str = "reversal";
}

// =============================================================================
// Invoices
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    /// No ledger impact yet.
    #[default]
    Draft,
    Issued,
    PartiallyPaid,
    Paid,
    Void,
}

impl InvoiceStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Issued => "issued",
            InvoiceStatus::PartiallyPaid => "partially_paid",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Void => "void",
        }
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A sales invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Invoice {
    pub id: String,
    pub tenant_id: String,
    pub branch_id: String,
    pub customer_name: String,
    pub customer_email: Option<String>,
    pub customer_tax_id: Option<String>,
    #[ts(as = "String")]
    pub issue_date: NaiveDate,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub amount_paid_cents: i64,
    pub status: InvoiceStatus,
    /// Set when the invoice is issued.
    pub journal_entry_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    pub lines: Vec<InvoiceLine>,
}

impl Invoice {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    #[inline]
    pub fn amount_paid(&self) -> Money {
        Money::from_cents(self.amount_paid_cents)
    }

    #[inline]
    pub fn balance_due(&self) -> Money {
        self.total() - self.amount_paid()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct InvoiceLine {
    pub id: String,
    pub invoice_id: String,
    pub line_number: i64,
    pub description: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub tax_rate_bps: u32,
    /// unit_price × quantity, before VAT.
    pub line_total_cents: i64,
    pub tax_cents: i64,
}

// =============================================================================
// Expenses
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ExpenseStatus {
    #[default]
    Pending,
    Approved,
    Paid,
}

impl ExpenseStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ExpenseStatus::Pending => "pending",
            ExpenseStatus::Approved => "approved",
            ExpenseStatus::Paid => "paid",
        }
    }
}

impl fmt::Display for ExpenseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ExpenseCategory {
    Rent,
    Utilities,
    Wages,
    Supplies,
    Maintenance,
    Marketing,
    Other,
}

impl ExpenseCategory {
    pub const ALL: [ExpenseCategory; 7] = [
        ExpenseCategory::Rent,
        ExpenseCategory::Utilities,
        ExpenseCategory::Wages,
        ExpenseCategory::Supplies,
        ExpenseCategory::Maintenance,
        ExpenseCategory::Marketing,
        ExpenseCategory::Other,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            ExpenseCategory::Rent => "rent",
            ExpenseCategory::Utilities => "utilities",
            ExpenseCategory::Wages => "wages",
            ExpenseCategory::Supplies => "supplies",
            ExpenseCategory::Maintenance => "maintenance",
            ExpenseCategory::Marketing => "marketing",
            ExpenseCategory::Other => "other",
        }
    }

    /// Account in the default chart that this category is expensed to.
    pub const fn default_account_number(&self) -> &'static str {
        match self {
            ExpenseCategory::Rent => "6100",
            ExpenseCategory::Utilities => "6200",
            ExpenseCategory::Wages => "6300",
            ExpenseCategory::Supplies => "6400",
            ExpenseCategory::Maintenance => "6500",
            ExpenseCategory::Marketing => "6600",
            ExpenseCategory::Other => "6900",
        }
    }
}

impl fmt::Display for ExpenseCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A purchase or operating expense awaiting approval and payment.
///
/// `amount_cents` is the net amount; VAT is carried separately and the
/// payable is `amount + vat`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Expense {
    pub id: String,
    pub tenant_id: String,
    pub branch_id: String,
    pub category: ExpenseCategory,
    pub description: String,
    pub amount_cents: i64,
    pub vat_cents: i64,
    #[ts(as = "String")]
    pub expense_date: NaiveDate,
    pub status: ExpenseStatus,
    /// Set on approval.
    pub journal_entry_id: Option<String>,
    /// Set when paid.
    pub payment_entry_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Expense {
    /// Amount owed to the supplier.
    #[inline]
    pub fn gross(&self) -> Money {
        Money::from_cents(self.amount_cents + self.vat_cents)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tax_rate_from_bps() {
        let rate = TaxRate::from_bps(1400);
        assert_eq!(rate.bps(), 1400);
        assert!((rate.percentage() - 14.0).abs() < 0.001);
    }

    #[test]
    fn test_normal_balance_direction() {
        assert!(AccountType::Asset.is_debit_normal());
        assert!(AccountType::Expense.is_debit_normal());
        assert!(!AccountType::Liability.is_debit_normal());
        assert!(!AccountType::Equity.is_debit_normal());
        assert!(!AccountType::Revenue.is_debit_normal());

        assert_eq!(AccountType::Liability.signed_balance(100, 400), 300);
        assert_eq!(AccountType::Expense.signed_balance(100, 400), -300);
    }

    #[test]
    fn test_status_defaults() {
        assert_eq!(EntryStatus::default(), EntryStatus::Draft);
        assert_eq!(InvoiceStatus::default(), InvoiceStatus::Draft);
        assert_eq!(ExpenseStatus::default(), ExpenseStatus::Pending);
    }

    #[test]
    fn test_enum_serde_names() {
        let json = serde_json::to_string(&InvoiceStatus::PartiallyPaid).unwrap();
        assert_eq!(json, "\"partially_paid\"");
        let json = serde_json::to_string(&MovementType::Deduction).unwrap();
        assert_eq!(json, "\"deduction\"");
    }

    #[test]
    fn test_order_line_deserializes_without_addons() {
        let line: OrderLineItem =
            serde_json::from_str(r#"{"product_id":"p1","quantity":2}"#).unwrap();
        assert_eq!(line, OrderLineItem::new("p1", 2));
    }

    #[test]
    fn test_expense_category_accounts() {
        for category in ExpenseCategory::ALL {
            assert!(category.default_account_number().starts_with('6'));
        }
    }
}
