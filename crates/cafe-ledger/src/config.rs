//! # Ledger Configuration
//!
//! Configuration for the costing and ledger engines.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     CAFE_DB_PATH=/var/lib/cafe/ledger.db                               │
//! │     CAFE_STRICT_UNITS=true                                             │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/ledger/ledger.toml (Linux)                               │
//! │     ~/Library/Application Support/com.cafe.ledger/ledger.toml (macOS)  │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     ./cafe_ledger.db, default tenant, default chart numbers            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [database]
//! path = "/var/lib/cafe/ledger.db"
//! max_connections = 8
//! busy_timeout_ms = 5000
//!
//! [tenant]
//! id = "00000000-0000-0000-0000-000000000001"
//!
//! [costing]
//! strict_units = false
//! update_unit_cost_on_purchase = true
//!
//! [accounts]
//! cash = "1100"
//! cogs = "5100"
//!
//! [accounts.expenses]
//! rent = "6100"
//!
//! [retry]
//! max_attempts = 5
//! initial_backoff_ms = 20
//! max_backoff_ms = 500
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use cafe_core::chart::numbers;
use cafe_core::validation::validate_account_number;
use cafe_core::{ExpenseCategory, DEFAULT_TENANT_ID};
use cafe_db::DbConfig;

use crate::error::{LedgerError, LedgerResult};

// =============================================================================
// Database Settings
// =============================================================================

/// Where the ledger database lives and how the pool is sized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file path, or `:memory:`.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// How long a writer waits on the SQLite lock (milliseconds).
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u64,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./cafe_ledger.db")
}

fn default_max_connections() -> u32 {
    5
}

fn default_busy_timeout() -> u64 {
    5000
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
            max_connections: default_max_connections(),
            busy_timeout_ms: default_busy_timeout(),
        }
    }
}

impl DatabaseSettings {
    /// Builds the pool configuration.
    pub fn db_config(&self) -> DbConfig {
        if self.path.as_os_str() == ":memory:" {
            return DbConfig::in_memory();
        }
        DbConfig::new(self.path.clone())
            .max_connections(self.max_connections)
            .busy_timeout(Duration::from_millis(self.busy_timeout_ms))
    }
}

// =============================================================================
// Tenant Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantSettings {
    /// Tenant used when a caller does not name one.
    #[serde(default = "default_tenant_id")]
    pub id: String,
}

fn default_tenant_id() -> String {
    DEFAULT_TENANT_ID.to_string()
}

impl Default for TenantSettings {
    fn default() -> Self {
        TenantSettings {
            id: default_tenant_id(),
        }
    }
}

// =============================================================================
// Costing Settings
// =============================================================================

/// Costing behaviour.
///
/// ## Unit Policy
/// ```text
/// strict_units = false (default)     strict_units = true (accounting mode)
/// ──────────────────────────────     ─────────────────────────────────────
/// unknown unit → quantity used       unknown unit → UnmatchedUnit error,
/// unconverted, warning in report     nothing deducted, nothing claimed
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostingSettings {
    #[serde(default)]
    pub strict_units: bool,

    /// Recompute `RawItem.unit_cost` from each purchase receipt line.
    #[serde(default = "default_true")]
    pub update_unit_cost_on_purchase: bool,
}

fn default_true() -> bool {
    true
}

impl Default for CostingSettings {
    fn default() -> Self {
        CostingSettings {
            strict_units: false,
            update_unit_cost_on_purchase: true,
        }
    }
}

// =============================================================================
// Account Settings
// =============================================================================

/// Account numbers used by automatic postings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountSettings {
    #[serde(default = "default_cash")]
    pub cash: String,
    #[serde(default = "default_receivable")]
    pub receivable: String,
    #[serde(default = "default_inventory")]
    pub inventory: String,
    #[serde(default = "default_vat_receivable")]
    pub vat_receivable: String,
    #[serde(default = "default_payable")]
    pub payable: String,
    #[serde(default = "default_vat_payable")]
    pub vat_payable: String,
    #[serde(default = "default_sales")]
    pub sales: String,
    #[serde(default = "default_cogs")]
    pub cogs: String,
    /// Root of the COGS subtree in the income statement.
    #[serde(default = "default_cogs_root")]
    pub cogs_root: String,
    #[serde(default = "default_retained_earnings")]
    pub retained_earnings: String,
    #[serde(default)]
    pub expenses: ExpenseAccounts,
}

fn default_cash() -> String {
    numbers::CASH.to_string()
}
fn default_receivable() -> String {
    numbers::ACCOUNTS_RECEIVABLE.to_string()
}
fn default_inventory() -> String {
    numbers::INVENTORY.to_string()
}
fn default_vat_receivable() -> String {
    numbers::VAT_RECEIVABLE.to_string()
}
fn default_payable() -> String {
    numbers::ACCOUNTS_PAYABLE.to_string()
}
fn default_vat_payable() -> String {
    numbers::VAT_PAYABLE.to_string()
}
fn default_sales() -> String {
    numbers::SALES.to_string()
}
fn default_cogs() -> String {
    numbers::COGS.to_string()
}
fn default_cogs_root() -> String {
    numbers::COGS_ROOT.to_string()
}
fn default_retained_earnings() -> String {
    numbers::RETAINED_EARNINGS.to_string()
}

impl Default for AccountSettings {
    fn default() -> Self {
        AccountSettings {
            cash: default_cash(),
            receivable: default_receivable(),
            inventory: default_inventory(),
            vat_receivable: default_vat_receivable(),
            payable: default_payable(),
            vat_payable: default_vat_payable(),
            sales: default_sales(),
            cogs: default_cogs(),
            cogs_root: default_cogs_root(),
            retained_earnings: default_retained_earnings(),
            expenses: ExpenseAccounts::default(),
        }
    }
}

impl AccountSettings {
    /// The account an approved expense of `category` is debited to.
    pub fn expense_account(&self, category: ExpenseCategory) -> &str {
        let e = &self.expenses;
        match category {
            ExpenseCategory::Rent => &e.rent,
            ExpenseCategory::Utilities => &e.utilities,
            ExpenseCategory::Wages => &e.wages,
            ExpenseCategory::Supplies => &e.supplies,
            ExpenseCategory::Maintenance => &e.maintenance,
            ExpenseCategory::Marketing => &e.marketing,
            ExpenseCategory::Other => &e.other,
        }
    }

    fn all_numbers(&self) -> Vec<(&'static str, &str)> {
        let mut all = vec![
            ("cash", self.cash.as_str()),
            ("receivable", self.receivable.as_str()),
            ("inventory", self.inventory.as_str()),
            ("vat_receivable", self.vat_receivable.as_str()),
            ("payable", self.payable.as_str()),
            ("vat_payable", self.vat_payable.as_str()),
            ("sales", self.sales.as_str()),
            ("cogs", self.cogs.as_str()),
            ("cogs_root", self.cogs_root.as_str()),
            ("retained_earnings", self.retained_earnings.as_str()),
        ];
        for category in ExpenseCategory::ALL {
            all.push((category.as_str(), self.expense_account(category)));
        }
        all
    }
}

/// Per-category expense accounts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpenseAccounts {
    #[serde(default = "default_rent")]
    pub rent: String,
    #[serde(default = "default_utilities")]
    pub utilities: String,
    #[serde(default = "default_wages")]
    pub wages: String,
    #[serde(default = "default_supplies")]
    pub supplies: String,
    #[serde(default = "default_maintenance")]
    pub maintenance: String,
    #[serde(default = "default_marketing")]
    pub marketing: String,
    #[serde(default = "default_other")]
    pub other: String,
}

fn default_rent() -> String {
    ExpenseCategory::Rent.default_account_number().to_string()
}
fn default_utilities() -> String {
    ExpenseCategory::Utilities.default_account_number().to_string()
}
fn default_wages() -> String {
    ExpenseCategory::Wages.default_account_number().to_string()
}
fn default_supplies() -> String {
    ExpenseCategory::Supplies.default_account_number().to_string()
}
fn default_maintenance() -> String {
    ExpenseCategory::Maintenance.default_account_number().to_string()
}
fn default_marketing() -> String {
    ExpenseCategory::Marketing.default_account_number().to_string()
}
fn default_other() -> String {
    ExpenseCategory::Other.default_account_number().to_string()
}

impl Default for ExpenseAccounts {
    fn default() -> Self {
        ExpenseAccounts {
            rent: default_rent(),
            utilities: default_utilities(),
            wages: default_wages(),
            supplies: default_supplies(),
            maintenance: default_maintenance(),
            marketing: default_marketing(),
            other: default_other(),
        }
    }
}

// =============================================================================
// Retry Settings
// =============================================================================

/// Retry policy for a single conflicting store operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Total attempts including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    5
}
fn default_initial_backoff() -> u64 {
    20
}
fn default_max_backoff() -> u64 {
    500
}

impl Default for RetrySettings {
    fn default() -> Self {
        RetrySettings {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

// =============================================================================
// Main Ledger Configuration
// =============================================================================

/// Complete ledger configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub tenant: TenantSettings,

    #[serde(default)]
    pub costing: CostingSettings,

    #[serde(default)]
    pub accounts: AccountSettings,

    #[serde(default)]
    pub retry: RetrySettings,
}

impl LedgerConfig {
    /// Creates a config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults with an in-memory database (for tests and dry runs).
    pub fn in_memory() -> Self {
        let mut config = Self::default();
        config.database.path = PathBuf::from(":memory:");
        config
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (ledger.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> LedgerResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading ledger config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load ledger config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> LedgerResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| LedgerError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| LedgerError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| LedgerError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "Ledger config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> LedgerResult<()> {
        if self.database.path.as_os_str().is_empty() {
            return Err(LedgerError::InvalidConfig("database.path is empty".into()));
        }
        if self.database.max_connections == 0 {
            return Err(LedgerError::InvalidConfig(
                "database.max_connections must be greater than 0".into(),
            ));
        }
        if self.tenant.id.trim().is_empty() {
            return Err(LedgerError::InvalidConfig("tenant.id is empty".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(LedgerError::InvalidConfig(
                "retry.max_attempts must be greater than 0".into(),
            ));
        }
        if self.retry.initial_backoff_ms > self.retry.max_backoff_ms {
            return Err(LedgerError::InvalidConfig(format!(
                "retry.initial_backoff_ms ({}) exceeds retry.max_backoff_ms ({})",
                self.retry.initial_backoff_ms, self.retry.max_backoff_ms
            )));
        }
        for (name, number) in self.accounts.all_numbers() {
            validate_account_number(number).map_err(|e| {
                LedgerError::InvalidConfig(format!("accounts.{}: {}", name, e))
            })?;
        }
        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("CAFE_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Ok(id) = std::env::var("CAFE_TENANT_ID") {
            debug!(tenant_id = %id, "Overriding tenant from environment");
            self.tenant.id = id;
        }

        if let Ok(strict) = std::env::var("CAFE_STRICT_UNITS") {
            match strict.to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => self.costing.strict_units = true,
                "0" | "false" | "no" | "off" => self.costing.strict_units = false,
                _ => warn!(value = %strict, "Unknown CAFE_STRICT_UNITS value in environment"),
            }
        }

        if let Ok(max) = std::env::var("CAFE_DB_MAX_CONNECTIONS") {
            if let Ok(n) = max.parse::<u32>() {
                self.database.max_connections = n;
            }
        }

        if let Ok(attempts) = std::env::var("CAFE_RETRY_MAX_ATTEMPTS") {
            if let Ok(n) = attempts.parse::<u32>() {
                self.retry.max_attempts = n;
            }
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "cafe", "ledger")
            .map(|dirs| dirs.config_dir().join("ledger.toml"))
    }

    /// Returns the default tenant id.
    pub fn tenant_id(&self) -> &str {
        &self.tenant.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LedgerConfig::default();
        assert_eq!(config.tenant.id, DEFAULT_TENANT_ID);
        assert!(!config.costing.strict_units);
        assert_eq!(config.accounts.cogs, "5100");
        assert_eq!(config.accounts.expense_account(ExpenseCategory::Wages), "6300");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = LedgerConfig::default();
        config.retry.max_attempts = 0;
        assert!(config.validate().unwrap_err().is_config_error());

        let mut config = LedgerConfig::default();
        config.retry.initial_backoff_ms = 1000;
        config.retry.max_backoff_ms = 10;
        assert!(config.validate().is_err());

        let mut config = LedgerConfig::default();
        config.accounts.sales = "41 00".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("accounts.sales"));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: LedgerConfig = toml::from_str(
            r#"
            [costing]
            strict_units = true

            [accounts.expenses]
            rent = "6150"
            "#,
        )
        .unwrap();

        assert!(config.costing.strict_units);
        assert!(config.costing.update_unit_cost_on_purchase);
        assert_eq!(config.accounts.expense_account(ExpenseCategory::Rent), "6150");
        assert_eq!(config.accounts.expense_account(ExpenseCategory::Other), "6900");
        assert_eq!(config.database.max_connections, 5);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("ledger.toml");

        let mut config = LedgerConfig::default();
        config.database.path = PathBuf::from("/tmp/cafe.db");
        config.costing.strict_units = true;
        config.save(Some(path.clone())).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("[database]"));
        assert!(contents.contains("[accounts.expenses]"));

        let loaded: LedgerConfig = toml::from_str(&contents).unwrap();
        assert!(loaded.costing.strict_units);
        assert_eq!(loaded.database.path, PathBuf::from("/tmp/cafe.db"));
    }

    #[test]
    fn test_in_memory_db_config() {
        let db = LedgerConfig::in_memory().database.db_config();
        assert_eq!(db.max_connections, 1);
    }
}
