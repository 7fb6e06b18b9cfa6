//! Shared fixtures for the engine tests.

use chrono::NaiveDate;
use tempfile::TempDir;

use cafe_core::journal::{NewJournalEntry, NewJournalLine};
use cafe_core::{Addon, Money, Product, RawItem, RawItemCategory};

use crate::config::LedgerConfig;
use crate::Ledger;

pub const TENANT: &str = "tenant-1";
pub const BRANCH: &str = "branch-1";

/// In-memory ledger with the default chart seeded for [`TENANT`].
pub async fn seeded_ledger() -> Ledger {
    let ledger = Ledger::open(LedgerConfig::in_memory()).await.unwrap();
    ledger.chart().seed_default_chart(TENANT).await.unwrap();
    ledger
}

/// File-backed ledger with a real pool, for concurrency tests.
pub async fn file_ledger() -> (Ledger, TempDir) {
    let dir = TempDir::new().unwrap();
    let mut config = LedgerConfig::in_memory();
    config.database.path = dir.path().join("ledger.db");
    config.database.max_connections = 4;
    config.retry.max_attempts = 20;

    let ledger = Ledger::open(config).await.unwrap();
    ledger.chart().seed_default_chart(TENANT).await.unwrap();
    (ledger, dir)
}

pub async fn account_id(ledger: &Ledger, number: &str) -> String {
    ledger
        .chart()
        .account_by_number(TENANT, number)
        .await
        .unwrap()
        .unwrap_or_else(|| panic!("account {} missing", number))
        .id
}

/// Creates and posts a two-line entry.
pub async fn post(ledger: &Ledger, date: NaiveDate, debit_number: &str, credit_number: &str, cents: i64) {
    let debit = account_id(ledger, debit_number).await;
    let credit = account_id(ledger, credit_number).await;
    let amount = Money::from_cents(cents);

    let draft = ledger
        .journal()
        .create(
            NewJournalEntry::new(TENANT, date, format!("{} / {}", debit_number, credit_number), "tester")
                .line(NewJournalLine::debit(debit, amount))
                .line(NewJournalLine::credit(credit, amount)),
        )
        .await
        .unwrap();
    ledger.journal().post(&draft.id, "tester").await.unwrap();
}

/// A small cafe menu.
pub struct Cafe {
    pub beans: RawItem,
    pub milk: RawItem,
    pub syrup: RawItem,
    /// 18 g beans.
    pub espresso: Product,
    /// 18 g beans, 200 ml milk.
    pub latte: Product,
    /// 20 ml syrup per unit.
    pub vanilla: Addon,
}

pub async fn cafe_catalog(ledger: &Ledger) -> Cafe {
    let recipes = ledger.recipes();

    let beans = recipes
        .create_raw_item(TENANT, "Espresso beans", "g", 2_500, RawItemCategory::Ingredient)
        .await
        .unwrap();
    let milk = recipes
        .create_raw_item(TENANT, "Whole milk", "l", 120_000, RawItemCategory::Ingredient)
        .await
        .unwrap();
    let syrup = recipes
        .create_raw_item(TENANT, "Vanilla syrup", "ml", 1_500, RawItemCategory::Ingredient)
        .await
        .unwrap();

    let espresso = recipes.create_product(TENANT, "Espresso", 300, 1_400).await.unwrap();
    recipes
        .add_recipe_line(&espresso.id, &beans.id, 18.0, "g", None)
        .await
        .unwrap();

    let latte = recipes.create_product(TENANT, "Latte", 450, 1_400).await.unwrap();
    recipes
        .add_recipe_line(&latte.id, &beans.id, 18.0, "g", None)
        .await
        .unwrap();
    recipes
        .add_recipe_line(&latte.id, &milk.id, 200.0, "ml", Some("steamed"))
        .await
        .unwrap();

    let vanilla = recipes.create_addon(TENANT, "Vanilla shot", 60).await.unwrap();
    recipes
        .add_addon_recipe_line(&vanilla.id, &syrup.id, 20.0, "ml", None)
        .await
        .unwrap();

    Cafe {
        beans,
        milk,
        syrup,
        espresso,
        latte,
        vanilla,
    }
}
