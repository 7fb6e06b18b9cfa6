//! # Seed Data Generator
//!
//! Populates a database with the default chart of accounts and a small demo
//! cafe catalog for development.
//!
//! ## Usage
//! ```bash
//! # Seed ./cafe_dev.db for the default tenant, stock at branch "main"
//! cargo run -p cafe-db --bin seed
//!
//! # Custom database, tenant and branch
//! cargo run -p cafe-db --bin seed -- --db ./data/ledger.db --tenant acme --branch downtown
//! ```
//!
//! ## Generated Data
//! - Default chart of accounts (idempotent: existing numbers are kept)
//! - Raw items: espresso beans, whole milk, 12oz cups, vanilla and caramel syrup
//! - Products: Espresso, Latte, Cappuccino
//! - Add-ons: Vanilla shot, Caramel shot, Extra milk
//! - Opening stock and restock thresholds at the branch

use std::env;

use cafe_core::chart::DEFAULT_CHART;
use cafe_core::{MovementType, RawItemCategory, DEFAULT_TENANT_ID};
use cafe_db::repository::account;
use cafe_db::{Database, DbConfig};

/// (name, stocking unit, unit cost in millicents, category, opening stock, min level)
const RAW_ITEMS: &[(&str, &str, i64, RawItemCategory, f64, f64)] = &[
    ("Espresso Beans", "g", 2_500, RawItemCategory::Ingredient, 5_000.0, 1_000.0),
    ("Whole Milk", "l", 120_000, RawItemCategory::Ingredient, 40.0, 10.0),
    ("Cup 12oz", "pcs", 8_000, RawItemCategory::Packaging, 500.0, 100.0),
    ("Vanilla Syrup", "ml", 1_800, RawItemCategory::Ingredient, 2_000.0, 250.0),
    ("Caramel Syrup", "ml", 1_900, RawItemCategory::Ingredient, 2_000.0, 250.0),
];

/// (name, price in cents, VAT bps, recipe: (raw item, quantity, unit))
const PRODUCTS: &[(&str, i64, u32, &[(&str, f64, &str)])] = &[
    ("Espresso", 300, 1400, &[("Espresso Beans", 18.0, "g"), ("Cup 12oz", 1.0, "pcs")]),
    (
        "Latte",
        450,
        1400,
        &[
            ("Espresso Beans", 18.0, "g"),
            ("Whole Milk", 200.0, "ml"),
            ("Cup 12oz", 1.0, "pcs"),
        ],
    ),
    (
        "Cappuccino",
        420,
        1400,
        &[
            ("Espresso Beans", 18.0, "g"),
            ("Whole Milk", 0.15, "l"),
            ("Cup 12oz", 1.0, "pcs"),
        ],
    ),
];

/// (name, price in cents, per-unit recipe)
const ADDONS: &[(&str, i64, &[(&str, f64, &str)])] = &[
    ("Vanilla shot", 60, &[("Vanilla Syrup", 15.0, "ml")]),
    ("Caramel shot", 60, &[("Caramel Syrup", 15.0, "ml")]),
    ("Extra milk", 40, &[("Whole Milk", 50.0, "ml")]),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./cafe_dev.db");
    let mut tenant_id = String::from(DEFAULT_TENANT_ID);
    let mut branch_id = String::from("main");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--tenant" | "-t" => {
                if i + 1 < args.len() {
                    tenant_id = args[i + 1].clone();
                    i += 1;
                }
            }
            "--branch" | "-b" => {
                if i + 1 < args.len() {
                    branch_id = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Cafe Ledger Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>      Database file path (default: ./cafe_dev.db)");
                println!("  -t, --tenant <ID>    Tenant id (default: {})", DEFAULT_TENANT_ID);
                println!("  -b, --branch <ID>    Branch receiving opening stock (default: main)");
                println!("  -h, --help           Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Cafe Ledger Seed Data Generator");
    println!("==================================");
    println!("Database: {}", db_path);
    println!("Tenant:   {}", tenant_id);
    println!("Branch:   {}", branch_id);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    // Chart of accounts: always safe to re-run.
    let mut tx = db.begin().await?;
    let created = account::seed_chart(&mut tx, &tenant_id, DEFAULT_CHART).await?;
    tx.commit().await?;
    println!(
        "✓ Chart of accounts: {} created, {} already present",
        created,
        DEFAULT_CHART.len() - created
    );

    let catalog = db.catalog();
    let existing = catalog.list_raw_items(&tenant_id).await?;
    if !existing.is_empty() {
        println!("⚠ Tenant already has {} raw items", existing.len());
        println!("  Skipping catalog seed to avoid duplicates.");
        return Ok(());
    }

    println!();
    println!("Creating catalog...");

    let mut item_ids = Vec::with_capacity(RAW_ITEMS.len());
    for (name, unit, cost, category, opening, min_level) in RAW_ITEMS {
        let item = catalog
            .create_raw_item(&tenant_id, name, unit, *cost, *category)
            .await?;
        db.stock()
            .adjust(
                &branch_id,
                &item.id,
                *opening,
                MovementType::Purchase,
                Some("opening-stock"),
                "seed",
            )
            .await?;
        db.stock().set_min_level(&branch_id, &item.id, *min_level).await?;
        println!("  {} ({}): {} on hand", item.name, item.unit, opening);
        item_ids.push((*name, item.id));
    }

    let id_of = |name: &str| {
        item_ids
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, id)| id.clone())
            .ok_or_else(|| format!("unknown raw item in seed recipe: {}", name))
    };

    for (name, price, vat, recipe) in PRODUCTS {
        let product = catalog.create_product(&tenant_id, name, *price, *vat).await?;
        for (item, quantity, unit) in recipe.iter() {
            catalog
                .add_recipe_line(&product.id, &id_of(*item)?, *quantity, unit, None)
                .await?;
        }
        println!("  Product {} [{}]: {} recipe lines", product.name, product.id, recipe.len());
    }

    for (name, price, recipe) in ADDONS {
        let addon = catalog.create_addon(&tenant_id, name, *price).await?;
        for (item, quantity, unit) in recipe.iter() {
            catalog
                .add_addon_recipe_line(&addon.id, &id_of(*item)?, *quantity, unit, None)
                .await?;
        }
        println!("  Add-on {} [{}]", addon.name, addon.id);
    }

    println!();
    println!("✓ Seed complete!");

    Ok(())
}
