//! # Seed Data Generator
//!
//! Populates the database with development inventory.
//!
//! ## Usage
//! ```bash
//! # Seed the default database
//! cargo run -p stockline-db --bin seed
//!
//! # Custom amount of bulk products
//! cargo run -p stockline-db --bin seed -- --count 200
//!
//! # Specify database path
//! cargo run -p stockline-db --bin seed -- --db ./data/stockline.db
//! ```
//!
//! ## Generated Inventory
//! - Single-SKU categories (Phones, Tablets) with IMEI-identified units
//! - Bulk categories (Cables, Chargers, Cases) with counted stock
//!
//! Everything goes through the real product-creation path, so every seeded
//! unit is backed by a purchase ledger entry.

use std::env;

use stockline_core::{ItemKind, SkuKind};
use stockline_db::repository::category::NewCategory;
use stockline_db::repository::product::NewProduct;
use stockline_db::{Database, DbConfig};

/// Single-SKU product lines: (category, names)
const SINGLE_CATEGORIES: &[(&str, SkuKind, &[&str])] = &[
    (
        "Phones",
        SkuKind::Imei,
        &[
            "Galaxy S24",
            "Galaxy A55",
            "iPhone 15",
            "iPhone 15 Pro",
            "Pixel 9",
            "Redmi Note 13",
            "Tecno Spark 20",
            "Infinix Hot 40",
        ],
    ),
    (
        "Tablets",
        SkuKind::Serial,
        &["Galaxy Tab S9", "iPad Air", "Lenovo Tab M10"],
    ),
];

/// Bulk product lines: (category, names)
const BULK_CATEGORIES: &[(&str, &[&str])] = &[
    (
        "Cables",
        &[
            "USB-C Cable 1m",
            "USB-C Cable 2m",
            "Lightning Cable",
            "Micro-USB Cable",
            "HDMI Cable",
            "Aux Cable",
        ],
    ),
    (
        "Chargers",
        &[
            "20W Wall Charger",
            "45W Wall Charger",
            "Car Charger",
            "Wireless Charging Pad",
        ],
    ),
    (
        "Cases",
        &[
            "Clear Case",
            "Silicone Case",
            "Leather Case",
            "Rugged Case",
            "Screen Protector",
        ],
    ),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut count: usize = 50;
    let mut db_path = String::from("./stockline_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(50);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Stockline Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Bulk products to generate (default: 50)");
                println!("  -d, --db <PATH>    Database file path (default: ./stockline_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Stockline Seed Data Generator");
    println!("================================");
    println!("Database: {}", db_path);
    println!();

    // Connect to database
    let config = DbConfig::new(&db_path);
    let db = Database::new(config).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    // Check existing products
    let existing = db.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    println!();
    println!("Seeding inventory...");

    let start = std::time::Instant::now();
    let mut generated = 0usize;
    let mut seed = 0usize;

    // Single-SKU units: one product record per physical unit
    for (category_name, sku_kind, names) in SINGLE_CATEGORIES {
        let category = db
            .categories()
            .create(NewCategory {
                name: category_name.to_string(),
                item_kind: ItemKind::Single,
                sku_kind: *sku_kind,
            })
            .await?;

        for name in *names {
            seed += 1;
            let buying = 20_000 + ((seed * 7919) % 60_000) as i64;
            db.products()
                .create(NewProduct {
                    category_id: category.id.clone(),
                    name: name.to_string(),
                    sku_value: Some(format!("IMEI:3569{:011}", seed)),
                    quantity: 1,
                    buying_price_cents: buying,
                    selling_price_cents: buying * 13 / 10,
                    owner_id: None,
                    actor: Some("seed".to_string()),
                })
                .await?;
            generated += 1;
        }
    }

    // Bulk stock: counted units, merged by name within a category
    'bulk: for (category_name, names) in BULK_CATEGORIES {
        let category = db
            .categories()
            .create(NewCategory {
                name: category_name.to_string(),
                item_kind: ItemKind::Bulk,
                sku_kind: SkuKind::Barcode,
            })
            .await?;

        for name in *names {
            if generated >= count + SINGLE_CATEGORIES.iter().map(|c| c.2.len()).sum::<usize>() {
                break 'bulk;
            }
            seed += 1;
            let buying = 500 + ((seed * 7919) % 5_000) as i64;
            db.products()
                .create(NewProduct {
                    category_id: category.id.clone(),
                    name: name.to_string(),
                    sku_value: Some(format!("4006{:09}", seed)),
                    quantity: (seed % 40 + 1) as i64,
                    buying_price_cents: buying,
                    selling_price_cents: buying * 3 / 2,
                    owner_id: None,
                    actor: Some("seed".to_string()),
                })
                .await?;
            generated += 1;
        }
    }

    let elapsed = start.elapsed();
    println!();
    println!("✓ Generated {} products in {:?}", generated, elapsed);

    // Verify lookups work against the seeded data
    println!();
    println!("Verifying search...");
    let hits = db.products().search("cable", 10).await?;
    println!("  Search 'cable': {} results", hits.len());

    let stats = db.products().stats().await?;
    println!(
        "  Inventory: {} products, value {} cents",
        stats.total_products, stats.inventory_value_cents
    );

    println!();
    println!("✓ Seed complete!");

    Ok(())
}
