//! # Seed Data Generator
//!
//! Populates the database with a sample catalog for development.
//!
//! ## Usage
//! ```bash
//! # Seed the default development database
//! cargo run -p emporium-db --bin seed
//!
//! # Specify database path
//! cargo run -p emporium-db --bin seed -- --db ./data/emporium.db
//! ```
//!
//! Each category gets a handful of products with deterministic prices
//! (₹99 to ₹4,999), stock (0 to 60) and a placeholder image. Seeding is
//! skipped when the catalog already has products.

use anyhow::Context;
use std::env;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use emporium_core::{NewProduct, ProductCategory};
use emporium_db::{Database, DbConfig};

const CATALOG: &[(ProductCategory, &[&str])] = &[
    (
        ProductCategory::Electronics,
        &["Wireless Earbuds", "Bluetooth Speaker", "USB-C Charger", "Smart Watch", "Power Bank"],
    ),
    (
        ProductCategory::Clothing,
        &["Cotton Kurta", "Denim Jacket", "Linen Shirt", "Running Shorts", "Wool Scarf"],
    ),
    (
        ProductCategory::Books,
        &["Field Guide to Birds", "Cookbook of the Coast", "Rust in Practice", "Short Stories"],
    ),
    (
        ProductCategory::Home,
        &["Desk Lamp", "Ceramic Mug Set", "Cotton Bedsheet", "Wall Clock", "Spice Rack"],
    ),
    (
        ProductCategory::Sports,
        &["Yoga Mat", "Cricket Bat", "Skipping Rope", "Football"],
    ),
    (
        ProductCategory::Beauty,
        &["Aloe Face Gel", "Herbal Shampoo", "Sunscreen SPF 50"],
    ),
    (
        ProductCategory::Toys,
        &["Wooden Puzzle", "Building Blocks", "Kite"],
    ),
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = env::args().collect();
    let mut db_path = String::from("./emporium_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Emporium Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./emporium_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let db = Database::new(DbConfig::new(&db_path))
        .await
        .with_context(|| format!("opening {db_path}"))?;

    let existing = db.products().count().await?;
    if existing > 0 {
        warn!(existing, "Catalog already has products, skipping seed");
        return Ok(());
    }

    let mut generated = 0usize;
    for (category, names) in CATALOG {
        for name in names.iter() {
            let product = generate_product(*category, name, generated);
            match db.products().insert(&product).await {
                Ok(_) => generated += 1,
                Err(e) => warn!(name = %name, error = %e, "Failed to insert product"),
            }
        }
    }

    info!(generated, path = %db_path, "Seed complete");
    Ok(())
}

fn generate_product(category: ProductCategory, name: &str, seed: usize) -> NewProduct {
    // ₹99.00 - ₹4,999.00 in whole rupees
    let rupees = 99 + ((seed * 379) % 4_901) as i64;
    let slug = name.to_lowercase().replace(' ', "-");

    NewProduct {
        name: name.to_string(),
        description: format!("{name}, hand-picked for the Emporium catalog."),
        price_cents: rupees * 100,
        category,
        brand: Some("Emporium Basics".to_string()),
        images: vec![format!("https://images.example.com/products/{slug}.jpg")],
        stock: (seed % 61) as i64,
        tags: vec![slug],
    }
}
