//! # Seed Data Generator
//!
//! Populates a development database with a perfume catalog, sample coupons
//! and a referral partner.
//!
//! ## Usage
//! ```bash
//! # Seed ./aroma_dev.db
//! cargo run -p aroma-db --bin seed
//!
//! # Specify database path
//! cargo run -p aroma-db --bin seed -- --db ./data/aroma.db
//! ```
//!
//! ## Generated Data
//! - Every house × fragrance × bottle size combination
//!   - SKU: `{HOUSE}-{FRAGRANCE}-{ML}`
//!   - Price grows with bottle size, every fifth product on sale
//!   - Stock 0 - 40
//! - Coupons `SAVE20` (20%), `WELCOME10` (10.00 off orders over 50.00)
//! - Partner `SCENTBLOG` (8% commission)
//!
//! Tiers and cashback bonuses come from the migrations.

use aroma_core::coupon::NewCoupon;
use aroma_core::{DiscountType, Product, DEFAULT_BASE_CASHBACK_BPS};
use aroma_db::repository::partner::NewPartner;
use aroma_db::{Database, DbConfig};
use chrono::Utc;
use std::env;
use uuid::Uuid;

/// Houses and their fragrances.
const HOUSES: &[(&str, &str, &[&str])] = &[
    (
        "MKL",
        "Maison Kael",
        &["Oud Noir", "Vetiver Fumé", "Cuir Sauvage", "Ambre Nuit"],
    ),
    (
        "AVT",
        "Atelier Vert",
        &["Rose Absolue", "Figuier", "Thé Blanc", "Iris Poudré"],
    ),
    (
        "LMR",
        "Lumière",
        &["Néroli", "Bergamote Soleil", "Jasmin Sambac", "Musc Clair"],
    ),
    (
        "SDB",
        "Santal du Bois",
        &["Santal 33", "Cèdre Atlas", "Tabac Doux", "Encens Sacré"],
    ),
];

/// Bottle sizes in ml with their price multiplier in percent.
const SIZES: &[(i64, i64)] = &[(30, 100), (50, 150), (100, 240)];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./aroma_dev.db");

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
                println!("Aroma Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./aroma_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("Aroma Seed Data Generator");
    println!("=========================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    println!();
    println!("Generating products...");

    let mut generated = 0usize;
    for (house_idx, (house_code, house, fragrances)) in HOUSES.iter().enumerate() {
        for (fragrance_idx, fragrance) in fragrances.iter().enumerate() {
            for (ml, multiplier) in SIZES {
                let seed = house_idx * 100 + fragrance_idx * 10 + generated;
                let product = generate_product(house_code, house, fragrance, *ml, *multiplier, seed);

                if let Err(e) = db.products().insert(&product).await {
                    eprintln!("Failed to insert {}: {}", product.sku, e);
                    continue;
                }
                generated += 1;
            }
        }
    }
    println!("✓ Generated {} products", generated);

    println!();
    println!("Creating coupons...");
    for coupon in sample_coupons() {
        match db.coupons().insert(coupon).await {
            Ok(created) => println!("  {} ({:?} {})", created.code, created.discount_type, created.discount_value),
            Err(e) => eprintln!("Failed to create coupon: {}", e),
        }
    }

    let partner = db
        .partners()
        .insert(NewPartner {
            name: "Scent Blog".to_string(),
            referral_code: "SCENTBLOG".to_string(),
            commission_bps: 800,
        })
        .await?;
    println!("✓ Partner {} ({})", partner.name, partner.referral_code);

    println!();
    println!("Verifying FTS index...");
    let results = db.products().search("oud", 10).await?;
    println!("  Search 'oud': {} results", results.len());
    let results = db.products().search("atelier", 10).await?;
    println!("  Search 'atelier': {} results", results.len());

    println!();
    println!("✓ Seed complete!");

    Ok(())
}

fn sample_coupons() -> Vec<NewCoupon> {
    vec![
        NewCoupon {
            code: "SAVE20".to_string(),
            discount_type: DiscountType::Percentage,
            discount_value: 2000,
            min_order_amount_cents: 0,
            max_uses: None,
            valid_from: None,
            valid_until: None,
        },
        NewCoupon {
            code: "WELCOME10".to_string(),
            discount_type: DiscountType::Fixed,
            discount_value: 1000,
            min_order_amount_cents: 5000,
            max_uses: Some(500),
            valid_from: None,
            valid_until: None,
        },
    ]
}

/// Generates a single bottle with deterministic pseudo-random data.
fn generate_product(
    house_code: &str,
    house: &str,
    fragrance: &str,
    ml: i64,
    multiplier: i64,
    seed: usize,
) -> Product {
    let now = Utc::now();

    let fragrance_code: String = fragrance
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(4)
        .collect::<String>()
        .to_uppercase();
    let sku = format!("{}-{}-{}", house_code, fragrance_code, ml);

    // Base 45.00 - 94.00 for 30ml.
    let base_price = 4_500 + ((seed * 37) % 50) as i64 * 100;
    let price_cents = base_price * multiplier / 100;
    let sale_price_cents = (seed % 5 == 0).then(|| price_cents * 85 / 100);

    Product {
        id: Uuid::new_v4().to_string(),
        sku,
        name: format!("{} EDP {}ml", fragrance, ml),
        brand: house.to_string(),
        description: Some(format!("{} by {}", fragrance, house)),
        volume_ml: Some(ml),
        price_cents,
        sale_price_cents,
        cashback_bps: DEFAULT_BASE_CASHBACK_BPS,
        stock: (seed % 41) as i64,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}
