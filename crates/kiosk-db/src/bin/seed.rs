//! # Seed Data Generator
//!
//! Populates a kiosk database with a small catalog, a few customers and
//! some purchase history for development.
//!
//! ## Usage
//! ```bash
//! # Seed ./kiosk_dev.db with 20 purchases (default)
//! cargo run -p kiosk-db --bin seed
//!
//! # Custom database and number of purchases
//! cargo run -p kiosk-db --bin seed -- --db ./data/kiosk.db --purchases 200
//! ```
//!
//! ## Generated Data
//! - Categories: Drinks, Snacks, Sweets
//! - Products with a price, stock and purchase cost; sodas get flavour variants
//! - Customers with emails
//! - Purchases spread round-robin over customers, the first few invoiced

use std::env;

use kiosk_core::cart::{cart_total, CheckoutRequest, StockPolicy};
use kiosk_core::{CartLine, CustomerRole, Money, Product, ProductDraft, VariantDraft};
use kiosk_db::{Database, DbConfig};
use rust_decimal::Decimal;

/// Category → (product name, price in major units, stock, cost in cents).
const CATALOG: &[(&str, &str, &[(&str, i64, i64, i64)])] = &[
    (
        "Drinks",
        "cup",
        &[
            ("Club-Mate", 2, 40, 120),
            ("Mineral Water", 1, 60, 35),
            ("Cold Brew", 3, 20, 180),
        ],
    ),
    (
        "Snacks",
        "bag",
        &[
            ("Salted Peanuts", 2, 25, 90),
            ("Pretzels", 1, 30, 55),
            ("Paprika Chips", 2, 25, 110),
        ],
    ),
    (
        "Sweets",
        "candy",
        &[
            ("Chocolate Bar", 1, 50, 65),
            ("Gummy Bears", 1, 45, 70),
            ("Granola Bar", 2, 30, 95),
        ],
    ),
];

/// Flavours of the soda, each (name, stock).
const SODA_FLAVOURS: &[(&str, i64)] = &[("Cola", 24), ("Lime", 18), ("Orange", 12)];

const CUSTOMERS: &[&str] = &["Ada", "Grace", "Linus", "Margaret", "Ken"];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut purchases: usize = 20;
    let mut db_path = String::from("./kiosk_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--purchases" | "-p" => {
                if i + 1 < args.len() {
                    purchases = args[i + 1].parse().unwrap_or(20);
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
                println!("Kiosk Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -p, --purchases <N>  Number of purchases to record (default: 20)");
                println!("  -d, --db <PATH>      Database file path (default: ./kiosk_dev.db)");
                println!("  -h, --help           Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("Kiosk Seed Data Generator");
    println!("=========================");
    println!("Database:  {}", db_path);
    println!("Purchases: {}", purchases);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected to database, migrations applied");

    let existing = db.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    // Catalog
    let mut products: Vec<Product> = Vec::new();
    for (title, icon, items) in CATALOG {
        let category = db.categories().create(title, icon).await?;
        for (name, price, stock, cost_cents) in items.iter() {
            let draft = ProductDraft {
                name: name.to_string(),
                price: Money::from_major(*price),
                image: String::new(),
                stock: *stock,
                purchase_price: Decimal::new(*cost_cents, 2),
                category_id: Some(category.id.clone()),
                related_product_ids: vec![],
                variants: vec![],
            };
            products.push(db.products().create(draft).await?);
        }
    }

    let soda = ProductDraft {
        name: "Soda".to_string(),
        price: Money::from_major(2),
        image: String::new(),
        stock: 0,
        purchase_price: Decimal::ZERO,
        category_id: None,
        related_product_ids: vec![],
        variants: SODA_FLAVOURS
            .iter()
            .map(|(name, stock)| VariantDraft {
                id: None,
                name: name.to_string(),
                price: Money::from_major(2),
                stock: *stock,
                purchase_price: Decimal::new(85, 2),
                image: None,
            })
            .collect(),
    };
    let soda = db.products().create(soda).await?;
    println!("✓ Created {} products", products.len() + 1);

    // Customers
    let mut customers = Vec::new();
    for name in CUSTOMERS {
        let email = format!("{}@example.com", name.to_lowercase());
        customers.push(db.customers().create(name, Some(&email), CustomerRole::User).await?);
    }
    println!("✓ Created {} customers", customers.len());

    // Purchases
    let start = std::time::Instant::now();
    let mut recorded = 0;
    for n in 0..purchases {
        let customer = &customers[n % customers.len()];
        let product = &products[(n * 7) % products.len()];
        let flavour = &soda.variants[n % soda.variants.len()];

        let mut items = vec![CartLine {
            product_id: product.id.clone(),
            name: product.name.clone(),
            price: product.price,
            quantity: 1 + (n % 3) as i64,
            image: product.image.clone(),
            variant_id: None,
            variant_name: None,
        }];
        if n % 4 == 0 {
            items.push(CartLine {
                product_id: soda.id.clone(),
                name: soda.name.clone(),
                price: flavour.price,
                quantity: 1,
                image: String::new(),
                variant_id: Some(flavour.id.clone()),
                variant_name: Some(flavour.name.clone()),
            });
        }

        let total = cart_total(&items);
        let request = CheckoutRequest::for_customer(&customer.id, &customer.name, items, total);
        if let Err(e) = db.transactions().checkout(&request, StockPolicy::Clamp).await {
            eprintln!("Failed to record purchase {}: {}", n, e);
            continue;
        }
        recorded += 1;
    }
    println!("✓ Recorded {} purchases in {:?}", recorded, start.elapsed());

    // Invoice the first two customers so every balance state is represented
    for customer in customers.iter().take(2) {
        let changed = db.transactions().mark_invoice_sent(&customer.id).await?;
        println!("  Invoiced {}: {} transactions", customer.name, changed);
    }

    println!();
    println!("Balances:");
    for row in db.customers().list_with_balances().await? {
        println!(
            "  {:<10} outstanding {:>8}  invoiced {:>8}",
            row.customer.name, row.balance, row.invoice_balance
        );
    }

    println!();
    println!("✓ Seed complete!");

    Ok(())
}
