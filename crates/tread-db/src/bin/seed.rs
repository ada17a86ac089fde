//! # Demo Data Seeder
//!
//! Fills an empty database with footwear stock to develop against.
//!
//! ## Usage
//! ```bash
//! # Seed 24 products (default)
//! cargo run -p tread-db --bin seed
//!
//! # Custom catalog size
//! cargo run -p tread-db --bin seed -- --products 60
//!
//! # Point at a different database file
//! cargo run -p tread-db --bin seed -- --db ./data/tread.db
//! ```
//!
//! ## Generated Data
//! One demo company with two warehouses and two stores, then:
//! - Products across five brands, each with a full size run per unit
//!   barcodes stamped at intake
//! - A few sealed boxes (whole-box barcodes, no per-unit ledger)
//! - A couple of exhibition assignments so stores are not empty
//! - One complete invoice walked through stage → sold → close, so the
//!   database opens on a realistic closed sale
//!
//! Refuses to touch a database that already has data.

use std::env;

use tracing_subscriber::EnvFilter;
use tread_core::{NewBox, NewProduct};
use tread_db::{Database, DbConfig};

/// Brand catalog: brand name → model references
const BRANDS: &[(&str, &[&str])] = &[
    ("Trailhead", &["Scout", "Ridgeline", "Summit", "Traverse", "Basin"]),
    ("Corsa", &["Milano", "Torino", "Veloce", "Strada", "Giro"]),
    ("Northlane", &["Drift", "Harbor", "Breaker", "Wharf", "Jetty"]),
    ("Pampero", &["Gaucho", "Llanura", "Sierra", "Austral", "Cimarron"]),
    ("Vela", &["Brisa", "Marea", "Coral", "Duna", "Faro"]),
];

const COLORS: &[&str] = &["black", "white", "brown", "navy", "red", "olive"];

/// Size ladders: men's, women's, kids'
const SIZE_RUNS: &[&[&str]] = &[
    &["40", "41", "42", "43", "44", "45"],
    &["35", "36", "37", "38", "39", "40", "41"],
    &["28", "29", "30", "31", "32", "33", "34"],
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Two flags and --help; not worth a parser dependency
    let args: Vec<String> = env::args().collect();

    let mut products: usize = 24;
    let mut db_path = String::from("./tread_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--products" | "-p" => {
                if i + 1 < args.len() {
                    products = args[i + 1].parse().unwrap_or(24);
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
                println!("Tread demo data seeder");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -p, --products <N>  How many products to generate (default: 24)");
                println!("  -d, --db <PATH>     Database file (default: ./tread_dev.db)");
                println!("  -h, --help          Print this help");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Tread demo seeder");
    println!("====================");
    println!("Database: {}", db_path);
    println!("Products: {}", products);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Database ready (migrations applied)");

    // Refuse to seed on top of existing data
    let existing = db.companies().list_companies().await?;
    if !existing.is_empty() {
        println!("⚠ Database already has {} companies", existing.len());
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    // One tenant, two warehouses, two stores
    let company = db.companies().create_company("Trotamundos Shoes").await?;
    let central = db
        .companies()
        .create_warehouse(&company.id, "Central Warehouse")
        .await?;
    let overflow = db
        .companies()
        .create_warehouse(&company.id, "Overflow Warehouse")
        .await?;
    let main_street = db
        .companies()
        .create_store(&company.id, "Main Street")
        .await?;
    let harbor_mall = db
        .companies()
        .create_store(&company.id, "Harbor Mall")
        .await?;

    println!("✓ Company: {} ({})", company.name, company.id);
    println!("✓ Warehouses: {}, {}", central.name, overflow.name);
    println!("✓ Stores: {}, {}", main_street.name, harbor_mall.name);

    // Generate products with their size runs
    println!();
    println!("Generating products...");

    let start = std::time::Instant::now();
    let mut created = Vec::with_capacity(products);
    let mut units = 0i64;

    for seed in 0..products {
        let new_product = generate_product(seed, &company.id, &central.id, &overflow.id);
        units += new_product.sizes.values().sum::<i64>();

        let product = db.products().create_product(new_product).await?;
        created.push(product);

        if created.len() % 10 == 0 {
            println!("  Generated {} products...", created.len());
        }
    }

    // A few sealed boxes on the same barcode stream
    for (reference, quantity) in [("Caddy", 6), ("Loafer", 8), ("Court", 10)] {
        let sealed = db
            .products()
            .create_box(NewBox {
                company_id: company.id.clone(),
                warehouse_id: overflow.id.clone(),
                brand: "Vela".to_string(),
                reference: reference.to_string(),
                color: "brown".to_string(),
                sale_price_cents: 90_000,
                base_price_cents: 50_000,
                quantity,
            })
            .await?;
        println!("  Sealed box {} × {}: {}", reference, quantity, sealed.barcode);
    }

    // Put a unit of the first two products on display
    for (product, store) in created.iter().zip([&main_street, &harbor_mall]) {
        if let Some(bucket) = product.sizes.values().next() {
            if let Some(barcode) = bucket.barcodes.first() {
                db.ledger().assign_exhibition(&store.id, barcode).await?;
                println!("  On display at {}: {}", store.name, barcode);
            }
        }
    }

    let elapsed = start.elapsed();
    println!();
    println!(
        "✓ Generated {} products / {} units in {:?}",
        created.len(),
        units,
        elapsed
    );

    if created.is_empty() {
        println!();
        println!("✓ Seed complete (no products requested, skipping demo invoice)");
        return Ok(());
    }

    // Walk one invoice through its whole lifecycle
    println!();
    println!("Walking a demo invoice through stage → sold → close...");

    let subject = &created[created.len().min(3) - 1];
    let barcode = subject
        .sizes
        .values()
        .next()
        .and_then(|bucket| bucket.barcodes.first())
        .cloned()
        .ok_or("seeded product has no stock")?;

    let invoice = db
        .invoices()
        .create_invoice(&company.id, &main_street.id, Some("demo"))
        .await?;
    let item = db.invoices().add_item(&invoice.id, &barcode).await?;
    db.invoices()
        .mark_sold(&invoice.id, &item.id, item.sale_price_cents)
        .await?;
    let closed = db.invoices().close_invoice(&invoice.id).await?;

    println!(
        "  Invoice {}: sold {} for {} cents (earn {})",
        closed.invoice_number.as_deref().unwrap_or("?"),
        barcode,
        closed.total_sold_cents,
        closed.total_earn_cents
    );
    println!("{}", serde_json::to_string_pretty(&closed)?);

    println!();
    println!("✓ Seed complete!");

    Ok(())
}

/// Generates one product with a deterministic size run.
fn generate_product(
    seed: usize,
    company_id: &str,
    central_id: &str,
    overflow_id: &str,
) -> NewProduct {
    let (brand, models) = BRANDS[seed % BRANDS.len()];
    let reference = models[(seed / BRANDS.len()) % models.len()];
    let color = COLORS[(seed * 7) % COLORS.len()];

    // Price in whole pesos: 49 900 - 104 900, base at 55-74% of sale
    let sale_price_cents = 49_900 + ((seed * 137) % 12) as i64 * 5_000;
    let base_price_cents = sale_price_cents * (55 + (seed % 20) as i64) / 100;

    let run = SIZE_RUNS[seed % SIZE_RUNS.len()];
    let sizes = run
        .iter()
        .enumerate()
        .map(|(idx, size)| (size.to_string(), 1 + ((seed + idx) % 4) as i64))
        .collect();

    let warehouse_id = if seed % 4 == 3 { overflow_id } else { central_id };

    NewProduct {
        company_id: company_id.to_string(),
        warehouse_id: warehouse_id.to_string(),
        brand: brand.to_string(),
        reference: format!("{}-{}", reference.to_uppercase(), seed + 1),
        color: color.to_string(),
        sale_price_cents,
        base_price_cents,
        sizes,
    }
}
