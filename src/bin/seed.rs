//! Populates the database with demo rental inventory for development.
//!
//! Usage: `cargo run --bin seed`

use diesel::prelude::*;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use rigtrack::{
    config::AppConfig,
    db,
    models::{NewCustomer, NewDevice, NewProduct},
    schema::{customers, devices, products},
};

const PRODUCTS: &[(&str, f64)] = &[
    ("Wireless Microphone Set", 50.0),
    ("LED Par Light", 15.0),
    ("Active PA Speaker 12\"", 35.0),
    ("4-Channel Mixer", 25.0),
    ("HDMI Projector 5000lm", 80.0),
];

const CUSTOMERS: &[(&str, &str, &str)] = &[
    ("Eventa GmbH", "", ""),
    ("", "Maria", "Keller"),
    ("Stadthalle Nord", "", ""),
    ("", "Jonas", "Brandt"),
];

fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    let config = AppConfig::from_env()?;
    let pool = db::init_pool_with_size(&config.database_url, 1)?;
    let mut conn = pool.get()?;

    let mut device_count = 0;
    for (index, (product_name, daily_rate)) in PRODUCTS.iter().enumerate() {
        let product = NewProduct {
            id: Uuid::new_v4(),
            name: (*product_name).to_string(),
            item_cost_per_day: *daily_rate,
        };
        diesel::insert_into(products::table)
            .values(&product)
            .execute(&mut conn)?;

        // Two physical units per product line.
        for unit in 1..=2 {
            let device = NewDevice {
                id: Uuid::new_v4(),
                name: format!("{product_name} #{unit}"),
                barcode: format!("RT{:03}{unit:02}", index + 1),
                device_type: Some("audio-visual".to_string()),
                status: "available".to_string(),
                location: Some("warehouse".to_string()),
                product_id: Some(product.id),
            };
            diesel::insert_into(devices::table)
                .values(&device)
                .execute(&mut conn)?;
            device_count += 1;
        }
    }

    for (company, first, last) in CUSTOMERS {
        let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());
        let customer = NewCustomer {
            id: Uuid::new_v4(),
            company_name: non_empty(company),
            first_name: non_empty(first),
            last_name: non_empty(last),
        };
        diesel::insert_into(customers::table)
            .values(&customer)
            .execute(&mut conn)?;
    }

    tracing::info!(
        products = PRODUCTS.len(),
        devices = device_count,
        customers = CUSTOMERS.len(),
        "seeded demo data"
    );
    Ok(())
}
