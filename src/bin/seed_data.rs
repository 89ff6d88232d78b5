//! Seed data script - creates a first owner, shop and some demo catalog data
//!
//! Run with: cargo run --bin seed-data -- --owner-email owner@example.com --owner-password secret123
//!
//! This creates:
//! - one shop owner with the given credentials
//! - one shop
//! - the default payment methods (cash, card)
//! - one supplier with a handful of products
//! - two customers

use std::sync::Arc;

use clap::Parser;
use rust_decimal_macros::dec;
use tokio::sync::mpsc;
use tracing::info;

use shop_api::{
    config, db,
    events::{self, EventSender},
    services::{
        customers::CreateCustomerRequest, payment_methods::CreatePaymentMethodRequest,
        products::CreateProductRequest, shop_owners::CreateShopOwnerRequest,
        shops::CreateShopRequest, suppliers::CreateSupplierRequest,
    },
    AppState,
};

#[derive(Parser)]
#[command(name = "seed-data", about = "Populate an empty shop database", version)]
struct Cli {
    #[arg(long, default_value = "owner@example.com")]
    owner_email: String,
    #[arg(long)]
    owner_password: String,
    #[arg(long, default_value = "Shop Owner")]
    owner_name: String,
    #[arg(long, default_value = "MAIN")]
    shop_code: String,
    #[arg(long, default_value = "Main Street Shop")]
    shop_name: String,
    /// Skip the demo supplier, products and customers
    #[arg(long)]
    no_demo: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config()?;
    config::init_tracing(cfg.log_level(), cfg.log_json);

    info!("=== Shop API Seed Data ===");

    let pool = db::establish_connection_from_app_config(&cfg).await?;
    db::run_migrations(&pool).await?;

    let (event_tx, event_rx) = mpsc::channel(cfg.event_channel_capacity);
    let events_task = tokio::spawn(events::process_events(event_rx));
    let state = AppState::new(Arc::new(pool), cfg, EventSender::new(event_tx));
    let services = &state.services;

    let owner = services
        .shop_owners
        .create(CreateShopOwnerRequest {
            full_name: cli.owner_name,
            email: cli.owner_email,
            phone: None,
            password: cli.owner_password,
        })
        .await?;
    info!("  Created owner {} ({})", owner.email, owner.id);

    let shop = services
        .shops
        .create(CreateShopRequest {
            code: cli.shop_code,
            name: cli.shop_name,
            address: None,
            phone: None,
            owner_id: owner.id,
        })
        .await?;
    info!("  Created shop {} ({})", shop.code, shop.id);

    for (name, description) in [("Cash", "Paid at the till"), ("Card", "Debit or credit card")] {
        services
            .payment_methods
            .create(CreatePaymentMethodRequest {
                name: name.to_string(),
                description: Some(description.to_string()),
            })
            .await?;
    }
    info!("  Created default payment methods");

    if !cli.no_demo {
        let supplier = services
            .suppliers
            .create(CreateSupplierRequest {
                code: "SUP-001".to_string(),
                name: "Wholesale Goods Co".to_string(),
                contact_name: Some("Dana Lee".to_string()),
                phone: Some("555-0100".to_string()),
                email: Some("orders@wholesale.example".to_string()),
                address: None,
            })
            .await?;

        let products = [
            ("COF-250", "Ground Coffee 250g", "bag", dec!(3.20), dec!(5.99), 40),
            ("TEA-100", "Green Tea 100 bags", "box", dec!(2.10), dec!(4.50), 25),
            ("MLK-1L", "Whole Milk 1L", "bottle", dec!(0.70), dec!(1.29), 60),
            ("BRD-WHT", "White Bread", "loaf", dec!(0.90), dec!(2.19), 15),
        ];
        for (code, name, unit, import_price, sale_price, quantity) in products {
            services
                .products
                .create(CreateProductRequest {
                    code: code.to_string(),
                    name: name.to_string(),
                    description: None,
                    unit: unit.to_string(),
                    supplier_id: Some(supplier.id),
                    import_price,
                    sale_price,
                    quantity_in_stock: quantity,
                })
                .await?;
        }
        info!("  Created supplier {} with {} products", supplier.code, products.len());

        for (full_name, phone) in [("Alex Kim", "555-0101"), ("Sam Ortiz", "555-0102")] {
            services
                .customers
                .create(CreateCustomerRequest {
                    full_name: full_name.to_string(),
                    phone: phone.to_string(),
                    email: None,
                    address: None,
                })
                .await?;
        }
        info!("  Created demo customers");
    }

    drop(state);
    let _ = events_task.await;

    info!("=== Seed Data Complete ===");
    info!("Log in with POST /api/Auth/login, or explore at /swagger-ui");
    Ok(())
}
