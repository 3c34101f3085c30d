//! # Demo Floor Seeder
//!
//! Populates a database with a small restaurant for development.
//!
//! ## Usage
//! ```bash
//! # Seed the database named by mesa.toml / MESA_DATABASE_PATH
//! cargo run -p mesa-db --bin seed
//!
//! # Specify database path and table count
//! cargo run -p mesa-db --bin seed -- --db ./data/mesa.db --tables 12
//! ```
//!
//! ## Generated Floor
//! - Tables 1..N, all available except table 5 (occupied, three ready orders)
//! - Customers: Maria, Jose, Ana
//! - Dishes with recipes drawing on a handful of ingredients
//! - One ready order on table 2 from yesterday, for the expired-order flow

use chrono::{Duration, Utc};
use mesa_core::{new_id, DiningTable, Order, OrderItem, OrderStatus, TableStatus};
use mesa_db::{Database, MesaSettings, UnitOfWork};
use std::env;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// (id, name, unit, stock)
const INGREDIENTS: &[(&str, &str, &str, i64)] = &[
    ("ing-tortilla", "Tortilla", "pcs", 400),
    ("ing-beef", "Beef", "g", 20_000),
    ("ing-cheese", "Cheese", "g", 8_000),
    ("ing-rice", "Rice", "g", 15_000),
    ("ing-lime", "Lime", "pcs", 150),
];

/// (id, name, price in cents, recipe)
const DISHES: &[(&str, &str, i64, &[(&str, i64)])] = &[
    ("dish-tacos", "Beef tacos", 11_600, &[("ing-tortilla", 3), ("ing-beef", 150)]),
    ("dish-quesadilla", "Quesadilla", 8_700, &[("ing-tortilla", 2), ("ing-cheese", 80)]),
    ("dish-rice", "Rice bowl", 5_800, &[("ing-rice", 200)]),
    ("dish-agua", "Agua de limon", 2_900, &[("ing-lime", 2)]),
];

const CUSTOMERS: &[(&str, &str)] = &[
    ("cust-maria", "Maria"),
    ("cust-jose", "Jose"),
    ("cust-ana", "Ana"),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = env::args().collect();

    let mut settings = MesaSettings::load(None)?;
    let mut table_count: i64 = 10;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--tables" | "-t" => {
                if i + 1 < args.len() {
                    table_count = args[i + 1].parse().unwrap_or(10);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    settings.database.path = args[i + 1].clone().into();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Mesa POS Demo Floor Seeder");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -t, --tables <N>   Number of dining tables (default: 10, minimum 5)");
                println!("  -d, --db <PATH>    Database file path (default: from mesa.toml)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }
    let table_count = table_count.max(5);

    println!("Mesa POS Demo Floor Seeder");
    println!("==========================");
    println!("Database: {}", settings.database.path.display());
    println!("Tables:   {}", table_count);
    println!();

    let db = Database::new(settings.to_db_config()).await?;

    let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM dining_tables")
        .fetch_one(db.pool())
        .await?;
    if existing > 0 {
        println!("Database already has {} tables", existing);
        println!("  Skipping seed to avoid duplicates.");
        return Ok(());
    }

    let mut conn = db.acquire().await?;
    let mut uow = UnitOfWork::begin(&mut conn).await?;

    for number in 1..=table_count {
        let table = DiningTable {
            id: format!("table-{}", number),
            number,
            status: if number == 5 || number == 2 {
                TableStatus::Occupied
            } else {
                TableStatus::Available
            },
            waiter_id: (number == 5 || number == 2).then(|| "waiter-demo".to_string()),
        };
        db.tables().insert(uow.conn(), &table).await?;
    }

    for (id, name) in CUSTOMERS {
        db.customers().insert(uow.conn(), id, name).await?;
    }

    let inventory = db.inventory();
    for (id, name, unit, stock) in INGREDIENTS {
        inventory.insert_ingredient(uow.conn(), id, name, unit, *stock).await?;
    }
    for (id, name, price, recipe) in DISHES {
        inventory.insert_dish(uow.conn(), id, name, *price).await?;
        for (ingredient, qty) in recipe.iter() {
            inventory.add_recipe_line(uow.conn(), id, ingredient, *qty).await?;
        }
    }

    let now = Utc::now();
    let demo_orders = [
        ("table-5", Some("cust-maria"), Some("Maria"), &[("dish-tacos", 1)][..], now - Duration::minutes(40)),
        ("table-5", None, Some(" maria "), &[("dish-rice", 1), ("dish-agua", 1)][..], now - Duration::minutes(25)),
        ("table-5", Some("cust-jose"), Some("Jose"), &[("dish-quesadilla", 2)][..], now - Duration::minutes(10)),
        ("table-2", Some("cust-ana"), Some("Ana"), &[("dish-tacos", 1)][..], now - Duration::days(1)),
    ];

    for (table_id, customer_id, customer_name, lines, created_at) in demo_orders {
        let total_cents: i64 = lines
            .iter()
            .map(|(dish, qty)| dish_price(dish) * *qty)
            .sum();
        let order = Order {
            id: new_id(),
            table_id: table_id.to_string(),
            waiter_id: "waiter-demo".to_string(),
            customer_id: customer_id.map(str::to_string),
            customer_name: customer_name.map(str::to_string),
            status: OrderStatus::Ready,
            total_cents,
            created_at,
        };
        db.orders().insert(uow.conn(), &order).await?;
        for (dish, qty) in lines {
            let item = OrderItem {
                id: new_id(),
                order_id: order.id.clone(),
                dish_id: dish.to_string(),
                quantity: *qty,
            };
            db.orders().add_item(uow.conn(), &item).await?;
        }
        info!(order_id = %order.id, table_id, total_cents, "Seeded ready order");
    }

    uow.commit().await?;

    println!();
    println!("Seed complete");
    println!("  Table 5 has three ready orders (Maria, maria, Jose)");
    println!("  Table 2 has one ready order from yesterday");

    Ok(())
}

fn dish_price(dish_id: &str) -> i64 {
    DISHES
        .iter()
        .find(|(id, ..)| *id == dish_id)
        .map(|(_, _, price, _)| *price)
        .unwrap_or(0)
}
