//! Shared fixtures for billing tests: an in-memory floor with tables,
//! customers, dishes and orders, plus failing collaborator doubles.

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveTime, Utc};
use std::sync::Arc;

use crate::context::BillingContext;
use mesa_core::{
    new_id, BillingConfig, DiningTable, Money, Order, OrderItem, OrderStatus, TableStatus,
};
use mesa_db::{
    Collaborators, CustomerStats, Database, DbConfig, DbError, DbResult, InventoryDeduction,
    SqliteConnection,
};

pub(crate) const WAITER: &str = "waiter-1";
pub(crate) const CASHIER: &str = "cashier-1";

/// An order about to be seeded.
#[derive(Debug, Clone)]
pub(crate) struct OrderSpec {
    pub table_id: String,
    pub waiter_id: String,
    pub customer_id: Option<String>,
    pub customer_name: Option<String>,
    pub status: OrderStatus,
    pub total_cents: i64,
    pub created_at: DateTime<Utc>,
    pub items: Vec<(String, i64)>,
}

pub(crate) fn ready(table_id: &str, total_cents: i64) -> OrderSpec {
    OrderSpec {
        table_id: table_id.to_string(),
        waiter_id: WAITER.to_string(),
        customer_id: None,
        customer_name: None,
        status: OrderStatus::Ready,
        total_cents,
        created_at: earlier_today(),
        items: Vec::new(),
    }
}

/// A few minutes ago, but never before UTC midnight so the order stays on
/// today's business day.
fn earlier_today() -> DateTime<Utc> {
    let now = Utc::now();
    let midnight = now.date_naive().and_time(NaiveTime::MIN).and_utc();
    (now - Duration::minutes(5)).max(midnight)
}

impl OrderSpec {
    pub fn named(mut self, name: &str) -> Self {
        self.customer_name = Some(name.to_string());
        self
    }

    pub fn customer(mut self, id: &str, name: &str) -> Self {
        self.customer_id = Some(id.to_string());
        self.customer_name = Some(name.to_string());
        self
    }

    pub fn waiter(mut self, waiter_id: &str) -> Self {
        self.waiter_id = waiter_id.to_string();
        self
    }

    pub fn status(mut self, status: OrderStatus) -> Self {
        self.status = status;
        self
    }

    pub fn days_ago(mut self, days: i64) -> Self {
        self.created_at = Utc::now() - Duration::days(days);
        self
    }

    pub fn item(mut self, dish_id: &str, quantity: i64) -> Self {
        self.items.push((dish_id.to_string(), quantity));
        self
    }
}

/// An in-memory restaurant.
pub(crate) struct Floor {
    pub db: Database,
}

impl Floor {
    pub async fn new() -> Floor {
        Floor::open(DbConfig::in_memory()).await
    }

    pub async fn open(config: DbConfig) -> Floor {
        let db = Database::new(config).await.unwrap();
        Floor { db }
    }

    pub async fn context(&self) -> BillingContext {
        self.context_with(BillingConfig::default()).await
    }

    pub async fn context_with(&self, config: BillingConfig) -> BillingContext {
        BillingContext::load(self.db.clone(), config).await.unwrap()
    }

    pub async fn context_with_services(
        &self,
        config: BillingConfig,
        services: impl FnOnce(Collaborators) -> Collaborators,
    ) -> BillingContext {
        let services = services(Collaborators::sql(&self.db));
        BillingContext::load_with(self.db.clone(), config, services)
            .await
            .unwrap()
    }

    pub async fn table(&self, id: &str, number: i64) {
        let mut conn = self.db.acquire().await.unwrap();
        self.db
            .tables()
            .insert(
                &mut conn,
                &DiningTable {
                    id: id.to_string(),
                    number,
                    status: TableStatus::Occupied,
                    waiter_id: Some(WAITER.to_string()),
                },
            )
            .await
            .unwrap();
    }

    pub async fn customer(&self, id: &str, name: &str) {
        let mut conn = self.db.acquire().await.unwrap();
        self.db.customers().insert(&mut conn, id, name).await.unwrap();
    }

    /// A dish made of `per_dish` units of one ingredient with `stock` on hand.
    pub async fn dish(&self, dish_id: &str, ingredient_id: &str, per_dish: i64, stock: i64) {
        let mut conn = self.db.acquire().await.unwrap();
        let inventory = self.db.inventory();
        inventory
            .insert_ingredient(&mut conn, ingredient_id, ingredient_id, "g", stock)
            .await
            .unwrap();
        inventory.insert_dish(&mut conn, dish_id, dish_id, 1000).await.unwrap();
        inventory
            .add_recipe_line(&mut conn, dish_id, ingredient_id, per_dish)
            .await
            .unwrap();
    }

    pub async fn order(&self, spec: OrderSpec) -> String {
        let mut conn = self.db.acquire().await.unwrap();
        let order = Order {
            id: new_id(),
            table_id: spec.table_id,
            waiter_id: spec.waiter_id,
            customer_id: spec.customer_id,
            customer_name: spec.customer_name,
            status: spec.status,
            total_cents: spec.total_cents,
            created_at: spec.created_at,
        };
        self.db.orders().insert(&mut conn, &order).await.unwrap();
        for (dish_id, quantity) in spec.items {
            let item = OrderItem {
                id: new_id(),
                order_id: order.id.clone(),
                dish_id,
                quantity,
            };
            self.db.orders().add_item(&mut conn, &item).await.unwrap();
        }
        order.id
    }

    pub async fn order_status(&self, id: &str) -> OrderStatus {
        self.db.orders().get_by_id(id).await.unwrap().unwrap().status
    }

    pub async fn order_created_at(&self, id: &str) -> DateTime<Utc> {
        self.db.orders().get_by_id(id).await.unwrap().unwrap().created_at
    }

    pub async fn table_status(&self, id: &str) -> TableStatus {
        self.db.tables().get_by_id(id).await.unwrap().unwrap().status
    }

    pub async fn ticket_rows(&self) -> i64 {
        sqlx_count(&self.db, "SELECT COUNT(*) FROM tickets").await
    }

    pub async fn stock(&self, ingredient_id: &str) -> i64 {
        self.db.inventory().stock_of(ingredient_id).await.unwrap()
    }

    pub async fn visits(&self, customer_id: &str) -> (i64, i64) {
        let c = self.db.customers().get_by_id(customer_id).await.unwrap().unwrap();
        (c.total_visits, c.total_spent_cents)
    }
}

async fn sqlx_count(db: &Database, sql: &str) -> i64 {
    sqlx::query_scalar(sql).fetch_one(db.pool()).await.unwrap()
}

// =============================================================================
// Failing Collaborators
// =============================================================================

/// Writes to stock, then fails. Proves a best-effort rollback discards the
/// partial write.
pub(crate) struct FailingInventory;

#[async_trait]
impl InventoryDeduction for FailingInventory {
    async fn deduct_for_dish(
        &self,
        conn: &mut SqliteConnection,
        _dish_id: &str,
        _quantity: i64,
        _actor_id: &str,
        _ticket_id: &str,
    ) -> DbResult<()> {
        sqlx::query("UPDATE ingredients SET stock_quantity = stock_quantity - 1")
            .execute(conn)
            .await?;
        Err(DbError::Internal("inventory service unavailable".into()))
    }
}

/// Always fails.
pub(crate) struct FailingCustomerStats;

#[async_trait]
impl CustomerStats for FailingCustomerStats {
    async fn apply_purchase(
        &self,
        _conn: &mut SqliteConnection,
        _customer_id: &str,
        _amount: Money,
    ) -> DbResult<()> {
        Err(DbError::Internal("customer stats unavailable".into()))
    }

    async fn reverse_purchase(
        &self,
        _conn: &mut SqliteConnection,
        _customer_id: &str,
        _amount: Money,
    ) -> DbResult<()> {
        Err(DbError::Internal("customer stats unavailable".into()))
    }
}

pub(crate) fn failing_inventory(services: Collaborators) -> Collaborators {
    services.with_inventory(Arc::new(FailingInventory))
}

pub(crate) fn failing_customer_stats(services: Collaborators) -> Collaborators {
    services.with_customers(Arc::new(FailingCustomerStats))
}

#[test]
fn test_ready_orders_fall_on_today() {
    let spec = ready("table-5", 1000);
    assert_eq!(spec.created_at.date_naive(), Utc::now().date_naive());
    assert!(spec.created_at <= Utc::now());
}
