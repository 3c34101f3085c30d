//! # Billing Collaborators
//!
//! The four outside services ticketing calls into, as object-safe traits,
//! with their SQL implementations.
//!
//! ## Seams
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          TicketService                                  │
//! │                                                                         │
//! │   Arc<dyn OrderSource>         find, transition_status,                │
//! │                                list_ready_for_table, items             │
//! │   Arc<dyn CustomerStats>       apply_purchase, reverse_purchase        │
//! │   Arc<dyn InventoryDeduction>  deduct_for_dish                         │
//! │   Arc<dyn TableService>        free, set_status                        │
//! │                                                                         │
//! │   Every call receives the unit of work's connection, so whatever a     │
//! │   collaborator writes commits or rolls back with the ticket.           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Tests swap single collaborators for failing doubles to prove the
//! side-effect policies.

use async_trait::async_trait;
use sqlx::SqliteConnection;
use std::sync::Arc;

use crate::error::DbResult;
use crate::pool::Database;
use crate::repository::customer::CustomerRepository;
use crate::repository::inventory::InventoryRepository;
use crate::repository::order::OrderRepository;
use crate::repository::table::TableRepository;
use mesa_core::{Money, Order, OrderItem, OrderStatus, TableStatus};

// =============================================================================
// Traits
// =============================================================================

/// Supplies orders and moves them through billing states.
#[async_trait]
pub trait OrderSource: Send + Sync {
    async fn find(&self, conn: &mut SqliteConnection, order_id: &str) -> DbResult<Option<Order>>;

    async fn transition_status(
        &self,
        conn: &mut SqliteConnection,
        order_id: &str,
        status: OrderStatus,
    ) -> DbResult<()>;

    /// Ready orders of the table without an open ticket, oldest first.
    async fn list_ready_for_table(
        &self,
        conn: &mut SqliteConnection,
        table_id: &str,
    ) -> DbResult<Vec<Order>>;

    async fn items(&self, conn: &mut SqliteConnection, order_id: &str) -> DbResult<Vec<OrderItem>>;
}

/// Per-customer visit and spend statistics.
#[async_trait]
pub trait CustomerStats: Send + Sync {
    async fn apply_purchase(
        &self,
        conn: &mut SqliteConnection,
        customer_id: &str,
        amount: Money,
    ) -> DbResult<()>;

    async fn reverse_purchase(
        &self,
        conn: &mut SqliteConnection,
        customer_id: &str,
        amount: Money,
    ) -> DbResult<()>;
}

/// Stock deduction for sold dishes.
#[async_trait]
pub trait InventoryDeduction: Send + Sync {
    async fn deduct_for_dish(
        &self,
        conn: &mut SqliteConnection,
        dish_id: &str,
        quantity: i64,
        actor_id: &str,
        ticket_id: &str,
    ) -> DbResult<()>;
}

/// Dining table state.
#[async_trait]
pub trait TableService: Send + Sync {
    /// Marks the table available and unassigns its waiter.
    async fn free(&self, conn: &mut SqliteConnection, table_id: &str) -> DbResult<()>;

    async fn set_status(
        &self,
        conn: &mut SqliteConnection,
        table_id: &str,
        status: TableStatus,
    ) -> DbResult<()>;
}

// =============================================================================
// SQL Implementations
// =============================================================================

#[derive(Debug, Clone)]
pub struct SqlOrderSource {
    orders: OrderRepository,
}

impl SqlOrderSource {
    pub fn new(db: &Database) -> Self {
        SqlOrderSource { orders: db.orders() }
    }
}

#[async_trait]
impl OrderSource for SqlOrderSource {
    async fn find(&self, conn: &mut SqliteConnection, order_id: &str) -> DbResult<Option<Order>> {
        self.orders.find(conn, order_id).await
    }

    async fn transition_status(
        &self,
        conn: &mut SqliteConnection,
        order_id: &str,
        status: OrderStatus,
    ) -> DbResult<()> {
        self.orders.transition_status(conn, order_id, status).await
    }

    async fn list_ready_for_table(
        &self,
        conn: &mut SqliteConnection,
        table_id: &str,
    ) -> DbResult<Vec<Order>> {
        self.orders.ready_for_table(conn, table_id).await
    }

    async fn items(&self, conn: &mut SqliteConnection, order_id: &str) -> DbResult<Vec<OrderItem>> {
        self.orders.items(conn, order_id).await
    }
}

#[derive(Debug, Clone)]
pub struct SqlCustomerStats {
    customers: CustomerRepository,
}

impl SqlCustomerStats {
    pub fn new(db: &Database) -> Self {
        SqlCustomerStats {
            customers: db.customers(),
        }
    }
}

#[async_trait]
impl CustomerStats for SqlCustomerStats {
    async fn apply_purchase(
        &self,
        conn: &mut SqliteConnection,
        customer_id: &str,
        amount: Money,
    ) -> DbResult<()> {
        self.customers.apply_purchase(conn, customer_id, amount).await
    }

    async fn reverse_purchase(
        &self,
        conn: &mut SqliteConnection,
        customer_id: &str,
        amount: Money,
    ) -> DbResult<()> {
        self.customers.reverse_purchase(conn, customer_id, amount).await
    }
}

#[derive(Debug, Clone)]
pub struct SqlInventoryDeduction {
    inventory: InventoryRepository,
}

impl SqlInventoryDeduction {
    pub fn new(db: &Database) -> Self {
        SqlInventoryDeduction {
            inventory: db.inventory(),
        }
    }
}

#[async_trait]
impl InventoryDeduction for SqlInventoryDeduction {
    async fn deduct_for_dish(
        &self,
        conn: &mut SqliteConnection,
        dish_id: &str,
        quantity: i64,
        actor_id: &str,
        ticket_id: &str,
    ) -> DbResult<()> {
        self.inventory
            .deduct_for_dish(conn, dish_id, quantity, actor_id, ticket_id)
            .await
            .map(|_| ())
    }
}

#[derive(Debug, Clone)]
pub struct SqlTableService {
    tables: TableRepository,
}

impl SqlTableService {
    pub fn new(db: &Database) -> Self {
        SqlTableService { tables: db.tables() }
    }
}

#[async_trait]
impl TableService for SqlTableService {
    async fn free(&self, conn: &mut SqliteConnection, table_id: &str) -> DbResult<()> {
        self.tables.free(conn, table_id).await
    }

    async fn set_status(
        &self,
        conn: &mut SqliteConnection,
        table_id: &str,
        status: TableStatus,
    ) -> DbResult<()> {
        self.tables.set_status(conn, table_id, status).await
    }
}

// =============================================================================
// Bundle
// =============================================================================

/// The collaborator set a ticket service runs with.
#[derive(Clone)]
pub struct Collaborators {
    pub orders: Arc<dyn OrderSource>,
    pub customers: Arc<dyn CustomerStats>,
    pub inventory: Arc<dyn InventoryDeduction>,
    pub tables: Arc<dyn TableService>,
}

impl Collaborators {
    /// SQL implementations over `db`.
    pub fn sql(db: &Database) -> Self {
        Collaborators {
            orders: Arc::new(SqlOrderSource::new(db)),
            customers: Arc::new(SqlCustomerStats::new(db)),
            inventory: Arc::new(SqlInventoryDeduction::new(db)),
            tables: Arc::new(SqlTableService::new(db)),
        }
    }

    pub fn with_customers(mut self, customers: Arc<dyn CustomerStats>) -> Self {
        self.customers = customers;
        self
    }

    pub fn with_inventory(mut self, inventory: Arc<dyn InventoryDeduction>) -> Self {
        self.inventory = inventory;
        self
    }

    pub fn with_tables(mut self, tables: Arc<dyn TableService>) -> Self {
        self.tables = tables;
        self
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::pool::DbConfig;
    use crate::uow::UnitOfWork;
    use mesa_core::DiningTable;

    struct RefusingTables;

    #[async_trait]
    impl TableService for RefusingTables {
        async fn free(&self, _conn: &mut SqliteConnection, _table_id: &str) -> DbResult<()> {
            Err(DbError::Internal("table service offline".into()))
        }

        async fn set_status(
            &self,
            _conn: &mut SqliteConnection,
            _table_id: &str,
            _status: TableStatus,
        ) -> DbResult<()> {
            Err(DbError::Internal("table service offline".into()))
        }
    }

    #[tokio::test]
    async fn test_sql_collaborators_write_through_unit_of_work() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let services = Collaborators::sql(&db);
        {
            let mut conn = db.acquire().await.unwrap();
            db.tables()
                .insert(
                    &mut conn,
                    &DiningTable {
                        id: "t1".into(),
                        number: 1,
                        status: TableStatus::Occupied,
                        waiter_id: Some("w1".into()),
                    },
                )
                .await
                .unwrap();
            db.customers().insert(&mut conn, "c1", "Ana").await.unwrap();

            let mut uow = UnitOfWork::begin(&mut conn).await.unwrap();
            services.tables.free(uow.conn(), "t1").await.unwrap();
            services
                .customers
                .apply_purchase(uow.conn(), "c1", Money::from_cents(5800))
                .await
                .unwrap();
            uow.rollback().await;
        }

        let table = db.tables().get_by_id("t1").await.unwrap().unwrap();
        assert_eq!(table.status, TableStatus::Occupied);
        let customer = db.customers().get_by_id("c1").await.unwrap().unwrap();
        assert_eq!(customer.total_visits, 0);
    }

    #[tokio::test]
    async fn test_bundle_swaps_single_collaborator() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let services = Collaborators::sql(&db).with_tables(Arc::new(RefusingTables));
        let mut conn = db.acquire().await.unwrap();

        let err = services.tables.free(&mut conn, "t1").await.unwrap_err();
        assert!(matches!(err, DbError::Internal(_)));
        assert!(services.orders.find(&mut conn, "none").await.unwrap().is_none());
    }
}
