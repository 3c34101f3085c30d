//! # Ticket Coordinator
//!
//! Turns ready orders into tickets, one atomic unit per partition.
//!
//! ## Partition Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     execute_partition(outer, partition)                 │
//! │                                                                         │
//! │  outer = None    → acquire connection, UnitOfWork::begin (owner)        │
//! │  outer = Some(u) → u.join()                            (participant)    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  1. re-validate under the lock: order ready, no open ticket,            │
//! │     payment method accepted                                             │
//! │  2. bill total > 0, claim one ticket number for the partition           │
//! │  3. one ticket row per order (supplied order), tax split per row        │
//! │  4. orders → delivered                                                  │
//! │  5. customer stats        (side_effects.customer_stats policy)          │
//! │  6. inventory deduction   (side_effects.inventory policy, if enabled)   │
//! │  7. free the table        (TableRelease::Free only)                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  owner: COMMIT on success, ROLLBACK + original error on failure         │
//! │  participant: the caller's owner decides                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Multi-Partition Requests
//! Table-by-customer, explicit multi-order and customer separation open one
//! owner scope, run every partition as a participant with
//! [`TableRelease::Keep`], free the table once, then commit. A failure in any
//! partition rolls back all of them.

use chrono::Utc;
use tracing::{debug, info};

use crate::context::{open_effect, settle_effect, BillingContext};
use crate::dto::{
    GroupingMode, OrderTicket, OrdersTicket, SeparateTickets, SeparationReceipt, TableTickets,
    TicketDetails, TicketReceipt,
};
use crate::error::{BillingError, BillingResult};
use mesa_core::{
    new_id, Order, OrderStatus, Partition, TaxSplit, Ticket, TicketNumber, TicketStatus,
};
use mesa_db::{DbError, DbResult, PooledConnection, UnitOfWork};

/// Whether a partition frees its table on success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableRelease {
    Free,
    /// The caller frees the table after its last partition.
    Keep,
}

/// Creates tickets.
#[derive(Debug, Clone)]
pub struct TicketService {
    ctx: BillingContext,
}

impl TicketService {
    pub fn new(ctx: BillingContext) -> Self {
        TicketService { ctx }
    }

    // =========================================================================
    // Entry Points
    // =========================================================================

    /// Bills one order taken today.
    pub async fn create_for_order(&self, cmd: &OrderTicket) -> BillingResult<TicketReceipt> {
        debug!(order_id = %cmd.order_id, method = %cmd.payment_method, "create_for_order");
        self.ctx.accept_payment_method(cmd.payment_method)?;

        let order = self.load_order(&cmd.order_id).await?;
        let today = self.ctx.calendar().day_of(Utc::now());
        let partition = self.ctx.aggregator.single(order, cmd.payment_method, today)?;

        self.execute_partition(None, &partition, &cmd.cashier_id, TableRelease::Free)
            .await
    }

    /// Bills an order left over from a previous day. The ticket is dated now;
    /// the order keeps its original date.
    pub async fn create_for_expired_order(
        &self,
        cmd: &OrderTicket,
    ) -> BillingResult<TicketReceipt> {
        debug!(order_id = %cmd.order_id, "create_for_expired_order");
        self.ctx.accept_payment_method(cmd.payment_method)?;

        let order = self.load_order(&cmd.order_id).await?;
        let partition = self.ctx.aggregator.expired(order, cmd.payment_method)?;

        self.execute_partition(None, &partition, &cmd.cashier_id, TableRelease::Free)
            .await
    }

    /// Bills every ready order of a table, as one bill or one per customer.
    pub async fn create_for_table(&self, cmd: &TableTickets) -> BillingResult<Vec<TicketReceipt>> {
        debug!(table_id = %cmd.table_id, mode = ?cmd.mode, "create_for_table");
        self.ctx.accept_payment_method(cmd.payment_method)?;

        let mut conn = self.acquire().await?;
        let mut uow = begin(&mut conn).await?;
        let result = self.bill_table(&mut uow, cmd).await;
        finish(uow, result).await
    }

    async fn bill_table(
        &self,
        uow: &mut UnitOfWork<'_>,
        cmd: &TableTickets,
    ) -> BillingResult<Vec<TicketReceipt>> {
        let orders = self.ready_orders(uow, &cmd.table_id).await?;
        let partitions = self.group(orders, cmd.mode, cmd.payment_method)?;
        self.bill_partitions(uow, &partitions, &cmd.cashier_id).await
    }

    /// Bills a caller-chosen set of orders.
    pub async fn create_for_orders(&self, cmd: &OrdersTicket) -> BillingResult<Vec<TicketReceipt>> {
        debug!(orders = cmd.order_ids.len(), mode = ?cmd.mode, "create_for_orders");
        if cmd.order_ids.is_empty() {
            return Err(BillingError::EmptySelection);
        }
        self.ctx.accept_payment_method(cmd.payment_method)?;

        let mut conn = self.acquire().await?;
        let mut uow = begin(&mut conn).await?;
        let result = self.bill_orders(&mut uow, cmd).await;
        finish(uow, result).await
    }

    async fn bill_orders(
        &self,
        uow: &mut UnitOfWork<'_>,
        cmd: &OrdersTicket,
    ) -> BillingResult<Vec<TicketReceipt>> {
        let mut orders = Vec::with_capacity(cmd.order_ids.len());
        for order_id in &cmd.order_ids {
            let order = self
                .ctx
                .services
                .orders
                .find(uow.conn(), order_id)
                .await?
                .ok_or_else(|| BillingError::OrderNotFound(order_id.clone()))?;
            orders.push(order);
        }
        let partitions = self.group(orders, cmd.mode, cmd.payment_method)?;
        self.bill_partitions(uow, &partitions, &cmd.cashier_id).await
    }

    /// Separates the selected customers onto their own bills; everyone else
    /// shares a remainder bill paid with the default method.
    pub async fn create_separated(&self, cmd: &SeparateTickets) -> BillingResult<SeparationReceipt> {
        debug!(table_id = %cmd.table_id, customers = cmd.selections.len(), "create_separated");
        self.ctx.accept_payment_method(cmd.default_payment_method)?;
        for selection in &cmd.selections {
            if let Some(method) = selection.payment_method {
                self.ctx.accept_payment_method(method)?;
            }
        }

        let mut conn = self.acquire().await?;
        let mut uow = begin(&mut conn).await?;
        let result = self.bill_separated(&mut uow, cmd).await;
        finish(uow, result).await
    }

    async fn bill_separated(
        &self,
        uow: &mut UnitOfWork<'_>,
        cmd: &SeparateTickets,
    ) -> BillingResult<SeparationReceipt> {
        let orders = self.ready_orders(uow, &cmd.table_id).await?;
        let plan =
            self.ctx
                .aggregator
                .separate(orders, &cmd.selections, cmd.default_payment_method)?;

        for customer in &plan.unmatched {
            info!(table_id = %cmd.table_id, customer = %customer, "Selected customer has no ready orders");
        }

        let tickets = self
            .bill_partitions(uow, &plan.partitions, &cmd.cashier_id)
            .await?;
        Ok(SeparationReceipt {
            tickets,
            unmatched_customers: plan.unmatched,
        })
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    /// Ready orders created before today's business day, oldest first.
    pub async fn list_expired_orders(&self) -> BillingResult<Vec<Order>> {
        let calendar = self.ctx.calendar();
        let (start_of_today, _) = calendar.bounds(calendar.day_of(Utc::now()));
        Ok(self.ctx.db.orders().expired_ready(start_of_today).await?)
    }

    /// Every row sharing a ticket number.
    pub async fn ticket_details(&self, ticket_number: &str) -> BillingResult<TicketDetails> {
        let rows = self
            .ctx
            .db
            .tickets()
            .get_by_number(ticket_number)
            .await
            .map_err(|e| BillingError::persistence("Loading ticket", e))?;
        if rows.is_empty() {
            return Err(BillingError::TicketNotFound(ticket_number.to_string()));
        }
        Ok(TicketDetails::from_rows(ticket_number.to_string(), rows))
    }

    // =========================================================================
    // Partition Execution
    // =========================================================================

    /// Runs one partition, owning a new transaction or joining `outer`.
    pub async fn execute_partition(
        &self,
        outer: Option<&mut UnitOfWork<'_>>,
        partition: &Partition,
        cashier_id: &str,
        release: TableRelease,
    ) -> BillingResult<TicketReceipt> {
        match outer {
            Some(outer) => {
                let mut scope = outer.join();
                let result = self.run_partition(&mut scope, partition, cashier_id, release).await;
                finish(scope, result).await
            }
            None => {
                let mut conn = self.acquire().await?;
                let mut uow = begin(&mut conn).await?;
                let result = self.run_partition(&mut uow, partition, cashier_id, release).await;
                finish(uow, result).await
            }
        }
    }

    async fn run_partition(
        &self,
        uow: &mut UnitOfWork<'_>,
        partition: &Partition,
        cashier_id: &str,
        release: TableRelease,
    ) -> BillingResult<TicketReceipt> {
        let config = &self.ctx.config;
        let services = &self.ctx.services;
        let method = partition.payment_method;
        let rate = config.tax_rate();

        self.ctx.accept_payment_method(method)?;
        partition.split(rate)?;

        let orders = self.revalidate(uow, partition).await?;

        let now = Utc::now();
        let day = self.ctx.calendar().day_of(now);
        let sequence = self
            .ctx
            .db
            .ticket_sequences()
            .next_value(uow.conn(), day)
            .await
            .map_err(|e| BillingError::persistence("Claiming ticket number", e))?;
        let number = TicketNumber::new(day, sequence);

        let mut rows = Vec::with_capacity(orders.len());
        for order in &orders {
            let split = TaxSplit::split_unchecked(order.total(), rate);
            let ticket = Ticket {
                id: new_id(),
                order_id: order.id.clone(),
                ticket_number: number.to_string(),
                cashier_id: cashier_id.to_string(),
                subtotal_cents: split.subtotal.cents(),
                tax_cents: split.tax.cents(),
                total_cents: split.total.cents(),
                payment_method: method,
                status: TicketStatus::Open,
                business_day: day,
                cancelled_at: None,
                cancelled_by: None,
                cancellation_reason: None,
                tip_amount_cents: None,
                tip_percentage_bps: None,
                tip_date: None,
                tip_added_by: None,
                evidence_file: None,
                evidence_uploaded_at: None,
                evidence_uploaded_by: None,
                created_at: now,
            };
            self.insert_row(uow, &ticket).await?;
            rows.push(ticket);
        }

        for order in &orders {
            services
                .orders
                .transition_status(uow.conn(), &order.id, OrderStatus::Delivered)
                .await?;
        }

        let stats_policy = config.side_effects.customer_stats;
        for order in &orders {
            if let Some(customer_id) = &order.customer_id {
                let savepoint = open_effect(uow, stats_policy).await?;
                let outcome = services
                    .customers
                    .apply_purchase(uow.conn(), customer_id, order.total())
                    .await;
                settle_effect(uow, savepoint, "Customer statistics", customer_id, outcome).await?;
            }
        }

        if config.deducts_inventory() {
            let inventory_policy = config.side_effects.inventory;
            for (order, row) in orders.iter().zip(&rows) {
                let savepoint = open_effect(uow, inventory_policy).await?;
                let outcome = self.deduct_order(uow, order, cashier_id, &row.id).await;
                settle_effect(uow, savepoint, "Inventory deduction", &order.id, outcome).await?;
            }
        }

        if release == TableRelease::Free {
            services.tables.free(uow.conn(), &partition.table_id).await?;
        }

        let receipt = TicketReceipt {
            ticket_number: number.into_string(),
            ticket_ids: rows.iter().map(|t| t.id.clone()).collect(),
            order_ids: rows.iter().map(|t| t.order_id.clone()).collect(),
            table_id: partition.table_id.clone(),
            kind: partition.kind.clone(),
            payment_method: method,
            subtotal_cents: rows.iter().map(|t| t.subtotal_cents).sum(),
            tax_cents: rows.iter().map(|t| t.tax_cents).sum(),
            total_cents: rows.iter().map(|t| t.total_cents).sum(),
            business_day: day,
            created_at: now,
        };

        info!(
            ticket_number = %receipt.ticket_number,
            orders = receipt.order_ids.len(),
            total_cents = receipt.total_cents,
            method = %method,
            "Ticket created"
        );

        Ok(receipt)
    }

    /// Re-reads every order under the transaction. Returns the fresh rows in
    /// partition order.
    async fn revalidate(
        &self,
        uow: &mut UnitOfWork<'_>,
        partition: &Partition,
    ) -> BillingResult<Vec<Order>> {
        let mut fresh = Vec::with_capacity(partition.orders.len());
        for order in &partition.orders {
            let current = self
                .ctx
                .services
                .orders
                .find(uow.conn(), &order.id)
                .await?
                .ok_or_else(|| BillingError::OrderNotFound(order.id.clone()))?;

            if current.status != OrderStatus::Ready {
                return Err(BillingError::OrderNotReady {
                    order_id: current.id,
                    status: current.status,
                });
            }

            if let Some(existing) = self
                .ctx
                .db
                .tickets()
                .active_for_order(uow.conn(), &current.id)
                .await?
            {
                return Err(BillingError::DuplicateTicket {
                    order_id: current.id,
                    ticket_number: existing.ticket_number,
                });
            }

            fresh.push(current);
        }
        Ok(fresh)
    }

    async fn insert_row(&self, uow: &mut UnitOfWork<'_>, ticket: &Ticket) -> BillingResult<()> {
        let tickets = self.ctx.db.tickets();
        match tickets.insert(uow.conn(), ticket).await {
            Ok(()) => Ok(()),
            Err(DbError::UniqueViolation { .. }) => {
                let ticket_number = tickets
                    .active_for_order(uow.conn(), &ticket.order_id)
                    .await?
                    .map(|t| t.ticket_number)
                    .unwrap_or_else(|| "unknown".to_string());
                Err(BillingError::DuplicateTicket {
                    order_id: ticket.order_id.clone(),
                    ticket_number,
                })
            }
            Err(e) if e.is_check_violation("ck_tickets_payment_method") => Err(
                BillingError::schema_rejected_payment_method(ticket.payment_method.as_str()),
            ),
            Err(e) => Err(BillingError::persistence("Inserting ticket", e)),
        }
    }

    async fn deduct_order(
        &self,
        uow: &mut UnitOfWork<'_>,
        order: &Order,
        actor_id: &str,
        ticket_id: &str,
    ) -> DbResult<()> {
        let services = &self.ctx.services;
        let items = services.orders.items(uow.conn(), &order.id).await?;
        for item in &items {
            services
                .inventory
                .deduct_for_dish(uow.conn(), &item.dish_id, item.quantity, actor_id, ticket_id)
                .await?;
        }
        Ok(())
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn bill_partitions(
        &self,
        uow: &mut UnitOfWork<'_>,
        partitions: &[Partition],
        cashier_id: &str,
    ) -> BillingResult<Vec<TicketReceipt>> {
        let mut receipts = Vec::with_capacity(partitions.len());
        for partition in partitions {
            let receipt = self
                .execute_partition(Some(&mut *uow), partition, cashier_id, TableRelease::Keep)
                .await?;
            receipts.push(receipt);
        }

        if let Some(first) = partitions.first() {
            self.ctx
                .services
                .tables
                .free(uow.conn(), &first.table_id)
                .await?;
        }

        Ok(receipts)
    }

    fn group(
        &self,
        orders: Vec<Order>,
        mode: GroupingMode,
        method: mesa_core::PaymentMethod,
    ) -> BillingResult<Vec<Partition>> {
        let aggregator = &self.ctx.aggregator;
        Ok(match mode {
            GroupingMode::Table => vec![aggregator.by_table(orders, method)?],
            GroupingMode::Customer => aggregator.by_customer(orders, method)?,
        })
    }

    async fn ready_orders(
        &self,
        uow: &mut UnitOfWork<'_>,
        table_id: &str,
    ) -> BillingResult<Vec<Order>> {
        let orders = self
            .ctx
            .services
            .orders
            .list_ready_for_table(uow.conn(), table_id)
            .await?;
        if orders.is_empty() {
            return Err(BillingError::NoReadyOrders {
                table_id: table_id.to_string(),
            });
        }
        Ok(orders)
    }

    async fn load_order(&self, order_id: &str) -> BillingResult<Order> {
        self.ctx
            .db
            .orders()
            .get_by_id(order_id)
            .await?
            .ok_or_else(|| BillingError::OrderNotFound(order_id.to_string()))
    }

    async fn acquire(&self) -> BillingResult<PooledConnection> {
        self.ctx
            .db
            .acquire()
            .await
            .map_err(|e| BillingError::persistence("Acquiring connection", e))
    }
}

// =============================================================================
// Transaction Helpers
// =============================================================================

pub(crate) async fn begin<'c>(
    conn: &'c mut mesa_db::SqliteConnection,
) -> BillingResult<UnitOfWork<'c>> {
    UnitOfWork::begin(conn)
        .await
        .map_err(|e| BillingError::persistence("Opening transaction", e))
}

/// Commits on success; rolls back and returns the original error otherwise.
pub(crate) async fn finish<T>(uow: UnitOfWork<'_>, result: BillingResult<T>) -> BillingResult<T> {
    match result {
        Ok(value) => {
            uow.commit()
                .await
                .map_err(|e| BillingError::persistence("Committing transaction", e))?;
            Ok(value)
        }
        Err(err) => {
            uow.rollback().await;
            Err(err)
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{failing_customer_stats, failing_inventory, ready, Floor, CASHIER};
    use mesa_db::DbConfig;
    use mesa_core::{
        BillingConfig, CustomerKey, CustomerSelection, PaymentMethod, SideEffectPolicy,
        TableStatus, TicketNumber,
    };

    fn order_ticket(order_id: &str, method: PaymentMethod) -> OrderTicket {
        OrderTicket {
            order_id: order_id.to_string(),
            payment_method: method,
            cashier_id: CASHIER.to_string(),
        }
    }

    async fn floor_with_table() -> Floor {
        let floor = Floor::new().await;
        floor.table("table-5", 5).await;
        floor
    }

    #[tokio::test]
    async fn test_single_order_is_billed_and_table_freed() {
        let floor = floor_with_table().await;
        let order_id = floor.order(ready("table-5", 11600)).await;
        let service = TicketService::new(floor.context().await);

        let receipt = service
            .create_for_order(&order_ticket(&order_id, PaymentMethod::Cash))
            .await
            .unwrap();

        assert_eq!(receipt.total_cents, 11600);
        assert_eq!(receipt.subtotal_cents, 10000);
        assert_eq!(receipt.tax_cents, 1600);
        assert_eq!(receipt.order_ids, vec![order_id.clone()]);
        assert_eq!(
            receipt.ticket_number,
            TicketNumber::new(receipt.business_day, 1).into_string()
        );

        assert_eq!(floor.order_status(&order_id).await, OrderStatus::Delivered);
        assert_eq!(floor.table_status("table-5").await, TableStatus::Available);
        assert_eq!(floor.ticket_rows().await, 1);
    }

    #[tokio::test]
    async fn test_second_ticket_for_same_order_is_rejected() {
        let floor = floor_with_table().await;
        let order_id = floor.order(ready("table-5", 5000)).await;
        let service = TicketService::new(floor.context().await);
        let cmd = order_ticket(&order_id, PaymentMethod::Cash);

        let first = service.create_for_order(&cmd).await.unwrap();

        // The order is delivered now, so the aggregator rejects it first.
        let err = service.create_for_order(&cmd).await.unwrap_err();
        assert!(matches!(err, BillingError::OrderNotReady { .. }));
        assert_eq!(floor.ticket_rows().await, 1);

        // Force the order back to ready: the open ticket still blocks it.
        let mut conn = floor.db.acquire().await.unwrap();
        floor
            .db
            .orders()
            .transition_status(&mut conn, &order_id, OrderStatus::Ready)
            .await
            .unwrap();
        drop(conn);

        let err = service.create_for_order(&cmd).await.unwrap_err();
        match err {
            BillingError::DuplicateTicket { ticket_number, .. } => {
                assert_eq!(ticket_number, first.ticket_number)
            }
            other => panic!("expected DuplicateTicket, got {other:?}"),
        }
        assert_eq!(floor.ticket_rows().await, 1);
    }

    #[tokio::test]
    async fn test_numbers_increment_within_the_day() {
        let floor = floor_with_table().await;
        let a = floor.order(ready("table-5", 1000)).await;
        let b = floor.order(ready("table-5", 2000)).await;
        let service = TicketService::new(floor.context().await);

        let first = service
            .create_for_order(&order_ticket(&a, PaymentMethod::Cash))
            .await
            .unwrap();
        let second = service
            .create_for_order(&order_ticket(&b, PaymentMethod::Card))
            .await
            .unwrap();

        let (_, s1) = TicketNumber::parse(&first.ticket_number).unwrap();
        let (_, s2) = TicketNumber::parse(&second.ticket_number).unwrap();
        assert_eq!(s2, s1 + 1);
    }

    #[tokio::test]
    async fn test_table_bill_groups_all_ready_orders() {
        let floor = floor_with_table().await;
        let a = floor.order(ready("table-5", 10000).named("Maria")).await;
        let b = floor.order(ready("table-5", 5000).named("Jose")).await;
        let service = TicketService::new(floor.context().await);

        let receipts = service
            .create_for_table(&TableTickets {
                table_id: "table-5".into(),
                mode: GroupingMode::Table,
                payment_method: PaymentMethod::Card,
                cashier_id: CASHIER.into(),
            })
            .await
            .unwrap();

        assert_eq!(receipts.len(), 1);
        assert_eq!(receipts[0].order_ids, vec![a, b]);
        assert_eq!(receipts[0].total_cents, 15000);
        assert_eq!(floor.ticket_rows().await, 2);
        assert_eq!(floor.table_status("table-5").await, TableStatus::Available);
    }

    #[tokio::test]
    async fn test_table_without_ready_orders() {
        let floor = floor_with_table().await;
        floor
            .order(ready("table-5", 5000).status(OrderStatus::Preparing))
            .await;
        let service = TicketService::new(floor.context().await);

        let err = service
            .create_for_table(&TableTickets {
                table_id: "table-5".into(),
                mode: GroupingMode::Customer,
                payment_method: PaymentMethod::Cash,
                cashier_id: CASHIER.into(),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, BillingError::NoReadyOrders { .. }));
        assert_eq!(floor.table_status("table-5").await, TableStatus::Occupied);
    }

    #[tokio::test]
    async fn test_customer_mode_issues_one_number_per_customer() {
        let floor = floor_with_table().await;
        floor.order(ready("table-5", 10000).named("Maria")).await;
        floor.order(ready("table-5", 3000).named(" maria ")).await;
        floor.order(ready("table-5", 4000).named("Jose")).await;
        let service = TicketService::new(floor.context().await);

        let receipts = service
            .create_for_table(&TableTickets {
                table_id: "table-5".into(),
                mode: GroupingMode::Customer,
                payment_method: PaymentMethod::Cash,
                cashier_id: CASHIER.into(),
            })
            .await
            .unwrap();

        assert_eq!(receipts.len(), 2);
        assert_ne!(receipts[0].ticket_number, receipts[1].ticket_number);
        assert_eq!(receipts[0].total_cents, 13000);
        assert_eq!(receipts[1].total_cents, 4000);
        assert_eq!(floor.ticket_rows().await, 3);
    }

    #[tokio::test]
    async fn test_cross_table_selection_is_rejected() {
        let floor = floor_with_table().await;
        floor.table("table-2", 2).await;
        let a = floor.order(ready("table-5", 1000)).await;
        let b = floor.order(ready("table-2", 1000)).await;
        let service = TicketService::new(floor.context().await);

        let err = service
            .create_for_orders(&OrdersTicket {
                order_ids: vec![a.clone(), b],
                mode: GroupingMode::Table,
                payment_method: PaymentMethod::Cash,
                cashier_id: CASHIER.into(),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, BillingError::CrossTableMix { .. }));
        assert_eq!(floor.ticket_rows().await, 0);
        assert_eq!(floor.order_status(&a).await, OrderStatus::Ready);
    }

    #[tokio::test]
    async fn test_missing_order_in_selection() {
        let floor = floor_with_table().await;
        let a = floor.order(ready("table-5", 1000)).await;
        let service = TicketService::new(floor.context().await);

        let err = service
            .create_for_orders(&OrdersTicket {
                order_ids: vec![a, "ghost".into()],
                mode: GroupingMode::Table,
                payment_method: PaymentMethod::Cash,
                cashier_id: CASHIER.into(),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, BillingError::OrderNotFound(id) if id == "ghost"));
    }

    #[tokio::test]
    async fn test_separation_bills_selected_customer_apart() {
        let floor = floor_with_table().await;
        let m1 = floor.order(ready("table-5", 12000).named("Maria")).await;
        let m2 = floor.order(ready("table-5", 8000).named("maria")).await;
        let j = floor.order(ready("table-5", 10000).named("Juan")).await;
        let service = TicketService::new(floor.context().await);

        let receipt = service
            .create_separated(&SeparateTickets {
                table_id: "table-5".into(),
                selections: vec![
                    CustomerSelection::new("MARIA", Some(PaymentMethod::Card)),
                    CustomerSelection::new("Pedro", None),
                ],
                default_payment_method: PaymentMethod::Cash,
                cashier_id: CASHIER.into(),
            })
            .await
            .unwrap();

        assert_eq!(receipt.tickets.len(), 2);
        let maria = &receipt.tickets[0];
        let rest = &receipt.tickets[1];
        assert_eq!(maria.order_ids, vec![m1, m2]);
        assert_eq!(maria.total_cents, 20000);
        assert_eq!(maria.payment_method, PaymentMethod::Card);
        assert_eq!(rest.order_ids, vec![j]);
        assert_eq!(rest.total_cents, 10000);
        assert_eq!(rest.payment_method, PaymentMethod::Cash);
        assert_ne!(maria.ticket_number, rest.ticket_number);
        assert_eq!(
            receipt.unmatched_customers,
            vec![CustomerKey::Named("pedro".into())]
        );
        assert_eq!(floor.table_status("table-5").await, TableStatus::Available);
    }

    #[tokio::test]
    async fn test_unassigned_orders_can_be_separated() {
        let floor = floor_with_table().await;
        let maria = floor.order(ready("table-5", 10000).named("Maria")).await;
        let juan = floor.order(ready("table-5", 5000).named("Juan")).await;
        let nobody = floor.order(ready("table-5", 3000)).await;
        let service = TicketService::new(floor.context().await);

        let receipt = service
            .create_separated(&SeparateTickets {
                table_id: "table-5".into(),
                selections: vec![CustomerSelection::unassigned(Some(PaymentMethod::Card))],
                default_payment_method: PaymentMethod::Cash,
                cashier_id: CASHIER.into(),
            })
            .await
            .unwrap();

        assert!(receipt.unmatched_customers.is_empty());
        assert_eq!(receipt.tickets.len(), 2);
        let separated = &receipt.tickets[0];
        assert_eq!(separated.order_ids, vec![nobody]);
        assert_eq!(separated.total_cents, 3000);
        assert_eq!(separated.payment_method, PaymentMethod::Card);
        let rest = &receipt.tickets[1];
        assert_eq!(rest.order_ids.len(), 2);
        assert!(rest.order_ids.contains(&maria) && rest.order_ids.contains(&juan));
        assert_eq!(rest.total_cents, 15000);
        assert_eq!(rest.payment_method, PaymentMethod::Cash);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_bills_get_distinct_numbers() {
        let dir = tempfile::tempdir().unwrap();
        let floor = Floor::open(DbConfig::new(dir.path().join("mesa.db"))).await;
        floor.table("table-5", 5).await;
        let mut order_ids = Vec::new();
        for cents in [1000, 2000, 3000, 4000, 5000, 6000] {
            order_ids.push(floor.order(ready("table-5", cents)).await);
        }
        let service = TicketService::new(floor.context().await);

        let handles: Vec<_> = order_ids
            .iter()
            .map(|id| {
                let service = service.clone();
                let cmd = order_ticket(id, PaymentMethod::Cash);
                tokio::spawn(async move { service.create_for_order(&cmd).await })
            })
            .collect();

        let mut numbers = Vec::new();
        for handle in handles {
            numbers.push(handle.await.unwrap().unwrap().ticket_number);
        }
        numbers.sort();
        numbers.dedup();
        assert_eq!(numbers.len(), order_ids.len());
        assert_eq!(floor.ticket_rows().await, order_ids.len() as i64);
    }

    #[tokio::test]
    async fn test_pending_collection_requires_the_switch() {
        let floor = floor_with_table().await;
        let order_id = floor.order(ready("table-5", 5000)).await;

        let service = TicketService::new(floor.context().await);
        let err = service
            .create_for_order(&order_ticket(&order_id, PaymentMethod::PendingCollection))
            .await
            .unwrap_err();
        assert!(matches!(err, BillingError::PaymentMethodDisabled { .. }));

        let config = BillingConfig {
            pending_collection_enabled: true,
            ..BillingConfig::default()
        };
        let service = TicketService::new(floor.context_with(config).await);
        let receipt = service
            .create_for_order(&order_ticket(&order_id, PaymentMethod::PendingCollection))
            .await
            .unwrap();
        assert_eq!(receipt.payment_method, PaymentMethod::PendingCollection);
    }

    #[tokio::test]
    async fn test_undeployed_method_is_reported_as_schema_drift() {
        let floor = floor_with_table().await;
        let order_id = floor.order(ready("table-5", 5000)).await;
        sqlx::query("DELETE FROM payment_methods WHERE code = 'card'")
            .execute(floor.db.pool())
            .await
            .unwrap();
        let service = TicketService::new(floor.context().await);

        let err = service
            .create_for_order(&order_ticket(&order_id, PaymentMethod::Card))
            .await
            .unwrap_err();

        assert!(matches!(err, BillingError::SchemaRejectedValue { .. }));
        assert_eq!(floor.ticket_rows().await, 0);
    }

    #[tokio::test]
    async fn test_expired_order_keeps_its_date() {
        let floor = floor_with_table().await;
        let order_id = floor.order(ready("table-5", 7000).days_ago(1)).await;
        let taken_at = floor.order_created_at(&order_id).await;
        let service = TicketService::new(floor.context().await);

        let expired = service.list_expired_orders().await.unwrap();
        assert_eq!(expired.len(), 1);

        let err = service
            .create_for_order(&order_ticket(&order_id, PaymentMethod::Cash))
            .await
            .unwrap_err();
        assert!(matches!(err, BillingError::CrossDayMix { .. }));

        let receipt = service
            .create_for_expired_order(&order_ticket(&order_id, PaymentMethod::Cash))
            .await
            .unwrap();

        assert_eq!(receipt.kind, mesa_core::PartitionKind::Expired);
        assert_eq!(receipt.business_day, service.ctx.calendar().day_of(Utc::now()));
        assert_eq!(floor.order_created_at(&order_id).await, taken_at);
        assert!(service.list_expired_orders().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_inventory_is_deducted_with_the_ticket() {
        let floor = floor_with_table().await;
        floor.dish("dish-taco", "tortilla", 3, 100).await;
        let order_id = floor
            .order(ready("table-5", 9000).item("dish-taco", 2))
            .await;
        let service = TicketService::new(floor.context().await);

        service
            .create_for_order(&order_ticket(&order_id, PaymentMethod::Cash))
            .await
            .unwrap();

        assert_eq!(floor.stock("tortilla").await, 94);
    }

    #[tokio::test]
    async fn test_failed_inventory_does_not_block_the_ticket() {
        let floor = floor_with_table().await;
        floor.dish("dish-taco", "tortilla", 3, 100).await;
        let order_id = floor
            .order(ready("table-5", 9000).item("dish-taco", 2))
            .await;
        let ctx = floor
            .context_with_services(BillingConfig::default(), failing_inventory)
            .await;
        let service = TicketService::new(ctx);

        service
            .create_for_order(&order_ticket(&order_id, PaymentMethod::Cash))
            .await
            .unwrap();

        // The double's partial write was rolled back with its savepoint.
        assert_eq!(floor.stock("tortilla").await, 100);
        assert_eq!(floor.ticket_rows().await, 1);
        assert_eq!(floor.order_status(&order_id).await, OrderStatus::Delivered);
    }

    #[tokio::test]
    async fn test_transactional_inventory_failure_rolls_back() {
        let floor = floor_with_table().await;
        floor.dish("dish-taco", "tortilla", 3, 100).await;
        let order_id = floor
            .order(ready("table-5", 9000).item("dish-taco", 1))
            .await;
        let mut config = BillingConfig::default();
        config.side_effects.inventory = SideEffectPolicy::Transactional;
        let service =
            TicketService::new(floor.context_with_services(config, failing_inventory).await);

        let err = service
            .create_for_order(&order_ticket(&order_id, PaymentMethod::Cash))
            .await
            .unwrap_err();

        assert!(err.is_persistence());
        assert_eq!(floor.stock("tortilla").await, 100);
        assert_eq!(floor.ticket_rows().await, 0);
        assert_eq!(floor.order_status(&order_id).await, OrderStatus::Ready);
    }

    #[tokio::test]
    async fn test_customer_stats_failure_rolls_back_by_default() {
        let floor = floor_with_table().await;
        floor.customer("cust-1", "Maria").await;
        let order_id = floor
            .order(ready("table-5", 5000).customer("cust-1", "Maria"))
            .await;
        let service = TicketService::new(
            floor
                .context_with_services(BillingConfig::default(), failing_customer_stats)
                .await,
        );

        let err = service
            .create_for_order(&order_ticket(&order_id, PaymentMethod::Cash))
            .await
            .unwrap_err();

        assert!(err.is_persistence());
        assert_eq!(floor.ticket_rows().await, 0);
        assert_eq!(floor.table_status("table-5").await, TableStatus::Occupied);
    }

    #[tokio::test]
    async fn test_customer_stats_are_updated() {
        let floor = floor_with_table().await;
        floor.customer("cust-1", "Maria").await;
        let order_id = floor
            .order(ready("table-5", 5000).customer("cust-1", "Maria"))
            .await;
        let service = TicketService::new(floor.context().await);

        service
            .create_for_order(&order_ticket(&order_id, PaymentMethod::Cash))
            .await
            .unwrap();

        assert_eq!(floor.visits("cust-1").await, (1, 5000));
    }

    #[tokio::test]
    async fn test_failure_in_second_partition_rolls_back_the_first() {
        let floor = floor_with_table().await;
        floor.customer("cust-1", "Maria").await;
        floor.order(ready("table-5", 5000).named("Jose")).await;
        floor
            .order(ready("table-5", 5000).customer("cust-1", "Maria"))
            .await;
        let service = TicketService::new(
            floor
                .context_with_services(BillingConfig::default(), failing_customer_stats)
                .await,
        );

        let err = service
            .create_for_table(&TableTickets {
                table_id: "table-5".into(),
                mode: GroupingMode::Customer,
                payment_method: PaymentMethod::Cash,
                cashier_id: CASHIER.into(),
            })
            .await
            .unwrap_err();

        assert!(err.is_persistence());
        assert_eq!(floor.ticket_rows().await, 0);
        assert_eq!(floor.table_status("table-5").await, TableStatus::Occupied);
    }

    #[tokio::test]
    async fn test_ticket_details() {
        let floor = floor_with_table().await;
        floor.order(ready("table-5", 11600)).await;
        floor.order(ready("table-5", 5800)).await;
        let service = TicketService::new(floor.context().await);

        let receipts = service
            .create_for_table(&TableTickets {
                table_id: "table-5".into(),
                mode: GroupingMode::Table,
                payment_method: PaymentMethod::Cash,
                cashier_id: CASHIER.into(),
            })
            .await
            .unwrap();

        let details = service
            .ticket_details(&receipts[0].ticket_number)
            .await
            .unwrap();
        assert_eq!(details.rows.len(), 2);
        assert_eq!(details.total_cents, 17400);
        assert!(!details.all_cancelled);

        let err = service.ticket_details("T202001010001").await.unwrap_err();
        assert!(matches!(err, BillingError::TicketNotFound(_)));
    }
}
