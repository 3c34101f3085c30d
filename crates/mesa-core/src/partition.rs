//! # Ticket Aggregator
//!
//! Turns a caller's selection into **partitions**. One partition becomes one
//! ticket number, with one ticket row per order.
//!
//! ## Modes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Mode              Input                      Partitions                │
//! │  ────────────────  ─────────────────────────  ───────────────────────── │
//! │  single            1 order                    {order}                   │
//! │  by_table          ready orders of a table    {all}                     │
//! │  by_customer       ready orders of a table    one per CustomerKey       │
//! │  separate          orders + selected keys     one per selected key      │
//! │                                               + one remainder           │
//! │  expired           1 order from a past day    {order}, no day check     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Checks
//! ```text
//! every mode ........ orders are ready, payment method accepted
//! single ............ order belongs to today          (same-day policy)
//! by_table .......... same table, same waiter, same day
//! by_customer ....... same table, same day             (waiter relaxed)
//! separate .......... same table, same day             (waiter relaxed)
//! ```
//!
//! Everything here is pure. Whether an order already has a ticket is a
//! database question, re-checked by the coordinator under the transaction.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::{BillingConfig, SameDayPolicy};
use crate::customer::CustomerKey;
use crate::error::{CoreError, CoreResult};
use crate::ledger::BusinessCalendar;
use crate::money::Money;
use crate::tax::{TaxRate, TaxSplit};
use crate::types::{Order, OrderStatus, PaymentMethod};

// =============================================================================
// Partition
// =============================================================================

/// Why a partition exists; carried into logs and receipts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PartitionKind {
    SingleOrder,
    Table,
    Customer { customer: CustomerKey },
    Separated { customer: CustomerKey },
    /// Everything left after the separated customers.
    Remainder,
    /// Order settled on a later day than it was taken.
    Expired,
}

/// A set of orders billed together under one ticket number.
#[derive(Debug, Clone)]
pub struct Partition {
    pub kind: PartitionKind,
    pub table_id: String,
    pub payment_method: PaymentMethod,
    /// In the order the caller supplied them; rows are inserted in this order.
    pub orders: Vec<Order>,
}

impl Partition {
    pub fn total(&self) -> Money {
        self.orders.iter().map(Order::total).sum()
    }

    pub fn order_ids(&self) -> Vec<String> {
        self.orders.iter().map(|o| o.id.clone()).collect()
    }

    /// Bill-level tax split; fails when the bill is not positive.
    pub fn split(&self, rate: TaxRate) -> CoreResult<TaxSplit> {
        TaxSplit::split(self.total(), rate)
    }

    /// Expired-order settlements skip the order-date check.
    pub fn is_expired_settlement(&self) -> bool {
        matches!(self.kind, PartitionKind::Expired)
    }
}

/// One customer the caller wants on a separate bill.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerSelection {
    pub customer: CustomerKey,
    /// Falls back to the request's default method.
    pub payment_method: Option<PaymentMethod>,
}

impl CustomerSelection {
    pub fn new(name: &str, payment_method: Option<PaymentMethod>) -> Self {
        CustomerSelection {
            customer: CustomerKey::from_name(Some(name)),
            payment_method,
        }
    }

    /// Selects the orders that carry no customer name.
    pub fn unassigned(payment_method: Option<PaymentMethod>) -> Self {
        CustomerSelection {
            customer: CustomerKey::Unassigned,
            payment_method,
        }
    }
}

/// Result of a customer separation.
#[derive(Debug, Clone)]
pub struct SeparationPlan {
    pub partitions: Vec<Partition>,
    /// Selected customers with no ready order at the table.
    pub unmatched: Vec<CustomerKey>,
}

// =============================================================================
// Aggregator
// =============================================================================

/// Builds partitions according to the deployment's billing rules.
#[derive(Debug, Clone)]
pub struct Aggregator {
    calendar: BusinessCalendar,
    same_day: SameDayPolicy,
    config: BillingConfig,
}

impl Aggregator {
    pub fn new(config: &BillingConfig) -> CoreResult<Aggregator> {
        Ok(Aggregator {
            calendar: config.calendar()?,
            same_day: config.same_day_policy,
            config: config.clone(),
        })
    }

    pub fn calendar(&self) -> BusinessCalendar {
        self.calendar
    }

    /// One order, taken today.
    pub fn single(
        &self,
        order: Order,
        method: PaymentMethod,
        today: NaiveDate,
    ) -> CoreResult<Partition> {
        self.config.check_payment_method(method)?;
        ensure_ready(&order)?;

        if self.same_day.is_enforced() {
            let order_day = self.calendar.day_of(order.created_at);
            if order_day != today {
                return Err(CoreError::CrossDayMix {
                    expected: today,
                    found: order_day,
                });
            }
        }

        Ok(Partition {
            kind: PartitionKind::SingleOrder,
            table_id: order.table_id.clone(),
            payment_method: method,
            orders: vec![order],
        })
    }

    /// One order left over from a previous operating day.
    pub fn expired(&self, order: Order, method: PaymentMethod) -> CoreResult<Partition> {
        self.config.check_payment_method(method)?;
        ensure_ready(&order)?;

        Ok(Partition {
            kind: PartitionKind::Expired,
            table_id: order.table_id.clone(),
            payment_method: method,
            orders: vec![order],
        })
    }

    /// Every order on one bill.
    pub fn by_table(&self, orders: Vec<Order>, method: PaymentMethod) -> CoreResult<Partition> {
        self.config.check_payment_method(method)?;
        let table_id = self.check_common(&orders, true)?;

        Ok(Partition {
            kind: PartitionKind::Table,
            table_id,
            payment_method: method,
            orders,
        })
    }

    /// One bill per customer, all paid with the same method.
    pub fn by_customer(
        &self,
        orders: Vec<Order>,
        method: PaymentMethod,
    ) -> CoreResult<Vec<Partition>> {
        self.config.check_payment_method(method)?;
        let table_id = self.check_common(&orders, false)?;

        Ok(group_by_customer(orders)
            .into_iter()
            .map(|(customer, orders)| Partition {
                kind: PartitionKind::Customer { customer },
                table_id: table_id.clone(),
                payment_method: method,
                orders,
            })
            .collect())
    }

    /// Selected customers get their own bills; the rest share one.
    ///
    /// ## Example
    /// ```text
    /// orders: Maria(120) Juan(100) Maria(80)
    /// select: Maria → card          default: cash
    ///
    /// partitions: [Separated maria, card, 200] [Remainder, cash, 100]
    /// ```
    pub fn separate(
        &self,
        orders: Vec<Order>,
        selections: &[CustomerSelection],
        default_method: PaymentMethod,
    ) -> CoreResult<SeparationPlan> {
        self.config.check_payment_method(default_method)?;
        for selection in selections {
            if let Some(method) = selection.payment_method {
                self.config.check_payment_method(method)?;
            }
        }
        let table_id = self.check_common(&orders, false)?;

        let mut groups = group_by_customer(orders);
        let mut partitions = Vec::new();
        let mut unmatched = Vec::new();

        for selection in selections {
            match groups.iter().position(|(key, _)| *key == selection.customer) {
                Some(index) => {
                    let (customer, orders) = groups.remove(index);
                    partitions.push(Partition {
                        kind: PartitionKind::Separated { customer },
                        table_id: table_id.clone(),
                        payment_method: selection.payment_method.unwrap_or(default_method),
                        orders,
                    });
                }
                None => {
                    // Also reached when the same customer is selected twice.
                    if !partitions.iter().any(|p: &Partition| {
                        p.kind
                            == PartitionKind::Separated {
                                customer: selection.customer.clone(),
                            }
                    }) {
                        unmatched.push(selection.customer.clone());
                    }
                }
            }
        }

        let remainder: Vec<Order> = groups.into_iter().flat_map(|(_, orders)| orders).collect();
        if !remainder.is_empty() {
            partitions.push(Partition {
                kind: PartitionKind::Remainder,
                table_id,
                payment_method: default_method,
                orders: remainder,
            });
        }

        Ok(SeparationPlan {
            partitions,
            unmatched,
        })
    }

    /// Checks shared by the multi-order modes. Returns the common table id.
    fn check_common(&self, orders: &[Order], same_waiter: bool) -> CoreResult<String> {
        let first = orders.first().ok_or(CoreError::EmptySelection)?;

        for order in orders {
            ensure_ready(order)?;
        }

        for order in &orders[1..] {
            if order.table_id != first.table_id {
                return Err(CoreError::CrossTableMix {
                    expected: first.table_id.clone(),
                    found: order.table_id.clone(),
                });
            }
        }

        if same_waiter {
            for order in &orders[1..] {
                if order.waiter_id != first.waiter_id {
                    return Err(CoreError::CrossWaiterMix {
                        expected: first.waiter_id.clone(),
                        found: order.waiter_id.clone(),
                    });
                }
            }
        }

        if self.same_day.is_enforced() {
            let first_day = self.calendar.day_of(first.created_at);
            for order in &orders[1..] {
                let day = self.calendar.day_of(order.created_at);
                if day != first_day {
                    return Err(CoreError::CrossDayMix {
                        expected: first_day,
                        found: day,
                    });
                }
            }
        }

        Ok(first.table_id.clone())
    }
}

fn ensure_ready(order: &Order) -> CoreResult<()> {
    if order.status != OrderStatus::Ready {
        return Err(CoreError::OrderNotReady {
            order_id: order.id.clone(),
            status: order.status,
        });
    }
    Ok(())
}

/// Groups orders by customer key, keeping first-seen order for both the
/// groups and the orders inside each group.
fn group_by_customer(orders: Vec<Order>) -> Vec<(CustomerKey, Vec<Order>)> {
    let mut groups: Vec<(CustomerKey, Vec<Order>)> = Vec::new();
    for order in orders {
        let key = order.customer_key();
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, bucket)) => bucket.push(order),
            None => groups.push((key, vec![order])),
        }
    }
    groups
}

// =============================================================================
// Unit Tests
// =============================================================================
