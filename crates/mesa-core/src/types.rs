//! # Domain Types
//!
//! Core domain types used throughout Mesa POS.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │     Order       │   │     Ticket      │   │  DiningTable    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │◄──│  order_id (FK)  │   │  id (UUID)      │       │
//! │  │  table_id ──────┼───┼─────────────────┼──►│  number         │       │
//! │  │  waiter_id      │   │  ticket_number  │   │  status         │       │
//! │  │  customer_name  │   │  total_cents    │   │  waiter_id      │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  OrderStatus    │   │  TicketStatus   │   │ PaymentMethod   │       │
//! │  │  ready          │   │  open           │   │  cash, card,    │       │
//! │  │  delivered ...  │   │  cancelled      │   │  bank_transfer… │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! - `id`: UUID v4, used for relations
//! - Business ID: `ticket_number`, table `number`, human-readable

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::customer::CustomerKey;
use crate::error::CoreError;
use crate::money::Money;

// =============================================================================
// Order Status
// =============================================================================

/// Kitchen-to-floor lifecycle of an order.
///
/// ```text
/// pending_confirmation → pending → preparing → ready ⇄ delivered
///                                                 ▲         │
///                                                 └─ ticket cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    PendingConfirmation,
    Pending,
    Preparing,
    /// Cooked and on the table; the only billable state.
    Ready,
    /// A committed ticket references the order.
    Delivered,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::PendingConfirmation => "pending_confirmation",
            OrderStatus::Pending => "pending",
            OrderStatus::Preparing => "preparing",
            OrderStatus::Ready => "ready",
            OrderStatus::Delivered => "delivered",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Ticket Status
// =============================================================================

/// `open → cancelled`, terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    Cancelled,
}

impl Default for TicketStatus {
    fn default() -> Self {
        TicketStatus::Open
    }
}

// =============================================================================
// Table Status
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum TableStatus {
    Available,
    Occupied,
    BillRequested,
    Closed,
}

impl TableStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TableStatus::Available => "available",
            TableStatus::Occupied => "occupied",
            TableStatus::BillRequested => "bill_requested",
            TableStatus::Closed => "closed",
        }
    }
}

// =============================================================================
// Payment Method
// =============================================================================

/// How a ticket was (or will be) paid.
///
/// `PendingCollection` is deferred billing and only accepted when the
/// deployment turns it on (see `BillingConfig::check_payment_method`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    BankTransfer,
    /// Settled with goods or services instead of money.
    InKindExchange,
    PendingCollection,
}

impl PaymentMethod {
    /// Every recognized method, in display order.
    pub const ALL: [PaymentMethod; 5] = [
        PaymentMethod::Cash,
        PaymentMethod::Card,
        PaymentMethod::BankTransfer,
        PaymentMethod::InKindExchange,
        PaymentMethod::PendingCollection,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::InKindExchange => "in_kind_exchange",
            PaymentMethod::PendingCollection => "pending_collection",
        }
    }

    /// Parses a caller-supplied value.
    ///
    /// Exact match after trimming; unknown values are `InvalidPaymentMethod`.
    pub fn parse(value: &str) -> Result<PaymentMethod, CoreError> {
        value.parse()
    }

    /// Whether money has actually changed hands.
    pub fn counts_as_income(&self) -> bool {
        !matches!(self, PaymentMethod::PendingCollection)
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        PaymentMethod::ALL
            .into_iter()
            .find(|m| m.as_str() == trimmed)
            .ok_or_else(|| CoreError::InvalidPaymentMethod {
                value: s.to_string(),
            })
    }
}

// =============================================================================
// Order
// =============================================================================

/// An order as supplied by the order source.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Order {
    pub id: String,
    pub table_id: String,
    pub waiter_id: String,
    pub customer_id: Option<String>,
    /// Free text typed by the waiter, e.g. "Maria" or " maria ".
    pub customer_name: Option<String>,
    pub status: OrderStatus,
    /// Tax-inclusive total in cents.
    pub total_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Order {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    /// Normalized grouping key for customer separation.
    pub fn customer_key(&self) -> CustomerKey {
        CustomerKey::from_name(self.customer_name.as_deref())
    }
}

/// A dish line on an order (input to inventory deduction).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    pub dish_id: String,
    pub quantity: i64,
}

// =============================================================================
// Dining Table
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct DiningTable {
    pub id: String,
    pub number: i64,
    pub status: TableStatus,
    pub waiter_id: Option<String>,
}

// =============================================================================
// Ticket
// =============================================================================

/// One billing row for exactly one order.
///
/// Several rows share a `ticket_number` when a bill spans several orders.
/// `total_cents` never includes the tip.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Ticket {
    pub id: String,
    pub order_id: String,
    pub ticket_number: String,
    pub cashier_id: String,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub payment_method: PaymentMethod,
    pub status: TicketStatus,
    /// Business day the ticket counts toward in reports.
    #[ts(as = "String")]
    pub business_day: NaiveDate,
    #[ts(as = "Option<String>")]
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<String>,
    pub cancellation_reason: Option<String>,
    pub tip_amount_cents: Option<i64>,
    /// Tip percentage in basis points when the tip was given as a percentage.
    pub tip_percentage_bps: Option<i64>,
    #[ts(as = "Option<String>")]
    pub tip_date: Option<NaiveDate>,
    pub tip_added_by: Option<String>,
    pub evidence_file: Option<String>,
    #[ts(as = "Option<String>")]
    pub evidence_uploaded_at: Option<DateTime<Utc>>,
    pub evidence_uploaded_by: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Ticket {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    #[inline]
    pub fn subtotal(&self) -> Money {
        Money::from_cents(self.subtotal_cents)
    }

    #[inline]
    pub fn tax(&self) -> Money {
        Money::from_cents(self.tax_cents)
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.status == TicketStatus::Cancelled
    }
}

// =============================================================================
// Manual Tip
// =============================================================================

/// A gratuity entered without any ticket (e.g. left at the bar).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ManualTip {
    pub id: String,
    pub amount_cents: i64,
    #[ts(as = "String")]
    pub tip_date: NaiveDate,
    pub added_by: String,
    pub note: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================
