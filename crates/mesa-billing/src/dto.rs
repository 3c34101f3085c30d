//! # Request and Response Types
//!
//! What the web layer sends in and gets back.
//!
//! ## Parsing
//! ```text
//! JSON / form body ──serde──► *Request (strings as typed)
//!                                  │  TryFrom
//!                                  ▼
//!                             command (PaymentMethod, trimmed ids)
//!                                  │
//!                                  ▼
//!                             service method ──► *Receipt / details
//! ```
//!
//! Unknown payment methods surface here as `InvalidPaymentMethod`, before any
//! transaction is opened.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{BillingError, BillingResult};
use mesa_core::validation::validate_required;
use mesa_core::{CustomerKey, CustomerSelection, Money, PartitionKind, PaymentMethod, Ticket};

fn required(field: &str, value: &str) -> BillingResult<String> {
    Ok(validate_required(field, value)?.to_string())
}

fn method(value: &str) -> BillingResult<PaymentMethod> {
    Ok(PaymentMethod::parse(value)?)
}

// =============================================================================
// Ticket Creation
// =============================================================================

/// How the ready orders of a table are split into bills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupingMode {
    /// One bill for the table. Orders must share a waiter.
    Table,
    /// One bill per customer name.
    Customer,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTicketRequest {
    pub order_id: String,
    pub payment_method: String,
    pub cashier_id: String,
}

/// Bill one order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderTicket {
    pub order_id: String,
    pub payment_method: PaymentMethod,
    pub cashier_id: String,
}

impl TryFrom<CreateTicketRequest> for OrderTicket {
    type Error = BillingError;

    fn try_from(req: CreateTicketRequest) -> BillingResult<Self> {
        Ok(OrderTicket {
            order_id: required("order_id", &req.order_id)?,
            payment_method: method(&req.payment_method)?,
            cashier_id: required("cashier_id", &req.cashier_id)?,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTableTicketsRequest {
    pub table_id: String,
    pub mode: GroupingMode,
    pub payment_method: String,
    pub cashier_id: String,
}

/// Bill every ready order of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableTickets {
    pub table_id: String,
    pub mode: GroupingMode,
    pub payment_method: PaymentMethod,
    pub cashier_id: String,
}

impl TryFrom<CreateTableTicketsRequest> for TableTickets {
    type Error = BillingError;

    fn try_from(req: CreateTableTicketsRequest) -> BillingResult<Self> {
        Ok(TableTickets {
            table_id: required("table_id", &req.table_id)?,
            mode: req.mode,
            payment_method: method(&req.payment_method)?,
            cashier_id: required("cashier_id", &req.cashier_id)?,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrdersTicketRequest {
    pub order_ids: Vec<String>,
    pub mode: GroupingMode,
    pub payment_method: String,
    pub cashier_id: String,
}

/// Bill an explicit list of orders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrdersTicket {
    pub order_ids: Vec<String>,
    pub mode: GroupingMode,
    pub payment_method: PaymentMethod,
    pub cashier_id: String,
}

impl TryFrom<CreateOrdersTicketRequest> for OrdersTicket {
    type Error = BillingError;

    fn try_from(req: CreateOrdersTicketRequest) -> BillingResult<Self> {
        let mut order_ids = Vec::with_capacity(req.order_ids.len());
        for id in &req.order_ids {
            let id = required("order_ids", id)?;
            if !order_ids.contains(&id) {
                order_ids.push(id);
            }
        }
        if order_ids.is_empty() {
            return Err(BillingError::EmptySelection);
        }
        Ok(OrdersTicket {
            order_ids,
            mode: req.mode,
            payment_method: method(&req.payment_method)?,
            cashier_id: required("cashier_id", &req.cashier_id)?,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CustomerSelectionRequest {
    /// Absent or null selects the orders with no customer name.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub payment_method: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeparateCustomersRequest {
    pub table_id: String,
    pub customers: Vec<CustomerSelectionRequest>,
    pub default_payment_method: String,
    pub cashier_id: String,
}

/// Separate selected customers; everyone else shares a remainder bill.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeparateTickets {
    pub table_id: String,
    pub selections: Vec<CustomerSelection>,
    pub default_payment_method: PaymentMethod,
    pub cashier_id: String,
}

impl TryFrom<SeparateCustomersRequest> for SeparateTickets {
    type Error = BillingError;

    fn try_from(req: SeparateCustomersRequest) -> BillingResult<Self> {
        let mut selections = Vec::with_capacity(req.customers.len());
        for customer in &req.customers {
            let payment_method = customer
                .payment_method
                .as_deref()
                .filter(|m| !m.trim().is_empty())
                .map(method)
                .transpose()?;
            selections.push(match &customer.name {
                Some(name) => {
                    CustomerSelection::new(&required("customer_name", name)?, payment_method)
                }
                None => CustomerSelection::unassigned(payment_method),
            });
        }
        if selections.is_empty() {
            return Err(BillingError::EmptySelection);
        }
        Ok(SeparateTickets {
            table_id: required("table_id", &req.table_id)?,
            selections,
            default_payment_method: method(&req.default_payment_method)?,
            cashier_id: required("cashier_id", &req.cashier_id)?,
        })
    }
}

// =============================================================================
// Ticket Lifecycle
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct CancelTicketRequest {
    pub ticket_id: String,
    pub reason: String,
    pub cancelled_by: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EvidenceUpload {
    pub file_name: String,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdatePaymentRequest {
    pub ticket_number: String,
    pub payment_method: String,
    pub updated_by: String,
    #[serde(default)]
    pub evidence: Option<EvidenceUpload>,
}

/// Change the method of every open row of a ticket number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentUpdate {
    pub ticket_number: String,
    pub payment_method: PaymentMethod,
    pub updated_by: String,
    /// `(file name, size in bytes)`, checked against the evidence rules.
    pub evidence: Option<(String, u64)>,
}

impl TryFrom<UpdatePaymentRequest> for PaymentUpdate {
    type Error = BillingError;

    fn try_from(req: UpdatePaymentRequest) -> BillingResult<Self> {
        Ok(PaymentUpdate {
            ticket_number: required("ticket_number", &req.ticket_number)?,
            payment_method: method(&req.payment_method)?,
            updated_by: required("updated_by", &req.updated_by)?,
            evidence: req.evidence.map(|e| (e.file_name, e.size_bytes)),
        })
    }
}

/// A tip as the cashier typed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TipInput {
    /// Percentage of the bill in basis points (1000 = 10%).
    PercentageBps(u32),
    AmountCents(i64),
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddTipRequest {
    pub ticket_number: String,
    pub tip: TipInput,
    pub added_by: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManualTipRequest {
    pub amount_cents: i64,
    pub added_by: String,
    #[serde(default)]
    pub tip_date: Option<NaiveDate>,
    #[serde(default)]
    pub note: Option<String>,
}

// =============================================================================
// Responses
// =============================================================================

/// One committed bill.
#[derive(Debug, Clone, Serialize)]
pub struct TicketReceipt {
    pub ticket_number: String,
    /// One row per order, in insertion order.
    pub ticket_ids: Vec<String>,
    pub order_ids: Vec<String>,
    pub table_id: String,
    pub kind: PartitionKind,
    pub payment_method: PaymentMethod,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub business_day: NaiveDate,
    pub created_at: DateTime<Utc>,
}

impl TicketReceipt {
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

/// Result of a customer separation.
#[derive(Debug, Clone, Serialize)]
pub struct SeparationReceipt {
    pub tickets: Vec<TicketReceipt>,
    /// Selected customers that had nothing to bill.
    pub unmatched_customers: Vec<CustomerKey>,
}

/// All rows sharing a ticket number.
#[derive(Debug, Clone, Serialize)]
pub struct TicketDetails {
    pub ticket_number: String,
    pub rows: Vec<Ticket>,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    /// Counted once per number.
    pub tip_amount_cents: i64,
    pub all_cancelled: bool,
}

impl TicketDetails {
    pub(crate) fn from_rows(ticket_number: String, rows: Vec<Ticket>) -> Self {
        let open: Vec<&Ticket> = rows.iter().filter(|t| !t.is_cancelled()).collect();
        TicketDetails {
            subtotal_cents: open.iter().map(|t| t.subtotal_cents).sum(),
            tax_cents: open.iter().map(|t| t.tax_cents).sum(),
            total_cents: open.iter().map(|t| t.total_cents).sum(),
            tip_amount_cents: open
                .iter()
                .filter_map(|t| t.tip_amount_cents)
                .max()
                .unwrap_or(0),
            all_cancelled: open.is_empty(),
            ticket_number,
            rows,
        }
    }
}
