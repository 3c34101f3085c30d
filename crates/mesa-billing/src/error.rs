//! # Billing Error Types
//!
//! The one error type every billing operation returns.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in Mesa Billing                           │
//! │                                                                         │
//! │  ValidationError ──► CoreError ──┐                                      │
//! │                                  ├──► BillingError ──► web layer        │
//! │  sqlx::Error ──────► DbError ────┘        │                             │
//! │                                           ▼                             │
//! │                                   code() + message                      │
//! │                                                                         │
//! │  DbError::CheckViolation(ck_tickets_payment_method)                     │
//! │       └──► SchemaRejectedValue  (deployment lags the allow-list)        │
//! │  Any other DbError                                                      │
//! │       └──► PersistenceFailure   (diagnostic detail kept, logged)        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Serialization
//! This is what a caller renders when an operation fails:
//! ```json
//! {
//!   "code": "CONFLICT",
//!   "message": "Order ord-1 already has ticket T202403150007"
//! }
//! ```

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

use mesa_core::{CoreError, Money, OrderStatus, ValidationError};
use mesa_db::DbError;

const PAYMENT_METHOD_CONSTRAINT: &str = "ck_tickets_payment_method";

// =============================================================================
// Billing Error
// =============================================================================

/// Everything a billing operation can fail with.
#[derive(Debug, Error)]
pub enum BillingError {
    // -------------------------------------------------------------------------
    // Ticket creation
    // -------------------------------------------------------------------------
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("Order {order_id} is {status}, only ready orders can be billed")]
    OrderNotReady { order_id: String, status: OrderStatus },

    #[error("Order {order_id} already has ticket {ticket_number}")]
    DuplicateTicket {
        order_id: String,
        ticket_number: String,
    },

    #[error("Invalid payment method '{value}', expected one of: cash, card, bank_transfer, in_kind_exchange, pending_collection")]
    InvalidPaymentMethod { value: String },

    #[error("Payment method '{method}' is disabled in this deployment")]
    PaymentMethodDisabled { method: String },

    #[error("Cannot bill orders from different tables together: {expected} and {found}")]
    CrossTableMix { expected: String, found: String },

    #[error("Cannot bill orders from different waiters together: {expected} and {found}")]
    CrossWaiterMix { expected: String, found: String },

    #[error("Cannot bill orders from different days together: {expected} and {found}")]
    CrossDayMix { expected: NaiveDate, found: NaiveDate },

    #[error("Invalid amount {total}: subtotal must be greater than zero")]
    InvalidAmount { total: Money },

    #[error("Table {table_id} has no ready orders without a ticket")]
    NoReadyOrders { table_id: String },

    #[error("No orders selected")]
    EmptySelection,

    /// The database refused a value the application considers valid.
    ///
    /// ## When This Occurs
    /// - A payment method was added to the allow-list in code but the
    ///   migration widening `ck_tickets_payment_method` has not run
    #[error("Database rejected {value} for {column}: {guidance}")]
    SchemaRejectedValue {
        column: String,
        value: String,
        guidance: String,
    },

    // -------------------------------------------------------------------------
    // Ticket lifecycle
    // -------------------------------------------------------------------------
    #[error("Ticket not found: {0}")]
    TicketNotFound(String),

    #[error("Ticket {ticket_id} is already cancelled")]
    AlreadyCancelled { ticket_id: String },

    #[error("Ticket {ticket_number} is cancelled and cannot be modified")]
    TicketCancelled { ticket_number: String },

    #[error("Ticket {ticket_number} is not pending collection")]
    NotPendingCollection { ticket_number: String },

    // -------------------------------------------------------------------------
    // Input and infrastructure
    // -------------------------------------------------------------------------
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Storage failed underneath an otherwise valid operation.
    #[error("{operation} failed: {source}")]
    PersistenceFailure {
        operation: String,
        #[source]
        source: DbError,
    },
}

impl BillingError {
    /// Wraps a database error with the name of the operation that hit it.
    pub fn persistence(operation: impl Into<String>, source: DbError) -> Self {
        BillingError::PersistenceFailure {
            operation: operation.into(),
            source,
        }
    }

    /// Input problems the caller can fix and resubmit.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            BillingError::InvalidPaymentMethod { .. }
                | BillingError::PaymentMethodDisabled { .. }
                | BillingError::CrossTableMix { .. }
                | BillingError::CrossWaiterMix { .. }
                | BillingError::CrossDayMix { .. }
                | BillingError::InvalidAmount { .. }
                | BillingError::EmptySelection
                | BillingError::Validation(_)
        )
    }

    /// Conflicts with current state. Retrying the same request fails again.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            BillingError::OrderNotReady { .. }
                | BillingError::DuplicateTicket { .. }
                | BillingError::NoReadyOrders { .. }
                | BillingError::AlreadyCancelled { .. }
                | BillingError::TicketCancelled { .. }
                | BillingError::NotPendingCollection { .. }
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            BillingError::OrderNotFound(_) | BillingError::TicketNotFound(_)
        )
    }

    /// Storage or schema problems; the operator has to look.
    pub fn is_persistence(&self) -> bool {
        matches!(
            self,
            BillingError::PersistenceFailure { .. }
                | BillingError::SchemaRejectedValue { .. }
                | BillingError::Config(_)
        )
    }

    /// True when the whole request may succeed if submitted again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BillingError::PersistenceFailure { source, .. } if source.is_retryable())
    }

    pub fn code(&self) -> ErrorCode {
        if self.is_not_found() {
            ErrorCode::NotFound
        } else if self.is_validation() {
            ErrorCode::ValidationError
        } else if self.is_conflict() {
            ErrorCode::Conflict
        } else if matches!(self, BillingError::SchemaRejectedValue { .. }) {
            ErrorCode::SchemaDrift
        } else {
            ErrorCode::DatabaseError
        }
    }

    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            code: self.code(),
            message: self.to_string(),
        }
    }
}

// =============================================================================
// Conversions
// =============================================================================

impl From<CoreError> for BillingError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::OrderNotFound(id) => BillingError::OrderNotFound(id),
            CoreError::OrderNotReady { order_id, status } => {
                BillingError::OrderNotReady { order_id, status }
            }
            CoreError::DuplicateTicket {
                order_id,
                ticket_number,
            } => BillingError::DuplicateTicket {
                order_id,
                ticket_number,
            },
            CoreError::InvalidPaymentMethod { value } => {
                BillingError::InvalidPaymentMethod { value }
            }
            CoreError::PaymentMethodDisabled { method } => {
                BillingError::PaymentMethodDisabled { method }
            }
            CoreError::CrossTableMix { expected, found } => {
                BillingError::CrossTableMix { expected, found }
            }
            CoreError::CrossWaiterMix { expected, found } => {
                BillingError::CrossWaiterMix { expected, found }
            }
            CoreError::CrossDayMix { expected, found } => {
                BillingError::CrossDayMix { expected, found }
            }
            CoreError::InvalidAmount { total } => BillingError::InvalidAmount { total },
            CoreError::NoReadyOrders { table_id } => BillingError::NoReadyOrders { table_id },
            CoreError::EmptySelection => BillingError::EmptySelection,
            CoreError::TicketNotFound(id) => BillingError::TicketNotFound(id),
            CoreError::AlreadyCancelled { ticket_id } => {
                BillingError::AlreadyCancelled { ticket_id }
            }
            CoreError::TicketCancelled { ticket_number } => {
                BillingError::TicketCancelled { ticket_number }
            }
            CoreError::NotPendingCollection { ticket_number } => {
                BillingError::NotPendingCollection { ticket_number }
            }
            CoreError::InvalidConfig(msg) => BillingError::Config(msg),
            CoreError::Validation(e) => BillingError::Validation(e),
        }
    }
}

/// Classifies database errors that reach a billing operation.
///
/// ## Mapping
/// ```text
/// NotFound { entity: "Order" }                 → OrderNotFound
/// CheckViolation(ck_tickets_payment_method)    → SchemaRejectedValue
/// anything else                                → PersistenceFailure
/// ```
impl From<DbError> for BillingError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { ref entity, ref id } if entity == "Order" => {
                BillingError::OrderNotFound(id.clone())
            }
            DbError::CheckViolation { ref constraint }
                if constraint.contains(PAYMENT_METHOD_CONSTRAINT) =>
            {
                tracing::error!(constraint = %constraint, "Database rejected payment method");
                BillingError::schema_rejected_payment_method("unknown")
            }
            other => {
                tracing::error!(error = %other, "Billing persistence failure");
                BillingError::persistence("Database operation", other)
            }
        }
    }
}

impl BillingError {
    /// The database CHECK on `tickets.payment_method` does not accept `value`.
    pub(crate) fn schema_rejected_payment_method(value: &str) -> Self {
        BillingError::SchemaRejectedValue {
            column: "tickets.payment_method".to_string(),
            value: value.to_string(),
            guidance: "the deployed payment-method allow-list does not include this value; \
                       run the pending database migrations before accepting it"
                .to_string(),
        }
    }
}

// =============================================================================
// Response
// =============================================================================

/// Machine-readable error category for the web layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Order or ticket does not exist (404)
    NotFound,

    /// Input rejected before any write (400)
    ValidationError,

    /// State conflict, e.g. already billed or already cancelled (409)
    Conflict,

    /// Database schema behind the application (500)
    SchemaDrift,

    /// Storage failure (500)
    DatabaseError,
}

/// Serializable error body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub code: ErrorCode,
    pub message: String,
}

/// Result type for billing operations.
pub type BillingResult<T> = Result<T, BillingError>;
