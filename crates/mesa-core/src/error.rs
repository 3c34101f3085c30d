//! # Error Types
//!
//! Domain-specific error types for mesa-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  mesa-core errors (this file)                                          │
//! │  ├── CoreError        - Business rule and partitioning failures        │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  mesa-db errors (separate crate)                                       │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  mesa-billing errors (separate crate)                                  │
//! │  └── BillingError     - What the web layer sees                        │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → BillingError ← DbError            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::NaiveDate;
use thiserror::Error;

use crate::money::Money;
use crate::types::OrderStatus;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// Raised by the aggregator, the tax splitter and the payment-method rules.
/// Everything here is a caller or state problem, never an I/O problem.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Order cannot be found.
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// Order is not in the `ready` state.
    ///
    /// ## When This Occurs
    /// - Kitchen has not finished the order yet
    /// - Another cashier billed it a moment ago (status is now `delivered`)
    #[error("Order {order_id} is {status}, only ready orders can be billed")]
    OrderNotReady { order_id: String, status: OrderStatus },

    /// Order already has a non-cancelled ticket.
    #[error("Order {order_id} already has ticket {ticket_number}")]
    DuplicateTicket {
        order_id: String,
        ticket_number: String,
    },

    /// Payment method string is not one of the recognized values.
    #[error("Invalid payment method '{value}', expected one of: cash, card, bank_transfer, in_kind_exchange, pending_collection")]
    InvalidPaymentMethod { value: String },

    /// Payment method is recognized but switched off by configuration.
    #[error("Payment method '{method}' is disabled in this deployment")]
    PaymentMethodDisabled { method: String },

    /// Orders from different tables in one bill.
    #[error("Cannot bill orders from different tables together: {expected} and {found}")]
    CrossTableMix { expected: String, found: String },

    /// Orders from different waiters in one table bill.
    #[error("Cannot bill orders from different waiters together: {expected} and {found}")]
    CrossWaiterMix { expected: String, found: String },

    /// Orders from different business days in one bill.
    #[error("Cannot bill orders from different days together: {expected} and {found}")]
    CrossDayMix { expected: NaiveDate, found: NaiveDate },

    /// Tax split produced a non-positive subtotal.
    #[error("Invalid amount {total}: subtotal must be greater than zero")]
    InvalidAmount { total: Money },

    /// The table has nothing left to bill.
    #[error("Table {table_id} has no ready orders without a ticket")]
    NoReadyOrders { table_id: String },

    /// A billing request named no orders at all.
    #[error("No orders selected")]
    EmptySelection,

    /// Ticket cannot be found.
    #[error("Ticket not found: {0}")]
    TicketNotFound(String),

    /// Ticket was already cancelled.
    #[error("Ticket {ticket_id} is already cancelled")]
    AlreadyCancelled { ticket_id: String },

    /// Mutation attempted on a cancelled ticket.
    #[error("Ticket {ticket_number} is cancelled and cannot be modified")]
    TicketCancelled { ticket_number: String },

    /// Settlement attempted on a ticket that is not awaiting collection.
    #[error("Ticket {ticket_number} is not pending collection")]
    NotPendingCollection { ticket_number: String },

    /// Configuration rejected by `BillingConfig::validate`.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Returns true for input problems the caller can fix and resubmit.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            CoreError::InvalidPaymentMethod { .. }
                | CoreError::PaymentMethodDisabled { .. }
                | CoreError::CrossTableMix { .. }
                | CoreError::CrossWaiterMix { .. }
                | CoreError::CrossDayMix { .. }
                | CoreError::InvalidAmount { .. }
                | CoreError::EmptySelection
                | CoreError::InvalidConfig(_)
                | CoreError::Validation(_)
        )
    }

    /// Returns true for conflicts with current state (no retry).
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            CoreError::OrderNotReady { .. }
                | CoreError::DuplicateTicket { .. }
                | CoreError::AlreadyCancelled { .. }
                | CoreError::TicketCancelled { .. }
                | CoreError::NotPendingCollection { .. }
                | CoreError::NoReadyOrders { .. }
        )
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any transaction is opened so the caller can redisplay the
/// form with a field-level message.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too short.
    #[error("{field} must be at least {min} characters")]
    TooShort { field: String, min: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID, invalid date).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::OrderNotReady {
            order_id: "ord-1".to_string(),
            status: OrderStatus::Preparing,
        };
        assert_eq!(
            err.to_string(),
            "Order ord-1 is preparing, only ready orders can be billed"
        );

        let err = CoreError::InvalidAmount {
            total: Money::from_cents(0),
        };
        assert_eq!(
            err.to_string(),
            "Invalid amount $0.00: subtotal must be greater than zero"
        );
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::TooShort {
            field: "cancellation_reason".to_string(),
            min: 10,
        };
        assert_eq!(
            err.to_string(),
            "cancellation_reason must be at least 10 characters"
        );
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "cashier_id".to_string(),
        };
        let core_err: CoreError = validation_err.into();

        assert!(matches!(core_err, CoreError::Validation(_)));
        assert!(core_err.is_validation());
    }

    #[test]
    fn test_classification() {
        let dup = CoreError::DuplicateTicket {
            order_id: "o".into(),
            ticket_number: "T202610180001".into(),
        };
        assert!(dup.is_conflict());
        assert!(!dup.is_validation());

        let mix = CoreError::CrossTableMix {
            expected: "t1".into(),
            found: "t2".into(),
        };
        assert!(mix.is_validation());
        assert!(!mix.is_conflict());
    }
}
