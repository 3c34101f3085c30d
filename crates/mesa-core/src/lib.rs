//! # mesa-core: Pure Ticketing Logic for Mesa POS
//!
//! Everything about billing that can be decided without touching the
//! database: money, tax splits, ticket number formats, customer keys, order
//! partitioning and the billing configuration.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Mesa POS Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              Web layer (routing, sessions, views)               │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    mesa-billing (services)                      │   │
//! │  └─────────────┬───────────────────────────────────┬───────────────┘   │
//! │                │                                   │                    │
//! │  ┌─────────────▼───────────────────────────┐  ┌────▼──────────────┐    │
//! │  │        ★ mesa-core (THIS CRATE) ★        │  │     mesa-db       │    │
//! │  │                                          │  │  SQLite, repos,   │    │
//! │  │  money · tax · ledger · partition        │  │  unit of work     │    │
//! │  │  customer · config · validation          │  └───────────────────┘    │
//! │  │                                          │                           │
//! │  │  NO I/O • NO DATABASE • PURE FUNCTIONS   │                           │
//! │  └──────────────────────────────────────────┘                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`money`] - Money type with integer arithmetic
//! - [`tax`] - Tax-inclusive total → subtotal + tax
//! - [`ledger`] - Ticket numbers and the business calendar
//! - [`customer`] - Normalized customer grouping keys
//! - [`partition`] - The ticket aggregator
//! - [`config`] - Billing switches and side-effect policies
//! - [`types`] - Orders, tickets, tables and their statuses
//! - [`validation`] - Field-level input rules
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use mesa_core::money::Money;
//! use mesa_core::tax::{TaxRate, TaxSplit};
//!
//! let split = TaxSplit::split(Money::from_cents(11600), TaxRate::STANDARD).unwrap();
//! assert_eq!(split.subtotal.cents(), 10000);
//! assert_eq!(split.tax.cents(), 1600);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod customer;
pub mod error;
pub mod ledger;
pub mod money;
pub mod partition;
pub mod tax;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use config::{BillingConfig, SameDayPolicy, SideEffectPolicies, SideEffectPolicy};
pub use customer::CustomerKey;
pub use error::{CoreError, CoreResult, ValidationError};
pub use ledger::{BusinessCalendar, TicketNumber};
pub use money::Money;
pub use partition::{Aggregator, CustomerSelection, Partition, PartitionKind, SeparationPlan};
pub use tax::{TaxRate, TaxSplit};
pub use types::*;

/// Generates a new entity id (UUID v4).
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
