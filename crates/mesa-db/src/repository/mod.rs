//! # Repository Module
//!
//! SQL for Mesa POS, one repository per table group.
//!
//! ## Two Kinds of Methods
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Repository Method Shapes                            │
//! │                                                                         │
//! │  Reads outside a transaction         Writes / reads inside one          │
//! │  ───────────────────────────         ─────────────────────────          │
//! │  db.tickets().get_by_id(id)          db.tickets().insert(uow.conn(), t) │
//! │       │                                   │                             │
//! │       ▼                                   ▼                             │
//! │  runs on the pool                    runs on the unit of work's         │
//! │                                      connection, commits with it        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`OrderRepository`](order::OrderRepository) - billable orders, status moves
//! - [`TableRepository`](table::TableRepository) - free / set status
//! - [`CustomerRepository`](customer::CustomerRepository) - visit and spend counters
//! - [`InventoryRepository`](inventory::InventoryRepository) - recipe stock deduction
//! - [`TicketRepository`](ticket::TicketRepository) - ticket rows
//! - [`TicketSequenceRepository`](sequence::TicketSequenceRepository) - daily counter
//! - [`CancellationAuditRepository`](audit::CancellationAuditRepository) - audit trail
//! - [`ManualTipRepository`](tip::ManualTipRepository) - standalone tips
//! - [`PaymentMethodRepository`](payment_method::PaymentMethodRepository) - allow-list
//! - [`FinanceRepository`](finance::FinanceRepository) - expenses, withdrawals
//! - [`ReportRepository`](report::ReportRepository) - read-only aggregations

pub mod audit;
pub mod customer;
pub mod finance;
pub mod inventory;
pub mod order;
pub mod payment_method;
pub mod report;
pub mod sequence;
pub mod table;
pub mod ticket;
pub mod tip;
