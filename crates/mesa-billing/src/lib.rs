//! # mesa-billing: Ticket Generation and Financial Consistency
//!
//! Every multi-step financial operation of the cashier screen: turning ready
//! orders into numbered tickets, reversing them, changing how they were paid,
//! adding gratuities, and reading it all back as reports.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Mesa POS Billing Flow                            │
//! │                                                                         │
//! │  web layer (outside this workspace)                                     │
//! │       │  CreateTicketRequest, SeparateCustomersRequest, ...             │
//! │       ▼  TryFrom → typed commands                                       │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   mesa-billing (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   TicketService ──► Aggregator (mesa-core) ──► partitions       │   │
//! │  │        │                                                        │   │
//! │  │        └──► execute_partition ──► UnitOfWork (mesa-db)          │   │
//! │  │                                                                 │   │
//! │  │   CancellationService   PaymentService   GratuityService        │   │
//! │  │   ReportService                                                 │   │
//! │  │                                                                 │   │
//! │  │   BillingContext: Database + BillingConfig + Collaborators      │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  mesa-db ──► SQLite                                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use mesa_billing::{BillingContext, CreateTicketRequest, OrderTicket, TicketService};
//! use mesa_db::{Database, MesaSettings};
//!
//! let settings = MesaSettings::load(None)?;
//! let db = Database::new(settings.to_db_config()).await?;
//! let ctx = BillingContext::load(db, settings.billing).await?;
//!
//! let cmd = OrderTicket::try_from(request)?;
//! let receipt = TicketService::new(ctx).create_for_order(&cmd).await?;
//! println!("{}: {}", receipt.ticket_number, receipt.total());
//! ```

pub mod cancellation;
pub mod context;
pub mod coordinator;
pub mod dto;
pub mod error;
pub mod gratuity;
pub mod payments;
pub mod reports;

#[cfg(test)]
mod testing;

pub use cancellation::CancellationService;
pub use context::{BillingContext, PaymentDomain};
pub use coordinator::{TableRelease, TicketService};
pub use dto::{
    AddTipRequest, CancelTicketRequest, CreateOrdersTicketRequest, CreateTableTicketsRequest,
    CreateTicketRequest, CustomerSelectionRequest, EvidenceUpload, GroupingMode,
    ManualTipRequest, OrderTicket, OrdersTicket, PaymentUpdate, SeparateCustomersRequest,
    SeparateTickets, SeparationReceipt, TableTickets, TicketDetails, TicketReceipt, TipInput,
    UpdatePaymentRequest,
};
pub use error::{BillingError, BillingResult, ErrorCode, ErrorResponse};
pub use gratuity::GratuityService;
pub use payments::PaymentService;
pub use reports::{
    BalanceReport, DailyBalance, DailySales, IncomeReport, MethodShare, ReportService, TipsReport,
};
