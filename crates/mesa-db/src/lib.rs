//! # mesa-db: Database Layer for Mesa POS
//!
//! All SQLite access for the ticketing core: pool, migrations, the unit of
//! work, repositories, and the SQL side of the billing collaborators.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Mesa POS Data Flow                               │
//! │                                                                         │
//! │  mesa-billing (TicketService, CancellationService, ...)                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     mesa-db (THIS CRATE)                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ TicketRepo    │    │ 0001_floor   │  │   │
//! │  │   │ SqlitePool    │◄───│ SequenceRepo  │    │ 0002_ticket  │  │   │
//! │  │   │ UnitOfWork    │    │ ReportRepo    │    │ 0003_cash    │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  │   services.rs: OrderSource, CustomerStats, InventoryDeduction, │   │
//! │  │                TableService (+ SQL implementations)            │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (WAL)                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`uow`] - Unit of work and savepoints
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//! - [`services`] - Collaborator traits used by billing
//! - [`settings`] - `mesa.toml` and `MESA_*` loading
//!
//! ## Usage
//!
//! ```rust,ignore
//! use mesa_db::{Database, MesaSettings, UnitOfWork};
//!
//! let settings = MesaSettings::load(None)?;
//! let db = Database::new(settings.to_db_config()).await?;
//!
//! let mut conn = db.acquire().await?;
//! let mut uow = UnitOfWork::begin(&mut conn).await?;
//! let n = db.ticket_sequences().next_value(uow.conn(), day).await?;
//! uow.commit().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod services;
pub mod settings;
pub mod uow;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig, PooledConnection};
pub use services::{
    Collaborators, CustomerStats, InventoryDeduction, OrderSource, TableService,
};
pub use settings::{DatabaseSettings, MesaSettings};
pub use uow::{Savepoint, UnitOfWork};

// Repository re-exports for convenience
pub use repository::audit::{CancellationAuditRepository, CancellationEntry, NewCancellation};
pub use repository::report::{
    CountAndTotal, DailyAmount, DailyIncome, DailyMethodSales, DayRange, MethodSales,
    ReportRepository, SalesTotals, TicketSummary, TicketTip,
};
pub use repository::sequence::TicketSequenceRepository;
pub use repository::ticket::{TicketRepository, TipUpdate};

// Connection type threaded through collaborator calls
pub use sqlx::SqliteConnection;
