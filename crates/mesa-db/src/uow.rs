//! # Unit of Work
//!
//! Explicit transaction scope with an ownership flag.
//!
//! ## Ownership
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Transaction Ownership                              │
//! │                                                                         │
//! │  create_separated()                                                    │
//! │    let mut uow = UnitOfWork::begin(conn)   owns_transaction = true     │
//! │       │                                                                 │
//! │       ├── execute_partition(uow.join())    owns_transaction = false    │
//! │       │      commit() / rollback() are no-ops                          │
//! │       │                                                                 │
//! │       ├── execute_partition(uow.join())    owns_transaction = false    │
//! │       │                                                                 │
//! │       └── uow.commit()                     the only real COMMIT        │
//! │                                                                         │
//! │  create_for_order()                                                    │
//! │    let mut uow = UnitOfWork::begin(conn)   owns, commits itself        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Locking
//! `begin` issues `BEGIN IMMEDIATE`, taking SQLite's write lock up front. Two
//! cashiers billing at the same moment queue on the lock (bounded by the
//! configured busy timeout) instead of both reading the same ticket counter.
//!
//! ## Best-Effort Effects
//! Side effects whose failure must not abort the ticket run inside a
//! savepoint. On failure the savepoint is rolled back, so none of the
//! effect's partial writes survive, and the outer transaction carries on.

use sqlx::SqliteConnection;
use tracing::{debug, warn};

use crate::error::{DbError, DbResult};

/// Handle for an open savepoint.
#[derive(Debug)]
#[must_use = "a savepoint must be released or rolled back"]
pub struct Savepoint {
    name: String,
}

impl Savepoint {
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A transaction scope over one connection.
pub struct UnitOfWork<'c> {
    conn: &'c mut SqliteConnection,
    owns_transaction: bool,
    finished: bool,
    depth: u32,
    savepoints: u32,
}

impl<'c> UnitOfWork<'c> {
    /// Opens a new transaction on `conn` and owns it.
    ///
    /// A transaction left open on this connection by an earlier, abandoned
    /// scope is rolled back first.
    pub async fn begin(conn: &'c mut SqliteConnection) -> DbResult<UnitOfWork<'c>> {
        // Errors with "no transaction is active" in the normal case.
        if control(&mut *conn, "ROLLBACK").await.is_ok() {
            warn!("Rolled back orphaned transaction before starting a new one");
        }

        control(&mut *conn, "BEGIN IMMEDIATE")
            .await
            .map_err(|e| match DbError::from(e) {
                busy @ DbError::Busy(_) => busy,
                other => DbError::TransactionFailed(other.to_string()),
            })?;

        debug!("Transaction opened");

        Ok(UnitOfWork {
            conn,
            owns_transaction: true,
            finished: false,
            depth: 0,
            savepoints: 0,
        })
    }

    /// Returns a participant scope over the same transaction.
    pub fn join(&mut self) -> UnitOfWork<'_> {
        UnitOfWork {
            conn: &mut *self.conn,
            owns_transaction: false,
            finished: false,
            depth: self.depth + 1,
            savepoints: 0,
        }
    }

    pub fn owns_transaction(&self) -> bool {
        self.owns_transaction
    }

    /// The connection to run statements on.
    pub fn conn(&mut self) -> &mut SqliteConnection {
        &mut *self.conn
    }

    /// Commits if this scope owns the transaction.
    ///
    /// If COMMIT fails the transaction is rolled back and the commit error is
    /// returned.
    pub async fn commit(mut self) -> DbResult<()> {
        self.finished = true;
        if !self.owns_transaction {
            return Ok(());
        }

        if let Err(err) = control(&mut *self.conn, "COMMIT").await {
            let err = DbError::from(err);
            warn!(error = %err, "Commit failed, rolling back");
            if let Err(rollback_err) = control(&mut *self.conn, "ROLLBACK").await {
                warn!(error = %rollback_err, "Rollback after failed commit also failed");
            }
            return Err(DbError::TransactionFailed(err.to_string()));
        }

        debug!("Transaction committed");
        Ok(())
    }

    /// Rolls back if this scope owns the transaction.
    ///
    /// Rollback errors are logged and suppressed so the caller can return the
    /// error that caused the rollback.
    pub async fn rollback(mut self) {
        self.finished = true;
        if !self.owns_transaction {
            return;
        }

        match control(&mut *self.conn, "ROLLBACK").await {
            Ok(_) => debug!("Transaction rolled back"),
            Err(err) => warn!(error = %err, "Rollback failed"),
        }
    }

    // =========================================================================
    // Savepoints
    // =========================================================================

    /// Opens a savepoint inside the current transaction.
    pub async fn savepoint(&mut self) -> DbResult<Savepoint> {
        self.savepoints += 1;
        let name = format!("sp_{}_{}", self.depth, self.savepoints);
        control(&mut *self.conn, &format!("SAVEPOINT {}", name))
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
        Ok(Savepoint { name })
    }

    /// Keeps the savepoint's writes.
    pub async fn release_savepoint(&mut self, savepoint: Savepoint) -> DbResult<()> {
        control(&mut *self.conn, &format!("RELEASE SAVEPOINT {}", savepoint.name))
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
        Ok(())
    }

    /// Discards every write made since the savepoint.
    pub async fn rollback_to_savepoint(&mut self, savepoint: Savepoint) -> DbResult<()> {
        // ROLLBACK TO leaves the savepoint on the stack; RELEASE pops it.
        control(&mut *self.conn, &format!("ROLLBACK TO SAVEPOINT {}", savepoint.name))
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
        control(&mut *self.conn, &format!("RELEASE SAVEPOINT {}", savepoint.name))
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
        Ok(())
    }
}

/// Runs a transaction-control statement as a one-off prepared query.
async fn control(conn: &mut SqliteConnection, sql: &str) -> Result<(), sqlx::Error> {
    sqlx::query(sql).persistent(false).execute(conn).await?;
    Ok(())
}

impl Drop for UnitOfWork<'_> {
    fn drop(&mut self) {
        if self.owns_transaction && !self.finished {
            warn!("Unit of work dropped with an open transaction; it will be rolled back on next use of the connection");
        }
    }
}

impl std::fmt::Debug for UnitOfWork<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitOfWork")
            .field("owns_transaction", &self.owns_transaction)
            .field("finished", &self.finished)
            .field("depth", &self.depth)
            .finish()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
