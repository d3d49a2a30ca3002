//! Shared request state.
//!
//! # Responsibility
//! - Hold the process-wide collaborators: database handle, token service,
//!   mail seam.
//!
//! # Invariants
//! - The single SQLite connection is serialized behind a mutex; handlers
//!   never hold the guard across an await point.

use morrow_core::{LogMailer, TokenService};
use rusqlite::Connection;
use std::sync::{Mutex, MutexGuard};

pub struct AppState {
    db: Mutex<Connection>,
    pub tokens: TokenService,
    pub mailer: LogMailer,
}

impl AppState {
    pub fn new(conn: Connection, tokens: TokenService) -> Self {
        Self {
            db: Mutex::new(conn),
            tokens,
            mailer: LogMailer,
        }
    }

    /// Acquires the database connection, recovering from a poisoned lock.
    pub fn db(&self) -> MutexGuard<'_, Connection> {
        self.db.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
