/// Database module for portal accounts, schedules, appointments and messaging

mod accounts;
mod appointments;
mod counsellors;
mod events;
mod feedback;
mod goals;
mod grievances;
mod messages;
mod notifications;
mod requests;
mod students;
mod tasks;
mod types;

pub use types::*;

use crate::error::PortalError;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::Connection;
use std::sync::{Mutex, MutexGuard};
use tracing::info;

const SCHEMA_SQL: &str = include_str!("../../../../sql/init_portal.sql");

pub type DbResult<T> = Result<T, PortalError>;

pub struct PortalDbManager {
    db: Mutex<Connection>,
}

impl PortalDbManager {
    /// Opens (or creates) the database at `db_path` and initializes the schema
    pub fn open(db_path: &str) -> DbResult<Self> {
        let conn = Connection::open(db_path)?;
        info!("Opened portal database at {db_path}");
        Self::with_connection(conn)
    }

    /// Creates a fresh private in-memory database
    pub fn open_in_memory() -> DbResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> DbResult<Self> {
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    /// Locks the connection for the duration of the returned guard
    fn conn(&self) -> DbResult<MutexGuard<'_, Connection>> {
        Ok(self.db.lock()?)
    }
}

fn now() -> DateTime<Utc> {
    Utc::now()
}

fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

/// Maps `QueryReturnedNoRows` to a not-found error for `entity`.
fn not_found_as<T>(entity: &'static str, result: rusqlite::Result<T>) -> DbResult<T> {
    match result {
        Ok(v) => Ok(v),
        Err(rusqlite::Error::QueryReturnedNoRows) => Err(PortalError::not_found(entity)),
        Err(e) => Err(e.into()),
    }
}
