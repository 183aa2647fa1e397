use std::path::Path;

use log::{debug, info, warn};
use rusqlite::{params_from_iter, Connection, OpenFlags};

use crate::transform::Value;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error("connection already released")]
    Closed,
    #[error("{0}")]
    Rejected(String),
}

/// A parameterized insert into one table.
///
/// Only identifiers end up in the statement text, quoted. Values are always
/// bound as `?N` parameters by the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Insert {
    sql: String,
    arity: usize,
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

impl Insert {
    pub fn new(table: &str, columns: &[String]) -> Self {
        let names = columns
            .iter()
            .map(|column| quote_identifier(column))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = (1..=columns.len())
            .map(|index| format!("?{index}"))
            .collect::<Vec<_>>()
            .join(", ");
        Self {
            sql: format!(
                "INSERT INTO {} ({names}) VALUES ({placeholders})",
                quote_identifier(table)
            ),
            arity: columns.len(),
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn arity(&self) -> usize {
        self.arity
    }
}

/// The relational store rows are written to.
pub trait Store {
    fn begin(&mut self) -> Result<(), StoreError>;

    fn insert(&mut self, insert: &Insert, values: &[Value]) -> Result<(), StoreError>;

    fn commit(&mut self) -> Result<(), StoreError>;

    fn rollback(&mut self) -> Result<(), StoreError>;

    /// Releases the underlying connection. Calling it again is a no-op.
    fn close(&mut self) -> Result<(), StoreError>;
}

#[derive(Debug)]
pub struct SqliteStore {
    conn: Option<Connection>,
}

impl SqliteStore {
    /// Opens an existing database. The schema is expected to be in place, so
    /// a missing file is an error rather than a fresh empty database.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open_with_flags(
            path.as_ref(),
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        info!("connected to {:?}", path.as_ref());
        Ok(Self::from_connection(conn))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self { conn: Some(conn) }
    }

    fn conn(&self) -> Result<&Connection, StoreError> {
        self.conn.as_ref().ok_or(StoreError::Closed)
    }
}

impl Store for SqliteStore {
    fn begin(&mut self) -> Result<(), StoreError> {
        Ok(self.conn()?.execute_batch("BEGIN")?)
    }

    fn insert(&mut self, insert: &Insert, values: &[Value]) -> Result<(), StoreError> {
        if values.len() != insert.arity() {
            return Err(StoreError::Rejected(format!(
                "expected {} values, got {}",
                insert.arity(),
                values.len()
            )));
        }
        let mut statement = self.conn()?.prepare_cached(insert.sql())?;
        statement.execute(params_from_iter(values))?;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        Ok(self.conn()?.execute_batch("COMMIT")?)
    }

    fn rollback(&mut self) -> Result<(), StoreError> {
        Ok(self.conn()?.execute_batch("ROLLBACK")?)
    }

    fn close(&mut self) -> Result<(), StoreError> {
        match self.conn.take() {
            Some(conn) => conn.close().map_err(|(_, err)| err.into()),
            None => Ok(()),
        }
    }
}

/// Scoped hold on a [`Store`].
///
/// Tracks the open transaction. Closing the session, or dropping it on an
/// error path, rolls back whatever was not committed and releases the store
/// exactly once.
#[derive(Debug)]
pub struct Session<S: Store> {
    store: S,
    in_transaction: bool,
    closed: bool,
}

impl<S: Store> Session<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            in_transaction: false,
            closed: false,
        }
    }

    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    pub fn insert(&mut self, insert: &Insert, values: &[Value]) -> Result<(), StoreError> {
        if !self.in_transaction {
            self.store.begin()?;
            self.in_transaction = true;
        }
        self.store.insert(insert, values)
    }

    pub fn commit(&mut self) -> Result<(), StoreError> {
        if self.in_transaction {
            // SQLite keeps the transaction open after a failed COMMIT
            self.in_transaction = false;
            if let Err(err) = self.store.commit() {
                if let Err(rollback) = self.store.rollback() {
                    warn!("rollback after failed commit: {rollback}");
                }
                return Err(err);
            }
            debug!("committed");
        }
        Ok(())
    }

    pub fn rollback(&mut self) -> Result<(), StoreError> {
        if self.in_transaction {
            self.in_transaction = false;
            self.store.rollback()?;
            debug!("rolled back");
        }
        Ok(())
    }

    pub fn close(mut self) -> Result<(), StoreError> {
        self.release()
    }

    fn release(&mut self) -> Result<(), StoreError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let rollback = self.rollback();
        self.store.close()?;
        info!("connection released");
        rollback
    }
}

impl<S: Store> Drop for Session<S> {
    fn drop(&mut self) {
        if let Err(err) = self.release() {
            warn!("releasing the connection failed: {err}");
        }
    }
}
