//! Traits a database driver implements to be opened by sqlbind.
//!
//! Every call is blocking. A driver owns its own thread-safety: sqlbind shares one
//! connection and its statements between every bound operation and adds no locking
//! of its own.

use std::fmt::Debug;

use crate::error::Result;
use crate::row::{QueryResult, Row};
use crate::value::Value;

/// A database backend that can open connections.
pub trait Driver: Send + Sync {
    /// The driver identifier, used as the key into every [`QueryMap`](crate::QueryMap).
    fn name(&self) -> &str;

    /// Establish a new connection using a driver specific URL.
    fn connect(&self, url: &str) -> Result<Box<dyn Connection>>;
}

/// A live connection (session) with a database.
pub trait Connection: Send + Sync + Debug {
    /// Checks if the connection to the database is still valid.
    fn ping(&self) -> Result<()>;

    /// Executes one or more statements without arguments, discarding any rows.
    fn execute_batch(&self, sql: &str) -> Result<()>;

    /// Compiles a statement against this connection.
    fn prepare(&self, sql: &str) -> Result<Box<dyn Statement>>;

    /// Begins a new transaction.
    fn begin(&self) -> Result<Box<dyn Transaction>>;

    /// Closes the connection. Any later call on the connection or its statements fails.
    fn close(&self) -> Result<()>;
}

/// A prepared statement owned by a [`Connection`].
pub trait Statement: Send + Sync + Debug {
    fn sql(&self) -> &str;

    fn execute(&self, args: &[Value]) -> Result<QueryResult>;

    fn fetch_all(&self, args: &[Value]) -> Result<Vec<Row>>;

    fn fetch_optional(&self, args: &[Value]) -> Result<Option<Row>> {
        Ok(self.fetch_all(args)?.into_iter().next())
    }

    /// Releases the statement. Any later execution fails.
    fn close(&self) -> Result<()>;
}

/// An in-progress transaction.
///
/// Statements prepared on the owning connection run inside the transaction through
/// [`execute`](Self::execute) and [`fetch_all`](Self::fetch_all).
pub trait Transaction: Send + Debug {
    fn execute(&self, statement: &dyn Statement, args: &[Value]) -> Result<QueryResult>;

    fn fetch_all(&self, statement: &dyn Statement, args: &[Value]) -> Result<Vec<Row>>;

    /// Commits the transaction. On failure the transaction may still be open.
    fn commit(&mut self) -> Result<()>;

    fn rollback(&mut self) -> Result<()>;
}
