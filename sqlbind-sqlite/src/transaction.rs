use std::fmt::{self, Debug, Formatter};

use sqlbind_core::{QueryResult, Result, Row, Statement, Transaction, Value};

use crate::connection::{lock, Handle};
use crate::error::to_error;

/// A transaction opened with `BEGIN` on a [`SqliteConnection`](crate::SqliteConnection).
///
/// SQLite transactions belong to the connection, so statements of the same connection run
/// inside it as they are. Until it is committed or rolled back, other threads using the
/// connection wait; its statements must run on the thread that began it.
pub struct SqliteTransaction {
    handle: Handle,
    // whether this transaction holds the connection's gate
    gated: bool,
}

impl SqliteTransaction {
    pub(crate) fn new(handle: Handle, gated: bool) -> Self {
        Self { handle, gated }
    }

    fn open_gate(&mut self) {
        if std::mem::take(&mut self.gated) {
            self.handle.gate.release();
        }
    }
}

impl Transaction for SqliteTransaction {
    fn execute(&self, statement: &dyn Statement, args: &[Value]) -> Result<QueryResult> {
        statement.execute(args)
    }

    fn fetch_all(&self, statement: &dyn Statement, args: &[Value]) -> Result<Vec<Row>> {
        statement.fetch_all(args)
    }

    fn commit(&mut self) -> Result<()> {
        lock(&self.handle)?.execute_batch("COMMIT").map_err(to_error)?;
        self.open_gate();

        Ok(())
    }

    // a failed commit leaves the transaction open until this runs
    fn rollback(&mut self) -> Result<()> {
        let rolled_back = lock(&self.handle)
            .and_then(|conn| conn.execute_batch("ROLLBACK").map_err(to_error));
        self.open_gate();

        rolled_back
    }
}

impl Drop for SqliteTransaction {
    fn drop(&mut self) {
        self.open_gate();
    }
}

impl Debug for SqliteTransaction {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteTransaction")
            .field("gated", &self.gated)
            .finish()
    }
}
