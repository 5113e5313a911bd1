use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::{Condvar, Mutex, MutexGuard};
use sqlbind_core::{Connection, Error, Result, Statement, Transaction};

use crate::error::to_error;
use crate::options::SqliteConnectOptions;
use crate::statement::SqliteStatement;
use crate::transaction::SqliteTransaction;

/// The shared handle to a SQLite database.
pub(crate) type Handle = Arc<Shared>;

pub(crate) struct Shared {
    /// `None` once the connection has been closed.
    conn: Mutex<Option<rusqlite::Connection>>,
    pub(crate) gate: TxGate,
}

pub(crate) type MappedHandle<'a> = parking_lot::MappedMutexGuard<'a, rusqlite::Connection>;

pub(crate) fn lock(handle: &Handle) -> Result<MappedHandle<'_>> {
    MutexGuard::try_map(handle.conn.lock(), Option::as_mut)
        .map_err(|_| Error::Closed("connection"))
}

/// Like [`lock`], but first waits for a transaction held by another thread to finish.
///
/// The returned gate guard keeps other threads from beginning a transaction until the
/// connection guard is dropped.
pub(crate) fn lock_outside_tx(handle: &Handle) -> Result<(GateGuard<'_>, MappedHandle<'_>)> {
    let gate = handle.gate.idle();

    Ok((gate, lock(handle)?))
}

pub(crate) type GateGuard<'a> = MutexGuard<'a, Option<ThreadId>>;

/// Admits one transaction at a time on a connection.
///
/// SQLite transactions belong to the whole connection, so while one thread holds a
/// transaction every other thread waits, both to begin its own and to run statements.
/// The holding thread passes through.
#[derive(Default)]
pub(crate) struct TxGate {
    owner: Mutex<Option<ThreadId>>,
    finished: Condvar,
}

impl TxGate {
    pub(crate) fn idle(&self) -> GateGuard<'_> {
        let me = thread::current().id();
        let mut owner = self.owner.lock();

        while owner.is_some_and(|owner| owner != me) {
            self.finished.wait(&mut owner);
        }

        owner
    }

    /// Claims the gate for the current thread.
    ///
    /// Returns `false` if the current thread already holds it.
    pub(crate) fn claim(&self) -> bool {
        let mut owner = self.idle();

        if owner.is_some() {
            return false;
        }

        *owner = Some(thread::current().id());

        true
    }

    pub(crate) fn release(&self) {
        *self.owner.lock() = None;
        self.finished.notify_all();
    }
}

/// A connection to an open [Sqlite] database.
///
/// Every call is serialized through an internal lock, so one connection may be shared by
/// every statement of a session across threads. While a transaction is open, statements
/// and transactions from other threads wait for it to finish.
///
/// [Sqlite]: crate::Sqlite
pub struct SqliteConnection {
    handle: Handle,
}

impl SqliteConnection {
    pub fn open(options: &SqliteConnectOptions) -> Result<Self> {
        let conn = rusqlite::Connection::open_with_flags(&options.filename, options.open_flags())
            .map_err(to_error)?;

        conn.set_prepared_statement_cache_capacity(options.statement_cache_capacity);
        conn.busy_timeout(options.busy_timeout).map_err(to_error)?;
        conn.pragma_update(None, "foreign_keys", options.foreign_keys)
            .map_err(to_error)?;

        tracing::debug!(
            target: "sqlbind::sqlite",
            filename = %options.filename.display(),
            in_memory = options.in_memory,
            read_only = options.read_only,
            "opened database"
        );

        Ok(Self {
            handle: Arc::new(Shared {
                conn: Mutex::new(Some(conn)),
                gate: TxGate::default(),
            }),
        })
    }

    pub fn is_closed(&self) -> bool {
        self.handle.conn.lock().is_none()
    }
}

impl Connection for SqliteConnection {
    fn ping(&self) -> Result<()> {
        lock(&self.handle)?
            .query_row("SELECT 1", [], |_| Ok(()))
            .map_err(to_error)
    }

    fn execute_batch(&self, sql: &str) -> Result<()> {
        let (_gate, conn) = lock_outside_tx(&self.handle)?;

        conn.execute_batch(sql).map_err(to_error)
    }

    fn prepare(&self, sql: &str) -> Result<Box<dyn Statement>> {
        // compile now so syntax errors surface at prepare time; the compiled
        // statement stays in the connection's cache for later executions
        lock(&self.handle)?.prepare_cached(sql).map_err(to_error)?;

        Ok(Box::new(SqliteStatement::new(sql, Arc::clone(&self.handle))))
    }

    fn begin(&self) -> Result<Box<dyn Transaction>> {
        // a nested `BEGIN` from the holding thread is left for SQLite to reject
        let claimed = self.handle.gate.claim();

        let begun = lock(&self.handle)
            .and_then(|conn| conn.execute_batch("BEGIN").map_err(to_error));

        if let Err(error) = begun {
            if claimed {
                self.handle.gate.release();
            }

            return Err(error);
        }

        Ok(Box::new(SqliteTransaction::new(Arc::clone(&self.handle), claimed)))
    }

    fn close(&self) -> Result<()> {
        let Some(conn) = self.handle.conn.lock().take() else {
            return Ok(());
        };

        conn.close().map_err(|(_, error)| to_error(error))?;

        tracing::debug!(target: "sqlbind::sqlite", "closed database");

        Ok(())
    }
}

impl Debug for SqliteConnection {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteConnection")
            .field("closed", &self.is_closed())
            .finish()
    }
}
