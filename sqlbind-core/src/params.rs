//! The per-session context handed to every preparation descriptor.

use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

use crate::cleanup::Resources;
use crate::driver::{Connection, Transaction};
use crate::error::{Error, Result, TxOp};
use crate::logger::LogSettings;
use crate::query_map::QueryMap;
use crate::row::{QueryResult, Row};
use crate::statement::PreparedStatement;
use crate::value::Value;

/// Prepare and transaction capabilities bound to one live connection.
///
/// Cheap to clone; bound operations usually keep a clone to run transactions.
#[derive(Clone)]
pub struct Params(Arc<ParamsInner>);

struct ParamsInner {
    driver: String,
    connection: Arc<dyn Connection>,
    resources: Resources,
    log_settings: LogSettings,
}

impl Params {
    pub(crate) fn new(
        driver: &str,
        connection: Arc<dyn Connection>,
        resources: Resources,
        log_settings: LogSettings,
    ) -> Self {
        Self(Arc::new(ParamsInner {
            driver: driver.to_owned(),
            connection,
            resources,
            log_settings,
        }))
    }

    /// The identifier of the active driver.
    pub fn driver(&self) -> &str {
        &self.0.driver
    }

    /// Compiles `sql` on the session connection.
    ///
    /// The statement is owned by the session and closed with it.
    pub fn prepare(&self, sql: &str) -> Result<PreparedStatement> {
        if self.0.resources.is_released() {
            return Err(Error::Closed("connection"));
        }

        let handle = self.0.connection.prepare(sql)?;

        tracing::trace!(target: "sqlbind::params", sql, "prepared statement");

        self.0
            .resources
            .register(PreparedStatement::new(handle, self.0.log_settings.clone()))
    }

    /// Compiles the statement registered for the active driver.
    pub fn prepare_by_driver(&self, queries: &QueryMap) -> Result<PreparedStatement> {
        let sql = queries
            .get(self.driver())
            .ok_or_else(|| Error::unsupported_driver(self.driver(), "statement"))?;

        self.prepare(sql)
    }

    /// Returns a runner for a unit of work.
    ///
    /// With `Some(tx)` the work joins that transaction and nothing is begun or committed.
    /// With `None` every [`TxRunner::run`] call gets a fresh transaction.
    pub fn tx<'t>(&self, existing: Option<&'t Tx>) -> TxRunner<'t> {
        TxRunner {
            connection: Arc::clone(&self.0.connection),
            existing,
            log_settings: self.0.log_settings.clone(),
        }
    }
}

impl Debug for Params {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Params")
            .field("driver", &self.0.driver)
            .finish()
    }
}

/// Runs a unit of work inside a transaction.
pub struct TxRunner<'t> {
    connection: Arc<dyn Connection>,
    existing: Option<&'t Tx>,
    log_settings: LogSettings,
}

impl TxRunner<'_> {
    /// Runs `f`, committing if it succeeds and rolling back otherwise.
    ///
    /// Errors from `f` are returned unchanged. Failures to begin or commit are wrapped
    /// in [`Error::Transaction`]. A failed rollback is logged, the original error wins.
    pub fn run<T, F>(self, f: F) -> Result<T>
    where
        F: FnOnce(&Tx) -> Result<T>,
    {
        if let Some(tx) = self.existing {
            return f(tx);
        }

        let mut tx = Tx::begin(&*self.connection, self.log_settings)?;

        match f(&tx) {
            Ok(value) => match tx.commit() {
                Ok(()) => Ok(value),
                Err(error) => {
                    tx.rollback_quietly();
                    Err(Error::transaction(TxOp::Commit, error))
                }
            },

            Err(error) => {
                tx.rollback_quietly();
                Err(error)
            }
        }
    }
}

/// An in-progress transaction.
///
/// If it is still open when dropped (for example while unwinding), it is rolled back.
pub struct Tx {
    inner: Box<dyn Transaction>,
    open: bool,
    log_settings: LogSettings,
}

impl Tx {
    fn begin(connection: &dyn Connection, log_settings: LogSettings) -> Result<Self> {
        let inner = connection
            .begin()
            .map_err(|e| Error::transaction(TxOp::Begin, e))?;

        tracing::trace!(target: "sqlbind::tx", "began transaction");

        Ok(Self {
            inner,
            open: true,
            log_settings,
        })
    }

    /// Runs a prepared statement inside this transaction.
    pub fn stmt<'t>(&'t self, statement: &'t PreparedStatement) -> TxStatement<'t> {
        TxStatement {
            tx: self,
            statement,
        }
    }

    pub fn log_settings(&self) -> &LogSettings {
        &self.log_settings
    }

    fn commit(&mut self) -> Result<()> {
        self.inner.commit()?;
        self.open = false;

        tracing::trace!(target: "sqlbind::tx", "committed transaction");

        Ok(())
    }

    fn rollback_quietly(&mut self) {
        if !self.open {
            return;
        }

        self.open = false;

        match self.inner.rollback() {
            Ok(()) => tracing::trace!(target: "sqlbind::tx", "rolled back transaction"),
            Err(error) => {
                let error = Error::transaction(TxOp::Rollback, error);
                tracing::warn!(target: "sqlbind::tx", %error, "rollback failed");
            }
        }
    }
}

impl Drop for Tx {
    fn drop(&mut self) {
        self.rollback_quietly();
    }
}

impl Debug for Tx {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tx").field("open", &self.open).finish()
    }
}

/// A prepared statement scoped to a transaction, see [`Tx::stmt`].
#[derive(Debug, Clone, Copy)]
pub struct TxStatement<'t> {
    tx: &'t Tx,
    statement: &'t PreparedStatement,
}

impl TxStatement<'_> {
    pub fn execute(&self, args: &[Value]) -> Result<QueryResult> {
        self.statement.run_execute(Some(&*self.tx.inner), args)
    }

    pub fn fetch_all(&self, args: &[Value]) -> Result<Vec<Row>> {
        self.statement.run_fetch_all(Some(&*self.tx.inner), args)
    }

    pub fn fetch_optional(&self, args: &[Value]) -> Result<Option<Row>> {
        Ok(self.fetch_all(args)?.into_iter().next())
    }
}
