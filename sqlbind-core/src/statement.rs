use std::fmt::{self, Debug, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::driver::{Statement, Transaction};
use crate::error::{Error, Result};
use crate::logger::{LogSettings, QueryLogger};
use crate::row::{QueryResult, Row};
use crate::value::Value;

/// A statement prepared through [`Params::prepare`](crate::Params::prepare).
///
/// Cloning is cheap: every clone refers to the same driver handle, which belongs to the
/// session's [`Cleanup`](crate::Cleanup) and is closed when the session is released.
#[derive(Clone)]
pub struct PreparedStatement(Arc<StatementInner>);

struct StatementInner {
    handle: Box<dyn Statement>,
    closed: AtomicBool,
    log_settings: LogSettings,
}

impl PreparedStatement {
    pub(crate) fn new(handle: Box<dyn Statement>, log_settings: LogSettings) -> Self {
        Self(Arc::new(StatementInner {
            handle,
            closed: AtomicBool::new(false),
            log_settings,
        }))
    }

    pub fn sql(&self) -> &str {
        self.0.handle.sql()
    }

    pub fn is_closed(&self) -> bool {
        self.0.closed.load(Ordering::Acquire)
    }

    pub fn execute(&self, args: &[Value]) -> Result<QueryResult> {
        self.run_execute(None, args)
    }

    pub fn fetch_all(&self, args: &[Value]) -> Result<Vec<Row>> {
        self.run_fetch_all(None, args)
    }

    pub fn fetch_optional(&self, args: &[Value]) -> Result<Option<Row>> {
        self.ensure_open()?;

        let mut logger = QueryLogger::new(self.sql(), &self.0.log_settings);
        let row = self.0.handle.fetch_optional(args)?;
        logger.increase_rows_returned(usize::from(row.is_some()));

        Ok(row)
    }

    pub(crate) fn run_execute(
        &self,
        tx: Option<&dyn Transaction>,
        args: &[Value],
    ) -> Result<QueryResult> {
        self.ensure_open()?;

        let mut logger = QueryLogger::new(self.sql(), &self.0.log_settings);
        let done = match tx {
            Some(tx) => tx.execute(&*self.0.handle, args)?,
            None => self.0.handle.execute(args)?,
        };
        logger.increase_rows_affected(done.rows_affected);

        Ok(done)
    }

    pub(crate) fn run_fetch_all(
        &self,
        tx: Option<&dyn Transaction>,
        args: &[Value],
    ) -> Result<Vec<Row>> {
        self.ensure_open()?;

        let mut logger = QueryLogger::new(self.sql(), &self.0.log_settings);
        let rows = match tx {
            Some(tx) => tx.fetch_all(&*self.0.handle, args)?,
            None => self.0.handle.fetch_all(args)?,
        };
        logger.increase_rows_returned(rows.len());

        Ok(rows)
    }

    /// Closes the driver handle once; later calls are no-ops.
    pub(crate) fn close(&self) -> Result<()> {
        if self.0.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        self.0.handle.close()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(Error::Closed("statement"));
        }

        Ok(())
    }
}

impl Debug for PreparedStatement {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreparedStatement")
            .field("sql", &self.sql())
            .field("closed", &self.is_closed())
            .finish()
    }
}
