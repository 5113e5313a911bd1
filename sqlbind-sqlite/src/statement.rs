use std::fmt::{self, Debug, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rusqlite::params_from_iter;
use sqlbind_core::{Error, QueryResult, Result, Row, Statement, Value};

use crate::connection::{lock_outside_tx, Handle};
use crate::error::to_error;
use crate::value::{from_sqlite, to_sqlite};

/// A statement prepared on a [`SqliteConnection`](crate::SqliteConnection).
///
/// The compiled form lives in the connection's statement cache and is looked up by its
/// SQL text on every execution.
pub struct SqliteStatement {
    sql: String,
    handle: Handle,
    closed: AtomicBool,
}

impl SqliteStatement {
    pub(crate) fn new(sql: &str, handle: Handle) -> Self {
        Self {
            sql: sql.to_owned(),
            handle,
            closed: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::Closed("statement"));
        }

        Ok(())
    }
}

impl Statement for SqliteStatement {
    fn sql(&self) -> &str {
        &self.sql
    }

    fn execute(&self, args: &[Value]) -> Result<QueryResult> {
        self.ensure_open()?;

        let (_gate, conn) = lock_outside_tx(&self.handle)?;
        let mut statement = conn.prepare_cached(&self.sql).map_err(to_error)?;

        let rows_affected = statement
            .execute(params_from_iter(args.iter().map(to_sqlite)))
            .map_err(to_error)?;

        Ok(QueryResult {
            rows_affected: rows_affected as u64,
            last_insert_id: Some(conn.last_insert_rowid()),
        })
    }

    fn fetch_all(&self, args: &[Value]) -> Result<Vec<Row>> {
        self.ensure_open()?;

        let (_gate, conn) = lock_outside_tx(&self.handle)?;
        let mut statement = conn.prepare_cached(&self.sql).map_err(to_error)?;

        let columns: Arc<[String]> = statement
            .column_names()
            .into_iter()
            .map(String::from)
            .collect();

        let mut rows = statement
            .query(params_from_iter(args.iter().map(to_sqlite)))
            .map_err(to_error)?;

        let mut fetched = Vec::new();

        while let Some(row) = rows.next().map_err(to_error)? {
            let values = (0..columns.len())
                .map(|index| {
                    let value = row.get_ref(index).map_err(to_error)?;

                    from_sqlite(value).map_err(|source| Error::ColumnDecode {
                        index,
                        source: source.into(),
                    })
                })
                .collect::<Result<Vec<_>>>()?;

            fetched.push(Row::with_columns(Arc::clone(&columns), values));
        }

        Ok(fetched)
    }

    fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

impl Debug for SqliteStatement {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteStatement")
            .field("sql", &self.sql)
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}
