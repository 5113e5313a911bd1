use std::sync::Arc;

use crate::error::Error;
use crate::value::Value;

/// A single row fetched by a statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    /// Creates a row with unnamed columns.
    pub fn new(values: Vec<Value>) -> Self {
        Self {
            columns: Arc::from(Vec::new()),
            values,
        }
    }

    /// Creates a row sharing the column names of its result set.
    pub fn with_columns(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    /// Number of columns in the row.
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Column names, empty if the driver did not report them.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Returns the raw value at `index`.
    pub fn try_get_raw(&self, index: usize) -> Result<&Value, Error> {
        self.values
            .get(index)
            .ok_or(Error::ColumnIndexOutOfBounds {
                index,
                len: self.values.len(),
            })
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

/// The outcome of executing a statement that does not return rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryResult {
    pub rows_affected: u64,
    pub last_insert_id: Option<i64>,
}
