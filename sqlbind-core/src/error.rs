//! Types for working with errors produced by sqlbind.

use std::borrow::Cow;
use std::error::Error as StdError;
use std::fmt::{self, Display, Formatter};
use std::result::Result as StdResult;

/// A specialized `Result` type for sqlbind.
pub type Result<T, E = Error> = StdResult<T, E>;

// Convenience type alias for usage within sqlbind.
pub type BoxDynError = Box<dyn StdError + 'static + Send + Sync>;

/// An unexpected `NULL` was encountered during decoding.
///
/// Returned when a `NULL` column is scanned into a destination that is not an `Option`.
#[derive(thiserror::Error, Debug)]
#[error("unexpected null; try decoding as an `Option`")]
pub struct UnexpectedNullError;

/// The transaction step that failed inside a [`TxRunner`](crate::params::TxRunner).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxOp {
    Begin,
    Commit,
    Rollback,
}

impl Display for TxOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TxOp::Begin => "begin",
            TxOp::Commit => "commit",
            TxOp::Rollback => "roll back",
        })
    }
}

/// Represents all the ways a method can fail within sqlbind.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Error occurred while parsing a connection string.
    #[error("error with configuration: {0}")]
    Configuration(#[source] BoxDynError),

    /// Error occurred while connecting to, or pinging, the database.
    #[error("error connecting to the database: {0}")]
    Connection(#[source] BoxDynError),

    /// No statement text is registered for the active driver.
    #[error("can't find {what} for `{driver}` driver")]
    UnsupportedDriver { driver: String, what: &'static str },

    /// Binding was attempted on a target that is not a record.
    #[error("invalid bind target `{type_name}`: a record with fields was expected")]
    InvalidTargetKind { type_name: &'static str },

    /// The preparation of an operation slot failed.
    #[error("error preparing sql statement for field {index} (`{name}`): {source}")]
    Prepare {
        index: usize,
        name: &'static str,

        #[source]
        source: Box<Error>,
    },

    /// Beginning, committing or rolling back a transaction failed.
    #[error("failed to {op} transaction: {source}")]
    Transaction {
        op: TxOp,

        #[source]
        source: Box<Error>,
    },

    /// Error returned from the database.
    #[error("error returned from database: {0}")]
    Database(Box<dyn DatabaseError>),

    /// A statement or connection was used after the session released it.
    #[error("attempted to use a closed {0}")]
    Closed(&'static str),

    /// An operation slot was called before the session bound it.
    #[error("operation slot was used before it was bound")]
    Unbound,

    /// No rows returned by a query that expected to return at least one row.
    #[error("no rows returned by a query that expected to return at least one row")]
    RowNotFound,

    /// Column index was out of bounds.
    #[error("column index out of bounds: the len is {len}, but the index is {index}")]
    ColumnIndexOutOfBounds { index: usize, len: usize },

    /// The row and the scan destinations disagree on the number of columns.
    #[error("expected {destinations} destination arguments in scan, not {columns}")]
    ColumnCountMismatch { columns: usize, destinations: usize },

    /// Error occurred while decoding a value from a specific column.
    #[error("error occurred while decoding column {index}: {source}")]
    ColumnDecode {
        index: usize,

        #[source]
        source: BoxDynError,
    },

    /// Error occurred while decoding a value.
    #[error("error occurred while decoding: {0}")]
    Decode(#[source] BoxDynError),
}

impl Error {
    #[doc(hidden)]
    #[inline]
    pub fn config(err: impl StdError + Send + Sync + 'static) -> Self {
        Error::Configuration(err.into())
    }

    #[inline]
    pub(crate) fn connection(err: impl Into<BoxDynError>) -> Self {
        Error::Connection(err.into())
    }

    #[inline]
    pub(crate) fn transaction(op: TxOp, err: Error) -> Self {
        Error::Transaction {
            op,
            source: Box::new(err),
        }
    }

    #[inline]
    pub(crate) fn unsupported_driver(driver: &str, what: &'static str) -> Self {
        Error::UnsupportedDriver {
            driver: driver.to_owned(),
            what,
        }
    }

    /// Returns the database error if this error came from the driver.
    pub fn as_database_error(&self) -> Option<&(dyn DatabaseError + 'static)> {
        match self {
            Error::Database(e) => Some(&**e),
            _ => None,
        }
    }
}

/// An error that was returned from the database.
pub trait DatabaseError: 'static + Send + Sync + StdError {
    /// The primary, human-readable error message.
    fn message(&self) -> &str;

    /// The driver specific code for the error.
    fn code(&self) -> Option<Cow<'_, str>> {
        None
    }
}

impl<E> From<E> for Error
where
    E: DatabaseError,
{
    #[inline]
    fn from(error: E) -> Self {
        Error::Database(Box::new(error))
    }
}
