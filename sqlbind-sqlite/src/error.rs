use std::borrow::Cow;
use std::error::Error as StdError;
use std::fmt::{self, Display, Formatter};

use sqlbind_core::{DatabaseError, Error};

// Error Codes And Messages
// https://www.sqlite.org/c3ref/errcode.html

#[derive(Debug)]
pub struct SqliteError {
    code: Option<i32>,
    message: String,
}

impl SqliteError {
    /// The extended result code, when the error came from SQLite itself.
    pub fn extended_code(&self) -> Option<i32> {
        self.code
    }
}

impl From<rusqlite::Error> for SqliteError {
    fn from(error: rusqlite::Error) -> Self {
        // syntax errors arrive as `SqlInputError`, which also carries the result code
        let code = error.sqlite_error().map(|failure| failure.extended_code);

        match error {
            rusqlite::Error::SqliteFailure(failure, message) => Self {
                code,
                message: message.unwrap_or_else(|| failure.to_string()),
            },

            other => Self {
                code,
                message: other.to_string(),
            },
        }
    }
}

impl Display for SqliteError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        // We include the code as some produce ambiguous messages:
        // SQLITE_BUSY: "database is locked"
        // SQLITE_LOCKED: "database table is locked"
        match self.code {
            Some(code) => write!(f, "(code: {code}) {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl StdError for SqliteError {}

impl DatabaseError for SqliteError {
    #[inline]
    fn message(&self) -> &str {
        &self.message
    }

    /// The extended result code.
    #[inline]
    fn code(&self) -> Option<Cow<'_, str>> {
        self.code.map(|code| code.to_string().into())
    }
}

pub(crate) fn to_error(error: rusqlite::Error) -> Error {
    SqliteError::from(error).into()
}
