//! **SQLite** database driver.
//!
//! Connections are opened through `rusqlite`. With the default `bundled` feature SQLite is
//! built from source and linked statically.

use sqlbind_core::{Connection, Driver, Result, DRIVER_SQLITE3};

mod connection;
mod error;
mod options;
mod statement;
mod transaction;
mod value;

pub use connection::SqliteConnection;
pub use error::SqliteError;
pub use options::SqliteConnectOptions;
pub use statement::SqliteStatement;
pub use transaction::SqliteTransaction;

/// The SQLite driver, registered under the `sqlite3` identifier.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sqlite;

impl Driver for Sqlite {
    fn name(&self) -> &str {
        DRIVER_SQLITE3
    }

    fn connect(&self, url: &str) -> Result<Box<dyn Connection>> {
        let options: SqliteConnectOptions = url.parse()?;

        Ok(Box::new(SqliteConnection::open(&options)?))
    }
}
