//! Declarative binding of prepared SQL statements to typed operation slots.
//!
//! A data-access aggregate declares each database operation as an [`Op`] slot holding a
//! preparation. [`Opener::open`] connects, runs the optional schema, prepares one statement
//! per slot, replaces every preparation with a callable bound to its statement, and returns
//! a single [`Cleanup`] that closes every statement and then the connection.
//!
//! ```rust,no_run
//! use sqlbind::sqlite::Sqlite;
//! use sqlbind::{Field, Op, Opener, Params, QueryMap, Record, Shape, DRIVER_SQLITE3};
//!
//! type Count = dyn Fn() -> sqlbind::Result<i64> + Send + Sync;
//!
//! struct Users {
//!     count: Op<Users, Count>,
//!     cleanup: Option<sqlbind::Cleanup>,
//! }
//!
//! impl Record<Users> for Users {
//!     fn shape(&mut self) -> Shape<'_, Users> {
//!         Shape::Struct(vec![
//!             Field::op("count", &mut self.count),
//!             Field::cleanup(&mut self.cleanup),
//!         ])
//!     }
//! }
//!
//! fn count(params: &Params) -> sqlbind::Result<Box<Count>> {
//!     let stmt = params.prepare_by_driver(&QueryMap::from([
//!         (DRIVER_SQLITE3, "SELECT COUNT(*) FROM users"),
//!     ]))?;
//!
//!     Ok(Box::new(move || -> sqlbind::Result<i64> {
//!         let mut n = 0_i64;
//!         sqlbind::Query::new().dest(&mut n).query_row(&stmt)?;
//!         Ok(n)
//!     }))
//! }
//!
//! # fn main() -> sqlbind::Result<()> {
//! let users = Users { count: Op::new(count), cleanup: None };
//!
//! let (users, cleanup) = Opener::new(users)
//!     .schema(QueryMap::from([(DRIVER_SQLITE3, "CREATE TABLE users (id INTEGER)")]))
//!     .open(&Sqlite, ":memory:")?;
//!
//! assert_eq!(users.count.get()()?, 0);
//! cleanup.call();
//! # Ok(())
//! # }
//! ```

// Modules
pub use sqlbind_core::{bind, driver, encoding, error, query_map, scan};

#[doc(hidden)]
pub use sqlbind_core::mock;

// Types
pub use sqlbind_core::{
    Binder, BoxDynError, Cleanup, Connection, DatabaseError, Decode, DecodeValue, Destination,
    Driver, Error, Field, FromDbString, LogSettings, Op, Opener, Owner, Params, Preparation,
    PreparedStatement, Projection, Query, QueryMap, QueryResult, Record, Result, Row, RowSource,
    Shape, Slot, Statement, Transaction, Tx, TxOp, TxRunner, TxStatement, UnexpectedNullError,
    Value,
};

// Constants
pub use sqlbind_core::{CLEANUP_FIELD, DRIVER_POSTGRES, DRIVER_SQLITE3};

// Functions
pub use sqlbind_core::{bin_to_str, connect_with_ping, str_to_bin};

#[cfg(feature = "sqlite")]
pub mod sqlite {
    pub use sqlbind_sqlite::{
        Sqlite, SqliteConnectOptions, SqliteConnection, SqliteError, SqliteStatement,
        SqliteTransaction,
    };
}

#[cfg(feature = "sqlite")]
pub use sqlite::Sqlite;
