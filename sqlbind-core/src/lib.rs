//! Core of sqlbind. Not intended to be used directly; see the `sqlbind` crate.
//!
//! A data-access aggregate declares its database operations as [`Op`] slots. Opening a
//! session connects, prepares one statement per slot, wires every slot to a callable that
//! runs against those statements, and hands back a single [`Cleanup`] that releases all
//! of it.
#![warn(future_incompatible, rust_2018_idioms)]

#[macro_use]
mod logger;

pub mod error;

pub mod bind;
mod cleanup;
pub mod driver;
pub mod encoding;
#[doc(hidden)]
pub mod mock;
mod open;
mod params;
pub mod query_map;
mod row;
pub mod scan;
mod statement;
mod value;

#[doc(inline)]
pub use self::{
    bind::{Binder, Field, Op, Owner, Preparation, Record, Shape, Slot, CLEANUP_FIELD},
    cleanup::Cleanup,
    driver::{Connection, Driver, Statement, Transaction},
    encoding::{bin_to_str, str_to_bin},
    error::{BoxDynError, DatabaseError, Error, Result, TxOp, UnexpectedNullError},
    logger::LogSettings,
    open::{connect_with_ping, Opener, Projection},
    params::{Params, Tx, TxRunner, TxStatement},
    query_map::{QueryMap, DRIVER_POSTGRES, DRIVER_SQLITE3},
    row::{QueryResult, Row},
    scan::{Decode, DecodeValue, Destination, FromDbString, Query, RowSource},
    statement::PreparedStatement,
    value::Value,
};
