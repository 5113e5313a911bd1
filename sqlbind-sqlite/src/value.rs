use std::str::{self, Utf8Error};

use rusqlite::types::{Value as SqliteValue, ValueRef};
use sqlbind_core::Value;

pub(crate) fn to_sqlite(value: &Value) -> SqliteValue {
    match value {
        Value::Null => SqliteValue::Null,
        Value::Integer(v) => SqliteValue::Integer(*v),
        Value::Real(v) => SqliteValue::Real(*v),
        Value::Text(v) => SqliteValue::Text(v.clone()),
        Value::Blob(v) => SqliteValue::Blob(v.clone()),
    }
}

/// Fails on TEXT that is not valid UTF-8 (SQLite does not validate what it stores).
pub(crate) fn from_sqlite(value: ValueRef<'_>) -> Result<Value, Utf8Error> {
    Ok(match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(v) => Value::Integer(v),
        ValueRef::Real(v) => Value::Real(v),
        ValueRef::Text(v) => Value::Text(str::from_utf8(v)?.to_owned()),
        ValueRef::Blob(v) => Value::Blob(v.to_vec()),
    })
}
