//! Decoding rows into caller-provided destinations.
//!
//! Text, raw bytes and custom-decodable destinations are staged through a nullable
//! text cell and decoded once the row has been read. Raw bytes travel as base64 text
//! (see [`bin_to_str`](crate::bin_to_str)). Every other destination reads its column
//! directly.

use crate::encoding;
use crate::error::{BoxDynError, Error, Result, UnexpectedNullError};
use crate::params::TxStatement;
use crate::row::Row;
use crate::statement::PreparedStatement;
use crate::value::Value;

/// A type that can be restored from its text form in the database.
pub trait FromDbString {
    fn from_db_string(&mut self, s: &str) -> Result<(), BoxDynError>;
}

/// A type that can be read directly from a column value.
pub trait Decode: Sized {
    fn decode(value: &Value) -> Result<Self, BoxDynError>;
}

/// Object-safe form of [`Decode`], used by [`Destination::Direct`].
pub trait DecodeValue {
    fn decode_value(&mut self, value: &Value) -> Result<(), BoxDynError>;
}

impl<T: Decode> DecodeValue for T {
    fn decode_value(&mut self, value: &Value) -> Result<(), BoxDynError> {
        *self = T::decode(value)?;
        Ok(())
    }
}

/// Where one column of a row ends up. The variant fixes the decode rule.
pub enum Destination<'a> {
    /// Base64 text decoded into bytes.
    RawBytes(&'a mut Vec<u8>),

    /// Text assigned verbatim.
    Text(&'a mut String),

    /// Text handed to [`FromDbString`].
    Custom(&'a mut dyn FromDbString),

    /// Read from the column value without staging.
    Direct(&'a mut dyn DecodeValue),
}

impl<'a> Destination<'a> {
    pub fn custom<T: FromDbString>(dest: &'a mut T) -> Self {
        Destination::Custom(dest)
    }

    pub fn direct<T: Decode>(dest: &'a mut T) -> Self {
        Destination::Direct(dest)
    }

    fn is_staged(&self) -> bool {
        !matches!(self, Destination::Direct(_))
    }
}

impl<'a> From<&'a mut Vec<u8>> for Destination<'a> {
    fn from(dest: &'a mut Vec<u8>) -> Self {
        Destination::RawBytes(dest)
    }
}

impl<'a> From<&'a mut String> for Destination<'a> {
    fn from(dest: &'a mut String) -> Self {
        Destination::Text(dest)
    }
}

fn unexpected(expected: &str, value: &Value) -> BoxDynError {
    format!("expected {expected}, got {}", value.type_name()).into()
}

macro_rules! impl_decode_integer {
    ($($ty:ty),*) => {
        $(
            impl Decode for $ty {
                fn decode(value: &Value) -> Result<Self, BoxDynError> {
                    match value {
                        Value::Integer(v) => Ok(<$ty>::try_from(*v)?),
                        Value::Null => Err(UnexpectedNullError.into()),
                        _ => Err(unexpected("INTEGER", value)),
                    }
                }
            }
        )*
    };
}

impl_decode_integer!(i8, i16, i32, i64, u8, u16, u32, u64);

impl Decode for f64 {
    fn decode(value: &Value) -> Result<Self, BoxDynError> {
        match value {
            Value::Real(v) => Ok(*v),
            Value::Integer(v) => Ok(*v as f64),
            Value::Null => Err(UnexpectedNullError.into()),
            _ => Err(unexpected("REAL", value)),
        }
    }
}

impl Decode for bool {
    fn decode(value: &Value) -> Result<Self, BoxDynError> {
        match value {
            Value::Integer(v) => Ok(*v != 0),
            Value::Null => Err(UnexpectedNullError.into()),
            _ => Err(unexpected("INTEGER", value)),
        }
    }
}

impl Decode for String {
    fn decode(value: &Value) -> Result<Self, BoxDynError> {
        match value.to_nullable_text()? {
            Some(text) => Ok(text),
            None => Err(UnexpectedNullError.into()),
        }
    }
}

impl<T: Decode> Decode for Option<T> {
    fn decode(value: &Value) -> Result<Self, BoxDynError> {
        if value.is_null() {
            return Ok(None);
        }

        T::decode(value).map(Some)
    }
}

macro_rules! impl_direct_destination {
    ($($ty:ty),*) => {
        $(
            impl<'a> From<&'a mut $ty> for Destination<'a> {
                fn from(dest: &'a mut $ty) -> Self {
                    Destination::Direct(dest)
                }
            }

            impl<'a> From<&'a mut Option<$ty>> for Destination<'a> {
                fn from(dest: &'a mut Option<$ty>) -> Self {
                    Destination::Direct(dest)
                }
            }
        )*
    };
}

impl_direct_destination!(i8, i16, i32, i64, u8, u16, u32, u64, f64, bool);

impl<'a> From<&'a mut Option<String>> for Destination<'a> {
    fn from(dest: &'a mut Option<String>) -> Self {
        Destination::Direct(dest)
    }
}

/// Something that returns at most one row for a set of arguments.
pub trait RowSource {
    fn fetch_row(&self, args: &[Value]) -> Result<Option<Row>>;
}

impl RowSource for PreparedStatement {
    fn fetch_row(&self, args: &[Value]) -> Result<Option<Row>> {
        self.fetch_optional(args)
    }
}

impl RowSource for TxStatement<'_> {
    fn fetch_row(&self, args: &[Value]) -> Result<Option<Row>> {
        self.fetch_optional(args)
    }
}

/// Arguments and destinations for decoding one row.
///
/// ```rust,ignore
/// let mut user = User::default();
///
/// Query::new()
///     .dest(&mut user.id)
///     .dest(&mut user.name)
///     .dest(&mut user.data)
///     .scan(&row)?;
/// ```
#[derive(Default)]
pub struct Query<'a> {
    args: Vec<Value>,
    dests: Vec<Destination<'a>>,
}

impl<'a> Query<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an argument for [`query_row`](Self::query_row).
    pub fn bind(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    /// Appends the destination of the next column.
    pub fn dest(mut self, dest: impl Into<Destination<'a>>) -> Self {
        self.dests.push(dest.into());
        self
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Runs a single-row query with the bound arguments and decodes the row.
    pub fn query_row(self, source: &impl RowSource) -> Result<()> {
        let row = source.fetch_row(&self.args)?.ok_or(Error::RowNotFound)?;

        self.scan(&row)
    }

    /// Decodes `row` into the destinations.
    ///
    /// `NULL` columns leave staged destinations untouched.
    pub fn scan(self, row: &Row) -> Result<()> {
        let mut dests = self.dests;

        if row.len() != dests.len() {
            return Err(Error::ColumnCountMismatch {
                columns: row.len(),
                destinations: dests.len(),
            });
        }

        let mut cells: Vec<Option<String>> = vec![None; dests.len()];

        for (index, (dest, value)) in dests.iter_mut().zip(row.values()).enumerate() {
            let read = if dest.is_staged() {
                value.to_nullable_text().map(|text| cells[index] = text)
            } else if let Destination::Direct(dest) = dest {
                dest.decode_value(value)
            } else {
                Ok(())
            };

            read.map_err(|source| Error::ColumnDecode { index, source })?;
        }

        for (index, (dest, cell)) in dests.into_iter().zip(cells).enumerate() {
            let Some(text) = cell else {
                continue;
            };

            let decoded = match dest {
                Destination::RawBytes(dest) => encoding::decode(&text)
                    .map(|bytes| *dest = bytes)
                    .map_err(BoxDynError::from),

                Destination::Text(dest) => {
                    *dest = text;
                    Ok(())
                }

                Destination::Custom(dest) => dest.from_db_string(&text),

                Destination::Direct(_) => Ok(()),
            };

            decoded.map_err(|source| Error::ColumnDecode { index, source })?;
        }

        Ok(())
    }
}
