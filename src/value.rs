//! Parameter and cell values.
//!
//! `SqlValue` is used both for bound statement parameters and for the cells
//! of rows read back from the database, so a row fetched with `get_all` can
//! be fed straight into `insert`.

use chrono::{NaiveDate, NaiveDateTime};
use indexmap::IndexMap;
use serde::Serialize;

pub use serde_json::Value as JsonValue;

/// A single SQL value.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    /// JSON document, bound as its serialized text
    Json(JsonValue),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

/// Column name -> value mapping for inserts. Iteration order is insertion
/// order, which is also the column and parameter order of built statements.
pub type Fields = IndexMap<String, SqlValue>;

/// A fetched row: column name -> value, in result-set column order.
pub type Row = IndexMap<String, SqlValue>;

impl SqlValue {
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Integers and floats; these are rendered without quotes.
    #[inline]
    pub fn is_numeric(&self) -> bool {
        matches!(self, SqlValue::Int(_) | SqlValue::UInt(_) | SqlValue::Float(_))
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Int(i) => Some(*i),
            SqlValue::UInt(u) => i64::try_from(*u).ok(),
            SqlValue::Bool(b) => Some(*b as i64),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            SqlValue::UInt(u) => Some(*u),
            SqlValue::Int(i) => u64::try_from(*i).ok(),
            // LAST_INSERT_ID() comes back as text over the text protocol
            SqlValue::Text(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SqlValue::Float(f) => Some(*f),
            SqlValue::Int(i) => Some(*i as f64),
            SqlValue::UInt(u) => Some(*u as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SqlValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            SqlValue::Bytes(b) => Some(b),
            SqlValue::Text(s) => Some(s.as_bytes()),
            _ => None,
        }
    }
}

macro_rules! impl_from_int {
    ($variant:ident => $($ty:ty),+) => {
        $(
            impl From<$ty> for SqlValue {
                #[inline]
                fn from(v: $ty) -> Self {
                    SqlValue::$variant(v.into())
                }
            }
        )+
    };
}

impl_from_int!(Int => i8, i16, i32, i64);
impl_from_int!(UInt => u8, u16, u32, u64);
impl_from_int!(Float => f32, f64);

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(v: Vec<u8>) -> Self {
        SqlValue::Bytes(v)
    }
}

impl From<JsonValue> for SqlValue {
    fn from(v: JsonValue) -> Self {
        SqlValue::Json(v)
    }
}

impl From<NaiveDate> for SqlValue {
    fn from(v: NaiveDate) -> Self {
        SqlValue::Date(v)
    }
}

impl From<NaiveDateTime> for SqlValue {
    fn from(v: NaiveDateTime) -> Self {
        SqlValue::DateTime(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

/// Build a [`Fields`] mapping, preserving the written order.
///
/// ```
/// let fields = mysqlkit::fields! { "id" => 1, "name" => "Bob" };
/// assert_eq!(fields.keys().collect::<Vec<_>>(), ["id", "name"]);
/// ```
#[macro_export]
macro_rules! fields {
    () => {
        $crate::Fields::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut fields = $crate::Fields::new();
        $(
            fields.insert(::std::string::String::from($key), $crate::SqlValue::from($value));
        )+
        fields
    }};
}
