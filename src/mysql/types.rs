//! Conversions between `SqlValue` and mysql_async values.

use chrono::{Datelike, NaiveDate, Timelike};
use mysql_async::consts::ColumnType;
use mysql_async::{Params, Value};

use crate::value::SqlValue;

/// Bind form of a parameter.
pub(crate) fn to_mysql(value: &SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::NULL,
        SqlValue::Bool(b) => Value::Int(*b as i64),
        SqlValue::Int(i) => Value::Int(*i),
        SqlValue::UInt(u) => Value::UInt(*u),
        SqlValue::Float(f) => Value::Double(*f),
        SqlValue::Text(s) => Value::Bytes(s.as_bytes().to_vec()),
        SqlValue::Bytes(b) => Value::Bytes(b.clone()),
        SqlValue::Json(j) => Value::Bytes(j.to_string().into_bytes()),
        SqlValue::Date(d) => Value::Date(d.year() as u16, d.month() as u8, d.day() as u8, 0, 0, 0, 0),
        SqlValue::DateTime(dt) => Value::Date(
            dt.year() as u16,
            dt.month() as u8,
            dt.day() as u8,
            dt.hour() as u8,
            dt.minute() as u8,
            dt.second() as u8,
            dt.nanosecond() / 1_000,
        ),
    }
}

pub(crate) fn to_params(params: &[SqlValue]) -> Params {
    if params.is_empty() {
        Params::Empty
    } else {
        Params::Positional(params.iter().map(to_mysql).collect())
    }
}

/// Cell value, using the column type to interpret text-protocol bytes.
pub(crate) fn from_mysql(val: Value, col_type: ColumnType) -> SqlValue {
    match val {
        Value::NULL => SqlValue::Null,
        Value::Bytes(bytes) => match String::from_utf8(bytes) {
            Ok(s) => text_cell(s, col_type),
            Err(e) => SqlValue::Bytes(e.into_bytes()),
        },
        Value::Int(i) => SqlValue::Int(i),
        Value::UInt(u) => SqlValue::UInt(u),
        Value::Float(f) => SqlValue::Float(f as f64),
        Value::Double(d) => SqlValue::Float(d),
        Value::Date(year, month, day, hour, min, sec, micro) => {
            let Some(date) = NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32) else {
                // zero dates such as 0000-00-00
                return SqlValue::Text(format!(
                    "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
                    year, month, day, hour, min, sec
                ));
            };
            if col_type == ColumnType::MYSQL_TYPE_DATE {
                return SqlValue::Date(date);
            }
            match date.and_hms_micro_opt(hour as u32, min as u32, sec as u32, micro) {
                Some(dt) => SqlValue::DateTime(dt),
                None => SqlValue::Date(date),
            }
        }
        Value::Time(negative, days, hours, mins, secs, micros) => {
            let total_hours = days * 24 + hours as u32;
            let sign = if negative { "-" } else { "" };
            SqlValue::Text(format!(
                "{}{:02}:{:02}:{:02}.{:06}",
                sign, total_hours, mins, secs, micros
            ))
        }
    }
}

fn text_cell(s: String, col_type: ColumnType) -> SqlValue {
    match col_type {
        ColumnType::MYSQL_TYPE_TINY
        | ColumnType::MYSQL_TYPE_SHORT
        | ColumnType::MYSQL_TYPE_LONG
        | ColumnType::MYSQL_TYPE_LONGLONG
        | ColumnType::MYSQL_TYPE_INT24
        | ColumnType::MYSQL_TYPE_YEAR => match s.parse::<i64>() {
            Ok(i) => SqlValue::Int(i),
            Err(_) => s.parse::<u64>().map(SqlValue::UInt).unwrap_or(SqlValue::Text(s)),
        },
        ColumnType::MYSQL_TYPE_FLOAT | ColumnType::MYSQL_TYPE_DOUBLE => {
            s.parse::<f64>().map(SqlValue::Float).unwrap_or(SqlValue::Text(s))
        }
        ColumnType::MYSQL_TYPE_JSON => {
            serde_json::from_str(&s).map(SqlValue::Json).unwrap_or(SqlValue::Text(s))
        }
        ColumnType::MYSQL_TYPE_DATE => NaiveDate::parse_from_str(&s, "%Y-%m-%d")
            .map(SqlValue::Date)
            .unwrap_or(SqlValue::Text(s)),
        ColumnType::MYSQL_TYPE_DATETIME | ColumnType::MYSQL_TYPE_TIMESTAMP => {
            chrono::NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S%.f")
                .map(SqlValue::DateTime)
                .unwrap_or(SqlValue::Text(s))
        }
        // DECIMAL stays textual to keep its exact digits
        _ => SqlValue::Text(s),
    }
}
