//! Convert JSON payload values and query-string text into values sqlx can bind for SQLite.

use crate::error::AppError;
use crate::model::{Column, ColumnKind};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;
use sqlx::encode::{Encode, IsNull};
use sqlx::error::BoxDynError;
use sqlx::sqlite::{Sqlite, SqliteTypeInfo};
use sqlx::Database;

/// A value that can be bound to a SQLite statement, already checked against its column kind.
#[derive(Clone, Debug, PartialEq)]
pub enum BindValue {
    Null,
    Bool(bool),
    Int(i64),
    Text(String),
    Timestamp(DateTime<Utc>),
}

fn type_error(column: &Column) -> AppError {
    AppError::validation(column.name, format!("must be {}", column.kind.describe()))
}

pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|n| n.and_utc())
}

impl BindValue {
    /// Strict conversion for JSON payloads: the JSON type must match the column kind.
    pub fn from_json(column: &Column, v: &Value) -> Result<Self, AppError> {
        Ok(match (column.kind, v) {
            (_, Value::Null) => {
                if !column.nullable {
                    return Err(AppError::validation(column.name, "must not be null"));
                }
                BindValue::Null
            }
            (ColumnKind::Boolean, Value::Bool(b)) => BindValue::Bool(*b),
            (ColumnKind::Integer, Value::Number(n)) => {
                BindValue::Int(n.as_i64().ok_or_else(|| type_error(column))?)
            }
            (ColumnKind::Text, Value::String(s)) => BindValue::Text(s.clone()),
            (ColumnKind::Timestamp, Value::String(s)) => {
                BindValue::Timestamp(parse_timestamp(s).ok_or_else(|| type_error(column))?)
            }
            _ => return Err(type_error(column)),
        })
    }

    /// Lenient conversion for query-string text (`true`, `42`, RFC 3339 dates).
    pub fn from_query(column: &Column, s: &str) -> Result<Self, AppError> {
        Ok(match column.kind {
            ColumnKind::Boolean => match s.to_ascii_lowercase().as_str() {
                "true" | "1" => BindValue::Bool(true),
                "false" | "0" => BindValue::Bool(false),
                _ => return Err(type_error(column)),
            },
            ColumnKind::Integer => BindValue::Int(s.parse().map_err(|_| type_error(column))?),
            ColumnKind::Text => BindValue::Text(s.to_string()),
            ColumnKind::Timestamp => {
                BindValue::Timestamp(parse_timestamp(s).ok_or_else(|| type_error(column))?)
            }
        })
    }

    /// Filter operands: strings go through the lenient path, everything else is strict.
    pub fn from_filter(column: &Column, v: &Value) -> Result<Self, AppError> {
        match v {
            Value::String(s) => Self::from_query(column, s),
            Value::Null => Ok(BindValue::Null),
            other => Self::from_json(column, other),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, BindValue::Null)
    }
}

impl<'q> Encode<'q, Sqlite> for BindValue {
    fn encode_by_ref(
        &self,
        buf: &mut <Sqlite as Database>::ArgumentBuffer<'q>,
    ) -> Result<IsNull, BoxDynError> {
        match self {
            BindValue::Null => <Option<i64> as Encode<Sqlite>>::encode_by_ref(&None, buf),
            BindValue::Bool(b) => <bool as Encode<Sqlite>>::encode_by_ref(b, buf),
            BindValue::Int(n) => <i64 as Encode<Sqlite>>::encode_by_ref(n, buf),
            BindValue::Text(s) => <String as Encode<Sqlite>>::encode_by_ref(s, buf),
            BindValue::Timestamp(t) => <DateTime<Utc> as Encode<Sqlite>>::encode_by_ref(t, buf),
        }
    }
}

impl sqlx::Type<Sqlite> for BindValue {
    fn type_info() -> SqliteTypeInfo {
        <String as sqlx::Type<Sqlite>>::type_info()
    }
}
