//! Typed SQL parameter values.
//!
//! Header and body values arrive as strings or JSON; before a statement is built they are
//! coerced to the column's catalog type so they bind with the right Postgres type.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;
use sqlx::types::BigDecimal;
use std::str::FromStr;
use uuid::Uuid;

use super::error::QueryError;
use super::query_where::quote_identifier;

/// Binding type derived from a column's `udt_name`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Bool,
    Int,
    Float,
    Numeric,
    Text,
    Uuid,
    Timestamptz,
    Timestamp,
    Date,
    Json,
    /// Any other catalog type (enums, `inet`, `interval`, arrays, ...); bound as text and cast in SQL
    Other,
}

impl SqlType {
    pub fn from_udt_name(udt_name: &str) -> SqlType {
        match udt_name {
            "bool" => SqlType::Bool,
            "int2" | "int4" | "int8" => SqlType::Int,
            "float4" | "float8" => SqlType::Float,
            "numeric" => SqlType::Numeric,
            "uuid" => SqlType::Uuid,
            "timestamptz" => SqlType::Timestamptz,
            "timestamp" => SqlType::Timestamp,
            "date" => SqlType::Date,
            "json" | "jsonb" => SqlType::Json,
            "text" | "varchar" | "bpchar" | "name" => SqlType::Text,
            _ => SqlType::Other,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            SqlType::Bool => "boolean",
            SqlType::Int => "integer",
            SqlType::Float => "float",
            SqlType::Numeric => "numeric",
            SqlType::Text => "text",
            SqlType::Uuid => "uuid",
            SqlType::Timestamptz => "timestamp with time zone",
            SqlType::Timestamp => "timestamp",
            SqlType::Date => "date",
            SqlType::Json => "json",
            SqlType::Other => "text",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// Typed so a NULL binds as the column's type
    Null(SqlType),
    Bool(bool),
    Int(i64),
    Float(f64),
    Numeric(BigDecimal),
    Text(String),
    Uuid(Uuid),
    Timestamptz(DateTime<Utc>),
    Timestamp(NaiveDateTime),
    Date(NaiveDate),
    Json(Value),
    /// Text for a column of type `udt`; the placeholder carries an explicit cast to that type
    Cast { udt: String, text: Option<String> },
}

impl From<&str> for SqlValue {
    fn from(s: &str) -> Self {
        SqlValue::Text(s.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(s: String) -> Self {
        SqlValue::Text(s)
    }
}

impl From<i64> for SqlValue {
    fn from(i: i64) -> Self {
        SqlValue::Int(i)
    }
}

impl SqlValue {
    /// Untyped conversion of a JSON body value; `coerce` settles the final type
    pub fn from_json(value: &Value) -> SqlValue {
        match value {
            Value::Null => SqlValue::Null(SqlType::Text),
            Value::Bool(b) => SqlValue::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => SqlValue::Int(i),
                None => SqlValue::Float(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => SqlValue::Text(s.clone()),
            Value::Array(_) | Value::Object(_) => SqlValue::Json(value.clone()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null(_) | SqlValue::Cast { text: None, .. })
    }

    /// Hand the value to Postgres as text and let the column's own type parse it
    pub fn cast_to(self, udt: &str) -> SqlValue {
        let text = if self.is_null() { None } else { Some(self.into_text()) };
        SqlValue::Cast {
            udt: udt.to_string(),
            text,
        }
    }

    /// Positional placeholder `$index`, with a type cast for `Cast` values
    pub fn placeholder(&self, index: usize) -> String {
        match self {
            SqlValue::Cast { udt, .. } => format!("${}::{}", index, quote_identifier(udt)),
            _ => format!("${}", index),
        }
    }

    /// Text rendering used when a value targets a text column
    fn into_text(self) -> String {
        match self {
            SqlValue::Null(_) => String::new(),
            SqlValue::Bool(b) => b.to_string(),
            SqlValue::Int(i) => i.to_string(),
            SqlValue::Float(f) => f.to_string(),
            SqlValue::Numeric(n) => n.to_string(),
            SqlValue::Text(s) => s,
            SqlValue::Uuid(u) => u.to_string(),
            SqlValue::Timestamptz(t) => t.to_rfc3339(),
            SqlValue::Timestamp(t) => t.to_string(),
            SqlValue::Date(d) => d.to_string(),
            SqlValue::Json(Value::String(s)) => s,
            SqlValue::Json(v) => v.to_string(),
            SqlValue::Cast { text, .. } => text.unwrap_or_default(),
        }
    }

    /// Convert to the binding type of `column`
    pub fn coerce(self, ty: SqlType, column: &str) -> Result<SqlValue, QueryError> {
        let invalid = |raw: &dyn std::fmt::Display| {
            QueryError::validation(format!(
                "Invalid value for column \"{}\" (expected {}): {}",
                column,
                ty.label(),
                raw
            ))
        };

        let coerced = match (ty, self) {
            (ty, SqlValue::Null(_)) => SqlValue::Null(ty),

            (SqlType::Text, v) => SqlValue::Text(v.into_text()),
            // Without the column's udt the best we can do is plain text; see `cast_to`
            (SqlType::Other, v) => SqlValue::Text(v.into_text()),

            (SqlType::Int, SqlValue::Int(i)) => SqlValue::Int(i),
            (SqlType::Int, SqlValue::Float(f)) if f.fract() == 0.0 => {
                // i64::MAX as f64 rounds up to 2^63, so the upper bound is exclusive
                if f < i64::MIN as f64 || f >= i64::MAX as f64 {
                    return Err(invalid(&f));
                }
                SqlValue::Int(f as i64)
            }
            (SqlType::Int, SqlValue::Text(s)) => {
                SqlValue::Int(s.trim().parse::<i64>().map_err(|_| invalid(&s))?)
            }

            (SqlType::Float, SqlValue::Int(i)) => SqlValue::Float(i as f64),
            (SqlType::Float, SqlValue::Float(f)) => SqlValue::Float(f),
            (SqlType::Float, SqlValue::Text(s)) => {
                SqlValue::Float(s.trim().parse::<f64>().map_err(|_| invalid(&s))?)
            }

            (SqlType::Numeric, SqlValue::Numeric(n)) => SqlValue::Numeric(n),
            (SqlType::Numeric, SqlValue::Int(i)) => SqlValue::Numeric(BigDecimal::from(i)),
            (SqlType::Numeric, SqlValue::Float(f)) => {
                SqlValue::Numeric(BigDecimal::from_str(&f.to_string()).map_err(|_| invalid(&f))?)
            }
            (SqlType::Numeric, SqlValue::Text(s)) => {
                SqlValue::Numeric(BigDecimal::from_str(s.trim()).map_err(|_| invalid(&s))?)
            }

            (SqlType::Bool, SqlValue::Bool(b)) => SqlValue::Bool(b),
            (SqlType::Bool, SqlValue::Int(0)) => SqlValue::Bool(false),
            (SqlType::Bool, SqlValue::Int(1)) => SqlValue::Bool(true),
            (SqlType::Bool, SqlValue::Text(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "t" | "1" | "yes" | "on" => SqlValue::Bool(true),
                "false" | "f" | "0" | "no" | "off" => SqlValue::Bool(false),
                _ => return Err(invalid(&s)),
            },

            (SqlType::Uuid, SqlValue::Uuid(u)) => SqlValue::Uuid(u),
            (SqlType::Uuid, SqlValue::Text(s)) => {
                SqlValue::Uuid(Uuid::parse_str(s.trim()).map_err(|_| invalid(&s))?)
            }

            (SqlType::Timestamptz, SqlValue::Timestamptz(t)) => SqlValue::Timestamptz(t),
            (SqlType::Timestamptz, SqlValue::Text(s)) => {
                SqlValue::Timestamptz(parse_timestamptz(s.trim()).ok_or_else(|| invalid(&s))?)
            }

            (SqlType::Timestamp, SqlValue::Timestamp(t)) => SqlValue::Timestamp(t),
            (SqlType::Timestamp, SqlValue::Text(s)) => {
                SqlValue::Timestamp(parse_timestamp(s.trim()).ok_or_else(|| invalid(&s))?)
            }

            (SqlType::Date, SqlValue::Date(d)) => SqlValue::Date(d),
            (SqlType::Date, SqlValue::Text(s)) => {
                SqlValue::Date(parse_date(s.trim()).ok_or_else(|| invalid(&s))?)
            }

            (SqlType::Json, SqlValue::Json(v)) => SqlValue::Json(v),
            (SqlType::Json, SqlValue::Text(s)) => {
                SqlValue::Json(serde_json::from_str(&s).unwrap_or(Value::String(s)))
            }
            (SqlType::Json, SqlValue::Bool(b)) => SqlValue::Json(Value::Bool(b)),
            (SqlType::Json, SqlValue::Int(i)) => SqlValue::Json(Value::from(i)),
            (SqlType::Json, SqlValue::Float(f)) => SqlValue::Json(Value::from(f)),

            (_, other) => return Err(invalid(&other.into_text())),
        };
        Ok(coerced)
    }
}

fn parse_timestamptz(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Some(t.with_timezone(&Utc));
    }
    // Zone-less input is read as UTC
    parse_timestamp(s).map(|naive| naive.and_utc())
}

fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Some(t.naive_utc());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"] {
        if let Ok(t) = NaiveDateTime::parse_from_str(s, format) {
            return Some(t);
        }
    }
    parse_date(s).and_then(|d| d.and_hms_opt(0, 0, 0))
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}
