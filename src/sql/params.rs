//! Typed bind values for PostgreSQL, chosen from the column's value type.

use crate::entity::ValueType;
use serde_json::Value;
use sqlx::postgres::{PgArguments, Postgres};
use sqlx::query::Query;

/// A parameter ready to bind. Placeholders carry an explicit `::type` cast, so text is
/// a safe carrier for uuid, timestamp, date, numeric and enum values.
#[derive(Clone, Debug, PartialEq)]
pub enum BindValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Json(Value),
}

impl BindValue {
    pub fn for_column(v: &Value, value_type: ValueType) -> Self {
        if value_type == ValueType::Json {
            return BindValue::Json(v.clone());
        }
        match v {
            Value::Null => BindValue::Null,
            Value::Bool(b) => BindValue::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => BindValue::Int(i),
                None => BindValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => BindValue::Text(s.clone()),
            Value::Array(_) | Value::Object(_) => BindValue::Json(v.clone()),
        }
    }

    pub fn bind_to<'q>(self, query: Query<'q, Postgres, PgArguments>) -> Query<'q, Postgres, PgArguments> {
        match self {
            BindValue::Null => query.bind(None::<String>),
            BindValue::Bool(b) => query.bind(b),
            BindValue::Int(n) => query.bind(n),
            BindValue::Float(f) => query.bind(f),
            BindValue::Text(s) => query.bind(s),
            BindValue::Json(v) => query.bind(v),
        }
    }
}
