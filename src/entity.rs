//! Entity metadata capability: the only view of an entity the endpoint synthesizer relies on.

use crate::config::{RelationshipKind, ValidationRule};
use serde_json::Value;

/// Value type of a column, derived from its PostgreSQL type name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueType {
    Integer,
    BigInt,
    Float,
    Numeric,
    Text,
    Boolean,
    Uuid,
    Timestamp,
    Date,
    Json,
}

impl ValueType {
    /// Map a PostgreSQL type name (without parameters). Unknown names, including enums, are text.
    pub fn from_pg_type(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "smallint" | "int2" | "integer" | "int" | "int4" | "serial" | "smallserial" => ValueType::Integer,
            "bigint" | "int8" | "bigserial" => ValueType::BigInt,
            "real" | "float4" | "double precision" | "float8" => ValueType::Float,
            "numeric" | "decimal" => ValueType::Numeric,
            "bool" | "boolean" => ValueType::Boolean,
            "uuid" => ValueType::Uuid,
            "timestamp" | "timestamptz" | "timestamp with time zone" | "timestamp without time zone" => {
                ValueType::Timestamp
            }
            "date" => ValueType::Date,
            "json" | "jsonb" => ValueType::Json,
            _ => ValueType::Text,
        }
    }

    /// Whether a non-null JSON value is acceptable for a column of this type.
    pub fn accepts(&self, v: &Value) -> bool {
        match self {
            ValueType::Integer => v.as_i64().map(|n| i32::try_from(n).is_ok()).unwrap_or(false),
            ValueType::BigInt => v.is_i64(),
            ValueType::Float => v.is_number(),
            ValueType::Numeric => {
                v.is_number() || v.as_str().map(|s| s.parse::<f64>().is_ok()).unwrap_or(false)
            }
            ValueType::Text => v.is_string(),
            ValueType::Boolean => v.is_boolean(),
            ValueType::Uuid => v.as_str().map(|s| uuid::Uuid::parse_str(s).is_ok()).unwrap_or(false),
            ValueType::Timestamp => v.as_str().map(is_timestamp).unwrap_or(false),
            ValueType::Date => v
                .as_str()
                .map(|s| chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok())
                .unwrap_or(false),
            ValueType::Json => true,
        }
    }

    /// Parse a path or query string into a JSON value of this type. None when it does not parse.
    pub fn parse_str(&self, s: &str) -> Option<Value> {
        match self {
            ValueType::Integer => s.parse::<i32>().ok().map(Value::from),
            ValueType::BigInt => s.parse::<i64>().ok().map(Value::from),
            ValueType::Float => s
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number),
            ValueType::Numeric => s.parse::<f64>().ok().map(|_| Value::String(s.to_string())),
            ValueType::Boolean => {
                if s.eq_ignore_ascii_case("true") {
                    Some(Value::Bool(true))
                } else if s.eq_ignore_ascii_case("false") {
                    Some(Value::Bool(false))
                } else {
                    None
                }
            }
            ValueType::Uuid => uuid::Uuid::parse_str(s).ok().map(|u| Value::String(u.to_string())),
            ValueType::Timestamp | ValueType::Date => {
                let v = Value::String(s.to_string());
                self.accepts(&v).then_some(v)
            }
            ValueType::Json => Some(serde_json::from_str(s).unwrap_or_else(|_| Value::String(s.to_string()))),
            ValueType::Text => Some(Value::String(s.to_string())),
        }
    }

    /// Short name used in validation messages.
    pub fn label(&self) -> &'static str {
        match self {
            ValueType::Integer | ValueType::BigInt => "integer",
            ValueType::Float | ValueType::Numeric => "number",
            ValueType::Text => "string",
            ValueType::Boolean => "boolean",
            ValueType::Uuid => "uuid",
            ValueType::Timestamp => "date-time",
            ValueType::Date => "date",
            ValueType::Json => "json",
        }
    }
}

fn is_timestamp(s: &str) -> bool {
    chrono::DateTime::parse_from_rfc3339(s).is_ok()
        || chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
        || chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f").is_ok()
}

/// One column of an entity.
#[derive(Clone, Debug)]
pub struct FieldDescriptor {
    pub name: String,
    pub value_type: ValueType,
    pub nullable: bool,
    /// The store fills the column when no value is given (sequence, `now()`, literal default).
    pub has_default: bool,
}

/// A declared relationship that can be eagerly included in reads.
#[derive(Clone, Debug)]
pub struct RelationshipDescriptor {
    pub name: String,
    pub target: String,
    pub kind: RelationshipKind,
}

/// Read-only metadata an ORM adapter exposes for an entity.
pub trait EntityMetadata: Send + Sync {
    /// Type name, e.g. "Widget".
    fn name(&self) -> &str;
    /// Collection path segment, e.g. "widget".
    fn path_segment(&self) -> &str;
    fn primary_key(&self) -> &FieldDescriptor;
    /// All columns, primary key included, in declaration order.
    fn fields(&self) -> &[FieldDescriptor];
    fn relationships(&self) -> &[RelationshipDescriptor];

    fn primary_key_name(&self) -> &str {
        &self.primary_key().name
    }

    fn primary_key_type(&self) -> ValueType {
        self.primary_key().value_type
    }

    fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields().iter().find(|f| f.name == name)
    }

    fn relationship(&self, name: &str) -> Option<&RelationshipDescriptor> {
        self.relationships().iter().find(|r| r.name == name)
    }

    /// Extra constraints on a column's request values.
    fn validation_rule(&self, _column: &str) -> Option<&ValidationRule> {
        None
    }

    /// Columns that are writable but never returned.
    fn is_sensitive(&self, _column: &str) -> bool {
        false
    }
}
