//! Raw entity config types, deserialized from the model JSON file.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnTypeConfig {
    Simple(String),
    Parameterized { name: String, params: Option<Vec<u32>> },
}

impl ColumnTypeConfig {
    /// Type name without parameters, e.g. "varchar" for varchar(255).
    pub fn base_name(&self) -> &str {
        match self {
            ColumnTypeConfig::Simple(s) => s.as_str(),
            ColumnTypeConfig::Parameterized { name, .. } => name.as_str(),
        }
    }

    /// Full PostgreSQL type usable in a cast, e.g. "varchar(255)".
    pub fn pg_type(&self) -> String {
        match self {
            ColumnTypeConfig::Simple(s) => s.clone(),
            ColumnTypeConfig::Parameterized { name, params: Some(p) } if !p.is_empty() => format!(
                "{}({})",
                name,
                p.iter().map(u32::to_string).collect::<Vec<_>>().join(",")
            ),
            ColumnTypeConfig::Parameterized { name, .. } => name.clone(),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub enum ColumnDefaultConfig {
    Literal(String),
    Expression { expression: String },
}

impl<'de> Deserialize<'de> for ColumnDefaultConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match serde_json::Value::deserialize(deserializer)? {
            serde_json::Value::String(s) => Ok(ColumnDefaultConfig::Literal(s)),
            serde_json::Value::Object(mut obj) => {
                if let Some(serde_json::Value::String(s)) = obj.remove("expression") {
                    return Ok(ColumnDefaultConfig::Expression { expression: s });
                }
                if let Some(serde_json::Value::String(s)) = obj.remove("value") {
                    return Ok(ColumnDefaultConfig::Literal(s));
                }
                Err(serde::de::Error::custom(format!(
                    "column default must be a string, {{ \"expression\": \"...\" }}, or {{ \"value\": \"...\" }}; got keys {:?}",
                    obj.keys().collect::<Vec<_>>()
                )))
            }
            other => Err(serde::de::Error::custom(format!(
                "column default must be a string or object; got {}",
                other
            ))),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ColumnConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub type_: ColumnTypeConfig,
    #[serde(default = "default_true")]
    pub nullable: bool,
    #[serde(default)]
    pub default: Option<ColumnDefaultConfig>,
    #[serde(default)]
    pub comment: Option<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipKind {
    /// We hold the foreign key: `local_column` references the target's `remote_column`.
    ToOne,
    /// The target holds the foreign key: its `remote_column` references our `local_column`.
    ToMany,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RelationshipConfig {
    pub name: String,
    /// Name of the related entity.
    pub target: String,
    pub kind: RelationshipKind,
    pub local_column: String,
    pub remote_column: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ValidationRule {
    #[serde(default)]
    pub required: Option<bool>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub max_length: Option<u32>,
    #[serde(default)]
    pub min_length: Option<u32>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub allowed: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub minimum: Option<f64>,
    #[serde(default)]
    pub maximum: Option<f64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EntityConfig {
    /// Entity type name, e.g. "Widget". Used in summaries, schema names and cache keys.
    pub name: String,
    /// PostgreSQL schema; `public` when absent.
    #[serde(default)]
    pub schema: Option<String>,
    pub table: String,
    /// Collection path segment; lower-cased `name` when absent.
    #[serde(default)]
    pub path_segment: Option<String>,
    pub primary_key: String,
    pub columns: Vec<ColumnConfig>,
    #[serde(default)]
    pub relationships: Vec<RelationshipConfig>,
    /// Column names that must never be exposed in API responses.
    #[serde(default)]
    pub sensitive_columns: Vec<String>,
    #[serde(default)]
    pub validation: HashMap<String, ValidationRule>,
}

/// All entities of one model file.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ModelConfig {
    pub entities: Vec<EntityConfig>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_types_deserialize_simple_and_parameterized() {
        let cols: Vec<ColumnConfig> = serde_json::from_str(
            r#"[
                {"name": "id", "type": "bigserial", "nullable": false},
                {"name": "label", "type": {"name": "varchar", "params": [64]}}
            ]"#,
        )
        .unwrap();
        assert_eq!(cols[0].type_.pg_type(), "bigserial");
        assert!(!cols[0].nullable);
        assert_eq!(cols[1].type_.pg_type(), "varchar(64)");
        assert_eq!(cols[1].type_.base_name(), "varchar");
        assert!(cols[1].nullable);
    }

    #[test]
    fn column_default_accepts_literal_and_expression() {
        let lit: ColumnDefaultConfig = serde_json::from_str(r#""draft""#).unwrap();
        assert!(matches!(lit, ColumnDefaultConfig::Literal(ref s) if s == "draft"));
        let expr: ColumnDefaultConfig = serde_json::from_str(r#"{"expression": "now()"}"#).unwrap();
        assert!(matches!(expr, ColumnDefaultConfig::Expression { ref expression } if expression == "now()"));
        assert!(serde_json::from_str::<ColumnDefaultConfig>("42").is_err());
    }
}
