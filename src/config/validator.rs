//! Model validation: referential integrity between entities, columns and relationships.

use crate::config::ModelConfig;
use crate::error::ConfigError;
use std::collections::{HashMap, HashSet};

/// Collection path segment for an entity: explicit, else the lower-cased name.
pub fn path_segment_of(entity: &crate::config::EntityConfig) -> String {
    entity
        .path_segment
        .clone()
        .unwrap_or_else(|| entity.name.to_lowercase())
}

pub fn validate(config: &ModelConfig) -> Result<(), ConfigError> {
    let mut names = HashSet::new();
    let mut path_segments = HashSet::new();
    for e in &config.entities {
        if !names.insert(e.name.as_str()) {
            return Err(ConfigError::Duplicate {
                kind: "entity",
                name: e.name.clone(),
            });
        }
        if !path_segments.insert(path_segment_of(e)) {
            return Err(ConfigError::Duplicate {
                kind: "path segment",
                name: path_segment_of(e),
            });
        }
    }

    let columns_by_entity: HashMap<&str, HashSet<&str>> = config
        .entities
        .iter()
        .map(|e| (e.name.as_str(), e.columns.iter().map(|c| c.name.as_str()).collect()))
        .collect();

    for e in &config.entities {
        let columns = &columns_by_entity[e.name.as_str()];
        if columns.len() != e.columns.len() {
            let mut seen = HashSet::new();
            let dup = e
                .columns
                .iter()
                .find(|c| !seen.insert(c.name.as_str()))
                .map(|c| c.name.clone())
                .unwrap_or_default();
            return Err(ConfigError::Duplicate {
                kind: "column",
                name: format!("{}.{}", e.name, dup),
            });
        }
        if !columns.contains(e.primary_key.as_str()) {
            return Err(ConfigError::InvalidPrimaryKey {
                entity: e.name.clone(),
                column: e.primary_key.clone(),
            });
        }
        for col in e.validation.keys().chain(e.sensitive_columns.iter()) {
            if !columns.contains(col.as_str()) {
                return Err(ConfigError::MissingReference {
                    kind: "column",
                    id: format!("{}.{}", e.name, col),
                });
            }
        }

        let mut rel_names = HashSet::new();
        for r in &e.relationships {
            if !rel_names.insert(r.name.as_str()) || columns.contains(r.name.as_str()) {
                return Err(ConfigError::Duplicate {
                    kind: "relationship",
                    name: format!("{}.{}", e.name, r.name),
                });
            }
            let target_columns = columns_by_entity
                .get(r.target.as_str())
                .ok_or_else(|| ConfigError::MissingReference {
                    kind: "entity",
                    id: r.target.clone(),
                })?;
            if !columns.contains(r.local_column.as_str()) {
                return Err(ConfigError::MissingReference {
                    kind: "column",
                    id: format!("{}.{}", e.name, r.local_column),
                });
            }
            if !target_columns.contains(r.remote_column.as_str()) {
                return Err(ConfigError::MissingReference {
                    kind: "column",
                    id: format!("{}.{}", r.target, r.remote_column),
                });
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(json: &str) -> ModelConfig {
        serde_json::from_str(json).unwrap()
    }

    const SHOP: &str = r#"{"entities": [
        {"name": "Customer", "table": "customers", "primary_key": "id",
         "columns": [{"name": "id", "type": "bigserial"}, {"name": "name", "type": "text"}],
         "relationships": [{"name": "orders", "target": "Order", "kind": "to_many",
                            "local_column": "id", "remote_column": "customer_id"}]},
        {"name": "Order", "table": "orders", "primary_key": "id",
         "columns": [{"name": "id", "type": "bigserial"}, {"name": "customer_id", "type": "bigint"}]}
    ]}"#;

    #[test]
    fn accepts_consistent_model() {
        validate(&model(SHOP)).unwrap();
    }

    #[test]
    fn rejects_primary_key_that_is_not_a_column() {
        let m = model(
            r#"{"entities": [{"name": "Widget", "table": "widgets", "primary_key": "uid",
                "columns": [{"name": "id", "type": "int"}]}]}"#,
        );
        assert!(matches!(validate(&m), Err(ConfigError::InvalidPrimaryKey { .. })));
    }

    #[test]
    fn rejects_relationship_to_unknown_entity() {
        let m = model(&SHOP.replace("\"target\": \"Order\"", "\"target\": \"Invoice\""));
        assert!(matches!(
            validate(&m),
            Err(ConfigError::MissingReference { kind: "entity", .. })
        ));
    }

    #[test]
    fn rejects_duplicate_path_segments() {
        let m = model(
            r#"{"entities": [
                {"name": "Widget", "table": "a", "primary_key": "id", "columns": [{"name": "id", "type": "int"}]},
                {"name": "Gadget", "table": "b", "path_segment": "widget", "primary_key": "id",
                 "columns": [{"name": "id", "type": "int"}]}]}"#,
        );
        assert!(matches!(
            validate(&m),
            Err(ConfigError::Duplicate { kind: "path segment", .. })
        ));
    }

    #[test]
    fn rejects_duplicate_columns() {
        let m = model(
            r#"{"entities": [{"name": "Widget", "table": "w", "primary_key": "id",
                "columns": [{"name": "id", "type": "int"}, {"name": "id", "type": "text"}]}]}"#,
        );
        assert!(matches!(validate(&m), Err(ConfigError::Duplicate { kind: "column", .. })));
    }
}
