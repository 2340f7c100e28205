//! Load a model file and resolve it into runtime entities.

use crate::config::resolved::{JoinSpec, ResolvedEntity, ResolvedModel};
use crate::config::types::*;
use crate::config::{path_segment_of, validate};
use crate::entity::{FieldDescriptor, RelationshipDescriptor, ValueType};
use crate::error::ConfigError;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

const DEFAULT_SCHEMA: &str = "public";

/// Build resolved model from model config. Validates first.
pub fn resolve(config: &ModelConfig) -> Result<ResolvedModel, ConfigError> {
    validate(config)?;

    let mut entities = Vec::with_capacity(config.entities.len());
    let mut entity_by_name = HashMap::new();

    for e in &config.entities {
        let fields: Vec<FieldDescriptor> = e
            .columns
            .iter()
            .map(|c| FieldDescriptor {
                name: c.name.clone(),
                value_type: ValueType::from_pg_type(c.type_.base_name()),
                nullable: c.nullable && c.name != e.primary_key,
                has_default: c.default.is_some() || is_serial(c.type_.base_name()),
            })
            .collect();
        let pk_index = fields
            .iter()
            .position(|f| f.name == e.primary_key)
            .ok_or_else(|| ConfigError::InvalidPrimaryKey {
                entity: e.name.clone(),
                column: e.primary_key.clone(),
            })?;
        let pg_types = e
            .columns
            .iter()
            .map(|c| (c.name.clone(), c.type_.pg_type()))
            .collect();
        let relationships = e
            .relationships
            .iter()
            .map(|r| RelationshipDescriptor {
                name: r.name.clone(),
                target: r.target.clone(),
                kind: r.kind,
            })
            .collect();
        let joins = e
            .relationships
            .iter()
            .map(|r| JoinSpec {
                name: r.name.clone(),
                kind: r.kind,
                target: r.target.clone(),
                local_column: r.local_column.clone(),
                remote_column: r.remote_column.clone(),
            })
            .collect();

        let resolved = Arc::new(ResolvedEntity {
            name: e.name.clone(),
            schema_name: e.schema.clone().unwrap_or_else(|| DEFAULT_SCHEMA.to_string()),
            table_name: e.table.clone(),
            path_segment: path_segment_of(e),
            pk_index,
            fields,
            pg_types,
            relationships,
            joins,
            sensitive_columns: e.sensitive_columns.iter().cloned().collect(),
            validation: e.validation.clone(),
        });
        entity_by_name.insert(e.name.clone(), resolved.clone());
        entities.push(resolved);
    }

    Ok(ResolvedModel {
        entities,
        entity_by_name,
    })
}

fn is_serial(type_name: &str) -> bool {
    matches!(
        type_name.to_lowercase().as_str(),
        "serial" | "smallserial" | "bigserial"
    )
}

/// Read a `ModelConfig` JSON file.
pub async fn load_model_from_path(path: impl AsRef<Path>) -> Result<ModelConfig, ConfigError> {
    let path = path.as_ref();
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    serde_json::from_str(&raw).map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))
}
