//! Translate list/read query parameters into a per-request query plan.

use crate::entity::EntityMetadata;
use crate::error::{AppError, ConfigError};
use serde::Deserialize;
use serde_json::Value;

/// Query string of `GET /<name>`.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ListParams {
    pub limit: Option<u64>,
    pub skip: Option<u64>,
    pub sort_field: Option<String>,
    pub sort_desc: Option<bool>,
    pub equals_field: Option<String>,
    pub equals_value: Option<String>,
    /// Comma-separated relationship names to include.
    pub relationships: Option<String>,
}

/// Query string of `GET /<name>/{id}`.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ReadParams {
    pub relationships: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EqualsFilter {
    pub field: String,
    /// Already coerced to the column's value type.
    pub value: Value,
}

/// Executed as: filter, then sort, then paginate; named relationships load in the same query.
#[derive(Clone, Debug, PartialEq)]
pub struct QueryPlan {
    pub limit: u64,
    pub offset: u64,
    pub sort_field: String,
    pub sort_desc: bool,
    pub filter: Option<EqualsFilter>,
    pub relationships: Vec<String>,
}

fn non_empty(s: &Option<String>) -> Option<&str> {
    s.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

pub fn translate(
    entity: &dyn EntityMetadata,
    params: &ListParams,
    default_limit: u64,
) -> Result<QueryPlan, AppError> {
    let filter = match (non_empty(&params.equals_field), non_empty(&params.equals_value)) {
        (None, None) => None,
        (Some(field), Some(raw)) => {
            let column = entity
                .field(field)
                .ok_or_else(|| AppError::Validation(format!("unknown equals_field: {}", field)))?;
            let value = column.value_type.parse_str(raw).ok_or_else(|| {
                AppError::Validation(format!(
                    "equals_value for {} must be a {}",
                    field,
                    column.value_type.label()
                ))
            })?;
            Some(EqualsFilter {
                field: field.to_string(),
                value,
            })
        }
        _ => return Err(ConfigError::IncompleteFilter.into()),
    };

    let sort_field = match non_empty(&params.sort_field) {
        Some(f) if entity.field(f).is_some() => f.to_string(),
        Some(f) => return Err(AppError::Validation(format!("unknown sort_field: {}", f))),
        None => entity.primary_key_name().to_string(),
    };

    Ok(QueryPlan {
        limit: params.limit.unwrap_or(default_limit),
        offset: params.skip.unwrap_or(0),
        sort_field,
        sort_desc: params.sort_desc.unwrap_or(false),
        filter,
        relationships: parse_relationships(entity, params.relationships.as_deref())?,
    })
}

/// Split a comma-separated list and check each name is a declared relationship.
pub fn parse_relationships(entity: &dyn EntityMetadata, csv: Option<&str>) -> Result<Vec<String>, AppError> {
    let mut names: Vec<String> = Vec::new();
    for name in csv.unwrap_or("").split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if entity.relationship(name).is_none() {
            return Err(AppError::Validation(format!(
                "unknown relationship for {}: {}",
                entity.name(),
                name
            )));
        }
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    Ok(names)
}

/// Parse a path id according to the entity's primary key type.
pub fn parse_id(entity: &dyn EntityMetadata, raw: &str) -> Result<Value, AppError> {
    entity.primary_key_type().parse_str(raw).ok_or_else(|| {
        AppError::Validation(format!(
            "{} must be a {}",
            entity.primary_key_name(),
            entity.primary_key_type().label()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{resolve, ModelConfig, ResolvedEntity};
    use serde_json::json;
    use std::sync::Arc;

    fn customer() -> Arc<ResolvedEntity> {
        let config: ModelConfig = serde_json::from_str(
            r#"{"entities": [
                {"name": "Customer", "table": "customers", "primary_key": "id",
                 "columns": [{"name": "id", "type": "bigserial"}, {"name": "name", "type": "text"},
                             {"name": "active", "type": "boolean"}],
                 "relationships": [{"name": "orders", "target": "Order", "kind": "to_many",
                                    "local_column": "id", "remote_column": "customer_id"}]},
                {"name": "Order", "table": "orders", "primary_key": "id",
                 "columns": [{"name": "id", "type": "bigserial"}, {"name": "customer_id", "type": "bigint"}]}
            ]}"#,
        )
        .unwrap();
        resolve(&config).unwrap().entity("Customer").unwrap().clone()
    }

    #[test]
    fn defaults_sort_by_primary_key() {
        let plan = translate(customer().as_ref(), &ListParams::default(), 100).unwrap();
        assert_eq!(
            plan,
            QueryPlan {
                limit: 100,
                offset: 0,
                sort_field: "id".into(),
                sort_desc: false,
                filter: None,
                relationships: vec![],
            }
        );
    }

    #[test]
    fn equals_filter_is_coerced_to_column_type() {
        let params = ListParams {
            equals_field: Some("active".into()),
            equals_value: Some("true".into()),
            sort_field: Some("name".into()),
            sort_desc: Some(true),
            limit: Some(5),
            skip: Some(10),
            ..Default::default()
        };
        let plan = translate(customer().as_ref(), &params, 100).unwrap();
        assert_eq!(
            plan.filter,
            Some(EqualsFilter {
                field: "active".into(),
                value: json!(true)
            })
        );
        assert_eq!((plan.limit, plan.offset, plan.sort_desc), (5, 10, true));
        assert_eq!(plan.sort_field, "name");
    }

    #[test]
    fn half_a_filter_is_a_config_error() {
        let only_field = ListParams {
            equals_field: Some("name".into()),
            ..Default::default()
        };
        let only_value = ListParams {
            equals_value: Some("bob".into()),
            ..Default::default()
        };
        for params in [only_field, only_value] {
            let err = translate(customer().as_ref(), &params, 100).unwrap_err();
            assert!(matches!(err, AppError::Config(ConfigError::IncompleteFilter)));
        }
    }

    #[test]
    fn unknown_relationship_is_a_validation_error() {
        let params = ListParams {
            relationships: Some("orders,addresses".into()),
            ..Default::default()
        };
        let err = translate(customer().as_ref(), &params, 100).unwrap_err();
        assert!(matches!(err, AppError::Validation(ref m) if m.contains("addresses")));
    }

    #[test]
    fn relationships_are_trimmed_and_deduplicated() {
        let names = parse_relationships(customer().as_ref(), Some(" orders, ,orders")).unwrap();
        assert_eq!(names, vec!["orders".to_string()]);
    }

    #[test]
    fn unknown_sort_field_is_rejected() {
        let params = ListParams {
            sort_field: Some("nope".into()),
            ..Default::default()
        };
        assert!(matches!(
            translate(customer().as_ref(), &params, 100),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn parse_id_follows_primary_key_type() {
        assert_eq!(parse_id(customer().as_ref(), "7").unwrap(), json!(7));
        assert!(parse_id(customer().as_ref(), "seven").is_err());
    }
}
