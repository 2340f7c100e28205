//! Per-entity state shared by the synthesized handlers. Fixed at build time, never re-derived per request.

use crate::auth::{Authorizer, OperationKind, SecurityRequirement};
use crate::builder::PrimaryKeyPolicy;
use crate::cache::Cache;
use crate::entity::EntityMetadata;
use crate::error::{AppError, ConfigError};
use crate::postprocess::PostProcessChain;
use crate::schema::{Schema, SchemaKind};
use crate::store::SessionProvider;
use axum::body::Bytes;
use axum::http::HeaderMap;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

pub struct CrudState {
    pub entity: Arc<dyn EntityMetadata>,
    pub sessions: Arc<dyn SessionProvider>,
    pub create_schema: Schema,
    pub update_schema: Schema,
    pub pk_policy: PrimaryKeyPolicy,
    pub chain: PostProcessChain,
    pub cache: Option<Cache>,
    pub authorizer: Option<Arc<dyn Authorizer>>,
    pub security: HashMap<OperationKind, SecurityRequirement>,
    pub default_limit: u64,
}

impl CrudState {
    /// Check the requirement for this operation kind, if one is configured.
    pub async fn authorize(&self, headers: &HeaderMap, kind: OperationKind) -> Result<(), AppError> {
        let Some(requirement) = self.security.get(&kind) else {
            return Ok(());
        };
        match &self.authorizer {
            Some(authorizer) => authorizer.authorize(headers, requirement).await,
            None => Err(ConfigError::MissingAuthorizer(kind.as_str()).into()),
        }
    }

    /// Parse and validate a request body for create or update.
    pub fn prepare_body(&self, body: &Bytes, kind: SchemaKind) -> Result<Map<String, Value>, AppError> {
        let schema = match kind {
            SchemaKind::Create => &self.create_schema,
            SchemaKind::Update => &self.update_schema,
        };
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| AppError::BadRequest(format!("invalid JSON body: {}", e)))?;
        let Value::Object(mut map) = value else {
            return Err(AppError::BadRequest("body must be a JSON object".into()));
        };

        let pk = self.entity.primary_key_name();
        if map.contains_key(pk) && !schema.has_field(pk) {
            match self.pk_policy {
                PrimaryKeyPolicy::Reject => {
                    return Err(AppError::Validation(format!("{} is assigned by the store and cannot be supplied", pk)));
                }
                PrimaryKeyPolicy::Strip => {
                    map.remove(pk);
                }
            }
        }

        match kind {
            SchemaKind::Create => schema.validate(&map)?,
            SchemaKind::Update => schema.validate_partial(&map)?,
        }
        Ok(map)
    }

    /// Item cache key of a stored row, from its primary key.
    pub fn item_key(&self, cache: &Cache, row: &Value) -> Option<String> {
        row.get(self.entity.primary_key_name()).map(|id| cache.keys().item(id))
    }
}
