//! Endpoint synthesis: resolve schemas, wire the cross-cutting pipeline, register routes.

use crate::auth::{Authorizer, OperationKind, SecurityRequirement};
use crate::cache::{Cache, CacheClient, CacheKeys};
use crate::config::Settings;
use crate::entity::EntityMetadata;
use crate::error::ConfigError;
use crate::openapi::entity_openapi;
use crate::postprocess::{ExcludeFields, PostProcessChain, PostProcessor};
use crate::routes::entity::{entity_routes, normalize_prefix};
use crate::schema::{self, Schema, SchemaKind};
use crate::state::CrudState;
use crate::store::SessionProvider;
use axum::Router;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use utoipa::openapi::OpenApi;

pub const DEFAULT_CACHE_EXPIRY: Duration = Duration::from_secs(60);
pub const DEFAULT_LIMIT: u64 = 100;
const DEFAULT_ENVIRONMENT: &str = "development";

/// What happens when a create or update body carries the primary key and the schema does not declare it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PrimaryKeyPolicy {
    /// Fail with a validation error.
    #[default]
    Reject,
    /// Drop the key and continue.
    Strip,
}

/// Options for one entity's endpoints. Every field is optional, but a build fails unless
/// create and update schemas are supplied or inference is enabled for them.
#[derive(Clone, Default)]
pub struct CrudOptions {
    /// Route prefix. Defaults to `/<path_segment>`.
    pub prefix: Option<String>,
    /// Explicit create body schema. Used as given, regardless of `infer_create`.
    pub create_schema: Option<Schema>,
    /// Explicit update body schema. Used as given, regardless of `infer_update`.
    pub update_schema: Option<Schema>,
    /// Infer the create schema from the entity's columns when none is given.
    pub infer_create: bool,
    /// Infer the update schema (every field optional) when none is given.
    pub infer_update: bool,
    /// Register DELETE on the collection and on items.
    pub allow_delete: bool,
    /// Verifies credentials. Required as soon as any security requirement is set.
    pub authorizer: Option<Arc<dyn Authorizer>>,
    /// Guards list and get-one.
    pub read_security: Option<SecurityRequirement>,
    pub create_security: Option<SecurityRequirement>,
    pub update_security: Option<SecurityRequirement>,
    /// Guards delete-one and delete-all.
    pub delete_security: Option<SecurityRequirement>,
    /// Applied to every returned item in this order, on cache hits and misses alike.
    pub post_processors: Vec<Arc<dyn PostProcessor>>,
    /// Enables get-one caching and invalidation on writes.
    pub cache: Option<Arc<dyn CacheClient>>,
    /// TTL for cached items. Defaults to 60 seconds.
    pub cache_expiry: Option<Duration>,
    /// Deployment environment. Outside `production` cache keys get an `_<environment>` suffix.
    pub environment: Option<String>,
    /// Columns left out of inferred schemas and the response model, and stripped from responses.
    pub exclude_fields: Vec<String>,
    pub pk_policy: PrimaryKeyPolicy,
    /// Page size when the request gives no `limit`. Defaults to 100.
    pub default_limit: Option<u64>,
}

impl CrudOptions {
    /// Environment, cache expiry and default limit from process settings.
    pub fn from_settings(settings: &Settings) -> Self {
        CrudOptions {
            environment: Some(settings.environment.clone()),
            cache_expiry: Some(settings.cache_expiry),
            default_limit: Some(settings.default_limit),
            ..Default::default()
        }
    }

    fn security(&self) -> HashMap<OperationKind, SecurityRequirement> {
        [
            (OperationKind::Read, &self.read_security),
            (OperationKind::Create, &self.create_security),
            (OperationKind::Update, &self.update_security),
            (OperationKind::Delete, &self.delete_security),
        ]
        .into_iter()
        .filter_map(|(kind, req)| req.clone().map(|r| (kind, r)))
        .collect()
    }
}

/// Routes and their OpenAPI description.
pub struct CrudRoutes {
    pub router: Router,
    pub openapi: OpenApi,
}

pub struct CrudBuilder {
    entity: Arc<dyn EntityMetadata>,
    sessions: Arc<dyn SessionProvider>,
    options: CrudOptions,
}

impl CrudBuilder {
    pub fn new(entity: Arc<dyn EntityMetadata>, sessions: Arc<dyn SessionProvider>) -> Self {
        CrudBuilder {
            entity,
            sessions,
            options: CrudOptions::default(),
        }
    }

    pub fn options(mut self, options: CrudOptions) -> Self {
        self.options = options;
        self
    }

    /// Synthesize the endpoints. When `router` is given the routes are merged into it.
    pub fn build(self, router: Option<Router>) -> Result<CrudRoutes, ConfigError> {
        let CrudBuilder {
            entity,
            sessions,
            options,
        } = self;

        let prefix = normalize_prefix(
            options
                .prefix
                .as_deref()
                .unwrap_or(entity.path_segment()),
        );
        let exclude: HashSet<String> = options.exclude_fields.iter().cloned().collect();
        for name in &exclude {
            if entity.field(name).is_none() {
                return Err(ConfigError::Validation(format!(
                    "exclude_fields names unknown column {}.{}",
                    entity.name(),
                    name
                )));
            }
        }

        for explicit in [&options.create_schema, &options.update_schema].into_iter().flatten() {
            check_explicit_schema(entity.as_ref(), explicit)?;
        }

        let create_schema = schema::resolve(
            entity.as_ref(),
            options.create_schema.clone(),
            options.infer_create,
            SchemaKind::Create,
            &exclude,
        )?;
        let update_schema = schema::resolve(
            entity.as_ref(),
            options.update_schema.clone(),
            options.infer_update,
            SchemaKind::Update,
            &exclude,
        )?;

        let security = options.security();
        if options.authorizer.is_none() {
            if let Some(kind) = security.keys().next() {
                return Err(ConfigError::MissingAuthorizer(kind.as_str()));
            }
        }

        let mut processors: Vec<Arc<dyn PostProcessor>> = vec![Arc::new(ExcludeFields {
            fields: exclude.clone(),
        })];
        processors.extend(options.post_processors.iter().cloned());
        let chain = PostProcessChain::build(entity.as_ref(), &processors);

        let environment = options.environment.as_deref().unwrap_or(DEFAULT_ENVIRONMENT);
        let cache = options.cache.clone().map(|client| {
            Cache::new(
                client,
                CacheKeys::new(entity.name(), environment),
                options.cache_expiry.unwrap_or(DEFAULT_CACHE_EXPIRY),
            )
        });

        let state = Arc::new(CrudState {
            entity: entity.clone(),
            sessions,
            create_schema,
            update_schema,
            pk_policy: options.pk_policy,
            chain,
            cache,
            authorizer: options.authorizer.clone(),
            security,
            default_limit: options.default_limit.unwrap_or(DEFAULT_LIMIT),
        });

        let openapi = entity_openapi(&state, &prefix, options.allow_delete, &exclude);
        let routes = entity_routes(state, &prefix, options.allow_delete);
        tracing::info!(
            entity = %entity.name(),
            prefix = %prefix,
            allow_delete = options.allow_delete,
            "registered CRUD routes"
        );

        let router = match router {
            Some(r) => r.merge(routes),
            None => routes,
        };
        Ok(CrudRoutes { router, openapi })
    }
}

/// An explicit schema may only name the entity's columns, each with the column's value type.
fn check_explicit_schema(entity: &dyn EntityMetadata, schema: &Schema) -> Result<(), ConfigError> {
    for field in schema.fields() {
        let column = entity.field(&field.name).ok_or_else(|| {
            ConfigError::Validation(format!(
                "schema {} names unknown column {}.{}",
                schema.name(),
                entity.name(),
                field.name
            ))
        })?;
        if column.value_type != field.value_type {
            return Err(ConfigError::Validation(format!(
                "schema {} declares {} as {:?}, column {}.{} is {:?}",
                schema.name(),
                field.name,
                field.value_type,
                entity.name(),
                column.name,
                column.value_type
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::store::Session;
    use crate::config::{resolve, ModelConfig};
    use crate::entity::ValueType;
    use crate::schema::SchemaField;
    use async_trait::async_trait;

    struct NoStore;

    #[async_trait]
    impl SessionProvider for NoStore {
        async fn session(&self) -> Result<Box<dyn Session>, AppError> {
            Err(AppError::Store("unused".into()))
        }
    }

    fn widget() -> Arc<dyn EntityMetadata> {
        let config: ModelConfig = serde_json::from_str(
            r#"{"entities": [{"name": "Widget", "table": "widgets", "primary_key": "id",
                "columns": [{"name": "id", "type": "bigserial"}, {"name": "name", "type": "text", "nullable": false}]}]}"#,
        )
        .unwrap();
        resolve(&config).unwrap().entity("Widget").unwrap().clone()
    }

    fn builder(options: CrudOptions) -> CrudBuilder {
        CrudBuilder::new(widget(), Arc::new(NoStore)).options(options)
    }

    #[test]
    fn missing_schema_without_inference_fails() {
        let err = builder(CrudOptions::default()).build(None).err().unwrap();
        assert!(matches!(err, ConfigError::MissingSchema { operation: "create", .. }));
    }

    #[test]
    fn security_without_authorizer_fails() {
        let options = CrudOptions {
            infer_create: true,
            infer_update: true,
            create_security: Some(SecurityRequirement::authenticated()),
            ..Default::default()
        };
        let err = builder(options).build(None).err().unwrap();
        assert!(matches!(err, ConfigError::MissingAuthorizer("create")));
    }

    #[test]
    fn unknown_excluded_column_fails() {
        let options = CrudOptions {
            infer_create: true,
            infer_update: true,
            exclude_fields: vec!["nope".into()],
            ..Default::default()
        };
        assert!(matches!(builder(options).build(None), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn explicit_schema_must_match_the_columns() {
        let misspelled = CrudOptions {
            create_schema: Some(Schema::new("WidgetCreate").field(SchemaField::required("nmae", ValueType::Text))),
            infer_update: true,
            ..Default::default()
        };
        let err = builder(misspelled).build(None).err().unwrap();
        assert!(matches!(err, ConfigError::Validation(ref m) if m.contains("nmae")));

        let mistyped = CrudOptions {
            infer_create: true,
            update_schema: Some(Schema::new("WidgetUpdate").field(SchemaField::optional("name", ValueType::Integer))),
            ..Default::default()
        };
        assert!(matches!(builder(mistyped).build(None), Err(ConfigError::Validation(_))));

        let matching = CrudOptions {
            create_schema: Some(Schema::new("WidgetCreate").field(SchemaField::required("name", ValueType::Text))),
            infer_update: true,
            ..Default::default()
        };
        builder(matching).build(None).unwrap();
    }

    #[test]
    fn openapi_lists_only_registered_operations() {
        let options = CrudOptions {
            infer_create: true,
            infer_update: true,
            ..Default::default()
        };
        let routes = builder(options).build(None).unwrap();
        let doc = serde_json::to_value(&routes.openapi).unwrap();
        let collection = &doc["paths"]["/widget"];
        assert_eq!(collection["get"]["summary"], "Read all Widget items");
        assert!(collection.get("post").is_some());
        assert!(collection.get("delete").is_none());
        assert_eq!(doc["paths"]["/widget/{id}"]["get"]["summary"], "Read one Widget item");
        assert!(doc["components"]["schemas"]["WidgetCreate"]["properties"]["name"].is_object());
    }
}
