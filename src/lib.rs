//! CRUD builder: synthesizes REST endpoints and OpenAPI metadata for a described entity.

pub mod auth;
pub mod builder;
pub mod cache;
pub mod case;
pub mod config;
pub mod entity;
pub mod error;
pub mod handlers;
pub mod openapi;
pub mod postprocess;
pub mod query;
pub mod routes;
pub mod schema;
pub mod sql;
pub mod state;
pub mod store;

pub use auth::{Authorizer, OperationKind, SecurityRequirement, StaticTokenAuthorizer};
pub use builder::{CrudBuilder, CrudOptions, CrudRoutes, PrimaryKeyPolicy};
pub use cache::{CacheClient, MemoryCache};
pub use config::{load_model_from_path, resolve, ModelConfig, ResolvedEntity, ResolvedModel, Settings};
pub use entity::{EntityMetadata, FieldDescriptor, RelationshipDescriptor, ValueType};
pub use error::{AppError, CacheError, ConfigError};
pub use postprocess::{from_fn, CamelCaseKeys, ExcludeFields, PostProcessor, ResultTransform};
pub use query::{ListParams, QueryPlan};
pub use routes::{common_routes, common_routes_with_ready};
pub use schema::{Schema, SchemaField, SchemaKind};
pub use store::{PgSessionProvider, Session, SessionProvider};
