//! Example server: loads a model file, builds CRUD routes for every entity, serves /openapi.json.

use axum::{routing::get, Json, Router};
use crud_builder::{
    common_routes, common_routes_with_ready, load_model_from_path, resolve, CrudBuilder, CrudOptions,
    CacheClient, MemoryCache, PgSessionProvider, SessionProvider, Settings,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing_subscriber::EnvFilter;

const MAX_BODY_BYTES: usize = 1024 * 1024;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("crud_builder=info".parse()?)
                .add_directive("tower_http=info".parse()?),
        )
        .init();

    let settings = Settings::from_env()?;
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .connect(&settings.database_url)
        .await?;

    let model = Arc::new(resolve(&load_model_from_path(&settings.model_path).await?)?);
    let cache: Arc<dyn CacheClient> = Arc::new(MemoryCache::default());

    let mut app = Router::new();
    let mut openapi: Option<utoipa::openapi::OpenApi> = None;
    let mut first_provider: Option<Arc<dyn SessionProvider>> = None;
    for entity in &model.entities {
        let provider: Arc<dyn SessionProvider> =
            Arc::new(PgSessionProvider::new(pool.clone(), model.clone(), &entity.name)?);
        first_provider.get_or_insert_with(|| provider.clone());
        let options = CrudOptions {
            infer_create: true,
            infer_update: true,
            allow_delete: true,
            cache: Some(cache.clone()),
            ..CrudOptions::from_settings(&settings)
        };
        let routes = CrudBuilder::new(entity.clone(), provider)
            .options(options)
            .build(Some(app))?;
        app = routes.router;
        match openapi.as_mut() {
            Some(doc) => doc.merge(routes.openapi),
            None => openapi = Some(routes.openapi),
        }
    }

    let doc = serde_json::to_value(&openapi)?;
    app = app
        .route("/openapi.json", get(move || async move { Json(doc) }))
        .merge(match first_provider {
            Some(provider) => common_routes_with_ready(provider),
            None => common_routes(),
        })
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES)),
        );

    let listener = TcpListener::bind(&settings.listen_addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
