//! Synthesized CRUD handlers. Every handler authorizes first, acquires its session only after
//! request parsing succeeds, and post-processes on every success path.

use crate::auth::OperationKind;
use crate::error::AppError;
use crate::query::{parse_id, parse_relationships, translate, ListParams, ReadParams};
use crate::schema::SchemaKind;
use crate::state::CrudState;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, Uri},
    response::IntoResponse,
    Json,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

/// Query string parsed after authorization, so a malformed query never bypasses it.
fn query_params<T: DeserializeOwned>(uri: &Uri) -> Result<T, AppError> {
    Query::<T>::try_from_uri(uri)
        .map(|Query(p)| p)
        .map_err(|e| AppError::BadRequest(e.body_text()))
}

pub async fn list(
    State(state): State<Arc<CrudState>>,
    headers: HeaderMap,
    uri: Uri,
) -> Result<Json<Vec<Value>>, AppError> {
    state.authorize(&headers, OperationKind::Read).await?;
    let params: ListParams = query_params(&uri)?;
    let plan = translate(state.entity.as_ref(), &params, state.default_limit)?;
    tracing::info!(
        entity = %state.entity.name(),
        limit = plan.limit,
        skip = plan.offset,
        sort_field = %plan.sort_field,
        sort_desc = plan.sort_desc,
        relationships = ?plan.relationships,
        "reading all"
    );

    let mut session = state.sessions.session().await?;
    let rows = session.fetch_many(&plan).await?;
    Ok(Json(state.chain.apply_all(rows)))
}

pub async fn read_one(
    State(state): State<Arc<CrudState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    uri: Uri,
) -> Result<Json<Value>, AppError> {
    state.authorize(&headers, OperationKind::Read).await?;
    let params: ReadParams = query_params(&uri)?;
    let id = parse_id(state.entity.as_ref(), &id)?;
    let relationships = parse_relationships(state.entity.as_ref(), params.relationships.as_deref())?;
    tracing::info!(entity = %state.entity.name(), id = %id, relationships = ?relationships, "reading one");

    // Rows with includes differ from the plain row under the same key.
    let cache = state.cache.as_ref().filter(|_| relationships.is_empty());
    let key = cache.map(|c| c.keys().item(&id));
    if let (Some(cache), Some(key)) = (cache, key.as_deref()) {
        if let Some(hit) = cache.get(key).await {
            tracing::debug!(key = %key, "cache hit");
            return Ok(Json(state.chain.apply(hit)));
        }
    }

    let mut session = state.sessions.session().await?;
    let row = session
        .fetch_one(&id, &relationships)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{} {}", state.entity.name(), id)))?;
    drop(session);

    if let (Some(cache), Some(key)) = (cache, key.as_deref()) {
        cache.set(key, &row).await;
    }
    Ok(Json(state.chain.apply(row)))
}

pub async fn create(
    State(state): State<Arc<CrudState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    state.authorize(&headers, OperationKind::Create).await?;
    let values = state.prepare_body(&body, SchemaKind::Create)?;
    tracing::info!(entity = %state.entity.name(), fields = ?values.keys().collect::<Vec<_>>(), "creating");

    let mut session = state.sessions.session().await?;
    let row = session.insert(&values).await?;
    session.commit().await?;
    drop(session);

    if let Some(cache) = &state.cache {
        cache.delete(&cache.keys().collection()).await;
    }
    Ok((StatusCode::CREATED, Json(state.chain.apply(row))))
}

pub async fn update(
    State(state): State<Arc<CrudState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    state.authorize(&headers, OperationKind::Update).await?;
    let id = parse_id(state.entity.as_ref(), &id)?;
    let values = state.prepare_body(&body, SchemaKind::Update)?;
    tracing::info!(entity = %state.entity.name(), id = %id, fields = ?values.keys().collect::<Vec<_>>(), "updating");

    let mut session = state.sessions.session().await?;
    let row = session
        .update(&id, &values)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{} {}", state.entity.name(), id)))?;
    session.commit().await?;
    drop(session);

    if let Some(cache) = &state.cache {
        cache.delete(&cache.keys().item(&id)).await;
        cache.delete(&cache.keys().collection()).await;
    }
    Ok(Json(state.chain.apply(row)))
}

pub async fn delete_one(
    State(state): State<Arc<CrudState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    state.authorize(&headers, OperationKind::Delete).await?;
    let id = parse_id(state.entity.as_ref(), &id)?;
    tracing::info!(entity = %state.entity.name(), id = %id, "deleting one");

    let mut session = state.sessions.session().await?;
    let row = session
        .delete_one(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{} {}", state.entity.name(), id)))?;
    session.commit().await?;
    drop(session);

    if let Some(cache) = &state.cache {
        cache.delete(&cache.keys().item(&id)).await;
        cache.delete(&cache.keys().collection()).await;
    }
    Ok(Json(state.chain.apply(row)))
}

pub async fn delete_all(
    State(state): State<Arc<CrudState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Value>>, AppError> {
    state.authorize(&headers, OperationKind::Delete).await?;
    tracing::info!(entity = %state.entity.name(), "deleting all");

    let mut session = state.sessions.session().await?;
    let rows = session.delete_all().await?;
    session.commit().await?;
    drop(session);

    if let Some(cache) = &state.cache {
        let mut keys = vec![cache.keys().collection()];
        keys.extend(rows.iter().filter_map(|row| state.item_key(cache, row)));
        cache.delete_many(&keys).await;
    }
    tracing::info!(entity = %state.entity.name(), count = rows.len(), "deleted");
    Ok(Json(state.chain.apply_all(rows)))
}
