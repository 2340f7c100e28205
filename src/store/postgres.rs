//! PostgreSQL sessions over sqlx: one transaction per session.

use super::{Session, SessionProvider};
use crate::config::{ResolvedEntity, ResolvedModel};
use crate::error::{AppError, ConfigError};
use crate::query::QueryPlan;
use crate::sql::{self, IncludeSelect, QueryBuf};
use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::postgres::{PgColumn, PgRow};
use sqlx::{Column, PgPool, Postgres, Row, Transaction, TypeInfo};
use std::sync::Arc;

pub struct PgSessionProvider {
    pool: PgPool,
    model: Arc<ResolvedModel>,
    entity: Arc<ResolvedEntity>,
}

impl PgSessionProvider {
    pub fn new(pool: PgPool, model: Arc<ResolvedModel>, entity_name: &str) -> Result<Self, ConfigError> {
        let entity = model
            .entity(entity_name)
            .cloned()
            .ok_or_else(|| ConfigError::MissingReference {
                kind: "entity",
                id: entity_name.to_string(),
            })?;
        Ok(PgSessionProvider { pool, model, entity })
    }

    pub fn entity(&self) -> &Arc<ResolvedEntity> {
        &self.entity
    }
}

#[async_trait]
impl SessionProvider for PgSessionProvider {
    async fn session(&self) -> Result<Box<dyn Session>, AppError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgSession {
            tx: Some(tx),
            model: self.model.clone(),
            entity: self.entity.clone(),
        }))
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Holds an open transaction until commit; dropping it rolls back.
pub struct PgSession {
    tx: Option<Transaction<'static, Postgres>>,
    model: Arc<ResolvedModel>,
    entity: Arc<ResolvedEntity>,
}

impl PgSession {
    fn includes<'a>(model: &'a ResolvedModel, entity: &'a ResolvedEntity, names: &[String]) -> Result<Vec<IncludeSelect<'a>>, AppError> {
        let mut out = Vec::with_capacity(names.len());
        for name in names {
            let join = entity
                .join(name)
                .ok_or_else(|| AppError::Validation(format!("unknown relationship for {}: {}", entity.name, name)))?;
            let related = model.entity(&join.target).ok_or_else(|| {
                AppError::Config(ConfigError::MissingReference {
                    kind: "entity",
                    id: join.target.clone(),
                })
            })?;
            out.push(IncludeSelect {
                name: &join.name,
                kind: join.kind,
                related: related.as_ref(),
                local_column: &join.local_column,
                remote_column: &join.remote_column,
            });
        }
        Ok(out)
    }

    async fn fetch_all(&mut self, q: QueryBuf) -> Result<Vec<Value>, AppError> {
        let tx = self
            .tx
            .as_mut()
            .ok_or_else(|| AppError::Store("session already committed".into()))?;
        tracing::debug!(sql = %q.sql, params = ?q.params, "executing");
        let mut query = sqlx::query(&q.sql);
        for p in q.params {
            query = p.bind_to(query);
        }
        let rows = query.fetch_all(&mut **tx).await?;
        Ok(rows.iter().map(row_to_json).collect())
    }

    async fn fetch_optional(&mut self, q: QueryBuf) -> Result<Option<Value>, AppError> {
        Ok(self.fetch_all(q).await?.into_iter().next())
    }
}

#[async_trait]
impl Session for PgSession {
    async fn fetch_many(&mut self, plan: &QueryPlan) -> Result<Vec<Value>, AppError> {
        let (model, entity) = (self.model.clone(), self.entity.clone());
        let includes = Self::includes(&model, &entity, &plan.relationships)?;
        let q = sql::select_list(&entity, plan, &includes);
        self.fetch_all(q).await
    }

    async fn fetch_one(&mut self, id: &Value, relationships: &[String]) -> Result<Option<Value>, AppError> {
        let (model, entity) = (self.model.clone(), self.entity.clone());
        let includes = Self::includes(&model, &entity, relationships)?;
        let q = sql::select_by_id(&entity, id, &includes);
        self.fetch_optional(q).await
    }

    async fn insert(&mut self, values: &Map<String, Value>) -> Result<Value, AppError> {
        let q = sql::insert(&self.entity, values);
        self.fetch_optional(q)
            .await?
            .ok_or_else(|| AppError::Store("insert returned no row".into()))
    }

    async fn update(&mut self, id: &Value, values: &Map<String, Value>) -> Result<Option<Value>, AppError> {
        let q = sql::update(&self.entity, id, values);
        self.fetch_optional(q).await
    }

    async fn delete_one(&mut self, id: &Value) -> Result<Option<Value>, AppError> {
        let q = sql::delete_by_id(&self.entity, id);
        self.fetch_optional(q).await
    }

    async fn delete_all(&mut self) -> Result<Vec<Value>, AppError> {
        let q = sql::delete_all(&self.entity);
        self.fetch_all(q).await
    }

    async fn commit(&mut self) -> Result<(), AppError> {
        if let Some(tx) = self.tx.take() {
            tx.commit().await?;
        }
        Ok(())
    }
}

fn row_to_json(row: &PgRow) -> Value {
    let mut map = Map::new();
    for col in row.columns() {
        map.insert(col.name().to_string(), cell_to_value(row, col));
    }
    Value::Object(map)
}

fn decode<'r, T, F>(row: &'r PgRow, index: usize, f: F) -> Result<Value, sqlx::Error>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
    F: FnOnce(T) -> Value,
{
    Ok(row.try_get::<Option<T>, _>(index)?.map(f).unwrap_or(Value::Null))
}

/// Decode one cell by its PostgreSQL type. Numeric and enum columns are selected as text.
fn cell_to_value(row: &PgRow, col: &PgColumn) -> Value {
    let i = col.ordinal();
    let decoded = match col.type_info().name() {
        "INT2" => decode(row, i, |n: i16| Value::from(n)),
        "INT4" => decode(row, i, |n: i32| Value::from(n)),
        "INT8" => decode(row, i, |n: i64| Value::from(n)),
        "FLOAT4" => decode(row, i, |n: f32| float(n as f64)),
        "FLOAT8" => decode(row, i, float),
        "BOOL" => decode(row, i, Value::Bool),
        "UUID" => decode(row, i, |u: uuid::Uuid| Value::String(u.to_string())),
        "TIMESTAMPTZ" => decode(row, i, |d: chrono::DateTime<chrono::Utc>| Value::String(d.to_rfc3339())),
        "TIMESTAMP" => decode(row, i, |d: chrono::NaiveDateTime| {
            Value::String(d.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
        }),
        "DATE" => decode(row, i, |d: chrono::NaiveDate| Value::String(d.format("%Y-%m-%d").to_string())),
        "JSON" | "JSONB" => decode(row, i, |v: Value| v),
        _ => decode(row, i, Value::String),
    };
    decoded.unwrap_or(Value::Null)
}

fn float(n: f64) -> Value {
    serde_json::Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
}
