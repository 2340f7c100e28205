#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use crud_builder::{
    resolve, AppError, CacheClient, CacheError, CrudBuilder, CrudOptions, EntityMetadata, ModelConfig, QueryPlan,
    Session, SessionProvider,
};
use serde_json::{json, Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;

pub const CREATED_DEFAULT: &str = "2024-01-01T00:00:00Z";

/// Widget(id bigserial, name text not null, note text, created timestamptz default now()).
pub fn widget() -> Arc<dyn EntityMetadata> {
    let config: ModelConfig = serde_json::from_value(json!({
        "entities": [{
            "name": "Widget",
            "table": "widgets",
            "primary_key": "id",
            "columns": [
                {"name": "id", "type": "bigserial", "nullable": false},
                {"name": "name", "type": "text", "nullable": false},
                {"name": "note", "type": "text"},
                {"name": "created", "type": "timestamptz", "nullable": false,
                 "default": {"expression": "now()"}}
            ],
            "sensitive_columns": ["note"]
        }]
    }))
    .unwrap();
    resolve(&config).unwrap().entity("Widget").unwrap().clone()
}

#[derive(Default)]
pub struct Calls {
    pub sessions: AtomicUsize,
    pub fetch_many: AtomicUsize,
    pub fetch_one: AtomicUsize,
    pub inserts: AtomicUsize,
    pub updates: AtomicUsize,
    pub deletes: AtomicUsize,
    pub commits: AtomicUsize,
}

impl Calls {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(AtomicOrdering::SeqCst)
    }

    pub fn store_queries(&self) -> usize {
        [&self.fetch_many, &self.fetch_one, &self.inserts, &self.updates, &self.deletes]
            .iter()
            .map(|c| Calls::get(c))
            .sum()
    }
}

/// In-memory table keyed by `id`. Sessions work on a copy that replaces the table on commit.
#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<Vec<Value>>,
    next_id: AtomicI64,
    /// When set, every write fails with a store error after being counted.
    pub fail_writes: AtomicBool,
    pub calls: Calls,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(MemoryStore {
            next_id: AtomicI64::new(1),
            ..Default::default()
        })
    }

    pub fn seed(&self, rows: Vec<Value>) {
        let max = rows.iter().filter_map(|r| r["id"].as_i64()).max().unwrap_or(0);
        self.next_id.store(max + 1, AtomicOrdering::SeqCst);
        *self.rows.lock().unwrap() = rows;
    }

    pub fn rows(&self) -> Vec<Value> {
        self.rows.lock().unwrap().clone()
    }

    pub fn fail_writes(&self) {
        self.fail_writes.store(true, AtomicOrdering::SeqCst);
    }
}

pub struct Provider(pub Arc<MemoryStore>);

#[async_trait]
impl SessionProvider for Provider {
    async fn session(&self) -> Result<Box<dyn Session>, AppError> {
        self.0.calls.sessions.fetch_add(1, AtomicOrdering::SeqCst);
        Ok(Box::new(MemorySession {
            working: self.0.rows(),
            store: self.0.clone(),
        }))
    }
}

struct MemorySession {
    store: Arc<MemoryStore>,
    working: Vec<Value>,
}

impl MemorySession {
    fn check_write(&self) -> Result<(), AppError> {
        if self.store.fail_writes.load(AtomicOrdering::SeqCst) {
            return Err(AppError::Store("write rejected".into()));
        }
        Ok(())
    }
}

fn compare(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .unwrap_or(0.0)
            .partial_cmp(&y.as_f64().unwrap_or(0.0))
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

#[async_trait]
impl Session for MemorySession {
    async fn fetch_many(&mut self, plan: &QueryPlan) -> Result<Vec<Value>, AppError> {
        self.store.calls.fetch_many.fetch_add(1, AtomicOrdering::SeqCst);
        let mut rows: Vec<Value> = self
            .working
            .iter()
            .filter(|r| plan.filter.as_ref().map_or(true, |f| r[&f.field] == f.value))
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            let by_field = compare(&a[&plan.sort_field], &b[&plan.sort_field]);
            let by_field = if plan.sort_desc { by_field.reverse() } else { by_field };
            by_field.then_with(|| compare(&a["id"], &b["id"]))
        });
        Ok(rows
            .into_iter()
            .skip(plan.offset as usize)
            .take(plan.limit as usize)
            .collect())
    }

    async fn fetch_one(&mut self, id: &Value, _relationships: &[String]) -> Result<Option<Value>, AppError> {
        self.store.calls.fetch_one.fetch_add(1, AtomicOrdering::SeqCst);
        Ok(self.working.iter().find(|r| &r["id"] == id).cloned())
    }

    async fn insert(&mut self, values: &Map<String, Value>) -> Result<Value, AppError> {
        self.store.calls.inserts.fetch_add(1, AtomicOrdering::SeqCst);
        self.check_write()?;
        let mut row = values.clone();
        if !row.contains_key("id") {
            let id = self.store.next_id.fetch_add(1, AtomicOrdering::SeqCst);
            row.insert("id".into(), json!(id));
        }
        row.entry("note").or_insert(Value::Null);
        row.entry("created").or_insert(json!(CREATED_DEFAULT));
        let row = Value::Object(row);
        self.working.push(row.clone());
        Ok(row)
    }

    async fn update(&mut self, id: &Value, values: &Map<String, Value>) -> Result<Option<Value>, AppError> {
        self.store.calls.updates.fetch_add(1, AtomicOrdering::SeqCst);
        self.check_write()?;
        let Some(row) = self.working.iter_mut().find(|r| &r["id"] == id) else {
            return Ok(None);
        };
        if let Some(obj) = row.as_object_mut() {
            for (k, v) in values {
                obj.insert(k.clone(), v.clone());
            }
        }
        Ok(Some(row.clone()))
    }

    async fn delete_one(&mut self, id: &Value) -> Result<Option<Value>, AppError> {
        self.store.calls.deletes.fetch_add(1, AtomicOrdering::SeqCst);
        self.check_write()?;
        let pos = self.working.iter().position(|r| &r["id"] == id);
        Ok(pos.map(|i| self.working.remove(i)))
    }

    async fn delete_all(&mut self) -> Result<Vec<Value>, AppError> {
        self.store.calls.deletes.fetch_add(1, AtomicOrdering::SeqCst);
        self.check_write()?;
        Ok(std::mem::take(&mut self.working))
    }

    async fn commit(&mut self) -> Result<(), AppError> {
        self.store.calls.commits.fetch_add(1, AtomicOrdering::SeqCst);
        *self.store.rows.lock().unwrap() = self.working.clone();
        Ok(())
    }
}

/// Cache that records every call in order, e.g. `get:widget_1`, `delete_many:a,b`.
#[derive(Default)]
pub struct RecordingCache {
    entries: Mutex<HashMap<String, Value>>,
    pub log: Mutex<Vec<String>>,
}

impl RecordingCache {
    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub fn entry(&self, key: &str) -> Option<Value> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    fn record(&self, entry: String) {
        self.log.lock().unwrap().push(entry);
    }
}

#[async_trait]
impl CacheClient for RecordingCache {
    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        self.record(format!("get:{}", key));
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &Value, _ttl: Duration) -> Result<(), CacheError> {
        self.record(format!("set:{}", key));
        self.entries.lock().unwrap().insert(key.to_string(), value.clone());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.record(format!("delete:{}", key));
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }

    async fn delete_many(&self, keys: &[String]) -> Result<(), CacheError> {
        self.record(format!("delete_many:{}", keys.join(",")));
        let mut entries = self.entries.lock().unwrap();
        for k in keys {
            entries.remove(k);
        }
        Ok(())
    }
}

/// Cache whose every call fails.
pub struct FailingCache;

#[async_trait]
impl CacheClient for FailingCache {
    async fn get(&self, _key: &str) -> Result<Option<Value>, CacheError> {
        Err(CacheError::Unavailable("connection refused".into()))
    }

    async fn set(&self, _key: &str, _value: &Value, _ttl: Duration) -> Result<(), CacheError> {
        Err(CacheError::Timeout)
    }

    async fn delete(&self, _key: &str) -> Result<(), CacheError> {
        Err(CacheError::Timeout)
    }
}

/// Options with inferred schemas and delete routes, the usual starting point in tests.
pub fn inferred() -> CrudOptions {
    CrudOptions {
        infer_create: true,
        infer_update: true,
        allow_delete: true,
        environment: Some("production".into()),
        ..Default::default()
    }
}

pub fn app(store: &Arc<MemoryStore>, options: CrudOptions) -> Router {
    CrudBuilder::new(widget(), Arc::new(Provider(store.clone())))
        .options(options)
        .build(None)
        .expect("build routes")
        .router
}

pub async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>, token: Option<&str>) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(t) = token {
        req = req.header("authorization", format!("Bearer {}", t));
    }
    let req = match body {
        Some(b) => req
            .header("content-type", "application/json")
            .body(Body::from(b.to_string()))
            .unwrap(),
        None => req.body(Body::empty()).unwrap(),
    };
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}
