//! Cache client seam and the best-effort wrapper handlers use.

mod memory;

pub use memory::MemoryCache;

use crate::error::CacheError;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// External cache. Implementations own storage, eviction and consistency.
#[async_trait]
pub trait CacheClient: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError>;

    async fn set(&self, key: &str, value: &Value, ttl: Duration) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    async fn delete_many(&self, keys: &[String]) -> Result<(), CacheError> {
        for key in keys {
            self.delete(key).await?;
        }
        Ok(())
    }
}

/// Key scheme for one entity: `<name>_<pk>` per item, `<name>_all` for the collection.
/// Outside production every key gets an `_<environment>` suffix.
#[derive(Clone, Debug)]
pub struct CacheKeys {
    item_base: String,
    collection: String,
    suffix: Option<String>,
}

impl CacheKeys {
    pub fn new(entity_name: &str, environment: &str) -> Self {
        let suffix = (!environment.eq_ignore_ascii_case(crate::config::settings::PRODUCTION)).then(|| environment.to_string());
        let item_base = entity_name.to_lowercase();
        CacheKeys {
            collection: format!("{}_all", item_base),
            item_base,
            suffix,
        }
    }

    fn finish(&self, key: String) -> String {
        match &self.suffix {
            Some(env) => format!("{}_{}", key, env),
            None => key,
        }
    }

    pub fn item(&self, id: &Value) -> String {
        let id = match id {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        self.finish(format!("{}_{}", self.item_base, id))
    }

    pub fn collection(&self) -> String {
        self.finish(self.collection.clone())
    }
}

/// Cache handle as seen by handlers: failures are logged and become misses or no-ops.
#[derive(Clone)]
pub struct Cache {
    client: Arc<dyn CacheClient>,
    keys: CacheKeys,
    ttl: Duration,
}

impl Cache {
    pub fn new(client: Arc<dyn CacheClient>, keys: CacheKeys, ttl: Duration) -> Self {
        Cache { client, keys, ttl }
    }

    pub fn keys(&self) -> &CacheKeys {
        &self.keys
    }

    pub async fn get(&self, key: &str) -> Option<Value> {
        match self.client.get(key).await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "cache read failed; treating as miss");
                None
            }
        }
    }

    pub async fn set(&self, key: &str, value: &Value) {
        if let Err(e) = self.client.set(key, value, self.ttl).await {
            tracing::warn!(key = %key, error = %e, "cache write failed");
        }
    }

    pub async fn delete(&self, key: &str) {
        if let Err(e) = self.client.delete(key).await {
            tracing::warn!(key = %key, error = %e, "cache invalidation failed");
        }
    }

    pub async fn delete_many(&self, keys: &[String]) {
        if let Err(e) = self.client.delete_many(keys).await {
            tracing::warn!(keys = ?keys, error = %e, "cache invalidation failed");
        }
    }
}
