//! Store sessions: one unit of work per request, acquired lazily and released on drop.

mod postgres;

pub use postgres::{PgSession, PgSessionProvider};

use crate::error::AppError;
use crate::query::QueryPlan;
use async_trait::async_trait;
use serde_json::{Map, Value};

/// A unit of work against the backing store for one entity.
///
/// Dropping a session without [`Session::commit`] discards its writes and releases it,
/// so every exit path of a handler releases the session exactly once.
#[async_trait]
pub trait Session: Send {
    /// Rows after filter, sort and pagination, with requested relationships loaded.
    async fn fetch_many(&mut self, plan: &QueryPlan) -> Result<Vec<Value>, AppError>;

    async fn fetch_one(&mut self, id: &Value, relationships: &[String]) -> Result<Option<Value>, AppError>;

    /// Insert and return the stored row, including generated values.
    async fn insert(&mut self, values: &Map<String, Value>) -> Result<Value, AppError>;

    /// Apply the present fields. None when no row has the id.
    async fn update(&mut self, id: &Value, values: &Map<String, Value>) -> Result<Option<Value>, AppError>;

    async fn delete_one(&mut self, id: &Value) -> Result<Option<Value>, AppError>;

    /// Remove every row and return what was removed.
    async fn delete_all(&mut self) -> Result<Vec<Value>, AppError>;

    async fn commit(&mut self) -> Result<(), AppError>;
}

/// Hands out sessions. Shared by every route of one entity.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn session(&self) -> Result<Box<dyn Session>, AppError>;

    /// Readiness probe for the backing store.
    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
}
