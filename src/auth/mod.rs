//! Authorization seam: a requirement per operation kind, checked before any store or cache access.

mod static_token;

pub use static_token::StaticTokenAuthorizer;

use crate::error::AppError;
use async_trait::async_trait;
use axum::http::HeaderMap;
use std::collections::BTreeSet;

/// Operation groups that share one security requirement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperationKind {
    /// list and get-one
    Read,
    Create,
    Update,
    /// delete-one and delete-all
    Delete,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Read => "read",
            OperationKind::Create => "create",
            OperationKind::Update => "update",
            OperationKind::Delete => "delete",
        }
    }
}

/// Scopes a caller must hold. An empty set only requires an authenticated caller.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SecurityRequirement {
    pub scopes: BTreeSet<String>,
}

impl SecurityRequirement {
    pub fn authenticated() -> Self {
        Self::default()
    }

    pub fn scopes<I, S>(scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        SecurityRequirement {
            scopes: scopes.into_iter().map(Into::into).collect(),
        }
    }
}

/// Verifies request credentials against a requirement.
/// Fails with [`AppError::Unauthorized`] or [`AppError::Forbidden`].
#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn authorize(&self, headers: &HeaderMap, requirement: &SecurityRequirement) -> Result<(), AppError>;
}

/// Token from `Authorization: Bearer <token>`, if present.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}
