use super::{bearer_token, Authorizer, SecurityRequirement};
use crate::error::AppError;
use async_trait::async_trait;
use axum::http::HeaderMap;
use std::collections::{BTreeSet, HashMap};

/// Fixed bearer tokens, each granting a set of scopes.
#[derive(Clone, Debug, Default)]
pub struct StaticTokenAuthorizer {
    tokens: HashMap<String, BTreeSet<String>>,
}

impl StaticTokenAuthorizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token<I, S>(mut self, token: impl Into<String>, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tokens
            .insert(token.into(), scopes.into_iter().map(Into::into).collect());
        self
    }
}

#[async_trait]
impl Authorizer for StaticTokenAuthorizer {
    async fn authorize(&self, headers: &HeaderMap, requirement: &SecurityRequirement) -> Result<(), AppError> {
        let token = bearer_token(headers)
            .ok_or_else(|| AppError::Unauthorized("missing bearer token".into()))?;
        let granted = self
            .tokens
            .get(token)
            .ok_or_else(|| AppError::Unauthorized("unknown token".into()))?;
        match requirement.scopes.iter().find(|s| !granted.contains(*s)) {
            Some(missing) => Err(AppError::Forbidden(format!("missing scope: {}", missing))),
            None => Ok(()),
        }
    }
}
