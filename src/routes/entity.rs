//! Route registration for one entity: collection at the prefix, items at `<prefix>/:id`.

use crate::handlers::entity::{create, delete_all, delete_one, list, read_one, update};
use crate::state::CrudState;
use axum::{
    routing::{delete, get, MethodRouter},
    Router,
};
use std::sync::Arc;

/// Normalize a prefix to `/name` form without a trailing slash ("" for the root).
pub fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}

/// Without `allow_delete` only four routes exist: list, create, read one, update.
pub fn entity_routes(state: Arc<CrudState>, prefix: &str, allow_delete: bool) -> Router {
    let base = normalize_prefix(prefix);
    let collection_path = if base.is_empty() { "/".to_string() } else { base.clone() };
    let item_path = format!("{}/:id", base);

    let mut collection: MethodRouter<Arc<CrudState>> = get(list).post(create);
    let mut item: MethodRouter<Arc<CrudState>> = get(read_one).put(update);
    if allow_delete {
        collection = collection.merge(delete(delete_all));
        item = item.merge(delete(delete_one));
    }

    Router::new()
        .route(&collection_path, collection)
        .route(&item_path, item)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixes_are_normalized() {
        assert_eq!(normalize_prefix("widget"), "/widget");
        assert_eq!(normalize_prefix("/widget/"), "/widget");
        assert_eq!(normalize_prefix("/"), "");
    }
}
