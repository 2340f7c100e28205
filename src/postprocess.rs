//! Response post-processors: per-entity transforms composed once at build time.

use crate::entity::EntityMetadata;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

/// A transform bound to one entity.
pub type ResultTransform = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// Produces the transform for an entity. Called once per entity when routes are built.
pub trait PostProcessor: Send + Sync {
    fn transform(&self, entity: &dyn EntityMetadata) -> ResultTransform;
}

/// Ordered transforms. `apply` folds left to right: with [p1, p2] the result is p2(p1(raw)).
#[derive(Clone, Default)]
pub struct PostProcessChain {
    transforms: Vec<ResultTransform>,
}

impl PostProcessChain {
    pub fn build(entity: &dyn EntityMetadata, processors: &[Arc<dyn PostProcessor>]) -> Self {
        PostProcessChain {
            transforms: processors.iter().map(|p| p.transform(entity)).collect(),
        }
    }

    pub fn apply(&self, item: Value) -> Value {
        self.transforms.iter().fold(item, |acc, t| t(acc))
    }

    pub fn apply_all(&self, items: Vec<Value>) -> Vec<Value> {
        items.into_iter().map(|v| self.apply(v)).collect()
    }
}

/// Drops the named keys plus every column the entity marks sensitive.
#[derive(Clone, Debug, Default)]
pub struct ExcludeFields {
    pub fields: HashSet<String>,
}

impl ExcludeFields {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ExcludeFields {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }
}

impl PostProcessor for ExcludeFields {
    fn transform(&self, entity: &dyn EntityMetadata) -> ResultTransform {
        let mut drop: HashSet<String> = self.fields.clone();
        drop.extend(
            entity
                .fields()
                .iter()
                .filter(|f| entity.is_sensitive(&f.name))
                .map(|f| f.name.clone()),
        );
        Arc::new(move |mut v: Value| {
            if let Some(obj) = v.as_object_mut() {
                obj.retain(|k, _| !drop.contains(k));
            }
            v
        })
    }
}

/// Renames keys to camelCase, nested includes too.
#[derive(Clone, Copy, Debug, Default)]
pub struct CamelCaseKeys;

impl PostProcessor for CamelCaseKeys {
    fn transform(&self, _entity: &dyn EntityMetadata) -> ResultTransform {
        Arc::new(crate::case::keys_to_camel_case)
    }
}

/// Post-processor from a closure over the entity.
pub struct FnProcessor<F>(F);

impl<F> PostProcessor for FnProcessor<F>
where
    F: Fn(&dyn EntityMetadata) -> ResultTransform + Send + Sync,
{
    fn transform(&self, entity: &dyn EntityMetadata) -> ResultTransform {
        (self.0)(entity)
    }
}

pub fn from_fn<F>(f: F) -> FnProcessor<F>
where
    F: Fn(&dyn EntityMetadata) -> ResultTransform + Send + Sync,
{
    FnProcessor(f)
}
