//! Resolved entity model: config validated and flattened for runtime use.

use crate::config::{RelationshipKind, ValidationRule};
use crate::entity::{EntityMetadata, FieldDescriptor, RelationshipDescriptor};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Join keys for one relationship, used by the SQL adapter.
#[derive(Clone, Debug)]
pub struct JoinSpec {
    pub name: String,
    pub kind: RelationshipKind,
    pub target: String,
    /// Our column used in the join (our FK for to_one; our key for to_many).
    pub local_column: String,
    /// Their column used in the join (their key for to_one; their FK for to_many).
    pub remote_column: String,
}

#[derive(Clone, Debug)]
pub struct ResolvedEntity {
    pub name: String,
    pub schema_name: String,
    pub table_name: String,
    pub path_segment: String,
    /// Index of the primary key in `fields`.
    pub pk_index: usize,
    pub fields: Vec<FieldDescriptor>,
    /// PostgreSQL type per column for SQL casts (e.g. "timestamptz").
    pub pg_types: HashMap<String, String>,
    pub relationships: Vec<RelationshipDescriptor>,
    pub joins: Vec<JoinSpec>,
    /// Column names to strip from all API responses.
    pub sensitive_columns: HashSet<String>,
    pub validation: HashMap<String, ValidationRule>,
}

impl ResolvedEntity {
    pub fn pg_type(&self, column: &str) -> Option<&str> {
        self.pg_types.get(column).map(String::as_str)
    }

    pub fn join(&self, name: &str) -> Option<&JoinSpec> {
        self.joins.iter().find(|j| j.name == name)
    }
}

impl EntityMetadata for ResolvedEntity {
    fn name(&self) -> &str {
        &self.name
    }

    fn path_segment(&self) -> &str {
        &self.path_segment
    }

    fn primary_key(&self) -> &FieldDescriptor {
        &self.fields[self.pk_index]
    }

    fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    fn relationships(&self) -> &[RelationshipDescriptor] {
        &self.relationships
    }

    fn validation_rule(&self, column: &str) -> Option<&ValidationRule> {
        self.validation.get(column)
    }

    fn is_sensitive(&self, column: &str) -> bool {
        self.sensitive_columns.contains(column)
    }
}

#[derive(Clone, Debug, Default)]
pub struct ResolvedModel {
    pub entities: Vec<Arc<ResolvedEntity>>,
    pub entity_by_name: HashMap<String, Arc<ResolvedEntity>>,
}

impl ResolvedModel {
    pub fn entity(&self, name: &str) -> Option<&Arc<ResolvedEntity>> {
        self.entity_by_name.get(name)
    }
}
