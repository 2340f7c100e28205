//! Request-body schemas for create and update, explicit or inferred from entity metadata.

mod rules;

use crate::config::ValidationRule;
use crate::entity::{EntityMetadata, ValueType};
use crate::error::{AppError, ConfigError};
use serde_json::{Map, Value};
use std::collections::HashSet;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchemaKind {
    Create,
    Update,
}

impl SchemaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaKind::Create => "create",
            SchemaKind::Update => "update",
        }
    }
}

#[derive(Clone, Debug)]
pub struct SchemaField {
    pub name: String,
    pub value_type: ValueType,
    pub required: bool,
    pub nullable: bool,
    pub rule: Option<ValidationRule>,
}

impl SchemaField {
    pub fn required(name: impl Into<String>, value_type: ValueType) -> Self {
        SchemaField {
            name: name.into(),
            value_type,
            required: true,
            nullable: false,
            rule: None,
        }
    }

    pub fn optional(name: impl Into<String>, value_type: ValueType) -> Self {
        SchemaField {
            required: false,
            ..Self::required(name, value_type)
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn with_rule(mut self, rule: ValidationRule) -> Self {
        self.rule = Some(rule);
        self
    }
}

/// Shape of an acceptable request body. Fields not listed are rejected.
#[derive(Clone, Debug)]
pub struct Schema {
    name: String,
    fields: Vec<SchemaField>,
}

impl Schema {
    pub fn new(name: impl Into<String>) -> Self {
        Schema {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, field: SchemaField) -> Self {
        self.fields.retain(|f| f.name != field.name);
        self.fields.push(field);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[SchemaField] {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<&SchemaField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn field_names(&self) -> HashSet<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// Mirror the entity's columns. Create drops the primary key (store-generated) and requires
    /// columns that are neither nullable nor defaulted; update makes every non-key column optional.
    pub fn infer(entity: &dyn EntityMetadata, kind: SchemaKind, exclude: &HashSet<String>) -> Self {
        let suffix = match kind {
            SchemaKind::Create => "Create",
            SchemaKind::Update => "Update",
        };
        let pk = entity.primary_key_name();
        let mut schema = Schema::new(format!("{}{}", entity.name(), suffix));
        for f in entity.fields() {
            if f.name == pk || exclude.contains(&f.name) {
                continue;
            }
            let rule = entity.validation_rule(&f.name);
            let required = kind == SchemaKind::Create
                && (rule.and_then(|r| r.required).unwrap_or(false) || (!f.nullable && !f.has_default));
            schema.fields.push(SchemaField {
                name: f.name.clone(),
                value_type: f.value_type,
                required,
                nullable: f.nullable,
                rule: rule.cloned(),
            });
        }
        schema
    }

    /// Check a full body: unknown fields, required fields, types and rules.
    pub fn validate(&self, body: &Map<String, Value>) -> Result<(), AppError> {
        self.reject_unknown(body)?;
        for f in &self.fields {
            match body.get(&f.name) {
                None if f.required => {
                    return Err(AppError::Validation(format!("{} is required", f.name)));
                }
                None => {}
                Some(v) => check_field(f, v)?,
            }
        }
        Ok(())
    }

    /// Check only the fields present in body; required is not enforced for missing fields.
    pub fn validate_partial(&self, body: &Map<String, Value>) -> Result<(), AppError> {
        self.reject_unknown(body)?;
        for (k, v) in body {
            if let Some(f) = self.get(k) {
                check_field(f, v)?;
            }
        }
        Ok(())
    }

    fn reject_unknown(&self, body: &Map<String, Value>) -> Result<(), AppError> {
        let known = self.field_names();
        let mut unknown: Vec<&str> = body.keys().map(String::as_str).filter(|k| !known.contains(k)).collect();
        if unknown.is_empty() {
            return Ok(());
        }
        unknown.sort_unstable();
        Err(AppError::Validation(format!("unknown field(s): {}", unknown.join(", "))))
    }
}

fn check_field(f: &SchemaField, v: &Value) -> Result<(), AppError> {
    if v.is_null() {
        if f.nullable {
            return Ok(());
        }
        return Err(AppError::Validation(format!("{} must not be null", f.name)));
    }
    if !f.value_type.accepts(v) {
        return Err(AppError::Validation(format!(
            "{} must be a {}",
            f.name,
            f.value_type.label()
        )));
    }
    if let Some(rule) = &f.rule {
        rules::check_rule(&f.name, v, rule)?;
    }
    Ok(())
}

/// Pick the schema for one operation: an explicit schema wins; otherwise infer when allowed.
pub fn resolve(
    entity: &dyn EntityMetadata,
    explicit: Option<Schema>,
    infer: bool,
    kind: SchemaKind,
    exclude: &HashSet<String>,
) -> Result<Schema, ConfigError> {
    match (explicit, infer) {
        (Some(schema), _) => Ok(schema),
        (None, true) => Ok(Schema::infer(entity, kind, exclude)),
        (None, false) => Err(ConfigError::MissingSchema {
            entity: entity.name().to_string(),
            operation: kind.as_str(),
        }),
    }
}
