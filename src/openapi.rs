//! OpenAPI document for one synthesized entity: paths, parameters and component schemas.

use crate::auth::OperationKind;
use crate::entity::ValueType;
use crate::schema::Schema as BodySchema;
use crate::state::CrudState;
use std::collections::HashSet;
use utoipa::openapi::{
    content::ContentBuilder,
    info::InfoBuilder,
    path::{HttpMethod, Operation, OperationBuilder, ParameterBuilder, ParameterIn, PathItemBuilder, PathsBuilder},
    request_body::RequestBodyBuilder,
    response::{ResponseBuilder, ResponsesBuilder},
    schema::{Array, ComponentsBuilder, KnownFormat, ObjectBuilder, Schema, SchemaFormat, SchemaType, Type},
    security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    OpenApi, OpenApiBuilder, Ref, RefOr, Required,
};

const BEARER: &str = "bearerAuth";

fn value_schema(value_type: ValueType, nullable: bool) -> Schema {
    let (ty, format) = match value_type {
        ValueType::Integer => (Some(Type::Integer), Some(KnownFormat::Int32)),
        ValueType::BigInt => (Some(Type::Integer), Some(KnownFormat::Int64)),
        ValueType::Float => (Some(Type::Number), Some(KnownFormat::Double)),
        ValueType::Numeric => (Some(Type::String), None),
        ValueType::Text => (Some(Type::String), None),
        ValueType::Boolean => (Some(Type::Boolean), None),
        ValueType::Uuid => (Some(Type::String), Some(KnownFormat::Uuid)),
        ValueType::Timestamp => (Some(Type::String), Some(KnownFormat::DateTime)),
        ValueType::Date => (Some(Type::String), Some(KnownFormat::Date)),
        ValueType::Json => (None, None),
    };
    let schema_type = match ty {
        None => SchemaType::AnyValue,
        Some(t) if nullable => SchemaType::Array(vec![t, Type::Null]),
        Some(t) => SchemaType::Type(t),
    };
    let mut obj = ObjectBuilder::new().schema_type(schema_type);
    if let Some(f) = format {
        obj = obj.format(Some(SchemaFormat::KnownFormat(f)));
    }
    Schema::Object(obj.build())
}

fn body_component(schema: &BodySchema) -> Schema {
    let mut obj = ObjectBuilder::new().schema_type(SchemaType::Type(Type::Object));
    for f in schema.fields() {
        obj = obj.property(f.name.clone(), value_schema(f.value_type, f.nullable));
        if f.required {
            obj = obj.required(f.name.clone());
        }
    }
    Schema::Object(obj.build())
}

fn response_component(state: &CrudState, exclude: &HashSet<String>) -> Schema {
    let entity = state.entity.as_ref();
    let mut obj = ObjectBuilder::new().schema_type(SchemaType::Type(Type::Object));
    for f in entity.fields() {
        if exclude.contains(&f.name) || entity.is_sensitive(&f.name) {
            continue;
        }
        obj = obj.property(f.name.clone(), value_schema(f.value_type, f.nullable));
    }
    for r in entity.relationships() {
        let target = schema_ref(&r.target);
        let rel: RefOr<Schema> = match r.kind {
            crate::config::RelationshipKind::ToOne => target,
            crate::config::RelationshipKind::ToMany => RefOr::T(Schema::Array(Array::new(target))),
        };
        obj = obj.property(r.name.clone(), rel);
    }
    Schema::Object(obj.build())
}

fn param(name: &str, location: ParameterIn, required: bool, schema: Schema, description: &str) -> utoipa::openapi::path::Parameter {
    ParameterBuilder::new()
        .name(name)
        .parameter_in(location)
        .required(if required { Required::True } else { Required::False })
        .description(Some(description))
        .schema(Some(schema))
        .build()
}

fn schema_ref(name: &str) -> RefOr<Schema> {
    RefOr::Ref(Ref::from_schema_name(name))
}

fn json_content(schema: impl Into<RefOr<Schema>>) -> utoipa::openapi::content::Content {
    ContentBuilder::new().schema(Some(schema)).build()
}

/// Documents the routes `entity_routes` registers for this state.
pub fn entity_openapi(state: &CrudState, prefix: &str, allow_delete: bool, exclude: &HashSet<String>) -> OpenApi {
    let entity = state.entity.as_ref();
    let name = entity.name();
    let base = crate::routes::entity::normalize_prefix(prefix);
    let collection_path = if base.is_empty() { "/".to_string() } else { base.clone() };
    let item_path = format!("{}/{{id}}", base);
    let item_ref = || schema_ref(name);
    let list_schema = || Schema::Array(Array::new(item_ref()));

    let id_param = || {
        param(
            "id",
            ParameterIn::Path,
            true,
            value_schema(entity.primary_key_type(), false),
            "Primary key",
        )
    };
    let relationships_param = || {
        param(
            "relationships",
            ParameterIn::Query,
            false,
            value_schema(ValueType::Text, false),
            "Comma-separated relationship names to include",
        )
    };
    let not_found = || ResponseBuilder::new().description("No such item").build();
    let invalid = || ResponseBuilder::new().description("Validation failed").build();

    let operation = |kind: OperationKind, id: String, summary: String, description: String| {
        let mut op = OperationBuilder::new()
            .operation_id(Some(id))
            .summary(Some(summary))
            .description(Some(description))
            .tag(name);
        if let Some(requirement) = state.security.get(&kind) {
            op = op.security(utoipa::openapi::security::SecurityRequirement::new(
                BEARER,
                requirement.scopes.iter().cloned().collect::<Vec<_>>(),
            ));
        }
        op
    };
    let lower = name.to_lowercase();

    let read_all: Operation = operation(
        OperationKind::Read,
        format!("read_all_{}", lower),
        format!("Read all {} items", name),
        format!("Read all {} items", name),
    )
    .parameter(param("limit", ParameterIn::Query, false, value_schema(ValueType::BigInt, false), "Page size"))
    .parameter(param("skip", ParameterIn::Query, false, value_schema(ValueType::BigInt, false), "Rows to skip"))
    .parameter(param("sort_field", ParameterIn::Query, false, value_schema(ValueType::Text, false), "Column to sort by"))
    .parameter(param("sort_desc", ParameterIn::Query, false, value_schema(ValueType::Boolean, false), "Sort descending"))
    .parameter(param("equals_field", ParameterIn::Query, false, value_schema(ValueType::Text, false), "Column to filter on"))
    .parameter(param("equals_value", ParameterIn::Query, false, value_schema(ValueType::Text, false), "Value the column must equal"))
    .parameter(relationships_param())
    .responses(
        ResponsesBuilder::new()
            .response("200", ResponseBuilder::new().description("Items").content("application/json", json_content(list_schema())).build())
            .response("400", ResponseBuilder::new().description("equals_field and equals_value must be given together").build())
            .response("422", invalid())
            .build(),
    )
    .build();

    let create_one: Operation = operation(
        OperationKind::Create,
        format!("create_one_{}", lower),
        format!("Create one {} item", name),
        format!("Create one {} item", name),
    )
    .request_body(Some(
        RequestBodyBuilder::new()
            .content(
                "application/json",
                json_content(schema_ref(state.create_schema.name())),
            )
            .required(Some(Required::True))
            .build(),
    ))
    .responses(
        ResponsesBuilder::new()
            .response("201", ResponseBuilder::new().description("Created").content("application/json", json_content(item_ref())).build())
            .response("422", invalid())
            .build(),
    )
    .build();

    let read_one: Operation = operation(
        OperationKind::Read,
        format!("read_one_{}", lower),
        format!("Read one {} item", name),
        format!("Read one {} item by primary key", name),
    )
    .parameter(id_param())
    .parameter(relationships_param())
    .responses(
        ResponsesBuilder::new()
            .response("200", ResponseBuilder::new().description("Item").content("application/json", json_content(item_ref())).build())
            .response("404", not_found())
            .build(),
    )
    .build();

    let update_one: Operation = operation(
        OperationKind::Update,
        format!("update_one_{}", lower),
        format!("Update one {} item", name),
        format!("Update one {} item by primary key", name),
    )
    .parameter(id_param())
    .request_body(Some(
        RequestBodyBuilder::new()
            .content(
                "application/json",
                json_content(schema_ref(state.update_schema.name())),
            )
            .required(Some(Required::True))
            .build(),
    ))
    .responses(
        ResponsesBuilder::new()
            .response("200", ResponseBuilder::new().description("Updated").content("application/json", json_content(item_ref())).build())
            .response("404", not_found())
            .response("422", invalid())
            .build(),
    )
    .build();

    let mut collection = PathItemBuilder::new()
        .operation(HttpMethod::Get, read_all)
        .operation(HttpMethod::Post, create_one);
    let mut item = PathItemBuilder::new()
        .operation(HttpMethod::Get, read_one)
        .operation(HttpMethod::Put, update_one);

    if allow_delete {
        let delete_one: Operation = operation(
            OperationKind::Delete,
            format!("delete_one_{}", lower),
            format!("Delete one {} item", name),
            format!("Delete one {} item by primary key", name),
        )
        .parameter(id_param())
        .responses(
            ResponsesBuilder::new()
                .response("200", ResponseBuilder::new().description("Deleted").content("application/json", json_content(item_ref())).build())
                .response("404", not_found())
                .build(),
        )
        .build();
        let delete_all: Operation = operation(
            OperationKind::Delete,
            format!("delete_all_{}", lower),
            format!("Delete all {} items", name),
            format!("Delete all {} items", name),
        )
        .responses(
            ResponsesBuilder::new()
                .response("200", ResponseBuilder::new().description("Deleted").content("application/json", json_content(list_schema())).build())
                .build(),
        )
        .build();
        collection = collection.operation(HttpMethod::Delete, delete_all);
        item = item.operation(HttpMethod::Delete, delete_one);
    }

    let paths = PathsBuilder::new()
        .path(collection_path, collection.build())
        .path(item_path, item.build());

    let mut components = ComponentsBuilder::new()
        .schema(name, response_component(state, exclude))
        .schema(state.create_schema.name(), body_component(&state.create_schema))
        .schema(state.update_schema.name(), body_component(&state.update_schema));
    if !state.security.is_empty() {
        components = components.security_scheme(
            BEARER,
            SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
        );
    }

    OpenApiBuilder::new()
        .info(
            InfoBuilder::new()
                .title(env!("CARGO_PKG_NAME"))
                .version(env!("CARGO_PKG_VERSION"))
                .build(),
        )
        .paths(paths.build())
        .components(Some(components.build()))
        .build()
}
