//! Builds parameterized SELECT, INSERT, UPDATE, DELETE from a resolved entity.

use crate::config::{RelationshipKind, ResolvedEntity};
use crate::entity::EntityMetadata;
use crate::query::QueryPlan;
use crate::sql::BindValue;
use serde_json::{Map, Value};

const MAIN_ALIAS: &str = "main";

/// One eager include: related rows joined through a scalar subquery of the main statement.
pub struct IncludeSelect<'a> {
    pub name: &'a str,
    pub kind: RelationshipKind,
    pub related: &'a ResolvedEntity,
    pub local_column: &'a str,
    pub remote_column: &'a str,
}

/// Quote identifier for PostgreSQL (safe: only from config).
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

fn qualified_table(entity: &ResolvedEntity) -> String {
    format!("{}.{}", quoted(&entity.schema_name), quoted(&entity.table_name))
}

/// Type usable in a cast: serial pseudo-types become their integer type.
fn cast_type(pg_type: &str) -> &str {
    match pg_type.to_lowercase().as_str() {
        "serial" => "integer",
        "bigserial" => "bigint",
        "smallserial" => "smallint",
        _ => pg_type,
    }
}

#[derive(Debug, Default)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<BindValue>,
}

impl QueryBuf {
    /// Push a value for `column` and return its cast placeholder, e.g. `$2::timestamptz`.
    fn push_param(&mut self, entity: &ResolvedEntity, column: &str, v: &Value) -> String {
        let value_type = entity
            .field(column)
            .map(|f| f.value_type)
            .unwrap_or(crate::entity::ValueType::Text);
        self.params.push(BindValue::for_column(v, value_type));
        let n = self.params.len();
        match entity.pg_type(column) {
            Some(t) => format!("${}::{}", n, cast_type(t)),
            None => format!("${}", n),
        }
    }
}

/// Column expression; enums (schema.type) and numeric are read as text so they decode as strings.
fn column_expr(entity: &ResolvedEntity, alias: Option<&str>, column: &str) -> String {
    let col = match alias {
        Some(a) => format!("{}.{}", a, quoted(column)),
        None => quoted(column),
    };
    let pg_type = entity.pg_type(column).unwrap_or("");
    if pg_type.contains('.') || pg_type.starts_with("numeric") || pg_type.starts_with("decimal") {
        format!("{}::text AS {}", col, quoted(column))
    } else if alias.is_some() {
        format!("{} AS {}", col, quoted(column))
    } else {
        col
    }
}

fn select_columns(entity: &ResolvedEntity, alias: Option<&str>) -> String {
    entity
        .fields
        .iter()
        .map(|f| column_expr(entity, alias, &f.name))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Main columns plus one json subquery per include (json_agg for to_many, row_to_json for to_one).
fn select_with_includes(entity: &ResolvedEntity, includes: &[IncludeSelect<'_>]) -> String {
    let mut parts = vec![select_columns(entity, Some(MAIN_ALIAS))];
    for inc in includes {
        let sub_from = format!(
            "{} WHERE {} = {}.{}",
            qualified_table(inc.related),
            quoted(inc.remote_column),
            MAIN_ALIAS,
            quoted(inc.local_column)
        );
        let rel_cols = select_columns(inc.related, None);
        let subquery = match inc.kind {
            RelationshipKind::ToOne => format!(
                "(SELECT row_to_json(sub) FROM (SELECT {} FROM {} LIMIT 1) sub)",
                rel_cols, sub_from
            ),
            RelationshipKind::ToMany => format!(
                "(SELECT COALESCE(json_agg(row_to_json(sub)), '[]'::json) FROM (SELECT {} FROM {}) sub)",
                rel_cols, sub_from
            ),
        };
        parts.push(format!("{} AS {}", subquery, quoted(inc.name)));
    }
    parts.join(", ")
}

/// SELECT a page: WHERE equality filter, ORDER BY sort field (primary key breaks ties), LIMIT/OFFSET.
pub fn select_list(entity: &ResolvedEntity, plan: &QueryPlan, includes: &[IncludeSelect<'_>]) -> QueryBuf {
    let mut q = QueryBuf::default();
    let pk = entity.primary_key_name();
    let where_clause = match &plan.filter {
        Some(f) => {
            let ph = q.push_param(entity, &f.field, &f.value);
            format!(" WHERE {}.{} = {}", MAIN_ALIAS, quoted(&f.field), ph)
        }
        None => String::new(),
    };
    let direction = if plan.sort_desc { "DESC" } else { "ASC" };
    let mut order_clause = format!(" ORDER BY {}.{} {}", MAIN_ALIAS, quoted(&plan.sort_field), direction);
    if plan.sort_field != pk {
        order_clause.push_str(&format!(", {}.{} ASC", MAIN_ALIAS, quoted(pk)));
    }
    q.sql = format!(
        "SELECT {} FROM {} {}{}{} LIMIT {} OFFSET {}",
        select_with_includes(entity, includes),
        qualified_table(entity),
        MAIN_ALIAS,
        where_clause,
        order_clause,
        plan.limit,
        plan.offset
    );
    q
}

/// SELECT one row by primary key.
pub fn select_by_id(entity: &ResolvedEntity, id: &Value, includes: &[IncludeSelect<'_>]) -> QueryBuf {
    let mut q = QueryBuf::default();
    let pk = entity.primary_key_name();
    let ph = q.push_param(entity, pk, id);
    q.sql = format!(
        "SELECT {} FROM {} {} WHERE {}.{} = {}",
        select_with_includes(entity, includes),
        qualified_table(entity),
        MAIN_ALIAS,
        MAIN_ALIAS,
        quoted(pk),
        ph
    );
    q
}

/// INSERT the given columns only; absent columns fall back to the store's default.
pub fn insert(entity: &ResolvedEntity, values: &Map<String, Value>) -> QueryBuf {
    let mut q = QueryBuf::default();
    let table = qualified_table(entity);
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for f in &entity.fields {
        if let Some(v) = values.get(&f.name) {
            placeholders.push(q.push_param(entity, &f.name, v));
            cols.push(quoted(&f.name));
        }
    }
    let returning = select_columns(entity, None);
    q.sql = if cols.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES RETURNING {}", table, returning)
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
            table,
            cols.join(", "),
            placeholders.join(", "),
            returning
        )
    };
    q
}

/// UPDATE by id: SET only entity columns present in values. With nothing to set, selects the row.
pub fn update(entity: &ResolvedEntity, id: &Value, values: &Map<String, Value>) -> QueryBuf {
    let mut q = QueryBuf::default();
    let table = qualified_table(entity);
    let pk = entity.primary_key_name();
    let mut sets = Vec::new();
    for f in &entity.fields {
        if f.name == pk {
            continue;
        }
        if let Some(v) = values.get(&f.name) {
            let ph = q.push_param(entity, &f.name, v);
            sets.push(format!("{} = {}", quoted(&f.name), ph));
        }
    }
    if sets.is_empty() {
        return select_by_id(entity, id, &[]);
    }
    let id_ph = q.push_param(entity, pk, id);
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = {} RETURNING {}",
        table,
        sets.join(", "),
        quoted(pk),
        id_ph,
        select_columns(entity, None)
    );
    q
}

/// DELETE by id, returning the removed row.
pub fn delete_by_id(entity: &ResolvedEntity, id: &Value) -> QueryBuf {
    let mut q = QueryBuf::default();
    let pk = entity.primary_key_name();
    let ph = q.push_param(entity, pk, id);
    q.sql = format!(
        "DELETE FROM {} WHERE {} = {} RETURNING {}",
        qualified_table(entity),
        quoted(pk),
        ph,
        select_columns(entity, None)
    );
    q
}

/// DELETE every row, returning the removed rows.
pub fn delete_all(entity: &ResolvedEntity) -> QueryBuf {
    QueryBuf {
        sql: format!(
            "DELETE FROM {} RETURNING {}",
            qualified_table(entity),
            select_columns(entity, None)
        ),
        params: Vec::new(),
    }
}
