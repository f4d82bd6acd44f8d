//! SQL construction for the PostgreSQL backend.
//!
//! SELECT statements go through `sea_query` (ordering, limit/offset and
//! identifier quoting in one place); DML statements are short enough that
//! building the `$n` strings directly is clearer. Filter fragments arrive
//! here already rewritten to `$n` placeholders and are spliced in with
//! `Expr::cust`.

use crate::constraints::{QueryConstraints, SortOrder};
use crate::schema::{EntitySchema, Property, ScalarType};
use crate::value::Value;
use may_postgres::Row;
use sea_query::{Expr, Iden, Order, PostgresQueryBuilder, SelectStatement};

struct Name(String);

impl Iden for Name {
    fn unquoted(&self) -> &str {
        &self.0
    }
}

fn name(s: &str) -> Name {
    Name(s.to_string())
}

/// SELECT of the entity's column set, with optional filter, sorting and
/// paging from the constraints.
pub(crate) fn build_select(
    entity: &EntitySchema,
    where_clause: Option<&str>,
    constraints: &QueryConstraints,
) -> String {
    let mut query = SelectStatement::default();
    for column in entity.columns() {
        query.column(name(column.name()));
    }
    query.from(name(entity.table()));
    if let Some(clause) = where_clause {
        query.cond_where(Expr::cust(clause));
    }
    if let Some(property) = constraints.sort_property() {
        let order = match constraints.sort_order() {
            SortOrder::Descending => Order::Desc,
            _ => Order::Asc,
        };
        query.order_by(name(property), order);
    }
    if constraints.page_size() > 0 {
        let size = u64::from(constraints.page_size());
        query.limit(size);
        query.offset(u64::from(constraints.page_number() - 1) * size);
    }
    query.to_string(PostgresQueryBuilder)
}

/// `SELECT COUNT(*)` sharing the find's filter, for the unpaged total.
pub(crate) fn build_count(entity: &EntitySchema, where_clause: Option<&str>) -> String {
    let mut query = SelectStatement::default();
    query.expr(Expr::cust("COUNT(*)")).from(name(entity.table()));
    if let Some(clause) = where_clause {
        query.cond_where(Expr::cust(clause));
    }
    query.to_string(PostgresQueryBuilder)
}

/// Select-in child load: the child entity's columns where its foreign key is
/// in the parents' id list.
///
/// The id literals come from database output of the parent query, rendered
/// through [`Value::to_sql_literal`]; user input never reaches this path.
pub(crate) fn build_children_select(
    child: &EntitySchema,
    foreign_key: &str,
    ids: &[Value],
) -> String {
    let list: Vec<String> = ids.iter().map(Value::to_sql_literal).collect();
    let mut query = SelectStatement::default();
    for column in child.columns() {
        query.column(name(column.name()));
    }
    query.from(name(child.table()));
    query.cond_where(Expr::cust(format!(
        "\"{foreign_key}\" IN ({})",
        list.join(", ")
    )));
    query.to_string(PostgresQueryBuilder)
}

/// `INSERT` with one `$n` group per entity.
pub(crate) fn build_insert(entity: &EntitySchema, row_count: usize) -> String {
    let columns: Vec<String> = entity
        .columns()
        .map(|c| format!("\"{}\"", c.name()))
        .collect();
    let width = columns.len();
    let groups: Vec<String> = (0..row_count)
        .map(|row| {
            let placeholders: Vec<String> =
                (1..=width).map(|i| format!("${}", row * width + i)).collect();
            format!("({})", placeholders.join(", "))
        })
        .collect();
    format!(
        "INSERT INTO \"{}\" ({}) VALUES {}",
        entity.table(),
        columns.join(", "),
        groups.join(", ")
    )
}

/// `UPDATE ... SET` over the non-id columns, keyed by id as the last
/// placeholder.
pub(crate) fn build_update(entity: &EntitySchema, id_property: &str) -> String {
    let assignments: Vec<String> = entity
        .columns()
        .filter(|c| !c.name().eq_ignore_ascii_case(id_property))
        .enumerate()
        .map(|(i, c)| format!("\"{}\" = ${}", c.name(), i + 1))
        .collect();
    format!(
        "UPDATE \"{}\" SET {} WHERE \"{}\" = ${}",
        entity.table(),
        assignments.join(", "),
        id_property,
        assignments.len() + 1
    )
}

pub(crate) fn build_delete(entity: &EntitySchema, id_property: &str, id_count: usize) -> String {
    let placeholders: Vec<String> = (1..=id_count).map(|i| format!("${i}")).collect();
    format!(
        "DELETE FROM \"{}\" WHERE \"{}\" IN ({})",
        entity.table(),
        id_property,
        placeholders.join(", ")
    )
}

/// Decode a row into a JSON object keyed by canonical property names.
///
/// Columns are read positionally in declaration order, typed by each
/// property's [`ScalarType`]. NULLs become JSON null regardless of type.
pub(crate) fn row_to_json(
    entity: &EntitySchema,
    row: &Row,
) -> Result<serde_json::Value, may_postgres::Error> {
    let mut map = serde_json::Map::new();
    for (index, column) in entity.columns().enumerate() {
        let value = column_to_json(column, index, row)?;
        map.insert(column.name().to_string(), value);
    }
    Ok(serde_json::Value::Object(map))
}

fn column_to_json(
    column: &Property,
    index: usize,
    row: &Row,
) -> Result<serde_json::Value, may_postgres::Error> {
    use crate::schema::PropertyKind;
    let PropertyKind::Scalar(scalar_type) = column.kind() else {
        return Ok(serde_json::Value::Null);
    };
    let value = match scalar_type {
        ScalarType::Bool => row
            .try_get::<_, Option<bool>>(index)?
            .map_or(serde_json::Value::Null, serde_json::Value::Bool),
        ScalarType::Int32 => row
            .try_get::<_, Option<i32>>(index)?
            .map_or(serde_json::Value::Null, |v| serde_json::Value::from(v)),
        ScalarType::Int64 => row
            .try_get::<_, Option<i64>>(index)?
            .map_or(serde_json::Value::Null, |v| serde_json::Value::from(v)),
        ScalarType::Float64 => row
            .try_get::<_, Option<f64>>(index)?
            .and_then(serde_json::Number::from_f64)
            .map_or(serde_json::Value::Null, serde_json::Value::Number),
        ScalarType::Text => row
            .try_get::<_, Option<String>>(index)?
            .map_or(serde_json::Value::Null, serde_json::Value::String),
        ScalarType::Uuid => row
            .try_get::<_, Option<uuid::Uuid>>(index)?
            .map_or(serde_json::Value::Null, |v| {
                serde_json::Value::String(v.to_string())
            }),
        ScalarType::DateTime => row
            .try_get::<_, Option<chrono::DateTime<chrono::Utc>>>(index)?
            .map_or(serde_json::Value::Null, |v| {
                serde_json::Value::String(v.to_rfc3339())
            }),
        ScalarType::Json => row
            .try_get::<_, Option<serde_json::Value>>(index)?
            .unwrap_or(serde_json::Value::Null),
    };
    Ok(value)
}
