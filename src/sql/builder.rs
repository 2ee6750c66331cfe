//! Builds parameterized INSERT, SELECT, UPDATE, DELETE and DDL from an entity schema.
//! Identifiers only ever come from static schemas; values are always bound as `?N` parameters.

use crate::model::{Column, EntitySchema};
use crate::service::{Filter, Op, Operand, OrderBy};
use crate::sql::BindValue;

/// Quote identifier for SQLite (safe: only from static schemas).
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

#[derive(Debug, Default)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<BindValue>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf::default()
    }

    fn push_param(&mut self, v: BindValue) -> String {
        self.params.push(v);
        format!("?{}", self.params.len())
    }
}

fn select_column_list(schema: &EntitySchema) -> String {
    schema
        .column_names()
        .map(quoted)
        .collect::<Vec<_>>()
        .join(", ")
}

fn filter_sql(q: &mut QueryBuf, f: &Filter) -> String {
    let col = quoted(f.column.name);
    let binary = |op: &str, q: &mut QueryBuf| match &f.operand {
        Operand::One(BindValue::Null) | Operand::None => None,
        Operand::One(v) => Some(format!("{} {} {}", col, op, q.push_param(v.clone()))),
        Operand::Many(_) => None,
    };
    let expr = match f.op {
        Op::Eq => Some(binary("=", q).unwrap_or_else(|| format!("{} IS NULL", col))),
        Op::Neq => Some(binary("!=", q).unwrap_or_else(|| format!("{} IS NOT NULL", col))),
        Op::Lt => binary("<", q),
        Op::Le => binary("<=", q),
        Op::Gt => binary(">", q),
        Op::Ge => binary(">=", q),
        Op::Like => binary("LIKE", q),
        Op::IsNull => Some(format!("{} IS NULL", col)),
        Op::IsNotNull => Some(format!("{} IS NOT NULL", col)),
        Op::In | Op::NotIn => {
            let values = match &f.operand {
                Operand::Many(v) => v.as_slice(),
                _ => &[],
            };
            let negate = f.op == Op::NotIn;
            if values.is_empty() {
                Some(if negate { "1 = 1".into() } else { "1 = 0".into() })
            } else {
                let placeholders: Vec<String> =
                    values.iter().map(|v| q.push_param(v.clone())).collect();
                let keyword = if negate { "NOT IN" } else { "IN" };
                Some(format!("{} {} ({})", col, keyword, placeholders.join(", ")))
            }
        }
    };
    // Ordering comparisons against NULL match nothing, as in SQL.
    expr.unwrap_or_else(|| "1 = 0".into())
}

fn where_clause(q: &mut QueryBuf, filters: &[Filter]) -> String {
    let parts: Vec<String> = filters.iter().map(|f| filter_sql(q, f)).collect();
    if parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", parts.join(" AND "))
    }
}

fn order_clause(schema: &EntitySchema, order_by: &[OrderBy]) -> String {
    let pk = schema.primary_key().name;
    let mut parts: Vec<String> = order_by
        .iter()
        .map(|o| format!("{} {}", quoted(o.column.name), if o.descending { "DESC" } else { "ASC" }))
        .collect();
    if !order_by.iter().any(|o| o.column.name == pk) {
        parts.push(format!("{} ASC", quoted(pk)));
    }
    format!(" ORDER BY {}", parts.join(", "))
}

/// SELECT by primary key.
pub fn select_by_id(schema: &EntitySchema, id: i64) -> QueryBuf {
    let mut q = QueryBuf::new();
    let pk = schema.primary_key().name;
    let ph = q.push_param(BindValue::Int(id));
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} = {}",
        select_column_list(schema),
        quoted(schema.table),
        quoted(pk),
        ph
    );
    q
}

/// SELECT COUNT(*) over the filtered set.
pub fn count(schema: &EntitySchema, filters: &[Filter]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let where_sql = where_clause(&mut q, filters);
    q.sql = format!("SELECT COUNT(*) FROM {}{}", quoted(schema.table), where_sql);
    q
}

/// SELECT MAX(column) over the filtered set.
pub fn max_of(schema: &EntitySchema, column: &Column, filters: &[Filter]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let where_sql = where_clause(&mut q, filters);
    q.sql = format!(
        "SELECT MAX({}) FROM {}{}",
        quoted(column.name),
        quoted(schema.table),
        where_sql
    );
    q
}

/// SELECT one page of the filtered set, ordered by `order_by` then primary key.
pub fn select_page(
    schema: &EntitySchema,
    filters: &[Filter],
    order_by: &[OrderBy],
    limit: u32,
    offset: u64,
) -> QueryBuf {
    let mut q = QueryBuf::new();
    let where_sql = where_clause(&mut q, filters);
    q.sql = format!(
        "SELECT {} FROM {}{}{} LIMIT {} OFFSET {}",
        select_column_list(schema),
        quoted(schema.table),
        where_sql,
        order_clause(schema, order_by),
        limit,
        offset
    );
    q
}

/// INSERT the given column values, returning the stored row.
pub fn insert(schema: &EntitySchema, values: &[(&Column, BindValue)]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let cols: Vec<String> = values.iter().map(|(c, _)| quoted(c.name)).collect();
    let placeholders: Vec<String> = values.iter().map(|(_, v)| q.push_param(v.clone())).collect();
    q.sql = if cols.is_empty() {
        format!(
            "INSERT INTO {} DEFAULT VALUES RETURNING {}",
            quoted(schema.table),
            select_column_list(schema)
        )
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
            quoted(schema.table),
            cols.join(", "),
            placeholders.join(", "),
            select_column_list(schema)
        )
    };
    q
}

fn set_clause(q: &mut QueryBuf, values: &[(&Column, BindValue)]) -> String {
    values
        .iter()
        .map(|(c, v)| format!("{} = {}", quoted(c.name), q.push_param(v.clone())))
        .collect::<Vec<_>>()
        .join(", ")
}

/// UPDATE one row by primary key, returning the stored row. `values` must be non-empty.
pub fn update_by_id(schema: &EntitySchema, id: i64, values: &[(&Column, BindValue)]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let sets = set_clause(&mut q, values);
    let ph = q.push_param(BindValue::Int(id));
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = {} RETURNING {}",
        quoted(schema.table),
        sets,
        quoted(schema.primary_key().name),
        ph,
        select_column_list(schema)
    );
    q
}

/// UPDATE every row matching `filters`. `values` must be non-empty.
pub fn update_where(
    schema: &EntitySchema,
    filters: &[Filter],
    values: &[(&Column, BindValue)],
) -> QueryBuf {
    let mut q = QueryBuf::new();
    let sets = set_clause(&mut q, values);
    let where_sql = where_clause(&mut q, filters);
    q.sql = format!("UPDATE {} SET {}{}", quoted(schema.table), sets, where_sql);
    q
}

/// DELETE by primary key.
pub fn delete_by_id(schema: &EntitySchema, id: i64) -> QueryBuf {
    let mut q = QueryBuf::new();
    let ph = q.push_param(BindValue::Int(id));
    q.sql = format!(
        "DELETE FROM {} WHERE {} = {}",
        quoted(schema.table),
        quoted(schema.primary_key().name),
        ph
    );
    q
}

/// DELETE every row matching `filters`.
pub fn delete_where(schema: &EntitySchema, filters: &[Filter]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let where_sql = where_clause(&mut q, filters);
    q.sql = format!("DELETE FROM {}{}", quoted(schema.table), where_sql);
    q
}

/// CREATE TABLE plus one CREATE INDEX per indexed column.
pub fn create_table(schema: &EntitySchema) -> Vec<String> {
    let table = quoted(schema.table);
    let defs: Vec<String> = schema.columns.iter().map(Column::ddl).collect();
    let mut stmts = vec![format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        table,
        defs.join(", ")
    )];
    for c in schema.columns.iter().filter(|c| c.indexed) {
        stmts.push(format!(
            "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
            quoted(&format!("ix_{}_{}", schema.table, c.name)),
            table,
            quoted(c.name)
        ));
    }
    stmts
}

pub fn drop_table(schema: &EntitySchema) -> String {
    format!("DROP TABLE IF EXISTS {}", quoted(schema.table))
}
