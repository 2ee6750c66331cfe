//! Search parameters for collection endpoints.
//!
//! Two forms are accepted and may be combined: `?<column>=<value>` equality filters, and a
//! structured `?q=<json>` document with `filters` and `order_by`. Every referenced field must be a
//! declared column; anything else is rejected rather than ignored.

use crate::error::AppError;
use crate::model::{Column, EntitySchema};
use crate::sql::BindValue;
use serde::Deserialize;
use serde_json::Value;
use std::num::IntErrorKind;

pub const PAGE_PARAM: &str = "page";
pub const RESULTS_PER_PAGE_PARAM: &str = "results_per_page";
pub const QUERY_PARAM: &str = "q";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Op {
    Eq,
    Neq,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
    In,
    NotIn,
    IsNull,
    IsNotNull,
}

impl Op {
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "eq" | "==" | "equals" => Op::Eq,
            "neq" | "!=" | "ne" | "not_equal_to" => Op::Neq,
            "lt" | "<" => Op::Lt,
            "le" | "<=" | "lte" => Op::Le,
            "gt" | ">" => Op::Gt,
            "ge" | ">=" | "gte" => Op::Ge,
            "like" => Op::Like,
            "in" => Op::In,
            "not_in" => Op::NotIn,
            "is_null" => Op::IsNull,
            "is_not_null" => Op::IsNotNull,
            _ => return None,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Operand {
    None,
    One(BindValue),
    Many(Vec<BindValue>),
}

#[derive(Clone, Debug)]
pub struct Filter {
    pub column: &'static Column,
    pub op: Op,
    pub operand: Operand,
}

#[derive(Clone, Debug)]
pub struct OrderBy {
    pub column: &'static Column,
    pub descending: bool,
}

#[derive(Clone, Debug, Default)]
pub struct SearchParams {
    pub filters: Vec<Filter>,
    pub order_by: Vec<OrderBy>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub results_per_page: u32,
}

impl Pagination {
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.results_per_page)
    }

    pub fn total_pages(&self, num_results: u64) -> u32 {
        let per = u64::from(self.results_per_page);
        num_results.div_ceil(per) as u32
    }
}

#[derive(Deserialize)]
struct RawQuery {
    #[serde(default)]
    filters: Vec<RawFilter>,
    #[serde(default)]
    order_by: Vec<RawOrderBy>,
}

#[derive(Deserialize)]
struct RawFilter {
    name: String,
    #[serde(default = "default_op")]
    op: String,
    #[serde(default)]
    val: Value,
}

fn default_op() -> String {
    "eq".into()
}

#[derive(Deserialize)]
struct RawOrderBy {
    field: String,
    #[serde(default)]
    direction: Option<String>,
}

fn lookup(schema: &'static EntitySchema, name: &str) -> Result<&'static Column, AppError> {
    schema
        .column(name)
        .ok_or_else(|| AppError::validation(name, "unknown field"))
}

fn build_filter(column: &'static Column, op: Op, val: &Value) -> Result<Filter, AppError> {
    let operand = match op {
        Op::IsNull | Op::IsNotNull => Operand::None,
        Op::In | Op::NotIn => {
            let items = val
                .as_array()
                .ok_or_else(|| AppError::validation(column.name, "expected a list of values"))?;
            Operand::Many(
                items
                    .iter()
                    .map(|v| BindValue::from_filter(column, v))
                    .collect::<Result<_, _>>()?,
            )
        }
        Op::Like => match val {
            Value::String(s) => Operand::One(BindValue::Text(s.clone())),
            _ => return Err(AppError::validation(column.name, "like expects a string pattern")),
        },
        _ => Operand::One(BindValue::from_filter(column, val)?),
    };
    Ok(Filter { column, op, operand })
}

/// Parse filter and ordering parameters. Pagination keys are skipped here.
pub fn parse_search(
    schema: &'static EntitySchema,
    params: &[(String, String)],
) -> Result<SearchParams, AppError> {
    let mut search = SearchParams::default();
    for (key, value) in params {
        match key.as_str() {
            PAGE_PARAM | RESULTS_PER_PAGE_PARAM => {}
            QUERY_PARAM => {
                let raw: RawQuery = serde_json::from_str(value).map_err(|e| {
                    AppError::validation(QUERY_PARAM, format!("malformed query: {}", e))
                })?;
                for f in &raw.filters {
                    let column = lookup(schema, &f.name)?;
                    let op = Op::parse(&f.op).ok_or_else(|| {
                        let reason = format!("unknown operator '{}'", f.op);
                        AppError::validation(f.name.as_str(), reason)
                    })?;
                    search.filters.push(build_filter(column, op, &f.val)?);
                }
                for o in &raw.order_by {
                    let column = lookup(schema, &o.field)?;
                    let direction = o.direction.as_deref().map(str::to_ascii_lowercase);
                    let descending = match direction.as_deref() {
                        None | Some("asc") => false,
                        Some("desc") => true,
                        Some(other) => {
                            return Err(AppError::validation(
                                o.field.as_str(),
                                format!("unknown direction '{}'", other),
                            ))
                        }
                    };
                    search.order_by.push(OrderBy { column, descending });
                }
            }
            name => {
                let column = lookup(schema, name)?;
                let operand = Operand::One(BindValue::from_query(column, value)?);
                search.filters.push(Filter {
                    column,
                    op: Op::Eq,
                    operand,
                });
            }
        }
    }
    Ok(search)
}

/// Positive integer parameter, saturated to `u32`.
fn positive(params: &[(String, String)], key: &'static str) -> Result<Option<u32>, AppError> {
    let Some((_, raw)) = params.iter().rev().find(|(k, _)| k == key) else {
        return Ok(None);
    };
    match raw.parse::<u32>() {
        Ok(n) if n > 0 => Ok(Some(n)),
        Err(e) if *e.kind() == IntErrorKind::PosOverflow => Ok(Some(u32::MAX)),
        _ => Err(AppError::validation(key, "must be a positive integer")),
    }
}

/// `page` defaults to 1. `results_per_page` defaults to `default_per_page` and is clamped to
/// `max_per_page`.
pub fn parse_pagination(
    params: &[(String, String)],
    default_per_page: u32,
    max_per_page: u32,
) -> Result<Pagination, AppError> {
    let page = positive(params, PAGE_PARAM)?.unwrap_or(1);
    let results_per_page = positive(params, RESULTS_PER_PAGE_PARAM)?
        .unwrap_or(default_per_page)
        .min(max_per_page)
        .max(1);
    Ok(Pagination {
        page,
        results_per_page,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Entity, Todo};

    fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn simple_params_become_equality_filters() {
        let pairs = params(&[("completed", "true"), ("page", "2")]);
        let search = parse_search(Todo::schema(), &pairs).unwrap();
        assert_eq!(search.filters.len(), 1);
        assert_eq!(search.filters[0].column.name, "completed");
        assert_eq!(search.filters[0].op, Op::Eq);
        assert_eq!(search.filters[0].operand, Operand::One(BindValue::Bool(true)));
    }

    #[test]
    fn unknown_field_is_rejected() {
        let err = parse_search(Todo::schema(), &params(&[("colour", "red")])).unwrap_err();
        assert_eq!(err.to_string(), "colour: unknown field");
    }

    #[test]
    fn structured_query_parses_filters_and_order() {
        let q = r#"{"filters":[{"name":"id","op":"in","val":[1,"2"]},
                               {"name":"title","op":"like","val":"%task"}],
                    "order_by":[{"field":"id","direction":"desc"}]}"#;
        let search = parse_search(Todo::schema(), &params(&[("q", q)])).unwrap();
        assert_eq!(search.filters.len(), 2);
        assert_eq!(
            search.filters[0].operand,
            Operand::Many(vec![BindValue::Int(1), BindValue::Int(2)])
        );
        assert_eq!(search.filters[1].op, Op::Like);
        assert!(search.order_by[0].descending);
    }

    #[test]
    fn structured_query_rejects_bad_input() {
        let bad_op = r#"{"filters":[{"name":"id","op":"between","val":1}]}"#;
        assert!(parse_search(Todo::schema(), &params(&[("q", bad_op)])).is_err());
        let bad_field = r#"{"filters":[{"name":"owner","op":"eq","val":1}]}"#;
        assert!(parse_search(Todo::schema(), &params(&[("q", bad_field)])).is_err());
        assert!(parse_search(Todo::schema(), &params(&[("q", "{not json")])).is_err());
        let bad_in = r#"{"filters":[{"name":"id","op":"in","val":3}]}"#;
        assert!(parse_search(Todo::schema(), &params(&[("q", bad_in)])).is_err());
    }

    #[test]
    fn pagination_defaults_and_clamps() {
        let p = parse_pagination(&[], 32, 1024).unwrap();
        assert_eq!(p, Pagination { page: 1, results_per_page: 32 });
        let pairs = params(&[("results_per_page", "5000"), ("page", "3")]);
        let p = parse_pagination(&pairs, 32, 1024).unwrap();
        assert_eq!(p.results_per_page, 1024);
        assert_eq!(p.offset(), 2048);
        assert!(parse_pagination(&params(&[("page", "0")]), 32, 1024).is_err());
        assert!(parse_pagination(&params(&[("results_per_page", "-1")]), 32, 1024).is_err());
    }

    #[test]
    fn oversized_pagination_values_saturate() {
        let pairs = params(&[("results_per_page", "99999999999"), ("page", "99999999999")]);
        let p = parse_pagination(&pairs, 32, 1024).unwrap();
        assert_eq!(p.results_per_page, 1024);
        assert_eq!(p.page, u32::MAX);
        assert_eq!(p.offset(), u64::from(u32::MAX - 1) * 1024);
        let huge = params(&[("page", "999999999999999999999999")]);
        assert_eq!(parse_pagination(&huge, 32, 1024).unwrap().page, u32::MAX);
    }

    #[test]
    fn total_pages_rounds_up() {
        let p = Pagination { page: 1, results_per_page: 2 };
        assert_eq!(p.total_pages(0), 0);
        assert_eq!(p.total_pages(3), 2);
        assert_eq!(p.total_pages(4), 2);
    }
}
