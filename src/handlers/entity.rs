//! Entity CRUD handlers, generic over any type implementing [`Entity`].

use crate::error::AppError;
use crate::model::Entity;
use crate::response::{jsonify, success_many, success_one};
use crate::service::{parse_pagination, parse_search, CrudService, RequestValidator};
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::{Map, Value};

type Params = Query<Vec<(String, String)>>;

fn ensure_allowed(state: &AppState, method: &Method) -> Result<(), AppError> {
    if state.settings.allows(method) {
        Ok(())
    } else {
        Err(AppError::MethodNotAllowed)
    }
}

/// Item ids are integers; anything else cannot name an existing row.
fn parse_id(raw: &str) -> Result<i64, AppError> {
    raw.parse()
        .map_err(|_| AppError::NotFound(format!("no row with id '{}'", raw)))
}

fn count_body(key: &str, n: u64) -> Map<String, Value> {
    let mut m = Map::new();
    m.insert(key.into(), n.into());
    m
}

pub async fn list<E: Entity>(
    State(state): State<AppState>,
    Query(params): Params,
) -> Result<Response, AppError> {
    ensure_allowed(&state, &Method::GET)?;
    let schema = E::schema();
    let search = parse_search(schema, &params)?;
    let pagination = parse_pagination(
        &params,
        state.settings.results_per_page,
        state.settings.max_results_per_page,
    )?;
    let page = CrudService::list(&state.pool, schema, &search, pagination).await?;
    Ok(success_many(page, state.settings.json_indent))
}

pub async fn read<E: Entity>(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    ensure_allowed(&state, &Method::GET)?;
    let id = parse_id(&id)?;
    let row = CrudService::read(&state.pool, E::schema(), id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("no row with id {}", id)))?;
    Ok(success_one(StatusCode::OK, row, state.settings.json_indent))
}

pub async fn create<E: Entity>(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Response, AppError> {
    ensure_allowed(&state, &Method::POST)?;
    let schema = E::schema();
    let body = RequestValidator::parse_body(&body)?;
    let values = RequestValidator::validate(schema, &body)?;
    let row = CrudService::create(&state.pool, schema, values).await?;
    tracing::info!(table = schema.table, id = ?row.get("id"), "created");
    Ok(success_one(StatusCode::CREATED, row, state.settings.json_indent))
}

/// PATCH or PUT on an item.
pub async fn update<E: Entity>(
    State(state): State<AppState>,
    method: Method,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Response, AppError> {
    ensure_allowed(&state, &method)?;
    let schema = E::schema();
    let id = parse_id(&id)?;
    let body = RequestValidator::parse_body(&body)?;
    let values = RequestValidator::validate_partial(schema, &body)?;
    let row = CrudService::update(&state.pool, schema, id, values)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("no row with id {}", id)))?;
    Ok(success_one(StatusCode::OK, row, state.settings.json_indent))
}

pub async fn delete<E: Entity>(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    ensure_allowed(&state, &Method::DELETE)?;
    let schema = E::schema();
    let id = parse_id(&id)?;
    if !CrudService::delete(&state.pool, schema, id).await? {
        return Err(AppError::NotFound(format!("no row with id {}", id)));
    }
    tracing::info!(table = schema.table, id, "deleted");
    Ok(StatusCode::NO_CONTENT.into_response())
}

/// PATCH or PUT on the collection: same partial update for every row matching the query.
pub async fn update_many<E: Entity>(
    State(state): State<AppState>,
    method: Method,
    Query(params): Params,
    body: Bytes,
) -> Result<Response, AppError> {
    ensure_allowed(&state, &method)?;
    if !state.settings.allow_patch_many {
        return Err(AppError::MethodNotAllowed);
    }
    let schema = E::schema();
    let search = parse_search(schema, &params)?;
    let body = RequestValidator::parse_body(&body)?;
    let values = RequestValidator::validate_partial(schema, &body)?;
    let n = CrudService::update_many(&state.pool, schema, &search.filters, values).await?;
    tracing::info!(table = schema.table, rows = n, "bulk update");
    let body = count_body("num_modified", n);
    Ok(jsonify(StatusCode::OK, body, state.settings.json_indent))
}

pub async fn delete_many<E: Entity>(
    State(state): State<AppState>,
    Query(params): Params,
) -> Result<Response, AppError> {
    ensure_allowed(&state, &Method::DELETE)?;
    if !state.settings.allow_delete_many {
        return Err(AppError::MethodNotAllowed);
    }
    let schema = E::schema();
    let search = parse_search(schema, &params)?;
    let n = CrudService::delete_many(&state.pool, schema, &search.filters).await?;
    tracing::info!(table = schema.table, rows = n, "bulk delete");
    let body = count_body("num_deleted", n);
    Ok(jsonify(StatusCode::OK, body, state.settings.json_indent))
}
