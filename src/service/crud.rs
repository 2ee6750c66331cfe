//! Generic CRUD execution against SQLite.

use super::query::{Filter, Pagination, SearchParams};
use super::validation::{updated_stamp, Assignments};
use crate::error::AppError;
use crate::model::{ColumnKind, EntitySchema, Stamp};
use crate::sql::{
    count, delete_by_id, delete_where, insert, max_of, select_by_id, select_page, update_by_id,
    update_where, BindValue, QueryBuf,
};
use chrono::{DateTime, Duration, DurationRound, SecondsFormat, Utc};
use serde_json::{Map, Value};
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Row, Sqlite, SqliteConnection, SqlitePool};

/// One page of a collection listing.
#[derive(Clone, Debug)]
pub struct Page {
    pub objects: Vec<Value>,
    /// Total rows matching the filters, independent of pagination.
    pub num_results: u64,
    pub page: u32,
    pub total_pages: u32,
}

pub struct CrudService;

impl CrudService {
    /// List rows matching `search`, one page at a time.
    pub async fn list(
        pool: &SqlitePool,
        schema: &EntitySchema,
        search: &SearchParams,
        pagination: Pagination,
    ) -> Result<Page, AppError> {
        let q = count(schema, &search.filters);
        log_query(&q);
        let num_results: i64 = bind_all(&q).fetch_one(pool).await?.try_get(0usize)?;
        let num_results = num_results.max(0) as u64;

        let q = select_page(
            schema,
            &search.filters,
            &search.order_by,
            pagination.results_per_page,
            pagination.offset(),
        );
        log_query(&q);
        let rows = bind_all(&q).fetch_all(pool).await?;
        let objects = rows
            .iter()
            .map(|r| row_to_json(schema, r))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page {
            objects,
            num_results,
            page: pagination.page,
            total_pages: pagination.total_pages(num_results),
        })
    }

    /// Fetch one row by primary key. Returns JSON object or None.
    pub async fn read(
        pool: &SqlitePool,
        schema: &EntitySchema,
        id: i64,
    ) -> Result<Option<Value>, AppError> {
        let q = select_by_id(schema, id);
        log_query(&q);
        let row = bind_all(&q).fetch_optional(pool).await?;
        row.map(|r| row_to_json(schema, &r)).transpose()
    }

    /// Insert one row; both timestamps get the same instant. Returns created row.
    pub async fn create(
        pool: &SqlitePool,
        schema: &EntitySchema,
        mut values: Assignments,
    ) -> Result<Value, AppError> {
        let now = now();
        for stamp in [Stamp::Created, Stamp::Updated] {
            if let Some(c) = schema.stamped(stamp) {
                values.push((c, BindValue::Timestamp(now)));
            }
        }
        let q = insert(schema, &values);
        log_query(&q);
        let row = bind_all(&q).fetch_one(pool).await?;
        row_to_json(schema, &row)
    }

    /// Update one row by id, refreshing its updated-at stamp. Returns updated row or None.
    pub async fn update(
        pool: &SqlitePool,
        schema: &EntitySchema,
        id: i64,
        mut values: Assignments,
    ) -> Result<Option<Value>, AppError> {
        let mut tx = pool.begin().await?;
        let q = select_by_id(schema, id);
        log_query(&q);
        let Some(current) = bind_all(&q).fetch_optional(&mut *tx).await? else {
            return Ok(None);
        };
        if let Some(stamp) = updated_stamp(schema) {
            let previous: DateTime<Utc> = current.try_get(stamp.name)?;
            values.push((stamp, BindValue::Timestamp(next_stamp(previous))));
        }
        if values.is_empty() {
            tx.commit().await?;
            return row_to_json(schema, &current).map(Some);
        }
        let q = update_by_id(schema, id, &values);
        let row = Self::fetch_one_tx(&mut tx, &q).await?;
        tx.commit().await?;
        Ok(Some(row_to_json(schema, &row)?))
    }

    /// Delete one row by id. Returns whether a row was removed.
    pub async fn delete(
        pool: &SqlitePool,
        schema: &EntitySchema,
        id: i64,
    ) -> Result<bool, AppError> {
        let q = delete_by_id(schema, id);
        log_query(&q);
        let done = bind_all(&q).execute(pool).await?;
        Ok(done.rows_affected() > 0)
    }

    /// Apply the same partial update to every matching row in one transaction. Returns rows
    /// modified.
    ///
    /// All rows share one updated-at stamp, later than the newest stamp among them.
    pub async fn update_many(
        pool: &SqlitePool,
        schema: &EntitySchema,
        filters: &[Filter],
        mut values: Assignments,
    ) -> Result<u64, AppError> {
        let mut tx = pool.begin().await?;
        if let Some(stamp) = updated_stamp(schema) {
            let q = max_of(schema, stamp, filters);
            log_query(&q);
            let newest: Option<DateTime<Utc>> =
                bind_all(&q).fetch_one(&mut *tx).await?.try_get(0usize)?;
            let at = newest.map(next_stamp).unwrap_or_else(now);
            values.push((stamp, BindValue::Timestamp(at)));
        }
        if values.is_empty() {
            return Err(AppError::BadRequest("no fields to update".into()));
        }
        let q = update_where(schema, filters, &values);
        log_query(&q);
        let done = bind_all(&q).execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(done.rows_affected())
    }

    /// Delete every matching row in one transaction. Returns rows deleted.
    pub async fn delete_many(
        pool: &SqlitePool,
        schema: &EntitySchema,
        filters: &[Filter],
    ) -> Result<u64, AppError> {
        let q = delete_where(schema, filters);
        let mut tx = pool.begin().await?;
        log_query(&q);
        let done = bind_all(&q).execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(done.rows_affected())
    }

    async fn fetch_one_tx(tx: &mut SqliteConnection, q: &QueryBuf) -> Result<SqliteRow, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query (tx)");
        Ok(bind_all(q).fetch_one(&mut *tx).await?)
    }
}

fn log_query(q: &QueryBuf) {
    tracing::debug!(sql = %q.sql, params = ?q.params, "query");
}

fn bind_all(q: &QueryBuf) -> sqlx::query::Query<'_, Sqlite, SqliteArguments<'_>> {
    let mut query = sqlx::query(&q.sql);
    for p in &q.params {
        query = query.bind(p.clone());
    }
    query
}

/// Current time truncated to microseconds, the precision timestamps are rendered with.
fn now() -> DateTime<Utc> {
    let now = Utc::now();
    now.duration_trunc(Duration::microseconds(1)).unwrap_or(now)
}

/// Strictly later than `previous` even when the clock has not advanced.
fn next_stamp(previous: DateTime<Utc>) -> DateTime<Utc> {
    let floor = previous + Duration::microseconds(1);
    now().max(floor)
}

pub(crate) fn format_timestamp(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn row_to_json(schema: &EntitySchema, row: &SqliteRow) -> Result<Value, AppError> {
    let mut map = Map::new();
    for col in schema.columns {
        let name = col.name;
        let v = match col.kind {
            ColumnKind::Integer => row.try_get::<Option<i64>, _>(name)?.map(Value::from),
            ColumnKind::Boolean => row.try_get::<Option<bool>, _>(name)?.map(Value::Bool),
            ColumnKind::Text => row.try_get::<Option<String>, _>(name)?.map(Value::String),
            ColumnKind::Timestamp => row
                .try_get::<Option<DateTime<Utc>>, _>(name)?
                .map(|t| Value::String(format_timestamp(&t))),
        };
        map.insert(name.to_string(), v.unwrap_or(Value::Null));
    }
    Ok(Value::Object(map))
}
