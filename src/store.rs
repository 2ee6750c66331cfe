//! SQLite connection and table lifecycle for the registered entity schemas.

use crate::error::AppError;
use crate::model::EntitySchema;
use crate::sql::{create_table, drop_table};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{SqliteConnection, SqlitePool};
use std::str::FromStr;

fn is_in_memory(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}

/// Open a pool for `database_url`. Every connection enables foreign-key enforcement.
///
/// An in-memory database lives only as long as its connection, so the pool is pinned to one
/// connection that is never recycled.
pub async fn connect(database_url: &str) -> Result<SqlitePool, AppError> {
    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
    let mut pool = SqlitePoolOptions::new().after_connect(|conn, _meta| {
        Box::pin(async move {
            sqlx::query("PRAGMA foreign_keys = ON").execute(&mut *conn).await?;
            Ok(())
        })
    });
    pool = if is_in_memory(database_url) {
        pool.max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        pool.max_connections(5)
    };
    let pool = pool.connect_with(options).await?;
    tracing::info!(database_url = %database_url, "connected to store");
    Ok(pool)
}

async fn create_in(
    conn: &mut SqliteConnection,
    schemas: &[&'static EntitySchema],
) -> Result<(), AppError> {
    for schema in schemas {
        for stmt in create_table(schema) {
            tracing::debug!(sql = %stmt, "ddl");
            sqlx::query(&stmt).execute(&mut *conn).await?;
        }
    }
    Ok(())
}

async fn drop_in(
    conn: &mut SqliteConnection,
    schemas: &[&'static EntitySchema],
) -> Result<(), AppError> {
    for schema in schemas.iter().rev() {
        let stmt = drop_table(schema);
        tracing::debug!(sql = %stmt, "ddl");
        sqlx::query(&stmt).execute(&mut *conn).await?;
    }
    Ok(())
}

/// Create tables and indexes for every schema that does not have them yet.
pub async fn create_all(
    pool: &SqlitePool,
    schemas: &[&'static EntitySchema],
) -> Result<(), AppError> {
    let mut conn = pool.acquire().await?;
    create_in(&mut conn, schemas).await?;
    tracing::info!(tables = schemas.len(), "tables ensured");
    Ok(())
}

/// Drop every schema's table, dependents first.
pub async fn drop_all(
    pool: &SqlitePool,
    schemas: &[&'static EntitySchema],
) -> Result<(), AppError> {
    let mut conn = pool.acquire().await?;
    drop_in(&mut conn, schemas).await?;
    tracing::info!(tables = schemas.len(), "tables dropped");
    Ok(())
}

/// Drop and recreate all tables in one transaction.
pub async fn reset(pool: &SqlitePool, schemas: &[&'static EntitySchema]) -> Result<(), AppError> {
    let mut tx = pool.begin().await?;
    drop_in(&mut tx, schemas).await?;
    create_in(&mut tx, schemas).await?;
    tx.commit().await?;
    tracing::info!("store reset");
    Ok(())
}
