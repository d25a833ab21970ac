//! # Database Persistence Layer
//!
//! Postgres implementations of the catalog and grievance store ports, via
//! SQLx runtime queries.
//!
//! The database layer is **optional**. When `DATABASE_URL` is set, the API
//! persists agreements, templates, grievances, step history and the event
//! log to PostgreSQL. When absent, the API runs on the in-memory
//! implementations (development and tests).
//!
//! ## Error mapping
//!
//! Pool timeouts, I/O failures and serialization failures (`40001`) are
//! transient and map to `Unavailable`, which the engine retries. Every
//! other SQLx error is a backend error.

pub mod catalog;
pub mod grievances;

use sqlx::postgres::{PgPool, PgPoolOptions};

use grievance_catalog::CatalogError;
use grievance_lifecycle::StoreError;

pub use catalog::PgCatalog;
pub use grievances::PgGrievanceStore;

/// Initialize the database connection pool and run migrations.
///
/// Returns `None` if no URL is configured (in-memory-only mode).
/// Returns `Err` if the URL is set but the connection or migration fails.
pub async fn init_pool(database_url: Option<&str>) -> Result<Option<PgPool>, sqlx::Error> {
    let Some(url) = database_url else {
        tracing::warn!(
            "DATABASE_URL not set, running in-memory only mode. \
             State will not survive restarts."
        );
        return Ok(None);
    };

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(url)
        .await?;

    tracing::info!("Connected to PostgreSQL");

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    Ok(Some(pool))
}

/// Postgres `serialization_failure`.
const SERIALIZATION_FAILURE: &str = "40001";

fn is_transient(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => true,
        sqlx::Error::Database(db) => db.code().as_deref() == Some(SERIALIZATION_FAILURE),
        _ => false,
    }
}

pub(crate) fn store_error(err: sqlx::Error) -> StoreError {
    if is_transient(&err) {
        StoreError::Unavailable(err.to_string())
    } else {
        tracing::error!(error = %err, "grievance store query failed");
        StoreError::Backend(err.to_string())
    }
}

pub(crate) fn catalog_error(err: sqlx::Error) -> CatalogError {
    if is_transient(&err) {
        CatalogError::Unavailable(err.to_string())
    } else {
        tracing::error!(error = %err, "catalog query failed");
        CatalogError::Storage(err.to_string())
    }
}

/// Convert a stored `INTEGER` step count or number back to `u32`.
pub(crate) fn to_u32(column: &'static str, value: i32) -> Result<u32, String> {
    u32::try_from(value).map_err(|_| format!("{column} is negative: {value}"))
}

/// Convert a `u32` for binding as `INTEGER`.
pub(crate) fn to_i32(column: &'static str, value: u32) -> Result<i32, String> {
    i32::try_from(value).map_err(|_| format!("{column} out of range: {value}"))
}
