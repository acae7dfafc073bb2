//! # Database Persistence Layer
//!
//! Postgres persistence for users, sensors, telemetry and contracts via
//! SQLx.
//!
//! The database is optional. When `DATABASE_URL` is set, the marketplace
//! runs on [`PgRepository`]; when absent, the binary falls back to the
//! in-memory repository and state does not survive restarts.
//!
//! Query functions in the submodules take a `&mut PgConnection` so they run
//! inside whatever transaction [`PgRepository`] opened.

pub mod contracts;
pub mod repository;
pub mod sensors;
pub mod telemetry;
pub mod users;

pub use repository::PgRepository;

use sqlx::postgres::{PgPool, PgPoolOptions};

use courier_engine::RepositoryError;

/// Initialize the database connection pool and run migrations.
///
/// Returns `None` if `DATABASE_URL` is not set.
pub async fn init_pool() -> Result<Option<PgPool>, sqlx::Error> {
    let url = match std::env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            tracing::warn!(
                "DATABASE_URL not set, running with the in-memory repository. \
                 State will not survive restarts."
            );
            return Ok(None);
        }
    };

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(&url)
        .await?;

    tracing::info!("Connected to PostgreSQL");

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    Ok(Some(pool))
}

const UNIQUE_VIOLATION: &str = "23505";
const SERIALIZATION_FAILURE: &str = "40001";

/// Classify a driver error for the engine.
pub(crate) fn classify(err: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(db) = &err {
        match db.code().as_deref() {
            Some(UNIQUE_VIOLATION) => {
                return RepositoryError::UniqueViolation {
                    constraint: db.constraint().unwrap_or("unknown").to_string(),
                }
            }
            Some(SERIALIZATION_FAILURE) => return RepositoryError::SerializationFailure,
            _ => {}
        }
    }
    RepositoryError::Backend(err.to_string())
}

/// A stored row that no longer satisfies the domain types.
pub(crate) fn corrupt(table: &str, detail: impl std::fmt::Display) -> RepositoryError {
    tracing::error!(table, %detail, "stored row failed domain validation");
    RepositoryError::Backend(format!("corrupt {table} row: {detail}"))
}
