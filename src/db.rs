//! Database pool for timetrack.
//!
//! Postgres in production, SQLite for tests and local runs. Connecting
//! retries a few times so the API can start alongside its database.

use std::time::Duration;

use anyhow::{Context, Result};
use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use tokio::time::sleep;
use tracing::{info, warn};

use crate::config::AppConfig;

const CONNECT_ATTEMPTS: u32 = 5;
const FIRST_RETRY_DELAY: Duration = Duration::from_millis(100);
const IDLE_TIMEOUT: Duration = Duration::from_secs(600);
const MAX_LIFETIME: Duration = Duration::from_secs(1800);

#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("DATABASE_URL is empty")]
    MissingUrl,
    #[error("could not reach {backend} database after {attempts} attempts: {source}")]
    Unreachable {
        backend: &'static str,
        attempts: u32,
        #[source]
        source: sea_orm::DbErr,
    },
}

/// `postgres` or `sqlite`, for log lines that must not carry credentials
fn backend_name(url: &str) -> &'static str {
    if url.starts_with("sqlite:") {
        "sqlite"
    } else {
        "postgres"
    }
}

/// Open the pool sized by `DB_MAX_CONNECTIONS` and `DB_ACQUIRE_TIMEOUT_MS`
pub async fn init_pool(cfg: &AppConfig) -> Result<DatabaseConnection> {
    if cfg.database_url.trim().is_empty() {
        return Err(DatabaseError::MissingUrl.into());
    }
    let backend = backend_name(&cfg.database_url);

    let mut opt = ConnectOptions::new(&cfg.database_url);
    opt.max_connections(cfg.db_max_connections)
        .acquire_timeout(Duration::from_millis(cfg.db_acquire_timeout_ms))
        .idle_timeout(IDLE_TIMEOUT)
        .max_lifetime(MAX_LIFETIME)
        .sqlx_logging(true)
        .sqlx_logging_level(log::LevelFilter::Debug);

    let mut delay = FIRST_RETRY_DELAY;
    let mut attempt = 1;
    loop {
        match Database::connect(opt.clone()).await {
            Ok(conn) => {
                info!(
                    backend,
                    attempt,
                    max_connections = cfg.db_max_connections,
                    "Database connected"
                );
                return Ok(conn);
            }
            Err(source) if attempt >= CONNECT_ATTEMPTS => {
                return Err(DatabaseError::Unreachable {
                    backend,
                    attempts: attempt,
                    source,
                }
                .into());
            }
            Err(e) => {
                warn!(
                    backend,
                    attempt,
                    error = %e,
                    retry_in_ms = delay.as_millis() as u64,
                    "Database connect failed"
                );
                sleep(delay).await;
                delay *= 2;
                attempt += 1;
            }
        }
    }
}

pub async fn run_migrations(db: &DatabaseConnection) -> Result<()> {
    Migrator::up(db, None)
        .await
        .context("Failed to apply database migrations")?;
    info!("Database migrations applied");
    Ok(())
}

/// `SELECT 1` round trip used by `/readyz`
pub async fn health_check(db: &DatabaseConnection) -> Result<()> {
    db.query_one(Statement::from_string(
        db.get_database_backend(),
        "SELECT 1".to_string(),
    ))
    .await
    .context("Database health check failed")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sqlite_pool_migrates_and_answers_health_check() {
        let config = AppConfig {
            database_url: "sqlite::memory:".to_string(),
            db_max_connections: 1,
            ..Default::default()
        };

        let db = init_pool(&config).await.unwrap();
        run_migrations(&db).await.unwrap();
        health_check(&db).await.unwrap();
    }

    #[tokio::test]
    async fn blank_url_is_rejected_before_connecting() {
        let config = AppConfig {
            database_url: "  ".to_string(),
            ..Default::default()
        };

        let err = init_pool(&config).await.unwrap_err();
        assert!(matches!(
            err.downcast::<DatabaseError>(),
            Ok(DatabaseError::MissingUrl)
        ));
    }

    #[test]
    fn backend_name_never_echoes_the_url() {
        assert_eq!(backend_name("sqlite::memory:"), "sqlite");
        assert_eq!(
            backend_name("postgres://user:secret@db:5432/timetrack"),
            "postgres"
        );
    }
}
