//! CLI subcommands.

pub mod migrate;
pub mod user;

use sqlx::PgPool;
use thiserror::Error;

use yelpcamp_web::config::{AppConfig, ConfigError};
use yelpcamp_web::services::auth::AuthError;

/// Errors from any subcommand.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),
}

/// Connect using the server's configuration.
async fn connect() -> Result<PgPool, CommandError> {
    let config = AppConfig::from_env()?;
    tracing::info!("Connecting to database...");
    Ok(yelpcamp_web::db::create_pool(&config.database_url).await?)
}
