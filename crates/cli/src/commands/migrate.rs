//! Database migration command.
//!
//! # Migration Files
//!
//! User migrations live in `crates/web/migrations/` and are embedded at
//! compile time. The session table (`tower_sessions.session`) is owned by
//! `tower-sessions-sqlx-store` and created through its own `migrate`.

use tower_sessions_sqlx_store::PostgresStore;

use super::{CommandError, connect};

/// Run all migrations.
pub async fn run() -> Result<(), CommandError> {
    let pool = connect().await?;

    tracing::info!("Running user migrations...");
    sqlx::migrate!("../web/migrations").run(&pool).await?;

    tracing::info!("Creating session table...");
    PostgresStore::new(pool).migrate().await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
