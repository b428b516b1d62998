//! User management commands.

use yelpcamp_web::db::PgUserStore;
use yelpcamp_web::services::auth::AuthGate;

use super::{CommandError, connect};

/// Create a user through the same validation and hashing as registration.
pub async fn create(username: &str, email: &str, password: &str) -> Result<(), CommandError> {
    let store = PgUserStore::new(connect().await?);
    let user = AuthGate::new(&store)
        .register(username, email, password)
        .await?;

    tracing::info!(user_id = %user.id, username = %user.username, "User created");
    Ok(())
}
