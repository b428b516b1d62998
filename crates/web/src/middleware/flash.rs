//! Flash messages: queued on one request, shown by the next rendered page.

use tower_sessions::Session;

use crate::models::{FlashKind, FlashMessages, session_keys};

/// Queue a message for the next rendered page.
///
/// # Errors
///
/// Returns an error if the session cannot be read or written.
pub async fn push_flash(
    session: &Session,
    kind: FlashKind,
    message: impl Into<String>,
) -> Result<(), tower_sessions::session::Error> {
    let mut flash: FlashMessages = session.get(session_keys::FLASH).await?.unwrap_or_default();
    flash.push(kind, message);
    session.insert(session_keys::FLASH, flash).await
}

/// Take every queued message, leaving none behind.
///
/// The session is only modified if something was queued.
///
/// # Errors
///
/// Returns an error if the session cannot be read.
pub async fn take_flash(session: &Session) -> Result<FlashMessages, tower_sessions::session::Error> {
    if session
        .get_value(session_keys::FLASH)
        .await?
        .is_none()
    {
        return Ok(FlashMessages::default());
    }

    Ok(session
        .remove::<FlashMessages>(session_keys::FLASH)
        .await?
        .unwrap_or_default())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use tower_sessions::MemoryStore;

    use super::*;

    fn session() -> Session {
        Session::new(None, Arc::new(MemoryStore::default()), None)
    }

    #[tokio::test]
    async fn test_flash_is_read_once() {
        let session = session();
        push_flash(&session, FlashKind::Success, "Welcome back!")
            .await
            .unwrap();
        push_flash(&session, FlashKind::Errors, "Try again")
            .await
            .unwrap();

        let flash = take_flash(&session).await.unwrap();
        assert_eq!(flash.success, vec!["Welcome back!".to_string()]);
        assert_eq!(flash.errors, vec!["Try again".to_string()]);

        assert!(take_flash(&session).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_take_without_flash_leaves_session_empty() {
        let session = session();
        assert!(take_flash(&session).await.unwrap().is_empty());
        assert!(session.is_empty().await);
    }
}
