//! Session middleware configuration.
//!
//! Sets up in-memory sessions using tower-sessions. The session holds the
//! catalog token, the signed-in profile, the login prompt and the visitor id
//! that keys the live search state in [`crate::visitor`].

use tower_sessions::{Expiry, MemoryStore, Session, SessionManagerLayer};
use uuid::Uuid;

use crate::config::StorefrontConfig;
use crate::models::session_keys;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "ancora_session";

/// Session expiry time in seconds (7 days).
const SESSION_EXPIRY_SECONDS: i64 = 7 * 24 * 60 * 60;

/// Create the session layer with an in-memory store.
#[must_use]
pub fn create_session_layer(config: &StorefrontConfig) -> SessionManagerLayer<MemoryStore> {
    SessionManagerLayer::new(MemoryStore::default())
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(SESSION_EXPIRY_SECONDS),
        ))
        .with_secure(config.is_secure())
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
}

/// Stable per-visitor id, created on first use.
///
/// Keys the keystroke debouncer and the live search state; unlike the
/// session id it survives the id rotation done at login.
pub async fn visitor_id(session: &Session) -> String {
    if let Some(id) = existing_visitor_id(session).await {
        return id;
    }
    let id = Uuid::new_v4().to_string();
    if let Err(e) = session.insert(session_keys::VISITOR_ID, &id).await {
        tracing::warn!(error = %e, "failed to store visitor id");
    }
    id
}

/// The visitor id, if one was already assigned.
pub async fn existing_visitor_id(session: &Session) -> Option<String> {
    session
        .get::<String>(session_keys::VISITOR_ID)
        .await
        .ok()
        .flatten()
}
