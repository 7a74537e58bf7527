//! Per-page layout context.
//!
//! Every full page renders the same header (greeting, cart counter) and may
//! carry the "login required" prompt. [`PageContext`] gathers that from the
//! session, hydrating a persisted token on the first request of a session.

use std::time::Duration;

use axum::{extract::FromRequestParts, http::request::Parts};
use tower_sessions::Session;

use crate::models::{CurrentUser, LoginAlert};
use crate::services::SessionContext;
use crate::state::AppState;

use super::CspNonce;

/// The visible login prompt, as rendered.
#[derive(Debug, Clone)]
pub struct AlertView {
    pub redirect_to: String,
    /// Milliseconds until the prompt hides itself.
    pub remaining_ms: i64,
}

impl AlertView {
    /// Render a stored prompt as of now.
    #[must_use]
    pub fn new(alert: LoginAlert, ttl: Duration) -> Self {
        Self {
            remaining_ms: alert.remaining_ms(chrono::Utc::now().timestamp_millis(), ttl),
            redirect_to: alert.redirect_to,
        }
    }
}

/// Layout data shared by all full pages.
#[derive(Debug, Clone, Default)]
pub struct PageContext {
    pub user: Option<CurrentUser>,
    pub cart_count: u32,
    pub nonce: String,
    pub alert: Option<AlertView>,
}

impl PageContext {
    /// Whether a visitor is signed in.
    #[must_use]
    pub const fn is_signed_in(&self) -> bool {
        self.user.is_some()
    }

    /// Header greeting name.
    #[must_use]
    pub fn greeting(&self) -> &str {
        self.user.as_ref().map_or("", CurrentUser::first_name)
    }
}

impl FromRequestParts<AppState> for PageContext {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let nonce = parts
            .extensions
            .get::<CspNonce>()
            .map(|n| n.0.clone())
            .unwrap_or_default();

        let Some(session) = parts.extensions.get::<Session>().cloned() else {
            tracing::warn!("session missing from request extensions");
            return Ok(Self {
                nonce,
                ..Self::default()
            });
        };

        let ttl = state.config().login_alert_ttl;
        let ctx = SessionContext::new(state.catalog(), &session, ttl);

        if let Err(e) = ctx.hydrate().await {
            tracing::warn!(error = %e, "session hydration failed");
        }

        let alert = ctx.login_alert().await.map(|alert| AlertView::new(alert, ttl));

        Ok(Self {
            user: ctx.current_user().await,
            cart_count: ctx.cart_count().await,
            nonce,
            alert,
        })
    }
}
