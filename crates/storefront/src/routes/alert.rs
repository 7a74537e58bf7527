//! "Login required" prompt fragments.
//!
//! The prompt is raised by gated actions (see `cart::add`) and hides itself
//! after a few seconds; `app.js` removes it client-side when its timer runs
//! out, and the session copy expires on the same schedule.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::State;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::AppError;
use crate::middleware::AlertView;
use crate::services::SessionContext;
use crate::state::AppState;

/// Login prompt fragment (for HTMX).
///
/// With `oob` set the fragment replaces the page's prompt container out of
/// band, so it can ride along with another response.
#[derive(Template, WebTemplate)]
#[template(path = "partials/login_alert.html")]
pub struct LoginAlertTemplate {
    pub alert: Option<AlertView>,
    pub oob: bool,
}

/// Current prompt, if still visible.
#[instrument(skip(state, session))]
pub async fn show(State(state): State<AppState>, session: Session) -> LoginAlertTemplate {
    let ttl = state.config().login_alert_ttl;
    let ctx = SessionContext::new(state.catalog(), &session, ttl);
    LoginAlertTemplate {
        alert: ctx.login_alert().await.map(|alert| AlertView::new(alert, ttl)),
        oob: false,
    }
}

/// Close the prompt.
#[instrument(skip(state, session))]
pub async fn dismiss(
    State(state): State<AppState>,
    session: Session,
) -> Result<LoginAlertTemplate, AppError> {
    SessionContext::new(state.catalog(), &session, state.config().login_alert_ttl)
        .dismiss_login_alert()
        .await?;
    Ok(LoginAlertTemplate {
        alert: None,
        oob: false,
    })
}
