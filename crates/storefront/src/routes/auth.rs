//! Authentication route handlers.
//!
//! Handles login, registration and logout against the catalog's `/auth`
//! endpoints. Failures re-render the form with the message next to it.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{clear_sentry_user, set_sentry_user};
use crate::filters;
use crate::middleware::PageContext;
use crate::models::{DEFAULT_LOGIN_TARGET, local_path};
use crate::services::SessionContext;
use crate::state::AppState;

/// Where a successful login lands without a `next` target.
const AFTER_LOGIN: &str = "/perfil";

/// Minimum password length accepted at registration.
const MIN_PASSWORD_LENGTH: usize = 3;

// =============================================================================
// Form Types
// =============================================================================

/// Login form data.
#[derive(Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub senha: String,
    pub next: Option<String>,
}

/// Registration form data.
#[derive(Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    pub nome: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub senha: String,
    /// Checkbox; present when ticked.
    pub termos: Option<String>,
}

impl RegisterForm {
    /// Form checks done before calling the catalog.
    fn validate(&self) -> Result<(), &'static str> {
        if self.nome.trim().is_empty() {
            return Err("Informe seu nome.");
        }
        if self.senha.chars().count() < MIN_PASSWORD_LENGTH {
            return Err("A senha deve ter pelo menos 3 caracteres.");
        }
        if self.termos.is_none() {
            return Err("Você precisa aceitar os termos de uso.");
        }
        Ok(())
    }
}

/// Login page query.
#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    pub next: Option<String>,
}

// =============================================================================
// Templates
// =============================================================================

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub page: PageContext,
    pub email: String,
    pub next: String,
    pub error: Option<String>,
}

/// Registration page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/register.html")]
pub struct RegisterTemplate {
    pub page: PageContext,
    pub nome: String,
    pub email: String,
    pub error: Option<String>,
}

/// Post-login target: a local `next`, never the login page itself.
fn login_target(next: Option<&str>) -> &str {
    local_path(next)
        .filter(|p| !p.starts_with(DEFAULT_LOGIN_TARGET))
        .unwrap_or(AFTER_LOGIN)
}

// =============================================================================
// Handlers
// =============================================================================

/// Display login page. Signed-in visitors go home.
#[instrument(skip(page))]
pub async fn login_page(page: PageContext, Query(query): Query<LoginQuery>) -> Response {
    if page.is_signed_in() {
        return Redirect::to("/").into_response();
    }
    LoginTemplate {
        page,
        email: String::new(),
        next: query.next.unwrap_or_default(),
        error: None,
    }
    .into_response()
}

/// Sign in.
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    page: PageContext,
    Form(form): Form<LoginForm>,
) -> Response {
    let ctx = SessionContext::new(state.catalog(), &session, state.config().login_alert_ttl);

    match ctx.login(&form.email, &form.senha).await {
        Ok(envelope) => {
            set_sentry_user(envelope.user.as_ref().and_then(|u| u.id.as_deref()));
            Redirect::to(login_target(form.next.as_deref())).into_response()
        }
        Err(e) => {
            tracing::info!(error = %e, "login failed");
            LoginTemplate {
                page,
                email: form.email,
                next: form.next.unwrap_or_default(),
                error: Some(e.user_message()),
            }
            .into_response()
        }
    }
}

/// Display registration page.
#[instrument(skip(page))]
pub async fn register_page(page: PageContext) -> Response {
    if page.is_signed_in() {
        return Redirect::to("/").into_response();
    }
    RegisterTemplate {
        page,
        nome: String::new(),
        email: String::new(),
        error: None,
    }
    .into_response()
}

/// Create an account and sign in with it.
#[instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    page: PageContext,
    Form(form): Form<RegisterForm>,
) -> Response {
    let result = match form.validate() {
        Ok(()) => {
            let ctx =
                SessionContext::new(state.catalog(), &session, state.config().login_alert_ttl);
            ctx.register(&form.nome, &form.email, &form.senha)
                .await
                .map_err(|e| {
                    tracing::info!(error = %e, "registration failed");
                    e.user_message()
                })
        }
        Err(message) => Err(message.to_string()),
    };

    match result {
        Ok(envelope) => {
            set_sentry_user(envelope.user.as_ref().and_then(|u| u.id.as_deref()));
            Redirect::to("/").into_response()
        }
        Err(error) => RegisterTemplate {
            page,
            nome: form.nome,
            email: form.email,
            error: Some(error),
        }
        .into_response(),
    }
}

/// Sign out.
#[instrument(skip(state, session))]
pub async fn logout(State(state): State<AppState>, session: Session) -> Response {
    let ctx = SessionContext::new(state.catalog(), &session, state.config().login_alert_ttl);
    if let Err(e) = ctx.logout().await {
        tracing::error!(error = %e, "failed to clear session on logout");
    }
    clear_sentry_user();
    Redirect::to("/").into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(nome: &str, senha: &str, termos: bool) -> RegisterForm {
        RegisterForm {
            nome: nome.to_string(),
            email: "ana@example.com".to_string(),
            senha: senha.to_string(),
            termos: termos.then(|| "on".to_string()),
        }
    }

    #[test]
    fn test_register_validation_messages() {
        assert_eq!(form(" ", "abc", true).validate(), Err("Informe seu nome."));
        assert_eq!(
            form("Ana", "ab", true).validate(),
            Err("A senha deve ter pelo menos 3 caracteres.")
        );
        assert_eq!(
            form("Ana", "abc", false).validate(),
            Err("Você precisa aceitar os termos de uso.")
        );
        assert_eq!(form("Ana", "abc", true).validate(), Ok(()));
    }

    #[test]
    fn test_login_target() {
        assert_eq!(login_target(None), "/perfil");
        assert_eq!(login_target(Some("/carrinho")), "/carrinho");
        assert_eq!(login_target(Some("https://evil.example")), "/perfil");
        assert_eq!(login_target(Some("/login?next=/x")), "/perfil");
    }
}
