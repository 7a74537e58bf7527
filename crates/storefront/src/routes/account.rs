//! Account route handlers.
//!
//! All routes require authentication via the `RequireAuth` extractor.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::catalog::ProfileUpdate;
use crate::filters;
use crate::middleware::{PageContext, RequireAuth};
use crate::models::{CurrentUser, DEFAULT_LOGIN_TARGET};
use crate::services::{AuthError, SessionContext};
use crate::state::AppState;

use super::views::SearchBoxView;

/// Profile form data. Blank password fields keep the current password.
#[derive(Deserialize)]
pub struct ProfileForm {
    #[serde(default)]
    pub nome: String,
    #[serde(default)]
    pub telefone: String,
    #[serde(default)]
    pub avatar_url: String,
    pub senha_atual: Option<String>,
    pub nova_senha: Option<String>,
}

impl ProfileForm {
    fn changes_password(&self) -> bool {
        [&self.senha_atual, &self.nova_senha]
            .iter()
            .any(|s| s.as_deref().is_some_and(|s| !s.is_empty()))
    }
}

impl From<ProfileForm> for ProfileUpdate {
    fn from(form: ProfileForm) -> Self {
        Self {
            nome: form.nome.trim().to_string(),
            telefone: form.telefone.trim().to_string(),
            avatar_url: form.avatar_url.trim().to_string(),
            senha_atual: form.senha_atual,
            nova_senha: form.nova_senha,
        }
    }
}

/// Outcome banner of a profile update.
#[derive(Debug, Clone)]
pub struct Feedback {
    pub success: bool,
    pub message: String,
}

/// Profile page template.
#[derive(Template, WebTemplate)]
#[template(path = "account/profile.html")]
pub struct ProfileTemplate {
    pub page: PageContext,
    pub search: SearchBoxView,
    pub user: CurrentUser,
    pub feedback: Option<Feedback>,
}

/// Display profile page.
#[instrument(skip_all)]
pub async fn profile(
    State(state): State<AppState>,
    session: Session,
    page: PageContext,
    RequireAuth(visitor): RequireAuth,
) -> impl IntoResponse {
    let search = state.visitors().search_box(&session).await;
    ProfileTemplate {
        search: SearchBoxView::from(&search),
        user: visitor.user.unwrap_or_default(),
        page,
        feedback: None,
    }
}

/// Update profile, optionally changing the password.
#[instrument(skip_all)]
pub async fn update_profile(
    State(state): State<AppState>,
    session: Session,
    mut page: PageContext,
    RequireAuth(visitor): RequireAuth,
    Form(form): Form<ProfileForm>,
) -> Response {
    let ctx = SessionContext::new(state.catalog(), &session, state.config().login_alert_ttl);
    let changes_password = form.changes_password();
    let search = state.visitors().search_box(&session).await;

    let (user, feedback) = match ctx.update_profile(form.into()).await {
        Ok(user) => {
            let message = if changes_password {
                "Senha atualizada com sucesso!"
            } else {
                "Dados atualizados com sucesso!"
            };
            page.user = Some(user.clone());
            (
                user,
                Feedback {
                    success: true,
                    message: message.to_string(),
                },
            )
        }
        Err(AuthError::NotAuthenticated) => return Redirect::to(DEFAULT_LOGIN_TARGET).into_response(),
        Err(e) => {
            tracing::info!(error = %e, "profile update failed");
            (
                visitor.user.unwrap_or_default(),
                Feedback {
                    success: false,
                    message: e.user_message(),
                },
            )
        }
    };

    ProfileTemplate {
        page,
        search: SearchBoxView::from(&search),
        user,
        feedback: Some(feedback),
    }
    .into_response()
}
