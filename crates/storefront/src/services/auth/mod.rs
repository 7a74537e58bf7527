//! Session and authentication context.
//!
//! Holds the catalog bearer token, the signed-in profile and the derived
//! cart counter in the visitor session, and raises the "login required"
//! prompt for gated actions.
//!
//! # Lifecycle
//!
//! - First request of a session: [`SessionContext::hydrate`] checks a
//!   persisted token against `/auth/me`
//! - Login, registration, profile update: profile and counter refreshed
//! - Logout, or a 401 from any non-auth catalog call: token, profile and
//!   counter cleared

mod error;

pub use error::AuthError;

use std::time::Duration;

use tower_sessions::Session;
use tracing::instrument;

use ancora_core::Email;

use crate::catalog::{
    AccessToken, AccountApi, AuthEnvelope, CartApi, CatalogError, ProfileUpdate, UserProfile,
};
use crate::models::{CurrentUser, LoginAlert, session_keys};

/// Minimum length of a new password.
const MIN_PASSWORD_LENGTH: usize = 3;

/// Per-request view of the visitor's authentication state.
pub struct SessionContext<'a, C> {
    api: &'a C,
    session: &'a Session,
    alert_ttl: Duration,
}

impl<'a, C> SessionContext<'a, C>
where
    C: AccountApi + CartApi,
{
    /// Create a context over the visitor's session.
    #[must_use]
    pub const fn new(api: &'a C, session: &'a Session, alert_ttl: Duration) -> Self {
        Self {
            api,
            session,
            alert_ttl,
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// The stored bearer token, if any.
    pub async fn token(&self) -> Option<AccessToken> {
        self.session
            .get::<String>(session_keys::ACCESS_TOKEN)
            .await
            .ok()
            .flatten()
            .filter(|t| !t.is_empty())
            .map(AccessToken::new)
    }

    /// The signed-in profile, if any.
    pub async fn current_user(&self) -> Option<CurrentUser> {
        self.session
            .get::<CurrentUser>(session_keys::CURRENT_USER)
            .await
            .ok()
            .flatten()
    }

    /// The last computed cart counter.
    pub async fn cart_count(&self) -> u32 {
        self.session
            .get::<u32>(session_keys::CART_COUNT)
            .await
            .ok()
            .flatten()
            .unwrap_or(0)
    }

    // =========================================================================
    // Login / logout
    // =========================================================================

    /// Sign in with email and password.
    ///
    /// On success the token and profile are stored, the session id is
    /// rotated and the cart counter refreshed. Returns the catalog's
    /// envelope.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` or `AuthError::MissingField` for bad
    /// input, `AuthError::Rejected` with the catalog's message when the
    /// credentials are refused, or a catalog/session error.
    #[instrument(skip(self, senha))]
    pub async fn login(&self, email: &str, senha: &str) -> Result<AuthEnvelope, AuthError> {
        let email = Email::parse(email)?;
        if senha.is_empty() {
            return Err(AuthError::MissingField("senha"));
        }

        let envelope = self.api.login(email.as_str(), senha).await?;
        let token = match (&envelope.token, envelope.success) {
            (Some(token), true) if !token.is_empty() => AccessToken::new(token.as_str()),
            _ => {
                return Err(AuthError::Rejected(
                    envelope.error.clone().unwrap_or_default(),
                ));
            }
        };

        let profile = match &envelope.user {
            Some(user) => user.clone(),
            None => self.fetch_profile(&token).await?,
        };

        self.session.cycle_id().await?;
        self.session
            .insert(session_keys::ACCESS_TOKEN, token.expose())
            .await?;
        self.store_user(profile).await?;
        self.session.insert(session_keys::HYDRATED, true).await?;
        self.fetch_cart_count().await;

        tracing::info!("visitor signed in");
        Ok(envelope)
    }

    /// Create an account, then sign in with it.
    ///
    /// # Errors
    ///
    /// Same as [`Self::login`], plus `AuthError::Rejected` when the catalog
    /// refuses the registration (e.g. email already in use).
    #[instrument(skip(self, senha))]
    pub async fn register(
        &self,
        nome: &str,
        email: &str,
        senha: &str,
    ) -> Result<AuthEnvelope, AuthError> {
        let nome = nome.trim();
        if nome.is_empty() {
            return Err(AuthError::MissingField("nome"));
        }
        let email = Email::parse(email)?;
        if senha.is_empty() {
            return Err(AuthError::MissingField("senha"));
        }

        let envelope = self.api.register(nome, email.as_str(), senha).await?;
        if !envelope.success {
            return Err(AuthError::Rejected(envelope.error.unwrap_or_default()));
        }

        self.login(email.as_str(), senha).await
    }

    /// Sign out: forget token, profile and cart counter.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be modified.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<(), AuthError> {
        self.clear_credentials().await?;
        self.session.cycle_id().await?;
        tracing::info!("visitor signed out");
        Ok(())
    }

    /// Handle a 401 from a non-auth catalog call: the token is gone.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be modified.
    pub async fn handle_unauthorized(&self) -> Result<(), AuthError> {
        tracing::warn!("catalog token rejected, clearing session credentials");
        self.clear_credentials().await
    }

    async fn clear_credentials(&self) -> Result<(), AuthError> {
        self.session
            .remove::<String>(session_keys::ACCESS_TOKEN)
            .await?;
        self.session
            .remove::<CurrentUser>(session_keys::CURRENT_USER)
            .await?;
        self.session.remove::<u32>(session_keys::CART_COUNT).await?;
        Ok(())
    }

    // =========================================================================
    // Hydration and profile
    // =========================================================================

    /// Check a persisted token once per session.
    ///
    /// The first call with a token asks `/auth/me`; a 401 clears the token,
    /// other failures keep it for the next request to use. Later calls do
    /// nothing.
    #[instrument(skip(self))]
    pub async fn hydrate(&self) -> Result<(), AuthError> {
        let hydrated = self
            .session
            .get::<bool>(session_keys::HYDRATED)
            .await?
            .unwrap_or(false);
        if hydrated {
            return Ok(());
        }
        self.session.insert(session_keys::HYDRATED, true).await?;

        let Some(token) = self.token().await else {
            return Ok(());
        };

        match self.fetch_profile(&token).await {
            Ok(profile) => {
                self.store_user(profile).await?;
                self.fetch_cart_count().await;
                Ok(())
            }
            Err(AuthError::NotAuthenticated) => self.handle_unauthorized().await,
            Err(e) => {
                tracing::warn!(error = %e, "could not refresh profile");
                Ok(())
            }
        }
    }

    /// Update the profile, optionally changing the password.
    ///
    /// A password change needs both the current and the new password, and
    /// the new one must have at least 3 characters.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::WeakPassword` on invalid password input,
    /// `AuthError::NotAuthenticated` without a token (or on 401, which also
    /// clears it), `AuthError::Rejected` when the catalog refuses the update.
    #[instrument(skip(self, update))]
    pub async fn update_profile(&self, update: ProfileUpdate) -> Result<CurrentUser, AuthError> {
        let update = validate_profile_update(update)?;
        let token = self.token().await.ok_or(AuthError::NotAuthenticated)?;

        let envelope = match self.api.update_me(&token, &update).await {
            Ok(envelope) => envelope,
            Err(CatalogError::Unauthorized) => {
                self.handle_unauthorized().await?;
                return Err(AuthError::NotAuthenticated);
            }
            Err(e) => return Err(e.into()),
        };
        if !envelope.success {
            return Err(AuthError::Rejected(envelope.error.unwrap_or_default()));
        }

        let profile = match envelope.user {
            Some(user) => user,
            None => self.fetch_profile(&token).await?,
        };
        self.store_user(profile).await
    }

    async fn fetch_profile(&self, token: &AccessToken) -> Result<UserProfile, AuthError> {
        let envelope = self.api.me(token).await?;
        match envelope.user {
            Some(user) if envelope.success || envelope.error.is_none() => Ok(user),
            _ => Err(AuthError::Rejected(envelope.error.unwrap_or_default())),
        }
    }

    async fn store_user(&self, profile: UserProfile) -> Result<CurrentUser, AuthError> {
        let user = CurrentUser::from(profile);
        self.session
            .insert(session_keys::CURRENT_USER, &user)
            .await?;
        sentry::configure_scope(|scope| {
            scope.set_user(Some(sentry::User {
                id: user.id.clone(),
                ..Default::default()
            }));
        });
        Ok(user)
    }

    // =========================================================================
    // Cart counter
    // =========================================================================

    /// Recompute the cart counter as the sum of cart line quantities.
    ///
    /// Without a token this returns 0 and makes no catalog call. Any failure
    /// yields 0; a 401 also clears the token.
    #[instrument(skip(self))]
    pub async fn fetch_cart_count(&self) -> u32 {
        let count = match self.token().await {
            None => 0,
            Some(token) => match self.api.cart(&token).await {
                Ok(payload) if payload.success => payload
                    .produtos
                    .iter()
                    .map(|item| item.quantidade)
                    .fold(0, u32::saturating_add),
                Ok(payload) => {
                    tracing::warn!(error = ?payload.error, "cart reported failure");
                    0
                }
                Err(CatalogError::Unauthorized) => {
                    if let Err(e) = self.handle_unauthorized().await {
                        tracing::error!(error = %e, "failed to clear session credentials");
                    }
                    0
                }
                Err(e) => {
                    tracing::warn!(error = %e, "failed to load cart count");
                    0
                }
            },
        };

        if let Err(e) = self.session.insert(session_keys::CART_COUNT, count).await {
            tracing::error!(error = %e, "failed to store cart count");
        }
        count
    }

    // =========================================================================
    // Login prompt
    // =========================================================================

    /// Show the "login required" prompt.
    ///
    /// Ignored while a prompt is already visible. Returns whether a new
    /// prompt was shown.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be modified.
    pub async fn trigger_login_alert(&self, redirect_to: Option<&str>) -> Result<bool, AuthError> {
        if self.login_alert().await.is_some() {
            return Ok(false);
        }
        let alert = LoginAlert::new(redirect_to, now_ms());
        self.session.insert(session_keys::LOGIN_ALERT, &alert).await?;
        Ok(true)
    }

    /// The visible prompt, if any. Expired prompts are discarded.
    pub async fn login_alert(&self) -> Option<LoginAlert> {
        let alert = self
            .session
            .get::<LoginAlert>(session_keys::LOGIN_ALERT)
            .await
            .ok()
            .flatten()?;
        if alert.is_visible(now_ms(), self.alert_ttl) {
            Some(alert)
        } else {
            if let Err(e) = self
                .session
                .remove::<LoginAlert>(session_keys::LOGIN_ALERT)
                .await
            {
                tracing::warn!(error = %e, "failed to drop expired login prompt");
            }
            None
        }
    }

    /// Close the prompt.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be modified.
    pub async fn dismiss_login_alert(&self) -> Result<(), AuthError> {
        self.session
            .remove::<LoginAlert>(session_keys::LOGIN_ALERT)
            .await?;
        Ok(())
    }
}

/// Check the password fields of a profile update.
///
/// Blank password fields mean "keep the current password".
///
/// # Errors
///
/// Returns `AuthError::WeakPassword` when only one of the two password
/// fields is filled or the new password is too short.
pub fn validate_profile_update(mut update: ProfileUpdate) -> Result<ProfileUpdate, AuthError> {
    let current = update.senha_atual.take().filter(|s| !s.is_empty());
    let new = update.nova_senha.take().filter(|s| !s.is_empty());

    match (current, new) {
        (None, None) => {}
        (Some(current), Some(new)) => {
            if new.chars().count() < MIN_PASSWORD_LENGTH {
                return Err(AuthError::WeakPassword(
                    "A nova senha deve ter pelo menos 3 caracteres.",
                ));
            }
            update.senha_atual = Some(current);
            update.nova_senha = Some(new);
        }
        _ => {
            return Err(AuthError::WeakPassword(
                "Para trocar a senha, preencha a senha atual e a nova senha.",
            ));
        }
    }

    update.nome = update.nome.trim().to_string();
    update.telefone = update.telefone.trim().to_string();
    update.avatar_url = update.avatar_url.trim().to_string();
    Ok(update)
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use reqwest::StatusCode;
    use serde_json::json;
    use tower_sessions::MemoryStore;

    use ancora_core::ProductId;

    use super::*;
    use crate::catalog::{Ack, CartPayload, SaveProduct};

    /// In-memory catalog accepting `ana@example.com` / `123`.
    #[derive(Default)]
    struct FakeAccounts {
        cart_calls: AtomicUsize,
        me_calls: AtomicUsize,
        expired: bool,
        huge_cart: bool,
    }

    fn profile() -> UserProfile {
        serde_json::from_value(json!({"id": 7, "nome": "Ana Souza", "email": "ana@example.com"}))
            .unwrap()
    }

    impl AccountApi for FakeAccounts {
        async fn login(&self, email: &str, senha: &str) -> Result<AuthEnvelope, CatalogError> {
            if email == "ana@example.com" && senha == "123" {
                Ok(AuthEnvelope {
                    success: true,
                    token: Some("tok-ana".to_string()),
                    user: Some(profile()),
                    error: None,
                })
            } else {
                Err(CatalogError::Status {
                    status: StatusCode::UNAUTHORIZED,
                    message: "Credenciais inválidas".to_string(),
                })
            }
        }

        async fn register(
            &self,
            _nome: &str,
            email: &str,
            _senha: &str,
        ) -> Result<AuthEnvelope, CatalogError> {
            if email == "ana@example.com" {
                Ok(AuthEnvelope {
                    success: true,
                    ..AuthEnvelope::default()
                })
            } else {
                Err(CatalogError::Status {
                    status: StatusCode::CONFLICT,
                    message: "E-mail já cadastrado".to_string(),
                })
            }
        }

        async fn me(&self, _token: &AccessToken) -> Result<AuthEnvelope, CatalogError> {
            self.me_calls.fetch_add(1, Ordering::SeqCst);
            if self.expired {
                return Err(CatalogError::Unauthorized);
            }
            Ok(AuthEnvelope {
                success: true,
                user: Some(profile()),
                ..AuthEnvelope::default()
            })
        }

        async fn update_me(
            &self,
            _token: &AccessToken,
            update: &ProfileUpdate,
        ) -> Result<AuthEnvelope, CatalogError> {
            let mut user = profile();
            user.nome.clone_from(&update.nome);
            Ok(AuthEnvelope {
                success: true,
                user: Some(user),
                ..AuthEnvelope::default()
            })
        }
    }

    impl CartApi for FakeAccounts {
        async fn cart(&self, _token: &AccessToken) -> Result<CartPayload, CatalogError> {
            self.cart_calls.fetch_add(1, Ordering::SeqCst);
            if self.expired {
                return Err(CatalogError::Unauthorized);
            }
            if self.huge_cart {
                return Ok(serde_json::from_value(json!({
                    "success": true,
                    "produtos": [
                        {"id_api_externa": 1, "quantidade": u32::MAX},
                        {"id_api_externa": 2, "quantidade": 5}
                    ]
                }))
                .unwrap());
            }
            Ok(serde_json::from_value(json!({
                "success": true,
                "produtos": [
                    {"id_api_externa": 1, "quantidade": 2},
                    {"id_api_externa": 2, "quantidade": 3}
                ]
            }))
            .unwrap())
        }

        async fn update_quantity(
            &self,
            _token: &AccessToken,
            _product: &ProductId,
            _quantidade: u32,
        ) -> Result<Ack, CatalogError> {
            Ok(Ack::default())
        }

        async fn remove_item(
            &self,
            _token: &AccessToken,
            _product: &ProductId,
        ) -> Result<Ack, CatalogError> {
            Ok(Ack::default())
        }

        async fn clear_cart(&self, _token: &AccessToken) -> Result<Ack, CatalogError> {
            Ok(Ack::default())
        }

        async fn save_product(
            &self,
            _token: &AccessToken,
            _product: &SaveProduct,
        ) -> Result<Ack, CatalogError> {
            Ok(Ack::default())
        }
    }

    fn session() -> Session {
        Session::new(None, Arc::new(MemoryStore::default()), None)
    }

    const TTL: Duration = Duration::from_secs(6);

    #[tokio::test]
    async fn test_cart_count_without_token_makes_no_call() {
        let api = FakeAccounts::default();
        let session = session();
        let ctx = SessionContext::new(&api, &session, TTL);

        assert_eq!(ctx.fetch_cart_count().await, 0);
        assert_eq!(api.cart_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_login_stores_token_user_and_count() {
        let api = FakeAccounts::default();
        let session = session();
        let ctx = SessionContext::new(&api, &session, TTL);

        let envelope = ctx.login("ana@example.com", "123").await.unwrap();
        assert!(envelope.success);
        assert_eq!(ctx.token().await.unwrap().expose(), "tok-ana");
        assert_eq!(ctx.current_user().await.unwrap().nome, "Ana Souza");
        assert_eq!(ctx.cart_count().await, 5);
    }

    #[tokio::test]
    async fn test_cart_count_saturates() {
        let api = FakeAccounts {
            huge_cart: true,
            ..FakeAccounts::default()
        };
        let session = session();
        let ctx = SessionContext::new(&api, &session, TTL);

        ctx.login("ana@example.com", "123").await.unwrap();
        assert_eq!(ctx.fetch_cart_count().await, u32::MAX);
    }

    #[tokio::test]
    async fn test_login_rejected_keeps_session_anonymous() {
        let api = FakeAccounts::default();
        let session = session();
        let ctx = SessionContext::new(&api, &session, TTL);

        let err = ctx.login("ana@example.com", "errada").await.unwrap_err();
        assert_eq!(err.user_message(), "Credenciais inválidas");
        assert!(ctx.token().await.is_none());
    }

    #[tokio::test]
    async fn test_login_validates_email() {
        let api = FakeAccounts::default();
        let session = session();
        let ctx = SessionContext::new(&api, &session, TTL);
        assert!(matches!(
            ctx.login("nao-e-email", "123").await,
            Err(AuthError::InvalidEmail(_))
        ));
    }

    #[tokio::test]
    async fn test_logout_clears_everything() {
        let api = FakeAccounts::default();
        let session = session();
        let ctx = SessionContext::new(&api, &session, TTL);

        ctx.login("ana@example.com", "123").await.unwrap();
        ctx.logout().await.unwrap();

        assert!(ctx.token().await.is_none());
        assert!(ctx.current_user().await.is_none());
        assert_eq!(ctx.cart_count().await, 0);
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let api = FakeAccounts::default();
        let session = session();
        let ctx = SessionContext::new(&api, &session, TTL);

        ctx.register("Ana", "ana@example.com", "123").await.unwrap();
        assert!(ctx.token().await.is_some());

        let err = ctx
            .register("Bia", "bia@example.com", "123")
            .await
            .unwrap_err();
        assert_eq!(err.user_message(), "E-mail já cadastrado");
    }

    #[tokio::test]
    async fn test_hydrate_runs_once() {
        let api = FakeAccounts::default();
        let session = session();
        session
            .insert(session_keys::ACCESS_TOKEN, "tok-ana")
            .await
            .unwrap();
        let ctx = SessionContext::new(&api, &session, TTL);

        ctx.hydrate().await.unwrap();
        ctx.hydrate().await.unwrap();

        assert_eq!(api.me_calls.load(Ordering::SeqCst), 1);
        assert_eq!(ctx.current_user().await.unwrap().email, "ana@example.com");
        assert_eq!(ctx.cart_count().await, 5);
    }

    #[tokio::test]
    async fn test_hydrate_with_expired_token_clears_it() {
        let api = FakeAccounts {
            expired: true,
            ..FakeAccounts::default()
        };
        let session = session();
        session
            .insert(session_keys::ACCESS_TOKEN, "tok-velho")
            .await
            .unwrap();
        let ctx = SessionContext::new(&api, &session, TTL);

        ctx.hydrate().await.unwrap();
        assert!(ctx.token().await.is_none());
    }

    #[tokio::test]
    async fn test_unauthorized_cart_clears_token() {
        let api = FakeAccounts {
            expired: true,
            ..FakeAccounts::default()
        };
        let session = session();
        session
            .insert(session_keys::ACCESS_TOKEN, "tok-velho")
            .await
            .unwrap();
        let ctx = SessionContext::new(&api, &session, TTL);

        assert_eq!(ctx.fetch_cart_count().await, 0);
        assert!(ctx.token().await.is_none());
    }

    #[tokio::test]
    async fn test_login_alert_is_not_reentrant() {
        let api = FakeAccounts::default();
        let session = session();
        let ctx = SessionContext::new(&api, &session, TTL);

        assert!(ctx.trigger_login_alert(None).await.unwrap());
        assert!(!ctx.trigger_login_alert(Some("/cadastro")).await.unwrap());
        assert_eq!(ctx.login_alert().await.unwrap().redirect_to, "/login");

        ctx.dismiss_login_alert().await.unwrap();
        assert!(ctx.login_alert().await.is_none());
        assert!(ctx.trigger_login_alert(Some("/cadastro")).await.unwrap());
    }

    #[tokio::test]
    async fn test_expired_alert_is_hidden() {
        let api = FakeAccounts::default();
        let session = session();
        let ctx = SessionContext::new(&api, &session, Duration::ZERO);

        ctx.trigger_login_alert(None).await.unwrap();
        assert!(ctx.login_alert().await.is_none());
        assert!(
            session
                .get::<LoginAlert>(session_keys::LOGIN_ALERT)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_update_profile_requires_token() {
        let api = FakeAccounts::default();
        let session = session();
        let ctx = SessionContext::new(&api, &session, TTL);

        let err = ctx
            .update_profile(ProfileUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::NotAuthenticated));
    }

    #[tokio::test]
    async fn test_update_profile_refreshes_user() {
        let api = FakeAccounts::default();
        let session = session();
        let ctx = SessionContext::new(&api, &session, TTL);
        ctx.login("ana@example.com", "123").await.unwrap();

        let user = ctx
            .update_profile(ProfileUpdate {
                nome: " Ana Lima ".to_string(),
                ..ProfileUpdate::default()
            })
            .await
            .unwrap();
        assert_eq!(user.nome, "Ana Lima");
        assert_eq!(ctx.current_user().await.unwrap().nome, "Ana Lima");
    }

    #[test]
    fn test_password_change_needs_both_fields() {
        let err = validate_profile_update(ProfileUpdate {
            nova_senha: Some("abcd".to_string()),
            ..ProfileUpdate::default()
        })
        .unwrap_err();
        assert_eq!(
            err.user_message(),
            "Para trocar a senha, preencha a senha atual e a nova senha."
        );
    }

    #[test]
    fn test_new_password_min_length() {
        let err = validate_profile_update(ProfileUpdate {
            senha_atual: Some("old".to_string()),
            nova_senha: Some("ab".to_string()),
            ..ProfileUpdate::default()
        })
        .unwrap_err();
        assert_eq!(
            err.user_message(),
            "A nova senha deve ter pelo menos 3 caracteres."
        );
    }

    #[test]
    fn test_blank_password_fields_are_dropped() {
        let update = validate_profile_update(ProfileUpdate {
            nome: "Ana".to_string(),
            senha_atual: Some(String::new()),
            nova_senha: Some(String::new()),
            ..ProfileUpdate::default()
        })
        .unwrap();
        assert!(update.senha_atual.is_none());
        assert!(update.nova_senha.is_none());
    }
}
