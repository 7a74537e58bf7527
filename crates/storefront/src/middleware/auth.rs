//! Authentication extractors.
//!
//! A visitor is authenticated when the session holds a catalog bearer
//! token. The profile may be missing (e.g. `/auth/me` was unreachable) and
//! is optional on the extracted [`Visitor`].

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

use crate::catalog::AccessToken;
use crate::models::{CurrentUser, DEFAULT_LOGIN_TARGET, session_keys};

/// An authenticated visitor.
#[derive(Debug, Clone)]
pub struct Visitor {
    pub token: AccessToken,
    pub user: Option<CurrentUser>,
}

/// Extractor that requires authentication.
///
/// Pages are redirected to `/login`; HTMX fragment requests get a bare 401.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(RequireAuth(visitor): RequireAuth) -> impl IntoResponse {
///     format!("token present, user: {:?}", visitor.user)
/// }
/// ```
pub struct RequireAuth(pub Visitor);

/// Error returned when authentication is required but missing.
pub enum AuthRejection {
    /// Redirect to login page (for page requests).
    RedirectToLogin,
    /// Unauthorized response (for HTMX fragment requests).
    Unauthorized,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin => Redirect::to(DEFAULT_LOGIN_TARGET).into_response(),
            Self::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
        }
    }
}

/// Whether the request was issued by HTMX.
#[must_use]
pub fn is_htmx(parts: &Parts) -> bool {
    parts.headers.contains_key("hx-request")
}

async fn load_visitor(session: &Session) -> Option<Visitor> {
    let token = session
        .get::<String>(session_keys::ACCESS_TOKEN)
        .await
        .ok()
        .flatten()
        .filter(|t| !t.is_empty())?;
    let user = session
        .get::<CurrentUser>(session_keys::CURRENT_USER)
        .await
        .ok()
        .flatten();
    Some(Visitor {
        token: AccessToken::new(token),
        user,
    })
}

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let rejection = if is_htmx(parts) {
            AuthRejection::Unauthorized
        } else {
            AuthRejection::RedirectToLogin
        };

        let session = parts.extensions.get::<Session>().ok_or(AuthRejection::Unauthorized)?;

        load_visitor(session).await.map(Self).ok_or(rejection)
    }
}

/// Extractor that optionally gets the authenticated visitor. Never rejects.
pub struct OptionalAuth(pub Option<Visitor>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let visitor = match parts.extensions.get::<Session>() {
            Some(session) => load_visitor(session).await,
            None => None,
        };
        Ok(Self(visitor))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use axum::http::Request;
    use tower_sessions::MemoryStore;

    use super::*;

    fn parts_with(session: Option<Session>, htmx: bool) -> Parts {
        let mut builder = Request::builder().uri("/carrinho");
        if htmx {
            builder = builder.header("hx-request", "true");
        }
        let (mut parts, ()) = builder.body(()).unwrap().into_parts();
        if let Some(session) = session {
            parts.extensions.insert(session);
        }
        parts
    }

    fn session() -> Session {
        Session::new(None, Arc::new(MemoryStore::default()), None)
    }

    #[tokio::test]
    async fn test_require_auth_redirects_pages() {
        let mut parts = parts_with(Some(session()), false);
        let rejection = RequireAuth::from_request_parts(&mut parts, &())
            .await
            .err()
            .unwrap();
        let response = rejection.into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()["location"], "/login");
    }

    #[tokio::test]
    async fn test_require_auth_401_for_fragments() {
        let mut parts = parts_with(Some(session()), true);
        let rejection = RequireAuth::from_request_parts(&mut parts, &())
            .await
            .err()
            .unwrap();
        assert_eq!(rejection.into_response().status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_require_auth_with_token() {
        let session = session();
        session
            .insert(session_keys::ACCESS_TOKEN, "tok")
            .await
            .unwrap();
        let mut parts = parts_with(Some(session), false);
        let RequireAuth(visitor) = RequireAuth::from_request_parts(&mut parts, &())
            .await
            .ok()
            .unwrap();
        assert_eq!(visitor.token.expose(), "tok");
        assert!(visitor.user.is_none());
    }

    #[tokio::test]
    async fn test_optional_auth_never_rejects() {
        let mut parts = parts_with(None, false);
        let OptionalAuth(visitor) = OptionalAuth::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert!(visitor.is_none());
    }
}
