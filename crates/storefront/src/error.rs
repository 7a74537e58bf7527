//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. Handlers that cannot degrade to an empty view
//! return `Result<T, AppError>`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::catalog::CatalogError;
use crate::cascade::CascadeError;
use crate::services::{AuthError, CartError};

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Catalog API operation failed.
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Cart operation failed.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// Cascade selection rejected.
    #[error("Cascade error: {0}")]
    Cascade(#[from] CascadeError),

    /// Session store failed.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl AppError {
    const fn status(&self) -> StatusCode {
        match self {
            Self::Session(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Catalog(CatalogError::Unauthorized)
            | Self::Auth(AuthError::NotAuthenticated)
            | Self::Cart(CartError::Unauthorized) => StatusCode::UNAUTHORIZED,
            Self::Catalog(_) | Self::Cart(CartError::Catalog(_)) => StatusCode::BAD_GATEWAY,
            Self::Auth(AuthError::Session(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Auth(AuthError::Catalog(_)) => StatusCode::BAD_GATEWAY,
            Self::Auth(_) | Self::Cart(_) | Self::Cascade(_) | Self::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
        }
    }

    /// Message safe to show to the visitor.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Session(_) => "Erro interno. Tente novamente.".to_string(),
            Self::Catalog(e) => e.user_message(),
            Self::Auth(e) => e.user_message(),
            Self::Cart(e) => e.user_message(),
            Self::Cascade(e) => e.user_message(),
            Self::BadRequest(message) => message.clone(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, status = %status, "Request rejected");
        }

        // Don't expose internal error details to clients
        (status, self.user_message()).into_response()
    }
}

/// Set the Sentry user context.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: user_id.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added product", Some(&[("product_id", "123")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::cascade::Level;

    #[test]
    fn test_app_error_display() {
        let err = AppError::BadRequest("parâmetros inválidos".to_string());
        assert_eq!(err.to_string(), "Bad request: parâmetros inválidos");
    }

    #[test]
    fn test_app_error_status_codes() {
        fn get_status(err: AppError) -> StatusCode {
            err.into_response().status()
        }

        assert_eq!(
            get_status(AppError::BadRequest("test".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Catalog(CatalogError::Unauthorized)),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::Cart(CartError::BelowMinimum)),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Cascade(CascadeError::ParentEmpty {
                level: Level::Family,
                parent: Level::Manufacturer,
            })),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Auth(AuthError::Catalog(CatalogError::Parse(
                serde_json::from_str::<u32>("x").unwrap_err()
            )))),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_internal_details_hidden() {
        let err = AppError::Catalog(CatalogError::Parse(
            serde_json::from_str::<u32>("\"pool\"").unwrap_err(),
        ));
        assert!(!err.user_message().contains("pool"));
        assert!(!err.user_message().contains("invalid type"));
    }
}
