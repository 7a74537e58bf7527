//! Authentication error types.

use thiserror::Error;

use crate::catalog::{CatalogError, GENERIC_FAILURE};

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] ancora_core::EmailError),

    /// A required form field is blank.
    #[error("missing field: {0}")]
    MissingField(&'static str),

    /// Password change rejected before reaching the catalog.
    #[error("password validation failed: {0}")]
    WeakPassword(&'static str),

    /// The catalog refused the request (wrong credentials, email taken).
    #[error("rejected: {0}")]
    Rejected(String),

    /// No token in the session.
    #[error("not authenticated")]
    NotAuthenticated,

    /// Catalog API error.
    #[error("catalog error: {0}")]
    Catalog(CatalogError),

    /// Session store error.
    #[error("session error: {0}")]
    Session(#[from] tower_sessions::session::Error),
}

impl From<CatalogError> for AuthError {
    fn from(e: CatalogError) -> Self {
        match e {
            CatalogError::Status { message, .. } => Self::Rejected(message),
            CatalogError::Unauthorized => Self::NotAuthenticated,
            other => Self::Catalog(other),
        }
    }
}

impl AuthError {
    /// Message shown next to the form.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidEmail(_) => "Informe um e-mail válido.".to_string(),
            Self::MissingField(field) => format!("Preencha o campo {field}."),
            Self::WeakPassword(reason) => (*reason).to_string(),
            Self::Rejected(reason) if reason.trim().is_empty() => GENERIC_FAILURE.to_string(),
            Self::Rejected(reason) => reason.clone(),
            Self::NotAuthenticated => "Sua sessão expirou. Entre novamente.".to_string(),
            Self::Catalog(e) => e.user_message(),
            Self::Session(_) => GENERIC_FAILURE.to_string(),
        }
    }
}
