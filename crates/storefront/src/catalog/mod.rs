//! Catalog REST API client.
//!
//! # Architecture
//!
//! - The catalog API is the source of truth for products, accounts and carts
//! - `reqwest` with a per-request timeout and bearer-token injection
//! - In-memory caching via `moka` for reference lists and brand lookups
//! - Orchestrators depend on the narrow traits below rather than the
//!   concrete client, so they can be driven by in-memory fakes in tests
//!
//! # Example
//!
//! ```rust,ignore
//! use ancora_storefront::catalog::{CatalogClient, SearchApi};
//!
//! let client = CatalogClient::new(&config.catalog)?;
//! let suggestions = client.autocomplete("disc").await?;
//! ```

mod cache;
mod client;
pub mod params;
pub mod types;

pub use client::CatalogClient;
pub use params::{GuidedFilter, SearchParams};
pub use types::*;

use std::future::Future;

use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use ancora_core::{FamilyId, ManufacturerId, ProductId, SubfamilyId};

/// Message shown when a request fails and the API gave no reason.
pub const GENERIC_FAILURE: &str = "Falha na requisição. Tente novamente.";

/// Message shown when the API could not be reached at all.
pub const NETWORK_FAILURE: &str =
    "Erro de rede ou servidor indisponível. Verifique sua conexão e tente novamente.";

/// Errors that can occur when calling the catalog API.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Network failure, timeout, or unreadable response body.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("catalog returned {status}: {message}")]
    Status {
        /// Response status.
        status: StatusCode,
        /// The body's `error` field, or a generic message.
        message: String,
    },

    /// The response body did not match the expected shape.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The bearer token was rejected on a non-auth endpoint.
    #[error("unauthorized")]
    Unauthorized,
}

impl CatalogError {
    /// Message safe to show to the visitor.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Status { message, .. } => message.clone(),
            Self::Http(_) => NETWORK_FAILURE.to_string(),
            Self::Parse(_) => GENERIC_FAILURE.to_string(),
            Self::Unauthorized => "Sua sessão expirou. Entre novamente.".to_string(),
        }
    }
}

/// Bearer token issued by `/auth/login`.
#[derive(Clone)]
pub struct AccessToken(SecretString);

impl AccessToken {
    /// Wrap a raw token.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(SecretString::from(raw.into()))
    }

    /// The raw token, for the `Authorization` header and session storage.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken([REDACTED])")
    }
}

// =============================================================================
// Traits
// =============================================================================

/// Product search endpoints.
pub trait SearchApi: Send + Sync {
    /// `GET /autocomplete?prefix=`
    fn autocomplete(
        &self,
        prefix: &str,
    ) -> impl Future<Output = Result<Vec<String>, CatalogError>> + Send;

    /// `GET /buscar?produto=&pagina=1&itensPorPagina=200`
    fn brand_search(
        &self,
        term: &str,
    ) -> impl Future<Output = Result<BrandSearch, CatalogError>> + Send;

    /// `GET /pesquisar`
    fn search(
        &self,
        params: &SearchParams,
    ) -> impl Future<Output = Result<SearchPage, CatalogError>> + Send;
}

/// Reference lists for the cascading filter.
pub trait FilterApi: Send + Sync {
    /// `GET /montadoras`
    fn manufacturers(
        &self,
    ) -> impl Future<Output = Result<Vec<FilterOption<ManufacturerId>>, CatalogError>> + Send;

    /// `GET /familias`
    fn families(
        &self,
    ) -> impl Future<Output = Result<Vec<FilterOption<FamilyId>>, CatalogError>> + Send;

    /// `GET /familias/{id}/subfamilias`
    fn subfamilies(
        &self,
        family: &FamilyId,
    ) -> impl Future<Output = Result<Vec<FilterOption<SubfamilyId>>, CatalogError>> + Send;
}

/// Account endpoints.
pub trait AccountApi: Send + Sync {
    /// `POST /auth/login`
    fn login(
        &self,
        email: &str,
        senha: &str,
    ) -> impl Future<Output = Result<AuthEnvelope, CatalogError>> + Send;

    /// `POST /auth/register`
    fn register(
        &self,
        nome: &str,
        email: &str,
        senha: &str,
    ) -> impl Future<Output = Result<AuthEnvelope, CatalogError>> + Send;

    /// `GET /auth/me`
    fn me(
        &self,
        token: &AccessToken,
    ) -> impl Future<Output = Result<AuthEnvelope, CatalogError>> + Send;

    /// `PUT /auth/me`
    fn update_me(
        &self,
        token: &AccessToken,
        update: &ProfileUpdate,
    ) -> impl Future<Output = Result<AuthEnvelope, CatalogError>> + Send;
}

/// Cart endpoints. All require a token.
pub trait CartApi: Send + Sync {
    /// `GET /carrinho`
    fn cart(
        &self,
        token: &AccessToken,
    ) -> impl Future<Output = Result<CartPayload, CatalogError>> + Send;

    /// `POST /carrinho/produto/atualizar-quantidade`
    fn update_quantity(
        &self,
        token: &AccessToken,
        product: &ProductId,
        quantidade: u32,
    ) -> impl Future<Output = Result<Ack, CatalogError>> + Send;

    /// `POST /carrinho/produto/remover`
    fn remove_item(
        &self,
        token: &AccessToken,
        product: &ProductId,
    ) -> impl Future<Output = Result<Ack, CatalogError>> + Send;

    /// `POST /carrinho/limpar`
    fn clear_cart(
        &self,
        token: &AccessToken,
    ) -> impl Future<Output = Result<Ack, CatalogError>> + Send;

    /// `POST /salvar_produto`
    fn save_product(
        &self,
        token: &AccessToken,
        product: &SaveProduct,
    ) -> impl Future<Output = Result<Ack, CatalogError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_uses_status_message() {
        let err = CatalogError::Status {
            status: StatusCode::BAD_REQUEST,
            message: "E-mail já cadastrado".to_string(),
        };
        assert_eq!(err.user_message(), "E-mail já cadastrado");
    }

    #[test]
    fn test_access_token_debug_redacts() {
        let token = AccessToken::new("eyJhbGciOi.secret");
        assert_eq!(token.expose(), "eyJhbGciOi.secret");
        assert!(!format!("{token:?}").contains("secret"));
    }
}
