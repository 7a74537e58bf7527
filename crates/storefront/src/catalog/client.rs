//! Catalog REST API client implementation.
//!
//! Reference lists (manufacturers, families, subfamilies) and brand lookups
//! are cached with `moka` for the configured TTL. Reference lists are
//! idempotent reads and get a second attempt on failure; nothing else is
//! retried.

use std::sync::Arc;

use moka::future::Cache;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use ancora_core::{FamilyId, ManufacturerId, ProductId, SubfamilyId};

use super::cache::{CacheKey, CacheValue};
use super::{
    AccessToken, AccountApi, Ack, AuthEnvelope, BrandSearch, CartApi, CartPayload, CatalogError,
    FilterApi, FilterOption, GENERIC_FAILURE, LoginRequest, ProductDetails, ProfileUpdate,
    RegisterRequest, SaveProduct, SearchApi, SearchPage, SearchParams, SuggestionsPayload,
};
use crate::config::CatalogConfig;

/// Total attempts for reference list requests.
const REFERENCE_ATTEMPTS: u32 = 2;

/// Items requested from `/buscar` when deriving the brand list.
const BRAND_LOOKUP_SIZE: u32 = 200;

/// Maximum number of parameters included in request debug logs.
const LOG_PARAM_LIMIT: usize = 12;

/// Maximum body length included in error logs.
const LOG_BODY_LIMIT: usize = 500;

// =============================================================================
// CatalogClient
// =============================================================================

/// Client for the catalog REST API.
#[derive(Clone)]
pub struct CatalogClient {
    inner: Arc<CatalogClientInner>,
}

struct CatalogClientInner {
    http: reqwest::Client,
    base_url: String,
    cache: Cache<CacheKey, CacheValue>,
}

impl CatalogClient {
    /// Create a new catalog client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built (TLS backend
    /// initialization failure).
    pub fn new(config: &CatalogConfig) -> Result<Self, CatalogError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("ancora-storefront/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(config.cache_ttl)
            .build();

        Ok(Self {
            inner: Arc::new(CatalogClientInner {
                http,
                base_url: config.base_url.clone(),
                cache,
            }),
        })
    }

    /// The normalized base URL requests are sent to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{path}", self.inner.base_url)
        } else {
            format!("{}/{path}", self.inner.base_url)
        }
    }

    fn request(&self, method: Method, path: &str, token: Option<&AccessToken>) -> RequestBuilder {
        let builder = self.inner.http.request(method, self.url(path));
        match token {
            Some(token) => builder.bearer_auth(token.expose()),
            None => builder,
        }
    }

    /// Issue a GET with query parameters.
    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        token: Option<&AccessToken>,
    ) -> Result<T, CatalogError> {
        debug!(
            method = "GET",
            path,
            params = ?query.iter().take(LOG_PARAM_LIMIT).collect::<Vec<_>>(),
            "catalog request"
        );
        let request = self.request(Method::GET, path, token).query(query);
        self.dispatch(request, path).await
    }

    /// Issue a request with a JSON body.
    async fn send_json<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        method: Method,
        path: &str,
        body: &B,
        token: Option<&AccessToken>,
    ) -> Result<T, CatalogError> {
        debug!(
            method = %method,
            path,
            fields = ?body_keys(body),
            "catalog request"
        );
        let request = self.request(method, path, token).json(body);
        self.dispatch(request, path).await
    }

    /// Send a request and decode the response.
    async fn dispatch<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        path: &str,
    ) -> Result<T, CatalogError> {
        let response = request.send().await?;
        let status = response.status();

        // Get response body as text first for better error diagnostics
        let body = response.text().await?;

        if status == StatusCode::UNAUTHORIZED && !is_auth_route(path) {
            tracing::warn!(path, "catalog rejected bearer token");
            return Err(CatalogError::Unauthorized);
        }

        if !status.is_success() {
            tracing::warn!(
                status = %status,
                path,
                body = %truncate(&body, LOG_BODY_LIMIT),
                "catalog API returned non-success status"
            );
            return Err(CatalogError::Status {
                status,
                message: error_message(&body),
            });
        }

        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(
                error = %e,
                path,
                body = %truncate(&body, LOG_BODY_LIMIT),
                "Failed to parse catalog response"
            );
            CatalogError::Parse(e)
        })
    }

    /// GET a reference list, with one retry.
    async fn get_reference<T: DeserializeOwned>(&self, path: &str) -> Result<T, CatalogError> {
        let mut attempt = 1;
        loop {
            match self.get(path, &[], None).await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < REFERENCE_ATTEMPTS => {
                    tracing::warn!(attempt, path, error = %e, "Retrying catalog reference request");
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    // =========================================================================
    // Other endpoints
    // =========================================================================

    /// Check catalog API availability (`GET /health`).
    ///
    /// # Errors
    ///
    /// Returns an error if the API is unreachable or unhealthy.
    #[instrument(skip(self))]
    pub async fn health(&self) -> Result<(), CatalogError> {
        let response = self.request(Method::GET, "/health", None).send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(CatalogError::Status {
                status,
                message: GENERIC_FAILURE.to_string(),
            })
        }
    }

    /// Get a product with its similar products (`GET /produto_detalhes`).
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the payload is malformed.
    #[instrument(skip(self))]
    pub async fn product_details(
        &self,
        id: &ProductId,
        nome_produto: &str,
    ) -> Result<ProductDetails, CatalogError> {
        self.get(
            "/produto_detalhes",
            &[
                ("id", id.to_string()),
                ("nomeProduto", nome_produto.to_string()),
            ],
            None,
        )
        .await
    }
}

// =============================================================================
// Search
// =============================================================================

impl SearchApi for CatalogClient {
    #[instrument(skip(self))]
    async fn autocomplete(&self, prefix: &str) -> Result<Vec<String>, CatalogError> {
        let payload: SuggestionsPayload = self
            .get("/autocomplete", &[("prefix", prefix.to_string())], None)
            .await?;
        Ok(payload.into_suggestions())
    }

    #[instrument(skip(self))]
    async fn brand_search(&self, term: &str) -> Result<BrandSearch, CatalogError> {
        let key = CacheKey::Brands(term.to_lowercase());
        if let Some(CacheValue::Brands(brands)) = self.inner.cache.get(&key).await {
            debug!("Cache hit for brand lookup");
            return Ok(brands.as_ref().clone());
        }

        let brands: BrandSearch = self
            .get(
                "/buscar",
                &[
                    ("produto", term.to_string()),
                    ("pagina", "1".to_string()),
                    ("itensPorPagina", BRAND_LOOKUP_SIZE.to_string()),
                ],
                None,
            )
            .await?;

        self.inner
            .cache
            .insert(key, CacheValue::Brands(Arc::new(brands.clone())))
            .await;
        Ok(brands)
    }

    #[instrument(skip(self))]
    async fn search(&self, params: &SearchParams) -> Result<SearchPage, CatalogError> {
        self.get("/pesquisar", &params.query_pairs(), None).await
    }
}

// =============================================================================
// Reference lists
// =============================================================================

impl FilterApi for CatalogClient {
    #[instrument(skip(self))]
    async fn manufacturers(&self) -> Result<Vec<FilterOption<ManufacturerId>>, CatalogError> {
        if let Some(CacheValue::Manufacturers(list)) =
            self.inner.cache.get(&CacheKey::Manufacturers).await
        {
            debug!("Cache hit for manufacturers");
            return Ok(list.as_ref().clone());
        }

        let list: Vec<FilterOption<ManufacturerId>> = self.get_reference("/montadoras").await?;
        self.inner
            .cache
            .insert(
                CacheKey::Manufacturers,
                CacheValue::Manufacturers(Arc::new(list.clone())),
            )
            .await;
        Ok(list)
    }

    #[instrument(skip(self))]
    async fn families(&self) -> Result<Vec<FilterOption<FamilyId>>, CatalogError> {
        if let Some(CacheValue::Families(list)) = self.inner.cache.get(&CacheKey::Families).await {
            debug!("Cache hit for families");
            return Ok(list.as_ref().clone());
        }

        let list: Vec<FilterOption<FamilyId>> = self.get_reference("/familias").await?;
        self.inner
            .cache
            .insert(CacheKey::Families, CacheValue::Families(Arc::new(list.clone())))
            .await;
        Ok(list)
    }

    #[instrument(skip(self), fields(family = %family))]
    async fn subfamilies(
        &self,
        family: &FamilyId,
    ) -> Result<Vec<FilterOption<SubfamilyId>>, CatalogError> {
        let key = CacheKey::Subfamilies(family.clone());
        if let Some(CacheValue::Subfamilies(list)) = self.inner.cache.get(&key).await {
            debug!("Cache hit for subfamilies");
            return Ok(list.as_ref().clone());
        }

        let path = format!("/familias/{}/subfamilias", urlencoding::encode(family.as_str()));
        let list: Vec<FilterOption<SubfamilyId>> = self.get_reference(&path).await?;
        self.inner
            .cache
            .insert(key, CacheValue::Subfamilies(Arc::new(list.clone())))
            .await;
        Ok(list)
    }
}

// =============================================================================
// Accounts
// =============================================================================

impl AccountApi for CatalogClient {
    #[instrument(skip(self, senha))]
    async fn login(&self, email: &str, senha: &str) -> Result<AuthEnvelope, CatalogError> {
        self.send_json(
            Method::POST,
            "/auth/login",
            &LoginRequest { email, senha },
            None,
        )
        .await
    }

    #[instrument(skip(self, senha))]
    async fn register(
        &self,
        nome: &str,
        email: &str,
        senha: &str,
    ) -> Result<AuthEnvelope, CatalogError> {
        self.send_json(
            Method::POST,
            "/auth/register",
            &RegisterRequest { nome, email, senha },
            None,
        )
        .await
    }

    #[instrument(skip(self, token))]
    async fn me(&self, token: &AccessToken) -> Result<AuthEnvelope, CatalogError> {
        self.get("/auth/me", &[], Some(token)).await
    }

    #[instrument(skip(self, token, update))]
    async fn update_me(
        &self,
        token: &AccessToken,
        update: &ProfileUpdate,
    ) -> Result<AuthEnvelope, CatalogError> {
        self.send_json(Method::PUT, "/auth/me", update, Some(token))
            .await
    }
}

// =============================================================================
// Cart
// =============================================================================

#[derive(Serialize)]
struct QuantityUpdate<'a> {
    id_api_externa: &'a ProductId,
    quantidade: u32,
}

#[derive(Serialize)]
struct ItemRef<'a> {
    id_api_externa: &'a ProductId,
}

impl CartApi for CatalogClient {
    #[instrument(skip(self, token))]
    async fn cart(&self, token: &AccessToken) -> Result<CartPayload, CatalogError> {
        self.get("/carrinho", &[], Some(token)).await
    }

    #[instrument(skip(self, token), fields(product = %product))]
    async fn update_quantity(
        &self,
        token: &AccessToken,
        product: &ProductId,
        quantidade: u32,
    ) -> Result<Ack, CatalogError> {
        self.send_json(
            Method::POST,
            "/carrinho/produto/atualizar-quantidade",
            &QuantityUpdate {
                id_api_externa: product,
                quantidade,
            },
            Some(token),
        )
        .await
    }

    #[instrument(skip(self, token), fields(product = %product))]
    async fn remove_item(
        &self,
        token: &AccessToken,
        product: &ProductId,
    ) -> Result<Ack, CatalogError> {
        self.send_json(
            Method::POST,
            "/carrinho/produto/remover",
            &ItemRef {
                id_api_externa: product,
            },
            Some(token),
        )
        .await
    }

    #[instrument(skip(self, token))]
    async fn clear_cart(&self, token: &AccessToken) -> Result<Ack, CatalogError> {
        self.send_json(
            Method::POST,
            "/carrinho/limpar",
            &serde_json::json!({}),
            Some(token),
        )
        .await
    }

    #[instrument(skip(self, token, product), fields(product = %product.id_api_externa))]
    async fn save_product(
        &self,
        token: &AccessToken,
        product: &SaveProduct,
    ) -> Result<Ack, CatalogError> {
        self.send_json(Method::POST, "/salvar_produto", product, Some(token))
            .await
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Login and registration answer 401 for bad credentials; that is a form
/// error, not an expired session.
fn is_auth_route(path: &str) -> bool {
    path.starts_with("/auth/login") || path.starts_with("/auth/register")
}

/// Extract the `error` field of an error body, or a generic message.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .or_else(|| v.get("message"))
                .and_then(serde_json::Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
        })
        .unwrap_or_else(|| GENERIC_FAILURE.to_string())
}

/// Top-level field names of a JSON body, for logging without values.
fn body_keys<B: Serialize>(body: &B) -> Vec<String> {
    match serde_json::to_value(body) {
        Ok(serde_json::Value::Object(map)) => {
            map.keys().take(LOG_PARAM_LIMIT).cloned().collect()
        }
        _ => Vec::new(),
    }
}

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
