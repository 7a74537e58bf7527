//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                       - Home page (guided search + highlights)
//! GET  /resultados             - Text search results
//! GET  /produto                - Product detail (?id=&nomeProduto=)
//! GET  /health                 - Liveness
//! GET  /health/ready           - Readiness (catalog reachable)
//!
//! # Search (HTMX fragments)
//! GET  /search/suggest         - Debounced suggestions (204 when superseded)
//! POST /search/toggle          - Open/close/pick from the suggestion panel
//! GET  /search/brands          - Brand select for a term
//!
//! # Guided search (HTMX fragments)
//! POST /cascade/montadora      - Select manufacturer
//! POST /cascade/familia        - Select family
//! POST /cascade/subfamilia     - Select subfamily
//!
//! # Cart
//! GET  /carrinho               - Cart page (requires auth)
//! POST /carrinho/adicionar     - Add to cart (login prompt when anonymous)
//! POST /carrinho/atualizar     - Change quantity (returns cart_items fragment)
//! POST /carrinho/remover       - Remove line (returns cart_items fragment)
//! POST /carrinho/limpar        - Empty cart (returns cart_items fragment)
//! GET  /carrinho/count         - Cart count badge (fragment)
//!
//! # Auth
//! GET  /login                  - Login page
//! POST /login                  - Login action (rate limited)
//! GET  /cadastro               - Register page
//! POST /cadastro               - Register action (rate limited)
//! POST /logout                 - Logout action
//!
//! # Account (requires auth)
//! GET  /perfil                 - Profile
//! POST /perfil                 - Update profile / password
//!
//! # Login prompt (HTMX fragments)
//! GET  /alerta                 - Current prompt
//! POST /alerta/fechar          - Dismiss prompt
//! ```

pub mod account;
pub mod alert;
pub mod auth;
pub mod cart;
pub mod cascade;
pub mod home;
pub mod products;
pub mod search;
pub mod views;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};

use crate::middleware::auth_rate_limiter;
use crate::state::AppState;

/// Create the search fragment routes router.
pub fn search_routes() -> Router<AppState> {
    Router::new()
        .route("/suggest", get(search::suggest))
        .route("/toggle", post(search::toggle))
        .route("/brands", get(search::brands))
}

/// Create the guided search routes router.
pub fn cascade_routes() -> Router<AppState> {
    Router::new()
        .route("/montadora", post(cascade::montadora))
        .route("/familia", post(cascade::familia))
        .route("/subfamilia", post(cascade::subfamilia))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/adicionar", post(cart::add))
        .route("/atualizar", post(cart::update))
        .route("/remover", post(cart::remove))
        .route("/limpar", post(cart::clear))
        .route("/count", get(cart::count))
}

/// Create the auth routes router. Form posts are rate limited per client IP.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/login",
            post(auth::login)
                .layer(auth_rate_limiter())
                .get(auth::login_page),
        )
        .route(
            "/cadastro",
            post(auth::register)
                .layer(auth_rate_limiter())
                .get(auth::register_page),
        )
        .route("/logout", post(auth::logout))
}

/// Create the login prompt routes router.
pub fn alert_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(alert::show))
        .route("/fechar", post(alert::dismiss))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home::home))
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .route("/resultados", get(search::results))
        .route("/produto", get(products::show))
        .route(
            "/perfil",
            get(account::profile).post(account::update_profile),
        )
        .nest("/search", search_routes())
        .nest("/cascade", cascade_routes())
        .nest("/carrinho", cart_routes())
        .nest("/alerta", alert_routes())
        .merge(auth_routes())
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the catalog API is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match state.catalog().health().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "catalog not ready");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
