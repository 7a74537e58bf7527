//! Integration tests for the Âncora storefront.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p ancora-integration-tests
//! ```
//!
//! No external services are needed: [`FakeCatalog`] serves the catalog REST
//! API from memory on an ephemeral port and [`TestApp`] runs the real
//! storefront router against it.
//!
//! # Test Categories
//!
//! - `catalog_client` - HTTP client behavior (base URL, retries, 401s, payloads)
//! - `storefront_flows` - End-to-end page and HTMX fragment flows

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Path, Query, Request, State},
    http::{HeaderMap, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::net::TcpListener;

use ancora_storefront::config::{CatalogConfig, StorefrontConfig};
use ancora_storefront::state::AppState;

/// Account accepted by the fake `/auth/login`.
pub const EMAIL: &str = "ana@example.com";

/// Password of [`EMAIL`].
pub const PASSWORD: &str = "segredo";

/// Bearer token issued for [`EMAIL`].
pub const TOKEN: &str = "tok-ana";

/// Search term for which the fake catalog has no products.
pub const UNKNOWN_TERM: &str = "inexistente";

/// Suggestions known to the fake `/autocomplete`.
const SUGGESTIONS: &[&str] = &["pastilha de freio", "pastilha dianteira", "disco de freio"];

// =============================================================================
// Fake catalog
// =============================================================================

/// A request received by the fake catalog.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub query: HashMap<String, String>,
    pub authorization: Option<String>,
}

#[derive(Default)]
struct FakeState {
    requests: Vec<Recorded>,
    /// Remaining forced failures per path.
    failures: HashMap<String, u32>,
    cart: Vec<Value>,
    bare_suggestions: bool,
    tokens_revoked: bool,
}

/// In-memory stand-in for the catalog REST API.
#[derive(Clone)]
pub struct FakeCatalog {
    state: Arc<Mutex<FakeState>>,
    base_url: String,
}

impl FakeCatalog {
    /// Start the fake on an ephemeral port.
    ///
    /// # Panics
    ///
    /// Panics if the listener cannot be bound.
    pub async fn spawn() -> Self {
        let state = Arc::new(Mutex::new(FakeState::default()));

        let router = Router::new()
            .route("/health", get(|| async { "ok" }))
            .route("/autocomplete", get(autocomplete))
            .route("/buscar", get(brand_lookup))
            .route("/pesquisar", get(search))
            .route("/produto_detalhes", get(product_details))
            .route("/montadoras", get(manufacturers))
            .route("/familias", get(families))
            .route("/familias/{id}/subfamilias", get(subfamilies))
            .route("/auth/login", post(login))
            .route("/auth/register", post(register))
            .route("/auth/me", get(me).put(update_me))
            .route("/carrinho", get(cart))
            .route("/salvar_produto", post(save_product))
            .route("/carrinho/produto/atualizar-quantidade", post(update_quantity))
            .route("/carrinho/produto/remover", post(remove_item))
            .route("/carrinho/limpar", post(clear_cart))
            .layer(middleware::from_fn_with_state(state.clone(), record))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind fake catalog");
        let addr = listener.local_addr().expect("Fake catalog has no address");
        tokio::spawn(async move {
            axum::serve(listener, router)
                .await
                .expect("Fake catalog server error");
        });

        Self {
            state,
            base_url: format!("http://{addr}"),
        }
    }

    /// Base URL of the fake.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().expect("fake catalog state poisoned")
    }

    /// Make the next `times` requests to `path` answer 500.
    pub fn fail_next(&self, path: &str, times: u32) {
        self.lock().failures.insert(path.to_string(), times);
    }

    /// Answer `/autocomplete` with a bare JSON array instead of the
    /// `{"sugestoes": [...]}` wrapper.
    pub fn use_bare_suggestions(&self) {
        self.lock().bare_suggestions = true;
    }

    /// Reject every bearer token from now on.
    pub fn revoke_tokens(&self) {
        self.lock().tokens_revoked = true;
    }

    /// Put a line in the cart.
    pub fn seed_cart(&self, id: &str, quantidade: u32, preco: f64) {
        self.lock().cart.push(json!({
            "id_api_externa": id,
            "nome": format!("Peça {id}"),
            "quantidade": quantidade,
            "preco_final": preco,
            "marca": "Bosch",
        }));
    }

    /// Current cart lines.
    #[must_use]
    pub fn cart_lines(&self) -> Vec<Value> {
        self.lock().cart.clone()
    }

    /// All requests received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<Recorded> {
        self.lock().requests.clone()
    }

    /// Requests received for `path`.
    #[must_use]
    pub fn requests_to(&self, path: &str) -> Vec<Recorded> {
        self.lock()
            .requests
            .iter()
            .filter(|r| r.path == path)
            .cloned()
            .collect()
    }
}

type Shared = Arc<Mutex<FakeState>>;

fn lock(state: &Shared) -> MutexGuard<'_, FakeState> {
    state.lock().expect("fake catalog state poisoned")
}

/// Record every request and serve forced failures.
async fn record(State(state): State<Shared>, request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    let query = request
        .uri()
        .query()
        .map(|q| {
            q.split('&')
                .filter_map(|pair| pair.split_once('='))
                .map(|(k, v)| (decode(k), decode(v)))
                .collect()
        })
        .unwrap_or_default();
    let authorization = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    let fail = {
        let mut guard = lock(&state);
        guard.requests.push(Recorded {
            method: request.method().to_string(),
            path: path.clone(),
            query,
            authorization,
        });
        match guard.failures.get_mut(&path) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    };

    if fail {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "Falha simulada"})),
        )
            .into_response();
    }
    next.run(request).await
}

fn decode(raw: &str) -> String {
    let bytes = raw.replace('+', " ");
    let mut out = Vec::with_capacity(bytes.len());
    let mut iter = bytes.bytes();
    while let Some(b) = iter.next() {
        if b == b'%' {
            let hex: String = iter.by_ref().take(2).map(char::from).collect();
            if let Ok(value) = u8::from_str_radix(&hex, 16) {
                out.push(value);
                continue;
            }
        }
        out.push(b);
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn product(id: &str, nome: &str, marca: &str, preco: f64) -> Value {
    json!({
        "id": id,
        "nome": nome,
        "marca": marca,
        "preco": preco,
        "precoOriginal": preco * 1.25,
        "descontoPercentual": 20,
        "codigoReferencia": format!("REF-{id}"),
        "imagemReal": format!("https://img.example.com/{id}.jpg"),
        "parcelas": {"qtd": 3, "valor": preco / 3.0},
    })
}

fn profile() -> Value {
    json!({"id": "u-1", "nome": "Ana Souza", "email": EMAIL, "telefone": "11999990000"})
}

/// Check the bearer token, answering 401 like the real API.
fn authorize(state: &Shared, headers: &HeaderMap) -> Result<(), Response> {
    let expected = format!("Bearer {TOKEN}");
    let valid = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == expected);
    if valid && !lock(state).tokens_revoked {
        Ok(())
    } else {
        Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({"success": false, "error": "Token inválido"})),
        )
            .into_response())
    }
}

#[derive(Deserialize)]
struct PrefixQuery {
    #[serde(default)]
    prefix: String,
}

async fn autocomplete(State(state): State<Shared>, Query(q): Query<PrefixQuery>) -> Json<Value> {
    let prefix = q.prefix.to_lowercase();
    let matches: Vec<&str> = SUGGESTIONS
        .iter()
        .copied()
        .filter(|s| s.starts_with(&prefix))
        .collect();
    if lock(&state).bare_suggestions {
        Json(json!(matches))
    } else {
        Json(json!({ "sugestoes": matches }))
    }
}

async fn brand_lookup() -> Json<Value> {
    Json(json!({
        "results": [
            {"marca": "Bosch"},
            {"data": {"marca": "Cobreq"}},
            {"marca": "Bosch"},
        ],
        "brands": [],
    }))
}

async fn search(Query(q): Query<HashMap<String, String>>) -> Json<Value> {
    let termo = q.get("termo").map(String::as_str).unwrap_or_default();
    if termo == UNKNOWN_TERM {
        return Json(json!({"dados": [], "pagina": 1, "total_paginas": 1}));
    }
    let pagina: u32 = q.get("pagina").and_then(|p| p.parse().ok()).unwrap_or(1);
    let label = if termo.is_empty() {
        q.get("familia_nome").cloned().unwrap_or_default()
    } else {
        termo.to_string()
    };
    Json(json!({
        "dados": [
            product("p1", &format!("{label} Bosch"), "Bosch", 189.9),
            product("p2", &format!("{label} Cobreq"), "Cobreq", 99.5),
        ],
        "marcas": ["Bosch", "Cobreq"],
        "pagina": pagina,
        "total_paginas": 3,
    }))
}

#[derive(Deserialize)]
struct DetailsQuery {
    id: String,
}

async fn product_details(Query(q): Query<DetailsQuery>) -> Json<Value> {
    if q.id == "missing" {
        return Json(json!({"item": null, "similares": null}));
    }
    let mut item = product(&q.id, "Pastilha de Freio Dianteira", "Bosch", 189.9);
    item["aplicacoes"] = json!([{
        "montadora": "Fiat",
        "modelo": "Uno",
        "motor": "1.0",
        "fabricacaoInicial": "2010",
        "fabricacaoFinal": "2015",
    }]);
    item["familia"] = json!({"descricao": "Freios", "subFamiliaDescricao": "Pastilhas"});
    Json(json!({
        "item": item,
        "similares": [product("s1", "Pastilha Similar", "Cobreq", 120.0)],
    }))
}

async fn manufacturers() -> Json<Value> {
    Json(json!([{"id": 1, "nome": "Fiat"}, {"id": 2, "nome": "Volkswagen"}]))
}

async fn families() -> Json<Value> {
    Json(json!([{"id": 10, "nome": "Freios"}, {"id": 20, "nome": "Suspensão"}]))
}

async fn subfamilies(Path(id): Path<String>) -> Json<Value> {
    Json(json!([{"id": format!("{id}1"), "nome": "Pastilhas"}]))
}

#[derive(Deserialize)]
struct Credentials {
    email: String,
    senha: String,
}

async fn login(Json(body): Json<Credentials>) -> Response {
    if body.email == EMAIL && body.senha == PASSWORD {
        Json(json!({"success": true, "token": TOKEN, "user": profile()})).into_response()
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({"success": false, "error": "E-mail ou senha inválidos."})),
        )
            .into_response()
    }
}

async fn register(Json(body): Json<Value>) -> Response {
    if body["email"] == EMAIL {
        return (
            StatusCode::CONFLICT,
            Json(json!({"success": false, "error": "E-mail já cadastrado."})),
        )
            .into_response();
    }
    Json(json!({"success": true})).into_response()
}

async fn me(State(state): State<Shared>, headers: HeaderMap) -> Response {
    if let Err(rejection) = authorize(&state, &headers) {
        return rejection;
    }
    Json(json!({"success": true, "user": profile()})).into_response()
}

async fn update_me(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Err(rejection) = authorize(&state, &headers) {
        return rejection;
    }
    if body.get("senha_atual").is_some_and(|s| s != PASSWORD) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"success": false, "error": "Senha atual incorreta."})),
        )
            .into_response();
    }
    let mut user = profile();
    user["nome"] = body["nome"].clone();
    user["telefone"] = body["telefone"].clone();
    Json(json!({"success": true, "user": user})).into_response()
}

async fn cart(State(state): State<Shared>, headers: HeaderMap) -> Response {
    if let Err(rejection) = authorize(&state, &headers) {
        return rejection;
    }
    let produtos = lock(&state).cart.clone();
    Json(json!({"success": true, "produtos": produtos})).into_response()
}

fn line_id(line: &Value) -> Option<&str> {
    line.get("id_api_externa").and_then(Value::as_str)
}

async fn save_product(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Err(rejection) = authorize(&state, &headers) {
        return rejection;
    }
    let id = line_id(&body).unwrap_or_default().to_string();
    let added = body["quantidade"].as_u64().unwrap_or(1);
    let mut guard = lock(&state);
    if let Some(line) = guard.cart.iter_mut().find(|l| line_id(l) == Some(id.as_str())) {
        let current = line["quantidade"].as_u64().unwrap_or(0);
        line["quantidade"] = json!(current + added);
    } else {
        guard.cart.push(body);
    }
    Json(json!({"success": true})).into_response()
}

async fn update_quantity(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Err(rejection) = authorize(&state, &headers) {
        return rejection;
    }
    let id = line_id(&body).unwrap_or_default().to_string();
    let mut guard = lock(&state);
    if let Some(line) = guard.cart.iter_mut().find(|l| line_id(l) == Some(id.as_str())) {
        line["quantidade"] = body["quantidade"].clone();
    }
    Json(json!({"success": true})).into_response()
}

async fn remove_item(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Err(rejection) = authorize(&state, &headers) {
        return rejection;
    }
    let id = line_id(&body).unwrap_or_default().to_string();
    lock(&state).cart.retain(|l| line_id(l) != Some(id.as_str()));
    Json(json!({"success": true})).into_response()
}

async fn clear_cart(State(state): State<Shared>, headers: HeaderMap) -> Response {
    if let Err(rejection) = authorize(&state, &headers) {
        return rejection;
    }
    lock(&state).cart.clear();
    Json(json!({"success": true})).into_response()
}

// =============================================================================
// Storefront under test
// =============================================================================

/// Configuration pointing the storefront at `catalog_url`.
#[must_use]
pub fn test_config(catalog_url: &str) -> StorefrontConfig {
    StorefrontConfig {
        host: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port: 0,
        base_url: "http://127.0.0.1".to_string(),
        catalog: CatalogConfig {
            base_url: catalog_url.to_string(),
            timeout: Duration::from_secs(5),
            cache_ttl: Duration::from_secs(60),
        },
        search_debounce: Duration::from_millis(150),
        login_alert_ttl: Duration::from_secs(6),
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 1.0,
        sentry_traces_sample_rate: 0.0,
    }
}

/// A running storefront with its fake catalog and a cookie-keeping client.
pub struct TestApp {
    pub base_url: String,
    pub client: reqwest::Client,
    pub catalog: FakeCatalog,
}

impl TestApp {
    /// Start a storefront against a fresh fake catalog.
    pub async fn spawn() -> Self {
        Self::spawn_with(FakeCatalog::spawn().await).await
    }

    /// Start a storefront against `catalog`.
    ///
    /// # Panics
    ///
    /// Panics if the storefront cannot be started.
    pub async fn spawn_with(catalog: FakeCatalog) -> Self {
        let state = AppState::new(test_config(catalog.base_url()))
            .expect("Failed to initialize application state");
        let app = ancora_storefront::app(state);

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind storefront");
        let addr = listener.local_addr().expect("Storefront has no address");
        tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .expect("Storefront server error");
        });

        Self {
            base_url: format!("http://{addr}"),
            client: Self::new_client(),
            catalog,
        }
    }

    /// A client with its own cookie jar that does not follow redirects.
    ///
    /// # Panics
    ///
    /// Panics if the client cannot be built.
    #[must_use]
    pub fn new_client() -> reqwest::Client {
        reqwest::Client::builder()
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .expect("Failed to build test client")
    }

    /// Absolute URL of a storefront path.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Plain page request.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be sent.
    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("GET failed")
    }

    /// HTMX fragment request.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be sent.
    pub async fn htmx_get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .header("HX-Request", "true")
            .send()
            .await
            .expect("GET failed")
    }

    /// Form post.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be sent.
    pub async fn post_form(&self, path: &str, form: &[(&str, &str)]) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .form(form)
            .send()
            .await
            .expect("POST failed")
    }

    /// HTMX form post.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be sent.
    pub async fn htmx_post(&self, path: &str, form: &[(&str, &str)]) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .header("HX-Request", "true")
            .form(form)
            .send()
            .await
            .expect("POST failed")
    }

    /// Sign in as [`EMAIL`].
    pub async fn login(&self) -> reqwest::Response {
        self.post_form("/login", &[("email", EMAIL), ("senha", PASSWORD)])
            .await
    }
}
