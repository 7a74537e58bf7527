//! Product search orchestration.
//!
//! [`SearchState`] is the per-visitor search box state kept in [`crate::visitor`].
//! [`SearchOrchestrator`] drives the catalog calls behind it: debounced
//! autocomplete, the brand list for a product term, and the confirmed
//! result page. Catalog failures never surface as errors here; they
//! collapse to an empty list and a logged warning.

mod debounce;

pub use debounce::{Debouncer, Ticket};

use serde::{Deserialize, Serialize};
use tracing::instrument;

use ancora_core::Ordering;

use crate::catalog::{SearchApi, SearchPage, SearchParams};

/// Shown when a search returns no products.
pub const NO_RESULTS: &str = "Ops! Não encontramos a peça.";

// =============================================================================
// Search box state
// =============================================================================

/// Search box state of one visitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchState {
    /// Text typed in the search box.
    pub query: String,
    /// License plate, upper-cased.
    pub placa: String,
    /// Whether the suggestion panel is open.
    pub panel_open: bool,
    /// Latest suggestions for `query`.
    pub suggestions: Vec<String>,
    /// Brands available for the current product term.
    pub brands: Vec<String>,
    /// Selected brand, empty for none.
    pub brand: String,
    /// Result ordering sent to the catalog.
    pub ordering: Ordering,
    /// Result page, starting at 1.
    pub page: u32,
}

impl Default for SearchState {
    fn default() -> Self {
        Self {
            query: String::new(),
            placa: String::new(),
            panel_open: true,
            suggestions: Vec::new(),
            brands: Vec::new(),
            brand: String::new(),
            ordering: Ordering::default(),
            page: 1,
        }
    }
}

impl SearchState {
    /// Store new search box text. Empty text clears suggestions and closes
    /// the panel.
    pub fn set_query(&mut self, text: &str) {
        self.query = text.to_string();
        if text.trim().is_empty() {
            self.suggestions.clear();
            self.panel_open = false;
        }
        self.page = 1;
    }

    /// The search box received focus.
    pub const fn focus(&mut self) {
        self.panel_open = true;
    }

    /// Flip the suggestion panel.
    pub const fn toggle(&mut self) {
        self.panel_open = !self.panel_open;
    }

    /// A suggestion was picked.
    pub fn choose(&mut self, suggestion: &str) {
        self.query = suggestion.trim().to_string();
        self.panel_open = false;
        self.page = 1;
    }

    /// Store the license plate, upper-cased.
    pub fn set_placa(&mut self, placa: &str) {
        self.placa = placa.trim().to_uppercase();
        self.page = 1;
    }

    /// Replace the brand list, defaulting the selection to the first brand.
    pub fn set_brands(&mut self, brands: Vec<String>) {
        self.brand = brands.first().cloned().unwrap_or_default();
        self.brands = brands;
    }

    /// Select a brand. Unknown brands are ignored.
    pub fn select_brand(&mut self, brand: &str) {
        let brand = brand.trim();
        if brand.is_empty() || self.brands.iter().any(|b| b == brand) {
            self.brand = brand.to_string();
            self.page = 1;
        }
    }

    /// Whether the suggestion panel should be rendered.
    #[must_use]
    pub fn panel_visible(&self) -> bool {
        self.panel_open && !self.query.trim().is_empty()
    }

    /// Whether there is a text query to run.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.query.trim().is_empty() || !self.placa.is_empty()
    }

    /// Forget the text search (a guided search took over).
    pub fn clear(&mut self) {
        *self = Self {
            ordering: self.ordering,
            ..Self::default()
        };
    }

    /// Parameters for a confirmed text search.
    #[must_use]
    pub fn to_params(&self) -> SearchParams {
        SearchParams {
            pagina: self.page.max(1),
            termo: self.query.trim().to_string(),
            placa: self.placa.clone(),
            marca: self.brand.clone(),
            ordering: self.ordering,
            guided: None,
        }
    }
}

// =============================================================================
// Orchestrator
// =============================================================================

/// Result of a debounced suggestion request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuggestOutcome {
    /// Suggestions for the latest keystroke (possibly empty).
    Fresh(Vec<String>),
    /// A newer keystroke arrived; nothing should be rendered.
    Superseded,
}

/// Drives catalog search calls for one request.
pub struct SearchOrchestrator<'a, C> {
    api: &'a C,
    debouncer: &'a Debouncer,
}

impl<'a, C: SearchApi> SearchOrchestrator<'a, C> {
    /// Create an orchestrator over a catalog implementation.
    #[must_use]
    pub const fn new(api: &'a C, debouncer: &'a Debouncer) -> Self {
        Self { api, debouncer }
    }

    /// Debounced autocomplete for `prefix`.
    ///
    /// `session_key` identifies the visitor whose keystrokes supersede each
    /// other. An empty prefix cancels pending requests and yields no
    /// suggestions without calling the catalog.
    #[instrument(skip(self, session_key))]
    pub async fn suggest(&self, session_key: &str, prefix: &str) -> SuggestOutcome {
        let prefix = prefix.trim();
        if prefix.is_empty() {
            self.debouncer.cancel(session_key).await;
            return SuggestOutcome::Fresh(Vec::new());
        }

        let Some(ticket) = self.debouncer.debounce(session_key).await else {
            tracing::debug!("suggestion superseded before request");
            return SuggestOutcome::Superseded;
        };

        let result = self.api.autocomplete(prefix).await;

        if !ticket.is_current() {
            tracing::debug!("discarding stale suggestions");
            return SuggestOutcome::Superseded;
        }

        match result {
            Ok(suggestions) => SuggestOutcome::Fresh(suggestions),
            Err(e) => {
                tracing::warn!(error = %e, "autocomplete failed");
                SuggestOutcome::Fresh(Vec::new())
            }
        }
    }

    /// Brands available for a product term. Empty on failure or empty term.
    #[instrument(skip(self))]
    pub async fn load_brands(&self, term: &str) -> Vec<String> {
        let term = term.trim();
        if term.is_empty() {
            return Vec::new();
        }

        match self.api.brand_search(term).await {
            Ok(search) => search.brand_list(),
            Err(e) => {
                tracing::warn!(error = %e, "brand lookup failed");
                Vec::new()
            }
        }
    }

    /// Run a confirmed search.
    ///
    /// Results keep the catalog's order. An empty page always carries a
    /// message: the catalog's own, the failure reason, or [`NO_RESULTS`].
    #[instrument(skip(self))]
    pub async fn search(&self, params: &SearchParams) -> SearchPage {
        let mut page = match self.api.search(params).await {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!(error = %e, "search failed");
                SearchPage::empty_with_message(e.user_message())
            }
        };

        if page.dados.is_empty() && page.mensagem.as_deref().is_none_or(|m| m.trim().is_empty())
        {
            page.mensagem = Some(NO_RESULTS.to_string());
        }
        page
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use std::time::Duration;

    use reqwest::StatusCode;
    use serde_json::json;

    use super::*;
    use crate::catalog::{BrandSearch, CatalogError};

    /// In-memory catalog with a fixed response latency.
    #[derive(Default)]
    struct FakeSearch {
        latency: Duration,
        calls: AtomicUsize,
        fail: bool,
        page: Option<serde_json::Value>,
    }

    impl SearchApi for FakeSearch {
        async fn autocomplete(&self, prefix: &str) -> Result<Vec<String>, CatalogError> {
            self.calls.fetch_add(1, AtomicOrdering::SeqCst);
            tokio::time::sleep(self.latency).await;
            if self.fail {
                return Err(CatalogError::Status {
                    status: StatusCode::BAD_GATEWAY,
                    message: "down".to_string(),
                });
            }
            Ok(vec![format!("{prefix} de freio")])
        }

        async fn brand_search(&self, _term: &str) -> Result<BrandSearch, CatalogError> {
            self.calls.fetch_add(1, AtomicOrdering::SeqCst);
            if self.fail {
                return Err(CatalogError::Unauthorized);
            }
            Ok(serde_json::from_value(json!({
                "results": [{"marca": "Bosch"}, {"marca": "Fras-le"}, {"marca": "Bosch"}]
            }))
            .unwrap())
        }

        async fn search(&self, _params: &SearchParams) -> Result<SearchPage, CatalogError> {
            self.calls.fetch_add(1, AtomicOrdering::SeqCst);
            if self.fail {
                return Err(CatalogError::Status {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    message: "Falha na requisição. Tente novamente.".to_string(),
                });
            }
            Ok(serde_json::from_value(self.page.clone().unwrap_or_else(|| json!({}))).unwrap())
        }
    }

    fn debouncer() -> Debouncer {
        Debouncer::new(Duration::from_millis(300))
    }

    #[test]
    fn test_empty_query_clears_and_closes() {
        let mut state = SearchState {
            query: "disco".to_string(),
            suggestions: vec!["disco de freio".to_string()],
            ..SearchState::default()
        };
        state.set_query("   ");
        assert!(state.suggestions.is_empty());
        assert!(!state.panel_open);
        assert!(!state.panel_visible());
    }

    #[test]
    fn test_toggle_closed_then_focus_reopens() {
        let mut state = SearchState::default();
        state.set_query("disco");
        assert!(state.panel_visible());

        state.toggle();
        assert!(!state.panel_visible());

        state.focus();
        assert!(state.panel_visible());
    }

    #[test]
    fn test_choose_sets_query_and_closes() {
        let mut state = SearchState::default();
        state.set_query("dis");
        state.choose("disco de freio");
        assert_eq!(state.query, "disco de freio");
        assert!(!state.panel_open);
    }

    #[test]
    fn test_placa_upper_cased() {
        let mut state = SearchState::default();
        state.set_placa(" abc1d23 ");
        assert_eq!(state.placa, "ABC1D23");
        assert!(state.is_active());
    }

    #[test]
    fn test_brands_default_to_first() {
        let mut state = SearchState::default();
        state.set_brands(vec!["Bosch".to_string(), "Fras-le".to_string()]);
        assert_eq!(state.brand, "Bosch");

        state.select_brand("Fras-le");
        assert_eq!(state.brand, "Fras-le");

        state.select_brand("Desconhecida");
        assert_eq!(state.brand, "Fras-le");

        state.set_brands(Vec::new());
        assert_eq!(state.brand, "");
    }

    #[test]
    fn test_to_params_carries_state() {
        let mut state = SearchState::default();
        state.set_query(" disco ");
        state.set_brands(vec!["Bosch".to_string()]);
        state.ordering = Ordering::normalize(None, Some("asc"));

        let params = state.to_params();
        assert_eq!(params.termo, "disco");
        assert_eq!(params.marca, "Bosch");
        assert!(params.guided.is_none());
        assert!(params.query_pairs().contains(&("order", "asc".to_string())));
    }

    #[tokio::test(start_paused = true)]
    async fn test_suggest_returns_fresh() {
        let api = FakeSearch::default();
        let debouncer = debouncer();
        let orchestrator = SearchOrchestrator::new(&api, &debouncer);

        let outcome = orchestrator.suggest("v1", "disco").await;
        assert_eq!(
            outcome,
            SuggestOutcome::Fresh(vec!["disco de freio".to_string()])
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_prefix_skips_catalog() {
        let api = FakeSearch::default();
        let debouncer = debouncer();
        let orchestrator = SearchOrchestrator::new(&api, &debouncer);

        assert_eq!(
            orchestrator.suggest("v1", "  ").await,
            SuggestOutcome::Fresh(Vec::new())
        );
        assert_eq!(api.calls.load(AtomicOrdering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_keystrokes_call_catalog_once() {
        let api = Arc::new(FakeSearch::default());
        let debouncer = debouncer();

        let mut handles = Vec::new();
        for prefix in ["d", "di", "dis", "disc"] {
            let api = Arc::clone(&api);
            let debouncer = debouncer.clone();
            handles.push(tokio::spawn(async move {
                SearchOrchestrator::new(api.as_ref(), &debouncer)
                    .suggest("v1", prefix)
                    .await
            }));
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        let mut outcomes = Vec::new();
        for handle in handles {
            outcomes.push(handle.await.unwrap());
        }

        assert_eq!(api.calls.load(AtomicOrdering::SeqCst), 1);
        assert_eq!(
            outcomes.last().unwrap(),
            &SuggestOutcome::Fresh(vec!["disc de freio".to_string()])
        );
        assert!(
            outcomes
                .iter()
                .take(3)
                .all(|o| *o == SuggestOutcome::Superseded)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_response_never_overwrites_newer() {
        let api = Arc::new(FakeSearch {
            latency: Duration::from_millis(500),
            ..FakeSearch::default()
        });
        let debouncer = debouncer();

        // The first request is already in flight when the second keystroke
        // arrives, and would answer after it.
        let older = tokio::spawn({
            let api = Arc::clone(&api);
            let debouncer = debouncer.clone();
            async move {
                SearchOrchestrator::new(api.as_ref(), &debouncer)
                    .suggest("v1", "dis")
                    .await
            }
        });
        tokio::time::sleep(Duration::from_millis(350)).await;
        let newer = tokio::spawn({
            let api = Arc::clone(&api);
            let debouncer = debouncer.clone();
            async move {
                SearchOrchestrator::new(api.as_ref(), &debouncer)
                    .suggest("v1", "disco")
                    .await
            }
        });

        assert_eq!(older.await.unwrap(), SuggestOutcome::Superseded);
        assert_eq!(
            newer.await.unwrap(),
            SuggestOutcome::Fresh(vec!["disco de freio".to_string()])
        );
        assert_eq!(api.calls.load(AtomicOrdering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_suggest_failure_yields_empty() {
        let api = FakeSearch {
            fail: true,
            ..FakeSearch::default()
        };
        let debouncer = debouncer();
        let orchestrator = SearchOrchestrator::new(&api, &debouncer);
        assert_eq!(
            orchestrator.suggest("v1", "disco").await,
            SuggestOutcome::Fresh(Vec::new())
        );
    }

    #[tokio::test]
    async fn test_load_brands_distinct_in_order() {
        let api = FakeSearch::default();
        let debouncer = debouncer();
        let orchestrator = SearchOrchestrator::new(&api, &debouncer);
        assert_eq!(
            orchestrator.load_brands("disco").await,
            vec!["Bosch", "Fras-le"]
        );
        assert!(orchestrator.load_brands(" ").await.is_empty());
        assert_eq!(api.calls.load(AtomicOrdering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_load_brands_failure_is_empty() {
        let api = FakeSearch {
            fail: true,
            ..FakeSearch::default()
        };
        let debouncer = debouncer();
        let orchestrator = SearchOrchestrator::new(&api, &debouncer);
        assert!(orchestrator.load_brands("disco").await.is_empty());
    }

    #[tokio::test]
    async fn test_no_matches_shows_message() {
        let api = FakeSearch {
            page: Some(json!({"dados": [], "pagina": 1, "total_paginas": 1})),
            ..FakeSearch::default()
        };
        let debouncer = debouncer();
        let page = SearchOrchestrator::new(&api, &debouncer)
            .search(&SearchParams {
                termo: "xyz123".to_string(),
                ..SearchParams::default()
            })
            .await;
        assert!(page.dados.is_empty());
        assert_eq!(page.mensagem.as_deref(), Some(NO_RESULTS));
    }

    #[tokio::test]
    async fn test_results_keep_server_order() {
        let api = FakeSearch {
            page: Some(json!({
                "dados": [
                    {"id": 3, "nome": "Disco C", "marca": "Fras-le", "preco": 300.0},
                    {"id": 1, "nome": "Disco A", "marca": "Bosch", "preco": 100.0},
                    {"id": 2, "nome": "Disco B", "marca": "Bosch", "preco": 200.0}
                ],
                "marcas": ["Bosch", "Fras-le"]
            })),
            ..FakeSearch::default()
        };
        let debouncer = debouncer();
        let page = SearchOrchestrator::new(&api, &debouncer)
            .search(&SearchParams {
                termo: "disco".to_string(),
                marca: "Bosch".to_string(),
                ordering: Ordering::normalize(None, Some("asc")),
                ..SearchParams::default()
            })
            .await;

        let ids: Vec<&str> = page.dados.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["3", "1", "2"]);
        assert_eq!(page.marcas, vec!["Bosch", "Fras-le"]);
        assert!(page.mensagem.is_none());
    }

    #[tokio::test]
    async fn test_search_failure_collapses_to_empty() {
        let api = FakeSearch {
            fail: true,
            ..FakeSearch::default()
        };
        let debouncer = debouncer();
        let page = SearchOrchestrator::new(&api, &debouncer)
            .search(&SearchParams::default())
            .await;
        assert!(page.dados.is_empty());
        assert_eq!(
            page.mensagem.as_deref(),
            Some("Falha na requisição. Tente novamente.")
        );
    }
}
