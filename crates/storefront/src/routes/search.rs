//! Text search handlers.
//!
//! The search box lives in the header of every page. Keystrokes hit
//! `/search/suggest`, which is debounced per visitor; a superseded
//! keystroke answers `204 No Content` so HTMX leaves the panel alone.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    http::StatusCode,
    response::{AppendHeaders, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use ancora_core::Ordering;

use crate::filters;
use crate::middleware::{PageContext, visitor_id};
use crate::search::{SearchOrchestrator, SuggestOutcome};
use crate::state::AppState;
use crate::visitor::VisitorState;

use super::views::{OptionView, ResultsView, SearchBoxView, SuggestionPanel, results_url};

// =============================================================================
// Query / Form Types
// =============================================================================

/// Keystroke in the search box.
#[derive(Debug, Deserialize)]
pub struct SuggestQuery {
    #[serde(default)]
    pub q: String,
}

/// Suggestion panel action.
#[derive(Debug, Deserialize)]
pub struct PanelForm {
    /// `toggle`, `focus`, `close` or `choose`.
    #[serde(default)]
    pub acao: String,
    #[serde(default)]
    pub sugestao: String,
}

/// Result page filters.
#[derive(Debug, Default, Deserialize)]
pub struct ResultsQuery {
    pub q: Option<String>,
    pub placa: Option<String>,
    pub marca: Option<String>,
    /// Sort direction (`asc`, `desc`) or storefront sort option key
    /// (`menor-preco`, ...).
    pub ordem: Option<String>,
    /// Raw catalog sort field, with `order` as its direction.
    pub sort: Option<String>,
    pub order: Option<String>,
    pub pagina: Option<u32>,
}

// =============================================================================
// Templates
// =============================================================================

/// Suggestion panel fragment (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/suggestions.html")]
pub struct SuggestionsTemplate {
    pub panel: SuggestionPanel,
}

/// Brand select fragment (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/brands.html")]
pub struct BrandsTemplate {
    pub brands: Vec<OptionView>,
}

/// Results page template.
#[derive(Template, WebTemplate)]
#[template(path = "search/results.html")]
pub struct ResultsTemplate {
    pub page: PageContext,
    pub search: SearchBoxView,
    pub term: String,
    pub brands: Vec<OptionView>,
    pub orderings: Vec<OptionView>,
    pub results: Option<ResultsView>,
}

// =============================================================================
// Handlers
// =============================================================================

/// Debounced suggestions for the search box (HTMX).
///
/// The visitor lock is never held across the debounce wait, so panel
/// actions posted meanwhile apply immediately and are kept.
#[instrument(skip(state, session))]
pub async fn suggest(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<SuggestQuery>,
) -> Response {
    let visitor = visitor_id(&session).await;
    let shared = state.visitors().get(&visitor).await;
    shared.lock().await.search.set_query(&query.q);

    let orchestrator = SearchOrchestrator::new(state.catalog(), state.debouncer());
    let suggestions = match orchestrator.suggest(&visitor, &query.q).await {
        SuggestOutcome::Superseded => return StatusCode::NO_CONTENT.into_response(),
        SuggestOutcome::Fresh(suggestions) => suggestions,
    };

    let panel = {
        let mut current = shared.lock().await;
        if current.search.query != query.q {
            return StatusCode::NO_CONTENT.into_response();
        }
        current.search.suggestions = suggestions;
        SuggestionPanel::from(&current.search)
    };

    SuggestionsTemplate { panel }.into_response()
}

/// Open, close or pick from the suggestion panel (HTMX).
///
/// Picking a suggestion confirms the search and navigates to the results.
#[instrument(skip(state, session, headers))]
pub async fn toggle(
    State(state): State<AppState>,
    session: Session,
    headers: axum::http::HeaderMap,
    Form(form): Form<PanelForm>,
) -> Response {
    let shared = state.visitors().for_session(&session).await;
    let mut current = shared.lock().await;
    let search = &mut current.search;

    match form.acao.as_str() {
        "focus" => search.focus(),
        "close" => search.panel_open = false,
        "choose" if !form.sugestao.trim().is_empty() => {
            search.choose(&form.sugestao);
            let target = results_url(search, 1);
            if headers.contains_key("hx-request") {
                return (AppendHeaders([("HX-Redirect", target)]), StatusCode::OK).into_response();
            }
            return Redirect::to(&target).into_response();
        }
        _ => search.toggle(),
    }

    SuggestionsTemplate {
        panel: SuggestionPanel::from(&*search),
    }
    .into_response()
}

/// Brand options for a product term (HTMX).
#[instrument(skip(state, session))]
pub async fn brands(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<SuggestQuery>,
) -> impl IntoResponse {
    let brands = SearchOrchestrator::new(state.catalog(), state.debouncer())
        .load_brands(&query.q)
        .await;

    let shared = state.visitors().for_session(&session).await;
    let mut current = shared.lock().await;
    current.search.set_brands(brands);

    BrandsTemplate {
        brands: OptionView::from_brands(&current.search.brands, &current.search.brand),
    }
}

/// Text search results page.
///
/// A text search replaces any guided (cascade) selection.
#[instrument(skip(state, session, page))]
pub async fn results(
    State(state): State<AppState>,
    session: Session,
    page: PageContext,
    Query(query): Query<ResultsQuery>,
) -> impl IntoResponse {
    let orchestrator = SearchOrchestrator::new(state.catalog(), state.debouncer());
    let shared = state.visitors().for_session(&session).await;
    let mut current = shared.lock().await;
    let VisitorState { search, cascade } = &mut *current;

    let term = query.q.clone().unwrap_or_else(|| search.query.clone());
    let term_changed = term.trim() != search.query.trim() || search.brands.is_empty();
    search.choose(&term);

    if let Some(placa) = &query.placa {
        search.set_placa(placa);
    }
    if term_changed {
        search.set_brands(orchestrator.load_brands(&term).await);
    }
    if let Some(marca) = &query.marca {
        search.select_brand(marca);
    }
    if let Some(ordering) = Ordering::from_params(
        query.ordem.as_deref(),
        query.sort.as_deref(),
        query.order.as_deref(),
    ) {
        search.ordering = ordering;
    }
    search.page = query.pagina.unwrap_or(1).max(1);

    let results = if search.is_active() {
        cascade.clear();

        let found = orchestrator.search(&search.to_params()).await;
        for brand in &found.marcas {
            if !search.brands.contains(brand) {
                search.brands.push(brand.clone());
            }
        }
        Some(ResultsView::new(&found, |p| results_url(search, p)))
    } else {
        None
    };

    ResultsTemplate {
        page,
        search: SearchBoxView::from(&*search),
        term: search.query.clone(),
        brands: OptionView::from_brands(&search.brands, &search.brand),
        orderings: OptionView::from_ordering(search.ordering),
        results,
    }
}
