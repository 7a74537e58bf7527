//! Guided search handlers (Montadora → Família → SubFamília).
//!
//! Each select posts its value; the response re-renders the whole guided
//! block (selects plus results) so dependent selects reset together.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::cascade::{Cascade, CascadeController, Level};
use crate::catalog::SearchParams;
use crate::search::SearchOrchestrator;
use crate::state::AppState;
use crate::visitor::VisitorState;

use super::views::{OptionView, ResultsView};

/// The guided search block as rendered.
#[derive(Debug, Clone)]
pub struct GuidedView {
    pub manufacturers: Vec<OptionView>,
    pub families: Vec<OptionView>,
    pub subfamilies: Vec<OptionView>,
    pub family_enabled: bool,
    pub subfamily_enabled: bool,
    pub error: Option<String>,
    pub results: Option<ResultsView>,
}

/// Guided search fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/guided.html")]
pub struct GuidedTemplate {
    pub guided: GuidedView,
}

/// Selected option id posted by a cascade select.
#[derive(Debug, Deserialize)]
pub struct SelectForm {
    #[serde(default)]
    pub id: String,
}

/// Build the guided block: option lists for every enabled level, plus the
/// result page once manufacturer and family are chosen.
pub async fn guided_view(
    state: &AppState,
    cascade: &Cascade,
    page: u32,
    error: Option<String>,
) -> GuidedView {
    let options = CascadeController::new(state.catalog())
        .options(cascade)
        .await;

    let results = match cascade.to_guided_filter() {
        Some(guided) => {
            let params = SearchParams {
                pagina: page.max(1),
                guided: Some(guided),
                ..SearchParams::default()
            };
            let page = SearchOrchestrator::new(state.catalog(), state.debouncer())
                .search(&params)
                .await;
            Some(ResultsView::new(&page, |p| format!("/?pagina={p}")))
        }
        None => None,
    };

    GuidedView {
        manufacturers: OptionView::from_filter(
            &options.manufacturers,
            cascade.manufacturer.as_ref().map(|s| &s.id),
        ),
        families: OptionView::from_filter(&options.families, cascade.family.as_ref().map(|s| &s.id)),
        subfamilies: OptionView::from_filter(
            &options.subfamilies,
            cascade.subfamily.as_ref().map(|s| &s.id),
        ),
        family_enabled: cascade.manufacturer.is_some(),
        subfamily_enabled: cascade.family.is_some(),
        error,
        results,
    }
}

async fn select(state: &AppState, session: &Session, level: Level, id: &str) -> Response {
    let shared = state.visitors().for_session(session).await;
    let mut current = shared.lock().await;
    let VisitorState { search, cascade } = &mut *current;

    let error = match CascadeController::new(state.catalog())
        .select(cascade, level, id)
        .await
    {
        Ok(_) => {
            if cascade.is_queryable() && search.is_active() {
                search.clear();
            }
            None
        }
        Err(e) => {
            tracing::debug!(error = %e, "cascade selection rejected");
            Some(e.user_message())
        }
    };

    let cascade = cascade.clone();
    drop(current);

    GuidedTemplate {
        guided: guided_view(state, &cascade, 1, error).await,
    }
    .into_response()
}

/// Select a manufacturer (HTMX). Resets family and subfamily.
#[instrument(skip(state, session))]
pub async fn montadora(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<SelectForm>,
) -> Response {
    select(&state, &session, Level::Manufacturer, &form.id).await
}

/// Select a family (HTMX). Resets subfamily.
#[instrument(skip(state, session))]
pub async fn familia(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<SelectForm>,
) -> Response {
    select(&state, &session, Level::Family, &form.id).await
}

/// Select a subfamily (HTMX).
#[instrument(skip(state, session))]
pub async fn subfamilia(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<SelectForm>,
) -> Response {
    select(&state, &session, Level::Subfamily, &form.id).await
}
