//! Home page route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::cascade::Cascade;
use crate::filters;
use crate::middleware::{PageContext, existing_visitor_id};
use crate::search::SearchState;
use crate::services::cart::featured_products;
use crate::state::AppState;

use super::cascade::{GuidedView, guided_view};
use super::views::{ProductCard, SearchBoxView};

/// Guided results paging.
#[derive(Debug, Deserialize)]
pub struct HomeQuery {
    pub pagina: Option<u32>,
}

/// Home page template.
#[derive(Template, WebTemplate)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub page: PageContext,
    pub search: SearchBoxView,
    pub guided: GuidedView,
    pub featured: Vec<ProductCard>,
}

/// Display home page: guided search, then highlights.
#[instrument(skip(state, session, page))]
pub async fn home(
    State(state): State<AppState>,
    session: Session,
    page: PageContext,
    Query(query): Query<HomeQuery>,
) -> impl IntoResponse {
    let (search, cascade) = match existing_visitor_id(&session).await {
        Some(id) => {
            let shared = state.visitors().get(&id).await;
            let current = shared.lock().await;
            (current.search.clone(), current.cascade.clone())
        }
        None => (SearchState::default(), Cascade::default()),
    };

    let guided = guided_view(&state, &cascade, query.pagina.unwrap_or(1), None).await;
    let featured = if guided.results.is_none() {
        featured_products(state.catalog())
            .await
            .iter()
            .map(ProductCard::from)
            .collect()
    } else {
        Vec::new()
    };

    IndexTemplate {
        page,
        search: SearchBoxView::from(&search),
        guided,
        featured,
    }
}
