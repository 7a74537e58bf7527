//! Product detail route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use ancora_core::ProductId;

use crate::catalog::{Product, VehicleApplication};
use crate::filters;
use crate::middleware::PageContext;
use crate::state::AppState;

use super::views::{ProductCard, SearchBoxView};

/// Shown when `id` or `nomeProduto` is missing.
pub const INVALID_PARAMETERS: &str = "Parâmetros inválidos para carregar o produto.";

/// Shown when the catalog cannot provide the product.
pub const LOAD_FAILED: &str = "Não foi possível carregar os detalhes do produto.";

/// Product detail query. Both fields are required.
#[derive(Debug, Deserialize)]
pub struct ProductQuery {
    pub id: Option<String>,
    #[serde(rename = "nomeProduto")]
    pub nome_produto: Option<String>,
}

/// A vehicle the part fits.
#[derive(Debug, Clone)]
pub struct ApplicationView {
    pub vehicle: String,
    pub engine: String,
    pub years: String,
}

impl From<&VehicleApplication> for ApplicationView {
    fn from(app: &VehicleApplication) -> Self {
        let join = |parts: &[&Option<String>]| {
            parts
                .iter()
                .filter_map(|p| p.as_deref())
                .collect::<Vec<_>>()
                .join(" ")
        };
        let years = match (&app.fabricacao_inicial, &app.fabricacao_final) {
            (Some(from), Some(to)) => format!("{from} - {to}"),
            (Some(from), None) => format!("{from} -"),
            (None, Some(to)) => format!("- {to}"),
            (None, None) => String::new(),
        };
        Self {
            vehicle: join(&[&app.montadora, &app.modelo, &app.versao, &app.carroceria]),
            engine: join(&[&app.motor, &app.combustivel, &app.hp]),
            years,
        }
    }
}

/// Product detail display data.
#[derive(Debug, Clone)]
pub struct ProductDetailView {
    pub card: ProductCard,
    pub family: String,
    pub subfamily: String,
    pub applications: Vec<ApplicationView>,
}

impl From<&Product> for ProductDetailView {
    fn from(product: &Product) -> Self {
        let family = product.familia.clone().unwrap_or_default();
        Self {
            card: ProductCard::from(product),
            family: family.descricao.unwrap_or_default(),
            subfamily: family.subfamilia_descricao.unwrap_or_default(),
            applications: product.aplicacoes.iter().map(ApplicationView::from).collect(),
        }
    }
}

/// Product detail page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/show.html")]
pub struct ProductShowTemplate {
    pub page: PageContext,
    pub search: SearchBoxView,
    pub product: Option<ProductDetailView>,
    pub similar: Vec<ProductCard>,
    pub error: Option<String>,
}

/// Display product detail page.
#[instrument(skip(state, session, page))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    page: PageContext,
    Query(query): Query<ProductQuery>,
) -> Response {
    let search = state.visitors().search_box(&session).await;
    let mut template = ProductShowTemplate {
        page,
        search: SearchBoxView::from(&search),
        product: None,
        similar: Vec::new(),
        error: None,
    };

    let id = query.id.as_deref().map(str::trim).unwrap_or_default();
    let nome = query.nome_produto.as_deref().map(str::trim).unwrap_or_default();
    if id.is_empty() || nome.is_empty() {
        template.error = Some(INVALID_PARAMETERS.to_string());
        return (StatusCode::BAD_REQUEST, template).into_response();
    }

    match state.catalog().product_details(&ProductId::new(id), nome).await {
        Ok(details) => match details.item {
            Some(item) => {
                template.product = Some(ProductDetailView::from(&item));
                template.similar = details
                    .similares
                    .unwrap_or_default()
                    .iter()
                    .filter(|p| p.id != item.id)
                    .map(ProductCard::from)
                    .collect();
                template.into_response()
            }
            None => {
                template.error = Some(LOAD_FAILED.to_string());
                (StatusCode::NOT_FOUND, template).into_response()
            }
        },
        Err(e) => {
            tracing::warn!(error = %e, product = id, "failed to load product details");
            template.error = Some(LOAD_FAILED.to_string());
            (StatusCode::BAD_GATEWAY, template).into_response()
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_application_view_joins_present_parts() {
        let app: VehicleApplication = serde_json::from_value(serde_json::json!({
            "montadora": "FIAT",
            "modelo": "Palio",
            "versao": null,
            "motor": "1.0",
            "combustivel": "Flex",
            "fabricacaoInicial": 2008,
            "fabricacaoFinal": "2012"
        }))
        .unwrap();
        let view = ApplicationView::from(&app);
        assert_eq!(view.vehicle, "FIAT Palio");
        assert_eq!(view.engine, "1.0 Flex");
        assert_eq!(view.years, "2008 - 2012");
    }
}
