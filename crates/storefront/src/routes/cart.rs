//! Cart route handlers.
//!
//! Cart operations use HTMX for dynamic updates without full page reloads.
//! Every mutation reloads the cart from the catalog and fires
//! `cart-updated`, which refreshes the header counter.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    response::{AppendHeaders, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use ancora_core::{Price, ProductId};

use crate::catalog::SaveProduct;
use crate::error::{AppError, add_breadcrumb};
use crate::filters;
use crate::middleware::{AlertView, OptionalAuth, PageContext, RequireAuth, Visitor};
use crate::models::DEFAULT_LOGIN_TARGET;
use crate::services::cart::featured_products;
use crate::services::{CartContents, CartError, CartLine, CartService, QuantityChange, SessionContext};
use crate::state::AppState;

use super::alert::LoginAlertTemplate;
use super::views::{ProductCard, SearchBoxView};

// =============================================================================
// View Types
// =============================================================================

/// Cart line display data for templates.
#[derive(Debug, Clone)]
pub struct CartLineView {
    pub id: String,
    pub name: String,
    pub brand: String,
    pub reference: String,
    pub image: Option<String>,
    pub quantity: u32,
    pub unit_price: String,
    pub original_price: Option<String>,
    pub line_total: String,
    pub discount: Option<i64>,
    /// False at quantity 1; the line must be removed instead.
    pub can_decrement: bool,
}

impl From<&CartLine> for CartLineView {
    #[allow(clippy::cast_possible_truncation)]
    fn from(line: &CartLine) -> Self {
        Self {
            id: line.product_id.to_string(),
            name: line.name.clone(),
            brand: line.brand.clone().unwrap_or_default(),
            reference: line.reference_code.clone().unwrap_or_default(),
            image: line.image_url.clone(),
            quantity: line.quantity,
            unit_price: line.unit_price.to_string(),
            original_price: line.strikethrough_price().map(|p| p.to_string()),
            line_total: line.line_total().to_string(),
            discount: line
                .discount
                .filter(|d| d.is_finite() && *d > 0.0)
                .map(|d| d.round() as i64),
            can_decrement: line.quantity > 1,
        }
    }
}

/// Cart display data for templates.
#[derive(Debug, Clone)]
pub struct CartView {
    pub lines: Vec<CartLineView>,
    pub subtotal: String,
    pub item_count: u32,
    pub error: Option<String>,
}

impl CartView {
    fn new(contents: &CartContents, error: Option<String>) -> Self {
        Self {
            lines: contents.lines.iter().map(CartLineView::from).collect(),
            subtotal: contents.subtotal().to_string(),
            item_count: contents.item_count(),
            error: error.or_else(|| contents.error.clone()),
        }
    }

    fn empty(error: Option<String>) -> Self {
        Self::new(&CartContents::default(), error)
    }
}

// =============================================================================
// Form Types
// =============================================================================

/// Add to cart form: the product snapshot as rendered on the card.
///
/// Amounts are whatever the page carried; unparseable values are dropped.
#[derive(Debug, Deserialize)]
pub struct AddToCartForm {
    pub id_api_externa: String,
    #[serde(default)]
    pub nome: String,
    pub codigo_referencia: Option<String>,
    pub url_imagem: Option<String>,
    pub preco_original: Option<String>,
    pub preco_final: Option<String>,
    pub desconto: Option<String>,
    pub marca: Option<String>,
    pub quantidade: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl AddToCartForm {
    /// The snapshot sent to `/salvar_produto`.
    #[must_use]
    pub fn into_snapshot(self) -> SaveProduct {
        let price = |raw: Option<String>| non_blank(raw).and_then(|v| Price::parse_lenient(&v).ok());
        SaveProduct {
            id_api_externa: ProductId::new(self.id_api_externa),
            nome: self.nome.trim().to_string(),
            codigo_referencia: non_blank(self.codigo_referencia),
            url_imagem: non_blank(self.url_imagem),
            preco_original: price(self.preco_original),
            preco_final: price(self.preco_final),
            desconto: non_blank(self.desconto)
                .and_then(|v| v.replace(',', ".").parse::<f64>().ok())
                .filter(|d| d.is_finite()),
            marca: non_blank(self.marca),
            quantidade: non_blank(self.quantidade)
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(1),
        }
    }
}

/// Update quantity form data.
#[derive(Debug, Deserialize)]
pub struct UpdateCartForm {
    pub id: String,
    /// Quantity shown on the page.
    pub quantidade: u32,
    /// `inc`, `dec` or an absolute quantity.
    pub acao: String,
}

/// Remove from cart form data.
#[derive(Debug, Deserialize)]
pub struct RemoveFromCartForm {
    pub id: String,
}

// =============================================================================
// Templates
// =============================================================================

/// Cart page template.
#[derive(Template, WebTemplate)]
#[template(path = "cart/show.html")]
pub struct CartShowTemplate {
    pub page: PageContext,
    pub search: SearchBoxView,
    pub cart: CartView,
    pub featured: Vec<ProductCard>,
}

/// Cart items fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_items.html")]
pub struct CartItemsTemplate {
    pub cart: CartView,
}

/// Cart count badge fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_count.html")]
pub struct CartCountTemplate {
    pub count: u32,
    pub oob: bool,
}

// =============================================================================
// Handlers
// =============================================================================

/// Display cart page with the featured brake pads.
#[instrument(skip(state, session, page, visitor))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    page: PageContext,
    RequireAuth(visitor): RequireAuth,
) -> Response {
    let cart = match CartService::new(state.catalog(), &visitor.token).load().await {
        Ok(contents) => CartView::new(&contents, None),
        Err(CartError::Unauthorized) => return signed_out(&state, &session, false).await,
        Err(e) => CartView::empty(Some(e.user_message())),
    };

    let featured = featured_products(state.catalog())
        .await
        .iter()
        .map(ProductCard::from)
        .collect();
    let search = state.visitors().search_box(&session).await;

    CartShowTemplate {
        page,
        search: SearchBoxView::from(&search),
        cart,
        featured,
    }
    .into_response()
}

/// Add item to cart (HTMX).
///
/// Anonymous visitors get the login prompt instead; signed-in visitors get
/// the new counter and a `cart-updated` trigger.
#[instrument(skip(state, session, visitor, form), fields(product = %form.id_api_externa))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(visitor): OptionalAuth,
    Form(form): Form<AddToCartForm>,
) -> Result<Response, AppError> {
    let ttl = state.config().login_alert_ttl;
    let ctx = SessionContext::new(state.catalog(), &session, ttl);

    let Some(visitor) = visitor else {
        ctx.trigger_login_alert(None).await?;
        let alert = ctx.login_alert().await.map(|alert| AlertView::new(alert, ttl));
        return Ok((
            AppendHeaders([("HX-Trigger", "login-required")]),
            LoginAlertTemplate { alert, oob: true },
        )
            .into_response());
    };

    let snapshot = form.into_snapshot();
    if snapshot.id_api_externa.is_empty() {
        return Err(AppError::BadRequest("Produto inválido.".to_string()));
    }

    match CartService::new(state.catalog(), &visitor.token)
        .add(&snapshot)
        .await
    {
        Ok(()) => add_breadcrumb(
            "cart",
            "Added product",
            Some(&[("product_id", snapshot.id_api_externa.as_str())]),
        ),
        Err(CartError::Unauthorized) => return Ok(signed_out(&state, &session, true).await),
        Err(e) => return Err(e.into()),
    }

    let count = ctx.fetch_cart_count().await;
    Ok((
        AppendHeaders([("HX-Trigger", "cart-updated")]),
        CartCountTemplate { count, oob: true },
    )
        .into_response())
}

/// Update cart item quantity (HTMX).
#[instrument(skip(state, session, visitor))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(visitor): RequireAuth,
    Form(form): Form<UpdateCartForm>,
) -> Response {
    let result = match QuantityChange::parse(&form.acao) {
        Some(change) => CartService::new(state.catalog(), &visitor.token)
            .change_quantity(&ProductId::new(form.id), form.quantidade, change)
            .await
            .map(|_| ()),
        None => Err(CartError::Rejected("Quantidade inválida.".to_string())),
    };
    after_mutation(&state, &session, &visitor, result).await
}

/// Remove item from cart (HTMX).
#[instrument(skip(state, session, visitor))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(visitor): RequireAuth,
    Form(form): Form<RemoveFromCartForm>,
) -> Response {
    let result = CartService::new(state.catalog(), &visitor.token)
        .remove(&ProductId::new(form.id))
        .await;
    after_mutation(&state, &session, &visitor, result).await
}

/// Empty the cart (HTMX).
#[instrument(skip(state, session, visitor))]
pub async fn clear(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(visitor): RequireAuth,
) -> Response {
    let result = CartService::new(state.catalog(), &visitor.token)
        .clear()
        .await;
    after_mutation(&state, &session, &visitor, result).await
}

/// Get cart count badge (HTMX).
#[instrument(skip(state, session))]
pub async fn count(State(state): State<AppState>, session: Session) -> impl IntoResponse {
    let count = SessionContext::new(state.catalog(), &session, state.config().login_alert_ttl)
        .fetch_cart_count()
        .await;
    CartCountTemplate { count, oob: false }
}

// =============================================================================
// Helpers
// =============================================================================

/// Reload the cart after a mutation and render it with the outcome.
async fn after_mutation(
    state: &AppState,
    session: &Session,
    visitor: &Visitor,
    result: Result<(), CartError>,
) -> Response {
    let error = match result {
        Ok(()) => None,
        Err(CartError::Unauthorized) => return signed_out(state, session, true).await,
        Err(e) => {
            tracing::warn!(error = %e, "cart mutation failed");
            Some(e.user_message())
        }
    };

    let cart = match CartService::new(state.catalog(), &visitor.token).load().await {
        Ok(contents) => CartView::new(&contents, error),
        Err(CartError::Unauthorized) => return signed_out(state, session, true).await,
        Err(e) => CartView::empty(Some(e.user_message())),
    };

    (
        AppendHeaders([("HX-Trigger", "cart-updated")]),
        CartItemsTemplate { cart },
    )
        .into_response()
}

/// The catalog rejected the token: clear it and send the visitor to login.
async fn signed_out(state: &AppState, session: &Session, htmx: bool) -> Response {
    let ctx = SessionContext::new(state.catalog(), session, state.config().login_alert_ttl);
    if let Err(e) = ctx.handle_unauthorized().await {
        tracing::error!(error = %e, "failed to clear session credentials");
    }
    if htmx {
        AppendHeaders([("HX-Redirect", DEFAULT_LOGIN_TARGET)]).into_response()
    } else {
        Redirect::to(DEFAULT_LOGIN_TARGET).into_response()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn form(id: &str) -> AddToCartForm {
        AddToCartForm {
            id_api_externa: id.to_string(),
            nome: "Pastilha Dianteira".to_string(),
            codigo_referencia: None,
            url_imagem: None,
            preco_original: None,
            preco_final: None,
            desconto: None,
            marca: None,
            quantidade: None,
        }
    }

    #[test]
    fn test_snapshot_parses_amounts_leniently() {
        let snapshot = AddToCartForm {
            preco_final: Some("189.9".to_string()),
            preco_original: Some("R$ 210,00".to_string()),
            desconto: Some("9,5".to_string()),
            marca: Some(" Cobreq ".to_string()),
            quantidade: Some("2".to_string()),
            ..form("42")
        }
        .into_snapshot();
        assert_eq!(snapshot.id_api_externa.as_str(), "42");
        assert_eq!(snapshot.preco_final, Some(Price::parse_lenient("189.90").unwrap()));
        assert_eq!(snapshot.preco_original, Some(Price::parse_lenient("210").unwrap()));
        assert_eq!(snapshot.desconto, Some(9.5));
        assert_eq!(snapshot.marca.as_deref(), Some("Cobreq"));
        assert_eq!(snapshot.quantidade, 2);
    }

    #[test]
    fn test_snapshot_blank_fields_dropped() {
        let snapshot = AddToCartForm {
            preco_final: Some(String::new()),
            url_imagem: Some("  ".to_string()),
            quantidade: Some("x".to_string()),
            ..form("7")
        }
        .into_snapshot();
        assert!(snapshot.preco_final.is_none());
        assert!(snapshot.url_imagem.is_none());
        assert_eq!(snapshot.quantidade, 1);
    }

    #[test]
    fn test_line_view_blocks_decrement_at_one() {
        let line = CartLine {
            product_id: ProductId::new("1"),
            name: "Disco".to_string(),
            quantity: 1,
            unit_price: Price::parse_lenient("100").unwrap(),
            original_price: None,
            image_url: None,
            brand: None,
            reference_code: None,
            discount: None,
        };
        let view = CartLineView::from(&line);
        assert!(!view.can_decrement);
        assert_eq!(view.line_total, "R$ 100,00");
    }
}
