//! Cart service.
//!
//! The catalog API owns the cart; this service reads it into [`CartLine`]s,
//! enforces the quantity floor before any mutation reaches the API, and
//! loads the featured products shown beside the cart.

use thiserror::Error;
use tracing::instrument;

use ancora_core::{Ordering, Price, ProductId, SortDirection};

use crate::catalog::{
    AccessToken, Ack, CartApi, CartItem, CatalogError, Product, SaveProduct, SearchApi,
    SearchParams,
};

/// Term used for the featured products beside the cart.
pub const FEATURED_TERM: &str = "pastilha";

/// Number of featured products shown.
pub const FEATURED_LIMIT: usize = 4;

/// Errors from cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// Decrement at quantity 1 or a quantity of 0; the line must be removed.
    #[error("quantity cannot go below 1")]
    BelowMinimum,

    /// The catalog answered `success: false`.
    #[error("cart rejected: {0}")]
    Rejected(String),

    /// The token was rejected.
    #[error("unauthorized")]
    Unauthorized,

    /// Catalog API error.
    #[error("catalog error: {0}")]
    Catalog(CatalogError),
}

impl From<CatalogError> for CartError {
    fn from(e: CatalogError) -> Self {
        match e {
            CatalogError::Unauthorized => Self::Unauthorized,
            other => Self::Catalog(other),
        }
    }
}

impl CartError {
    /// Message safe to show to the visitor.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::BelowMinimum => {
                "A quantidade mínima é 1. Use remover para tirar o item.".to_string()
            }
            Self::Rejected(message) => message.clone(),
            Self::Unauthorized => "Sua sessão expirou. Entre novamente.".to_string(),
            Self::Catalog(e) => e.user_message(),
        }
    }
}

// =============================================================================
// Cart lines
// =============================================================================

/// A line of the visitor's cart.
#[derive(Debug, Clone, PartialEq)]
pub struct CartLine {
    pub product_id: ProductId,
    pub name: String,
    pub quantity: u32,
    pub unit_price: Price,
    pub original_price: Option<Price>,
    pub image_url: Option<String>,
    pub brand: Option<String>,
    pub reference_code: Option<String>,
    pub discount: Option<f64>,
}

impl From<CartItem> for CartLine {
    fn from(item: CartItem) -> Self {
        Self {
            product_id: item.id_api_externa,
            name: item.nome.unwrap_or_default(),
            quantity: item.quantidade.max(1),
            unit_price: item.preco_final.unwrap_or(Price::ZERO),
            original_price: item.preco_original,
            image_url: item.url_imagem,
            brand: item.marca,
            reference_code: item.codigo_referencia,
            discount: item.desconto,
        }
    }
}

impl CartLine {
    /// Price of the whole line.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.unit_price.times(self.quantity)
    }

    /// Original price, when higher than the unit price.
    #[must_use]
    pub fn strikethrough_price(&self) -> Option<Price> {
        self.original_price.filter(|p| *p > self.unit_price)
    }

    /// Quantity after an increment.
    #[must_use]
    pub const fn incremented(&self) -> u32 {
        self.quantity.saturating_add(1)
    }

    /// Quantity after a decrement.
    ///
    /// # Errors
    ///
    /// Returns `CartError::BelowMinimum` at quantity 1.
    pub const fn decremented(&self) -> Result<u32, CartError> {
        if self.quantity <= 1 {
            Err(CartError::BelowMinimum)
        } else {
            Ok(self.quantity - 1)
        }
    }
}

/// Sum of final price × quantity.
#[must_use]
pub fn subtotal(lines: &[CartLine]) -> Price {
    lines.iter().map(CartLine::line_total).sum()
}

/// Sum of quantities.
#[must_use]
pub fn item_count(lines: &[CartLine]) -> u32 {
    lines.iter().map(|l| l.quantity).fold(0, u32::saturating_add)
}

/// A requested quantity change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityChange {
    Increment,
    Decrement,
    Set(u32),
}

impl QuantityChange {
    /// Parse a form action: `inc`, `dec`, or a quantity.
    #[must_use]
    pub fn parse(action: &str) -> Option<Self> {
        match action.trim() {
            "inc" | "+" => Some(Self::Increment),
            "dec" | "-" => Some(Self::Decrement),
            other => other.parse().ok().map(Self::Set),
        }
    }

    /// The resulting quantity for a line currently at `current`.
    ///
    /// # Errors
    ///
    /// Returns `CartError::BelowMinimum` when the result would be below 1.
    pub fn apply(self, current: u32) -> Result<u32, CartError> {
        match self {
            Self::Increment => Ok(current.saturating_add(1)),
            Self::Decrement if current <= 1 => Err(CartError::BelowMinimum),
            Self::Decrement => Ok(current - 1),
            Self::Set(0) => Err(CartError::BelowMinimum),
            Self::Set(quantity) => Ok(quantity),
        }
    }
}

/// A loaded cart.
#[derive(Debug, Clone, Default)]
pub struct CartContents {
    pub lines: Vec<CartLine>,
    /// Inline error when the cart could not be loaded.
    pub error: Option<String>,
}

impl CartContents {
    #[must_use]
    pub fn subtotal(&self) -> Price {
        subtotal(&self.lines)
    }

    #[must_use]
    pub fn item_count(&self) -> u32 {
        item_count(&self.lines)
    }

    /// The line for a product, if present.
    #[must_use]
    pub fn line(&self, product: &ProductId) -> Option<&CartLine> {
        self.lines.iter().find(|l| &l.product_id == product)
    }
}

// =============================================================================
// Service
// =============================================================================

/// Cart operations for a signed-in visitor.
pub struct CartService<'a, C> {
    api: &'a C,
    token: &'a AccessToken,
}

impl<'a, C: CartApi> CartService<'a, C> {
    #[must_use]
    pub const fn new(api: &'a C, token: &'a AccessToken) -> Self {
        Self { api, token }
    }

    /// Load the cart.
    ///
    /// `success: false` yields an empty cart with the catalog's message.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Unauthorized` on 401 so the caller can clear the
    /// session. Other failures become an inline error.
    #[instrument(skip(self))]
    pub async fn load(&self) -> Result<CartContents, CartError> {
        match self.api.cart(self.token).await {
            Ok(payload) if payload.success => Ok(CartContents {
                lines: payload.produtos.into_iter().map(CartLine::from).collect(),
                error: None,
            }),
            Ok(payload) => Ok(CartContents {
                lines: Vec::new(),
                error: Some(
                    payload
                        .error
                        .unwrap_or_else(|| crate::catalog::GENERIC_FAILURE.to_string()),
                ),
            }),
            Err(CatalogError::Unauthorized) => Err(CartError::Unauthorized),
            Err(e) => {
                tracing::warn!(error = %e, "failed to load cart");
                Ok(CartContents {
                    lines: Vec::new(),
                    error: Some(e.user_message()),
                })
            }
        }
    }

    /// Change the quantity of a line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::BelowMinimum` without calling the catalog when
    /// the change would leave the line below 1.
    #[instrument(skip(self), fields(product = %product))]
    pub async fn change_quantity(
        &self,
        product: &ProductId,
        current: u32,
        change: QuantityChange,
    ) -> Result<u32, CartError> {
        let quantity = change.apply(current)?;
        let ack = self
            .api
            .update_quantity(self.token, product, quantity)
            .await?;
        check(ack)?;
        Ok(quantity)
    }

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog call fails or is refused.
    #[instrument(skip(self), fields(product = %product))]
    pub async fn remove(&self, product: &ProductId) -> Result<(), CartError> {
        check(self.api.remove_item(self.token, product).await?)
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog call fails or is refused.
    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<(), CartError> {
        check(self.api.clear_cart(self.token).await?)
    }

    /// Add a product snapshot to the cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::BelowMinimum` for a quantity of 0, or an error if
    /// the catalog call fails or is refused.
    #[instrument(skip(self, product), fields(product = %product.id_api_externa))]
    pub async fn add(&self, product: &SaveProduct) -> Result<(), CartError> {
        if product.quantidade == 0 {
            return Err(CartError::BelowMinimum);
        }
        check(self.api.save_product(self.token, product).await?)
    }
}

fn check(ack: Ack) -> Result<(), CartError> {
    if ack.success {
        Ok(())
    } else {
        Err(CartError::Rejected(
            ack.error
                .unwrap_or_else(|| crate::catalog::GENERIC_FAILURE.to_string()),
        ))
    }
}

/// Featured brake pads shown beside the cart. Empty on failure.
#[instrument(skip(api))]
pub async fn featured_products<C: SearchApi>(api: &C) -> Vec<Product> {
    let params = SearchParams {
        termo: FEATURED_TERM.to_string(),
        ordering: Ordering {
            direction: Some(SortDirection::Desc),
            ..Ordering::default()
        },
        ..SearchParams::default()
    };

    match api.search(&params).await {
        Ok(page) => page.dados.into_iter().take(FEATURED_LIMIT).collect(),
        Err(e) => {
            tracing::warn!(error = %e, "failed to load featured products");
            Vec::new()
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use serde_json::json;

    use super::*;
    use crate::catalog::{BrandSearch, CartPayload, SearchPage};

    fn line(id: &str, quantity: u32, price: &str) -> CartLine {
        CartLine::from(
            serde_json::from_value::<CartItem>(json!({
                "id_api_externa": id,
                "nome": "Pastilha",
                "quantidade": quantity,
                "preco_final": price
            }))
            .unwrap(),
        )
    }

    #[derive(Default)]
    struct FakeCart {
        updates: Mutex<Vec<(String, u32)>>,
        refuse: bool,
    }

    impl CartApi for FakeCart {
        async fn cart(&self, _token: &AccessToken) -> Result<CartPayload, CatalogError> {
            if self.refuse {
                return Ok(serde_json::from_value(
                    json!({"success": false, "error": "Carrinho indisponível"}),
                )
                .unwrap());
            }
            Ok(serde_json::from_value(json!({
                "success": true,
                "produtos": [{"id_api_externa": "a", "quantidade": 2, "preco_final": 10.5}]
            }))
            .unwrap())
        }

        async fn update_quantity(
            &self,
            _token: &AccessToken,
            product: &ProductId,
            quantidade: u32,
        ) -> Result<Ack, CatalogError> {
            self.updates
                .lock()
                .unwrap()
                .push((product.to_string(), quantidade));
            Ok(Ack::default())
        }

        async fn remove_item(
            &self,
            _token: &AccessToken,
            _product: &ProductId,
        ) -> Result<Ack, CatalogError> {
            Ok(Ack {
                success: !self.refuse,
                error: self.refuse.then(|| "Item não encontrado".to_string()),
            })
        }

        async fn clear_cart(&self, _token: &AccessToken) -> Result<Ack, CatalogError> {
            Ok(Ack::default())
        }

        async fn save_product(
            &self,
            _token: &AccessToken,
            _product: &SaveProduct,
        ) -> Result<Ack, CatalogError> {
            Ok(Ack::default())
        }
    }

    struct FakeSearch;

    impl SearchApi for FakeSearch {
        async fn autocomplete(&self, _prefix: &str) -> Result<Vec<String>, CatalogError> {
            Ok(Vec::new())
        }

        async fn brand_search(&self, _term: &str) -> Result<BrandSearch, CatalogError> {
            Ok(BrandSearch::default())
        }

        async fn search(&self, params: &SearchParams) -> Result<SearchPage, CatalogError> {
            assert_eq!(params.termo, FEATURED_TERM);
            assert!(params.query_pairs().contains(&("order", "desc".to_string())));
            let dados: Vec<_> = (1..=6).map(|i| json!({"id": i, "nome": "Pastilha"})).collect();
            Ok(serde_json::from_value(json!({ "dados": dados })).unwrap())
        }
    }

    #[test]
    fn test_totals() {
        let lines = vec![line("a", 2, "10,50"), line("b", 1, "1.000,00")];
        assert_eq!(item_count(&lines), 3);
        assert_eq!(subtotal(&lines).to_string(), "R$ 1.021,00");
        assert_eq!(subtotal(&[]), Price::ZERO);
    }

    #[test]
    fn test_item_count_saturates() {
        let lines = vec![line("a", u32::MAX, "1"), line("b", 2, "1")];
        assert_eq!(item_count(&lines), u32::MAX);
    }

    #[test]
    fn test_decrement_at_one_rejected() {
        let one = line("a", 1, "10");
        assert!(matches!(one.decremented(), Err(CartError::BelowMinimum)));
        assert_eq!(line("a", 3, "10").decremented().unwrap(), 2);
        assert_eq!(one.incremented(), 2);
    }

    #[test]
    fn test_quantity_change_never_below_one() {
        for current in 0..5 {
            for change in [
                QuantityChange::Increment,
                QuantityChange::Decrement,
                QuantityChange::Set(0),
                QuantityChange::Set(current),
            ] {
                if let Ok(quantity) = change.apply(current.max(1)) {
                    assert!(quantity >= 1);
                }
            }
        }
    }

    #[test]
    fn test_quantity_change_parse() {
        assert_eq!(QuantityChange::parse("inc"), Some(QuantityChange::Increment));
        assert_eq!(QuantityChange::parse("dec"), Some(QuantityChange::Decrement));
        assert_eq!(QuantityChange::parse(" 4 "), Some(QuantityChange::Set(4)));
        assert_eq!(QuantityChange::parse("muito"), None);
    }

    #[tokio::test]
    async fn test_decrement_at_one_makes_no_call() {
        let api = FakeCart::default();
        let token = AccessToken::new("t");
        let service = CartService::new(&api, &token);

        let err = service
            .change_quantity(&ProductId::new("a"), 1, QuantityChange::Decrement)
            .await
            .unwrap_err();
        assert!(matches!(err, CartError::BelowMinimum));
        assert!(api.updates.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_increment_sends_new_quantity() {
        let api = FakeCart::default();
        let token = AccessToken::new("t");
        let service = CartService::new(&api, &token);

        let quantity = service
            .change_quantity(&ProductId::new("a"), 2, QuantityChange::Increment)
            .await
            .unwrap();
        assert_eq!(quantity, 3);
        assert_eq!(
            *api.updates.lock().unwrap(),
            vec![("a".to_string(), 3)]
        );
    }

    #[tokio::test]
    async fn test_load_failure_is_inline_error() {
        let api = FakeCart {
            refuse: true,
            ..FakeCart::default()
        };
        let token = AccessToken::new("t");
        let cart = CartService::new(&api, &token).load().await.unwrap();
        assert!(cart.lines.is_empty());
        assert_eq!(cart.error.as_deref(), Some("Carrinho indisponível"));
    }

    #[tokio::test]
    async fn test_load_maps_lines() {
        let api = FakeCart::default();
        let token = AccessToken::new("t");
        let cart = CartService::new(&api, &token).load().await.unwrap();
        assert_eq!(cart.item_count(), 2);
        assert_eq!(cart.subtotal().to_string(), "R$ 21,00");
        assert!(cart.line(&ProductId::new("a")).is_some());
    }

    #[tokio::test]
    async fn test_refused_removal_reports_message() {
        let api = FakeCart {
            refuse: true,
            ..FakeCart::default()
        };
        let token = AccessToken::new("t");
        let err = CartService::new(&api, &token)
            .remove(&ProductId::new("a"))
            .await
            .unwrap_err();
        assert_eq!(err.user_message(), "Item não encontrado");
    }

    #[tokio::test]
    async fn test_featured_products_limited() {
        let products = featured_products(&FakeSearch).await;
        assert_eq!(products.len(), FEATURED_LIMIT);
    }
}
