//! Display data shared by several pages and fragments.
//!
//! Templates only see preformatted strings and flags; prices are rendered
//! in `R$ 1.234,56` notation here, never in templates.

use ancora_core::{Ordering, Price};

use crate::catalog::{FilterOption, Product, SearchPage};
use crate::search::SearchState;

/// A product as shown in result grids and the featured list.
#[derive(Debug, Clone)]
pub struct ProductCard {
    pub id: String,
    pub name: String,
    pub brand: String,
    pub price: Option<String>,
    pub original_price: Option<String>,
    pub discount: Option<i64>,
    pub installments: Option<String>,
    pub image: Option<String>,
    pub reference: String,
    pub url: String,
    /// Raw amounts carried by the add-to-cart form.
    pub price_raw: String,
    pub original_price_raw: String,
    pub discount_raw: String,
}

impl From<&Product> for ProductCard {
    fn from(product: &Product) -> Self {
        let name = product.name().to_string();
        let raw = |price: Option<Price>| price.map(|p| p.amount().to_string()).unwrap_or_default();
        Self {
            id: product.id.to_string(),
            url: product_url(product.id.as_str(), &name),
            brand: product.brand().to_string(),
            price: product.preco.map(|p| p.to_string()),
            original_price: product.strikethrough_price().map(|p| p.to_string()),
            discount: product.discount_percent(),
            installments: product
                .parcelas
                .as_ref()
                .filter(|p| p.count > 1)
                .map(|p| format!("{}x de {}", p.count, p.value)),
            image: product.imagem_real.clone(),
            reference: product.codigo_referencia.clone().unwrap_or_default(),
            price_raw: raw(product.preco),
            original_price_raw: raw(product.preco_original),
            discount_raw: product
                .desconto_percentual
                .map(|d| d.to_string())
                .unwrap_or_default(),
            name,
        }
    }
}

/// Link to the product detail page.
#[must_use]
pub fn product_url(id: &str, name: &str) -> String {
    format!(
        "/produto?id={}&nomeProduto={}",
        urlencoding::encode(id),
        urlencoding::encode(name)
    )
}

/// One page of results with its pager.
#[derive(Debug, Clone)]
pub struct ResultsView {
    pub products: Vec<ProductCard>,
    pub message: Option<String>,
    pub page: u32,
    pub total_pages: u32,
    pub prev_url: Option<String>,
    pub next_url: Option<String>,
}

impl ResultsView {
    /// Build from a result page; `page_url` links to another page number.
    pub fn new(page: &SearchPage, page_url: impl Fn(u32) -> String) -> Self {
        Self {
            products: page.dados.iter().map(ProductCard::from).collect(),
            message: page.mensagem.clone().filter(|m| !m.trim().is_empty()),
            page: page.pagina,
            total_pages: page.total_paginas.max(1),
            prev_url: page.has_previous().then(|| page_url(page.pagina - 1)),
            next_url: page.has_next().then(|| page_url(page.pagina + 1)),
        }
    }

    /// Whether the pager should be rendered.
    #[must_use]
    pub const fn has_pager(&self) -> bool {
        self.prev_url.is_some() || self.next_url.is_some()
    }
}

/// An `<option>` of a select box.
#[derive(Debug, Clone)]
pub struct OptionView {
    pub value: String,
    pub label: String,
    pub selected: bool,
}

impl OptionView {
    /// Options for a cascade level, marking the current selection.
    pub fn from_filter<I: AsRef<str>>(options: &[FilterOption<I>], selected: Option<&I>) -> Vec<Self> {
        let selected = selected.map(AsRef::as_ref);
        options
            .iter()
            .map(|o| Self {
                value: o.id.as_ref().to_string(),
                label: o.name.clone(),
                selected: selected == Some(o.id.as_ref()),
            })
            .collect()
    }

    /// Brand options, marking the selected brand.
    #[must_use]
    pub fn from_brands(brands: &[String], selected: &str) -> Vec<Self> {
        brands
            .iter()
            .map(|b| Self {
                value: b.clone(),
                label: b.clone(),
                selected: b == selected,
            })
            .collect()
    }

    /// Sort options, marking the current ordering.
    #[must_use]
    pub fn from_ordering(ordering: Ordering) -> Vec<Self> {
        let current = ordering.option_key();
        Ordering::OPTIONS
            .iter()
            .map(|(key, label)| Self {
                value: (*key).to_string(),
                label: (*label).to_string(),
                selected: *key == current,
            })
            .collect()
    }
}

/// The search box with its suggestion panel.
#[derive(Debug, Clone)]
pub struct SearchBoxView {
    pub query: String,
    pub placa: String,
    pub panel: SuggestionPanel,
}

impl From<&SearchState> for SearchBoxView {
    fn from(state: &SearchState) -> Self {
        Self {
            query: state.query.clone(),
            placa: state.placa.clone(),
            panel: SuggestionPanel::from(state),
        }
    }
}

/// Suggestions under the search box.
#[derive(Debug, Clone, Default)]
pub struct SuggestionPanel {
    pub visible: bool,
    pub suggestions: Vec<String>,
}

impl From<&SearchState> for SuggestionPanel {
    fn from(state: &SearchState) -> Self {
        Self {
            visible: state.panel_visible() && !state.suggestions.is_empty(),
            suggestions: state.suggestions.clone(),
        }
    }
}

/// Link to the text results page for the current search state.
#[must_use]
pub fn results_url(state: &SearchState, page: u32) -> String {
    let mut query = vec![
        ("q", state.query.trim().to_string()),
        ("ordem", state.ordering.option_key().to_string()),
        ("pagina", page.to_string()),
    ];
    if !state.placa.is_empty() {
        query.push(("placa", state.placa.clone()));
    }
    if !state.brand.is_empty() {
        query.push(("marca", state.brand.clone()));
    }
    let encoded: Vec<String> = query
        .into_iter()
        .map(|(k, v)| format!("{k}={}", urlencoding::encode(&v)))
        .collect();
    format!("/resultados?{}", encoded.join("&"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn product(json: serde_json::Value) -> Product {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_card_formats_prices() {
        let card = ProductCard::from(&product(serde_json::json!({
            "id": 7,
            "nome": "Disco de Freio",
            "marca": "Bosch",
            "preco": "189.9",
            "preco_original": 210,
            "desconto_percentual": 9.6,
            "parcelas": {"qtd": 3, "valor": 63.3}
        })));
        assert_eq!(card.price.as_deref(), Some("R$ 189,90"));
        assert_eq!(card.original_price.as_deref(), Some("R$ 210,00"));
        assert_eq!(card.discount, Some(10));
        assert_eq!(card.installments.as_deref(), Some("3x de R$ 63,30"));
        assert_eq!(card.url, "/produto?id=7&nomeProduto=Disco%20de%20Freio");
    }

    #[test]
    fn test_pager_bounds() {
        let first = SearchPage {
            pagina: 1,
            total_paginas: 3,
            ..SearchPage::default()
        };
        let view = ResultsView::new(&first, |p| format!("?pagina={p}"));
        assert!(view.prev_url.is_none());
        assert_eq!(view.next_url.as_deref(), Some("?pagina=2"));

        let last = SearchPage {
            pagina: 3,
            total_paginas: 3,
            ..SearchPage::default()
        };
        let view = ResultsView::new(&last, |p| format!("?pagina={p}"));
        assert_eq!(view.prev_url.as_deref(), Some("?pagina=2"));
        assert!(view.next_url.is_none());
    }

    #[test]
    fn test_results_url_keeps_filters() {
        let mut state = SearchState::default();
        state.set_query("disco de freio");
        state.set_placa("abc1d23");
        state.set_brands(vec!["Bosch".into()]);
        let url = results_url(&state, 2);
        assert!(url.starts_with("/resultados?q=disco%20de%20freio"));
        assert!(url.contains("placa=ABC1D23"));
        assert!(url.contains("marca=Bosch"));
        assert!(url.contains("pagina=2"));
    }
}
