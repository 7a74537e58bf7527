//! Wire types for the catalog REST API.
//!
//! The API is loosely typed. Ids arrive as strings or numbers, prices as
//! numbers or localized strings, and optional fields are often `null`,
//! missing, or an empty string. Everything here deserializes leniently:
//! an unreadable optional field becomes `None` instead of failing the whole
//! payload.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use ancora_core::{Price, ProductId};

// =============================================================================
// Lenient field helpers
// =============================================================================

/// Deserialize an optional value, mapping anything unreadable to `None`.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// Deserialize a scalar as display text. Numbers are rendered, blanks dropped.
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Deserialize a list, treating `null` as empty.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

const fn one() -> u32 {
    1
}

// =============================================================================
// Reference lists
// =============================================================================

/// An option of a cascading filter level (manufacturer, family, subfamily).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterOption<I> {
    pub id: I,
    #[serde(rename = "nome", default)]
    pub name: String,
}

// =============================================================================
// Products
// =============================================================================

/// Installment plan advertised with a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Installments {
    #[serde(rename = "qtd")]
    pub count: u32,
    #[serde(rename = "valor")]
    pub value: Price,
}

/// Part family details attached to a product.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductFamily {
    #[serde(default, deserialize_with = "lenient_text")]
    pub descricao: Option<String>,
    #[serde(
        rename = "subFamiliaDescricao",
        default,
        deserialize_with = "lenient_text"
    )]
    pub subfamilia_descricao: Option<String>,
}

/// A vehicle the part fits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleApplication {
    #[serde(default, deserialize_with = "lenient_text")]
    pub montadora: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub modelo: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub versao: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub carroceria: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub motor: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub combustivel: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub hp: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub fabricacao_inicial: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub fabricacao_final: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub imagem: Option<String>,
}

/// A product as returned by search and detail endpoints.
///
/// Search hits carry `nome` while the detail endpoint carries `nomeProduto`;
/// both are kept and [`Product::name`] picks whichever is present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    #[serde(default, deserialize_with = "lenient_text")]
    pub nome: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub nome_produto: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub marca: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub preco: Option<Price>,
    #[serde(default, deserialize_with = "lenient")]
    pub preco_original: Option<Price>,
    #[serde(default, deserialize_with = "lenient")]
    pub desconto_percentual: Option<f64>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub imagem_real: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub codigo_referencia: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub score: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub parcelas: Option<Installments>,
    #[serde(default, deserialize_with = "lenient")]
    pub familia: Option<ProductFamily>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub aplicacoes: Vec<VehicleApplication>,
}

impl Product {
    /// Display name, whichever of `nome`/`nomeProduto` the endpoint sent.
    #[must_use]
    pub fn name(&self) -> &str {
        self.nome
            .as_deref()
            .or(self.nome_produto.as_deref())
            .unwrap_or_default()
    }

    /// Brand name, or an empty string.
    #[must_use]
    pub fn brand(&self) -> &str {
        self.marca.as_deref().unwrap_or_default()
    }

    /// Whole-number discount percentage, when there is one.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn discount_percent(&self) -> Option<i64> {
        self.desconto_percentual
            .filter(|d| d.is_finite() && *d > 0.0)
            .map(|d| d.round() as i64)
    }

    /// Original price, only when it is higher than the final price.
    #[must_use]
    pub fn strikethrough_price(&self) -> Option<Price> {
        match (self.preco_original, self.preco) {
            (Some(original), Some(final_price)) if original > final_price => Some(original),
            (Some(original), None) if original.is_positive() => Some(original),
            _ => None,
        }
    }
}

// =============================================================================
// Search payloads
// =============================================================================

/// Autocomplete response: either `{"sugestoes": [...]}` or a bare array.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SuggestionsPayload {
    Wrapped {
        #[serde(default, deserialize_with = "null_as_empty")]
        sugestoes: Vec<String>,
    },
    Bare(Vec<String>),
}

impl SuggestionsPayload {
    /// Suggestions with blanks and duplicates removed, original order kept.
    #[must_use]
    pub fn into_suggestions(self) -> Vec<String> {
        let raw = match self {
            Self::Wrapped { sugestoes } => sugestoes,
            Self::Bare(list) => list,
        };
        let mut seen = std::collections::HashSet::new();
        raw.into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty() && seen.insert(s.to_lowercase()))
            .collect()
    }
}

/// `/buscar` response used to derive the brand list for a product term.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BrandSearch {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub results: Vec<Value>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub brands: Vec<String>,
}

impl BrandSearch {
    /// Brands for the term.
    ///
    /// Uses the `brands` field when it is non-empty, otherwise the distinct
    /// `marca` values of the results (flat or nested under `data`) in
    /// first-seen order.
    #[must_use]
    pub fn brand_list(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        let from_payload: Vec<String> = self
            .brands
            .iter()
            .map(|b| b.trim().to_string())
            .filter(|b| !b.is_empty() && seen.insert(b.clone()))
            .collect();
        if !from_payload.is_empty() {
            return from_payload;
        }

        self.results
            .iter()
            .filter_map(|item| {
                item.get("data")
                    .and_then(|d| d.get("marca"))
                    .or_else(|| item.get("marca"))
                    .and_then(Value::as_str)
            })
            .map(str::trim)
            .filter(|b| !b.is_empty() && seen.insert((*b).to_string()))
            .map(String::from)
            .collect()
    }
}

/// `/pesquisar` response: one page of products.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchPage {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub dados: Vec<Product>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub marcas: Vec<String>,
    #[serde(default = "one")]
    pub pagina: u32,
    #[serde(default = "one")]
    pub total_paginas: u32,
    #[serde(default)]
    pub mensagem: Option<String>,
}

impl Default for SearchPage {
    fn default() -> Self {
        Self {
            dados: Vec::new(),
            marcas: Vec::new(),
            pagina: 1,
            total_paginas: 1,
            mensagem: None,
        }
    }
}

impl SearchPage {
    /// An empty page carrying a message for the visitor.
    #[must_use]
    pub fn empty_with_message(message: impl Into<String>) -> Self {
        Self {
            mensagem: Some(message.into()),
            ..Self::default()
        }
    }

    /// Whether a previous page exists.
    #[must_use]
    pub const fn has_previous(&self) -> bool {
        self.pagina > 1
    }

    /// Whether a next page exists.
    #[must_use]
    pub const fn has_next(&self) -> bool {
        self.pagina < self.total_paginas
    }
}

/// `/produto_detalhes` response.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductDetails {
    #[serde(default, deserialize_with = "lenient")]
    pub item: Option<Product>,
    #[serde(default, deserialize_with = "lenient")]
    pub similares: Option<Vec<Product>>,
}

// =============================================================================
// Accounts
// =============================================================================

/// Account profile as returned by `/auth/login` and `/auth/me`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default, deserialize_with = "lenient_text")]
    pub id: Option<String>,
    #[serde(default)]
    pub nome: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub telefone: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub avatar_url: Option<String>,
}

/// Result envelope shared by the auth endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthEnvelope {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub user: Option<UserProfile>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Body of `POST /auth/login`.
#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub senha: &'a str,
}

/// Body of `POST /auth/register`.
#[derive(Debug, Serialize)]
pub struct RegisterRequest<'a> {
    pub nome: &'a str,
    pub email: &'a str,
    pub senha: &'a str,
}

/// Body of `PUT /auth/me`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProfileUpdate {
    pub nome: String,
    pub telefone: String,
    pub avatar_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub senha_atual: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nova_senha: Option<String>,
}

// =============================================================================
// Cart
// =============================================================================

/// A cart line as stored by the catalog API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub id_api_externa: ProductId,
    #[serde(default, deserialize_with = "lenient_text")]
    pub nome: Option<String>,
    #[serde(default = "one")]
    pub quantidade: u32,
    #[serde(default, deserialize_with = "lenient")]
    pub preco_final: Option<Price>,
    #[serde(default, deserialize_with = "lenient")]
    pub preco_original: Option<Price>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub url_imagem: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub marca: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub codigo_referencia: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub desconto: Option<f64>,
}

/// `GET /carrinho` response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CartPayload {
    #[serde(default)]
    pub success: bool,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub produtos: Vec<CartItem>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Body of `POST /salvar_produto`: a product snapshot plus quantity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveProduct {
    pub id_api_externa: ProductId,
    pub nome: String,
    pub codigo_referencia: Option<String>,
    pub url_imagem: Option<String>,
    pub preco_original: Option<Price>,
    pub preco_final: Option<Price>,
    pub desconto: Option<f64>,
    pub marca: Option<String>,
    pub quantidade: u32,
}

impl SaveProduct {
    /// Snapshot a product for the cart.
    #[must_use]
    pub fn from_product(product: &Product, quantidade: u32) -> Self {
        Self {
            id_api_externa: product.id.clone(),
            nome: product.name().to_string(),
            codigo_referencia: product.codigo_referencia.clone(),
            url_imagem: product.imagem_real.clone(),
            preco_original: product.preco_original,
            preco_final: product.preco,
            desconto: product.desconto_percentual,
            marca: product.marca.clone(),
            quantidade,
        }
    }
}

/// Generic `{success, error}` acknowledgement for mutations.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Ack {
    #[serde(default = "ack_default")]
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}

const fn ack_default() -> bool {
    true
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_product_lenient_fields() {
        let product: Product = serde_json::from_value(json!({
            "id": 981,
            "nomeProduto": "Disco de Freio Dianteiro",
            "marca": "Fras-le",
            "preco": "189,90",
            "precoOriginal": 210.5,
            "descontoPercentual": "abc",
            "imagemReal": "",
            "parcelas": {"qtd": 3, "valor": 63.3},
            "aplicacoes": null
        }))
        .unwrap();

        assert_eq!(product.id.as_str(), "981");
        assert_eq!(product.name(), "Disco de Freio Dianteiro");
        assert_eq!(product.preco.unwrap().to_string(), "R$ 189,90");
        assert_eq!(product.desconto_percentual, None);
        assert_eq!(product.imagem_real, None);
        assert_eq!(product.parcelas.as_ref().unwrap().count, 3);
        assert!(product.aplicacoes.is_empty());
        assert_eq!(
            product.strikethrough_price().unwrap().to_string(),
            "R$ 210,50"
        );
    }

    #[test]
    fn test_product_name_prefers_nome() {
        let product: Product =
            serde_json::from_value(json!({"id": "a", "nome": "Pastilha", "nomeProduto": "X"}))
                .unwrap();
        assert_eq!(product.name(), "Pastilha");
    }

    #[test]
    fn test_discount_percent_rounds() {
        let product: Product =
            serde_json::from_value(json!({"id": "a", "descontoPercentual": 12.6})).unwrap();
        assert_eq!(product.discount_percent(), Some(13));
    }

    #[test]
    fn test_suggestions_wrapped_or_bare() {
        let wrapped: SuggestionsPayload =
            serde_json::from_value(json!({"sugestoes": ["disco", "Disco", " pastilha "]}))
                .unwrap();
        assert_eq!(wrapped.into_suggestions(), vec!["disco", "pastilha"]);

        let bare: SuggestionsPayload = serde_json::from_value(json!(["amortecedor"])).unwrap();
        assert_eq!(bare.into_suggestions(), vec!["amortecedor"]);
    }

    #[test]
    fn test_brand_list_prefers_payload_brands() {
        let search: BrandSearch = serde_json::from_value(json!({
            "results": [{"marca": "Cofap"}],
            "brands": ["Bosch", "Fras-le", "Bosch"]
        }))
        .unwrap();
        assert_eq!(search.brand_list(), vec!["Bosch", "Fras-le"]);
    }

    #[test]
    fn test_brand_list_falls_back_to_results() {
        let search: BrandSearch = serde_json::from_value(json!({
            "results": [
                {"data": {"marca": "Cofap"}},
                {"marca": "Nakata"},
                {"marca": "Cofap"},
                {"marca": ""},
                {"nome": "sem marca"}
            ],
            "brands": []
        }))
        .unwrap();
        assert_eq!(search.brand_list(), vec!["Cofap", "Nakata"]);
    }

    #[test]
    fn test_search_page_defaults() {
        let page: SearchPage = serde_json::from_value(json!({})).unwrap();
        assert!(page.dados.is_empty());
        assert_eq!(page.pagina, 1);
        assert_eq!(page.total_paginas, 1);
        assert!(!page.has_previous());
        assert!(!page.has_next());
    }

    #[test]
    fn test_search_page_navigation() {
        let page: SearchPage =
            serde_json::from_value(json!({"pagina": 2, "total_paginas": 3, "dados": []})).unwrap();
        assert!(page.has_previous());
        assert!(page.has_next());
    }

    #[test]
    fn test_cart_item_defaults_quantity() {
        let item: CartItem =
            serde_json::from_value(json!({"id_api_externa": 7, "preco_final": "10.00"})).unwrap();
        assert_eq!(item.quantidade, 1);
        assert_eq!(item.id_api_externa.as_str(), "7");
    }

    #[test]
    fn test_profile_update_omits_password_fields() {
        let update = ProfileUpdate {
            nome: "Ana".to_string(),
            ..ProfileUpdate::default()
        };
        let value = serde_json::to_value(&update).unwrap();
        assert!(value.get("senha_atual").is_none());
        assert!(value.get("nova_senha").is_none());
        assert_eq!(value["nome"], "Ana");
    }
}
