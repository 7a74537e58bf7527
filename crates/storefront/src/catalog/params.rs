//! Query parameters for `/pesquisar`.

use serde::{Deserialize, Serialize};

use ancora_core::{FamilyId, Ordering, SubfamilyId};

/// Guided (cascade) part of a search: manufacturer and family, optionally
/// narrowed to a subfamily.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuidedFilter {
    pub montadora_nome: String,
    pub familia_id: FamilyId,
    pub familia_nome: String,
    pub subfamilia_id: Option<SubfamilyId>,
}

/// A confirmed product search.
///
/// Text searches fill `termo` (plus optional `placa` and `marca`); guided
/// searches fill `guided`. Both carry paging and ordering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchParams {
    pub pagina: u32,
    pub termo: String,
    pub placa: String,
    pub marca: String,
    pub ordering: Ordering,
    pub guided: Option<GuidedFilter>,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            pagina: 1,
            termo: String::new(),
            placa: String::new(),
            marca: String::new(),
            ordering: Ordering::default(),
            guided: None,
        }
    }
}

impl SearchParams {
    /// Whether there is enough to query: a term, a plate, or a guided filter.
    #[must_use]
    pub fn is_runnable(&self) -> bool {
        !self.termo.trim().is_empty() || !self.placa.trim().is_empty() || self.guided.is_some()
    }

    /// Query pairs for the request. Empty values are not sent.
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs: Vec<(&'static str, String)> = vec![("pagina", self.pagina.max(1).to_string())];

        let mut push = |key: &'static str, value: &str| {
            let value = value.trim();
            if !value.is_empty() {
                pairs.push((key, value.to_string()));
            }
        };

        push("termo", &self.termo);
        push("placa", &self.placa.to_uppercase());
        push("marca", &self.marca);

        if let Some(guided) = &self.guided {
            push("montadora_nome", &guided.montadora_nome);
            push("familia_id", guided.familia_id.as_str());
            push("familia_nome", &guided.familia_nome);
            if let Some(subfamily) = &guided.subfamilia_id {
                push("subfamilia_id", subfamily.as_str());
            }
        }

        pairs.extend(
            self.ordering
                .query_pairs()
                .into_iter()
                .map(|(k, v)| (k, v.to_string())),
        );
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(pairs: &[(&'static str, String)]) -> Vec<&'static str> {
        pairs.iter().map(|(k, _)| *k).collect()
    }

    #[test]
    fn test_empty_values_not_sent() {
        let params = SearchParams {
            termo: "disco".to_string(),
            marca: "  ".to_string(),
            ..SearchParams::default()
        };
        assert_eq!(keys(&params.query_pairs()), vec!["pagina", "termo", "sort"]);
    }

    #[test]
    fn test_placa_upper_cased() {
        let params = SearchParams {
            placa: "abc1d23".to_string(),
            ..SearchParams::default()
        };
        assert!(
            params
                .query_pairs()
                .contains(&("placa", "ABC1D23".to_string()))
        );
    }

    #[test]
    fn test_guided_pairs() {
        let params = SearchParams {
            pagina: 2,
            ordering: Ordering::from_option("maior-preco"),
            guided: Some(GuidedFilter {
                montadora_nome: "Volkswagen".to_string(),
                familia_id: FamilyId::new("12"),
                familia_nome: "Freios".to_string(),
                subfamilia_id: None,
            }),
            ..SearchParams::default()
        };
        let pairs = params.query_pairs();
        assert_eq!(
            keys(&pairs),
            vec![
                "pagina",
                "montadora_nome",
                "familia_id",
                "familia_nome",
                "sort",
                "order"
            ]
        );
        assert!(pairs.contains(&("pagina", "2".to_string())));
        assert!(pairs.contains(&("order", "desc".to_string())));
        assert!(params.is_runnable());
    }

    #[test]
    fn test_page_zero_sent_as_one() {
        let params = SearchParams {
            pagina: 0,
            ..SearchParams::default()
        };
        assert_eq!(params.query_pairs()[0], ("pagina", "1".to_string()));
        assert!(!params.is_runnable());
    }
}
