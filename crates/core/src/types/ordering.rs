//! Result ordering and its normalization from storefront sort options.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Field the catalog sorts results by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortField {
    /// Catalog relevance score (server default).
    #[default]
    Relevancia,
    /// Final price.
    Preco,
    /// Customer rating.
    Avaliacao,
    /// Product name.
    Nome,
}

impl SortField {
    /// Wire value sent as the `sort` query parameter.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Relevancia => "relevancia",
            Self::Preco => "preco",
            Self::Avaliacao => "avaliacao",
            Self::Nome => "nome",
        }
    }

    fn from_alias(alias: &str) -> Option<Self> {
        match alias {
            "relevancia" => Some(Self::Relevancia),
            "menor-preco" | "maior-preco" | "preco" | "price" => Some(Self::Preco),
            "melhor-avaliacao" | "avaliacao" | "rating" => Some(Self::Avaliacao),
            "nome" | "name" => Some(Self::Nome),
            _ => None,
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    /// Ascending.
    Asc,
    /// Descending.
    Desc,
}

impl SortDirection {
    /// Parse `asc|ascending|desc|descending`, ignoring case.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Some(Self::Asc),
            "desc" | "descending" => Some(Self::Desc),
            _ => None,
        }
    }

    /// Wire value sent as the `order` query parameter.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// A normalized result ordering.
///
/// ```
/// use ancora_core::{Ordering, SortDirection, SortField};
///
/// let o = Ordering::normalize(Some("menor-preco"), Some("desc"));
/// assert_eq!(o.field, SortField::Preco);
/// assert_eq!(o.direction, Some(SortDirection::Asc));
///
/// assert_eq!(Ordering::normalize(Some("whatever"), None).field, SortField::Relevancia);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Ordering {
    /// Sort field.
    pub field: SortField,
    /// Sort direction, when one was requested.
    pub direction: Option<SortDirection>,
}

impl Ordering {
    /// Sort options offered in the storefront, as `(key, label)`.
    pub const OPTIONS: [(&'static str, &'static str); 4] = [
        ("relevancia", "Mais Relevantes"),
        ("menor-preco", "Menor Preço"),
        ("maior-preco", "Maior Preço"),
        ("melhor-avaliacao", "Melhor Avaliação"),
    ];

    /// Build an ordering from a sort option and an optional direction.
    ///
    /// `precoAsc`/`precoDesc` are shorthands. `menor-preco` and `maior-preco`
    /// force ascending and descending respectively, whatever the direction
    /// argument says. Unknown options fall back to relevance.
    #[must_use]
    pub fn normalize(sort: Option<&str>, direction: Option<&str>) -> Self {
        let direction_arg = direction.and_then(SortDirection::parse);
        let Some(raw) = sort.map(str::trim).filter(|s| !s.is_empty()) else {
            return Self {
                field: SortField::Relevancia,
                direction: direction_arg,
            };
        };

        match raw {
            "precoAsc" => return Self::price(SortDirection::Asc),
            "precoDesc" => return Self::price(SortDirection::Desc),
            _ => {}
        }

        let key = raw.to_ascii_lowercase();
        let field = SortField::from_alias(&key).unwrap_or_default();
        let direction = match key.as_str() {
            "menor-preco" => Some(SortDirection::Asc),
            "maior-preco" => Some(SortDirection::Desc),
            _ => direction_arg,
        };
        Self { field, direction }
    }

    /// Build an ordering from a storefront sort option key. A bare
    /// direction (`asc`, `desc`) keeps relevance order in that direction.
    #[must_use]
    pub fn from_option(key: &str) -> Self {
        match SortDirection::parse(key) {
            Some(direction) => Self {
                field: SortField::Relevancia,
                direction: Some(direction),
            },
            None => Self::normalize(Some(key), None),
        }
    }

    /// Build an ordering from results page parameters, or `None` when none
    /// were given.
    ///
    /// `ordem` may be a direction or a sort option key. As a direction it
    /// wins over `order` and combines with `sort`.
    ///
    /// ```
    /// use ancora_core::{Ordering, SortDirection, SortField};
    ///
    /// let o = Ordering::from_params(Some("asc"), None, None).unwrap();
    /// assert_eq!(o.direction, Some(SortDirection::Asc));
    ///
    /// let o = Ordering::from_params(Some("desc"), Some("nome"), Some("asc")).unwrap();
    /// assert_eq!((o.field, o.direction), (SortField::Nome, Some(SortDirection::Desc)));
    ///
    /// assert!(Ordering::from_params(None, None, None).is_none());
    /// ```
    #[must_use]
    pub fn from_params(
        ordem: Option<&str>,
        sort: Option<&str>,
        order: Option<&str>,
    ) -> Option<Self> {
        let ordem = ordem.map(str::trim).filter(|o| !o.is_empty());
        match ordem {
            Some(ordem) if SortDirection::parse(ordem).is_some() => {
                Some(Self::normalize(sort, Some(ordem)))
            }
            Some(ordem) => Some(Self::normalize(Some(ordem), order)),
            None if sort.is_some() || order.is_some() => Some(Self::normalize(sort, order)),
            None => None,
        }
    }

    const fn price(direction: SortDirection) -> Self {
        Self {
            field: SortField::Preco,
            direction: Some(direction),
        }
    }

    /// The storefront option key this ordering corresponds to.
    #[must_use]
    pub const fn option_key(&self) -> &'static str {
        match (self.field, self.direction) {
            (SortField::Preco, Some(SortDirection::Desc)) => "maior-preco",
            (SortField::Preco, _) => "menor-preco",
            (SortField::Avaliacao, _) => "melhor-avaliacao",
            (SortField::Nome, _) => "nome",
            (SortField::Relevancia, Some(direction)) => direction.as_str(),
            (SortField::Relevancia, None) => "relevancia",
        }
    }

    /// Query parameters understood by the catalog API.
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(&'static str, &'static str)> {
        let mut pairs = vec![("sort", self.field.as_str())];
        if let Some(direction) = self.direction {
            pairs.push(("order", direction.as_str()));
        }
        pairs
    }
}

impl fmt::Display for Ordering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.option_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_shorthands() {
        assert_eq!(
            Ordering::normalize(Some("precoAsc"), Some("desc")),
            Ordering::price(SortDirection::Asc)
        );
        assert_eq!(
            Ordering::normalize(Some("precoDesc"), None),
            Ordering::price(SortDirection::Desc)
        );
    }

    #[test]
    fn test_price_options_force_direction() {
        let cheap = Ordering::from_option("menor-preco");
        assert_eq!(cheap.query_pairs(), vec![("sort", "preco"), ("order", "asc")]);
        let dear = Ordering::normalize(Some("maior-preco"), Some("asc"));
        assert_eq!(dear.direction, Some(SortDirection::Desc));
    }

    #[test]
    fn test_synonyms() {
        assert_eq!(Ordering::from_option("price").field, SortField::Preco);
        assert_eq!(Ordering::from_option("rating").field, SortField::Avaliacao);
        assert_eq!(
            Ordering::from_option("melhor-avaliacao").field,
            SortField::Avaliacao
        );
        assert_eq!(Ordering::from_option("NOME").field, SortField::Nome);
    }

    #[test]
    fn test_unknown_falls_back_to_relevance() {
        let o = Ordering::normalize(Some("mais-vendidos"), Some("Descending"));
        assert_eq!(o.field, SortField::Relevancia);
        assert_eq!(o.direction, Some(SortDirection::Desc));
    }

    #[test]
    fn test_invalid_direction_dropped() {
        let o = Ordering::normalize(Some("nome"), Some("sideways"));
        assert_eq!(o.direction, None);
        assert_eq!(o.query_pairs(), vec![("sort", "nome")]);
    }

    #[test]
    fn test_direction_as_option() {
        let o = Ordering::from_option("asc");
        assert_eq!(o.field, SortField::Relevancia);
        assert_eq!(o.query_pairs(), vec![("sort", "relevancia"), ("order", "asc")]);
        assert_eq!(o.option_key(), "asc");
        assert_eq!(Ordering::from_option("DESC").direction, Some(SortDirection::Desc));
    }

    #[test]
    fn test_from_params_reads_ordem_as_direction_first() {
        let o = Ordering::from_params(Some("asc"), None, Some("desc")).unwrap();
        assert_eq!(o.direction, Some(SortDirection::Asc));

        let o = Ordering::from_params(Some("menor-preco"), None, None).unwrap();
        assert_eq!(o, Ordering::price(SortDirection::Asc));

        let o = Ordering::from_params(Some("nome"), None, Some("desc")).unwrap();
        assert_eq!((o.field, o.direction), (SortField::Nome, Some(SortDirection::Desc)));

        let o = Ordering::from_params(Some(" "), Some("preco"), Some("asc")).unwrap();
        assert_eq!(o, Ordering::price(SortDirection::Asc));

        assert!(Ordering::from_params(None, None, None).is_none());
    }

    #[test]
    fn test_option_key_round_trips_offered_options() {
        for (key, _) in Ordering::OPTIONS {
            assert_eq!(Ordering::from_option(key).option_key(), key);
        }
        for key in ["asc", "desc"] {
            assert_eq!(Ordering::from_option(key).option_key(), key);
        }
    }
}
