//! Prices in Brazilian Real using decimal arithmetic.
//!
//! The catalog API is loose about amounts: some endpoints send JSON numbers,
//! others send strings, and strings may use either `1234.56` or the pt-BR
//! `1.234,56` notation. [`Price`] accepts all of them and always renders as
//! `R$ 1.234,56`.

use std::fmt;
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Error parsing a price from text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid price: {0:?}")]
pub struct PriceError(pub String);

/// A price in Brazilian Real.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Price(Decimal);

impl Price {
    /// Zero reais.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create a price from a decimal amount.
    #[must_use]
    pub const fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Create a price from an amount in centavos.
    #[must_use]
    pub const fn from_centavos(centavos: i64) -> Self {
        Self(Decimal::from_parts(
            centavos.unsigned_abs() as u32,
            (centavos.unsigned_abs() >> 32) as u32,
            0,
            centavos < 0,
            2,
        ))
    }

    /// The underlying decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Whether the amount is greater than zero.
    #[must_use]
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// Parse an amount written in either `1234.56` or `1.234,56` notation.
    ///
    /// A leading `R$` and surrounding whitespace are ignored. When both `.`
    /// and `,` are present the last one is the decimal separator; a lone `,`
    /// is always decimal; a lone `.` is decimal unless it groups exactly three
    /// digits more than once (`1.234.567`).
    ///
    /// # Errors
    ///
    /// Returns [`PriceError`] when the text is not a number.
    pub fn parse_lenient(text: &str) -> Result<Self, PriceError> {
        let raw = text.trim().trim_start_matches("R$").trim();
        if raw.is_empty() {
            return Err(PriceError(text.to_string()));
        }

        let last_dot = raw.rfind('.');
        let last_comma = raw.rfind(',');
        let normalized = match (last_dot, last_comma) {
            (Some(dot), Some(comma)) if comma > dot => raw.replace('.', "").replace(',', "."),
            (Some(_), Some(_)) => raw.replace(',', ""),
            (None, Some(_)) => raw.replace('.', "").replace(',', "."),
            (Some(_), None) if raw.matches('.').count() > 1 => raw.replace('.', ""),
            _ => raw.to_string(),
        };

        Decimal::from_str(&normalized)
            .or_else(|_| Decimal::from_scientific(&normalized))
            .map(Self)
            .map_err(|_| PriceError(text.to_string()))
    }

    /// Multiply by a quantity.
    #[must_use]
    pub fn times(self, quantity: u32) -> Self {
        Self(self.0 * Decimal::from(quantity))
    }

    /// Value of each installment when split in `parts` interest-free payments.
    #[must_use]
    pub fn installment(self, parts: u32) -> Self {
        if parts == 0 {
            return self;
        }
        Self(
            (self.0 / Decimal::from(parts))
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
        )
    }

    /// Format as `R$ 1.234,56`.
    #[must_use]
    pub fn display(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rounded = self
            .0
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
            "-"
        } else {
            ""
        };
        let plain = format!("{:.2}", rounded.abs());
        let (int_part, frac_part) = plain.split_once('.').unwrap_or((plain.as_str(), "00"));

        let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
        for (i, digit) in int_part.chars().enumerate() {
            if i > 0 && (int_part.len() - i) % 3 == 0 {
                grouped.push('.');
            }
            grouped.push(digit);
        }

        write!(f, "{sign}R$ {grouped},{frac_part}")
    }
}

impl FromStr for Price {
    type Err = PriceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_lenient(s)
    }
}

impl From<Decimal> for Price {
    fn from(amount: Decimal) -> Self {
        Self(amount)
    }
}

impl std::iter::Sum for Price {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        Self(iter.map(|p| p.0).sum())
    }
}

impl Serialize for Price {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        rust_decimal::serde::float::serialize(&self.0, serializer)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawAmount {
    Number(serde_json::Number),
    Text(String),
}

impl<'de> Deserialize<'de> for Price {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match RawAmount::deserialize(deserializer)? {
            RawAmount::Number(n) => Self::parse_lenient(&n.to_string()),
            RawAmount::Text(s) => Self::parse_lenient(&s),
        }
        .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn p(s: &str) -> Price {
        Price::parse_lenient(s).unwrap()
    }

    #[test]
    fn test_display_groups_thousands() {
        assert_eq!(p("1234.5").to_string(), "R$ 1.234,50");
        assert_eq!(p("1234567.891").to_string(), "R$ 1.234.567,89");
        assert_eq!(p("0").to_string(), "R$ 0,00");
        assert_eq!(p("999").to_string(), "R$ 999,00");
    }

    #[test]
    fn test_display_negative() {
        assert_eq!(p("-12.5").to_string(), "-R$ 12,50");
    }

    #[test]
    fn test_parse_pt_br_notation() {
        assert_eq!(p("1.234,56"), p("1234.56"));
        assert_eq!(p("R$ 89,90"), p("89.90"));
        assert_eq!(p("1.234.567"), p("1234567"));
    }

    #[test]
    fn test_parse_en_notation_with_grouping() {
        assert_eq!(p("1,234.56"), p("1234.56"));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Price::parse_lenient("").is_err());
        assert!(Price::parse_lenient("grátis").is_err());
    }

    #[test]
    fn test_from_centavos() {
        assert_eq!(Price::from_centavos(12_990), p("129.90"));
        assert_eq!(Price::from_centavos(-5), p("-0.05"));
    }

    #[test]
    fn test_times_and_sum() {
        let total: Price = [p("10,00").times(3), p("2.5")].into_iter().sum();
        assert_eq!(total, p("32.5"));
    }

    #[test]
    fn test_installment() {
        assert_eq!(p("100").installment(3).to_string(), "R$ 33,33");
        assert_eq!(p("100").installment(0), p("100"));
    }

    #[test]
    fn test_deserialize_number_or_string() {
        let from_number: Price = serde_json::from_str("189.9").unwrap();
        let from_string: Price = serde_json::from_str("\"189,90\"").unwrap();
        assert_eq!(from_number, from_string);
        assert!(serde_json::from_str::<Price>("true").is_err());
    }

    #[test]
    fn test_serializes_as_json_number() {
        assert_eq!(serde_json::to_string(&p("189,90")).unwrap(), "189.9");
        assert_eq!(serde_json::to_value(p("10")).unwrap(), serde_json::json!(10.0));
    }
}
