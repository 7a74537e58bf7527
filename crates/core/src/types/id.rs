//! Newtype IDs for catalog references.
//!
//! The catalog API is inconsistent about identifier types: manufacturers and
//! families come back with numeric ids, products with string ids, and the
//! same id is echoed back as a string in query parameters. Every id here is
//! kept as a string and deserializes from either JSON form.

/// Macro to define a type-safe string ID wrapper.
///
/// Creates a newtype wrapper around `String` with:
/// - `Serialize` as a string, `Deserialize` from a string or an integer
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`, `Default`
/// - `new()`, `as_str()`, `is_empty()`
/// - `Display`, `From<String>`, `From<&str>`, `From<u64>`
///
/// # Example
///
/// ```rust
/// # use ancora_core::define_id;
/// define_id!(PecaId);
/// define_id!(LojaId);
///
/// let peca: PecaId = serde_json::from_str("42").unwrap();
/// assert_eq!(peca.as_str(), "42");
///
/// // Different types, so this won't compile:
/// // let _: LojaId = peca;
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Default, ::serde::Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new ID, trimming surrounding whitespace.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                let id = id.into();
                let trimmed = id.trim();
                if trimmed.len() == id.len() {
                    Self(id)
                } else {
                    Self(trimmed.to_string())
                }
            }

            /// Get the underlying string value.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Whether the ID is blank.
            #[must_use]
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self::new(id)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self::new(id)
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id.to_string())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl<'de> ::serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> ::core::result::Result<Self, D::Error>
            where
                D: ::serde::Deserializer<'de>,
            {
                $crate::types::id::deserialize_flexible(deserializer).map(Self::new)
            }
        }
    };
}

#[doc(hidden)]
pub fn deserialize_flexible<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    struct FlexibleVisitor;

    impl serde::de::Visitor<'_> for FlexibleVisitor {
        type Value = String;

        fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("a string or integer id")
        }

        fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_string<E: serde::de::Error>(self, v: String) -> Result<String, E> {
            Ok(v)
        }

        fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<String, E> {
            Ok(v.to_string())
        }
    }

    deserializer.deserialize_any(FlexibleVisitor)
}

define_id!(ManufacturerId);
define_id!(FamilyId);
define_id!(SubfamilyId);
define_id!(ProductId);
