//! Cache types for catalog API responses.

use std::sync::Arc;

use ancora_core::{FamilyId, ManufacturerId, SubfamilyId};

use super::types::{BrandSearch, FilterOption};

/// Cache key for reference lists and brand lookups.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub enum CacheKey {
    Manufacturers,
    Families,
    Subfamilies(FamilyId),
    Brands(String),
}

/// Cached value types.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Manufacturers(Arc<Vec<FilterOption<ManufacturerId>>>),
    Families(Arc<Vec<FilterOption<FamilyId>>>),
    Subfamilies(Arc<Vec<FilterOption<SubfamilyId>>>),
    Brands(Arc<BrandSearch>),
}
