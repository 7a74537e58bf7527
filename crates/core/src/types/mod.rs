//! Core types for the storefront.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod ordering;
pub mod price;

pub use email::{Email, EmailError};
pub use id::*;
pub use ordering::{Ordering, SortDirection, SortField};
pub use price::{Price, PriceError};
