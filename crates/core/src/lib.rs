//! Âncora Core - Shared domain types.
//!
//! This crate provides the types shared by the storefront and its tests:
//! - validated emails for the account forms
//! - prices in Brazilian Real with tolerant parsing of backend amounts
//! - option ids for the Montadora → Família → SubFamília cascade
//! - sort ordering normalization for catalog searches
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O and no HTTP clients. This
//! keeps it lightweight and allows it to be used anywhere.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
