//! Business logic services for storefront.
//!
//! # Services
//!
//! - `auth` - Session context: token, profile, cart counter, login prompt
//! - `cart` - Cart lines, quantity rules and featured products

pub mod auth;
pub mod cart;

pub use auth::{AuthError, SessionContext};
pub use cart::{CartContents, CartError, CartLine, CartService, QuantityChange};
