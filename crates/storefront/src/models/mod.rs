//! Domain models for storefront.

pub mod session;

pub use session::{CurrentUser, DEFAULT_LOGIN_TARGET, LoginAlert, keys as session_keys, local_path};
