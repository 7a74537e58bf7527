//! Custom Askama template filters.

#![allow(clippy::unnecessary_wraps)]

use std::fmt::Display;

/// Returns the current year.
///
/// Usage in templates: `{{ ""|current_year }}`
#[allow(clippy::unnecessary_wraps)]
#[askama::filter_fn]
pub fn current_year(_value: impl Display, _env: &dyn askama::Values) -> askama::Result<i32> {
    use chrono::Datelike;
    Ok(chrono::Utc::now().year())
}

/// Returns the content hash for main.css.
///
/// The hash is computed at build time from the CSS file content.
///
/// Usage in templates: `{{ ""|css_hash }}`
#[allow(clippy::unnecessary_wraps)]
#[askama::filter_fn]
pub fn css_hash(_value: impl Display, _env: &dyn askama::Values) -> askama::Result<&'static str> {
    Ok(env!("CSS_HASH"))
}

/// Returns the content hash for app.js.
///
/// Usage in templates: `{{ ""|js_hash }}`
#[allow(clippy::unnecessary_wraps)]
#[askama::filter_fn]
pub fn js_hash(_value: impl Display, _env: &dyn askama::Values) -> askama::Result<&'static str> {
    Ok(env!("JS_HASH"))
}

/// Encodes a value for use in a query string.
///
/// Usage in templates: `/produto?id={{ product.id|urlencode_component }}`
#[allow(clippy::unnecessary_wraps)]
#[askama::filter_fn]
pub fn urlencode_component(value: impl Display, _env: &dyn askama::Values) -> askama::Result<String> {
    Ok(urlencoding::encode(&value.to_string()).into_owned())
}
