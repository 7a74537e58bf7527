//! Security headers middleware for XSS, clickjacking, and isolation protection.
//!
//! Adds restrictive security headers to all responses.

use axum::{
    extract::Request,
    http::{
        HeaderName, HeaderValue,
        header::{
            CONTENT_SECURITY_POLICY, REFERRER_POLICY, X_CONTENT_TYPE_OPTIONS, X_FRAME_OPTIONS,
        },
    },
    middleware::Next,
    response::Response,
};

use super::CspNonce;

/// HTMX is served from unpkg.
const SCRIPT_CDN: &str = "https://unpkg.com";

/// Build the CSP for a page whose inline script carries `nonce`.
///
/// ```text
/// default-src 'none';
/// script-src 'self' https://unpkg.com 'nonce-…';
/// style-src 'self';
/// img-src 'self' https: data:;
/// connect-src 'self';
/// font-src 'self';
/// object-src 'none';
/// base-uri 'self';
/// form-action 'self';
/// frame-ancestors 'none'
/// ```
#[must_use]
pub fn content_security_policy(nonce: Option<&CspNonce>) -> String {
    let script_src = match nonce {
        Some(nonce) if !nonce.0.is_empty() => format!("'self' {SCRIPT_CDN} {}", nonce.source()),
        _ => format!("'self' {SCRIPT_CDN}"),
    };
    format!(
        "default-src 'none'; \
         script-src {script_src}; \
         style-src 'self'; \
         img-src 'self' https: data:; \
         connect-src 'self'; \
         font-src 'self'; \
         object-src 'none'; \
         base-uri 'self'; \
         form-action 'self'; \
         frame-ancestors 'none'"
    )
}

/// Add security headers to all responses.
///
/// Headers applied:
/// - `X-Frame-Options: DENY`
/// - `X-Content-Type-Options: nosniff`
/// - `Referrer-Policy: same-origin`
/// - `Content-Security-Policy` with the request's nonce
/// - `Permissions-Policy` denying sensors, camera, microphone and payment
/// - `Cache-Control: no-store` unless the handler set its own
/// - `Cross-Origin-Opener-Policy: same-origin`
/// - `Cross-Origin-Embedder-Policy: credentialless` (product images come
///   from third-party hosts without CORP headers)
pub async fn security_headers_middleware(request: Request, next: Next) -> Response {
    let csp = content_security_policy(request.extensions().get::<CspNonce>());

    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert(X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    headers.insert(REFERRER_POLICY, HeaderValue::from_static("same-origin"));

    match HeaderValue::from_str(&csp) {
        Ok(value) => {
            headers.insert(CONTENT_SECURITY_POLICY, value);
        }
        Err(e) => tracing::error!(error = %e, "invalid CSP header value"),
    }

    headers.insert(
        HeaderName::from_static("permissions-policy"),
        HeaderValue::from_static(
            "accelerometer=(), \
             camera=(), \
             geolocation=(), \
             gyroscope=(), \
             magnetometer=(), \
             microphone=(), \
             payment=(), \
             usb=()",
        ),
    );

    // Session-dependent pages must not be cached
    if !headers.contains_key(axum::http::header::CACHE_CONTROL) {
        headers.insert(
            axum::http::header::CACHE_CONTROL,
            HeaderValue::from_static("no-store, max-age=0"),
        );
    }

    headers.insert(
        HeaderName::from_static("cross-origin-opener-policy"),
        HeaderValue::from_static("same-origin"),
    );
    headers.insert(
        HeaderName::from_static("cross-origin-embedder-policy"),
        HeaderValue::from_static("credentialless"),
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csp_includes_nonce() {
        let nonce = CspNonce("abc123".to_string());
        let csp = content_security_policy(Some(&nonce));
        assert!(csp.contains("script-src 'self' https://unpkg.com 'nonce-abc123';"));
        assert!(csp.contains("frame-ancestors 'none'"));
    }

    #[test]
    fn test_csp_without_nonce() {
        let csp = content_security_policy(None);
        assert!(!csp.contains("nonce-"));
        assert!(csp.contains("img-src 'self' https: data:;"));
    }
}
