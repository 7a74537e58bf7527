//! Session-related types.
//!
//! Credentials, profile and the login prompt live in the visitor's
//! server-side session under the keys below. The live search box state is
//! kept in [`crate::visitor`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::catalog::UserProfile;

/// Where the login prompt sends visitors by default.
pub const DEFAULT_LOGIN_TARGET: &str = "/login";

/// A same-site path (`/perfil`), or `None` for blank or off-site targets.
#[must_use]
pub fn local_path(target: Option<&str>) -> Option<&str> {
    target
        .map(str::trim)
        .filter(|t| t.starts_with('/') && !t.starts_with("//") && !t.contains('\\'))
}

/// Session-stored profile of the signed-in visitor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: Option<String>,
    pub nome: String,
    pub email: String,
    pub telefone: Option<String>,
    pub avatar_url: Option<String>,
}

impl CurrentUser {
    /// First name for the header greeting, falling back to the email.
    #[must_use]
    pub fn first_name(&self) -> &str {
        self.nome
            .split_whitespace()
            .next()
            .unwrap_or(self.email.as_str())
    }
}

impl From<UserProfile> for CurrentUser {
    fn from(profile: UserProfile) -> Self {
        Self {
            id: profile.id,
            nome: profile.nome.trim().to_string(),
            email: profile.email.trim().to_string(),
            telefone: profile.telefone,
            avatar_url: profile.avatar_url,
        }
    }
}

/// The "login required" prompt.
///
/// Shown when a visitor without a token tries a gated action. It hides
/// itself once `ttl` has passed since `shown_at_ms`, or when dismissed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginAlert {
    /// Page the prompt's button leads to.
    pub redirect_to: String,
    /// Unix time in milliseconds when the prompt appeared.
    pub shown_at_ms: i64,
}

impl LoginAlert {
    /// Create a prompt shown at `now_ms`. Blank or off-site targets fall
    /// back to the login page.
    #[must_use]
    pub fn new(redirect_to: Option<&str>, now_ms: i64) -> Self {
        let redirect_to = local_path(redirect_to)
            .unwrap_or(DEFAULT_LOGIN_TARGET)
            .to_string();
        Self {
            redirect_to,
            shown_at_ms: now_ms,
        }
    }

    /// Whether the prompt is still on screen at `now_ms`.
    #[must_use]
    pub fn is_visible(&self, now_ms: i64, ttl: Duration) -> bool {
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        now_ms.saturating_sub(self.shown_at_ms) < ttl_ms
    }

    /// Milliseconds left before the prompt hides itself.
    #[must_use]
    pub fn remaining_ms(&self, now_ms: i64, ttl: Duration) -> i64 {
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        ttl_ms
            .saturating_sub(now_ms.saturating_sub(self.shown_at_ms))
            .max(0)
    }
}

/// Session keys.
pub mod keys {
    /// Bearer token issued by the catalog API.
    pub const ACCESS_TOKEN: &str = "access_token";

    /// Profile of the signed-in visitor.
    pub const CURRENT_USER: &str = "current_user";

    /// Sum of cart line quantities.
    pub const CART_COUNT: &str = "cart_count";

    /// Pending "login required" prompt.
    pub const LOGIN_ALERT: &str = "login_alert";

    /// Set once the persisted token was checked against `/auth/me`.
    pub const HYDRATED: &str = "hydrated";

    /// Stable id keying this visitor's debouncer and live search state.
    pub const VISITOR_ID: &str = "visitor_id";
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_millis(6000);

    #[test]
    fn test_alert_defaults_to_login() {
        assert_eq!(LoginAlert::new(None, 0).redirect_to, "/login");
        assert_eq!(LoginAlert::new(Some("  "), 0).redirect_to, "/login");
        assert_eq!(
            LoginAlert::new(Some("https://evil.example"), 0).redirect_to,
            "/login"
        );
        assert_eq!(LoginAlert::new(Some("//evil.example"), 0).redirect_to, "/login");
        assert_eq!(
            LoginAlert::new(Some("/cadastro"), 0).redirect_to,
            "/cadastro"
        );
    }

    #[test]
    fn test_alert_hides_after_ttl() {
        let alert = LoginAlert::new(None, 1_000);
        assert!(alert.is_visible(1_000, TTL));
        assert!(alert.is_visible(6_999, TTL));
        assert!(!alert.is_visible(7_000, TTL));
        assert_eq!(alert.remaining_ms(4_000, TTL), 3_000);
        assert_eq!(alert.remaining_ms(9_000, TTL), 0);
    }

    #[test]
    fn test_first_name() {
        let user = CurrentUser {
            nome: "Ana Paula Souza".to_string(),
            email: "ana@example.com".to_string(),
            ..CurrentUser::default()
        };
        assert_eq!(user.first_name(), "Ana");

        let user = CurrentUser {
            email: "ana@example.com".to_string(),
            ..CurrentUser::default()
        };
        assert_eq!(user.first_name(), "ana@example.com");
    }
}
