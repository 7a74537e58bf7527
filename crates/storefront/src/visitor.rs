//! Live per-visitor UI state.
//!
//! The search box and the cascade selects are driven by overlapping
//! requests (a debounced suggestion can still be waiting when the visitor
//! clicks away). The session record is written back whole at the end of
//! each request, so this state lives here instead, behind one lock per
//! visitor, and every handler mutates it in place.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use tokio::sync::Mutex;
use tower_sessions::Session;

use crate::cascade::Cascade;
use crate::middleware::{existing_visitor_id, visitor_id};
use crate::search::SearchState;

/// Idle time after which a visitor's state is dropped.
const STATE_IDLE: Duration = Duration::from_secs(2 * 60 * 60);

/// Search box and guided search state of one visitor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisitorState {
    pub search: SearchState,
    pub cascade: Cascade,
}

/// Shared handle to one visitor's state.
pub type SharedVisitorState = Arc<Mutex<VisitorState>>;

/// Per-visitor state keyed by visitor id.
#[derive(Clone)]
pub struct VisitorStore {
    states: Cache<String, SharedVisitorState>,
}

impl Default for VisitorStore {
    fn default() -> Self {
        Self::new()
    }
}

impl VisitorStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            states: Cache::builder()
                .max_capacity(100_000)
                .time_to_idle(STATE_IDLE)
                .build(),
        }
    }

    /// State for `visitor`, created empty on first use.
    pub async fn get(&self, visitor: &str) -> SharedVisitorState {
        self.states
            .get_with(visitor.to_string(), async {
                Arc::new(Mutex::new(VisitorState::default()))
            })
            .await
    }

    /// State for the visitor behind `session`, assigning a visitor id if
    /// the session has none yet.
    pub async fn for_session(&self, session: &Session) -> SharedVisitorState {
        self.get(&visitor_id(session).await).await
    }

    /// Copy of the visitor's search box for rendering. Never creates a
    /// visitor.
    pub async fn search_box(&self, session: &Session) -> SearchState {
        let Some(id) = existing_visitor_id(session).await else {
            return SearchState::default();
        };
        match self.states.get(&id).await {
            Some(state) => state.lock().await.search.clone(),
            None => SearchState::default(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tower_sessions::MemoryStore;

    use super::*;

    fn session() -> Session {
        Session::new(None, Arc::new(MemoryStore::default()), None)
    }

    #[tokio::test]
    async fn test_same_visitor_shares_state() {
        let store = VisitorStore::new();
        let session = session();

        store.for_session(&session).await.lock().await.search.set_query("disco");

        let again = store.for_session(&session).await;
        assert_eq!(again.lock().await.search.query, "disco");
        assert_eq!(store.search_box(&session).await.query, "disco");
    }

    #[tokio::test]
    async fn test_visitors_are_independent() {
        let store = VisitorStore::new();
        store.get("a").await.lock().await.search.set_query("disco");
        assert_eq!(store.get("b").await.lock().await.search.query, "");
    }

    #[tokio::test]
    async fn test_search_box_does_not_create_visitor() {
        let store = VisitorStore::new();
        let session = session();

        assert_eq!(store.search_box(&session).await, SearchState::default());
        assert!(existing_visitor_id(&session).await.is_none());
    }

    #[tokio::test]
    async fn test_held_handle_sees_later_updates() {
        let store = VisitorStore::new();
        let held = store.get("v1").await;
        held.lock().await.search.set_query("pastilha");
        held.lock().await.search.focus();

        store.get("v1").await.lock().await.search.panel_open = false;

        assert!(!held.lock().await.search.panel_open);
    }
}
