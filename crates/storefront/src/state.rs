//! Application state shared across handlers.

use std::sync::Arc;

use crate::catalog::{CatalogClient, CatalogError};
use crate::config::StorefrontConfig;
use crate::search::Debouncer;
use crate::visitor::VisitorStore;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// the catalog client, the keystroke debouncer, live visitor state and
/// configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    catalog: CatalogClient,
    debouncer: Debouncer,
    visitors: VisitorStore,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog HTTP client cannot be built.
    pub fn new(config: StorefrontConfig) -> Result<Self, CatalogError> {
        let catalog = CatalogClient::new(&config.catalog)?;
        let debouncer = Debouncer::new(config.search_debounce);

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                catalog,
                debouncer,
                visitors: VisitorStore::new(),
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the catalog API client.
    #[must_use]
    pub fn catalog(&self) -> &CatalogClient {
        &self.inner.catalog
    }

    /// Get a reference to the keystroke debouncer.
    #[must_use]
    pub fn debouncer(&self) -> &Debouncer {
        &self.inner.debouncer
    }

    /// Get a reference to the per-visitor search and cascade state.
    #[must_use]
    pub fn visitors(&self) -> &VisitorStore {
        &self.inner.visitors
    }
}
