//! Per-visitor debouncing with request-sequence tokens.
//!
//! Every keystroke bumps the visitor's sequence counter and waits out the
//! quiet period. Only the wait that finishes with its own sequence number
//! still current may call the catalog; the returned [`Ticket`] is checked
//! again when the response arrives so a slow, older answer can never
//! replace a newer one.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use moka::future::Cache;

/// Idle time after which a visitor's counter is dropped.
const COUNTER_IDLE: Duration = Duration::from_secs(30 * 60);

/// Debounces work per key (one key per visitor).
#[derive(Clone)]
pub struct Debouncer {
    quiet: Duration,
    counters: Cache<String, Arc<AtomicU64>>,
}

/// Proof that a debounced wait was the latest one for its key.
#[derive(Debug)]
pub struct Ticket {
    counter: Arc<AtomicU64>,
    seq: u64,
}

impl Ticket {
    /// Whether no newer request has been made for the same key since.
    #[must_use]
    pub fn is_current(&self) -> bool {
        self.counter.load(Ordering::SeqCst) == self.seq
    }
}

impl Debouncer {
    /// Create a debouncer with the given quiet period.
    #[must_use]
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            counters: Cache::builder()
                .max_capacity(100_000)
                .time_to_idle(COUNTER_IDLE)
                .build(),
        }
    }

    /// The configured quiet period.
    #[must_use]
    pub const fn quiet(&self) -> Duration {
        self.quiet
    }

    async fn counter(&self, key: &str) -> Arc<AtomicU64> {
        self.counters
            .get_with(key.to_string(), async { Arc::new(AtomicU64::new(0)) })
            .await
    }

    /// Register a request for `key` and wait for the quiet period.
    ///
    /// Returns `None` if a newer request for the same key arrived while
    /// waiting.
    pub async fn debounce(&self, key: &str) -> Option<Ticket> {
        let counter = self.counter(key).await;
        let seq = counter.fetch_add(1, Ordering::SeqCst) + 1;

        tokio::time::sleep(self.quiet).await;

        let ticket = Ticket { counter, seq };
        ticket.is_current().then_some(ticket)
    }

    /// Invalidate any pending or in-flight request for `key`.
    pub async fn cancel(&self, key: &str) {
        self.counter(key).await.fetch_add(1, Ordering::SeqCst);
    }
}
