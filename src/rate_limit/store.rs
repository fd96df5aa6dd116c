use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::future::Cache;

/// Snapshot of one client's window after a hit was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowState {
    /// Requests counted in the current window, including this one.
    pub hits: u32,
    /// Time until the window resets.
    pub resets_in: Duration,
}

/// Backing store for per-client request counters.
///
/// The in-memory implementation is enough for a single process; a shared
/// store (Redis and the like) can be dropped in without touching handlers.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Count one request for `key` and return the resulting window.
    async fn hit(&self, key: &str) -> Result<WindowState, String>;
}

#[derive(Debug)]
struct Window {
    started: Instant,
    hits: AtomicU32,
}

/// Fixed windows kept in a TTL cache; an entry expires exactly when its window ends.
#[derive(Clone)]
pub struct InMemoryRateLimitStore {
    window: Duration,
    windows: Cache<String, Arc<Window>>,
}

impl InMemoryRateLimitStore {
    pub fn new(window: Duration) -> Self {
        let windows = Cache::builder()
            .time_to_live(window)
            .max_capacity(100_000)
            .build();
        Self { window, windows }
    }
}

#[async_trait]
impl RateLimitStore for InMemoryRateLimitStore {
    async fn hit(&self, key: &str) -> Result<WindowState, String> {
        let window = self
            .windows
            .get_with(key.to_string(), async {
                Arc::new(Window {
                    started: Instant::now(),
                    hits: AtomicU32::new(0),
                })
            })
            .await;

        let hits = window.hits.fetch_add(1, Ordering::SeqCst).saturating_add(1);
        Ok(WindowState {
            hits,
            resets_in: self.window.saturating_sub(window.started.elapsed()),
        })
    }
}
