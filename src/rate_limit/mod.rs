//! Fixed-window, per-client admission control.

pub mod middleware;
pub mod store;

pub use middleware::{enforce_rate_limit, RateLimiter, RATE_LIMITED_MESSAGE};
pub use store::{InMemoryRateLimitStore, RateLimitStore, WindowState};
