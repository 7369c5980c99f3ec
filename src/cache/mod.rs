//! Page cache for rendered responses.
//!
//! Responses are held for a fixed time window and are never invalidated by
//! writes: a new post shows up on a cached page once the window lapses.
//! Entries are keyed on the request path, the query string and the session
//! cookie, so signed-in viewers never see each other's navigation.
//!
//! ```toml
//! [cache]
//! enabled = true
//! index_ttl_seconds = 20
//! capacity = 256
//! ```

mod config;
mod keys;
mod lock;
mod middleware;
mod store;

pub use config::CacheConfig;
pub use keys::ResponseKey;
pub use middleware::{CacheState, response_cache_layer};
pub use store::{CachedResponse, ResponseStore};
