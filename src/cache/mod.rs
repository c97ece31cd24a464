//! Local caching for offline and repeat access.
//!
//! Responses are stored as JSON `CacheEntry` values in a string key/value
//! `CacheStore`. Entries older than the configured TTL (4 hours by
//! default) are refetched before use.

pub mod manager;
pub mod store;

pub use manager::{CacheEntry, CacheManager};
pub use store::{CacheStore, FileStore, MemoryStore};
