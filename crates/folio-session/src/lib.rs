//! Per-conversation result cache.
//!
//! Values are stored against a session key for the life of the process.
//! There is no eviction and no expiry: a conversation's record stays until
//! it is removed explicitly.
//!
//! # Example
//!
//! ```rust
//! use folio_session::SessionCache;
//!
//! # tokio_test_block_on(async {
//! let cache: SessionCache<String> = SessionCache::new();
//!
//! let guard = cache.key_lock("conv-1");
//! let _held = guard.lock().await;
//! if cache.get("conv-1").await.is_none() {
//!     cache.insert("conv-1", "record".to_string()).await;
//! }
//! assert_eq!(cache.get("conv-1").await.as_deref(), Some("record"));
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

mod cache;

pub use cache::{CacheEntry, CacheStats, SessionCache};
