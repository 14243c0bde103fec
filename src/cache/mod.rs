//! Caching subsystem.
//!
//! - [`TtlCache`] - generic in-memory store with per-entry TTL, LRU
//!   eviction at capacity and a cancellable background sweeper.
//!
//! - [`ModelLookup`] - serves model listings from a `TtlCache`, falling back
//!   to a pooled client on a miss.
//!
//! - [`cached_call`] - memoises any serialisable async result in a
//!   general-purpose `TtlCache<serde_json::Value>`.
//!
//! Keys for the last two are built by [`key::cache_key`].

pub mod key;
pub mod lookup;
pub mod ttl;

pub use lookup::{DEFAULT_MODEL_TTL, ModelLookup, cached_call};
pub use ttl::{CacheConfig, CacheStats, EntryMetadata, TtlCache};
