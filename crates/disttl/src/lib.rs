//! Distributed, tag-invalidated, TTL-bounded LRU cache.
//!
//! ## Architecture
//!
//! - **[`TtlLru`]**: per-process bounded LRU with lazy TTL expiry
//! - **Tags**: every entry carries a set of dependency tags ("signals")
//! - **[`InvalidationTransport`]**: pub/sub used to fan signals out
//! - **[`DistributedTtlLru`]**: serves reads/writes locally, publishes and
//!   applies tag invalidations across all nodes sharing a scope
//!
//! ```text
//! set(key, value, ttl, tags)  → local only
//! get(key)                    → local only
//! update_signal(tags)         → PUBLISH {scope}disttl_signal
//!                                 ↓
//!                 every started node: delete entries tagged with any of `tags`
//! ```

pub mod config;
pub mod distributed;
pub mod error;
pub mod lru;
pub mod observer;
pub mod signal;
pub mod sweeper;
pub mod tags;
pub mod transport;

pub use config::CacheConfig;
pub use distributed::{DistributedTtlLru, ListenerState};
pub use error::{BoxError, CacheError, CacheResult, TransportError};
pub use lru::TtlLru;
pub use observer::{InvalidationObserver, InvalidationReport, TracingObserver};
pub use signal::{SIGNAL_DELIMITER, decode_signals, encode_signals, signal_topic};
pub use sweeper::{DEFAULT_SWEEP_INTERVAL, MIN_SWEEP_INTERVAL, spawn_expiry_sweeper};
pub use tags::{TagSet, TaggedValue, delete_by_tags};
pub use transport::{InvalidationTransport, MemoryTransport, SignalStream};
