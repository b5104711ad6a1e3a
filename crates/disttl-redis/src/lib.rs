//! Redis transport for `disttl` invalidation signals.
//!
//! ```ignore
//! use std::sync::Arc;
//! use disttl::DistributedTtlLru;
//! use disttl_redis::{RedisConfig, RedisTransport};
//!
//! let transport = Arc::new(RedisTransport::connect(&RedisConfig::default()).await?);
//! let cache: DistributedTtlLru<String> = DistributedTtlLru::new(10_000, "orders:", transport)?;
//! cache.start(shutdown_rx).await?;
//! ```

pub mod config;
pub mod transport;

pub use config::RedisConfig;
pub use transport::RedisTransport;
