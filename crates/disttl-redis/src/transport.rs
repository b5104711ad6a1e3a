//! Redis Pub/Sub transport for cross-instance invalidation signals.

use async_trait::async_trait;
use deadpool_redis::{Pool, Runtime};
use disttl::{InvalidationTransport, SignalStream, TransportError};
use futures_util::StreamExt;
use redis::AsyncCommands;

use crate::config::RedisConfig;

/// [`InvalidationTransport`] over Redis `PUBLISH` / `SUBSCRIBE`.
///
/// ## How It Works
///
/// - Publishing borrows a connection from a `deadpool_redis` pool
/// - Every subscription opens its own dedicated pub/sub connection,
///   since a connection in subscribe mode cannot run other commands
///
/// ## Example Flow
///
/// ```text
/// Instance 1: transport.publish("appdisttl_signal", "A@@B")
///   ↓
/// Redis Pub/Sub: PUBLISH appdisttl_signal "A@@B"
///   ↓
/// Instance 2: subscription stream yields "A@@B"
/// Instance 3: subscription stream yields "A@@B"
/// ```
///
/// There is no reconnection: when a pub/sub connection drops its stream
/// simply ends.
#[derive(Clone)]
pub struct RedisTransport {
    pool: Pool,
    client: redis::Client,
    config: RedisConfig,
}

impl RedisTransport {
    /// Build the publish pool and pub/sub client, then check connectivity.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Connection`] if the URL is invalid, the pool
    /// cannot be built, or no connection can be obtained.
    pub async fn connect(config: &RedisConfig) -> Result<Self, TransportError> {
        config.validate().map_err(TransportError::connection)?;

        tracing::info!(url = %config.url, "Connecting to Redis");

        let mut pool_settings = deadpool_redis::PoolConfig::new(config.pool_size);
        pool_settings.timeouts.wait = Some(config.timeout());
        pool_settings.timeouts.create = Some(config.timeout());
        pool_settings.timeouts.recycle = Some(config.timeout());

        let mut pool_config = deadpool_redis::Config::from_url(&config.url);
        pool_config.pool = Some(pool_settings);

        let pool = pool_config
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| TransportError::connection("failed to create Redis pool").with_source(e))?;

        let client = redis::Client::open(config.url.as_str())
            .map_err(|e| TransportError::connection("failed to create Redis client").with_source(e))?;

        let _conn = pool
            .get()
            .await
            .map_err(|e| TransportError::connection("failed to get Redis connection").with_source(e))?;

        tracing::info!("Connected to Redis");

        Ok(Self {
            pool,
            client,
            config: config.clone(),
        })
    }

    /// Whether a pooled connection can currently be obtained.
    pub async fn is_available(&self) -> bool {
        self.pool.get().await.is_ok()
    }

    pub fn config(&self) -> &RedisConfig {
        &self.config
    }
}

#[async_trait]
impl InvalidationTransport for RedisTransport {
    async fn subscribe(&self, topic: &str) -> Result<SignalStream, TransportError> {
        let mut pubsub = tokio::time::timeout(self.config.timeout(), self.client.get_async_pubsub())
            .await
            .map_err(|_| TransportError::subscribe(topic, "timed out opening pub/sub connection"))?
            .map_err(|e| {
                TransportError::subscribe(topic, "failed to get pub/sub connection").with_source(e)
            })?;

        pubsub
            .subscribe(topic)
            .await
            .map_err(|e| TransportError::subscribe(topic, "SUBSCRIBE failed").with_source(e))?;

        tracing::info!(topic = %topic, "Subscribed to Redis channel");

        let channel = topic.to_string();
        let stream = pubsub.into_on_message().filter_map(move |msg| {
            let channel = channel.clone();
            async move {
                match msg.get_payload::<String>() {
                    Ok(payload) => Some(payload),
                    Err(e) => {
                        tracing::warn!(topic = %channel, error = %e, "failed to parse signal payload");
                        None
                    }
                }
            }
        });

        Ok(stream.boxed())
    }

    async fn publish(&self, topic: &str, payload: &str) -> Result<(), TransportError> {
        let mut conn = self.pool.get().await.map_err(|e| {
            TransportError::publish(topic, "failed to get Redis connection").with_source(e)
        })?;

        let receivers: i64 = conn
            .publish(topic, payload)
            .await
            .map_err(|e| TransportError::publish(topic, "PUBLISH failed").with_source(e))?;

        tracing::debug!(topic = %topic, receivers, "published signal");
        Ok(())
    }
}

impl std::fmt::Debug for RedisTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisTransport")
            .field("url", &self.config.url)
            .field("pool_size", &self.config.pool_size)
            .finish()
    }
}
