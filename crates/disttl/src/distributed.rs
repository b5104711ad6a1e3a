//! Tag-invalidated TTL LRU cache kept coherent across processes.
//!
//! ## How It Works
//!
//! 1. Reads and writes only touch the local [`TtlLru`]
//! 2. `update_signal(tags)` publishes the tags on `{scope}disttl_signal`
//! 3. Every started cache on that scope (the publisher included) receives the
//!    signal and drops local entries tagged with any of the tags
//!
//! ## Example Flow
//!
//! ```text
//! Node 1: cache.update_signal(["user:42"])
//!   ↓
//! PUBLISH {scope}disttl_signal "user:42"
//!   ↓
//! Node 1: listener → delete_by_tags(["user:42"])
//! Node 2: listener → delete_by_tags(["user:42"])
//! ```
//!
//! Delivery is best-effort: there is no acknowledgement, retry or
//! reconnection. If the subscription drops, the listener stops and entries
//! fall back to TTL expiry.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::CacheConfig;
use crate::error::{CacheError, CacheResult};
use crate::lru::TtlLru;
use crate::observer::{InvalidationObserver, InvalidationReport};
use crate::signal::{decode_signals, encode_signals, signal_topic};
use crate::sweeper::{DEFAULT_SWEEP_INTERVAL, spawn_expiry_sweeper};
use crate::tags::{TagSet, TaggedValue, delete_by_tags};
use crate::transport::{InvalidationTransport, SignalStream};

const STATE_UNSTARTED: u8 = 0;
const STATE_STARTING: u8 = 1;
const STATE_LISTENING: u8 = 2;
const STATE_STOPPED: u8 = 3;

/// Lifecycle of the background signal listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    /// `start` has not succeeded yet; only local operations take effect.
    Unstarted,
    /// Inbound signals are being applied.
    Listening,
    /// The listener exited (shutdown or lost subscription). Terminal.
    Stopped,
}

impl ListenerState {
    fn from_raw(raw: u8) -> Self {
        match raw {
            STATE_LISTENING => Self::Listening,
            STATE_STOPPED => Self::Stopped,
            _ => Self::Unstarted,
        }
    }
}

type LocalCache<T> = TtlLru<String, TaggedValue<T>>;

/// Local LRU cache with TTLs and dependency tags, invalidated cluster-wide
/// over an [`InvalidationTransport`].
///
/// Remember to call [`start`](Self::start): a cache that was never started
/// still serves reads and writes, but never applies signals, including the
/// ones it publishes itself.
pub struct DistributedTtlLru<T> {
    local: Arc<LocalCache<T>>,
    scope: String,
    topic: String,
    transport: Arc<dyn InvalidationTransport>,
    observer: Option<Arc<dyn InvalidationObserver>>,
    sweep_interval: Option<Duration>,
    default_ttl: Duration,
    state: Arc<AtomicU8>,
}

/// TTL used by [`DistributedTtlLru::put`] unless configured otherwise.
const DEFAULT_TTL: Duration = Duration::from_secs(3600);

impl<T> Clone for DistributedTtlLru<T> {
    fn clone(&self) -> Self {
        Self {
            local: Arc::clone(&self.local),
            scope: self.scope.clone(),
            topic: self.topic.clone(),
            transport: Arc::clone(&self.transport),
            observer: self.observer.clone(),
            sweep_interval: self.sweep_interval,
            default_ttl: self.default_ttl,
            state: Arc::clone(&self.state),
        }
    }
}

impl<T> DistributedTtlLru<T>
where
    T: Clone + Send + 'static,
{
    /// Create a cache holding at most `capacity` entries whose signals travel
    /// on `{scope}disttl_signal`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Configuration`] if `capacity` is zero.
    pub fn new(
        capacity: usize,
        scope: impl Into<String>,
        transport: Arc<dyn InvalidationTransport>,
    ) -> CacheResult<Self> {
        let scope = scope.into();
        Ok(Self {
            local: Arc::new(TtlLru::new(capacity)?),
            topic: signal_topic(&scope),
            scope,
            transport,
            observer: None,
            sweep_interval: Some(DEFAULT_SWEEP_INTERVAL),
            default_ttl: DEFAULT_TTL,
            state: Arc::new(AtomicU8::new(STATE_UNSTARTED)),
        })
    }

    /// Create a cache from validated configuration.
    pub fn from_config(
        config: &CacheConfig,
        transport: Arc<dyn InvalidationTransport>,
    ) -> CacheResult<Self> {
        config.validate()?;
        Ok(Self::new(config.capacity, config.scope.clone(), transport)?
            .with_sweep_interval(config.sweep_interval())
            .with_default_ttl(config.default_ttl()))
    }

    /// Receive a report for every applied inbound signal.
    #[must_use]
    pub fn with_observer(mut self, observer: impl InvalidationObserver + 'static) -> Self {
        self.observer = Some(Arc::new(observer));
        self
    }

    /// Interval of the expired-entry sweep started by [`start`](Self::start);
    /// `None` or a zero interval disables it.
    #[must_use]
    pub fn with_sweep_interval(mut self, interval: Option<Duration>) -> Self {
        self.sweep_interval = interval.filter(|interval| !interval.is_zero());
        self
    }

    /// TTL applied by [`put`](Self::put).
    #[must_use]
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Topic this cache publishes to and listens on.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn state(&self) -> ListenerState {
        ListenerState::from_raw(self.state.load(Ordering::Acquire))
    }

    /// Read a live value. Never touches the network.
    pub fn get(&self, key: &str) -> Option<T> {
        self.local.get(key).map(|entry| entry.value)
    }

    /// Store `value` for `ttl`, dropped early once any of `tags` is signalled.
    ///
    /// Purely local: writing never publishes anything.
    pub fn set<I, S>(&self, key: impl Into<String>, value: T, ttl: Duration, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let key = key.into();
        let tags: TagSet = tags.into_iter().collect();
        if let Some(evicted) = self.local.set(key, TaggedValue::new(value, tags), ttl) {
            tracing::trace!(scope = %self.scope, key = %evicted, "evicted least recently used entry");
        }
    }

    /// [`set`](Self::set) with the cache's default TTL.
    pub fn put<I, S>(&self, key: impl Into<String>, value: T, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set(key, value, self.default_ttl, tags);
    }

    /// Remove `key` from this node only.
    pub fn delete(&self, key: &str) -> bool {
        self.local.delete(key)
    }

    /// Remove local entries tagged with any of `tags`, without publishing.
    pub fn delete_by_tags<S: AsRef<str>>(&self, tags: &[S]) -> Vec<String> {
        delete_by_tags(&self.local, tags)
    }

    /// `(current, max)` local entry counts.
    pub fn size(&self) -> (usize, usize) {
        self.local.size()
    }

    /// Broadcast that `tags` changed, invalidating dependent entries on every
    /// started node of this scope.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Transport`] if the publish fails. Nothing is
    /// retried; the caller decides.
    pub async fn update_signal<S: AsRef<str>>(&self, tags: &[S]) -> CacheResult<()> {
        let payload = encode_signals(tags);
        if let Err(e) = self.transport.publish(&self.topic, &payload).await {
            tracing::warn!(topic = %self.topic, error = %e, "failed to publish invalidation signal");
            return Err(e.into());
        }

        tracing::debug!(topic = %self.topic, payload = %payload, "published invalidation signal");
        Ok(())
    }

    /// Subscribe to this scope's signals and apply them in the background
    /// until `shutdown` turns `true` or its sender is dropped.
    ///
    /// Also spawns the expiry sweeper, bound to the same shutdown signal.
    ///
    /// # Errors
    ///
    /// - [`CacheError::AlreadyStarted`] if called more than once
    /// - [`CacheError::Transport`] if the initial subscribe fails; the cache
    ///   stays unstarted and `start` may be called again
    pub async fn start(&self, shutdown: watch::Receiver<bool>) -> CacheResult<JoinHandle<()>> {
        if self
            .state
            .compare_exchange(
                STATE_UNSTARTED,
                STATE_STARTING,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            return Err(CacheError::AlreadyStarted);
        }

        let stream = match self.transport.subscribe(&self.topic).await {
            Ok(stream) => stream,
            Err(e) => {
                self.state.store(STATE_UNSTARTED, Ordering::Release);
                tracing::error!(topic = %self.topic, error = %e, "failed to subscribe to invalidation signals");
                return Err(e.into());
            }
        };

        self.state.store(STATE_LISTENING, Ordering::Release);
        tracing::info!(topic = %self.topic, "listening for invalidation signals");

        if let Some(interval) = self.sweep_interval {
            spawn_expiry_sweeper(Arc::clone(&self.local), interval, shutdown.clone());
        }

        let listener = SignalListener {
            local: Arc::clone(&self.local),
            topic: self.topic.clone(),
            observer: self.observer.clone(),
            state: Arc::clone(&self.state),
        };
        Ok(tokio::spawn(listener.run(stream, shutdown)))
    }
}

impl<T> std::fmt::Debug for DistributedTtlLru<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DistributedTtlLru")
            .field("scope", &self.scope)
            .field("local", &self.local)
            .field("state", &ListenerState::from_raw(self.state.load(Ordering::Acquire)))
            .finish()
    }
}

/// Single consumer applying inbound signals in delivery order.
struct SignalListener<T> {
    local: Arc<LocalCache<T>>,
    topic: String,
    observer: Option<Arc<dyn InvalidationObserver>>,
    state: Arc<AtomicU8>,
}

impl<T> SignalListener<T>
where
    T: Clone + Send + 'static,
{
    async fn run(self, mut stream: SignalStream, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                biased;

                result = shutdown.changed() => {
                    match result {
                        Ok(()) if *shutdown.borrow() => break,
                        Ok(()) => {}
                        Err(_) => break,
                    }
                }
                next = stream.next() => {
                    match next {
                        Some(payload) => self.apply(&payload),
                        None => {
                            tracing::warn!(
                                topic = %self.topic,
                                "signal subscription closed, no further invalidations will be applied"
                            );
                            break;
                        }
                    }
                }
            }
        }

        self.state.store(STATE_STOPPED, Ordering::Release);
        tracing::info!(topic = %self.topic, "invalidation listener stopped");
    }

    fn apply(&self, payload: &str) {
        let tags = decode_signals(payload);
        let keys = delete_by_tags(&self.local, &tags);
        tracing::debug!(
            topic = %self.topic,
            signals = ?tags,
            affected = keys.len(),
            "applied invalidation signal"
        );

        if let Some(observer) = &self.observer {
            observer.on_invalidation(&InvalidationReport { tags, keys });
        }
    }
}
