//! Hooks for observing applied invalidations.
//!
//! The cache never logs affected-key counts on its own behalf; the owner
//! installs an observer and decides what to do with each report.

/// Outcome of applying one inbound invalidation signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidationReport {
    /// Tags decoded from the signal payload.
    pub tags: Vec<String>,
    /// Keys removed from the local cache.
    pub keys: Vec<String>,
}

impl InvalidationReport {
    pub fn affected(&self) -> usize {
        self.keys.len()
    }
}

pub trait InvalidationObserver: Send + Sync {
    fn on_invalidation(&self, report: &InvalidationReport);
}

impl<F> InvalidationObserver for F
where
    F: Fn(&InvalidationReport) + Send + Sync,
{
    fn on_invalidation(&self, report: &InvalidationReport) {
        self(report)
    }
}

/// Observer that emits one `info` event per applied signal, tagged with
/// the local hostname so fleet-wide logs show which node purged what.
#[derive(Debug, Clone)]
pub struct TracingObserver {
    hostname: String,
}

impl TracingObserver {
    #[must_use]
    pub fn new() -> Self {
        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "unknown".to_string());
        Self { hostname }
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }
}

impl Default for TracingObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl InvalidationObserver for TracingObserver {
    fn on_invalidation(&self, report: &InvalidationReport) {
        tracing::info!(
            signals = ?report.tags,
            affected = report.affected(),
            hostname = %self.hostname,
            "cache entries invalidated by signal"
        );
    }
}
