use thiserror::Error;

/// Boxed underlying failure carried by a [`TransportError`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors surfaced by the cache layer.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Invalidation listener already started")]
    AlreadyStarted,
}

impl CacheError {
    /// Create a new Configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Check if this error originated in the pub/sub transport
    pub fn is_transport_error(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

/// Errors reported by an [`InvalidationTransport`](crate::InvalidationTransport).
///
/// When the backend failed with an error of its own, it is kept as the
/// [`source`](std::error::Error::source) of the variant.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Connection error: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Failed to subscribe to {topic}: {message}")]
    Subscribe {
        topic: String,
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Failed to publish to {topic}: {message}")]
    Publish {
        topic: String,
        message: String,
        #[source]
        source: Option<BoxError>,
    },
}

impl TransportError {
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            source: None,
        }
    }

    pub fn subscribe(topic: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Subscribe {
            topic: topic.into(),
            message: message.into(),
            source: None,
        }
    }

    pub fn publish(topic: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Publish {
            topic: topic.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Attach the backend error that caused this failure.
    pub fn with_source(mut self, cause: impl Into<BoxError>) -> Self {
        let slot = match &mut self {
            Self::Connection { source, .. }
            | Self::Subscribe { source, .. }
            | Self::Publish { source, .. } => source,
        };
        *slot = Some(cause.into());
        self
    }
}

pub type CacheResult<T> = Result<T, CacheError>;
