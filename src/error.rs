use thiserror::Error;

/// Failures reported by a quantum byte source
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ByteSourceError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    #[error("authentication rejected (HTTP {status})")]
    Authentication { status: u16 },

    #[error("rate limit or quota exceeded")]
    RateLimited,

    #[error("unexpected HTTP status {status}")]
    Http { status: u16 },

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl ByteSourceError {
    /// Whether repeating the identical request may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            ByteSourceError::Network(_) | ByteSourceError::Timeout => true,
            ByteSourceError::Http { status } => *status >= 500,
            ByteSourceError::Authentication { .. }
            | ByteSourceError::RateLimited
            | ByteSourceError::Malformed(_) => false,
        }
    }
}

/// Errors surfaced by the discovery engine
#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("invalid argument in {stage}: {message}")]
    InvalidArgument {
        stage: &'static str,
        message: String,
    },

    #[error("quantum byte source failed during {stage}: {source}")]
    ExternalSource {
        stage: &'static str,
        #[source]
        source: ByteSourceError,
    },

    #[error("request cancelled during {stage}")]
    Cancelled { stage: &'static str },

    #[error("deadline exceeded during {stage}")]
    DeadlineExceeded { stage: &'static str },
}

impl DiscoveryError {
    pub fn invalid(stage: &'static str, message: impl Into<String>) -> Self {
        DiscoveryError::InvalidArgument {
            stage,
            message: message.into(),
        }
    }
}
