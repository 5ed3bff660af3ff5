//! Unified error type.

use std::convert::Infallible;

use thiserror::Error;

use crate::config::ConfigError;

/// Boxed, thread-safe error used for opaque middleware failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The error type returned by stacks' fallible operations.
///
/// Inside a chain this is what a middleware hands to [`Next::fail`]; the
/// executor turns it into a `500` whose body carries the [`Display`] output.
/// Outside a chain it surfaces infrastructure failures: binding a port,
/// loading configuration.
///
/// [`Next::fail`]: crate::Next::fail
/// [`Display`]: std::fmt::Display
#[derive(Debug, Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("http: {0}")]
    Hyper(#[from] hyper::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    /// The request body grew past the configured limit.
    #[error("request body exceeds {0} bytes")]
    PayloadTooLarge(usize),

    /// A middleware panicked while it was running.
    #[error("middleware panicked: {0}")]
    Panic(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Message(String),

    #[error(transparent)]
    Other(BoxError),
}

impl Error {
    /// An error carrying only a message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }

    /// Wraps any other error type.
    pub fn other(err: impl Into<BoxError>) -> Self {
        Self::Other(err.into())
    }
}

impl From<Infallible> for Error {
    fn from(never: Infallible) -> Self {
        match never {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_display() {
        assert_eq!(Error::msg("disk full").to_string(), "disk full");
        assert_eq!(
            Error::PayloadTooLarge(16).to_string(),
            "request body exceeds 16 bytes"
        );
    }

    #[test]
    fn test_other_is_transparent() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "socket gone");
        assert_eq!(Error::other(io).to_string(), "socket gone");
    }
}
