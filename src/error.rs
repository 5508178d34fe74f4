//! Error types for the relay
//!
//! Frame errors are fatal to a connection, routing errors only drop the
//! offending message. Uses thiserror for ergonomic error definitions.

use thiserror::Error;

/// Wire framing errors (fatal - the session closes)
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Declared or encoded body length is above `MAX_BODY_LENGTH`
    #[error("Frame body too large: {0} bytes")]
    Oversized(usize),

    /// Permissive parsing read a negative length
    #[error("Negative frame length: {0}")]
    NegativeLength(i64),

    /// Header contains something other than decimal digits (strict parsing only)
    #[error("Invalid frame header: {0:?}")]
    InvalidHeader(String),

    /// Envelope could not be serialized
    #[error("Envelope encoding failed: {0}")]
    Encode(String),
}

/// Routing extraction errors (recoverable - the message is dropped)
///
/// Clone so the outcome can be cached on the message after the first parse.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RoutingError {
    /// Body is not JSON, or not a JSON object
    #[error("Malformed JSON envelope: {0}")]
    MalformedJson(String),

    /// A required envelope field is absent or has the wrong type
    #[error("Missing envelope field: {0}")]
    MissingField(&'static str),
}

/// Message send errors
///
/// Occurs when delivering to a session whose outbound queue has been dropped.
#[derive(Debug, Error)]
pub enum SendError {
    /// The receiving end of the channel has been closed
    #[error("Channel closed")]
    ChannelClosed,
}

/// Relay-level errors
#[derive(Debug, Error)]
pub enum RelayError {
    /// IO error (fatal to the connection)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Framing error (fatal to the connection)
    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    /// Failed to bind a listening port (fatal to that listener only)
    #[error("Listener error on {addr}: {source}")]
    Listener {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Room actor is gone (internal channel broken)
    #[error("Channel send error")]
    ChannelSend,

    /// Every configured port failed to bind
    #[error("No listener could be started")]
    NoListeners,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_error_converts() {
        let err: RelayError = FrameError::Oversized(100_000).into();
        assert!(matches!(err, RelayError::Frame(FrameError::Oversized(100_000))));
    }

    #[test]
    fn test_listener_error_display() {
        let err = RelayError::Listener {
            addr: "0.0.0.0:80".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(err.to_string(), "Listener error on 0.0.0.0:80: denied");
    }
}
