//! Basic type definitions for the relay
//!
//! - `SessionId`: UUID-based identity of one connection
//! - `SessionState`: lifecycle of a connection session

use uuid::Uuid;

/// Unique session identifier (newtype pattern)
///
/// The Room compares sessions by this id, never by username, so a session
/// can be removed without knowing which name it registered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Create a new random session ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Connection lifecycle
///
/// `Connecting → AwaitingUsername → ReadingHeader ⇄ ReadingBody → Closed`.
/// `Closed` is terminal and reachable from every other state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    AwaitingUsername,
    ReadingHeader,
    ReadingBody,
    Closed,
}

impl SessionState {
    pub fn is_closed(self) -> bool {
        self == SessionState::Closed
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionState::Connecting => "connecting",
            SessionState::AwaitingUsername => "awaiting_username",
            SessionState::ReadingHeader => "reading_header",
            SessionState::ReadingBody => "reading_body",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}
