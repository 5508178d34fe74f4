//! Delivery targets
//!
//! A Room only ever needs one thing from a session: hand it a message.
//! `SessionHandle` is that capability for a live connection.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::error::SendError;
use crate::message::Message;
use crate::types::SessionId;

/// Something a Room can deliver to
pub trait Participant {
    /// Identity used by `Room::leave`
    fn id(&self) -> SessionId;

    /// Enqueue a message without waiting for it to be written
    fn deliver(&self, message: Arc<Message>) -> Result<(), SendError>;
}

/// Room-side reference to a session
///
/// Holds only the sending end of the session's outbound queue. It never keeps
/// the connection alive: once the session closes, delivery fails with
/// `SendError::ChannelClosed`.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: SessionId,
    sender: mpsc::UnboundedSender<Arc<Message>>,
}

impl SessionHandle {
    /// Create a handle for the session with the given ID and queue
    pub fn new(id: SessionId, sender: mpsc::UnboundedSender<Arc<Message>>) -> Self {
        Self { id, sender }
    }

    /// Check whether the session is still accepting messages
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

impl Participant for SessionHandle {
    fn id(&self) -> SessionId {
        self.id
    }

    fn deliver(&self, message: Arc<Message>) -> Result<(), SendError> {
        self.sender
            .send(message)
            .map_err(|_| SendError::ChannelClosed)
    }
}
