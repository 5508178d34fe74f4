//! RoomServer actor implementation
//!
//! The single task that owns a `Room`. Sessions never touch the registry
//! directly; they send `RoomCommand`s through a `RoomHandle`, and the actor
//! applies them one at a time in arrival order, so no locking is needed.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::error::RelayError;
use crate::message::Message;
use crate::participant::{Participant, SessionHandle};
use crate::room::Room;
use crate::types::SessionId;

/// Channel buffer size for room commands
pub const CHANNEL_BUFFER_SIZE: usize = 256;

/// Commands sent from sessions to the RoomServer actor
#[derive(Debug)]
pub enum RoomCommand {
    /// Session completed its handshake
    Join {
        username: String,
        session: SessionHandle,
    },
    /// Session closed
    Leave {
        session_id: SessionId,
    },
    /// Session received a routable message
    Deliver {
        recipient: String,
        message: Arc<Message>,
    },
    /// Snapshot of registry size and history length
    Stats {
        reply: oneshot::Sender<RoomStats>,
    },
}

/// Point-in-time view of a room
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoomStats {
    pub participants: usize,
    pub history: usize,
}

/// The RoomServer actor
pub struct RoomServer {
    /// Registry owned exclusively by this task
    room: Room,
    /// Command receiver channel
    receiver: mpsc::Receiver<RoomCommand>,
}

impl RoomServer {
    /// Create a new RoomServer with the given command receiver
    pub fn new(receiver: mpsc::Receiver<RoomCommand>, replay_on_join: bool) -> Self {
        Self {
            room: Room::with_replay(replay_on_join),
            receiver,
        }
    }

    /// Start a RoomServer task and return a handle to it
    pub fn spawn(replay_on_join: bool) -> RoomHandle {
        let (sender, receiver) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        tokio::spawn(Self::new(receiver, replay_on_join).run());
        RoomHandle { sender }
    }

    /// Run the RoomServer event loop
    ///
    /// Continuously receives and processes commands until all handles are dropped.
    pub async fn run(mut self) {
        debug!("RoomServer started");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        debug!("RoomServer shutting down");
    }

    /// Process a single command
    fn handle_command(&mut self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::Join { username, session } => {
                info!("Session {} joined as '{}'", session.id(), username);
                self.room.join(username, session);
                debug!("Total participants: {}", self.room.participant_count());
            }
            RoomCommand::Leave { session_id } => {
                let removed = self.room.leave(session_id);
                if removed > 0 {
                    info!("Session {} left", session_id);
                }
                debug!("Total participants: {}", self.room.participant_count());
            }
            RoomCommand::Deliver { recipient, message } => {
                if self.room.deliver(&recipient, message) {
                    debug!("Routed message to '{}'", recipient);
                }
            }
            RoomCommand::Stats { reply } => {
                let _ = reply.send(RoomStats {
                    participants: self.room.participant_count(),
                    history: self.room.history_len(),
                });
            }
        }
    }
}

/// Cloneable sender side of a RoomServer
#[derive(Debug, Clone)]
pub struct RoomHandle {
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    /// Register `session` under `username`
    pub async fn join(&self, username: String, session: SessionHandle) -> Result<(), RelayError> {
        self.send(RoomCommand::Join { username, session }).await
    }

    /// Remove every binding of `session_id`
    pub async fn leave(&self, session_id: SessionId) -> Result<(), RelayError> {
        self.send(RoomCommand::Leave { session_id }).await
    }

    /// Route `message` to `recipient`
    pub async fn deliver(&self, recipient: String, message: Arc<Message>) -> Result<(), RelayError> {
        self.send(RoomCommand::Deliver { recipient, message }).await
    }

    /// Ask the room for its current size
    pub async fn stats(&self) -> Result<RoomStats, RelayError> {
        let (reply, response) = oneshot::channel();
        self.send(RoomCommand::Stats { reply }).await?;
        response.await.map_err(|_| RelayError::ChannelSend)
    }

    async fn send(&self, cmd: RoomCommand) -> Result<(), RelayError> {
        self.sender
            .send(cmd)
            .await
            .map_err(|_| RelayError::ChannelSend)
    }
}
