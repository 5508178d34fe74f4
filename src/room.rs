//! Room registry
//!
//! Maps usernames to live sessions and keeps a bounded history of the
//! messages it has routed. One Room exists per listening port.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use tracing::{debug, info};

use crate::message::Message;
use crate::participant::{Participant, SessionHandle};
use crate::types::SessionId;

/// Number of routed messages kept in history
pub const MAX_RECENT_MESSAGES: usize = 100;

/// Username → session registry with recent history
///
/// At most one binding per name: a later `join` under the same name replaces
/// the earlier session in the map but does not close it.
#[derive(Debug)]
pub struct Room<P = SessionHandle> {
    /// Registered participants: username -> session
    participants: HashMap<String, P>,
    /// Routed messages, oldest first
    history: VecDeque<Arc<Message>>,
    /// Deliver matching history to a session when it joins
    replay_on_join: bool,
}

impl<P: Participant> Room<P> {
    /// Create an empty room
    pub fn new() -> Self {
        Self::with_replay(false)
    }

    /// Create an empty room, optionally replaying history on join
    pub fn with_replay(replay_on_join: bool) -> Self {
        Self {
            participants: HashMap::new(),
            history: VecDeque::with_capacity(MAX_RECENT_MESSAGES),
            replay_on_join,
        }
    }

    /// Bind `username` to `participant`
    ///
    /// Returns the participant previously bound to that name, if any.
    pub fn join(&mut self, username: String, participant: P) -> Option<P> {
        if self.replay_on_join {
            self.replay(&username, &participant);
        }

        let previous = self.participants.insert(username.clone(), participant);
        if let Some(previous) = &previous {
            info!(
                "Username '{}' rebound, session {} superseded",
                username,
                previous.id()
            );
        }
        previous
    }

    /// Remove every binding that points at session `id`
    ///
    /// Returns the number of bindings removed; unknown sessions are a no-op.
    pub fn leave(&mut self, id: SessionId) -> usize {
        let before = self.participants.len();
        self.participants.retain(|_, participant| participant.id() != id);
        before - self.participants.len()
    }

    /// Route `message` to `recipient`
    ///
    /// Unknown recipients are dropped silently and leave history untouched.
    /// Returns whether the recipient was registered.
    pub fn deliver(&mut self, recipient: &str, message: Arc<Message>) -> bool {
        let Some(participant) = self.participants.get(recipient) else {
            debug!("No participant named '{}', message dropped", recipient);
            return false;
        };

        self.history.push_back(message.clone());
        while self.history.len() > MAX_RECENT_MESSAGES {
            self.history.pop_front();
        }

        if participant.deliver(message).is_err() {
            // Session is closing; its leave is already on the way
            debug!("Session {} for '{}' is closed", participant.id(), recipient);
        }
        true
    }

    fn replay(&self, username: &str, participant: &P) {
        let addressed = self
            .history
            .iter()
            .filter(|msg| msg.recipient().is_ok_and(|to| to == username));

        for msg in addressed {
            if participant.deliver(msg.clone()).is_err() {
                break;
            }
        }
    }

    /// Check whether a username is bound
    pub fn contains(&self, username: &str) -> bool {
        self.participants.contains_key(username)
    }

    /// Get the number of bound usernames
    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    /// Recent messages, oldest first
    pub fn history(&self) -> impl Iterator<Item = &Arc<Message>> {
        self.history.iter()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }
}

impl<P: Participant> Default for Room<P> {
    fn default() -> Self {
        Self::new()
    }
}
