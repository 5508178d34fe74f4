//! The relayed message value
//!
//! A `Message` owns its complete wire frame (header + JSON body) so it can be
//! written to a socket as-is, and parses its routing metadata on first use.

use std::sync::OnceLock;

use bytes::Bytes;

use crate::codec::{self, HeaderParsing, Routing, HEADER_WIDTH, MAX_BODY_LENGTH};
use crate::error::{FrameError, RoutingError};

/// One framed chat message
///
/// Immutable after construction. Cheap to share: the frame is a `Bytes`, and
/// the Room hands out `Arc<Message>` to history and outbound queues alike.
#[derive(Debug)]
pub struct Message {
    /// Header-prefixed wire representation
    frame: Bytes,
    /// Lazily extracted `Header.To` / `Header.From`
    routing: OnceLock<Result<Routing, RoutingError>>,
}

impl Message {
    /// Build a message from a body read off the wire
    ///
    /// The header is re-encoded canonically, so recipients always receive
    /// zero-padded frames whatever the sender's header looked like.
    pub fn from_body(body: &[u8]) -> Result<Self, FrameError> {
        Ok(Self::from_encoded(codec::encode_frame(body)?))
    }

    /// Take ownership of a complete frame without copying it
    ///
    /// The header must be the canonical zero-padded length of the body, as
    /// written by `codec::frame_buffer`.
    pub fn from_frame(frame: Bytes) -> Result<Self, FrameError> {
        let mut header = [0u8; HEADER_WIDTH];
        let Some(prefix) = frame.get(..HEADER_WIDTH) else {
            return Err(FrameError::InvalidHeader(
                String::from_utf8_lossy(&frame).into_owned(),
            ));
        };
        header.copy_from_slice(prefix);

        let body_length = codec::decode_header(&header, HeaderParsing::Strict)?;
        if body_length != frame.len() - HEADER_WIDTH {
            return Err(FrameError::InvalidHeader(
                String::from_utf8_lossy(&header).into_owned(),
            ));
        }
        Ok(Self::from_encoded(frame))
    }

    /// Build an outbound message addressed to `recipient`
    pub fn compose(recipient: &str, sender: &str, body_text: &str) -> Result<Self, FrameError> {
        Ok(Self::from_encoded(codec::encode(recipient, sender, body_text)?))
    }

    fn from_encoded(frame: Bytes) -> Self {
        debug_assert!(frame.len() >= HEADER_WIDTH);
        debug_assert!(frame.len() - HEADER_WIDTH <= MAX_BODY_LENGTH);
        Self {
            frame,
            routing: OnceLock::new(),
        }
    }

    /// Full frame bytes, ready to write
    pub fn as_bytes(&self) -> &[u8] {
        &self.frame
    }

    /// JSON body bytes
    pub fn body(&self) -> &[u8] {
        codec::decode_body(&self.frame)
    }

    pub fn body_length(&self) -> usize {
        self.frame.len() - HEADER_WIDTH
    }

    /// Routing metadata, parsed once
    pub fn routing(&self) -> Result<&Routing, RoutingError> {
        self.routing
            .get_or_init(|| codec::extract_routing(self.body()))
            .as_ref()
            .map_err(|e| e.clone())
    }

    /// Recipient username
    pub fn recipient(&self) -> Result<&str, RoutingError> {
        self.routing().map(|r| r.to.as_str())
    }

    /// Sender username, when the envelope names one
    pub fn sender(&self) -> Option<&str> {
        self.routing().ok().and_then(|r| r.from.as_deref())
    }
}
