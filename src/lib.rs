//! Length-framed JSON Chat Relay Library
//!
//! Clients connect over TCP, send their username on the first line, then
//! exchange frames addressed to other usernames. The relay reads each frame,
//! extracts `Header.To` from its JSON envelope, and forwards it to that
//! user's live connection.
//!
//! # Wire format
//! ```text
//! alice\n                                   handshake, once
//! 00063{"Header":{"To":"bob","From":"alice"},"Contents":{"Body":"hi"}}
//! ^^^^^ 5-digit body length
//! ```
//!
//! # Architecture
//! Uses the Actor pattern with `mpsc` channels:
//! - `RoomServer` owns the username registry for one port
//! - Each connection runs a `Session` that talks to its room through a
//!   `RoomHandle` and receives messages on its own outbound queue
//! - No locks needed - all registry access goes through message passing
//!
//! # Example
//! ```ignore
//! use chat_relay::{Listener, RelayConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let listener = Listener::bind("127.0.0.1:7000", RelayConfig::default())
//!         .await
//!         .unwrap();
//!     listener.run().await;
//! }
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod listener;
pub mod logging;
pub mod message;
pub mod participant;
pub mod room;
pub mod server;
pub mod session;
pub mod types;

// Re-export main types for convenience
pub use codec::{HeaderParsing, Routing, HEADER_WIDTH, MAX_BODY_LENGTH};
pub use config::{CliArgs, RelayConfig};
pub use error::{FrameError, RelayError, RoutingError, SendError};
pub use listener::{serve, Listener};
pub use message::Message;
pub use participant::{Participant, SessionHandle};
pub use room::{Room, MAX_RECENT_MESSAGES};
pub use server::{RoomCommand, RoomHandle, RoomServer, RoomStats};
pub use session::Session;
pub use types::{SessionId, SessionState};
