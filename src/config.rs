//! Command-line configuration
//!
//! Every positional argument is a port; each port gets its own listener and
//! its own room.

use clap::Parser;

use crate::codec::HeaderParsing;

/// Usage line printed when no port is given
pub const USAGE: &str = "Usage: chat_relay <port> [<port> ...]";

/// Command-line arguments for the relay
#[derive(Parser, Debug)]
#[command(name = "chat_relay")]
#[command(version)]
#[command(about = "Routes length-framed JSON chat messages between named TCP sessions", long_about = None)]
pub struct CliArgs {
    /// TCP ports to listen on, one room per port
    pub ports: Vec<u16>,

    /// Address to bind every port on
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Reject frame headers that are not all decimal digits
    #[arg(long)]
    pub strict_header: bool,

    /// Replay a user's recent messages when they join
    #[arg(long)]
    pub replay_history: bool,
}

impl CliArgs {
    /// Settings shared by every listener
    pub fn relay_config(&self) -> RelayConfig {
        RelayConfig {
            host: self.host.clone(),
            header_parsing: if self.strict_header {
                HeaderParsing::Strict
            } else {
                HeaderParsing::Permissive
            },
            replay_on_join: self.replay_history,
        }
    }
}

/// Resolved relay settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// Bind address (without port)
    pub host: String,
    /// Length header parsing mode
    pub header_parsing: HeaderParsing,
    /// Replay addressed history on join
    pub replay_on_join: bool,
}

impl RelayConfig {
    /// `host:port` for one listener
    pub fn bind_addr(&self, port: u16) -> String {
        format!("{}:{}", self.host, port)
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            header_parsing: HeaderParsing::default(),
            replay_on_join: false,
        }
    }
}
