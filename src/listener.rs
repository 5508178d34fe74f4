//! TCP listeners
//!
//! Each port gets its own `Listener` and its own room; participants on
//! different ports never see each other.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::server::{RoomHandle, RoomServer};
use crate::session::Session;

/// Pause after a failed `accept` before trying again
///
/// Errors such as running out of file descriptors persist for a while;
/// retrying at once would spin a core.
pub const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// One listening port with its room
pub struct Listener {
    listener: TcpListener,
    local_addr: SocketAddr,
    room: RoomHandle,
    config: RelayConfig,
}

impl Listener {
    /// Bind `addr` and start its room
    pub async fn bind(addr: &str, config: RelayConfig) -> Result<Self, RelayError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| RelayError::Listener {
                addr: addr.to_string(),
                source,
            })?;
        let local_addr = listener.local_addr()?;
        let room = RoomServer::spawn(config.replay_on_join);

        info!("Chat relay listening on {}", local_addr);

        Ok(Self {
            listener,
            local_addr,
            room,
            config,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Handle to this listener's room
    pub fn room(&self) -> RoomHandle {
        self.room.clone()
    }

    /// Connection accept loop
    ///
    /// Accept failures are logged and do not stop the loop.
    pub async fn run(self) {
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    info!("New connection from {} on {}", peer, self.local_addr);

                    let session = Session::new(
                        stream,
                        peer.to_string(),
                        self.room.clone(),
                        self.config.header_parsing,
                    );

                    // Spawn a task for each session
                    tokio::spawn(async move {
                        match session.run().await {
                            Ok(()) => debug!("Connection from {} finished", peer),
                            Err(e) => warn!("Connection from {} closed: {}", peer, e),
                        }
                    });
                }
                Err(e) => accept_failed(self.local_addr, &e).await,
            }
        }
    }
}

async fn accept_failed(local_addr: SocketAddr, e: &std::io::Error) {
    error!(
        "Failed to accept connection on {}: {} (retrying in {:?})",
        local_addr, e, ACCEPT_RETRY_DELAY
    );
    tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
}

/// Start one listener per port and run them until the process exits
///
/// A port that fails to bind is logged and skipped. Fails only when no port
/// could be bound at all.
pub async fn serve(ports: &[u16], config: &RelayConfig) -> Result<(), RelayError> {
    let mut listeners = JoinSet::new();

    for &port in ports {
        let addr = config.bind_addr(port);
        match Listener::bind(&addr, config.clone()).await {
            Ok(listener) => {
                listeners.spawn(listener.run());
            }
            Err(e) => error!("{}", e),
        }
    }

    if listeners.is_empty() {
        return Err(RelayError::NoListeners);
    }

    while let Some(result) = listeners.join_next().await {
        if let Err(e) = result {
            error!("Listener task failed: {}", e);
        }
    }
    Ok(())
}
