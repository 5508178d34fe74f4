//! Connection session
//!
//! Drives one client connection through its lifecycle:
//!
//! 1. Read the username line and join the room.
//! 2. Loop: read a fixed-width header, read the body, route it.
//! 3. Concurrently drain the outbound queue to the socket.
//!
//! Any I/O failure or bad header closes the session. A body that does not
//! route is dropped and the loop continues.

use std::sync::Arc;

use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, ReadHalf,
    WriteHalf,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::codec::{self, HeaderParsing, HEADER_WIDTH};
use crate::error::RelayError;
use crate::message::Message;
use crate::participant::SessionHandle;
use crate::server::RoomHandle;
use crate::types::{SessionId, SessionState};

/// Longest accepted username line, delimiter included
pub const MAX_HANDSHAKE_LENGTH: u64 = 1024;

/// One client connection
///
/// Owns the socket and the outbound queue. The room only ever sees a
/// `SessionHandle`.
pub struct Session<S> {
    inbound: Inbound<S>,
    writer: WriteHalf<S>,
    outbound_tx: mpsc::UnboundedSender<Arc<Message>>,
    outbound_rx: mpsc::UnboundedReceiver<Arc<Message>>,
    peer: String,
    username: String,
}

/// Read side: the part of the session that advances the state machine
struct Inbound<S> {
    id: SessionId,
    state: SessionState,
    header_parsing: HeaderParsing,
    reader: BufReader<ReadHalf<S>>,
    room: RoomHandle,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite,
{
    /// Wrap a freshly accepted connection
    pub fn new(stream: S, peer: String, room: RoomHandle, header_parsing: HeaderParsing) -> Self {
        let (read_half, writer) = tokio::io::split(stream);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        Self {
            inbound: Inbound {
                id: SessionId::new(),
                state: SessionState::Connecting,
                header_parsing,
                reader: BufReader::new(read_half),
                room,
            },
            writer,
            outbound_tx,
            outbound_rx,
            peer,
            username: String::new(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.inbound.id
    }

    pub fn state(&self) -> SessionState {
        self.inbound.state
    }

    /// Username, empty until the handshake completes
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Handle the room can use to deliver to this session
    pub fn handle(&self) -> SessionHandle {
        SessionHandle::new(self.inbound.id, self.outbound_tx.clone())
    }

    /// Run the session to completion
    ///
    /// Always ends `Closed`; the error, if any, is what closed it.
    pub async fn run(mut self) -> Result<(), RelayError> {
        let result = self.drive().await;
        self.close().await;
        result
    }

    async fn drive(&mut self) -> Result<(), RelayError> {
        self.inbound.transition(SessionState::AwaitingUsername);

        let Some(username) = self.inbound.read_username().await? else {
            debug!("Session {} closed before handshake", self.inbound.id);
            return Ok(());
        };

        self.inbound.transition(SessionState::ReadingHeader);
        info!(
            "Session {} from {} identified as '{}'",
            self.inbound.id, self.peer, username
        );
        self.username = username;
        self.inbound
            .room
            .join(self.username.clone(), self.handle())
            .await?;

        tokio::select! {
            result = self.inbound.read_frames() => result,
            result = write_queue(&mut self.writer, &mut self.outbound_rx) => result,
        }
    }

    /// Enter `Closed`: leave the room and discard queued messages
    ///
    /// Idempotent. The socket is released when the session is dropped.
    async fn close(&mut self) {
        if self.inbound.state.is_closed() {
            return;
        }
        self.inbound.transition(SessionState::Closed);

        if let Err(e) = self.inbound.room.leave(self.inbound.id).await {
            debug!("Session {} could not leave room: {}", self.inbound.id, e);
        }

        self.outbound_rx.close();
        let mut discarded = 0usize;
        while self.outbound_rx.try_recv().is_ok() {
            discarded += 1;
        }
        if discarded > 0 {
            debug!(
                "Session {} discarded {} queued messages",
                self.inbound.id, discarded
            );
        }

        info!("Session {} ('{}') closed", self.inbound.id, self.username);
    }
}

impl<S> Inbound<S>
where
    S: AsyncRead,
{
    fn transition(&mut self, next: SessionState) {
        debug!("Session {}: {} -> {}", self.id, self.state, next);
        self.state = next;
    }

    /// Read up to and including the first newline
    ///
    /// Returns `None` if the peer hangs up (or overruns the length limit)
    /// before sending a newline.
    async fn read_username(&mut self) -> Result<Option<String>, RelayError> {
        let mut line = Vec::new();
        (&mut self.reader)
            .take(MAX_HANDSHAKE_LENGTH)
            .read_until(b'\n', &mut line)
            .await?;

        if line.pop() != Some(b'\n') {
            return Ok(None);
        }
        Ok(Some(String::from_utf8_lossy(&line).into_owned()))
    }

    /// Header/body loop
    ///
    /// Returns `Ok` when the peer disconnects between frames.
    async fn read_frames(&mut self) -> Result<(), RelayError> {
        loop {
            let mut header = [0u8; HEADER_WIDTH];
            match self.reader.read_exact(&mut header).await {
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    debug!("Session {} disconnected", self.id);
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            }

            let body_length = match codec::decode_header(&header, self.header_parsing) {
                Ok(length) => length,
                Err(e) => {
                    warn!("Session {} sent a bad header: {}", self.id, e);
                    return Err(e.into());
                }
            };

            self.transition(SessionState::ReadingBody);
            let mut frame = codec::frame_buffer(body_length)?;
            self.reader.read_exact(&mut frame[HEADER_WIDTH..]).await?;

            self.route(Message::from_frame(frame.freeze())?).await?;
            self.transition(SessionState::ReadingHeader);
        }
    }

    /// Hand a received body to the room, dropping it if it has no recipient
    async fn route(&self, message: Message) -> Result<(), RelayError> {
        let message = Arc::new(message);

        let recipient = match message.recipient() {
            Ok(recipient) => recipient.to_owned(),
            Err(e) => {
                warn!("Session {} message dropped: {}", self.id, e);
                return Ok(());
            }
        };

        debug!(
            "Session {} -> '{}' ({} bytes)",
            self.id,
            recipient,
            message.body_length()
        );
        self.room.deliver(recipient, message).await
    }
}

/// Write queued messages one at a time, in order
async fn write_queue<W>(
    writer: &mut W,
    queue: &mut mpsc::UnboundedReceiver<Arc<Message>>,
) -> Result<(), RelayError>
where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = queue.recv().await {
        writer.write_all(message.as_bytes()).await?;
        writer.flush().await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use tokio::io::{duplex, DuplexStream};
    use tokio::task::JoinHandle;
    use tokio::time::timeout;

    use crate::error::SendError;
    use crate::participant::Participant;
    use crate::server::RoomServer;

    const WAIT: Duration = Duration::from_secs(5);

    fn spawn_session(
        room: &RoomHandle,
        parsing: HeaderParsing,
    ) -> (DuplexStream, JoinHandle<Result<(), RelayError>>) {
        let (client, server) = duplex(64 * 1024);
        let session = Session::new(server, "test".to_string(), room.clone(), parsing);
        assert_eq!(session.state(), SessionState::Connecting);
        assert!(session.username().is_empty());
        (client, tokio::spawn(session.run()))
    }

    async fn wait_for_participants(room: &RoomHandle, expected: usize) {
        for _ in 0..500 {
            if room.stats().await.unwrap().participants == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("room never reached {} participants", expected);
    }

    async fn read_message(client: &mut DuplexStream) -> Message {
        let mut header = [0u8; HEADER_WIDTH];
        timeout(WAIT, client.read_exact(&mut header))
            .await
            .unwrap()
            .unwrap();
        let length = codec::decode_header(&header, HeaderParsing::Strict).unwrap();
        let mut body = vec![0u8; length];
        timeout(WAIT, client.read_exact(&mut body))
            .await
            .unwrap()
            .unwrap();
        Message::from_body(&body).unwrap()
    }

    async fn assert_closed(client: &mut DuplexStream) {
        let mut buf = [0u8; 16];
        let n = timeout(WAIT, client.read(&mut buf)).await.unwrap().unwrap();
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn test_routes_between_sessions() {
        let room = RoomServer::spawn(false);
        let (mut alice, _a) = spawn_session(&room, HeaderParsing::Permissive);
        let (mut bob, _b) = spawn_session(&room, HeaderParsing::Permissive);

        alice.write_all(b"alice\n").await.unwrap();
        bob.write_all(b"bob\n").await.unwrap();
        wait_for_participants(&room, 2).await;

        let msg = Message::compose("bob", "alice", "hi").unwrap();
        alice.write_all(msg.as_bytes()).await.unwrap();

        let received = read_message(&mut bob).await;
        assert_eq!(received.recipient().unwrap(), "bob");
        assert_eq!(received.sender(), Some("alice"));
        assert_eq!(received.body(), msg.body());
        assert_eq!(room.stats().await.unwrap().history, 1);
    }

    #[tokio::test]
    async fn test_unroutable_message_keeps_connection() {
        let room = RoomServer::spawn(false);
        let (mut alice, _a) = spawn_session(&room, HeaderParsing::Permissive);
        alice.write_all(b"alice\n").await.unwrap();
        wait_for_participants(&room, 1).await;

        let bad = codec::encode_frame(br#"{"Contents":{"Body":"x"}}"#).unwrap();
        alice.write_all(&bad).await.unwrap();

        // Still open: a message to herself comes back
        let good = Message::compose("alice", "alice", "still here").unwrap();
        alice.write_all(good.as_bytes()).await.unwrap();

        let received = read_message(&mut alice).await;
        assert_eq!(received.body(), good.body());
        assert_eq!(room.stats().await.unwrap().history, 1);
    }

    #[tokio::test]
    async fn test_oversized_header_closes() {
        let room = RoomServer::spawn(false);
        let (mut alice, task) = spawn_session(&room, HeaderParsing::Permissive);
        alice.write_all(b"alice\n").await.unwrap();
        wait_for_participants(&room, 1).await;

        alice.write_all(b"-0001").await.unwrap();

        assert_closed(&mut alice).await;
        let result = task.await.unwrap();
        assert!(matches!(result, Err(RelayError::Frame(_))));
        assert_eq!(room.stats().await.unwrap().participants, 0);
    }

    #[tokio::test]
    async fn test_strict_header_closes_on_garbage() {
        let room = RoomServer::spawn(false);
        let (mut alice, task) = spawn_session(&room, HeaderParsing::Strict);
        alice.write_all(b"alice\nhello").await.unwrap();

        assert_closed(&mut alice).await;
        assert!(matches!(task.await.unwrap(), Err(RelayError::Frame(_))));
    }

    #[tokio::test]
    async fn test_frame_in_handshake_packet() {
        let room = RoomServer::spawn(false);
        let (mut alice, _a) = spawn_session(&room, HeaderParsing::Permissive);

        let msg = Message::compose("alice", "alice", "same packet").unwrap();
        let mut packet = b"alice\n".to_vec();
        packet.extend_from_slice(msg.as_bytes());
        alice.write_all(&packet).await.unwrap();

        let received = read_message(&mut alice).await;
        assert_eq!(received.body(), msg.body());
    }

    #[tokio::test]
    async fn test_hangup_before_handshake() {
        let room = RoomServer::spawn(false);
        let (mut alice, task) = spawn_session(&room, HeaderParsing::Permissive);

        alice.write_all(b"ali").await.unwrap();
        drop(alice);

        assert!(task.await.unwrap().is_ok());
        assert_eq!(room.stats().await.unwrap().participants, 0);
    }

    #[tokio::test]
    async fn test_disconnect_leaves_room() {
        let room = RoomServer::spawn(false);
        let (mut alice, task) = spawn_session(&room, HeaderParsing::Permissive);
        alice.write_all(b"alice\n").await.unwrap();
        wait_for_participants(&room, 1).await;

        drop(alice);

        assert!(task.await.unwrap().is_ok());
        assert_eq!(room.stats().await.unwrap().participants, 0);
    }

    #[tokio::test]
    async fn test_username_is_verbatim() {
        let room = RoomServer::spawn(false);
        let (mut client, _task) = spawn_session(&room, HeaderParsing::Permissive);
        client.write_all(b"  Bob Smith\r\n").await.unwrap();
        wait_for_participants(&room, 1).await;

        let msg = Message::compose("  Bob Smith\r", "x", "exact").unwrap();
        client.write_all(msg.as_bytes()).await.unwrap();
        assert_eq!(read_message(&mut client).await.body(), msg.body());
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_discards_queue() {
        let room = RoomServer::spawn(false);
        let (_client, server) = duplex(1024);
        let mut session =
            Session::new(server, "test".to_string(), room.clone(), HeaderParsing::Permissive);

        room.join("carol".to_string(), session.handle()).await.unwrap();
        wait_for_participants(&room, 1).await;

        let queued = Arc::new(Message::compose("carol", "dave", "never sent").unwrap());
        session.handle().deliver(queued.clone()).unwrap();

        session.close().await;
        session.close().await;

        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(room.stats().await.unwrap().participants, 0);
        assert!(session.handle().is_closed());
        assert!(matches!(
            session.handle().deliver(queued),
            Err(SendError::ChannelClosed)
        ));
    }
}
