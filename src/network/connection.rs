//! Outbound queue of a single WebSocket connection.

use std::net::SocketAddr;
use tokio::sync::mpsc;
use tracing::warn;

use crate::network::protocol::ServerMessage;

/// Sending half of a connection's outbound queue.
///
/// The connection's writer task is the only consumer, so frames from
/// different senders never interleave on the socket. The queue is unbounded.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    peer: Option<SocketAddr>,
    tx: mpsc::UnboundedSender<ServerMessage>,
}

impl ConnectionHandle {
    /// Create a handle and the receiver its writer task drains.
    pub fn channel(peer: Option<SocketAddr>) -> (Self, mpsc::UnboundedReceiver<ServerMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { peer, tx }, rx)
    }

    /// Remote address, when known.
    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Queue a message. Returns false if the connection is gone.
    pub fn send(&self, message: ServerMessage) -> bool {
        match self.tx.send(message) {
            Ok(()) => true,
            Err(_) => {
                warn!("Dropped message for closed connection {:?}", self.peer);
                false
            }
        }
    }

    /// Whether the writer side has gone away.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_reaches_receiver() {
        let (handle, mut rx) = ConnectionHandle::channel(None);

        assert!(handle.send(ServerMessage::OpponentLeft));
        assert_eq!(rx.recv().await, Some(ServerMessage::OpponentLeft));
    }

    #[test]
    fn test_send_after_close_reports_failure() {
        let (handle, rx) = ConnectionHandle::channel(None);
        drop(rx);

        assert!(handle.is_closed());
        assert!(!handle.send(ServerMessage::RematchStart));
    }
}
