use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Per-connection buffer for outbound frames. Bounded so a slow client
/// cannot exhaust memory; overflow drops the frame for that client only.
pub const CONNECTION_BUFFER: usize = 64;

/// Outbound channel to one connection's writer task. The channel is the sink
/// seam: production writers own a WebSocket, tests attach a plain receiver.
pub type FrameSender = mpsc::Sender<String>;

/// Authenticated role of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionRole {
    Host,
    Player,
}

#[derive(Debug)]
struct Connection {
    id: u64,
    role: ConnectionRole,
    player_id: Option<String>,
    sender: FrameSender,
}

/// The live sinks of one room. Owned by the room entry; all methods are
/// called with the set's lock held, never across I/O.
#[derive(Debug, Default)]
pub struct ConnectionSet {
    next_id: u64,
    connections: Vec<Connection>,
}

impl ConnectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an authenticated connection. Callers verify the role first
    /// (host via secret, player via known id).
    pub fn add(
        &mut self,
        role: ConnectionRole,
        player_id: Option<String>,
        sender: FrameSender,
    ) -> u64 {
        self.next_id += 1;
        let id = self.next_id;
        self.connections.push(Connection {
            id,
            role,
            player_id,
            sender,
        });
        id
    }

    /// Remove a connection. Idempotent.
    pub fn remove(&mut self, id: u64) {
        self.connections.retain(|c| c.id != id);
    }

    /// Drop every connection registered for a player (their writer tasks see
    /// the channel close and shut the socket). Returns how many were dropped.
    pub fn close_player_connections(&mut self, player_id: &str) -> usize {
        let before = self.connections.len();
        self.connections
            .retain(|c| c.player_id.as_deref() != Some(player_id));
        before - self.connections.len()
    }

    /// Send a final frame to every connection, then drop them all.
    pub fn close_all_with(&mut self, frame: &str) {
        for conn in self.connections.drain(..) {
            let _ = conn.sender.try_send(frame.to_string());
        }
    }

    /// Fan a transition out to every sink with its role's frame. A dead sink
    /// is removed inline and never aborts delivery to its peers; a full
    /// buffer drops the frame for that sink only.
    pub fn broadcast(&mut self, host_frame: &str, player_frame: &str) {
        self.connections.retain(|conn| {
            let frame = match conn.role {
                ConnectionRole::Host => host_frame,
                ConnectionRole::Player => player_frame,
            };
            match conn.sender.try_send(frame.to_string()) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::debug!(
                        connection_id = conn.id,
                        "Skipping broadcast to slow client (buffer full)"
                    );
                    true
                },
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            }
        });
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn has_host(&self) -> bool {
        self.connections
            .iter()
            .any(|c| c.role == ConnectionRole::Host)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel() -> (FrameSender, mpsc::Receiver<String>) {
        mpsc::channel(CONNECTION_BUFFER)
    }

    #[test]
    fn broadcast_routes_frames_by_role() {
        let mut set = ConnectionSet::new();
        let (host_tx, mut host_rx) = channel();
        let (player_tx, mut player_rx) = channel();
        set.add(ConnectionRole::Host, None, host_tx);
        set.add(ConnectionRole::Player, Some("p-1".into()), player_tx);

        set.broadcast("for-host", "for-player");
        assert_eq!(host_rx.try_recv().unwrap(), "for-host");
        assert_eq!(player_rx.try_recv().unwrap(), "for-player");
    }

    #[test]
    fn dead_sink_is_removed_without_aborting_peers() {
        let mut set = ConnectionSet::new();
        let (dead_tx, dead_rx) = channel();
        let (live_tx, mut live_rx) = channel();
        set.add(ConnectionRole::Player, Some("p-1".into()), dead_tx);
        set.add(ConnectionRole::Player, Some("p-2".into()), live_tx);
        drop(dead_rx);

        set.broadcast("h", "p");
        assert_eq!(set.len(), 1);
        assert_eq!(live_rx.try_recv().unwrap(), "p");
    }

    #[test]
    fn full_buffer_drops_frame_but_keeps_connection() {
        let mut set = ConnectionSet::new();
        let (tx, mut rx) = mpsc::channel(1);
        set.add(ConnectionRole::Player, Some("p-1".into()), tx);

        set.broadcast("h", "first");
        set.broadcast("h", "second"); // buffer full, dropped
        assert_eq!(set.len(), 1);
        assert_eq!(rx.try_recv().unwrap(), "first");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn remove_is_idempotent() {
        let mut set = ConnectionSet::new();
        let (tx, _rx) = channel();
        let id = set.add(ConnectionRole::Host, None, tx);
        set.remove(id);
        set.remove(id);
        assert!(set.is_empty());
    }

    #[test]
    fn close_player_connections_drops_all_of_theirs() {
        let mut set = ConnectionSet::new();
        let (tx1, mut rx1) = channel();
        let (tx2, _rx2) = channel();
        let (tx3, _rx3) = channel();
        set.add(ConnectionRole::Player, Some("p-1".into()), tx1);
        set.add(ConnectionRole::Player, Some("p-1".into()), tx2);
        set.add(ConnectionRole::Player, Some("p-2".into()), tx3);

        assert_eq!(set.close_player_connections("p-1"), 2);
        assert_eq!(set.len(), 1);
        // Dropped sender closes the channel from the receiver's view.
        assert!(matches!(
            rx1.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }

    #[test]
    fn close_all_sends_final_frame() {
        let mut set = ConnectionSet::new();
        let (tx1, mut rx1) = channel();
        let (tx2, mut rx2) = channel();
        set.add(ConnectionRole::Host, None, tx1);
        set.add(ConnectionRole::Player, Some("p-1".into()), tx2);

        set.close_all_with("goodbye");
        assert!(set.is_empty());
        assert_eq!(rx1.try_recv().unwrap(), "goodbye");
        assert_eq!(rx2.try_recv().unwrap(), "goodbye");
    }

    #[test]
    fn has_host_tracks_roles() {
        let mut set = ConnectionSet::new();
        assert!(!set.has_host());
        let (tx, _rx) = channel();
        let id = set.add(ConnectionRole::Host, None, tx);
        assert!(set.has_host());
        set.remove(id);
        assert!(!set.has_host());
    }
}
