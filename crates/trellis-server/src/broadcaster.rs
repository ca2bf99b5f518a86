//! Connection and session-room registry with message fan-out

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::debug;
use trellis_core::DiagramSnapshot;
use trellis_watcher::DiagramSink;

use crate::protocol::ServerMessage;

pub type ConnectionId = u64;

/// One queued message. Diagram updates carry their revision so a client
/// never moves back to an older diagram.
#[derive(Debug)]
struct Outbound {
    revision: Option<u64>,
    message: ServerMessage,
}

/// Receiving end of a connection's outbound queue. Messages come out in
/// the order they were sent, except that diagram updates older than one
/// already delivered are dropped.
pub struct ClientReceiver {
    rx: mpsc::UnboundedReceiver<Outbound>,
    last_revision: u64,
}

impl ClientReceiver {
    pub async fn recv(&mut self) -> Option<ServerMessage> {
        loop {
            let outbound = self.rx.recv().await?;
            if let Some(message) = self.accept(outbound) {
                return Some(message);
            }
        }
    }

    /// Next message if one is already queued.
    pub fn try_recv(&mut self) -> Option<ServerMessage> {
        while let Ok(outbound) = self.rx.try_recv() {
            if let Some(message) = self.accept(outbound) {
                return Some(message);
            }
        }
        None
    }

    fn accept(&mut self, outbound: Outbound) -> Option<ServerMessage> {
        match outbound.revision {
            Some(revision) if revision < self.last_revision => {
                debug!("Dropping stale diagram revision {}", revision);
                None
            }
            Some(revision) => {
                self.last_revision = revision;
                Some(outbound.message)
            }
            None => Some(outbound.message),
        }
    }
}

/// Tracks connected clients and the session rooms they joined.
#[derive(Default)]
pub struct Broadcaster {
    next_id: AtomicU64,
    connections: DashMap<ConnectionId, mpsc::UnboundedSender<Outbound>>,
    rooms: DashMap<String, HashSet<ConnectionId>>,
    memberships: DashMap<ConnectionId, HashSet<String>>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection and hand back its id and outbound queue.
    pub fn connect(&self) -> (ConnectionId, ClientReceiver) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let (tx, rx) = mpsc::unbounded_channel();
        self.connections.insert(id, tx);
        debug!("Connection {} registered", id);
        (id, ClientReceiver { rx, last_revision: 0 })
    }

    /// Add a connection to a session room. Returns `false` for unknown
    /// connections.
    pub fn join(&self, id: ConnectionId, session: &str) -> bool {
        if !self.connections.contains_key(&id) {
            return false;
        }
        self.rooms.entry(session.to_string()).or_default().insert(id);
        self.memberships.entry(id).or_default().insert(session.to_string());

        // A disconnect that ran between the check and the inserts would
        // leave a stale membership behind.
        if !self.connections.contains_key(&id) {
            self.disconnect(id);
            return false;
        }
        debug!("Connection {} joined session {:?}", id, session);
        true
    }

    /// Forget a connection and remove it from every room.
    pub fn disconnect(&self, id: ConnectionId) {
        self.connections.remove(&id);
        let Some((_, sessions)) = self.memberships.remove(&id) else {
            return;
        };
        for session in sessions {
            if let Some(mut members) = self.rooms.get_mut(&session) {
                members.remove(&id);
            }
            self.rooms.remove_if(&session, |_, members| members.is_empty());
        }
        debug!("Connection {} removed", id);
    }

    /// Send to every connected client. Returns the number of recipients.
    pub fn broadcast_all(&self, message: ServerMessage) -> usize {
        self.fan_out(self.connection_ids(), None, message)
    }

    /// Send only to connections that joined `session`.
    pub fn send_to_session(&self, session: &str, message: ServerMessage) -> usize {
        self.fan_out(self.session_members(session), None, message)
    }

    pub fn broadcast_diagram(&self, snapshot: &DiagramSnapshot) -> usize {
        self.fan_out_diagram(self.connection_ids(), snapshot)
    }

    pub fn send_diagram_to_session(&self, session: &str, snapshot: &DiagramSnapshot) -> usize {
        self.fan_out_diagram(self.session_members(session), snapshot)
    }

    /// Send a diagram to a single connection.
    pub fn send_diagram_to(&self, id: ConnectionId, snapshot: &DiagramSnapshot) -> bool {
        self.fan_out_diagram(vec![id], snapshot) == 1
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn session_members(&self, session: &str) -> Vec<ConnectionId> {
        self.rooms
            .get(session)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn session_count(&self) -> usize {
        self.rooms.len()
    }

    fn connection_ids(&self) -> Vec<ConnectionId> {
        self.connections.iter().map(|entry| *entry.key()).collect()
    }

    /// Revision 0 is the placeholder before any pass succeeded and is
    /// never sent.
    fn fan_out_diagram(&self, ids: Vec<ConnectionId>, snapshot: &DiagramSnapshot) -> usize {
        if snapshot.revision == 0 {
            debug!("No diagram published yet, nothing to send");
            return 0;
        }
        let message = ServerMessage::uml_update(&snapshot.text);
        self.fan_out(ids, Some(snapshot.revision), message)
    }

    fn fan_out(
        &self,
        ids: Vec<ConnectionId>,
        revision: Option<u64>,
        message: ServerMessage,
    ) -> usize {
        let mut delivered = 0;
        for id in ids {
            let Some(tx) = self.connections.get(&id) else {
                continue;
            };
            let outbound = Outbound {
                revision,
                message: message.clone(),
            };
            // A closed queue means the connection is going away; its own
            // disconnect cleans up.
            if tx.send(outbound).is_ok() {
                delivered += 1;
            } else {
                debug!("Dropped message for closed connection {}", id);
            }
        }
        delivered
    }
}

impl DiagramSink for Broadcaster {
    fn diagram_updated(&self, snapshot: &DiagramSnapshot) {
        let delivered = self.broadcast_diagram(snapshot);
        debug!("Diagram revision {} sent to {} clients", snapshot.revision, delivered);
    }

    fn recompute_failed(&self, message: &str) {
        let delivered = self.broadcast_all(ServerMessage::error(message));
        debug!("Error notification sent to {} clients", delivered);
    }
}
