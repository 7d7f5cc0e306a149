//! Room registry of connected WebSocket clients and the delivery contract built on it.
use std::collections::BTreeSet;

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::state::game::{PlayerId, SessionId};

/// Named event pushed to connected clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoomEvent {
    /// Event name, as clients subscribe to it.
    pub event: String,
    /// Event payload.
    pub data: serde_json::Value,
}

impl RoomEvent {
    /// Serialize a payload under an event name.
    pub fn json<T: Serialize>(event: &str, payload: &T) -> serde_json::Result<Self> {
        Ok(Self {
            event: event.to_owned(),
            data: serde_json::to_value(payload)?,
        })
    }
}

/// Delivery contract the engine pushes through.
///
/// Delivery is fire-and-forget; clients that miss a push recover through a resync.
pub trait RoomChannel: Send + Sync {
    /// Push to every connection of the room.
    fn send_to_room(&self, session_id: &str, event: RoomEvent);
    /// Push to the connections of one player in the room.
    fn send_to_recipient(&self, session_id: &str, player_id: &str, event: RoomEvent);
    /// Distinct players currently connected to the room.
    fn room_members(&self, session_id: &str) -> Vec<PlayerId>;
}

/// Handle used to push events to one connected client.
#[derive(Debug, Clone)]
pub struct ClientConnection {
    /// Per-socket identifier.
    pub id: Uuid,
    /// Player behind the socket.
    pub player_id: PlayerId,
    /// Outbound queue drained by the socket's writer task.
    pub tx: mpsc::UnboundedSender<RoomEvent>,
}

impl ClientConnection {
    /// Fresh connection handle with a random id.
    pub fn new(player_id: impl Into<PlayerId>, tx: mpsc::UnboundedSender<RoomEvent>) -> Self {
        Self {
            id: Uuid::new_v4(),
            player_id: player_id.into(),
            tx,
        }
    }
}

/// In-process rooms of WebSocket connections, keyed by session.
#[derive(Default)]
pub struct RoomHub {
    rooms: DashMap<SessionId, DashMap<Uuid, ClientConnection>>,
}

impl RoomHub {
    /// Hub with no room.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection to a session room; entering twice is harmless.
    pub fn enter(&self, session_id: &str, connection: ClientConnection) {
        self.rooms
            .entry(session_id.to_owned())
            .or_default()
            .insert(connection.id, connection);
    }

    /// Remove a connection from one room.
    pub fn leave(&self, session_id: &str, connection_id: Uuid) {
        if let Some(room) = self.rooms.get(session_id) {
            room.remove(&connection_id);
        }
        self.rooms.remove_if(session_id, |_, room| room.is_empty());
    }

    /// Remove a connection from every room it entered.
    pub fn disconnect(&self, connection_id: Uuid) {
        let session_ids: Vec<SessionId> = self
            .rooms
            .iter()
            .filter(|room| room.value().contains_key(&connection_id))
            .map(|room| room.key().clone())
            .collect();
        for session_id in session_ids {
            self.leave(&session_id, connection_id);
        }
    }

    fn deliver<F>(&self, session_id: &str, event: RoomEvent, mut accept: F)
    where
        F: FnMut(&ClientConnection) -> bool,
    {
        let Some(room) = self.rooms.get(session_id) else {
            debug!(session_id, event = %event.event, "no room to deliver to");
            return;
        };
        let mut closed = Vec::new();
        for connection in room.iter().filter(|connection| accept(connection.value())) {
            if connection.tx.send(event.clone()).is_err() {
                closed.push(connection.id);
            }
        }
        for connection_id in closed {
            room.remove(&connection_id);
        }
    }
}

impl RoomChannel for RoomHub {
    fn send_to_room(&self, session_id: &str, event: RoomEvent) {
        self.deliver(session_id, event, |_| true);
    }

    fn send_to_recipient(&self, session_id: &str, player_id: &str, event: RoomEvent) {
        self.deliver(session_id, event, |connection| {
            connection.player_id == player_id
        });
    }

    fn room_members(&self, session_id: &str) -> Vec<PlayerId> {
        self.rooms
            .get(session_id)
            .map(|room| {
                room.iter()
                    .map(|connection| connection.player_id.clone())
                    .collect::<BTreeSet<_>>()
                    .into_iter()
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(name: &str) -> RoomEvent {
        RoomEvent::json(name, &serde_json::json!({ "n": 1 })).unwrap()
    }

    #[test]
    fn room_events_reach_every_connection() {
        let hub = RoomHub::new();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        hub.enter("GAROOM01", ClientConnection::new("alice", tx_a));
        hub.enter("GAROOM01", ClientConnection::new("bob", tx_b));

        hub.send_to_room("GAROOM01", event("gameStarted"));
        assert_eq!(rx_a.try_recv().unwrap().event, "gameStarted");
        assert_eq!(rx_b.try_recv().unwrap().event, "gameStarted");
    }

    #[test]
    fn recipient_events_stay_personal() {
        let hub = RoomHub::new();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        hub.enter("GAROOM02", ClientConnection::new("alice", tx_a));
        hub.enter("GAROOM02", ClientConnection::new("bob", tx_b));

        hub.send_to_recipient("GAROOM02", "bob", event("isCorrectAnswer"));
        assert!(rx_a.try_recv().is_err());
        assert_eq!(rx_b.try_recv().unwrap().event, "isCorrectAnswer");
    }

    #[test]
    fn members_are_distinct_players() {
        let hub = RoomHub::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        hub.enter("GAROOM03", ClientConnection::new("alice", tx.clone()));
        hub.enter("GAROOM03", ClientConnection::new("alice", tx.clone()));
        hub.enter("GAROOM03", ClientConnection::new("bob", tx));
        assert_eq!(hub.room_members("GAROOM03"), vec!["alice", "bob"]);
    }

    #[test]
    fn closed_connections_are_pruned() {
        let hub = RoomHub::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let connection = ClientConnection::new("alice", tx);
        let connection_id = connection.id;
        hub.enter("GAROOM04", connection);
        drop(rx);

        hub.send_to_room("GAROOM04", event("newQuestion"));
        assert!(hub.room_members("GAROOM04").is_empty());

        hub.disconnect(connection_id);
        assert!(hub.room_members("GAROOM04").is_empty());
    }

    #[test]
    fn disconnect_leaves_every_room() {
        let hub = RoomHub::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let connection = ClientConnection::new("alice", tx);
        let connection_id = connection.id;
        hub.enter("GAROOM05", connection.clone());
        hub.enter("GAROOM06", connection);

        hub.disconnect(connection_id);
        assert!(hub.room_members("GAROOM05").is_empty());
        assert!(hub.room_members("GAROOM06").is_empty());
    }
}
