/// In-process real-time hub
///
/// Keeps the registry of live socket connections and the rooms they belong
/// to. Each connection owns an unbounded channel; the socket task drains the
/// receiver and writes frames, the hub only pushes into senders.
///
/// Delivery is best effort. A send into a connection whose receiver is gone
/// is dropped and logged; nothing is queued or retried, and there is no
/// ordering guarantee across rooms.
///
/// # Example
///
/// ```
/// use portal_shared::realtime::hub::Hub;
/// use portal_shared::realtime::protocol::{Notification, ServerEvent};
///
/// # #[tokio::main]
/// # async fn main() {
/// let hub = Hub::new();
/// let (id, mut rx) = hub.register(None).await;
/// hub.join(id, "lobby").await.unwrap();
///
/// hub.emit_to_room("lobby", ServerEvent::Notification(Notification::new("Hi", "there")), None)
///     .await;
/// assert!(matches!(rx.recv().await, Some(ServerEvent::Notification(_))));
/// # }
/// ```

use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

use super::protocol::{
    check_room_access, user_room, ChatMessage, ClientEvent, ConnectionId, RelayedMessage,
    RoomError, RoomRef, ServerEvent, TypingIndicator, TypingNotice, ADMIN_DASHBOARD_ROOM,
};
use crate::auth::middleware::AuthContext;

/// Error type for hub operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HubError {
    #[error("Unknown connection {0}")]
    UnknownConnection(ConnectionId),

    #[error(transparent)]
    Room(#[from] RoomError),

    #[error("Not a member of room {0}")]
    NotMember(String),
}

struct Connection {
    sender: mpsc::UnboundedSender<ServerEvent>,
    identity: Option<AuthContext>,
    rooms: HashSet<String>,
}

#[derive(Default)]
struct HubState {
    connections: HashMap<ConnectionId, Connection>,
    rooms: HashMap<String, HashSet<ConnectionId>>,
}

impl HubState {
    fn add_member(&mut self, id: ConnectionId, room: &str) -> bool {
        let Some(connection) = self.connections.get_mut(&id) else {
            return false;
        };

        connection.rooms.insert(room.to_string());
        self.rooms.entry(room.to_string()).or_default().insert(id)
    }

    fn remove_member(&mut self, id: ConnectionId, room: &str) -> bool {
        if let Some(connection) = self.connections.get_mut(&id) {
            connection.rooms.remove(room);
        }

        let Some(members) = self.rooms.get_mut(room) else {
            return false;
        };

        let removed = members.remove(&id);
        if members.is_empty() {
            self.rooms.remove(room);
        }
        removed
    }
}

/// Connection and room counts for the status endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HubStats {
    pub connections: usize,
    pub authenticated_connections: usize,
    pub rooms: BTreeMap<String, usize>,
}

/// Registry of connections and rooms
#[derive(Default)]
pub struct Hub {
    state: RwLock<HubState>,
}

fn deliver(id: ConnectionId, connection: &Connection, event: ServerEvent) -> bool {
    match connection.sender.send(event) {
        Ok(()) => true,
        Err(err) => {
            debug!(connection_id = %id, event = err.0.name(), "Dropping event for closed connection");
            false
        }
    }
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a connection and returns the receiver its socket task drains
    ///
    /// Authenticated connections are placed in their `user:<id>` and
    /// `department:<name>` rooms, admins also in `admin-dashboard`.
    pub async fn register(
        &self,
        identity: Option<AuthContext>,
    ) -> (ConnectionId, mpsc::UnboundedReceiver<ServerEvent>) {
        let id = ConnectionId::new();
        let (sender, receiver) = mpsc::unbounded_channel();

        let mut state = self.state.write().await;
        state.connections.insert(
            id,
            Connection {
                sender,
                identity,
                rooms: HashSet::new(),
            },
        );

        if let Some(auth) = identity {
            state.add_member(id, &user_room(auth.user_id));
            state.add_member(id, &auth.department.room());
            if auth.is_admin() {
                state.add_member(id, ADMIN_DASHBOARD_ROOM);
            }
        }

        info!(
            connection_id = %id,
            user_id = ?identity.map(|auth| auth.user_id),
            total = state.connections.len(),
            "Socket connection registered"
        );

        (id, receiver)
    }

    /// Removes a connection from the registry and from all of its rooms
    pub async fn unregister(&self, id: ConnectionId) {
        let mut state = self.state.write().await;

        let Some(connection) = state.connections.remove(&id) else {
            return;
        };

        for room in &connection.rooms {
            if let Some(members) = state.rooms.get_mut(room) {
                members.remove(&id);
                if members.is_empty() {
                    state.rooms.remove(room);
                }
            }
        }

        info!(connection_id = %id, total = state.connections.len(), "Socket connection closed");
    }

    /// Adds a connection to a room, subject to the room access rules
    pub async fn join(&self, id: ConnectionId, room: &str) -> Result<(), HubError> {
        let mut state = self.state.write().await;

        let connection = state
            .connections
            .get(&id)
            .ok_or(HubError::UnknownConnection(id))?;
        check_room_access(room, connection.identity.as_ref())?;

        state.add_member(id, room);
        debug!(connection_id = %id, room, "Joined room");
        Ok(())
    }

    /// Removes a connection from a room; `false` if it wasn't a member
    pub async fn leave(&self, id: ConnectionId, room: &str) -> bool {
        let mut state = self.state.write().await;
        state.remove_member(id, room)
    }

    pub async fn is_member(&self, id: ConnectionId, room: &str) -> bool {
        let state = self.state.read().await;
        state.rooms.get(room).is_some_and(|members| members.contains(&id))
    }

    /// Rooms of a connection, sorted
    pub async fn rooms_of(&self, id: ConnectionId) -> Vec<String> {
        let state = self.state.read().await;
        let mut rooms: Vec<String> = state
            .connections
            .get(&id)
            .map(|connection| connection.rooms.iter().cloned().collect())
            .unwrap_or_default();
        rooms.sort();
        rooms
    }

    pub async fn identity(&self, id: ConnectionId) -> Option<AuthContext> {
        let state = self.state.read().await;
        state.connections.get(&id).and_then(|connection| connection.identity)
    }

    /// Sends to one connection; `false` if it is unknown or closed
    pub async fn emit_to(&self, id: ConnectionId, event: ServerEvent) -> bool {
        let state = self.state.read().await;
        state
            .connections
            .get(&id)
            .is_some_and(|connection| deliver(id, connection, event))
    }

    /// Sends to every member of `room` except `except`
    ///
    /// Returns the number of connections the event was handed to.
    pub async fn emit_to_room(
        &self,
        room: &str,
        event: ServerEvent,
        except: Option<ConnectionId>,
    ) -> usize {
        let state = self.state.read().await;

        let Some(members) = state.rooms.get(room) else {
            debug!(room, event = event.name(), "Emit to empty room");
            return 0;
        };

        members
            .iter()
            .filter(|id| Some(**id) != except)
            .filter_map(|id| state.connections.get(id).map(|connection| (*id, connection)))
            .filter(|(id, connection)| deliver(*id, connection, event.clone()))
            .count()
    }

    /// Sends to every socket of a user
    pub async fn emit_to_user(&self, user_id: Uuid, event: ServerEvent) -> usize {
        self.emit_to_room(&user_room(user_id), event, None).await
    }

    /// Sends to every connection
    pub async fn broadcast(&self, event: ServerEvent) -> usize {
        let state = self.state.read().await;

        state
            .connections
            .iter()
            .filter(|(id, connection)| deliver(**id, connection, event.clone()))
            .count()
    }

    pub async fn connection_count(&self) -> usize {
        self.state.read().await.connections.len()
    }

    pub async fn stats(&self) -> HubStats {
        let state = self.state.read().await;

        HubStats {
            connections: state.connections.len(),
            authenticated_connections: state
                .connections
                .values()
                .filter(|connection| connection.identity.is_some())
                .count(),
            rooms: state
                .rooms
                .iter()
                .map(|(room, members)| (room.clone(), members.len()))
                .collect(),
        }
    }

    /// Applies one client event on behalf of connection `id`
    ///
    /// Failures are reported back to the sender as an `error` event.
    pub async fn handle_client_event(&self, id: ConnectionId, event: ClientEvent) {
        if let Err(err) = self.dispatch(id, event).await {
            debug!(connection_id = %id, error = %err, "Client event rejected");
            self.emit_to(id, ServerEvent::error(err.to_string())).await;
        }
    }

    async fn dispatch(&self, id: ConnectionId, event: ClientEvent) -> Result<(), HubError> {
        match event {
            ClientEvent::JoinRoom(room) => {
                self.join(id, &room).await?;
                self.emit_to(id, ServerEvent::RoomJoined(RoomRef { room })).await;
            }
            ClientEvent::LeaveRoom(room) => {
                self.leave(id, &room).await;
                self.emit_to(id, ServerEvent::RoomLeft(RoomRef { room })).await;
            }
            ClientEvent::SendMessage(ChatMessage { room, message }) => {
                self.require_member(id, &room).await?;
                let relayed = RelayedMessage {
                    room: room.clone(),
                    from: id,
                    user_id: self.identity(id).await.map(|auth| auth.user_id),
                    message,
                    timestamp: chrono::Utc::now(),
                };
                self.emit_to_room(&room, ServerEvent::ReceiveMessage(relayed), Some(id))
                    .await;
            }
            ClientEvent::TypingStart(TypingIndicator { room }) => {
                let notice = self.typing_notice(id, room).await?;
                let room = notice.room.clone();
                self.emit_to_room(&room, ServerEvent::UserTyping(notice), Some(id))
                    .await;
            }
            ClientEvent::TypingStop(TypingIndicator { room }) => {
                let notice = self.typing_notice(id, room).await?;
                let room = notice.room.clone();
                self.emit_to_room(&room, ServerEvent::UserStoppedTyping(notice), Some(id))
                    .await;
            }
            ClientEvent::ContactSubmitted(data) => {
                self.emit_to_room(ADMIN_DASHBOARD_ROOM, ServerEvent::NewContact(data), None)
                    .await;
            }
        }

        Ok(())
    }

    async fn require_member(&self, id: ConnectionId, room: &str) -> Result<(), HubError> {
        if self.is_member(id, room).await {
            Ok(())
        } else {
            Err(HubError::NotMember(room.to_string()))
        }
    }

    async fn typing_notice(&self, id: ConnectionId, room: String) -> Result<TypingNotice, HubError> {
        self.require_member(id, &room).await?;

        Ok(TypingNotice {
            room,
            connection_id: id,
            user_id: self.identity(id).await.map(|auth| auth.user_id),
        })
    }
}
