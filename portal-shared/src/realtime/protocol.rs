/// Wire protocol of the real-time channel
///
/// Every WebSocket text frame is a JSON object `{ "event": <name>, "data": <payload> }`.
///
/// ```json
/// {"event": "join-room", "data": "admin-dashboard"}
/// {"event": "send-message", "data": {"room": "department:hr", "message": {"text": "hi"}}}
/// {"event": "notification", "data": {"title": "Project created", "message": "...", "level": "info", "timestamp": "..."}}
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::auth::middleware::AuthContext;

/// Room every admin connection is placed in; receives `new-contact`
pub const ADMIN_DASHBOARD_ROOM: &str = "admin-dashboard";

/// Rooms with this prefix are restricted to admins
pub const ADMIN_ROOM_PREFIX: &str = "admin-";

/// Prefix of the private per-user rooms
pub const USER_ROOM_PREFIX: &str = "user:";

/// Longest accepted room name
pub const MAX_ROOM_NAME_LEN: usize = 128;

/// Identifier of one socket connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Private room of a user
pub fn user_room(user_id: Uuid) -> String {
    format!("{USER_ROOM_PREFIX}{user_id}")
}

/// Why a connection may not join a room
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    #[error("Room name must be 1 to {MAX_ROOM_NAME_LEN} characters")]
    InvalidName,

    #[error("Room {0} is restricted to administrators")]
    AdminOnly(String),

    #[error("Room {0} is private")]
    Private(String),
}

/// Checks whether a connection with `identity` may join `room`
///
/// `admin-*` rooms need an admin token, `user:<id>` rooms belong to that
/// user alone, every other room is open.
pub fn check_room_access(room: &str, identity: Option<&AuthContext>) -> Result<(), RoomError> {
    if room.is_empty() || room.len() > MAX_ROOM_NAME_LEN || room.trim() != room {
        return Err(RoomError::InvalidName);
    }

    if room.starts_with(ADMIN_ROOM_PREFIX) && !identity.is_some_and(|auth| auth.is_admin()) {
        return Err(RoomError::AdminOnly(room.to_string()));
    }

    if let Some(owner) = room.strip_prefix(USER_ROOM_PREFIX) {
        let is_owner = identity.is_some_and(|auth| auth.user_id.to_string() == owner);
        if !is_owner {
            return Err(RoomError::Private(room.to_string()));
        }
    }

    Ok(())
}

/// Message relayed to a room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub room: String,
    pub message: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypingIndicator {
    pub room: String,
}

/// Events sent by clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    JoinRoom(String),
    LeaveRoom(String),
    SendMessage(ChatMessage),
    TypingStart(TypingIndicator),
    TypingStop(TypingIndicator),
    /// A contact form was submitted from a page that already holds a socket
    ContactSubmitted(serde_json::Value),
}

impl ClientEvent {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Welcome {
    pub connection_id: ConnectionId,
    pub user_id: Option<Uuid>,
    pub rooms: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomRef {
    pub room: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayedMessage {
    pub room: String,
    pub from: ConnectionId,
    pub user_id: Option<Uuid>,
    pub message: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingNotice {
    pub room: String,
    pub connection_id: ConnectionId,
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    #[default]
    Info,
    Success,
    Warning,
    Error,
}

/// Dashboard notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub level: NotificationLevel,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub data: Option<serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            level: NotificationLevel::Info,
            data: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_level(mut self, level: NotificationLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
}

/// Events pushed to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    Connected(Welcome),
    RoomJoined(RoomRef),
    RoomLeft(RoomRef),
    ReceiveMessage(RelayedMessage),
    UserTyping(TypingNotice),
    UserStoppedTyping(TypingNotice),
    NewContact(serde_json::Value),
    Notification(Notification),
    Error(ErrorPayload),
}

impl ServerEvent {
    pub fn error(message: impl Into<String>) -> Self {
        ServerEvent::Error(ErrorPayload {
            message: message.into(),
        })
    }

    /// Event name as it appears on the wire
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::Connected(_) => "connected",
            ServerEvent::RoomJoined(_) => "room-joined",
            ServerEvent::RoomLeft(_) => "room-left",
            ServerEvent::ReceiveMessage(_) => "receive-message",
            ServerEvent::UserTyping(_) => "user-typing",
            ServerEvent::UserStoppedTyping(_) => "user-stopped-typing",
            ServerEvent::NewContact(_) => "new-contact",
            ServerEvent::Notification(_) => "notification",
            ServerEvent::Error(_) => "error",
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
