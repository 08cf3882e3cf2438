/// Real-time endpoints
///
/// - `GET  /api/socket` - WebSocket upgrade (token optional)
/// - `GET  /api/socket/status` - Hub statistics (bearer token)
/// - `POST /api/socket/emit` - Push an arbitrary server event (admin)
///
/// # Handshake
///
/// The token is read from `?token=` first (browsers cannot set headers on a
/// WebSocket), then from `Authorization: Bearer`. Without a token the socket
/// is anonymous and may only use open rooms. A token that fails validation,
/// or belongs to a deleted or deactivated account, is refused with 401
/// before the upgrade. Rooms follow the stored role and department.
///
/// # Connection Lifecycle
///
/// 1. The connection is registered with the hub and receives `connected`
/// 2. A writer task drains the hub channel into the socket and pings every
///    25 seconds
/// 3. The reader parses each text frame as a client event and hands it to the hub
/// 4. When either side ends, the other is stopped and the connection is
///    unregistered

use crate::{
    app::{self, AppState},
    error::{ApiError, ApiResponse, ApiResult, ValidatedJson},
};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::HeaderMap,
    response::Response,
    Extension,
};
use futures::{SinkExt, StreamExt};
use portal_shared::{
    auth::{
        jwt,
        middleware::{self, AuthContext, AuthError},
    },
    realtime::{protocol::Welcome, ClientEvent, HubStats, ServerEvent},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::Validate;

const PING_INTERVAL: Duration = Duration::from_secs(25);

#[derive(Debug, Default, Deserialize)]
pub struct SocketQuery {
    pub token: Option<String>,
}

/// Resolves the identity of a socket handshake
///
/// `Ok(None)` means an anonymous connection.
fn handshake_identity(
    token: Option<&str>,
    headers: &HeaderMap,
    secret: &str,
) -> Result<Option<AuthContext>, AuthError> {
    if let Some(token) = token.map(str::trim).filter(|t| !t.is_empty()) {
        let claims = jwt::validate_access_token(token, secret)?;
        return Ok(Some(AuthContext::from(&claims)));
    }

    match middleware::authenticate(headers, secret) {
        Ok(auth) => Ok(Some(auth)),
        Err(AuthError::MissingCredentials) => Ok(None),
        Err(e) => Err(e),
    }
}

pub async fn socket_handler(
    State(state): State<AppState>,
    Query(query): Query<SocketQuery>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> ApiResult<Response> {
    let identity = match handshake_identity(query.token.as_deref(), &headers, state.jwt_secret())
        .map_err(|e| ApiError::Unauthorized(e.to_string()))?
    {
        Some(claims) => Some(app::current_identity(&state.db, claims).await?),
        None => None,
    };

    Ok(ws.on_upgrade(move |socket| handle_socket(state, socket, identity)))
}

async fn handle_socket(state: AppState, socket: WebSocket, identity: Option<AuthContext>) {
    let hub = state.hub.clone();
    let (id, mut events) = hub.register(identity).await;

    let welcome = ServerEvent::Connected(Welcome {
        connection_id: id,
        user_id: identity.map(|auth| auth.user_id),
        rooms: hub.rooms_of(id).await,
    });
    hub.emit_to(id, welcome).await;

    let (mut sink, mut stream) = socket.split();

    let mut writer = tokio::spawn(async move {
        let mut ping = tokio::time::interval(PING_INTERVAL);
        ping.tick().await;

        loop {
            let message = tokio::select! {
                event = events.recv() => match event {
                    Some(event) => match event.to_json() {
                        Ok(text) => Message::Text(text),
                        Err(e) => {
                            tracing::warn!(error = %e, event = event.name(), "Could not encode server event");
                            continue;
                        }
                    },
                    None => break,
                },
                _ = ping.tick() => Message::Ping(Vec::new()),
            };

            if sink.send(message).await.is_err() {
                break;
            }
        }

        let _ = sink.close().await;
    });

    let reader_hub = hub.clone();
    let mut reader = tokio::spawn(async move {
        while let Some(Ok(message)) = stream.next().await {
            match message {
                Message::Text(text) => match ClientEvent::parse(&text) {
                    Ok(event) => reader_hub.handle_client_event(id, event).await,
                    Err(e) => {
                        tracing::debug!(connection_id = %id, error = %e, "Malformed client frame");
                        reader_hub
                            .emit_to(id, ServerEvent::error(format!("Invalid event: {}", e)))
                            .await;
                    }
                },
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut writer => reader.abort(),
        _ = &mut reader => writer.abort(),
    }

    hub.unregister(id).await;
}

pub async fn socket_status(
    State(state): State<AppState>,
) -> ApiResult<ApiResponse<HubStats>> {
    Ok(ApiResponse::ok(state.hub.stats().await))
}

#[derive(Debug, Deserialize, Validate)]
pub struct EmitRequest {
    #[validate(length(min = 1, message = "Event is required"))]
    pub event: String,

    #[serde(default)]
    pub data: serde_json::Value,

    /// Target room; everyone when omitted
    pub room: Option<String>,
}

impl EmitRequest {
    fn server_event(&self) -> ApiResult<ServerEvent> {
        serde_json::from_value(serde_json::json!({
            "event": self.event,
            "data": self.data,
        }))
        .map_err(|e| ApiError::invalid_field("event", format!("Invalid event payload: {}", e)))
    }
}

#[derive(Debug, Serialize)]
pub struct EmitResponse {
    pub event: String,
    pub room: Option<String>,
    pub delivered: usize,
}

pub async fn emit_event(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ValidatedJson(req): ValidatedJson<EmitRequest>,
) -> ApiResult<ApiResponse<EmitResponse>> {
    let event = req.server_event()?;

    let delivered = match req.room.as_deref() {
        Some(room) => state.hub.emit_to_room(room, event, None).await,
        None => state.hub.broadcast(event).await,
    };

    tracing::info!(
        event = %req.event,
        room = ?req.room,
        delivered,
        sent_by = %auth.user_id,
        "Server event emitted"
    );

    Ok(ApiResponse::ok(EmitResponse {
        event: req.event,
        room: req.room,
        delivered,
    }))
}
