/// Real-time notifications and room messaging
///
/// - [`protocol`]: JSON event frames exchanged over the WebSocket and the
///   room access rules
/// - [`hub`]: registry of live connections and rooms, best-effort fan-out
///
/// The HTTP side (`portal-api`) upgrades sockets, registers them with the
/// [`hub::Hub`] and pushes `notification` / `new-contact` events from REST
/// handlers.

pub mod hub;
pub mod protocol;

pub use hub::{Hub, HubError, HubStats};
pub use protocol::{ClientEvent, ConnectionId, Notification, NotificationLevel, ServerEvent};
