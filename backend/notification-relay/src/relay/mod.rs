/// Notification relay
///
/// Architecture:
/// 1. ConnectionRegistry: user id -> live connection, last register wins
/// 2. RelaySession: one actor per WebSocket client, feeds the registry
/// 3. Protocol: socket.io-shaped JSON events on the wire
pub mod protocol;
pub mod registry;
pub mod session;

pub use protocol::{ClientEvent, Notification, NotificationRequest, ServerEvent};
pub use registry::{
    ConnectionHandle, ConnectionId, ConnectionRegistry, Delivery, RegistrationSnapshot,
};
pub use session::RelaySession;
