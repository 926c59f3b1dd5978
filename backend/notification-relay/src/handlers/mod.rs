/// HTTP handlers for the notification relay
pub mod relay;
pub mod websocket;

pub use relay::register_routes as register_relay;
pub use websocket::register_routes as register_websocket;
