/// WebSocket entry point for relay clients
///
/// Each upgraded connection becomes a `RelaySession` actor.
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;

use crate::relay::RelaySession;
use crate::state::AppState;

/// Endpoint: GET /ws
pub async fn ws_handler(
    req: HttpRequest,
    stream: web::Payload,
    state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let session = RelaySession::new(state.registry.clone(), state.config.relay.clone());

    tracing::debug!(
        connection_id = %session.connection_id(),
        peer = ?req.peer_addr(),
        "upgrading relay connection"
    );

    ws::WsResponseBuilder::new(session, &req, stream)
        .frame_size(state.config.relay.max_frame_size)
        .start()
}

pub fn register_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/ws", web::get().to(ws_handler));
}
