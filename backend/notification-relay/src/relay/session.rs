use super::protocol::{ClientEvent, Notification, ServerEvent};
use super::registry::{ConnectionHandle, ConnectionId, ConnectionRegistry, OutboundReceiver};
use crate::config::RelayConfig;
use crate::metrics;
use actix::prelude::*;
use actix_web_actors::ws;
use std::time::Instant;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// WebSocket actor for one relay client
///
/// Inbound events are handled one at a time (`ctx.wait`), so notifications
/// from a single sender leave the relay in the order they arrived.
pub struct RelaySession {
    handle: ConnectionHandle,
    outbound: Option<OutboundReceiver>,
    registry: ConnectionRegistry,
    settings: RelayConfig,
    hb: Instant,
    /// Last user id this connection registered as (logging only)
    user_id: Option<String>,
}

impl RelaySession {
    pub fn new(registry: ConnectionRegistry, settings: RelayConfig) -> Self {
        let (handle, outbound) = ConnectionHandle::channel();
        Self {
            handle,
            outbound: Some(outbound),
            registry,
            settings,
            hb: Instant::now(),
            user_id: None,
        }
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.handle.id()
    }

    fn hb(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(self.settings.heartbeat_interval, |act, ctx| {
            if Instant::now().duration_since(act.hb) > act.settings.client_timeout {
                tracing::warn!(
                    connection_id = %act.connection_id(),
                    user_id = ?act.user_id,
                    "relay client heartbeat timed out, disconnecting"
                );
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }

    fn handle_text(&mut self, text: &str, ctx: &mut ws::WebsocketContext<Self>) {
        let event = match ClientEvent::parse(text) {
            Ok(event) => event,
            Err(e) => {
                metrics::record_malformed_event();
                tracing::warn!(
                    connection_id = %self.connection_id(),
                    error = %e,
                    "ignoring malformed relay event"
                );
                return;
            }
        };

        let registry = self.registry.clone();
        match event {
            ClientEvent::Register(user_id) => {
                let handle = self.handle.clone();
                self.user_id = Some(user_id.clone());
                ctx.wait(
                    async move {
                        registry.register(&user_id, handle).await;
                        metrics::record_registration();
                        metrics::set_registered_users(registry.connected_users_count().await);
                    }
                    .into_actor(self),
                );
            }
            ClientEvent::SendNotification(request) => {
                let recipient = request.recipient.clone();
                let notification = Notification::from(request);
                ctx.wait(
                    async move {
                        let delivery = registry.send_notification(&recipient, notification).await;
                        metrics::record_delivery(delivery);
                    }
                    .into_actor(self),
                );
            }
        }
    }
}

impl Actor for RelaySession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!(connection_id = %self.connection_id(), "relay client connected");
        metrics::connection_opened();

        self.hb(ctx);

        if let Some(outbound) = self.outbound.take() {
            ctx.add_stream(UnboundedReceiverStream::new(outbound));
        }
    }

    /// Unbinds this connection's user ids on a spawned task. Until that task
    /// runs, a send from another worker can still be queued to this session
    /// and reported as delivered, then dropped with the queue (best effort).
    fn stopped(&mut self, _ctx: &mut Self::Context) {
        metrics::connection_closed();

        let registry = self.registry.clone();
        let connection_id = self.connection_id();
        tracing::info!(
            connection_id = %connection_id,
            user_id = ?self.user_id,
            "relay client disconnected"
        );

        actix::spawn(async move {
            registry.disconnect(connection_id).await;
            metrics::set_registered_users(registry.connected_users_count().await);
        });
    }
}

// Outbound events queued by the registry
impl StreamHandler<ServerEvent> for RelaySession {
    fn handle(&mut self, event: ServerEvent, ctx: &mut Self::Context) {
        match event.to_json() {
            Ok(json) => ctx.text(json),
            Err(e) => tracing::error!(error = %e, "failed to encode relay event"),
        }
    }

    fn finished(&mut self, _ctx: &mut Self::Context) {
        // The session owns a sender, so the queue only ends while stopping
    }
}

// WebSocket protocol messages
impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for RelaySession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => {
                self.hb = Instant::now();
                ctx.pong(&msg);
            }
            Ok(ws::Message::Pong(_)) => {
                self.hb = Instant::now();
            }
            Ok(ws::Message::Text(text)) => {
                self.hb = Instant::now();
                self.handle_text(&text, ctx);
            }
            Ok(ws::Message::Binary(_)) => {
                metrics::record_malformed_event();
                tracing::warn!(
                    connection_id = %self.connection_id(),
                    "binary relay frames not supported"
                );
            }
            Ok(ws::Message::Close(reason)) => {
                tracing::debug!(connection_id = %self.connection_id(), ?reason, "close frame received");
                ctx.close(reason);
                ctx.stop();
            }
            Ok(ws::Message::Continuation(_)) => {
                tracing::warn!(connection_id = %self.connection_id(), "fragmented relay frames not supported");
            }
            Ok(ws::Message::Nop) => {}
            Err(e) => {
                tracing::warn!(connection_id = %self.connection_id(), error = %e, "websocket protocol error");
                ctx.stop();
            }
        }
    }
}
