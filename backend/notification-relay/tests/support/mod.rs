use std::future::Future;
use std::net::{SocketAddr, TcpListener};
use std::time::Duration;

use actix_web::dev::ServerHandle;
use actix_web_actors::ws::ProtocolError;
use awc::{ws, Client};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use notification_relay::relay::{ClientEvent, ServerEvent};
use notification_relay::{server, AppState, Config, ConnectionRegistry};

pub struct TestRelay {
    pub addr: SocketAddr,
    pub registry: ConnectionRegistry,
    handle: ServerHandle,
}

impl TestRelay {
    pub async fn stop(self) {
        self.handle.stop(false).await;
    }
}

pub async fn start_relay() -> std::io::Result<TestRelay> {
    // Keep server pings out of the frames the tests inspect
    start_relay_with(Duration::from_secs(60), Duration::from_secs(120)).await
}

pub async fn start_relay_with(
    heartbeat_interval: Duration,
    client_timeout: Duration,
) -> std::io::Result<TestRelay> {
    let mut config = Config::default();
    config.app.host = "127.0.0.1".to_string();
    config.app.workers = Some(1);
    config.relay.heartbeat_interval = heartbeat_interval;
    config.relay.client_timeout = client_timeout;

    let state = AppState::new(config);
    let registry = state.registry.clone();

    let listener = TcpListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?;

    let server = server::run(listener, state)?;
    let handle = server.handle();
    actix_rt::spawn(server);

    Ok(TestRelay {
        addr,
        registry,
        handle,
    })
}

pub async fn connect(
    addr: SocketAddr,
) -> impl Sink<ws::Message, Error = ProtocolError>
       + Stream<Item = Result<ws::Frame, ProtocolError>>
       + Unpin {
    let (_resp, connection) = Client::new()
        .ws(format!("http://{addr}/ws"))
        .connect()
        .await
        .expect("connect websocket client");
    connection
}

pub async fn send_event<S>(connection: &mut S, event: &ClientEvent)
where
    S: Sink<ws::Message, Error = ProtocolError> + Unpin,
{
    let json = event.to_json().expect("encode client event");
    send_text(connection, json).await;
}

pub async fn send_text<S>(connection: &mut S, text: impl Into<String>)
where
    S: Sink<ws::Message, Error = ProtocolError> + Unpin,
{
    let text: String = text.into();
    connection
        .send(ws::Message::Text(text.into()))
        .await
        .expect("send frame");
}

pub async fn close<S>(connection: &mut S)
where
    S: Sink<ws::Message, Error = ProtocolError> + Unpin,
{
    connection
        .send(ws::Message::Close(None))
        .await
        .expect("send close frame");
}

/// Next server event, skipping control frames
pub async fn next_event<S>(connection: &mut S) -> ServerEvent
where
    S: Stream<Item = Result<ws::Frame, ProtocolError>> + Unpin,
{
    loop {
        let frame = connection
            .next()
            .await
            .expect("connection open")
            .expect("frame data");
        match frame {
            ws::Frame::Text(bytes) => {
                let text = std::str::from_utf8(&bytes).expect("utf-8 frame");
                return ServerEvent::from_json(text).expect("decode server event");
            }
            ws::Frame::Ping(_) | ws::Frame::Pong(_) => continue,
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

pub async fn recv_event<S>(connection: &mut S) -> ServerEvent
where
    S: Stream<Item = Result<ws::Frame, ProtocolError>> + Unpin,
{
    actix_rt::time::timeout(Duration::from_secs(2), next_event(connection))
        .await
        .expect("notification within 2s")
}

/// Assert nothing is delivered to `connection` for a short window
pub async fn assert_silent<S>(connection: &mut S)
where
    S: Stream<Item = Result<ws::Frame, ProtocolError>> + Unpin,
{
    let result =
        actix_rt::time::timeout(Duration::from_millis(300), next_event(connection)).await;
    assert!(result.is_err(), "unexpected delivery: {result:?}");
}

/// Poll until `check` holds; registry updates land asynchronously
pub async fn wait_for<F, Fut>(check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    wait_for_within(Duration::from_secs(2), check).await;
}

pub async fn wait_for_within<F, Fut>(limit: Duration, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let step = Duration::from_millis(20);
    let deadline = std::time::Instant::now() + limit;
    loop {
        if check().await {
            return;
        }
        if std::time::Instant::now() >= deadline {
            panic!("condition not reached within {limit:?}");
        }
        actix_rt::time::sleep(step).await;
    }
}

pub async fn wait_registered(registry: &ConnectionRegistry, user_id: &str) {
    let registry = registry.clone();
    let user_id = user_id.to_string();
    wait_for(|| {
        let registry = registry.clone();
        let user_id = user_id.clone();
        async move { registry.is_registered(&user_id).await }
    })
    .await;
}

pub async fn wait_unregistered(registry: &ConnectionRegistry, user_id: &str) {
    wait_unregistered_within(registry, user_id, Duration::from_secs(2)).await;
}

pub async fn wait_unregistered_within(registry: &ConnectionRegistry, user_id: &str, limit: Duration) {
    let registry = registry.clone();
    let user_id = user_id.to_string();
    wait_for_within(limit, || {
        let registry = registry.clone();
        let user_id = user_id.clone();
        async move { !registry.is_registered(&user_id).await }
    })
    .await;
}
