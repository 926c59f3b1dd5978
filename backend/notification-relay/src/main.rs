use anyhow::Context;
use notification_relay::{logging, server, AppError, AppState, Config};
use std::net::TcpListener;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    logging::init_tracing();

    let config = Config::from_env().context("loading relay configuration")?;
    let bind_addr = config.bind_addr();

    tracing::info!(
        %bind_addr,
        heartbeat_secs = config.relay.heartbeat_interval.as_secs(),
        client_timeout_secs = config.relay.client_timeout.as_secs(),
        "starting notification relay"
    );

    let state = AppState::new(config);
    let registry = state.registry.clone();

    let listener = TcpListener::bind(&bind_addr)
        .map_err(|e| AppError::StartServer(format!("binding {bind_addr}: {e}")))?;

    // actix installs SIGINT/SIGTERM handlers and resolves after a graceful stop
    server::run(listener, state)
        .map_err(|e| AppError::StartServer(e.to_string()))?
        .await
        .map_err(|e| AppError::StartServer(e.to_string()))?;

    let dropped = registry.clear_all().await;
    tracing::info!(dropped_registrations = dropped, "notification relay stopped");

    Ok(())
}
