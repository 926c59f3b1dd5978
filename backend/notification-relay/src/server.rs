use actix_cors::Cors;
use actix_web::{dev::Server, middleware, web, App, HttpServer};
use std::net::TcpListener;

use crate::handlers::{register_relay, register_websocket};
use crate::metrics;
use crate::state::AppState;

/// Build the relay HTTP server on an already-bound listener
///
/// The caller drives the returned `Server` and keeps its handle for shutdown.
pub fn run(listener: TcpListener, state: AppState) -> std::io::Result<Server> {
    let workers = state.config.app.workers;

    let mut server = HttpServer::new(move || {
        // Relay accepts connections from any origin
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(web::Data::new(state.clone()))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(metrics::MetricsMiddleware)
            .route("/health", web::get().to(|| async { "OK" }))
            .route("/metrics", web::get().to(metrics::serve_metrics))
            .route("/", web::get().to(|| async { "Notification Relay v1.0" }))
            .configure(|cfg| {
                register_websocket(cfg);
                register_relay(cfg);
            })
    });

    if let Some(workers) = workers {
        server = server.workers(workers);
    }

    Ok(server.listen(listener)?.run())
}
