/// HTTP endpoints over the connection registry
///
/// Introspection plus a server-side `send` for trusted in-cluster callers.
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;

use crate::error::AppResult;
use crate::metrics;
use crate::relay::Notification;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct NotifyRequest {
    pub title: String,
    pub body: String,
}

/// List registered users
///
/// Endpoint: GET /api/v1/relay/users
pub async fn list_connected_users(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let registrations = state.registry.snapshot().await;

    Ok(HttpResponse::Ok().json(json!({
        "count": registrations.len(),
        "users": registrations,
    })))
}

/// Whether a user currently has a live registration
///
/// Endpoint: GET /api/v1/relay/status/{user_id}
pub async fn user_status(
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> AppResult<HttpResponse> {
    let user_id = path.into_inner();
    let connection_id = state.registry.connection_for(&user_id).await;

    Ok(HttpResponse::Ok().json(json!({
        "user_id": user_id,
        "connected": connection_id.is_some(),
        "connection_id": connection_id,
    })))
}

/// Forward a notification to a user's connection
///
/// Endpoint: POST /api/v1/relay/notify/{user_id}
pub async fn notify_user(
    path: web::Path<String>,
    state: web::Data<AppState>,
    body: web::Json<NotifyRequest>,
) -> AppResult<HttpResponse> {
    let recipient = path.into_inner();
    let NotifyRequest { title, body } = body.into_inner();

    let delivery = state
        .registry
        .send_notification(&recipient, Notification { title, body })
        .await;
    metrics::record_delivery(delivery);

    Ok(HttpResponse::Ok().json(json!({
        "recipient": recipient,
        "delivery": delivery,
    })))
}

pub fn register_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1/relay")
            .route("/users", web::get().to(list_connected_users))
            .route("/status/{user_id}", web::get().to(user_status))
            .route("/notify/{user_id}", web::post().to(notify_user)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::relay::{ConnectionHandle, ServerEvent};
    use actix_web::{test, App};

    fn app_state() -> AppState {
        AppState::new(Config::default())
    }

    #[actix_rt::test]
    async fn test_status_of_unknown_user() {
        let state = app_state();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(register_routes),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/api/v1/relay/status/carol")
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["user_id"], "carol");
        assert_eq!(body["connected"], false);
    }

    #[actix_rt::test]
    async fn test_notify_registered_user() {
        let state = app_state();
        let (handle, mut rx) = ConnectionHandle::channel();
        state.registry.register("bob", handle).await;

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .configure(register_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/relay/notify/bob")
            .set_json(json!({ "title": "Hi", "body": "Hello Bob" }))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["delivery"], "delivered");
        assert_eq!(
            rx.recv().await,
            Some(ServerEvent::receive_notification("Hi", "Hello Bob"))
        );
    }

    #[actix_rt::test]
    async fn test_notify_unreachable_user_is_not_an_error() {
        let state = app_state();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(register_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/relay/notify/carol")
            .set_json(json!({ "title": "Hi", "body": "?" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["delivery"], "unreachable");
    }

    #[actix_rt::test]
    async fn test_list_users() {
        let state = app_state();
        for user in ["bob", "alice"] {
            let (handle, _rx) = ConnectionHandle::channel();
            state.registry.register(user, handle).await;
        }

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(register_routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/v1/relay/users").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["count"], 2);
        assert_eq!(body["users"][0]["user_id"], "alice");
        assert_eq!(body["users"][1]["user_id"], "bob");
    }
}
