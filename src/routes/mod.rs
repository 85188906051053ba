//! Router assembly: HTTP endpoints, WebSocket upgrade, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;
pub mod ws;

/// Build the application router with:
/// - WebSocket at `/ws` (one private wizard session per connection)
/// - REST-ish API under `/api/v1/...`
/// - CORS (allow any origin/method/headers), adjust for production if needed
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // WebSocket
        .route("/ws", get(ws::ws_upgrade))
        // HTTP API
        .route("/api/v1/health", get(http::http_health))
        .route("/api/v1/challenge-kinds", get(http::http_challenge_kinds))
        .route("/api/v1/companies", get(http::http_companies))
        .route("/api/v1/wizard", post(http::http_open_session))
        .route(
            "/api/v1/wizard/:id",
            get(http::http_get_session).delete(http::http_discard_session),
        )
        .route("/api/v1/wizard/:id/actions", post(http::http_post_action))
        .route("/api/v1/wizard/:id/submit", post(http::http_post_submit))
        .route("/api/v1/wizard/:id/review", get(http::http_get_review))
        .route("/api/v1/wizard/:id/invite-code", post(http::http_post_invite_code))
        .route("/api/v1/wizard/:id/preview", get(http::http_get_preview))
        // State + CORS + HTTP tracing
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::collab::{DataUriRenderer, LogSink, TracingNotifier};
    use crate::config::WizardConfig;

    fn app() -> Router {
        let state = AppState::with_parts(
            WizardConfig::default(),
            Arc::new(TracingNotifier),
            Arc::new(LogSink),
            Arc::new(DataUriRenderer),
        );
        build_router(Arc::new(state))
    }

    async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let req = Request::builder().method(method).uri(uri);
        let req = match body {
            Some(b) => req
                .header("content-type", "application/json")
                .body(Body::from(b.to_string()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, value)
    }

    #[tokio::test]
    async fn health_and_catalogs() {
        let app = app();
        let (status, body) = call(&app, Method::GET, "/api/v1/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
        let (_, kinds) = call(&app, Method::GET, "/api/v1/challenge-kinds", None).await;
        assert_eq!(kinds.as_array().map(Vec::len), Some(6));
        let (_, companies) = call(&app, Method::GET, "/api/v1/companies", None).await;
        assert_eq!(companies["companies"][0], "Puma");
    }

    #[tokio::test]
    async fn wizard_round_trip_over_http() {
        let app = app();
        let (status, view) = call(&app, Method::POST, "/api/v1/wizard", None).await;
        assert_eq!(status, StatusCode::CREATED);
        let id = view["session_id"].as_str().unwrap().to_string();
        let actions = format!("/api/v1/wizard/{id}/actions");

        // Submitting early is a conflict.
        let (status, _) = call(&app, Method::POST, &format!("/api/v1/wizard/{id}/submit"), None).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, view) = call(
            &app,
            Method::POST,
            &actions,
            Some(json!({ "action": "update", "name": "Spring Sale", "kind": "Spin the Wheel" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["draft"]["name"], "Spring Sale");
        assert_eq!(view["active_rewards"]["kind"], "Spin the Wheel");

        for _ in 0..3 {
            call(&app, Method::POST, &actions, Some(json!({ "action": "advance" }))).await;
        }
        let (_, view) = call(&app, Method::GET, &format!("/api/v1/wizard/{id}"), None).await;
        assert_eq!(view["step"], 3);
        assert_eq!(view["can_submit"], true);

        let (status, out) = call(&app, Method::POST, &format!("/api/v1/wizard/{id}/submit"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(out["record"]["name"], "Spring Sale");
        assert_eq!(out["record"]["kind"], "Spin the Wheel");
        assert_eq!(out["notifications"][0]["title"], "Challenge Created!");
        assert_eq!(out["view"]["step"], 0);

        let (status, _) = call(&app, Method::DELETE, &format!("/api/v1/wizard/{id}"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = call(&app, Method::GET, &format!("/api/v1/wizard/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn validation_failure_maps_to_422_with_notice() {
        let app = app();
        let (_, view) = call(&app, Method::POST, "/api/v1/wizard", None).await;
        let id = view["session_id"].as_str().unwrap().to_string();
        for _ in 0..3 {
            call(&app, Method::POST, &format!("/api/v1/wizard/{id}/actions"), Some(json!({ "action": "advance" }))).await;
        }
        let (status, body) = call(&app, Method::POST, &format!("/api/v1/wizard/{id}/submit"), None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["notifications"][0]["title"], "Missing Information");
        assert_eq!(body["notifications"][0]["severity"], "destructive");
    }

    #[tokio::test]
    async fn incompatible_reward_action_is_conflict() {
        let app = app();
        let (_, view) = call(&app, Method::POST, "/api/v1/wizard", None).await;
        let id = view["session_id"].as_str().unwrap().to_string();
        let (status, body) = call(
            &app,
            Method::POST,
            &format!("/api/v1/wizard/{id}/actions"),
            Some(json!({ "action": "set_slot_machine", "points": 10 })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body["error"].as_str().unwrap().contains("Slot Machine"));
    }

    #[tokio::test]
    async fn out_of_range_quiz_answer_is_unprocessable() {
        let app = app();
        let (_, view) = call(&app, Method::POST, "/api/v1/wizard", None).await;
        let id = view["session_id"].as_str().unwrap().to_string();
        let rewards = json!({ "kind": "Quiz Challenge", "config": [{ "id": uuid::Uuid::new_v4(), "item": {
            "question": "Q?", "choices": ["a", "b", "c", "d"], "correct_answer": 9, "points": 1
        } }] });
        let (status, body) = call(
            &app,
            Method::POST,
            &format!("/api/v1/wizard/{id}/actions"),
            Some(json!({ "action": "replace_rewards", "rewards": rewards })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["error"].as_str().unwrap().contains("answer index 9"));
    }

    #[tokio::test]
    async fn invite_code_and_unknown_session() {
        let app = app();
        let (_, view) = call(&app, Method::POST, "/api/v1/wizard", None).await;
        let id = view["session_id"].as_str().unwrap().to_string();
        let (status, _) = call(&app, Method::POST, &format!("/api/v1/wizard/{id}/invite-code"), None).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        call(&app, Method::POST, &format!("/api/v1/wizard/{id}/actions"), Some(json!({ "action": "generate_invite_link" }))).await;
        let (status, out) = call(&app, Method::POST, &format!("/api/v1/wizard/{id}/invite-code"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(out["code"]["data_uri"].as_str().unwrap().starts_with("data:text/plain;base64,"));

        let missing = uuid::Uuid::new_v4();
        let (status, _) = call(&app, Method::GET, &format!("/api/v1/wizard/{missing}/review"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
