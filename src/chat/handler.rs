//! HTTP handlers for the chat API
//!
//! - POST   /api/v1/chat/message            — send a message (provider or fallback reply)
//! - GET    /api/v1/chat/sessions           — list the caller's sessions
//! - GET    /api/v1/chat/sessions/:id       — session detail with messages
//! - PUT    /api/v1/chat/sessions/:id/title — rename a session
//! - DELETE /api/v1/chat/sessions/:id       — delete a session

use super::manager::ChatManager;
use super::types::*;
use crate::api::Identity;
use crate::error::Result;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use std::sync::Arc;

/// Shared state for chat handlers
#[derive(Clone)]
pub struct ChatState {
    pub manager: Arc<ChatManager>,
}

/// Create the chat router with all REST endpoints
pub fn chat_router(state: ChatState) -> Router {
    Router::new()
        .route("/api/v1/chat/message", post(send_message))
        .route("/api/v1/chat/sessions", get(list_sessions))
        .route(
            "/api/v1/chat/sessions/:id",
            get(get_session).delete(delete_session),
        )
        .route("/api/v1/chat/sessions/:id/title", put(rename_session))
        .with_state(state)
}

/// POST /api/v1/chat/message
async fn send_message(
    State(state): State<ChatState>,
    Identity(user): Identity,
    Json(request): Json<SendMessageRequest>,
) -> Result<Json<SendMessageResponse>> {
    let response = state
        .manager
        .send_message(
            &user,
            request.session_id.as_deref(),
            &request.text,
            &request.language,
            request.create_if_absent,
        )
        .await?;
    Ok(Json(response))
}

/// GET /api/v1/chat/sessions
async fn list_sessions(
    State(state): State<ChatState>,
    Identity(user): Identity,
) -> Json<Vec<SessionSummary>> {
    Json(state.manager.list_sessions(&user).await)
}

/// GET /api/v1/chat/sessions/:id
async fn get_session(
    State(state): State<ChatState>,
    Identity(user): Identity,
    Path(id): Path<String>,
) -> Result<Json<ChatSession>> {
    Ok(Json(state.manager.get_session(&user, &id).await?))
}

/// DELETE /api/v1/chat/sessions/:id
async fn delete_session(
    State(state): State<ChatState>,
    Identity(user): Identity,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    state.manager.delete_session(&user, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/v1/chat/sessions/:id/title
async fn rename_session(
    State(state): State<ChatState>,
    Identity(user): Identity,
    Path(id): Path<String>,
    Json(request): Json<RenameSessionRequest>,
) -> Result<Json<ChatSession>> {
    Ok(Json(
        state.manager.rename_session(&user, &id, &request.title).await?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChatConfig;
    use crate::store::RecordStore;
    use axum::body::Body;
    use axum::http::Request;
    use tempfile::TempDir;
    use tower::ServiceExt;

    async fn make_app() -> (Router, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(
            RecordStore::open(dir.path().to_path_buf()).await.unwrap(),
        );
        let manager = Arc::new(ChatManager::new(store, None, ChatConfig::default()));
        (chat_router(ChatState { manager }), dir)
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), 1024 * 64)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    fn post_message(user: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/v1/chat/message")
            .header("content-type", "application/json")
            .header("x-user-id", user)
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_send_message_creates_session() {
        let (app, _dir) = make_app().await;

        let resp = app
            .clone()
            .oneshot(post_message(
                "farmer-1",
                serde_json::json!({"text": "aphids on my beans"}),
            ))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["source"], "local");
        let session_id = json["sessionId"].as_str().unwrap();
        assert!(session_id.starts_with("chat-"));

        // Session is fetchable and holds the full turn
        let resp = app
            .oneshot(
                Request::builder()
                    .uri(format!("/api/v1/chat/sessions/{}", session_id))
                    .header("x-user-id", "farmer-1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["messages"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_empty_text_is_bad_request() {
        let (app, _dir) = make_app().await;
        let resp = app
            .oneshot(post_message("farmer-1", serde_json::json!({"text": ""})))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let json = body_json(resp).await;
        assert_eq!(json["error"]["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn test_missing_identity_is_unauthorized() {
        let (app, _dir) = make_app().await;
        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/chat/sessions")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_foreign_session_not_found() {
        let (app, _dir) = make_app().await;

        let resp = app
            .clone()
            .oneshot(post_message("farmer-1", serde_json::json!({"text": "hi"})))
            .await
            .unwrap();
        let session_id = body_json(resp).await["sessionId"]
            .as_str()
            .unwrap()
            .to_string();

        let resp = app
            .oneshot(
                Request::builder()
                    .uri(format!("/api/v1/chat/sessions/{}", session_id))
                    .header("x-user-id", "farmer-2")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_rename_and_delete_session() {
        let (app, _dir) = make_app().await;

        let resp = app
            .clone()
            .oneshot(post_message("farmer-1", serde_json::json!({"text": "hi"})))
            .await
            .unwrap();
        let session_id = body_json(resp).await["sessionId"]
            .as_str()
            .unwrap()
            .to_string();

        let resp = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri(format!("/api/v1/chat/sessions/{}/title", session_id))
                    .header("content-type", "application/json")
                    .header("x-user-id", "farmer-1")
                    .body(Body::from(r#"{"title": "Bean pests"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["title"], "Bean pests");

        let resp = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/api/v1/chat/sessions/{}", session_id))
                    .header("x-user-id", "farmer-1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);

        let resp = app
            .oneshot(
                Request::builder()
                    .uri(format!("/api/v1/chat/sessions/{}", session_id))
                    .header("x-user-id", "farmer-1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_list_sessions_scoped_to_caller() {
        let (app, _dir) = make_app().await;

        app.clone()
            .oneshot(post_message("farmer-1", serde_json::json!({"text": "hi"})))
            .await
            .unwrap();

        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/chat/sessions")
                    .header("x-user-id", "farmer-2")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(body_json(resp).await.as_array().unwrap().is_empty());
    }
}
