//! Unified API router for CropSense
//!
//! Merges all module routers into a single axum `Router` with CORS,
//! consistent error handling, and the shared error envelope.
//!
//! ## Endpoint Map
//!
//! | Prefix                  | Module   | Description                            |
//! |-------------------------|----------|----------------------------------------|
//! | `/health`               | api      | Load balancer health probe             |
//! | `/api/v1/analyses/*`    | analysis | Upload, classify, share, analytics     |
//! | `/api/v1/chat/*`        | chat     | Advisory chat sessions                 |
//! | `/api/v1/profile/*`     | profile  | Default farm location                  |

use crate::analysis::{analysis_router, AnalysisState};
use crate::chat::{chat_router, ChatState};
use crate::error::Error;
use crate::profile::{profile_router, ProfileState};
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};

/// Build the complete CropSense HTTP application
///
/// Merges the module routers, adds CORS middleware, and returns a single
/// `Router` ready to be served by `axum::serve`.
pub fn build_app(
    analysis_state: AnalysisState,
    chat_state: ChatState,
    profile_state: ProfileState,
    cors_origins: &[String],
) -> Router {
    let cors = build_cors(cors_origins);

    Router::new()
        .route("/health", get(health_check))
        // Module routers (each defines its own /api/v1/... prefixed routes)
        .merge(analysis_router(analysis_state))
        .merge(chat_router(chat_state))
        .merge(profile_router(profile_state))
        .layer(cors)
}

// =============================================================================
// Identity
// =============================================================================

/// Verified caller identity, taken from the `x-user-id` header
///
/// Upstream auth terminates before this service; a request without the
/// header is rejected with 401.
pub struct Identity(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = parts
            .headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty());

        match user {
            Some(user) => Ok(Identity(user.to_string())),
            None => Err((
                StatusCode::UNAUTHORIZED,
                Json(ApiError::unauthorized("missing x-user-id header")),
            )
                .into_response()),
        }
    }
}

// =============================================================================
// Error envelope
// =============================================================================

/// Error envelope returned by every failing endpoint
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

/// API error detail
#[derive(Debug, Serialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
}

impl ApiError {
    fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.to_string(),
                message: message.into(),
            },
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("BAD_REQUEST", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::new("UPSTREAM_ERROR", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            Error::Validation(msg) => (StatusCode::BAD_REQUEST, ApiError::bad_request(msg.clone())),
            Error::NotFound(msg) => (StatusCode::NOT_FOUND, ApiError::not_found(msg.clone())),
            Error::Capability(msg) => (StatusCode::BAD_GATEWAY, ApiError::upstream(msg.clone())),
            other => {
                tracing::error!("Request failed: {}", other);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiError::internal("internal server error"),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

// =============================================================================
// Pagination
// =============================================================================

/// Pagination metadata attached to list responses
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u64,
    pub per_page: u64,
    pub total: u64,
    pub total_pages: u64,
}

impl Pagination {
    pub fn new(page: u64, per_page: u64, total: u64) -> Self {
        Self {
            page,
            per_page,
            total,
            total_pages: total.div_ceil(per_page.max(1)),
        }
    }
}

/// Standard paginated list envelope
#[derive(Debug, Clone, Serialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub pagination: Pagination,
}

// =============================================================================
// Root handlers
// =============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

fn build_cors(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT]);

    if origins.is_empty() {
        cors.allow_origin(Any)
    } else {
        let parsed: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
        cors.allow_origin(parsed)
    }
}
