//! HTTP handlers for the analysis API
//!
//! - POST   /api/v1/analyses                — upload an image (base64 JSON body)
//! - GET    /api/v1/analyses                — list the caller's records
//! - GET    /api/v1/analyses/nearby         — public records near a point
//! - GET    /api/v1/analyses/stats/monthly  — per-month upload stats
//! - GET    /api/v1/analyses/stats/summary  — status breakdown
//! - GET    /api/v1/analyses/:id            — record detail
//! - DELETE /api/v1/analyses/:id            — delete record and binary
//! - POST   /api/v1/analyses/:id/analyze    — run the classifier
//! - POST   /api/v1/analyses/:id/feedback   — attach feedback
//! - POST   /api/v1/analyses/:id/share      — make public / grant viewers

use super::analytics::{MonthlyBucket, StatusSummary};
use super::manager::AnalysisManager;
use super::types::*;
use crate::api::{Identity, PaginatedResponse};
use crate::error::{Error, Result};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use base64::Engine;
use serde::Deserialize;
use std::sync::Arc;

/// Shared state for analysis handlers
#[derive(Clone)]
pub struct AnalysisState {
    pub manager: Arc<AnalysisManager>,
}

/// Create the analysis router with all REST endpoints
pub fn analysis_router(state: AnalysisState) -> Router {
    Router::new()
        .route("/api/v1/analyses", post(submit).get(list))
        .route("/api/v1/analyses/nearby", get(nearby))
        .route("/api/v1/analyses/stats/monthly", get(stats_monthly))
        .route("/api/v1/analyses/stats/summary", get(stats_summary))
        .route("/api/v1/analyses/:id", get(get_one).delete(delete_one))
        .route("/api/v1/analyses/:id/analyze", post(analyze))
        .route("/api/v1/analyses/:id/feedback", post(feedback))
        .route("/api/v1/analyses/:id/share", post(share))
        .with_state(state)
}

/// POST /api/v1/analyses
async fn submit(
    State(state): State<AnalysisState>,
    Identity(user): Identity,
    Json(request): Json<SubmitAnalysisRequest>,
) -> Result<(StatusCode, Json<ImageAnalysisRecord>)> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(&request.image_data)
        .map_err(|e| Error::Validation(format!("invalid base64 image data: {}", e)))?;

    let record = state
        .manager
        .submit(
            &user,
            bytes.into(),
            &request.content_type,
            request.location,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// POST /api/v1/analyses/:id/analyze
async fn analyze(
    State(state): State<AnalysisState>,
    Identity(user): Identity,
    Path(id): Path<String>,
) -> Result<Json<ImageAnalysisRecord>> {
    Ok(Json(state.manager.analyze(&user, &id).await?))
}

#[derive(Debug, Deserialize)]
struct ListParams {
    status: Option<AnalysisStatus>,
    #[serde(default = "default_page")]
    page: u64,
    #[serde(default = "default_per_page")]
    per_page: u64,
}

fn default_page() -> u64 {
    1
}

fn default_per_page() -> u64 {
    20
}

/// GET /api/v1/analyses
async fn list(
    State(state): State<AnalysisState>,
    Identity(user): Identity,
    Query(params): Query<ListParams>,
) -> Result<Json<PaginatedResponse<ImageAnalysisRecord>>> {
    if params.page == 0 || params.per_page == 0 || params.per_page > 100 {
        return Err(Error::Validation(
            "page must be >= 1 and perPage in 1..=100".to_string(),
        ));
    }
    Ok(Json(
        state
            .manager
            .list_by_owner(&user, params.status, params.page, params.per_page)
            .await,
    ))
}

/// GET /api/v1/analyses/:id
async fn get_one(
    State(state): State<AnalysisState>,
    Identity(user): Identity,
    Path(id): Path<String>,
) -> Result<Json<ImageAnalysisRecord>> {
    Ok(Json(state.manager.get(&user, &id).await?))
}

/// DELETE /api/v1/analyses/:id
async fn delete_one(
    State(state): State<AnalysisState>,
    Identity(user): Identity,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    state.manager.delete(&user, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/analyses/:id/feedback
async fn feedback(
    State(state): State<AnalysisState>,
    Identity(user): Identity,
    Path(id): Path<String>,
    Json(request): Json<FeedbackRequest>,
) -> Result<Json<ImageAnalysisRecord>> {
    Ok(Json(state.manager.add_feedback(&user, &id, request).await?))
}

/// POST /api/v1/analyses/:id/share
async fn share(
    State(state): State<AnalysisState>,
    Identity(user): Identity,
    Path(id): Path<String>,
    Json(request): Json<ShareRequest>,
) -> Result<Json<ImageAnalysisRecord>> {
    Ok(Json(state.manager.share(&user, &id, request).await?))
}

#[derive(Debug, Deserialize)]
struct NearbyParams {
    lat: f64,
    lon: f64,
    #[serde(default = "default_radius_km")]
    radius_km: f64,
}

fn default_radius_km() -> f64 {
    50.0
}

/// GET /api/v1/analyses/nearby
async fn nearby(
    State(state): State<AnalysisState>,
    Identity(_user): Identity,
    Query(params): Query<NearbyParams>,
) -> Result<Json<Vec<ImageAnalysisRecord>>> {
    if !(-90.0..=90.0).contains(&params.lat) || !(-180.0..=180.0).contains(&params.lon) {
        return Err(Error::Validation("invalid coordinates".to_string()));
    }
    if params.radius_km <= 0.0 || params.radius_km > 1000.0 {
        return Err(Error::Validation(
            "radiusKm must be in (0, 1000]".to_string(),
        ));
    }
    let center = GeoPoint {
        lat: params.lat,
        lon: params.lon,
    };
    Ok(Json(
        state.manager.query_public_near(center, params.radius_km).await,
    ))
}

#[derive(Debug, Deserialize)]
struct StatsParams {
    from: Option<u64>,
    to: Option<u64>,
}

/// GET /api/v1/analyses/stats/monthly
async fn stats_monthly(
    State(state): State<AnalysisState>,
    Identity(user): Identity,
    Query(params): Query<StatsParams>,
) -> Json<Vec<MonthlyBucket>> {
    Json(
        state
            .manager
            .monthly_summary(&user, params.from, params.to)
            .await,
    )
}

/// GET /api/v1/analyses/stats/summary
async fn stats_summary(
    State(state): State<AnalysisState>,
    Identity(user): Identity,
    Query(params): Query<StatsParams>,
) -> Json<StatusSummary> {
    Json(
        state
            .manager
            .status_summary(&user, params.from, params.to)
            .await,
    )
}
