//! User profiles
//!
//! Holds each user's default farm location, used as the second tier of the
//! upload location derivation (explicit coordinates → profile default →
//! none).

use crate::analysis::types::GeoPoint;
use crate::api::Identity;
use crate::error::Result;
use crate::store::{RecordStore, StoredRecord};
use axum::{
    extract::State,
    routing::{get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Per-user profile record, keyed by user id
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    /// The user id doubles as the record id
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,
    pub updated_at: u64,
}

impl StoredRecord for UserProfile {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Look up a user's default location, ignoring unset (0, 0) values
pub async fn default_location(
    profiles: &RecordStore<UserProfile>,
    user: &str,
) -> Option<GeoPoint> {
    profiles
        .find_by_id(user)
        .await
        .and_then(|p| p.location)
        .filter(|loc| !loc.is_zero())
}

/// Request body for PUT /api/v1/profile/location
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLocationRequest {
    pub location: Option<GeoPoint>,
}

/// Shared state for profile handlers
#[derive(Clone)]
pub struct ProfileState {
    pub profiles: Arc<RecordStore<UserProfile>>,
}

/// Create the profile router
pub fn profile_router(state: ProfileState) -> Router {
    Router::new()
        .route("/api/v1/profile", get(get_profile))
        .route("/api/v1/profile/location", put(update_location))
        .with_state(state)
}

/// GET /api/v1/profile
async fn get_profile(
    State(state): State<ProfileState>,
    Identity(user): Identity,
) -> Json<UserProfile> {
    let profile = state.profiles.find_by_id(&user).await.unwrap_or(UserProfile {
        id: user,
        location: None,
        updated_at: 0,
    });
    Json(profile)
}

/// PUT /api/v1/profile/location
async fn update_location(
    State(state): State<ProfileState>,
    Identity(user): Identity,
    Json(request): Json<UpdateLocationRequest>,
) -> Result<Json<UserProfile>> {
    let now = chrono::Utc::now().timestamp_millis() as u64;

    let updated = match state.profiles.find_by_id(&user).await {
        Some(_) => {
            state
                .profiles
                .update_by_id(&user, |p| {
                    p.location = request.location;
                    p.updated_at = now;
                })
                .await?
        }
        None => {
            state
                .profiles
                .create(UserProfile {
                    id: user,
                    location: request.location,
                    updated_at: now,
                })
                .await?
        }
    };

    Ok(Json(updated))
}
