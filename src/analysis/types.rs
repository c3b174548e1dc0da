//! Record and wire types for crop image analysis
//!
//! All wire types use camelCase JSON serialization.

use crate::access::{Owned, Shared};
use crate::classifier::CropAnalysis;
use crate::storage::StoredBinary;
use crate::store::StoredRecord;
use serde::{Deserialize, Serialize};

/// Analysis lifecycle status
///
/// `pending → processing → {completed, failed}`. Completed and failed are
/// terminal: no transition ever leaves them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl AnalysisStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Processing => write!(f, "processing"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Record visibility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Private,
    Public,
}

/// Geographic point (WGS84 degrees)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    /// A (0, 0) location is treated as unset in user profiles
    pub fn is_zero(&self) -> bool {
        self.lat == 0.0 && self.lon == 0.0
    }

    /// Great-circle distance in kilometers
    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        const EARTH_RADIUS_KM: f64 = 6371.0;
        let d_lat = (other.lat - self.lat).to_radians();
        let d_lon = (other.lon - self.lon).to_radians();
        let a = (d_lat / 2.0).sin().powi(2)
            + self.lat.to_radians().cos()
                * other.lat.to_radians().cos()
                * (d_lon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_KM * a.sqrt().atan2((1.0 - a).sqrt())
    }
}

/// User-submitted feedback on a completed or failed analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    /// Rating in 1..=5
    pub rating: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// What the user says the condition actually was
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correction: Option<String>,
    pub submitted_at: u64,
}

/// A tracked crop-image analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageAnalysisRecord {
    pub id: String,
    /// Identity that uploaded the image; immutable
    pub owner: String,
    /// Reference to the stored image binary
    pub artifact: StoredBinary,
    pub status: AnalysisStatus,
    /// Present only when status is `completed`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<CropAnalysis>,
    /// Present only when status is `failed`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
    /// Wall-clock duration of the classifier call, set once on completion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_duration_seconds: Option<f64>,
    pub visibility: Visibility,
    /// Identities granted read access in addition to the owner
    #[serde(default)]
    pub shared_with: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<Feedback>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,
    pub created_at: u64,
    pub updated_at: u64,
}

impl StoredRecord for ImageAnalysisRecord {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Owned for ImageAnalysisRecord {
    fn owner(&self) -> &str {
        &self.owner
    }
}

impl Shared for ImageAnalysisRecord {
    fn grants(&self) -> &[String] {
        &self.shared_with
    }

    fn is_public(&self) -> bool {
        self.visibility == Visibility::Public
    }
}

/// Request body for POST /api/v1/analyses
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAnalysisRequest {
    /// Base64-encoded image bytes
    pub image_data: String,
    pub content_type: String,
    /// Explicit capture location; overrides the profile default
    #[serde(default)]
    pub location: Option<GeoPoint>,
}

/// Request body for POST /api/v1/analyses/:id/feedback
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRequest {
    pub rating: u8,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub correction: Option<String>,
}

/// Request body for POST /api/v1/analyses/:id/share
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareRequest {
    /// Elevate visibility to public
    #[serde(default)]
    pub make_public: bool,
    /// Additional identities to grant read access
    #[serde(default)]
    pub grant: Vec<String>,
}
