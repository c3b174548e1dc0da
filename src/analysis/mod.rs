//! Crop image analysis: upload lifecycle, classification, sharing, analytics

pub mod analytics;
pub mod handler;
pub mod manager;
pub mod types;

pub use handler::{analysis_router, AnalysisState};
pub use manager::AnalysisManager;
pub use types::{AnalysisStatus, GeoPoint, ImageAnalysisRecord, Visibility};
