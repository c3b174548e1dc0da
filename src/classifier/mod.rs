//! Crop image classifier capability
//!
//! The lifecycle manager only ever talks to the [`CropClassifier`] trait, so
//! the bundled random-score stub can be swapped for a real model backend
//! without touching any analysis code.

pub mod handle;
pub mod stub;

pub use handle::ClassifierHandle;
pub use stub::StubClassifier;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Structured crop-analysis result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CropAnalysis {
    /// Overall crop condition label
    pub condition: CropCondition,
    /// Health score in 0..=100
    pub score: u8,
    /// Detected issues
    pub issues: Vec<String>,
    /// Suggested actions
    pub recommendations: Vec<String>,
}

/// Coarse crop condition bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CropCondition {
    Healthy,
    Fair,
    Stressed,
    Diseased,
}

impl std::fmt::Display for CropCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Fair => write!(f, "fair"),
            Self::Stressed => write!(f, "stressed"),
            Self::Diseased => write!(f, "diseased"),
        }
    }
}

/// Classifier capability consumed by the analysis lifecycle
#[async_trait]
pub trait CropClassifier: Send + Sync {
    /// Classify the image stored at `image`
    async fn classify(&self, image: &Path) -> Result<CropAnalysis>;
}
