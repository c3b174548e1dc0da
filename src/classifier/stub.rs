//! Random-score stub classifier
//!
//! Stands in for a real image-classification model. Scores are drawn
//! uniformly and the condition/issues/recommendations follow from the score
//! bucket, so downstream code sees a structurally realistic payload.

use super::{CropAnalysis, CropClassifier, CropCondition};
use crate::error::{Error, Result};
use async_trait::async_trait;
use rand::Rng;
use std::path::Path;

/// Stub classifier producing random but well-formed results
pub struct StubClassifier;

impl StubClassifier {
    pub fn new() -> Self {
        Self
    }

    fn analysis_for_score(score: u8) -> CropAnalysis {
        let (condition, issues, recommendations) = match score {
            80..=100 => (
                CropCondition::Healthy,
                vec![],
                vec!["Maintain the current irrigation and fertilization schedule".to_string()],
            ),
            60..=79 => (
                CropCondition::Fair,
                vec!["Mild nutrient deficiency visible on older leaves".to_string()],
                vec![
                    "Apply a balanced NPK fertilizer".to_string(),
                    "Re-check the field in 7 days".to_string(),
                ],
            ),
            40..=59 => (
                CropCondition::Stressed,
                vec![
                    "Leaf discoloration consistent with water stress".to_string(),
                    "Possible early pest activity".to_string(),
                ],
                vec![
                    "Increase irrigation frequency".to_string(),
                    "Scout for pests on the underside of leaves".to_string(),
                ],
            ),
            _ => (
                CropCondition::Diseased,
                vec![
                    "Lesions consistent with fungal infection".to_string(),
                    "Significant canopy damage".to_string(),
                ],
                vec![
                    "Isolate affected plants".to_string(),
                    "Apply an appropriate fungicide".to_string(),
                    "Consult a local extension officer".to_string(),
                ],
            ),
        };

        CropAnalysis {
            condition,
            score,
            issues,
            recommendations,
        }
    }
}

impl Default for StubClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CropClassifier for StubClassifier {
    async fn classify(&self, image: &Path) -> Result<CropAnalysis> {
        // The stub still requires the artifact to exist, matching the
        // contract a real model backend would have.
        if !tokio::fs::try_exists(image).await.unwrap_or(false) {
            return Err(Error::Capability(format!(
                "image {} does not exist",
                image.display()
            )));
        }

        let score = rand::thread_rng().gen_range(30..=95);
        Ok(Self::analysis_for_score(score))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_classify_existing_image() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("leaf.jpg");
        std::fs::write(&path, b"fake").unwrap();

        let classifier = StubClassifier::new();
        let analysis = classifier.classify(&path).await.unwrap();
        assert!((30..=95).contains(&analysis.score));
        assert!(!analysis.recommendations.is_empty());
    }

    #[tokio::test]
    async fn test_classify_missing_image_fails() {
        let classifier = StubClassifier::new();
        let err = classifier
            .classify(Path::new("/nonexistent/leaf.jpg"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Capability(_)));
    }

    #[test]
    fn test_score_buckets() {
        assert_eq!(
            StubClassifier::analysis_for_score(90).condition,
            CropCondition::Healthy
        );
        assert_eq!(
            StubClassifier::analysis_for_score(70).condition,
            CropCondition::Fair
        );
        assert_eq!(
            StubClassifier::analysis_for_score(50).condition,
            CropCondition::Stressed
        );
        assert_eq!(
            StubClassifier::analysis_for_score(30).condition,
            CropCondition::Diseased
        );
        assert!(StubClassifier::analysis_for_score(90).issues.is_empty());
        assert!(!StubClassifier::analysis_for_score(30).issues.is_empty());
    }
}
