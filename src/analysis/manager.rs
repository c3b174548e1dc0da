//! Artifact lifecycle manager
//!
//! Owns the `pending → processing → {completed, failed}` state machine for
//! uploaded crop images. Terminal states are final: re-triggering analysis
//! on a completed record returns the stored result without invoking the
//! classifier, and a failed record stays failed until the image is
//! resubmitted. Status transitions go through the store's guarded update so
//! a concurrent analyze cannot start a duplicate classifier run or clobber
//! a finished result with a stale one.

use super::analytics::{monthly_buckets, summarize, AnalysisQuery, MonthlyBucket, StatusSummary};
use super::types::*;
use crate::access::{can_view, ensure_owner};
use crate::api::{PaginatedResponse, Pagination};
use crate::classifier::ClassifierHandle;
use crate::config::StorageConfig;
use crate::error::{Error, Result};
use crate::profile::{self, UserProfile};
use crate::storage::BinaryStore;
use crate::store::RecordStore;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Instant;

/// Manages the analysis record lifecycle
pub struct AnalysisManager {
    records: Arc<RecordStore<ImageAnalysisRecord>>,
    profiles: Arc<RecordStore<UserProfile>>,
    binaries: Arc<BinaryStore>,
    classifier: Arc<ClassifierHandle>,
    accepted_content_types: Vec<String>,
    max_upload_bytes: usize,
}

impl AnalysisManager {
    pub fn new(
        records: Arc<RecordStore<ImageAnalysisRecord>>,
        profiles: Arc<RecordStore<UserProfile>>,
        binaries: Arc<BinaryStore>,
        classifier: Arc<ClassifierHandle>,
        storage_config: &StorageConfig,
    ) -> Self {
        Self {
            records,
            profiles,
            binaries,
            classifier,
            accepted_content_types: storage_config.accepted_content_types.clone(),
            max_upload_bytes: storage_config.max_upload_bytes,
        }
    }

    /// Accept an uploaded image and create its record in `pending`
    ///
    /// The binary and the record are not written transactionally; if record
    /// creation fails the just-written binary is deleted so neither an
    /// orphaned file nor a dangling record survives.
    pub async fn submit(
        &self,
        owner: &str,
        image: Bytes,
        content_type: &str,
        location_hint: Option<GeoPoint>,
    ) -> Result<ImageAnalysisRecord> {
        if image.is_empty() {
            return Err(Error::Validation("no image supplied".to_string()));
        }
        if image.len() > self.max_upload_bytes {
            return Err(Error::Validation(format!(
                "image exceeds maximum upload size of {} bytes",
                self.max_upload_bytes
            )));
        }
        if !self
            .accepted_content_types
            .iter()
            .any(|t| t == content_type)
        {
            return Err(Error::Validation(format!(
                "unsupported content type '{}'",
                content_type
            )));
        }

        let artifact = self.binaries.save(image, content_type).await?;

        // Location priority: explicit coordinates, then the owner's profile
        // default, then none.
        let location = match location_hint.filter(|loc| !loc.is_zero()) {
            Some(loc) => Some(loc),
            None => profile::default_location(&self.profiles, owner).await,
        };

        let now = now_millis();
        let record = ImageAnalysisRecord {
            id: format!("img-{}", uuid::Uuid::new_v4()),
            owner: owner.to_string(),
            artifact: artifact.clone(),
            status: AnalysisStatus::Pending,
            result: None,
            error_detail: None,
            processing_duration_seconds: None,
            visibility: Visibility::Private,
            shared_with: Vec::new(),
            feedback: None,
            location,
            created_at: now,
            updated_at: now,
        };

        match self.records.create(record).await {
            Ok(record) => {
                tracing::info!(record_id = %record.id, owner = %owner, "Accepted image upload");
                Ok(record)
            }
            Err(e) => {
                // Don't leak the binary if the record never existed
                if let Err(cleanup) = self.binaries.delete(&artifact.path).await {
                    tracing::warn!("Failed to clean up orphaned upload: {}", cleanup);
                }
                Err(e)
            }
        }
    }

    /// Run the classifier over a pending record
    ///
    /// Idempotent on terminal states: a completed record returns its stored
    /// result without re-invoking the classifier, and a failed record stays
    /// failed. Classifier failure (including timeout) is persisted as a
    /// durable `failed` status with an error detail, then returned to the
    /// caller.
    pub async fn analyze(&self, owner: &str, id: &str) -> Result<ImageAnalysisRecord> {
        let record = self.find_owned(owner, id).await?;

        if record.status.is_terminal() {
            tracing::debug!(record_id = %id, status = %record.status, "Analyze on terminal record is a no-op");
            return Ok(record);
        }

        // Guarded pending → processing; a rejected guard means another
        // analyze call already holds the record.
        let claimed = self
            .records
            .update_if(
                id,
                |r| r.status == AnalysisStatus::Pending,
                |r| {
                    r.status = AnalysisStatus::Processing;
                    r.updated_at = now_millis();
                },
            )
            .await?;
        let Some(claimed) = claimed else {
            return Err(Error::Validation(format!(
                "analysis {} is already in progress",
                id
            )));
        };

        tracing::info!(record_id = %id, "Starting classification");
        let started = Instant::now();

        match self.classifier.classify(&claimed.artifact.path).await {
            Ok(analysis) => {
                let duration = started.elapsed().as_secs_f64();
                let completed = self
                    .records
                    .update_if(
                        id,
                        |r| r.status == AnalysisStatus::Processing,
                        |r| {
                            r.status = AnalysisStatus::Completed;
                            r.result = Some(analysis);
                            r.error_detail = None;
                            r.processing_duration_seconds = Some(duration);
                            r.updated_at = now_millis();
                        },
                    )
                    .await?;
                match completed {
                    Some(record) => Ok(record),
                    // Lost the race to another writer; return what's stored
                    None => self.find_owned(owner, id).await,
                }
            }
            Err(e) => {
                tracing::warn!(record_id = %id, "Classification failed: {}", e);
                self.records
                    .update_if(
                        id,
                        |r| r.status == AnalysisStatus::Processing,
                        |r| {
                            r.status = AnalysisStatus::Failed;
                            r.error_detail = Some(e.to_string());
                            r.updated_at = now_millis();
                        },
                    )
                    .await?;
                Err(e)
            }
        }
    }

    /// Attach owner feedback; never touches `status`
    pub async fn add_feedback(
        &self,
        owner: &str,
        id: &str,
        request: FeedbackRequest,
    ) -> Result<ImageAnalysisRecord> {
        if !(1..=5).contains(&request.rating) {
            return Err(Error::Validation("rating must be between 1 and 5".to_string()));
        }
        self.find_owned(owner, id).await?;

        let feedback = Feedback {
            rating: request.rating,
            comment: request.comment,
            correction: request.correction,
            submitted_at: now_millis(),
        };
        self.records
            .update_by_id(id, |r| {
                r.feedback = Some(feedback);
                r.updated_at = now_millis();
            })
            .await
    }

    /// Elevate visibility and/or grant additional viewers; owner only
    pub async fn share(
        &self,
        owner: &str,
        id: &str,
        request: ShareRequest,
    ) -> Result<ImageAnalysisRecord> {
        self.find_owned(owner, id).await?;

        self.records
            .update_by_id(id, |r| {
                if request.make_public {
                    r.visibility = Visibility::Public;
                }
                for grantee in request.grant {
                    if !r.shared_with.contains(&grantee) {
                        r.shared_with.push(grantee);
                    }
                }
                r.updated_at = now_millis();
            })
            .await
    }

    /// Visibility-checked read: owner, granted viewer, or public
    pub async fn get(&self, identity: &str, id: &str) -> Result<ImageAnalysisRecord> {
        let record = self
            .records
            .find_by_id(id)
            .await
            .ok_or_else(|| Error::NotFound(format!("analysis {} not found", id)))?;

        if !can_view(identity, &record) {
            return Err(Error::NotFound(format!("analysis {} not found", id)));
        }
        Ok(record)
    }

    /// List the caller's records, newest first, optionally filtered by status
    pub async fn list_by_owner(
        &self,
        owner: &str,
        status: Option<AnalysisStatus>,
        page: u64,
        per_page: u64,
    ) -> PaginatedResponse<ImageAnalysisRecord> {
        let pred = |r: &ImageAnalysisRecord| {
            r.owner == owner && status.map_or(true, |s| r.status == s)
        };

        let total = self.records.count(pred).await as u64;
        let data = self
            .records
            .find_many(
                pred,
                |a, b| b.created_at.cmp(&a.created_at),
                (page.saturating_sub(1) * per_page) as usize,
                per_page as usize,
            )
            .await;

        PaginatedResponse {
            data,
            pagination: Pagination::new(page, per_page, total),
        }
    }

    /// Public records with a location inside the radius, nearest first
    pub async fn query_public_near(
        &self,
        center: GeoPoint,
        radius_km: f64,
    ) -> Vec<ImageAnalysisRecord> {
        let mut nearby = self
            .records
            .find_many(
                |r| {
                    r.visibility == Visibility::Public
                        && r.location
                            .map_or(false, |loc| center.distance_km(&loc) <= radius_km)
                },
                |a, b| a.created_at.cmp(&b.created_at),
                0,
                usize::MAX,
            )
            .await;

        nearby.sort_by(|a, b| {
            let da = a.location.map_or(f64::MAX, |loc| center.distance_km(&loc));
            let db = b.location.map_or(f64::MAX, |loc| center.distance_km(&loc));
            da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
        });
        nearby
    }

    /// Delete a record and its backing binary; owner only
    pub async fn delete(&self, owner: &str, id: &str) -> Result<()> {
        let record = self.find_owned(owner, id).await?;

        self.records.delete_by_id(id).await;
        self.binaries.delete(&record.artifact.path).await?;
        tracing::info!(record_id = %id, "Deleted analysis record and binary");
        Ok(())
    }

    /// Per-month upload counts and average scores for the caller's records
    pub async fn monthly_summary(
        &self,
        owner: &str,
        from: Option<u64>,
        to: Option<u64>,
    ) -> Vec<MonthlyBucket> {
        let records = self.query_records(owner, from, to).await;
        monthly_buckets(&records)
    }

    /// Status breakdown and overall average score for the caller's records
    pub async fn status_summary(
        &self,
        owner: &str,
        from: Option<u64>,
        to: Option<u64>,
    ) -> StatusSummary {
        let records = self.query_records(owner, from, to).await;
        summarize(&records)
    }

    async fn query_records(
        &self,
        owner: &str,
        from: Option<u64>,
        to: Option<u64>,
    ) -> Vec<ImageAnalysisRecord> {
        let query = AnalysisQuery::for_owner(owner).from(from).to(to);
        self.records
            .find_many(
                |r| query.matches(r),
                |a, b| a.created_at.cmp(&b.created_at),
                0,
                usize::MAX,
            )
            .await
    }

    async fn find_owned(&self, owner: &str, id: &str) -> Result<ImageAnalysisRecord> {
        let record = self
            .records
            .find_by_id(id)
            .await
            .ok_or_else(|| Error::NotFound(format!("analysis {} not found", id)))?;
        ensure_owner(owner, &record, "analysis", id)?;
        Ok(record)
    }
}

fn now_millis() -> u64 {
    chrono::Utc::now().timestamp_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{CropAnalysis, CropClassifier, CropCondition};
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    struct FixedClassifier {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl CropClassifier for FixedClassifier {
        async fn classify(&self, _image: &Path) -> Result<CropAnalysis> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(Error::Capability("model unavailable".to_string()));
            }
            Ok(CropAnalysis {
                condition: CropCondition::Fair,
                score: 72,
                issues: vec!["mild deficiency".to_string()],
                recommendations: vec!["apply NPK".to_string()],
            })
        }
    }

    struct Fixture {
        manager: AnalysisManager,
        profiles: Arc<RecordStore<UserProfile>>,
        calls: Arc<AtomicUsize>,
        _dir: TempDir,
    }

    async fn make_fixture(fail: bool) -> Fixture {
        let dir = TempDir::new().unwrap();
        let records = Arc::new(
            RecordStore::open(dir.path().join("analyses")).await.unwrap(),
        );
        let profiles = Arc::new(
            RecordStore::open(dir.path().join("profiles")).await.unwrap(),
        );
        let binaries = Arc::new(BinaryStore::new(dir.path()).await.unwrap());
        let calls = Arc::new(AtomicUsize::new(0));
        let classifier = Arc::new(ClassifierHandle::preloaded(
            Arc::new(FixedClassifier {
                calls: calls.clone(),
                fail,
            }),
            Duration::from_secs(5),
        ));
        let storage_config = StorageConfig {
            base_dir: dir.path().to_path_buf(),
            ..Default::default()
        };

        let manager = AnalysisManager::new(
            records,
            profiles.clone(),
            binaries,
            classifier,
            &storage_config,
        );

        Fixture {
            manager,
            profiles,
            calls,
            _dir: dir,
        }
    }

    fn jpeg() -> Bytes {
        Bytes::from_static(b"fake jpeg bytes")
    }

    #[tokio::test]
    async fn test_submit_creates_pending_record() {
        let fx = make_fixture(false).await;
        let record = fx
            .manager
            .submit("farmer-1", jpeg(), "image/jpeg", None)
            .await
            .unwrap();

        assert_eq!(record.status, AnalysisStatus::Pending);
        assert!(record.result.is_none());
        assert!(record.error_detail.is_none());
        assert_eq!(record.owner, "farmer-1");
        assert_eq!(record.visibility, Visibility::Private);
        assert!(record.artifact.path.exists());
    }

    #[tokio::test]
    async fn test_submit_validation() {
        let fx = make_fixture(false).await;

        let err = fx
            .manager
            .submit("farmer-1", Bytes::new(), "image/jpeg", None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let err = fx
            .manager
            .submit("farmer-1", jpeg(), "application/pdf", None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_submit_location_priority() {
        let fx = make_fixture(false).await;
        let profile_loc = GeoPoint { lat: -1.28, lon: 36.82 };
        fx.profiles
            .create(UserProfile {
                id: "farmer-1".to_string(),
                location: Some(profile_loc),
                updated_at: 0,
            })
            .await
            .unwrap();

        // Explicit hint wins
        let hint = GeoPoint { lat: 5.0, lon: 5.0 };
        let record = fx
            .manager
            .submit("farmer-1", jpeg(), "image/jpeg", Some(hint))
            .await
            .unwrap();
        assert_eq!(record.location, Some(hint));

        // No hint falls back to profile
        let record = fx
            .manager
            .submit("farmer-1", jpeg(), "image/jpeg", None)
            .await
            .unwrap();
        assert_eq!(record.location, Some(profile_loc));

        // Zero hint is treated as absent
        let record = fx
            .manager
            .submit(
                "farmer-1",
                jpeg(),
                "image/jpeg",
                Some(GeoPoint { lat: 0.0, lon: 0.0 }),
            )
            .await
            .unwrap();
        assert_eq!(record.location, Some(profile_loc));

        // No hint, no profile: none
        let record = fx
            .manager
            .submit("farmer-2", jpeg(), "image/jpeg", None)
            .await
            .unwrap();
        assert!(record.location.is_none());
    }

    #[tokio::test]
    async fn test_analyze_completes_record() {
        let fx = make_fixture(false).await;
        let record = fx
            .manager
            .submit("farmer-1", jpeg(), "image/jpeg", None)
            .await
            .unwrap();

        let analyzed = fx.manager.analyze("farmer-1", &record.id).await.unwrap();
        assert_eq!(analyzed.status, AnalysisStatus::Completed);
        assert_eq!(analyzed.result.as_ref().unwrap().score, 72);
        assert!(analyzed.error_detail.is_none());
        assert!(analyzed.processing_duration_seconds.is_some());
        assert_eq!(fx.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_analyze_idempotent_on_completed() {
        let fx = make_fixture(false).await;
        let record = fx
            .manager
            .submit("farmer-1", jpeg(), "image/jpeg", None)
            .await
            .unwrap();

        let first = fx.manager.analyze("farmer-1", &record.id).await.unwrap();
        let second = fx.manager.analyze("farmer-1", &record.id).await.unwrap();

        assert_eq!(second.status, AnalysisStatus::Completed);
        assert_eq!(first.result, second.result);
        // Classifier not re-invoked
        assert_eq!(fx.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_analyze_failure_is_durable() {
        let fx = make_fixture(true).await;
        let record = fx
            .manager
            .submit("farmer-1", jpeg(), "image/jpeg", None)
            .await
            .unwrap();

        let err = fx.manager.analyze("farmer-1", &record.id).await.unwrap_err();
        assert!(matches!(err, Error::Capability(_)));

        let stored = fx.manager.get("farmer-1", &record.id).await.unwrap();
        assert_eq!(stored.status, AnalysisStatus::Failed);
        assert!(!stored.error_detail.as_deref().unwrap().is_empty());
        assert!(stored.result.is_none());

        // No automatic retry: a second analyze is a no-op on the failed record
        let again = fx.manager.analyze("farmer-1", &record.id).await.unwrap();
        assert_eq!(again.status, AnalysisStatus::Failed);
        assert_eq!(fx.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_analyze_unowned_record_not_found() {
        let fx = make_fixture(false).await;
        let record = fx
            .manager
            .submit("farmer-1", jpeg(), "image/jpeg", None)
            .await
            .unwrap();

        let err = fx.manager.analyze("farmer-2", &record.id).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert_eq!(fx.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_feedback_does_not_touch_status() {
        let fx = make_fixture(false).await;
        let record = fx
            .manager
            .submit("farmer-1", jpeg(), "image/jpeg", None)
            .await
            .unwrap();

        let updated = fx
            .manager
            .add_feedback(
                "farmer-1",
                &record.id,
                FeedbackRequest {
                    rating: 4,
                    comment: Some("close enough".to_string()),
                    correction: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.status, AnalysisStatus::Pending);
        assert_eq!(updated.feedback.as_ref().unwrap().rating, 4);

        let err = fx
            .manager
            .add_feedback(
                "farmer-1",
                &record.id,
                FeedbackRequest {
                    rating: 0,
                    comment: None,
                    correction: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_visibility_matrix() {
        let fx = make_fixture(false).await;
        let record = fx
            .manager
            .submit("farmer-1", jpeg(), "image/jpeg", None)
            .await
            .unwrap();

        // Private: second user sees not-found
        let err = fx.manager.get("farmer-2", &record.id).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        // Granted viewer can read
        fx.manager
            .share(
                "farmer-1",
                &record.id,
                ShareRequest {
                    make_public: false,
                    grant: vec!["farmer-2".to_string()],
                },
            )
            .await
            .unwrap();
        assert!(fx.manager.get("farmer-2", &record.id).await.is_ok());
        // But not others
        assert!(fx.manager.get("farmer-3", &record.id).await.is_err());

        // Public: anyone can read
        fx.manager
            .share(
                "farmer-1",
                &record.id,
                ShareRequest {
                    make_public: true,
                    grant: vec![],
                },
            )
            .await
            .unwrap();
        assert!(fx.manager.get("farmer-3", &record.id).await.is_ok());

        // Only the owner may share
        let err = fx
            .manager
            .share(
                "farmer-3",
                &record.id,
                ShareRequest {
                    make_public: true,
                    grant: vec!["farmer-4".to_string()],
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_removes_binary() {
        let fx = make_fixture(false).await;
        let record = fx
            .manager
            .submit("farmer-1", jpeg(), "image/jpeg", None)
            .await
            .unwrap();
        let path = record.artifact.path.clone();
        assert!(path.exists());

        fx.manager.delete("farmer-1", &record.id).await.unwrap();
        assert!(!path.exists());

        let err = fx.manager.get("farmer-1", &record.id).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_requires_ownership() {
        let fx = make_fixture(false).await;
        let record = fx
            .manager
            .submit("farmer-1", jpeg(), "image/jpeg", None)
            .await
            .unwrap();

        let err = fx.manager.delete("farmer-2", &record.id).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert!(record.artifact.path.exists());
    }

    #[tokio::test]
    async fn test_list_by_owner_filtered_and_paginated() {
        let fx = make_fixture(false).await;
        for _ in 0..3 {
            fx.manager
                .submit("farmer-1", jpeg(), "image/jpeg", None)
                .await
                .unwrap();
        }
        let record = fx
            .manager
            .submit("farmer-1", jpeg(), "image/jpeg", None)
            .await
            .unwrap();
        fx.manager.analyze("farmer-1", &record.id).await.unwrap();
        fx.manager
            .submit("farmer-2", jpeg(), "image/jpeg", None)
            .await
            .unwrap();

        let page = fx.manager.list_by_owner("farmer-1", None, 1, 2).await;
        assert_eq!(page.data.len(), 2);
        assert_eq!(page.pagination.total, 4);
        assert_eq!(page.pagination.total_pages, 2);

        let completed = fx
            .manager
            .list_by_owner("farmer-1", Some(AnalysisStatus::Completed), 1, 20)
            .await;
        assert_eq!(completed.data.len(), 1);
        assert_eq!(completed.data[0].id, record.id);
    }

    #[tokio::test]
    async fn test_query_public_near() {
        let fx = make_fixture(false).await;
        let nairobi = GeoPoint { lat: -1.286, lon: 36.817 };
        let nearby_loc = GeoPoint { lat: -1.30, lon: 36.80 };
        let mombasa = GeoPoint { lat: -4.043, lon: 39.668 };

        let near = fx
            .manager
            .submit("farmer-1", jpeg(), "image/jpeg", Some(nearby_loc))
            .await
            .unwrap();
        let far = fx
            .manager
            .submit("farmer-1", jpeg(), "image/jpeg", Some(mombasa))
            .await
            .unwrap();
        for id in [&near.id, &far.id] {
            fx.manager
                .share(
                    "farmer-1",
                    id,
                    ShareRequest {
                        make_public: true,
                        grant: vec![],
                    },
                )
                .await
                .unwrap();
        }
        // Private record near the center must not appear
        fx.manager
            .submit("farmer-1", jpeg(), "image/jpeg", Some(nearby_loc))
            .await
            .unwrap();

        let results = fx.manager.query_public_near(nairobi, 50.0).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, near.id);
    }
}
