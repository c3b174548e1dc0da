//! Lifecycle-managed handle to the classifier capability
//!
//! The model behind the classifier may be expensive to load. The handle
//! defers loading until first use and shares a single in-flight load among
//! concurrent callers via `tokio::sync::OnceCell`, so the model is
//! initialized exactly once no matter how many requests race on startup.

use super::{CropAnalysis, CropClassifier, StubClassifier};
use crate::error::{Error, Result};
use futures::future::BoxFuture;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;

type Loader = Box<dyn Fn() -> BoxFuture<'static, Result<Arc<dyn CropClassifier>>> + Send + Sync>;

/// Lazily-initialized, timeout-bounded classifier handle
pub struct ClassifierHandle {
    cell: OnceCell<Arc<dyn CropClassifier>>,
    loader: Loader,
    timeout: Duration,
}

impl ClassifierHandle {
    /// Create a handle that loads via the given factory on first use
    pub fn new(loader: Loader, timeout: Duration) -> Self {
        Self {
            cell: OnceCell::new(),
            loader,
            timeout,
        }
    }

    /// Handle backed by the random-score stub
    pub fn with_stub(timeout: Duration) -> Self {
        Self::new(
            Box::new(|| {
                Box::pin(async { Ok(Arc::new(StubClassifier::new()) as Arc<dyn CropClassifier>) })
            }),
            timeout,
        )
    }

    /// Handle wrapping an already-constructed classifier (used by tests)
    pub fn preloaded(classifier: Arc<dyn CropClassifier>, timeout: Duration) -> Self {
        Self::new(
            Box::new(move || {
                let classifier = classifier.clone();
                Box::pin(async move { Ok(classifier) })
            }),
            timeout,
        )
    }

    /// Classify an image, loading the classifier first if needed
    ///
    /// A call that exceeds the configured timeout is reported as a
    /// `Capability` error; the lifecycle manager turns that into a durable
    /// `failed` status.
    pub async fn classify(&self, image: &Path) -> Result<CropAnalysis> {
        let classifier = self
            .cell
            .get_or_try_init(|| async {
                tracing::info!("Loading crop classifier");
                (self.loader)().await
            })
            .await?;

        match tokio::time::timeout(self.timeout, classifier.classify(image)).await {
            Ok(result) => result,
            Err(_) => Err(Error::Capability(format!(
                "classifier timed out after {:?}",
                self.timeout
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{CropAnalysis, CropCondition};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingClassifier {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl CropClassifier for CountingClassifier {
        async fn classify(&self, _image: &Path) -> Result<CropAnalysis> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(CropAnalysis {
                condition: CropCondition::Healthy,
                score: 88,
                issues: vec![],
                recommendations: vec![],
            })
        }
    }

    struct SlowClassifier;

    #[async_trait]
    impl CropClassifier for SlowClassifier {
        async fn classify(&self, _image: &Path) -> Result<CropAnalysis> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            unreachable!("timeout should fire first")
        }
    }

    #[tokio::test]
    async fn test_loads_exactly_once_under_concurrency() {
        let loads = Arc::new(AtomicUsize::new(0));
        let loads_in_loader = loads.clone();

        let handle = Arc::new(ClassifierHandle::new(
            Box::new(move || {
                let loads = loads_in_loader.clone();
                Box::pin(async move {
                    loads.fetch_add(1, Ordering::SeqCst);
                    // Simulate a slow model load so concurrent callers overlap
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    Ok(Arc::new(CountingClassifier {
                        calls: Arc::new(AtomicUsize::new(0)),
                    }) as Arc<dyn CropClassifier>)
                })
            }),
            Duration::from_secs(5),
        ));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let handle = handle.clone();
            tasks.push(tokio::spawn(async move {
                handle.classify(Path::new("ignored.jpg")).await
            }));
        }
        for task in tasks {
            assert!(task.await.unwrap().is_ok());
        }

        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_timeout_surfaces_as_capability_error() {
        let handle = ClassifierHandle::preloaded(
            Arc::new(SlowClassifier),
            Duration::from_millis(20),
        );

        let err = handle.classify(Path::new("ignored.jpg")).await.unwrap_err();
        assert!(matches!(err, Error::Capability(_)));
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_preloaded_classifier_is_used() {
        let calls = Arc::new(AtomicUsize::new(0));
        let handle = ClassifierHandle::preloaded(
            Arc::new(CountingClassifier {
                calls: calls.clone(),
            }),
            Duration::from_secs(5),
        );

        handle.classify(Path::new("ignored.jpg")).await.unwrap();
        handle.classify(Path::new("ignored.jpg")).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
