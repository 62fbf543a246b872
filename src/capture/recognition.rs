//! Face recognition boundary
//!
//! One request type in (a `CapturedImage`), one response type out (a ranked
//! `RecognitionResult`), one error kind. The capture flow only sees the
//! `Recognizer` trait, so the mock below can be replaced by a real backend.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::still::CapturedImage;
use crate::state::catalog::Catalog;
use crate::state::data::Photo;

/// Recognition failed; the only remedy is to submit again
///
/// The reason is kept for logs; users always see the same message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("We couldn't process your image. Please try again.")]
pub struct RecognitionError {
    reason: String,
}

impl RecognitionError {
    pub fn new(reason: impl Into<String>) -> Self {
        RecognitionError { reason: reason.into() }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// Photos matching a submitted face, best match first
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecognitionResult {
    photos: Vec<Photo>,
}

impl RecognitionResult {
    /// Wrap a ranked list, rejecting duplicate photo ids
    pub fn new(photos: Vec<Photo>) -> Result<Self, RecognitionError> {
        let mut seen = HashSet::with_capacity(photos.len());
        if let Some(dup) = photos.iter().find(|p| !seen.insert(&p.id)) {
            return Err(RecognitionError::new(format!(
                "backend returned photo {} twice",
                dup.id
            )));
        }
        Ok(RecognitionResult { photos })
    }

    pub fn photos(&self) -> &[Photo] {
        &self.photos
    }

    pub fn len(&self) -> usize {
        self.photos.len()
    }

    /// No matches; still a successful search
    pub fn is_empty(&self) -> bool {
        self.photos.is_empty()
    }
}

/// The recognition backend port
#[async_trait]
pub trait Recognizer: Send + Sync {
    async fn recognize(&self, image: CapturedImage) -> Result<RecognitionResult, RecognitionError>;
}

/// Stand-in backend that returns photos from the catalog
///
/// After `delay` it answers with between 4 and 12 catalog photos, the count
/// derived from the image bytes so the same picture always gives the same
/// answer.
#[derive(Debug, Clone)]
pub struct MockRecognizer {
    catalog: Arc<Catalog>,
    delay: Duration,
    timeout: Duration,
    fail: bool,
}

impl MockRecognizer {
    pub fn new(catalog: Arc<Catalog>, delay: Duration, timeout: Duration) -> Self {
        MockRecognizer {
            catalog,
            delay,
            timeout,
            fail: false,
        }
    }

    /// Make every call fail, as if the service were down
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    async fn answer(&self, image: &CapturedImage) -> Result<RecognitionResult, RecognitionError> {
        tokio::time::sleep(self.delay).await;
        if self.fail {
            return Err(RecognitionError::new("recognition service unavailable"));
        }

        let count = (4 + fingerprint(image.bytes()) % 9) as usize;
        let photos: Vec<Photo> = self.catalog.photos().iter().take(count).cloned().collect();
        RecognitionResult::new(photos)
    }
}

#[async_trait]
impl Recognizer for MockRecognizer {
    async fn recognize(&self, image: CapturedImage) -> Result<RecognitionResult, RecognitionError> {
        if image.is_empty() {
            return Err(RecognitionError::new("empty image"));
        }
        let (width, height) = image.dimensions();
        debug!(source = %image.source(), width, height, "processing facial recognition");

        let result = match tokio::time::timeout(self.timeout, self.answer(&image)).await {
            Ok(result) => result,
            Err(_) => Err(RecognitionError::new(format!(
                "no answer within {}ms",
                self.timeout.as_millis()
            ))),
        };

        match &result {
            Ok(found) => info!(matches = found.len(), "recognition finished"),
            Err(e) => warn!(reason = e.reason(), "recognition failed"),
        }
        result
    }
}

/// FNV-1a over the image bytes
fn fingerprint(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0xcbf2_9ce4_8422_2325, |hash, &b| {
        (hash ^ u64::from(b)).wrapping_mul(0x0100_0000_01b3)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::still::tests::encoded;
    use crate::capture::still::{decode, ImageInput, ImageRules};
    use image::ImageFormat;

    fn captured() -> CapturedImage {
        let bytes = encoded(64, 64, ImageFormat::Png);
        decode(ImageInput::upload("face.png", bytes), &ImageRules::default()).unwrap().0
    }

    fn recognizer() -> MockRecognizer {
        MockRecognizer::new(Arc::new(Catalog::mock(24)), Duration::ZERO, Duration::from_secs(5))
    }

    #[test]
    fn test_result_rejects_duplicates() {
        let catalog = Catalog::mock(4);
        let mut photos = catalog.photos().to_vec();
        photos.push(photos[1].clone());
        assert!(RecognitionResult::new(photos).is_err());
    }

    #[test]
    fn test_empty_result_is_valid() {
        let result = RecognitionResult::new(Vec::new()).unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_mock_returns_ranked_prefix() {
        let catalog = Catalog::mock(24);
        let result = recognizer().recognize(captured()).await.unwrap();

        assert!((4..=12).contains(&result.len()));
        // Ranking order is catalog order
        assert_eq!(result.photos(), &catalog.photos()[..result.len()]);
    }

    #[tokio::test]
    async fn test_mock_is_deterministic() {
        let a = recognizer().recognize(captured()).await.unwrap();
        let b = recognizer().recognize(captured()).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_small_catalog_caps_results() {
        let small = MockRecognizer::new(Arc::new(Catalog::mock(2)), Duration::ZERO, Duration::from_secs(5));
        let result = small.recognize(captured()).await.unwrap();
        assert_eq!(result.len(), 2);
    }

    #[tokio::test]
    async fn test_failing_mock() {
        let err = recognizer().failing().recognize(captured()).await.unwrap_err();
        assert_eq!(err.to_string(), "We couldn't process your image. Please try again.");
    }

    #[tokio::test]
    async fn test_timeout_is_a_failure() {
        let slow = MockRecognizer::new(
            Arc::new(Catalog::mock(24)),
            Duration::from_millis(200),
            Duration::from_millis(10),
        );
        let err = slow.recognize(captured()).await.unwrap_err();
        assert!(err.reason().contains("no answer"));
    }
}
