//! Progress-callback trait for figure-extraction events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::AgentConfigBuilder::progress_callback`] to be told how
//! many embedded images a PDF holds and what the classifier decided for each
//! one. The CLI drives an `indicatif` bar from these events.
//!
//! # Example
//!
//! ```rust
//! use icmje_agent::{AgentConfig, ExtractionProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct KeptCounter {
//!     kept: AtomicUsize,
//! }
//!
//! impl ExtractionProgressCallback for KeptCounter {
//!     fn on_image_classified(&self, _index: usize, _total: usize, kept: bool) {
//!         if kept {
//!             self.kept.fetch_add(1, Ordering::SeqCst);
//!         }
//!     }
//! }
//!
//! let counter = Arc::new(KeptCounter { kept: AtomicUsize::new(0) });
//! let config = AgentConfig::builder()
//!     .progress_callback(counter as Arc<dyn ExtractionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by [`crate::pipeline::extract`] as it walks a PDF's images.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Called once after the PDF has been scanned, before classification.
    ///
    /// # Arguments
    /// * `total_images` — embedded images that will be sent to the classifier
    fn on_extraction_start(&self, total_images: usize) {
        let _ = total_images;
    }

    /// Called after the classifier returned a verdict for one image.
    ///
    /// # Arguments
    /// * `index` — 1-indexed position in document order
    /// * `total` — total images found
    /// * `kept`  — `true` when the image was judged a scientific figure
    fn on_image_classified(&self, index: usize, total: usize, kept: bool) {
        let _ = (index, total, kept);
    }

    /// Called once after every image has been classified.
    fn on_extraction_complete(&self, total_images: usize, kept: usize) {
        let _ = (total_images, kept);
    }
}

/// A no-op implementation, used when no callback is configured.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::AgentConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        started_total: AtomicUsize,
        classified: AtomicUsize,
        kept: AtomicUsize,
        completed_kept: AtomicUsize,
    }

    impl ExtractionProgressCallback for TrackingCallback {
        fn on_extraction_start(&self, total_images: usize) {
            self.started_total.store(total_images, Ordering::SeqCst);
        }

        fn on_image_classified(&self, _index: usize, _total: usize, kept: bool) {
            self.classified.fetch_add(1, Ordering::SeqCst);
            if kept {
                self.kept.fetch_add(1, Ordering::SeqCst);
            }
        }

        fn on_extraction_complete(&self, _total_images: usize, kept: usize) {
            self.completed_kept.store(kept, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_extraction_start(4);
        cb.on_image_classified(1, 4, true);
        cb.on_image_classified(2, 4, false);
        cb.on_extraction_complete(4, 1);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();

        tracker.on_extraction_start(3);
        tracker.on_image_classified(1, 3, true);
        tracker.on_image_classified(2, 3, false);
        tracker.on_image_classified(3, 3, true);
        tracker.on_extraction_complete(3, 2);

        assert_eq!(tracker.started_total.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.classified.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.kept.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.completed_kept.load(Ordering::SeqCst), 2);
    }
}
