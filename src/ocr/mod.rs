pub mod bridge;
pub mod enhance;
pub mod formatter;
pub mod layout_builder;

use std::path::Path;

use parking_lot::Mutex;

use crate::core::error::DetectorError;
use crate::core::model::TextFragment;

pub use bridge::OcrBridge;
pub use enhance::{Enhancer, ThresholdEnhancer};
pub use layout_builder::{LineChain, LineClusterer};

/// An OCR engine that returns positioned text for an image on disk.
///
/// Implementations are shared by every item in a batch, so they must be
/// `Sync`. Engines that cannot take concurrent calls should be wrapped in
/// [`SerializedDetector`].
pub trait Detector: Send + Sync {
    fn detect(&self, image: &Path) -> Result<Vec<TextFragment>, DetectorError>;
}

impl<D: Detector + ?Sized> Detector for &D {
    fn detect(&self, image: &Path) -> Result<Vec<TextFragment>, DetectorError> {
        (**self).detect(image)
    }
}

impl<D: Detector + ?Sized> Detector for Box<D> {
    fn detect(&self, image: &Path) -> Result<Vec<TextFragment>, DetectorError> {
        (**self).detect(image)
    }
}

/// An engine that needs exclusive access for each call, e.g. one holding a
/// single inference session.
pub trait ExclusiveDetector: Send {
    fn detect_mut(&mut self, image: &Path) -> Result<Vec<TextFragment>, DetectorError>;
}

/// Shares an [`ExclusiveDetector`] across threads, one call at a time.
#[derive(Debug, Default)]
pub struct SerializedDetector<D> {
    inner: Mutex<D>,
}

impl<D> SerializedDetector<D> {
    pub fn new(inner: D) -> Self {
        Self {
            inner: Mutex::new(inner),
        }
    }

    pub fn into_inner(self) -> D {
        self.inner.into_inner()
    }
}

impl<D: ExclusiveDetector> Detector for SerializedDetector<D> {
    fn detect(&self, image: &Path) -> Result<Vec<TextFragment>, DetectorError> {
        self.inner.lock().detect_mut(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[derive(Default)]
    struct Gauge {
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    struct Probe(Arc<Gauge>);

    impl ExclusiveDetector for Probe {
        fn detect_mut(&mut self, _image: &Path) -> Result<Vec<TextFragment>, DetectorError> {
            let now = self.0.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.0.peak.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(5));
            self.0.active.fetch_sub(1, Ordering::SeqCst);
            Ok(Vec::new())
        }
    }

    #[test]
    fn serialized_detector_never_overlaps_calls() {
        let gauge = Arc::new(Gauge::default());
        let detector = Arc::new(SerializedDetector::new(Probe(Arc::clone(&gauge))));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let detector = Arc::clone(&detector);
                thread::spawn(move || detector.detect(Path::new("x.png")).map(|_| ()))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }

        assert_eq!(gauge.peak.load(Ordering::SeqCst), 1);
    }
}
