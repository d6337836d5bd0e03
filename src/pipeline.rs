use std::path::Path;

use tracing::{debug, warn};

use crate::core::error::{DetectorError, ProcessingError};
use crate::core::model::{TextFragment, VariantKind, VariantText};
use crate::ocr::enhance::{enhance_file, Enhancer};
use crate::ocr::formatter::format_document;
use crate::ocr::layout_builder::LineClusterer;
use crate::ocr::Detector;
use crate::storage::TempHandle;

const ENHANCED_FILE: &str = "enhanced.png";

/// Result of one preprocessing variant of an image.
#[derive(Debug)]
pub struct VariantRun {
    pub variant: VariantKind,
    pub result: Result<VariantText, ProcessingError>,
}

/// Clusters and formats one image's fragments into the document string.
pub fn reconstruct_text(clusterer: &LineClusterer, fragments: Vec<TextFragment>) -> String {
    format_document(&clusterer.cluster(fragments))
}

/// Runs detection and line reconstruction over each requested variant of a
/// stored image.
pub struct VariantPipeline<'a> {
    detector: &'a dyn Detector,
    enhancer: &'a dyn Enhancer,
    clusterer: LineClusterer,
}

impl<'a> VariantPipeline<'a> {
    pub fn new(
        detector: &'a dyn Detector,
        enhancer: &'a dyn Enhancer,
        clusterer: LineClusterer,
    ) -> Self {
        Self {
            detector,
            enhancer,
            clusterer,
        }
    }

    pub fn recognize(&self, image: &Path) -> Result<String, DetectorError> {
        let fragments = self.detector.detect(image)?;
        debug!(image = %image.display(), fragments = fragments.len(), "detected fragments");
        Ok(reconstruct_text(&self.clusterer, fragments))
    }

    /// Every variant is attempted; one failing does not stop the rest.
    pub fn run(&self, handle: &TempHandle, variants: &[VariantKind]) -> Vec<VariantRun> {
        variants
            .iter()
            .map(|&variant| {
                let result = self.run_variant(handle, variant);
                if let Err(err) = &result {
                    warn!(%variant, error = %err, "variant failed");
                }
                VariantRun { variant, result }
            })
            .collect()
    }

    fn run_variant(
        &self,
        handle: &TempHandle,
        variant: VariantKind,
    ) -> Result<VariantText, ProcessingError> {
        let text = match variant {
            VariantKind::Original => self.recognize(handle.source_path())?,
            VariantKind::Enhanced => {
                let target = handle.derived_path(ENHANCED_FILE);
                enhance_file(self.enhancer, handle.source_path(), &target)?;
                self.recognize(&target)?
            }
        };
        Ok(VariantText::new(variant, text))
    }
}
