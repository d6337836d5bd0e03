use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use rayon::prelude::*;
use tracing::{info, warn};

use crate::core::error::{ProcessingError, SingleFileError, ValidationError};
use crate::core::model::{
    count_words, BatchItem, BatchResult, ItemOutcome, OutcomeStatus, ProcessingMode, VariantKind,
    VariantSummary, VariantText,
};
use crate::ocr::enhance::Enhancer;
use crate::ocr::layout_builder::LineClusterer;
use crate::ocr::Detector;
use crate::pipeline::{VariantPipeline, VariantRun};
use crate::storage::{ScopedTemp, Storage};

pub const DEFAULT_ALLOWED_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Case-insensitive extension check. Names without a `.` are rejected.
pub fn is_allowed_file(name: &str, allowed: &[String]) -> bool {
    name.rsplit_once('.')
        .map(|(_, ext)| {
            let ext = ext.to_ascii_lowercase();
            allowed.iter().any(|a| a.eq_ignore_ascii_case(&ext))
        })
        .unwrap_or(false)
}

/// Runs the variant pipeline over a batch of uploads, one outcome per item.
pub struct BatchOrchestrator<'a> {
    detector: &'a dyn Detector,
    enhancer: &'a dyn Enhancer,
    storage: &'a dyn Storage,
    clusterer: LineClusterer,
    allowed_extensions: Vec<String>,
    jobs: usize,
}

impl<'a> BatchOrchestrator<'a> {
    pub fn new(
        detector: &'a dyn Detector,
        enhancer: &'a dyn Enhancer,
        storage: &'a dyn Storage,
    ) -> Self {
        Self {
            detector,
            enhancer,
            storage,
            clusterer: LineClusterer::default(),
            allowed_extensions: DEFAULT_ALLOWED_EXTENSIONS
                .iter()
                .map(|e| e.to_string())
                .collect(),
            jobs: 1,
        }
    }

    pub fn with_clusterer(mut self, clusterer: LineClusterer) -> Self {
        self.clusterer = clusterer;
        self
    }

    pub fn with_allowed_extensions(mut self, extensions: Vec<String>) -> Self {
        self.allowed_extensions = extensions;
        self
    }

    /// Items processed concurrently. Values of 0 or 1 run sequentially.
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    pub fn process_batch(
        &self,
        items: &[BatchItem],
        mode: ProcessingMode,
    ) -> Result<BatchResult, ValidationError> {
        if items.is_empty() {
            return Err(ValidationError::NoItems);
        }
        if items.iter().all(|item| item.name.is_empty()) {
            return Err(ValidationError::NoneSelected);
        }

        info!(items = items.len(), ?mode, jobs = self.jobs, "processing batch");

        let results: Vec<ItemOutcome> = if self.jobs > 1 {
            match rayon::ThreadPoolBuilder::new().num_threads(self.jobs).build() {
                Ok(pool) => pool.install(|| {
                    items
                        .par_iter()
                        .map(|item| self.process_item(item, mode))
                        .collect::<Vec<_>>()
                }),
                Err(err) => {
                    warn!(error = %err, "could not build worker pool, running sequentially");
                    self.process_sequential(items, mode)
                }
            }
        } else {
            self.process_sequential(items, mode)
        };

        let result = BatchResult { results };
        info!(
            succeeded = result.succeeded(),
            failed = result.failed(),
            "batch finished"
        );
        Ok(result)
    }

    fn process_sequential(&self, items: &[BatchItem], mode: ProcessingMode) -> Vec<ItemOutcome> {
        items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                info!("[{}/{}] {}", i + 1, items.len(), item.name);
                self.process_item(item, mode)
            })
            .collect()
    }

    /// Never fails: every problem becomes an error outcome for this item.
    pub fn process_item(&self, item: &BatchItem, mode: ProcessingMode) -> ItemOutcome {
        if let Err(err) = self.validate(&item.name) {
            warn!(file = %item.name, "rejected: {err}");
            return ItemOutcome::error(&item.name, err.to_string());
        }

        match self.run_guarded(item, mode) {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(file = %item.name, error = %err, "processing failed");
                ItemOutcome::error(&item.name, err.to_string())
            }
        }
    }

    /// Single-file operation: returns the text, or the failure itself rather
    /// than an error outcome.
    pub fn process_single(&self, item: &BatchItem) -> Result<String, SingleFileError> {
        if item.name.is_empty() {
            return Err(ValidationError::NoneSelected.into());
        }
        self.validate(&item.name)?;

        let outcome = self.run_guarded(item, ProcessingMode::Simple)?;
        Ok(outcome.text().to_string())
    }

    /// A panic in the detector or enhancer is confined to the item.
    fn run_guarded(
        &self,
        item: &BatchItem,
        mode: ProcessingMode,
    ) -> Result<ItemOutcome, ProcessingError> {
        panic::catch_unwind(AssertUnwindSafe(|| self.run_item(item, mode)))
            .unwrap_or_else(|payload| {
                Err(ProcessingError::Panicked(panic_message(payload.as_ref())))
            })
    }

    fn validate(&self, name: &str) -> Result<(), ValidationError> {
        if is_allowed_file(name, &self.allowed_extensions) {
            Ok(())
        } else {
            Err(ValidationError::UnsupportedFileType(name.to_string()))
        }
    }

    fn run_item(
        &self,
        item: &BatchItem,
        mode: ProcessingMode,
    ) -> Result<ItemOutcome, ProcessingError> {
        let scoped = ScopedTemp::acquire(self.storage, &item.name, &item.bytes)?;
        let pipeline = VariantPipeline::new(self.detector, self.enhancer, self.clusterer);
        let runs = pipeline.run(scoped.handle(), mode.variants());
        drop(scoped);

        let outcome = assemble(&item.name, mode, runs)?;
        info!(file = %item.name, words = count_words(outcome.text()), "item done");
        Ok(outcome)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// The first failing variant fails the whole item, even when an earlier
/// variant already produced text.
fn assemble(
    name: &str,
    mode: ProcessingMode,
    runs: Vec<VariantRun>,
) -> Result<ItemOutcome, ProcessingError> {
    let texts = runs
        .into_iter()
        .map(|run| run.result)
        .collect::<Result<Vec<VariantText>, _>>()?;

    let outcome = match mode {
        ProcessingMode::Simple => {
            let text = texts.into_iter().next().map(|t| t.text).unwrap_or_default();
            ItemOutcome::success(name, text)
        }
        ProcessingMode::Augmented => {
            let variants = texts
                .iter()
                .map(|t| VariantSummary {
                    name: t.variant.display_name().to_string(),
                    word_count: t.word_count,
                })
                .collect();
            let original_text = texts
                .iter()
                .find(|t| t.variant == VariantKind::Original)
                .map(|t| t.text.clone());
            let text = texts
                .into_iter()
                .find(|t| t.variant == VariantKind::Enhanced)
                .map(|t| t.text)
                .unwrap_or_default();
            ItemOutcome {
                filename: name.to_string(),
                status: OutcomeStatus::Success {
                    text,
                    original_text,
                    variants: Some(variants),
                },
            }
        }
    };
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::DetectorError;
    use pretty_assertions::assert_eq;

    fn allowed() -> Vec<String> {
        DEFAULT_ALLOWED_EXTENSIONS.iter().map(|e| e.to_string()).collect()
    }

    #[test]
    fn extension_check_is_case_insensitive() {
        assert!(is_allowed_file("scan.PNG", &allowed()));
        assert!(is_allowed_file("photo.final.JpEg", &allowed()));
        assert!(is_allowed_file(".png", &allowed()));
        assert!(!is_allowed_file("anim.gif", &allowed()));
        assert!(!is_allowed_file("README", &allowed()));
        assert!(!is_allowed_file("trailing.", &allowed()));
        assert!(!is_allowed_file("", &allowed()));
    }

    fn run(variant: VariantKind, text: &str) -> VariantRun {
        VariantRun {
            variant,
            result: Ok(VariantText::new(variant, text.to_string())),
        }
    }

    #[test]
    fn augmented_outcome_uses_enhanced_text_as_primary() {
        let outcome = assemble(
            "a.png",
            ProcessingMode::Augmented,
            vec![
                run(VariantKind::Original, "0riginal text"),
                run(VariantKind::Enhanced, "Original text here"),
            ],
        )
        .unwrap();

        assert_eq!(
            outcome.status,
            OutcomeStatus::Success {
                text: "Original text here".to_string(),
                original_text: Some("0riginal text".to_string()),
                variants: Some(vec![
                    VariantSummary {
                        name: "Original".to_string(),
                        word_count: 2
                    },
                    VariantSummary {
                        name: "Grayscale + Threshold".to_string(),
                        word_count: 3
                    },
                ]),
            }
        );
    }

    #[test]
    fn enhanced_failure_discards_identity_text() {
        let err = assemble(
            "a.png",
            ProcessingMode::Augmented,
            vec![
                run(VariantKind::Original, "fine"),
                VariantRun {
                    variant: VariantKind::Enhanced,
                    result: Err(DetectorError::Engine("engine crashed".to_string()).into()),
                },
            ],
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "engine crashed");
    }
}
