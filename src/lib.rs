pub mod batch;
pub mod config;
pub mod core;
pub mod export;
pub mod ocr;
pub mod pipeline;
pub mod storage;

pub use batch::BatchOrchestrator;
pub use crate::core::model::{BatchItem, BatchResult, ItemOutcome, ProcessingMode, TextFragment};
pub use pipeline::reconstruct_text;
