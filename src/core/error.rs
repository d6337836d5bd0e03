use std::io;
use std::process::ExitStatus;

use thiserror::Error;

/// Problems with the request itself, detected before any OCR runs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("No files part in the request")]
    NoItems,

    #[error("No files selected for uploading")]
    NoneSelected,

    #[error("File type not allowed")]
    UnsupportedFileType(String),
}

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("failed to invoke OCR bridge: {0}")]
    Spawn(#[source] io::Error),

    #[error("OCR bridge failed ({status}): {stderr}")]
    Failed { status: ExitStatus, stderr: String },

    #[error("failed to parse OCR JSON response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("polygon for {text:?} has {points} points, expected 4")]
    MalformedPolygon { text: String, points: usize },

    #[error("{0}")]
    Engine(String),
}

#[derive(Error, Debug)]
pub enum TransformError {
    #[error("failed to decode image: {0}")]
    Decode(#[source] image::ImageError),

    #[error("failed to encode enhanced image: {0}")]
    Encode(#[source] image::ImageError),

    #[error("{0}")]
    Filter(String),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("temporary storage I/O failed for {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// Anything that fails while one item is being processed.
#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error(transparent)]
    Detector(#[from] DetectorError),

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("processing panicked: {0}")]
    Panicked(String),
}

/// Failure of the single-file operation, which surfaces errors to the caller
/// instead of folding them into an outcome.
#[derive(Error, Debug)]
pub enum SingleFileError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("An error occurred during OCR processing: {0}")]
    Processing(#[from] ProcessingError),
}
