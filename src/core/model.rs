use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::geometry::Quad;

/// Rendered in place of a document when the detector found nothing.
pub const NO_TEXT_FOUND: &str = "No text found.";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextFragment {
    pub polygon: Quad,
    pub text: String,
    pub confidence: f32,
}

impl TextFragment {
    pub fn new(polygon: Quad, text: impl Into<String>, confidence: f32) -> Self {
        Self {
            polygon,
            text: text.into(),
            confidence,
        }
    }

    pub fn anchor_y(&self) -> f32 {
        self.polygon.anchor_y()
    }

    pub fn anchor_x(&self) -> f32 {
        self.polygon.anchor_x()
    }
}

/// Fragments judged to share one horizontal text line, in clustering order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Line {
    pub fragments: Vec<TextFragment>,
}

impl Line {
    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }
}

/// All lines recovered from one image, top to bottom.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DetectionSet {
    pub lines: Vec<Line>,
}

impl DetectionSet {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn fragment_count(&self) -> usize {
        self.lines.iter().map(Line::len).sum()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum VariantKind {
    Original,
    Enhanced,
}

impl VariantKind {
    pub fn display_name(self) -> &'static str {
        match self {
            VariantKind::Original => "Original",
            VariantKind::Enhanced => "Grayscale + Threshold",
        }
    }
}

impl fmt::Display for VariantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingMode {
    #[default]
    Simple,
    Augmented,
}

impl ProcessingMode {
    /// Variants in execution order. The identity pass always runs first.
    pub fn variants(self) -> &'static [VariantKind] {
        match self {
            ProcessingMode::Simple => &[VariantKind::Original],
            ProcessingMode::Augmented => &[VariantKind::Original, VariantKind::Enhanced],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariantText {
    pub variant: VariantKind,
    pub text: String,
    pub word_count: usize,
}

impl VariantText {
    pub fn new(variant: VariantKind, text: String) -> Self {
        let word_count = count_words(&text);
        Self {
            variant,
            text,
            word_count,
        }
    }
}

pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

/// One uploaded image awaiting processing.
#[derive(Debug, Clone)]
pub struct BatchItem {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl BatchItem {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VariantSummary {
    pub name: String,
    pub word_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ItemOutcome {
    pub filename: String,
    #[serde(flatten)]
    pub status: OutcomeStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum OutcomeStatus {
    Success {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        original_text: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        variants: Option<Vec<VariantSummary>>,
    },
    Error {
        #[serde(default)]
        text: String,
        error: String,
    },
}

impl ItemOutcome {
    pub fn success(filename: impl Into<String>, text: String) -> Self {
        Self {
            filename: filename.into(),
            status: OutcomeStatus::Success {
                text,
                original_text: None,
                variants: None,
            },
        }
    }

    pub fn error(filename: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            status: OutcomeStatus::Error {
                text: String::new(),
                error: message.into(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, OutcomeStatus::Success { .. })
    }

    pub fn text(&self) -> &str {
        match &self.status {
            OutcomeStatus::Success { text, .. } | OutcomeStatus::Error { text, .. } => text,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.status {
            OutcomeStatus::Error { error, .. } => Some(error),
            OutcomeStatus::Success { .. } => None,
        }
    }
}

/// Per-item outcomes in input order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BatchResult {
    pub results: Vec<ItemOutcome>,
}

impl BatchResult {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.len() - self.succeeded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn error_outcome_serializes_flat() {
        let outcome = ItemOutcome::error("scan.gif", "File type not allowed");
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "filename": "scan.gif",
                "status": "error",
                "text": "",
                "error": "File type not allowed",
            })
        );
    }

    #[test]
    fn simple_success_omits_variant_fields() {
        let outcome = ItemOutcome::success("a.png", "Hello".to_string());
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"filename": "a.png", "status": "success", "text": "Hello"})
        );
    }

    #[test]
    fn word_count_ignores_repeated_whitespace() {
        assert_eq!(count_words("a  b\n\nc "), 3);
        assert_eq!(count_words(""), 0);
        assert_eq!(count_words(NO_TEXT_FOUND), 3);
    }

    #[test]
    fn augmented_mode_runs_identity_first() {
        assert_eq!(
            ProcessingMode::Augmented.variants(),
            &[VariantKind::Original, VariantKind::Enhanced]
        );
        assert_eq!(ProcessingMode::Simple.variants(), &[VariantKind::Original]);
    }
}
