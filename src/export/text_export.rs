use anyhow::Result;

use crate::core::model::{BatchResult, ItemOutcome, OutcomeStatus};
use crate::export::{Exporter, ReportTarget};

#[derive(Debug, Clone)]
pub struct TextExporter {
    target: ReportTarget,
}

impl TextExporter {
    pub fn new(target: ReportTarget) -> Self {
        Self { target }
    }

    fn format_outcome(outcome: &ItemOutcome) -> String {
        let mut out = format!("=== {} ===\n", outcome.filename);
        match &outcome.status {
            OutcomeStatus::Success {
                text,
                original_text,
                variants,
            } => {
                out.push_str(text);
                out.push('\n');
                if let Some(original) = original_text {
                    out.push_str("\n--- Original ---\n");
                    out.push_str(original);
                    out.push('\n');
                }
                if let Some(variants) = variants {
                    let counts = variants
                        .iter()
                        .map(|v| format!("{}: {} words", v.name, v.word_count))
                        .collect::<Vec<_>>()
                        .join(", ");
                    out.push_str(&format!("[{counts}]\n"));
                }
            }
            OutcomeStatus::Error { error, .. } => {
                out.push_str(&format!("[error] {error}\n"));
            }
        }
        out
    }
}

impl Exporter for TextExporter {
    fn render(&self, result: &BatchResult) -> Result<String> {
        Ok(result
            .results
            .iter()
            .map(Self::format_outcome)
            .collect::<Vec<_>>()
            .join("\n"))
    }

    fn target(&self) -> &ReportTarget {
        &self.target
    }
}
