use anyhow::Result;

use crate::core::model::BatchResult;
use crate::export::{Exporter, ReportTarget};

/// Writes `{"results": [...]}`, the shape the web front end consumes.
#[derive(Debug, Clone)]
pub struct JsonExporter {
    target: ReportTarget,
}

impl JsonExporter {
    pub fn new(target: ReportTarget) -> Self {
        Self { target }
    }
}

impl Exporter for JsonExporter {
    fn render(&self, result: &BatchResult) -> Result<String> {
        let mut data = serde_json::to_string_pretty(result)?;
        data.push('\n');
        Ok(data)
    }

    fn target(&self) -> &ReportTarget {
        &self.target
    }
}
