pub mod json_export;
pub mod text_export;

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::core::model::BatchResult;

pub use json_export::JsonExporter;
pub use text_export::TextExporter;

/// Where a rendered report goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportTarget {
    Stdout,
    File(PathBuf),
}

impl ReportTarget {
    fn write(&self, contents: &str) -> Result<()> {
        match self {
            ReportTarget::Stdout => {
                let mut out = io::stdout().lock();
                out.write_all(contents.as_bytes())?;
                out.flush()?;
            }
            ReportTarget::File(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    fs::create_dir_all(parent)?;
                }
                fs::write(path, contents)
                    .with_context(|| format!("failed to write report to {}", path.display()))?;
            }
        }
        Ok(())
    }
}

pub trait Exporter {
    fn render(&self, result: &BatchResult) -> Result<String>;

    fn target(&self) -> &ReportTarget;

    fn export(&self, result: &BatchResult) -> Result<()> {
        let contents = self.render(result)?;
        self.target().write(&contents)
    }
}
