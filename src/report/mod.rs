//! Post-run reports written next to the saved artifacts.
//!
//! Sinks only read the finished results; they never touch engine state.

mod json;
mod text;

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use crate::config::ReportConfig;
use crate::download::{BatchSummary, DownloadResult};

pub use json::{JSON_REPORT_FILE, JsonReportSink};
pub use text::{TEXT_SUMMARY_FILE, TextSummarySink, manual_search_links};

/// Errors rendering or writing a report.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Report could not be serialized.
    #[error("failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Text rendering failed.
    #[error("failed to format report: {0}")]
    Format(#[from] std::fmt::Error),

    /// Report file could not be written.
    #[error("failed to write report {path}: {source}")]
    Write {
        /// Report path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

/// A report format.
pub trait ReportSink {
    /// File name inside the output directory.
    fn file_name(&self) -> &'static str;

    /// Renders the report body.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError`] if rendering fails.
    fn render(&self, results: &[DownloadResult], summary: &BatchSummary)
    -> Result<String, ReportError>;

    /// Renders and writes the report into `dir`, returning its path.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError`] if rendering or writing fails.
    fn write(
        &self,
        dir: &Path,
        results: &[DownloadResult],
        summary: &BatchSummary,
    ) -> Result<PathBuf, ReportError> {
        let body = self.render(results, summary)?;
        let path = dir.join(self.file_name());
        std::fs::write(&path, body).map_err(|source| ReportError::Write {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }
}

/// Sinks enabled by configuration.
#[must_use]
pub fn sinks_from_config(config: &ReportConfig) -> Vec<Box<dyn ReportSink>> {
    let mut sinks: Vec<Box<dyn ReportSink>> = Vec::new();
    if config.text_summary {
        sinks.push(Box::new(TextSummarySink));
    }
    if config.json_report {
        sinks.push(Box::new(JsonReportSink));
    }
    sinks
}

/// Writes every enabled report into `dir`.
///
/// # Errors
///
/// Returns the first [`ReportError`]; reports after it are not written.
pub fn write_reports(
    dir: &Path,
    config: &ReportConfig,
    results: &[DownloadResult],
    summary: &BatchSummary,
) -> Result<Vec<PathBuf>, ReportError> {
    sinks_from_config(config)
        .iter()
        .map(|sink| {
            let path = sink.write(dir, results, summary)?;
            info!(path = %path.display(), "report written");
            Ok(path)
        })
        .collect()
}
