//! Machine-readable run report.

use serde::Serialize;

use crate::download::{BatchSummary, DownloadResult};

use super::{ReportError, ReportSink};

/// File name of the JSON report.
pub const JSON_REPORT_FILE: &str = "download_report.json";

/// Summary plus every result with its full attempt trail.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonReportSink;

#[derive(Serialize)]
struct JsonReport<'a> {
    summary: &'a BatchSummary,
    success_rate: f64,
    results: &'a [DownloadResult],
}

impl ReportSink for JsonReportSink {
    fn file_name(&self) -> &'static str {
        JSON_REPORT_FILE
    }

    fn render(
        &self,
        results: &[DownloadResult],
        summary: &BatchSummary,
    ) -> Result<String, ReportError> {
        let report = JsonReport {
            summary,
            success_rate: summary.success_rate(),
            results,
        };
        Ok(serde_json::to_string_pretty(&report)?)
    }
}
