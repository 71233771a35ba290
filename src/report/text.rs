//! Plain-text run summary.

use std::fmt::Write as _;

use crate::download::{BatchSummary, DownloadResult};

use super::{ReportError, ReportSink};

/// File name of the text summary.
pub const TEXT_SUMMARY_FILE: &str = "download_summary.txt";

/// Human-readable summary with manual search links for failures.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextSummarySink;

/// Places to look for an identifier by hand.
#[must_use]
pub fn manual_search_links(doi: &str) -> [String; 4] {
    let query = urlencoding::encode(doi);
    [
        format!("https://doi.org/{doi}"),
        format!("https://scholar.google.com/scholar?q={query}"),
        format!("https://www.researchgate.net/search/publication?q={query}"),
        format!("https://www.ncbi.nlm.nih.gov/pmc/?term={query}"),
    ]
}

fn failure_reason(result: &DownloadResult) -> Option<&str> {
    result
        .error
        .as_deref()
        .or_else(|| result.attempts.last().and_then(|a| a.error.as_deref()))
}

impl ReportSink for TextSummarySink {
    fn file_name(&self) -> &'static str {
        TEXT_SUMMARY_FILE
    }

    fn render(
        &self,
        results: &[DownloadResult],
        summary: &BatchSummary,
    ) -> Result<String, ReportError> {
        let mut out = String::new();
        writeln!(out, "paperfetch download summary")?;
        writeln!(out, "Time: {}", summary.end_time.format("%Y-%m-%d %H:%M:%S UTC"))?;
        writeln!(out, "Duration: {}s", summary.duration().num_seconds())?;
        writeln!(out, "Total: {}", summary.total)?;
        writeln!(out, "Succeeded: {}", summary.success_count)?;
        writeln!(out, "Failed: {}", summary.failed_count)?;
        writeln!(out, "Success rate: {:.1}%", summary.success_rate())?;
        if summary.interrupted {
            writeln!(out, "Interrupted: yes")?;
        }

        writeln!(out, "\nSucceeded:")?;
        for result in results.iter().filter(|r| r.is_success()) {
            writeln!(out, "  {}", result.doi)?;
            if let Some(provider) = &result.provider {
                writeln!(out, "    provider: {provider}")?;
            }
            if let Some(path) = &result.file_path {
                writeln!(out, "    file: {}", path.display())?;
            }
        }

        writeln!(out, "\nFailed:")?;
        for result in results.iter().filter(|r| !r.is_success()) {
            writeln!(out, "  {}", result.doi)?;
            writeln!(out, "    attempts: {}", result.attempts.len())?;
            if let Some(reason) = failure_reason(result) {
                writeln!(out, "    last error: {reason}")?;
            }
            writeln!(out, "    try manually:")?;
            for link in manual_search_links(&result.doi) {
                writeln!(out, "      {link}")?;
            }
        }

        Ok(out)
    }
}
