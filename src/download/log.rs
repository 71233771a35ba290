//! Attempt trail, per-identifier results, and the shared batch log.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Status of one provider attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AttemptStatus {
    /// Probe in flight.
    Trying,
    /// Artifact acquired, validated, and saved.
    Success,
    /// Provider answered but nothing usable came of it.
    Failed,
    /// Transport-level failure.
    Error,
}

/// One probe of one provider in one retry round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attempt {
    /// Provider name.
    pub provider: String,
    /// Zero-based retry round.
    pub retry_round: u32,
    /// Outcome.
    pub status: AttemptStatus,
    /// Failure text for failed and error attempts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Attempt {
    /// New in-flight attempt.
    #[must_use]
    pub fn trying(provider: &str, retry_round: u32) -> Self {
        Self {
            provider: provider.to_string(),
            retry_round,
            status: AttemptStatus::Trying,
            error: None,
        }
    }

    /// Moves an in-flight attempt to its final status. Settled attempts are left untouched.
    pub fn settle(&mut self, status: AttemptStatus, error: Option<String>) {
        if self.status == AttemptStatus::Trying {
            self.status = status;
            self.error = error;
        }
    }
}

/// Terminal status of an identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    /// Artifact saved.
    Success,
    /// Every provider and round exhausted, or never started.
    Failed,
}

/// Terminal outcome and full attempt trail for one identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadResult {
    /// Identifier.
    pub doi: String,
    /// Terminal status.
    pub status: ResultStatus,
    /// Provider that produced the artifact.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Saved artifact path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<PathBuf>,
    /// Saved artifact size.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub byte_size: Option<u64>,
    /// Attempts in execution order.
    pub attempts: Vec<Attempt>,
    /// Failure outside the provider loop (interrupt, task fault).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DownloadResult {
    /// Successful result.
    #[must_use]
    pub fn success(
        doi: impl Into<String>,
        provider: impl Into<String>,
        file_path: PathBuf,
        byte_size: u64,
        attempts: Vec<Attempt>,
    ) -> Self {
        Self {
            doi: doi.into(),
            status: ResultStatus::Success,
            provider: Some(provider.into()),
            file_path: Some(file_path),
            byte_size: Some(byte_size),
            attempts,
            error: None,
        }
    }

    /// Result after every provider and round failed.
    #[must_use]
    pub fn failed(doi: impl Into<String>, attempts: Vec<Attempt>) -> Self {
        Self {
            doi: doi.into(),
            status: ResultStatus::Failed,
            provider: None,
            file_path: None,
            byte_size: None,
            attempts,
            error: None,
        }
    }

    /// Failed result for an identifier whose loop never ran to completion.
    #[must_use]
    pub fn aborted(doi: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            error: Some(reason.into()),
            ..Self::failed(doi, Vec::new())
        }
    }

    /// True for successful results.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == ResultStatus::Success
    }
}

/// Totals for a finished batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    /// Identifiers in the batch.
    pub total: usize,
    /// Identifiers saved.
    pub success_count: usize,
    /// Identifiers that failed.
    pub failed_count: usize,
    /// Batch start.
    pub start_time: DateTime<Utc>,
    /// Batch end.
    pub end_time: DateTime<Utc>,
    /// Whether an interrupt stopped new work from starting.
    pub interrupted: bool,
}

impl BatchSummary {
    /// Success percentage, 0 for an empty batch.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.success_count as f64 * 100.0 / self.total as f64
        }
    }

    /// Wall-clock duration.
    #[must_use]
    pub fn duration(&self) -> chrono::Duration {
        self.end_time - self.start_time
    }
}

/// Called once per finished identifier, outside the log lock.
pub type ProgressHook = Arc<dyn Fn(&DownloadResult) + Send + Sync>;

#[derive(Debug, Default)]
struct LogState {
    results: Vec<(usize, DownloadResult)>,
    success_count: usize,
    failed_count: usize,
}

/// Shared append-only log of finished results.
///
/// Results and both counters sit behind one lock so they never disagree.
#[derive(Default)]
pub struct AttemptLog {
    state: Mutex<LogState>,
    hook: Option<ProgressHook>,
}

impl std::fmt::Debug for AttemptLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (success, failed) = self.counts();
        f.debug_struct("AttemptLog")
            .field("success_count", &success)
            .field("failed_count", &failed)
            .finish_non_exhaustive()
    }
}

impl AttemptLog {
    /// Empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty log that reports each recorded result to `hook`.
    #[must_use]
    pub fn with_hook(hook: ProgressHook) -> Self {
        Self {
            state: Mutex::default(),
            hook: Some(hook),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LogState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends the terminal result for the identifier at input position `index`.
    pub fn record(&self, index: usize, result: DownloadResult) {
        if let Some(hook) = &self.hook {
            hook(&result);
        }
        let mut state = self.lock();
        if result.is_success() {
            state.success_count += 1;
        } else {
            state.failed_count += 1;
        }
        state.results.push((index, result));
    }

    /// `(success_count, failed_count)` so far.
    #[must_use]
    pub fn counts(&self) -> (usize, usize) {
        let state = self.lock();
        (state.success_count, state.failed_count)
    }

    /// Number of recorded results.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().results.len()
    }

    /// True when nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Takes every recorded result, ordered by input position.
    #[must_use]
    pub fn take_sorted(&self) -> Vec<DownloadResult> {
        let mut results = std::mem::take(&mut self.lock().results);
        results.sort_by_key(|(index, _)| *index);
        results.into_iter().map(|(_, result)| result).collect()
    }
}
