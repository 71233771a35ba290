//! Batch download engine.
//!
//! Each identifier runs in its own Tokio task and walks the provider chain
//! in priority order, once per retry round, until one provider yields an
//! artifact that passes validation. A semaphore bounds how many identifiers
//! are in flight. Tasks finish by appending their result to a shared
//! [`AttemptLog`].
//!
//! # Example
//!
//! ```no_run
//! use paperfetch_core::config::FetchConfig;
//! use paperfetch_core::download::DownloadEngine;
//! use paperfetch_core::parser::BibEntry;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = DownloadEngine::from_config(&FetchConfig::default())?;
//! let outcome = engine.run_batch(vec![BibEntry::new("10.1000/xyz")]).await?;
//! println!("{} of {} saved", outcome.summary.success_count, outcome.summary.total);
//! # Ok(())
//! # }
//! ```

mod persistence;
mod task;

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::config::FetchConfig;
use crate::parser::BibEntry;
use crate::provider::{Provider, ProviderError, ProviderRegistry};
use crate::routing::{HttpPool, RoutingError, RoutingPolicy};

use super::log::{AttemptLog, BatchSummary, DownloadResult, ProgressHook};
use super::validator::{AcceptAll, PdfValidator, Validator};

/// Minimum allowed worker count.
const MIN_WORKERS: usize = 1;

/// Maximum allowed worker count.
const MAX_WORKERS: usize = 64;

/// Reason recorded for identifiers an interrupt kept from starting.
pub const NOT_STARTED_REASON: &str = "interrupted before start";

/// Error type for download engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Worker count outside the allowed range.
    #[error("invalid worker count {value}: must be between {MIN_WORKERS} and {MAX_WORKERS}")]
    InvalidConcurrency {
        /// The rejected value.
        value: usize,
    },

    /// The provider chain is empty.
    #[error("no providers enabled")]
    NoProviders,

    /// HTTP clients could not be built.
    #[error(transparent)]
    Routing(#[from] RoutingError),

    /// A configured provider could not be constructed.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Output directory could not be created.
    #[error("failed to create output directory {path}: {source}")]
    OutputDir {
        /// Directory path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Semaphore was closed unexpectedly.
    #[error("semaphore closed unexpectedly")]
    SemaphoreClosed,
}

/// Engine tunables, usually taken from [`FetchConfig`].
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Identifiers processed concurrently.
    pub max_workers: usize,
    /// Extra passes over the provider chain after the first.
    pub max_retries: u32,
    /// Pause after each unsuccessful provider.
    pub inter_provider_delay: Duration,
    /// Pause between retry rounds.
    pub inter_retry_delay: Duration,
    /// Timeout for payload fetches.
    pub download_timeout: Duration,
    /// Where artifacts are saved.
    pub output_dir: PathBuf,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self::from_config(&FetchConfig::default())
    }
}

impl EngineOptions {
    /// Options from a loaded configuration.
    #[must_use]
    pub fn from_config(config: &FetchConfig) -> Self {
        Self {
            max_workers: config.max_workers,
            max_retries: config.max_retries,
            inter_provider_delay: Duration::from_millis(config.inter_provider_delay_ms),
            inter_retry_delay: Duration::from_millis(config.inter_retry_delay_ms),
            download_timeout: Duration::from_secs(config.download_timeout_secs),
            output_dir: config.output_dir.clone(),
        }
    }
}

/// Results and totals of one batch.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    /// Totals.
    pub summary: BatchSummary,
    /// One result per distinct identifier, in input order.
    pub results: Vec<DownloadResult>,
}

/// State shared by every task of a batch.
struct TaskContext {
    providers: Vec<Arc<dyn Provider>>,
    pool: Arc<HttpPool>,
    validator: Arc<dyn Validator>,
    options: EngineOptions,
}

/// Coordinates concurrent downloads across the provider chain.
pub struct DownloadEngine {
    semaphore: Arc<Semaphore>,
    ctx: Arc<TaskContext>,
    progress: Option<ProgressHook>,
}

impl std::fmt::Debug for DownloadEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadEngine")
            .field("providers", &self.provider_names())
            .field("options", &self.ctx.options)
            .finish_non_exhaustive()
    }
}

impl DownloadEngine {
    /// Creates an engine over an explicit provider chain.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConcurrency`] if `max_workers` is out of
    /// range and [`EngineError::NoProviders`] for an empty chain.
    #[instrument(level = "debug", skip_all, fields(workers = options.max_workers))]
    pub fn new(
        providers: Vec<Arc<dyn Provider>>,
        pool: Arc<HttpPool>,
        validator: Arc<dyn Validator>,
        options: EngineOptions,
    ) -> Result<Self, EngineError> {
        if !(MIN_WORKERS..=MAX_WORKERS).contains(&options.max_workers) {
            return Err(EngineError::InvalidConcurrency {
                value: options.max_workers,
            });
        }
        if providers.is_empty() {
            return Err(EngineError::NoProviders);
        }

        debug!(
            providers = ?providers.iter().map(|p| p.name()).collect::<Vec<_>>(),
            max_retries = options.max_retries,
            "creating download engine"
        );

        Ok(Self {
            semaphore: Arc::new(Semaphore::new(options.max_workers)),
            ctx: Arc::new(TaskContext {
                providers,
                pool,
                validator,
                options,
            }),
            progress: None,
        })
    }

    /// Builds the whole stack from configuration: routing, built-in
    /// providers in priority order, and the validator.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] if the proxy is invalid, a provider cannot be
    /// built, or the options are out of range.
    pub fn from_config(config: &FetchConfig) -> Result<Self, EngineError> {
        let pool = Arc::new(HttpPool::new(RoutingPolicy::from_config(&config.routing))?);
        let providers = ProviderRegistry::with_builtins()
            .build_chain(&config.providers, config.request_timeout_secs)?;
        let validator: Arc<dyn Validator> = if config.validate_pdf {
            Arc::new(PdfValidator)
        } else {
            Arc::new(AcceptAll)
        };
        Self::new(providers, pool, validator, EngineOptions::from_config(config))
    }

    /// Reports every finished identifier to `hook`.
    #[must_use]
    pub fn with_progress(mut self, hook: ProgressHook) -> Self {
        self.progress = Some(hook);
        self
    }

    /// Provider names in chain order.
    #[must_use]
    pub fn provider_names(&self) -> Vec<&str> {
        self.ctx.providers.iter().map(|p| p.name()).collect()
    }

    /// Options in force.
    #[must_use]
    pub fn options(&self) -> &EngineOptions {
        &self.ctx.options
    }

    /// Number of proxied requests retried direct so far.
    #[must_use]
    pub fn direct_fallback_count(&self) -> usize {
        self.ctx.pool.direct_fallback_count()
    }

    async fn ensure_output_dir(&self) -> Result<(), EngineError> {
        let path = &self.ctx.options.output_dir;
        tokio::fs::create_dir_all(path)
            .await
            .map_err(|source| EngineError::OutputDir {
                path: path.clone(),
                source,
            })
    }

    /// Runs the provider chain for a single identifier.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::OutputDir`] if the output directory cannot be
    /// created. Provider failures end up in the returned result.
    pub async fn download_one(&self, entry: &BibEntry) -> Result<DownloadResult, EngineError> {
        self.ensure_output_dir().await?;
        Ok(task::download_one(&self.ctx, entry).await)
    }

    /// Processes every entry to a terminal result.
    ///
    /// # Errors
    ///
    /// See [`Self::run_batch_interruptible`].
    pub async fn run_batch(&self, entries: Vec<BibEntry>) -> Result<BatchOutcome, EngineError> {
        self.run_batch_interruptible(entries, Arc::new(AtomicBool::new(false)))
            .await
    }

    /// Processes entries and stops starting new ones once `interrupted` is set.
    ///
    /// Identifiers already started run to completion. Identifiers never
    /// started are reported as failed with no attempts. Duplicate identifiers
    /// (case-insensitive) are dropped, keeping the first.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::OutputDir`] if the output directory cannot be
    /// created and [`EngineError::SemaphoreClosed`] if the semaphore closes.
    /// Individual identifier failures never fail the batch.
    #[instrument(skip_all, fields(entries = entries.len()))]
    pub async fn run_batch_interruptible(
        &self,
        entries: Vec<BibEntry>,
        interrupted: Arc<AtomicBool>,
    ) -> Result<BatchOutcome, EngineError> {
        let start_time = Utc::now();
        self.ensure_output_dir().await?;

        let entries = dedupe_entries(entries);
        let total = entries.len();
        let log = Arc::new(match &self.progress {
            Some(hook) => AttemptLog::with_hook(Arc::clone(hook)),
            None => AttemptLog::new(),
        });
        let mut handles: Vec<(usize, String, JoinHandle<()>)> = Vec::with_capacity(total);
        let mut was_interrupted = false;

        info!(total, providers = self.ctx.providers.len(), "starting batch");

        let mut pending = entries.into_iter().enumerate();
        for (index, entry) in pending.by_ref() {
            if interrupted.load(Ordering::SeqCst) {
                was_interrupted = true;
                log.record(index, DownloadResult::aborted(&entry.doi, NOT_STARTED_REASON));
                break;
            }

            // Race the permit against the interrupt flag so Ctrl+C during a
            // full-concurrency wait stops immediately.
            let permit = tokio::select! {
                biased;
                () = async {
                    while !interrupted.load(Ordering::SeqCst) {
                        tokio::time::sleep(Duration::from_millis(50)).await;
                    }
                } => None,
                result = Arc::clone(&self.semaphore).acquire_owned() => {
                    Some(result.map_err(|_| EngineError::SemaphoreClosed)?)
                }
            };
            let Some(permit) = permit else {
                was_interrupted = true;
                log.record(index, DownloadResult::aborted(&entry.doi, NOT_STARTED_REASON));
                break;
            };

            debug!(index, doi = %entry.doi, "starting identifier");
            let ctx = Arc::clone(&self.ctx);
            let task_log = Arc::clone(&log);
            let doi = entry.doi.clone();
            handles.push((
                index,
                doi,
                tokio::spawn(async move {
                    // Permit is dropped when this block exits (RAII)
                    let _permit = permit;
                    task::process_entry(ctx, task_log, index, entry).await;
                }),
            ));
        }

        if was_interrupted {
            let mut skipped = 0usize;
            for (index, entry) in pending {
                log.record(index, DownloadResult::aborted(&entry.doi, NOT_STARTED_REASON));
                skipped += 1;
            }
            warn!(in_flight = handles.len(), skipped, "interrupted; waiting for started identifiers");
        }

        debug!(task_count = handles.len(), "waiting for downloads to complete");
        for (index, doi, handle) in handles {
            if let Err(error) = handle.await {
                task::handle_task_join_error(&log, index, &doi, error);
            }
        }

        let (success_count, failed_count) = log.counts();
        let results = log.take_sorted();
        let summary = BatchSummary {
            total,
            success_count,
            failed_count,
            start_time,
            end_time: Utc::now(),
            interrupted: was_interrupted,
        };

        info!(
            total,
            succeeded = summary.success_count,
            failed = summary.failed_count,
            interrupted = was_interrupted,
            direct_fallbacks = self.direct_fallback_count(),
            "batch complete"
        );

        Ok(BatchOutcome { summary, results })
    }
}

fn dedupe_entries(entries: Vec<BibEntry>) -> Vec<BibEntry> {
    let mut seen = HashSet::new();
    entries
        .into_iter()
        .filter(|entry| {
            let fresh = seen.insert(entry.doi.to_ascii_lowercase());
            if !fresh {
                warn!(doi = %entry.doi, "duplicate identifier dropped");
            }
            fresh
        })
        .collect()
}
