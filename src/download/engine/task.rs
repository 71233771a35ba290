use std::sync::Arc;

use tokio::task::JoinError;
use tracing::{debug, info, warn};

use crate::download::error::AcquireError;
use crate::download::fetch::fetch_payload;
use crate::download::filename::build_artifact_stem;
use crate::download::log::{Attempt, AttemptLog, AttemptStatus, DownloadResult};
use crate::parser::BibEntry;
use crate::provider::{Payload, Provider, ProviderError, ProviderErrorKind, Resolved};
use crate::routing::RoutedClient;

use super::persistence::{SavedArtifact, commit_artifact};
use super::TaskContext;

/// Why one provider attempt did not produce a saved artifact.
#[derive(Debug, thiserror::Error)]
enum AttemptFailure {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Acquire(#[from] AcquireError),
}

impl AttemptFailure {
    fn status(&self) -> AttemptStatus {
        let network = match self {
            Self::Provider(error) => error.kind() == ProviderErrorKind::Network,
            Self::Acquire(error) => error.is_network(),
        };
        if network {
            AttemptStatus::Error
        } else {
            AttemptStatus::Failed
        }
    }
}

/// Runs the full provider chain for one identifier and records the outcome.
pub(super) async fn process_entry(
    ctx: Arc<TaskContext>,
    log: Arc<AttemptLog>,
    index: usize,
    entry: BibEntry,
) {
    let result = download_one(&ctx, &entry).await;
    log.record(index, result);
}

/// Walks every provider for every retry round until one saves a valid artifact.
#[tracing::instrument(skip_all, fields(doi = %entry.doi))]
pub(super) async fn download_one(ctx: &TaskContext, entry: &BibEntry) -> DownloadResult {
    let rounds = ctx.options.max_retries + 1;
    let mut attempts: Vec<Attempt> = Vec::with_capacity(ctx.providers.len());

    for round in 0..rounds {
        if round > 0 {
            debug!(round, "starting retry round");
        }
        for provider in ctx.providers.iter() {
            let name = provider.name();
            let client = ctx.pool.client_for(name);
            attempts.push(Attempt::trying(name, round));

            let outcome = try_provider(ctx, entry, provider.as_ref(), &client).await;
            let Some(current) = attempts.last_mut() else {
                break;
            };
            match outcome {
                Ok(saved) => {
                    current.settle(AttemptStatus::Success, None);
                    info!(
                        provider = name,
                        round,
                        path = %saved.path.display(),
                        bytes = saved.byte_size,
                        "artifact saved"
                    );
                    return DownloadResult::success(
                        entry.doi.clone(),
                        name,
                        saved.path,
                        saved.byte_size,
                        attempts,
                    );
                }
                Err(failure) => {
                    debug!(provider = name, round, error = %failure, "provider attempt failed");
                    current.settle(failure.status(), Some(failure.to_string()));
                }
            }

            pause(ctx.options.inter_provider_delay).await;
        }
        if round + 1 < rounds {
            pause(ctx.options.inter_retry_delay).await;
        }
    }

    warn!(attempts = attempts.len(), "all providers exhausted");
    DownloadResult::failed(entry.doi.clone(), attempts)
}

async fn try_provider(
    ctx: &TaskContext,
    entry: &BibEntry,
    provider: &dyn Provider,
    client: &RoutedClient,
) -> Result<SavedArtifact, AttemptFailure> {
    let Resolved { provider: name, payload } = provider.resolve(&entry.doi, client).await?;
    let bytes = match payload {
        Payload::Bytes { bytes, .. } => bytes,
        Payload::Url(url) => {
            debug!(provider = %name, url = %url, "fetching payload");
            fetch_payload(client, &url, &entry.doi, ctx.options.download_timeout)
                .await
                .map_err(AcquireError::from)?
        }
    };
    let stem = build_artifact_stem(&entry.metadata, &name);
    Ok(commit_artifact(&ctx.options.output_dir, &stem, &bytes, ctx.validator.as_ref()).await?)
}

async fn pause(delay: std::time::Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

/// Records a failed result for a task that panicked or was cancelled.
pub(super) fn handle_task_join_error(log: &AttemptLog, index: usize, doi: &str, error: JoinError) {
    let reason = if error.is_panic() {
        "download task panicked"
    } else {
        "download task was cancelled"
    };
    warn!(doi, error = %error, "{reason}");
    log.record(index, DownloadResult::aborted(doi, reason));
}
