use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::download::error::{AcquireError, PersistError};
use crate::download::filename::{artifact_path, partial_path};
use crate::download::validator::Validator;

/// An artifact that passed validation and sits at its final path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct SavedArtifact {
    pub(super) path: PathBuf,
    pub(super) byte_size: u64,
}

/// Writes `bytes` to a partial file, validates, then renames into place.
///
/// A rejected buffer leaves nothing behind.
pub(super) async fn commit_artifact(
    output_dir: &Path,
    stem: &str,
    bytes: &[u8],
    validator: &dyn Validator,
) -> Result<SavedArtifact, AcquireError> {
    let partial = partial_path(output_dir, stem);
    tokio::fs::write(&partial, bytes)
        .await
        .map_err(|source| PersistError::Write {
            path: partial.clone(),
            source,
        })?;

    if let Err(failure) = validator.validate(bytes).into_result() {
        discard_partial(&partial).await;
        debug!(path = %partial.display(), reason = %failure, "artifact rejected");
        return Err(failure.into());
    }

    let target = artifact_path(output_dir, stem);
    if let Err(source) = tokio::fs::rename(&partial, &target).await {
        discard_partial(&partial).await;
        return Err(PersistError::Rename {
            from: partial,
            to: target,
            source,
        }
        .into());
    }

    Ok(SavedArtifact {
        path: target,
        byte_size: bytes.len() as u64,
    })
}

async fn discard_partial(path: &Path) {
    if let Err(error) = tokio::fs::remove_file(path).await
        && error.kind() != std::io::ErrorKind::NotFound
    {
        warn!(path = %path.display(), error = %error, "failed to remove partial file");
    }
}
