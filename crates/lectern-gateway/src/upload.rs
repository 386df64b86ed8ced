use std::io;
use std::path::{Path, PathBuf};

use lectern_core::SessionId;
use uuid::Uuid;

/// Reduce a client-supplied filename to a safe single path component.
///
/// Whitespace runs become `_`, anything outside `[A-Za-z0-9._-]` is dropped,
/// and leading dots and underscores are stripped. Returns `None` when nothing
/// usable remains.
#[must_use]
pub fn secure_filename(name: &str) -> Option<String> {
    let joined = name.split_whitespace().collect::<Vec<_>>().join("_");
    let kept: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect();
    let trimmed = kept.trim_start_matches(['.', '_']);
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_owned())
    }
}

#[must_use]
pub fn is_epub_name(name: &str) -> bool {
    Path::new(name)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("epub"))
}

/// An upload written under a staging name inside its session directory.
///
/// Nothing appears at the final path until [`StagedUpload::commit`], so a
/// rejected upload never replaces an accepted one.
#[derive(Debug)]
pub(crate) struct StagedUpload {
    staged: PathBuf,
    target: PathBuf,
}

impl StagedUpload {
    pub(crate) fn path(&self) -> &Path {
        &self.staged
    }

    /// Move the staged file to its final name, replacing an earlier upload of
    /// the same name in the same session.
    pub(crate) async fn commit(self) -> io::Result<PathBuf> {
        tokio::fs::rename(&self.staged, &self.target).await?;
        tracing::info!(path = %self.target.display(), "stored upload");
        Ok(self.target)
    }

    pub(crate) async fn discard(self) {
        if let Err(e) = tokio::fs::remove_file(&self.staged).await {
            tracing::warn!(path = %self.staged.display(), "failed to remove rejected upload: {e}");
        }
    }
}

/// Write an upload to a staging file under `dir/<session>/`, creating the
/// directories if needed.
pub(crate) async fn stage_upload(
    dir: &Path,
    session: SessionId,
    filename: &str,
    bytes: &[u8],
) -> io::Result<StagedUpload> {
    let session_dir = dir.join(session.to_string());
    tokio::fs::create_dir_all(&session_dir).await?;

    let staged = session_dir.join(format!(".{}.part", Uuid::new_v4()));
    tokio::fs::write(&staged, bytes).await?;
    tracing::debug!(path = %staged.display(), bytes = bytes.len(), "staged upload");

    Ok(StagedUpload {
        staged,
        target: session_dir.join(filename),
    })
}
