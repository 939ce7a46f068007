//! Recording finalization
//!
//! Turns the ordered chunk files a bot left in its temp directory into one
//! final recording, then schedules removal of the temp directory.

mod concat;
mod storage;

pub use concat::{ByteStreamConcatenator, ConcatError, FfmpegConcatenator, MediaConcatenator};
pub use storage::{StorageLayout, FINAL_FOLDER, TEMP_FOLDER};

use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::session::SessionId;

pub const DEFAULT_CLEANUP_DELAY: Duration = Duration::from_secs(5);

const MAX_NAME_ATTEMPTS: u32 = 100;

#[derive(Debug, Error)]
pub enum FinalizeError {
    #[error("chunks directory does not exist: {0}")]
    NoChunksDirectory(PathBuf),
    #[error("no chunks found in {0}")]
    NoChunks(PathBuf),
    #[error("failed to concatenate chunks: {0}")]
    ConcatFailed(#[from] ConcatError),
    #[error("no free output name in {0}")]
    OutputNameExhausted(PathBuf),
    #[error("output file not created: {0}")]
    ConcatVerificationFailed(PathBuf),
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// A final recording written to storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizedRecording {
    /// Relative to the storage root, e.g. `final/session_7_20250101_120000_000.webm`
    pub relative_path: String,
    pub absolute_path: PathBuf,
    pub chunk_count: usize,
    pub size_bytes: u64,
}

pub struct Finalizer {
    layout: StorageLayout,
    concatenator: Arc<dyn MediaConcatenator>,
    cleanup_delay: Duration,
}

impl Finalizer {
    pub fn new(layout: StorageLayout, concatenator: Arc<dyn MediaConcatenator>) -> Self {
        Self {
            layout,
            concatenator,
            cleanup_delay: DEFAULT_CLEANUP_DELAY,
        }
    }

    pub fn with_cleanup_delay(mut self, delay: Duration) -> Self {
        self.cleanup_delay = delay;
        self
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    /// Concatenate a session's chunks into its final recording.
    ///
    /// Nothing is written under `final/` unless at least one chunk exists.
    /// The temp directory is removed in the background after the cleanup
    /// delay, and only when concatenation succeeded.
    pub async fn finalize(
        &self,
        session_id: SessionId,
        process_ref: &str,
    ) -> Result<FinalizedRecording, FinalizeError> {
        info!(
            session_id = %session_id,
            process_ref = %process_ref,
            "Starting recording finalization"
        );

        let temp_dir = self.layout.temp_dir(session_id);
        let chunks = self.list_chunks(&temp_dir).await?;
        info!(session_id = %session_id, "Found {} chunks to concatenate", chunks.len());

        let final_dir = self.layout.final_dir();
        tokio::fs::create_dir_all(&final_dir).await?;

        let (file_name, output) = self.reserve_output(session_id, &final_dir).await?;

        if let Err(e) = self.concatenator.concatenate(&chunks, &output).await {
            remove_partial_output(&output).await;
            return Err(e.into());
        }

        let size_bytes = match tokio::fs::metadata(&output).await {
            Ok(meta) if meta.is_file() && meta.len() > 0 => meta.len(),
            _ => {
                remove_partial_output(&output).await;
                return Err(FinalizeError::ConcatVerificationFailed(output));
            }
        };

        info!(
            session_id = %session_id,
            output = %output.display(),
            size_bytes,
            "Recording finalized"
        );

        self.schedule_cleanup(temp_dir);

        Ok(FinalizedRecording {
            relative_path: self.layout.relative_final_path(&file_name),
            absolute_path: output,
            chunk_count: chunks.len(),
            size_bytes,
        })
    }

    /// Claim an unused output name so two finalizations never write to the
    /// same file. The empty placeholder is overwritten by the concatenator.
    async fn reserve_output(
        &self,
        session_id: SessionId,
        final_dir: &Path,
    ) -> Result<(String, PathBuf), FinalizeError> {
        let at = Utc::now();
        for attempt in 0..MAX_NAME_ATTEMPTS {
            let file_name = self.layout.final_file_name(session_id, at, attempt);
            let output = final_dir.join(&file_name);
            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&output)
                .await
            {
                Ok(_) => return Ok((file_name, output)),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    debug!(session_id = %session_id, "Output name {} taken", file_name);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(FinalizeError::OutputNameExhausted(final_dir.to_path_buf()))
    }

    /// Chunk files in `dir` in playback order
    pub async fn list_chunks(&self, dir: &Path) -> Result<Vec<PathBuf>, FinalizeError> {
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(FinalizeError::NoChunksDirectory(dir.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };

        let mut chunks = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_file() && self.layout.is_chunk(&path) {
                chunks.push(path);
            }
        }

        if chunks.is_empty() {
            return Err(FinalizeError::NoChunks(dir.to_path_buf()));
        }

        chunks.sort();
        Ok(chunks)
    }

    fn schedule_cleanup(&self, temp_dir: PathBuf) {
        let delay = self.cleanup_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match tokio::fs::remove_dir_all(&temp_dir).await {
                Ok(()) => debug!("Cleaned up temp directory {}", temp_dir.display()),
                Err(e) => warn!(
                    "Failed to cleanup temp directory {}: {}",
                    temp_dir.display(),
                    e
                ),
            }
        });
    }
}

async fn remove_partial_output(output: &Path) {
    if let Err(e) = tokio::fs::remove_file(output).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            error!("Failed to remove partial output {}: {}", output.display(), e);
        }
    }
}
