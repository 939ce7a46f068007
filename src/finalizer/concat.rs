use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, error};

#[derive(Debug, Error)]
pub enum ConcatError {
    #[error("concatenation I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("{tool} exited with {status}: {output}")]
    Tool {
        tool: String,
        status: String,
        output: String,
    },
}

/// Merges same-codec media segments into one file without re-encoding
#[async_trait]
pub trait MediaConcatenator: Send + Sync {
    /// `chunks` are already in playback order
    async fn concatenate(&self, chunks: &[PathBuf], output: &Path) -> Result<(), ConcatError>;
}

/// Stream-copy concatenation with ffmpeg's concat protocol
pub struct FfmpegConcatenator {
    binary: PathBuf,
}

impl FfmpegConcatenator {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// `concat:a|b|c` input for ffmpeg
    pub fn concat_input(chunks: &[PathBuf]) -> String {
        let joined = chunks
            .iter()
            .map(|chunk| chunk.display().to_string())
            .collect::<Vec<_>>()
            .join("|");
        format!("concat:{}", joined)
    }
}

impl Default for FfmpegConcatenator {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

#[async_trait]
impl MediaConcatenator for FfmpegConcatenator {
    async fn concatenate(&self, chunks: &[PathBuf], output: &Path) -> Result<(), ConcatError> {
        let input = Self::concat_input(chunks);
        debug!("Running FFmpeg concatenation of {} chunks into {}", chunks.len(), output.display());

        // -c copy: copy streams without re-encoding
        // -y: overwrite output file
        let result = Command::new(&self.binary)
            .args(["-hide_banner", "-loglevel", "error"])
            .arg("-i")
            .arg(&input)
            .args(["-c", "copy", "-y"])
            .arg(output)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr).trim().to_string();
            error!("FFmpeg concatenation failed: {}", stderr);
            return Err(ConcatError::Tool {
                tool: self.binary.display().to_string(),
                status: result.status.to_string(),
                output: stderr,
            });
        }

        debug!("FFmpeg concatenation completed");
        Ok(())
    }
}

/// Appends chunk bytes in order.
///
/// Valid for formats whose segments are independently decodable when
/// concatenated (e.g. MPEG-TS, raw Opus/WebM clusters from a single
/// MediaRecorder session).
#[derive(Debug, Default)]
pub struct ByteStreamConcatenator;

#[async_trait]
impl MediaConcatenator for ByteStreamConcatenator {
    async fn concatenate(&self, chunks: &[PathBuf], output: &Path) -> Result<(), ConcatError> {
        let mut out = File::create(output).await?;
        for chunk in chunks {
            let mut input = File::open(chunk).await?;
            tokio::io::copy(&mut input, &mut out).await?;
        }
        out.flush().await?;
        Ok(())
    }
}
