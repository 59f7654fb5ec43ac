//! Encoding captured PNG frames into an H.264 MP4 with FFmpeg.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;

use crate::RenderError;

/// `printf`-style pattern the encoder reads frames with.
pub const FRAME_PATTERN: &str = "frame_%05d.png";

/// File name of the frame at zero-based `index`.
pub fn frame_file_name(index: u32) -> String {
    format!("frame_{index:05}.png")
}

/// Turns a directory of numbered frames into a video file.
pub trait FrameEncoder: Send + Sync {
    fn encode(
        &self,
        frames_dir: &Path,
        fps: u32,
        output: &Path,
    ) -> impl Future<Output = Result<(), RenderError>> + Send;
}

/// Encodes with the `ffmpeg` binary at `path`.
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    path: PathBuf,
}

impl FfmpegEncoder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Arguments for one encode. Odd frame sizes are rounded down to even,
    /// which `yuv420p` requires.
    pub fn args(frames_dir: &Path, fps: u32, output: &Path) -> Vec<String> {
        vec![
            "-y".into(),
            "-loglevel".into(),
            "error".into(),
            "-framerate".into(),
            fps.to_string(),
            "-i".into(),
            frames_dir.join(FRAME_PATTERN).to_string_lossy().into_owned(),
            "-vf".into(),
            "scale=trunc(iw/2)*2:trunc(ih/2)*2".into(),
            "-c:v".into(),
            "libx264".into(),
            "-pix_fmt".into(),
            "yuv420p".into(),
            "-movflags".into(),
            "+faststart".into(),
            output.to_string_lossy().into_owned(),
        ]
    }
}

impl FrameEncoder for FfmpegEncoder {
    async fn encode(&self, frames_dir: &Path, fps: u32, output: &Path) -> Result<(), RenderError> {
        let result = Command::new(&self.path)
            .args(Self::args(frames_dir, fps, output))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| RenderError::Spawn {
                program: self.path.display().to_string(),
                source,
            })?;

        if !result.status.success() {
            return Err(RenderError::Encode {
                exit_code: result.status.code(),
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }

        tracing::debug!(output = %output.display(), "Encoded frames");
        Ok(())
    }
}
