//! Renderers that turn generated code into a video file.
//!
//! - [`p5`] loads a sketch in headless Chrome over the DevTools protocol,
//!   screenshots a fixed number of frames and encodes them with FFmpeg.
//! - [`manim`] runs the Manim CLI on a scene script, streams its output
//!   into the job log and locates the finished file.
//!
//! Both write their final video to the job's canonical path from
//! [`RenderSettings::job_paths`].

use std::io;

use codereel_core::classify::ManimErrorKind;
use codereel_detect::DetectError;

pub mod cdp;
pub mod encode;
pub mod manim;
pub mod p5;
pub mod process;
pub mod settings;

pub use settings::{JobPaths, RenderSettings, FRAME_RATE};

/// A finished video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedVideo {
    pub path: std::path::PathBuf,
    /// URL path the video is served under.
    pub url: String,
    pub file_name: String,
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error(transparent)]
    ToolNotFound(#[from] DetectError),

    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("Browser session failed: {0}")]
    Browser(#[from] cdp::CdpError),

    #[error("Video encoding failed (exit code {exit_code:?}): {stderr}")]
    Encode {
        exit_code: Option<i32>,
        stderr: String,
    },

    /// Manim exited non-zero; `message` is the user-facing explanation.
    #[error("{message}")]
    Manim {
        kind: ManimErrorKind,
        message: String,
    },

    #[error("Render incomplete: Manim exited cleanly but only {partials} partial file(s) were written")]
    Incomplete { partials: usize },

    #[error("Render produced no output: {file_name} was not found and no partial files exist")]
    NoOutput { file_name: String },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl RenderError {
    /// Stable machine-readable code.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ToolNotFound(_) => "tool_not_found",
            Self::Spawn { .. } => "spawn_failed",
            Self::Browser(_) => "browser_failed",
            Self::Encode { .. } => "encode_failed",
            Self::Manim { kind, .. } => kind.code(),
            Self::Incomplete { .. } => "render_incomplete",
            Self::NoOutput { .. } => "no_output",
            Self::Io(_) => "io_error",
        }
    }
}
