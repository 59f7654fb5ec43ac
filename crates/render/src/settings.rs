use std::path::{Path, PathBuf};
use std::time::Duration;

use codereel_core::config::{env_or, env_string, ConfigError};
use codereel_core::types::RunId;

/// Frames per second for captured sketches.
pub const FRAME_RATE: u32 = 30;

pub const DEFAULT_DURATION_SECS: u32 = 4;
pub const DEFAULT_MAX_DURATION_SECS: u32 = 30;
pub const DEFAULT_P5_LIBRARY_URL: &str = "https://cdn.jsdelivr.net/npm/p5@1.9.4/lib/p5.min.js";

/// Filesystem layout and renderer knobs.
#[derive(Debug, Clone)]
pub struct RenderSettings {
    /// Root of per-job output directories.
    pub media_root: PathBuf,
    /// Where generated scripts are written. Not cleaned up.
    pub scripts_dir: PathBuf,
    /// URL prefix `media_root` is served under.
    pub video_url_prefix: String,
    pub default_duration_secs: u32,
    pub max_duration_secs: u32,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub p5_library_url: String,
    /// Extra Chrome flags, e.g. `--no-sandbox` inside containers.
    pub chrome_args: Vec<String>,
    /// How long to wait for a sketch's setup phase.
    pub browser_ready_timeout: Duration,
    /// Manim quality letter (`l`, `m`, `h`, `p`, `k`).
    pub manim_quality: String,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            media_root: PathBuf::from("media"),
            scripts_dir: PathBuf::from("scripts"),
            video_url_prefix: "/videos".to_string(),
            default_duration_secs: DEFAULT_DURATION_SECS,
            max_duration_secs: DEFAULT_MAX_DURATION_SECS,
            viewport_width: 800,
            viewport_height: 600,
            p5_library_url: DEFAULT_P5_LIBRARY_URL.to_string(),
            chrome_args: Vec::new(),
            browser_ready_timeout: Duration::from_secs(30),
            manim_quality: "l".to_string(),
        }
    }
}

impl RenderSettings {
    /// Load settings from environment variables with defaults.
    ///
    /// | Env Var                      | Default   |
    /// |------------------------------|-----------|
    /// | `MEDIA_ROOT`                 | `media`   |
    /// | `SCRIPTS_DIR`                | `scripts` |
    /// | `DEFAULT_DURATION_SECS`      | `4`       |
    /// | `MAX_DURATION_SECS`          | `30`      |
    /// | `VIEWPORT_WIDTH`             | `800`     |
    /// | `VIEWPORT_HEIGHT`            | `600`     |
    /// | `P5_LIBRARY_URL`             | jsDelivr  |
    /// | `CHROME_ARGS`                | empty     |
    /// | `BROWSER_READY_TIMEOUT_SECS` | `30`      |
    /// | `MANIM_QUALITY`              | `l`       |
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let max_duration_secs: u32 = env_or("MAX_DURATION_SECS", DEFAULT_MAX_DURATION_SECS)?;
        let manim_quality = env_string("MANIM_QUALITY", &defaults.manim_quality);
        if !matches!(manim_quality.as_str(), "l" | "m" | "h" | "p" | "k") {
            return Err(ConfigError::Invalid {
                name: "MANIM_QUALITY",
                expected: "one of l, m, h, p, k",
                value: manim_quality,
            });
        }

        Ok(Self {
            media_root: PathBuf::from(env_string("MEDIA_ROOT", "media")),
            scripts_dir: PathBuf::from(env_string("SCRIPTS_DIR", "scripts")),
            video_url_prefix: defaults.video_url_prefix,
            default_duration_secs: env_or("DEFAULT_DURATION_SECS", DEFAULT_DURATION_SECS)?
                .clamp(1, max_duration_secs.max(1)),
            max_duration_secs: max_duration_secs.max(1),
            viewport_width: even(env_or("VIEWPORT_WIDTH", defaults.viewport_width)?),
            viewport_height: even(env_or("VIEWPORT_HEIGHT", defaults.viewport_height)?),
            p5_library_url: env_string("P5_LIBRARY_URL", DEFAULT_P5_LIBRARY_URL),
            chrome_args: env_string("CHROME_ARGS", "")
                .split_whitespace()
                .map(str::to_string)
                .collect(),
            browser_ready_timeout: Duration::from_secs(env_or("BROWSER_READY_TIMEOUT_SECS", 30)?),
            manim_quality,
        })
    }

    /// Requested duration clamped to `1..=max_duration_secs`, or the default.
    pub fn clamp_duration(&self, requested: Option<u32>) -> u32 {
        requested
            .unwrap_or(self.default_duration_secs)
            .clamp(1, self.max_duration_secs)
    }

    /// Number of frames captured for a sketch of `duration_secs`.
    pub fn frame_count(duration_secs: u32) -> u32 {
        duration_secs * FRAME_RATE
    }

    /// Path of the script file for a job.
    pub fn script_path(&self, run_id: &RunId, extension: &str) -> PathBuf {
        self.scripts_dir.join(format!("{run_id}.{extension}"))
    }

    pub fn job_paths(&self, run_id: &RunId) -> JobPaths {
        let file_name = format!("{run_id}.mp4");
        let job_dir = self.media_root.join(run_id.as_str());
        JobPaths {
            video: job_dir.join(&file_name),
            url: format!(
                "{}/{run_id}/{file_name}",
                self.video_url_prefix.trim_end_matches('/')
            ),
            job_dir,
            file_name,
        }
    }
}

/// Per-job output locations.
#[derive(Debug, Clone)]
pub struct JobPaths {
    /// `MEDIA_ROOT/<run_id>`.
    pub job_dir: PathBuf,
    /// Canonical video path, `MEDIA_ROOT/<run_id>/<run_id>.mp4`.
    pub video: PathBuf,
    pub file_name: String,
    pub url: String,
}

impl JobPaths {
    pub fn frames_dir(&self) -> PathBuf {
        self.job_dir.join("frames")
    }

    pub fn work_dir(&self) -> PathBuf {
        self.job_dir.join("work")
    }

    pub fn browser_profile_dir(&self) -> PathBuf {
        self.job_dir.join("browser-profile")
    }
}

/// Round down to an even number; yuv420p needs even dimensions.
fn even(value: u32) -> u32 {
    (value.max(2)) & !1
}

/// Absolute form of `path`, relative to the current directory.
pub(crate) fn absolute(path: &Path) -> std::io::Result<PathBuf> {
    std::path::absolute(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_is_clamped() {
        let settings = RenderSettings::default();
        assert_eq!(settings.clamp_duration(None), 4);
        assert_eq!(settings.clamp_duration(Some(0)), 1);
        assert_eq!(settings.clamp_duration(Some(500)), 30);
    }

    #[test]
    fn frame_count_is_thirty_per_second() {
        assert_eq!(RenderSettings::frame_count(4), 120);
        assert_eq!(RenderSettings::frame_count(1), 30);
    }

    #[test]
    fn job_paths_are_named_by_run_id() {
        let settings = RenderSettings {
            media_root: PathBuf::from("/srv/media"),
            ..RenderSettings::default()
        };
        let paths = settings.job_paths(&RunId::from("abc"));
        assert_eq!(paths.video, PathBuf::from("/srv/media/abc/abc.mp4"));
        assert_eq!(paths.url, "/videos/abc/abc.mp4");
        assert_eq!(paths.work_dir(), PathBuf::from("/srv/media/abc/work"));
    }

    #[test]
    fn even_rounds_down() {
        assert_eq!(even(801), 800);
        assert_eq!(even(600), 600);
        assert_eq!(even(0), 2);
    }
}
