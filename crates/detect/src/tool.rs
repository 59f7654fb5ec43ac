//! Tool kinds, detection results and the resolution chain.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::chrome;
use crate::env::DetectorEnv;
use crate::search::{find_in_path, is_executable};

/// An external executable a renderer needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    Chrome,
    Manim,
    Tex,
    Python,
    Ffmpeg,
}

impl ToolKind {
    pub const ALL: [ToolKind; 5] = [
        ToolKind::Chrome,
        ToolKind::Manim,
        ToolKind::Tex,
        ToolKind::Python,
        ToolKind::Ffmpeg,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Chrome => "Chrome",
            Self::Manim => "Manim",
            Self::Tex => "LaTeX",
            Self::Python => "Python",
            Self::Ffmpeg => "FFmpeg",
        }
    }

    /// Override variables, checked in order before anything else.
    pub fn env_vars(&self) -> &'static [&'static str] {
        match self {
            Self::Chrome => &["CHROME_PATH", "PUPPETEER_EXECUTABLE_PATH"],
            Self::Manim => &["MANIM_PATH"],
            Self::Tex => &["TEX_PATH"],
            Self::Python => &["PYTHON_PATH"],
            Self::Ffmpeg => &["FFMPEG_PATH"],
        }
    }

    /// Binary names tried against `PATH`, in order.
    pub fn candidates(&self) -> &'static [&'static str] {
        match self {
            Self::Chrome => &[
                "google-chrome",
                "google-chrome-stable",
                "chromium",
                "chromium-browser",
                "chrome",
            ],
            Self::Manim => &["manim"],
            Self::Tex => &["latex", "pdflatex", "xelatex"],
            Self::Python => &["python3", "python"],
            Self::Ffmpeg => &["ffmpeg"],
        }
    }

    /// Remediation hint attached to a not-found error.
    pub fn hint(&self) -> &'static str {
        match self {
            Self::Chrome => {
                "Install Google Chrome or Chromium, or set CHROME_PATH to the browser executable"
            }
            Self::Manim => "Install Manim with `pip install manim`, or set MANIM_PATH",
            Self::Tex => {
                "Install a TeX distribution (TeX Live, MiKTeX or MacTeX), or set TEX_PATH"
            }
            Self::Python => "Install Python 3 and make sure it is on PATH, or set PYTHON_PATH",
            Self::Ffmpeg => "Install FFmpeg and make sure it is on PATH, or set FFMPEG_PATH",
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// How a tool was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    EnvOverride,
    PathLookup,
    KnownLocation,
    Registry,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetectedTool {
    pub path: PathBuf,
    pub method: DetectionMethod,
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum DetectError {
    #[error("{tool} not found. Searched: {paths}. {hint}", paths = .searched.join(", "))]
    NotFound {
        tool: ToolKind,
        searched: Vec<String>,
        hint: &'static str,
    },
}

impl DetectError {
    pub fn hint(&self) -> &'static str {
        match self {
            Self::NotFound { hint, .. } => hint,
        }
    }
}

/// Run the full resolution chain for `kind`. Blocking filesystem access.
pub fn detect(kind: ToolKind, env: &DetectorEnv) -> Result<DetectedTool, DetectError> {
    let mut searched = Vec::new();

    for var in kind.env_vars() {
        let Some(value) = env.var(var) else {
            continue;
        };
        let path = PathBuf::from(value);
        if is_executable(&path) {
            return Ok(DetectedTool {
                path,
                method: DetectionMethod::EnvOverride,
            });
        }
        tracing::warn!(
            tool = %kind,
            var,
            path = %path.display(),
            "Override path is not an executable file, ignoring",
        );
        searched.push(format!("${var}={}", path.display()));
    }

    for name in kind.candidates() {
        if let Some(path) = find_in_path(name, env) {
            return Ok(DetectedTool {
                path,
                method: DetectionMethod::PathLookup,
            });
        }
    }
    searched.push(format!("PATH ({})", kind.candidates().join(", ")));

    if kind == ToolKind::Chrome {
        for path in chrome::known_locations(env) {
            if is_executable(&path) {
                return Ok(DetectedTool {
                    path,
                    method: DetectionMethod::KnownLocation,
                });
            }
        }
        searched.push("known install locations".to_string());

        if let Some(path) = chrome::registry_lookup() {
            return Ok(DetectedTool {
                path,
                method: DetectionMethod::Registry,
            });
        }
        if cfg!(windows) {
            searched.push("registry App Paths".to_string());
        }
    }

    Err(DetectError::NotFound {
        tool: kind,
        searched,
        hint: kind.hint(),
    })
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[cfg(unix)]
    fn make_executable(path: &std::path::Path) {
        use std::os::unix::fs::PermissionsExt;
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"#!/bin/sh\n").unwrap();
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn env_override_takes_precedence_over_path() {
        let override_dir = tempfile::tempdir().unwrap();
        let path_dir = tempfile::tempdir().unwrap();
        let custom = override_dir.path().join("my-manim");
        make_executable(&custom);
        make_executable(&path_dir.path().join("manim"));

        let env = DetectorEnv::empty()
            .with_var("MANIM_PATH", custom.as_os_str())
            .with_var("PATH", path_dir.path().as_os_str());

        let found = detect(ToolKind::Manim, &env).unwrap();
        assert_eq!(found.path, custom);
        assert_eq!(found.method, DetectionMethod::EnvOverride);
    }

    #[cfg(unix)]
    #[test]
    fn invalid_override_falls_through_to_path() {
        let path_dir = tempfile::tempdir().unwrap();
        make_executable(&path_dir.path().join("ffmpeg"));

        let env = DetectorEnv::empty()
            .with_var("FFMPEG_PATH", "/definitely/not/here/ffmpeg")
            .with_var("PATH", path_dir.path().as_os_str());

        let found = detect(ToolKind::Ffmpeg, &env).unwrap();
        assert_eq!(found.path, path_dir.path().join("ffmpeg"));
        assert_eq!(found.method, DetectionMethod::PathLookup);
    }

    #[cfg(unix)]
    #[test]
    fn later_candidate_names_are_tried() {
        let path_dir = tempfile::tempdir().unwrap();
        make_executable(&path_dir.path().join("pdflatex"));

        let env = DetectorEnv::empty().with_var("PATH", path_dir.path().as_os_str());

        let found = detect(ToolKind::Tex, &env).unwrap();
        assert_eq!(found.path, path_dir.path().join("pdflatex"));
    }

    #[test]
    fn exhaustion_names_searched_locations_and_hint() {
        let empty = tempfile::tempdir().unwrap();
        let env = DetectorEnv::empty()
            .with_var("MANIM_PATH", "/nope/manim")
            .with_var("PATH", empty.path().as_os_str());

        let err = detect(ToolKind::Manim, &env).unwrap_err();

        assert_matches!(&err, DetectError::NotFound { tool: ToolKind::Manim, searched, .. } if searched.len() == 2);
        let message = err.to_string();
        assert!(message.contains("$MANIM_PATH=/nope/manim"), "{message}");
        assert!(message.contains("pip install manim"), "{message}");
    }
}
