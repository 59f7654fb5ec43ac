use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Engine name for the p5.js sketch backend.
pub const ENGINE_P5: &str = "p5";
/// Engine name for the Manim scene backend.
pub const ENGINE_MANIM: &str = "manim";

/// All valid engine names.
pub const VALID_ENGINES: &[&str] = &[ENGINE_P5, ENGINE_MANIM];

/// Scene class every generated Manim script defines and the renderer asks
/// the CLI for.
pub const SCENE_NAME: &str = "GeneratedScene";

/// Which rendering backend a job uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    /// Interactive canvas sketch, rendered by a headless browser.
    P5,
    /// Scene description, rendered by the Manim CLI.
    Manim,
}

impl Engine {
    /// Every engine, in display order.
    pub const ALL: [Engine; 2] = [Engine::P5, Engine::Manim];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::P5 => ENGINE_P5,
            Self::Manim => ENGINE_MANIM,
        }
    }
}

impl FromStr for Engine {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            ENGINE_P5 => Ok(Self::P5),
            ENGINE_MANIM => Ok(Self::Manim),
            _ => Err(CoreError::InvalidEngine(s.to_string())),
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque identifier of one render job.
///
/// Generated from a UUID v7 so ids sort roughly by creation time, but
/// callers must treat the value as an opaque string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for RunId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for RunId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
