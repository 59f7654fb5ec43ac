//! Cleaning and validating generated code.

use std::sync::LazyLock;

use codereel_core::types::Engine;
use regex::Regex;

use crate::CodegenError;

/// Every sketch must start with this.
pub const SKETCH_SIGNATURE: &str = "function setup()";

/// Every scene script must contain this.
pub const SCENE_CLASS_NAME: &str = "class GeneratedScene";

pub use codereel_core::types::SCENE_NAME;

/// A Manim construct that is known to break rendering.
pub struct BannedConstruct {
    pub pattern: Regex,
    pub reason: &'static str,
}

/// Denylisted Manim usages, checked in order.
pub static MANIM_DENYLIST: LazyLock<Vec<BannedConstruct>> = LazyLock::new(|| {
    [
        (r"\bGraphScene\b", "GraphScene was removed from Manim Community; use Axes in a Scene"),
        (r"\.get_graph\s*\(", "Axes.get_graph was removed; use Axes.plot"),
        (r"\bsetup_axes\s*\(", "setup_axes belongs to the removed GraphScene"),
        (r"\bShowCreation\b", "ShowCreation was renamed to Create"),
        (r"\b(?:TextMobject|TexMobject)\b", "legacy text classes; use Text or MathTex"),
        (r"\b(?:from|import)\s+manimlib\b", "manimlib (3b1b manim) is not installed"),
        (r"\bCONFIG\s*=\s*\{", "CONFIG dictionaries are not supported"),
        (r"\b(?:ImageMobject|SVGMobject)\s*\(", "external asset files are not available"),
        (r"\badd_sound\s*\(", "external sound files are not available"),
    ]
    .into_iter()
    .map(|(pattern, reason)| BannedConstruct {
        pattern: Regex::new(pattern).expect("valid regex"),
        reason,
    })
    .collect()
});

static OPENING_FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^```[\w+-]*[ \t]*\r?\n?").expect("valid regex"));

static CLOSING_FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\r?\n?```\s*$").expect("valid regex"));

/// Remove a leading ```` ```lang ```` line and a trailing ```` ``` ````.
pub fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    let without_open = OPENING_FENCE_RE.replace(trimmed, "");
    let without_close = CLOSING_FENCE_RE.replace(&without_open, "");
    without_close.trim().to_string()
}

/// Check that `code` has the shape `engine` expects.
pub fn validate(engine: Engine, code: &str) -> Result<(), CodegenError> {
    match engine {
        Engine::P5 => {
            if !code.trim_start().starts_with(SKETCH_SIGNATURE) {
                return Err(CodegenError::ShapeMismatch {
                    engine,
                    expected: "the sketch to start with `function setup()`",
                });
            }
        }
        Engine::Manim => {
            if !code.contains(SCENE_CLASS_NAME) {
                return Err(CodegenError::ShapeMismatch {
                    engine,
                    expected: "a `class GeneratedScene` definition",
                });
            }
            if let Some(banned) = MANIM_DENYLIST.iter().find(|b| b.pattern.is_match(code)) {
                return Err(CodegenError::BannedConstruct {
                    pattern: banned.pattern.as_str().to_string(),
                    reason: banned.reason,
                });
            }
        }
    }
    Ok(())
}
