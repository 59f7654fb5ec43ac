//! Classification rules for renderer output.
//!
//! Two concerns live here:
//!
//! - [`classify_line`] tags a single stderr line as progress, error or plain
//!   output. This only affects how the line is presented in the job log.
//! - [`classify_failure`] maps the captured stderr of a failed Manim run to
//!   a [`ManimErrorKind`] using [`MANIM_ERROR_RULES`], an ordered list of
//!   `(pattern, kind)` pairs where the first match wins.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

// ---------------------------------------------------------------------------
// Line classification
// ---------------------------------------------------------------------------

/// How a single line of renderer output is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputLineKind {
    Progress,
    Error,
    Output,
}

/// Animation progress bars, e.g. `Animation 0: Create(Circle):  45%|####`.
static PROGRESS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*Animation \d+|\d{1,3}%\|").expect("valid regex"));

static ERROR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)error|traceback|exception").expect("valid regex"));

/// Python exception lines, e.g. `NameError: name 'foo' is not defined`.
static EXCEPTION_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:[\w.]+\.)?\w*(?:Error|Exception)\b.*$").expect("valid regex")
});

pub fn classify_line(line: &str) -> OutputLineKind {
    if PROGRESS_RE.is_match(line) {
        OutputLineKind::Progress
    } else if ERROR_RE.is_match(line) {
        OutputLineKind::Error
    } else {
        OutputLineKind::Output
    }
}

/// The last line of `stderr` that looks like a Python exception message.
pub fn last_exception_line(stderr: &str) -> Option<&str> {
    stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| EXCEPTION_LINE_RE.is_match(line))
}

// ---------------------------------------------------------------------------
// Failure classification
// ---------------------------------------------------------------------------

/// Typed reason a Manim run exited non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ManimErrorKind {
    MissingModule,
    LatexFailed,
    SyntaxError,
    UndefinedName,
    UnknownAttribute,
    BadArguments,
    InvalidValue,
    ImportFailed,
    Unknown,
}

impl ManimErrorKind {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingModule => "missing_module",
            Self::LatexFailed => "latex_failed",
            Self::SyntaxError => "syntax_error",
            Self::UndefinedName => "undefined_name",
            Self::UnknownAttribute => "unknown_attribute",
            Self::BadArguments => "bad_arguments",
            Self::InvalidValue => "invalid_value",
            Self::ImportFailed => "import_failed",
            Self::Unknown => "render_failed",
        }
    }

    /// Message shown to the user.
    pub fn message(&self) -> &'static str {
        match self {
            Self::MissingModule => {
                "The scene needs a Python module that is not installed in the Manim environment"
            }
            Self::LatexFailed => {
                "LaTeX rendering failed; install a TeX distribution or avoid Tex/MathTex"
            }
            Self::SyntaxError => "The generated scene is not valid Python",
            Self::UndefinedName => "The generated scene uses a name that is not defined",
            Self::UnknownAttribute => {
                "The generated scene calls a method or attribute Manim does not provide"
            }
            Self::BadArguments => "The generated scene passes invalid arguments to a Manim call",
            Self::InvalidValue => "The generated scene produced an invalid value during rendering",
            Self::ImportFailed => "Manim failed to import part of its own library",
            Self::Unknown => "Manim exited with an error",
        }
    }
}

/// Ordered classification rules; the first matching pattern wins.
pub static MANIM_ERROR_RULES: LazyLock<Vec<(Regex, ManimErrorKind)>> = LazyLock::new(|| {
    [
        (r"ModuleNotFoundError|No module named", ManimErrorKind::MissingModule),
        (r"(?i)latex", ManimErrorKind::LatexFailed),
        (r"SyntaxError|IndentationError", ManimErrorKind::SyntaxError),
        (r"NameError", ManimErrorKind::UndefinedName),
        (r"AttributeError", ManimErrorKind::UnknownAttribute),
        (r"TypeError", ManimErrorKind::BadArguments),
        (r"ValueError|IndexError", ManimErrorKind::InvalidValue),
        (r"ImportError", ManimErrorKind::ImportFailed),
    ]
    .into_iter()
    .map(|(pattern, kind)| (Regex::new(pattern).expect("valid regex"), kind))
    .collect()
});

/// Classify the captured stderr of a failed Manim run.
pub fn classify_failure(stderr: &str) -> ManimErrorKind {
    MANIM_ERROR_RULES
        .iter()
        .find(|(re, _)| re.is_match(stderr))
        .map(|(_, kind)| *kind)
        .unwrap_or(ManimErrorKind::Unknown)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_bar_is_progress_even_with_error_word() {
        let line = "Animation 2: Write(ErrorText):  45%|####      | 27/60";
        assert_eq!(classify_line(line), OutputLineKind::Progress);
    }

    #[test]
    fn traceback_is_error() {
        assert_eq!(
            classify_line("Traceback (most recent call last):"),
            OutputLineKind::Error
        );
        assert_eq!(classify_line("  raise EXCEPTION"), OutputLineKind::Error);
    }

    #[test]
    fn plain_line_is_output() {
        assert_eq!(
            classify_line("File ready at media/videos/scene.mp4"),
            OutputLineKind::Output
        );
    }

    #[test]
    fn missing_module_wins_over_later_rules() {
        let stderr = "Traceback\nModuleNotFoundError: No module named 'numpyy'\nTypeError: x";
        assert_eq!(classify_failure(stderr), ManimErrorKind::MissingModule);
    }

    #[test]
    fn latex_failure_is_detected_case_insensitively() {
        let stderr = "ValueError: latex error converting to dvi. See log output above";
        assert_eq!(classify_failure(stderr), ManimErrorKind::LatexFailed);
    }

    #[test]
    fn attribute_error_is_classified() {
        let stderr = "AttributeError: 'Circle' object has no attribute 'get_graph'";
        assert_eq!(classify_failure(stderr), ManimErrorKind::UnknownAttribute);
    }

    #[test]
    fn unmatched_stderr_falls_back_to_unknown() {
        assert_eq!(classify_failure("Killed"), ManimErrorKind::Unknown);
        assert_eq!(ManimErrorKind::Unknown.code(), "render_failed");
    }

    #[test]
    fn last_exception_line_picks_final_exception() {
        let stderr = "Traceback (most recent call last):\n  File \"s.py\", line 3\nNameError: name 'foo' is not defined\n";
        assert_eq!(
            last_exception_line(stderr),
            Some("NameError: name 'foo' is not defined")
        );
        assert_eq!(last_exception_line("all good"), None);
    }
}
