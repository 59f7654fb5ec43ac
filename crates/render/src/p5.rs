//! p5.js sketches: headless capture then FFmpeg encode.
//!
//! The sketch is inlined into an HTML page that loads p5 and wraps the
//! user's `setup()` so it ends with `noLoop()`. Once `frameCount` exists
//! the renderer alternates `Page.captureScreenshot` and `redraw()`,
//! writing `FRAME_RATE * duration` numbered PNGs, then hands the frame
//! directory to a [`FrameEncoder`]. The frame directory is removed after
//! encoding whether or not it succeeded.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use codereel_core::log_sink::LogSink;
use codereel_core::types::RunId;
use codereel_detect::{ToolContext, ToolKind};

use crate::cdp::{Browser, LaunchOptions, PageSession};
use crate::encode::{frame_file_name, FfmpegEncoder, FrameEncoder};
use crate::settings::{absolute, RenderSettings, FRAME_RATE};
use crate::{RenderError, RenderedVideo};

/// Expression that becomes true once p5 has started in global mode.
pub const READY_EXPRESSION: &str = "typeof frameCount !== 'undefined'";

static SCRIPT_CLOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</(script)").expect("valid regex"));

/// Log a capture progress line every this many frames.
const PROGRESS_EVERY: u32 = FRAME_RATE;

/// A loaded sketch that can be screenshotted and stepped one frame.
pub trait SketchPage: Send {
    fn screenshot(&mut self) -> impl Future<Output = Result<Vec<u8>, RenderError>> + Send;
    fn advance(&mut self) -> impl Future<Output = Result<(), RenderError>> + Send;
}

impl SketchPage for PageSession<'_> {
    async fn screenshot(&mut self) -> Result<Vec<u8>, RenderError> {
        Ok(self.screenshot_png().await?)
    }

    async fn advance(&mut self) -> Result<(), RenderError> {
        self.evaluate("redraw()").await?;
        Ok(())
    }
}

/// Renders p5.js sketches to MP4.
pub struct P5Renderer<'a> {
    settings: &'a RenderSettings,
    tools: &'a ToolContext,
}

impl<'a> P5Renderer<'a> {
    pub fn new(settings: &'a RenderSettings, tools: &'a ToolContext) -> Self {
        Self { settings, tools }
    }

    pub async fn render<S: LogSink>(
        &self,
        code: &str,
        run_id: &RunId,
        duration_secs: u32,
        sink: &S,
    ) -> Result<RenderedVideo, RenderError> {
        let paths = self.settings.job_paths(run_id);
        let frame_count = RenderSettings::frame_count(duration_secs);

        tokio::fs::create_dir_all(&self.settings.scripts_dir).await?;
        tokio::fs::create_dir_all(&paths.job_dir).await?;

        let script_path = self.settings.script_path(run_id, "js");
        tokio::fs::write(&script_path, code).await?;
        let html_path = self.settings.script_path(run_id, "html");
        tokio::fs::write(&html_path, sketch_html(code, &self.settings.p5_library_url)).await?;
        sink.log(format!("Saved sketch to {}", script_path.display())).await;

        let chrome = self.tools.resolve(ToolKind::Chrome).await?;
        let ffmpeg = self.tools.resolve(ToolKind::Ffmpeg).await?;
        sink.log(format!("Using browser at {}", chrome.path.display())).await;

        let frames_dir = paths.frames_dir();
        tokio::fs::create_dir_all(&frames_dir).await?;

        let captured: Result<u32, RenderError> = async {
            let mut browser = Browser::launch(
                &chrome.path,
                LaunchOptions {
                    width: self.settings.viewport_width,
                    height: self.settings.viewport_height,
                    profile_dir: paths.browser_profile_dir(),
                    extra_args: self.settings.chrome_args.clone(),
                },
            )
            .await?;

            let result = self
                .capture_in(&mut browser, &html_path, &frames_dir, frame_count, sink)
                .await;
            browser.close().await;
            result
        }
        .await;

        if let Err(e) = captured {
            remove_frames(&frames_dir).await;
            return Err(e);
        }

        let encoder = FfmpegEncoder::new(ffmpeg.path);
        encode_and_clean(&encoder, &frames_dir, &paths.video, sink).await?;
        sink.log(format!("Video written to {}", paths.video.display())).await;

        Ok(RenderedVideo {
            path: paths.video,
            url: paths.url,
            file_name: paths.file_name,
        })
    }

    async fn capture_in<S: LogSink>(
        &self,
        browser: &mut Browser,
        html_path: &Path,
        frames_dir: &Path,
        frame_count: u32,
        sink: &S,
    ) -> Result<u32, RenderError> {
        let mut page = browser.new_page().await?;
        page.navigate(&file_url(&absolute(html_path)?)?).await?;
        page.wait_for(READY_EXPRESSION, self.settings.browser_ready_timeout)
            .await?;
        sink.log(format!("Sketch loaded, capturing {frame_count} frames")).await;
        capture_frames(&mut page, frames_dir, frame_count, sink).await
    }
}

/// Screenshot then advance, `frame_count` times. Returns the number of
/// frames written.
pub async fn capture_frames<P: SketchPage, S: LogSink>(
    page: &mut P,
    frames_dir: &Path,
    frame_count: u32,
    sink: &S,
) -> Result<u32, RenderError> {
    for index in 0..frame_count {
        let png = page.screenshot().await?;
        tokio::fs::write(frames_dir.join(frame_file_name(index)), png).await?;
        page.advance().await?;

        let done = index + 1;
        if done % PROGRESS_EVERY == 0 || done == frame_count {
            sink.log(format!("[progress] Captured {done}/{frame_count} frames")).await;
        }
    }
    Ok(frame_count)
}

/// Encode `frames_dir` into `output`, then delete `frames_dir`.
pub async fn encode_and_clean<E: FrameEncoder, S: LogSink>(
    encoder: &E,
    frames_dir: &Path,
    output: &Path,
    sink: &S,
) -> Result<(), RenderError> {
    sink.log(format!("Encoding frames at {FRAME_RATE} fps")).await;
    let result = encoder.encode(frames_dir, FRAME_RATE, output).await;
    remove_frames(frames_dir).await;
    if let Err(e) = &result {
        sink.log(format!("[error] {e}")).await;
    }
    result
}

async fn remove_frames(frames_dir: &Path) {
    if let Err(e) = tokio::fs::remove_dir_all(frames_dir).await {
        tracing::warn!(error = %e, dir = %frames_dir.display(), "Failed to remove frames directory");
    }
}

/// HTML page that loads p5 from `p5_url` and runs `code` once per
/// `redraw()`.
pub fn sketch_html(code: &str, p5_url: &str) -> String {
    let code = SCRIPT_CLOSE.replace_all(code, r"<\/$1");
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<style>html, body {{ margin: 0; padding: 0; overflow: hidden; background: #000; }}</style>
<script src="{p5_url}"></script>
</head>
<body>
<script>
{code}
</script>
<script>
(function () {{
  var userSetup = window.setup;
  window.setup = function () {{
    if (typeof userSetup === 'function') {{ userSetup(); }}
    noLoop();
  }};
}})();
</script>
</body>
</html>
"#
    )
}

/// `file://` URL for an absolute path, percent-encoded.
pub fn file_url(path: &Path) -> Result<String, RenderError> {
    url::Url::from_file_path(path)
        .map(String::from)
        .map_err(|()| {
            RenderError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("not an absolute path: {}", path.display()),
            ))
        })
}

/// Paths of captured frames in `dir`, sorted.
pub fn list_frames(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut frames: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "png"))
        .collect();
    frames.sort();
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use assert_matches::assert_matches;
    use codereel_core::log_sink::NullSink;

    use super::*;

    #[derive(Default)]
    struct FakePage {
        screenshots: u32,
        advances: u32,
    }

    impl SketchPage for FakePage {
        async fn screenshot(&mut self) -> Result<Vec<u8>, RenderError> {
            self.screenshots += 1;
            Ok(vec![0x89, b'P', b'N', b'G'])
        }

        async fn advance(&mut self) -> Result<(), RenderError> {
            self.advances += 1;
            Ok(())
        }
    }

    /// Records how many frames existed when `encode` was called.
    struct CountingEncoder {
        seen: AtomicUsize,
        fail: bool,
    }

    impl FrameEncoder for CountingEncoder {
        async fn encode(&self, frames_dir: &Path, fps: u32, _output: &Path) -> Result<(), RenderError> {
            assert_eq!(fps, 30);
            self.seen.store(list_frames(frames_dir)?.len(), Ordering::SeqCst);
            if self.fail {
                Err(RenderError::Encode {
                    exit_code: Some(1),
                    stderr: "boom".into(),
                })
            } else {
                Ok(())
            }
        }
    }

    #[derive(Default)]
    struct VecSink(Mutex<Vec<String>>);

    impl LogSink for VecSink {
        async fn log(&self, line: String) {
            self.0.lock().unwrap().push(line);
        }
    }

    #[tokio::test]
    async fn captures_thirty_frames_per_second_before_encoding() {
        let tmp = tempfile::tempdir().unwrap();
        let frames_dir = tmp.path().join("frames");
        std::fs::create_dir_all(&frames_dir).unwrap();
        let mut page = FakePage::default();
        let duration = 2;

        let written = capture_frames(
            &mut page,
            &frames_dir,
            RenderSettings::frame_count(duration),
            &NullSink,
        )
        .await
        .unwrap();

        assert_eq!(written, 60);
        assert_eq!(page.screenshots, 60);
        assert_eq!(page.advances, 60);

        let encoder = CountingEncoder {
            seen: AtomicUsize::new(0),
            fail: false,
        };
        encode_and_clean(&encoder, &frames_dir, &tmp.path().join("out.mp4"), &NullSink)
            .await
            .unwrap();
        assert_eq!(encoder.seen.load(Ordering::SeqCst), 60);
        assert!(!frames_dir.exists());
    }

    #[tokio::test]
    async fn frames_are_removed_when_encoding_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let frames_dir = tmp.path().join("frames");
        std::fs::create_dir_all(&frames_dir).unwrap();
        capture_frames(&mut FakePage::default(), &frames_dir, 30, &NullSink)
            .await
            .unwrap();

        let encoder = CountingEncoder {
            seen: AtomicUsize::new(0),
            fail: true,
        };
        let sink = VecSink::default();
        let err = encode_and_clean(&encoder, &frames_dir, &tmp.path().join("out.mp4"), &sink)
            .await
            .unwrap_err();

        assert_matches!(err, RenderError::Encode { .. });
        assert!(!frames_dir.exists());
        assert!(sink.0.lock().unwrap().iter().any(|l| l.starts_with("[error]")));
    }

    #[tokio::test]
    async fn capture_logs_progress_once_per_second_of_video() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = VecSink::default();
        capture_frames(&mut FakePage::default(), tmp.path(), 90, &sink)
            .await
            .unwrap();
        let lines = sink.0.into_inner().unwrap();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[2], "[progress] Captured 90/90 frames");
    }

    #[test]
    fn sketch_html_inlines_code_and_loads_p5() {
        let html = sketch_html(
            "function setup() { createCanvas(800, 600); }",
            "https://cdn.example/p5.js",
        );
        assert!(html.contains(r#"<script src="https://cdn.example/p5.js"></script>"#));
        assert!(html.contains("function setup() { createCanvas(800, 600); }"));
        assert!(html.contains("noLoop();"));
    }

    #[test]
    fn closing_script_tags_in_code_are_escaped() {
        let html = sketch_html("let s = '</script>';", "p5.js");
        assert!(html.contains(r"let s = '<\/script>';"));
    }

    #[test]
    fn closing_script_tags_are_escaped_in_any_case() {
        let html = sketch_html("let a = '</SCRIPT>'; let b = '</Script >';", "p5.js");
        assert!(html.contains(r"let a = '<\/SCRIPT>'; let b = '<\/Script >';"));
    }

    #[cfg(unix)]
    #[test]
    fn file_urls_encode_reserved_characters() {
        assert_eq!(
            file_url(Path::new("/tmp/a b.html")).unwrap(),
            "file:///tmp/a%20b.html"
        );
        assert_eq!(
            file_url(Path::new("/tmp/run#1?x%/page.html")).unwrap(),
            "file:///tmp/run%231%3Fx%25/page.html"
        );
    }

    #[test]
    fn relative_paths_have_no_file_url() {
        assert_eq!(file_url(Path::new("scripts/x.html")).unwrap_err().kind(), "io_error");
    }
}
