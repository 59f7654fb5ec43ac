//! Manim scenes: run the CLI, then find and move its output.
//!
//! Manim writes into `<work>/videos/<script stem>/<quality dir>/`. After a
//! clean exit the renderer looks for `GeneratedScene.mp4` there (and then
//! anywhere under the work directory), copies it to the job's canonical
//! path and removes the work directory. A clean exit with only partial
//! movie files is reported as an incomplete render rather than a missing
//! one.

use std::path::Path;

use tokio::process::Command;

use codereel_core::artifact::{ArtifactLocator, ArtifactLookup};
use codereel_core::classify::{classify_failure, last_exception_line};
use codereel_core::log_sink::LogSink;
use codereel_core::types::{RunId, SCENE_NAME};
use codereel_detect::{ToolContext, ToolKind};

use crate::process::run_streaming;
use crate::settings::{JobPaths, RenderSettings};
use crate::{RenderError, RenderedVideo};

/// Output directories Manim uses per quality flag, most likely first.
const QUALITY_DIRS: [(&str, &str); 5] = [
    ("l", "480p15"),
    ("m", "720p30"),
    ("h", "1080p60"),
    ("p", "1440p60"),
    ("k", "2160p60"),
];

/// Renders Manim scene scripts to MP4.
pub struct ManimRenderer<'a> {
    settings: &'a RenderSettings,
    tools: &'a ToolContext,
}

impl<'a> ManimRenderer<'a> {
    pub fn new(settings: &'a RenderSettings, tools: &'a ToolContext) -> Self {
        Self { settings, tools }
    }

    pub async fn render<S: LogSink>(
        &self,
        code: &str,
        run_id: &RunId,
        sink: &S,
    ) -> Result<RenderedVideo, RenderError> {
        let paths = self.settings.job_paths(run_id);
        tokio::fs::create_dir_all(&self.settings.scripts_dir).await?;
        tokio::fs::create_dir_all(&paths.job_dir).await?;

        let script_path = self.settings.script_path(run_id, "py");
        tokio::fs::write(&script_path, code).await?;
        sink.log(format!("Saved scene to {}", script_path.display())).await;

        let manim = self.tools.resolve(ToolKind::Manim).await?;

        let work_dir = paths.work_dir();
        tokio::fs::create_dir_all(&work_dir).await?;

        let quality = format!("-q{}", self.settings.manim_quality);
        let mut cmd = Command::new(&manim.path);
        cmd.arg(&quality)
            .arg("--disable_caching")
            .arg("--media_dir")
            .arg(&work_dir)
            .arg(&script_path)
            .arg(SCENE_NAME);

        sink.log(format!("Running manim {quality} {SCENE_NAME}")).await;
        tracing::info!(run_id = %run_id, manim = %manim.path.display(), "Starting Manim render");

        let output = match run_streaming(&mut cmd, sink).await {
            Ok(output) => output,
            Err(source) => {
                remove_work_dir(&work_dir).await;
                return Err(RenderError::Spawn {
                    program: manim.path.display().to_string(),
                    source,
                });
            }
        };

        if !output.success() {
            remove_work_dir(&work_dir).await;
            let kind = classify_failure(&output.stderr);
            let message = match last_exception_line(&output.stderr) {
                Some(detail) => format!("{}: {detail}", kind.message()),
                None => kind.message().to_string(),
            };
            sink.log(format!("[error] {message}")).await;
            return Err(RenderError::Manim { kind, message });
        }

        let stem = run_id.as_str();
        let video = collect_output(&paths, &work_dir, &self.locator(stem)).await?;
        sink.log(format!("Video written to {}", video.path.display())).await;
        Ok(video)
    }

    /// Locator for `GeneratedScene.mp4` under the work directory of a
    /// script named `<stem>.py`.
    pub fn locator(&self, stem: &str) -> ArtifactLocator {
        let mut locator = ArtifactLocator::new(format!("{SCENE_NAME}.mp4"))
            .with_partial_dir("partial_movie_files")
            .with_partial_prefix("uncached_");

        let preferred = QUALITY_DIRS
            .iter()
            .filter(|(flag, _)| *flag == self.settings.manim_quality);
        let others = QUALITY_DIRS
            .iter()
            .filter(|(flag, _)| *flag != self.settings.manim_quality);
        for (_, dir) in preferred.chain(others) {
            locator = locator.with_candidate(Path::new("videos").join(stem).join(dir));
        }
        locator
    }
}

/// Move the finished video to its canonical path.
///
/// If the canonical file already exists it is returned as is and the work
/// directory is left alone. Every other path removes the work directory.
pub async fn collect_output(
    paths: &JobPaths,
    work_dir: &Path,
    locator: &ArtifactLocator,
) -> Result<RenderedVideo, RenderError> {
    let rendered = RenderedVideo {
        path: paths.video.clone(),
        url: paths.url.clone(),
        file_name: paths.file_name.clone(),
    };

    if tokio::fs::try_exists(&paths.video).await.unwrap_or(false) {
        return Ok(rendered);
    }

    let root = work_dir.to_path_buf();
    let search = locator.clone();
    let lookup = tokio::task::spawn_blocking(move || search.locate(&root))
        .await
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, "Artifact search task failed");
            ArtifactLookup::Absent
        });

    let result = match lookup {
        ArtifactLookup::Found(found) => {
            tracing::debug!(from = %found.display(), to = %paths.video.display(), "Copying Manim output");
            tokio::fs::copy(&found, &paths.video)
                .await
                .map(|_| rendered)
                .map_err(RenderError::from)
        }
        ArtifactLookup::Incomplete { partials } => Err(RenderError::Incomplete {
            partials: partials.len(),
        }),
        ArtifactLookup::Absent => Err(RenderError::NoOutput {
            file_name: locator.file_name().to_string(),
        }),
    };

    remove_work_dir(work_dir).await;
    result
}

async fn remove_work_dir(work_dir: &Path) {
    if let Err(e) = tokio::fs::remove_dir_all(work_dir).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(error = %e, dir = %work_dir.display(), "Failed to remove Manim work directory");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use assert_matches::assert_matches;
    use codereel_core::classify::ManimErrorKind;
    use codereel_core::log_sink::NullSink;
    use codereel_detect::DetectorEnv;

    use super::*;

    fn settings(root: &Path, quality: &str) -> RenderSettings {
        RenderSettings {
            media_root: root.join("media"),
            scripts_dir: root.join("scripts"),
            manim_quality: quality.to_string(),
            ..RenderSettings::default()
        }
    }

    fn touch(path: &Path, contents: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    fn renderer_parts(root: &Path) -> (RenderSettings, JobPaths, PathBuf) {
        let settings = settings(root, "l");
        let paths = settings.job_paths(&RunId::from("job1"));
        let work = paths.work_dir();
        std::fs::create_dir_all(&work).unwrap();
        (settings, paths, work)
    }

    #[tokio::test]
    async fn existing_canonical_video_short_circuits() {
        let tmp = tempfile::tempdir().unwrap();
        let (settings, paths, work) = renderer_parts(tmp.path());
        touch(&paths.video, "done");
        touch(&work.join("videos/job1/480p15/GeneratedScene.mp4"), "other");

        let tools = ToolContext::new(DetectorEnv::empty());
        let locator = ManimRenderer::new(&settings, &tools).locator("job1");
        let video = collect_output(&paths, &work, &locator).await.unwrap();

        assert_eq!(video.path, paths.video);
        assert_eq!(std::fs::read_to_string(&paths.video).unwrap(), "done");
        assert!(work.exists());
    }

    #[tokio::test]
    async fn found_output_is_copied_and_work_dir_removed() {
        let tmp = tempfile::tempdir().unwrap();
        let (settings, paths, work) = renderer_parts(tmp.path());
        touch(&work.join("videos/job1/480p15/GeneratedScene.mp4"), "mp4");

        let tools = ToolContext::new(DetectorEnv::empty());
        let locator = ManimRenderer::new(&settings, &tools).locator("job1");
        let video = collect_output(&paths, &work, &locator).await.unwrap();

        assert_eq!(video.url, "/videos/job1/job1.mp4");
        assert_eq!(std::fs::read_to_string(&paths.video).unwrap(), "mp4");
        assert!(!work.exists());
    }

    #[tokio::test]
    async fn configured_quality_dir_is_preferred() {
        let tmp = tempfile::tempdir().unwrap();
        let settings = settings(tmp.path(), "h");
        let work = tmp.path().join("work");
        touch(&work.join("videos/s/480p15/GeneratedScene.mp4"), "low");
        touch(&work.join("videos/s/1080p60/GeneratedScene.mp4"), "high");

        let tools = ToolContext::new(DetectorEnv::empty());
        let lookup = ManimRenderer::new(&settings, &tools).locator("s").locate(&work);

        assert_eq!(
            lookup,
            ArtifactLookup::Found(work.join("videos/s/1080p60/GeneratedScene.mp4"))
        );
    }

    #[tokio::test]
    async fn partial_files_only_is_an_incomplete_render() {
        let tmp = tempfile::tempdir().unwrap();
        let (settings, paths, work) = renderer_parts(tmp.path());
        touch(
            &work.join("videos/job1/480p15/partial_movie_files/GeneratedScene/uncached_00000.mp4"),
            "part",
        );

        let tools = ToolContext::new(DetectorEnv::empty());
        let locator = ManimRenderer::new(&settings, &tools).locator("job1");
        let err = collect_output(&paths, &work, &locator).await.unwrap_err();

        assert_matches!(err, RenderError::Incomplete { partials: 1 });
        assert_eq!(err.kind(), "render_incomplete");
        assert!(!work.exists());
    }

    #[tokio::test]
    async fn empty_work_dir_is_no_output() {
        let tmp = tempfile::tempdir().unwrap();
        let (settings, paths, work) = renderer_parts(tmp.path());

        let tools = ToolContext::new(DetectorEnv::empty());
        let locator = ManimRenderer::new(&settings, &tools).locator("job1");
        let err = collect_output(&paths, &work, &locator).await.unwrap_err();

        assert_matches!(err, RenderError::NoOutput { .. });
        assert!(!work.exists());
    }

    #[tokio::test]
    async fn missing_manim_is_reported_before_running() {
        let tmp = tempfile::tempdir().unwrap();
        let settings = settings(tmp.path(), "l");
        let tools = ToolContext::new(DetectorEnv::empty());

        let err = ManimRenderer::new(&settings, &tools)
            .render("class GeneratedScene(Scene): pass", &RunId::from("job1"), &NullSink)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "tool_not_found");
        assert!(settings.script_path(&RunId::from("job1"), "py").exists());
    }

    #[cfg(unix)]
    mod with_fake_manim {
        use std::os::unix::fs::PermissionsExt;
        use std::sync::LazyLock;

        use tokio::sync::Mutex;

        use super::*;

        /// Writing and executing scripts concurrently can fail with ETXTBSY.
        static SPAWN_LOCK: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

        /// Shell stand-in for the manim CLI: parses `--media_dir`, then runs `body`.
        fn fake_manim(dir: &Path, body: &str) -> PathBuf {
            let path = dir.join("manim");
            let script = format!(
                "#!/bin/sh\nmedia=\"\"\nwhile [ $# -gt 0 ]; do\n  if [ \"$1\" = \"--media_dir\" ]; then media=\"$2\"; shift; fi\n  shift\ndone\n{body}\n"
            );
            std::fs::write(&path, script).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        async fn render_with(body: &str) -> (tempfile::TempDir, RenderSettings, Result<RenderedVideo, RenderError>) {
            let _guard = SPAWN_LOCK.lock().await;
            let tmp = tempfile::tempdir().unwrap();
            let manim = fake_manim(tmp.path(), body);
            let settings = settings(tmp.path(), "l");
            let tools = ToolContext::new(DetectorEnv::empty().with_var("MANIM_PATH", manim));

            let result = ManimRenderer::new(&settings, &tools)
                .render("class GeneratedScene(Scene): pass", &RunId::from("job1"), &NullSink)
                .await;
            (tmp, settings, result)
        }

        #[tokio::test]
        async fn successful_render_lands_at_canonical_path() {
            let (_tmp, settings, result) = render_with(
                "out=\"$media/videos/job1/480p15\"\nmkdir -p \"$out\"\necho video > \"$out/GeneratedScene.mp4\"\necho 'Animation 0: Create(Circle):  100%|##########|' 1>&2",
            )
            .await;

            let video = result.unwrap();
            let paths = settings.job_paths(&RunId::from("job1"));
            assert_eq!(video.path, paths.video);
            assert!(paths.video.is_file());
            assert!(!paths.work_dir().exists());
        }

        #[tokio::test]
        async fn failed_run_is_classified_and_cleaned_up() {
            let (_tmp, settings, result) = render_with(
                "echo 'Traceback (most recent call last):' 1>&2\necho \"NameError: name 'Circl' is not defined\" 1>&2\nexit 1",
            )
            .await;

            let err = result.unwrap_err();
            assert_matches!(
                &err,
                RenderError::Manim { kind: ManimErrorKind::UndefinedName, message }
                    if message.contains("name 'Circl' is not defined")
            );
            assert_eq!(err.kind(), "undefined_name");
            assert!(!settings.job_paths(&RunId::from("job1")).work_dir().exists());
        }

        #[tokio::test]
        async fn clean_exit_with_partials_is_incomplete() {
            let (_tmp, settings, result) = render_with(
                "out=\"$media/videos/job1/480p15/partial_movie_files/GeneratedScene\"\nmkdir -p \"$out\"\necho part > \"$out/uncached_00000.mp4\"\necho part > \"$out/uncached_00001.mp4\"",
            )
            .await;

            assert_matches!(result, Err(RenderError::Incomplete { partials: 2 }));
            assert!(!settings.job_paths(&RunId::from("job1")).work_dir().exists());
        }
    }
}
