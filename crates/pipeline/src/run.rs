//! Sequencing one job: generate code, then render it.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;

use codereel_codegen::prompts::PromptParams;
use codereel_codegen::{CodeGenerator, CodegenRequest, CompletionBackend};
use codereel_core::error::CoreError;
use codereel_core::job::{JobOutcome, JobStore, JobStoreError};
use codereel_core::log_sink::{JobLog, LogSink};
use codereel_core::types::{Engine, RunId};
use codereel_detect::ToolContext;
use codereel_render::manim::ManimRenderer;
use codereel_render::p5::P5Renderer;
use codereel_render::{RenderError, RenderSettings, RenderedVideo, FRAME_RATE};

use crate::PipelineError;

/// Validated input for one job.
#[derive(Debug, Clone)]
pub struct GenerateParams {
    pub prompt: String,
    pub engine: Engine,
    pub api_key: Option<String>,
    /// Requested sketch length; clamped by [`RenderSettings::clamp_duration`].
    pub duration_secs: Option<u32>,
}

impl GenerateParams {
    /// Parse the raw request fields. Fails on an empty prompt or an
    /// unknown engine, before any job exists.
    pub fn new(
        prompt: impl Into<String>,
        engine: &str,
        api_key: Option<String>,
        duration_secs: Option<u32>,
    ) -> Result<Self, PipelineError> {
        let prompt = prompt.into();
        if prompt.trim().is_empty() {
            return Err(CoreError::Validation("prompt must not be empty".into()).into());
        }
        Ok(Self {
            prompt,
            engine: engine.parse()?,
            api_key,
            duration_secs,
        })
    }
}

/// Code generator, renderer settings and detected tools for running jobs.
pub struct Pipeline<B> {
    generator: CodeGenerator<B>,
    settings: RenderSettings,
    tools: Arc<ToolContext>,
}

impl<B: CompletionBackend> Pipeline<B> {
    pub fn new(generator: CodeGenerator<B>, settings: RenderSettings, tools: Arc<ToolContext>) -> Self {
        Self {
            generator,
            settings,
            tools,
        }
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    pub fn tools(&self) -> &Arc<ToolContext> {
        &self.tools
    }

    /// Call the code generator once and return validated code.
    pub async fn generate_code<S: LogSink>(
        &self,
        params: &GenerateParams,
        duration_secs: u32,
        sink: &S,
    ) -> Result<String, PipelineError> {
        sink.log(format!("Generating {} code", params.engine)).await;
        let request = CodegenRequest {
            prompt: &params.prompt,
            engine: params.engine,
            api_key: params.api_key.as_deref(),
            params: PromptParams {
                width: self.settings.viewport_width,
                height: self.settings.viewport_height,
                duration_secs,
                fps: FRAME_RATE,
            },
        };
        let code = self.generator.generate(&request).await?;
        sink.log(format!("Generated {} lines of code", code.lines().count())).await;
        Ok(code)
    }

    /// Render `code` with the engine's renderer.
    pub async fn render<S: LogSink>(
        &self,
        engine: Engine,
        code: &str,
        run_id: &RunId,
        duration_secs: u32,
        sink: &S,
    ) -> Result<RenderedVideo, RenderError> {
        match engine {
            Engine::P5 => {
                P5Renderer::new(&self.settings, &self.tools)
                    .render(code, run_id, duration_secs, sink)
                    .await
            }
            Engine::Manim => {
                ManimRenderer::new(&self.settings, &self.tools)
                    .render(code, run_id, sink)
                    .await
            }
        }
    }

    /// Generate and render without a job record. Used by the IPC surface,
    /// which pushes log lines straight to its client.
    pub async fn run<S: LogSink>(
        &self,
        run_id: &RunId,
        params: &GenerateParams,
        sink: &S,
    ) -> Result<RenderedVideo, PipelineError> {
        let duration = self.settings.clamp_duration(params.duration_secs);
        let code = self.generate_code(params, duration, sink).await?;
        let video = self
            .render(params.engine, &code, run_id, duration, sink)
            .await?;
        Ok(video)
    }

    /// Run a job recorded in `store` to completion.
    ///
    /// Always ends with a final log line and the job's single transition to
    /// done, whether the job succeeded or failed.
    pub async fn execute_job(
        &self,
        store: &Arc<JobStore>,
        run_id: &RunId,
        params: &GenerateParams,
    ) -> JobOutcome {
        let sink = JobLog::new(Arc::clone(store), run_id.clone());
        let duration = self.settings.clamp_duration(params.duration_secs);

        let result = async {
            let code = self.generate_code(params, duration, &sink).await?;
            if let Err(e) = store.set_code(run_id, code.clone()).await {
                tracing::warn!(run_id = %run_id, error = %e, "Failed to record generated code");
            }
            let video = self
                .render(params.engine, &code, run_id, duration, &sink)
                .await?;
            Ok::<_, PipelineError>(video)
        }
        .await;

        let outcome = match result {
            Ok(video) => {
                sink.log(format!("Video ready: {}", video.url)).await;
                JobOutcome::Succeeded {
                    video_path: video.path,
                    video_url: video.url,
                }
            }
            Err(e) => {
                tracing::warn!(run_id = %run_id, kind = e.kind(), error = %e, "Job failed");
                sink.log(format!("Error: {e}")).await;
                JobOutcome::Failed(e.to_failure())
            }
        };

        if let Err(e) = store.complete(run_id, outcome.clone()).await {
            tracing::error!(run_id = %run_id, error = %e, "Failed to complete job");
        }
        outcome
    }
}

/// Create a job in `store` and run it on a background task.
pub async fn spawn_job<B>(
    pipeline: Arc<Pipeline<B>>,
    store: Arc<JobStore>,
    params: GenerateParams,
) -> Result<RunId, JobStoreError>
where
    B: CompletionBackend + 'static,
{
    let run_id = store.create(params.prompt.clone(), params.engine).await?;
    tracing::info!(run_id = %run_id, engine = %params.engine, "Job created");

    let task_run_id = run_id.clone();
    tokio::spawn(async move {
        let job = AssertUnwindSafe(pipeline.execute_job(&store, &task_run_id, &params));
        if let Err(panic) = job.catch_unwind().await {
            let detail = panic_detail(panic);
            fail_panicked_job(&store, &task_run_id, detail).await;
        }
    });
    Ok(run_id)
}

fn panic_detail(panic: Box<dyn Any + Send>) -> String {
    match panic.downcast::<String>() {
        Ok(message) => *message,
        Err(panic) => panic
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .unwrap_or_else(|| "unknown panic".to_string()),
    }
}

/// Close out a job whose task panicked, so its log stream still ends.
async fn fail_panicked_job(store: &Arc<JobStore>, run_id: &RunId, detail: String) {
    let error = PipelineError::from(CoreError::Internal(format!("job task panicked: {detail}")));
    tracing::error!(run_id = %run_id, error = %error, "Job task panicked");

    JobLog::new(Arc::clone(store), run_id.clone())
        .log(format!("Error: {error}"))
        .await;
    if let Err(e) = store
        .complete(run_id, JobOutcome::Failed(error.to_failure()))
        .await
    {
        tracing::warn!(run_id = %run_id, error = %e, "Could not complete panicked job");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use assert_matches::assert_matches;
    use codereel_codegen::CodegenError;
    use codereel_core::job::{JobStatus, JobStoreConfig};
    use codereel_core::log_sink::NullSink;
    use codereel_detect::DetectorEnv;

    use super::*;

    struct Replying(&'static str);

    impl CompletionBackend for Replying {
        async fn complete(&self, _system: &str, _user: &str, _api_key: &str) -> Result<String, CodegenError> {
            Ok(self.0.to_string())
        }
    }

    fn pipeline(reply: &'static str, root: &std::path::Path) -> Pipeline<Replying> {
        let settings = RenderSettings {
            media_root: root.join("media"),
            scripts_dir: root.join("scripts"),
            ..RenderSettings::default()
        };
        Pipeline::new(
            CodeGenerator::new(Replying(reply), Some("key".into())),
            settings,
            Arc::new(ToolContext::new(DetectorEnv::empty())),
        )
    }

    fn params(engine: &str) -> GenerateParams {
        GenerateParams::new("a bouncing ball", engine, None, Some(2)).unwrap()
    }

    #[test]
    fn params_reject_unknown_engine_and_empty_prompt() {
        let err = GenerateParams::new("x", "flash", None, None).unwrap_err();
        assert_eq!(err.kind(), "invalid_engine");

        let err = GenerateParams::new("   ", "p5", None, None).unwrap_err();
        assert_eq!(err.kind(), "validation_error");
    }

    #[tokio::test]
    async fn invalid_code_fails_before_rendering() {
        let tmp = tempfile::tempdir().unwrap();
        let pipeline = pipeline("console.log('no setup here')", tmp.path());

        let err = pipeline
            .run(&RunId::from("r1"), &params("p5"), &NullSink)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "invalid_code_shape");
        assert!(!tmp.path().join("scripts").exists());
    }

    #[tokio::test]
    async fn banned_manim_construct_fails_before_any_process() {
        let tmp = tempfile::tempdir().unwrap();
        let pipeline = pipeline(
            "from manim import *\nclass GeneratedScene(GraphScene):\n    pass",
            tmp.path(),
        );

        let err = pipeline
            .run(&RunId::from("r1"), &params("manim"), &NullSink)
            .await
            .unwrap_err();

        assert_matches!(err, PipelineError::Codegen(CodegenError::BannedConstruct { .. }));
        assert!(!tmp.path().join("media").exists());
    }

    #[tokio::test]
    async fn failed_job_completes_once_with_final_log_line() {
        let tmp = tempfile::tempdir().unwrap();
        let pipeline = pipeline("function setup() { createCanvas(800, 600); }", tmp.path());
        let store = Arc::new(JobStore::new(JobStoreConfig::default()));
        let params = params("p5");
        let run_id = store.create(params.prompt.clone(), params.engine).await.unwrap();

        let outcome = pipeline.execute_job(&store, &run_id, &params).await;

        assert_matches!(&outcome, JobOutcome::Failed(f) if f.kind == "tool_not_found");
        let job = store.get(&run_id).await.unwrap();
        assert_eq!(job.status, JobStatus::Done);
        assert!(job.code.as_deref().unwrap().starts_with("function setup()"));
        assert!(job.logs.last().unwrap().starts_with("Error: "));
        assert_matches!(
            store.complete(&run_id, outcome).await,
            Err(JobStoreError::AlreadyCompleted(_))
        );
    }

    struct Panicking;

    impl CompletionBackend for Panicking {
        async fn complete(&self, _system: &str, _user: &str, _api_key: &str) -> Result<String, CodegenError> {
            panic!("backend exploded")
        }
    }

    async fn wait_until_done(store: &JobStore, run_id: &RunId) -> bool {
        for _ in 0..100 {
            if store.get(run_id).await.unwrap().status == JobStatus::Done {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    #[tokio::test]
    async fn panicking_job_still_completes_with_final_log_line() {
        let tmp = tempfile::tempdir().unwrap();
        let settings = RenderSettings {
            media_root: tmp.path().join("media"),
            scripts_dir: tmp.path().join("scripts"),
            ..RenderSettings::default()
        };
        let pipeline = Arc::new(Pipeline::new(
            CodeGenerator::new(Panicking, Some("key".into())),
            settings,
            Arc::new(ToolContext::new(DetectorEnv::empty())),
        ));
        let store = Arc::new(JobStore::new(JobStoreConfig::default()));

        let run_id = spawn_job(pipeline, Arc::clone(&store), params("p5"))
            .await
            .unwrap();

        assert!(wait_until_done(&store, &run_id).await);
        let job = store.get(&run_id).await.unwrap();
        assert_matches!(
            &job.outcome,
            Some(JobOutcome::Failed(f)) if f.kind == "internal_error" && f.message.contains("backend exploded")
        );
        let last = job.logs.last().unwrap();
        assert!(last.starts_with("Error: "));
        assert!(last.contains("backend exploded"));
    }

    #[tokio::test]
    async fn spawned_job_runs_to_done() {
        let tmp = tempfile::tempdir().unwrap();
        let pipeline = Arc::new(pipeline("not code", tmp.path()));
        let store = Arc::new(JobStore::new(JobStoreConfig::default()));

        let run_id = spawn_job(Arc::clone(&pipeline), Arc::clone(&store), params("p5"))
            .await
            .unwrap();

        assert!(wait_until_done(&store, &run_id).await);
    }
}
