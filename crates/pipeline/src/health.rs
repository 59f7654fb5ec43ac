//! Readiness reports built from the tool detectors.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Serialize;

use codereel_core::readiness::{evaluate, ReadinessReport, RequirementStatus};
use codereel_core::types::Engine;
use codereel_detect::{ToolContext, ToolKind};
use codereel_render::RenderSettings;

/// Below this much free space the disk requirement is reported unmet.
pub const MIN_FREE_BYTES: u64 = 500 * 1024 * 1024;

/// Readiness of one or both engines.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    /// Every reported engine is ready.
    pub ready: bool,
    pub engines: Vec<ReadinessReport>,
}

/// Report on `engine`, or on every engine when `None`.
pub async fn health_report(
    tools: &ToolContext,
    settings: &RenderSettings,
    engine: Option<Engine>,
) -> HealthReport {
    let engines: &[Engine] = match &engine {
        Some(engine) => std::slice::from_ref(engine),
        None => &Engine::ALL,
    };

    let mut reports = Vec::with_capacity(engines.len());
    for engine in engines {
        reports.push(engine_report(tools, settings, *engine).await);
    }

    HealthReport {
        ready: reports.iter().all(|r| r.ready),
        engines: reports,
    }
}

/// Check every requirement of `engine` and score the results.
pub async fn engine_report(
    tools: &ToolContext,
    settings: &RenderSettings,
    engine: Engine,
) -> ReadinessReport {
    let mut requirements = IndexMap::new();

    // (key, tool, critical)
    let checks: &[(&str, ToolKind, bool)] = match engine {
        Engine::P5 => &[
            ("chrome", ToolKind::Chrome, true),
            ("ffmpeg", ToolKind::Ffmpeg, true),
        ],
        Engine::Manim => &[
            ("python", ToolKind::Python, true),
            ("manim", ToolKind::Manim, true),
            ("latex", ToolKind::Tex, false),
            ("ffmpeg", ToolKind::Ffmpeg, false),
        ],
    };

    for (key, kind, critical) in checks {
        requirements.insert(key.to_string(), tool_status(tools, *kind, *critical).await);
    }

    let media_root = settings.media_root.clone();
    let disk = tokio::task::spawn_blocking(move || disk_status(&media_root))
        .await
        .unwrap_or_else(|e| {
            RequirementStatus::missing(format!("Disk check failed: {e}"), "Retry the health check", false)
        });
    requirements.insert("disk".to_string(), disk);

    let report = evaluate(engine, requirements);
    tracing::debug!(
        engine = %engine,
        ready = report.ready,
        readiness_pct = report.readiness_pct,
        "Computed engine readiness",
    );
    report
}

async fn tool_status(tools: &ToolContext, kind: ToolKind, critical: bool) -> RequirementStatus {
    match tools.resolve(kind).await {
        Ok(found) => RequirementStatus::available(
            format!("{} found", kind.label()),
            Some(found.path),
            critical,
        ),
        Err(e) => RequirementStatus::missing(e.to_string(), e.hint(), critical),
    }
}

/// Whether the media root (or its nearest existing ancestor) has room for
/// renders. Never creates directories.
pub fn disk_status(media_root: &Path) -> RequirementStatus {
    let Some(existing) = nearest_existing_dir(media_root) else {
        return RequirementStatus::missing(
            format!("No existing directory for {}", media_root.display()),
            "Set MEDIA_ROOT to a writable directory",
            false,
        );
    };

    match free_bytes(&existing) {
        Some(free) if free < MIN_FREE_BYTES => RequirementStatus {
            path: Some(existing.clone()),
            ..RequirementStatus::missing(
                format!("Only {} MiB free in {}", free / (1024 * 1024), existing.display()),
                "Free up disk space or point MEDIA_ROOT at a larger volume",
                false,
            )
        },
        Some(free) => RequirementStatus::available(
            format!("{} MiB free", free / (1024 * 1024)),
            Some(existing),
            false,
        ),
        None => RequirementStatus::available("Media directory exists", Some(existing), false),
    }
}

fn nearest_existing_dir(path: &Path) -> Option<PathBuf> {
    let absolute = std::path::absolute(path).ok()?;
    absolute.ancestors().find(|p| p.is_dir()).map(Path::to_path_buf)
}

/// Bytes available to unprivileged users on the filesystem holding `path`.
#[cfg(unix)]
fn free_bytes(path: &Path) -> Option<u64> {
    use std::ffi::CString;
    use std::mem::MaybeUninit;
    use std::os::unix::ffi::OsStrExt;

    let c_path = CString::new(path.as_os_str().as_bytes()).ok()?;
    let mut stat = MaybeUninit::<libc::statvfs>::uninit();

    // Safety: `c_path` is NUL-terminated and `stat` is only read on success.
    let ret = unsafe { libc::statvfs(c_path.as_ptr(), stat.as_mut_ptr()) };
    if ret != 0 {
        return None;
    }
    let stat = unsafe { stat.assume_init() };
    Some(stat.f_bavail as u64 * stat.f_frsize as u64)
}

#[cfg(not(unix))]
fn free_bytes(_path: &Path) -> Option<u64> {
    None
}
