use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::env::DetectorEnv;
use crate::tool::{detect, DetectError, DetectedTool, ToolKind};

/// Detected tool paths, resolved lazily and cached until refreshed.
///
/// Construct once at startup and share via `Arc<ToolContext>`. Failures
/// are never cached: a tool installed after a failed lookup is found on
/// the next call.
pub struct ToolContext {
    env: DetectorEnv,
    cache: RwLock<HashMap<ToolKind, DetectedTool>>,
}

impl ToolContext {
    pub fn new(env: DetectorEnv) -> Self {
        Self {
            env,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Context reading the current process environment.
    pub fn from_process() -> Self {
        Self::new(DetectorEnv::from_process())
    }

    /// Resolve `kind`, returning the cached result when present.
    pub async fn resolve(&self, kind: ToolKind) -> Result<DetectedTool, DetectError> {
        if let Some(found) = self.cache.read().await.get(&kind) {
            return Ok(found.clone());
        }

        let env = self.env.clone();
        let result = tokio::task::spawn_blocking(move || detect(kind, &env))
            .await
            .unwrap_or_else(|e| {
                tracing::error!(tool = %kind, error = %e, "Tool detection task failed");
                Err(DetectError::NotFound {
                    tool: kind,
                    searched: Vec::new(),
                    hint: kind.hint(),
                })
            });

        match &result {
            Ok(found) => {
                tracing::info!(
                    tool = %kind,
                    path = %found.path.display(),
                    method = ?found.method,
                    "Detected tool",
                );
                self.cache.write().await.insert(kind, found.clone());
            }
            Err(e) => tracing::warn!(tool = %kind, error = %e, "Tool not found"),
        }

        result
    }

    /// Cached result for `kind`, without detecting.
    pub async fn cached(&self, kind: ToolKind) -> Option<DetectedTool> {
        self.cache.read().await.get(&kind).cloned()
    }

    /// Drop every cached result.
    pub async fn refresh(&self) {
        self.cache.write().await.clear();
        tracing::info!("Tool detection cache cleared");
    }

    /// Drop the cached result for one tool.
    pub async fn refresh_tool(&self, kind: ToolKind) {
        self.cache.write().await.remove(&kind);
    }
}
