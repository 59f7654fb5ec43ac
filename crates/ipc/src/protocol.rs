use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const METHOD_CHECK_HEALTH: &str = "checkHealth";
pub const METHOD_GENERATE_VIDEO: &str = "generateVideo";

#[derive(Debug, Deserialize)]
pub struct IpcRequest {
    /// Echoed back on every message about this request.
    #[serde(default)]
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Default, Deserialize)]
pub struct CheckHealthParams {
    #[serde(default)]
    pub engine: Option<String>,
    #[serde(default)]
    pub refresh: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateVideoParams {
    pub prompt: String,
    pub engine: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub duration: Option<u32>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GenerateVideoResult {
    /// Absolute path of the finished video.
    pub video_path: String,
    /// URL path the video is served under by the HTTP surface.
    pub download_path: String,
    pub filename: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct IpcErrorBody {
    pub kind: String,
    pub message: String,
}

impl IpcErrorBody {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

/// Final reply to one request.
#[derive(Debug, Serialize)]
pub struct IpcResponse {
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<IpcErrorBody>,
}

impl IpcResponse {
    pub fn ok(id: Value, result: Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn err(id: Value, error: IpcErrorBody) -> Self {
        Self {
            id,
            result: None,
            error: Some(error),
        }
    }
}

/// Out-of-band log line for a running request.
#[derive(Debug, Serialize)]
pub struct LogEventMessage<'a> {
    pub event: &'static str,
    pub id: &'a Value,
    pub line: &'a str,
}

impl<'a> LogEventMessage<'a> {
    pub fn new(id: &'a Value, line: &'a str) -> Self {
        Self {
            event: "log",
            id,
            line,
        }
    }
}
