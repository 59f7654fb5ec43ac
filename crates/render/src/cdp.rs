//! Minimal Chrome DevTools Protocol client.
//!
//! Launches a headless Chrome with `--remote-debugging-port=0`, reads the
//! browser WebSocket URL from its stderr and speaks CDP over
//! tokio-tungstenite. Page commands go through a flat session obtained
//! from `Target.attachToTarget`, so one connection serves both browser and
//! page domains.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::LazyLock;
use std::time::Duration;

use base64::Engine as _;
use futures::{SinkExt, StreamExt};
use regex::Regex;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tokio::process::{Child, Command};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// How long Chrome gets to print its DevTools endpoint.
const LAUNCH_TIMEOUT: Duration = Duration::from_secs(20);

/// Interval between readiness probes in [`PageSession::wait_for`].
const POLL_INTERVAL: Duration = Duration::from_millis(100);

static DEVTOOLS_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"DevTools listening on (ws://\S+)").expect("valid regex")
});

#[derive(Debug, thiserror::Error)]
pub enum CdpError {
    #[error("Failed to launch browser: {0}")]
    Launch(#[source] std::io::Error),

    #[error("Browser exited before exposing a DevTools endpoint")]
    NoEndpoint,

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("DevTools connection closed")]
    Closed,

    #[error("{method} failed ({code}): {message}")]
    Protocol {
        method: String,
        code: i64,
        message: String,
    },

    #[error("Unexpected {method} response: {detail}")]
    UnexpectedResponse { method: String, detail: String },

    #[error("Page script error: {0}")]
    Script(String),

    #[error("Timed out after {0:?} waiting for {1}")]
    Timeout(Duration, String),
}

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

/// A DevTools WebSocket with request/response correlation.
pub struct CdpConnection {
    socket: Socket,
    next_id: u64,
}

impl CdpConnection {
    pub async fn connect(ws_url: &str) -> Result<Self, CdpError> {
        let (socket, _response) = connect_async(ws_url).await?;
        Ok(Self { socket, next_id: 1 })
    }

    /// Send one command and wait for its response. Events and responses to
    /// other ids arriving in between are skipped.
    pub async fn call(
        &mut self,
        session_id: Option<&str>,
        method: &str,
        params: Value,
    ) -> Result<Value, CdpError> {
        let id = self.next_id;
        self.next_id += 1;

        let command = command_message(id, session_id, method, params);
        self.socket.send(Message::Text(command.to_string().into())).await?;

        loop {
            match self.socket.next().await {
                Some(Ok(Message::Text(text))) => {
                    let Ok(value) = serde_json::from_str::<Value>(&text) else {
                        tracing::debug!("Ignoring non-JSON DevTools message");
                        continue;
                    };
                    if let Some(result) = match_response(&value, id, method) {
                        return result;
                    }
                }
                Some(Ok(Message::Close(_))) | None => return Err(CdpError::Closed),
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
            }
        }
    }

    pub async fn close(&mut self) {
        let _ = self.socket.close(None).await;
    }
}

/// Serialize a CDP command.
pub(crate) fn command_message(
    id: u64,
    session_id: Option<&str>,
    method: &str,
    params: Value,
) -> Value {
    let mut message = json!({ "id": id, "method": method, "params": params });
    if let Some(session_id) = session_id {
        message["sessionId"] = Value::String(session_id.to_string());
    }
    message
}

/// `Some` when `message` is the response to command `id`.
pub(crate) fn match_response(
    message: &Value,
    id: u64,
    method: &str,
) -> Option<Result<Value, CdpError>> {
    if message.get("id").and_then(Value::as_u64) != Some(id) {
        return None;
    }
    if let Some(error) = message.get("error") {
        return Some(Err(CdpError::Protocol {
            method: method.to_string(),
            code: error.get("code").and_then(Value::as_i64).unwrap_or_default(),
            message: error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string(),
        }));
    }
    Some(Ok(message.get("result").cloned().unwrap_or(Value::Null)))
}

// ---------------------------------------------------------------------------
// Browser
// ---------------------------------------------------------------------------

/// Options for [`Browser::launch`].
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub width: u32,
    pub height: u32,
    /// Scratch profile directory, removed on [`Browser::close`].
    pub profile_dir: PathBuf,
    pub extra_args: Vec<String>,
}

/// A running headless Chrome and its DevTools connection.
pub struct Browser {
    child: Child,
    connection: CdpConnection,
    profile_dir: PathBuf,
    width: u32,
    height: u32,
}

impl Browser {
    pub async fn launch(chrome: &Path, options: LaunchOptions) -> Result<Self, CdpError> {
        tokio::fs::create_dir_all(&options.profile_dir)
            .await
            .map_err(CdpError::Launch)?;

        let mut child = Command::new(chrome)
            .args(launch_args(&options))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(CdpError::Launch)?;

        let stderr = child.stderr.take().ok_or(CdpError::NoEndpoint)?;
        let mut lines = BufReader::new(stderr).lines();

        let ws_url = tokio::time::timeout(LAUNCH_TIMEOUT, async {
            while let Ok(Some(line)) = lines.next_line().await {
                if let Some(url) = parse_devtools_url(&line) {
                    return Some(url.to_string());
                }
                tracing::debug!(line = %line, "chrome");
            }
            None
        })
        .await
        .map_err(|_| CdpError::Timeout(LAUNCH_TIMEOUT, "DevTools endpoint".into()))?
        .ok_or(CdpError::NoEndpoint)?;

        // Keep draining stderr so Chrome never blocks on a full pipe.
        tokio::spawn(async move {
            while let Ok(Some(line)) = lines.next_line().await {
                tracing::trace!(line = %line, "chrome");
            }
        });

        tracing::debug!(url = %ws_url, "Connecting to DevTools");
        let connection = CdpConnection::connect(&ws_url).await?;

        Ok(Self {
            child,
            connection,
            profile_dir: options.profile_dir,
            width: options.width,
            height: options.height,
        })
    }

    /// Open a new tab at `about:blank`, attach to it and size its viewport.
    pub async fn new_page(&mut self) -> Result<PageSession<'_>, CdpError> {
        let target = self
            .connection
            .call(None, "Target.createTarget", json!({ "url": "about:blank" }))
            .await?;
        let target_id = string_field(&target, "targetId", "Target.createTarget")?;

        let attached = self
            .connection
            .call(
                None,
                "Target.attachToTarget",
                json!({ "targetId": target_id, "flatten": true }),
            )
            .await?;
        let session_id = string_field(&attached, "sessionId", "Target.attachToTarget")?;

        let mut page = PageSession {
            connection: &mut self.connection,
            session_id,
        };
        page.call("Page.enable", json!({})).await?;
        page.call("Runtime.enable", json!({})).await?;
        page.call(
            "Emulation.setDeviceMetricsOverride",
            json!({
                "width": self.width,
                "height": self.height,
                "deviceScaleFactor": 1,
                "mobile": false,
            }),
        )
        .await?;
        Ok(page)
    }

    /// Shut the browser down and remove its profile directory.
    pub async fn close(mut self) {
        let _ = self.connection.call(None, "Browser.close", json!({})).await;
        self.connection.close().await;
        let _ = self.child.start_kill();
        let _ = self.child.wait().await;
        if let Err(e) = tokio::fs::remove_dir_all(&self.profile_dir).await {
            tracing::debug!(error = %e, dir = %self.profile_dir.display(), "Profile cleanup failed");
        }
    }
}

pub(crate) fn launch_args(options: &LaunchOptions) -> Vec<String> {
    let mut args = vec![
        "--headless=new".to_string(),
        "--remote-debugging-port=0".to_string(),
        "--no-first-run".to_string(),
        "--no-default-browser-check".to_string(),
        "--disable-gpu".to_string(),
        "--hide-scrollbars".to_string(),
        "--mute-audio".to_string(),
        "--allow-file-access-from-files".to_string(),
        format!("--window-size={},{}", options.width, options.height),
        format!("--user-data-dir={}", options.profile_dir.display()),
    ];
    args.extend(options.extra_args.iter().cloned());
    args.push("about:blank".to_string());
    args
}

pub(crate) fn parse_devtools_url(line: &str) -> Option<&str> {
    DEVTOOLS_URL_RE
        .captures(line)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

fn string_field(value: &Value, field: &str, method: &str) -> Result<String, CdpError> {
    value
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| CdpError::UnexpectedResponse {
            method: method.to_string(),
            detail: format!("missing {field}"),
        })
}

// ---------------------------------------------------------------------------
// Page
// ---------------------------------------------------------------------------

/// Commands scoped to one attached tab.
pub struct PageSession<'a> {
    connection: &'a mut CdpConnection,
    session_id: String,
}

impl PageSession<'_> {
    pub async fn call(&mut self, method: &str, params: Value) -> Result<Value, CdpError> {
        self.connection
            .call(Some(&self.session_id), method, params)
            .await
    }

    pub async fn navigate(&mut self, url: &str) -> Result<(), CdpError> {
        let result = self.call("Page.navigate", json!({ "url": url })).await?;
        if let Some(error) = result.get("errorText").and_then(Value::as_str) {
            return Err(CdpError::UnexpectedResponse {
                method: "Page.navigate".into(),
                detail: error.to_string(),
            });
        }
        Ok(())
    }

    /// Evaluate `expression` and return its value. A thrown exception
    /// becomes [`CdpError::Script`].
    pub async fn evaluate(&mut self, expression: &str) -> Result<Value, CdpError> {
        let result = self
            .call(
                "Runtime.evaluate",
                json!({ "expression": expression, "returnByValue": true }),
            )
            .await?;
        evaluation_value(&result)
    }

    /// Poll `expression` until it evaluates to `true`.
    pub async fn wait_for(&mut self, expression: &str, timeout: Duration) -> Result<(), CdpError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.evaluate(expression).await? == Value::Bool(true) {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(CdpError::Timeout(timeout, expression.to_string()));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// PNG screenshot of the viewport.
    pub async fn screenshot_png(&mut self) -> Result<Vec<u8>, CdpError> {
        let result = self
            .call("Page.captureScreenshot", json!({ "format": "png" }))
            .await?;
        let data = string_field(&result, "data", "Page.captureScreenshot")?;
        base64::engine::general_purpose::STANDARD
            .decode(data)
            .map_err(|e| CdpError::UnexpectedResponse {
                method: "Page.captureScreenshot".into(),
                detail: e.to_string(),
            })
    }
}

/// Extract the value of a `Runtime.evaluate` result.
pub(crate) fn evaluation_value(result: &Value) -> Result<Value, CdpError> {
    if let Some(details) = result.get("exceptionDetails") {
        let message = details
            .pointer("/exception/description")
            .or_else(|| details.get("text"))
            .and_then(Value::as_str)
            .unwrap_or("uncaught exception");
        return Err(CdpError::Script(message.to_string()));
    }
    Ok(result
        .pointer("/result/value")
        .cloned()
        .unwrap_or(Value::Null))
}
