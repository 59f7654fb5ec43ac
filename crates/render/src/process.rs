//! Running a child process while streaming its output into a job log.
//!
//! [`run_streaming`] reads stdout and stderr concurrently, splitting on
//! both `\n` and `\r` so carriage-return progress bars arrive as
//! individual updates. Stdout lines are forwarded to the [`LogSink`] as-is;
//! stderr lines are tagged as progress or error first, and stderr is also
//! kept for failure classification.

use std::process::{ExitStatus, Stdio};

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

use codereel_core::classify::{classify_line, OutputLineKind};
use codereel_core::log_sink::LogSink;

/// Maximum stderr kept per process (1 MiB). Earlier output is dropped.
const MAX_STDERR_BYTES: usize = 1024 * 1024;

/// Result of a finished process.
#[derive(Debug)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    /// Tail of stderr, capped at [`MAX_STDERR_BYTES`].
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.status.code()
    }
}

/// Spawn `cmd` with piped output and forward every line to `sink`.
///
/// Stdin is closed. The child is killed if the returned future is dropped.
pub async fn run_streaming<S: LogSink>(
    cmd: &mut Command,
    sink: &S,
) -> std::io::Result<ProcessOutput> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd.spawn()?;
    let mut stdout = child.stdout.take().map(LineReader::new);
    let mut stderr = child.stderr.take().map(LineReader::new);
    let mut captured = String::new();
    let mut last_progress: Option<String> = None;

    while stdout.is_some() || stderr.is_some() {
        let (line, from_stderr) = tokio::select! {
            line = next_line(&mut stdout), if stdout.is_some() => (line, false),
            line = next_line(&mut stderr), if stderr.is_some() => (line, true),
        };

        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) | Err(_) => {
                if from_stderr {
                    stderr = None;
                } else {
                    stdout = None;
                }
                continue;
            }
        };

        if !from_stderr {
            sink.log(line).await;
            continue;
        }

        captured.push_str(&line);
        captured.push('\n');
        if captured.len() > MAX_STDERR_BYTES {
            let cut = captured.len() - MAX_STDERR_BYTES;
            let cut = (cut..captured.len())
                .find(|i| captured.is_char_boundary(*i))
                .unwrap_or(captured.len());
            captured.drain(..cut);
        }

        match classify_line(&line) {
            OutputLineKind::Progress => {
                // tqdm repaints the same bar many times per second.
                if last_progress.as_deref() != Some(line.as_str()) {
                    sink.log(format!("[progress] {line}")).await;
                    last_progress = Some(line);
                }
            }
            OutputLineKind::Error => sink.log(format!("[error] {line}")).await,
            OutputLineKind::Output => sink.log(line).await,
        }
    }

    let status = child.wait().await?;
    Ok(ProcessOutput {
        status,
        stderr: captured,
    })
}

async fn next_line<R: AsyncRead + Unpin>(
    reader: &mut Option<LineReader<R>>,
) -> std::io::Result<Option<String>> {
    match reader {
        Some(reader) => reader.next_line().await,
        None => Ok(None),
    }
}

// ---------------------------------------------------------------------------
// Line splitting
// ---------------------------------------------------------------------------

/// Splits a byte stream on `\n` or `\r`, skipping empty lines.
///
/// Partial lines are buffered in the reader itself, so `next_line` can be
/// raced in `select!` without losing data.
pub(crate) struct LineReader<R> {
    inner: BufReader<R>,
    pending: Vec<u8>,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    pub(crate) fn new(inner: R) -> Self {
        Self {
            inner: BufReader::new(inner),
            pending: Vec::new(),
        }
    }

    pub(crate) async fn next_line(&mut self) -> std::io::Result<Option<String>> {
        loop {
            let buf = self.inner.fill_buf().await?;
            if buf.is_empty() {
                if self.pending.is_empty() {
                    return Ok(None);
                }
                return Ok(Some(self.take_pending()));
            }

            match buf.iter().position(|b| *b == b'\n' || *b == b'\r') {
                Some(end) => {
                    self.pending.extend_from_slice(&buf[..end]);
                    self.inner.consume(end + 1);
                    if !self.pending.is_empty() {
                        return Ok(Some(self.take_pending()));
                    }
                }
                None => {
                    let len = buf.len();
                    self.pending.extend_from_slice(buf);
                    self.inner.consume(len);
                }
            }
        }
    }

    fn take_pending(&mut self) -> String {
        let line = String::from_utf8_lossy(&self.pending).trim_end().to_string();
        self.pending.clear();
        line
    }
}
