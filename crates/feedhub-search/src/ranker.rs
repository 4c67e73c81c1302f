//! Ranking through an external process.
//!
//! The process receives `{"data": [...], "query": "...", "limit": n}` on
//! stdin and answers with a JSON array of `{score, record, rank}` on stdout.
//! A non-zero exit is reported with the `error` field the process printed,
//! or its stderr.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use feedhub_core::config::SearchSettings;
use feedhub_core::traits::Ranker;
use feedhub_core::{Error, RankedResult, Record, Result, Value};
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Serialize)]
struct RankRequest<'a> {
    data: &'a [Record],
    query: &'a str,
    limit: usize,
}

#[derive(Debug, Clone)]
pub struct SubprocessRanker {
    program: PathBuf,
    args: Vec<OsString>,
    timeout: Duration,
}

impl SubprocessRanker {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self { program: program.into(), args: Vec::new(), timeout: DEFAULT_TIMEOUT }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// `<python> <script>`, both resolved against `base`.
    pub fn from_settings(settings: &SearchSettings, base: &Path) -> Self {
        Self::new(settings.python_command(base))
            .arg(settings.script(base))
            .with_timeout(Duration::from_secs(settings.timeout))
    }

    async fn run(&self, payload: Vec<u8>) -> Result<std::process::Output> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                Error::Fetch(format!("Failed to start ranking process {}: {e}", self.program.display()))
            })?;
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Fetch("ranking process has no stdin".to_string()))?;

        let exchange = async move {
            let feed = async move {
                if let Err(e) = stdin.write_all(&payload).await {
                    debug!("ranking process closed stdin early: {e}");
                }
                drop(stdin);
            };
            let ((), output) = tokio::join!(feed, child.wait_with_output());
            output
        };

        // dropping the exchange on timeout kills the child
        tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| {
                Error::Fetch(format!("Ranking process timed out after {:?}", self.timeout))
            })?
            .map_err(|e| Error::Fetch(format!("Ranking process failed: {e}")))
    }
}

#[async_trait]
impl Ranker for SubprocessRanker {
    async fn rank(&self, records: &[Record], query: &str, limit: usize) -> Result<Vec<RankedResult>> {
        let payload = serde_json::to_vec(&RankRequest { data: records, query, limit })
            .map_err(|e| Error::Fetch(format!("Cannot encode ranking request: {e}")))?;
        debug!(records = records.len(), limit, program = %self.program.display(), "ranking");

        let output = self.run(payload).await?;
        if !output.status.success() {
            return Err(Error::Fetch(format!("Ranking process failed: {}", failure_detail(&output))));
        }
        serde_json::from_slice(&output.stdout)
            .map_err(|e| Error::Fetch(format!("Invalid JSON from ranking process: {e}")))
    }
}

fn failure_detail(output: &std::process::Output) -> String {
    let reported = serde_json::from_slice::<Value>(&output.stdout)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string));
    if let Some(message) = reported {
        return message;
    }
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if stderr.is_empty() {
        output.status.to_string()
    } else {
        stderr
    }
}
