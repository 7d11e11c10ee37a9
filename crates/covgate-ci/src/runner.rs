//! Suite execution with captured test logs.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;

use anyhow::{bail, Context};
use covgate_core::coverage::CoverageCollector;
use covgate_core::{obs, Suite};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

/// Result of one suite run.
#[derive(Debug, Clone)]
pub struct SuiteResult {
    /// Suite name.
    pub suite: String,

    /// Exit code (0 = success, -1 when killed by a signal).
    pub exit_code: i32,

    /// Duration in milliseconds.
    pub duration_ms: u64,

    /// Whether the test command succeeded.
    pub success: bool,

    /// Whether the run left an execution data artifact.
    pub artifact_written: bool,

    pub stdout_log: PathBuf,
    pub stderr_log: PathBuf,
}

impl SuiteResult {
    pub fn passed(&self) -> bool {
        self.success && self.exit_code == 0
    }
}

/// Runs a suite's test command under coverage instrumentation.
pub struct SuiteRunner;

impl SuiteRunner {
    /// Execute a suite and return the result.
    ///
    /// The previous artifact is discarded first. Stdout and stderr go to
    /// `stdout.log` / `stderr.log` in the suite's log directory, and every
    /// line is forwarded to tracing at debug level.
    pub async fn run(suite: &Suite, collector: &CoverageCollector) -> anyhow::Result<SuiteResult> {
        let start = Instant::now();

        let Some((exe, args)) = suite.command.split_first() else {
            bail!("Suite {} has empty command", suite.name);
        };

        let instrumentation = collector
            .prepare(suite)
            .with_context(|| format!("prepare instrumentation for suite {}", suite.name))?;
        let stdout_log = suite.log_dir.join("stdout.log");
        let stderr_log = suite.log_dir.join("stderr.log");

        info!(suite = %suite.name, command = %suite.command.join(" "), "Running suite");

        let mut child = Command::new(exe)
            .args(args)
            .envs(&instrumentation.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("spawn `{}` for suite {}", exe, suite.name))?;

        let stdout = child.stdout.take().context("child stdout not captured")?;
        let stderr = child.stderr.take().context("child stderr not captured")?;

        let (_, _, status) = tokio::try_join!(
            forward(stdout, &stdout_log, &suite.name, "stdout"),
            forward(stderr, &stderr_log, &suite.name, "stderr"),
            async { child.wait().await.map_err(anyhow::Error::from) },
        )?;

        let duration_ms = start.elapsed().as_millis() as u64;
        let exit_code = status.code().unwrap_or(-1);
        let success = status.success();
        let artifact_written = collector.finish(suite);

        obs::emit_suite_finished(&suite.name, exit_code, success, &suite.log_dir);

        Ok(SuiteResult {
            suite: suite.name.clone(),
            exit_code,
            duration_ms,
            success,
            artifact_written,
            stdout_log,
            stderr_log,
        })
    }
}

/// Copy a child stream into `log`, echoing each line to tracing.
async fn forward<R>(reader: R, log: &Path, suite: &str, stream: &'static str) -> anyhow::Result<u64>
where
    R: AsyncRead + Unpin,
{
    let mut file = File::create(log)
        .await
        .with_context(|| format!("create {}", log.display()))?;
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut lines = 0u64;

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }
        file.write_all(&buf).await?;
        let line = String::from_utf8_lossy(&buf);
        debug!(suite = %suite, stream = stream, "{}", line.trim_end());
        lines += 1;
    }

    file.flush().await?;
    Ok(lines)
}
