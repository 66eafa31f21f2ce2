use crate::config::toml_config::ProcessConfig;
use crate::domain::ports::{CommandRunner, Invocation, ProcessOutput};
use crate::utils::error::{ProcessFailureReason, Result, SumoError};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Runs child processes on the tokio runtime, bounded by a timeout.
///
/// Spawn errors and timeouts are retried up to `retry_attempts` times. A
/// process that exits with a non-zero status is returned as-is; deciding what
/// that means is the caller's job.
#[derive(Debug, Clone)]
pub struct TokioCommandRunner {
    timeout: Duration,
    retry_attempts: u32,
    retry_delay: Duration,
}

impl TokioCommandRunner {
    pub fn new(timeout: Duration, retry_attempts: u32, retry_delay: Duration) -> Self {
        Self {
            timeout,
            retry_attempts,
            retry_delay,
        }
    }

    pub fn from_config(config: &ProcessConfig) -> Self {
        Self::new(config.timeout(), config.retry_attempts, config.retry_delay())
    }

    async fn run_once(&self, invocation: &Invocation) -> Result<ProcessOutput> {
        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // 自成一個 process group，逾時時連 netconvert 等孫程序一起結束
        #[cfg(unix)]
        command.process_group(0);

        let child = command.spawn()?;
        let pid = child.id();
        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(output) => {
                let output = output?;
                Ok(ProcessOutput {
                    code: output.status.code(),
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                })
            }
            Err(_) => {
                if let Some(pid) = pid {
                    kill_process_group(pid);
                }
                Err(SumoError::ProcessFailure {
                    tool: invocation.tool_name().to_string(),
                    reason: ProcessFailureReason::TimedOut {
                        after: self.timeout,
                    },
                })
            }
        }
    }
}

impl Default for TokioCommandRunner {
    fn default() -> Self {
        Self::from_config(&ProcessConfig::default())
    }
}

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn run(&self, invocation: &Invocation) -> Result<ProcessOutput> {
        let mut attempt = 0;
        loop {
            tracing::debug!("▶️ Running: {}", invocation);
            match self.run_once(invocation).await {
                Ok(output) => {
                    tracing::debug!(
                        "Process finished with {:?} ({} bytes stdout, {} bytes stderr)",
                        output.code,
                        output.stdout.len(),
                        output.stderr.len()
                    );
                    return Ok(output);
                }
                Err(e) if attempt < self.retry_attempts && is_retryable(&e) => {
                    attempt += 1;
                    tracing::warn!(
                        "⚠️ {} (attempt {}/{}), retrying in {:?}",
                        e,
                        attempt,
                        self.retry_attempts + 1,
                        self.retry_delay
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(unix)]
fn kill_process_group(pid: u32) {
    let Ok(pgid) = libc::pid_t::try_from(pid) else {
        return;
    };
    // SAFETY: kill(2) only sends a signal; the group was created by this runner.
    let rc = unsafe { libc::kill(-pgid, libc::SIGKILL) };
    if rc != 0 {
        tracing::debug!(
            "Process group {} already gone: {}",
            pgid,
            std::io::Error::last_os_error()
        );
    }
}

// 其他平台只靠 kill_on_drop 結束直接子程序
#[cfg(not(unix))]
fn kill_process_group(_pid: u32) {}

fn is_retryable(error: &SumoError) -> bool {
    match error {
        // 找不到執行檔不會因為重試而改善
        SumoError::IoError(e) => e.kind() != std::io::ErrorKind::NotFound,
        other => other.is_transient(),
    }
}
