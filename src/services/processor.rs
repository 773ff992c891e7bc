use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::models::ProcessingResult;
use crate::utils::latch::ResponseLatch;

/// How long output pipes may stay open after the script itself has exited
const OUTPUT_GRACE: Duration = Duration::from_millis(500);

#[derive(Error, Debug)]
pub enum SimplifyError {
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Processing script not found at {}", .0.display())]
    ScriptUnavailable(PathBuf),

    #[error("Failed to start processing script: {0}")]
    Spawn(#[source] io::Error),

    #[error("Processing timed out after {} seconds", .0.as_secs())]
    Timeout(Duration),
}

/// Trait for document simplification backends
#[async_trait]
pub trait DocumentProcessor: Send + Sync {
    /// Run one simplification for a file already on disk
    async fn simplify(&self, file_path: &Path) -> Result<ProcessingResult, SimplifyError>;

    /// Check if the processor can currently accept work
    async fn health_check(&self) -> bool;

    /// Human-readable location of the backing program, for health output
    fn describe(&self) -> String;
}

/// How a supervised run ended, as decided by the latch
#[derive(Debug)]
enum RunOutcome {
    Exited {
        status: ExitStatus,
        stdout: String,
        stderr: String,
    },
    WaitFailed(io::Error),
    TimedOut,
}

/// Runs an external script that reads a file path on stdin and answers on stdout.
///
/// The script is an opaque collaborator: exit 0 with text on stdout is a
/// success, anything else is a failure whose diagnostics come from stderr.
pub struct ScriptProcessor {
    interpreter: String,
    script_path: PathBuf,
    timeout: Duration,
}

impl ScriptProcessor {
    /// An empty `interpreter` executes `script_path` directly.
    pub fn new(
        interpreter: impl Into<String>,
        script_path: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Self {
        Self {
            interpreter: interpreter.into(),
            script_path: script_path.into(),
            timeout,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.interpreter.clone(),
            config.script_path.clone(),
            config.processing_timeout,
        )
    }

    fn command(&self) -> Command {
        let mut cmd = if self.interpreter.is_empty() {
            Command::new(&self.script_path)
        } else {
            let mut cmd = Command::new(&self.interpreter);
            cmd.arg(&self.script_path);
            cmd
        };
        // Own process group, so a kill reaches anything the script started
        #[cfg(unix)]
        cmd.process_group(0);
        cmd
    }

    /// Spawns the script and races its exit against the deadline.
    ///
    /// Exit watcher and deadline run as separate tasks and report through a
    /// [`ResponseLatch`]; only the first report is observed. A deadline win
    /// kills and reaps the child even if the caller has stopped waiting.
    async fn run(&self, file_path: &Path) -> Result<RunOutcome, SimplifyError> {
        let mut child = self
            .command()
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(SimplifyError::Spawn)?;

        let pid = child.id();
        info!(
            pid = ?pid,
            script = %self.script_path.display(),
            file = %file_path.display(),
            "🐍 Spawned simplification script"
        );

        let stdout_buf = Captured::default();
        let stderr_buf = Captured::default();
        let stdout_task = child
            .stdout
            .take()
            .map(|s| tokio::spawn(capture_stream(s, stdout_buf.clone())));
        let stderr_task = child
            .stderr
            .take()
            .map(|s| tokio::spawn(capture_stream(s, stderr_buf.clone())));
        let reader_aborts: Vec<_> = stdout_task
            .iter()
            .chain(stderr_task.iter())
            .map(|h| h.abort_handle())
            .collect();

        if let Some(mut stdin) = child.stdin.take() {
            let write = async {
                stdin.write_all(file_path.as_os_str().as_encoded_bytes()).await?;
                stdin.write_all(b"\n").await?;
                stdin.shutdown().await
            };
            // A script that never reads stdin closes the pipe early; its exit status still decides.
            if let Err(e) = write.await {
                debug!(pid = ?pid, "Could not write file path to script stdin: {}", e);
            }
        }

        let (latch, outcome_rx) = ResponseLatch::<RunOutcome>::new();
        let (kill_tx, kill_rx) = oneshot::channel::<()>();

        let watcher_latch = latch.clone();
        tokio::spawn(async move {
            tokio::select! {
                status = child.wait() => {
                    if !finish_readers([stdout_task, stderr_task]).await {
                        warn!(pid = ?pid, "Script exited but left processes holding its output open");
                        kill_process_group(pid);
                    }
                    let stdout = stdout_buf.text();
                    let stderr = stderr_buf.text();
                    let outcome = match status {
                        Ok(status) => RunOutcome::Exited { status, stdout, stderr },
                        Err(e) => RunOutcome::WaitFailed(e),
                    };
                    if !watcher_latch.resolve(outcome) {
                        debug!(pid = ?pid, "Script exited after the deadline; ignoring exit");
                    }
                }
                Ok(()) = kill_rx => {
                    kill_process_group(pid);
                    match child.kill().await {
                        Ok(()) => info!(pid = ?pid, "🔪 Killed timed-out simplification script"),
                        Err(e) => warn!(pid = ?pid, "Failed to kill timed-out script: {}", e),
                    }
                }
            }
        });

        let deadline_latch = latch.clone();
        let timeout = self.timeout;
        let deadline = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if deadline_latch.resolve(RunOutcome::TimedOut) {
                warn!(
                    pid = ?pid,
                    "⏱️  Simplification script exceeded {:?}, terminating",
                    timeout
                );
                for handle in reader_aborts {
                    handle.abort();
                }
                let _ = kill_tx.send(());
            }
        });

        // Only the two tasks may hold the sender, so a crash in both is observable.
        drop(latch);

        let outcome = outcome_rx.await.unwrap_or_else(|_| {
            RunOutcome::WaitFailed(io::Error::other("process supervisor stopped unexpectedly"))
        });

        // Exit won: the deadline has nothing left to do.
        if !matches!(outcome, RunOutcome::TimedOut) {
            deadline.abort();
        }

        Ok(outcome)
    }
}

#[async_trait]
impl DocumentProcessor for ScriptProcessor {
    /// The existence check and the script's own read of the file are not
    /// atomic: a file removed in between surfaces as a script failure.
    async fn simplify(&self, file_path: &Path) -> Result<ProcessingResult, SimplifyError> {
        if !tokio::fs::try_exists(file_path).await.unwrap_or(false) {
            return Err(SimplifyError::FileNotFound(file_path.to_path_buf()));
        }

        if !self.health_check().await {
            return Err(SimplifyError::ScriptUnavailable(self.script_path.clone()));
        }

        let outcome = self.run(file_path).await?;
        interpret_outcome(outcome, processed_file_name(file_path), self.timeout)
    }

    async fn health_check(&self) -> bool {
        tokio::fs::try_exists(&self.script_path)
            .await
            .unwrap_or(false)
    }

    fn describe(&self) -> String {
        self.script_path.display().to_string()
    }
}

/// Bytes read so far from one of the script's pipes
#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl Captured {
    fn text(&self) -> String {
        let buf = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&buf).into_owned()
    }
}

async fn capture_stream<R: AsyncRead + Unpin>(mut stream: R, sink: Captured) {
    let mut chunk = [0u8; 8192];
    loop {
        match stream.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => sink
                .0
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .extend_from_slice(&chunk[..n]),
            Err(e) => {
                debug!("Script stream closed with error: {}", e);
                break;
            }
        }
    }
}

/// Waits up to [`OUTPUT_GRACE`] for the readers to reach end of stream.
/// Returns `false` after aborting them if the pipes are still open.
async fn finish_readers(tasks: [Option<JoinHandle<()>>; 2]) -> bool {
    let mut handles: Vec<JoinHandle<()>> = tasks.into_iter().flatten().collect();

    // A reader aborted by the deadline counts as not drained
    let drained = matches!(
        tokio::time::timeout(OUTPUT_GRACE, futures::future::join_all(handles.iter_mut())).await,
        Ok(results) if results.iter().all(Result::is_ok)
    );

    if !drained {
        for handle in &handles {
            handle.abort();
        }
    }
    drained
}

/// SIGKILLs the script's process group. The script leads its own group, so
/// the group id is its pid; the caller reaps the script itself afterwards.
#[cfg(unix)]
fn kill_process_group(pid: Option<u32>) {
    let Some(pgid) = pid.and_then(|p| libc::pid_t::try_from(p).ok()) else {
        return;
    };
    // SAFETY: kill(2) takes no pointers; a negative pid addresses the group.
    if unsafe { libc::kill(-pgid, libc::SIGKILL) } != 0 {
        debug!(
            pgid,
            "Process group already gone: {}",
            io::Error::last_os_error()
        );
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: Option<u32>) {}

fn processed_file_name(file_path: &Path) -> String {
    file_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_path.display().to_string())
}

fn interpret_outcome(
    outcome: RunOutcome,
    file_name: String,
    timeout: Duration,
) -> Result<ProcessingResult, SimplifyError> {
    match outcome {
        RunOutcome::Exited {
            status,
            stdout,
            stderr,
        } => {
            let output = stdout.trim();
            if status.success() && !output.is_empty() {
                info!(file = %file_name, "✅ Simplification succeeded");
                return Ok(ProcessingResult::succeeded(output.to_string(), file_name));
            }

            let detail = match stderr.trim() {
                "" if status.success() => "Script produced no output".to_string(),
                "" => format!("Script exited with {}", status),
                text => text.to_string(),
            };
            warn!(file = %file_name, status = %status, "Simplification failed: {}", detail);
            Ok(ProcessingResult::failed(detail, file_name))
        }
        RunOutcome::WaitFailed(e) => {
            warn!(file = %file_name, "Lost track of simplification script: {}", e);
            Ok(ProcessingResult::failed(e.to_string(), file_name))
        }
        RunOutcome::TimedOut => Err(SimplifyError::Timeout(timeout)),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::process::ExitStatusExt;

    fn exited(code: i32, stdout: &str, stderr: &str) -> RunOutcome {
        RunOutcome::Exited {
            status: ExitStatus::from_raw(code << 8),
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        }
    }

    const TIMEOUT: Duration = Duration::from_secs(30);

    #[test]
    fn test_success_trims_output() {
        let result =
            interpret_outcome(exited(0, "  SIMPLIFIED TEXT\n", ""), "a.txt".into(), TIMEOUT)
                .unwrap();
        assert!(result.success);
        assert_eq!(result.output.as_deref(), Some("SIMPLIFIED TEXT"));
        assert_eq!(result.error_detail, None);
        assert_eq!(result.processed_file_name, "a.txt");
    }

    #[test]
    fn test_nonzero_exit_carries_stderr() {
        let result =
            interpret_outcome(exited(1, "partial", "boom\n"), "a.txt".into(), TIMEOUT).unwrap();
        assert!(!result.success);
        assert_eq!(result.output, None);
        assert_eq!(result.error_detail.as_deref(), Some("boom"));
    }

    #[test]
    fn test_empty_output_is_failure() {
        let result = interpret_outcome(exited(0, " \n", ""), "a.txt".into(), TIMEOUT).unwrap();
        assert!(!result.success);
        assert_eq!(result.error_detail.as_deref(), Some("Script produced no output"));
    }

    #[test]
    fn test_nonzero_exit_without_stderr_gets_generic_detail() {
        let result = interpret_outcome(exited(3, "", ""), "a.txt".into(), TIMEOUT).unwrap();
        assert!(!result.success);
        assert!(result.error_detail.unwrap().contains("exit"));
    }

    #[test]
    fn test_timeout_is_an_error() {
        let err = interpret_outcome(RunOutcome::TimedOut, "a.txt".into(), TIMEOUT).unwrap_err();
        assert!(matches!(err, SimplifyError::Timeout(d) if d == TIMEOUT));
    }

    #[test]
    fn test_processed_file_name_is_base_name() {
        assert_eq!(
            processed_file_name(Path::new("/srv/content/file-1-2.pdf")),
            "file-1-2.pdf"
        );
    }

    #[tokio::test]
    async fn test_finish_readers_gives_up_on_open_pipes() {
        let stuck = tokio::spawn(std::future::pending::<()>());
        let done = tokio::spawn(async {});
        assert!(!finish_readers([Some(stuck), Some(done)]).await);

        assert!(finish_readers([Some(tokio::spawn(async {})), None]).await);
    }

    #[tokio::test]
    async fn test_missing_file_never_spawns() {
        let processor = ScriptProcessor::new("sh", "/definitely/not/here.sh", TIMEOUT);
        let err = processor
            .simplify(Path::new("/definitely/not/here.txt"))
            .await
            .unwrap_err();
        assert!(matches!(err, SimplifyError::FileNotFound(_)));
    }

    #[tokio::test]
    async fn test_missing_script_is_unavailable() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let processor = ScriptProcessor::new("sh", "/definitely/not/here.sh", TIMEOUT);
        let err = processor.simplify(file.path()).await.unwrap_err();
        assert!(matches!(err, SimplifyError::ScriptUnavailable(_)));
        assert!(!processor.health_check().await);
    }
}
