use std::fmt::Display;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::ToolLaunchError;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Exit code recorded for a process that was terminated by a signal.
pub const SIGNAL_EXIT_CODE: i32 = -1;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    Synthesis,
    Timing,
}

impl Display for ToolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Synthesis => write!(f, "synthesis"),
            Self::Timing => write!(f, "timing"),
        }
    }
}

/// Exit status and combined stdout/stderr text of a finished tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub exit_code: i32,
    pub output: String,
}

impl ToolOutput {
    #[inline]
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Launches external tools.
///
/// Implementations must not interpret the exit code; that is left to the caller.
pub trait ToolInvoker: Send + Sync {
    fn invoke(
        &self,
        executable: &Path,
        args: &[String],
        work_dir: &Path,
    ) -> Result<ToolOutput, ToolLaunchError>;
}

impl<F> ToolInvoker for F
where
    F: Fn(&Path, &[String], &Path) -> Result<ToolOutput, ToolLaunchError> + Send + Sync,
{
    fn invoke(
        &self,
        executable: &Path,
        args: &[String],
        work_dir: &Path,
    ) -> Result<ToolOutput, ToolLaunchError> {
        self(executable, args, work_dir)
    }
}

/// A flag shared between a sweep and its caller to request cooperative shutdown.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Runs tools as child processes of the current process.
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use std::time::Duration;
/// use synsweep::tool::{ProcessInvoker, ToolInvoker};
///
/// let invoker = ProcessInvoker::new().timeout(Some(Duration::from_secs(600)));
/// let out = invoker
///     .invoke(Path::new("synlig"), &["-s".into(), "synlig.tcl".into()], Path::new("build"))
///     .unwrap();
/// println!("{}", out.output);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ProcessInvoker {
    timeout: Option<Duration>,
    cancel: CancelToken,
}

impl ProcessInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill tools that run longer than `timeout`. Disabled by default.
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Kill running tools once `cancel` is triggered.
    pub fn cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Fails once the tool has been cancelled or has run out of time.
    fn check_deadline(
        &self,
        started: Instant,
        executable: &Path,
    ) -> Result<(), ToolLaunchError> {
        if self.cancel.is_cancelled() {
            return Err(ToolLaunchError::Cancelled {
                executable: executable.to_owned(),
            });
        }
        match self.timeout {
            Some(timeout) if started.elapsed() >= timeout => Err(ToolLaunchError::TimedOut {
                executable: executable.to_owned(),
                timeout,
            }),
            _ => Ok(()),
        }
    }

    fn wait(
        &self,
        child: &mut Child,
        started: Instant,
        executable: &Path,
    ) -> Result<i32, ToolLaunchError> {
        loop {
            let status = child.try_wait().map_err(|source| ToolLaunchError::Io {
                executable: executable.to_owned(),
                source,
            })?;
            if let Some(status) = status {
                return Ok(status.code().unwrap_or(SIGNAL_EXIT_CODE));
            }

            if let Err(e) = self.check_deadline(started, executable) {
                kill(child);
                return Err(e);
            }

            thread::sleep(POLL_INTERVAL);
        }
    }

    /// Gathers output until every writer has closed the pipes.
    ///
    /// Processes left behind by the tool may keep the pipes open, so the
    /// deadline still applies after the tool itself has exited.
    fn collect(
        &self,
        rx: Receiver<Vec<u8>>,
        started: Instant,
        executable: &Path,
    ) -> Result<Vec<u8>, ToolLaunchError> {
        let mut combined = Vec::new();
        loop {
            match rx.recv_timeout(POLL_INTERVAL) {
                Ok(chunk) => combined.extend_from_slice(&chunk),
                Err(RecvTimeoutError::Disconnected) => return Ok(combined),
                Err(RecvTimeoutError::Timeout) => {}
            }
            self.check_deadline(started, executable)?;
        }
    }
}

impl ToolInvoker for ProcessInvoker {
    fn invoke(
        &self,
        executable: &Path,
        args: &[String],
        work_dir: &Path,
    ) -> Result<ToolOutput, ToolLaunchError> {
        log::debug!(
            "running `{} {}` in {:?}",
            executable.display(),
            args.join(" "),
            work_dir
        );

        let started = Instant::now();
        let mut child = Command::new(executable)
            .args(args)
            .current_dir(work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ToolLaunchError::Spawn {
                executable: executable.to_owned(),
                source,
            })?;

        let (tx, rx) = mpsc::channel();
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(forward_lines(stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(forward_lines(stderr, tx.clone()));
        }
        drop(tx);

        let exit_code = self.wait(&mut child, started, executable)?;
        let combined = self.collect(rx, started, executable)?;

        let io_err = |source| ToolLaunchError::Io {
            executable: PathBuf::from(executable),
            source,
        };
        for reader in readers {
            reader
                .join()
                .map_err(|_| io_err(std::io::Error::other("output reader panicked")))?
                .map_err(io_err)?;
        }

        Ok(ToolOutput {
            exit_code,
            output: String::from_utf8_lossy(&combined).into_owned(),
        })
    }
}

fn kill(child: &mut Child) {
    // The child may have exited between polling and killing.
    let _ = child.kill();
    let _ = child.wait();
}

fn forward_lines<R>(source: R, tx: Sender<Vec<u8>>) -> JoinHandle<std::io::Result<()>>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut reader = BufReader::new(source);
        loop {
            let mut line = Vec::new();
            if reader.read_until(b'\n', &mut line)? == 0 {
                return Ok(());
            }
            if tx.send(line).is_err() {
                return Ok(());
            }
        }
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Vec<String> {
        vec!["-c".to_string(), script.to_string()]
    }

    #[test]
    fn test_combined_output_and_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let out = ProcessInvoker::new()
            .invoke(
                Path::new("sh"),
                &sh("echo to-stdout; echo to-stderr 1>&2; exit 3"),
                dir.path(),
            )
            .unwrap();
        assert_eq!(out.exit_code, 3);
        assert!(!out.success());
        assert!(out.output.contains("to-stdout\n"));
        assert!(out.output.contains("to-stderr\n"));
    }

    #[test]
    fn test_runs_in_work_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "found it").unwrap();
        let out = ProcessInvoker::new()
            .invoke(Path::new("sh"), &sh("cat marker.txt"), dir.path())
            .unwrap();
        assert!(out.success());
        assert_eq!(out.output, "found it");
    }

    #[test]
    fn test_missing_executable() {
        let dir = tempfile::tempdir().unwrap();
        let err = ProcessInvoker::new()
            .invoke(
                Path::new("/nonexistent/synsweep-tool"),
                &[],
                dir.path(),
            )
            .unwrap_err();
        assert!(matches!(err, ToolLaunchError::Spawn { .. }));
    }

    #[test]
    fn test_timeout_kills_tool() {
        let dir = tempfile::tempdir().unwrap();
        let started = Instant::now();
        let err = ProcessInvoker::new()
            .timeout(Some(Duration::from_millis(100)))
            .invoke(Path::new("sleep"), &["5".to_string()], dir.path())
            .unwrap_err();
        assert!(matches!(err, ToolLaunchError::TimedOut { .. }));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn test_cancelled_tool() {
        let dir = tempfile::tempdir().unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = ProcessInvoker::new()
            .cancel_token(cancel)
            .invoke(Path::new("sleep"), &["5".to_string()], dir.path())
            .unwrap_err();
        assert!(matches!(err, ToolLaunchError::Cancelled { .. }));
    }

    #[test]
    fn test_timeout_covers_leftover_processes() {
        let dir = tempfile::tempdir().unwrap();
        let started = Instant::now();
        let err = ProcessInvoker::new()
            .timeout(Some(Duration::from_millis(200)))
            .invoke(Path::new("sh"), &sh("sleep 3 & echo hi"), dir.path())
            .unwrap_err();
        assert!(matches!(err, ToolLaunchError::TimedOut { .. }));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_cancel_covers_leftover_processes() {
        let dir = tempfile::tempdir().unwrap();
        let cancel = CancelToken::new();
        let trigger = cancel.clone();
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(200));
            trigger.cancel();
        });
        let started = Instant::now();
        let err = ProcessInvoker::new()
            .cancel_token(cancel)
            .invoke(Path::new("sh"), &sh("sleep 3 & echo hi"), dir.path())
            .unwrap_err();
        canceller.join().unwrap();
        assert!(matches!(err, ToolLaunchError::Cancelled { .. }));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_closure_invoker() {
        let invoker = |_: &Path, args: &[String], _: &Path| -> Result<ToolOutput, ToolLaunchError> {
            Ok(ToolOutput {
                exit_code: 0,
                output: args.join(" "),
            })
        };
        let out = invoker
            .invoke(Path::new("fake"), &sh("x"), Path::new("."))
            .unwrap();
        assert_eq!(out.output, "-c x");
    }
}
