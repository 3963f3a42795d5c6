//! # Executor Runner
//!
//! Runs the launcher script of a rendered environment and streams its
//! standard output line by line.
//!
//! The launcher runs in its own process group so that cancelling the run
//! terminates the executor and everything it started. The exception is a
//! run that prompts for the privilege-escalation password: the prompt needs
//! the terminal, so the launcher stays in the caller's group.
//!
//! A run ends with:
//! - `Ok(())` when the launcher exits with status 0,
//! - [`Error::ExecutorFailure`] with the exit code otherwise,
//! - [`Error::Interrupted`] when the [`CancelToken`] fires,
//! - [`Error::IdleTimeout`] when no output line arrives in time.

use std::io::{BufRead, BufReader};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::defaults::STRUCTURED_OUTPUT_ENV_VAR;
use crate::error::{Error, Result};
use crate::phases::layout::LAUNCHER_FILE;

/// Shared cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// How the launcher is run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// Fail when no output line arrives for this long.
    pub idle_timeout: Option<Duration>,
    /// Sets the structured-output variable for the executor.
    pub structured_output: bool,
    /// Prompt for the privilege-escalation password.
    pub ask_become_pass: bool,
    /// How often the cancel flag is checked while waiting for output.
    pub poll_interval: Duration,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            idle_timeout: None,
            structured_output: false,
            ask_become_pass: false,
            poll_interval: Duration::from_millis(100),
        }
    }
}

/// Runs `<env_dir>/run_all_plays.sh`, handing every output line to
/// `on_line`.
pub fn run<F>(env_dir: &Path, options: &RunOptions, cancel: &CancelToken, mut on_line: F) -> Result<()>
where
    F: FnMut(&str),
{
    let launcher = env_dir.join(LAUNCHER_FILE);
    if !launcher.is_file() {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("launcher script {} not found", launcher.display()),
        )));
    }

    // The launcher runs inside `env_dir`, so it is named relative to it.
    let mut command = Command::new("bash");
    command
        .arg(LAUNCHER_FILE)
        .current_dir(env_dir)
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit());
    if options.ask_become_pass {
        command.arg("--ask-become-pass").stdin(Stdio::inherit());
    } else {
        command.stdin(Stdio::null());
    }
    if options.structured_output {
        command.env(STRUCTURED_OUTPUT_ENV_VAR, "1");
    }
    let own_group = !options.ask_become_pass;
    #[cfg(unix)]
    if own_group {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }

    info!("Running {}", launcher.display());
    let mut child = command.spawn().map_err(|e| Error::ExternalTool {
        tool: "bash".to_string(),
        message: format!("failed to start {}: {}", launcher.display(), e),
    })?;

    let stdout = child.stdout.take().ok_or_else(|| Error::ExternalTool {
        tool: "bash".to_string(),
        message: "launcher stdout is not captured".to_string(),
    })?;
    let (tx, rx) = mpsc::channel::<String>();
    thread::spawn(move || {
        let mut reader = BufReader::new(stdout);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    let line = line.trim_end_matches(['\n', '\r']).to_string();
                    if tx.send(line).is_err() {
                        break;
                    }
                }
            }
        }
    });

    let mut last_output = Instant::now();
    loop {
        if cancel.is_cancelled() {
            terminate(&mut child, own_group);
            return Err(Error::Interrupted);
        }
        match rx.recv_timeout(options.poll_interval) {
            Ok(line) => {
                last_output = Instant::now();
                on_line(&line);
            }
            Err(RecvTimeoutError::Timeout) => {
                if let Some(limit) = options.idle_timeout {
                    if last_output.elapsed() >= limit {
                        warn!("No executor output for {}s, stopping", limit.as_secs());
                        terminate(&mut child, own_group);
                        return Err(Error::IdleTimeout {
                            seconds: limit.as_secs(),
                        });
                    }
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    let status = child.wait()?;
    if cancel.is_cancelled() {
        return Err(Error::Interrupted);
    }
    debug!("Launcher exited with {}", status);
    match status.code() {
        Some(0) => Ok(()),
        Some(code) => Err(Error::ExecutorFailure { code }),
        None => Err(Error::ExecutorFailure {
            code: signal_exit_code(&status),
        }),
    }
}

#[cfg(unix)]
fn signal_exit_code(status: &std::process::ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status.signal().map(|s| 128 + s).unwrap_or(1)
}

#[cfg(not(unix))]
fn signal_exit_code(_status: &std::process::ExitStatus) -> i32 {
    1
}

/// Sends SIGTERM to the launcher (and its group) and reaps it.
#[cfg(unix)]
fn terminate(child: &mut Child, own_group: bool) {
    use nix::sys::signal::{kill, killpg, Signal};
    use nix::unistd::Pid;

    let pid = Pid::from_raw(child.id() as i32);
    let sent = if own_group {
        killpg(pid, Signal::SIGTERM)
    } else {
        kill(pid, Signal::SIGTERM)
    };
    if let Err(e) = sent {
        warn!("Failed to signal executor {}: {}", pid, e);
        let _ = child.kill();
    }
    let _ = child.wait();
}

#[cfg(not(unix))]
fn terminate(child: &mut Child, _own_group: bool) {
    let _ = child.kill();
    let _ = child.wait();
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn env_with_launcher(script: &str) -> TempDir {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(LAUNCHER_FILE), script).unwrap();
        temp
    }

    fn collect(env: &Path, options: &RunOptions, cancel: &CancelToken) -> (Result<()>, Vec<String>) {
        let mut lines = Vec::new();
        let result = run(env, options, cancel, |line| lines.push(line.to_string()));
        (result, lines)
    }

    #[test]
    fn test_streams_lines() {
        let env = env_with_launcher("echo one\necho two\n");
        let (result, lines) = collect(env.path(), &RunOptions::default(), &CancelToken::new());
        result.unwrap();
        assert_eq!(lines, vec!["one", "two"]);
    }

    #[test]
    fn test_exit_code_is_reported() {
        let env = env_with_launcher("echo failing\nexit 3\n");
        let (result, lines) = collect(env.path(), &RunOptions::default(), &CancelToken::new());
        assert!(matches!(result, Err(Error::ExecutorFailure { code: 3 })));
        assert_eq!(lines, vec!["failing"]);
    }

    #[test]
    fn test_structured_output_variable() {
        let env = env_with_launcher("echo \"structured=${NSBL_STRUCTURED_OUTPUT:-0}\"\n");
        let options = RunOptions {
            structured_output: true,
            ..Default::default()
        };
        let (result, lines) = collect(env.path(), &options, &CancelToken::new());
        result.unwrap();
        assert_eq!(lines, vec!["structured=1"]);
    }

    #[test]
    fn test_idle_timeout() {
        let env = env_with_launcher("echo start\nsleep 30\n");
        let options = RunOptions {
            idle_timeout: Some(Duration::from_millis(300)),
            poll_interval: Duration::from_millis(50),
            ..Default::default()
        };
        let started = Instant::now();
        let (result, lines) = collect(env.path(), &options, &CancelToken::new());
        assert!(matches!(result, Err(Error::IdleTimeout { .. })));
        assert_eq!(lines, vec!["start"]);
        assert!(started.elapsed() < Duration::from_secs(20));
    }

    #[test]
    fn test_cancel_terminates_run() {
        let env = env_with_launcher("echo start\nsleep 30\n");
        let cancel = CancelToken::new();
        let trigger = cancel.clone();
        let started = Instant::now();
        let result = run(env.path(), &RunOptions::default(), &cancel, move |_| trigger.cancel());
        assert!(matches!(result, Err(Error::Interrupted)));
        assert!(started.elapsed() < Duration::from_secs(20));
    }

    #[test]
    fn test_relative_environment_directory() {
        let env = tempfile::Builder::new()
            .prefix("nsbl-exec-")
            .tempdir_in(".")
            .unwrap();
        std::fs::write(env.path().join(LAUNCHER_FILE), "echo relative\n").unwrap();
        let relative = Path::new(".").join(env.path().file_name().unwrap());
        assert!(relative.is_relative());

        let (result, lines) = collect(&relative, &RunOptions::default(), &CancelToken::new());
        result.unwrap();
        assert_eq!(lines, vec!["relative"]);
    }

    #[test]
    fn test_missing_launcher() {
        let temp = TempDir::new().unwrap();
        let (result, _) = collect(temp.path(), &RunOptions::default(), &CancelToken::new());
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
