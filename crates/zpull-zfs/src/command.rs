//! Execution wrapper for invoking `zfs`.
//!
//! Every operation spawns its own child. `ZfsProcess` owns that child and
//! reaps it on every path out of the owning call: normal exit, error,
//! timeout, cancellation, or drop.

use log::{debug, warn};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use zpull_core::cancel::CancelToken;
use zpull_core::config::ZpullConfig;
use zpull_core::error::{ZfsError, ZpullError, ZpullResult};

const POLL_INTERVAL: Duration = Duration::from_millis(25);
const DEFAULT_STDERR_LIMIT: usize = 64 * 1024;
const DEFAULT_MAX_LINE: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Input {
    Null,
    Piped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Output {
    Null,
    /// Piped; the caller takes the handle.
    Piped,
    /// Piped and drained on a helper thread.
    Discard,
}

/// How to reach the `zfs` binary and how much of its output to keep.
#[derive(Debug, Clone)]
pub struct ZfsCommand {
    binary: PathBuf,
    timeout: Option<Duration>,
    stderr_limit: usize,
    max_line: usize,
}

impl ZfsCommand {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            timeout: None,
            stderr_limit: DEFAULT_STDERR_LIMIT,
            max_line: DEFAULT_MAX_LINE,
        }
    }

    pub fn from_config(config: &ZpullConfig) -> Self {
        Self::new(config.zfs_binary())
            .with_timeout(config.command_timeout())
            .with_stderr_limit(config.zfs.stderr_limit_bytes)
            .with_max_line(config.zfs.max_line_bytes)
    }

    /// Bound for listing, property and snapshot commands. Transfers are never bounded.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_stderr_limit(mut self, limit: usize) -> Self {
        self.stderr_limit = limit.max(1);
        self
    }

    /// Longest accepted line of listing output.
    pub fn with_max_line(mut self, limit: usize) -> Self {
        self.max_line = limit.max(1);
        self
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub(crate) fn max_line(&self) -> usize {
        self.max_line
    }

    pub(crate) fn binary_name(&self) -> String {
        self.binary.display().to_string()
    }

    /// Cancellation token carrying the configured timeout, if any.
    pub(crate) fn deadline(&self) -> Option<CancelToken> {
        self.timeout.map(CancelToken::with_timeout)
    }

    pub(crate) fn spawn(
        &self,
        args: &[String],
        input: Input,
        output: Output,
    ) -> ZpullResult<ZfsProcess> {
        debug!("exec: {} {}", self.binary.display(), args.join(" "));

        let mut command = Command::new(&self.binary);
        command.args(args);
        command.stdin(match input {
            Input::Null => Stdio::null(),
            Input::Piped => Stdio::piped(),
        });
        command.stdout(match output {
            Output::Null => Stdio::null(),
            Output::Piped | Output::Discard => Stdio::piped(),
        });
        command.stderr(Stdio::piped());

        let mut child = command.spawn().map_err(|source| ZpullError::Spawn {
            binary: self.binary_name(),
            source,
        })?;

        let stderr = spawn_stderr_reader(child.stderr.take(), self.stderr_limit);
        let drain = match output {
            Output::Discard => spawn_discard(child.stdout.take()),
            Output::Null | Output::Piped => None,
        };

        Ok(ZfsProcess {
            child,
            binary: self.binary_name(),
            stderr,
            drain,
            reaped: false,
        })
    }

    /// Run to completion and return captured stdout.
    pub(crate) fn run(&self, args: &[String]) -> ZpullResult<Vec<u8>> {
        let mut process = self.spawn(args, Input::Null, Output::Piped)?;
        let stdout = spawn_output_reader(process.take_stdout());
        let deadline = self.deadline();
        process.wait(deadline.as_ref())?;
        stdout
            .join()
            .map_err(|_| reader_panicked("stdout"))?
            .map_err(ZpullError::Io)
    }

    /// Run to completion, ignoring stdout.
    pub(crate) fn run_silent(&self, args: &[String]) -> ZpullResult<()> {
        let mut process = self.spawn(args, Input::Null, Output::Null)?;
        let deadline = self.deadline();
        process.wait(deadline.as_ref())
    }
}

/// A running `zfs` child. Dropping it before it was waited for kills and reaps it.
#[derive(Debug)]
pub(crate) struct ZfsProcess {
    child: Child,
    binary: String,
    stderr: Option<JoinHandle<io::Result<Vec<u8>>>>,
    drain: Option<JoinHandle<io::Result<u64>>>,
    reaped: bool,
}

impl ZfsProcess {
    pub(crate) fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    pub(crate) fn take_stdin(&mut self) -> Option<ChildStdin> {
        self.child.stdin.take()
    }

    pub(crate) fn poll(&mut self) -> ZpullResult<Option<ExitStatus>> {
        self.child.try_wait().map_err(|source| ZpullError::Wait {
            binary: self.binary.clone(),
            source,
        })
    }

    /// Wait for exit. With a token, the child is killed and reaped once it fires.
    pub(crate) fn wait(&mut self, cancel: Option<&CancelToken>) -> ZpullResult<()> {
        let Some(cancel) = cancel else {
            let status = self.child.wait().map_err(|source| ZpullError::Wait {
                binary: self.binary.clone(),
                source,
            })?;
            return self.conclude(status);
        };

        loop {
            if let Some(status) = self.poll()? {
                return self.conclude(status);
            }
            if cancel.is_cancelled() {
                self.terminate();
                return Err(ZpullError::Cancelled);
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    /// Translate an observed exit into the call result, collecting stderr.
    pub(crate) fn conclude(&mut self, status: ExitStatus) -> ZpullResult<()> {
        self.reaped = true;
        if let Some(drain) = self.drain.take() {
            drain.join().map_err(|_| reader_panicked("stdout"))??;
        }
        let stderr = match self.stderr.take() {
            Some(handle) => handle.join().map_err(|_| reader_panicked("stderr"))??,
            None => Vec::new(),
        };
        if status.success() {
            Ok(())
        } else {
            Err(ZfsError::new(stderr, status).into())
        }
    }

    /// Send SIGKILL without reaping.
    pub(crate) fn kill(&mut self) {
        if !self.reaped {
            let _ = self.child.kill();
        }
    }

    /// Kill and reap.
    pub(crate) fn terminate(&mut self) {
        if self.reaped {
            return;
        }
        let _ = self.child.kill();
        let _ = self.child.wait();
        self.reaped = true;
    }
}

impl Drop for ZfsProcess {
    fn drop(&mut self) {
        if !self.reaped {
            warn!("{} (pid {}) abandoned before exit; killing", self.binary, self.child.id());
            self.terminate();
        }
    }
}

fn reader_panicked(stream: &str) -> ZpullError {
    ZpullError::Io(io::Error::other(format!("{stream} reader thread panicked")))
}

/// Read stderr to the end but keep at most `limit` bytes, so a chatty child never blocks.
fn spawn_stderr_reader<R>(pipe: Option<R>, limit: usize) -> Option<JoinHandle<io::Result<Vec<u8>>>>
where
    R: Read + Send + 'static,
{
    let mut pipe = pipe?;
    Some(thread::spawn(move || -> io::Result<Vec<u8>> {
        let mut kept = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = match pipe.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            };
            let room = limit.saturating_sub(kept.len());
            kept.extend_from_slice(&chunk[..n.min(room)]);
        }
        Ok(kept)
    }))
}

fn spawn_output_reader<R>(pipe: Option<R>) -> JoinHandle<io::Result<Vec<u8>>>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        if let Some(mut reader) = pipe {
            reader.read_to_end(&mut buf)?;
        }
        Ok(buf)
    })
}

/// Some ZFS releases fail `recv` when stdout is not connected, so it is piped and thrown away.
fn spawn_discard<R>(pipe: Option<R>) -> Option<JoinHandle<io::Result<u64>>>
where
    R: Read + Send + 'static,
{
    let mut pipe = pipe?;
    Some(thread::spawn(move || io::copy(&mut pipe, &mut io::sink())))
}
