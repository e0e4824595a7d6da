//! `zfs send` and `zfs recv` byte streams.

use crate::command::{Input, Output, ZfsProcess};
use crate::system::SystemZfs;
use log::debug;
use std::io::{self, Read, Write};
use std::process::{ChildStdin, ChildStdout};
use zpull_core::error::{ZpullError, ZpullResult};
use zpull_core::path::DatasetPath;
use zpull_core::provider::ReceiveStream;
use zpull_core::version::FilesystemVersion;

fn to_io(err: ZpullError) -> io::Error {
    match err {
        ZpullError::Io(err) => err,
        other => io::Error::other(other),
    }
}

fn pipe_missing(which: &str) -> ZpullError {
    ZpullError::Io(io::Error::other(format!("zfs {which} was not captured")))
}

pub(crate) fn send_args(
    fs: &DatasetPath,
    from: &FilesystemVersion,
    to: Option<&FilesystemVersion>,
) -> Vec<String> {
    match to {
        None => vec!["send".to_string(), from.to_abs_path(fs)],
        Some(to) => vec![
            "send".to_string(),
            "-i".to_string(),
            from.to_abs_path(fs),
            to.to_abs_path(fs),
        ],
    }
}

pub(crate) fn recv_args(fs: &DatasetPath, extra: &[String]) -> Vec<String> {
    let mut args = vec!["recv".to_string()];
    args.extend(extra.iter().cloned());
    args.push(fs.to_string());
    args
}

/// Output of a running `zfs send`.
///
/// A nonzero exit is reported as a read error once the output is exhausted.
/// Dropping the stream before that kills the sender.
#[derive(Debug)]
pub struct SendStream {
    stdout: ChildStdout,
    process: ZfsProcess,
    finished: bool,
}

impl Read for SendStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.finished {
            return Ok(0);
        }
        let read = self.stdout.read(buf)?;
        if read == 0 && !buf.is_empty() {
            self.finished = true;
            self.process.wait(None).map_err(to_io)?;
        }
        Ok(read)
    }
}

/// Input of a running `zfs recv`.
///
/// Call [`RecvWriter::close`] (or `finish` through [`ReceiveStream`]) to
/// complete the receive. Dropping the writer aborts it.
#[derive(Debug)]
pub struct RecvWriter {
    stdin: Option<ChildStdin>,
    process: ZfsProcess,
}

impl RecvWriter {
    /// Close stdin and wait for the receive to complete.
    pub fn close(mut self) -> ZpullResult<()> {
        drop(self.stdin.take());
        self.process.wait(None)
    }

    fn input(&mut self) -> io::Result<&mut ChildStdin> {
        self.stdin
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "zfs recv input closed"))
    }
}

impl Write for RecvWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.input()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.input()?.flush()
    }
}

impl ReceiveStream for RecvWriter {
    fn finish(self: Box<Self>) -> ZpullResult<()> {
        (*self).close()
    }
}

impl SystemZfs {
    /// Full send of `from` or, with `to`, an incremental send from `from` to `to`.
    pub fn send(
        &self,
        fs: &DatasetPath,
        from: &FilesystemVersion,
        to: Option<&FilesystemVersion>,
    ) -> ZpullResult<SendStream> {
        let mut process = self
            .command()
            .spawn(&send_args(fs, from, to), Input::Null, Output::Piped)?;
        let stdout = process.take_stdout().ok_or_else(|| pipe_missing("send stdout"))?;
        Ok(SendStream {
            stdout,
            process,
            finished: false,
        })
    }

    /// Feed `stream` into `zfs recv [args] <fs>` and wait for it.
    ///
    /// When both the copy and the receive fail, the receive's error wins: a
    /// broken pipe usually just means `zfs recv` gave up first.
    pub fn receive<R: Read + ?Sized>(
        &self,
        fs: &DatasetPath,
        stream: &mut R,
        args: &[String],
    ) -> ZpullResult<()> {
        let mut process = self
            .command()
            .spawn(&recv_args(fs, args), Input::Piped, Output::Discard)?;
        let mut stdin = process.take_stdin().ok_or_else(|| pipe_missing("recv stdin"))?;

        let copied = io::copy(stream, &mut stdin);
        drop(stdin);
        let waited = process.wait(None);

        match (copied, waited) {
            (_, Err(err)) => Err(err),
            (Err(err), Ok(())) => Err(err.into()),
            (Ok(bytes), Ok(())) => {
                debug!("received {bytes} bytes into {fs}");
                Ok(())
            }
        }
    }

    /// Start `zfs recv [args] <fs>` and return its input.
    pub fn receive_writer(&self, fs: &DatasetPath, args: &[String]) -> ZpullResult<RecvWriter> {
        let mut process = self
            .command()
            .spawn(&recv_args(fs, args), Input::Piped, Output::Discard)?;
        let stdin = process.take_stdin().ok_or_else(|| pipe_missing("recv stdin"))?;
        Ok(RecvWriter {
            stdin: Some(stdin),
            process,
        })
    }
}
