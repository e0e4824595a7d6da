//! Streaming `zfs list` on a background worker.

use crate::command::{Input, Output, ZfsCommand, ZfsProcess};
use crate::list::{list_args, next_line, split_row};
use crossbeam_channel::{bounded, select, Receiver, Sender};
use log::{debug, warn};
use std::io::BufReader;
use std::process::ChildStdout;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;
use zpull_core::cancel::{CancelGuard, CancelToken};
use zpull_core::error::{ZpullError, ZpullResult};
use zpull_core::provider::{ListRow, RowStream};

const POLL_INTERVAL: Duration = Duration::from_millis(25);

type SharedProcess = Arc<Mutex<ZfsProcess>>;

enum ScanEnd {
    Eof,
    Stopped,
    Failed(ZpullError),
}

/// A running `zfs list` worker and the receiving end of its queue.
///
/// The queue has no capacity, so the worker only reads ahead by one row.
/// Dropping the listing fires `stop`, which the worker and its watcher treat
/// like cancellation.
pub(crate) struct Listing {
    rows: Receiver<ListRow>,
    cancel: CancelToken,
    stop: CancelGuard,
    interrupted: Arc<AtomicBool>,
}

impl Listing {
    pub(crate) fn into_stream(self) -> RowStream {
        RowStream::with_cancel(self.rows, self.cancel, self.stop)
    }

    /// Every row until the worker exits, or its first error.
    ///
    /// `Cancelled` only when the worker itself stopped early.
    pub(crate) fn drain(self) -> ZpullResult<Vec<Vec<String>>> {
        let mut rows = Vec::new();
        for row in self.rows.iter() {
            rows.push(row?);
        }
        if self.interrupted.load(Ordering::SeqCst) {
            return Err(ZpullError::Cancelled);
        }
        Ok(rows)
    }
}

/// Start `zfs list` on a background worker.
pub(crate) fn spawn_listing(
    command: &ZfsCommand,
    cancel: &CancelToken,
    properties: &[&str],
    extra: &[&str],
) -> Listing {
    let (tx, rx) = bounded(0);
    let stop = CancelToken::new();
    let interrupted = Arc::new(AtomicBool::new(false));
    let worker = Worker {
        tx,
        cancel: cancel.clone(),
        stop: stop.clone(),
        interrupted: Arc::clone(&interrupted),
    };
    let command = command.clone();
    let fields = properties.len();
    let args = list_args(properties, extra);

    thread::spawn(move || match args {
        Ok(args) => worker.run(&command, &args, fields),
        Err(err) => {
            worker.deliver(Err(err));
        }
    });

    Listing {
        rows: rx,
        cancel: cancel.clone(),
        stop: stop.drop_guard(),
        interrupted,
    }
}

/// Start `zfs list` and hand its rows over one at a time.
pub(crate) fn list_stream(
    command: &ZfsCommand,
    cancel: &CancelToken,
    properties: &[&str],
    extra: &[&str],
) -> RowStream {
    spawn_listing(command, cancel, properties, extra).into_stream()
}

struct Worker {
    tx: Sender<ListRow>,
    cancel: CancelToken,
    /// Fired when the consumer drops its end.
    stop: CancelToken,
    interrupted: Arc<AtomicBool>,
}

impl Worker {
    fn run(&self, command: &ZfsCommand, args: &[String], fields: usize) {
        let mut process = match command.spawn(args, Input::Null, Output::Piped) {
            Ok(process) => process,
            Err(err) => {
                self.deliver(Err(err));
                return;
            }
        };
        let Some(stdout) = process.take_stdout() else {
            self.deliver(Err(ZpullError::Io(std::io::Error::other(
                "zfs list stdout was not captured",
            ))));
            return;
        };

        let process: SharedProcess = Arc::new(Mutex::new(process));
        let (finished_tx, finished_rx) = bounded::<()>(0);
        let watcher = spawn_watcher(
            Arc::clone(&process),
            self.cancel.clone(),
            self.stop.clone(),
            finished_rx,
        );

        match self.scan(stdout, fields, command.max_line()) {
            ScanEnd::Eof => match self.wait(&process) {
                Ok(()) | Err(ZpullError::Cancelled) => {}
                Err(err) => {
                    self.deliver(Err(err));
                }
            },
            ScanEnd::Stopped => {
                debug!("zfs list stopped before end of output");
                lock(&process).terminate();
            }
            ScanEnd::Failed(err) => {
                lock(&process).terminate();
                self.deliver(Err(err));
            }
        }

        drop(finished_tx);
        let _ = watcher.join();
    }

    fn scan(&self, stdout: ChildStdout, fields: usize, max_line: usize) -> ScanEnd {
        let mut reader = BufReader::new(stdout);
        let mut buf = Vec::new();
        loop {
            let line = match next_line(&mut reader, &mut buf, max_line) {
                Ok(Some(line)) => line,
                Ok(None) => return ScanEnd::Eof,
                Err(err) => return ScanEnd::Failed(err),
            };
            let row = match split_row(&line, fields) {
                Ok(row) => row,
                Err(err) => return ScanEnd::Failed(err),
            };
            if !self.deliver(Ok(row)) {
                return ScanEnd::Stopped;
            }
        }
    }

    /// Wait for exit after end of output; the child is killed if cancellation fires first.
    fn wait(&self, process: &SharedProcess) -> ZpullResult<()> {
        loop {
            {
                let mut process = lock(process);
                if let Some(status) = process.poll()? {
                    return process.conclude(status);
                }
                if self.halted() {
                    process.terminate();
                    self.interrupt();
                    return Err(ZpullError::Cancelled);
                }
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    /// Hand one item to the consumer. False once halted or the consumer is gone.
    fn deliver(&self, row: ListRow) -> bool {
        if self.halted() {
            self.interrupt();
            return false;
        }
        let deadline = self.cancel.deadline_channel();
        let sent = select! {
            send(self.tx, row) -> sent => sent.is_ok(),
            recv(self.cancel.done()) -> _ => false,
            recv(self.stop.done()) -> _ => false,
            recv(deadline) -> _ => false,
        };
        if !sent {
            self.interrupt();
        }
        sent
    }

    fn halted(&self) -> bool {
        self.cancel.is_cancelled() || self.stop.is_cancelled()
    }

    fn interrupt(&self) {
        self.interrupted.store(true, Ordering::SeqCst);
    }
}

/// Kill the child as soon as cancellation or a consumer drop fires, even while
/// the worker is blocked reading.
fn spawn_watcher(
    process: SharedProcess,
    cancel: CancelToken,
    stop: CancelToken,
    finished: Receiver<()>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let deadline = cancel.deadline_channel();
        select! {
            recv(finished) -> _ => return,
            recv(cancel.done()) -> _ => warn!("zfs list cancelled; killing subprocess"),
            recv(deadline) -> _ => warn!("zfs list deadline passed; killing subprocess"),
            recv(stop.done()) -> _ => debug!("zfs list consumer went away; killing subprocess"),
        }
        lock(&process).kill();
    })
}

fn lock(process: &SharedProcess) -> std::sync::MutexGuard<'_, ZfsProcess> {
    process.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finished_listing_outlives_its_deadline() {
        let command = ZfsCommand::new("true");
        let cancel = CancelToken::with_timeout(Duration::from_millis(300));
        let listing = spawn_listing(&command, &cancel, &["name"], &[]);

        cancel.wait();
        thread::sleep(Duration::from_millis(200));
        assert!(cancel.is_cancelled());
        assert_eq!(listing.drain().unwrap(), Vec::<Vec<String>>::new());
    }

    #[test]
    fn invalid_arguments_are_delivered() {
        let command = ZfsCommand::new("true");
        let listing = spawn_listing(&command, &CancelToken::new(), &[], &[]);
        assert!(matches!(listing.drain(), Err(ZpullError::InvalidConfig(_))));
    }
}
