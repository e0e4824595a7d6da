//! Backend contract used by replication endpoints.
//!
//! The concrete implementation lives in `zpull-zfs` and shells out to the host
//! `zfs` binary. Endpoints depend only on this trait so they stay testable
//! with in-memory backends.

use crate::cancel::{CancelGuard, CancelToken};
use crate::error::ZpullResult;
use crate::path::DatasetPath;
use crate::version::{FilesystemVersion, VersionFilter};
use crossbeam_channel::Receiver;
use std::io::Write;

/// One `zfs list` row (or the terminal error for the listing).
pub type ListRow = ZpullResult<Vec<String>>;

/// Rows handed over one at a time by a background listing worker.
///
/// The sequence ends after the first error or at end of output and cannot be
/// restarted. Once the caller's token is cancelled no further rows are
/// returned. Dropping the stream fires its stop guard, which the worker
/// treats like cancellation: it kills and reaps its subprocess. Holding the
/// stream without draining it (and without cancelling) keeps the subprocess
/// alive.
#[derive(Debug)]
pub struct RowStream {
    rows: Receiver<ListRow>,
    cancel: Option<CancelToken>,
    _stop: Option<CancelGuard>,
}

impl RowStream {
    /// Plain stream over `rows`; ends when the sender side disconnects.
    pub fn new(rows: Receiver<ListRow>) -> Self {
        Self {
            rows,
            cancel: None,
            _stop: None,
        }
    }

    /// Stream that stops yielding once `cancel` fires and fires `stop` when dropped.
    pub fn with_cancel(rows: Receiver<ListRow>, cancel: CancelToken, stop: CancelGuard) -> Self {
        Self {
            rows,
            cancel: Some(cancel),
            _stop: Some(stop),
        }
    }
}

impl Iterator for RowStream {
    type Item = ListRow;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
            return None;
        }
        self.rows.recv().ok()
    }
}

/// Writable side of a running receive.
///
/// `finish` closes the input and waits for the receiving process; callers
/// that stop early should drop the stream instead, which aborts the receive.
pub trait ReceiveStream: Write + Send {
    fn finish(self: Box<Self>) -> ZpullResult<()>;
}

pub type ReceiveSink = Box<dyn ReceiveStream>;

/// Dataset operations the pull endpoint needs from the local system.
pub trait ZfsBackend: Send + Sync {
    /// Stream `zfs list` rows for `properties` (in order) with extra listing arguments.
    fn list_stream(&self, cancel: &CancelToken, properties: &[&str], args: &[&str]) -> RowStream;

    /// Snapshots and bookmarks of `fs` accepted by `filter`, oldest first.
    fn list_filesystem_versions(
        &self,
        fs: &DatasetPath,
        filter: &dyn VersionFilter,
    ) -> ZpullResult<Vec<FilesystemVersion>>;

    /// Current resume token of `fs`; empty when there is none.
    fn receive_resume_token(&self, fs: &DatasetPath) -> ZpullResult<String>;

    /// Start receiving into `fs` and hand back the writable input.
    fn receive_writer(&self, fs: &DatasetPath, args: &[String]) -> ZpullResult<ReceiveSink>;
}
