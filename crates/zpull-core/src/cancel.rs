//! Cancellation signal shared between callers and subprocess workers.
//!
//! The signal is a zero-capacity channel whose only sender is dropped on
//! `cancel()`, so workers can wait on it inside `crossbeam_channel::select!`
//! next to their own sends. A deadline is layered on top as a timer channel.

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    trigger: Mutex<Option<Sender<()>>>,
    done: Receiver<()>,
    deadline: Option<Instant>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Token that reports cancellation once `timeout` has elapsed.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::build(Some(Instant::now() + timeout))
    }

    fn build(deadline: Option<Instant>) -> Self {
        let (trigger, done) = bounded(0);
        Self {
            inner: Arc::new(Inner {
                trigger: Mutex::new(Some(trigger)),
                done,
                deadline,
            }),
        }
    }

    /// Idempotent.
    pub fn cancel(&self) {
        self.inner
            .trigger
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    pub fn is_cancelled(&self) -> bool {
        if self.deadline_passed() {
            return true;
        }
        matches!(self.inner.done.try_recv(), Err(TryRecvError::Disconnected))
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    fn deadline_passed(&self) -> bool {
        self.inner
            .deadline
            .map(|deadline| Instant::now() >= deadline)
            .unwrap_or(false)
    }

    /// Becomes ready (disconnected) once `cancel()` is called.
    pub fn done(&self) -> &Receiver<()> {
        &self.inner.done
    }

    /// Fires at the deadline; never fires when there is none.
    pub fn deadline_channel(&self) -> Receiver<Instant> {
        match self.inner.deadline {
            Some(deadline) => crossbeam_channel::at(deadline),
            None => crossbeam_channel::never(),
        }
    }

    /// Cancel this token when the returned guard goes out of scope.
    pub fn drop_guard(&self) -> CancelGuard {
        CancelGuard {
            token: self.clone(),
        }
    }

    /// Block until cancelled or the deadline passes.
    pub fn wait(&self) {
        let deadline = self.deadline_channel();
        crossbeam_channel::select! {
            recv(self.inner.done) -> _ => {},
            recv(deadline) -> _ => {},
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct CancelGuard {
    token: CancelToken,
}

impl Drop for CancelGuard {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
