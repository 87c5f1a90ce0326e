//! FrameReel Directory Watcher
//!
//! Watches one animation directory on a background thread and hands
//! normalized [`WatchEvent`]s to the control thread through a bounded inbox.
//!
//! - Events for one path arrive in the order the backend reported them.
//! - A full inbox or a backend rescan request is reported once as
//!   [`WatchEvent::Overflow`]; the consumer re-lists the directory.
//! - A backend error or removal of the directory is reported once as
//!   [`WatchEvent::Failure`]; the watch is dead afterwards.
//! - [`DirectoryWatcher::cancel`] wakes the thread, joins it, and discards
//!   anything still queued, so nothing from an old watch leaks out.

pub mod event;

pub use event::{normalize, WatchEvent};

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{select, Receiver, Sender, TrySendError};
use framereel_common::error::{ReelError, ReelResult};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};

/// Conditions raised by the watch thread out of band from the inbox, so
/// they are never lost to a full queue.
#[derive(Debug, Default)]
struct WatchStatus {
    overflowed: AtomicBool,
    failure: Mutex<Option<String>>,
    failed: AtomicBool,
    finished: AtomicBool,
}

impl WatchStatus {
    fn raise_overflow(&self, signal: &Sender<()>) {
        self.overflowed.store(true, Ordering::SeqCst);
        let _ = signal.try_send(());
    }

    /// Record a failure. Only the first one per watch is kept.
    fn raise_failure(&self, message: String, signal: &Sender<()>) -> bool {
        if self.failed.swap(true, Ordering::SeqCst) {
            return false;
        }
        *self.failure.lock().unwrap_or_else(PoisonError::into_inner) = Some(message);
        let _ = signal.try_send(());
        true
    }

    fn take_pending(&self) -> Option<WatchEvent> {
        if self.overflowed.swap(false, Ordering::SeqCst) {
            return Some(WatchEvent::Overflow);
        }
        self.failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .map(WatchEvent::Failure)
    }
}

/// A cancellable watch over a single directory.
pub struct DirectoryWatcher {
    directory: PathBuf,
    backend: Option<RecommendedWatcher>,
    cancel_tx: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
    inbox: Receiver<WatchEvent>,
    signal: Receiver<()>,
    status: Arc<WatchStatus>,
    cancelled: bool,
}

impl std::fmt::Debug for DirectoryWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryWatcher")
            .field("directory", &self.directory)
            .field("alive", &self.is_alive())
            .field("queued", &self.inbox.len())
            .finish()
    }
}

impl DirectoryWatcher {
    /// Start watching `directory` with an inbox of `capacity` events.
    pub fn watch(directory: impl AsRef<Path>, capacity: usize) -> ReelResult<Self> {
        let requested = directory.as_ref();
        let directory =
            std::fs::canonicalize(requested).map_err(|e| ReelError::DirectoryUnreadable {
                path: requested.to_path_buf(),
                source: e,
            })?;

        let (raw_tx, raw_rx) = crossbeam_channel::unbounded::<notify::Result<notify::Event>>();
        let mut backend = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            let _ = raw_tx.send(res);
        })
        .map_err(|e| ReelError::watch_failure(&directory, e.to_string()))?;
        backend
            .watch(&directory, RecursiveMode::NonRecursive)
            .map_err(|e| ReelError::watch_failure(&directory, e.to_string()))?;

        let (inbox_tx, inbox) = crossbeam_channel::bounded(capacity.max(1));
        let (signal_tx, signal) = crossbeam_channel::bounded(1);
        let (cancel_tx, cancel_rx) = crossbeam_channel::bounded::<()>(0);
        let status = Arc::new(WatchStatus::default());

        let worker = {
            let directory = directory.clone();
            let status = status.clone();
            std::thread::Builder::new()
                .name("framereel-watch".to_string())
                .spawn(move || {
                    run_watch_loop(&directory, raw_rx, cancel_rx, inbox_tx, signal_tx, &status);
                    status.finished.store(true, Ordering::SeqCst);
                })?
        };

        tracing::info!(directory = %directory.display(), capacity, "Directory watch started");

        Ok(Self {
            directory,
            backend: Some(backend),
            cancel_tx: Some(cancel_tx),
            worker: Some(worker),
            inbox,
            signal,
            status,
            cancelled: false,
        })
    }

    /// Canonical path of the watched directory.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Whether the watch is still delivering events.
    pub fn is_alive(&self) -> bool {
        !self.cancelled
            && !self.status.failed.load(Ordering::SeqCst)
            && !self.status.finished.load(Ordering::SeqCst)
    }

    /// Next event without blocking.
    ///
    /// Queued changes come first; a pending overflow or failure is reported
    /// once the queue is empty.
    pub fn try_recv(&self) -> Option<WatchEvent> {
        if self.cancelled {
            return None;
        }
        self.inbox.try_recv().ok().or_else(|| self.status.take_pending())
    }

    /// Everything available right now.
    pub fn drain(&self) -> Vec<WatchEvent> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }

    /// Wait up to `timeout` for the next event.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<WatchEvent> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(event) = self.try_recv() {
                return Some(event);
            }
            if self.cancelled {
                return None;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }
            select! {
                recv(self.inbox) -> msg => {
                    if let Ok(event) = msg {
                        return Some(event);
                    }
                    return self.status.take_pending();
                }
                recv(self.signal) -> msg => {
                    if msg.is_err() {
                        return self.status.take_pending();
                    }
                }
                default(remaining) => return None,
            }
        }
    }

    /// Stop watching. Idempotent; returns once the thread has exited.
    pub fn cancel(&mut self) {
        if self.cancelled {
            return;
        }
        self.cancelled = true;
        // Dropping the backend and the cancel sender both wake the thread.
        self.backend.take();
        self.cancel_tx.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!(directory = %self.directory.display(), "Watch thread panicked");
            }
        }
        let discarded = self.inbox.try_iter().count();
        tracing::info!(
            directory = %self.directory.display(),
            discarded,
            "Directory watch cancelled"
        );
    }
}

impl Drop for DirectoryWatcher {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn run_watch_loop(
    directory: &Path,
    raw_rx: Receiver<notify::Result<notify::Event>>,
    cancel_rx: Receiver<()>,
    inbox: Sender<WatchEvent>,
    signal: Sender<()>,
    status: &WatchStatus,
) {
    loop {
        let raw = select! {
            recv(cancel_rx) -> _ => break,
            recv(raw_rx) -> msg => match msg {
                Ok(raw) => raw,
                Err(_) => break,
            },
        };

        let event = match raw {
            Ok(event) => event,
            Err(e) => {
                if status.raise_failure(e.to_string(), &signal) {
                    tracing::warn!(directory = %directory.display(), error = %e, "Watch backend error");
                }
                continue;
            }
        };

        for change in normalize(&event, directory) {
            match change {
                WatchEvent::Overflow => {
                    tracing::warn!(directory = %directory.display(), "Backend requested rescan");
                    status.raise_overflow(&signal);
                }
                WatchEvent::Failure(message) => {
                    if status.raise_failure(message.clone(), &signal) {
                        tracing::warn!(directory = %directory.display(), %message, "Watch failed");
                    }
                }
                change => match inbox.try_send(change) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        if !status.overflowed.load(Ordering::SeqCst) {
                            tracing::warn!(directory = %directory.display(), "Watch inbox full, dropping events");
                        }
                        status.raise_overflow(&signal);
                    }
                    Err(TrySendError::Disconnected(_)) => return,
                },
            }
        }
    }
    tracing::debug!(directory = %directory.display(), "Watch thread exiting");
}
