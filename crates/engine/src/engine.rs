//! The engine façade driven by the control thread.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, TrySendError};
use framereel_common::clock::PlaybackClock;
use framereel_common::config::AppConfig;
use framereel_common::error::{ReelError, ReelResult};
use framereel_dir_watcher::{DirectoryWatcher, WatchEvent};
use framereel_frame_model::{
    sidecar_path, DelayPolicy, FrameSnapshot, FrameStore, ImageCrateDecoder, ImageDecoder,
    ProjectSidecar, Raster, Upsert,
};
use framereel_gif_export::{export_gif, ExportJob, ExportSummary, GifExportSettings, ProgressCallback};
use framereel_playback::{Direction, PlaybackState, Scheduler};

use crate::event::EngineEvent;
use crate::preload::Preloader;

/// Notifications kept for listeners before new ones are dropped.
pub const NOTIFICATION_CAPACITY: usize = 1024;

/// State that exists only while a directory is open.
struct OpenDirectory {
    store: FrameStore,
    watcher: Option<DirectoryWatcher>,
    preloader: Option<Preloader>,
}

/// Frame sequence engine.
///
/// Owns the frame store of the open directory and everything derived from
/// it. Not shared across threads: the watch thread and preloader talk to it
/// through channels, and notifications go out through [`Engine::notifications`].
pub struct Engine {
    config: AppConfig,
    decoder: Arc<dyn ImageDecoder>,
    policy: DelayPolicy,
    scheduler: Scheduler,
    clock: PlaybackClock,
    open: Option<OpenDirectory>,
    events_tx: Sender<EngineEvent>,
    events_rx: Receiver<EngineEvent>,
    dropping_events: AtomicBool,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("directory", &self.directory())
            .field("frames", &self.frame_count())
            .field("state", &self.scheduler.state())
            .field("current", &self.scheduler.current())
            .finish()
    }
}

impl Engine {
    /// Engine decoding with the `image` crate.
    pub fn new(config: AppConfig) -> ReelResult<Self> {
        Self::with_decoder(config, Arc::new(ImageCrateDecoder))
    }

    pub fn with_decoder(config: AppConfig, decoder: Arc<dyn ImageDecoder>) -> ReelResult<Self> {
        let policy = DelayPolicy::new(i64::from(config.playback.default_delay_ms))?;
        let (events_tx, events_rx) = crossbeam_channel::bounded(NOTIFICATION_CAPACITY);
        Ok(Self {
            config,
            decoder,
            policy,
            scheduler: Scheduler::new(),
            clock: PlaybackClock::new(),
            open: None,
            events_tx,
            events_rx,
            dropping_events: AtomicBool::new(false),
        })
    }

    /// Receiver for engine notifications. Every clone sees each event once
    /// between them. At most [`NOTIFICATION_CAPACITY`] events are held;
    /// while the queue is full new events are dropped.
    pub fn notifications(&self) -> Receiver<EngineEvent> {
        self.events_rx.clone()
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn policy(&self) -> &DelayPolicy {
        &self.policy
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn state(&self) -> PlaybackState {
        self.scheduler.state()
    }

    pub fn directory(&self) -> Option<&Path> {
        self.open.as_ref().map(|o| o.store.directory())
    }

    pub fn store(&self) -> Option<&FrameStore> {
        self.open.as_ref().map(|o| &o.store)
    }

    pub fn frame_count(&self) -> usize {
        self.open.as_ref().map(|o| o.store.len()).unwrap_or(0)
    }

    /// Current frames; empty when no directory is open.
    pub fn frames(&self) -> FrameSnapshot {
        match &self.open {
            Some(open) => open.store.get_all(),
            None => Arc::from(Vec::new()),
        }
    }

    /// Whether the directory watch is still delivering events.
    pub fn is_watching(&self) -> bool {
        self.open
            .as_ref()
            .and_then(|o| o.watcher.as_ref())
            .map(DirectoryWatcher::is_alive)
            .unwrap_or(false)
    }

    /// Index and path of the active frame.
    pub fn current_frame(&self) -> Option<(usize, PathBuf)> {
        let index = self.scheduler.current()?;
        let frame = self.open.as_ref()?.store.get(index)?;
        Some((index, frame.path().to_path_buf()))
    }

    // ── Directory lifecycle ───────────────────────────────────────

    /// Open `directory`, replacing whatever was open. Returns the frame count.
    ///
    /// The previous watch is cancelled before the new one is registered. A
    /// watch that cannot be started is reported as [`EngineEvent::WatchFailure`]
    /// and the directory stays open without live updates.
    pub fn open_directory(&mut self, directory: impl AsRef<Path>) -> ReelResult<usize> {
        self.close_directory()?;

        let mut store = FrameStore::load(directory.as_ref())?;
        self.apply_sidecar(&mut store);

        let watcher =
            match DirectoryWatcher::watch(store.directory(), self.config.watcher.inbox_capacity) {
                Ok(watcher) => Some(watcher),
                Err(e) => {
                    tracing::warn!(directory = %store.directory().display(), error = %e, "Cannot watch directory");
                    self.emit(EngineEvent::WatchFailure {
                        directory: store.directory().to_path_buf(),
                        cause: e.to_string(),
                    });
                    None
                }
            };

        let count = store.len();
        tracing::info!(directory = %store.directory().display(), frames = count, "Directory opened");
        self.open = Some(OpenDirectory {
            store,
            watcher,
            preloader: None,
        });
        self.resync();
        Ok(count)
    }

    /// Close the open directory, saving the sidecar first when autosave is
    /// enabled. Closing with nothing open is a no-op.
    pub fn close_directory(&mut self) -> ReelResult<()> {
        let Some(mut open) = self.open.take() else {
            return Ok(());
        };

        if let Some(mut watcher) = open.watcher.take() {
            watcher.cancel();
        }
        if let Some(preloader) = open.preloader.take() {
            preloader.stop();
        }

        let saved = if self.config.project.autosave {
            self.write_sidecar(&open.store).map(|_| ())
        } else {
            Ok(())
        };

        tracing::info!(directory = %open.store.directory().display(), "Directory closed");
        drop(open);
        self.resync();
        saved
    }

    fn apply_sidecar(&mut self, store: &mut FrameStore) {
        let path = sidecar_path(store.directory(), &self.config.project.sidecar_file_name);
        match ProjectSidecar::load(&path) {
            Ok(Some(sidecar)) => {
                let matched = sidecar.apply(store, &mut self.policy);
                tracing::info!(path = %path.display(), matched, "Applied sidecar");
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring unreadable sidecar");
            }
        }
    }

    fn write_sidecar(&self, store: &FrameStore) -> ReelResult<PathBuf> {
        let path = sidecar_path(store.directory(), &self.config.project.sidecar_file_name);
        ProjectSidecar::from_store(store, &self.policy).save(&path)?;
        Ok(path)
    }

    /// Write the sidecar for the open directory. Returns its path.
    pub fn save_sidecar(&self) -> ReelResult<PathBuf> {
        let open = self.open.as_ref().ok_or(ReelError::NoDirectory)?;
        self.write_sidecar(&open.store)
    }

    // ── Live updates ──────────────────────────────────────────────

    /// Apply everything the watcher has queued. Returns the number of
    /// watch events handled.
    ///
    /// The whole batch is always applied and its notifications emitted. If
    /// a rescan after an overflow fails, the watch is treated as failed and
    /// the rescan error is returned afterwards.
    pub fn pump_watch_events(&mut self) -> ReelResult<usize> {
        let Some(open) = self.open.as_mut() else {
            return Ok(0);
        };
        let Some(watcher) = open.watcher.as_ref() else {
            return Ok(0);
        };
        let events = watcher.drain();
        if events.is_empty() {
            return Ok(0);
        }

        let directory = open.store.directory().to_path_buf();
        let current = self.scheduler.current();
        let mut shape_changed = false;
        let mut current_touched = false;
        let mut failure: Option<ReelError> = None;
        let mut rescan_error: Option<ReelError> = None;
        let mut notices = Vec::new();

        for event in &events {
            if let Some(condition) = event.condition(&directory) {
                if !condition.is_recoverable() {
                    failure.get_or_insert(condition);
                    continue;
                }
                tracing::warn!(error = %condition, "Rescanning");
                notices.push(EngineEvent::WatchOverflow {
                    directory: directory.clone(),
                });
                match open.store.rescan() {
                    Ok(changed) => {
                        shape_changed |= changed;
                        current_touched = true;
                    }
                    Err(e) => {
                        failure.get_or_insert_with(|| {
                            ReelError::watch_failure(&directory, format!("rescan failed: {e}"))
                        });
                        rescan_error.get_or_insert(e);
                        shape_changed = true;
                    }
                }
                continue;
            }

            match event {
                WatchEvent::Created(path) | WatchEvent::Modified(path) => {
                    match open.store.upsert(path) {
                        Upsert::Inserted(_) | Upsert::Removed(_) => shape_changed = true,
                        Upsert::Invalidated(index) => {
                            current_touched |= Some(index) == current;
                        }
                        Upsert::Ignored => {}
                    }
                }
                WatchEvent::Deleted(path) => {
                    shape_changed |= open.store.remove(path).is_some();
                }
                WatchEvent::Overflow | WatchEvent::Failure(_) => {}
            }
        }

        if let Some(failure) = failure {
            tracing::warn!(error = %failure, "Watch failed");
            if let Some(mut watcher) = open.watcher.take() {
                watcher.cancel();
            }
            let cause = match failure {
                ReelError::WatchFailure { message, .. } => message,
                other => other.to_string(),
            };
            notices.push(EngineEvent::WatchFailure {
                directory: directory.clone(),
                cause,
            });
        }
        for notice in notices {
            self.emit(notice);
        }

        if shape_changed {
            self.resync();
        } else if current_touched {
            self.emit_active_frame();
        }

        match rescan_error {
            Some(e) => Err(e),
            None => Ok(events.len()),
        }
    }

    // ── Playback ──────────────────────────────────────────────────

    /// Advance playback to the clock's current position. Returns the new
    /// frame index when it changed.
    pub fn tick(&mut self) -> Option<usize> {
        let changed = self.scheduler.advance_to(self.clock.elapsed_ms())?;
        self.emit_active_frame();
        Some(changed)
    }

    pub fn play(&mut self) -> bool {
        if !self.scheduler.play() {
            return false;
        }
        self.clock.seek(self.scheduler.position_ms());
        self.clock.start();
        self.emit_state();
        true
    }

    pub fn pause(&mut self) -> bool {
        if !self.scheduler.pause() {
            return false;
        }
        self.clock.pause();
        self.emit_state();
        true
    }

    pub fn toggle(&mut self) -> PlaybackState {
        match self.scheduler.state() {
            PlaybackState::Playing => self.pause(),
            PlaybackState::Stopped => self.play(),
        };
        self.scheduler.state()
    }

    /// Previous/next frame while stopped.
    pub fn step(&mut self, direction: Direction) -> Option<usize> {
        let index = self.scheduler.step(direction)?;
        self.clock.seek(self.scheduler.position_ms());
        self.emit_active_frame();
        Some(index)
    }

    /// Jump to frame `index` (clamped).
    pub fn seek(&mut self, index: usize) -> Option<usize> {
        let index = self.scheduler.seek(index)?;
        self.clock.seek(self.scheduler.position_ms());
        self.emit_active_frame();
        Some(index)
    }

    // ── Delays ────────────────────────────────────────────────────

    pub fn set_default_delay(&mut self, ms: i64) -> ReelResult<()> {
        self.policy.set_default_delay(ms)?;
        tracing::info!(default_delay_ms = ms, "Default delay changed");
        self.rebuild();
        Ok(())
    }

    /// Set the delay of the frame at `path`; `ms <= 0` restores the default.
    /// Returns whether the frame exists.
    pub fn set_frame_delay(&mut self, path: &Path, ms: i64) -> ReelResult<bool> {
        let open = self.open.as_mut().ok_or(ReelError::NoDirectory)?;
        if !open.store.set_delay(path, ms) {
            return Ok(false);
        }
        tracing::info!(path = %path.display(), delay_ms = ms, "Frame delay changed");
        self.rebuild();
        Ok(true)
    }

    /// Restore defaults: clear every per-frame override and put the default
    /// delay back to the configured one. Returns how many overrides were
    /// cleared.
    pub fn reset_delays(&mut self) -> ReelResult<usize> {
        let open = self.open.as_mut().ok_or(ReelError::NoDirectory)?;
        let cleared = open.store.reset_delays();
        self.policy = DelayPolicy::new(i64::from(self.config.playback.default_delay_ms))?;
        tracing::info!(
            cleared,
            default_delay_ms = self.policy.default_delay_ms(),
            "Delays restored to defaults"
        );
        self.rebuild();
        Ok(cleared)
    }

    // ── Rasters ───────────────────────────────────────────────────

    /// Start warming every frame's raster and thumbnail in the background.
    /// A preload already running is stopped first.
    pub fn preload(&mut self) -> ReelResult<()> {
        let open = self.open.as_mut().ok_or(ReelError::NoDirectory)?;
        if let Some(previous) = open.preloader.take() {
            previous.stop();
        }
        open.preloader = Some(Preloader::spawn(
            open.store.get_all(),
            self.decoder.clone(),
            self.config.playback.thumbnail_size,
            self.events_tx.clone(),
        )?);
        Ok(())
    }

    /// Block until the running preload (if any) finishes.
    pub fn wait_for_preload(&mut self) {
        if let Some(preloader) = self.open.as_mut().and_then(|o| o.preloader.take()) {
            preloader.join();
        }
    }

    /// Decoded image of frame `index`.
    pub fn raster(&self, index: usize) -> ReelResult<Raster> {
        let open = self.open.as_ref().ok_or(ReelError::NoDirectory)?;
        let frame = open
            .store
            .get(index)
            .ok_or_else(|| ReelError::project(format!("no frame at index {index}")))?;
        let result = frame.raster(self.decoder.as_ref(), Some(self.load_timeout()));
        self.report_load_error(frame.path(), &result);
        result
    }

    /// Thumbnail of frame `index`.
    pub fn thumbnail(&self, index: usize) -> ReelResult<Raster> {
        let open = self.open.as_ref().ok_or(ReelError::NoDirectory)?;
        let frame = open
            .store
            .get(index)
            .ok_or_else(|| ReelError::project(format!("no frame at index {index}")))?;
        let result = frame.thumbnail(
            self.decoder.as_ref(),
            self.config.playback.thumbnail_size,
            Some(self.load_timeout()),
        );
        self.report_load_error(frame.path(), &result);
        result
    }

    fn report_load_error(&self, path: &Path, result: &ReelResult<Raster>) {
        if let Err(e) = result {
            tracing::warn!(path = %path.display(), error = %e, "Frame load failed");
            self.emit(EngineEvent::LoadError {
                path: path.to_path_buf(),
                cause: e.to_string(),
            });
        }
    }

    // ── Export ────────────────────────────────────────────────────

    /// Export settings from the `export` config section.
    pub fn export_settings(&self) -> ReelResult<GifExportSettings> {
        GifExportSettings::from_config(&self.config.export)
    }

    /// Export the current frame set. Blocks until the file is written.
    pub fn export_gif(
        &self,
        output: impl Into<PathBuf>,
        settings: GifExportSettings,
        progress: Option<ProgressCallback>,
    ) -> ReelResult<ExportSummary> {
        let open = self.open.as_ref().ok_or(ReelError::NoDirectory)?;
        let job = ExportJob {
            output_path: output.into(),
            settings,
            load_timeout: self.load_timeout(),
        };
        export_gif(&open.store.get_all(), self.decoder.as_ref(), &job, progress)
    }

    fn load_timeout(&self) -> Duration {
        Duration::from_secs(self.config.export.load_timeout_secs)
    }

    // ── Internals ─────────────────────────────────────────────────

    /// Rebuild after a delay change, keeping the active frame.
    fn rebuild(&mut self) {
        let before = self.scheduler.current();
        let frames = self.frames();
        let after = self.scheduler.rebuild_timeline(&frames, &self.policy);
        self.clock.seek(self.scheduler.position_ms());
        if after != before {
            self.emit_active_frame();
        }
    }

    /// Full resynchronization after the frame set changed shape. Playback
    /// restarts at frame 0.
    fn resync(&mut self) {
        let frames = self.frames();
        self.scheduler.reset_timeline(&frames, &self.policy);
        self.clock.seek(self.scheduler.position_ms());
        self.emit(EngineEvent::FrameSetChanged {
            count: frames.len(),
        });
        self.emit_active_frame();
    }

    fn emit_active_frame(&self) {
        if let Some((index, path)) = self.current_frame() {
            self.emit(EngineEvent::ActiveFrameChanged { index, path });
        }
    }

    fn emit_state(&self) {
        self.emit(EngineEvent::PlaybackStateChanged {
            state: self.scheduler.state(),
        });
    }

    fn emit(&self, event: EngineEvent) {
        tracing::trace!(?event, "Engine event");
        match self.events_tx.try_send(event) {
            Ok(()) => {
                if self.dropping_events.swap(false, Ordering::Relaxed) {
                    tracing::info!("Notification queue drained, delivering events again");
                }
            }
            Err(TrySendError::Full(event)) => {
                if !self.dropping_events.swap(true, Ordering::Relaxed) {
                    tracing::warn!(
                        ?event,
                        capacity = NOTIFICATION_CAPACITY,
                        "Notification queue full, dropping events until it is drained"
                    );
                }
            }
            // The engine holds a receiver itself.
            Err(TrySendError::Disconnected(_)) => {}
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if let Err(e) = self.close_directory() {
            tracing::warn!(error = %e, "Failed to save sidecar on shutdown");
        }
    }
}
