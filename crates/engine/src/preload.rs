//! Background raster warming.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::Sender;
use framereel_common::error::ReelResult;
use framereel_frame_model::{FrameSnapshot, ImageDecoder};

use crate::event::EngineEvent;

/// Handle to a running preload. Dropping it stops the thread and waits.
#[derive(Debug)]
pub struct Preloader {
    stop_flag: Arc<AtomicBool>,
    worker: Option<JoinHandle<PreloadReport>>,
}

/// Outcome of a preload pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreloadReport {
    pub loaded: usize,
    pub failed: usize,
    pub stopped_early: bool,
}

impl Preloader {
    /// Decode every frame and its thumbnail on a background thread.
    ///
    /// Per-frame failures are reported as [`EngineEvent::LoadError`] and do
    /// not stop the pass.
    pub fn spawn(
        frames: FrameSnapshot,
        decoder: Arc<dyn ImageDecoder>,
        thumbnail_size: u32,
        events: Sender<EngineEvent>,
    ) -> ReelResult<Self> {
        let stop_flag = Arc::new(AtomicBool::new(false));
        let worker = {
            let stop_flag = stop_flag.clone();
            std::thread::Builder::new()
                .name("framereel-preload".to_string())
                .spawn(move || run(&frames, decoder.as_ref(), thumbnail_size, &events, &stop_flag))?
        };
        Ok(Self {
            stop_flag,
            worker: Some(worker),
        })
    }

    /// Ask the thread to stop after the frame it is decoding.
    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::SeqCst);
    }

    /// Wait for the pass to end.
    pub fn join(mut self) -> PreloadReport {
        self.join_inner()
    }

    fn join_inner(&mut self) -> PreloadReport {
        match self.worker.take().map(JoinHandle::join) {
            Some(Ok(report)) => report,
            Some(Err(_)) => {
                tracing::error!("Preload thread panicked");
                PreloadReport::default()
            }
            None => PreloadReport::default(),
        }
    }
}

impl Drop for Preloader {
    fn drop(&mut self) {
        self.stop();
        self.join_inner();
    }
}

fn run(
    frames: &FrameSnapshot,
    decoder: &dyn ImageDecoder,
    thumbnail_size: u32,
    events: &Sender<EngineEvent>,
    stop_flag: &AtomicBool,
) -> PreloadReport {
    tracing::info!(frames = frames.len(), "Preload started");
    let mut report = PreloadReport::default();

    for frame in frames.iter() {
        if stop_flag.load(Ordering::Relaxed) {
            report.stopped_early = true;
            break;
        }
        match frame.thumbnail(decoder, thumbnail_size, None) {
            Ok(_) => report.loaded += 1,
            Err(e) => {
                report.failed += 1;
                tracing::warn!(path = %frame.path().display(), error = %e, "Preload failed");
                notify(
                    events,
                    EngineEvent::LoadError {
                        path: frame.path().to_path_buf(),
                        cause: e.to_string(),
                    },
                );
            }
        }
    }

    if !report.stopped_early {
        notify(
            events,
            EngineEvent::PreloadFinished {
                loaded: report.loaded,
                failed: report.failed,
            },
        );
    }
    tracing::info!(
        loaded = report.loaded,
        failed = report.failed,
        stopped_early = report.stopped_early,
        "Preload finished"
    );
    report
}

/// Never blocks the preload thread on a full notification queue.
fn notify(events: &Sender<EngineEvent>, event: EngineEvent) {
    if let Err(e) = events.try_send(event) {
        tracing::debug!(event = ?e.into_inner(), "Dropped preload notification");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use framereel_frame_model::{FrameStore, ImageCrateDecoder};

    #[test]
    fn test_preload_reports_failures_without_aborting() {
        let dir = tempfile::tempdir().unwrap();
        image::RgbaImage::new(4, 4).save(dir.path().join("a.png")).unwrap();
        std::fs::write(dir.path().join("b.png"), b"garbage").unwrap();
        image::RgbaImage::new(4, 4).save(dir.path().join("c.png")).unwrap();
        let store = FrameStore::load(dir.path()).unwrap();

        let (tx, rx) = crossbeam_channel::unbounded();
        let preloader =
            Preloader::spawn(store.get_all(), Arc::new(ImageCrateDecoder), 100, tx).unwrap();
        let report = preloader.join();

        assert_eq!(report.loaded, 2);
        assert_eq!(report.failed, 1);
        assert!(store.get(0).unwrap().cached_raster().is_some());

        let events: Vec<EngineEvent> = rx.try_iter().collect();
        assert!(events.iter().any(|e| matches!(
            e,
            EngineEvent::LoadError { path, .. } if path.ends_with("b.png")
        )));
        assert!(events.contains(&EngineEvent::PreloadFinished {
            loaded: 2,
            failed: 1
        }));
    }
}
