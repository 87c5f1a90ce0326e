//! End-to-end engine behavior on scratch directories.

use std::path::Path;
use std::time::{Duration, Instant};

use framereel_common::config::AppConfig;
use framereel_common::error::ReelError;
use framereel_engine::{Engine, EngineEvent, NOTIFICATION_CAPACITY};
use framereel_gif_export::GifExportSettings;
use framereel_playback::{Direction, PlaybackState};

fn write_png(dir: &Path, name: &str, rgba: [u8; 4]) {
    image::RgbaImage::from_pixel(4, 4, image::Rgba(rgba))
        .save(dir.join(name))
        .unwrap();
}

fn three_frames() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    write_png(dir.path(), "a.png", [255, 0, 0, 255]);
    write_png(dir.path(), "b.png", [0, 255, 0, 255]);
    write_png(dir.path(), "c.png", [0, 0, 255, 255]);
    dir
}

fn config(default_delay_ms: u32) -> AppConfig {
    let mut config = AppConfig::default();
    config.playback.default_delay_ms = default_delay_ms;
    config
}

fn write_burst(dir: &Path, count: usize) {
    for i in 0..count {
        write_png(dir, &format!("burst{i:03}.png"), [i as u8, 0, 0, 255]);
    }
}

fn offsets(engine: &Engine) -> Vec<u64> {
    engine
        .scheduler()
        .timeline()
        .cues()
        .iter()
        .map(|c| c.offset_ms)
        .collect()
}

/// Pump watch events until `done` holds or five seconds pass.
fn pump_until(engine: &mut Engine, mut done: impl FnMut(&Engine) -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        engine.pump_watch_events().unwrap();
        if done(engine) {
            return true;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    false
}

#[test]
fn open_builds_timeline_and_notifies() {
    let dir = three_frames();
    let mut engine = Engine::new(config(100)).unwrap();
    let events = engine.notifications();

    assert_eq!(engine.open_directory(dir.path()).unwrap(), 3);
    assert_eq!(offsets(&engine), vec![0, 100, 200]);
    assert_eq!(engine.scheduler().timeline().cycle_ms(), 300);
    assert!(engine.is_watching());

    let seen: Vec<EngineEvent> = events.try_iter().collect();
    assert!(seen.contains(&EngineEvent::FrameSetChanged { count: 3 }));
    assert!(seen
        .iter()
        .any(|e| matches!(e, EngineEvent::ActiveFrameChanged { index: 0, .. })));
}

#[test]
fn frame_delay_change_rebuilds_cues() {
    let dir = three_frames();
    let mut engine = Engine::new(config(100)).unwrap();
    engine.open_directory(dir.path()).unwrap();

    let b = engine.directory().unwrap().join("b.png");
    assert!(engine.set_frame_delay(&b, 50).unwrap());
    assert_eq!(offsets(&engine), vec![0, 100, 150]);
    assert_eq!(engine.scheduler().timeline().cycle_ms(), 250);

    let missing = engine.directory().unwrap().join("zzz.png");
    assert!(!engine.set_frame_delay(&missing, 10).unwrap());

    assert_eq!(engine.reset_delays().unwrap(), 1);
    assert_eq!(engine.scheduler().timeline().cycle_ms(), 300);

    assert!(matches!(
        engine.set_default_delay(0),
        Err(ReelError::InvalidDelay { .. })
    ));
    engine.set_default_delay(40).unwrap();
    assert_eq!(engine.scheduler().timeline().cycle_ms(), 120);
}

#[test]
fn stepping_and_seeking_while_stopped() {
    let dir = three_frames();
    let mut engine = Engine::new(config(100)).unwrap();
    engine.open_directory(dir.path()).unwrap();

    assert_eq!(engine.step(Direction::Previous), None);
    assert_eq!(engine.step(Direction::Next), Some(1));
    assert_eq!(engine.seek(99), Some(2));
    assert_eq!(engine.step(Direction::Next), None);
    assert!(engine.current_frame().unwrap().1.ends_with("c.png"));

    assert!(engine.play());
    assert_eq!(engine.state(), PlaybackState::Playing);
    assert_eq!(engine.step(Direction::Previous), None);
    assert_eq!(engine.toggle(), PlaybackState::Stopped);
}

#[test]
fn playback_advances_with_the_clock() {
    let dir = three_frames();
    let mut engine = Engine::new(config(10)).unwrap();
    engine.open_directory(dir.path()).unwrap();

    engine.play();
    let deadline = Instant::now() + Duration::from_secs(2);
    let mut changes = 0;
    while Instant::now() < deadline && changes < 3 {
        if engine.tick().is_some() {
            changes += 1;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    assert!(changes >= 3);

    engine.pause();
    let frozen = engine.scheduler().current();
    std::thread::sleep(Duration::from_millis(30));
    assert_eq!(engine.tick(), None);
    assert_eq!(engine.scheduler().current(), frozen);
}

#[test]
fn watcher_changes_reach_the_store() {
    let dir = three_frames();
    let mut engine = Engine::new(config(100)).unwrap();
    let events = engine.notifications();
    engine.open_directory(dir.path()).unwrap();
    let root = engine.directory().unwrap().to_path_buf();
    events.try_iter().for_each(drop);

    write_png(&root, "ab.png", [1, 1, 1, 255]);
    assert!(pump_until(&mut engine, |e| e.frame_count() == 4));
    assert_eq!(offsets(&engine), vec![0, 100, 200, 300]);
    assert!(events
        .try_iter()
        .any(|e| e == EngineEvent::FrameSetChanged { count: 4 }));

    std::fs::remove_file(root.join("a.png")).unwrap();
    assert!(pump_until(&mut engine, |e| e.frame_count() == 3));
    let names: Vec<String> = engine
        .frames()
        .iter()
        .filter_map(|f| f.file_name().map(str::to_string))
        .collect();
    assert_eq!(names, vec!["ab.png", "b.png", "c.png"]);
}

#[test]
fn removed_directory_reports_failure() {
    let parent = tempfile::tempdir().unwrap();
    let root = parent.path().join("frames");
    std::fs::create_dir(&root).unwrap();
    write_png(&root, "a.png", [0, 0, 0, 255]);

    let mut config = config(100);
    config.project.autosave = false;
    let mut engine = Engine::new(config).unwrap();
    let events = engine.notifications();
    engine.open_directory(&root).unwrap();

    std::fs::remove_dir_all(&root).unwrap();
    let mut failed = false;
    assert!(pump_until(&mut engine, |_| {
        failed |= events
            .try_iter()
            .any(|e| matches!(e, EngineEvent::WatchFailure { .. }));
        failed
    }));
    assert!(!engine.is_watching());
}

#[test]
fn sidecar_round_trip_through_close_and_reopen() {
    let dir = three_frames();
    let mut engine = Engine::new(config(100)).unwrap();
    engine.open_directory(dir.path()).unwrap();
    let c = engine.directory().unwrap().join("c.png");
    engine.set_frame_delay(&c, 250).unwrap();
    engine.set_default_delay(70).unwrap();
    engine.close_directory().unwrap();
    assert_eq!(engine.frame_count(), 0);
    assert!(dir.path().join("framereel.json").exists());

    let mut fresh = Engine::new(config(100)).unwrap();
    fresh.open_directory(dir.path()).unwrap();
    assert_eq!(fresh.policy().default_delay_ms(), 70);
    assert_eq!(offsets(&fresh), vec![0, 70, 140]);
    assert_eq!(fresh.scheduler().timeline().cycle_ms(), 390);
}

#[test]
fn export_and_preload() {
    let dir = three_frames();
    let mut engine = Engine::new(config(100)).unwrap();
    let events = engine.notifications();
    engine.open_directory(dir.path()).unwrap();

    engine.preload().unwrap();
    engine.wait_for_preload();
    assert!(events
        .try_iter()
        .any(|e| e == EngineEvent::PreloadFinished { loaded: 3, failed: 0 }));
    assert_eq!(engine.thumbnail(0).unwrap().dimensions(), (4, 4));

    let out = tempfile::tempdir().unwrap();
    let output = out.path().join("anim.gif");
    let summary = engine
        .export_gif(&output, engine.export_settings().unwrap(), None)
        .unwrap();
    assert_eq!(summary.frames, 3);
    assert!(output.exists());
}

#[test]
fn operations_without_directory() {
    let mut engine = Engine::new(AppConfig::default()).unwrap();
    assert!(matches!(engine.reset_delays(), Err(ReelError::NoDirectory)));
    assert!(matches!(engine.raster(0), Err(ReelError::NoDirectory)));
    assert!(matches!(
        engine.export_gif("out.gif", GifExportSettings::default(), None),
        Err(ReelError::NoDirectory)
    ));
    assert_eq!(engine.pump_watch_events().unwrap(), 0);
    assert_eq!(engine.tick(), None);
    engine.close_directory().unwrap();
}

#[test]
fn unreadable_directory_fails_to_open() {
    let mut engine = Engine::new(AppConfig::default()).unwrap();
    let err = engine.open_directory("/definitely/not/here").unwrap_err();
    assert!(matches!(err, ReelError::DirectoryUnreadable { .. }));
    assert!(engine.directory().is_none());
}

#[test]
fn restore_defaults_resets_default_delay_and_overrides() {
    let dir = three_frames();
    let mut engine = Engine::new(AppConfig::default()).unwrap();
    engine.open_directory(dir.path()).unwrap();

    engine.set_default_delay(40).unwrap();
    let a = engine.directory().unwrap().join("a.png");
    engine.set_frame_delay(&a, 500).unwrap();
    assert_eq!(engine.scheduler().timeline().cycle_ms(), 580);

    assert_eq!(engine.reset_delays().unwrap(), 1);
    assert_eq!(engine.policy().default_delay_ms(), 83);
    assert_eq!(engine.scheduler().timeline().cycle_ms(), 3 * 83);
    assert_eq!(offsets(&engine), vec![0, 83, 166]);
}

#[test]
fn overflow_rescans_and_resyncs() {
    let dir = three_frames();
    let mut config = config(100);
    config.watcher.inbox_capacity = 1;
    let mut engine = Engine::new(config).unwrap();
    let events = engine.notifications();
    engine.open_directory(dir.path()).unwrap();
    let root = engine.directory().unwrap().to_path_buf();
    events.try_iter().for_each(drop);

    write_burst(&root, 20);
    std::thread::sleep(Duration::from_millis(300));

    let mut seen = Vec::new();
    assert!(pump_until(&mut engine, |e| {
        seen.extend(events.try_iter());
        e.frame_count() == 23
    }));
    seen.extend(events.try_iter());

    assert!(seen.iter().any(|e| matches!(e, EngineEvent::WatchOverflow { .. })));
    assert!(seen.contains(&EngineEvent::FrameSetChanged { count: 23 }));
    assert!(engine.is_watching());
    assert_eq!(engine.scheduler().timeline().cycle_ms(), 2300);
}

#[test]
fn failed_rescan_reports_the_watch_failure_once() {
    let parent = tempfile::tempdir().unwrap();
    let root = parent.path().join("frames");
    std::fs::create_dir(&root).unwrap();
    write_png(&root, "a.png", [0, 0, 0, 255]);

    let mut config = config(100);
    config.watcher.inbox_capacity = 1;
    config.project.autosave = false;
    let mut engine = Engine::new(config).unwrap();
    let events = engine.notifications();
    engine.open_directory(&root).unwrap();
    events.try_iter().for_each(drop);

    write_burst(&root, 30);
    std::thread::sleep(Duration::from_millis(300));
    std::fs::remove_dir_all(&root).unwrap();
    std::thread::sleep(Duration::from_millis(300));

    let failed = |seen: &[EngineEvent]| {
        seen.iter()
            .any(|e| matches!(e, EngineEvent::WatchFailure { .. }))
    };
    let deadline = Instant::now() + Duration::from_secs(5);
    let mut seen = Vec::new();
    while !failed(&seen) && Instant::now() < deadline {
        if let Err(e) = engine.pump_watch_events() {
            assert!(matches!(e, ReelError::DirectoryUnreadable { .. }), "{e}");
        }
        seen.extend(events.try_iter());
        std::thread::sleep(Duration::from_millis(20));
    }
    for _ in 0..3 {
        assert_eq!(engine.pump_watch_events().unwrap(), 0);
    }
    seen.extend(events.try_iter());

    let failures = seen
        .iter()
        .filter(|e| matches!(e, EngineEvent::WatchFailure { .. }))
        .count();
    assert_eq!(failures, 1);
    assert!(seen.iter().any(|e| matches!(e, EngineEvent::WatchOverflow { .. })));
    assert!(!engine.is_watching());
    assert_eq!(
        engine.scheduler().timeline().len(),
        engine.frame_count(),
        "timeline out of sync with the store"
    );
}

#[test]
fn switching_directories_leaves_the_old_watch_behind() {
    let first = three_frames();
    let second = tempfile::tempdir().unwrap();
    write_png(second.path(), "x.png", [9, 9, 9, 255]);

    let mut engine = Engine::new(config(100)).unwrap();
    engine.open_directory(first.path()).unwrap();
    let first_root = engine.directory().unwrap().to_path_buf();
    engine.open_directory(second.path()).unwrap();
    let second_root = engine.directory().unwrap().to_path_buf();
    assert_ne!(first_root, second_root);

    write_png(&first_root, "late.png", [1, 2, 3, 255]);
    std::fs::remove_file(first_root.join("a.png")).unwrap();
    std::thread::sleep(Duration::from_millis(300));
    engine.pump_watch_events().unwrap();
    assert_eq!(engine.frame_count(), 1);

    write_png(&second_root, "y.png", [4, 5, 6, 255]);
    assert!(pump_until(&mut engine, |e| e.frame_count() == 2));
    assert!(engine.is_watching());
    assert!(engine.frames().iter().all(|f| f.path().starts_with(&second_root)));
}

#[test]
fn undrained_notifications_stay_bounded() {
    let dir = three_frames();
    let mut engine = Engine::new(config(100)).unwrap();
    let events = engine.notifications();
    engine.open_directory(dir.path()).unwrap();

    for i in 0..NOTIFICATION_CAPACITY + 50 {
        engine.seek(i % 2);
    }
    assert_eq!(events.len(), NOTIFICATION_CAPACITY);

    events.try_iter().for_each(drop);
    engine.seek(2);
    let delivered: Vec<EngineEvent> = events.try_iter().collect();
    assert!(matches!(
        delivered.as_slice(),
        [EngineEvent::ActiveFrameChanged { index: 2, .. }]
    ));
}
