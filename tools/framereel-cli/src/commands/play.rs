//! Play a directory in the terminal, following live changes.

use std::path::PathBuf;
use std::time::Duration;

use framereel_common::config::AppConfig;
use framereel_engine::{Engine, EngineEvent};
use framereel_frame_model::DelayPolicy;
use framereel_playback::PlaybackState;
use tokio::time::MissedTickBehavior;

pub async fn run(
    config: AppConfig,
    path: PathBuf,
    fps: Option<u32>,
    cycles: Option<u32>,
    preload: bool,
    json: bool,
) -> anyhow::Result<()> {
    let tick = Duration::from_millis(config.playback.tick_interval_ms.max(1));
    let mut engine = Engine::new(config)?;
    let events = engine.notifications();

    let frames = engine
        .open_directory(&path)
        .map_err(|e| anyhow::anyhow!("Failed to open directory: {e}"))?;
    if let Some(fps) = fps {
        let policy = DelayPolicy::from_fps(fps)?;
        engine.set_default_delay(i64::from(policy.default_delay_ms()))?;
    }
    if preload {
        engine.preload()?;
    }

    if !json {
        println!("Playing {} ({frames} frames)", path.display());
        println!("  Cycle: {}ms", engine.scheduler().timeline().cycle_ms());
        println!("  Press Ctrl-C to stop");
    }

    engine.play();

    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut completed_cycles = 0u32;
    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                tracing::info!("Interrupted");
                break;
            }
            _ = interval.tick() => {
                if let Err(e) = engine.pump_watch_events() {
                    tracing::warn!(error = %e, "Failed to apply directory changes");
                }

                let before = engine.scheduler().current();
                if let (Some(index), Some(before)) = (engine.tick(), before) {
                    if index < before {
                        completed_cycles += 1;
                    }
                }

                for event in events.try_iter() {
                    print_event(&event, json)?;
                }

                if cycles.is_some_and(|limit| completed_cycles >= limit) {
                    break;
                }
            }
        }
    }

    engine.pause();
    engine.close_directory()?;
    for event in events.try_iter() {
        print_event(&event, json)?;
    }
    Ok(())
}

fn print_event(event: &EngineEvent, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string(event)?);
        return Ok(());
    }

    match event {
        EngineEvent::ActiveFrameChanged { index, path } => {
            let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
            println!("  [{index:>4}] {name}");
        }
        EngineEvent::FrameSetChanged { count } => println!("Frames: {count}"),
        EngineEvent::PlaybackStateChanged { state } => match state {
            PlaybackState::Playing => println!("Playing"),
            PlaybackState::Stopped => println!("Stopped"),
        },
        EngineEvent::LoadError { path, cause } => {
            println!("  Cannot load {}: {cause}", path.display());
        }
        EngineEvent::WatchOverflow { directory } => {
            println!("Missed changes in {}, rescanned", directory.display());
        }
        EngineEvent::WatchFailure { directory, cause } => {
            println!(
                "Stopped watching {} ({cause}); reopen to resume live updates",
                directory.display()
            );
        }
        EngineEvent::PreloadFinished { loaded, failed } => {
            println!("Preloaded {loaded} frames ({failed} failed)");
        }
    }
    Ok(())
}
