//! Show frames, delays, and timing of a directory.

use std::path::PathBuf;

use framereel_common::config::AppConfig;
use framereel_engine::Engine;

pub fn run(mut config: AppConfig, path: PathBuf) -> anyhow::Result<()> {
    config.project.autosave = false;
    let mut engine = Engine::new(config)?;
    engine
        .open_directory(&path)
        .map_err(|e| anyhow::anyhow!("Failed to open directory: {e}"))?;

    let policy = engine.policy();
    let timeline = engine.scheduler().timeline();
    let directory = engine.directory().map(|d| d.display().to_string()).unwrap_or_default();

    println!("Directory: {directory}");
    println!("  Frames: {}", engine.frame_count());
    println!(
        "  Default delay: {}ms ({:.2}fps)",
        policy.default_delay_ms(),
        policy.fps()
    );
    println!("  Cycle: {}ms", timeline.cycle_ms());
    println!();

    if engine.frame_count() == 0 {
        println!("No image files found.");
        return Ok(());
    }

    println!("Frames:");
    for (frame, cue) in engine.frames().iter().zip(timeline.cues()) {
        let name = frame.file_name().unwrap_or("?");
        let delay = policy.computed_delay(frame);
        let marker = if frame.delay_override().is_some() { "*" } else { " " };
        println!(
            "  {:>4}  {:>8}ms  {:>6}ms{marker} {name}",
            cue.frame_index, cue.offset_ms, delay
        );
    }
    println!();
    println!("  * per-frame override");

    Ok(())
}
