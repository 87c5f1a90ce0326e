//! Change frame delays and save them to the sidecar.

use std::path::{Path, PathBuf};

use framereel_common::config::AppConfig;
use framereel_engine::Engine;

/// Set the delay of the frame named `frame`.
pub fn run(config: AppConfig, path: PathBuf, frame: String, ms: i64) -> anyhow::Result<()> {
    let mut engine = open(config, &path)?;

    let frame_path = engine
        .directory()
        .map(|dir| dir.join(&frame))
        .ok_or_else(|| anyhow::anyhow!("Directory closed unexpectedly"))?;
    if !engine.set_frame_delay(&frame_path, ms)? {
        anyhow::bail!("No frame named {frame} in {}", path.display());
    }
    if ms > 0 {
        println!("{frame}: {ms}ms");
    } else {
        println!("{frame}: default delay restored");
    }

    save(&engine)
}

/// Set the delay used by frames without an override.
pub fn run_default(config: AppConfig, path: PathBuf, ms: i64) -> anyhow::Result<()> {
    let mut engine = open(config, &path)?;
    engine.set_default_delay(ms)?;
    println!("Default delay: {ms}ms ({:.2}fps)", engine.policy().fps());
    save(&engine)
}

fn open(config: AppConfig, path: &Path) -> anyhow::Result<Engine> {
    let mut engine = Engine::new(config)?;
    engine
        .open_directory(path)
        .map_err(|e| anyhow::anyhow!("Failed to open directory: {e}"))?;
    Ok(engine)
}

fn save(engine: &Engine) -> anyhow::Result<()> {
    let sidecar = engine.save_sidecar()?;
    println!("  Saved {}", sidecar.display());
    println!("  Cycle: {}ms", engine.scheduler().timeline().cycle_ms());
    Ok(())
}
