//! Restore default delays.

use std::path::PathBuf;

use framereel_common::config::AppConfig;
use framereel_engine::Engine;

pub fn run(config: AppConfig, path: PathBuf) -> anyhow::Result<()> {
    let mut engine = Engine::new(config)?;
    engine
        .open_directory(&path)
        .map_err(|e| anyhow::anyhow!("Failed to open directory: {e}"))?;

    let cleared = engine.reset_delays()?;
    let sidecar = engine.save_sidecar()?;
    println!("Cleared {cleared} frame delay override(s)");
    println!("  Default delay: {}ms", engine.policy().default_delay_ms());
    println!("  Saved {}", sidecar.display());
    Ok(())
}
