//! Export a directory to an animated GIF.

use std::io::Write;
use std::path::PathBuf;

use framereel_common::config::AppConfig;
use framereel_engine::Engine;
use framereel_gif_export::{ExportProgress, ExportStage, ProgressCallback};

pub fn run(
    mut config: AppConfig,
    path: PathBuf,
    output: Option<PathBuf>,
    delay: Option<u32>,
    no_loop: bool,
    disposal: Option<String>,
) -> anyhow::Result<()> {
    println!("Exporting frames in: {}", path.display());

    config.project.autosave = false;
    let mut engine = Engine::new(config)?;
    let frames = engine
        .open_directory(&path)
        .map_err(|e| anyhow::anyhow!("Failed to open directory: {e}"))?;

    let mut settings = engine.export_settings()?;
    if let Some(delay) = delay {
        settings.delay_ms = delay;
    }
    if no_loop {
        settings.looping = false;
    }
    if let Some(disposal) = disposal {
        settings.disposal = disposal.parse()?;
    }

    let output_path = output.unwrap_or_else(|| path.with_extension("gif"));

    println!("  Output: {}", output_path.display());
    println!("  Frames: {frames}");
    println!("  Delay: {}ms", settings.delay_ms);
    println!("  Loop: {}", if settings.looping { "forever" } else { "once" });
    println!("  Disposal: {}", settings.disposal);

    let progress_cb: ProgressCallback = Box::new(|p: ExportProgress| {
        let stage = match p.stage {
            ExportStage::Loading => "Loading",
            ExportStage::Encoding => "Encoding",
            ExportStage::Finalizing => "Finalizing",
            ExportStage::Complete | ExportStage::Failed => return,
        };
        print!(
            "\r  {stage}: {:.1}% ({}/{} frames)  ",
            p.progress * 100.0,
            p.frames_done,
            p.total_frames,
        );
        let _ = std::io::stdout().flush();
    });

    match engine.export_gif(&output_path, settings, Some(progress_cb)) {
        Ok(summary) => {
            println!(
                "\nExport complete: {} ({} frames, {} bytes)",
                summary.output_path.display(),
                summary.frames,
                summary.bytes_written
            );
            Ok(())
        }
        Err(e) => {
            println!();
            Err(anyhow::anyhow!("Export failed: {e}"))
        }
    }
}
