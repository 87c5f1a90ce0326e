//! Export jobs: from a frame snapshot to a `.gif` on disk.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Duration;

use framereel_common::error::{ReelError, ReelResult};
use framereel_frame_model::{FrameFile, ImageDecoder};

use crate::document::{GifDocument, GifExportSettings};
use crate::encoder::GifEncoder;

/// An export ready to run.
#[derive(Debug, Clone)]
pub struct ExportJob {
    /// Final output path.
    pub output_path: PathBuf,

    /// Delay, loop, and disposal settings.
    pub settings: GifExportSettings,

    /// Longest wait for a frame another thread is still decoding.
    pub load_timeout: Duration,
}

/// Progress callback for export.
pub type ProgressCallback = Box<dyn Fn(ExportProgress) + Send>;

/// Export progress report.
#[derive(Debug, Clone)]
pub struct ExportProgress {
    /// Progress within the current stage [0.0, 1.0].
    pub progress: f64,

    /// Frames handled in this stage so far.
    pub frames_done: u64,

    /// Total frames to export.
    pub total_frames: u64,

    /// Current stage.
    pub stage: ExportStage,
}

/// Stages of the export process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportStage {
    Loading,
    Encoding,
    Finalizing,
    Complete,
    Failed,
}

/// What a finished export produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub output_path: PathBuf,
    pub frames: usize,
    pub bytes_written: u64,
}

/// Path of the temporary file an export writes before renaming.
pub fn partial_path(output: &Path) -> PathBuf {
    let mut name = output.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".part");
    output.with_file_name(name)
}

/// Load every frame and assemble the document.
///
/// A frame that cannot be decoded (or is still loading elsewhere after
/// `load_timeout`) aborts the whole export.
pub fn build_document(
    frames: &[FrameFile],
    decoder: &dyn ImageDecoder,
    settings: &GifExportSettings,
    load_timeout: Duration,
    progress: Option<&ProgressCallback>,
) -> ReelResult<GifDocument> {
    let total = frames.len() as u64;
    let mut doc = GifDocument::new(settings.looping);
    for (index, frame) in frames.iter().enumerate() {
        let raster = frame.raster(decoder, Some(load_timeout))?;
        doc.push(
            raster,
            settings.frame_delay(frame.delay_override()),
            settings.disposal,
        );
        report(progress, ExportStage::Loading, index as u64 + 1, total);
    }
    Ok(doc)
}

/// Export `frames` to `job.output_path`.
///
/// The GIF is written to a `.part` sibling first and renamed into place only
/// after the trailer is flushed, so a failed export leaves no output behind.
pub fn export_gif(
    frames: &[FrameFile],
    decoder: &dyn ImageDecoder,
    job: &ExportJob,
    progress: Option<ProgressCallback>,
) -> ReelResult<ExportSummary> {
    tracing::info!(
        output = %job.output_path.display(),
        frames = frames.len(),
        delay_ms = job.settings.delay_ms,
        looping = job.settings.looping,
        disposal = %job.settings.disposal,
        "Starting GIF export"
    );

    let result = run_export(frames, decoder, job, progress.as_ref());
    match &result {
        Ok(summary) => {
            report(
                progress.as_ref(),
                ExportStage::Complete,
                summary.frames as u64,
                summary.frames as u64,
            );
            tracing::info!(
                output = %summary.output_path.display(),
                bytes = summary.bytes_written,
                "GIF export complete"
            );
        }
        Err(e) => {
            report(progress.as_ref(), ExportStage::Failed, 0, frames.len() as u64);
            tracing::error!(output = %job.output_path.display(), error = %e, "GIF export failed");
        }
    }
    result
}

fn run_export(
    frames: &[FrameFile],
    decoder: &dyn ImageDecoder,
    job: &ExportJob,
    progress: Option<&ProgressCallback>,
) -> ReelResult<ExportSummary> {
    if frames.is_empty() {
        return Err(ReelError::EmptyFrameSet);
    }
    job.settings.validate()?;

    let doc = build_document(frames, decoder, &job.settings, job.load_timeout, progress)?;

    if let Some(parent) = job.output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(ReelError::encoding_io)?;
    }
    let part = partial_path(&job.output_path);
    let encoded = File::create(&part)
        .map_err(ReelError::encoding_io)
        .and_then(|file| {
            GifEncoder::new(job.settings.quantize_speed).encode_with_progress(
                &doc,
                BufWriter::new(file),
                progress,
            )
        });

    let bytes_written = match encoded {
        Ok(bytes) => bytes,
        Err(e) => {
            let _ = std::fs::remove_file(&part);
            return Err(e);
        }
    };

    report(progress, ExportStage::Finalizing, doc.len() as u64, doc.len() as u64);
    if let Err(e) = std::fs::rename(&part, &job.output_path) {
        let _ = std::fs::remove_file(&part);
        return Err(ReelError::encoding_io(e));
    }

    Ok(ExportSummary {
        output_path: job.output_path.clone(),
        frames: doc.len(),
        bytes_written,
    })
}

fn report(progress: Option<&ProgressCallback>, stage: ExportStage, done: u64, total: u64) {
    if let Some(cb) = progress {
        let fraction = if total == 0 {
            1.0
        } else {
            done as f64 / total as f64
        };
        cb(ExportProgress {
            progress: fraction,
            frames_done: done,
            total_frames: total,
            stage,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use framereel_frame_model::{FrameStore, ImageCrateDecoder};

    fn write_png(dir: &Path, name: &str, w: u32, h: u32) {
        image::RgbaImage::from_pixel(w, h, image::Rgba([50, 100, 150, 255]))
            .save(dir.join(name))
            .unwrap();
    }

    fn job(output: PathBuf) -> ExportJob {
        ExportJob {
            output_path: output,
            settings: GifExportSettings {
                delay_ms: 100,
                ..Default::default()
            },
            load_timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_partial_path() {
        assert_eq!(
            partial_path(Path::new("/out/anim.gif")),
            PathBuf::from("/out/anim.gif.part")
        );
    }

    #[test]
    fn test_export_writes_gif_and_removes_part() {
        let frames_dir = tempfile::tempdir().unwrap();
        write_png(frames_dir.path(), "a.png", 6, 4);
        write_png(frames_dir.path(), "b.png", 6, 4);
        let mut store = FrameStore::load(frames_dir.path()).unwrap();
        let b = store.directory().join("b.png");
        store.set_delay(&b, 40);

        let out_dir = tempfile::tempdir().unwrap();
        let output = out_dir.path().join("nested").join("anim.gif");
        let summary = export_gif(&store.get_all(), &ImageCrateDecoder, &job(output.clone()), None)
            .unwrap();

        assert_eq!(summary.frames, 2);
        assert!(output.exists());
        assert!(!partial_path(&output).exists());
        assert_eq!(std::fs::metadata(&output).unwrap().len(), summary.bytes_written);

        let mut options = gif::DecodeOptions::new();
        options.set_color_output(gif::ColorOutput::RGBA);
        let mut decoder = options.read_info(File::open(&output).unwrap()).unwrap();
        let mut delays = Vec::new();
        while let Some(frame) = decoder.read_next_frame().unwrap() {
            delays.push(frame.delay);
        }
        assert_eq!(delays, vec![10, 4]);
    }

    #[test]
    fn test_undecodable_frame_aborts_without_output() {
        let frames_dir = tempfile::tempdir().unwrap();
        write_png(frames_dir.path(), "a.png", 2, 2);
        std::fs::write(frames_dir.path().join("b.png"), b"not a png").unwrap();
        let store = FrameStore::load(frames_dir.path()).unwrap();

        let out_dir = tempfile::tempdir().unwrap();
        let output = out_dir.path().join("anim.gif");
        let err = export_gif(&store.get_all(), &ImageCrateDecoder, &job(output.clone()), None)
            .unwrap_err();

        assert!(matches!(err, ReelError::FrameDecode { .. }));
        assert!(err.to_string().contains("b.png"));
        assert!(!output.exists());
        assert!(!partial_path(&output).exists());
    }

    #[test]
    fn test_empty_snapshot_is_rejected() {
        let out_dir = tempfile::tempdir().unwrap();
        let output = out_dir.path().join("anim.gif");
        let err = export_gif(&[], &ImageCrateDecoder, &job(output.clone()), None).unwrap_err();
        assert!(matches!(err, ReelError::EmptyFrameSet));
        assert!(!output.exists());
    }

    #[test]
    fn test_progress_ends_complete() {
        use std::sync::{Arc, Mutex};

        let frames_dir = tempfile::tempdir().unwrap();
        write_png(frames_dir.path(), "a.png", 2, 2);
        let store = FrameStore::load(frames_dir.path()).unwrap();

        let stages = Arc::new(Mutex::new(Vec::new()));
        let sink = stages.clone();
        let cb: ProgressCallback = Box::new(move |p: ExportProgress| sink.lock().unwrap().push(p.stage));

        let out_dir = tempfile::tempdir().unwrap();
        export_gif(
            &store.get_all(),
            &ImageCrateDecoder,
            &job(out_dir.path().join("a.gif")),
            Some(cb),
        )
        .unwrap();

        let stages = stages.lock().unwrap();
        assert_eq!(stages.first(), Some(&ExportStage::Loading));
        assert_eq!(stages.last(), Some(&ExportStage::Complete));
        assert!(stages.contains(&ExportStage::Encoding));
        assert!(stages.contains(&ExportStage::Finalizing));
    }
}
