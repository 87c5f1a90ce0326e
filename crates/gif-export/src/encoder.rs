//! GIF89a bitstream writer.

use std::io::{self, Write};

use framereel_common::error::{ReelError, ReelResult};

use crate::document::GifDocument;
use crate::export::{ExportProgress, ExportStage, ProgressCallback};

/// Convert milliseconds to GIF centiseconds.
///
/// Rounds to the nearest centisecond. Zero becomes 1 (the shortest delay
/// decoders honour) and anything above the 16-bit field saturates.
pub fn delay_to_centis(delay_ms: u32) -> u16 {
    let centis = (u64::from(delay_ms) + 5) / 10;
    centis.clamp(1, u64::from(u16::MAX)) as u16
}

/// Encodes a [`GifDocument`] with per-frame local color tables.
#[derive(Debug, Clone, Copy)]
pub struct GifEncoder {
    quantize_speed: i32,
}

impl Default for GifEncoder {
    fn default() -> Self {
        Self::new(10)
    }
}

impl GifEncoder {
    /// `quantize_speed` is clamped to the quantizer's 1..=30 range.
    pub fn new(quantize_speed: i32) -> Self {
        Self {
            quantize_speed: quantize_speed.clamp(1, 30),
        }
    }

    /// Write `doc` to `sink`, returning the number of bytes written.
    pub fn encode<W: Write>(&self, doc: &GifDocument, sink: W) -> ReelResult<u64> {
        self.encode_with_progress(doc, sink, None)
    }

    /// Like [`encode`](Self::encode), reporting after each frame.
    pub fn encode_with_progress<W: Write>(
        &self,
        doc: &GifDocument,
        sink: W,
        progress: Option<&ProgressCallback>,
    ) -> ReelResult<u64> {
        if doc.is_empty() {
            return Err(ReelError::EmptyFrameSet);
        }

        let (canvas_w, canvas_h) = dimensions_u16(doc.canvas_size())?;

        let total = doc.len() as u64;
        let mut encoder =
            gif::Encoder::new(CountingWriter::new(sink), canvas_w, canvas_h, &[]).map_err(map_err)?;
        if doc.looping {
            encoder.set_repeat(gif::Repeat::Infinite).map_err(map_err)?;
        }

        for (index, frame) in doc.frames.iter().enumerate() {
            let (w, h) = frame.raster.dimensions();
            let (w16, h16) = dimensions_u16((w, h))?;

            let mut pixels = frame.raster.as_raw().clone();
            let mut gif_frame =
                gif::Frame::from_rgba_speed(w16, h16, &mut pixels, self.quantize_speed);
            gif_frame.delay = delay_to_centis(frame.delay_ms);
            gif_frame.dispose = frame.disposal.into();

            encoder.write_frame(&gif_frame).map_err(map_err)?;

            let done = index as u64 + 1;
            tracing::trace!(frame = index, width = w, height = h, "Encoded GIF frame");
            if let Some(cb) = progress {
                cb(ExportProgress {
                    progress: done as f64 / total as f64,
                    frames_done: done,
                    total_frames: total,
                    stage: ExportStage::Encoding,
                });
            }
        }

        // Writes the trailer.
        let mut writer = encoder.into_inner().map_err(ReelError::encoding_io)?;
        writer.flush().map_err(ReelError::encoding_io)?;
        Ok(writer.written)
    }
}

fn dimensions_u16((width, height): (u32, u32)) -> ReelResult<(u16, u16)> {
    match (u16::try_from(width), u16::try_from(height)) {
        (Ok(w), Ok(h)) => Ok((w, h)),
        _ => Err(ReelError::FrameTooLarge { width, height }),
    }
}

fn map_err(err: gif::EncodingError) -> ReelError {
    match err {
        gif::EncodingError::Io(e) => ReelError::encoding_io(e),
        gif::EncodingError::Format(e) => {
            ReelError::Other(anyhow::anyhow!("GIF format error: {e}"))
        }
    }
}

/// Counts bytes that actually reach the sink.
struct CountingWriter<W> {
    inner: W,
    written: u64,
}

impl<W> CountingWriter<W> {
    fn new(inner: W) -> Self {
        Self { inner, written: 0 }
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
