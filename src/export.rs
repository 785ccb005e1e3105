use crate::{
    compositor::CompositingState,
    encode_mp4::{DEFAULT_BITRATE_KBPS, EncodeConfig, Mp4Encoder},
    error::{ReadreelError, ReadreelResult},
    fetch::{GifSource, fetch_gif_bytes},
    gif_decode::{GifFrame, decode_gif},
    raster::Raster,
    receipt::ReceiptSource,
    scene::{ExportPlan, compose_scene},
};

/// Where the export currently is. Terminal stages are `Done` and `Failed`;
/// one of the two is emitted on every exit path, so a consumer never sees a
/// stuck in-progress indicator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportStage {
    Fetching,
    Decoding,
    CapturingReceipt,
    InitializingEncoder,
    EncodingFrame { index: usize, total: usize },
    Finalizing,
    Done,
    Failed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProgressEvent {
    pub stage: ExportStage,
    pub percent: u8,
}

/// What the export produced: the MP4, or the degraded PNG when the MP4 path
/// was unavailable or failed. Total failure is the `Err` side of
/// [`export_social`].
#[derive(Clone, Debug)]
pub enum ExportOutcome {
    Mp4 { bytes: Vec<u8>, file_name: String },
    Png { bytes: Vec<u8>, file_name: String },
}

impl ExportOutcome {
    pub fn file_name(&self) -> &str {
        match self {
            Self::Mp4 { file_name, .. } | Self::Png { file_name, .. } => file_name,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        match self {
            Self::Mp4 { bytes, .. } | Self::Png { bytes, .. } => bytes,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ExportOptions {
    pub plan: ExportPlan,
    pub bitrate_kbps: u32,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            plan: ExportPlan::square(1200),
            bitrate_kbps: DEFAULT_BITRATE_KBPS,
        }
    }
}

/// Per-frame `(timestamp_sec, duration_sec)` submissions for the encoder:
/// timestamps accumulate the normalized delays, each frame's duration is its
/// own normalized delay. Preserves the GIF's original visual timing.
pub fn frame_timeline(frames: &[GifFrame]) -> Vec<(f64, f64)> {
    let mut elapsed_ms = 0u64;
    frames
        .iter()
        .map(|frame| {
            let delay_ms = u64::from(frame.normalized_delay_ms());
            let entry = (elapsed_ms as f64 / 1000.0, delay_ms as f64 / 1000.0);
            elapsed_ms += delay_ms;
            entry
        })
        .collect()
}

/// Progress percentage for frame `index` of `total`, linear across the
/// 40%..=85% band.
pub fn frame_percent(index: usize, total: usize) -> u8 {
    let total = total.max(1) as u64;
    let done = (index as u64 + 1).min(total);
    (40 + (45 * done) / total) as u8
}

/// Run the whole social export: fetch, decode, composite and encode every
/// frame, finalize. Any failure on the MP4 path degrades to a PNG of the
/// receipt composition; only a failing fallback is a terminal error.
pub fn export_social(
    source: &GifSource,
    receipt: &dyn ReceiptSource,
    opts: &ExportOptions,
    progress: &mut dyn FnMut(ProgressEvent),
) -> ReadreelResult<ExportOutcome> {
    export_social_with_encoder(source, receipt, opts, &Mp4Encoder::new, progress)
}

/// [`export_social`] with the MP4 backend constructed through
/// `make_encoder`. Hosts can substitute how the encoder comes up (a wrapped
/// codec probe, a forced-failure path in tests); the default is
/// [`Mp4Encoder::new`].
#[tracing::instrument(skip_all)]
pub fn export_social_with_encoder(
    source: &GifSource,
    receipt: &dyn ReceiptSource,
    opts: &ExportOptions,
    make_encoder: &dyn Fn(EncodeConfig) -> ReadreelResult<Mp4Encoder>,
    progress: &mut dyn FnMut(ProgressEvent),
) -> ReadreelResult<ExportOutcome> {
    let mut reporter = ProgressReporter::new(progress);

    match export_mp4(source, receipt, opts, make_encoder, &mut reporter) {
        Ok(bytes) => {
            reporter.emit(ExportStage::Done, 100);
            Ok(ExportOutcome::Mp4 {
                bytes,
                file_name: social_file_name("mp4"),
            })
        }
        Err(mp4_err) => {
            tracing::warn!(error = %mp4_err, "mp4 export failed, falling back to image");
            match export_png_fallback(receipt, &opts.plan) {
                Ok(bytes) => {
                    reporter.emit(ExportStage::Done, 100);
                    Ok(ExportOutcome::Png {
                        bytes,
                        file_name: social_file_name("png"),
                    })
                }
                Err(fallback_err) => {
                    reporter.fail();
                    Err(ReadreelError::fallback(format!(
                        "mp4 export failed ({mp4_err}); png fallback also failed: {fallback_err}"
                    )))
                }
            }
        }
    }
}

fn export_mp4(
    source: &GifSource,
    receipt: &dyn ReceiptSource,
    opts: &ExportOptions,
    make_encoder: &dyn Fn(EncodeConfig) -> ReadreelResult<Mp4Encoder>,
    reporter: &mut ProgressReporter<'_>,
) -> ReadreelResult<Vec<u8>> {
    opts.plan.validate()?;

    reporter.emit(ExportStage::Fetching, 5);
    let gif_bytes = fetch_gif_bytes(source)?;

    reporter.emit(ExportStage::Decoding, 10);
    let decoded = decode_gif(&gif_bytes)?;
    reporter.emit(ExportStage::Decoding, 15);
    tracing::debug!(
        frames = decoded.frames.len(),
        canvas_width = decoded.canvas_width,
        canvas_height = decoded.canvas_height,
        duration_ms = decoded.total_duration_ms(),
        "gif decoded"
    );

    // One capture per export; the same raster overlays every frame.
    let receipt_raster = receipt.capture()?;
    reporter.emit(ExportStage::CapturingReceipt, 25);

    let mut encoder = make_encoder(EncodeConfig {
        width: opts.plan.output_width,
        height: opts.plan.output_height,
        bitrate_kbps: opts.bitrate_kbps,
    })?;
    reporter.emit(ExportStage::InitializingEncoder, 40);

    // Strictly sequential: disposal of frame N depends on frame N-1, so the
    // compositing state cannot be shared across frames.
    let mut state = CompositingState::new(decoded.canvas_width, decoded.canvas_height);
    let timeline = frame_timeline(&decoded.frames);
    let total = decoded.frames.len();
    for (index, (frame, &(timestamp_sec, duration_sec))) in
        decoded.frames.iter().zip(timeline.iter()).enumerate()
    {
        let canvas = state.apply_frame(frame)?;
        let composed = compose_scene(canvas, &receipt_raster, &opts.plan)?;
        encoder.add_frame(&composed, timestamp_sec, duration_sec)?;
        reporter.emit(
            ExportStage::EncodingFrame { index, total },
            frame_percent(index, total),
        );
    }

    reporter.emit(ExportStage::Finalizing, 85);
    let bytes = encoder.finish()?;
    reporter.emit(ExportStage::Finalizing, 95);
    Ok(bytes)
}

/// Static fallback: the receipt composed over a plain white background at
/// the planned output size. Deliberately independent of any GIF data, since
/// the MP4 failure may have been the fetch itself.
fn export_png_fallback(receipt: &dyn ReceiptSource, plan: &ExportPlan) -> ReadreelResult<Vec<u8>> {
    plan.validate()?;
    let receipt_raster = receipt
        .capture()
        .map_err(|e| ReadreelError::fallback(format!("receipt capture failed: {e}")))?;

    let background = Raster::new_filled(
        plan.output_width,
        plan.output_height,
        [255, 255, 255, 255],
    );
    let composed = compose_scene(&background, &receipt_raster, plan)?;

    let img = image::RgbaImage::from_raw(composed.width, composed.height, composed.data)
        .ok_or_else(|| ReadreelError::fallback("composed raster buffer mismatch (bug)"))?;
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(
            &mut std::io::Cursor::new(&mut bytes),
            image::ImageFormat::Png,
        )
        .map_err(|e| ReadreelError::fallback(format!("png encode failed: {e}")))?;
    Ok(bytes)
}

fn social_file_name(ext: &str) -> String {
    let secs = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    format!("read-receipt-social-{secs}.{ext}")
}

/// Keeps reported percentages monotonically non-decreasing within a run.
struct ProgressReporter<'a> {
    sink: &'a mut dyn FnMut(ProgressEvent),
    percent: u8,
}

impl<'a> ProgressReporter<'a> {
    fn new(sink: &'a mut dyn FnMut(ProgressEvent)) -> Self {
        Self { sink, percent: 0 }
    }

    fn emit(&mut self, stage: ExportStage, percent: u8) {
        self.percent = self.percent.max(percent.min(100));
        (self.sink)(ProgressEvent {
            stage,
            percent: self.percent,
        });
    }

    fn fail(&mut self) {
        let percent = self.percent;
        (self.sink)(ProgressEvent {
            stage: ExportStage::Failed,
            percent,
        });
    }
}
