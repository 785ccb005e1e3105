use std::{
    path::PathBuf,
    process::{Child, ChildStdin, Command, Stdio},
};

use crate::{
    error::{ReadreelError, ReadreelResult},
    raster::Raster,
};

/// The encoder runs a constant-rate stream at the GIF delay quantum: GIF
/// delays are whole centiseconds, so a 100 fps timebase reproduces the
/// source timing exactly, with held frames repeated per tick.
pub const TICK_MS: u64 = 10;
pub const TIMEBASE_FPS: u32 = 100;

pub const DEFAULT_BITRATE_KBPS: u32 = 2_000;

#[derive(Clone, Debug)]
pub struct EncodeConfig {
    pub width: u32,
    pub height: u32,
    pub bitrate_kbps: u32,
}

impl EncodeConfig {
    pub fn validate(&self) -> ReadreelResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(ReadreelError::validation(
                "encode width/height must be non-zero",
            ));
        }
        if !self.width.is_multiple_of(2) || !self.height.is_multiple_of(2) {
            // With the default settings we target yuv420p output for maximum compatibility.
            return Err(ReadreelError::validation(
                "encode width/height must be even (required for yuv420p mp4 output)",
            ));
        }
        if self.bitrate_kbps == 0 {
            return Err(ReadreelError::validation("encode bitrate must be non-zero"));
        }
        Ok(())
    }
}

pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Map one `add` submission to timebase ticks.
///
/// Timestamps must be non-negative and durations positive; both are rounded
/// to the nearest tick, durations to at least one.
pub fn submission_ticks(timestamp_sec: f64, duration_sec: f64) -> ReadreelResult<(u64, u64)> {
    if !timestamp_sec.is_finite() || timestamp_sec < 0.0 {
        return Err(ReadreelError::encode_frame(format!(
            "frame timestamp must be finite and non-negative, got {timestamp_sec}"
        )));
    }
    if !duration_sec.is_finite() || duration_sec <= 0.0 {
        return Err(ReadreelError::encode_frame(format!(
            "frame duration must be finite and positive, got {duration_sec}"
        )));
    }
    let ts = (timestamp_sec * f64::from(TIMEBASE_FPS)).round() as u64;
    let dur = ((duration_sec * f64::from(TIMEBASE_FPS)).round() as u64).max(1);
    Ok((ts, dur))
}

/// Append-only H.264/MP4 encoder backed by the system `ffmpeg` binary.
///
/// Frames are submitted with `(timestamp, duration)` in strictly increasing
/// timestamp order; gaps are filled by repeating the held frame. Pixels are
/// copied into the encoder's own scratch buffer at submission time, so the
/// caller is free to mutate its raster immediately after `add_frame` returns.
///
/// We intentionally drive the system `ffmpeg` binary rather than native
/// FFmpeg bindings to avoid dev header/lib requirements; the finished MP4 is
/// read back into memory from a temp file removed on drop.
pub struct Mp4Encoder {
    cfg: EncodeConfig,
    child: Child,
    stdin: Option<ChildStdin>,
    out_path: TempFileGuard,
    scratch: Vec<u8>,
    held: Vec<u8>,
    ticks_written: u64,
    last_timestamp_ticks: Option<u64>,
    frames_submitted: u64,
}

impl Mp4Encoder {
    pub fn new(cfg: EncodeConfig) -> ReadreelResult<Self> {
        cfg.validate()?;

        if !is_ffmpeg_on_path() {
            return Err(ReadreelError::encoder_init(
                "ffmpeg is required for MP4 encoding, but was not found on PATH",
            ));
        }

        let out_path = std::env::temp_dir().join(format!(
            "readreel_social_{}_{}.mp4",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_nanos())
                .unwrap_or(0)
        ));

        let mut cmd = Command::new("ffmpeg");
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        cmd.args([
            "-y",
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "-s",
            &format!("{}x{}", cfg.width, cfg.height),
            "-r",
            &TIMEBASE_FPS.to_string(),
            "-i",
            "pipe:0",
            "-an",
            "-c:v",
            "libx264",
            "-b:v",
            &format!("{}k", cfg.bitrate_kbps),
            "-pix_fmt",
            "yuv420p",
            "-movflags",
            "+faststart",
        ])
        .arg(&out_path);

        let mut child = cmd.spawn().map_err(|e| {
            ReadreelError::encoder_init(format!(
                "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
            ))
        })?;

        let stdin = child.stdin.take().ok_or_else(|| {
            ReadreelError::encoder_init("failed to open ffmpeg stdin (unexpected)")
        })?;

        let frame_bytes = (cfg.width as usize) * (cfg.height as usize) * 4;
        Ok(Self {
            scratch: vec![0u8; frame_bytes],
            held: Vec::new(),
            cfg,
            child,
            stdin: Some(stdin),
            out_path: TempFileGuard(Some(out_path)),
            ticks_written: 0,
            last_timestamp_ticks: None,
            frames_submitted: 0,
        })
    }

    /// Submit the next frame. Captures the pixels immediately.
    pub fn add_frame(
        &mut self,
        frame: &Raster,
        timestamp_sec: f64,
        duration_sec: f64,
    ) -> ReadreelResult<()> {
        if frame.width != self.cfg.width || frame.height != self.cfg.height {
            return Err(ReadreelError::validation(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width, frame.height, self.cfg.width, self.cfg.height
            )));
        }
        if frame.data.len() != self.scratch.len() {
            return Err(ReadreelError::validation(
                "frame.data size mismatch with width*height*4",
            ));
        }

        let (ts_ticks, dur_ticks) = submission_ticks(timestamp_sec, duration_sec)?;
        if let Some(last) = self.last_timestamp_ticks
            && ts_ticks <= last
        {
            return Err(ReadreelError::encode_frame(format!(
                "frame timestamps must be strictly increasing: {timestamp_sec}s after tick {last}"
            )));
        }
        if ts_ticks < self.ticks_written {
            return Err(ReadreelError::encode_frame(format!(
                "frame at {timestamp_sec}s overlaps the previous frame's duration"
            )));
        }

        // A gap means the previous frame is held on screen until this one.
        let gap = ts_ticks - self.ticks_written;
        if gap > 0 {
            if self.held.is_empty() {
                return Err(ReadreelError::encode_frame(
                    "first frame must start at timestamp 0 (nothing to hold before it)",
                ));
            }
            let held = std::mem::take(&mut self.held);
            self.write_ticks(&held, gap)?;
            self.held = held;
        }

        flatten_to_opaque_rgba8(&mut self.scratch, &frame.data)?;
        let pixels = std::mem::take(&mut self.scratch);
        self.write_ticks(&pixels, dur_ticks)?;
        self.held.clear();
        self.held.extend_from_slice(&pixels);
        self.scratch = pixels;

        self.last_timestamp_ticks = Some(ts_ticks);
        self.frames_submitted += 1;
        Ok(())
    }

    pub fn frames_submitted(&self) -> u64 {
        self.frames_submitted
    }

    /// Total encoded duration so far, in seconds.
    pub fn duration_sec(&self) -> f64 {
        self.ticks_written as f64 / f64::from(TIMEBASE_FPS)
    }

    /// Flush and finalize into a complete, playable MP4 byte buffer.
    pub fn finish(mut self) -> ReadreelResult<Vec<u8>> {
        drop(self.stdin.take());

        let output = self.child.wait_with_output().map_err(|e| {
            ReadreelError::encode_frame(format!("failed to wait for ffmpeg to finish: {e}"))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ReadreelError::encode_frame(format!(
                "ffmpeg exited with status {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let path = self.out_path.0.as_ref().ok_or_else(|| {
            ReadreelError::encode_frame("encoder output path missing at finalize (bug)")
        })?;
        std::fs::read(path).map_err(|e| {
            ReadreelError::encode_frame(format!("failed to read encoded mp4 back: {e}"))
        })
    }

    fn write_ticks(&mut self, pixels: &[u8], ticks: u64) -> ReadreelResult<()> {
        let Some(stdin) = self.stdin.as_mut() else {
            return Err(ReadreelError::encode_frame(
                "mp4 encoder is already finalized",
            ));
        };

        use std::io::Write as _;
        for _ in 0..ticks {
            stdin.write_all(pixels).map_err(|e| {
                ReadreelError::encode_frame(format!("failed to write frame to ffmpeg stdin: {e}"))
            })?;
        }
        self.ticks_written += ticks;
        Ok(())
    }
}

fn flatten_to_opaque_rgba8(dst: &mut [u8], src: &[u8]) -> ReadreelResult<()> {
    if dst.len() != src.len() || !dst.len().is_multiple_of(4) {
        return Err(ReadreelError::validation(
            "flatten_to_opaque_rgba8 expects equal-length rgba8 buffers",
        ));
    }

    // Straight alpha over opaque white.
    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let a = u16::from(s[3]);
        if a == 255 {
            d.copy_from_slice(s);
            continue;
        }
        let inv = 255 - a;
        for i in 0..3 {
            d[i] = ((u16::from(s[i]) * a + 255 * inv + 127) / 255).min(255) as u8;
        }
        d[3] = 255;
    }

    Ok(())
}

struct TempFileGuard(Option<PathBuf>);

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if let Some(path) = self.0.take() {
            let _ = std::fs::remove_file(path);
        }
    }
}
