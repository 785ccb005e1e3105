use std::io::Cursor;

use crate::error::{ReadreelError, ReadreelResult};

/// Floor applied to per-frame delays downstream. Browsers do the same for
/// zero/missing GIF delays; without it a frame would stall or vanish.
pub const MIN_FRAME_DELAY_MS: u32 = 10;

/// How the display buffer must be prepared before the *next* frame is drawn.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisposalMode {
    None,
    DoNotDispose,
    RestoreToBackground,
    RestoreToPrevious,
}

/// Position of a frame's patch within the full GIF canvas.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Placement {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

/// One decoded frame: the sub-rectangle of pixels it carries plus its
/// timing/disposal metadata, preserved exactly as encoded.
#[derive(Clone, Debug)]
pub struct GifFrame {
    /// RGBA pixels for the placement rectangle only.
    pub patch: Vec<u8>,
    pub placement: Placement,
    /// Raw delay in milliseconds (GIF stores centiseconds). May be zero.
    pub delay_ms: u32,
    pub disposal: DisposalMode,
}

impl GifFrame {
    /// Delay with the zero/tiny-delay floor applied. Raw metadata is kept
    /// untouched in `delay_ms`; timing consumers use this.
    pub fn normalized_delay_ms(&self) -> u32 {
        self.delay_ms.max(MIN_FRAME_DELAY_MS)
    }
}

#[derive(Clone, Debug)]
pub struct DecodedGif {
    pub frames: Vec<GifFrame>,
    pub canvas_width: u32,
    pub canvas_height: u32,
}

impl DecodedGif {
    /// Sum of normalized delays, in milliseconds.
    pub fn total_duration_ms(&self) -> u64 {
        self.frames
            .iter()
            .map(|f| u64::from(f.normalized_delay_ms()))
            .sum()
    }
}

/// Parse raw GIF bytes into an ordered frame list. Pure: no I/O, no state.
///
/// Fails with [`ReadreelError::Decode`] on a malformed container, zero
/// frames, or a frame placed outside the logical canvas.
pub fn decode_gif(bytes: &[u8]) -> ReadreelResult<DecodedGif> {
    let mut opts = gif::DecodeOptions::new();
    opts.set_color_output(gif::ColorOutput::RGBA);

    let mut decoder = opts
        .read_info(Cursor::new(bytes))
        .map_err(|e| ReadreelError::decode(format!("invalid gif container: {e}")))?;

    let canvas_width = u32::from(decoder.width());
    let canvas_height = u32::from(decoder.height());
    if canvas_width == 0 || canvas_height == 0 {
        return Err(ReadreelError::decode("gif logical canvas has zero size"));
    }

    let mut frames = Vec::new();
    loop {
        let frame = match decoder.read_next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(e) => {
                return Err(ReadreelError::decode(format!(
                    "failed to read gif frame {}: {e}",
                    frames.len()
                )));
            }
        };

        let placement = Placement {
            left: u32::from(frame.left),
            top: u32::from(frame.top),
            width: u32::from(frame.width),
            height: u32::from(frame.height),
        };
        if placement.left + placement.width > canvas_width
            || placement.top + placement.height > canvas_height
        {
            return Err(ReadreelError::decode(format!(
                "frame {} placed outside the {canvas_width}x{canvas_height} canvas",
                frames.len()
            )));
        }

        let expected = (placement.width as usize) * (placement.height as usize) * 4;
        if frame.buffer.len() != expected {
            return Err(ReadreelError::decode(format!(
                "frame {} patch has {} bytes, expected {expected}",
                frames.len(),
                frame.buffer.len()
            )));
        }

        frames.push(GifFrame {
            patch: frame.buffer.to_vec(),
            placement,
            delay_ms: u32::from(frame.delay) * 10,
            disposal: map_disposal(frame.dispose),
        });
    }

    if frames.is_empty() {
        return Err(ReadreelError::decode("gif contains no frames"));
    }

    Ok(DecodedGif {
        frames,
        canvas_width,
        canvas_height,
    })
}

fn map_disposal(method: gif::DisposalMethod) -> DisposalMode {
    match method {
        gif::DisposalMethod::Any => DisposalMode::None,
        gif::DisposalMethod::Keep => DisposalMode::DoNotDispose,
        gif::DisposalMethod::Background => DisposalMode::RestoreToBackground,
        gif::DisposalMethod::Previous => DisposalMode::RestoreToPrevious,
    }
}
