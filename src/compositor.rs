use crate::{
    error::{ReadreelError, ReadreelResult},
    gif_decode::{DisposalMode, GifFrame, Placement},
    raster::Raster,
};

/// Restore color for `RestoreToBackground` disposal. Opaque white, never
/// transparent: the encoded video has no alpha channel, and a transparent
/// restore would show up as black holes after flattening.
pub const BACKGROUND_FILL: [u8; 4] = [255, 255, 255, 255];

/// The mutable full-canvas buffer representing "what the GIF currently
/// shows", advanced one frame at a time in strict frame order.
///
/// Disposal is deferred: a frame's disposal mode dictates how the canvas is
/// prepared before the *next* frame is drawn, so it is recorded on draw and
/// applied at the start of the following [`apply_frame`](Self::apply_frame).
pub struct CompositingState {
    canvas: Raster,
    /// Canvas copy taken just before the most recent frame was drawn; what
    /// `RestoreToPrevious` rolls back to.
    snapshot: Vec<u8>,
    pending_disposal: Option<(DisposalMode, Placement)>,
}

impl CompositingState {
    pub fn new(canvas_width: u32, canvas_height: u32) -> Self {
        let canvas = Raster::new_filled(canvas_width, canvas_height, BACKGROUND_FILL);
        let snapshot = canvas.data.clone();
        Self {
            canvas,
            snapshot,
            pending_disposal: None,
        }
    }

    /// Advance the canvas by one frame and return its displayable raster.
    ///
    /// The returned borrow is only valid until the next call; callers that
    /// need the pixels beyond that must copy them.
    pub fn apply_frame(&mut self, frame: &GifFrame) -> ReadreelResult<&Raster> {
        self.check_placement(frame.placement)?;

        match self.pending_disposal.take() {
            Some((DisposalMode::RestoreToBackground, rect)) => {
                self.canvas
                    .fill_rect(rect.left, rect.top, rect.width, rect.height, BACKGROUND_FILL);
            }
            Some((DisposalMode::RestoreToPrevious, _)) => {
                self.canvas.data.copy_from_slice(&self.snapshot);
            }
            Some((DisposalMode::None | DisposalMode::DoNotDispose, _)) | None => {}
        }

        self.snapshot.copy_from_slice(&self.canvas.data);

        // Direct pixel write: GIF patches are definitive, not translucent
        // overlays. Transparent patch pixels land as-is and are flattened
        // over white by the scene composer.
        let p = frame.placement;
        let canvas_w = self.canvas.width as usize;
        for row in 0..p.height as usize {
            let src_off = row * (p.width as usize) * 4;
            let dst_off = ((p.top as usize + row) * canvas_w + p.left as usize) * 4;
            let len = (p.width as usize) * 4;
            self.canvas.data[dst_off..dst_off + len]
                .copy_from_slice(&frame.patch[src_off..src_off + len]);
        }

        self.pending_disposal = Some((frame.disposal, frame.placement));
        Ok(&self.canvas)
    }

    pub fn canvas(&self) -> &Raster {
        &self.canvas
    }

    fn check_placement(&self, p: Placement) -> ReadreelResult<()> {
        if p.left + p.width > self.canvas.width || p.top + p.height > self.canvas.height {
            // Decoder guarantees bounds; hitting this means a broken caller.
            return Err(ReadreelError::validation(format!(
                "frame placement {}x{}+{}+{} exceeds {}x{} canvas",
                p.width, p.height, p.left, p.top, self.canvas.width, self.canvas.height
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_frame(
        left: u32,
        top: u32,
        width: u32,
        height: u32,
        rgba: [u8; 4],
        disposal: DisposalMode,
    ) -> GifFrame {
        let mut patch = Vec::with_capacity((width * height * 4) as usize);
        for _ in 0..width * height {
            patch.extend_from_slice(&rgba);
        }
        GifFrame {
            patch,
            placement: Placement {
                left,
                top,
                width,
                height,
            },
            delay_ms: 100,
            disposal,
        }
    }

    #[test]
    fn initial_canvas_is_opaque_white() {
        let state = CompositingState::new(2, 2);
        assert_eq!(state.canvas().pixel(0, 0), BACKGROUND_FILL);
        assert_eq!(state.canvas().pixel(1, 1), BACKGROUND_FILL);
    }

    #[test]
    fn restore_to_background_clears_only_the_prior_rect() {
        let mut state = CompositingState::new(4, 4);
        let f0 = solid_frame(0, 0, 4, 4, [10, 10, 10, 255], DisposalMode::DoNotDispose);
        let f1 = solid_frame(1, 1, 2, 2, [200, 0, 0, 255], DisposalMode::RestoreToBackground);
        let f2 = solid_frame(0, 0, 1, 1, [0, 0, 200, 255], DisposalMode::None);

        state.apply_frame(&f0).unwrap();
        state.apply_frame(&f1).unwrap();
        let canvas = state.apply_frame(&f2).unwrap();

        // f1's rect went back to white, the rest of f0 survived, f2's pixel
        // drew over the top-left corner.
        assert_eq!(canvas.pixel(0, 0), [0, 0, 200, 255]);
        assert_eq!(canvas.pixel(1, 1), BACKGROUND_FILL);
        assert_eq!(canvas.pixel(2, 2), BACKGROUND_FILL);
        assert_eq!(canvas.pixel(3, 3), [10, 10, 10, 255]);
        assert_eq!(canvas.pixel(0, 3), [10, 10, 10, 255]);
    }

    #[test]
    fn restore_to_previous_rolls_back_the_whole_canvas() {
        let mut state = CompositingState::new(3, 3);
        let f0 = solid_frame(0, 0, 3, 3, [1, 2, 3, 255], DisposalMode::DoNotDispose);
        let f1 = solid_frame(0, 0, 3, 3, [250, 250, 250, 255], DisposalMode::RestoreToPrevious);

        state.apply_frame(&f0).unwrap();
        let before_f1 = state.canvas().data.clone();
        state.apply_frame(&f1).unwrap();

        // Drawing f2 first applies f1's disposal; the canvas must be
        // bit-for-bit what it was before f1 was drawn, then f2's patch lands.
        let f2 = solid_frame(2, 2, 1, 1, [9, 9, 9, 255], DisposalMode::None);
        let canvas = state.apply_frame(&f2).unwrap();

        let mut expected = before_f1;
        let off = (2 * 3 + 2) * 4;
        expected[off..off + 4].copy_from_slice(&[9, 9, 9, 255]);
        assert_eq!(canvas.data, expected);
    }

    #[test]
    fn do_not_dispose_keeps_prior_pixels() {
        let mut state = CompositingState::new(2, 1);
        let f0 = solid_frame(0, 0, 2, 1, [5, 5, 5, 255], DisposalMode::DoNotDispose);
        let f1 = solid_frame(0, 0, 1, 1, [7, 7, 7, 255], DisposalMode::None);

        state.apply_frame(&f0).unwrap();
        let canvas = state.apply_frame(&f1).unwrap();
        assert_eq!(canvas.pixel(0, 0), [7, 7, 7, 255]);
        assert_eq!(canvas.pixel(1, 0), [5, 5, 5, 255]);
    }

    #[test]
    fn patch_write_is_direct_including_alpha() {
        let mut state = CompositingState::new(1, 1);
        let f0 = solid_frame(0, 0, 1, 1, [0, 0, 0, 0], DisposalMode::None);
        let canvas = state.apply_frame(&f0).unwrap();
        assert_eq!(canvas.pixel(0, 0), [0, 0, 0, 0]);
    }

    #[test]
    fn out_of_range_placement_fails_fast() {
        let mut state = CompositingState::new(2, 2);
        let bad = solid_frame(1, 1, 2, 2, [0, 0, 0, 255], DisposalMode::None);
        assert!(matches!(
            state.apply_frame(&bad),
            Err(ReadreelError::Validation(_))
        ));
    }
}
