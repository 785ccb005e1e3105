use image::{RgbaImage, imageops};

use crate::{
    error::{ReadreelError, ReadreelResult},
    raster::Raster,
};

/// Source GIF rasters are pre-upscaled by this factor before the cover-fit
/// step. A quality heuristic for tiny GIFs, not a correctness requirement.
const PRE_UPSCALE_FACTOR: u32 = 2;

/// Output geometry for one export, computed once at export start.
#[derive(Clone, Copy, Debug)]
pub struct ExportPlan {
    pub output_width: u32,
    pub output_height: u32,
    /// Fraction of the output the receipt may occupy, in (0, 1]. Derived
    /// from the preview layout so the export matches what was on screen.
    pub receipt_width_ratio: f32,
    pub receipt_height_ratio: f32,
}

impl ExportPlan {
    /// Square plan with the default receipt proportions.
    pub fn square(size: u32) -> Self {
        Self {
            output_width: size,
            output_height: size,
            receipt_width_ratio: 0.5,
            receipt_height_ratio: 0.9,
        }
    }

    pub fn validate(&self) -> ReadreelResult<()> {
        if self.output_width == 0 || self.output_height == 0 {
            return Err(ReadreelError::validation(
                "export plan width/height must be non-zero",
            ));
        }
        if !self.output_width.is_multiple_of(2) || !self.output_height.is_multiple_of(2) {
            // The encoder targets yuv420p output for maximum compatibility.
            return Err(ReadreelError::validation(
                "export plan width/height must be even (required for yuv420p mp4 output)",
            ));
        }
        for (name, ratio) in [
            ("receipt_width_ratio", self.receipt_width_ratio),
            ("receipt_height_ratio", self.receipt_height_ratio),
        ] {
            if !(ratio > 0.0 && ratio <= 1.0) {
                return Err(ReadreelError::validation(format!(
                    "{name} must be in (0, 1], got {ratio}"
                )));
            }
        }
        Ok(())
    }
}

/// Compose one output frame: the GIF raster cover-fit behind, the receipt
/// raster fit-within and centered on top, everything flattened opaque.
///
/// Deterministic for identical inputs.
pub fn compose_scene(
    gif: &Raster,
    receipt: &Raster,
    plan: &ExportPlan,
) -> ReadreelResult<Raster> {
    plan.validate()?;
    if gif.width == 0 || gif.height == 0 {
        return Err(ReadreelError::validation("gif raster has zero size"));
    }
    if receipt.width == 0 || receipt.height == 0 {
        return Err(ReadreelError::validation("receipt raster has zero size"));
    }

    let mut background = to_image(gif)?;
    if gif.width < plan.output_width && gif.height < plan.output_height {
        background = imageops::resize(
            &background,
            gif.width * PRE_UPSCALE_FACTOR,
            gif.height * PRE_UPSCALE_FACTOR,
            imageops::FilterType::CatmullRom,
        );
    }

    // Cover-fit: fill the whole output, cropping overflow, never letterbox.
    let scale = f64::max(
        f64::from(plan.output_width) / f64::from(background.width()),
        f64::from(plan.output_height) / f64::from(background.height()),
    );
    let scaled_w = ((f64::from(background.width()) * scale).round() as u32).max(plan.output_width);
    let scaled_h =
        ((f64::from(background.height()) * scale).round() as u32).max(plan.output_height);
    let scaled = imageops::resize(
        &background,
        scaled_w,
        scaled_h,
        imageops::FilterType::Triangle,
    );

    // Opaque white base so no transparent or undefined pixel can leak into
    // the encoded video, whatever the GIF raster carried.
    let mut out = Raster::new_filled(plan.output_width, plan.output_height, [255, 255, 255, 255]);
    let crop_x = (i64::from(scaled_w) - i64::from(plan.output_width)) / 2;
    let crop_y = (i64::from(scaled_h) - i64::from(plan.output_height)) / 2;
    blit_over(&mut out, &scaled, -crop_x, -crop_y);

    // Receipt: fit-within its ratio box, preserving its own aspect.
    let box_w = f64::from(plan.output_width) * f64::from(plan.receipt_width_ratio);
    let box_h = f64::from(plan.output_height) * f64::from(plan.receipt_height_ratio);
    let fit = f64::min(
        box_w / f64::from(receipt.width),
        box_h / f64::from(receipt.height),
    );
    let receipt_w = ((f64::from(receipt.width) * fit).round() as u32).max(1);
    let receipt_h = ((f64::from(receipt.height) * fit).round() as u32).max(1);
    let receipt_img = imageops::resize(
        &to_image(receipt)?,
        receipt_w,
        receipt_h,
        imageops::FilterType::CatmullRom,
    );

    let left = (i64::from(plan.output_width) - i64::from(receipt_w)) / 2;
    let top = (i64::from(plan.output_height) - i64::from(receipt_h)) / 2;
    blit_over(&mut out, &receipt_img, left, top);

    Ok(out)
}

fn to_image(raster: &Raster) -> ReadreelResult<RgbaImage> {
    RgbaImage::from_raw(raster.width, raster.height, raster.data.clone())
        .ok_or_else(|| ReadreelError::validation("raster buffer does not match its dimensions"))
}

/// Source-over blit with straight alpha, clipped to the destination.
/// Negative offsets crop the source.
fn blit_over(dst: &mut Raster, src: &RgbaImage, left: i64, top: i64) {
    let dst_w = i64::from(dst.width);
    let dst_h = i64::from(dst.height);
    for (sx, sy, px) in src.enumerate_pixels() {
        let dx = left + i64::from(sx);
        let dy = top + i64::from(sy);
        if dx < 0 || dy < 0 || dx >= dst_w || dy >= dst_h {
            continue;
        }
        let off = ((dy as usize) * (dst.width as usize) + dx as usize) * 4;
        let out = over_straight(
            [
                dst.data[off],
                dst.data[off + 1],
                dst.data[off + 2],
                dst.data[off + 3],
            ],
            px.0,
        );
        dst.data[off..off + 4].copy_from_slice(&out);
    }
}

fn over_straight(dst: [u8; 4], src: [u8; 4]) -> [u8; 4] {
    let a = u16::from(src[3]);
    if a == 255 {
        return src;
    }
    if a == 0 {
        return dst;
    }
    let inv = 255 - a;
    let mut out = [0u8; 4];
    for i in 0..3 {
        out[i] = ((u16::from(src[i]) * a + u16::from(dst[i]) * inv + 127) / 255) as u8;
    }
    out[3] = (a + (u16::from(dst[3]) * inv + 127) / 255).min(255) as u8;
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_validation_catches_bad_values() {
        assert!(ExportPlan::square(1200).validate().is_ok());
        assert!(
            ExportPlan {
                output_width: 0,
                ..ExportPlan::square(1200)
            }
            .validate()
            .is_err()
        );
        assert!(
            ExportPlan {
                output_width: 1201,
                ..ExportPlan::square(1200)
            }
            .validate()
            .is_err()
        );
        assert!(
            ExportPlan {
                receipt_width_ratio: 0.0,
                ..ExportPlan::square(1200)
            }
            .validate()
            .is_err()
        );
        assert!(
            ExportPlan {
                receipt_height_ratio: 1.5,
                ..ExportPlan::square(1200)
            }
            .validate()
            .is_err()
        );
    }

    #[test]
    fn output_is_fully_opaque_even_for_transparent_gif_input() {
        let gif = Raster::new_filled(10, 10, [0, 0, 0, 0]);
        let receipt = Raster::new_filled(4, 8, [20, 20, 20, 255]);
        let out = compose_scene(&gif, &receipt, &ExportPlan::square(64)).unwrap();
        assert!(out.data.chunks_exact(4).all(|px| px[3] == 255));
    }

    #[test]
    fn output_has_plan_dimensions_and_is_deterministic() {
        let gif = Raster::new_filled(33, 21, [10, 80, 160, 255]);
        let receipt = Raster::new_filled(5, 9, [240, 240, 240, 255]);
        let plan = ExportPlan::square(100);
        let a = compose_scene(&gif, &receipt, &plan).unwrap();
        let b = compose_scene(&gif, &receipt, &plan).unwrap();
        assert_eq!(a.width, 100);
        assert_eq!(a.height, 100);
        assert_eq!(a, b);
    }

    #[test]
    fn cover_fit_fills_corners_with_gif_color() {
        // Wide gif into a square output: vertical fit, horizontal crop. The
        // corners must carry gif pixels, not the white base.
        let gif = Raster::new_filled(40, 10, [0, 128, 0, 255]);
        let receipt = Raster::new_filled(2, 2, [9, 9, 9, 255]);
        let out = compose_scene(&gif, &receipt, &ExportPlan::square(64)).unwrap();
        for (x, y) in [(0, 0), (63, 0), (0, 63), (63, 63)] {
            let px = out.pixel(x, y);
            assert_eq!(px[1], 128, "corner ({x},{y}) not covered: {px:?}");
        }
    }

    #[test]
    fn receipt_lands_centered_on_top() {
        let gif = Raster::new_filled(16, 16, [0, 0, 0, 255]);
        let receipt = Raster::new_filled(10, 10, [255, 0, 0, 255]);
        let plan = ExportPlan {
            output_width: 100,
            output_height: 100,
            receipt_width_ratio: 0.5,
            receipt_height_ratio: 0.5,
        };
        let out = compose_scene(&gif, &receipt, &plan).unwrap();
        assert_eq!(out.pixel(50, 50), [255, 0, 0, 255]);
        // Outside the 50x50 centered box the background shows through.
        assert_eq!(out.pixel(5, 5)[0], 0);
    }
}
