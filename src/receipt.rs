use crate::{
    error::{ReadreelError, ReadreelResult},
    raster::Raster,
};

/// Capture seam for the rendered receipt element.
///
/// The orchestrator captures exactly once per export; the raster it gets
/// back is fixed for the whole run and reused for every frame.
pub trait ReceiptSource {
    fn capture(&self) -> ReadreelResult<Raster>;
}

/// A receipt that was already rendered to an encoded image (PNG in
/// practice). Capture decodes it and flattens interior transparency over
/// white, so downstream treats the receipt as an opaque rectangle.
pub struct PngReceipt {
    bytes: Vec<u8>,
}

impl PngReceipt {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }
}

impl ReceiptSource for PngReceipt {
    fn capture(&self) -> ReadreelResult<Raster> {
        let img = image::load_from_memory(&self.bytes)
            .map_err(|e| ReadreelError::decode(format!("receipt image decode failed: {e}")))?;
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        if width == 0 || height == 0 {
            return Err(ReadreelError::decode("receipt image has zero size"));
        }

        let mut data = rgba.into_raw();
        flatten_over_white(&mut data);
        Raster::from_rgba8(width, height, data)
    }
}

fn flatten_over_white(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3] as u16;
        if a == 255 {
            continue;
        }
        let inv = 255 - a;
        for c in px.iter_mut().take(3) {
            let v = (u16::from(*c) * a + 255 * inv + 127) / 255;
            *c = v.min(255) as u8;
        }
        px[3] = 255;
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn png_bytes(rgba: [u8; 4]) -> Vec<u8> {
        let img = image::RgbaImage::from_raw(1, 1, rgba.to_vec()).unwrap();
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn capture_flattens_transparency_over_white() {
        let receipt = PngReceipt::new(png_bytes([0, 0, 0, 0]));
        let raster = receipt.capture().unwrap();
        assert_eq!(raster.pixel(0, 0), [255, 255, 255, 255]);
    }

    #[test]
    fn capture_half_alpha_blends_toward_white() {
        let receipt = PngReceipt::new(png_bytes([0, 0, 0, 128]));
        let raster = receipt.capture().unwrap();
        let px = raster.pixel(0, 0);
        assert_eq!(px[3], 255);
        assert!(px[0] > 120 && px[0] < 135, "got {px:?}");
    }

    #[test]
    fn capture_rejects_garbage_bytes() {
        let receipt = PngReceipt::new(b"nope".to_vec());
        assert!(matches!(
            receipt.capture(),
            Err(ReadreelError::Decode(_))
        ));
    }
}
