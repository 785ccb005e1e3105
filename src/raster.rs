use crate::error::{ReadreelError, ReadreelResult};

/// Straight-alpha RGBA8 pixel buffer, row-major.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Raster {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl Raster {
    pub fn new_filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let px = (width as usize) * (height as usize);
        let mut data = Vec::with_capacity(px * 4);
        for _ in 0..px {
            data.extend_from_slice(&rgba);
        }
        Self {
            width,
            height,
            data,
        }
    }

    pub fn from_rgba8(width: u32, height: u32, data: Vec<u8>) -> ReadreelResult<Self> {
        let expected = (width as usize) * (height as usize) * 4;
        if data.len() != expected {
            return Err(ReadreelError::validation(format!(
                "raster data size mismatch: got {} bytes, expected {expected} for {width}x{height}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let off = ((y as usize) * (self.width as usize) + x as usize) * 4;
        [
            self.data[off],
            self.data[off + 1],
            self.data[off + 2],
            self.data[off + 3],
        ]
    }

    /// Overwrite a rectangle with a solid color. The rect must be in bounds.
    pub fn fill_rect(&mut self, left: u32, top: u32, width: u32, height: u32, rgba: [u8; 4]) {
        for y in top..top + height {
            let row = (y as usize) * (self.width as usize);
            for x in left..left + width {
                let off = (row + x as usize) * 4;
                self.data[off..off + 4].copy_from_slice(&rgba);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_filled_has_expected_size_and_color() {
        let r = Raster::new_filled(3, 2, [1, 2, 3, 255]);
        assert_eq!(r.data.len(), 3 * 2 * 4);
        assert_eq!(r.pixel(2, 1), [1, 2, 3, 255]);
    }

    #[test]
    fn from_rgba8_rejects_bad_sizes() {
        assert!(Raster::from_rgba8(2, 2, vec![0u8; 15]).is_err());
        assert!(Raster::from_rgba8(2, 2, vec![0u8; 16]).is_ok());
    }

    #[test]
    fn fill_rect_only_touches_the_rect() {
        let mut r = Raster::new_filled(4, 4, [0, 0, 0, 255]);
        r.fill_rect(1, 1, 2, 2, [255, 255, 255, 255]);
        assert_eq!(r.pixel(0, 0), [0, 0, 0, 255]);
        assert_eq!(r.pixel(1, 1), [255, 255, 255, 255]);
        assert_eq!(r.pixel(2, 2), [255, 255, 255, 255]);
        assert_eq!(r.pixel(3, 3), [0, 0, 0, 255]);
    }
}
