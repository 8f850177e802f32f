//! Monochrome framebuffer.
use std::fmt::{self, Write};

use crate::constants::*;

/// Display resolution.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum DisplayMode {
    /// 64x32
    #[default]
    Standard,
    /// 128x64
    Extended,
}

impl DisplayMode {
    /// Width and height in pixels.
    pub fn size(&self) -> [usize; 2] {
        match self {
            Self::Standard => [DISPLAY_WIDTH, DISPLAY_HEIGHT],
            Self::Extended => [EXTENDED_DISPLAY_WIDTH, EXTENDED_DISPLAY_HEIGHT],
        }
    }
}

/// Grid of pixels, stored row-major.
///
/// Sprites that cross an edge wrap around to the opposite side, both
/// for the origin and for each individual pixel.
#[derive(Debug, Clone)]
pub struct Framebuffer {
    width: usize,
    height: usize,
    pixels: Box<[bool]>,
}

impl Framebuffer {
    pub fn new(mode: DisplayMode) -> Self {
        let [width, height] = mode.size();
        Self {
            width,
            height,
            pixels: vec![false; width * height].into_boxed_slice(),
        }
    }

    #[inline(always)]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline(always)]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Row-major pixel buffer, `width * height` long.
    #[inline(always)]
    pub fn pixels(&self) -> &[bool] {
        &self.pixels
    }

    /// State of the pixel at the given coordinate, wrapped into bounds.
    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> bool {
        self.pixels[self.index(x, y)]
    }

    pub fn clear(&mut self) {
        self.pixels.fill(false);
    }

    /// XOR a sprite onto the buffer, one byte per row, most significant bit leftmost.
    ///
    /// Returns `true` when any lit pixel was switched off.
    pub fn draw_sprite(&mut self, x: u8, y: u8, sprite: &[u8]) -> bool {
        let origin_x = x as usize % self.width;
        let origin_y = y as usize % self.height;
        let mut is_erased = false;

        for (r, &row) in sprite.iter().enumerate() {
            // Each row is 8 bits representing the 8 pixels of the sprite.
            for c in 0..SPRITE_WIDTH {
                let new_px = (row >> (7 - c)) & 1 != 0;
                if !new_px {
                    continue;
                }

                let d = self.index(origin_x + c, origin_y + r);
                let old_px = self.pixels[d];

                // XOR erases a pixel when both the old and new values are both 1.
                is_erased |= old_px;
                self.pixels[d] = !old_px;
            }
        }

        is_erased
    }

    #[inline(always)]
    fn index(&self, x: usize, y: usize) -> usize {
        (x % self.width) + (y % self.height) * self.width
    }

    /// Render the buffer as text, `#` for lit pixels and `.` for dark ones.
    pub fn dump(&self) -> Result<String, fmt::Error> {
        let mut buf = String::with_capacity((self.width + 1) * self.height);

        for row in self.pixels.chunks(self.width) {
            for px in row {
                buf.write_char(if *px { '#' } else { '.' })?;
            }
            writeln!(buf)?;
        }

        Ok(buf)
    }
}
