use image::{imageops, Rgba, RgbaImage};
use crate::font::{glyph, GLYPH_HEIGHT};
use crate::present::{DisplayColor, DisplayFrame, DisplayRenderer, CHAR_PITCH};
use crate::types::Rgb;

/// Number of LED columns on the matrix.
pub const MATRIX_WIDTH: u32 = 15;

/// Number of LED rows on the matrix.
pub const MATRIX_HEIGHT: u32 = 7;

/// Total number of LEDs on the strip.
pub const NUM_LEDS: usize = (MATRIX_WIDTH * MATRIX_HEIGHT) as usize;

const BLACK: Rgb = (0, 0, 0);

/// Index of the LED at column `x`, row `y` along the strip. The strip runs column by column,
/// top to bottom within each column.
pub const fn strip_index(x: u32, y: u32) -> usize {
    (x * MATRIX_HEIGHT + y) as usize
}

/// Scale a color channel by a 0-255 brightness, full brightness leaving it unchanged.
fn scale8(value: u8, brightness: u8) -> u8 {
    ((u16::from(value) * (u16::from(brightness) + 1)) >> 8) as u8
}

/// An emulated 15x7 addressable LED matrix that draws scrolling text.
#[derive(Debug, Clone)]
pub struct LedMatrix {
    /// LED colors in strip order, at full brightness.
    leds: [Rgb; NUM_LEDS],

    /// Global brightness applied on output.
    brightness: u8,
}

impl LedMatrix {
    pub fn new(brightness: u8) -> Self {
        Self {
            leds: [BLACK; NUM_LEDS],
            brightness,
        }
    }

    pub fn brightness(&self) -> u8 {
        self.brightness
    }

    pub fn set_brightness(&mut self, brightness: u8) {
        self.brightness = brightness;
    }

    /// The LED colors in strip order, with brightness applied, as they would be sent down the
    /// data line.
    pub fn output(&self) -> impl Iterator<Item = Rgb> + '_ {
        self.leds
            .iter()
            .map(|&(r, g, b)| (scale8(r, self.brightness), scale8(g, self.brightness), scale8(b, self.brightness)))
    }

    pub fn clear(&mut self) {
        self.leds = [BLACK; NUM_LEDS];
    }

    /// Draw a character with its left edge at column `x_offset`. Anything off the grid is
    /// clipped; non-printable characters draw nothing.
    pub fn draw_char(&mut self, c: char, x_offset: i32, color: Rgb) {
        let Some(bitmap) = glyph(c) else {
            return;
        };

        for (dx, column) in bitmap.iter().enumerate() {
            let x = x_offset + dx as i32;
            if x < 0 || x >= MATRIX_WIDTH as i32 {
                continue;
            }
            for y in 0..GLYPH_HEIGHT as u32 {
                if column & (1 << y) != 0 {
                    self.leds[strip_index(x as u32, y)] = color;
                }
            }
        }
    }

    /// Clear the matrix and draw `text` scrolled left by `offset` pixels.
    pub fn draw_text(&mut self, text: &str, offset: u32, color: DisplayColor) {
        self.clear();
        let offset = i32::try_from(offset).unwrap_or(i32::MAX);
        let rgb = color.rgb();
        for (i, c) in text.chars().enumerate() {
            let x = (i as i32).saturating_mul(CHAR_PITCH as i32).saturating_sub(offset);
            self.draw_char(c, x, rgb);
        }
    }

    /// The matrix as an image, one pixel per LED, brightness applied.
    pub fn to_image(&self) -> RgbaImage {
        let mut image = RgbaImage::new(MATRIX_WIDTH, MATRIX_HEIGHT);
        for (idx, (r, g, b)) in self.output().enumerate() {
            let x = idx as u32 / MATRIX_HEIGHT;
            let y = idx as u32 % MATRIX_HEIGHT;
            image.put_pixel(x, y, Rgba([r, g, b, 0xFF]));
        }
        image
    }

    /// Draw the matrix into an RGBA frame buffer of `MATRIX_WIDTH * scale` by
    /// `MATRIX_HEIGHT * scale` pixels. Each LED becomes a `scale`-sized square with a dark gutter
    /// so the individual LEDs stay visible.
    pub fn blit(&self, frame: &mut [u8], scale: u32) {
        let scaled = imageops::resize(
            &self.to_image(),
            MATRIX_WIDTH * scale,
            MATRIX_HEIGHT * scale,
            imageops::FilterType::Nearest,
        );

        let gutter = scale / 8;
        for (pixel, (x, y, src)) in frame.chunks_exact_mut(4).zip(scaled.enumerate_pixels()) {
            let in_gutter = x % scale < gutter || y % scale < gutter;
            if in_gutter {
                pixel.copy_from_slice(&[0x10, 0x10, 0x10, 0xFF]);
            } else {
                pixel.copy_from_slice(&src.0);
            }
        }
    }
}

impl DisplayRenderer for LedMatrix {
    fn show(&mut self, frame: &DisplayFrame) {
        self.draw_text(&frame.text, frame.offset, frame.color);
    }
}
