//! Frame buffers

use tha_core::{ThaError, ThaResult};

/// RGBA pixel, linear intensity, each component in [0, 1]
pub type Rgba = [f32; 4];

/// Rendered image with alpha, row-major
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    width: usize,
    height: usize,
    pixels: Vec<Rgba>,
}

impl Frame {
    /// Create a new fully transparent frame
    pub fn new(width: usize, height: usize) -> Self {
        Self::filled(width, height, [0.0; 4])
    }

    pub fn filled(width: usize, height: usize, rgba: Rgba) -> Self {
        Self {
            width,
            height,
            pixels: vec![rgba; width * height],
        }
    }

    /// Placeholder shown before the first successful render
    pub fn transparent(width: usize, height: usize) -> Self {
        Self::new(width, height)
    }

    pub fn from_pixels(width: usize, height: usize, pixels: Vec<Rgba>) -> ThaResult<Self> {
        if pixels.len() != width * height {
            return Err(ThaError::config(format!(
                "frame {width}x{height} needs {} pixels, got {}",
                width * height,
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    pub fn get(&self, x: usize, y: usize) -> Option<Rgba> {
        if x < self.width && y < self.height {
            Some(self.pixels[y * self.width + x])
        } else {
            None
        }
    }

    pub fn get_mut(&mut self, x: usize, y: usize) -> Option<&mut Rgba> {
        if x < self.width && y < self.height {
            Some(&mut self.pixels[y * self.width + x])
        } else {
            None
        }
    }

    /// Pixel at `(x, y)` with coordinates clamped to the frame edge
    #[inline]
    pub fn sample_clamped(&self, x: isize, y: isize) -> Rgba {
        if self.pixels.is_empty() {
            return [0.0; 4];
        }
        let x = x.clamp(0, self.width as isize - 1) as usize;
        let y = y.clamp(0, self.height as isize - 1) as usize;
        self.pixels[y * self.width + x]
    }

    pub fn pixels(&self) -> &[Rgba] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [Rgba] {
        &mut self.pixels
    }

    /// Mutable access to one row
    pub fn row_mut(&mut self, y: usize) -> &mut [Rgba] {
        let start = y * self.width;
        &mut self.pixels[start..start + self.width]
    }

    /// Apply the sRGB transfer curve to the color channels; alpha is linear
    pub fn linear_to_srgb(&mut self) {
        for px in &mut self.pixels {
            for c in &mut px[..3] {
                *c = linear_to_srgb(*c);
            }
        }
    }

    /// 8-bit RGBA bytes, row-major
    pub fn to_rgba8(&self) -> Vec<u8> {
        self.pixels
            .iter()
            .flat_map(|px| px.iter().map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8))
            .collect()
    }
}

/// sRGB transfer function for one linear component
#[inline]
pub fn linear_to_srgb(x: f32) -> f32 {
    let x = x.clamp(0.0, 1.0);
    if x <= 0.003_130_8 {
        12.92 * x
    } else {
        1.055 * x.powf(1.0 / 2.4) - 0.055
    }
}

/// Rec. 709 luminance of a linear RGB triple
#[inline]
pub fn luminance(px: &Rgba) -> f32 {
    0.2126 * px[0] + 0.7152 * px[1] + 0.0722 * px[2]
}
