//! RGBA image model for viewport captures
//!
//! Hosts hand captures over as raw RGBA8 buffers; composition happens here,
//! encoding stays with the engine (`save_png` on the host traits).

use crate::error::{Result, ScopeError};

const BYTES_PER_PIXEL: usize = 4;

/// An RGBA8 image with row-major pixel data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
}

impl Image {
    /// Create a transparent-black image
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            rgba: vec![0; width as usize * height as usize * BYTES_PER_PIXEL],
        }
    }

    /// Wrap an existing RGBA8 buffer; the length must match the dimensions
    pub fn from_rgba(width: u32, height: u32, rgba: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * BYTES_PER_PIXEL;
        if rgba.len() != expected {
            return Err(ScopeError::Protocol(format!(
                "image buffer is {} bytes, expected {} for {}x{}",
                rgba.len(),
                expected,
                width,
                height
            )));
        }
        Ok(Self {
            width,
            height,
            rgba,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn rgba(&self) -> &[u8] {
        &self.rgba
    }

    /// Copy `src` into this image with its top-left corner at (x, y).
    /// Pixels falling outside the destination are clipped.
    pub fn blit(&mut self, src: &Image, x: u32, y: u32) {
        let rows = src.height.min(self.height.saturating_sub(y));
        let cols = src.width.min(self.width.saturating_sub(x));
        for row in 0..rows as usize {
            let src_start = row * src.width as usize * BYTES_PER_PIXEL;
            let dst_start =
                ((y as usize + row) * self.width as usize + x as usize) * BYTES_PER_PIXEL;
            let len = cols as usize * BYTES_PER_PIXEL;
            self.rgba[dst_start..dst_start + len]
                .copy_from_slice(&src.rgba[src_start..src_start + len]);
        }
    }
}

/// Compose two captures side-by-side, left first, top-aligned
pub fn compose_side_by_side(left: &Image, right: &Image) -> Image {
    let width = left.width + right.width;
    let height = left.height.max(right.height);
    let mut combined = Image::new(width, height);
    combined.blit(left, 0, 0);
    combined.blit(right, left.width, 0);
    combined
}
