use std::fmt;
use std::sync::Arc;

/// Pixel buffer for an SFImage value: width x height x components bytes.
/// The buffer is shared on clone and privatized on write (copy-on-write),
/// like the multi-value field buffers.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct SfImage {
    width: u32,
    height: u32,
    components: u32,
    pixels: Arc<Vec<u8>>,
}

impl SfImage {
    /// Build an image from a raw pixel buffer. The input is always copied;
    /// the caller keeps no aliasing with the stored buffer.
    pub fn new(width: u32, height: u32, components: u32, pixels: &[u8]) -> Self {
        Self {
            width,
            height,
            components,
            pixels: Arc::new(pixels.to_vec()),
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn components(&self) -> u32 {
        self.components
    }

    #[inline]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Overwrite one byte of the pixel buffer, privatizing it first if shared.
    pub fn set_byte(&mut self, index: usize, value: u8) {
        if index < self.pixels.len() {
            Arc::make_mut(&mut self.pixels)[index] = value;
        }
    }

    /// Replace the whole image.
    pub fn set(&mut self, width: u32, height: u32, components: u32, pixels: &[u8]) {
        self.width = width;
        self.height = height;
        self.components = components;
        self.pixels = Arc::new(pixels.to_vec());
    }
}

impl fmt::Display for SfImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.width, self.height, self.components)?;
        let bpp = self.components.max(1) as usize;
        for pixel in self.pixels.chunks(bpp) {
            let mut word: u32 = 0;
            for &byte in pixel {
                word = (word << 8) | byte as u32;
            }
            write!(f, " 0x{:x}", word)?;
        }
        Ok(())
    }
}
