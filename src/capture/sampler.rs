//! Geometry sampling: rasterize one element into a bounded JPEG still.
//!
//! The sampler grabs the element's current pixels through the surface,
//! scales the longest side down to a configured bound, drops the alpha
//! channel, and encodes JPEG at the effective quality. Payload size is
//! what the classification round trip mostly pays for, so the bound and
//! quality are the two knobs rate policy tunes.

use std::time::Instant;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{ImageBuffer, RgbImage, RgbaImage};
use thiserror::Error;

use super::{Priority, Sample, SampleImage};
use crate::surface::{ElementId, ElementKind, PageSurface, SurfaceError};

/// Errors raised while grabbing or encoding a sample.
#[derive(Debug, Error)]
pub enum SampleError {
    #[error(transparent)]
    Surface(#[from] SurfaceError),
    #[error("surface returned an invalid pixel buffer for {0}")]
    InvalidBuffer(ElementId),
    #[error("jpeg encoding failed: {0}")]
    Encode(String),
}

impl SampleError {
    /// True for failures expected to clear on their own.
    pub fn is_transient(&self) -> bool {
        match self {
            SampleError::Surface(e) => e.is_transient(),
            SampleError::InvalidBuffer(_) | SampleError::Encode(_) => false,
        }
    }
}

/// Stateless rasterization plus a sequence counter.
#[derive(Debug)]
pub struct GeometrySampler {
    max_dimension: u32,
    quality: u8,
    sequence: u64,
}

impl GeometrySampler {
    /// Creates a sampler bounding stills to `max_dimension` on the longest
    /// side and encoding at `quality` (1-100).
    pub fn new(max_dimension: u32, quality: u8) -> Self {
        Self {
            max_dimension,
            quality,
            sequence: 0,
        }
    }

    /// Applies a new encode quality (settings update).
    pub fn set_quality(&mut self, quality: u8) {
        self.quality = quality;
    }

    /// Current encode quality.
    #[inline]
    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Samples taken so far.
    #[inline]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Grabs, bounds, and encodes one still for `element`.
    pub fn sample<S: PageSurface>(
        &mut self,
        surface: &S,
        element: ElementId,
        kind: ElementKind,
        priority: Priority,
        now: Instant,
    ) -> Result<Sample, SampleError> {
        let pixels = surface.snapshot_pixels(element)?;
        if !pixels.is_valid() {
            return Err(SampleError::InvalidBuffer(element));
        }

        let rgba: RgbaImage =
            ImageBuffer::from_raw(pixels.width, pixels.height, pixels.data)
                .ok_or(SampleError::InvalidBuffer(element))?;

        let longest = pixels.width.max(pixels.height);
        let rgba = if longest > self.max_dimension {
            let scale = self.max_dimension as f64 / longest as f64;
            let width = ((pixels.width as f64 * scale).round() as u32).max(1);
            let height = ((pixels.height as f64 * scale).round() as u32).max(1);
            image::imageops::resize(&rgba, width, height, FilterType::Triangle)
        } else {
            rgba
        };

        // JPEG carries no alpha channel.
        let (width, height) = rgba.dimensions();
        let mut rgb_bytes = Vec::with_capacity((width * height * 3) as usize);
        for pixel in rgba.pixels() {
            rgb_bytes.extend_from_slice(&pixel.0[..3]);
        }
        let rgb: RgbImage = ImageBuffer::from_raw(width, height, rgb_bytes)
            .ok_or(SampleError::InvalidBuffer(element))?;

        let mut jpeg = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut jpeg, self.quality);
        rgb.write_with_encoder(encoder)
            .map_err(|e| SampleError::Encode(e.to_string()))?;

        self.sequence += 1;
        Ok(Sample::new(
            self.sequence,
            element,
            kind,
            priority,
            SampleImage {
                jpeg,
                width,
                height,
            },
            now,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::{MockPage, RectPx};

    #[test]
    fn test_sample_bounds_longest_side() {
        let page = MockPage::new("example.com");
        let img = page.add_image(RectPx::new(0.0, 0.0, 320.0, 240.0), "u");
        page.set_natural_size(img, 1280, 800);

        let mut sampler = GeometrySampler::new(640, 70);
        let sample = sampler
            .sample(&page, img, ElementKind::Image, Priority::Normal, Instant::now())
            .unwrap();

        assert_eq!(sample.image().width, 640);
        assert_eq!(sample.image().height, 400);
        assert_eq!(sample.sequence(), 1);
    }

    #[test]
    fn test_small_elements_not_upscaled() {
        let page = MockPage::new("example.com");
        let img = page.add_image(RectPx::new(0.0, 0.0, 100.0, 60.0), "u");

        let mut sampler = GeometrySampler::new(640, 70);
        let sample = sampler
            .sample(&page, img, ElementKind::Image, Priority::Normal, Instant::now())
            .unwrap();

        assert_eq!(sample.image().width, 100);
        assert_eq!(sample.image().height, 60);
    }

    #[test]
    fn test_output_is_jpeg() {
        let page = MockPage::new("example.com");
        let img = page.add_image(RectPx::new(0.0, 0.0, 64.0, 64.0), "u");

        let mut sampler = GeometrySampler::new(640, 70);
        let sample = sampler
            .sample(&page, img, ElementKind::Image, Priority::Normal, Instant::now())
            .unwrap();

        let jpeg = &sample.image().jpeg;
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8], "missing JPEG SOI marker");
        assert_eq!(&jpeg[jpeg.len() - 2..], &[0xFF, 0xD9], "missing JPEG EOI marker");
    }

    #[test]
    fn test_failure_classification() {
        let page = MockPage::new("example.com");
        let img = page.add_image(RectPx::new(0.0, 0.0, 64.0, 64.0), "u");
        let mut sampler = GeometrySampler::new(640, 70);

        page.set_ready(img, false);
        let not_ready = sampler
            .sample(&page, img, ElementKind::Image, Priority::Normal, Instant::now())
            .unwrap_err();
        assert!(not_ready.is_transient());

        page.set_ready(img, true);
        page.set_tainted(img, true);
        let tainted = sampler
            .sample(&page, img, ElementKind::Image, Priority::Normal, Instant::now())
            .unwrap_err();
        assert!(!tainted.is_transient());
    }
}
