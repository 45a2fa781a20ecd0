use image::{DynamicImage, RgbaImage, imageops, imageops::FilterType};

use crate::frames::source::FrameSource;

/// A decoded, size-bounded RGBA8 frame.
#[derive(Clone, PartialEq, Eq)]
pub struct DecodedFrame {
    image: RgbaImage,
}

impl std::fmt::Debug for DecodedFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodedFrame")
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}

impl DecodedFrame {
    /// Wrap an RGBA8 buffer.
    pub fn new(image: RgbaImage) -> Self {
        Self { image }
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// `(width, height)` in pixels.
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Borrow the pixel buffer.
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Take the pixel buffer.
    pub fn into_image(self) -> RgbaImage {
        self.image
    }
}

/// Decode frame `index` of `source` and bound its longer side by `max_pixel_size`.
///
/// Returns `None` when the frame cannot be decoded or `index` is out of range; callers skip
/// the frame. Never upscales. Performs no IO.
pub fn resample(
    source: &FrameSource,
    index: usize,
    max_pixel_size: Option<u32>,
) -> Option<DecodedFrame> {
    match source.decode(index) {
        Ok(img) => Some(resample_image(img, max_pixel_size)),
        Err(e) => {
            tracing::warn!(index, error = %e, "frame could not be resampled");
            None
        }
    }
}

/// Bound an already decoded image by `max_pixel_size`, preserving aspect ratio.
pub fn resample_image(img: DynamicImage, max_pixel_size: Option<u32>) -> DecodedFrame {
    let (width, height) = (img.width(), img.height());
    let Some(max) = max_pixel_size else {
        return DecodedFrame::new(img.into_rgba8());
    };

    let (w, h) = fit_within(width, height, max);
    if (w, h) == (width, height) {
        return DecodedFrame::new(img.into_rgba8());
    }
    DecodedFrame::new(img.resize_exact(w, h, FilterType::Triangle).into_rgba8())
}

/// Target dimensions whose longer side is at most `max`, aspect ratio preserved.
///
/// Images already within bounds are returned unchanged; the shorter side never drops below 1.
pub fn fit_within(width: u32, height: u32, max: u32) -> (u32, u32) {
    let max = max.max(1);
    let longest = width.max(height);
    if longest <= max {
        return (width, height);
    }

    let scale = f64::from(max) / f64::from(longest);
    let scaled = |v: u32| ((f64::from(v) * scale).round() as u32).clamp(1, max);
    (scaled(width), scaled(height))
}

/// Place `frame` on a transparent `width`×`height` canvas.
///
/// Frames larger than the canvas are scaled down to fit, aspect ratio preserved; smaller ones
/// keep their size. Either way the frame is centered. A frame that already matches is returned
/// untouched.
pub fn fit_onto_canvas(frame: DecodedFrame, width: u32, height: u32) -> DecodedFrame {
    if frame.dimensions() == (width, height) {
        return frame;
    }

    let (fw, fh) = frame.dimensions();
    let scale = (f64::from(width) / f64::from(fw))
        .min(f64::from(height) / f64::from(fh))
        .min(1.0);
    let scaled = |v: u32, bound: u32| ((f64::from(v) * scale).round() as u32).clamp(1, bound);
    let (w, h) = (scaled(fw, width), scaled(fh, height));

    let image = if (w, h) == (fw, fh) {
        frame.into_image()
    } else {
        imageops::resize(frame.image(), w, h, FilterType::Triangle)
    };

    let mut canvas = RgbaImage::new(width, height);
    let x = i64::from((width - w) / 2);
    let y = i64::from((height - h) / 2);
    imageops::overlay(&mut canvas, &image, x, y);
    DecodedFrame::new(canvas)
}

#[cfg(test)]
#[path = "../../tests/unit/frames/resample.rs"]
mod tests;
