use std::io::Cursor;

use image::{DynamicImage, ImageFormat, codecs::jpeg::JpegEncoder};

use crate::{
    foundation::error::{GifGenError, GifGenResult},
    frames::{resample::DecodedFrame, source::FrameSource},
};

/// The input shapes accepted by the pipeline.
#[derive(Clone, Debug)]
pub enum FrameInput {
    /// Encoded bytes of a single (possibly animated) image.
    Bytes(Vec<u8>),
    /// An already constructed, possibly multi-frame source.
    Source(FrameSource),
    /// Independent frames, one source each, in display order.
    Sources(Vec<FrameSource>),
    /// Independent decoded frames in display order.
    Images(Vec<DynamicImage>),
}

impl FrameInput {
    /// Whether the input is a list of independent frames that must be assembled into a
    /// container first, as opposed to a single source that already holds its frames.
    pub fn is_frame_list(&self) -> bool {
        matches!(self, Self::Sources(_) | Self::Images(_))
    }
}

/// Reduce any [`FrameInput`] to an ordered list of frame sources.
///
/// Order is preserved exactly. Undecodable bytes fail the whole input; a decoded image that
/// cannot be re-encoded is skipped with a warning.
pub fn normalize(input: FrameInput) -> GifGenResult<Vec<FrameSource>> {
    match input {
        FrameInput::Bytes(bytes) => Ok(vec![FrameSource::from_bytes(bytes)?]),
        FrameInput::Source(source) => Ok(vec![source]),
        FrameInput::Sources(sources) => Ok(sources),
        FrameInput::Images(images) => {
            let mut out = Vec::with_capacity(images.len());
            for (index, image) in images.iter().enumerate() {
                match source_from_image(image) {
                    Ok(source) => out.push(source),
                    Err(e) => tracing::warn!(index, error = %e, "decoded image skipped"),
                }
            }
            Ok(out)
        }
    }
}

/// Re-encode a decoded image losslessly (PNG) and wrap it as a frame source.
pub fn source_from_image(image: &DynamicImage) -> GifGenResult<FrameSource> {
    let mut buf = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(|e| GifGenError::encode(format!("encode frame as png: {e}")))?;
    FrameSource::from_bytes(buf)
}

/// Lossy JPEG round trip at `quality` in `(0, 1]`.
///
/// JPEG carries no alpha channel, so the result is fully opaque.
pub fn recompress(frame: &DecodedFrame, quality: f32) -> GifGenResult<DecodedFrame> {
    let rgb = DynamicImage::ImageRgba8(frame.image().clone()).into_rgb8();

    let mut buf = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buf, jpeg_quality(quality));
    DynamicImage::ImageRgb8(rgb)
        .write_with_encoder(encoder)
        .map_err(|e| GifGenError::encode(format!("recompress frame as jpeg: {e}")))?;

    let decoded = image::load_from_memory_with_format(&buf, ImageFormat::Jpeg)
        .map_err(|e| GifGenError::decode(format!("decode recompressed frame: {e}")))?;
    Ok(DecodedFrame::new(decoded.into_rgba8()))
}

/// Map a quality factor in `(0, 1]` onto the JPEG encoder's `1..=100` scale.
pub fn jpeg_quality(quality: f32) -> u8 {
    if quality.is_nan() {
        return 100;
    }
    (quality * 100.0).round().clamp(1.0, 100.0) as u8
}

#[cfg(test)]
#[path = "../../tests/unit/frames/normalize.rs"]
mod tests;
