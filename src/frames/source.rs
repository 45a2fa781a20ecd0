use std::{io::Cursor, path::Path, sync::Arc, time::Duration};

use anyhow::Context as _;
use image::{
    AnimationDecoder, DynamicImage, ImageDecoder, ImageFormat, ImageReader, RgbaImage,
    codecs::gif::GifDecoder, metadata::Orientation,
};

use crate::foundation::{
    core::declared_delay,
    error::{GifGenError, GifGenResult},
};

/// Per-frame metadata read from the encoded source.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameMetadata {
    /// Delay declared by the container for this frame, if any.
    pub delay: Option<Duration>,
}

/// Read-only handle over encoded image data.
///
/// GIF data is scanned once at construction: frame count, declared delays and composited
/// frame pixels are captured. Every frame is held as a full RGBA buffer for the life of the
/// source, and [`FrameSource::decode`] hands out a copy of it. Every other format the `image`
/// crate reads is a single-frame still, decoded on demand with its embedded orientation applied.
///
/// The GIF decoder cannot skip a damaged frame, so the scan stops at the first one. Such a
/// source reports the frames read before the damage plus the damaged frame itself, which has no
/// delay and fails to decode. Later frames are not reachable.
#[derive(Clone)]
pub struct FrameSource {
    bytes: Arc<[u8]>,
    format: ImageFormat,
    layout: Layout,
}

#[derive(Clone)]
enum Layout {
    Still { width: u32, height: u32 },
    Animated(Arc<[ScannedFrame]>),
}

#[derive(Clone)]
struct ScannedFrame {
    delay: Option<Duration>,
    // `None` marks a frame that failed to decode; it still counts towards `frame_count`.
    pixels: Option<Arc<RgbaImage>>,
}

impl std::fmt::Debug for FrameSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameSource")
            .field("format", &self.format)
            .field("bytes_len", &self.bytes.len())
            .field("frame_count", &self.frame_count())
            .finish()
    }
}

impl FrameSource {
    /// Wrap encoded bytes, detecting the format from their signature.
    ///
    /// Fails when the bytes are not a recognizable image or the header cannot be read.
    pub fn from_bytes(bytes: impl Into<Arc<[u8]>>) -> GifGenResult<Self> {
        let bytes: Arc<[u8]> = bytes.into();
        let format = image::guess_format(&bytes).map_err(|e| {
            GifGenError::decode(format!(
                "unrecognized image data ({} bytes): {e}",
                bytes.len()
            ))
        })?;

        let layout = match format {
            ImageFormat::Gif => Layout::Animated(scan_gif(&bytes)?),
            _ => {
                let (width, height) = ImageReader::with_format(Cursor::new(&bytes[..]), format)
                    .into_dimensions()
                    .map_err(|e| GifGenError::decode(format!("read {format:?} header: {e}")))?;
                Layout::Still { width, height }
            }
        };

        Ok(Self {
            bytes,
            format,
            layout,
        })
    }

    /// Read a file and wrap its bytes.
    pub fn from_path(path: &Path) -> GifGenResult<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("read frame source '{}'", path.display()))?;
        Self::from_bytes(bytes)
    }

    /// Detected encoding of the underlying bytes.
    pub fn format(&self) -> ImageFormat {
        self.format
    }

    /// The encoded bytes this source was built from.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Whether the source came from an animated container.
    pub fn is_animated(&self) -> bool {
        matches!(self.layout, Layout::Animated(_))
    }

    /// Number of frames the source reports, including frames that fail to decode.
    pub fn frame_count(&self) -> usize {
        match &self.layout {
            Layout::Still { .. } => 1,
            Layout::Animated(frames) => frames.len(),
        }
    }

    /// Metadata for `index`, or `None` when out of range.
    pub fn metadata(&self, index: usize) -> Option<FrameMetadata> {
        match &self.layout {
            Layout::Still { .. } => (index == 0).then_some(FrameMetadata::default()),
            Layout::Animated(frames) => frames
                .get(index)
                .map(|frame| FrameMetadata { delay: frame.delay }),
        }
    }

    /// Decode the frame at `index` at its intrinsic resolution, orientation applied.
    pub fn decode(&self, index: usize) -> GifGenResult<DynamicImage> {
        match &self.layout {
            Layout::Still { width, height } => {
                if index != 0 {
                    return Err(out_of_range(index, 1));
                }
                let img = self.decode_still()?;
                tracing::trace!(width, height, "decoded still frame");
                Ok(img)
            }
            Layout::Animated(frames) => {
                let frame = frames
                    .get(index)
                    .ok_or_else(|| out_of_range(index, frames.len()))?;
                let pixels = frame
                    .pixels
                    .as_ref()
                    .ok_or_else(|| GifGenError::decode(format!("frame {index} is corrupt")))?;
                Ok(DynamicImage::ImageRgba8(RgbaImage::clone(pixels)))
            }
        }
    }

    fn decode_still(&self) -> GifGenResult<DynamicImage> {
        let mut decoder = ImageReader::with_format(Cursor::new(&self.bytes[..]), self.format)
            .into_decoder()
            .map_err(|e| GifGenError::decode(format!("open {:?} decoder: {e}", self.format)))?;
        let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);
        let mut img = DynamicImage::from_decoder(decoder)
            .map_err(|e| GifGenError::decode(format!("decode {:?} pixels: {e}", self.format)))?;
        img.apply_orientation(orientation);
        Ok(img)
    }
}

fn out_of_range(index: usize, count: usize) -> GifGenError {
    GifGenError::decode(format!(
        "frame index {index} out of range (source has {count} frames)"
    ))
}

// Composites every frame up front; memory grows with width * height * frames.
fn scan_gif(bytes: &[u8]) -> GifGenResult<Arc<[ScannedFrame]>> {
    let decoder = GifDecoder::new(Cursor::new(bytes))
        .map_err(|e| GifGenError::decode(format!("read gif header: {e}")))?;

    let mut frames = Vec::new();
    for (index, frame) in decoder.into_frames().enumerate() {
        match frame {
            Ok(frame) => frames.push(ScannedFrame {
                delay: declared_delay(frame.delay()),
                pixels: Some(Arc::new(frame.into_buffer())),
            }),
            Err(e) => {
                // The decoder cannot resynchronize after a bad frame.
                tracing::warn!(index, error = %e, "gif frame failed to decode; ending scan");
                frames.push(ScannedFrame {
                    delay: None,
                    pixels: None,
                });
                break;
            }
        }
    }

    tracing::debug!(frames = frames.len(), "scanned gif container");
    Ok(frames.into())
}

#[cfg(test)]
#[path = "../../tests/unit/frames/source.rs"]
mod tests;
