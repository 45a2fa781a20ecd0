use std::{sync::Arc, time::Duration};

use crate::{
    foundation::{
        config::{validate_max_pixel_size, validate_quality},
        core::{DEFAULT_COMPRESSION_QUALITY, DEFAULT_FRAME_DELAY, FramePool, Threading},
        error::GifGenResult,
    },
    frames::{
        normalize::recompress,
        resample::{DecodedFrame, resample},
        source::FrameSource,
    },
};

/// An in-memory animation ready for display.
///
/// `duration()` is computed from the number of frames the source declared, so frames dropped
/// during reconstruction shorten the visible sequence but not the duration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlayableAnimation {
    frames: Vec<DecodedFrame>,
    frame_delay: Duration,
    declared_frames: usize,
}

impl PlayableAnimation {
    /// Assemble an animation from decoded frames.
    pub fn new(frames: Vec<DecodedFrame>, frame_delay: Duration, declared_frames: usize) -> Self {
        Self {
            frames,
            frame_delay,
            declared_frames,
        }
    }

    /// Visible frames in display order.
    pub fn frames(&self) -> &[DecodedFrame] {
        &self.frames
    }

    /// Take the visible frames.
    pub fn into_frames(self) -> Vec<DecodedFrame> {
        self.frames
    }

    /// Number of visible frames.
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Number of frames the source declared, including dropped ones.
    pub fn declared_frame_count(&self) -> usize {
        self.declared_frames
    }

    /// Delay attributed to every declared frame.
    pub fn frame_delay(&self) -> Duration {
        self.frame_delay
    }

    /// Total duration: declared frame count times frame delay.
    pub fn duration(&self) -> Duration {
        let n = u32::try_from(self.declared_frames).unwrap_or(u32::MAX);
        self.frame_delay.saturating_mul(n)
    }

    /// Whether no frame survived reconstruction.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Frame to display `elapsed` after playback started, looping forever.
    ///
    /// The total duration is spread evenly over the visible frames.
    pub fn frame_at(&self, elapsed: Duration) -> Option<&DecodedFrame> {
        let total = self.duration().as_nanos();
        if total == 0 {
            return self.frames.first();
        }
        let visible = self.frames.len() as u128;
        let pos = elapsed.as_nanos() % total;
        self.frames.get((pos * visible / total) as usize)
    }
}

/// Options for [`reconstruct`].
#[derive(Clone, Debug, PartialEq)]
pub struct ReconstructOpts {
    /// Bound for the longer side of every frame; `None` keeps the source resolution.
    pub max_pixel_size: Option<u32>,
    /// JPEG quality factor in `(0, 1]`; below `1` every frame takes a lossy round trip.
    pub compression_quality: f32,
    /// Delay used when frame 0 declares none.
    pub default_delay: Duration,
    /// Per-frame resampling schedule.
    pub threading: Threading,
}

impl Default for ReconstructOpts {
    fn default() -> Self {
        Self {
            max_pixel_size: None,
            compression_quality: DEFAULT_COMPRESSION_QUALITY,
            default_delay: DEFAULT_FRAME_DELAY,
            threading: Threading::default(),
        }
    }
}

/// The delay declared by frame 0, or `default_delay`.
///
/// Only frame 0 is consulted; every frame is assumed to share its delay.
pub fn resolve_delay(source: &FrameSource, default_delay: Duration) -> Duration {
    source
        .metadata(0)
        .and_then(|m| m.delay)
        .unwrap_or(default_delay)
}

/// Resample every frame of `source` into a [`PlayableAnimation`].
///
/// Frames that fail to resample are dropped. An empty result is still an animation. Builds a
/// worker pool from `opts.threading` for this call.
pub fn reconstruct(source: &FrameSource, opts: &ReconstructOpts) -> GifGenResult<PlayableAnimation> {
    let pool = FramePool::new(&opts.threading)?;
    reconstruct_with(source, opts, &pool)
}

/// [`reconstruct`] on an existing pool; `opts.threading` is ignored.
#[tracing::instrument(skip(source, opts, pool), fields(format = ?source.format(), frames = source.frame_count()))]
pub(crate) fn reconstruct_with(
    source: &FrameSource,
    opts: &ReconstructOpts,
    pool: &FramePool,
) -> GifGenResult<PlayableAnimation> {
    validate_quality(opts.compression_quality)?;
    validate_max_pixel_size(opts.max_pixel_size)?;

    let count = source.frame_count();
    let delay = resolve_delay(source, opts.default_delay);

    let frames = pool.map_indexed(count, |index| {
        let frame = resample(source, index, opts.max_pixel_size)?;
        Some(apply_quality(frame, opts.compression_quality, index))
    });
    let frames: Vec<DecodedFrame> = frames.into_iter().flatten().collect();

    if frames.len() < count {
        tracing::debug!(dropped = count - frames.len(), "frames dropped during reconstruction");
    }
    Ok(PlayableAnimation::new(frames, delay, count))
}

/// Build a frame source from `bytes` and reconstruct it.
///
/// Fails only when the bytes do not form a decodable source.
pub fn reconstruct_bytes(
    bytes: impl Into<Arc<[u8]>>,
    opts: &ReconstructOpts,
) -> GifGenResult<PlayableAnimation> {
    let pool = FramePool::new(&opts.threading)?;
    reconstruct_bytes_with(bytes, opts, &pool)
}

pub(crate) fn reconstruct_bytes_with(
    bytes: impl Into<Arc<[u8]>>,
    opts: &ReconstructOpts,
    pool: &FramePool,
) -> GifGenResult<PlayableAnimation> {
    let source = FrameSource::from_bytes(bytes)
        .inspect_err(|e| tracing::error!(error = %e, "failed to create frame source"))?;
    reconstruct_with(&source, opts, pool)
}

fn apply_quality(frame: DecodedFrame, quality: f32, index: usize) -> DecodedFrame {
    if quality >= 1.0 {
        return frame;
    }
    match recompress(&frame, quality) {
        Ok(compressed) => compressed,
        Err(e) => {
            tracing::warn!(index, error = %e, "recompression failed; keeping frame as decoded");
            frame
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/animation/reconstruct.rs"]
mod tests;
