use std::{
    fs::OpenOptions,
    io::Write as _,
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use image::codecs::gif::GifEncoder;

use crate::{
    encode::files::{ContentType, create_file},
    foundation::{
        config::{DEFAULT_ENCODER_SPEED, GeneratorConfig, validate_max_pixel_size},
        core::{FramePool, Threading, TimingSpec},
        error::{GifGenError, GifGenResult},
    },
    frames::{
        resample::{DecodedFrame, fit_onto_canvas, resample},
        source::FrameSource,
    },
};

/// A GIF container written by [`assemble`].
///
/// The file is deleted when the handle is dropped unless [`ContainerFile::persist`] was called.
#[derive(Debug)]
pub struct ContainerFile {
    path: PathBuf,
    retained: bool,
}

impl ContainerFile {
    fn scoped(path: PathBuf) -> Self {
        Self {
            path,
            retained: false,
        }
    }

    /// Location of the container on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the whole container back into memory.
    pub fn read_bytes(&self) -> GifGenResult<Vec<u8>> {
        let bytes = std::fs::read(&self.path)
            .with_context(|| format!("read container '{}'", self.path.display()))?;
        Ok(bytes)
    }

    /// Keep the file on disk and return its path.
    pub fn persist(mut self) -> PathBuf {
        self.retained = true;
        std::mem::take(&mut self.path)
    }

    /// Move the container to `dest`, replacing any file already there, and keep it.
    ///
    /// `dest` should be on the same filesystem so the rename is atomic. On failure the
    /// container is still deleted on drop and `dest` is left as it was.
    pub fn persist_as(mut self, dest: &Path) -> GifGenResult<PathBuf> {
        std::fs::rename(&self.path, dest).with_context(|| {
            format!(
                "move container '{}' to '{}'",
                self.path.display(),
                dest.display()
            )
        })?;
        self.retained = true;
        Ok(dest.to_path_buf())
    }
}

impl Drop for ContainerFile {
    fn drop(&mut self) {
        if self.retained {
            return;
        }
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::debug!(path = %self.path.display(), error = %e, "failed to remove container");
        }
    }
}

/// Options for [`assemble`].
#[derive(Clone, Debug)]
pub struct AssembleOpts {
    /// Loop count and the delay written on every frame.
    pub timing: TimingSpec,
    /// Bound for the longer side of every frame; `None` keeps each source's resolution.
    pub max_pixel_size: Option<u32>,
    /// Directory that receives the container.
    pub directory: PathBuf,
    /// Container file name; `None` generates a unique one.
    pub file_name: Option<String>,
    /// GIF encoder speed in `1..=30`.
    pub encoder_speed: i32,
    /// Per-frame resampling schedule.
    pub threading: Threading,
}

impl Default for AssembleOpts {
    fn default() -> Self {
        Self {
            timing: TimingSpec::default(),
            max_pixel_size: None,
            directory: std::env::temp_dir(),
            file_name: None,
            encoder_speed: DEFAULT_ENCODER_SPEED,
            threading: Threading::default(),
        }
    }
}

impl AssembleOpts {
    /// Options matching a generator configuration.
    pub fn from_config(cfg: &GeneratorConfig) -> Self {
        Self {
            timing: cfg.timing(),
            max_pixel_size: cfg.frame_max_pixel_size,
            directory: cfg.container_dir(),
            file_name: None,
            encoder_speed: cfg.encoder_speed,
            threading: cfg.threading.clone(),
        }
    }
}

/// Encode frame 0 of every source, in order, into a new GIF container.
///
/// One loop count is written for the container and the same delay for every frame, quantized
/// as [`TimingSpec::stored_delay`] describes. The canvas takes the dimensions of the first
/// frame; later frames of another size are scaled down to fit if needed and centered on a
/// transparent background ([`fit_onto_canvas`]).
///
/// A frame that cannot be resampled or appended does not stop the remaining appends, but it
/// fails the final commit: the container is only reported (and kept) when every frame made it
/// in. An existing destination is never overwritten ([`GifGenError::Conflict`]).
///
/// Builds a worker pool from `opts.threading` for this call.
pub fn assemble(frames: &[FrameSource], opts: &AssembleOpts) -> GifGenResult<ContainerFile> {
    let pool = FramePool::new(&opts.threading)?;
    assemble_with(frames, opts, &pool)
}

/// [`assemble`] on an existing pool; `opts.threading` is ignored.
#[tracing::instrument(skip(frames, opts, pool), fields(frames = frames.len(), dir = %opts.directory.display()))]
pub(crate) fn assemble_with(
    frames: &[FrameSource],
    opts: &AssembleOpts,
    pool: &FramePool,
) -> GifGenResult<ContainerFile> {
    validate_max_pixel_size(opts.max_pixel_size)?;
    if !(1..=30).contains(&opts.encoder_speed) {
        return Err(GifGenError::validation(format!(
            "encoder speed must be in 1..=30, got {}",
            opts.encoder_speed
        )));
    }
    let stored = opts.timing.stored_delay();
    if stored != opts.timing.delay {
        tracing::warn!(
            requested = ?opts.timing.delay,
            stored = ?stored,
            "frame delay is not a whole number of centiseconds; quantized"
        );
    }

    let path = create_file(
        &opts.directory,
        opts.file_name.as_deref(),
        ContentType::Gif,
        None,
    )
    .inspect_err(|e| tracing::error!(error = %e, "failed to create container destination"))?;
    let container = ContainerFile::scoped(path);

    let resampled = pool.map_indexed(frames.len(), |index| {
        resample(&frames[index], 0, opts.max_pixel_size)
    });
    let encoded = encode_in_memory(resampled, &opts.timing, opts.encoder_speed)?;

    commit(&container, &encoded, frames.len())
        .inspect_err(|e| tracing::error!(path = %container.path().display(), error = %e, "failed to finalize container"))?;

    tracing::debug!(
        path = %container.path().display(),
        bytes = encoded.bytes.len(),
        "container finalized"
    );
    Ok(container)
}

struct EncodedContainer {
    bytes: Vec<u8>,
    appended: usize,
}

fn encode_in_memory(
    frames: Vec<Option<DecodedFrame>>,
    timing: &TimingSpec,
    speed: i32,
) -> GifGenResult<EncodedContainer> {
    let mut bytes = Vec::new();
    let mut appended = 0;
    {
        let mut encoder = GifEncoder::new_with_speed(&mut bytes, speed);
        encoder
            .set_repeat(timing.repeat())
            .map_err(|e| GifGenError::encode(format!("set loop count: {e}")))?;

        let delay = timing.frame_delay();
        let mut canvas = None;
        for (index, frame) in frames.into_iter().enumerate() {
            let Some(frame) = frame else {
                tracing::warn!(index, "frame not appended");
                continue;
            };
            let (width, height) = *canvas.get_or_insert(frame.dimensions());
            if frame.dimensions() != (width, height) {
                tracing::debug!(index, from = ?frame.dimensions(), to = ?(width, height), "fitting frame onto canvas");
            }
            let frame = fit_onto_canvas(frame, width, height);
            let frame = image::Frame::from_parts(frame.into_image(), 0, 0, delay);
            match encoder.encode_frame(frame) {
                Ok(()) => appended += 1,
                Err(e) => tracing::warn!(index, error = %e, "failed to append frame"),
            }
        }
        // Dropping the encoder writes the trailer.
    }
    Ok(EncodedContainer { bytes, appended })
}

fn commit(container: &ContainerFile, encoded: &EncodedContainer, expected: usize) -> GifGenResult<()> {
    if expected == 0 {
        return Err(GifGenError::encode(
            "cannot finalize a container without frames",
        ));
    }
    if encoded.appended != expected {
        return Err(GifGenError::encode(format!(
            "only {} of {expected} frames were appended",
            encoded.appended
        )));
    }

    let path = container.path();
    let mut f = OpenOptions::new()
        .write(true)
        .truncate(true)
        .open(path)
        .with_context(|| format!("open container '{}' for writing", path.display()))?;
    f.write_all(&encoded.bytes)
        .with_context(|| format!("write container '{}'", path.display()))?;
    f.sync_all()
        .with_context(|| format!("sync container '{}'", path.display()))?;
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/encode/container.rs"]
mod tests;
