//! gifgen builds animated GIFs from frames and turns GIFs back into playable frame sequences.
//!
//! # Pipeline overview
//!
//! 1. **Normalize**: bytes, sources or decoded images become an ordered list of [`FrameSource`]s
//! 2. **Resample**: every frame is decoded to RGBA8, bounded by an optional max pixel size
//! 3. **Assemble**: frame lists are written into a GIF container ([`assemble`])
//! 4. **Reconstruct**: a container is read back into a [`PlayableAnimation`] ([`reconstruct`])
//!
//! [`Generator`] drives the pipeline per request, reading local files directly and handing
//! remote URLs to a [`Downloader`]. Results arrive through a completion handler.
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod acquire;
mod animation;
mod encode;
mod foundation;
mod frames;

pub use acquire::download::{DownloadEvent, DownloadTicket, Downloader, OfflineDownloader};
pub use acquire::generator::{GenerateParams, Generated, Generator, RequestId};
pub use acquire::source::SourceRef;
pub use animation::reconstruct::{
    PlayableAnimation, ReconstructOpts, reconstruct, reconstruct_bytes, resolve_delay,
};
pub use encode::container::{AssembleOpts, ContainerFile, assemble};
pub use encode::files::{ContentType, create_file};
pub use foundation::config::{DEFAULT_ENCODER_SPEED, DownloadFailurePolicy, GeneratorConfig};
pub use foundation::core::{
    DEFAULT_COMPRESSION_QUALITY, DEFAULT_FRAME_DELAY, DEFAULT_LOOP_COUNT, FramePool, Threading,
    TimingSpec, declared_delay,
};
pub use foundation::error::{GifGenError, GifGenResult};
pub use frames::normalize::{FrameInput, jpeg_quality, normalize, recompress, source_from_image};
pub use frames::resample::{DecodedFrame, fit_onto_canvas, fit_within, resample, resample_image};
pub use frames::source::{FrameMetadata, FrameSource};
