use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context as _;

use crate::foundation::{
    core::{DEFAULT_COMPRESSION_QUALITY, DEFAULT_FRAME_DELAY, DEFAULT_LOOP_COUNT, Threading, TimingSpec},
    error::{GifGenError, GifGenResult},
};

/// GIF encoder speed used when none is configured (1 = best quality, 30 = fastest).
pub const DEFAULT_ENCODER_SPEED: i32 = 10;

/// What the generator does with its completion handler when a download fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadFailurePolicy {
    /// Invoke the handler with no animation.
    #[default]
    Notify,
    /// Do not invoke the handler at all.
    Silent,
}

/// Construction-time defaults for a [`crate::Generator`].
///
/// Every `generate_*` call starts from [`GeneratorConfig::default_params`] and may override
/// individual fields per request.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeneratorConfig {
    /// Inter-frame delay in milliseconds, used when the source does not declare one.
    pub frame_delay_ms: u64,
    /// Loop count written into assembled containers; `0` loops forever.
    pub loop_count: u16,
    /// JPEG quality factor in `(0, 1]` applied per frame when reconstructing; `1` disables it.
    pub compression_quality: f32,
    /// Maximum width/height of each frame in pixels; `None` keeps the source resolution.
    pub frame_max_pixel_size: Option<u32>,
    /// Directory for temporary containers; `None` uses the system temp directory.
    pub container_dir: Option<PathBuf>,
    /// GIF encoder speed in `1..=30`.
    pub encoder_speed: i32,
    /// Per-frame scheduling.
    pub threading: Threading,
    /// Completion handler behavior when a download fails.
    pub download_failure: DownloadFailurePolicy,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            frame_delay_ms: DEFAULT_FRAME_DELAY.as_millis() as u64,
            loop_count: DEFAULT_LOOP_COUNT,
            compression_quality: DEFAULT_COMPRESSION_QUALITY,
            frame_max_pixel_size: None,
            container_dir: None,
            encoder_speed: DEFAULT_ENCODER_SPEED,
            threading: Threading::default(),
            download_failure: DownloadFailurePolicy::default(),
        }
    }
}

impl GeneratorConfig {
    /// Read and validate a JSON config file.
    pub fn from_json_file(path: &Path) -> GifGenResult<Self> {
        let f = File::open(path).with_context(|| format!("open config '{}'", path.display()))?;
        let cfg: Self = serde_json::from_reader(BufReader::new(f))
            .with_context(|| format!("parse config JSON '{}'", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check every field against its documented range.
    pub fn validate(&self) -> GifGenResult<()> {
        if self.frame_delay_ms == 0 {
            return Err(GifGenError::validation("frame_delay_ms must be > 0"));
        }
        validate_quality(self.compression_quality)?;
        validate_max_pixel_size(self.frame_max_pixel_size)?;
        if !(1..=30).contains(&self.encoder_speed) {
            return Err(GifGenError::validation(format!(
                "encoder_speed must be in 1..=30, got {}",
                self.encoder_speed
            )));
        }
        self.threading.validate()
    }

    /// Container-level timing derived from the configured defaults.
    pub fn timing(&self) -> TimingSpec {
        TimingSpec {
            delay: Duration::from_millis(self.frame_delay_ms),
            loop_count: self.loop_count,
        }
    }

    /// Directory that receives temporary containers.
    pub fn container_dir(&self) -> PathBuf {
        self.container_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }
}

pub(crate) fn validate_quality(quality: f32) -> GifGenResult<()> {
    if !(quality > 0.0 && quality <= 1.0) {
        return Err(GifGenError::validation(format!(
            "compression quality must be in (0, 1], got {quality}"
        )));
    }
    Ok(())
}

pub(crate) fn validate_max_pixel_size(max_pixel_size: Option<u32>) -> GifGenResult<()> {
    if max_pixel_size == Some(0) {
        return Err(GifGenError::validation(
            "frame max pixel size must be >= 1 when set",
        ));
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/config.rs"]
mod tests;
