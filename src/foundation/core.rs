use std::{sync::Arc, time::Duration};

use image::codecs::gif::Repeat;

use crate::foundation::error::{GifGenError, GifGenResult};

/// Delay between two frames when neither the caller nor the container declares one.
pub const DEFAULT_FRAME_DELAY: Duration = Duration::from_millis(100);

/// Loop count written when the caller does not choose one. Zero loops forever.
pub const DEFAULT_LOOP_COUNT: u16 = 0;

/// Quality factor that disables the lossy recompression round trip.
pub const DEFAULT_COMPRESSION_QUALITY: f32 = 1.0;

/// Container-level timing: one delay for every frame plus a global loop count.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TimingSpec {
    /// Delay applied to every frame.
    pub delay: Duration,
    /// Number of loops; `0` means infinite.
    pub loop_count: u16,
}

impl Default for TimingSpec {
    fn default() -> Self {
        Self {
            delay: DEFAULT_FRAME_DELAY,
            loop_count: DEFAULT_LOOP_COUNT,
        }
    }
}

impl TimingSpec {
    /// Build a timing spec from a millisecond delay and a loop count.
    pub fn from_millis(delay_ms: u64, loop_count: u16) -> Self {
        Self {
            delay: Duration::from_millis(delay_ms),
            loop_count,
        }
    }

    /// Reject a zero delay. Encoders treat it as "no delay", which callers must avoid.
    pub fn validate(&self) -> GifGenResult<()> {
        if self.delay.is_zero() {
            return Err(GifGenError::validation("frame delay must be > 0"));
        }
        Ok(())
    }

    /// The NETSCAPE loop setting written into the container.
    pub fn repeat(&self) -> Repeat {
        match self.loop_count {
            0 => Repeat::Infinite,
            n => Repeat::Finite(n),
        }
    }

    /// The delay as the container stores it: rounded to the nearest centisecond, at least one.
    ///
    /// GIF delays are whole centiseconds in a `u16`, so anything else is quantized. Longer
    /// delays saturate at 655.35 s.
    pub fn stored_delay(&self) -> Duration {
        let centis = (self.delay.as_micros() + 5_000) / 10_000;
        let centis = centis.clamp(1, u128::from(u16::MAX)) as u64;
        Duration::from_millis(centis * 10)
    }

    /// The per-frame delay in the encoder's rational form, already quantized so the encoder
    /// writes [`TimingSpec::stored_delay`] exactly.
    pub fn frame_delay(&self) -> image::Delay {
        let ms = self.stored_delay().as_millis() as u32;
        image::Delay::from_numer_denom_ms(ms, 1)
    }
}

/// Convert an `image` frame delay into a [`Duration`], treating zero as undeclared.
pub fn declared_delay(delay: image::Delay) -> Option<Duration> {
    let (numer, denom) = delay.numer_denom_ms();
    if numer == 0 || denom == 0 {
        return None;
    }
    Some(Duration::from_millis(u64::from(numer)) / denom)
}

/// Per-frame CPU work scheduling.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Threading {
    /// Resample frames on a rayon pool. Output order is unaffected.
    pub parallel: bool,
    /// Pool size; `None` lets rayon pick.
    pub threads: Option<usize>,
}

impl Threading {
    /// Validate `threads` when set.
    pub fn validate(&self) -> GifGenResult<()> {
        if let Some(n) = self.threads
            && n == 0
        {
            return Err(GifGenError::validation(
                "threading 'threads' must be >= 1 when set",
            ));
        }
        Ok(())
    }
}

/// Worker pool for per-frame work, built once from a [`Threading`] and shared by clones.
///
/// A sequential pool runs everything on the calling thread.
#[derive(Clone, Default)]
pub struct FramePool {
    pool: Option<Arc<rayon::ThreadPool>>,
}

impl std::fmt::Debug for FramePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FramePool")
            .field("threads", &self.pool.as_ref().map(|p| p.current_num_threads()))
            .finish()
    }
}

impl FramePool {
    /// Build the pool `threading` asks for; no threads are spawned when it is sequential.
    pub fn new(threading: &Threading) -> GifGenResult<Self> {
        threading.validate()?;
        if !threading.parallel {
            return Ok(Self::default());
        }
        Ok(Self {
            pool: Some(Arc::new(build_thread_pool(threading.threads)?)),
        })
    }

    /// Whether work is spread over worker threads.
    pub fn is_parallel(&self) -> bool {
        self.pool.is_some()
    }

    /// Map `f` over `0..count`, returning results in index order.
    pub(crate) fn map_indexed<T, F>(&self, count: usize, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(usize) -> T + Sync + Send,
    {
        match &self.pool {
            Some(pool) if count > 1 => {
                use rayon::prelude::*;
                pool.install(|| (0..count).into_par_iter().map(&f).collect())
            }
            _ => (0..count).map(f).collect(),
        }
    }
}

fn build_thread_pool(threads: Option<usize>) -> GifGenResult<rayon::ThreadPool> {
    let mut builder = rayon::ThreadPoolBuilder::new().thread_name(|i| format!("gifgen-frame-{i}"));
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| GifGenError::validation(format!("failed to build rayon thread pool: {e}")))
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
