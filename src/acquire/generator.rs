use std::{
    fmt,
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    thread,
    time::Duration,
};

use crossbeam_channel::{Receiver, unbounded};
use image::DynamicImage;

use crate::{
    acquire::{
        download::{DownloadEvent, DownloadTicket, Downloader, OfflineDownloader},
        source::SourceRef,
    },
    animation::reconstruct::{
        PlayableAnimation, ReconstructOpts, reconstruct_bytes_with, reconstruct_with,
    },
    encode::container::{AssembleOpts, assemble_with},
    foundation::{
        config::{
            DownloadFailurePolicy, GeneratorConfig, validate_max_pixel_size, validate_quality,
        },
        core::{
            DEFAULT_COMPRESSION_QUALITY, DEFAULT_FRAME_DELAY, DEFAULT_LOOP_COUNT, FramePool,
            TimingSpec,
        },
        error::{GifGenError, GifGenResult},
    },
    frames::{
        normalize::{FrameInput, normalize},
        source::FrameSource,
    },
};

/// Identifies one `generate_*` call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Per-request generation parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GenerateParams {
    /// Bound for the longer side of every frame; `None` keeps the source resolution.
    pub frame_max_pixel_size: Option<u32>,
    /// JPEG quality factor in `(0, 1]`; `1` disables recompression.
    pub compression_quality: f32,
    /// Delay used when the source declares none, and written when assembling frame lists.
    pub frame_delay: Duration,
    /// Loop count written when assembling frame lists; `0` loops forever.
    pub loop_count: u16,
}

impl Default for GenerateParams {
    fn default() -> Self {
        Self {
            frame_max_pixel_size: None,
            compression_quality: DEFAULT_COMPRESSION_QUALITY,
            frame_delay: DEFAULT_FRAME_DELAY,
            loop_count: DEFAULT_LOOP_COUNT,
        }
    }
}

impl GenerateParams {
    /// Reject out-of-range quality, a zero max size or a zero delay.
    pub fn validate(&self) -> GifGenResult<()> {
        validate_quality(self.compression_quality)?;
        validate_max_pixel_size(self.frame_max_pixel_size)?;
        self.timing().validate()
    }

    fn timing(&self) -> TimingSpec {
        TimingSpec {
            delay: self.frame_delay,
            loop_count: self.loop_count,
        }
    }
}

/// What the completion handler receives for a request.
#[derive(Clone, Debug, PartialEq)]
pub struct Generated {
    /// The request this result belongs to.
    pub request: RequestId,
    /// The animation, or `None` when generation failed. Details are logged.
    pub animation: Option<PlayableAnimation>,
}

/// Lifecycle of a single request, traced at debug level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum AcquisitionPhase {
    /// Accepted, nothing done yet.
    Idle,
    /// Reading a local file on the caller's thread.
    AwaitingLocalRead,
    /// Waiting on the [`Downloader`].
    AwaitingDownload,
    /// Finished with an animation.
    Completed,
    /// Finished without one.
    Failed,
}

#[derive(Clone, Copy, Debug)]
struct Acquisition {
    request: RequestId,
    phase: AcquisitionPhase,
}

impl Acquisition {
    fn new(request: RequestId) -> Self {
        Self {
            request,
            phase: AcquisitionPhase::Idle,
        }
    }

    fn enter(self, phase: AcquisitionPhase) -> Self {
        tracing::debug!(request = %self.request, from = ?self.phase, to = ?phase, "acquisition phase");
        Self { phase, ..self }
    }
}

type CompletionHandler = Box<dyn Fn(Generated) + Send + Sync>;

struct Inner {
    config: GeneratorConfig,
    downloader: Arc<dyn Downloader>,
    on_complete: CompletionHandler,
    next_request: AtomicU64,
    pool: FramePool,
}

/// Turns URLs, bytes, sources and decoded images into [`PlayableAnimation`]s.
///
/// Every `generate_*` call returns a [`RequestId`] and reports its outcome through the
/// completion handler given at construction, at most once per request. Inputs that need no
/// download complete on the caller's thread before the call returns; downloads complete on a
/// per-request waiter thread. The handler can therefore run on any thread, and marshalling
/// results elsewhere is up to the caller.
///
/// Cloning is cheap and clones share the handler, downloader, frame worker pool and request
/// counter.
#[derive(Clone)]
pub struct Generator {
    inner: Arc<Inner>,
}

impl fmt::Debug for Generator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Generator")
            .field("config", &self.inner.config)
            .field("next_request", &self.inner.next_request.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl Generator {
    /// A generator without network access: remote URLs fail.
    pub fn new<F>(config: GeneratorConfig, on_complete: F) -> GifGenResult<Self>
    where
        F: Fn(Generated) + Send + Sync + 'static,
    {
        Self::with_downloader(config, Arc::new(OfflineDownloader), on_complete)
    }

    /// A generator that fetches remote URLs through `downloader`.
    pub fn with_downloader<F>(
        config: GeneratorConfig,
        downloader: Arc<dyn Downloader>,
        on_complete: F,
    ) -> GifGenResult<Self>
    where
        F: Fn(Generated) + Send + Sync + 'static,
    {
        config.validate()?;
        let pool = FramePool::new(&config.threading)?;
        Ok(Self {
            inner: Arc::new(Inner {
                config,
                downloader,
                on_complete: Box::new(on_complete),
                next_request: AtomicU64::new(1),
                pool,
            }),
        })
    }

    /// The configuration this generator was built with.
    pub fn config(&self) -> &GeneratorConfig {
        &self.inner.config
    }

    /// Parameters derived from the configured defaults.
    pub fn default_params(&self) -> GenerateParams {
        let cfg = &self.inner.config;
        GenerateParams {
            frame_max_pixel_size: cfg.frame_max_pixel_size,
            compression_quality: cfg.compression_quality,
            frame_delay: Duration::from_millis(cfg.frame_delay_ms),
            loop_count: cfg.loop_count,
        }
    }

    /// Generate from a `file://` URL, a bare path or a remote URL.
    ///
    /// A local file that cannot be read is handed to the downloader like a remote URL. When
    /// the download fails the handler is invoked according to
    /// [`GeneratorConfig::download_failure`].
    #[tracing::instrument(skip(self, params))]
    pub fn generate_url(&self, url: &str, params: GenerateParams) -> RequestId {
        let mut acq = self.inner.begin();
        if let Err(e) = params.validate() {
            tracing::error!(error = %e, "invalid generation parameters");
            self.inner.complete(acq, None);
            return acq.request;
        }

        let source = match SourceRef::parse(url) {
            Ok(source) => source,
            Err(e) => {
                tracing::error!(error = %e, "unusable source URL");
                self.inner.complete(acq, None);
                return acq.request;
            }
        };

        if let SourceRef::Local(path) = &source {
            acq = acq.enter(AcquisitionPhase::AwaitingLocalRead);
            match std::fs::read(path) {
                Ok(bytes) => {
                    let animation = self.inner.reconstruct(bytes, &params);
                    self.inner.complete(acq, animation);
                    return acq.request;
                }
                Err(e) => {
                    tracing::debug!(path = %path.display(), error = %e, "local read failed; downloading");
                }
            }
        }

        self.inner.await_download(acq, url.to_string(), params);
        acq.request
    }

    /// Generate from encoded image bytes.
    pub fn generate_bytes(&self, bytes: Vec<u8>, params: GenerateParams) -> RequestId {
        self.generate(FrameInput::Bytes(bytes), params)
    }

    /// Generate from a frame source, keeping all of its frames.
    pub fn generate_source(&self, source: FrameSource, params: GenerateParams) -> RequestId {
        self.generate(FrameInput::Source(source), params)
    }

    /// Generate from independent sources, one frame each, in order.
    pub fn generate_sources(&self, sources: Vec<FrameSource>, params: GenerateParams) -> RequestId {
        self.generate(FrameInput::Sources(sources), params)
    }

    /// Generate from decoded images, one frame each, in order.
    pub fn generate_images(&self, images: Vec<DynamicImage>, params: GenerateParams) -> RequestId {
        self.generate(FrameInput::Images(images), params)
    }

    /// Generate from any in-memory input. Completes before returning.
    ///
    /// Frame lists are assembled into a temporary container that is deleted once the
    /// animation has been read back.
    #[tracing::instrument(skip(self, input, params), fields(list = input.is_frame_list()))]
    pub fn generate(&self, input: FrameInput, params: GenerateParams) -> RequestId {
        let acq = self.inner.begin();
        let animation = match self.inner.generate_in_memory(input, &params) {
            Ok(animation) => Some(animation),
            Err(e) => {
                tracing::error!(request = %acq.request, error = %e, "generation failed");
                None
            }
        };
        self.inner.complete(acq, animation);
        acq.request
    }
}

impl Inner {
    fn begin(&self) -> Acquisition {
        let id = self.next_request.fetch_add(1, Ordering::Relaxed);
        Acquisition::new(RequestId(id))
    }

    fn complete(&self, acq: Acquisition, animation: Option<PlayableAnimation>) {
        acq.enter(if animation.is_some() {
            AcquisitionPhase::Completed
        } else {
            AcquisitionPhase::Failed
        });
        (self.on_complete)(Generated {
            request: acq.request,
            animation,
        });
    }

    fn fail_download(&self, acq: Acquisition) {
        match self.config.download_failure {
            DownloadFailurePolicy::Notify => self.complete(acq, None),
            DownloadFailurePolicy::Silent => {
                acq.enter(AcquisitionPhase::Failed);
                tracing::debug!(request = %acq.request, "download failure not reported");
            }
        }
    }

    fn reconstruct_opts(&self, params: &GenerateParams) -> ReconstructOpts {
        ReconstructOpts {
            max_pixel_size: params.frame_max_pixel_size,
            compression_quality: params.compression_quality,
            default_delay: params.frame_delay,
            threading: self.config.threading.clone(),
        }
    }

    fn reconstruct(&self, bytes: Vec<u8>, params: &GenerateParams) -> Option<PlayableAnimation> {
        reconstruct_bytes_with(bytes, &self.reconstruct_opts(params), &self.pool).ok()
    }

    fn generate_in_memory(
        &self,
        input: FrameInput,
        params: &GenerateParams,
    ) -> GifGenResult<PlayableAnimation> {
        params.validate()?;
        let is_list = input.is_frame_list();
        let sources = normalize(input)?;

        if !is_list {
            let [source] = <[FrameSource; 1]>::try_from(sources).map_err(|v| {
                GifGenError::validation(format!("expected one source, got {}", v.len()))
            })?;
            return reconstruct_with(&source, &self.reconstruct_opts(params), &self.pool);
        }

        let container = assemble_with(
            &sources,
            &AssembleOpts {
                timing: params.timing(),
                max_pixel_size: params.frame_max_pixel_size,
                directory: self.config.container_dir(),
                file_name: None,
                encoder_speed: self.config.encoder_speed,
                threading: self.config.threading.clone(),
            },
            &self.pool,
        )?;
        let bytes = container.read_bytes()?;
        drop(container);

        // Frames were already bounded while assembling.
        reconstruct_bytes_with(
            bytes,
            &ReconstructOpts {
                max_pixel_size: None,
                compression_quality: DEFAULT_COMPRESSION_QUALITY,
                default_delay: params.frame_delay,
                threading: self.config.threading.clone(),
            },
            &self.pool,
        )
    }

    fn await_download(self: &Arc<Self>, acq: Acquisition, url: String, params: GenerateParams) {
        let acq = acq.enter(AcquisitionPhase::AwaitingDownload);
        let (tx, rx) = unbounded();

        let inner = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name(format!("gifgen-acquire-{}", acq.request.0))
            .spawn(move || inner.wait_for_download(acq, rx, params));
        if let Err(e) = spawned {
            tracing::error!(request = %acq.request, error = %e, "failed to spawn download waiter");
            self.complete(acq, None);
            return;
        }

        self.downloader
            .download(DownloadTicket::new(acq.request, url, tx));
    }

    fn wait_for_download(&self, acq: Acquisition, events: Receiver<DownloadEvent>, params: GenerateParams) {
        loop {
            match events.recv() {
                Ok(DownloadEvent::Progress(fraction)) => {
                    tracing::trace!(request = %acq.request, fraction, "download progress");
                }
                Ok(DownloadEvent::Finished(Ok(path))) => {
                    let animation = self.read_downloaded(acq.request, &path, &params);
                    self.complete(acq, animation);
                    return;
                }
                Ok(DownloadEvent::Finished(Err(reason))) => {
                    let e = GifGenError::acquisition(reason);
                    tracing::error!(request = %acq.request, error = %e, "download failed");
                    self.fail_download(acq);
                    return;
                }
                Err(_) => {
                    tracing::error!(request = %acq.request, "download abandoned without a result");
                    self.fail_download(acq);
                    return;
                }
            }
        }
    }

    fn read_downloaded(
        &self,
        request: RequestId,
        path: &Path,
        params: &GenerateParams,
    ) -> Option<PlayableAnimation> {
        match std::fs::read(path) {
            Ok(bytes) => self.reconstruct(bytes, params),
            Err(e) => {
                tracing::error!(request = %request, path = %path.display(), error = %e, "downloaded file unreadable");
                None
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/acquire/generator.rs"]
mod tests;
