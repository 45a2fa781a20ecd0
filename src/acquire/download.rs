use std::path::PathBuf;

use crossbeam_channel::Sender;

use crate::acquire::generator::RequestId;

/// Events a [`Downloader`] reports for one request.
#[derive(Clone, Debug, PartialEq)]
pub enum DownloadEvent {
    /// Fraction of the download completed, in `[0, 1]`.
    Progress(f64),
    /// Final outcome: the local file holding the downloaded bytes, or a failure reason.
    Finished(Result<PathBuf, String>),
}

/// Handle given to a [`Downloader`] for a single request.
///
/// Report any number of [`DownloadTicket::progress`] updates, then exactly one of
/// [`DownloadTicket::succeed`] or [`DownloadTicket::fail`]. Dropping the ticket without
/// finishing counts as a failure.
#[derive(Debug)]
pub struct DownloadTicket {
    request: RequestId,
    url: String,
    events: Sender<DownloadEvent>,
}

impl DownloadTicket {
    pub(crate) fn new(request: RequestId, url: String, events: Sender<DownloadEvent>) -> Self {
        Self {
            request,
            url,
            events,
        }
    }

    /// The request this download belongs to.
    pub fn request(&self) -> RequestId {
        self.request
    }

    /// The remote URL to fetch.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Report download progress.
    pub fn progress(&self, fraction: f64) {
        self.send(DownloadEvent::Progress(fraction.clamp(0.0, 1.0)));
    }

    /// Report the local file that now holds the downloaded bytes.
    pub fn succeed(self, path: PathBuf) {
        self.send(DownloadEvent::Finished(Ok(path)));
    }

    /// Report that the download failed.
    pub fn fail(self, reason: impl Into<String>) {
        self.send(DownloadEvent::Finished(Err(reason.into())));
    }

    fn send(&self, event: DownloadEvent) {
        // The waiter only goes away once the request has completed.
        if self.events.send(event).is_err() {
            tracing::debug!(request = %self.request, "download event after request completed");
        }
    }
}

/// Fetches remote sources into local files.
///
/// `download` may return before the transfer ends and finish the ticket from any thread.
/// Caching is up to the implementation.
pub trait Downloader: Send + Sync {
    /// Start fetching `ticket.url()`.
    fn download(&self, ticket: DownloadTicket);
}

/// A [`Downloader`] without network access: every ticket fails immediately.
#[derive(Clone, Copy, Debug, Default)]
pub struct OfflineDownloader;

impl Downloader for OfflineDownloader {
    fn download(&self, ticket: DownloadTicket) {
        let reason = format!("no downloader configured for '{}'", ticket.url());
        ticket.fail(reason);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/acquire/download.rs"]
mod tests;
