use std::path::PathBuf;

use crate::foundation::error::{GifGenError, GifGenResult};

/// Where the bytes of a requested animation live.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceRef {
    /// A file readable from the local filesystem.
    Local(PathBuf),
    /// Anything that has to go through a [`crate::Downloader`].
    Remote(String),
}

impl SourceRef {
    /// Classify a URL or path.
    ///
    /// `file://` URLs (empty or `localhost` host) and bare paths are local; any other
    /// `scheme://` URL is remote. File URLs are taken verbatim, without percent-decoding.
    pub fn parse(url: &str) -> GifGenResult<Self> {
        let url = url.trim();
        if url.is_empty() {
            return Err(GifGenError::validation("empty source URL"));
        }

        let Some((scheme, rest)) = url.split_once("://") else {
            return Ok(Self::Local(PathBuf::from(url)));
        };
        if !is_scheme(scheme) {
            return Ok(Self::Local(PathBuf::from(url)));
        }
        if !scheme.eq_ignore_ascii_case("file") {
            return Ok(Self::Remote(url.to_string()));
        }

        let path = match rest.find('/') {
            Some(0) => rest,
            Some(i) if rest[..i].eq_ignore_ascii_case("localhost") => &rest[i..],
            _ => {
                return Err(GifGenError::validation(format!(
                    "file URL '{url}' does not name a local path"
                )));
            }
        };
        Ok(Self::Local(PathBuf::from(path)))
    }

    /// Whether the source can be read without a download.
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local(_))
    }
}

// RFC 3986: ALPHA *( ALPHA / DIGIT / "+" / "-" / "." )
fn is_scheme(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

#[cfg(test)]
#[path = "../../tests/unit/acquire/source.rs"]
mod tests;
