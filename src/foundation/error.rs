use std::path::PathBuf;

/// Convenience result type used across gifgen.
pub type GifGenResult<T> = Result<T, GifGenError>;

/// Top-level error taxonomy used by the pipeline components.
///
/// The completion handler of [`crate::Generator`] never sees these values; they are logged and
/// folded into an absent animation. Library callers of the individual components receive them
/// directly.
#[derive(thiserror::Error, Debug)]
pub enum GifGenError {
    /// Invalid caller-provided parameters or configuration.
    #[error("validation error: {0}")]
    Validation(String),

    /// Encoded bytes could not be turned into a frame source or pixels.
    #[error("decode error: {0}")]
    Decode(String),

    /// The container destination could not be written or finalized.
    #[error("encode error: {0}")]
    Encode(String),

    /// Neither a local read nor a download produced the source bytes.
    #[error("acquisition error: {0}")]
    Acquisition(String),

    /// The destination file already exists and will not be overwritten.
    #[error("destination '{}' already exists", .0.display())]
    Conflict(PathBuf),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl GifGenError {
    /// Build a [`GifGenError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`GifGenError::Decode`] value.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Build a [`GifGenError::Encode`] value.
    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    /// Build a [`GifGenError::Acquisition`] value.
    pub fn acquisition(msg: impl Into<String>) -> Self {
        Self::Acquisition(msg.into())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
