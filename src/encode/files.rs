use std::{
    fs::OpenOptions,
    io,
    path::{Path, PathBuf},
};

use anyhow::Context as _;

use crate::foundation::error::{GifGenError, GifGenResult};

/// Content types the file-creation helper knows how to name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContentType {
    /// Animated GIF container.
    Gif,
}

impl ContentType {
    /// Filename extension, without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Gif => "gif",
        }
    }
}

/// Create a new file in `directory`, never overwriting an existing one.
///
/// With `name == None` a unique name is generated. A name without an extension gets the
/// content type's extension. An existing file yields [`GifGenError::Conflict`] and is left
/// untouched. `directory` is created if missing.
pub fn create_file(
    directory: &Path,
    name: Option<&str>,
    content_type: ContentType,
    data: Option<&[u8]>,
) -> GifGenResult<PathBuf> {
    std::fs::create_dir_all(directory)
        .with_context(|| format!("create directory '{}'", directory.display()))?;

    let path = match name {
        Some(name) => create_named(directory, name, content_type)?,
        None => create_unique(directory, content_type)?,
    };

    if let Some(data) = data {
        std::fs::write(&path, data)
            .with_context(|| format!("write initial contents of '{}'", path.display()))?;
    }

    tracing::debug!(path = %path.display(), "created file");
    Ok(path)
}

fn create_named(directory: &Path, name: &str, content_type: ContentType) -> GifGenResult<PathBuf> {
    let name = validate_file_name(name)?;
    let mut path = directory.join(name);
    if path.extension().is_none() {
        path.set_extension(content_type.extension());
    }

    match OpenOptions::new().write(true).create_new(true).open(&path) {
        Ok(_) => Ok(path),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            tracing::debug!(path = %path.display(), "file already exists");
            Err(GifGenError::Conflict(path))
        }
        Err(e) => Err(anyhow::Error::new(e)
            .context(format!("create file '{}'", path.display()))
            .into()),
    }
}

fn create_unique(directory: &Path, content_type: ContentType) -> GifGenResult<PathBuf> {
    let file = tempfile::Builder::new()
        .prefix("gifgen-")
        .suffix(&format!(".{}", content_type.extension()))
        .tempfile_in(directory)
        .with_context(|| format!("create unique file in '{}'", directory.display()))?;
    let path = file
        .into_temp_path()
        .keep()
        .context("detach generated file from its temp guard")?;
    Ok(path)
}

fn validate_file_name(name: &str) -> GifGenResult<&str> {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed == "." || trimmed == ".." {
        return Err(GifGenError::validation("file name must be non-empty"));
    }
    if trimmed.contains(['/', '\\']) {
        return Err(GifGenError::validation(format!(
            "file name '{name}' must not contain path separators"
        )));
    }
    Ok(trimmed)
}

#[cfg(test)]
#[path = "../../tests/unit/encode/files.rs"]
mod tests;
