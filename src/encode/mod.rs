//! GIF container output.

pub(crate) mod container;
pub(crate) mod files;
