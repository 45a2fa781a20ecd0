//! Request orchestration: URL classification, downloads and completion delivery.

pub(crate) mod download;
pub(crate) mod generator;
pub(crate) mod source;
