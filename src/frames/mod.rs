//! Frame sources and per-frame pixel work.

pub(crate) mod normalize;
pub(crate) mod resample;
pub(crate) mod source;
