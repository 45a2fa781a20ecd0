pub(crate) mod reconstruct;
