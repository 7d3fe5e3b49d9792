//! Zlib inflate support for loose objects and pack entries.

pub mod stream;
