//! Internal building blocks (index reader, object model, pack/zlib readers) that back the public
//! [`crate::repository`] API.

pub mod index;
pub mod object;
pub mod pack;
pub mod zlib;
