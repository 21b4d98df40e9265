//! The supported binary formats for reading.
//! [ply] files store model geometry and [anm] files store skeletal animations for the same models.

pub mod anm;
pub mod ply;
