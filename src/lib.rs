//! # mow_lib
//!
//! mow_lib is a library for reading the PLY model and ANM animation formats used by Men of War and related games.
//!
//! Both formats are little-endian chunked binary files.
//! Each chunk starts with a 4 byte tag like `MESH` or `FRM2` that determines how the remaining data is read.
//! Reading produces plain data types like [PlyData](formats::ply::PlyData) and [AnmData](formats::anm::AnmData)
//! that can be used to create meshes and armatures in other applications.
//!
//! The formats are read only. There is no support for writing files.
//!
//! ## Getting Started
/*!
```no_run
use mow_lib::prelude::*;

# fn main() -> Result<(), Box<dyn std::error::Error>> {
let model = PlyData::from_file("body.ply")?;
println!("{} vertices", model.vertices.len());

let animation = AnmData::from_file("walk.anm")?;
for keyframe in &animation.keyframes {
    println!("{} events at time {}", keyframe.events.len(), keyframe.time);
}
# Ok(())
# }
```
 */
//!
//! ## Errors
//! Reading stops at the first unsupported or malformed value and returns a [DecodeError].
//! No partially read data is returned.
//! Decoding operates on an in-memory buffer, so separate files can be read in parallel.
pub mod cursor;
pub mod export;
pub mod formats;
mod vectors;

pub use vectors::{Vector2, Vector3};

use formats::{anm::AnmData, ply::PlyData};
use thiserror::Error;

/// Common imports for decoded file types.
pub mod prelude {
    pub use crate::formats::anm::{AnmData, FrameEvent, FrameProperty, Keyframe};
    pub use crate::formats::ply::{MeshInfo, PlyData, Triangle, Vertex};
    pub use crate::{decode_animation, decode_geometry, DecodeError};
}

/// Errors while reading PLY and ANM files.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The file does not start with the expected magic bytes.
    #[error(
        "Expected file magic {:?} but found {:?}.",
        String::from_utf8_lossy(expected),
        String::from_utf8_lossy(found)
    )]
    BadMagic { expected: Vec<u8>, found: Vec<u8> },

    /// The header version does not match the only supported version.
    #[error("Unsupported version 0x{found:08X}. Expected version 0x{expected:08X}.")]
    UnsupportedVersion { expected: u32, found: u32 },

    /// The chunk tag is not recognized for this format.
    #[error("Unsupported chunk {} at offset 0x{offset:X}.", tag_to_string(tag))]
    UnsupportedChunk { tag: [u8; 4], offset: u64 },

    /// The material format code is not one of the supported codes.
    #[error("Unsupported material format 0x{format:04X} at offset 0x{offset:X}.")]
    UnsupportedMaterialFormat { format: u32, offset: u64 },

    /// The vertex description code does not match any known vertex layout.
    #[error("Unknown vertex description 0x{code:08X} at offset 0x{offset:X}.")]
    UnknownVertexLayout { code: u32, offset: u64 },

    /// The data ended before the current value could be read.
    #[error(
        "Expected {needed} bytes at offset 0x{offset:X} but only {remaining} bytes remain."
    )]
    TruncatedInput {
        offset: u64,
        needed: usize,
        remaining: usize,
    },

    /// An error occurred while reading the file.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// An error occurred while reading a record from the buffer.
    #[error(transparent)]
    BinRead(#[from] binread::error::Error),
}

/// Decodes a PLY model from an in-memory file.
pub fn decode_geometry(bytes: &[u8]) -> Result<PlyData, DecodeError> {
    formats::ply::read_ply(bytes)
}

/// Decodes an ANM animation from an in-memory file.
pub fn decode_animation(bytes: &[u8]) -> Result<AnmData, DecodeError> {
    formats::anm::read_anm(bytes)
}

/// Formats a chunk tag as text for logging and error messages.
pub(crate) fn tag_to_string(tag: &[u8; 4]) -> String {
    String::from_utf8_lossy(tag).into_owned()
}
