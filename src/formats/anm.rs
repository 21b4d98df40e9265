//! The [AnmData] format stores keyframed bone transforms for a model.
//! These files use the ".anm" suffix like "walk.anm".
//!
//! A file starts with the magic `EANM` and a version of [ANM_VERSION] followed by tagged chunks until the end of the file.
//! `FRMS` stores the duration, `BMAP` the bone names, and each `FRM2` chunk stores one [Keyframe].
//! The bone names define the index space for [FrameEvent::bone_index].
use std::path::Path;

use binread::BinRead;
use modular_bitfield::prelude::*;
use tracing::{debug, trace, warn};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::cursor::{ByteCursor, LengthWidth};
use crate::formats::ply::{read_vertex, VertexLayout};
use crate::{tag_to_string, DecodeError, Vector3};

/// The file magic at the start of every ANM file.
pub const ANM_MAGIC: &[u8; 4] = b"EANM";

/// The only supported header version.
pub const ANM_VERSION: u32 = 0x00060000;

// Vertex lists in keyframes always use the 32 byte layout regardless of the computed stride.
const KEYFRAME_VERTEX_LAYOUT: VertexLayout = VertexLayout::Packed32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AnmChunk {
    Frms,
    Bmap,
    Frm2,
}

impl AnmChunk {
    fn from_tag(tag: &[u8; 4]) -> Option<Self> {
        match tag {
            b"FRMS" => Some(Self::Frms),
            b"BMAP" => Some(Self::Bmap),
            b"FRM2" => Some(Self::Frm2),
            _ => None,
        }
    }
}

/// Determines which properties follow a [FrameEvent] in the file.
/// The flags are checked in field order and are not mutually exclusive.
#[bitfield(bits = 16)]
#[derive(Debug, BinRead, Clone, Copy, PartialEq, Eq)]
#[br(map = Self::from_bytes)]
pub struct FrameEventFlags {
    /// A [Position] follows.
    pub position: bool,
    /// A [Quaternion] follows.
    pub quaternion: bool,
    /// Selects the permuted [Quaternion] components.
    pub inverted: bool,
    /// Unknown. No additional data follows.
    pub unk4: bool,
    pub unk5: bool,
    /// A vertex list follows the other properties.
    pub vertices: bool,
    #[skip]
    __: B10,
}

impl FrameEventFlags {
    pub fn from_bits(bits: u16) -> Self {
        Self::from_bytes(bits.to_le_bytes())
    }

    pub fn bits(&self) -> u16 {
        u16::from_le_bytes(self.into_bytes())
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(BinRead, Debug, PartialEq, Clone, Copy, Default)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Position {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// A rotation with the `w` component derived from the stored `x`, `y`, and `z`.
/// The result is not normalized.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, PartialEq, Clone, Copy, Default)]
pub struct Quaternion {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Quaternion {
    pub fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    /// Computes `w = sqrt(|1 - (x² + y² + z²)|)` for the stored components.
    /**
    ```rust
    use mow_lib::formats::anm::Quaternion;

    assert_eq!(1.0, Quaternion::derive_w(0.0, 0.0, 0.0));
    assert_eq!(0.0, Quaternion::derive_w(1.0, 0.0, 0.0));
    ```
    */
    pub fn derive_w(x: f32, y: f32, z: f32) -> f32 {
        let (x, y, z) = (x as f64, y as f64, z as f64);
        (1.0 - (x * x + y * y + z * z)).abs().sqrt() as f32
    }

    /// Creates the quaternion from the stored components.
    /// Inverted quaternions use the component order `(y, -x, w, -z)`.
    pub fn from_stored(x: f32, y: f32, z: f32, inverted: bool) -> Self {
        let w = Self::derive_w(x, y, z);
        if inverted {
            Self::new(y, -x, w, -z)
        } else {
            Self::new(x, y, z, w)
        }
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum FrameProperty {
    Position(Position),
    Quaternion(Quaternion),
}

/// The transform data for a single bone in a [Keyframe].
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, PartialEq, Clone)]
pub struct FrameEvent {
    /// The index into [bone_names](struct.AnmData.html#structfield.bone_names).
    /// This is not checked against the number of bones.
    pub bone_index: u8,
    /// The raw bits for [FrameEventFlags].
    pub type_flags: u16,
    /// The position and rotation in file order.
    pub properties: Vec<FrameProperty>,
}

impl FrameEvent {
    pub fn flags(&self) -> FrameEventFlags {
        FrameEventFlags::from_bits(self.type_flags)
    }

    pub fn position(&self) -> Option<&Position> {
        self.properties.iter().find_map(|p| match p {
            FrameProperty::Position(p) => Some(p),
            _ => None,
        })
    }

    pub fn rotation(&self) -> Option<&Quaternion> {
        self.properties.iter().find_map(|p| match p {
            FrameProperty::Quaternion(q) => Some(q),
            _ => None,
        })
    }
}

/// The events for a single `FRM2` chunk.
/// Keyframes are not sorted by time, and multiple keyframes may have the same time.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, PartialEq, Clone)]
pub struct Keyframe {
    pub time: u16,
    pub events: Vec<FrameEvent>,
}

/// The decoded contents of an ANM file.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, PartialEq, Clone)]
pub struct AnmData {
    /// The value of the last `FRMS` chunk or 0 if there is no `FRMS` chunk.
    pub duration: u32,
    pub bone_names: Vec<String>,
    pub keyframes: Vec<Keyframe>,
}

impl AnmData {
    /// Tries to read and decode the ANM file from `path`.
    /// The entire file is buffered for performance.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, DecodeError> {
        let bytes = std::fs::read(path)?;
        read_anm(&bytes)
    }

    /// Tries to decode an in-memory ANM file.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        read_anm(bytes)
    }

    /// The name for `bone_index` or [None] if the index is out of range.
    pub fn bone_name(&self, bone_index: u8) -> Option<&str> {
        self.bone_names.get(bone_index as usize).map(String::as_str)
    }
}

/// Decodes an ANM file from `bytes`.
/// Reading stops without an error if the data ends before a chunk tag.
pub fn read_anm(bytes: &[u8]) -> Result<AnmData, DecodeError> {
    let mut cursor = ByteCursor::new(bytes);

    let magic = cursor.read_fixed_bytes(ANM_MAGIC.len())?;
    if magic != ANM_MAGIC {
        return Err(DecodeError::BadMagic {
            expected: ANM_MAGIC.to_vec(),
            found: magic.to_vec(),
        });
    }

    let version = cursor.read_u32()?;
    if version != ANM_VERSION {
        return Err(DecodeError::UnsupportedVersion {
            expected: ANM_VERSION,
            found: version,
        });
    }

    let mut duration = 0;
    let mut bone_names = Vec::new();
    let mut keyframes = Vec::new();

    loop {
        let offset = cursor.offset();
        let tag = match cursor.read_tag() {
            Ok(tag) => tag,
            Err(DecodeError::TruncatedInput { remaining, .. }) => {
                if remaining > 0 {
                    warn!(
                        "Ignoring {} trailing bytes at 0x{:X}.",
                        remaining, offset
                    );
                }
                break;
            }
            Err(e) => return Err(e),
        };
        let chunk =
            AnmChunk::from_tag(&tag).ok_or(DecodeError::UnsupportedChunk { tag, offset })?;
        debug!("Found chunk {} at 0x{:X}", tag_to_string(&tag), offset);

        match chunk {
            AnmChunk::Frms => {
                duration = cursor.read_u32()?;
                debug!("Animation duration: {}", duration);
            }
            AnmChunk::Bmap => read_bone_names(&mut cursor, &mut bone_names)?,
            AnmChunk::Frm2 => keyframes.push(read_keyframe(&mut cursor)?),
        }
    }

    Ok(AnmData {
        duration,
        bone_names,
        keyframes,
    })
}

fn read_bone_names(
    cursor: &mut ByteCursor,
    bone_names: &mut Vec<String>,
) -> Result<(), DecodeError> {
    let count = cursor.read_u32()?;
    debug!("Number of bones: {}", count);
    for _ in 0..count {
        let name = cursor.read_length_prefixed_string(LengthWidth::U32)?;
        trace!("Bone name: {}", name);
        bone_names.push(name);
    }
    Ok(())
}

fn read_keyframe(cursor: &mut ByteCursor) -> Result<Keyframe, DecodeError> {
    let time = cursor.read_u16()?;
    let event_count = cursor.read_u8()?;
    trace!("Keyframe time {} with {} events", time, event_count);

    let mut events = Vec::with_capacity(event_count as usize);
    for _ in 0..event_count {
        events.push(read_frame_event(cursor)?);
    }
    Ok(Keyframe { time, events })
}

fn read_frame_event(cursor: &mut ByteCursor) -> Result<FrameEvent, DecodeError> {
    let bone_index = cursor.read_u8()?;
    let flags = cursor.read::<FrameEventFlags>()?;

    let mut properties = Vec::new();
    if flags.position() {
        properties.push(FrameProperty::Position(cursor.read::<Position>()?));
    }

    if flags.quaternion() {
        let xyz = cursor.read::<Vector3>()?;
        properties.push(FrameProperty::Quaternion(Quaternion::from_stored(
            xyz.x,
            xyz.y,
            xyz.z,
            flags.inverted(),
        )));
    }

    if flags.unk4() {
        warn!(
            "Found unknown frame event flag 0x8 for bone {} at 0x{:X}.",
            bone_index,
            cursor.offset()
        );
    }

    if flags.vertices() {
        skip_vertex_list(cursor, flags)?;
    }

    Ok(FrameEvent {
        bone_index,
        type_flags: flags.bits(),
        properties,
    })
}

// The vertex data is decoded to keep the cursor aligned but isn't part of the keyframe.
fn skip_vertex_list(cursor: &mut ByteCursor, flags: FrameEventFlags) -> Result<(), DecodeError> {
    let byte_length = cursor.read_u32()?;
    cursor.skip(4)?;
    let vertex_count = cursor.read_u16()?;
    cursor.skip(2)?;

    match byte_length.checked_div(vertex_count as u32) {
        Some(stride) if stride as usize != KEYFRAME_VERTEX_LAYOUT.stride() => warn!(
            "Keyframe vertex stride {} does not match the expected stride {} at 0x{:X}.",
            stride,
            KEYFRAME_VERTEX_LAYOUT.stride(),
            cursor.offset()
        ),
        Some(_) => (),
        None => debug!("Empty keyframe vertex list at 0x{:X}", cursor.offset()),
    }

    for _ in 0..vertex_count {
        let vertex = read_vertex(cursor, KEYFRAME_VERTEX_LAYOUT)?;
        trace!("Keyframe vertex: {:?}", vertex);
    }

    // The trailing data after the vertices has a fixed size but an unknown purpose.
    if flags.position() {
        cursor.skip(32)?;
    } else {
        cursor.skip(8)?;
    }
    Ok(())
}
