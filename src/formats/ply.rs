//! The [PlyData] format stores the geometry for a single model part.
//! These files use the ".ply" suffix like "body.ply" and are unrelated to the Stanford PLY format.
//!
//! A file starts with the magic `EPLYBNDS` and a [BoundingBox] followed by tagged chunks.
//! The `INDX` chunk is always the final chunk, so reading stops after the triangles.
//!
//! | Tag    | Contents                                            |
//! |--------|-----------------------------------------------------|
//! | `SKIN` | [Skin] names                                        |
//! | `MESH` | [MeshInfo] with the material file                   |
//! | `VERT` | [Vertex] data in one of the [VertexLayout] variants |
//! | `INDX` | [Triangle] faces                                    |
use std::path::Path;

use binread::BinRead;
use tracing::{debug, trace, warn};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::cursor::{ByteCursor, LengthWidth};
use crate::{tag_to_string, DecodeError, Vector2, Vector3};

/// The file magic at the start of every PLY file.
pub const PLY_MAGIC: &[u8; 8] = b"EPLYBNDS";

/// The mesh type code for meshes with additional sub skin entries after the material file.
pub const MESH_TYPE_SUBSKIN: u32 = 0x1118;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlyChunk {
    Skin,
    Mesh,
    Vert,
    Indx,
}

impl PlyChunk {
    fn from_tag(tag: &[u8; 4]) -> Option<Self> {
        match tag {
            b"SKIN" => Some(Self::Skin),
            b"MESH" => Some(Self::Mesh),
            b"VERT" => Some(Self::Vert),
            b"INDX" => Some(Self::Indx),
            _ => None,
        }
    }
}

/// The two corners stored in the file header.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(BinRead, Debug, PartialEq, Clone, Copy, Default)]
pub struct BoundingBox {
    pub min: Vector3,
    pub max: Vector3,
}

/// The names listed in a single `SKIN` chunk.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, PartialEq, Clone, Default)]
pub struct Skin {
    pub names: Vec<String>,
}

/// A validated material format code from a `MESH` chunk.
///
/// The code determines if the chunk stores an inline color
/// and the winding order of the faces in the `INDX` chunk.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub struct MaterialFormat(u32);

impl MaterialFormat {
    /// All the material format codes that can be read.
    pub const SUPPORTED: [u32; 12] = [
        0x0644, 0x0604, 0x0404, 0x0406, 0x0704, 0x0705, 0x0744, 0x0745, 0x0C14, 0x0F14, 0x0F54,
        0x0C54,
    ];

    /// Returns [None] if `code` is not one of the [SUPPORTED](MaterialFormat::SUPPORTED) codes.
    pub fn new(code: u32) -> Option<Self> {
        Self::SUPPORTED.contains(&code).then(|| Self(code))
    }

    pub fn code(&self) -> u32 {
        self.0
    }

    /// Returns `true` if an RGBA color follows the format code.
    pub fn has_inline_color(&self) -> bool {
        !matches!(self.0, 0x0404 | 0x0406 | 0x0C14 | 0x0C54)
    }

    /// Returns `true` if faces keep the file's index order instead of being reversed.
    pub fn preserves_winding(&self) -> bool {
        matches!(self.0, 0x0744 | 0x0C54)
    }
}

/// The header information for the mesh stored in a `MESH` chunk.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, PartialEq, Clone)]
pub struct MeshInfo {
    pub mesh_type: u32,
    /// The expected number of triangles in the `INDX` chunk.
    pub triangle_count: u32,
    pub material_format: MaterialFormat,
    /// The RGBA color if [has_inline_color](MaterialFormat::has_inline_color) is `true`.
    pub color: Option<[u8; 4]>,
    pub material_file: String,
    /// Raw entries after the material file for [MESH_TYPE_SUBSKIN] meshes.
    /// These are likely bone indices but are not interpreted further.
    pub subskin_bones: Vec<u8>,
}

/// The per vertex byte layout selected by the vertex description code in a `VERT` chunk.
///
/// All layouts start with a position and normal and contain a single UV pair.
/// The remaining bytes are unused padding.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum VertexLayout {
    /// `0x00010024`
    Padded36V1,
    /// `0x00070020`
    Packed32,
    /// `0x00070024`
    Padded36,
    /// `0x00070028`
    Padded40,
    /// `0x00070030`
    TrailingPadding48,
    /// `0x00070038`
    TrailingPadding56,
}

impl VertexLayout {
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0x00010024 => Some(Self::Padded36V1),
            0x00070020 => Some(Self::Packed32),
            0x00070024 => Some(Self::Padded36),
            0x00070028 => Some(Self::Padded40),
            0x00070030 => Some(Self::TrailingPadding48),
            0x00070038 => Some(Self::TrailingPadding56),
            _ => None,
        }
    }

    pub fn code(&self) -> u32 {
        match self {
            Self::Padded36V1 => 0x00010024,
            Self::Packed32 => 0x00070020,
            Self::Padded36 => 0x00070024,
            Self::Padded40 => 0x00070028,
            Self::TrailingPadding48 => 0x00070030,
            Self::TrailingPadding56 => 0x00070038,
        }
    }

    /// Unused bytes between the normal and the UV.
    pub fn padding_before_uv(&self) -> usize {
        match self {
            Self::Padded36V1 | Self::Padded36 => 4,
            Self::Padded40 => 8,
            Self::Packed32 | Self::TrailingPadding48 | Self::TrailingPadding56 => 0,
        }
    }

    /// Unused bytes after the UV.
    pub fn padding_after_uv(&self) -> usize {
        match self {
            Self::TrailingPadding48 => 16,
            Self::TrailingPadding56 => 24,
            _ => 0,
        }
    }

    /// The size in bytes of a single vertex.
    pub fn stride(&self) -> usize {
        32 + self.padding_before_uv() + self.padding_after_uv()
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, PartialEq, Clone, Copy, Default)]
pub struct Vertex {
    pub position: Vector3,
    pub normal: Vector3,
    /// The texture coordinate with the V coordinate already flipped to `1.0 - v`.
    pub uv: Vector2,
}

/// The vertex indices for a single face.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub struct Triangle {
    pub indices: [u16; 3],
}

impl Triangle {
    /// Orders the indices read from the file based on the material format of the current mesh.
    /// Faces are reversed unless the format [preserves_winding](MaterialFormat::preserves_winding).
    pub fn from_file_order(indices: [u16; 3], format: Option<MaterialFormat>) -> Self {
        let [i0, i1, i2] = indices;
        if format.map(|f| f.preserves_winding()).unwrap_or(false) {
            Self {
                indices: [i0, i1, i2],
            }
        } else {
            Self {
                indices: [i2, i1, i0],
            }
        }
    }
}

/// The decoded contents of a PLY file.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, PartialEq, Clone)]
pub struct PlyData {
    pub bounding_box: BoundingBox,
    pub skins: Vec<Skin>,
    /// The `MESH` chunks in file order.
    /// The last mesh determines the winding order for [triangles](#structfield.triangles).
    pub meshes: Vec<MeshInfo>,
    /// The layout of the most recent `VERT` chunk.
    pub vertex_layout: Option<VertexLayout>,
    pub vertices: Vec<Vertex>,
    pub triangles: Vec<Triangle>,
}

impl PlyData {
    /// Tries to read and decode the PLY file from `path`.
    /// The entire file is buffered for performance.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, DecodeError> {
        let bytes = std::fs::read(path)?;
        read_ply(&bytes)
    }

    /// Tries to decode an in-memory PLY file.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        read_ply(bytes)
    }

    /// The material file of the most recent `MESH` chunk.
    pub fn material_file(&self) -> Option<&str> {
        self.meshes.last().map(|m| m.material_file.as_str())
    }

    pub fn positions(&self) -> impl Iterator<Item = &Vector3> + '_ {
        self.vertices.iter().map(|v| &v.position)
    }

    pub fn normals(&self) -> impl Iterator<Item = &Vector3> + '_ {
        self.vertices.iter().map(|v| &v.normal)
    }

    pub fn uvs(&self) -> impl Iterator<Item = &Vector2> + '_ {
        self.vertices.iter().map(|v| &v.uv)
    }
}

/// Decodes a PLY file from `bytes`.
/// Any unsupported chunk, material format, or vertex layout aborts the decode.
pub fn read_ply(bytes: &[u8]) -> Result<PlyData, DecodeError> {
    let mut cursor = ByteCursor::new(bytes);

    let magic = cursor.read_fixed_bytes(PLY_MAGIC.len())?;
    if magic != PLY_MAGIC {
        return Err(DecodeError::BadMagic {
            expected: PLY_MAGIC.to_vec(),
            found: magic.to_vec(),
        });
    }
    let bounding_box = cursor.read::<BoundingBox>()?;

    let mut skins = Vec::new();
    let mut meshes: Vec<MeshInfo> = Vec::new();
    let mut vertex_layout = None;
    let mut vertices = Vec::new();

    loop {
        let offset = cursor.offset();
        let tag = cursor.read_tag()?;
        let chunk = PlyChunk::from_tag(&tag)
            .ok_or(DecodeError::UnsupportedChunk { tag, offset })?;
        debug!("Found chunk {} at 0x{:X}", tag_to_string(&tag), offset);

        match chunk {
            PlyChunk::Skin => skins.push(read_skin(&mut cursor)?),
            PlyChunk::Mesh => meshes.push(read_mesh_info(&mut cursor)?),
            PlyChunk::Vert => {
                let layout = read_vertices(&mut cursor, &mut vertices)?;
                vertex_layout = Some(layout);
            }
            PlyChunk::Indx => {
                let format = meshes.last().map(|m| m.material_format);
                let triangles = read_triangles(&mut cursor, format)?;
                debug!("Triangle data ends at 0x{:X}", cursor.offset());

                return Ok(PlyData {
                    bounding_box,
                    skins,
                    meshes,
                    vertex_layout,
                    vertices,
                    triangles,
                });
            }
        }
    }
}

fn read_skin(cursor: &mut ByteCursor) -> Result<Skin, DecodeError> {
    let count = cursor.read_u32()?;
    let mut names = Vec::new();
    for _ in 0..count {
        let name = cursor.read_length_prefixed_string(LengthWidth::U8)?;
        trace!("Skin name: {}", name);
        names.push(name);
    }
    Ok(Skin { names })
}

fn read_mesh_info(cursor: &mut ByteCursor) -> Result<MeshInfo, DecodeError> {
    let mesh_type = cursor.read_u32()?;
    cursor.skip(4)?;
    let triangle_count = cursor.read_u32()?;

    let format_offset = cursor.offset();
    let code = cursor.read_u32()?;
    let material_format =
        MaterialFormat::new(code).ok_or(DecodeError::UnsupportedMaterialFormat {
            format: code,
            offset: format_offset,
        })?;

    let color = if material_format.has_inline_color() {
        Some(cursor.read::<[u8; 4]>()?)
    } else {
        None
    };

    let material_file = cursor.read_length_prefixed_string(LengthWidth::U8)?;

    let subskin_bones = if mesh_type == MESH_TYPE_SUBSKIN {
        let count = cursor.read_u8()? as usize;
        cursor.read_fixed_bytes(count)?.to_vec()
    } else {
        Vec::new()
    };

    debug!(
        "Mesh type 0x{:04X} with {} triangles, material format 0x{:04X}, material file {:?}",
        mesh_type, triangle_count, code, material_file
    );

    Ok(MeshInfo {
        mesh_type,
        triangle_count,
        material_format,
        color,
        material_file,
        subskin_bones,
    })
}

pub(crate) fn read_vertex(
    cursor: &mut ByteCursor,
    layout: VertexLayout,
) -> Result<Vertex, DecodeError> {
    let position = cursor.read::<Vector3>()?;
    let normal = cursor.read::<Vector3>()?;
    cursor.skip(layout.padding_before_uv())?;
    let uv = cursor.read::<Vector2>()?;
    cursor.skip(layout.padding_after_uv())?;

    Ok(Vertex {
        position,
        normal,
        uv: Vector2::new(uv.x, 1.0 - uv.y),
    })
}

fn read_vertices(
    cursor: &mut ByteCursor,
    vertices: &mut Vec<Vertex>,
) -> Result<VertexLayout, DecodeError> {
    let count = cursor.read_u32()? as usize;

    let code_offset = cursor.offset();
    let code = cursor.read_u32()?;
    let layout = VertexLayout::from_code(code).ok_or(DecodeError::UnknownVertexLayout {
        code,
        offset: code_offset,
    })?;
    debug!(
        "{} vertices with description 0x{:08X} at 0x{:X}",
        count, code, code_offset
    );

    // Avoid allocating based on a corrupted count.
    vertices.reserve(count.min(cursor.remaining() / layout.stride()));
    for _ in 0..count {
        vertices.push(read_vertex(cursor, layout)?);
    }

    Ok(layout)
}

fn read_triangles(
    cursor: &mut ByteCursor,
    format: Option<MaterialFormat>,
) -> Result<Vec<Triangle>, DecodeError> {
    let index_count = cursor.read_u32()? as usize;
    if index_count % 3 != 0 {
        warn!(
            "Index count {} is not a multiple of 3. Ignoring the remaining indices.",
            index_count
        );
    }

    let triangle_count = index_count / 3;
    let mut triangles = Vec::with_capacity(triangle_count.min(cursor.remaining() / 6));
    for _ in 0..triangle_count {
        let indices = cursor.read::<[u16; 3]>()?;
        triangles.push(Triangle::from_file_order(indices, format));
    }
    Ok(triangles)
}
