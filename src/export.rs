//! Plain text export of decoded geometry.
use std::io::Write;

use crate::formats::ply::PlyData;

/// Writes the vertices and faces of `data` to `writer` in the Wavefront OBJ format.
///
/// Positions, texture coordinates, and normals are written in vertex order with 6 decimal places.
/// The V coordinate is converted back to the value stored in the file.
/// Face indices start from 1 and use the same index for the position, UV, and normal.
/// The corners of each face are written in the reverse order of [indices](crate::formats::ply::Triangle::indices).
pub fn write_obj<W: Write>(data: &PlyData, writer: &mut W) -> std::io::Result<()> {
    for p in data.positions() {
        writeln!(writer, "v {:.6} {:.6} {:.6}", p.x, p.y, p.z)?;
    }

    for uv in data.uvs() {
        writeln!(writer, "vt {:.6} {:.6}", uv.x, 1.0 - uv.y)?;
    }

    for n in data.normals() {
        writeln!(writer, "vn {:.6} {:.6} {:.6}", n.x, n.y, n.z)?;
    }

    for triangle in &data.triangles {
        let [i0, i1, i2] = triangle.indices.map(|i| i as u32 + 1);
        writeln!(
            writer,
            "f {i2}/{i2}/{i2} {i1}/{i1}/{i1} {i0}/{i0}/{i0}",
            i0 = i0,
            i1 = i1,
            i2 = i2
        )?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::ply::{BoundingBox, Triangle, Vertex};
    use crate::{Vector2, Vector3};
    use pretty_assertions::assert_eq;

    fn data(vertices: Vec<Vertex>, triangles: Vec<Triangle>) -> PlyData {
        PlyData {
            bounding_box: BoundingBox::default(),
            skins: Vec::new(),
            meshes: Vec::new(),
            vertex_layout: None,
            vertices,
            triangles,
        }
    }

    #[test]
    fn write_obj_empty() {
        let mut writer = Vec::new();
        write_obj(&data(Vec::new(), Vec::new()), &mut writer).unwrap();
        assert!(writer.is_empty());
    }

    #[test]
    fn write_obj_single_triangle() {
        let vertex = |x: f32| Vertex {
            position: Vector3::new(x, 0.5, -1.0),
            normal: Vector3::new(0.0, 0.0, 1.0),
            uv: Vector2::new(x, 0.25),
        };
        let ply = data(
            vec![vertex(0.0), vertex(1.0), vertex(2.0)],
            vec![Triangle { indices: [0, 1, 2] }],
        );

        let mut writer = Vec::new();
        write_obj(&ply, &mut writer).unwrap();
        assert_eq!(
            "v 0.000000 0.500000 -1.000000\n\
             v 1.000000 0.500000 -1.000000\n\
             v 2.000000 0.500000 -1.000000\n\
             vt 0.000000 0.750000\n\
             vt 1.000000 0.750000\n\
             vt 2.000000 0.750000\n\
             vn 0.000000 0.000000 1.000000\n\
             vn 0.000000 0.000000 1.000000\n\
             vn 0.000000 0.000000 1.000000\n\
             f 3/3/3 2/2/2 1/1/1\n",
            String::from_utf8(writer).unwrap()
        );
    }

    #[test]
    fn write_obj_max_index() {
        let ply = data(
            Vec::new(),
            vec![Triangle {
                indices: [u16::MAX, 0, 1],
            }],
        );

        let mut writer = Vec::new();
        write_obj(&ply, &mut writer).unwrap();
        assert_eq!("f 2/2/2 1/1/1 65536/65536/65536\n", String::from_utf8(writer).unwrap());
    }
}
