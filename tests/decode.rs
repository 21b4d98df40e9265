use approx::assert_relative_eq;
use byteorder::{LittleEndian, WriteBytesExt};
use mow_lib::formats::anm::{FrameProperty, Position, Quaternion};
use mow_lib::prelude::*;
use mow_lib::{Vector2, Vector3};

fn write_floats(bytes: &mut Vec<u8>, values: &[f32]) {
    for v in values {
        bytes.write_f32::<LittleEndian>(*v).unwrap();
    }
}

fn minimal_ply(material_format: u32) -> Vec<u8> {
    let mut bytes = b"EPLYBNDS".to_vec();
    write_floats(&mut bytes, &[0.0, 0.0, 0.0, 1.0, 1.0, 1.0]);

    bytes.extend_from_slice(b"MESH");
    bytes.write_u32::<LittleEndian>(0x0112).unwrap();
    bytes.write_u32::<LittleEndian>(0).unwrap();
    bytes.write_u32::<LittleEndian>(1).unwrap();
    bytes.write_u32::<LittleEndian>(material_format).unwrap();
    bytes.write_u8(9).unwrap();
    bytes.extend_from_slice(b"model.mtl");

    bytes.extend_from_slice(b"VERT");
    bytes.write_u32::<LittleEndian>(1).unwrap();
    bytes.write_u32::<LittleEndian>(0x00070020).unwrap();
    write_floats(&mut bytes, &[1.0, 2.0, 3.0, 0.0, 1.0, 0.0, 0.25, 0.125]);

    bytes.extend_from_slice(b"INDX");
    bytes.write_u32::<LittleEndian>(3).unwrap();
    for i in [0u16, 0, 0] {
        bytes.write_u16::<LittleEndian>(i).unwrap();
    }
    bytes
}

fn minimal_anm() -> Vec<u8> {
    let mut bytes = b"EANM".to_vec();
    bytes.write_u32::<LittleEndian>(0x00060000).unwrap();

    bytes.extend_from_slice(b"FRMS");
    bytes.write_u32::<LittleEndian>(100).unwrap();

    bytes.extend_from_slice(b"BMAP");
    bytes.write_u32::<LittleEndian>(1).unwrap();
    bytes.write_u32::<LittleEndian>(4).unwrap();
    bytes.extend_from_slice(b"root");

    bytes.extend_from_slice(b"FRM2");
    bytes.write_u16::<LittleEndian>(10).unwrap();
    bytes.write_u8(1).unwrap();
    bytes.write_u8(0).unwrap();
    bytes.write_u16::<LittleEndian>(0x3).unwrap();
    write_floats(&mut bytes, &[1.0, 2.0, 3.0, 0.2, 0.4, 0.4]);
    bytes
}

#[test]
fn decode_minimal_geometry() {
    let data = decode_geometry(&minimal_ply(0x0404)).unwrap();

    assert_eq!(1, data.vertices.len());
    assert_eq!(Vector3::new(1.0, 2.0, 3.0), data.vertices[0].position);
    assert_eq!(Vector3::new(0.0, 1.0, 0.0), data.vertices[0].normal);
    assert_eq!(Vector2::new(0.25, 0.875), data.vertices[0].uv);

    assert_eq!(1, data.meshes.len());
    assert_eq!(None, data.meshes[0].color);
    assert_eq!("model.mtl", data.meshes[0].material_file);

    assert_eq!(vec![Triangle { indices: [0, 0, 0] }], data.triangles);
}

#[test]
fn decode_geometry_indices_in_range() {
    let data = decode_geometry(&minimal_ply(0x0C54)).unwrap();
    assert_eq!(1, data.triangles.len());
    for triangle in &data.triangles {
        for i in triangle.indices {
            assert!((i as usize) < data.vertices.len());
        }
    }
}

#[test]
fn decode_geometry_every_truncation_fails() {
    let bytes = minimal_ply(0x0404);
    for len in 0..bytes.len() {
        assert!(
            matches!(
                decode_geometry(&bytes[..len]),
                Err(DecodeError::TruncatedInput { .. })
            ),
            "length {} did not fail",
            len
        );
    }
}

#[test]
fn decode_minimal_animation() {
    let data = decode_animation(&minimal_anm()).unwrap();

    assert_eq!(100, data.duration);
    assert_eq!(vec!["root".to_string()], data.bone_names);
    assert_eq!(1, data.keyframes.len());

    let keyframe = &data.keyframes[0];
    assert_eq!(10, keyframe.time);
    assert_eq!(1, keyframe.events.len());

    let event = &keyframe.events[0];
    assert_eq!(0, event.bone_index);
    assert_eq!(0x3, event.type_flags);
    assert_eq!(2, event.properties.len());
    assert_eq!(
        FrameProperty::Position(Position::new(1.0, 2.0, 3.0)),
        event.properties[0]
    );
    match event.properties[1] {
        FrameProperty::Quaternion(Quaternion { x, y, z, w }) => {
            assert_eq!((0.2, 0.4, 0.4), (x, y, z));
            // 1 - (0.04 + 0.16 + 0.16) = 0.64
            assert_relative_eq!(0.8, w, epsilon = 1e-6);
        }
        _ => panic!("Expected a quaternion"),
    }
}

#[test]
fn decode_animation_truncated_last_field() {
    let mut bytes = minimal_anm();
    bytes.pop();
    assert!(matches!(
        decode_animation(&bytes),
        Err(DecodeError::TruncatedInput { .. })
    ));
}

#[test]
fn decode_animation_from_bytes_matches() {
    let bytes = minimal_anm();
    assert_eq!(
        decode_animation(&bytes).unwrap(),
        AnmData::from_bytes(&bytes).unwrap()
    );
}

#[test]
fn decode_files_in_parallel() {
    let ply = minimal_ply(0x0406);
    let anm = minimal_anm();

    std::thread::scope(|s| {
        let model = s.spawn(|| decode_geometry(&ply).ok());
        let animation = s.spawn(|| decode_animation(&anm).ok());
        assert_eq!(1, model.join().unwrap().unwrap().vertices.len());
        assert_eq!(1, animation.join().unwrap().unwrap().keyframes.len());
    });
}
