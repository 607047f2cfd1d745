//! OBJ file loader for 3D models
//!
//! Supports `v`, `vn`, `vt` and `f` records with 1-based or negative
//! (relative) indices. Polygons are fan-triangulated. Every face corner
//! becomes its own vertex, which keeps per-face normals intact.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use super::{AssetError, MeshLoader};
use crate::render::api::GraphicsDevice;
use crate::render::{MeshData, MeshResource, Vertex};

const DEFAULT_NORMAL: [f32; 3] = [0.0, 1.0, 0.0];

/// Reads Wavefront OBJ meshes
#[derive(Debug, Clone, Copy, Default)]
pub struct ObjMeshLoader;

impl ObjMeshLoader {
    /// Parse an OBJ file into CPU mesh data
    pub fn load_obj<P: AsRef<Path>>(path: P) -> Result<MeshData, AssetError> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);
        Self::parse(reader, &path.display().to_string())
    }

    /// Parse OBJ text from any reader; `source` names it in errors
    pub fn parse<R: BufRead>(reader: R, source: &str) -> Result<MeshData, AssetError> {
        let parse_error = |line: usize, message: &str| AssetError::Parse {
            path: source.to_string(),
            message: format!("line {}: {}", line, message),
        };

        let mut positions: Vec<[f32; 3]> = Vec::new();
        let mut normals: Vec<[f32; 3]> = Vec::new();
        let mut tex_coords: Vec<[f32; 2]> = Vec::new();
        let mut mesh = MeshData::default();

        for (number, line) in reader.lines().enumerate() {
            let line = line?;
            let number = number + 1;
            let mut parts = line.split_whitespace();
            let Some(tag) = parts.next() else {
                continue;
            };
            let fields: Vec<&str> = parts.collect();

            match tag {
                "v" => positions.push(parse_floats(&fields).ok_or_else(|| parse_error(number, "invalid vertex"))?),
                "vn" => normals.push(parse_floats(&fields).ok_or_else(|| parse_error(number, "invalid normal"))?),
                "vt" => {
                    tex_coords.push(parse_floats(&fields).ok_or_else(|| parse_error(number, "invalid texture coordinate"))?)
                }
                "f" => {
                    if fields.len() < 3 {
                        return Err(parse_error(number, "face needs at least three vertices"));
                    }
                    let first = mesh.vertices.len() as u32;
                    for corner in &fields {
                        let mut refs = corner.split('/');
                        let position = refs
                            .next()
                            .and_then(|r| resolve(r, positions.len()))
                            .and_then(|i| positions.get(i))
                            .ok_or_else(|| parse_error(number, "position index out of bounds"))?;
                        let tex_coord = refs
                            .next()
                            .and_then(|r| resolve(r, tex_coords.len()))
                            .and_then(|i| tex_coords.get(i))
                            .copied()
                            .unwrap_or([0.0, 0.0]);
                        let normal = refs
                            .next()
                            .and_then(|r| resolve(r, normals.len()))
                            .and_then(|i| normals.get(i))
                            .copied()
                            .unwrap_or(DEFAULT_NORMAL);
                        mesh.vertices.push(Vertex::new(*position, normal, tex_coord));
                    }
                    for i in 1..(fields.len() as u32 - 1) {
                        mesh.indices.extend_from_slice(&[first, first + i, first + i + 1]);
                    }
                }
                _ => {}
            }
        }

        if mesh.vertices.is_empty() {
            return Err(AssetError::Parse { path: source.to_string(), message: "no faces found".to_string() });
        }
        log::debug!("Parsed OBJ '{}': {} vertices, {} indices", source, mesh.vertices.len(), mesh.indices.len());
        Ok(mesh)
    }
}

impl MeshLoader for ObjMeshLoader {
    fn load_mesh(&self, device: &mut dyn GraphicsDevice, path: &Path) -> Result<MeshResource, AssetError> {
        let mesh = Self::load_obj(path)?;
        let label = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
        Ok(mesh.upload(device, &label)?)
    }
}

fn parse_floats<const N: usize>(fields: &[&str]) -> Option<[f32; N]> {
    let mut out = [0.0; N];
    for (slot, field) in out.iter_mut().zip(fields.get(..N)?) {
        *slot = field.parse().ok()?;
    }
    Some(out)
}

/// OBJ index to 0-based; negative indices count back from the end
fn resolve(reference: &str, len: usize) -> Option<usize> {
    if reference.is_empty() {
        return None;
    }
    let index: i64 = reference.parse().ok()?;
    match index {
        0 => None,
        i if i > 0 => Some(i as usize - 1),
        i => len.checked_sub(i.unsigned_abs() as usize),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const QUAD: &str = "\
# quad
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vn 0 0 1
vt 0 0
f 1/1/1 2/1/1 3/1/1 4/1/1
";

    #[test]
    fn test_quad_is_fan_triangulated() {
        let mesh = ObjMeshLoader::parse(Cursor::new(QUAD), "quad").expect("parse");
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.indices, vec![0, 1, 2, 0, 2, 3]);
        assert_eq!(mesh.vertices[2].position, [1.0, 1.0, 0.0]);
        assert_eq!(mesh.vertices[2].normal, [0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_negative_indices_and_missing_attributes() {
        let obj = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf -3 -2 -1\n";
        let mesh = ObjMeshLoader::parse(Cursor::new(obj), "tri").expect("parse");
        assert_eq!(mesh.indices, vec![0, 1, 2]);
        assert_eq!(mesh.vertices[0].normal, DEFAULT_NORMAL);
        assert_eq!(mesh.vertices[1].position, [1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_errors() {
        let out_of_bounds = "v 0 0 0\nf 1 2 3\n";
        assert!(matches!(
            ObjMeshLoader::parse(Cursor::new(out_of_bounds), "bad"),
            Err(AssetError::Parse { .. })
        ));
        assert!(ObjMeshLoader::parse(Cursor::new("v 0 0 0\n"), "empty").is_err());
        assert!(ObjMeshLoader::parse(Cursor::new("v 0 x 0\n"), "nan").is_err());
    }
}
