use std::{fs, path::Path};

use indexmap::IndexSet;
use nalgebra::Unit;
use thiserror::Error;

use crate::geometry::{
    BarycentricCoordinates, FloatType, TexturePoint, Triangle, WorldBox, WorldPoint, WorldVector,
};

/// Per-vertex data of the model.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Vertex {
    pub position: WorldPoint,
    /// Zero if the mesh doesn't provide normals.
    pub normal: WorldVector,
    pub texture_coords: TexturePoint,
}

impl Vertex {
    pub fn at(position: WorldPoint) -> Vertex {
        Vertex {
            position,
            normal: WorldVector::zeros(),
            texture_coords: TexturePoint::origin(),
        }
    }
}

/// Triangle as handed to the BVH builder.
/// The builder only ever moves whole triangles around, it never modifies them.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MeshTriangle {
    pub vertices: Triangle<Vertex>,
    pub material: usize,
}

impl MeshTriangle {
    /// Triangle without normals or texture coordinates, using material 0.
    pub fn from_positions(a: WorldPoint, b: WorldPoint, c: WorldPoint) -> MeshTriangle {
        MeshTriangle {
            vertices: Triangle::new(Vertex::at(a), Vertex::at(b), Vertex::at(c)),
            material: 0,
        }
    }

    pub fn positions(&self) -> Triangle<WorldPoint> {
        self.vertices.map(|v| v.position)
    }

    pub fn bounding_box(&self) -> WorldBox {
        WorldBox::from_points(self.vertices.iter().map(|v| &v.position))
    }

    /// Interpolated vertex normal, falls back to the geometric normal if any vertex lacks one.
    pub fn shading_normal(&self, uv: &BarycentricCoordinates<FloatType>) -> Unit<WorldVector> {
        let flat_shading = self
            .vertices
            .iter()
            .any(|v| v.normal.norm_squared() == 0.0);
        Unit::new_normalize(if flat_shading {
            self.positions().normal()
        } else {
            uv.interpolate_triangle(&self.vertices.map(|v| v.normal))
        })
    }
}

#[derive(Debug, Error)]
pub enum ObjOpenError {
    #[error("Failed to read file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse file: {0}")]
    ParseError(#[from] wavefront_obj::ParseError),
}

/// Mesh loaded from a Wavefront OBJ file, flattened to independent triangles.
#[derive(Clone, Debug, Default)]
pub struct Mesh {
    pub triangles: Vec<MeshTriangle>,
    /// Material names, `MeshTriangle::material` indexes into this.
    /// Geometry without a material uses an empty name.
    pub materials: Vec<String>,
}

impl Mesh {
    pub fn with_obj(p: impl AsRef<Path>) -> Result<Mesh, ObjOpenError> {
        let content = fs::read_to_string(p)?;
        Self::parse_obj(content)
    }

    pub fn parse_obj(content: impl Into<String>) -> Result<Mesh, ObjOpenError> {
        let parsed = wavefront_obj::obj::parse(content.into())?;
        Ok(Self::load_obj(parsed))
    }

    fn load_obj(obj: wavefront_obj::obj::ObjSet) -> Mesh {
        let mut triangles = Vec::new();
        let mut materials = IndexSet::new();

        for o in obj.objects.into_iter() {
            for geometry in o.geometry {
                let mut material = None;

                for shape in geometry.shapes {
                    let wavefront_obj::obj::Primitive::Triangle(a, b, c) = shape.primitive else {
                        log::warn!("Skipping non-triangle primitive in object {:?}", o.name);
                        continue;
                    };

                    let vertex = |vtindex: (usize, Option<usize>, Option<usize>)| {
                        let position = &o.vertices[vtindex.0];
                        let tex_vertex = vtindex.1.map(|i| &o.tex_vertices[i]);
                        let normal = vtindex.2.map(|i| &o.normals[i]);
                        Vertex {
                            position: WorldPoint::new(
                                position.x as f32,
                                position.y as f32,
                                position.z as f32,
                            ),
                            normal: normal.map_or_else(WorldVector::zeros, |v| {
                                WorldVector::new(v.x as f32, v.y as f32, v.z as f32).normalize()
                            }),
                            texture_coords: tex_vertex.map_or_else(TexturePoint::origin, |v| {
                                TexturePoint::new(v.u as f32, v.v as f32)
                            }),
                        }
                    };

                    // Materials are only registered once they are used by a triangle
                    let material = *material.get_or_insert_with(|| {
                        let name = geometry.material_name.clone().unwrap_or_default();
                        materials.insert_full(name).0
                    });

                    triangles.push(MeshTriangle {
                        vertices: Triangle::new(vertex(a), vertex(b), vertex(c)),
                        material,
                    });
                }
            }
        }

        Mesh {
            triangles,
            materials: materials.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use assert2::{assert, let_assert};

    const TWO_QUADS: &str = "\
o quads
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vn 0 0 1
usemtl red
f 1//1 2//1 3//1
f 1//1 3//1 4//1
usemtl blue
f 1 2 4
l 1 2
";

    #[test]
    fn parse_triangles_and_materials() {
        let_assert!(Ok(mesh) = Mesh::parse_obj(TWO_QUADS));
        assert!(mesh.triangles.len() == 3);
        assert!(mesh.materials == vec!["red".to_string(), "blue".to_string()]);
        assert!(mesh.triangles[0].material == 0);
        assert!(mesh.triangles[2].material == 1);
        assert!(mesh.triangles[1].vertices[2].position == WorldPoint::new(0.0, 1.0, 0.0));
        assert!(mesh.triangles[0].vertices[0].normal == WorldVector::new(0.0, 0.0, 1.0));
        assert!(mesh.triangles[2].vertices[0].normal == WorldVector::zeros());
    }

    #[test]
    fn parse_error_is_reported() {
        let_assert!(Err(ObjOpenError::ParseError(_)) = Mesh::parse_obj("v 1 2 abc\n"));
    }

    #[test]
    fn missing_file_is_reported() {
        let_assert!(Err(ObjOpenError::ReadError(_)) = Mesh::with_obj("/nonexistent/mesh.obj"));
    }

    #[test]
    fn shading_normal_falls_back_to_geometric() {
        let t = MeshTriangle::from_positions(
            WorldPoint::new(0.0, 0.0, 0.0),
            WorldPoint::new(1.0, 0.0, 0.0),
            WorldPoint::new(0.0, 1.0, 0.0),
        );
        let n = t.shading_normal(&BarycentricCoordinates { u: 0.2, v: 0.2 });
        assert!(*n.as_ref() == WorldVector::new(0.0, 0.0, 1.0));
        assert!(t.bounding_box() == t.positions().bounding_box());
    }
}
