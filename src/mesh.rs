use crate::{common::*, context::ExecutionContext};
use wavefront_obj::obj::{self, Primitive};

/// The fixed triangle mesh every reconstruction deforms.
///
/// Face connectivity is shared by all samples for the lifetime of the model;
/// only vertex positions are ever predicted. Tensors are shared by shallow
/// clone, never copied per batch.
#[derive(Debug)]
pub struct TemplateMesh {
    vertices: Tensor,
    faces: Tensor,
}

impl TemplateMesh {
    /// Loads a triangulated Wavefront OBJ file.
    pub fn from_obj<P>(path: P, context: &ExecutionContext) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|err| format_err!("cannot read template mesh {}: {}", path.display(), err))?;
        let obj_set = obj::parse(text)
            .map_err(|err| format_err!("malformed template mesh {}: {:?}", path.display(), err))?;

        let mut vertices: Vec<f32> = vec![];
        let mut faces: Vec<i64> = vec![];

        for object in &obj_set.objects {
            for vertex in &object.vertices {
                vertices.extend([vertex.x as f32, vertex.y as f32, vertex.z as f32]);
            }
            for geometry in &object.geometry {
                for shape in &geometry.shapes {
                    match shape.primitive {
                        Primitive::Triangle(a, b, c) => {
                            faces.extend([a.0 as i64, b.0 as i64, c.0 as i64]);
                        }
                        _ => bail!(
                            "template mesh {} contains non-triangle primitives",
                            path.display()
                        ),
                    }
                }
            }
        }

        let num_vertices = vertices.len() as i64 / 3;
        let num_faces = faces.len() as i64 / 3;
        let vertices = Tensor::of_slice(&vertices)
            .view([num_vertices, 3])
            .to_kind(context.kind)
            .to_device(context.device);
        let faces = Tensor::of_slice(&faces)
            .view([num_faces, 3])
            .to_device(context.device);

        Self::new(vertices, faces)
    }

    /// Builds a template from explicit vertex and face arrays.
    pub fn from_parts(
        vertices: &[[f32; 3]],
        faces: &[[i64; 3]],
        context: &ExecutionContext,
    ) -> Result<Self> {
        let flat_vertices: Vec<f32> = vertices.iter().flatten().copied().collect();
        let flat_faces: Vec<i64> = faces.iter().flatten().copied().collect();

        let vertices = Tensor::of_slice(&flat_vertices)
            .view([vertices.len() as i64, 3])
            .to_kind(context.kind)
            .to_device(context.device);
        let faces = Tensor::of_slice(&flat_faces)
            .view([faces.len() as i64, 3])
            .to_device(context.device);

        Self::new(vertices, faces)
    }

    fn new(vertices: Tensor, faces: Tensor) -> Result<Self> {
        let num_vertices = vertices.size()[0];
        let num_faces = faces.size()[0];
        ensure!(num_vertices > 0, "template mesh has no vertices");
        ensure!(num_faces > 0, "template mesh has no faces");

        let min_index = faces.min().int64_value(&[]);
        let max_index = faces.max().int64_value(&[]);
        ensure!(
            min_index >= 0 && max_index < num_vertices,
            "face index out of range: {} not in [0, {})",
            if min_index < 0 { min_index } else { max_index },
            num_vertices
        );

        Ok(Self { vertices, faces })
    }

    pub fn num_vertices(&self) -> i64 {
        self.vertices.size()[0]
    }

    pub fn num_faces(&self) -> i64 {
        self.faces.size()[0]
    }

    /// Vertex positions, shape `[V, 3]`.
    pub fn vertices(&self) -> &Tensor {
        &self.vertices
    }

    /// Face index triples, shape `[F, 3]`, int64.
    pub fn faces(&self) -> &Tensor {
        &self.faces
    }
}

/// Expands face index triples into explicit per-face vertex coordinates.
///
/// `vertices` has shape `[N, V, 3]`, `faces` `[N, F, 3]`; the result is
/// `[N, F, 3, 3]` with the last two axes being (corner, xyz).
pub fn face_vertices(vertices: &Tensor, faces: &Tensor) -> Tensor {
    let (batch_size, _num_vertices, _) = vertices.size3().unwrap();
    let (faces_batch, num_faces, _) = faces.size3().unwrap();
    debug_assert_eq!(batch_size, faces_batch);

    let index = faces
        .view([batch_size, num_faces * 3, 1])
        .expand(&[batch_size, num_faces * 3, 3], true);
    vertices
        .gather(1, &index, false)
        .view([batch_size, num_faces, 3, 3])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> ExecutionContext {
        ExecutionContext::cpu()
    }

    #[test]
    fn from_parts_checks_face_range() {
        let vertices = [[0.5, 0.5, 0.5], [-0.5, 0.5, -0.5], [0.5, -0.5, -0.5]];
        let ok = TemplateMesh::from_parts(&vertices, &[[0, 1, 2]], &context());
        assert!(ok.is_ok());

        let bad = TemplateMesh::from_parts(&vertices, &[[0, 1, 3]], &context());
        assert!(bad.is_err());
    }

    #[test]
    fn face_vertices_gathers_corners() {
        let vertices = Tensor::of_slice(&[
            0.0f32, 0.0, 0.0, // v0
            1.0, 0.0, 0.0, // v1
            0.0, 1.0, 0.0, // v2
            0.0, 0.0, 1.0, // v3
        ])
        .view([1, 4, 3]);
        let faces = Tensor::of_slice(&[0i64, 1, 2, 1, 2, 3]).view([1, 2, 3]);

        let expanded = face_vertices(&vertices, &faces);
        assert_eq!(expanded.size(), &[1, 2, 3, 3]);
        // second face, third corner is v3
        assert_eq!(expanded.double_value(&[0, 1, 2, 2]), 1.0);
        assert_eq!(expanded.double_value(&[0, 1, 2, 0]), 0.0);
    }
}
