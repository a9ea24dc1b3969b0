use crate::common::*;

/// Differentiable silhouette rasterizer.
///
/// `vertices` has shape `[B, V, 3]`, `faces` `[B, F, 3]` and `eyes` `[B, 3]`.
/// The camera list is positional: row `i` of `eyes` renders mesh `i`. The
/// result is a `[B, H, W]` soft silhouette with values in `[0, 1]`, and must
/// carry gradients back to `vertices`.
pub trait SilhouetteRenderer: Send {
    fn render_silhouettes(
        &mut self,
        vertices: &Tensor,
        faces: &Tensor,
        eyes: &Tensor,
    ) -> Result<Tensor>;
}

/// Non-differentiable mesh-to-occupancy conversion used at evaluation time.
///
/// `face_vertices` has shape `[B, F, 3, 3]` with coordinates already rescaled
/// into voxel index space. Returns `[B, G, G, G]` occupancy, float 0/1 when
/// `as_float` is set.
pub trait Voxelizer: Send {
    fn voxelize(&self, face_vertices: &Tensor, grid_size: i64, as_float: bool) -> Result<Tensor>;
}

/// A differentiable scalar penalty on reconstructed vertex positions.
///
/// Implementations are parameterized once at construction by the fixed
/// template topology (Laplacian smoothness, dihedral-angle flattening).
pub trait VertexRegularizer: Send {
    fn forward(&self, vertices: &Tensor) -> Tensor;
}
