use super::{decoder::MeshDecoder, encoder, params};
use crate::{
    common::*,
    mesh::{self, TemplateMesh},
    objective::{Source, CROSS_VIEW_PASSES},
    render::{SilhouetteRenderer, VertexRegularizer, Voxelizer},
};

/// The four rendered silhouettes in `CROSS_VIEW_PASSES` order plus the mesh
/// regularizers, one training forward pass.
#[derive(Debug, TensorLike)]
pub struct CrossViewOutput {
    pub silhouettes: Vec<Tensor>,
    pub laplacian_loss: Tensor,
    pub flatten_loss: Tensor,
}

/// Per-sample outcome of voxel IoU evaluation.
///
/// A sample whose target and prediction are both empty has no defined ratio
/// and is tagged instead of folded into a silent NaN; an external operator
/// failure is carried with the sample position so the rest of the batch still
/// reports.
#[derive(Debug)]
pub enum SampleIou {
    Value(f64),
    EmptyBoth,
    Failed(Error),
}

impl SampleIou {
    /// Numeric view: NaN for both-empty, NaN for failures.
    pub fn value(&self) -> f64 {
        match self {
            SampleIou::Value(value) => *value,
            SampleIou::EmptyBoth | SampleIou::Failed(_) => f64::NAN,
        }
    }

    pub fn is_value(&self) -> bool {
        matches!(self, SampleIou::Value(_))
    }
}

#[derive(Debug)]
pub struct VoxelEvaluation {
    pub samples: Vec<SampleIou>,
    pub vertices: Tensor,
    pub faces: Tensor,
}

impl VoxelEvaluation {
    /// Mean over samples with a defined ratio; `None` when every sample is
    /// flagged.
    pub fn mean_iou(&self) -> Option<f64> {
        let values: Vec<_> = self
            .samples
            .iter()
            .filter(|sample| sample.is_value())
            .map(SampleIou::value)
            .collect();
        if values.is_empty() {
            None
        } else {
            Some(values.iter().sum::<f64>() / values.len() as f64)
        }
    }
}

/// Fixed coordinate-frame fix between the voxelizer's output convention and
/// the stored target grids: swap the first two spatial axes, then mirror the
/// last one. Preserved as-is from the data pipeline; do not "correct" it.
pub fn align_voxel_axes(voxels: &Tensor) -> Tensor {
    voxels.permute(&[0, 2, 1, 3]).flip(&[3])
}

#[derive(Debug, Clone)]
pub struct ReconModelInit {
    pub image_size: i64,
    pub latent_channels: i64,
    pub voxel_grid_size: i64,
}

impl ReconModelInit {
    pub fn new(image_size: i64) -> Self {
        Self {
            image_size,
            latent_channels: params::LATENT_CHANNELS,
            voxel_grid_size: params::VOXEL_GRID_SIZE,
        }
    }

    pub fn build<'p, P>(
        self,
        path: P,
        template: TemplateMesh,
        renderer: Box<dyn SilhouetteRenderer>,
        voxelizer: Box<dyn Voxelizer>,
        laplacian: Box<dyn VertexRegularizer>,
        flatten: Box<dyn VertexRegularizer>,
    ) -> Result<ReconModel>
    where
        P: Borrow<nn::Path<'p>>,
    {
        let path = path.borrow();
        let Self {
            image_size,
            latent_channels,
            voxel_grid_size,
        } = self;

        ensure!(image_size > 0, "image size must be positive");
        ensure!(latent_channels > 0, "latent width must be positive");
        ensure!(voxel_grid_size > 0, "voxel grid size must be positive");

        let encoder = encoder::image_encoder(path / "encoder", image_size, latent_channels);
        let decoder = MeshDecoder::new(path / "decoder", &template, latent_channels)?;

        Ok(ReconModel {
            encoder,
            decoder,
            renderer,
            voxelizer,
            laplacian,
            flatten,
            voxel_grid_size,
        })
    }
}

/// Encoder–decoder mesh reconstruction with cross-view silhouette rendering.
pub struct ReconModel {
    encoder: Box<dyn Fn(&Tensor, bool) -> Tensor + Send>,
    decoder: MeshDecoder,
    renderer: Box<dyn SilhouetteRenderer>,
    voxelizer: Box<dyn Voxelizer>,
    laplacian: Box<dyn VertexRegularizer>,
    flatten: Box<dyn VertexRegularizer>,
    voxel_grid_size: i64,
}

impl ReconModel {
    /// Encodes a batch of images and decodes it into deformed template
    /// meshes.
    pub fn reconstruct(&self, images: &Tensor, train: bool) -> (Tensor, Tensor) {
        let latent = (self.encoder)(images, train);
        self.decoder.forward(&latent)
    }

    /// One training forward pass over a paired batch.
    ///
    /// Both image batches are encoded and decoded together; the 2N meshes are
    /// then arranged into a 4N rendering batch following `CROSS_VIEW_PASSES`
    /// and rasterized in a single renderer call, so every mesh is rendered
    /// from its own camera and from its counterpart's.
    pub fn predict_multiview(
        &mut self,
        images_a: &Tensor,
        images_b: &Tensor,
        viewpoints_a: &Tensor,
        viewpoints_b: &Tensor,
        train: bool,
    ) -> Result<CrossViewOutput> {
        let (batch_size, _channels, _height, _width) = images_a.size4()?;
        {
            let (other, ..) = images_b.size4()?;
            ensure!(other == batch_size, "paired image batches differ in size");
        }
        for viewpoints in [viewpoints_a, viewpoints_b] {
            let (other, coords) = viewpoints.size2()?;
            ensure!(
                other == batch_size && coords == 3,
                "viewpoints must have shape [{}, 3]",
                batch_size
            );
        }

        let images = Tensor::cat(&[images_a, images_b], 0);
        let (vertices, faces) = self.reconstruct(&images, train);

        let laplacian_loss = self.laplacian.forward(&vertices);
        let flatten_loss = self.flatten.forward(&vertices);

        let (pass_vertices, pass_faces, pass_eyes): (Vec<_>, Vec<_>, Vec<_>) = CROSS_VIEW_PASSES
            .iter()
            .map(|pass| {
                let offset = match pass.mesh {
                    Source::A => 0,
                    Source::B => batch_size,
                };
                let eyes = match pass.eye {
                    Source::A => viewpoints_a.shallow_clone(),
                    Source::B => viewpoints_b.shallow_clone(),
                };
                (
                    vertices.narrow(0, offset, batch_size),
                    faces.narrow(0, offset, batch_size),
                    eyes,
                )
            })
            .multiunzip();

        let silhouettes = self.renderer.render_silhouettes(
            &Tensor::cat(&pass_vertices, 0),
            &Tensor::cat(&pass_faces, 0),
            &Tensor::cat(&pass_eyes, 0),
        )?;
        let silhouettes = silhouettes.chunk(CROSS_VIEW_PASSES.len() as i64, 0);

        Ok(CrossViewOutput {
            silhouettes,
            laplacian_loss,
            flatten_loss,
        })
    }

    /// Test-time metric: reconstructs, voxelizes each sample and compares it
    /// against the target occupancy grid.
    ///
    /// Voxelization runs per sample so a failing mesh only flags its own
    /// slot. The IoU here is deliberately epsilon-free.
    pub fn evaluate_iou(&self, images: &Tensor, voxels: &Tensor) -> Result<VoxelEvaluation> {
        let (batch_size, ..) = images.size4()?;
        {
            let (other, gx, gy, gz) = voxels.size4()?;
            ensure!(other == batch_size, "voxel batch differs from image batch");
            ensure!(
                gx == self.voxel_grid_size && gy == gx && gz == gx,
                "expected {0}x{0}x{0} voxel targets",
                self.voxel_grid_size
            );
        }

        let (vertices, faces) = self.reconstruct(images, false);

        let grid_size = self.voxel_grid_size;
        let face_vertices = mesh::face_vertices(&vertices, &faces)
            * ((grid_size - 1) as f64 / grid_size as f64)
            + 0.5;

        let samples = (0..batch_size)
            .map(|index| {
                let sample_faces = face_vertices.narrow(0, index, 1);
                let target = voxels.narrow(0, index, 1);

                let predicted = match self.voxelizer.voxelize(&sample_faces, grid_size, false) {
                    Ok(predicted) => predicted,
                    Err(err) => return SampleIou::Failed(err),
                };
                let predicted = align_voxel_axes(&predicted)
                    .to_kind(Kind::Float)
                    .to_device(target.device());

                let intersect = (&target * &predicted).sum(Kind::Float).double_value(&[]);
                let union = (&target + &predicted)
                    .gt(0.)
                    .sum(Kind::Float)
                    .double_value(&[]);

                if union == 0.0 {
                    SampleIou::EmptyBoth
                } else {
                    SampleIou::Value(intersect / union)
                }
            })
            .collect();

        Ok(VoxelEvaluation {
            samples,
            vertices,
            faces,
        })
    }
}
