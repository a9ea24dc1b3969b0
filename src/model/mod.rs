mod decoder;
mod encoder;
mod model;
pub mod params;

pub use decoder::MeshDecoder;
pub use encoder::image_encoder;
pub use model::{
    align_voxel_axes, CrossViewOutput, ReconModel, ReconModelInit, SampleIou, VoxelEvaluation,
};
