//! Single-view 3D mesh reconstruction trained with multi-view silhouette
//! supervision.
//!
//! An image encoder maps a 4-channel silhouette image to a latent code, a
//! decoder deforms a fixed template mesh from it, and training renders each
//! reconstruction from two cameras at once so that cross-view silhouette IoU
//! supervises the shape without any 3D labels. The differentiable rasterizer,
//! the voxelizer and the mesh regularizers are consumed behind the traits in
//! [`render`].

pub mod camera;
pub mod common;
pub mod config;
pub mod context;
pub mod dataset;
pub mod mesh;
pub mod model;
pub mod objective;
pub mod render;
