// input parameters
pub const IMAGE_CHANNELS: i64 = 4;

// hyper-parameters: encoder
pub const ENCODER_BASE_CHANNELS: i64 = 64;
pub const ENCODER_FC_CHANNELS: i64 = 1024;
pub const LATENT_CHANNELS: i64 = 512;

// hyper-parameters: mesh decoder
pub const DECODER_FC_CHANNELS: i64 = 1024;
pub const CENTROID_SCALE: f64 = 0.1;
pub const BIAS_SCALE: f64 = 1.0;
pub const OBJ_SCALE: f64 = 0.5; // template pre-scale; keeps the logit re-parameterization defined

// evaluation
pub const VOXEL_GRID_SIZE: i64 = 32;
