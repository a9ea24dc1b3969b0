use crate::common::*;

/// Converts batched spherical camera coordinates to Cartesian eye positions.
///
/// Angles are in degrees. The convention matches the look-at renderer the
/// model is trained against: the camera at azimuth 0 sits on the negative z
/// axis looking at the origin, with y up.
///
/// `distances`, `elevations` and `azimuths` are rank-1 tensors of equal
/// length; the result has shape `[N, 3]`.
pub fn points_from_angles(distances: &Tensor, elevations: &Tensor, azimuths: &Tensor) -> Tensor {
    let elevations = elevations * (PI / 180.0);
    let azimuths = azimuths * (PI / 180.0);

    let x = distances * elevations.cos() * azimuths.sin();
    let y = distances * elevations.sin();
    let z = -(distances * elevations.cos() * azimuths.cos());

    Tensor::stack(&[x, y, z], 1)
}
