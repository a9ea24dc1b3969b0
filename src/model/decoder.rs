use super::params;
use crate::{common::*, mesh::TemplateMesh};

/// Maps latent codes onto bounded deformations of the fixed template mesh.
///
/// The template is folded into a sign/logit re-parameterization at
/// construction; the network only predicts a per-vertex bias and a global
/// centroid, and the sigmoid recombination keeps every output vertex inside
/// the normalized cube no matter how large the raw predictions grow.
#[derive(Debug)]
pub struct MeshDecoder {
    fc1: nn::Linear,
    fc2: nn::Linear,
    fc_centroid: nn::Linear,
    fc_bias: nn::Linear,
    // non-trainable template buffers
    base_sign: Tensor,
    base_logit: Tensor,
    faces: Tensor,
    num_vertices: i64,
    centroid_scale: f64,
    bias_scale: f64,
}

impl MeshDecoder {
    pub fn new<'p, P>(path: P, template: &TemplateMesh, in_channels: i64) -> Result<Self>
    where
        P: Borrow<nn::Path<'p>>,
    {
        let path = path.borrow();
        let num_vertices = template.num_vertices();
        let dim = params::DECODER_FC_CHANNELS;

        let fc1 = nn::linear(path / "fc1", in_channels, dim, Default::default());
        let fc2 = nn::linear(path / "fc2", dim, dim * 2, Default::default());
        let fc_centroid = nn::linear(path / "fc_centroid", dim * 2, 3, Default::default());
        let fc_bias = nn::linear(path / "fc_bias", dim * 2, num_vertices * 3, Default::default());

        let base = template.vertices() * params::OBJ_SCALE;
        let magnitude = base.abs();
        let min = magnitude.min().double_value(&[]);
        let max = magnitude.max().double_value(&[]);
        ensure!(
            min > 0.0 && max < 1.0,
            "template vertex coordinates must scale into the open unit interval: \
             |v| * {} spans [{:.6}, {:.6}]",
            params::OBJ_SCALE,
            min,
            max
        );

        let base_sign = base.sign();
        let base_logit = (&magnitude / (magnitude.neg() + 1.0)).log();

        Ok(Self {
            fc1,
            fc2,
            fc_centroid,
            fc_bias,
            base_sign,
            base_logit,
            faces: template.faces().shallow_clone(),
            num_vertices,
            centroid_scale: params::CENTROID_SCALE,
            bias_scale: params::BIAS_SCALE,
        })
    }

    pub fn num_vertices(&self) -> i64 {
        self.num_vertices
    }

    /// `latent` is `[N, D]`; returns vertices `[N, V, 3]` and faces
    /// `[N, F, 3]`. The faces are the template's connectivity broadcast to
    /// the batch, carrying no gradient.
    pub fn forward(&self, latent: &Tensor) -> (Tensor, Tensor) {
        let batch_size = latent.size()[0];

        let hidden = latent.apply(&self.fc1).relu().apply(&self.fc2).relu();

        let centroid = (hidden.apply(&self.fc_centroid) * self.centroid_scale)
            .tanh()
            .unsqueeze(1); // [N, 1, 3]
        let bias = (hidden.apply(&self.fc_bias) * self.bias_scale).view([
            batch_size,
            self.num_vertices,
            3,
        ]);

        let scale_pos = centroid.neg() + 1.0;
        let scale_neg = &centroid + 1.0;

        let vertices = (&self.base_logit + bias).sigmoid() * &self.base_sign;
        let vertices = vertices.relu() * scale_pos - vertices.neg().relu() * scale_neg;
        let vertices = (vertices + centroid) * 0.5;

        let faces = self.faces.unsqueeze(0).repeat(&[batch_size, 1, 1]);
        (vertices, faces)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ExecutionContext;

    const TETRA_FACES: [[i64; 3]; 4] = [[0, 1, 2], [0, 3, 1], [0, 2, 3], [1, 3, 2]];

    fn tetrahedron() -> TemplateMesh {
        let vertices = [
            [0.5, 0.5, 0.5],
            [0.5, -0.5, -0.5],
            [-0.5, 0.5, -0.5],
            [-0.5, -0.5, 0.5],
        ];
        TemplateMesh::from_parts(&vertices, &TETRA_FACES, &ExecutionContext::cpu()).unwrap()
    }

    #[test]
    fn zero_weights_reproduce_the_scaled_template() {
        let vs = VarStore::new(Device::Cpu);
        let template = tetrahedron();
        let decoder = MeshDecoder::new(&vs.root(), &template, 512).unwrap();

        tch::no_grad(|| {
            for mut tensor in vs.trainable_variables() {
                let _ = tensor.zero_();
            }
        });

        let latent = Tensor::zeros(&[2, 512], (Kind::Float, Device::Cpu));
        let (vertices, faces) = decoder.forward(&latent);

        assert_eq!(vertices.size(), &[2, 4, 3]);
        assert_eq!(faces.size(), &[2, 4, 3]);

        // with zero bias and centroid the sign/logit algebra collapses to the
        // template scaled by obj_scale, halved once more at the output
        let expected = (template.vertices() * params::OBJ_SCALE * 0.5).unsqueeze(0);
        let error = (&vertices - &expected).abs().max().double_value(&[]);
        assert!(error < 1e-5, "max error {}", error);
    }

    #[test]
    fn vertices_stay_inside_the_unit_cube() {
        let vs = VarStore::new(Device::Cpu);
        let decoder = MeshDecoder::new(&vs.root(), &tetrahedron(), 512).unwrap();
        let latent = Tensor::rand(&[4, 512], (Kind::Float, Device::Cpu)) * 100.0;
        let (vertices, _faces) = decoder.forward(&latent);
        assert!(vertices.abs().max().double_value(&[]) <= 1.0);
    }

    #[test]
    fn template_on_the_logit_boundary_is_rejected() {
        // 2.0 * obj_scale == 1.0, where the logit is undefined
        let vertices = [
            [2.0, 0.5, 0.5],
            [0.5, -0.5, -0.5],
            [-0.5, 0.5, -0.5],
            [-0.5, -0.5, 0.5],
        ];
        let template =
            TemplateMesh::from_parts(&vertices, &TETRA_FACES, &ExecutionContext::cpu()).unwrap();
        let vs = VarStore::new(Device::Cpu);
        assert!(MeshDecoder::new(&vs.root(), &template, 512).is_err());
    }

    #[test]
    fn template_with_zero_coordinate_is_rejected() {
        let vertices = [
            [0.0, 0.5, 0.5],
            [0.5, -0.5, -0.5],
            [-0.5, 0.5, -0.5],
            [-0.5, -0.5, 0.5],
        ];
        let template =
            TemplateMesh::from_parts(&vertices, &TETRA_FACES, &ExecutionContext::cpu()).unwrap();
        let vs = VarStore::new(Device::Cpu);
        assert!(MeshDecoder::new(&vs.root(), &template, 512).is_err());
    }
}
