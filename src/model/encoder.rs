use super::params;
use crate::common::*;

/// Builds the silhouette image encoder.
///
/// Three strided conv + batch-norm + ReLU stages halve the spatial side each
/// (rounding up), then three fully-connected ReLU layers produce the latent
/// code. Input is `[N, 4, s, s]` with `s == image_size`; output is
/// `[N, latent_channels]`. Deterministic given weights; the train flag only
/// switches batch-norm statistics.
pub fn image_encoder<'p, P>(
    path: P,
    image_size: i64,
    latent_channels: i64,
) -> Box<dyn Fn(&Tensor, bool) -> Tensor + Send>
where
    P: Borrow<nn::Path<'p>>,
{
    let path = path.borrow();

    let conv_config = || nn::ConvConfig {
        stride: 2,
        padding: 2,
        ..Default::default()
    };

    let dim1 = params::ENCODER_BASE_CHANNELS;
    let dim2 = params::ENCODER_FC_CHANNELS;

    let conv1 = nn::conv2d(path / "conv1", params::IMAGE_CHANNELS, dim1, 5, conv_config());
    let conv2 = nn::conv2d(path / "conv2", dim1, dim1 * 2, 5, conv_config());
    let conv3 = nn::conv2d(path / "conv3", dim1 * 2, dim1 * 4, 5, conv_config());

    let bn1 = nn::batch_norm2d(path / "bn1", dim1, Default::default());
    let bn2 = nn::batch_norm2d(path / "bn2", dim1 * 2, Default::default());
    let bn3 = nn::batch_norm2d(path / "bn3", dim1 * 4, Default::default());

    // the flatten width is fixed by the conv stack: three ceil-halvings
    let downsampled = (image_size + 7) / 8;
    let fc1 = nn::linear(
        path / "fc1",
        dim1 * 4 * downsampled * downsampled,
        dim2,
        Default::default(),
    );
    let fc2 = nn::linear(path / "fc2", dim2, dim2, Default::default());
    let fc3 = nn::linear(path / "fc3", dim2, latent_channels, Default::default());

    Box::new(move |images, train| {
        let batch_size = images.size()[0];

        let mut net = images.apply(&conv1).apply_t(&bn1, train).relu();
        net = net.apply(&conv2).apply_t(&bn2, train).relu();
        net = net.apply(&conv3).apply_t(&bn3, train).relu();

        net = net.view([batch_size, -1]);
        net = net.apply(&fc1).relu();
        net = net.apply(&fc2).relu();
        net.apply(&fc3).relu()
    })
}
