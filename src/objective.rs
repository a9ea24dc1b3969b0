use crate::common::*;

/// Epsilon keeping the training IoU finite when both silhouettes are empty.
pub const IOU_EPS: f64 = 1e-6;

/// Which of the two paired inputs a mesh or camera comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    A,
    B,
}

/// One silhouette rendering: a reconstructed mesh seen through one camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrossViewPass {
    pub mesh: Source,
    pub eye: Source,
}

/// The fixed four-way cross-rendering layout, in batch order.
///
/// Passes 0 and 3 are self-consistency (a mesh rendered from its own source
/// camera), passes 1 and 2 are cross-view. The supervision target of a pass is
/// always the silhouette of the image whose `eye` renders it.
pub const CROSS_VIEW_PASSES: [CrossViewPass; 4] = [
    CrossViewPass {
        mesh: Source::A,
        eye: Source::A,
    },
    CrossViewPass {
        mesh: Source::B,
        eye: Source::A,
    },
    CrossViewPass {
        mesh: Source::A,
        eye: Source::B,
    },
    CrossViewPass {
        mesh: Source::B,
        eye: Source::B,
    },
];

/// Soft intersection-over-union between silhouette batches.
///
/// Both inputs have shape `[N, ...]` with values in `[0, 1]`. Intersection and
/// union are reduced over all non-batch axes; the result is the mean of the
/// per-sample ratios, a scalar in `[0, 1]`.
pub fn iou(predict: &Tensor, target: &Tensor) -> Tensor {
    let batch_size = predict.size()[0];
    let predict = predict.view([batch_size, -1]);
    let target = target.view([batch_size, -1]);

    let intersect = (&predict * &target).sum_dim_intlist(&[1], false, Kind::Float);
    let union =
        (&predict + &target - &predict * &target).sum_dim_intlist(&[1], false, Kind::Float)
            + IOU_EPS;

    (intersect / union).sum(Kind::Float) / batch_size as f64
}

pub fn iou_loss(predict: &Tensor, target: &Tensor) -> Tensor {
    iou(predict, target).neg() + 1.0
}

/// Averages the four cross-view IoU losses.
///
/// `predicts` holds the rendered silhouettes in `CROSS_VIEW_PASSES` order;
/// `images_a`/`images_b` are the source RGBA batches whose alpha channels are
/// the supervision targets. The literal 4-term average is load-bearing: the
/// loss is not symmetric under reordering of the passes.
pub fn multiview_iou_loss(predicts: &[Tensor], images_a: &Tensor, images_b: &Tensor) -> Tensor {
    assert_eq!(predicts.len(), CROSS_VIEW_PASSES.len());

    let targets_a = images_a.select(1, 3);
    let targets_b = images_b.select(1, 3);

    let total = CROSS_VIEW_PASSES
        .iter()
        .zip(predicts.iter())
        .fold(None, |sum, (pass, predict)| {
            let target = match pass.eye {
                Source::A => &targets_a,
                Source::B => &targets_b,
            };
            let term = iou_loss(predict, target);
            Some(match sum {
                Some(sum) => sum + term,
                None => term,
            })
        })
        .unwrap();

    total / 4.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn random_mask(batch_size: i64) -> Tensor {
        Tensor::rand(&[batch_size, 8, 8], (Kind::Float, Device::Cpu))
    }

    #[test]
    fn iou_of_mask_with_itself_is_one() {
        let mask = random_mask(3);
        let value = iou(&mask, &mask).double_value(&[]);
        assert!((value - 1.0).abs() < 1e-4, "iou(x, x) = {}", value);
    }

    #[test]
    fn iou_stays_in_unit_interval() {
        for _ in 0..10 {
            let value = iou(&random_mask(2), &random_mask(2)).double_value(&[]);
            assert!((0.0..=1.0).contains(&value), "iou = {}", value);
        }
    }

    #[test]
    fn iou_of_empty_masks_is_finite_zero() {
        let empty = Tensor::zeros(&[2, 8, 8], (Kind::Float, Device::Cpu));
        let value = iou(&empty, &empty).double_value(&[]);
        assert!(value.is_finite());
        assert!(value.abs() < 1e-6);
    }

    #[test]
    fn iou_averages_per_sample_ratios() {
        // sample 0 matches perfectly, sample 1 misses everything
        let predict = Tensor::of_slice(&[1.0f32, 1.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0]).view([2, 4]);
        let target = Tensor::ones(&[2, 4], (Kind::Float, Device::Cpu));
        let value = iou(&predict, &target).double_value(&[]);
        assert!((value - 0.5).abs() < 1e-4, "iou = {}", value);
    }

    #[test]
    fn iou_loss_complements_iou() {
        let predict = random_mask(2);
        let target = random_mask(2);
        let value = iou(&predict, &target).double_value(&[]);
        let loss = iou_loss(&predict, &target).double_value(&[]);
        assert!((value + loss - 1.0).abs() < 1e-6);
    }

    fn rgba_with_alpha(alpha: &Tensor) -> Tensor {
        let (batch_size, height, width) = alpha.size3().unwrap();
        let images = Tensor::zeros(&[batch_size, 4, height, width], (Kind::Float, Device::Cpu));
        let mut channel = images.narrow(1, 3, 1);
        channel.copy_(&alpha.view([batch_size, 1, height, width]));
        images
    }

    #[test]
    fn multiview_loss_is_the_literal_four_term_average() {
        let alpha_a = random_mask(2);
        let alpha_b = random_mask(2);
        let images_a = rgba_with_alpha(&alpha_a);
        let images_b = rgba_with_alpha(&alpha_b);
        let predicts: Vec<_> = (0..4).map(|_| random_mask(2)).collect();

        let loss = multiview_iou_loss(&predicts, &images_a, &images_b).double_value(&[]);
        let manual = (iou_loss(&predicts[0], &alpha_a).double_value(&[])
            + iou_loss(&predicts[1], &alpha_a).double_value(&[])
            + iou_loss(&predicts[2], &alpha_b).double_value(&[])
            + iou_loss(&predicts[3], &alpha_b).double_value(&[]))
            / 4.0;
        assert!((loss - manual).abs() < 1e-6);

        // swapping the two cross-view predictions moves their targets: the
        // averaging order is positional, not symmetric
        let swapped = vec![
            predicts[0].shallow_clone(),
            predicts[2].shallow_clone(),
            predicts[1].shallow_clone(),
            predicts[3].shallow_clone(),
        ];
        let swapped_loss = multiview_iou_loss(&swapped, &images_a, &images_b).double_value(&[]);
        assert!((loss - swapped_loss).abs() > 1e-8);
    }

    #[test]
    fn multiview_loss_collapses_for_identical_pairs() {
        let alpha = random_mask(2);
        let images = rgba_with_alpha(&alpha);
        let predict = random_mask(2);
        let predicts: Vec<_> = (0..4).map(|_| predict.shallow_clone()).collect();

        let loss = multiview_iou_loss(&predicts, &images, &images).double_value(&[]);
        let single = iou_loss(&predict, &alpha).double_value(&[]);
        assert!((loss - single).abs() < 1e-6);
    }

    #[test]
    fn pass_table_interleaves_meshes_and_repeats_eyes() {
        let meshes: Vec<_> = CROSS_VIEW_PASSES.iter().map(|pass| pass.mesh).collect();
        let eyes: Vec<_> = CROSS_VIEW_PASSES.iter().map(|pass| pass.eye).collect();
        assert_eq!(meshes, [Source::A, Source::B, Source::A, Source::B]);
        assert_eq!(eyes, [Source::A, Source::A, Source::B, Source::B]);
    }
}
