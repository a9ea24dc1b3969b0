use crate::{camera, common::*, context::ExecutionContext};

/// Views rendered per object, at a fixed 15 degree azimuth step.
pub const NUM_VIEWS: usize = 24;
pub const AZIMUTH_STEP_DEG: f64 = 15.0;
pub const ELEVATION_DEG: f64 = 30.0;
pub const CAMERA_DISTANCE: f64 = 2.732;
pub const IMAGE_CHANNELS: usize = 4;

lazy_static::lazy_static! {
    /// ShapeNet synset ids and their readable names.
    pub static ref CLASS_NAMES: HashMap<&'static str, &'static str> = hashmap! {
        "02691156" => "Airplane",
        "02828884" => "Bench",
        "02933112" => "Cabinet",
        "02958343" => "Car",
        "03001627" => "Chair",
        "03211117" => "Display",
        "03636649" => "Lamp",
        "03691459" => "Loudspeaker",
        "04090263" => "Rifle",
        "04256520" => "Sofa",
        "04379243" => "Table",
        "04401088" => "Telephone",
        "04530566" => "Watercraft",
    };
}

/// Already-materialized arrays for one object class.
#[derive(Debug)]
pub struct ClassArrays {
    /// Raw byte pixels, shape `[num_objects * 24, 4, H, W]`.
    pub images: Array4<u8>,
    /// Occupancy grids, shape `[num_objects, G, G, G]`.
    pub voxels: Array4<f32>,
}

/// Builder validating and concatenating per-class arrays into one dataset.
///
/// Class order is significant: it fixes the running object offsets that the
/// flattened view indices are computed from.
#[derive(Debug)]
pub struct DatasetInit {
    pub classes: Vec<(String, ClassArrays)>,
    pub context: ExecutionContext,
}

impl DatasetInit {
    pub fn build(self) -> Result<Dataset> {
        let Self { classes, context } = self;
        ensure!(!classes.is_empty(), "dataset has no classes");

        let mut class_ids = vec![];
        let mut num_data = HashMap::new();
        let mut pos = HashMap::new();
        let mut image_arrays = vec![];
        let mut voxel_arrays = vec![];
        let mut count = 0;

        for (class_id, arrays) in &classes {
            let class_name = CLASS_NAMES
                .get(class_id.as_str())
                .ok_or_else(|| format_err!("unknown class id {}", class_id))?;
            info!("loading class {} ({})", class_id, class_name);

            let ClassArrays { images, voxels } = arrays;
            let (num_views, channels, height, width) = images.dim();
            ensure!(
                num_views % NUM_VIEWS == 0,
                "class {}: image count {} is not a multiple of {}",
                class_id,
                num_views,
                NUM_VIEWS
            );
            ensure!(
                channels == IMAGE_CHANNELS,
                "class {}: expected {} image channels, found {}",
                class_id,
                IMAGE_CHANNELS,
                channels
            );
            ensure!(
                height == width,
                "class {}: images must be square, found {}x{}",
                class_id,
                height,
                width
            );

            let num_objects = num_views / NUM_VIEWS;
            let (voxel_count, gx, gy, gz) = voxels.dim();
            ensure!(
                voxel_count == num_objects,
                "class {}: {} voxel grids for {} objects",
                class_id,
                voxel_count,
                num_objects
            );
            ensure!(
                gx == gy && gy == gz,
                "class {}: voxel grid is not cubic: {}x{}x{}",
                class_id,
                gx,
                gy,
                gz
            );

            class_ids.push(class_id.clone());
            num_data.insert(class_id.clone(), num_objects);
            pos.insert(class_id.clone(), count);
            count += num_objects;

            image_arrays.push(images.view());
            voxel_arrays.push(voxels.view());
        }

        let images = concatenate(Axis(0), &image_arrays)?;
        let voxels = concatenate(Axis(0), &voxel_arrays)?;

        Ok(Dataset {
            class_ids,
            images,
            voxels,
            num_data,
            pos,
            context,
        })
    }
}

/// One drawn training slot, before the arrays are gathered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleId {
    pub class_index: usize,
    pub object_index: usize,
    pub viewpoint_a: usize,
    pub viewpoint_b: usize,
}

/// Two aligned image batches with their camera positions.
#[derive(Debug, TensorLike)]
pub struct PairedViews {
    pub images_a: Tensor,
    pub images_b: Tensor,
    pub viewpoints_a: Tensor,
    pub viewpoints_b: Tensor,
}

#[derive(Debug, TensorLike)]
pub struct EvalBatch {
    pub images: Tensor,
    pub voxels: Tensor,
}

/// Immutable multi-class view/voxel collection.
///
/// Images of all classes live in one contiguous array; the flattened index of
/// a view is `(object_index + pos[class]) * 24 + viewpoint_index`.
#[derive(Debug)]
pub struct Dataset {
    class_ids: Vec<String>,
    images: Array4<u8>,
    voxels: Array4<f32>,
    num_data: HashMap<String, usize>,
    pos: HashMap<String, usize>,
    context: ExecutionContext,
}

impl Dataset {
    pub fn class_ids(&self) -> &[String] {
        &self.class_ids
    }

    /// (class id, readable name) pairs in load order.
    pub fn class_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.class_ids
            .iter()
            .map(|id| (id.as_str(), CLASS_NAMES[id.as_str()]))
    }

    pub fn num_objects(&self, class_id: &str) -> Result<usize> {
        self.num_data
            .get(class_id)
            .copied()
            .ok_or_else(|| format_err!("class {} is not loaded", class_id))
    }

    pub fn image_size(&self) -> i64 {
        self.images.dim().2 as i64
    }

    pub fn voxel_grid_size(&self) -> i64 {
        self.voxels.dim().1 as i64
    }

    /// Draws `batch_size` i.i.d. (class, object, viewpoint pair) triples.
    ///
    /// Every call is an independent sample; no epoch state is kept.
    pub fn sample_ids<R>(&self, rng: &mut R, batch_size: usize) -> Vec<SampleId>
    where
        R: Rng + ?Sized,
    {
        (0..batch_size)
            .map(|_| {
                let class_index = rng.gen_range(0..self.class_ids.len());
                let class_id = &self.class_ids[class_index];
                let object_index = rng.gen_range(0..self.num_data[class_id]);
                SampleId {
                    class_index,
                    object_index,
                    viewpoint_a: rng.gen_range(0..NUM_VIEWS),
                    viewpoint_b: rng.gen_range(0..NUM_VIEWS),
                }
            })
            .collect()
    }

    /// Samples a training batch of paired views.
    pub fn sample_pairs<R>(&self, rng: &mut R, batch_size: usize) -> Result<PairedViews>
    where
        R: Rng + ?Sized,
    {
        ensure!(batch_size > 0, "batch size must be positive");
        let ids = self.sample_ids(rng, batch_size);

        let data_ids_a: Vec<_> = ids
            .iter()
            .map(|id| self.data_id(id.class_index, id.object_index, id.viewpoint_a))
            .collect();
        let data_ids_b: Vec<_> = ids
            .iter()
            .map(|id| self.data_id(id.class_index, id.object_index, id.viewpoint_b))
            .collect();
        let viewpoint_ids_a: Vec<_> = ids.iter().map(|id| id.viewpoint_a).collect();
        let viewpoint_ids_b: Vec<_> = ids.iter().map(|id| id.viewpoint_b).collect();

        Ok(PairedViews {
            images_a: self.gather_images(&data_ids_a),
            images_b: self.gather_images(&data_ids_b),
            viewpoints_a: self.viewpoints(&viewpoint_ids_a),
            viewpoints_b: self.viewpoints(&viewpoint_ids_b),
        })
    }

    /// Enumerates every view of every object of one class, in ascending
    /// (object, viewpoint) order, chunked by `batch_size`.
    ///
    /// The final batch may be shorter; nothing is padded or dropped. Each call
    /// restarts the sequence from the beginning.
    pub fn eval_batches(&self, class_id: &str, batch_size: usize) -> Result<EvalBatches<'_>> {
        ensure!(batch_size > 0, "batch size must be positive");
        let num_objects = self.num_objects(class_id)?;
        let offset = self.pos[class_id];

        let data_ids = (0..num_objects)
            .cartesian_product(0..NUM_VIEWS)
            .map(|(object_index, viewpoint)| (object_index + offset) * NUM_VIEWS + viewpoint)
            .collect();

        Ok(EvalBatches {
            dataset: self,
            data_ids,
            batch_size,
            cursor: 0,
        })
    }

    fn data_id(&self, class_index: usize, object_index: usize, viewpoint: usize) -> usize {
        let offset = self.pos[&self.class_ids[class_index]];
        (object_index + offset) * NUM_VIEWS + viewpoint
    }

    fn gather_images(&self, data_ids: &[usize]) -> Tensor {
        let (_, channels, height, width) = self.images.dim();
        let mut pixels = Vec::with_capacity(data_ids.len() * channels * height * width);
        for &data_id in data_ids {
            let view = self.images.index_axis(Axis(0), data_id);
            pixels.extend(view.iter().map(|&value| value as f32 / 255.0));
        }

        Tensor::of_slice(&pixels)
            .view([
                data_ids.len() as i64,
                channels as i64,
                height as i64,
                width as i64,
            ])
            .to_device(self.context.device)
    }

    fn gather_voxels(&self, data_ids: &[usize]) -> Tensor {
        let grid_size = self.voxels.dim().1;
        let mut cells = Vec::with_capacity(data_ids.len() * grid_size * grid_size * grid_size);
        for &data_id in data_ids {
            // one voxel grid per object, shared by all of its 24 views
            let grid = self.voxels.index_axis(Axis(0), data_id / NUM_VIEWS);
            cells.extend(grid.iter().copied());
        }

        Tensor::of_slice(&cells)
            .view([
                data_ids.len() as i64,
                grid_size as i64,
                grid_size as i64,
                grid_size as i64,
            ])
            .to_device(self.context.device)
    }

    fn viewpoints(&self, viewpoint_ids: &[usize]) -> Tensor {
        let batch_size = viewpoint_ids.len();
        let distances = Tensor::of_slice(&vec![CAMERA_DISTANCE as f32; batch_size]);
        let elevations = Tensor::of_slice(&vec![ELEVATION_DEG as f32; batch_size]);
        let azimuths = Tensor::of_slice(
            &viewpoint_ids
                .iter()
                .map(|&id| -(id as f32) * AZIMUTH_STEP_DEG as f32)
                .collect::<Vec<_>>(),
        );

        camera::points_from_angles(&distances, &elevations, &azimuths)
            .to_device(self.context.device)
    }
}

pub struct EvalBatches<'a> {
    dataset: &'a Dataset,
    data_ids: Vec<usize>,
    batch_size: usize,
    cursor: usize,
}

impl Iterator for EvalBatches<'_> {
    type Item = EvalBatch;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= self.data_ids.len() {
            return None;
        }
        let end = (self.cursor + self.batch_size).min(self.data_ids.len());
        let chunk = &self.data_ids[self.cursor..end];
        self.cursor = end;

        Some(EvalBatch {
            images: self.dataset.gather_images(chunk),
            voxels: self.dataset.gather_voxels(chunk),
        })
    }
}
