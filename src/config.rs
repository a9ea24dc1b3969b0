use crate::{common::*, context::ExecutionContext, dataset::CLASS_NAMES};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub dataset: DatasetSection,
    pub model: ModelSection,
    #[serde(default = "default_device")]
    pub device: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetSection {
    pub class_ids: Vec<String>,
    pub batch_size: NonZeroUsize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSection {
    pub template_obj: PathBuf,
    pub image_size: i64,
    pub encoder_out_channels: i64,
    pub decoder_in_channels: i64,
    pub voxel_grid_size: i64,
}

impl Config {
    pub fn open<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let text = fs::read_to_string(path)?;
        let config: Self = json5::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Fatal construction-time checks; nothing is partially initialized on
    /// failure.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            !self.dataset.class_ids.is_empty(),
            "at least one class id is required"
        );
        for class_id in &self.dataset.class_ids {
            ensure!(
                CLASS_NAMES.contains_key(class_id.as_str()),
                "unknown class id {}",
                class_id
            );
        }
        ensure!(
            self.model.encoder_out_channels == self.model.decoder_in_channels,
            "encoder output width {} does not match decoder input width {}",
            self.model.encoder_out_channels,
            self.model.decoder_in_channels
        );
        ensure!(self.model.image_size > 0, "image size must be positive");
        ensure!(
            self.model.voxel_grid_size > 0,
            "voxel grid size must be positive"
        );
        parse_device(&self.device)?;
        Ok(())
    }

    pub fn context(&self) -> Result<ExecutionContext> {
        Ok(ExecutionContext::new(parse_device(&self.device)?))
    }
}

fn default_device() -> String {
    "cpu".into()
}

fn parse_device(name: &str) -> Result<Device> {
    if name == "cpu" {
        return Ok(Device::Cpu);
    }

    let prefix = "cuda(";
    let suffix = ")";
    if name.starts_with(prefix) && name.ends_with(suffix) {
        let ordinal: usize = name[prefix.len()..name.len() - suffix.len()]
            .parse()
            .map_err(|_| format_err!("invalid device name {}", name))?;
        return Ok(Device::Cuda(ordinal));
    }

    bail!("invalid device name {}", name)
}
