pub use anyhow::{bail, ensure, format_err, Error, Result};
pub use itertools::Itertools;
pub use log::info;
pub use maplit::hashmap;
pub use ndarray::{concatenate, Array4, Axis};
pub use rand::Rng;
pub use serde::{
    de::Error as DeserializeError, ser::Error as SerializeError, Deserialize, Deserializer,
    Serialize, Serializer,
};
pub use std::{
    borrow::Borrow,
    collections::HashMap,
    f64::consts::PI,
    fs,
    num::NonZeroUsize,
    path::{Path, PathBuf},
};
pub use tch::{
    nn::{self, Module, ModuleT, VarStore},
    Device, Kind, Tensor,
};
pub use tch_tensor_like::TensorLike;
