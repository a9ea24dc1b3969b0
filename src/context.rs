use crate::common::*;

/// Execution context passed to every constructor that materializes tensors.
///
/// Accelerator selection is explicit here instead of living in a process-wide
/// flag; two models on different devices can coexist in one process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionContext {
    pub device: Device,
    pub kind: Kind,
}

impl ExecutionContext {
    pub fn new(device: Device) -> Self {
        Self {
            device,
            kind: Kind::Float,
        }
    }

    pub fn cpu() -> Self {
        Self::new(Device::Cpu)
    }

    pub fn cuda_if_available() -> Self {
        Self::new(Device::cuda_if_available())
    }
}
