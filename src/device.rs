//! Compute device selection for engines that run inference in-process.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::interface::TtsError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    Cuda,
    CoreMl,
    Cpu,
}

impl Device {
    /// Parse a user-facing device string.
    pub fn parse(value: &str) -> Result<Device, TtsError> {
        match value.to_lowercase().as_str() {
            "cuda" | "gpu" => Ok(Device::Cuda),
            "coreml" | "mps" | "metal" => Ok(Device::CoreMl),
            "cpu" => Ok(Device::Cpu),
            _ => Err(TtsError::InvalidOption {
                name: "device".to_string(),
                value: value.to_string(),
                options: vec!["cuda".into(), "coreml".into(), "cpu".into()],
            }),
        }
    }

    /// Best available device: discrete accelerator, then integrated, then
    /// CPU. Detected once per process.
    pub fn auto() -> Device {
        static DETECTED: OnceLock<Device> = OnceLock::new();
        *DETECTED.get_or_init(|| {
            let device = detect();
            debug!(?device, "auto-detected compute device");
            device
        })
    }
}

fn detect() -> Device {
    // Without a loadable runtime there is nothing to query.
    if !crate::engines::onnx::runtime_available() {
        return Device::Cpu;
    }
    if crate::engines::onnx::cuda_available() {
        return Device::Cuda;
    }
    if crate::engines::onnx::coreml_available() {
        return Device::CoreMl;
    }
    Device::Cpu
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Device::Cuda => "cuda",
            Device::CoreMl => "coreml",
            Device::Cpu => "cpu",
        };
        f.write_str(name)
    }
}

impl FromStr for Device {
    type Err = TtsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Device::parse(s)
    }
}
