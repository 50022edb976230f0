//! Shared ONNX Runtime glue.
//!
//! The runtime is linked dynamically and may be absent on the host; every
//! entry point here degrades to "unavailable" instead of panicking. Session
//! creation is only reachable after [`ensure_initialized`] has succeeded.

use std::sync::OnceLock;

use anyhow::{anyhow, Result};
use ort::execution_providers::{
    CUDAExecutionProvider, CoreMLExecutionProvider, ExecutionProvider,
    ExecutionProviderDispatch,
};
use tracing::debug;

use crate::device::Device;

/// Whether the ONNX Runtime library could be loaded and its environment
/// initialized. Checked once per process; also serves as the availability
/// probe for in-process engines.
pub(crate) fn runtime_available() -> bool {
    static AVAILABLE: OnceLock<bool> = OnceLock::new();
    *AVAILABLE.get_or_init(|| match ort::init().with_name("voxclone").commit() {
        Ok(_) => true,
        Err(e) => {
            debug!(error = %e, "onnx runtime unavailable");
            false
        }
    })
}

pub(crate) fn ensure_initialized() -> Result<()> {
    if runtime_available() {
        Ok(())
    } else {
        Err(anyhow!("onnx runtime dynamic library could not be loaded"))
    }
}

pub(crate) fn cuda_available() -> bool {
    runtime_available()
        && CUDAExecutionProvider::default()
            .is_available()
            .unwrap_or(false)
}

pub(crate) fn coreml_available() -> bool {
    runtime_available()
        && CoreMLExecutionProvider::default()
            .is_available()
            .unwrap_or(false)
}

/// Execution providers to request for a device. CPU needs no explicit entry.
pub(crate) fn providers_for(device: Device) -> Vec<ExecutionProviderDispatch> {
    match device {
        Device::Cuda => vec![CUDAExecutionProvider::default().build()],
        Device::CoreMl => vec![CoreMLExecutionProvider::default().build()],
        Device::Cpu => Vec::new(),
    }
}
