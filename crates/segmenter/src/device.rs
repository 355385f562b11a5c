//! Compute device selection.
//!
//! A [`DeviceSpec`] is only a description; it is resolved into a
//! `candle_core::Device` when an inference pipeline is built, so a description
//! can be compared cheaply to decide whether a cached pipeline is still
//! valid.

use std::fmt;
use std::str::FromStr;

use candle_core::Device;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Result, SegmentError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(into = "String")]
pub enum DeviceSpec {
    /// Best available accelerator, CPU otherwise.
    #[default]
    Auto,
    Cpu,
    Cuda(usize),
    Metal(usize),
}

impl DeviceSpec {
    /// Integer convention of the upstream pipelines: `-1` is the CPU,
    /// `N >= 0` the N-th CUDA device.
    pub fn from_index(index: i64) -> Result<Self> {
        match index {
            -1 => Ok(DeviceSpec::Cpu),
            n if n >= 0 => Ok(DeviceSpec::Cuda(n as usize)),
            n => Err(SegmentError::InvalidOption(format!(
                "device index {n} is out of range"
            ))),
        }
    }

    pub fn resolve(&self) -> Result<Device> {
        let device = match self {
            DeviceSpec::Auto => auto_device(),
            DeviceSpec::Cpu => Device::Cpu,
            DeviceSpec::Cuda(ordinal) => Device::new_cuda(*ordinal)?,
            DeviceSpec::Metal(ordinal) => Device::new_metal(*ordinal)?,
        };
        log::debug!("device {self} resolved to {:?}", device.location());
        Ok(device)
    }
}

fn auto_device() -> Device {
    if std::env::var("CANDLE_FORCE_CPU").is_ok() {
        log::info!("CANDLE_FORCE_CPU set, using CPU backend");
        return Device::Cpu;
    }

    #[cfg(feature = "metal")]
    {
        match Device::new_metal(0) {
            Ok(device) if metal_preflight(&device).is_ok() => {
                log::info!("Metal device selected");
                return device;
            }
            Ok(_) => log::warn!("Metal device detected but preflight failed, falling back"),
            Err(err) => log::debug!("Metal unavailable: {err}"),
        }
    }

    match Device::cuda_if_available(0) {
        Ok(device) if device.is_cuda() => {
            log::info!("CUDA device selected");
            device
        }
        _ => {
            log::info!("Using CPU backend");
            Device::Cpu
        }
    }
}

/// Smoke-tests matmul and embedding lookups on a freshly opened Metal device.
#[cfg(feature = "metal")]
fn metal_preflight(device: &Device) -> candle_core::Result<()> {
    use candle_core::{DType, Tensor};

    let a = Tensor::ones((2, 4), DType::F32, device)?;
    let b = Tensor::ones((4, 2), DType::F32, device)?;
    let _ = a.matmul(&b)?;

    let indices = Tensor::arange(0u32, 8, device)?;
    let emb = Tensor::ones((8, 16), DType::F32, device)?;
    let _ = emb.index_select(&indices, 0)?;
    Ok(())
}

impl fmt::Display for DeviceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceSpec::Auto => f.write_str("auto"),
            DeviceSpec::Cpu => f.write_str("cpu"),
            DeviceSpec::Cuda(ordinal) => write!(f, "cuda:{ordinal}"),
            DeviceSpec::Metal(ordinal) => write!(f, "metal:{ordinal}"),
        }
    }
}

impl FromStr for DeviceSpec {
    type Err = SegmentError;

    fn from_str(value: &str) -> Result<Self> {
        let normalized = value.trim().to_ascii_lowercase();
        if let Ok(index) = normalized.parse::<i64>() {
            return Self::from_index(index);
        }

        let (kind, ordinal) = match normalized.split_once(':') {
            Some((kind, ordinal)) => {
                let ordinal = ordinal.parse::<usize>().map_err(|_| {
                    SegmentError::InvalidOption(format!("invalid device ordinal in '{value}'"))
                })?;
                (kind, Some(ordinal))
            }
            None => (normalized.as_str(), None),
        };

        match (kind, ordinal) {
            ("auto", None) => Ok(DeviceSpec::Auto),
            ("cpu", None) => Ok(DeviceSpec::Cpu),
            ("cuda" | "gpu", ordinal) => Ok(DeviceSpec::Cuda(ordinal.unwrap_or(0))),
            ("metal" | "mps", ordinal) => Ok(DeviceSpec::Metal(ordinal.unwrap_or(0))),
            _ => Err(SegmentError::InvalidOption(format!(
                "unknown device '{value}' (expected auto, cpu, cuda[:N], metal[:N] or an index)"
            ))),
        }
    }
}

impl From<DeviceSpec> for String {
    fn from(value: DeviceSpec) -> Self {
        value.to_string()
    }
}

impl<'de> Deserialize<'de> for DeviceSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Index(i64),
            Name(String),
        }

        let parsed = match Raw::deserialize(deserializer)? {
            Raw::Index(index) => DeviceSpec::from_index(index),
            Raw::Name(name) => name.parse(),
        };
        parsed.map_err(serde::de::Error::custom)
    }
}
