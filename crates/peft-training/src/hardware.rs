//! Hardware sizing for training jobs and serving endpoints.
//!
//! Both tables are a `match` over `(SizeClass, AcceleratorType, ...)` with an
//! explicit unsupported arm; nothing falls through to a default machine.

use crate::error::{TuneError, TuneResult};
use crate::model::SizeClass;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AcceleratorType {
    #[serde(rename = "NVIDIA_L4")]
    NvidiaL4,
    #[serde(rename = "NVIDIA_A100_80GB")]
    NvidiaA100_80Gb,
    #[serde(rename = "NVIDIA_H100_80GB")]
    NvidiaH100_80Gb,
}

impl AcceleratorType {
    pub const ALL: [Self; 3] = [Self::NvidiaL4, Self::NvidiaA100_80Gb, Self::NvidiaH100_80Gb];

    /// Platform enum name, e.g. `NVIDIA_A100_80GB`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NvidiaL4 => "NVIDIA_L4",
            Self::NvidiaA100_80Gb => "NVIDIA_A100_80GB",
            Self::NvidiaH100_80Gb => "NVIDIA_H100_80GB",
        }
    }
}

impl fmt::Display for AcceleratorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AcceleratorType {
    type Err = TuneError;

    fn from_str(s: &str) -> TuneResult<Self> {
        let needle = s.trim().to_uppercase();
        Self::ALL.into_iter().find(|a| a.as_str() == needle).ok_or_else(|| {
            TuneError::UnsupportedConfiguration(format!(
                "unsupported accelerator type '{}' (expected one of: {})",
                s.trim(),
                Self::ALL.map(Self::as_str).join(", ")
            ))
        })
    }
}

/// Numeric representation used while fine-tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrecisionMode {
    #[serde(rename = "4bit")]
    FourBit,
    #[serde(rename = "8bit")]
    EightBit,
    #[serde(rename = "float16")]
    Float16,
}

impl PrecisionMode {
    pub const ALL: [Self; 3] = [Self::FourBit, Self::EightBit, Self::Float16];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FourBit => "4bit",
            Self::EightBit => "8bit",
            Self::Float16 => "float16",
        }
    }

    /// Quantized modes fit a small model on a single accelerator.
    #[must_use]
    pub const fn is_quantized(self) -> bool {
        matches!(self, Self::FourBit | Self::EightBit)
    }
}

impl fmt::Display for PrecisionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PrecisionMode {
    type Err = TuneError;

    fn from_str(s: &str) -> TuneResult<Self> {
        let needle = s.trim().to_lowercase();
        Self::ALL.into_iter().find(|p| p.as_str() == needle).ok_or_else(|| {
            TuneError::UnsupportedConfiguration(format!(
                "unsupported precision mode '{}' (expected one of: {})",
                s.trim(),
                Self::ALL.map(Self::as_str).join(", ")
            ))
        })
    }
}

/// Concrete machine shape handed to the control plane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardwareAllocation {
    pub machine_type: String,
    pub accelerator_type: AcceleratorType,
    pub accelerator_count: u32,
    pub replica_count: u32,
}

impl HardwareAllocation {
    fn single_replica(machine_type: &str, accelerator_type: AcceleratorType, accelerator_count: u32) -> Self {
        Self {
            machine_type: machine_type.to_string(),
            accelerator_type,
            accelerator_count,
            replica_count: 1,
        }
    }
}

impl fmt::Display for HardwareAllocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} with {} x {} ({} replica{})",
            self.machine_type,
            self.accelerator_count,
            self.accelerator_type,
            self.replica_count,
            if self.replica_count == 1 { "" } else { "s" }
        )
    }
}

fn classify(model_id: &str) -> TuneResult<SizeClass> {
    if model_id.trim().is_empty() {
        return Err(TuneError::InvalidSpec("model identifier is required".to_string()));
    }
    SizeClass::from_model_id(model_id).ok_or_else(|| {
        TuneError::UnsupportedConfiguration(format!(
            "cannot derive a size class from model identifier '{model_id}'"
        ))
    })
}

/// Size a fine-tuning job.
///
/// Small models in a quantized precision get a single accelerator; float16
/// doubles it. Large models take a full eight-accelerator host whatever the
/// precision.
pub fn resolve(
    model_id: &str,
    accelerator_type: AcceleratorType,
    precision_mode: PrecisionMode,
) -> TuneResult<HardwareAllocation> {
    use AcceleratorType::{NvidiaA100_80Gb, NvidiaH100_80Gb, NvidiaL4};
    use SizeClass::{Large, Small};

    let size = classify(model_id)?;
    let quantized = precision_mode.is_quantized();

    let allocation = match (size, accelerator_type, quantized) {
        (Small, NvidiaA100_80Gb, true) => HardwareAllocation::single_replica("a2-ultragpu-1g", accelerator_type, 1),
        (Small, NvidiaA100_80Gb, false) => HardwareAllocation::single_replica("a2-ultragpu-2g", accelerator_type, 2),
        (Large, NvidiaA100_80Gb, _) => HardwareAllocation::single_replica("a2-ultragpu-8g", accelerator_type, 8),
        (Small, NvidiaH100_80Gb, true) => HardwareAllocation::single_replica("a3-highgpu-1g", accelerator_type, 1),
        (Small, NvidiaH100_80Gb, false) => HardwareAllocation::single_replica("a3-highgpu-2g", accelerator_type, 2),
        (Large, NvidiaH100_80Gb, _) => HardwareAllocation::single_replica("a3-highgpu-8g", accelerator_type, 8),
        (Small, NvidiaL4, true) => HardwareAllocation::single_replica("g2-standard-12", accelerator_type, 1),
        (Small, NvidiaL4, false) => HardwareAllocation::single_replica("g2-standard-24", accelerator_type, 2),
        (Large, NvidiaL4, _) => {
            return Err(TuneError::UnsupportedConfiguration(format!(
                "fine-tuning a {size} model on {accelerator_type} is not supported"
            )));
        }
    };

    debug!(
        model_id,
        size_class = %size,
        precision = %precision_mode,
        allocation = %allocation,
        "Resolved training hardware"
    );
    Ok(allocation)
}

/// Size an inference endpoint. Precision does not enter serving sizing.
pub fn resolve_serving(model_id: &str, accelerator_type: AcceleratorType) -> TuneResult<HardwareAllocation> {
    use AcceleratorType::{NvidiaA100_80Gb, NvidiaH100_80Gb, NvidiaL4};
    use SizeClass::{Large, Small};

    let size = classify(model_id)?;
    let allocation = match (size, accelerator_type) {
        (Small, NvidiaL4) => HardwareAllocation::single_replica("g2-standard-12", accelerator_type, 1),
        (Large, NvidiaL4) => HardwareAllocation::single_replica("g2-standard-96", accelerator_type, 8),
        (Small, NvidiaA100_80Gb) => HardwareAllocation::single_replica("a2-ultragpu-1g", accelerator_type, 1),
        (Large, NvidiaA100_80Gb) => HardwareAllocation::single_replica("a2-ultragpu-4g", accelerator_type, 4),
        (Small, NvidiaH100_80Gb) => HardwareAllocation::single_replica("a3-highgpu-1g", accelerator_type, 1),
        (Large, NvidiaH100_80Gb) => HardwareAllocation::single_replica("a3-highgpu-4g", accelerator_type, 4),
    };

    debug!(model_id, size_class = %size, allocation = %allocation, "Resolved serving hardware");
    Ok(allocation)
}
