// src/miner/factory.rs
//! Compute resources and the factories that bind backends to them
//!
//! A factory advertises the resources it can use and builds a backend for
//! one of them on request. Several factories may advertise the same
//! resource; the scheduler then benchmarks the competing candidates.

use crate::miner::backend::{ScalarBackend, SearchBackend, VectorBackend};
use crate::types::BackendKind;
use crate::utils::MinerError;
use std::fmt;

/// A physical compute resource a backend can be bound to
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Resource {
    /// One logical CPU core
    Cpu {
        /// Logical core id
        core: usize,
    },
    /// One GPU device
    Gpu {
        /// OpenCL platform name
        platform: String,
        /// Device name
        device: String,
        /// Position among all GPU devices
        index: usize,
    },
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Cpu { core } => write!(f, "cpu{}", core),
            Resource::Gpu { device, index, .. } => write!(f, "gpu{} ({})", index, device),
        }
    }
}

/// Enumerates resources and constructs backends bound to them
pub trait BackendFactory: Send + Sync {
    /// Name of the backends this factory builds
    fn name(&self) -> &'static str;

    /// Every resource this factory can bind a backend to
    fn resources(&self) -> Vec<Resource>;

    /// Builds an unstarted backend for `resource`
    ///
    /// # Errors
    /// Returns [`MinerError::BackendError`] if the resource is not one of
    /// this factory's, or any error raised while preparing the device.
    fn create(&self, resource: &Resource) -> Result<Box<dyn SearchBackend>, MinerError>;
}

/// SIMD capabilities of the host CPU, detected once
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CpuFeatures {
    /// x86 SSE2
    pub sse2: bool,
    /// x86 AVX2
    pub avx2: bool,
    /// ARM NEON
    pub neon: bool,
}

impl CpuFeatures {
    /// Probes the running CPU
    pub fn detect() -> Self {
        #[allow(unused_mut)]
        let mut features = CpuFeatures::default();
        #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
        {
            features.sse2 = is_x86_feature_detected!("sse2");
            features.avx2 = is_x86_feature_detected!("avx2");
        }
        #[cfg(target_arch = "aarch64")]
        {
            features.neon = std::arch::is_aarch64_feature_detected!("neon");
        }
        features
    }

    /// Lanes per step for the vectorized backend, if any instruction set fits
    pub fn lanes(&self) -> Option<usize> {
        if self.avx2 {
            Some(8)
        } else if self.sse2 || self.neon {
            Some(4)
        } else {
            None
        }
    }
}

fn cpu_resources() -> Vec<Resource> {
    (0..num_cpus::get())
        .map(|core| Resource::Cpu { core })
        .collect()
}

fn expect_cpu(factory: &str, resource: &Resource) -> Result<(), MinerError> {
    match resource {
        Resource::Cpu { .. } => Ok(()),
        other => Err(MinerError::BackendError(format!(
            "{} cannot bind {}",
            factory, other
        ))),
    }
}

/// Builds [`ScalarBackend`]s, one per logical core
#[derive(Debug, Default)]
pub struct ScalarCpuFactory;

impl BackendFactory for ScalarCpuFactory {
    fn name(&self) -> &'static str {
        "scalar"
    }

    fn resources(&self) -> Vec<Resource> {
        cpu_resources()
    }

    fn create(&self, resource: &Resource) -> Result<Box<dyn SearchBackend>, MinerError> {
        expect_cpu(self.name(), resource)?;
        Ok(Box::new(ScalarBackend::new()))
    }
}

/// Builds [`VectorBackend`]s when the CPU has a usable instruction set
#[derive(Debug)]
pub struct VectorCpuFactory {
    features: CpuFeatures,
}

impl VectorCpuFactory {
    /// Creates the factory for the running CPU
    pub fn new() -> Self {
        Self::with_features(CpuFeatures::detect())
    }

    /// Creates the factory for an explicit feature set
    pub fn with_features(features: CpuFeatures) -> Self {
        VectorCpuFactory { features }
    }
}

impl Default for VectorCpuFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl BackendFactory for VectorCpuFactory {
    fn name(&self) -> &'static str {
        "vectorized"
    }

    fn resources(&self) -> Vec<Resource> {
        if self.features.lanes().is_some() {
            cpu_resources()
        } else {
            Vec::new()
        }
    }

    fn create(&self, resource: &Resource) -> Result<Box<dyn SearchBackend>, MinerError> {
        expect_cpu(self.name(), resource)?;
        let lanes = self.features.lanes().ok_or_else(|| {
            MinerError::BackendError("no supported SIMD instruction set".to_string())
        })?;
        Ok(Box::new(VectorBackend::new(lanes)))
    }
}

/// Builds OpenCL backends, one per GPU device
#[cfg(feature = "opencl")]
#[derive(Debug, Default)]
pub struct OpenClFactory;

#[cfg(feature = "opencl")]
impl BackendFactory for OpenClFactory {
    fn name(&self) -> &'static str {
        "opencl"
    }

    fn resources(&self) -> Vec<Resource> {
        use crate::miner::backend::opencl::list_gpus;

        match list_gpus() {
            Ok(gpus) => gpus
                .into_iter()
                .enumerate()
                .map(|(index, gpu)| Resource::Gpu {
                    platform: gpu.platform_name,
                    device: gpu.device_name,
                    index,
                })
                .collect(),
            Err(e) => {
                log::warn!("OpenCL device enumeration failed: {}", e);
                Vec::new()
            }
        }
    }

    fn create(&self, resource: &Resource) -> Result<Box<dyn SearchBackend>, MinerError> {
        use crate::miner::backend::opencl::{OpenClBackend, list_gpus};

        let Resource::Gpu { index, .. } = resource else {
            return Err(MinerError::BackendError(format!(
                "{} cannot bind {}",
                self.name(),
                resource
            )));
        };
        let gpu = list_gpus()?
            .into_iter()
            .nth(*index)
            .ok_or_else(|| MinerError::BackendError(format!("{} disappeared", resource)))?;
        Ok(Box::new(OpenClBackend::new(&gpu)?))
    }
}

/// Every factory compiled into this build, in preference order
pub fn registry() -> Vec<Box<dyn BackendFactory>> {
    #[allow(unused_mut)]
    let mut factories: Vec<Box<dyn BackendFactory>> = vec![
        Box::new(ScalarCpuFactory),
        Box::new(VectorCpuFactory::new()),
    ];
    #[cfg(feature = "opencl")]
    factories.push(Box::new(OpenClFactory));
    factories
}

/// The registry filtered by an optional allow-list of backend kinds
pub fn enabled_factories(allow: Option<&[BackendKind]>) -> Vec<Box<dyn BackendFactory>> {
    registry()
        .into_iter()
        .filter(|factory| match allow {
            Some(kinds) => kinds.iter().any(|kind| kind.name() == factory.name()),
            None => true,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpu_factories_advertise_every_core() {
        let cores = num_cpus::get();
        assert_eq!(ScalarCpuFactory.resources().len(), cores);
        assert_eq!(ScalarCpuFactory.resources()[0], Resource::Cpu { core: 0 });
    }

    #[test]
    fn vector_factory_without_simd_offers_nothing() {
        let factory = VectorCpuFactory::with_features(CpuFeatures::default());
        assert!(factory.resources().is_empty());
        assert!(factory.create(&Resource::Cpu { core: 0 }).is_err());
    }

    #[test]
    fn vector_factory_picks_widest_lanes() {
        let features = CpuFeatures {
            sse2: true,
            avx2: true,
            neon: false,
        };
        assert_eq!(features.lanes(), Some(8));
        let backend = VectorCpuFactory::with_features(features)
            .create(&Resource::Cpu { core: 0 })
            .unwrap();
        assert_eq!(backend.name(), "vectorized");
    }

    #[test]
    fn cpu_factory_rejects_gpu_resource() {
        let gpu = Resource::Gpu {
            platform: "p".into(),
            device: "d".into(),
            index: 0,
        };
        assert!(matches!(
            ScalarCpuFactory.create(&gpu),
            Err(MinerError::BackendError(_))
        ));
    }

    #[test]
    fn allow_list_filters_registry() {
        let only_scalar = enabled_factories(Some(&[BackendKind::Scalar]));
        assert_eq!(only_scalar.len(), 1);
        assert_eq!(only_scalar[0].name(), "scalar");
        assert!(enabled_factories(None).len() >= 2);
    }

    #[test]
    fn resources_display() {
        assert_eq!(Resource::Cpu { core: 3 }.to_string(), "cpu3");
        let gpu = Resource::Gpu {
            platform: "NVIDIA CUDA".into(),
            device: "RTX".into(),
            index: 1,
        };
        assert_eq!(gpu.to_string(), "gpu1 (RTX)");
    }
}
