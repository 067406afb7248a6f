// src/types.rs
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Search backend families
///
/// Each kind matches one factory in the registry. The names are used in
/// the configuration allow-list, on the command line and in the
/// `X-ShaMiner-Miner` request header.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// One nonce at a time on a CPU core
    ///
    /// Always available. Serves as the reference for the others.
    #[value(name = "scalar")]
    Scalar,

    /// Several nonces per step in SIMD lanes on a CPU core
    ///
    /// Offered when the CPU has SSE2, AVX2 or NEON.
    #[value(name = "vectorized")]
    Vectorized,

    /// OpenCL kernel on a GPU
    ///
    /// Requires the `opencl` cargo feature and a GPU-class device.
    #[value(name = "opencl")]
    OpenCl,
}

impl BackendKind {
    /// Registry name of the factory for this kind
    pub fn name(&self) -> &'static str {
        match self {
            BackendKind::Scalar => "scalar",
            BackendKind::Vectorized => "vectorized",
            BackendKind::OpenCl => "opencl",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "scalar" | "cpu" => Ok(BackendKind::Scalar),
            "vectorized" | "simd" | "sse" | "avx" => Ok(BackendKind::Vectorized),
            "opencl" | "gpu" => Ok(BackendKind::OpenCl),
            _ => Err(format!("Unknown backend: {}", s)),
        }
    }
}
