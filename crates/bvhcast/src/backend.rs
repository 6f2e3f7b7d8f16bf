//! Backend names and selection of the traversal kernel behind them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{RaytraceError, Result};
use crate::traverse::Kernel;

/// User-facing choice of traversal implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Recursive single-ray traversal. Always available.
    #[default]
    #[serde(alias = "default")]
    Scalar,
    /// Stack-based single-ray traversal over the flattened BVH.
    #[serde(alias = "accel")]
    Accelerated,
    /// 4-wide ray packets.
    #[serde(alias = "packet4")]
    Simd4,
    /// 8-wide ray packets.
    #[serde(alias = "packet8")]
    Simd8,
}

impl Backend {
    /// Every backend, available or not.
    pub const ALL: [Backend; 4] = [Backend::Scalar, Backend::Accelerated, Backend::Simd4, Backend::Simd8];

    /// Canonical lowercase name.
    pub fn name(self) -> &'static str {
        match self {
            Backend::Scalar => "scalar",
            Backend::Accelerated => "accelerated",
            Backend::Simd4 => "simd4",
            Backend::Simd8 => "simd8",
        }
    }

    /// Rays traversed together.
    pub fn width(self) -> usize {
        match self {
            Backend::Scalar | Backend::Accelerated => 1,
            Backend::Simd4 => 4,
            Backend::Simd8 => 8,
        }
    }

    /// True if [`select`] would succeed in this build on this CPU.
    pub fn is_available(self) -> bool {
        select(self).is_ok()
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Backend {
    type Err = RaytraceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "scalar" | "default" => Ok(Backend::Scalar),
            "accelerated" | "accel" => Ok(Backend::Accelerated),
            "simd4" | "packet4" => Ok(Backend::Simd4),
            "simd8" | "packet8" => Ok(Backend::Simd8),
            _ => Err(RaytraceError::UnknownBackend(s.to_string())),
        }
    }
}

/// Resolve a backend to its kernel.
///
/// Fails with [`RaytraceError::UnsupportedBackend`] when the backend's cargo
/// feature is off or the CPU lacks the instructions it needs. There is no
/// fallback to a different backend.
pub fn select(backend: Backend) -> Result<Kernel> {
    let kernel = match backend {
        Backend::Scalar => Some(Kernel::Tree),
        Backend::Accelerated => accelerated(),
        Backend::Simd4 => packet4(),
        Backend::Simd8 => packet8(),
    };
    kernel.ok_or(RaytraceError::UnsupportedBackend(backend))
}

/// Backends that [`select`] accepts in this build on this CPU.
pub fn available_backends() -> Vec<Backend> {
    Backend::ALL.into_iter().filter(|b| b.is_available()).collect()
}

#[cfg(feature = "accel")]
fn accelerated() -> Option<Kernel> {
    Some(Kernel::Flat)
}

#[cfg(not(feature = "accel"))]
fn accelerated() -> Option<Kernel> {
    None
}

#[cfg(feature = "simd")]
fn packet4() -> Option<Kernel> {
    cpu::has_4_wide().then_some(Kernel::Packet4)
}

#[cfg(feature = "simd")]
fn packet8() -> Option<Kernel> {
    cpu::has_8_wide().then_some(Kernel::Packet8)
}

#[cfg(not(feature = "simd"))]
fn packet4() -> Option<Kernel> {
    None
}

#[cfg(not(feature = "simd"))]
fn packet8() -> Option<Kernel> {
    None
}

/// Runtime CPU feature checks.
#[cfg(feature = "simd")]
mod cpu {
    #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
    pub fn has_4_wide() -> bool {
        is_x86_feature_detected!("sse2")
    }

    #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
    pub fn has_8_wide() -> bool {
        is_x86_feature_detected!("avx")
    }

    #[cfg(target_arch = "aarch64")]
    pub fn has_4_wide() -> bool {
        std::arch::is_aarch64_feature_detected!("neon")
    }

    #[cfg(not(any(target_arch = "x86", target_arch = "x86_64", target_arch = "aarch64")))]
    pub fn has_4_wide() -> bool {
        false
    }

    #[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
    pub fn has_8_wide() -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Wrapper {
        backend: Backend,
    }

    #[test]
    fn test_parse_names_and_aliases() {
        assert_eq!("scalar".parse::<Backend>().unwrap(), Backend::Scalar);
        assert_eq!("DEFAULT".parse::<Backend>().unwrap(), Backend::Scalar);
        assert_eq!("accel".parse::<Backend>().unwrap(), Backend::Accelerated);
        assert_eq!("Accelerated".parse::<Backend>().unwrap(), Backend::Accelerated);
        assert_eq!("packet4".parse::<Backend>().unwrap(), Backend::Simd4);
        assert_eq!(" simd8 ".parse::<Backend>().unwrap(), Backend::Simd8);
        assert_eq!(
            "gpu".parse::<Backend>(),
            Err(RaytraceError::UnknownBackend("gpu".into()))
        );
    }

    #[test]
    fn test_display_round_trips() {
        for b in Backend::ALL {
            assert_eq!(b.to_string().parse::<Backend>().unwrap(), b);
        }
    }

    #[test]
    fn test_serde_names() {
        let w: Wrapper = toml::from_str("backend = \"simd4\"").unwrap();
        assert_eq!(w.backend, Backend::Simd4);
        let w: Wrapper = toml::from_str("backend = \"accel\"").unwrap();
        assert_eq!(w.backend, Backend::Accelerated);
        assert!(toml::from_str::<Wrapper>("backend = \"Scalar\"").is_err());
    }

    #[test]
    fn test_scalar_always_selects() {
        let kernel = select(Backend::Scalar).unwrap();
        assert_eq!(kernel, Kernel::Tree);
        assert_eq!(kernel.width(), 1);
        assert!(available_backends().contains(&Backend::Scalar));
    }

    #[test]
    fn test_selected_kernel_reports_its_backend() {
        for b in Backend::ALL {
            match select(b) {
                Ok(kernel) => {
                    assert_eq!(kernel.backend(), b);
                    assert_eq!(kernel.width(), b.width());
                }
                Err(e) => assert_eq!(e, RaytraceError::UnsupportedBackend(b)),
            }
        }
    }

    #[cfg(feature = "accel")]
    #[test]
    fn test_accelerated_selects_with_feature() {
        assert_eq!(select(Backend::Accelerated).unwrap(), Kernel::Flat);
    }

    #[cfg(not(feature = "simd"))]
    #[test]
    fn test_packets_need_simd_feature() {
        assert_eq!(select(Backend::Simd4), Err(RaytraceError::UnsupportedBackend(Backend::Simd4)));
        assert_eq!(select(Backend::Simd8), Err(RaytraceError::UnsupportedBackend(Backend::Simd8)));
    }
}
