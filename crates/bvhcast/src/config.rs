//! Raytracer settings.

use serde::{Deserialize, Serialize};

use crate::adapter::validate_parameters;
use crate::backend::Backend;
use crate::error::{RaytraceError, Result};

/// Settings fixed for a [`crate::Raytracer`] session.
///
/// Every field has a default, so a TOML file only needs the keys it
/// changes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RaytracerConfig {
    /// Traversal backend.
    pub backend: Backend,
    /// Spread batches over worker threads.
    pub parallel: bool,
    /// Slack allowed when clamping hit UVs to face bounds.
    pub tolerance: f64,
    /// Maximum chordal deviation of the tessellation from the surface.
    pub deflection: f64,
}

impl Default for RaytracerConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Scalar,
            parallel: true,
            tolerance: 0.001,
            deflection: 0.1,
        }
    }
}

impl RaytracerConfig {
    /// Validate settings.
    pub fn validate(&self) -> Result<()> {
        validate_parameters(self.tolerance, self.deflection)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s).map_err(|e| RaytraceError::InvalidConfig(e.message().to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Render as a TOML document.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| RaytraceError::InvalidConfig(e.to_string()))
    }
}
