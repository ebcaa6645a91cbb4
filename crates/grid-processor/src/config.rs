//! Configuration for the grid processor.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

use crate::error::{GridProcessorError, Result};
use crate::regrid::RegridOptions;
use crate::types::{ExtrapolationMode, RegridMethod};

/// Defaults for processing operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    /// Regridding scheme used when the caller does not pick one.
    pub regrid_method: RegridMethod,

    /// Missing-data tolerance for area-weighted regridding (0-1).
    pub mdtol: f64,

    /// Handling of target points outside the source grid.
    pub extrapolation: ExtrapolationMode,

    /// Number of regridders kept in a [`crate::RegridderCache`].
    pub regridder_cache_size: usize,

    /// Rim width stripped from regional model output.
    pub rim_width: usize,

    /// Build regridder weights on the rayon thread pool.
    pub parallel: bool,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            regrid_method: RegridMethod::Linear,
            mdtol: 0.5,
            extrapolation: ExtrapolationMode::Mask,
            regridder_cache_size: 16,
            rim_width: 8,
            parallel: true,
        }
    }
}

impl ProcessorConfig {
    /// Load configuration from environment variables.
    ///
    /// Unset variables keep their defaults; unparseable ones are logged and
    /// ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any variable source, e.g. a map in tests.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(val) = lookup("REGRID_METHOD") {
            match val.parse() {
                Ok(method) => config.regrid_method = method,
                Err(e) => warn!(value = %val, error = %e, "Ignoring REGRID_METHOD"),
            }
        }

        if let Some(val) = lookup("REGRID_MDTOL") {
            match val.parse() {
                Ok(mdtol) => config.mdtol = mdtol,
                Err(_) => warn!(value = %val, "Ignoring REGRID_MDTOL"),
            }
        }

        if let Some(val) = lookup("REGRID_EXTRAPOLATION") {
            match val.parse() {
                Ok(mode) => config.extrapolation = mode,
                Err(e) => warn!(value = %val, error = %e, "Ignoring REGRID_EXTRAPOLATION"),
            }
        }

        if let Some(val) = lookup("REGRIDDER_CACHE_SIZE") {
            if let Ok(size) = val.parse() {
                config.regridder_cache_size = size;
            }
        }

        if let Some(val) = lookup("RIM_WIDTH") {
            if let Ok(width) = val.parse() {
                config.rim_width = width;
            }
        }

        if let Some(val) = lookup("REGRID_PARALLEL") {
            config.parallel = val.to_lowercase() == "true" || val == "1";
        }

        config
    }

    /// Parse a YAML document. Missing keys take their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&text)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.mdtol) {
            return Err(GridProcessorError::ConfigError(format!(
                "mdtol must be within [0, 1], got {}",
                self.mdtol
            )));
        }

        if self.regridder_cache_size == 0 {
            return Err(GridProcessorError::ConfigError(
                "regridder_cache_size must be > 0".to_string(),
            ));
        }

        if self.rim_width == 0 {
            return Err(GridProcessorError::ConfigError(
                "rim_width must be > 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Regridding options built from this configuration.
    pub fn regrid_options(&self) -> RegridOptions {
        RegridOptions {
            method: self.regrid_method,
            mdtol: self.mdtol,
            extrapolation: self.extrapolation,
            parallel: self.parallel,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_default_is_valid() {
        let config = ProcessorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.regrid_method, RegridMethod::Linear);
        assert_eq!(config.rim_width, 8);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = ProcessorConfig::default();
        config.mdtol = 1.5;
        assert!(config.validate().is_err());

        let mut config = ProcessorConfig::default();
        config.regridder_cache_size = 0;
        assert!(config.validate().is_err());

        let mut config = ProcessorConfig::default();
        config.rim_width = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_yaml_partial() {
        let config = ProcessorConfig::from_yaml_str(
            "regrid_method: area_weighted\nmdtol: 0.25\nextrapolation: error\n",
        )
        .unwrap();
        assert_eq!(config.regrid_method, RegridMethod::AreaWeighted);
        assert_eq!(config.mdtol, 0.25);
        assert_eq!(config.extrapolation, ExtrapolationMode::Error);
        assert_eq!(config.regridder_cache_size, 16);
    }

    #[test]
    fn test_from_yaml_invalid() {
        assert!(matches!(
            ProcessorConfig::from_yaml_str("mdtol: 2.0\n"),
            Err(GridProcessorError::ConfigError(_))
        ));
        assert!(ProcessorConfig::from_yaml_str("regrid_method: [oops\n").is_err());
    }

    #[test]
    fn test_from_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "rim_width: 4").unwrap();
        writeln!(file, "parallel: false").unwrap();

        let config = ProcessorConfig::from_yaml_file(file.path()).unwrap();
        assert_eq!(config.rim_width, 4);
        assert!(!config.parallel);

        assert!(ProcessorConfig::from_yaml_file("/nonexistent/processor.yaml").is_err());
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("REGRID_METHOD", "nearest"),
            ("REGRID_MDTOL", "not-a-number"),
            ("RIM_WIDTH", "6"),
            ("REGRID_PARALLEL", "0"),
        ]
        .into_iter()
        .collect();

        let config = ProcessorConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()));
        assert_eq!(config.regrid_method, RegridMethod::Nearest);
        assert_eq!(config.mdtol, 0.5);
        assert_eq!(config.rim_width, 6);
        assert!(!config.parallel);
        assert_eq!(config.regridder_cache_size, 16);
    }

    #[test]
    fn test_regrid_options() {
        let config = ProcessorConfig {
            mdtol: 0.1,
            ..Default::default()
        };
        let options = config.regrid_options();
        assert_eq!(options.mdtol, 0.1);
        assert_eq!(options.method, RegridMethod::Linear);
    }
}
