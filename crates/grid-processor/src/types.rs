//! Core types for grid processing.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::GridProcessorError;

/// Regridding scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegridMethod {
    /// Conservative, weighted by spherical overlap area.
    AreaWeighted,
    /// Bilinear in the source frame.
    #[default]
    Linear,
    /// Nearest source cell centre.
    Nearest,
}

impl FromStr for RegridMethod {
    type Err = GridProcessorError;

    /// Parse from string (case-insensitive).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "area_weighted" | "areaweighted" | "conservative" => Ok(Self::AreaWeighted),
            "linear" | "bilinear" => Ok(Self::Linear),
            "nearest" => Ok(Self::Nearest),
            other => Err(GridProcessorError::invalid_parameter(
                "method",
                format!("unknown regrid method '{}'", other),
            )),
        }
    }
}

impl std::fmt::Display for RegridMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AreaWeighted => write!(f, "area_weighted"),
            Self::Linear => write!(f, "linear"),
            Self::Nearest => write!(f, "nearest"),
        }
    }
}

/// What to do with target points outside the source domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtrapolationMode {
    /// Fill with NaN.
    #[default]
    Mask,
    /// Fail the regridder construction.
    Error,
}

impl FromStr for ExtrapolationMode {
    type Err = GridProcessorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mask" | "nan" => Ok(Self::Mask),
            "error" => Ok(Self::Error),
            other => Err(GridProcessorError::invalid_parameter(
                "extrapolation",
                format!("unknown extrapolation mode '{}'", other),
            )),
        }
    }
}

impl std::fmt::Display for ExtrapolationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mask => write!(f, "mask"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Statistics about the regridder cache.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
    pub evictions: u64,
}

impl CacheStats {
    /// Calculate the cache hit rate (0.0 - 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regrid_method_from_str() {
        assert_eq!("linear".parse::<RegridMethod>().unwrap(), RegridMethod::Linear);
        assert_eq!("BILINEAR".parse::<RegridMethod>().unwrap(), RegridMethod::Linear);
        assert_eq!(
            "area-weighted".parse::<RegridMethod>().unwrap(),
            RegridMethod::AreaWeighted
        );
        assert_eq!("nearest".parse::<RegridMethod>().unwrap(), RegridMethod::Nearest);
        assert!("cubic".parse::<RegridMethod>().is_err());
    }

    #[test]
    fn test_display_roundtrip() {
        for method in [RegridMethod::AreaWeighted, RegridMethod::Linear, RegridMethod::Nearest] {
            assert_eq!(method.to_string().parse::<RegridMethod>().unwrap(), method);
        }
        for mode in [ExtrapolationMode::Mask, ExtrapolationMode::Error] {
            assert_eq!(mode.to_string().parse::<ExtrapolationMode>().unwrap(), mode);
        }
    }

    #[test]
    fn test_cache_stats_hit_rate() {
        let mut stats = CacheStats::default();
        assert!((stats.hit_rate() - 0.0).abs() < f64::EPSILON);

        stats.hits = 80;
        stats.misses = 20;
        assert!((stats.hit_rate() - 0.8).abs() < f64::EPSILON);
    }
}
