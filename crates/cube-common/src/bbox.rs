//! Regular latitude/longitude boxes used for subset extraction.

use serde::{Deserialize, Serialize};

use crate::error::{CubeError, CubeResult};

/// A box in regular geographic coordinates (degrees).
///
/// `lon_min > lon_max` describes a box that crosses the antimeridian going
/// east from `lon_min`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLonBox {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
}

impl LatLonBox {
    /// Create a box from `(min, max)` latitude and longitude pairs.
    pub fn new(lat_bounds: (f64, f64), lon_bounds: (f64, f64)) -> CubeResult<Self> {
        let bbox = Self {
            lat_min: lat_bounds.0,
            lat_max: lat_bounds.1,
            lon_min: lon_bounds.0,
            lon_max: lon_bounds.1,
        };
        bbox.validate()?;
        Ok(bbox)
    }

    /// Parse "lat_min,lat_max,lon_min,lon_max".
    pub fn from_str_list(s: &str) -> CubeResult<Self> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(CubeError::invalid_parameter(
                "bbox",
                format!("'{}': expected 'lat_min,lat_max,lon_min,lon_max'", s),
            ));
        }
        let mut values = [0.0f64; 4];
        for (value, part) in values.iter_mut().zip(&parts) {
            *value = part.parse().map_err(|_| {
                CubeError::invalid_parameter("bbox", format!("invalid number '{}'", part))
            })?;
        }
        Self::new((values[0], values[1]), (values[2], values[3]))
    }

    fn validate(&self) -> CubeResult<()> {
        let all = [self.lat_min, self.lat_max, self.lon_min, self.lon_max];
        if all.iter().any(|v| !v.is_finite()) {
            return Err(CubeError::invalid_parameter(
                "bbox",
                format!("non-finite value in {:?}", all),
            ));
        }
        if self.lat_min > self.lat_max {
            return Err(CubeError::invalid_parameter(
                "lat_bounds",
                format!("min {} is greater than max {}", self.lat_min, self.lat_max),
            ));
        }
        if self.lat_min < -90.0 || self.lat_max > 90.0 {
            return Err(CubeError::invalid_parameter(
                "lat_bounds",
                format!("({}, {}) outside [-90, 90]", self.lat_min, self.lat_max),
            ));
        }
        Ok(())
    }

    /// Check if the box crosses the antimeridian.
    pub fn crosses_antimeridian(&self) -> bool {
        self.lon_min > self.lon_max
    }

    /// Eastward longitude extent in degrees, always in `[0, 360]`.
    pub fn lon_extent(&self) -> f64 {
        if self.crosses_antimeridian() {
            self.lon_max + 360.0 - self.lon_min
        } else {
            (self.lon_max - self.lon_min).min(360.0)
        }
    }

    /// Latitude extent in degrees.
    pub fn lat_extent(&self) -> f64 {
        self.lat_max - self.lat_min
    }

    /// Points sampled along the box perimeter as `(lat, lon)`, with
    /// `samples_per_edge` points per edge (corners included).
    ///
    /// Longitudes are continuous going east from `lon_min`, so they may
    /// exceed 180 for boxes crossing the antimeridian.
    pub fn perimeter(&self, samples_per_edge: usize) -> Vec<(f64, f64)> {
        let n = samples_per_edge.max(2);
        let lon_span = self.lon_extent();
        let mut points = Vec::with_capacity(4 * n);
        for i in 0..n {
            let t = i as f64 / (n - 1) as f64;
            let lon = self.lon_min + t * lon_span;
            let lat = self.lat_min + t * self.lat_extent();
            points.push((self.lat_min, lon));
            points.push((self.lat_max, lon));
            points.push((lat, self.lon_min));
            points.push((lat, self.lon_min + lon_span));
        }
        points
    }

    /// Check if a point lies in the box, taking the antimeridian into account.
    pub fn contains_point(&self, lat: f64, lon: f64) -> bool {
        if lat < self.lat_min || lat > self.lat_max {
            return false;
        }
        let offset = (lon - self.lon_min).rem_euclid(360.0);
        offset <= self.lon_extent()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_box() {
        let bbox = LatLonBox::from_str_list("30, 60, -20, 40").unwrap();
        assert_eq!(bbox.lat_min, 30.0);
        assert_eq!(bbox.lon_max, 40.0);
        assert!(LatLonBox::from_str_list("30,60,-20").is_err());
        assert!(LatLonBox::from_str_list("30,60,x,40").is_err());
    }

    #[test]
    fn test_invalid_latitudes() {
        assert!(LatLonBox::new((60.0, 30.0), (0.0, 10.0)).is_err());
        assert!(LatLonBox::new((-95.0, 30.0), (0.0, 10.0)).is_err());
        assert!(LatLonBox::new((0.0, f64::NAN), (0.0, 10.0)).is_err());
    }

    #[test]
    fn test_antimeridian_extent() {
        let bbox = LatLonBox::new((-10.0, 10.0), (170.0, -170.0)).unwrap();
        assert!(bbox.crosses_antimeridian());
        assert!((bbox.lon_extent() - 20.0).abs() < 1e-12);
        assert!(bbox.contains_point(0.0, 179.0));
        assert!(bbox.contains_point(0.0, -175.0));
        assert!(!bbox.contains_point(0.0, 0.0));
    }

    #[test]
    fn test_perimeter_includes_corners() {
        let bbox = LatLonBox::new((0.0, 10.0), (20.0, 40.0)).unwrap();
        let points = bbox.perimeter(3);
        assert_eq!(points.len(), 12);
        assert!(points.contains(&(0.0, 20.0)));
        assert!(points.contains(&(10.0, 40.0)));
        assert!(points.contains(&(5.0, 20.0)));
    }
}
