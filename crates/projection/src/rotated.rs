//! Rotated-pole latitude/longitude.
//!
//! The transform is a rotation of the sphere. A point is converted to a unit
//! vector, multiplied by a 3x3 rotation matrix and converted back:
//!
//! ```text
//! v_rot = Rz(central_rotated_longitude) * Ry(pole_latitude) * Rz(-pole_longitude) * v_geo
//! ```
//!
//! `Rz(-pole_longitude)` brings the pole onto the prime meridian and `Ry`
//! tilts it up to the z axis. The inverse transform is the transpose.
//!
//! With `central_rotated_longitude = 0` a pole at (90, 0) is the identity
//! and rotated (0, 0) is geographic (`pole_latitude - 90`, `pole_longitude`).
//! CF-convention grids (`grid_north_pole_latitude`/`_longitude`) measure
//! rotated longitude from the opposite meridian; build those with
//! [`RotatedPole::from_cf`].

use nalgebra::{Matrix3, Vector3};
use ndarray::{Array, ArrayView, Dimension, Zip};

use crate::error::{ProjectionError, Result};

/// Normalize a longitude into `[-180, 180)`.
pub fn normalize_longitude(lon: f64) -> f64 {
    (lon + 180.0).rem_euclid(360.0) - 180.0
}

/// sin/cos of an angle in degrees, exact at multiples of 90.
fn sin_cos_deg(deg: f64) -> (f64, f64) {
    let r = deg.rem_euclid(360.0);
    if r == 0.0 {
        (0.0, 1.0)
    } else if r == 90.0 {
        (1.0, 0.0)
    } else if r == 180.0 {
        (0.0, -1.0)
    } else if r == 270.0 {
        (-1.0, 0.0)
    } else {
        deg.to_radians().sin_cos()
    }
}

fn rot_z(deg: f64) -> Matrix3<f64> {
    let (s, c) = sin_cos_deg(deg);
    Matrix3::new(c, -s, 0.0, s, c, 0.0, 0.0, 0.0, 1.0)
}

fn to_cartesian(lat: f64, lon: f64) -> Vector3<f64> {
    let (slat, clat) = sin_cos_deg(lat);
    let (slon, clon) = sin_cos_deg(lon);
    Vector3::new(clat * clon, clat * slon, slat)
}

fn from_cartesian(v: &Vector3<f64>) -> (f64, f64) {
    let lat = v.z.clamp(-1.0, 1.0).asin().to_degrees();
    let lon = v.y.atan2(v.x).to_degrees();
    (lat, normalize_longitude(lon))
}

/// Local east and north unit vectors at a point.
fn east_north(lat: f64, lon: f64) -> (Vector3<f64>, Vector3<f64>) {
    let (slat, clat) = sin_cos_deg(lat);
    let (slon, clon) = sin_cos_deg(lon);
    (
        Vector3::new(-slon, clon, 0.0),
        Vector3::new(-slat * clon, -slat * slon, clat),
    )
}

/// A rotated-pole coordinate system.
#[derive(Debug, Clone, PartialEq)]
pub struct RotatedPole {
    pole_latitude: f64,
    pole_longitude: f64,
    central_rotated_longitude: f64,
    /// geographic -> rotated
    forward: Matrix3<f64>,
    /// rotated -> geographic
    inverse: Matrix3<f64>,
    identity: bool,
}

impl RotatedPole {
    /// Rotated pole at (`pole_latitude`, `pole_longitude`) in true
    /// geographic coordinates.
    pub fn new(pole_latitude: f64, pole_longitude: f64) -> Result<Self> {
        Self::with_central_rotated_longitude(pole_latitude, pole_longitude, 0.0)
    }

    /// As [`RotatedPole::new`] with the rotated longitude origin shifted by
    /// `central_rotated_longitude` degrees.
    pub fn with_central_rotated_longitude(
        pole_latitude: f64,
        pole_longitude: f64,
        central_rotated_longitude: f64,
    ) -> Result<Self> {
        if !pole_latitude.is_finite() || !(-90.0..=90.0).contains(&pole_latitude) {
            return Err(ProjectionError::invalid_parameter(
                "pole_latitude",
                format!("{} is outside [-90, 90]", pole_latitude),
            ));
        }
        if !pole_longitude.is_finite() {
            return Err(ProjectionError::invalid_parameter(
                "pole_longitude",
                format!("{} is not finite", pole_longitude),
            ));
        }
        if !central_rotated_longitude.is_finite() {
            return Err(ProjectionError::invalid_parameter(
                "central_rotated_longitude",
                format!("{} is not finite", central_rotated_longitude),
            ));
        }

        let (sp, cp) = sin_cos_deg(pole_latitude);
        let tilt = Matrix3::new(sp, 0.0, -cp, 0.0, 1.0, 0.0, cp, 0.0, sp);
        let forward = rot_z(central_rotated_longitude) * tilt * rot_z(-pole_longitude);

        let identity = pole_latitude == 90.0
            && normalize_longitude(central_rotated_longitude - pole_longitude) == 0.0;

        Ok(Self {
            pole_latitude,
            pole_longitude,
            central_rotated_longitude,
            forward,
            inverse: forward.transpose(),
            identity,
        })
    }

    /// Build from CF `grid_north_pole_latitude` and
    /// `grid_north_pole_longitude` attributes.
    pub fn from_cf(grid_north_pole_latitude: f64, grid_north_pole_longitude: f64) -> Result<Self> {
        Self::with_central_rotated_longitude(
            grid_north_pole_latitude,
            grid_north_pole_longitude,
            180.0,
        )
    }

    pub fn pole_latitude(&self) -> f64 {
        self.pole_latitude
    }

    pub fn pole_longitude(&self) -> f64 {
        self.pole_longitude
    }

    pub fn central_rotated_longitude(&self) -> f64 {
        self.central_rotated_longitude
    }

    /// Whether the transform leaves points unchanged.
    pub fn is_identity(&self) -> bool {
        self.identity
    }

    /// Geographic (lat, lon) to rotated (lat, lon).
    pub fn to_rotated(&self, lat: f64, lon: f64) -> (f64, f64) {
        if self.identity {
            return (lat, normalize_longitude(lon));
        }
        from_cartesian(&(self.forward * to_cartesian(lat, lon)))
    }

    /// Rotated (lat, lon) to geographic (lat, lon).
    pub fn to_regular(&self, rot_lat: f64, rot_lon: f64) -> (f64, f64) {
        if self.identity {
            return (rot_lat, normalize_longitude(rot_lon));
        }
        from_cartesian(&(self.inverse * to_cartesian(rot_lat, rot_lon)))
    }

    /// Elementwise [`RotatedPole::to_rotated`] over arrays of equal shape.
    pub fn to_rotated_array<D: Dimension>(
        &self,
        lat: ArrayView<f64, D>,
        lon: ArrayView<f64, D>,
    ) -> Result<(Array<f64, D>, Array<f64, D>)> {
        self.map_pairs(lat, lon, |a, b| self.to_rotated(a, b))
    }

    /// Elementwise [`RotatedPole::to_regular`] over arrays of equal shape.
    pub fn to_regular_array<D: Dimension>(
        &self,
        rot_lat: ArrayView<f64, D>,
        rot_lon: ArrayView<f64, D>,
    ) -> Result<(Array<f64, D>, Array<f64, D>)> {
        self.map_pairs(rot_lat, rot_lon, |a, b| self.to_regular(a, b))
    }

    fn map_pairs<D, F>(
        &self,
        a: ArrayView<f64, D>,
        b: ArrayView<f64, D>,
        f: F,
    ) -> Result<(Array<f64, D>, Array<f64, D>)>
    where
        D: Dimension,
        F: Fn(f64, f64) -> (f64, f64),
    {
        if a.shape() != b.shape() {
            return Err(ProjectionError::shape_mismatch(
                "latitude and longitude arrays",
                a.shape(),
                b.shape(),
            ));
        }
        let mut out_a = Array::zeros(a.raw_dim());
        let mut out_b = Array::zeros(a.raw_dim());
        Zip::from(&mut out_a)
            .and(&mut out_b)
            .and(&a)
            .and(&b)
            .for_each(|oa, ob, &x, &y| {
                let (p, q) = f(x, y);
                *oa = p;
                *ob = q;
            });
        Ok((out_a, out_b))
    }

    /// Rotate one grid-relative wind vector at rotated point
    /// (`rot_lat`, `rot_lon`) to true east/north components.
    pub fn rotate_wind(&self, u: f64, v: f64, rot_lat: f64, rot_lon: f64) -> (f64, f64) {
        if self.identity {
            return (u, v);
        }
        let (grid_east, grid_north) = east_north(rot_lat, rot_lon);
        let wind = self.inverse * (grid_east * u + grid_north * v);
        let (lat, lon) = self.to_regular(rot_lat, rot_lon);
        let (true_east, true_north) = east_north(lat, lon);
        (wind.dot(&true_east), wind.dot(&true_north))
    }

    /// Elementwise [`RotatedPole::rotate_wind`]; all four arrays must share
    /// a shape.
    pub fn rotate_winds<D: Dimension>(
        &self,
        u: ArrayView<f64, D>,
        v: ArrayView<f64, D>,
        rot_lat: ArrayView<f64, D>,
        rot_lon: ArrayView<f64, D>,
    ) -> Result<(Array<f64, D>, Array<f64, D>)> {
        for (name, other) in [("v", v.shape()), ("rot_lat", rot_lat.shape()), ("rot_lon", rot_lon.shape())] {
            if other != u.shape() {
                return Err(ProjectionError::shape_mismatch(
                    format!("u and {}", name),
                    u.shape(),
                    other,
                ));
            }
        }
        let mut out_u = Array::zeros(u.raw_dim());
        let mut out_v = Array::zeros(u.raw_dim());
        Zip::from(&mut out_u)
            .and(&mut out_v)
            .and(&u)
            .and(&v)
            .and(&rot_lat)
            .and(&rot_lon)
            .for_each(|ou, ov, &uu, &vv, &la, &lo| {
                let (a, b) = self.rotate_wind(uu, vv, la, lo);
                *ou = a;
                *ov = b;
            });
        Ok((out_u, out_v))
    }
}

/// Convert one geographic point to a rotated pole at (`pole_lat`, `pole_lon`).
pub fn to_rotated(lat: f64, lon: f64, pole_lat: f64, pole_lon: f64) -> Result<(f64, f64)> {
    Ok(RotatedPole::new(pole_lat, pole_lon)?.to_rotated(lat, lon))
}

/// Convert one rotated point back to geographic coordinates.
pub fn to_regular(rot_lat: f64, rot_lon: f64, pole_lat: f64, pole_lon: f64) -> Result<(f64, f64)> {
    Ok(RotatedPole::new(pole_lat, pole_lon)?.to_regular(rot_lat, rot_lon))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, Array2};

    #[test]
    fn test_identity_pole_is_exact() {
        let proj = RotatedPole::new(90.0, 0.0).unwrap();
        assert!(proj.is_identity());
        assert_eq!(proj.to_rotated(52.25, 10.5), (52.25, 10.5));
        assert_eq!(proj.to_regular(-33.0, 190.0), (-33.0, -170.0));
    }

    #[test]
    fn test_invalid_pole_latitude() {
        assert!(RotatedPole::new(90.5, 0.0).is_err());
        assert!(RotatedPole::new(-91.0, 0.0).is_err());
        assert!(RotatedPole::new(f64::NAN, 0.0).is_err());
        assert!(to_rotated(0.0, 0.0, 120.0, 0.0).is_err());
    }

    #[test]
    fn test_cf_identity_pole() {
        let proj = RotatedPole::from_cf(90.0, 180.0).unwrap();
        assert!(proj.is_identity());
        assert!(!RotatedPole::from_cf(90.0, 0.0).unwrap().is_identity());
    }

    #[test]
    fn test_rotated_origin() {
        let proj = RotatedPole::new(37.5, 177.5).unwrap();
        let (lat, lon) = proj.to_regular(0.0, 0.0);
        assert!((lat - (-52.5)).abs() < 1e-9, "lat {}", lat);
        assert!((lon - 177.5).abs() < 1e-9, "lon {}", lon);
    }

    #[test]
    fn test_cf_rotated_origin() {
        let proj = RotatedPole::from_cf(37.5, 177.5).unwrap();
        let (lat, lon) = proj.to_regular(0.0, 0.0);
        assert!((lat - 52.5).abs() < 1e-9, "lat {}", lat);
        assert!((lon - (-2.5)).abs() < 1e-9, "lon {}", lon);
    }

    #[test]
    fn test_pole_maps_to_rotated_pole() {
        let proj = RotatedPole::new(39.25, 198.0).unwrap();
        let (rlat, _) = proj.to_rotated(39.25, 198.0);
        assert!((rlat - 90.0).abs() < 1e-6);
    }

    #[test]
    fn test_cf_reference_point() {
        let proj = RotatedPole::from_cf(39.25, 198.0).unwrap();
        let (rlat, rlon) = proj.to_rotated(6.5, -71.0);
        assert!((rlat - 3.336278).abs() < 1e-5, "rlat {}", rlat);
        assert!((rlon - (-84.329786)).abs() < 1e-5, "rlon {}", rlon);

        let (lat, lon) = proj.to_regular(rlat, rlon);
        assert!((lat - 6.5).abs() < 1e-9);
        assert!((lon - (-71.0)).abs() < 1e-9);
    }

    #[test]
    fn test_roundtrip() {
        for (plat, plon) in [(37.5, 177.5), (39.25, 198.0), (-20.0, 45.0), (0.0, 0.0)] {
            let proj = RotatedPole::new(plat, plon).unwrap();
            for lat in (-85..=85).step_by(17) {
                for lon in (-180..180).step_by(23) {
                    let (lat, lon) = (lat as f64, lon as f64);
                    let (rlat, rlon) = proj.to_rotated(lat, lon);
                    if rlat.abs() > 89.0 {
                        continue;
                    }
                    let (lat2, lon2) = proj.to_regular(rlat, rlon);
                    assert!((lat2 - lat).abs() < 1e-6, "lat {} -> {}", lat, lat2);
                    let dlon = normalize_longitude(lon2 - lon);
                    assert!(dlon.abs() < 1e-6, "lon {} -> {}", lon, lon2);
                }
            }
        }
    }

    #[test]
    fn test_longitudes_normalized() {
        assert_eq!(normalize_longitude(180.0), -180.0);
        assert_eq!(normalize_longitude(540.0), -180.0);
        assert_eq!(normalize_longitude(-190.0), 170.0);
        let proj = RotatedPole::new(37.5, 177.5).unwrap();
        for lon in [-179.0, -90.0, 0.0, 90.0, 179.0] {
            let (_, rlon) = proj.to_rotated(10.0, lon);
            assert!((-180.0..180.0).contains(&rlon));
        }
    }

    #[test]
    fn test_array_forms() {
        let proj = RotatedPole::new(37.5, 177.5).unwrap();
        let lat = Array2::from_shape_fn((2, 3), |(i, j)| 40.0 + i as f64 + j as f64);
        let lon = Array2::from_shape_fn((2, 3), |(i, j)| -10.0 + 2.0 * i as f64 + j as f64);
        let (rlat, rlon) = proj.to_rotated_array(lat.view(), lon.view()).unwrap();
        assert_eq!(rlat.shape(), &[2, 3]);
        let (single_lat, single_lon) = proj.to_rotated(lat[[1, 2]], lon[[1, 2]]);
        assert_eq!(rlat[[1, 2]], single_lat);
        assert_eq!(rlon[[1, 2]], single_lon);

        let bad = arr1(&[1.0, 2.0]);
        let other = arr1(&[1.0]);
        assert!(matches!(
            proj.to_regular_array(bad.view(), other.view()),
            Err(ProjectionError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_rotate_winds_preserves_speed() {
        let proj = RotatedPole::new(37.5, 177.5).unwrap();
        for (u, v, rlat, rlon) in [(3.0, 4.0, 0.0, 0.0), (-5.0, 1.0, 20.0, -15.0), (0.0, 7.0, -30.0, 40.0)] {
            let (ut, vt) = proj.rotate_wind(u, v, rlat, rlon);
            let before = (u * u + v * v).sqrt();
            let after = (ut * ut + vt * vt).sqrt();
            assert!((before - after).abs() < 1e-9);
        }
    }

    #[test]
    fn test_rotate_winds_identity() {
        let proj = RotatedPole::new(90.0, 0.0).unwrap();
        let u = arr1(&[1.0, -2.0]);
        let v = arr1(&[0.5, 3.0]);
        let la = arr1(&[10.0, 20.0]);
        let lo = arr1(&[0.0, 30.0]);
        let (ut, vt) = proj
            .rotate_winds(u.view(), v.view(), la.view(), lo.view())
            .unwrap();
        assert_eq!(ut, u);
        assert_eq!(vt, v);
    }
}
