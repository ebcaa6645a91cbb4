//! Quantities derived from raw model fields: wind speed and direction,
//! unrotated winds and dewpoint temperature.

use cube_common::Cube;
use ndarray::{ArrayD, IxDyn, Zip};
use tracing::{info, warn};

use crate::error::{GridProcessorError, Result};
use crate::metadata::{add_unrotated_aux_coords, rotated_pole};

/// Latent heat of condensation of water at 0 degC (J/kg).
const LC: f64 = 2.501e6;
/// Rate of change of the latent heat of evaporation with temperature (J/kg/K).
const RL1: f64 = -2.73e3;
/// Freezing point of fresh water (K).
const TM: f64 = 273.15;
/// Ratio of the molecular weights of water and dry air.
const EPSILON: f64 = 0.62198;
/// Gas constant for dry air (J/kg/K).
const R: f64 = 287.05;
/// Gas constant for water vapour (J/kg/K).
const RV: f64 = R / EPSILON;

fn check_shapes(context: &str, a: &Cube, b: &Cube) -> Result<()> {
    if a.shape() != b.shape() {
        return Err(GridProcessorError::shape_mismatch(context, a.shape(), b.shape()));
    }
    Ok(())
}

fn check_units(name: &str, cube: &Cube, expected: &str) -> Result<()> {
    if cube.units != expected {
        return Err(GridProcessorError::unit_mismatch(name, expected, cube.units.clone()));
    }
    Ok(())
}

/// Copy of `template` carrying `data` under a new name, without the
/// template's STASH code.
fn derived_cube(template: &Cube, name: &str, units: &str, data: ArrayD<f32>) -> Result<Cube> {
    let mut cube = template.clone().with_data(data)?;
    cube.name = name.to_string();
    cube.units = units.to_string();
    cube.attributes.remove("STASH");
    Ok(cube)
}

/// Wind speed `sqrt(u² + v²)` from two components in the same units.
pub fn wind_speed(u: &Cube, v: &Cube) -> Result<Cube> {
    check_shapes("u and v wind", u, v)?;
    check_units("v wind", v, &u.units)?;

    let data = Zip::from(u.data())
        .and(v.data())
        .map_collect(|&a, &b| (a as f64).hypot(b as f64) as f32);
    Ok(derived_cube(u, "wind_speed", &u.units, data)?.with_attribute("formula", "sqrt(u**2, v**2)"))
}

/// Bearing the wind blows towards, clockwise from north in `[0, 360)`.
///
/// Grid-relative winds on a rotated pole are first rotated to true
/// east/north components when `unrotate` is set. Winds already relative
/// to true north must be passed with `unrotate = false`.
pub fn wind_direction(u: &Cube, v: &Cube, unrotate: bool) -> Result<Cube> {
    check_shapes("u and v wind", u, v)?;
    check_units("v wind", v, &u.units)?;

    let rotated = u.coord_system().is_some_and(|cs| cs.is_rotated());
    let (u, v) = if rotated && unrotate {
        unrotate_winds(u, v)?
    } else {
        (u.clone(), v.clone())
    };

    let data = Zip::from(u.data()).and(v.data()).map_collect(|&a, &b| {
        let angle = (b as f64).atan2(a as f64).to_degrees();
        (90.0 - angle).rem_euclid(360.0) as f32
    });
    Ok(derived_cube(&u, "wind_to_direction", "degree", data)?
        .with_attribute("direction", "Angle of wind vector measured clockwise from Northwards")
        .with_attribute("formula", "(-(arctan2(v, u)*180/pi)+90)%360"))
}

/// Rotate grid-relative wind components on a rotated pole to true
/// east/north components.
///
/// Both returned cubes keep their grid coordinates and gain 2-D true
/// `latitude`/`longitude` auxiliary coordinates.
pub fn unrotate_winds(u: &Cube, v: &Cube) -> Result<(Cube, Cube)> {
    check_shapes("u and v wind", u, v)?;
    let cs = match u.coord_system() {
        Some(cs) if cs.is_rotated() => cs,
        _ => {
            return Err(GridProcessorError::NotRotated(format!(
                "'{}' has no rotated pole to unrotate from",
                u.name
            )))
        }
    };
    if v.coord_system() != Some(cs) {
        return Err(GridProcessorError::IncompatibleCoordSystem(format!(
            "u wind is on {}, v wind is not",
            cs
        )));
    }
    let pole = rotated_pole(&cs)?;
    let (y, x) = u.horizontal_coords()?;
    let (y_dim, x_dim) = u.horizontal_dims()?;
    let (rlat, rlon) = (y.values(), x.values());

    let shape = IxDyn(u.shape());
    let grid_lat = ArrayD::from_shape_fn(shape.clone(), |idx| rlat[idx[y_dim]]);
    let grid_lon = ArrayD::from_shape_fn(shape, |idx| rlon[idx[x_dim]]);
    let (true_u, true_v) = pole.rotate_winds(
        u.data().mapv(f64::from).view(),
        v.data().mapv(f64::from).view(),
        grid_lat.view(),
        grid_lon.view(),
    )?;
    info!(cube = %u.name, pole = %cs, "Unrotated wind components");

    let u = add_unrotated_aux_coords(u.clone().with_data(true_u.mapv(|w| w as f32))?)?;
    let v = add_unrotated_aux_coords(v.clone().with_data(true_v.mapv(|w| w as f32))?)?;
    Ok((u, v))
}

/// Dewpoint temperature from surface pressure, specific humidity and air
/// temperature, following the Unified Model DEWPNT routine.
///
/// Units must be `Pa`, `1` and `K`. Saturation vapour pressure uses the
/// Bolton form of the Magnus formula over water. Dewpoints above the air
/// temperature are capped at it; points with non-positive vapour pressure
/// are NaN.
pub fn dewpoint(p: &Cube, q: &Cube, t: &Cube) -> Result<Cube> {
    check_units("surface pressure", p, "Pa")?;
    check_units("specific humidity", q, "1")?;
    check_units("air temperature", t, "K")?;
    check_shapes("pressure and temperature", t, p)?;
    check_shapes("specific humidity and temperature", t, q)?;

    let mut capped = 0usize;
    let mut non_positive = 0usize;
    let data = Zip::from(p.data()).and(q.data()).and(t.data()).map_collect(|&p, &q, &t| {
        let (p, q, t) = (p as f64 / 100.0, q as f64, t as f64);
        let vapour_pressure = q * p / (EPSILON + q);
        if vapour_pressure <= 0.0 {
            non_positive += 1;
            return f32::NAN;
        }
        let saturation = 6.112 * (17.67 * (t - TM) / (t - 29.65)).exp();
        let latent_heat = LC + RL1 * (t - TM);
        let rt = 1.0 / t - RV * (vapour_pressure / saturation).ln() / latent_heat;
        let td = 1.0 / rt;
        if td > t {
            capped += 1;
            return t as f32;
        }
        td as f32
    });

    if capped > 0 {
        warn!(points = capped, "Dewpoint above air temperature, setting it to air temperature");
    }
    if non_positive > 0 {
        warn!(points = non_positive, "Non-positive vapour pressure, setting dewpoint to NaN");
    }
    derived_cube(t, "dew_point_temperature", "K", data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;
    use test_utils::{assert_approx_eq, axis_points, regular_cube, rotated_cube};

    fn filled(template: &Cube, name: &str, units: &str, value: f32) -> Cube {
        let mut cube = template
            .clone()
            .with_data(ArrayD::from_elem(IxDyn(template.shape()), value))
            .unwrap();
        cube.name = name.to_string();
        cube.units = units.to_string();
        cube
    }

    fn grid() -> Cube {
        regular_cube(axis_points(0.0, 1.0, 2), axis_points(0.0, 1.0, 3))
    }

    #[test]
    fn test_wind_speed() {
        let u = filled(&grid(), "x_wind", "m s-1", 3.0).with_attribute("STASH", "m01s03i225");
        let v = filled(&grid(), "y_wind", "m s-1", -4.0);
        let speed = wind_speed(&u, &v).unwrap();
        assert_eq!(speed.name, "wind_speed");
        assert_eq!(speed.units, "m s-1");
        assert!(speed.attribute("STASH").is_none());
        assert!(speed.data().iter().all(|&s| s == 5.0));
    }

    #[test]
    fn test_wind_units_must_match() {
        let u = filled(&grid(), "x_wind", "m s-1", 3.0);
        let v = filled(&grid(), "y_wind", "knots", 4.0);
        assert!(matches!(wind_speed(&u, &v), Err(GridProcessorError::UnitMismatch { .. })));
        assert!(matches!(
            wind_direction(&u, &v, false),
            Err(GridProcessorError::UnitMismatch { .. })
        ));
    }

    #[test]
    fn test_wind_direction_compass() {
        let cases = [
            ((0.0, 1.0), 0.0),
            ((1.0, 0.0), 90.0),
            ((0.0, -1.0), 180.0),
            ((-1.0, 0.0), 270.0),
            ((-1.0, 1.0), 315.0),
        ];
        for ((uu, vv), expected) in cases {
            let u = filled(&grid(), "x_wind", "m s-1", uu);
            let v = filled(&grid(), "y_wind", "m s-1", vv);
            let direction = wind_direction(&u, &v, true).unwrap();
            assert_eq!(direction.units, "degree");
            assert_approx_eq!(direction.data()[IxDyn(&[0, 0])], expected, 1e-4);
        }
    }

    #[test]
    fn test_unrotate_preserves_speed() {
        let template = rotated_cube(axis_points(-5.0, 5.0, 3), axis_points(-5.0, 5.0, 4), 37.5, 177.5);
        let u = filled(&template, "x_wind", "m s-1", 1.0);
        let v = filled(&template, "y_wind", "m s-1", 0.0);

        let grid_relative = wind_direction(&u, &v, false).unwrap();
        assert!(grid_relative.data().iter().all(|&d| (d - 90.0).abs() < 1e-4));

        let (true_u, true_v) = unrotate_winds(&u, &v).unwrap();
        assert!(true_u.has_coord("latitude"));
        let before = wind_speed(&u, &v).unwrap();
        let after = wind_speed(&true_u, &true_v).unwrap();
        for (a, b) in before.data().iter().zip(after.data().iter()) {
            assert_approx_eq!(*a, *b, 1e-5);
        }

        let unrotated = wind_direction(&u, &v, true).unwrap();
        let turned = grid_relative
            .data()
            .iter()
            .zip(unrotated.data().iter())
            .any(|(a, b)| (a - b).abs() > 1.0);
        assert!(turned);
    }

    #[test]
    fn test_unrotate_needs_rotated_pole() {
        let u = filled(&grid(), "x_wind", "m s-1", 1.0);
        assert!(matches!(unrotate_winds(&u, &u), Err(GridProcessorError::NotRotated(_))));
    }

    #[test]
    fn test_dewpoint_reference_value() {
        let t = filled(&grid(), "air_temperature", "K", 293.15);
        let p = filled(&grid(), "surface_air_pressure", "Pa", 101_325.0);
        let q = filled(&grid(), "specific_humidity", "1", 0.0072040);
        let td = dewpoint(&p, &q, &t).unwrap();
        assert_eq!(td.name, "dew_point_temperature");
        assert_approx_eq!(td.data()[IxDyn(&[1, 2])], 282.22, 0.05);
    }

    #[test]
    fn test_dewpoint_capped_and_missing() {
        let t = filled(&grid(), "air_temperature", "K", 280.0);
        let p = filled(&grid(), "surface_air_pressure", "Pa", 100_000.0);
        let humidity = Array2::from_shape_vec((2, 3), vec![0.0, 0.002, 0.005, 0.05, -0.001, 0.008])
            .unwrap()
            .mapv(|v: f64| v as f32);
        let q = filled(&grid(), "specific_humidity", "1", 0.0)
            .with_data(humidity.into_dyn())
            .unwrap();

        let td = dewpoint(&p, &q, &t).unwrap();
        let values = td.data();
        assert!(values[IxDyn(&[0, 0])].is_nan());
        assert!(values[IxDyn(&[1, 1])].is_nan());
        // Supersaturated air is capped at the air temperature.
        assert_eq!(values[IxDyn(&[1, 0])], 280.0);
        for idx in [[0, 1], [0, 2], [1, 2]] {
            assert!(values[IxDyn(&idx)] <= 280.0);
        }
        assert!(values[IxDyn(&[0, 1])] < values[IxDyn(&[0, 2])]);
    }

    #[test]
    fn test_dewpoint_unit_checks() {
        let t = filled(&grid(), "air_temperature", "degC", 20.0);
        let p = filled(&grid(), "surface_air_pressure", "Pa", 101_325.0);
        let q = filled(&grid(), "specific_humidity", "1", 0.007);
        assert!(matches!(
            dewpoint(&p, &q, &t),
            Err(GridProcessorError::UnitMismatch { .. })
        ));
    }
}
