//! Least-squares trends and their confidence intervals.
//!
//! Confidence intervals follow von Storch & Zwiers, *Statistical Analysis in
//! Climate Research*, sections 8.3.7 (slope) and 8.3.10 (mean response),
//! with Student's t quantiles on `n - 2` degrees of freedom.

use cube_common::Cube;
use ndarray::{Array1, ArrayView1};
use statrs::distribution::{ContinuousCDF, StudentsT};
use tracing::{debug, info};

use crate::error::{GridProcessorError, Result};
use crate::seasonal::collapse_time_with;

/// Number of points in the mean-response curves of a [`ConfidenceInterval`].
pub const CURVE_POINTS: usize = 101;

/// Result of fitting `y = gradient * x + intercept`.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearFit {
    pub gradient: f64,
    pub intercept: f64,
    /// Smallest and largest `x`.
    pub x_range: (f64, f64),
    /// Fitted line evaluated at `x_range`.
    pub y_range: (f64, f64),
    /// Sum of squared residuals.
    pub residual_sum_squares: f64,
    /// Number of points fitted.
    pub n: usize,
    x_mean: f64,
    y_mean: f64,
    sxx: f64,
}

impl LinearFit {
    /// Fitted value at `x`.
    pub fn predict(&self, x: f64) -> f64 {
        self.gradient * x + self.intercept
    }
}

/// Confidence interval of a [`LinearFit`].
#[derive(Debug, Clone)]
pub struct ConfidenceInterval {
    pub fit: LinearFit,
    /// Confidence level is `1 - alpha`.
    pub alpha: f64,
    /// Half width of the gradient interval.
    pub gradient_half_width: f64,
    /// Half width of the intercept interval, i.e. of the mean response at
    /// `x = 0`.
    pub intercept_half_width: f64,
    /// Lines through the data mean with the lowest and highest gradient,
    /// evaluated at `fit.x_range`.
    pub gradient_low_line: (f64, f64),
    pub gradient_high_line: (f64, f64),
    /// Evenly spaced `x` from min to max.
    pub curve_x: Array1<f64>,
    /// Lower and upper bound of the mean response along `curve_x`.
    pub curve_low: Array1<f64>,
    pub curve_high: Array1<f64>,
}

impl ConfidenceInterval {
    pub fn gradient_bounds(&self) -> (f64, f64) {
        (
            self.fit.gradient - self.gradient_half_width,
            self.fit.gradient + self.gradient_half_width,
        )
    }

    pub fn intercept_bounds(&self) -> (f64, f64) {
        (
            self.fit.intercept - self.intercept_half_width,
            self.fit.intercept + self.intercept_half_width,
        )
    }
}

/// Least-squares fit of `y` against `x`.
///
/// Needs at least two points, all finite, and `x` values that are not all
/// equal.
pub fn linear_regress(x: ArrayView1<f64>, y: ArrayView1<f64>) -> Result<LinearFit> {
    if x.len() != y.len() {
        return Err(GridProcessorError::shape_mismatch(
            "regression inputs",
            &[x.len()],
            &[y.len()],
        ));
    }
    let n = x.len();
    if n < 2 {
        return Err(GridProcessorError::invalid_parameter(
            "x",
            format!("{} points, a line needs at least 2", n),
        ));
    }
    if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
        return Err(GridProcessorError::invalid_parameter(
            "x, y",
            "inputs contain non-finite values",
        ));
    }

    let x_mean = x.sum() / n as f64;
    let y_mean = y.sum() / n as f64;
    let mut sxx = 0.0;
    let mut sxy = 0.0;
    for (&xi, &yi) in x.iter().zip(y.iter()) {
        sxx += (xi - x_mean).powi(2);
        sxy += (xi - x_mean) * (yi - y_mean);
    }
    if sxx == 0.0 {
        return Err(GridProcessorError::invalid_parameter(
            "x",
            "all x values are equal",
        ));
    }

    let gradient = sxy / sxx;
    let intercept = y_mean - gradient * x_mean;
    let residual_sum_squares: f64 = x
        .iter()
        .zip(y.iter())
        .map(|(&xi, &yi)| (yi - (gradient * xi + intercept)).powi(2))
        .sum();
    let x_min = x.iter().copied().fold(f64::INFINITY, f64::min);
    let x_max = x.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    Ok(LinearFit {
        gradient,
        intercept,
        x_range: (x_min, x_max),
        y_range: (gradient * x_min + intercept, gradient * x_max + intercept),
        residual_sum_squares,
        n,
        x_mean,
        y_mean,
        sxx,
    })
}

/// Fit `y` against `x` and compute the `1 - alpha` confidence interval of
/// the gradient, the intercept and the mean response.
pub fn confidence_interval(
    x: ArrayView1<f64>,
    y: ArrayView1<f64>,
    alpha: f64,
) -> Result<ConfidenceInterval> {
    if !(alpha > 0.0 && alpha < 1.0) {
        return Err(GridProcessorError::invalid_parameter(
            "alpha",
            format!("{} is outside (0, 1)", alpha),
        ));
    }
    let fit = linear_regress(x, y)?;
    if fit.n < 3 {
        return Err(GridProcessorError::invalid_parameter(
            "x",
            format!("{} points leave no degrees of freedom", fit.n),
        ));
    }
    info!(
        confidence = (1.0 - alpha) * 100.0,
        points = fit.n,
        "Calculating confidence interval"
    );

    let dof = (fit.n - 2) as f64;
    let t = StudentsT::new(0.0, 1.0, dof)
        .map_err(|e| GridProcessorError::invalid_parameter("dof", e.to_string()))?
        .inverse_cdf(1.0 - alpha / 2.0);
    let spread = t * (fit.residual_sum_squares / dof).sqrt();
    debug!(t, spread, "Student t quantile");

    let gradient_half_width = spread / fit.sxx.sqrt();
    let n = fit.n as f64;
    let mean_response = |x: f64| spread * (1.0 / n + (x - fit.x_mean).powi(2) / fit.sxx).sqrt();
    let intercept_half_width = mean_response(0.0);

    let (x_min, x_max) = fit.x_range;
    let line = |gradient: f64| {
        (
            fit.y_mean + gradient * (x_min - fit.x_mean),
            fit.y_mean + gradient * (x_max - fit.x_mean),
        )
    };
    let gradient_low_line = line(fit.gradient - gradient_half_width);
    let gradient_high_line = line(fit.gradient + gradient_half_width);

    let curve_x = Array1::linspace(x_min, x_max, CURVE_POINTS);
    let curve_low = curve_x.mapv(|x| fit.predict(x) - mean_response(x));
    let curve_high = curve_x.mapv(|x| fit.predict(x) + mean_response(x));

    Ok(ConfidenceInterval {
        fit,
        alpha,
        gradient_half_width,
        intercept_half_width,
        gradient_low_line,
        gradient_high_line,
        curve_x,
        curve_low,
        curve_high,
    })
}

/// Per-cell linear trend along time.
#[derive(Debug, Clone)]
pub struct TimeTrend {
    /// Change per time unit of the time coordinate.
    pub gradient: Cube,
    /// Fitted value at time 0 of the time coordinate.
    pub intercept: Cube,
}

/// Fit a line through every time series of `cube`, ignoring missing
/// values.
///
/// Cells with fewer than two valid steps are `NaN` in both results.
pub fn time_trend(cube: &Cube) -> Result<TimeTrend> {
    let (time, dim) = cube.time_coord()?;
    let unit = time.time_units()?.unit;
    let times = time.values();

    let gradient = collapse_time_with(cube, dim, |lane| {
        fit_series(&times, lane).map_or(f32::NAN, |fit| fit.gradient as f32)
    })?;
    let intercept = collapse_time_with(cube, dim, |lane| {
        fit_series(&times, lane).map_or(f32::NAN, |fit| fit.intercept as f32)
    })?;

    info!(
        cube = %cube.name,
        steps = times.len(),
        "Calculated linear trend along time"
    );

    let mut gradient = gradient;
    gradient.name = format!("{}_trend", cube.name);
    gradient.units = format!("{} {}-1", cube.units, unit.symbol());
    Ok(TimeTrend {
        gradient,
        intercept,
    })
}

/// Fit over the valid steps of one series; `None` if no line fits.
fn fit_series(times: &[f64], lane: ArrayView1<f32>) -> Option<LinearFit> {
    let (x, y): (Vec<f64>, Vec<f64>) = times
        .iter()
        .zip(lane.iter())
        .filter(|(_, v)| v.is_finite())
        .map(|(&t, &v)| (t, v as f64))
        .unzip();
    linear_regress(Array1::from(x).view(), Array1::from(y).view()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cube_common::Calendar;
    use ndarray::{array, IxDyn};
    use test_utils::{assert_approx_eq, monthly_cube};

    fn sample() -> (Array1<f64>, Array1<f64>) {
        (
            array![1.0, 4.0, 2.0, 7.0, 0.0, 6.0, 3.0, 3.0, 1.0, 9.0],
            array![5.0, 6.0, 2.0, 9.0, 1.0, 4.0, 7.0, 8.0, 2.0, 6.0],
        )
    }

    #[test]
    fn test_linear_regress() {
        let (x, y) = sample();
        let fit = linear_regress(x.view(), y.view()).unwrap();
        assert_approx_eq!(fit.gradient, 41.0 / 76.4, 1e-12);
        assert_approx_eq!(fit.intercept, 3.0681, 1e-4);
        assert_eq!(fit.x_range, (0.0, 9.0));
        assert_approx_eq!(fit.y_range.1, fit.predict(9.0), 1e-12);
        assert_approx_eq!(fit.residual_sum_squares, 66.0 - 41.0 * 41.0 / 76.4, 1e-9);
    }

    #[test]
    fn test_linear_regress_exact_line() {
        let x = array![0.0, 1.0, 2.0, 3.0];
        let y = x.mapv(|v| 2.0 * v - 1.0);
        let fit = linear_regress(x.view(), y.view()).unwrap();
        assert_approx_eq!(fit.gradient, 2.0, 1e-12);
        assert_approx_eq!(fit.intercept, -1.0, 1e-12);
        assert_approx_eq!(fit.residual_sum_squares, 0.0, 1e-12);
    }

    #[test]
    fn test_linear_regress_rejects_bad_input() {
        let x = array![1.0, 2.0, 3.0];
        assert!(matches!(
            linear_regress(x.view(), array![1.0, 2.0].view()),
            Err(GridProcessorError::ShapeMismatch { .. })
        ));
        assert!(linear_regress(array![1.0].view(), array![1.0].view()).is_err());
        assert!(linear_regress(array![2.0, 2.0].view(), array![1.0, 3.0].view()).is_err());
        assert!(linear_regress(x.view(), array![1.0, f64::NAN, 2.0].view()).is_err());
    }

    #[test]
    fn test_confidence_interval() {
        let (x, y) = sample();
        let ci = confidence_interval(x.view(), y.view(), 0.05).unwrap();
        assert_approx_eq!(ci.gradient_half_width, 0.6187, 1e-3);
        assert_approx_eq!(ci.intercept_half_width, 2.8081, 1e-3);

        let (ilo, ihi) = ci.intercept_bounds();
        assert_approx_eq!(0.5 * (ilo + ihi), ci.fit.intercept, 1e-12);

        let (lo, hi) = ci.gradient_bounds();
        assert!(lo < ci.fit.gradient && ci.fit.gradient < hi);
        assert_approx_eq!(ci.gradient_low_line.0, 5.0 + lo * (0.0 - 3.6), 1e-9);

        assert_eq!(ci.curve_x.len(), CURVE_POINTS);
        // The band is narrowest at the mean of x.
        let widths = &ci.curve_high - &ci.curve_low;
        let narrowest = widths
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| ci.curve_x[i])
            .unwrap();
        assert_approx_eq!(narrowest, 3.6, 0.05);

        let wider = confidence_interval(x.view(), y.view(), 0.01).unwrap();
        assert!(wider.gradient_half_width > ci.gradient_half_width);
    }

    #[test]
    fn test_confidence_interval_rejects_bad_alpha() {
        let (x, y) = sample();
        assert!(confidence_interval(x.view(), y.view(), 0.0).is_err());
        assert!(confidence_interval(x.view(), y.view(), 1.5).is_err());
        let short = array![0.0, 1.0];
        assert!(confidence_interval(short.view(), short.view(), 0.05).is_err());
    }

    #[test]
    fn test_time_trend() {
        // Value equals the time index; 360-day months are 30 days apart.
        let cube = monthly_cube(Calendar::Day360, 2000, 1, 12);
        let mut data = cube.data().clone();
        data[IxDyn(&[3, 0, 0])] = f32::NAN;
        for t in 0..12 {
            data[IxDyn(&[t, 1, 2])] = f32::NAN;
        }
        let cube = cube.with_data(data).unwrap();

        let trend = time_trend(&cube).unwrap();
        assert_eq!(trend.gradient.shape(), &[2, 3]);
        assert_eq!(trend.gradient.units, "K day-1");
        assert_eq!(trend.gradient.name, "air_temperature_trend");
        assert_approx_eq!(trend.gradient.data()[IxDyn(&[0, 0])], 1.0 / 30.0, 1e-6);
        assert_approx_eq!(trend.gradient.data()[IxDyn(&[1, 1])], 1.0 / 30.0, 1e-6);
        // First point is day 10815 since 1970-01-01 in the 360-day calendar.
        assert_approx_eq!(trend.intercept.data()[IxDyn(&[0, 1])], -360.5, 1e-2);
        assert!(trend.gradient.data()[IxDyn(&[1, 2])].is_nan());
        assert!(trend.gradient.coord("time").unwrap().has_bounds());
    }
}
