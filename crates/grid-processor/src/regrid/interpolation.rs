//! Point location along one source axis for linear and nearest regridding.

/// Locates values along a monotonic 1-D source axis.
///
/// The axis is stored ascending together with the original index of each
/// point, so descending axes work unchanged. Periodic axes (longitudes in
/// degrees) re-express query values in the axis frame; circular axes also
/// interpolate across the seam between the last and first point.
#[derive(Debug, Clone)]
pub(crate) struct AxisLocator {
    sorted: Vec<f64>,
    order: Vec<usize>,
    periodic: bool,
    circular: bool,
}

const EPS: f64 = 1e-9;

impl AxisLocator {
    pub(crate) fn new(values: &[f64], periodic: bool, circular: bool) -> Self {
        let mut order: Vec<usize> = (0..values.len()).collect();
        order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
        let sorted = order.iter().map(|&i| values[i]).collect();
        Self {
            sorted,
            order,
            periodic,
            circular: circular && periodic,
        }
    }

    fn first(&self) -> f64 {
        self.sorted[0]
    }

    fn last(&self) -> f64 {
        self.sorted[self.sorted.len() - 1]
    }

    /// Bring `v` into the axis frame.
    fn normalize(&self, v: f64) -> f64 {
        if !self.periodic || self.sorted.is_empty() {
            return v;
        }
        if self.circular {
            let offset = (v - self.first()).rem_euclid(360.0);
            // Snap values a rounding error below a full turn back onto the first point.
            if 360.0 - offset < EPS {
                return self.first();
            }
            return self.first() + offset;
        }
        let centre = 0.5 * (self.first() + self.last());
        v + 360.0 * ((centre - v) / 360.0).round()
    }

    /// Two `(index, weight)` pairs bracketing `v`, or `None` outside the axis.
    pub(crate) fn linear(&self, v: f64) -> Option<[(usize, f64); 2]> {
        let n = self.sorted.len();
        if n == 0 || !v.is_finite() {
            return None;
        }
        let v = self.normalize(v);
        if n == 1 {
            return ((v - self.first()).abs() <= EPS).then_some([(self.order[0], 1.0), (self.order[0], 0.0)]);
        }

        if self.circular && v > self.last() {
            let span = self.first() + 360.0 - self.last();
            let t = (v - self.last()) / span;
            return Some([(self.order[n - 1], 1.0 - t), (self.order[0], t)]);
        }
        if v < self.first() - EPS || v > self.last() + EPS {
            return None;
        }

        let upper = self.sorted.partition_point(|&p| p <= v).clamp(1, n - 1);
        let lower = upper - 1;
        let t = ((v - self.sorted[lower]) / (self.sorted[upper] - self.sorted[lower])).clamp(0.0, 1.0);
        Some([(self.order[lower], 1.0 - t), (self.order[upper], t)])
    }

    /// Index of the point nearest to `v`, or `None` beyond half a spacing
    /// past either end of a non-circular axis.
    pub(crate) fn nearest(&self, v: f64) -> Option<usize> {
        let n = self.sorted.len();
        if n == 0 || !v.is_finite() {
            return None;
        }
        let v = self.normalize(v);
        if n == 1 {
            return ((v - self.first()).abs() <= EPS).then_some(self.order[0]);
        }

        if self.circular && v > self.last() {
            let to_last = v - self.last();
            let to_first = self.first() + 360.0 - v;
            return Some(if to_first < to_last {
                self.order[0]
            } else {
                self.order[n - 1]
            });
        }
        let half_first = 0.5 * (self.sorted[1] - self.sorted[0]);
        let half_last = 0.5 * (self.sorted[n - 1] - self.sorted[n - 2]);
        if v < self.first() - half_first - EPS || v > self.last() + half_last + EPS {
            return None;
        }

        let upper = self.sorted.partition_point(|&p| p <= v).clamp(1, n - 1);
        let lower = upper - 1;
        let nearest = if v - self.sorted[lower] <= self.sorted[upper] - v {
            lower
        } else {
            upper
        };
        Some(self.order[nearest])
    }
}
