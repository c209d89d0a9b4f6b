//! Gap interpolation over numeric fields, in row order.
//!
//! Each numeric field is filled independently; a field's gaps are only ever
//! estimated from that same field's known values, never from other columns.
//!
//! Edge behavior differs per method and is part of the contract:
//! - [`Method::Linear`] fills interior gaps only; leading and trailing gaps
//!   stay missing.
//! - [`Method::Polynomial`] evaluates a Lagrange polynomial through the
//!   nearest `order + 1` known points, which is defined everywhere, so
//!   leading and trailing gaps are extrapolated.
//! - [`Method::Spline`] extends its boundary segments past the first and
//!   last known points, so edges are extrapolated as well.

use crate::types::{Dataset, Field};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Linear,
    /// Local Lagrange fit of the given order through the nearest known
    /// points. Order 1 reproduces linear interpolation plus edge
    /// extrapolation.
    Polynomial { order: usize },
    /// Natural cubic spline through all known points. Order 1 degrades to a
    /// linear spline; orders above 3 are clamped to cubic.
    Spline { order: usize },
}

/// Fills missing numeric values, returning a derived snapshot. Fields with
/// fewer than two known values are left untouched (there is nothing to fit).
pub fn interpolate(dataset: &Dataset, method: Method) -> Dataset {
    let mut records = dataset.records().to_vec();

    for field in Field::NUMERIC {
        let series: Vec<Option<f64>> = records.iter().map(|r| r.numeric(field)).collect();
        let filled = fill_series(&series, method);

        let changed = series
            .iter()
            .zip(&filled)
            .filter(|(a, b)| a.is_none() && b.is_some())
            .count();
        if changed > 0 {
            debug!(field = %field, filled = changed, "interpolated gaps");
        }

        for (record, value) in records.iter_mut().zip(filled) {
            record.set_numeric(field, value);
        }
    }

    dataset.with_records(records)
}

fn fill_series(series: &[Option<f64>], method: Method) -> Vec<Option<f64>> {
    let known: Vec<(usize, f64)> = series
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.map(|v| (i, v)))
        .collect();

    if known.len() < 2 {
        return series.to_vec();
    }

    match method {
        Method::Linear => linear_fill(series, &known),
        Method::Polynomial { order } => polynomial_fill(series, &known, order.max(1)),
        Method::Spline { order } => spline_fill(series, &known, order),
    }
}

/// Straight-line fill between the nearest known neighbors; interior only.
fn linear_fill(series: &[Option<f64>], known: &[(usize, f64)]) -> Vec<Option<f64>> {
    let mut out = series.to_vec();

    for pair in known.windows(2) {
        let (i, a) = pair[0];
        let (j, b) = pair[1];
        for idx in (i + 1)..j {
            let t = (idx - i) as f64 / (j - i) as f64;
            out[idx] = Some(a + (b - a) * t);
        }
    }

    out
}

/// For each gap, fits a Lagrange polynomial through the `order + 1` known
/// points nearest to it (by row distance, earlier rows on ties) and
/// evaluates at the gap's row index.
fn polynomial_fill(series: &[Option<f64>], known: &[(usize, f64)], order: usize) -> Vec<Option<f64>> {
    let window = (order + 1).min(known.len());
    let mut out = series.to_vec();

    for idx in 0..series.len() {
        if out[idx].is_some() {
            continue;
        }
        let mut nearest: Vec<(usize, f64)> = known.to_vec();
        nearest.sort_by_key(|(i, _)| (i.abs_diff(idx), *i));
        let points: Vec<(f64, f64)> = nearest[..window]
            .iter()
            .map(|&(i, v)| (i as f64, v))
            .collect();
        out[idx] = Some(lagrange(&points, idx as f64));
    }

    out
}

fn lagrange(points: &[(f64, f64)], x: f64) -> f64 {
    let mut acc = 0.0;
    for (i, &(xi, yi)) in points.iter().enumerate() {
        let mut basis = 1.0;
        for (j, &(xj, _)) in points.iter().enumerate() {
            if i != j {
                basis *= (x - xj) / (xi - xj);
            }
        }
        acc += yi * basis;
    }
    acc
}

fn spline_fill(series: &[Option<f64>], known: &[(usize, f64)], order: usize) -> Vec<Option<f64>> {
    let mut out = series.to_vec();

    if order <= 1 {
        // Linear spline: interior fill plus boundary-slope extrapolation.
        out = linear_fill(series, known);
        let (x0, y0) = known[0];
        let (x1, y1) = known[1];
        let head_slope = (y1 - y0) / (x1 - x0) as f64;
        let (xa, ya) = known[known.len() - 2];
        let (xb, yb) = known[known.len() - 1];
        let tail_slope = (yb - ya) / (xb - xa) as f64;

        for idx in 0..x0 {
            out[idx] = Some(y0 - head_slope * (x0 - idx) as f64);
        }
        for idx in (xb + 1)..series.len() {
            out[idx] = Some(yb + tail_slope * (idx - xb) as f64);
        }
        return out;
    }

    let spline = NaturalCubic::fit(known);
    for idx in 0..series.len() {
        if out[idx].is_none() {
            out[idx] = Some(spline.eval(idx as f64));
        }
    }
    out
}

/// Natural cubic spline over (row index, value) knots: second derivatives
/// vanish at both ends, interior ones solve the standard tridiagonal system.
struct NaturalCubic {
    xs: Vec<f64>,
    ys: Vec<f64>,
    /// Second derivative at each knot.
    m: Vec<f64>,
}

impl NaturalCubic {
    fn fit(known: &[(usize, f64)]) -> Self {
        let n = known.len();
        let xs: Vec<f64> = known.iter().map(|&(i, _)| i as f64).collect();
        let ys: Vec<f64> = known.iter().map(|&(_, v)| v).collect();
        let mut m = vec![0.0; n];

        if n > 2 {
            // Thomas algorithm on the interior knots.
            let h: Vec<f64> = xs.windows(2).map(|w| w[1] - w[0]).collect();
            let mut diag = vec![0.0; n - 2];
            let mut rhs = vec![0.0; n - 2];
            let mut upper = vec![0.0; n - 2];

            for i in 0..n - 2 {
                diag[i] = 2.0 * (h[i] + h[i + 1]);
                upper[i] = h[i + 1];
                rhs[i] = 6.0 * ((ys[i + 2] - ys[i + 1]) / h[i + 1] - (ys[i + 1] - ys[i]) / h[i]);
            }

            for i in 1..n - 2 {
                let w = h[i] / diag[i - 1];
                diag[i] -= w * upper[i - 1];
                rhs[i] -= w * rhs[i - 1];
            }

            m[n - 2] = rhs[n - 3] / diag[n - 3];
            for i in (1..n - 2).rev() {
                m[i] = (rhs[i - 1] - upper[i - 1] * m[i + 1]) / diag[i - 1];
            }
        }

        Self { xs, ys, m }
    }

    /// Evaluates the spline; x outside the knot range uses the boundary
    /// segment's cubic, which is what extrapolates the edges.
    fn eval(&self, x: f64) -> f64 {
        let n = self.xs.len();
        let mut seg = n - 2;
        for i in 0..n - 1 {
            if x <= self.xs[i + 1] {
                seg = i;
                break;
            }
        }

        let (x0, x1) = (self.xs[seg], self.xs[seg + 1]);
        let (y0, y1) = (self.ys[seg], self.ys[seg + 1]);
        let (m0, m1) = (self.m[seg], self.m[seg + 1]);
        let h = x1 - x0;

        m0 * (x1 - x).powi(3) / (6.0 * h)
            + m1 * (x - x0).powi(3) / (6.0 * h)
            + (y0 - m0 * h * h / 6.0) * (x1 - x) / h
            + (y1 - m1 * h * h / 6.0) * (x - x0) / h
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::parse_csv;
    use crate::types::Field;

    fn area_series(values: &[Option<f64>]) -> Dataset {
        let mut csv = String::from(
            "Latitud,Longitud,Superficie_Deforestada,Tasa_Deforestacion,Tipo_Vegetacion,Altitud,Pendiente,Distancia_Carretera,Precipitacion,Temperatura\n",
        );
        for v in values {
            let cell = v.map(|v| v.to_string()).unwrap_or_default();
            csv.push_str(&format!("0,0,{cell},1,Bosque,100,5,1,1000,25\n"));
        }
        parse_csv("test://series", csv.as_bytes()).unwrap()
    }

    fn areas(dataset: &Dataset) -> Vec<Option<f64>> {
        dataset
            .records()
            .iter()
            .map(|r| r.numeric(Field::DeforestedArea))
            .collect()
    }

    #[test]
    fn linear_fills_interior_midpoint() {
        let dataset = area_series(&[Some(10.0), None, Some(30.0)]);
        let filled = interpolate(&dataset, Method::Linear);
        assert_eq!(areas(&filled), vec![Some(10.0), Some(20.0), Some(30.0)]);
    }

    #[test]
    fn linear_leaves_edges_unfilled() {
        let dataset = area_series(&[None, Some(10.0), None, Some(20.0), None]);
        let filled = interpolate(&dataset, Method::Linear);
        assert_eq!(
            areas(&filled),
            vec![None, Some(10.0), Some(15.0), Some(20.0), None]
        );
    }

    #[test]
    fn linear_fill_is_proportional_inside_wide_gaps() {
        let dataset = area_series(&[Some(0.0), None, None, None, Some(40.0)]);
        let filled = interpolate(&dataset, Method::Linear);
        assert_eq!(
            areas(&filled),
            vec![Some(0.0), Some(10.0), Some(20.0), Some(30.0), Some(40.0)]
        );
    }

    #[test]
    fn polynomial_order_two_recovers_quadratic() {
        // y = x^2 through rows 0, 1, 3; row 2 should come back as 4.
        let dataset = area_series(&[Some(0.0), Some(1.0), None, Some(9.0)]);
        let filled = interpolate(&dataset, Method::Polynomial { order: 2 });
        let got = areas(&filled)[2].unwrap();
        assert!((got - 4.0).abs() < 1e-9, "got {got}");
    }

    #[test]
    fn polynomial_extrapolates_at_edges() {
        let dataset = area_series(&[None, Some(1.0), Some(2.0)]);
        let filled = interpolate(&dataset, Method::Polynomial { order: 1 });
        let got = areas(&filled)[0].unwrap();
        assert!((got - 0.0).abs() < 1e-9, "got {got}");
    }

    #[test]
    fn spline_on_collinear_points_is_linear() {
        let dataset = area_series(&[Some(0.0), None, Some(2.0), None, Some(4.0)]);
        let filled = interpolate(&dataset, Method::Spline { order: 3 });
        let got = areas(&filled);
        assert!((got[1].unwrap() - 1.0).abs() < 1e-9);
        assert!((got[3].unwrap() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn spline_extrapolates_at_edges() {
        let dataset = area_series(&[None, Some(10.0), Some(20.0)]);
        let filled = interpolate(&dataset, Method::Spline { order: 3 });
        // Two knots make the boundary segment a straight line.
        let got = areas(&filled)[0].unwrap();
        assert!((got - 0.0).abs() < 1e-9, "got {got}");
    }

    #[test]
    fn linear_spline_extrapolates_with_boundary_slope() {
        let dataset = area_series(&[None, Some(10.0), Some(20.0), None]);
        let filled = interpolate(&dataset, Method::Spline { order: 1 });
        let got = areas(&filled);
        assert!((got[0].unwrap() - 0.0).abs() < 1e-9);
        assert!((got[3].unwrap() - 30.0).abs() < 1e-9);
    }

    #[test]
    fn single_known_value_is_left_alone() {
        let dataset = area_series(&[None, Some(10.0), None]);
        let filled = interpolate(&dataset, Method::Linear);
        assert_eq!(areas(&filled), vec![None, Some(10.0), None]);
    }

    #[test]
    fn interpolation_never_crosses_fields() {
        // Slope has no gaps; area does. Slope must be untouched.
        let dataset = area_series(&[Some(10.0), None, Some(30.0)]);
        let filled = interpolate(&dataset, Method::Linear);
        for (before, after) in dataset.records().iter().zip(filled.records()) {
            assert_eq!(before.slope, after.slope);
            assert_eq!(before.precipitation, after.precipitation);
        }
    }
}
