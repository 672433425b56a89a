//! Small array preprocessing helpers used by the heatmap plots.
//!
//! All helpers return new arrays; inputs are never modified in place.

use crate::{Error, Result};
use log::warn;
use ndarray::{Array1, Array2, ArrayView2, Axis};

/// First-order finite difference along axis 0 (rows).
///
/// Interior rows use central differences `(x[i+1] - x[i-1]) / 2`; the first and last
/// rows use one-sided differences. A single row has zero gradient.
pub fn gradient_rows(x: &ArrayView2<f64>) -> Array2<f64> {
    let n = x.nrows();
    let mut out = Array2::<f64>::zeros(x.raw_dim());
    if n < 2 {
        return out;
    }
    for j in 0..x.ncols() {
        out[[0, j]] = x[[1, j]] - x[[0, j]];
        out[[n - 1, j]] = x[[n - 1, j]] - x[[n - 2, j]];
        for i in 1..n - 1 {
            out[[i, j]] = 0.5 * (x[[i + 1, j]] - x[[i - 1, j]]);
        }
    }
    out
}

/// Z-score each column (population standard deviation).
///
/// Constant columns have no spread to normalize by; they map to zeros.
pub fn zscore_columns(x: &ArrayView2<f64>) -> Result<Array2<f64>> {
    if x.nrows() == 0 {
        return Err(Error::Domain("zscore needs at least one row"));
    }
    let mut out = x.to_owned();
    let mut constant = 0usize;
    for mut col in out.axis_iter_mut(Axis(1)) {
        let n = col.len() as f64;
        let mean = col.sum() / n;
        let var = col.iter().map(|&v| (v - mean) * (v - mean)).sum::<f64>() / n;
        let sd = var.sqrt();
        if sd > 0.0 && sd.is_finite() {
            col.mapv_inplace(|v| (v - mean) / sd);
        } else {
            constant += 1;
            col.fill(0.0);
        }
    }
    if constant > 0 {
        warn!("zscore: {constant} constant column(s) mapped to zero");
    }
    Ok(out)
}

/// Min-max scale each row to [0, 1]. Constant rows map to zeros.
pub fn standard_scale_rows(x: &ArrayView2<f64>) -> Array2<f64> {
    let mut out = x.to_owned();
    for mut row in out.axis_iter_mut(Axis(0)) {
        let lo = row.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let span = hi - lo;
        if span > 0.0 && span.is_finite() {
            row.mapv_inplace(|v| (v - lo) / span);
        } else {
            row.fill(0.0);
        }
    }
    out
}

/// Subtract each column's minimum, so every column starts at zero.
pub fn subtract_column_min(x: &ArrayView2<f64>) -> Array2<f64> {
    let mut out = x.to_owned();
    for mut col in out.axis_iter_mut(Axis(1)) {
        let lo = col.iter().copied().fold(f64::INFINITY, f64::min);
        if lo.is_finite() {
            col.mapv_inplace(|v| v - lo);
        }
    }
    out
}

/// Mean row per distinct label.
///
/// Returns the distinct labels in ascending order together with a
/// `(labels, ncols)` matrix whose row `g` is the mean of the rows labeled `groups[g]`.
pub fn group_means(x: &ArrayView2<f64>, labels: &[usize]) -> Result<(Vec<usize>, Array2<f64>)> {
    if labels.len() != x.nrows() {
        return Err(Error::Shape("labels length must match data rows"));
    }
    if labels.is_empty() {
        return Err(Error::Domain("group_means needs at least one row"));
    }
    let mut groups: Vec<usize> = labels.to_vec();
    groups.sort_unstable();
    groups.dedup();

    let mut sums = Array2::<f64>::zeros((groups.len(), x.ncols()));
    let mut counts = Array1::<f64>::zeros(groups.len());
    for (row, &label) in x.axis_iter(Axis(0)).zip(labels) {
        // `groups` is sorted and contains every label.
        let g = groups.binary_search(&label).map_err(|_| Error::Domain("unknown label"))?;
        let mut acc = sums.row_mut(g);
        acc += &row;
        counts[g] += 1.0;
    }
    for (mut row, &c) in sums.axis_iter_mut(Axis(0)).zip(counts.iter()) {
        row /= c;
    }
    Ok((groups, sums))
}

/// `n` evenly spaced values over `[start, stop)`.
pub fn arange_open(start: f64, stop: f64, n: usize) -> Vec<f64> {
    let step = (stop - start) / n as f64;
    (0..n).map(|i| start + step * i as f64).collect()
}
