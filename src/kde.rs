//! Bivariate Gaussian kernel density estimate on a regular grid.
//!
//! Kernel covariance is the sample covariance scaled by Scott's factor
//! \(n^{-1/(d+4)}\) with \(d = 2\). The grid extends `cut` bandwidths past the data
//! range on each axis.

use crate::{Error, Result};
use log::debug;
use ndarray::{Array2, ArrayView1};

/// Density evaluated on a `ys.len() × xs.len()` grid (row = y, column = x).
#[derive(Debug, Clone)]
pub struct DensityGrid {
    pub xs: Vec<f64>,
    pub ys: Vec<f64>,
    pub z: Array2<f64>,
}

/// KDE grid parameters.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KdeConfig {
    /// Grid points per axis.
    pub gridsize: usize,
    /// Grid extension beyond the data, in bandwidths.
    pub cut: f64,
}

impl Default for KdeConfig {
    fn default() -> Self {
        Self {
            gridsize: 100,
            cut: 1.0,
        }
    }
}

/// Fit a 2D Gaussian KDE to the points `(x[i], y[i])` and evaluate it on a grid.
pub fn kde_2d(x: &ArrayView1<f64>, y: &ArrayView1<f64>, cfg: &KdeConfig) -> Result<DensityGrid> {
    let n = x.len();
    if y.len() != n {
        return Err(Error::Shape("x and y must have the same length"));
    }
    if n < 2 {
        return Err(Error::Domain("kde needs at least two points"));
    }
    if cfg.gridsize < 2 {
        return Err(Error::Domain("kde gridsize must be >= 2"));
    }
    if !cfg.cut.is_finite() || cfg.cut < 0.0 {
        return Err(Error::Domain("kde cut must be finite and >= 0"));
    }
    if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
        return Err(Error::Domain("kde input contains non-finite values"));
    }

    let nf = n as f64;
    let mx = x.sum() / nf;
    let my = y.sum() / nf;
    let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
    for (&a, &b) in x.iter().zip(y.iter()) {
        sxx += (a - mx) * (a - mx);
        syy += (b - my) * (b - my);
        sxy += (a - mx) * (b - my);
    }
    let denom = nf - 1.0;
    let (sxx, syy, sxy) = (sxx / denom, syy / denom, sxy / denom);

    let factor = nf.powf(-1.0 / 6.0);
    let f2 = factor * factor;
    let (cxx, cyy, cxy) = (sxx * f2, syy * f2, sxy * f2);
    let det = cxx * cyy - cxy * cxy;
    if !(det > 0.0) || !det.is_finite() {
        return Err(Error::Linalg("kde covariance is singular"));
    }
    let (ixx, iyy, ixy) = (cyy / det, cxx / det, -cxy / det);
    let norm = 1.0 / (nf * 2.0 * core::f64::consts::PI * det.sqrt());

    let bw_x = factor * sxx.sqrt();
    let bw_y = factor * syy.sqrt();
    debug!("kde: n={n} scott_factor={factor:.4} bw=({bw_x:.4}, {bw_y:.4})");

    let axis = |v: &ArrayView1<f64>, bw: f64| {
        let lo = v.iter().copied().fold(f64::INFINITY, f64::min) - cfg.cut * bw;
        let hi = v.iter().copied().fold(f64::NEG_INFINITY, f64::max) + cfg.cut * bw;
        let step = (hi - lo) / (cfg.gridsize - 1) as f64;
        (0..cfg.gridsize)
            .map(|i| lo + step * i as f64)
            .collect::<Vec<_>>()
    };
    let xs = axis(x, bw_x);
    let ys = axis(y, bw_y);

    let mut z = Array2::<f64>::zeros((ys.len(), xs.len()));
    for (r, &gy) in ys.iter().enumerate() {
        for (c, &gx) in xs.iter().enumerate() {
            let mut s = 0.0;
            for (&a, &b) in x.iter().zip(y.iter()) {
                let dx = gx - a;
                let dy = gy - b;
                let q = ixx * dx * dx + 2.0 * ixy * dx * dy + iyy * dy * dy;
                s += (-0.5 * q).exp();
            }
            z[[r, c]] = s * norm;
        }
    }

    Ok(DensityGrid { xs, ys, z })
}

impl DensityGrid {
    /// `n_levels + 1` evenly spaced contour boundaries from the minimum to the
    /// maximum density.
    pub fn levels(&self, n_levels: usize) -> Vec<f64> {
        let lo = self.z.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = self.z.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let step = (hi - lo) / n_levels.max(1) as f64;
        (0..=n_levels.max(1)).map(|i| lo + step * i as f64).collect()
    }

    /// Index of the band `v` falls in, given boundaries from [`Self::levels`].
    pub fn band(levels: &[f64], v: f64) -> usize {
        let bands = levels.len().saturating_sub(1);
        if bands == 0 {
            return 0;
        }
        // partition_point counts boundaries <= v; band i spans [levels[i], levels[i+1]).
        let above = levels[1..bands].partition_point(|&l| l <= v);
        above.min(bands - 1)
    }

    /// Grid cell size along x and y.
    pub fn cell(&self) -> (f64, f64) {
        let dx = if self.xs.len() > 1 {
            self.xs[1] - self.xs[0]
        } else {
            0.0
        };
        let dy = if self.ys.len() > 1 {
            self.ys[1] - self.ys[0]
        } else {
            0.0
        };
        (dx, dy)
    }
}
