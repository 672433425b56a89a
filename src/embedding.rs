//! 2D locally-linear embeddings (LLE).
//!
//! Two variants:
//!
//! - [`LleMethod::Standard`]: barycentric reconstruction weights from each point's
//!   `k` nearest neighbors, then the bottom eigenvectors of \(M = (I - W)^T (I - W)\).
//! - [`LleMethod::Modified`]: multiple-weight LLE (Zhang & Wang, 2007). Each
//!   neighborhood contributes several weight vectors built from its smallest local
//!   eigenvectors, which keeps the problem well conditioned when neighborhoods are
//!   large relative to the sample.
//!
//! Fitting is a typestate: [`LocallyLinearEmbedding`] is an unfit configuration, and
//! `fit` returns a [`FittedLle`] that can only `transform`. A fitted embedding is
//! therefore never refit by the plots that receive one.

use crate::{Error, Result};
use log::debug;
use nalgebra::{DMatrix, DVector, SymmetricEigen};
use ndarray::{Array2, ArrayView1, ArrayView2};

/// Below this many observations the selector switches to modified LLE.
pub const MODIFIED_BELOW_ROWS: usize = 50;

/// Default neighbor count as a fraction of the observation count.
pub const DEFAULT_NEIGHBOR_FRACTION: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LleMethod {
    Standard,
    Modified,
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LleConfig {
    pub n_neighbors: usize,
    pub n_components: usize,
    pub method: LleMethod,
    /// Tikhonov regularization of the local Gram matrices, relative to their trace.
    pub reg: f64,
    /// Householder vectors shorter than this are treated as zero (modified LLE).
    pub modified_tol: f64,
}

impl Default for LleConfig {
    fn default() -> Self {
        Self {
            n_neighbors: 10,
            n_components: 2,
            method: LleMethod::Standard,
            reg: 1e-3,
            modified_tol: 1e-12,
        }
    }
}

/// Something that maps observations into an already-fitted low-dimensional space.
pub trait Projection {
    fn transform(&self, data: &ArrayView2<f64>) -> Result<Array2<f64>>;
}

/// An unfit LLE configuration.
#[derive(Debug, Clone)]
pub struct LocallyLinearEmbedding {
    cfg: LleConfig,
}

/// A fitted LLE: training data, its embedding, and the settings used to fit it.
#[derive(Debug, Clone)]
pub struct FittedLle {
    train: Array2<f64>,
    embedding: Array2<f64>,
    n_neighbors: usize,
    reg: f64,
    method: LleMethod,
}

/// Pick a 2D LLE for `data`.
///
/// - `n_neighbors` defaults to `round(0.8 * rows)`.
/// - Fewer than 50 rows selects [`LleMethod::Modified`], otherwise
///   [`LleMethod::Standard`].
///
/// Nothing is fitted here.
pub fn choose_2d_embedding(data: &ArrayView2<f64>, n_neighbors: Option<usize>) -> LocallyLinearEmbedding {
    let rows = data.nrows();
    let n_neighbors =
        n_neighbors.unwrap_or_else(|| (rows as f64 * DEFAULT_NEIGHBOR_FRACTION).round() as usize);
    let method = if rows < MODIFIED_BELOW_ROWS {
        LleMethod::Modified
    } else {
        LleMethod::Standard
    };
    LocallyLinearEmbedding::new(LleConfig {
        n_neighbors,
        n_components: 2,
        method,
        ..LleConfig::default()
    })
}

/// Use `embedding` if the caller supplied one (transform only), otherwise pick and
/// fit a fresh one. Returns the embedding and the projected `data`.
pub fn resolve_embedding(
    data: &ArrayView2<f64>,
    n_neighbors: Option<usize>,
    embedding: Option<FittedLle>,
) -> Result<(FittedLle, Array2<f64>)> {
    let (fitted, projected) = match embedding {
        Some(fitted) => {
            let projected = fitted.transform(data)?;
            (fitted, projected)
        }
        None => choose_2d_embedding(data, n_neighbors).fit_transform(data)?,
    };
    if projected.ncols() != 2 {
        return Err(Error::Shape("embedding must be 2D"));
    }
    Ok((fitted, projected))
}

impl LocallyLinearEmbedding {
    pub fn new(cfg: LleConfig) -> Self {
        Self { cfg }
    }

    pub fn config(&self) -> &LleConfig {
        &self.cfg
    }

    pub fn method(&self) -> LleMethod {
        self.cfg.method
    }

    pub fn n_neighbors(&self) -> usize {
        self.cfg.n_neighbors
    }

    pub fn fit(&self, data: &ArrayView2<f64>) -> Result<FittedLle> {
        Ok(self.fit_transform(data)?.0)
    }

    /// Fit and return the training embedding alongside the fitted model.
    pub fn fit_transform(&self, data: &ArrayView2<f64>) -> Result<(FittedLle, Array2<f64>)> {
        let n = data.nrows();
        let k = self.cfg.n_neighbors;
        let nc = self.cfg.n_components;
        if n == 0 || data.ncols() == 0 {
            return Err(Error::Domain("LLE needs a non-empty data matrix"));
        }
        if data.iter().any(|v| !v.is_finite()) {
            return Err(Error::Domain("LLE input contains non-finite values"));
        }
        if k == 0 || k >= n {
            return Err(Error::Domain("n_neighbors must be in 1..rows"));
        }
        if nc == 0 || nc + 1 > n {
            return Err(Error::Domain("n_components must be in 1..rows"));
        }
        if !(self.cfg.reg > 0.0) || !self.cfg.reg.is_finite() {
            return Err(Error::Domain("reg must be positive and finite"));
        }

        debug!(
            "fitting LLE: rows={n} n_neighbors={k} method={:?}",
            self.cfg.method
        );

        let neighbors: Vec<Vec<usize>> = (0..n)
            .map(|i| nearest(data, &data.row(i), k, Some(i)))
            .collect();

        let m = match self.cfg.method {
            LleMethod::Standard => standard_cost(data, &neighbors, self.cfg.reg)?,
            LleMethod::Modified => {
                if k < nc {
                    return Err(Error::Domain(
                        "modified LLE needs n_neighbors >= n_components",
                    ));
                }
                modified_cost(data, &neighbors, nc, self.cfg.modified_tol)?
            }
        };

        let embedding = null_space(m, nc, 1)?;
        let fitted = FittedLle {
            train: data.to_owned(),
            embedding: embedding.clone(),
            n_neighbors: k,
            reg: self.cfg.reg,
            method: self.cfg.method,
        };
        Ok((fitted, embedding))
    }
}

impl FittedLle {
    /// Embedding of the training data.
    pub fn embedding(&self) -> &Array2<f64> {
        &self.embedding
    }

    pub fn n_neighbors(&self) -> usize {
        self.n_neighbors
    }

    pub fn method(&self) -> LleMethod {
        self.method
    }

    /// Project a single point.
    pub fn transform_point(&self, x: &ArrayView1<f64>) -> Result<ndarray::Array1<f64>> {
        let row = x.to_owned().insert_axis(ndarray::Axis(0));
        let out = self.transform(&row.view())?;
        Ok(out.row(0).to_owned())
    }
}

impl Projection for FittedLle {
    /// Reconstruct each row from its nearest training points and apply the same
    /// weights to their embedding coordinates.
    fn transform(&self, data: &ArrayView2<f64>) -> Result<Array2<f64>> {
        if data.ncols() != self.train.ncols() {
            return Err(Error::Shape("data columns must match the fitted embedding"));
        }
        if data.iter().any(|v| !v.is_finite()) {
            return Err(Error::Domain("transform input contains non-finite values"));
        }
        let nc = self.embedding.ncols();
        let train = self.train.view();
        let mut out = Array2::<f64>::zeros((data.nrows(), nc));
        for (i, x) in data.rows().into_iter().enumerate() {
            let nbrs = nearest(&train, &x, self.n_neighbors, None);
            let w = barycenter_weights(&train, &x, &nbrs, self.reg)?;
            for (j, &nb) in nbrs.iter().enumerate() {
                for c in 0..nc {
                    out[[i, c]] += w[j] * self.embedding[[nb, c]];
                }
            }
        }
        Ok(out)
    }
}

/// Indices of the `k` rows of `data` closest to `x`, nearest first. Ties break by
/// index so the result is deterministic.
fn nearest(data: &ArrayView2<f64>, x: &ArrayView1<f64>, k: usize, exclude: Option<usize>) -> Vec<usize> {
    let mut d: Vec<(f64, usize)> = data
        .rows()
        .into_iter()
        .enumerate()
        .filter(|(j, _)| Some(*j) != exclude)
        .map(|(j, r)| {
            let s: f64 = r.iter().zip(x.iter()).map(|(a, b)| (a - b) * (a - b)).sum();
            (s, j)
        })
        .collect();
    d.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
    d.into_iter().take(k).map(|(_, j)| j).collect()
}

/// Affine weights reconstructing `x` from `data[nbrs]`, regularized by
/// `reg * trace(G)` on the local Gram matrix.
fn barycenter_weights(
    data: &ArrayView2<f64>,
    x: &ArrayView1<f64>,
    nbrs: &[usize],
    reg: f64,
) -> Result<Vec<f64>> {
    let k = nbrs.len();
    let z = DMatrix::<f64>::from_fn(k, x.len(), |a, c| data[[nbrs[a], c]] - x[c]);
    let mut g = &z * z.transpose();
    let trace = g.trace();
    let r = if trace > 0.0 { reg * trace } else { reg };
    for a in 0..k {
        g[(a, a)] += r;
    }
    let ones = DVector::<f64>::from_element(k, 1.0);
    let w = match g.clone().cholesky() {
        Some(ch) => ch.solve(&ones),
        None => g
            .lu()
            .solve(&ones)
            .ok_or(Error::Linalg("local Gram matrix is singular"))?,
    };
    let s = w.sum();
    if !(s.abs() > 0.0) || !s.is_finite() {
        return Err(Error::Linalg("barycenter weights do not normalize"));
    }
    Ok(w.iter().map(|v| v / s).collect())
}

fn standard_cost(data: &ArrayView2<f64>, neighbors: &[Vec<usize>], reg: f64) -> Result<DMatrix<f64>> {
    let n = data.nrows();
    // M = (I - W)^T (I - W), accumulated row by row from the sparse W.
    let mut m = DMatrix::<f64>::zeros(n, n);
    for (i, nbrs) in neighbors.iter().enumerate() {
        let w = barycenter_weights(data, &data.row(i), nbrs, reg)?;
        m[(i, i)] += 1.0;
        for (a, &na) in nbrs.iter().enumerate() {
            m[(i, na)] -= w[a];
            m[(na, i)] -= w[a];
            for (b, &nb) in nbrs.iter().enumerate() {
                m[(na, nb)] += w[a] * w[b];
            }
        }
    }
    Ok(m)
}

/// Eigen-decomposition of a symmetric matrix with eigenvalues sorted descending.
fn sorted_eigh_desc(c: DMatrix<f64>) -> Result<(Vec<f64>, DMatrix<f64>)> {
    let eig = SymmetricEigen::try_new(c, f64::EPSILON, 0)
        .ok_or(Error::Linalg("symmetric eigen-decomposition did not converge"))?;
    let k = eig.eigenvalues.len();
    let mut order: Vec<usize> = (0..k).collect();
    order.sort_by(|&a, &b| eig.eigenvalues[b].total_cmp(&eig.eigenvalues[a]));
    let values = order.iter().map(|&j| eig.eigenvalues[j]).collect();
    let vectors = DMatrix::<f64>::from_fn(k, k, |r, c| eig.eigenvectors[(r, order[c])]);
    Ok((values, vectors))
}

fn median(v: &mut [f64]) -> f64 {
    v.sort_by(|a, b| a.total_cmp(b));
    let n = v.len();
    if n % 2 == 1 {
        v[n / 2]
    } else {
        0.5 * (v[n / 2 - 1] + v[n / 2])
    }
}

fn modified_cost(
    data: &ArrayView2<f64>,
    neighbors: &[Vec<usize>],
    nc: usize,
    tol: f64,
) -> Result<DMatrix<f64>> {
    let n = data.nrows();
    let d_in = data.ncols();
    let k = neighbors.first().map(|v| v.len()).unwrap_or(0);
    let nev = d_in.min(k);

    // Local eigen-decompositions of the neighborhood Gram matrices.
    let mut local_vecs: Vec<DMatrix<f64>> = Vec::with_capacity(n);
    let mut local_vals: Vec<Vec<f64>> = Vec::with_capacity(n);
    for (i, nbrs) in neighbors.iter().enumerate() {
        let z = DMatrix::<f64>::from_fn(k, d_in, |a, c| data[[nbrs[a], c]] - data[[i, c]]);
        let (vals, vecs) = sorted_eigh_desc(&z * z.transpose())?;
        local_vals.push(vals.into_iter().take(nev).map(|v| v.max(0.0)).collect());
        local_vecs.push(vecs);
    }

    // Regularized weights.
    let mut w_reg: Vec<DVector<f64>> = Vec::with_capacity(n);
    for (vals, v) in local_vals.iter().zip(&local_vecs) {
        let reg = 1e-3 * vals.iter().sum::<f64>();
        if !(reg > 0.0) {
            return Err(Error::Linalg("neighborhood has zero spread"));
        }
        let ones = DVector::<f64>::from_element(k, 1.0);
        let mut tmp = v.transpose() * ones;
        for j in 0..k {
            tmp[j] /= if j < nev { vals[j] + reg } else { reg };
        }
        let w = v * tmp;
        let s = w.sum();
        if !(s.abs() > 0.0) || !s.is_finite() {
            return Err(Error::Linalg("regularized weights do not normalize"));
        }
        w_reg.push(w / s);
    }

    // Number of slack eigenvectors per point, chosen against the median ratio.
    let mut rho: Vec<f64> = local_vals
        .iter()
        .map(|vals| {
            let top: f64 = vals.iter().take(nc).sum();
            let rest: f64 = vals.iter().skip(nc).sum();
            rest / top
        })
        .collect();
    let eta = median(&mut rho);

    let mut m = DMatrix::<f64>::zeros(n, n);
    for (i, nbrs) in neighbors.iter().enumerate() {
        let vals = &local_vals[i];
        let total: f64 = vals.iter().sum();
        let mut cumsum = 0.0;
        // eta_range[j] = total / cumsum[j] - 1 is decreasing in j; count the
        // entries below eta.
        let mut below = 0usize;
        for &v in vals.iter().take(nev.saturating_sub(1)) {
            cumsum += v;
            let ratio = total / cumsum - 1.0;
            if ratio < eta {
                below += 1;
            }
        }
        let s_i = (below + k - nev).max(1);

        let v = &local_vecs[i];
        let vi = v.columns(k - s_i, s_i).into_owned();
        let col_sums = DVector::<f64>::from_fn(s_i, |c, _| vi.column(c).sum());
        let alpha = col_sums.norm() / (s_i as f64).sqrt();
        let mut h = DVector::<f64>::from_element(s_i, alpha) - &col_sums;
        let h_norm = h.norm();
        if h_norm < tol {
            h.fill(0.0);
        } else {
            h /= h_norm;
        }

        let vh = &vi * &h;
        let mut wi = &vi - (&vh * h.transpose()) * 2.0;
        for c in 0..s_i {
            for r in 0..k {
                wi[(r, c)] += (1.0 - alpha) * w_reg[i][r];
            }
        }

        let wwt = &wi * wi.transpose();
        for (a, &na) in nbrs.iter().enumerate() {
            for (b, &nb) in nbrs.iter().enumerate() {
                m[(na, nb)] += wwt[(a, b)];
            }
        }
        for (a, &na) in nbrs.iter().enumerate() {
            let row_sum: f64 = wi.row(a).sum();
            m[(i, na)] -= row_sum;
            m[(na, i)] -= row_sum;
        }
        m[(i, i)] += s_i as f64;
    }
    Ok(m)
}

/// Eigenvectors of `m` for the `nc` smallest eigenvalues after skipping `skip`.
fn null_space(m: DMatrix<f64>, nc: usize, skip: usize) -> Result<Array2<f64>> {
    let n = m.nrows();
    let eig = SymmetricEigen::try_new(m, f64::EPSILON, 0)
        .ok_or(Error::Linalg("symmetric eigen-decomposition did not converge"))?;
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| eig.eigenvalues[a].total_cmp(&eig.eigenvalues[b]));
    if skip + nc > n {
        return Err(Error::Domain("not enough eigenvectors for n_components"));
    }
    let mut out = Array2::<f64>::zeros((n, nc));
    for c in 0..nc {
        let j = order[skip + c];
        for r in 0..n {
            out[[r, c]] = eig.eigenvectors[(r, j)];
        }
    }
    if out.iter().any(|v| !v.is_finite()) {
        return Err(Error::Linalg("embedding contains non-finite values"));
    }
    Ok(out)
}
