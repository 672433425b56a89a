//! Collaborator contracts for the plots, plus small reference implementations.
//!
//! The plots never look inside a model; they only call the methods below. Any
//! implementation with the same contract can be substituted.
//!
//! - [`StateModel`]: classify observations into metastable states; report a
//!   representative point (centroid) per state.
//! - [`MetastableGraph`]: a state model plus weighted edges between states.
//! - [`TransitionModel`]: a continuous trajectory over pseudotime with a mean and a
//!   sampler for draws around it.

use crate::{Error, Result};
use ndarray::{Array1, Array2, ArrayView2, Axis};
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, StandardNormal};
use std::collections::BTreeMap;

/// An unordered pair of state ids, stored as given.
pub type StateEdge = (usize, usize);

/// Edge weight per state pair, in [0, 1]. Ordered so drawing order is reproducible.
pub type EdgeWeights = BTreeMap<StateEdge, f64>;

pub trait StateModel {
    /// One state id per row of `data`.
    fn predict(&self, data: &ArrayView2<f64>) -> Result<Vec<usize>>;

    /// Representative point of `state`, in the data's feature space.
    fn centroid(&self, state: usize) -> Result<Array1<f64>>;
}

pub trait MetastableGraph {
    type Model: StateModel;

    fn state_model(&self) -> &Self::Model;

    fn state_edges(&self) -> Vec<StateEdge>;

    fn edge_weights(&self) -> EdgeWeights;
}

pub trait TransitionModel {
    /// Mean position at each timepoint, one row per timepoint.
    fn mean(&self, timepoints: &[f64]) -> Result<Array2<f64>>;

    /// `n` draws spread along `timepoints`, one row per draw.
    fn sample_along_timepoints(&self, timepoints: &[f64], n: usize, seed: u64)
        -> Result<Array2<f64>>;
}

/// Nearest-centroid classifier.
#[derive(Debug, Clone)]
pub struct CentroidModel {
    /// `(n_states, n_features)`; row `s` is the centroid of state `s`.
    pub centroids: Array2<f64>,
}

impl CentroidModel {
    pub fn new(centroids: Array2<f64>) -> Result<Self> {
        if centroids.nrows() == 0 || centroids.ncols() == 0 {
            return Err(Error::Domain("centroid matrix must be non-empty"));
        }
        Ok(Self { centroids })
    }

    /// Centroids as per-label means. Labels must cover `0..=max(label)`.
    pub fn from_labels(data: &ArrayView2<f64>, labels: &[usize]) -> Result<Self> {
        let (groups, means) = crate::stats::group_means(data, labels)?;
        if groups.iter().enumerate().any(|(i, &g)| i != g) {
            return Err(Error::Domain("labels must be contiguous from 0"));
        }
        Self::new(means)
    }

    pub fn n_states(&self) -> usize {
        self.centroids.nrows()
    }
}

impl StateModel for CentroidModel {
    fn predict(&self, data: &ArrayView2<f64>) -> Result<Vec<usize>> {
        if data.ncols() != self.centroids.ncols() {
            return Err(Error::Shape("data columns must match centroid dimension"));
        }
        let mut out = Vec::with_capacity(data.nrows());
        for row in data.axis_iter(Axis(0)) {
            let mut best = 0usize;
            let mut best_d = f64::INFINITY;
            for (s, c) in self.centroids.axis_iter(Axis(0)).enumerate() {
                let d: f64 = row.iter().zip(c.iter()).map(|(a, b)| (a - b) * (a - b)).sum();
                if d < best_d {
                    best = s;
                    best_d = d;
                }
            }
            out.push(best);
        }
        Ok(out)
    }

    fn centroid(&self, state: usize) -> Result<Array1<f64>> {
        if state >= self.centroids.nrows() {
            return Err(Error::Domain("state id out of range"));
        }
        Ok(self.centroids.row(state).to_owned())
    }
}

/// A metastable graph over `n` states backed by a petgraph undirected graph.
///
/// Node index `i` is state `i`.
#[derive(Debug, Clone)]
pub struct StateGraph<M> {
    model: M,
    graph: UnGraph<(), f64>,
}

impl<M: StateModel> StateGraph<M> {
    pub fn new(model: M, n_states: usize) -> Self {
        let mut graph = UnGraph::with_capacity(n_states, 0);
        for _ in 0..n_states {
            graph.add_node(());
        }
        Self { model, graph }
    }

    pub fn n_states(&self) -> usize {
        self.graph.node_count()
    }

    /// Add (or overwrite) the edge between two states.
    pub fn add_edge(&mut self, a: usize, b: usize, weight: f64) -> Result<()> {
        let n = self.graph.node_count();
        if a >= n || b >= n {
            return Err(Error::Domain("edge endpoint is not a state"));
        }
        if !(0.0..=1.0).contains(&weight) {
            return Err(Error::Domain("edge weight must be in [0, 1]"));
        }
        self.graph
            .update_edge(NodeIndex::new(a), NodeIndex::new(b), weight);
        Ok(())
    }
}

impl<M: StateModel> MetastableGraph for StateGraph<M> {
    type Model = M;

    fn state_model(&self) -> &M {
        &self.model
    }

    fn state_edges(&self) -> Vec<StateEdge> {
        self.graph
            .edge_references()
            .map(|e| (e.source().index(), e.target().index()))
            .collect()
    }

    fn edge_weights(&self) -> EdgeWeights {
        self.graph
            .edge_references()
            .map(|e| ((e.source().index(), e.target().index()), *e.weight()))
            .collect()
    }
}

/// Gaussian transition model with means and variances linearly interpolated between
/// knots in pseudotime. Outside the knot range the end values are held.
#[derive(Debug, Clone)]
pub struct PiecewiseLinearTransition {
    knots: Vec<f64>,
    means: Array2<f64>,
    variances: Array2<f64>,
}

impl PiecewiseLinearTransition {
    /// `means` and `variances` are `(knots.len(), d)`; knots must be strictly increasing.
    pub fn new(knots: Vec<f64>, means: Array2<f64>, variances: Array2<f64>) -> Result<Self> {
        if knots.is_empty() {
            return Err(Error::Domain("transition model needs at least one knot"));
        }
        if means.nrows() != knots.len() || variances.raw_dim() != means.raw_dim() {
            return Err(Error::Shape("means/variances must be (knots, d)"));
        }
        if knots.windows(2).any(|w| !(w[0] < w[1])) {
            return Err(Error::Domain("knots must be strictly increasing"));
        }
        if variances.iter().any(|&v| !(v >= 0.0) || !v.is_finite()) {
            return Err(Error::Domain("variances must be finite and >= 0"));
        }
        Ok(Self {
            knots,
            means,
            variances,
        })
    }

    pub fn dim(&self) -> usize {
        self.means.ncols()
    }

    fn interp(&self, table: &Array2<f64>, t: f64) -> Array1<f64> {
        let last = self.knots.len() - 1;
        if t <= self.knots[0] {
            return table.row(0).to_owned();
        }
        if t >= self.knots[last] {
            return table.row(last).to_owned();
        }
        let hi = self.knots.partition_point(|&k| k <= t);
        let lo = hi - 1;
        let w = (t - self.knots[lo]) / (self.knots[hi] - self.knots[lo]);
        &table.row(lo) * (1.0 - w) + &table.row(hi) * w
    }

    /// Variance at each timepoint, one row per timepoint.
    pub fn variance(&self, timepoints: &[f64]) -> Array2<f64> {
        stack_rows(timepoints, self.dim(), |t| self.interp(&self.variances, t))
    }
}

fn stack_rows(timepoints: &[f64], d: usize, f: impl Fn(f64) -> Array1<f64>) -> Array2<f64> {
    let mut out = Array2::<f64>::zeros((timepoints.len(), d));
    for (mut row, &t) in out.axis_iter_mut(Axis(0)).zip(timepoints) {
        row.assign(&f(t));
    }
    out
}

impl TransitionModel for PiecewiseLinearTransition {
    fn mean(&self, timepoints: &[f64]) -> Result<Array2<f64>> {
        if timepoints.iter().any(|t| !t.is_finite()) {
            return Err(Error::Domain("timepoints must be finite"));
        }
        Ok(stack_rows(timepoints, self.dim(), |t| {
            self.interp(&self.means, t)
        }))
    }

    /// Draws are assigned to timepoints evenly: draw `i` uses timepoint
    /// `floor(i * T / n)`.
    fn sample_along_timepoints(
        &self,
        timepoints: &[f64],
        n: usize,
        seed: u64,
    ) -> Result<Array2<f64>> {
        if timepoints.is_empty() {
            return Err(Error::Domain("timepoints must be non-empty"));
        }
        let means = self.mean(timepoints)?;
        let sds = self.variance(timepoints).mapv(f64::sqrt);
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let tlen = timepoints.len();
        let mut out = Array2::<f64>::zeros((n, self.dim()));
        for i in 0..n {
            let ti = i * tlen / n;
            for k in 0..self.dim() {
                let z: f64 = StandardNormal.sample(&mut rng);
                out[[i, k]] = means[[ti, k]] + sds[[ti, k]] * z;
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn line_model() -> PiecewiseLinearTransition {
        PiecewiseLinearTransition::new(
            vec![0.0, 1.0],
            array![[0.0, 0.0], [2.0, 4.0]],
            array![[0.0, 0.0], [0.0, 0.0]],
        )
        .unwrap()
    }

    #[test]
    fn centroid_model_predicts_nearest() {
        let m = CentroidModel::new(array![[0.0, 0.0], [5.0, 5.0]]).unwrap();
        let data = array![[0.1, -0.2], [4.0, 6.0], [2.4, 2.4]];
        assert_eq!(m.predict(&data.view()).unwrap(), vec![0, 1, 0]);
        assert_eq!(m.centroid(1).unwrap(), array![5.0, 5.0]);
        assert!(m.centroid(2).is_err());
        assert!(m.predict(&array![[1.0]].view()).is_err());
    }

    #[test]
    fn centroid_model_from_labels_requires_contiguous_ids() {
        let data = array![[0.0], [2.0], [10.0]];
        let m = CentroidModel::from_labels(&data.view(), &[0, 0, 1]).unwrap();
        assert_eq!(m.centroids, array![[1.0], [10.0]]);
        assert!(CentroidModel::from_labels(&data.view(), &[0, 0, 2]).is_err());
    }

    #[test]
    fn state_graph_reports_edges_and_weights() {
        let m = CentroidModel::new(array![[0.0], [1.0], [2.0]]).unwrap();
        let mut g = StateGraph::new(m, 3);
        g.add_edge(0, 1, 0.25).unwrap();
        g.add_edge(1, 2, 0.75).unwrap();
        g.add_edge(0, 1, 0.5).unwrap();
        assert!(g.add_edge(0, 3, 0.1).is_err());
        assert!(g.add_edge(0, 2, 1.5).is_err());

        assert_eq!(g.state_edges(), vec![(0, 1), (1, 2)]);
        let w = g.edge_weights();
        assert_eq!(w.get(&(0, 1)), Some(&0.5));
        assert_eq!(w.get(&(1, 2)), Some(&0.75));
    }

    #[test]
    fn transition_mean_interpolates_and_clamps() {
        let m = line_model();
        let mu = m.mean(&[-1.0, 0.25, 0.5, 2.0]).unwrap();
        assert_eq!(mu, array![[0.0, 0.0], [0.5, 1.0], [1.0, 2.0], [2.0, 4.0]]);
    }

    #[test]
    fn zero_variance_samples_sit_on_the_mean_evenly() {
        let m = line_model();
        let ts = [0.0, 0.5, 1.0];
        let s = m.sample_along_timepoints(&ts, 6, 1).unwrap();
        let mu = m.mean(&ts).unwrap();
        for i in 0..6 {
            assert_eq!(s.row(i), mu.row(i * 3 / 6));
        }
    }

    #[test]
    fn sampling_is_seed_deterministic() {
        let m = PiecewiseLinearTransition::new(
            vec![0.0, 1.0],
            array![[0.0], [1.0]],
            array![[1.0], [1.0]],
        )
        .unwrap();
        let ts = [0.1, 0.9];
        let a = m.sample_along_timepoints(&ts, 20, 42).unwrap();
        let b = m.sample_along_timepoints(&ts, 20, 42).unwrap();
        let c = m.sample_along_timepoints(&ts, 20, 43).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
