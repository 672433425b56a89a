//! Agglomerative clustering for clustermaps.
//!
//! - `pairwise_distances`: dense symmetric distance matrix over the rows of a matrix.
//! - `linkage`: hierarchical clustering via the nearest-neighbor chain algorithm.
//!   Complete and average linkage are both reducible, so the chain produces the same
//!   tree as the naive O(n³) algorithm in O(n²) time.
//! - `Dendrogram::flat_clusters`: cut into at most `k` flat clusters (`maxclust`).
//!
//! Merge indexing follows the usual convention: leaves are `0..n`, and the cluster
//! created by merge `i` (merges sorted by height) has id `n + i`.

use crate::{Error, Result};
use log::{debug, warn};
use ndarray::{Array2, ArrayView1, ArrayView2, Axis};

/// Row-to-row distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Metric {
    Euclidean,
    SqEuclidean,
    /// Euclidean with each coordinate scaled by its sample variance across rows.
    StandardizedEuclidean,
    /// `1 - pearson(u, v)`. A constant row is treated as uncorrelated (distance 1).
    Correlation,
}

/// How the distance between two clusters is derived from member distances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Linkage {
    /// Maximum pairwise distance.
    Complete,
    /// Mean pairwise distance (UPGMA).
    Average,
}

impl Linkage {
    #[inline]
    fn update(self, d_ai: f64, d_bi: f64, size_a: usize, size_b: usize) -> f64 {
        match self {
            Linkage::Complete => d_ai.max(d_bi),
            Linkage::Average => {
                let (na, nb) = (size_a as f64, size_b as f64);
                (na * d_ai + nb * d_bi) / (na + nb)
            }
        }
    }
}

/// Dense pairwise distances between the rows of `x`.
pub fn pairwise_distances(x: &ArrayView2<f64>, metric: Metric) -> Result<Array2<f64>> {
    let n = x.nrows();
    if n == 0 || x.ncols() == 0 {
        return Err(Error::Domain("pairwise_distances needs a non-empty matrix"));
    }
    if x.iter().any(|v| !v.is_finite()) {
        return Err(Error::Domain("pairwise_distances input contains non-finite values"));
    }

    let variances = match metric {
        Metric::StandardizedEuclidean => {
            if n < 2 {
                return Err(Error::Domain("standardized euclidean needs at least two rows"));
            }
            let v = x.var_axis(Axis(0), 1.0);
            if v.iter().any(|&s| !(s > 0.0)) {
                return Err(Error::Domain(
                    "standardized euclidean needs non-constant columns",
                ));
            }
            Some(v)
        }
        _ => None,
    };

    let centered;
    let norms;
    if metric == Metric::Correlation {
        let means = x.mean_axis(Axis(1)).ok_or(Error::Domain("empty rows"))?;
        let mut c = x.to_owned();
        for (mut row, m) in c.axis_iter_mut(Axis(0)).zip(means.iter()) {
            row -= *m;
        }
        norms = c
            .axis_iter(Axis(0))
            .map(|r| r.dot(&r).sqrt())
            .collect::<Vec<_>>();
        let constant = norms.iter().filter(|&&v| v == 0.0).count();
        if constant > 0 {
            warn!("correlation distance: {constant} constant row(s) treated as uncorrelated");
        }
        centered = Some(c);
    } else {
        norms = Vec::new();
        centered = None;
    }

    let mut d = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in (i + 1)..n {
            let v = match metric {
                Metric::Euclidean => sq_euclidean(&x.row(i), &x.row(j)).sqrt(),
                Metric::SqEuclidean => sq_euclidean(&x.row(i), &x.row(j)),
                Metric::StandardizedEuclidean => {
                    let var = variances.as_ref().ok_or(Error::Domain("missing variances"))?;
                    let mut s = 0.0;
                    for k in 0..x.ncols() {
                        let r = x[[i, k]] - x[[j, k]];
                        s += r * r / var[k];
                    }
                    s.sqrt()
                }
                Metric::Correlation => {
                    let c = centered.as_ref().ok_or(Error::Domain("missing centered rows"))?;
                    let denom = norms[i] * norms[j];
                    if denom > 0.0 {
                        (1.0 - c.row(i).dot(&c.row(j)) / denom).max(0.0)
                    } else {
                        1.0
                    }
                }
            };
            d[[i, j]] = v;
            d[[j, i]] = v;
        }
    }
    Ok(d)
}

#[inline]
fn sq_euclidean(a: &ArrayView1<f64>, b: &ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// One agglomeration step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Merge {
    /// Smaller cluster id.
    pub left: usize,
    /// Larger cluster id.
    pub right: usize,
    pub height: f64,
    /// Number of leaves under the merged cluster.
    pub size: usize,
}

/// A full binary merge tree over `n` leaves.
#[derive(Debug, Clone, PartialEq)]
pub struct Dendrogram {
    n: usize,
    merges: Vec<Merge>,
}

/// Hierarchical clustering of a precomputed square distance matrix.
pub fn linkage(dist: &ArrayView2<f64>, method: Linkage) -> Result<Dendrogram> {
    let n = dist.nrows();
    if dist.ncols() != n {
        return Err(Error::Shape("distance matrix must be square"));
    }
    if n == 0 {
        return Err(Error::Domain("linkage needs at least one observation"));
    }
    if dist.iter().any(|v| !v.is_finite()) {
        return Err(Error::Domain("distance matrix contains non-finite values"));
    }

    let mut d = dist.to_owned();
    let mut active = vec![true; n];
    let mut size = vec![1usize; n];
    let mut chain: Vec<usize> = Vec::with_capacity(n);
    // (slot_a, slot_b, height) in discovery order; slot_b keeps the merged cluster.
    let mut raw: Vec<(usize, usize, f64)> = Vec::with_capacity(n.saturating_sub(1));

    for _ in 1..n {
        if chain.is_empty() {
            let first = active
                .iter()
                .position(|&a| a)
                .ok_or(Error::Domain("no active cluster left"))?;
            chain.push(first);
        }

        let (a, b, h) = loop {
            let a = chain[chain.len() - 1];
            let prev = if chain.len() >= 2 {
                Some(chain[chain.len() - 2])
            } else {
                None
            };
            let (mut best, mut best_d) = match prev {
                Some(p) => (p, d[[a, p]]),
                None => (usize::MAX, f64::INFINITY),
            };
            for i in 0..n {
                if active[i] && i != a && d[[a, i]] < best_d {
                    best = i;
                    best_d = d[[a, i]];
                }
            }
            if best == usize::MAX {
                return Err(Error::Domain("no merge candidate found"));
            }
            if prev == Some(best) {
                chain.truncate(chain.len() - 2);
                break (a, best, best_d);
            }
            chain.push(best);
        };

        raw.push((a, b, h));
        for i in 0..n {
            if active[i] && i != a && i != b {
                let v = method.update(d[[a, i]], d[[b, i]], size[a], size[b]);
                d[[b, i]] = v;
                d[[i, b]] = v;
            }
        }
        size[b] += size[a];
        active[a] = false;
    }

    // Chain order is not height order; relabel in sorted order with union-find.
    raw.sort_by(|x, y| x.2.total_cmp(&y.2));
    let mut parent: Vec<usize> = (0..2 * n - 1).collect();
    let mut csize: Vec<usize> = vec![1; 2 * n - 1];
    let mut merges = Vec::with_capacity(raw.len());
    for (k, &(a, b, h)) in raw.iter().enumerate() {
        let ra = find(&mut parent, a);
        let rb = find(&mut parent, b);
        let id = n + k;
        parent[ra] = id;
        parent[rb] = id;
        csize[id] = csize[ra] + csize[rb];
        merges.push(Merge {
            left: ra.min(rb),
            right: ra.max(rb),
            height: h,
            size: csize[id],
        });
    }

    debug!("linkage: {n} leaves, {:?}", method);
    Ok(Dendrogram { n, merges })
}

fn find(parent: &mut [usize], mut x: usize) -> usize {
    let mut root = x;
    while parent[root] != root {
        root = parent[root];
    }
    while parent[x] != root {
        let next = parent[x];
        parent[x] = root;
        x = next;
    }
    root
}

/// Cluster rows of `x` in one call: distances, then linkage.
pub fn cluster_rows(x: &ArrayView2<f64>, metric: Metric, method: Linkage) -> Result<Dendrogram> {
    let d = pairwise_distances(x, metric)?;
    linkage(&d.view(), method)
}

impl Dendrogram {
    pub fn n_leaves(&self) -> usize {
        self.n
    }

    /// Merges sorted by non-decreasing height.
    pub fn merges(&self) -> &[Merge] {
        &self.merges
    }

    fn root(&self) -> usize {
        if self.merges.is_empty() {
            0
        } else {
            self.n + self.merges.len() - 1
        }
    }

    fn children(&self, id: usize) -> Option<(usize, usize)> {
        if id < self.n {
            None
        } else {
            let m = &self.merges[id - self.n];
            Some((m.left, m.right))
        }
    }

    /// Leaves in left-to-right drawing order.
    pub fn leaves(&self) -> Vec<usize> {
        let mut out = Vec::with_capacity(self.n);
        let mut stack = vec![self.root()];
        while let Some(id) = stack.pop() {
            match self.children(id) {
                None => out.push(id),
                Some((l, r)) => {
                    stack.push(r);
                    stack.push(l);
                }
            }
        }
        out
    }

    /// Flat cluster labels (1-based) with at most `k` clusters.
    ///
    /// Uses the smallest merge height `t` that yields at most `k` clusters and keeps
    /// every merge at or below `t`, so tied heights may produce fewer than `k`
    /// clusters. Labels are numbered in leaf drawing order.
    pub fn flat_clusters(&self, k: usize) -> Result<Vec<usize>> {
        if k == 0 {
            return Err(Error::Domain("maxclust needs k >= 1"));
        }
        let threshold = if k >= self.n {
            f64::NEG_INFINITY
        } else {
            self.merges[self.n - k - 1].height
        };

        let mut labels = vec![0usize; self.n];
        let mut next = 0usize;
        let mut stack = vec![self.root()];
        while let Some(id) = stack.pop() {
            match self.children(id) {
                Some((l, r)) if self.merges[id - self.n].height > threshold => {
                    stack.push(r);
                    stack.push(l);
                }
                _ => {
                    next += 1;
                    let mut sub = vec![id];
                    while let Some(s) = sub.pop() {
                        match self.children(s) {
                            None => labels[s] = next,
                            Some((l, r)) => {
                                sub.push(r);
                                sub.push(l);
                            }
                        }
                    }
                }
            }
        }
        debug!("maxclust: k={k} -> {next} flat clusters");
        Ok(labels)
    }

    /// U-shaped link segments for drawing, in (position, height) coordinates.
    ///
    /// Leaf `i` in drawing order sits at position `i + 0.5`; each link is
    /// `[(x_l, h_l), (x_l, h), (x_r, h), (x_r, h_r)]`.
    pub fn links(&self) -> Vec<[(f64, f64); 4]> {
        let mut pos = vec![0.0f64; self.n + self.merges.len()];
        let mut height = vec![0.0f64; self.n + self.merges.len()];
        for (slot, leaf) in self.leaves().into_iter().enumerate() {
            pos[leaf] = slot as f64 + 0.5;
        }
        let mut out = Vec::with_capacity(self.merges.len());
        for (k, m) in self.merges.iter().enumerate() {
            let id = self.n + k;
            pos[id] = 0.5 * (pos[m.left] + pos[m.right]);
            height[id] = m.height;
            out.push([
                (pos[m.left], height[m.left]),
                (pos[m.left], m.height),
                (pos[m.right], m.height),
                (pos[m.right], height[m.right]),
            ]);
        }
        out
    }

    /// Height of the root merge (0 for a single leaf).
    pub fn max_height(&self) -> f64 {
        self.merges.last().map(|m| m.height).unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use rand_distr::{Distribution, StandardNormal};

    /// Naive O(n³) agglomeration returning sorted merge heights.
    fn naive_heights(d: &Array2<f64>, method: Linkage) -> Vec<f64> {
        let n = d.nrows();
        let mut clusters: Vec<Vec<usize>> = (0..n).map(|i| vec![i]).collect();
        let mut heights = Vec::new();
        while clusters.len() > 1 {
            let mut best = (0, 1, f64::INFINITY);
            for a in 0..clusters.len() {
                for b in (a + 1)..clusters.len() {
                    let mut acc = match method {
                        Linkage::Complete => f64::NEG_INFINITY,
                        Linkage::Average => 0.0,
                    };
                    for &i in &clusters[a] {
                        for &j in &clusters[b] {
                            match method {
                                Linkage::Complete => acc = acc.max(d[[i, j]]),
                                Linkage::Average => acc += d[[i, j]],
                            }
                        }
                    }
                    if method == Linkage::Average {
                        acc /= (clusters[a].len() * clusters[b].len()) as f64;
                    }
                    if acc < best.2 {
                        best = (a, b, acc);
                    }
                }
            }
            let merged = clusters.remove(best.1);
            clusters[best.0].extend(merged);
            heights.push(best.2);
        }
        heights.sort_by(|a, b| a.total_cmp(b));
        heights
    }

    #[test]
    fn two_obvious_groups_split_at_top() {
        let x = array![[0.0, 0.0], [0.1, 0.0], [0.0, 0.1], [10.0, 10.0], [10.1, 10.0]];
        let tree = cluster_rows(&x.view(), Metric::Euclidean, Linkage::Complete).unwrap();
        assert_eq!(tree.merges().len(), 4);
        assert_eq!(tree.merges().last().unwrap().size, 5);

        let labels = tree.flat_clusters(2).unwrap();
        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[0], labels[2]);
        assert_eq!(labels[3], labels[4]);
        assert_ne!(labels[0], labels[3]);

        let mut leaves = tree.leaves();
        leaves.sort_unstable();
        assert_eq!(leaves, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn maxclust_larger_than_n_gives_singletons() {
        let x = array![[0.0], [1.0], [3.0]];
        let tree = cluster_rows(&x.view(), Metric::Euclidean, Linkage::Average).unwrap();
        let mut labels = tree.flat_clusters(10).unwrap();
        labels.sort_unstable();
        assert_eq!(labels, vec![1, 2, 3]);
        assert_eq!(tree.flat_clusters(1).unwrap(), vec![1, 1, 1]);
        assert!(tree.flat_clusters(0).is_err());
    }

    #[test]
    fn single_leaf_is_one_cluster() {
        let x = array![[1.0, 2.0]];
        let tree = cluster_rows(&x.view(), Metric::Euclidean, Linkage::Complete).unwrap();
        assert_eq!(tree.leaves(), vec![0]);
        assert_eq!(tree.flat_clusters(3).unwrap(), vec![1]);
        assert!(tree.links().is_empty());
    }

    #[test]
    fn correlation_distance_ignores_scale_and_offset() {
        let x = array![[1.0, 2.0, 3.0], [10.0, 20.0, 30.0], [3.0, 2.0, 1.0], [5.0, 5.0, 5.0]];
        let d = pairwise_distances(&x.view(), Metric::Correlation).unwrap();
        assert!(d[[0, 1]].abs() < 1e-12);
        assert!((d[[0, 2]] - 2.0).abs() < 1e-12);
        assert_eq!(d[[0, 3]], 1.0);
    }

    #[test]
    fn sq_euclidean_squares_euclidean() {
        let x = array![[0.0, 0.0], [3.0, 4.0]];
        let e = pairwise_distances(&x.view(), Metric::Euclidean).unwrap();
        let s = pairwise_distances(&x.view(), Metric::SqEuclidean).unwrap();
        assert_eq!(e[[0, 1]], 5.0);
        assert_eq!(s[[0, 1]], 25.0);
    }

    #[test]
    fn links_sit_over_leaf_slots() {
        let x = array![[0.0], [1.0], [5.0]];
        let tree = cluster_rows(&x.view(), Metric::Euclidean, Linkage::Complete).unwrap();
        let links = tree.links();
        assert_eq!(links.len(), 2);
        let top = links[1];
        assert_eq!(top[1].1, tree.max_height());
        assert!(top.iter().all(|&(x, _)| (0.0..=3.0).contains(&x)));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 48,
            .. ProptestConfig::default()
        })]
        #[test]
        fn prop_nn_chain_matches_naive_heights(
            n in 2usize..14,
            d in 1usize..4,
            seed in any::<u64>(),
            average in any::<bool>(),
        ) {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let mut x = Array2::<f64>::zeros((n, d));
            for v in x.iter_mut() {
                *v = StandardNormal.sample(&mut rng);
            }
            let method = if average { Linkage::Average } else { Linkage::Complete };
            let dist = pairwise_distances(&x.view(), Metric::Euclidean).unwrap();
            let tree = linkage(&dist.view(), method).unwrap();
            let got: Vec<f64> = tree.merges().iter().map(|m| m.height).collect();
            let want = naive_heights(&dist, method);
            prop_assert_eq!(got.len(), want.len());
            for (g, w) in got.iter().zip(want.iter()) {
                prop_assert!((g - w).abs() < 1e-9, "height mismatch: {g} vs {w}");
            }
        }

        #[test]
        fn prop_flat_clusters_partition_leaves(
            n in 1usize..30,
            k in 1usize..12,
            seed in any::<u64>(),
        ) {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let mut x = Array2::<f64>::zeros((n, 3));
            for v in x.iter_mut() {
                *v = StandardNormal.sample(&mut rng);
            }
            let tree = cluster_rows(&x.view(), Metric::SqEuclidean, Linkage::Complete).unwrap();
            let labels = tree.flat_clusters(k).unwrap();
            prop_assert_eq!(labels.len(), n);
            let max = *labels.iter().max().unwrap();
            prop_assert!(max <= k.min(n));
            // Labels are contiguous 1..=max.
            for l in 1..=max {
                prop_assert!(labels.contains(&l));
            }
            // Continuous random data has no ties, so we get exactly min(k, n).
            prop_assert_eq!(max, k.min(n));
        }
    }
}
