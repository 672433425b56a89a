//! # trajviz
//!
//! Diagnostic plots for single-cell trajectory models.
//!
//! This crate is a presentation layer. It does not fit trajectory models; it takes
//! already-computed ones (state assignments, transition means, similarity matrices)
//! and projects them into 2D views and clustered heatmaps:
//!
//! - `metastable`: embedding scatter colored by metastable state, plus an optional
//!   panel of state centroids joined by weighted, percentage-annotated edges.
//! - `transition`: a transition model's mean path through the same embedding, with a
//!   KDE uncertainty region built from sampled draws; per-gene expression traces.
//! - `heatmap`: clustermaps of expression by membership or over pseudotime,
//!   co-regulatory state matrices, and pseudotime similarity heatmaps.
//!
//! ## Public invariants (must not change)
//!
//! - **Fit once, transform many**: a [`embedding::FittedLle`] only exposes `transform`.
//!   A caller-supplied embedding is never refit, so the same fit can be reused to
//!   composite several plots in one coordinate system.
//! - **Determinism knobs are explicit**: anything that samples takes a `seed`.
//! - **No global drawing state**: every plot draws onto a caller-owned plotters
//!   `DrawingArea`, and colors come from an explicit [`palette::Palette`].
//! - **Layout is separate from drawing**: each plot computes a plain-data layout
//!   (colors, node sizes, edge widths, path segments, cluster assignments) which is
//!   returned to the caller and can be inspected without a renderer.
//!
//! ## Module map
//!
//! - `embedding`: 2D locally-linear embedding (standard + modified) and the
//!   sample-size based selector.
//! - `model`: collaborator traits (`StateModel`, `MetastableGraph`,
//!   `TransitionModel`) and small reference implementations.
//! - `cluster`: pairwise distances, hierarchical linkage, flat clusters, dendrogram
//!   geometry.
//! - `stats`: gradients, z-scores, row scaling, group means.
//! - `kde`: 2D Gaussian KDE and contour levels.
//! - `palette`, `colormap`: discrete state colors and sequential colormaps.
//! - `render`: plotters helpers shared by the plot modules.

pub mod cluster;
pub mod colormap;
pub mod embedding;
pub mod heatmap;
pub mod kde;
pub mod metastable;
pub mod model;
pub mod palette;
pub mod render;
pub mod stats;
pub mod transition;

/// trajviz error variants.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("shape mismatch: {0}")]
    Shape(&'static str),
    #[error("domain error: {0}")]
    Domain(&'static str),
    #[error("linear algebra failure: {0}")]
    Linalg(&'static str),
    #[error("render error: {0}")]
    Render(String),
}

pub type Result<T> = std::result::Result<T, Error>;
