//! Clustered heatmaps of expression profiles.
//!
//! Each plot is built in two steps: a [`Clustermap`] layout (reordered matrix,
//! dendrograms, tick labels, annotations) is computed from the data, then drawn onto a
//! caller-owned area. The `plot_*` functions do both; the builders without the prefix
//! stop after the layout.

use crate::cluster::{cluster_rows, linkage, pairwise_distances, Dendrogram, Linkage, Metric};
use crate::colormap::Colormap;
use crate::palette::{Palette, Rgb};
use crate::render::FONT;
use crate::stats::{gradient_rows, group_means, standard_scale_rows, subtract_column_min, zscore_columns};
use crate::{Error, Result};
use log::debug;
use ndarray::{Array2, ArrayView2, Axis};
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::collections::BTreeMap;

const MARGIN: u32 = 5;
const TREE_SHARE: u32 = 15;
const STRIP_SHARE: u32 = 3;
const X_LABEL_AREA: u32 = 40;
const Y_LABEL_AREA: u32 = 80;
const TICK_FONT: f64 = 10.0;
const TICK_GAP: i32 = 4;

/// Flat-cluster color to the genes in that cluster, in input order.
pub type GeneClusters = BTreeMap<Rgb, Vec<String>>;

/// A heatmap with optional dendrograms and a row-color strip, ready to draw.
///
/// `data` is stored in drawn order: row `i` of `data` is input row `row_order[i]`.
/// Tick positions are in cell units, row 0 at the top.
#[derive(Debug, Clone)]
pub struct Clustermap {
    pub data: Array2<f64>,
    pub row_order: Vec<usize>,
    pub col_order: Vec<usize>,
    pub row_tree: Option<Dendrogram>,
    pub col_tree: Option<Dendrogram>,
    /// One color per drawn row.
    pub row_colors: Option<Vec<Rgb>>,
    pub x_ticks: Vec<(f64, String)>,
    pub y_ticks: Vec<(f64, String)>,
    pub x_label: Option<String>,
    pub y_label: Option<String>,
    pub title: Option<String>,
    pub cmap: Colormap,
    pub y_tick_font: f64,
}

impl Clustermap {
    /// Reorder `data` by the leaf order of whichever trees are given.
    pub fn new(data: &ArrayView2<f64>, row_tree: Option<Dendrogram>, col_tree: Option<Dendrogram>) -> Result<Self> {
        let (nrows, ncols) = data.dim();
        if nrows == 0 || ncols == 0 {
            return Err(Error::Domain("clustermap needs a non-empty matrix"));
        }
        let order = |tree: &Option<Dendrogram>, n: usize| -> Result<Vec<usize>> {
            match tree {
                Some(t) if t.n_leaves() != n => Err(Error::Shape("dendrogram size must match the matrix")),
                Some(t) => Ok(t.leaves()),
                None => Ok((0..n).collect()),
            }
        };
        let row_order = order(&row_tree, nrows)?;
        let col_order = order(&col_tree, ncols)?;
        let data = data.select(Axis(0), &row_order).select(Axis(1), &col_order);
        Ok(Self {
            data,
            row_order,
            col_order,
            row_tree,
            col_tree,
            row_colors: None,
            x_ticks: Vec::new(),
            y_ticks: Vec::new(),
            x_label: None,
            y_label: None,
            title: None,
            cmap: Colormap::Rocket,
            y_tick_font: 10.0,
        })
    }

    /// Label every drawn row with `names[input row]`.
    pub fn label_rows(&mut self, names: &[String]) -> Result<()> {
        if names.len() != self.row_order.len() {
            return Err(Error::Shape("row names must match the matrix rows"));
        }
        let n = self.row_order.len();
        self.y_ticks = self
            .row_order
            .iter()
            .enumerate()
            .map(|(slot, &r)| ((n - slot) as f64 - 0.5, names[r].clone()))
            .collect();
        Ok(())
    }

    /// Annotate rows with `colors[input row]`.
    pub fn color_rows(&mut self, colors: &[Rgb]) -> Result<()> {
        if colors.len() != self.row_order.len() {
            return Err(Error::Shape("row colors must match the matrix rows"));
        }
        self.row_colors = Some(self.row_order.iter().map(|&r| colors[r]).collect());
        Ok(())
    }

    fn value_range(&self) -> (f64, f64) {
        self.data
            .iter()
            .filter(|v| v.is_finite())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)))
    }

    pub fn draw<DB>(&self, area: &DrawingArea<DB, Shift>) -> Result<()>
    where
        DB: DrawingBackend,
        DB::ErrorType: 'static,
    {
        let area = match &self.title {
            Some(t) => area.titled(t, (FONT, 16))?,
            None => area.clone(),
        };
        let (nrows, ncols) = self.data.dim();
        let (w, h) = area.dim_in_pixel();

        let top_h = if self.col_tree.is_some() { h * TREE_SHARE / 100 } else { 0 };
        let tree_w = if self.row_tree.is_some() { w * TREE_SHARE / 100 } else { 0 };
        let strip_w = if self.row_colors.is_some() {
            (w * STRIP_SHARE / 100).max(4)
        } else {
            0
        };
        let bottom = if self.x_label.is_some() || !self.x_ticks.is_empty() {
            X_LABEL_AREA
        } else {
            0
        };
        let right = if self.y_label.is_some() || !self.y_ticks.is_empty() {
            Y_LABEL_AREA
        } else {
            0
        };

        let (tree_col, rest) = area.split_horizontally(tree_w);
        let (strip_col, heat_col) = rest.split_horizontally(strip_w);
        let (_, tree_area) = tree_col.split_vertically(top_h);
        let (_, strip_area) = strip_col.split_vertically(top_h);
        let (col_tree_area, heat_area) = heat_col.split_vertically(top_h);

        let (lo, hi) = self.value_range();
        let mut chart = ChartBuilder::on(&heat_area)
            .margin(MARGIN)
            .x_label_area_size(bottom)
            .right_y_label_area_size(right)
            .build_cartesian_2d(0.0..ncols as f64, 0.0..nrows as f64)?;

        let mut mesh = chart.configure_mesh();
        mesh.disable_mesh()
            .x_labels(0)
            .y_labels(0)
            .axis_desc_style((FONT, 14));
        if let Some(d) = &self.x_label {
            mesh.x_desc(d.as_str());
        }
        if let Some(d) = &self.y_label {
            mesh.y_desc(d.as_str());
        }
        mesh.draw()?;

        chart.draw_series(self.data.indexed_iter().map(|((i, j), &v)| {
            let y = (nrows - 1 - i) as f64;
            let x = j as f64;
            Rectangle::new(
                [(x, y), (x + 1.0, y + 1.0)],
                RGBColor::from(self.cmap.scaled(v, lo, hi)).filled(),
            )
        }))?;

        // Tick labels sit in the label areas, outside the plotting area, so they are
        // placed in pixels relative to `heat_area`.
        let base = heat_area.get_base_pixel();
        let to_area = |p: (f64, f64)| {
            let (px, py) = chart.backend_coord(&p);
            (px - base.0, py - base.1)
        };
        let x_style = TextStyle::from((FONT, TICK_FONT).into_font())
            .pos(Pos::new(HPos::Center, VPos::Top));
        for (pos, label) in &self.x_ticks {
            let (px, py) = to_area((*pos, 0.0));
            heat_area.draw(&Text::new(label.clone(), (px, py + TICK_GAP), x_style.clone()))?;
        }
        let y_style = TextStyle::from((FONT, self.y_tick_font).into_font())
            .pos(Pos::new(HPos::Left, VPos::Center));
        for (pos, label) in &self.y_ticks {
            let (px, py) = to_area((ncols as f64, *pos));
            heat_area.draw(&Text::new(label.clone(), (px + TICK_GAP, py), y_style.clone()))?;
        }

        if let Some(tree) = &self.row_tree {
            let top = tree.max_height().max(f64::MIN_POSITIVE);
            let mut c = ChartBuilder::on(&tree_area)
                .margin(MARGIN)
                .x_label_area_size(bottom)
                .build_cartesian_2d(0.0..top, 0.0..nrows as f64)?;
            let n = nrows as f64;
            c.draw_series(tree.links().into_iter().map(|link| {
                PathElement::new(
                    link.iter().map(|&(p, ht)| (top - ht, n - p)).collect::<Vec<_>>(),
                    BLACK.stroke_width(1),
                )
            }))?;
        }

        if let Some(tree) = &self.col_tree {
            let top = tree.max_height().max(f64::MIN_POSITIVE);
            let mut c = ChartBuilder::on(&col_tree_area)
                .margin(MARGIN)
                .right_y_label_area_size(right)
                .build_cartesian_2d(0.0..ncols as f64, 0.0..top)?;
            c.draw_series(
                tree.links()
                    .into_iter()
                    .map(|link| PathElement::new(link.to_vec(), BLACK.stroke_width(1))),
            )?;
        }

        if let Some(colors) = &self.row_colors {
            let mut c = ChartBuilder::on(&strip_area)
                .margin(MARGIN)
                .x_label_area_size(bottom)
                .build_cartesian_2d(0.0..1.0, 0.0..nrows as f64)?;
            c.draw_series(colors.iter().enumerate().map(|(i, &color)| {
                let y = (nrows - 1 - i) as f64;
                Rectangle::new([(0.0, y), (1.0, y + 1.0)], RGBColor::from(color).filled())
            }))?;
        }
        Ok(())
    }
}

/// Options for [`plot_transition_clustermap`].
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClustermapConfig {
    /// Flat clusters to cut the gene tree into (`maxclust`).
    pub n_clusters: usize,
    /// Cluster on the pseudotime derivative instead of raw profiles.
    pub gradient: bool,
    pub gradient_metric: Metric,
    pub cmap: Colormap,
    /// Labeled pseudotime positions on the x axis.
    pub n_ticks: usize,
    pub gene_font_size: f64,
}

impl Default for ClustermapConfig {
    fn default() -> Self {
        Self {
            n_clusters: 10,
            gradient: false,
            gradient_metric: Metric::SqEuclidean,
            cmap: Colormap::Rocket,
            n_ticks: 10,
            gene_font_size: 5.0,
        }
    }
}

/// Group-mean profiles per membership label, genes as rows (clustered), groups as
/// columns in ascending label order.
pub fn gene_clustermap_by_membership(data: &ArrayView2<f64>, memberships: &[usize]) -> Result<Clustermap> {
    let (groups, means) = group_means(data, memberships)?;
    let profiles = subtract_column_min(&means.view()).reversed_axes();
    let row_tree = cluster_rows(&profiles.view(), Metric::Euclidean, Linkage::Average)?;
    let mut cm = Clustermap::new(&profiles.view(), Some(row_tree), None)?;
    cm.x_ticks = groups
        .iter()
        .enumerate()
        .map(|(j, g)| (j as f64 + 0.5, g.to_string()))
        .collect();
    cm.x_label = Some("Cell type".into());
    cm.y_label = Some("Gene".into());
    Ok(cm)
}

pub fn plot_gene_clustermap_by_membership<DB>(
    area: &DrawingArea<DB, Shift>,
    data: &ArrayView2<f64>,
    memberships: &[usize],
) -> Result<Clustermap>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let cm = gene_clustermap_by_membership(data, memberships)?;
    cm.draw(area)?;
    Ok(cm)
}

/// Cluster genes by their profile over pseudotime.
///
/// `data` is `(timepoints, genes)`. Genes are cut into `cfg.n_clusters` flat clusters
/// and each row is annotated with `palette[cluster]`.
pub fn transition_clustermap(
    data: &ArrayView2<f64>,
    gene_names: &[String],
    pseudotimes: &[f64],
    cfg: &ClustermapConfig,
    palette: &Palette,
) -> Result<(Clustermap, GeneClusters)> {
    let (n_times, n_genes) = data.dim();
    if n_times == 0 || n_genes == 0 {
        return Err(Error::Domain("transition clustermap needs a non-empty matrix"));
    }
    if gene_names.len() != n_genes {
        return Err(Error::Shape("gene_names length must match data columns"));
    }
    if pseudotimes.len() != n_times {
        return Err(Error::Shape("pseudotimes length must match data rows"));
    }

    let (shown, dist) = if cfg.gradient {
        let z = zscore_columns(&gradient_rows(data).reversed_axes().view())?;
        let d = pairwise_distances(&z.mapv(f64::abs).view(), cfg.gradient_metric)?;
        (z, d)
    } else {
        let profiles = data.t().to_owned();
        let d = pairwise_distances(&profiles.view(), Metric::Correlation)?;
        (standard_scale_rows(&profiles.view()), d)
    };
    let tree = linkage(&dist.view(), Linkage::Complete)?;
    let labels = tree.flat_clusters(cfg.n_clusters)?;
    let colors = labels
        .iter()
        .map(|&l| palette.color(l))
        .collect::<Result<Vec<_>>>()?;

    let mut clusters = GeneClusters::new();
    for (name, &c) in gene_names.iter().zip(&colors) {
        clusters.entry(c).or_default().push(name.clone());
    }
    debug!(
        "transition clustermap: {n_genes} genes in {} clusters (gradient={})",
        clusters.len(),
        cfg.gradient
    );

    let mut cm = Clustermap::new(&shown.view(), Some(tree), None)?;
    cm.label_rows(gene_names)?;
    cm.color_rows(&colors)?;
    cm.x_ticks = pseudotime_ticks(pseudotimes, cfg.n_ticks);
    cm.x_label = Some("Pseudotime".into());
    cm.y_label = Some("Gene".into());
    cm.cmap = cfg.cmap;
    cm.y_tick_font = cfg.gene_font_size;
    Ok((cm, clusters))
}

/// Up to `n` evenly spaced columns, labeled with their pseudotime to one decimal.
fn pseudotime_ticks(pseudotimes: &[f64], n: usize) -> Vec<(f64, String)> {
    let len = pseudotimes.len();
    let mut cols: Vec<usize> = (0..n).map(|i| i * len / n.max(1)).collect();
    cols.dedup();
    cols.into_iter()
        .map(|c| (c as f64 + 0.5, format!("{:.1}", pseudotimes[c])))
        .collect()
}

pub fn plot_transition_clustermap<DB>(
    area: &DrawingArea<DB, Shift>,
    data: &ArrayView2<f64>,
    gene_names: &[String],
    pseudotimes: &[f64],
    cfg: &ClustermapConfig,
    palette: &Palette,
) -> Result<GeneClusters>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let (cm, clusters) = transition_clustermap(data, gene_names, pseudotimes, cfg, palette)?;
    cm.draw(area)?;
    Ok(clusters)
}

/// One clustermap per co-regulatory state, both axes clustered, titled by id.
pub fn coregulatory_clustermaps(states: &BTreeMap<String, Array2<f64>>) -> Result<Vec<Clustermap>> {
    states
        .iter()
        .map(|(id, m)| {
            let rows = cluster_rows(&m.view(), Metric::Euclidean, Linkage::Average)?;
            let cols = cluster_rows(&m.t(), Metric::Euclidean, Linkage::Average)?;
            let mut cm = Clustermap::new(&m.view(), Some(rows), Some(cols))?;
            cm.title = Some(id.clone());
            Ok(cm)
        })
        .collect()
}

/// Draw [`coregulatory_clustermaps`] on a near-square grid of panels.
pub fn plot_coregulatory_states<DB>(
    area: &DrawingArea<DB, Shift>,
    states: &BTreeMap<String, Array2<f64>>,
) -> Result<Vec<Clustermap>>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let maps = coregulatory_clustermaps(states)?;
    if maps.is_empty() {
        return Ok(maps);
    }
    let cols = (maps.len() as f64).sqrt().ceil() as usize;
    let rows = maps.len().div_ceil(cols);
    for (cm, panel) in maps.iter().zip(area.split_evenly((rows, cols))) {
        cm.draw(&panel)?;
    }
    Ok(maps)
}

/// Unclustered `Blues` heatmap of a square similarity matrix over pseudotime.
pub fn similarity_heatmap(matrix: &ArrayView2<f64>) -> Result<Clustermap> {
    if matrix.nrows() != matrix.ncols() {
        return Err(Error::Shape("similarity matrix must be square"));
    }
    let mut cm = Clustermap::new(matrix, None, None)?;
    cm.cmap = Colormap::Blues;
    cm.x_label = Some("Pseudotime".into());
    cm.y_label = Some("Pseudotime".into());
    Ok(cm)
}

pub fn plot_coregulatory_similarity<DB>(
    area: &DrawingArea<DB, Shift>,
    matrix: &ArrayView2<f64>,
) -> Result<Clustermap>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let cm = similarity_heatmap(matrix)?;
    cm.draw(area)?;
    Ok(cm)
}
