//! Metastable-state graph plots.
//!
//! The top (or only) panel is the data embedded in 2D, colored by state. With the
//! edge overlay enabled a second panel shows one node per populated state at its
//! embedded centroid, joined by edges whose width and label follow the edge weight:
//!
//! - node size (marker area): `5000 * ln(1 + k / N)` for a state holding `k` of `N`
//!   points,
//! - edge width: `max(0.5, 7 * w)`,
//! - edge label: `floor(100 * w)` followed by `%`, at the segment midpoint.

use crate::embedding::{resolve_embedding, FittedLle, Projection};
use crate::model::{EdgeWeights, MetastableGraph, StateEdge, StateModel};
use crate::palette::{Palette, Rgb};
use crate::render::{self, bounds, panel, rgba, Axes, ScatterStyle, DIMENSION_1, DIMENSION_2};
use crate::{Error, Result};
use log::debug;
use ndarray::{Array2, ArrayView2};
use plotters::coord::Shift;
use plotters::prelude::*;
use std::collections::BTreeMap;

const NODE_SIZE_SCALE: f64 = 5000.0;
const EDGE_WIDTH_SCALE: f64 = 7.0;
const EDGE_WIDTH_FLOOR: f64 = 0.5;

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GraphPlotConfig {
    /// Neighbor count for a freshly fitted embedding; ignored when one is supplied.
    pub n_neighbors: Option<usize>,
    /// Draw the centroid/edge panel under the scatter.
    pub plot_edges: bool,
    /// Edge list to use instead of the graph's. `None` or empty falls back.
    pub state_edges: Option<Vec<StateEdge>>,
    /// Edge weights to use instead of the graph's. `None` or empty falls back.
    pub edge_weights: Option<EdgeWeights>,
    pub scatter: ScatterStyle,
}

impl Default for GraphPlotConfig {
    fn default() -> Self {
        Self {
            n_neighbors: None,
            plot_edges: true,
            state_edges: None,
            edge_weights: None,
            scatter: ScatterStyle::default(),
        }
    }
}

/// A populated state drawn as a node.
#[derive(Debug, Clone, PartialEq)]
pub struct StateNode {
    pub state: usize,
    pub position: (f64, f64),
    /// Marker area; see [`node_size`].
    pub size: f64,
    pub color: Rgb,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EdgeSegment {
    pub states: StateEdge,
    pub weight: f64,
    pub from: (f64, f64),
    pub to: (f64, f64),
    /// Line width, `max(0.5, 7 * weight)`. The drawn stroke is rounded to whole
    /// pixels, at least 1.
    pub width: f64,
    pub label: String,
}

impl EdgeSegment {
    pub fn midpoint(&self) -> (f64, f64) {
        (
            self.from.0.min(self.to.0) + (self.from.0 - self.to.0).abs() / 2.0,
            self.from.1.min(self.to.1) + (self.from.1 - self.to.1).abs() / 2.0,
        )
    }
}

/// Nodes and edges of the overlay panel.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphLayout {
    pub nodes: Vec<StateNode>,
    pub edges: Vec<EdgeSegment>,
}

/// Everything a caller needs to composite with this plot.
#[derive(Debug, Clone)]
pub struct MetastablePlot {
    /// Scatter color of each observation.
    pub colors: Vec<Rgb>,
    /// Projected observations, `(n, 2)`.
    pub points: Array2<f64>,
    /// Present when the overlay panel was drawn.
    pub layout: Option<GraphLayout>,
}

pub fn node_size(count: usize, total: usize) -> f64 {
    NODE_SIZE_SCALE * (1.0 + count as f64 / total as f64).ln()
}

pub fn edge_width(weight: f64) -> f64 {
    (EDGE_WIDTH_SCALE * weight).max(EDGE_WIDTH_FLOOR)
}

pub fn edge_label(weight: f64) -> String {
    format!("{}%", (weight * 100.0) as i64)
}

/// Build the overlay layout: one node per distinct state in `memberships` (ascending),
/// one segment per entry of `edge_weights`.
///
/// Edges naming a state with no node are skipped.
pub fn graph_layout<M: StateModel, P: Projection>(
    model: &M,
    embedding: &P,
    memberships: &[usize],
    edge_weights: &EdgeWeights,
    palette: &Palette,
) -> Result<GraphLayout> {
    if memberships.is_empty() {
        return Err(Error::Domain("memberships must be non-empty"));
    }
    let mut counts: BTreeMap<usize, usize> = BTreeMap::new();
    for &s in memberships {
        *counts.entry(s).or_default() += 1;
    }

    let mut nodes = Vec::with_capacity(counts.len());
    let mut position_of: BTreeMap<usize, (f64, f64)> = BTreeMap::new();
    for (&state, &count) in &counts {
        let c = model.centroid(state)?.insert_axis(ndarray::Axis(0));
        let p = embedding.transform(&c.view())?;
        if p.ncols() != 2 {
            return Err(Error::Shape("embedding must be 2D"));
        }
        let position = (p[[0, 0]], p[[0, 1]]);
        position_of.insert(state, position);
        nodes.push(StateNode {
            state,
            position,
            size: node_size(count, memberships.len()),
            color: palette.color(state)?,
        });
    }

    let mut edges = Vec::with_capacity(edge_weights.len());
    for (&(a, b), &weight) in edge_weights {
        let (Some(&from), Some(&to)) = (position_of.get(&a), position_of.get(&b)) else {
            debug!("edge ({a}, {b}) skipped: endpoint state has no members");
            continue;
        };
        edges.push(EdgeSegment {
            states: (a, b),
            weight,
            from,
            to,
            width: edge_width(weight),
            label: edge_label(weight),
        });
    }
    Ok(GraphLayout { nodes, edges })
}

/// Plot `data` embedded in 2D and colored by metastable state, optionally with the
/// state-graph overlay panel.
///
/// - `embedding`: a previously fitted embedding to reuse (transform only). When
///   `None`, one is chosen with [`crate::embedding::choose_2d_embedding`] and fitted.
/// - `memberships`: per-row states; defaults to the graph's state model prediction.
///
/// Returns the per-point colors and layout together with the embedding, so both can
/// be reused for other plots.
pub fn plot_metastable_graph<DB, G>(
    area: &DrawingArea<DB, Shift>,
    data: &ArrayView2<f64>,
    graph: &G,
    cfg: &GraphPlotConfig,
    embedding: Option<FittedLle>,
    memberships: Option<&[usize]>,
    palette: &Palette,
) -> Result<(MetastablePlot, FittedLle)>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
    G: MetastableGraph,
{
    let (embedding, projected) = resolve_embedding(data, cfg.n_neighbors, embedding)?;
    let memberships: Vec<usize> = match memberships {
        Some(m) => m.to_vec(),
        None => graph.state_model().predict(data)?,
    };
    if memberships.len() != data.nrows() {
        return Err(Error::Shape("memberships length must match data rows"));
    }
    let colors = palette.colors_for(&memberships)?;
    let pts = render::points(&projected);
    let point_color = |i: usize| rgba(colors[i], cfg.scatter.alpha);

    if !cfg.plot_edges {
        let (xr, yr) = bounds(pts.iter().copied());
        let mut chart = panel(
            area,
            xr,
            yr,
            Axes {
                x_desc: Some(DIMENSION_1),
                y_desc: Some(DIMENSION_2),
                ticks: true,
            },
        )?;
        render::scatter(&mut chart, &pts, point_color, &cfg.scatter)?;
        return Ok((
            MetastablePlot {
                colors,
                points: projected,
                layout: None,
            },
            embedding,
        ));
    }

    let edge_weights = match &cfg.edge_weights {
        Some(w) if !w.is_empty() => w.clone(),
        _ => graph.edge_weights(),
    };
    let state_edges = match &cfg.state_edges {
        Some(e) if !e.is_empty() => e.clone(),
        _ => graph.state_edges(),
    };
    let unweighted = state_edges
        .iter()
        .filter(|e| !edge_weights.contains_key(e))
        .count();
    if unweighted > 0 {
        debug!("{unweighted} state edge(s) have no weight entry; weights drive the overlay");
    }

    let layout = graph_layout(
        graph.state_model(),
        &embedding,
        &memberships,
        &edge_weights,
        palette,
    )?;

    let (xr, yr) = bounds(
        pts.iter()
            .copied()
            .chain(layout.nodes.iter().map(|n| n.position)),
    );
    let panels = area.split_evenly((2, 1));

    let mut top = panel(
        &panels[0],
        xr.clone(),
        yr.clone(),
        Axes {
            x_desc: None,
            y_desc: None,
            ticks: false,
        },
    )?;
    render::scatter(&mut top, &pts, point_color, &cfg.scatter)?;

    let mut bottom = panel(
        &panels[1],
        xr,
        yr,
        Axes {
            x_desc: Some(DIMENSION_1),
            y_desc: Some(DIMENSION_2),
            ticks: false,
        },
    )?;
    bottom.draw_series(layout.edges.iter().map(|e| {
        PathElement::new(
            vec![e.from, e.to],
            BLACK.stroke_width(e.width.round().max(1.0) as u32),
        )
    }))?;
    let label_font = (render::FONT, 24)
        .into_font()
        .style(FontStyle::Bold)
        .color(&RED);
    bottom.draw_series(
        layout
            .edges
            .iter()
            .map(|e| Text::new(e.label.clone(), e.midpoint(), label_font.clone())),
    )?;
    bottom.draw_series(layout.nodes.iter().map(|n| {
        let radius = (n.size / std::f64::consts::PI).sqrt().max(1.0).round() as u32;
        Circle::new(n.position, radius, RGBColor::from(n.color).filled())
    }))?;

    Ok((
        MetastablePlot {
            colors,
            points: projected,
            layout: Some(layout),
        },
        embedding,
    ))
}
