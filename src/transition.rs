//! Transition-model plots: the embedded mean trajectory over the data, with an
//! optional density of model draws, and a per-gene expression trace over pseudotime.

use crate::colormap::Colormap;
use crate::embedding::{resolve_embedding, FittedLle, Projection};
use crate::kde::{kde_2d, DensityGrid, KdeConfig};
use crate::model::TransitionModel;
use crate::palette::Rgb;
use crate::render::{self, bounds, panel, rgba, Axes, ScatterStyle, DIMENSION_1, DIMENSION_2};
use crate::stats::arange_open;
use crate::{Error, Result};
use log::debug;
use ndarray::{concatenate, ArrayView2, Axis};
use plotters::coord::Shift;
use plotters::prelude::*;

const DEFAULT_TIMEPOINTS: usize = 100;
const PATH_STROKE: u32 = 3;
const STAR_RADIUS: f64 = 7.0;

/// The 100 evenly spaced timepoints over `[0, 1)` used when none are given.
pub fn default_timepoints() -> Vec<f64> {
    arange_open(0.0, 1.0, DEFAULT_TIMEPOINTS)
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TransitionPlotConfig {
    pub n_neighbors: Option<usize>,
    /// Data scatter color.
    pub color: Rgb,
    /// Shade a density of model draws under the scatter.
    pub plot_errors: bool,
    pub timepoints: Option<Vec<f64>>,
    pub scatter: ScatterStyle,
    pub error_cmap: Colormap,
    /// Number of density bands; the lowest is left unshaded.
    pub n_levels: usize,
    pub kde: KdeConfig,
    /// Seed for the model draws behind the density.
    pub seed: u64,
}

impl Default for TransitionPlotConfig {
    fn default() -> Self {
        Self {
            n_neighbors: None,
            color: Rgb(0xff, 0x00, 0xff),
            plot_errors: true,
            timepoints: None,
            scatter: ScatterStyle {
                radius: 3,
                alpha: 1.0,
            },
            error_cmap: Colormap::Oranges,
            n_levels: 4,
            kde: KdeConfig::default(),
            seed: 0,
        }
    }
}

/// Density of projected draws and data, with its band boundaries.
#[derive(Debug, Clone)]
pub struct DensityOverlay {
    pub grid: DensityGrid,
    pub levels: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct TransitionPlot {
    /// Projected model mean, one point per timepoint.
    pub path: Vec<(f64, f64)>,
    /// Consecutive path pairs, in timepoint order.
    pub segments: Vec<[(f64, f64); 2]>,
    pub density: Option<DensityOverlay>,
}

impl TransitionPlot {
    pub fn density_levels(&self) -> Option<&[f64]> {
        self.density.as_ref().map(|d| d.levels.as_slice())
    }
}

/// Segments joining consecutive rows of a projected `(T, 2)` path.
pub fn path_segments(path: &[(f64, f64)]) -> Vec<[(f64, f64); 2]> {
    path.windows(2).map(|w| [w[0], w[1]]).collect()
}

/// Five-pointed star outline in pixel offsets, point up.
fn star_outline(radius: f64) -> Vec<(i32, i32)> {
    (0..10)
        .map(|i| {
            let r = if i % 2 == 0 { radius } else { 0.4 * radius };
            let a = std::f64::consts::PI * i as f64 / 5.0;
            ((r * a.sin()).round() as i32, (-r * a.cos()).round() as i32)
        })
        .collect()
}

/// Plot `data` embedded in 2D with the transition model's mean trajectory on top.
///
/// With `plot_errors`, `data.nrows()` draws are taken along the timepoints, projected,
/// and a KDE over draws and data is shaded below the scatter. Returns the drawn layout
/// and the embedding.
pub fn plot_transition_model<DB, T>(
    area: &DrawingArea<DB, Shift>,
    data: &ArrayView2<f64>,
    model: &T,
    cfg: &TransitionPlotConfig,
    embedding: Option<FittedLle>,
) -> Result<(TransitionPlot, FittedLle)>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
    T: TransitionModel,
{
    let (embedding, projected) = resolve_embedding(data, cfg.n_neighbors, embedding)?;
    let timepoints = match &cfg.timepoints {
        Some(t) => t.clone(),
        None => default_timepoints(),
    };
    if timepoints.is_empty() {
        return Err(Error::Domain("timepoints must be non-empty"));
    }

    let mean = model.mean(&timepoints)?;
    let path = render::points(&embedding.transform(&mean.view())?);
    let segments = path_segments(&path);

    let density = if cfg.plot_errors {
        let draws = model.sample_along_timepoints(&timepoints, data.nrows(), cfg.seed)?;
        let draws = embedding.transform(&draws.view())?;
        let both = concatenate(Axis(0), &[draws.view(), projected.view()])
            .map_err(|_| Error::Shape("projected draws and data disagree in width"))?;
        let grid = kde_2d(&both.column(0), &both.column(1), &cfg.kde)?;
        let levels = grid.levels(cfg.n_levels);
        debug!(
            "transition density: {} draws, levels={:?}",
            draws.nrows(),
            levels
        );
        Some(DensityOverlay { grid, levels })
    } else {
        None
    };

    let pts = render::points(&projected);
    let grid_corners = density.iter().flat_map(|d| {
        let (x0, x1) = (d.grid.xs[0], d.grid.xs[d.grid.xs.len() - 1]);
        let (y0, y1) = (d.grid.ys[0], d.grid.ys[d.grid.ys.len() - 1]);
        [(x0, y0), (x1, y1)]
    });
    let (xr, yr) = bounds(
        pts.iter()
            .copied()
            .chain(path.iter().copied())
            .chain(grid_corners),
    );
    let mut chart = panel(
        area,
        xr,
        yr,
        Axes {
            x_desc: Some(DIMENSION_1),
            y_desc: Some(DIMENSION_2),
            ticks: false,
        },
    )?;

    if let Some(d) = &density {
        draw_density(&mut chart, d, cfg.error_cmap)?;
    }
    render::scatter(
        &mut chart,
        &pts,
        |_| rgba(cfg.color, cfg.scatter.alpha),
        &cfg.scatter,
    )?;
    chart.draw_series(
        segments
            .iter()
            .map(|s| PathElement::new(s.to_vec(), BLACK.stroke_width(PATH_STROKE))),
    )?;
    let star = star_outline(STAR_RADIUS);
    chart.draw_series(
        path.iter()
            .map(|&p| EmptyElement::at(p) + Polygon::new(star.clone(), BLACK.filled())),
    )?;

    Ok((
        TransitionPlot {
            path,
            segments,
            density,
        },
        embedding,
    ))
}

fn draw_density<DB>(
    chart: &mut render::Chart2d<'_, DB>,
    density: &DensityOverlay,
    cmap: Colormap,
) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let grid = &density.grid;
    let bands = density.levels.len().saturating_sub(1);
    let top = bands.saturating_sub(1).max(1) as f64;
    let (dx, dy) = grid.cell();
    let cells = grid.z.indexed_iter().filter_map(|((r, c), &v)| {
        let band = DensityGrid::band(&density.levels, v);
        if band == 0 {
            return None;
        }
        let (x, y) = (grid.xs[c], grid.ys[r]);
        let color = RGBColor::from(cmap.at(band as f64 / top));
        Some(Rectangle::new(
            [(x - dx / 2.0, y - dy / 2.0), (x + dx / 2.0, y + dy / 2.0)],
            color.filled(),
        ))
    });
    chart.draw_series(cells)?;
    Ok(())
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExpressionPlotConfig {
    /// Observed expression markers.
    pub scatter: ScatterStyle,
    pub point_color: Rgb,
    pub line_color: Rgb,
    pub line_width: u32,
    pub band_color: Rgb,
    pub band_alpha: f64,
}

impl Default for ExpressionPlotConfig {
    fn default() -> Self {
        Self {
            // Marker area 200 px^2.
            scatter: ScatterStyle {
                radius: 8,
                alpha: 0.3,
            },
            point_color: Rgb(0, 0, 0),
            line_color: Rgb(0x1f, 0x77, 0xb4),
            line_width: 3,
            band_color: Rgb(0, 0, 0xff),
            band_alpha: 0.2,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionPlot {
    /// `(timepoint, mean)` pairs.
    pub mean_line: Vec<(f64, f64)>,
    /// Closed outline of `mean ± sqrt(variance)`: upper edge forward, lower edge back.
    pub band: Option<Vec<(f64, f64)>>,
}

/// One gene's expression against cell pseudotime, with the model's mean (and
/// optional spread) over `timepoints`.
pub fn plot_transition_expression<DB>(
    area: &DrawingArea<DB, Shift>,
    expression: &[f64],
    pseudotimes: &[f64],
    model_means: &[f64],
    timepoints: &[f64],
    model_variances: Option<&[f64]>,
    cfg: &ExpressionPlotConfig,
) -> Result<ExpressionPlot>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    if expression.len() != pseudotimes.len() {
        return Err(Error::Shape("expression and pseudotimes must have equal length"));
    }
    if model_means.len() != timepoints.len() {
        return Err(Error::Shape("model means and timepoints must have equal length"));
    }
    if let Some(v) = model_variances {
        if v.len() != timepoints.len() {
            return Err(Error::Shape("model variances and timepoints must have equal length"));
        }
        if v.iter().any(|&x| x < 0.0) {
            return Err(Error::Domain("model variances must be non-negative"));
        }
    }

    let observed: Vec<(f64, f64)> = pseudotimes
        .iter()
        .copied()
        .zip(expression.iter().copied())
        .collect();
    let mean_line: Vec<(f64, f64)> = timepoints
        .iter()
        .copied()
        .zip(model_means.iter().copied())
        .collect();
    let band = model_variances.map(|var| {
        let upper = mean_line
            .iter()
            .zip(var)
            .map(|(&(t, m), &v)| (t, m + v.sqrt()));
        let lower = mean_line
            .iter()
            .zip(var)
            .rev()
            .map(|(&(t, m), &v)| (t, m - v.sqrt()));
        upper.chain(lower).collect::<Vec<_>>()
    });

    let (xr, yr) = bounds(
        observed
            .iter()
            .chain(mean_line.iter())
            .chain(band.iter().flatten())
            .copied(),
    );
    let mut chart = panel(
        area,
        xr,
        yr,
        Axes {
            x_desc: Some("Pseudotime"),
            y_desc: Some("Expression"),
            ticks: true,
        },
    )?;
    if let Some(outline) = &band {
        chart.draw_series(std::iter::once(Polygon::new(
            outline.clone(),
            rgba(cfg.band_color, cfg.band_alpha).filled(),
        )))?;
    }
    render::scatter(
        &mut chart,
        &observed,
        |_| rgba(cfg.point_color, cfg.scatter.alpha),
        &cfg.scatter,
    )?;
    chart.draw_series(LineSeries::new(
        mean_line.iter().copied(),
        RGBColor::from(cfg.line_color).stroke_width(cfg.line_width),
    ))?;

    Ok(ExpressionPlot { mean_line, band })
}
