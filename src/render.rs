//! plotters helpers shared by the plot modules.

use crate::palette::Rgb;
use crate::Error;
use plotters::coord::types::RangedCoordf64;
use plotters::coord::Shift;
use plotters::prelude::*;
use std::ops::Range;

pub const DIMENSION_1: &str = "Dimension 1";
pub const DIMENSION_2: &str = "Dimension 2";

pub(crate) const FONT: &str = "sans-serif";

impl<E: std::error::Error + Send + Sync> From<DrawingAreaErrorKind<E>> for Error {
    fn from(e: DrawingAreaErrorKind<E>) -> Self {
        Error::Render(e.to_string())
    }
}

/// Point styling for scatter layers.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScatterStyle {
    /// Marker radius in pixels.
    pub radius: u32,
    pub alpha: f64,
}

impl Default for ScatterStyle {
    fn default() -> Self {
        Self {
            radius: 3,
            alpha: 0.6,
        }
    }
}

pub(crate) fn rgba(c: Rgb, alpha: f64) -> RGBAColor {
    RGBColor::from(c).mix(alpha)
}

/// Padded bounding box of `points`. Degenerate axes get a unit span.
pub fn bounds(points: impl IntoIterator<Item = (f64, f64)>) -> (Range<f64>, Range<f64>) {
    let (mut x0, mut x1, mut y0, mut y1) = (
        f64::INFINITY,
        f64::NEG_INFINITY,
        f64::INFINITY,
        f64::NEG_INFINITY,
    );
    for (x, y) in points {
        if x.is_finite() && y.is_finite() {
            x0 = x0.min(x);
            x1 = x1.max(x);
            y0 = y0.min(y);
            y1 = y1.max(y);
        }
    }
    (pad(x0, x1), pad(y0, y1))
}

fn pad(lo: f64, hi: f64) -> Range<f64> {
    if !(lo.is_finite() && hi.is_finite()) {
        return -1.0..1.0;
    }
    let span = hi - lo;
    if span <= 0.0 {
        return (lo - 0.5)..(hi + 0.5);
    }
    let m = 0.05 * span;
    (lo - m)..(hi + m)
}

pub(crate) type Chart2d<'a, DB> = ChartContext<'a, DB, Cartesian2d<RangedCoordf64, RangedCoordf64>>;

/// How a 2D panel labels its axes.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Axes<'s> {
    pub x_desc: Option<&'s str>,
    pub y_desc: Option<&'s str>,
    pub ticks: bool,
}

/// A 2D chart over the given ranges with the mesh configured per `axes`.
pub(crate) fn panel<'a, DB: DrawingBackend>(
    area: &'a DrawingArea<DB, Shift>,
    x: Range<f64>,
    y: Range<f64>,
    axes: Axes<'_>,
) -> Result<Chart2d<'a, DB>, Error>
where
    DB::ErrorType: 'static,
{
    let label_area = if axes.ticks { 40 } else { 20 };
    let mut chart = ChartBuilder::on(area)
        .margin(10)
        .x_label_area_size(if axes.x_desc.is_some() || axes.ticks { label_area } else { 0 })
        .y_label_area_size(if axes.y_desc.is_some() || axes.ticks { label_area } else { 0 })
        .build_cartesian_2d(x, y)?;

    let mut mesh = chart.configure_mesh();
    mesh.disable_mesh();
    if !axes.ticks {
        mesh.x_labels(0).y_labels(0);
    }
    if let Some(d) = axes.x_desc {
        mesh.x_desc(d);
    }
    if let Some(d) = axes.y_desc {
        mesh.y_desc(d);
    }
    mesh.axis_desc_style((FONT, 14)).draw()?;
    Ok(chart)
}

/// Filled circles at `points`, one color per point.
pub(crate) fn scatter<DB: DrawingBackend>(
    chart: &mut Chart2d<'_, DB>,
    points: &[(f64, f64)],
    colors: impl Fn(usize) -> RGBAColor,
    style: &ScatterStyle,
) -> Result<(), Error>
where
    DB::ErrorType: 'static,
{
    chart.draw_series(
        points
            .iter()
            .enumerate()
            .map(|(i, &p)| Circle::new(p, style.radius, colors(i).filled())),
    )?;
    Ok(())
}

/// Rows of an `(n, 2)` array as points.
pub(crate) fn points(a: &ndarray::Array2<f64>) -> Vec<(f64, f64)> {
    a.rows().into_iter().map(|r| (r[0], r[1])).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_pad_and_handle_degenerate_axes() {
        let (x, y) = bounds(vec![(0.0, 1.0), (10.0, 1.0)]);
        assert_eq!(x, -0.5..10.5);
        assert_eq!(y, 0.5..1.5);
        let (x, _) = bounds(Vec::new());
        assert_eq!(x, -1.0..1.0);
        let (x, _) = bounds(vec![(f64::NAN, 0.0), (2.0, 0.0)]);
        assert_eq!(x, 1.5..2.5);
    }
}
