//! Render every plot on synthetic data.
//!
//! Usage: `cargo run --example render_gallery [OUT_DIR]` (default `target/gallery`).
//! Set `RUST_LOG=debug` to see the resolved embedding, KDE and clustering parameters.
//!
//! Writes:
//! - `metastable_overlay.svg`, `metastable_scatter.svg`
//! - `transition.svg`, `expression.svg`
//! - `clustermap_membership.svg`, `clustermap_pseudotime.svg`
//! - `coregulatory_states.svg`, `coregulatory_similarity.svg`

use ndarray::Array2;
use plotters::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, StandardNormal};
use std::collections::BTreeMap;
use std::path::PathBuf;

use trajviz::heatmap::{
    plot_coregulatory_similarity, plot_coregulatory_states, plot_gene_clustermap_by_membership,
    plot_transition_clustermap, ClustermapConfig,
};
use trajviz::metastable::{plot_metastable_graph, GraphPlotConfig};
use trajviz::model::{CentroidModel, PiecewiseLinearTransition, StateGraph, TransitionModel};
use trajviz::palette::Palette;
use trajviz::transition::{
    plot_transition_expression, plot_transition_model, ExpressionPlotConfig,
    TransitionPlotConfig,
};

const GENES: usize = 24;
const CELLS: usize = 90;

/// Cells along a three-state branch in gene space, with pseudotime and state labels.
fn cells(seed: u64) -> (Array2<f64>, Vec<f64>, Vec<usize>) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut x = Array2::<f64>::zeros((CELLS, GENES));
    let mut times = Vec::with_capacity(CELLS);
    let mut states = Vec::with_capacity(CELLS);
    for i in 0..CELLS {
        let t = i as f64 / (CELLS - 1) as f64;
        for g in 0..GENES {
            let z: f64 = StandardNormal.sample(&mut rng);
            x[[i, g]] = profile(g, t) + 0.1 * z;
        }
        times.push(t);
        states.push((3.0 * t).floor().min(2.0) as usize);
    }
    (x, times, states)
}

fn profile(gene: usize, t: f64) -> f64 {
    let phase = gene as f64 / GENES as f64;
    match gene % 3 {
        0 => 2.0 * t + phase,
        1 => 2.0 * (1.0 - t) + phase,
        _ => 2.0 * (-(t - phase) * (t - phase) * 8.0).exp(),
    }
}

fn transition_model() -> Result<PiecewiseLinearTransition, trajviz::Error> {
    let knots: Vec<f64> = (0..=4).map(|k| k as f64 / 4.0).collect();
    let means = Array2::from_shape_fn((knots.len(), GENES), |(r, g)| profile(g, knots[r]));
    let variances = Array2::from_elem((knots.len(), GENES), 0.01);
    PiecewiseLinearTransition::new(knots, means, variances)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let out = PathBuf::from(
        std::env::args()
            .nth(1)
            .unwrap_or_else(|| "target/gallery".to_string()),
    );
    std::fs::create_dir_all(&out)?;

    let (x, times, states) = cells(17);
    let palette = Palette::default();
    let model = CentroidModel::from_labels(&x.view(), &states)?;
    let mut graph = StateGraph::new(model, 3);
    graph.add_edge(0, 1, 0.42)?;
    graph.add_edge(1, 2, 0.27)?;
    graph.add_edge(0, 2, 0.03)?;

    let path = out.join("metastable_overlay.svg");
    let root = SVGBackend::new(&path, (700, 1000)).into_drawing_area();
    root.fill(&WHITE)?;
    let (plot, fitted) = plot_metastable_graph(
        &root,
        &x.view(),
        &graph,
        &GraphPlotConfig::default(),
        None,
        Some(&states),
        &palette,
    )?;
    root.present()?;
    if let Some(layout) = &plot.layout {
        for n in &layout.nodes {
            println!("state {}: size {:.1} at {:?}", n.state, n.size, n.position);
        }
    }

    let path = out.join("metastable_scatter.svg");
    let root = SVGBackend::new(&path, (700, 600)).into_drawing_area();
    root.fill(&WHITE)?;
    let cfg = GraphPlotConfig {
        plot_edges: false,
        ..Default::default()
    };
    let (_, fitted) =
        plot_metastable_graph(&root, &x.view(), &graph, &cfg, Some(fitted), None, &palette)?;
    root.present()?;

    let tm = transition_model()?;
    let path = out.join("transition.svg");
    let root = SVGBackend::new(&path, (700, 600)).into_drawing_area();
    root.fill(&WHITE)?;
    let (tplot, _) = plot_transition_model(
        &root,
        &x.view(),
        &tm,
        &TransitionPlotConfig::default(),
        Some(fitted),
    )?;
    root.present()?;
    println!("transition path: {} segments", tplot.segments.len());

    let timepoints = trajviz::transition::default_timepoints();
    let gene = 2;
    let means = tm.mean(&timepoints)?.column(gene).to_vec();
    let variances = tm.variance(&timepoints).column(gene).to_vec();
    let path = out.join("expression.svg");
    let root = SVGBackend::new(&path, (700, 500)).into_drawing_area();
    root.fill(&WHITE)?;
    plot_transition_expression(
        &root,
        &x.column(gene).to_vec(),
        &times,
        &means,
        &timepoints,
        Some(&variances),
        &ExpressionPlotConfig::default(),
    )?;
    root.present()?;

    let path = out.join("clustermap_membership.svg");
    let root = SVGBackend::new(&path, (600, 800)).into_drawing_area();
    root.fill(&WHITE)?;
    plot_gene_clustermap_by_membership(&root, &x.view(), &states)?;
    root.present()?;

    let gene_names: Vec<String> = (0..GENES).map(|g| format!("G{g:02}")).collect();
    let path = out.join("clustermap_pseudotime.svg");
    let root = SVGBackend::new(&path, (800, 900)).into_drawing_area();
    root.fill(&WHITE)?;
    let clusters = plot_transition_clustermap(
        &root,
        &x.view(),
        &gene_names,
        &times,
        &ClustermapConfig {
            n_clusters: 4,
            ..Default::default()
        },
        &palette,
    )?;
    root.present()?;
    for (color, genes) in &clusters {
        println!("{}: {}", color.to_hex(), genes.join(" "));
    }

    let mut coreg = BTreeMap::new();
    for (k, window) in [(0usize, 30usize), (30, 60), (60, 90)].into_iter().enumerate() {
        let block = x.slice(ndarray::s![window.0..window.1, ..]);
        let centered = &block - &block.mean_axis(ndarray::Axis(0)).ok_or("empty window")?;
        let cov = centered.t().dot(&centered) / (block.nrows() as f64 - 1.0);
        coreg.insert(format!("state {k}"), cov);
    }
    let path = out.join("coregulatory_states.svg");
    let root = SVGBackend::new(&path, (900, 900)).into_drawing_area();
    root.fill(&WHITE)?;
    plot_coregulatory_states(&root, &coreg)?;
    root.present()?;

    let sim = Array2::from_shape_fn((CELLS, CELLS), |(i, j)| {
        let d = (times[i] - times[j]).abs();
        (-d * d * 20.0).exp()
    });
    let path = out.join("coregulatory_similarity.svg");
    let root = SVGBackend::new(&path, (600, 600)).into_drawing_area();
    root.fill(&WHITE)?;
    plot_coregulatory_similarity(&root, &sim.view())?;
    root.present()?;

    println!("wrote gallery to {}", out.display());
    Ok(())
}
