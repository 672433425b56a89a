use ndarray::Array2;
use plotters::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, StandardNormal};
use std::collections::BTreeSet;
use trajviz::embedding::{LleMethod, Projection};
use trajviz::metastable::{node_size, plot_metastable_graph, GraphPlotConfig};
use trajviz::model::{CentroidModel, EdgeWeights, MetastableGraph, StateGraph};
use trajviz::palette::{Palette, Rgb};

/// Two Gaussian blobs in 5D: `n0` rows around the origin, `n1` around (3, 3, 0, 0, 0).
fn two_states(n0: usize, n1: usize, seed: u64) -> (Array2<f64>, Vec<usize>) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let n = n0 + n1;
    let mut x = Array2::<f64>::zeros((n, 5));
    let mut labels = Vec::with_capacity(n);
    for i in 0..n {
        let state = usize::from(i >= n0);
        for k in 0..5 {
            let z: f64 = StandardNormal.sample(&mut rng);
            let center = if state == 1 && k < 2 { 3.0 } else { 0.0 };
            x[[i, k]] = center + 0.3 * z;
        }
        labels.push(state);
    }
    (x, labels)
}

fn graph_for(x: &Array2<f64>, labels: &[usize]) -> StateGraph<CentroidModel> {
    let model = CentroidModel::from_labels(&x.view(), labels).unwrap();
    let mut g = StateGraph::new(model, 2);
    g.add_edge(0, 1, 0.25).unwrap();
    g
}

#[test]
fn overlay_node_sizes_follow_population_share() {
    let (x, labels) = two_states(30, 10, 3);
    let graph = graph_for(&x, &labels);
    let palette = Palette::default();

    let mut svg = String::new();
    let (plot, fitted) = {
        let root = SVGBackend::with_string(&mut svg, (640, 800)).into_drawing_area();
        root.fill(&WHITE).unwrap();
        let out = plot_metastable_graph(
            &root,
            &x.view(),
            &graph,
            &GraphPlotConfig::default(),
            None,
            Some(&labels),
            &palette,
        )
        .unwrap();
        root.present().unwrap();
        out
    };
    assert!(svg.contains("<svg"));
    // Only the graph panel carries axis descriptions.
    assert_eq!(svg.matches("Dimension 2").count(), 1);
    assert_eq!(svg.matches("Dimension 1").count(), 1);
    // 40 rows selects the modified variant with round(0.8 * 40) neighbors.
    assert_eq!(fitted.method(), LleMethod::Modified);
    assert_eq!(fitted.n_neighbors(), 32);

    let layout = plot.layout.expect("overlay layout");
    assert_eq!(layout.nodes.len(), 2);
    let ratio = layout.nodes[0].size / layout.nodes[1].size;
    assert!((ratio - 1.75f64.ln() / 1.25f64.ln()).abs() < 1e-12);
    assert_eq!(layout.nodes[0].size, node_size(30, 40));

    assert_eq!(layout.edges.len(), 1);
    let e = &layout.edges[0];
    assert_eq!(e.label, "25%");
    assert!((e.width - 1.75).abs() < 1e-12);
    assert!(svg.contains("25%"));
}

#[test]
fn overlay_disabled_uses_exactly_the_member_palette_entries() {
    let (x, labels) = two_states(30, 10, 5);
    let graph = graph_for(&x, &labels);
    let palette = Palette::from_hex(&["#111111", "#222222", "#333333"]).unwrap();
    let cfg = GraphPlotConfig {
        plot_edges: false,
        ..Default::default()
    };

    let mut svg = String::new();
    let (plot, _) = {
        let root = SVGBackend::with_string(&mut svg, (400, 400)).into_drawing_area();
        plot_metastable_graph(&root, &x.view(), &graph, &cfg, None, Some(&labels), &palette)
            .unwrap()
    };
    assert!(plot.layout.is_none());
    assert_eq!(plot.points.dim(), (40, 2));
    let used: BTreeSet<Rgb> = plot.colors.iter().copied().collect();
    let expected: BTreeSet<Rgb> = [palette.color(0).unwrap(), palette.color(1).unwrap()]
        .into_iter()
        .collect();
    assert_eq!(used, expected);
}

#[test]
fn supplied_embedding_is_reused_not_refit() {
    let (x, labels) = two_states(45, 15, 11);
    let graph = graph_for(&x, &labels);
    let palette = Palette::default();
    let cfg = GraphPlotConfig {
        plot_edges: false,
        ..Default::default()
    };

    let mut svg = String::new();
    let root = SVGBackend::with_string(&mut svg, (300, 300)).into_drawing_area();
    let (first, fitted) =
        plot_metastable_graph(&root, &x.view(), &graph, &cfg, None, None, &palette).unwrap();
    assert_eq!(fitted.method(), LleMethod::Standard);

    let expected = fitted.transform(&x.view()).unwrap();
    let trained = fitted.embedding().clone();
    let (second, again) = plot_metastable_graph(
        &root,
        &x.view(),
        &graph,
        &cfg,
        Some(fitted),
        None,
        &palette,
    )
    .unwrap();
    assert_eq!(second.points, expected);
    assert_eq!(again.embedding(), &trained);
    assert_eq!(first.colors, second.colors);
}

#[test]
fn explicit_weights_override_and_empty_falls_back() {
    let (x, labels) = two_states(30, 10, 9);
    let graph = graph_for(&x, &labels);
    let palette = Palette::default();

    let mut weights = EdgeWeights::new();
    weights.insert((0, 1), 0.6);
    // State 4 has no members: skipped, not an error.
    weights.insert((1, 4), 0.2);
    let cfg = GraphPlotConfig {
        edge_weights: Some(weights),
        ..Default::default()
    };
    let mut svg = String::new();
    let root = SVGBackend::with_string(&mut svg, (400, 600)).into_drawing_area();
    let (plot, fitted) =
        plot_metastable_graph(&root, &x.view(), &graph, &cfg, None, Some(&labels), &palette)
            .unwrap();
    let edges = plot.layout.unwrap().edges;
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].label, "60%");

    let cfg = GraphPlotConfig {
        edge_weights: Some(EdgeWeights::new()),
        state_edges: Some(Vec::new()),
        ..Default::default()
    };
    let (plot, _) = plot_metastable_graph(
        &root,
        &x.view(),
        &graph,
        &cfg,
        Some(fitted),
        Some(&labels),
        &palette,
    )
    .unwrap();
    let edges = plot.layout.unwrap().edges;
    assert_eq!(edges.len(), graph.edge_weights().len());
    assert_eq!(edges[0].label, "25%");
}
