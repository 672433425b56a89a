use ndarray::Array2;
use plotters::prelude::*;
use std::collections::BTreeMap;
use trajviz::heatmap::{
    plot_coregulatory_similarity, plot_coregulatory_states, plot_gene_clustermap_by_membership,
    plot_transition_clustermap, ClustermapConfig,
};
use trajviz::palette::Palette;

fn render<T>(size: (u32, u32), f: impl FnOnce(&DrawingArea<SVGBackend<'_>, plotters::coord::Shift>) -> T) -> (T, String) {
    let mut svg = String::new();
    let out = {
        let root = SVGBackend::with_string(&mut svg, size).into_drawing_area();
        root.fill(&WHITE).unwrap();
        let out = f(&root);
        root.present().unwrap();
        out
    };
    (out, svg)
}

/// 30 pseudotime points by 12 genes: four shapes, three noisy copies each.
fn expression() -> (Array2<f64>, Vec<String>, Vec<f64>) {
    let times: Vec<f64> = (0..30).map(|t| t as f64 / 29.0).collect();
    let x = Array2::from_shape_fn((30, 12), |(t, g)| {
        let s = times[t];
        let wobble = 0.02 * (((t + 3) * (g + 5)) % 11) as f64;
        let base = match g / 3 {
            0 => s,
            1 => 1.0 - s,
            2 => (std::f64::consts::PI * s).sin(),
            _ => (s - 0.5).abs(),
        };
        base + wobble
    });
    let genes = (0..12).map(|g| format!("gene{g}")).collect();
    (x, genes, times)
}

#[test]
fn transition_clustermap_renders_and_partitions_genes() {
    let (x, genes, times) = expression();
    let cfg = ClustermapConfig {
        n_clusters: 4,
        ..Default::default()
    };
    let (clusters, svg) = render((800, 900), |root| {
        plot_transition_clustermap(root, &x.view(), &genes, &times, &cfg, &Palette::default())
            .unwrap()
    });
    assert!(svg.contains("<svg"));
    assert!(svg.contains("Pseudotime"));
    assert!(svg.contains("gene0"));
    assert!(clusters.len() <= 4);
    let total: usize = clusters.values().map(Vec::len).sum();
    assert_eq!(total, genes.len());

    // Each shape's three copies land together.
    for shape in 0..4 {
        let first = format!("gene{}", 3 * shape);
        let members = clusters.values().find(|v| v.contains(&first)).unwrap();
        for k in 1..3 {
            assert!(members.contains(&format!("gene{}", 3 * shape + k)));
        }
    }
}

#[test]
fn gradient_mode_also_covers_every_gene() {
    let (x, genes, times) = expression();
    let cfg = ClustermapConfig {
        n_clusters: 3,
        gradient: true,
        ..Default::default()
    };
    let (clusters, _) = render((600, 600), |root| {
        plot_transition_clustermap(root, &x.view(), &genes, &times, &cfg, &Palette::default())
            .unwrap()
    });
    let mut all: Vec<&String> = clusters.values().flatten().collect();
    all.sort();
    all.dedup();
    assert_eq!(all.len(), 12);
}

#[test]
fn membership_clustermap_labels_groups() {
    let (x, _, _) = expression();
    let memberships: Vec<usize> = (0..30).map(|t| t / 10).collect();
    let (cm, svg) = render((500, 500), |root| {
        plot_gene_clustermap_by_membership(root, &x.view(), &memberships).unwrap()
    });
    assert_eq!(cm.data.dim(), (12, 3));
    assert!(cm.row_tree.is_some());
    assert!(cm.col_tree.is_none());
    assert!(svg.contains("Cell type"));
    // Column minimum is subtracted per gene before transposing.
    for row in cm.data.rows() {
        assert!(row.iter().any(|&v| v == 0.0));
        assert!(row.iter().all(|&v| v >= 0.0));
    }
}

#[test]
fn coregulatory_panels_and_similarity() {
    let mut states = BTreeMap::new();
    for (i, id) in ["coreg_a", "coreg_b", "coreg_c"].into_iter().enumerate() {
        let m = Array2::from_shape_fn((6, 6), |(r, c)| ((r * (i + 2) + c * 3) % 7) as f64);
        states.insert(id.to_string(), m);
    }
    let (maps, svg) = render((900, 900), |root| plot_coregulatory_states(root, &states).unwrap());
    assert_eq!(maps.len(), 3);
    assert!(maps.iter().all(|m| m.row_tree.is_some() && m.col_tree.is_some()));
    for id in ["coreg_a", "coreg_b", "coreg_c"] {
        assert!(svg.contains(id), "missing title {id}");
    }

    let sim = Array2::from_shape_fn((20, 20), |(i, j)| (-((i as f64 - j as f64).powi(2)) / 20.0).exp());
    let (cm, svg) = render((400, 400), |root| plot_coregulatory_similarity(root, &sim.view()).unwrap());
    assert_eq!(cm.row_order, (0..20).collect::<Vec<_>>());
    assert!(svg.contains("Pseudotime"));

    let not_square = Array2::<f64>::zeros((3, 4));
    let (res, _) = render((100, 100), |root| plot_coregulatory_similarity(root, &not_square.view()).is_err());
    assert!(res);
}
