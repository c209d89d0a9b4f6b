//! Offline end-to-end run: parse a raw CSV, then drive the full
//! interpolate → filter → cluster → build tail of the pipeline.

use deforestation_analysis::cluster::ClusterParams;
use deforestation_analysis::fetch::parse_csv;
use deforestation_analysis::interpolate::Method;
use deforestation_analysis::pipeline::{process, PipelineParams};
use deforestation_analysis::types::Field;

const CSV: &str = "\
Latitud,Longitud,Superficie_Deforestada,Tasa_Deforestacion,Tipo_Vegetacion,Altitud,Pendiente,Distancia_Carretera,Precipitacion,Temperatura,Fecha
-3.0,-60.0,10,1.0,Bosque,500,5,1.0,800,26,2023-01-05
-3.1,-60.1,,1.2,Bosque,520,6,1.1,820,26,2023-01-18
-3.2,-60.2,30,1.4,Bosque,540,6,1.2,840,25,2023-02-02
-8.0,-65.0,200,3.0,Selva,1500,12,4.0,2200,24,2023-02-15
-8.1,-65.1,210,3.2,Selva,1520,12,4.1,2250,24,2023-03-01
-8.2,-65.2,220,3.4,Selva,1540,13,4.2,2300,23,2023-03-20
-20.0,-68.0,5,0.2,Desierto,2600,2,20.0,150,18,2023-04-02
";

fn params() -> PipelineParams {
    let mut params = PipelineParams::new("test://deforestacion.csv");
    params.interpolation = Some(Method::Linear);
    params.cluster = Some(ClusterParams {
        features: vec![Field::Latitude, Field::Longitude, Field::DeforestedArea],
        k: 2,
        seed: 42,
    });
    params.chart_group_by = Field::Date;
    params.chart_agg = deforestation_analysis::layers::Aggregate::Sum(Field::DeforestedArea);
    params
}

#[test]
fn full_offline_run_produces_consistent_descriptors() {
    let dataset = parse_csv("test://deforestacion.csv", CSV.as_bytes()).unwrap();
    let output = process(&dataset, None, &params());

    // Every record is located, so every record gets a marker.
    assert_eq!(output.markers.len(), 7);

    // The interior area gap was linearly filled (10 .. 30 -> 20), so the
    // summary includes it.
    assert_eq!(output.summary.records, 7);
    assert_eq!(output.summary.total_deforested_area, 695.0);

    // Monthly sums, ordered by period.
    let keys: Vec<&str> = output.series.iter().map(|s| s.key.as_str()).collect();
    assert_eq!(keys, vec!["2023-01", "2023-02", "2023-03", "2023-04"]);

    // Clustering ran and produced per-record labels.
    let clusters = output.clusters.expect("clustering should run");
    assert_eq!(clusters.labels().len(), 7);
    assert_eq!(clusters.k(), 2);
    let cluster_markers = output.cluster_markers.expect("cluster layer present");
    assert_eq!(cluster_markers.len(), 7);

    // View centers inside the data's bounding box.
    let view = output.view.expect("locatable dataset has a view");
    assert!(view.center_latitude < -3.0 && view.center_latitude > -20.0);
}

#[test]
fn rerun_on_the_same_snapshot_is_identical() {
    let dataset = parse_csv("test://deforestacion.csv", CSV.as_bytes()).unwrap();
    let params = params();

    let a = process(&dataset, None, &params);
    let b = process(&dataset, None, &params);

    assert_eq!(a.markers, b.markers);
    assert_eq!(a.series, b.series);
    assert_eq!(a.summary, b.summary);
    assert_eq!(
        a.clusters.as_ref().map(|c| c.labels().to_vec()),
        b.clusters.as_ref().map(|c| c.labels().to_vec())
    );
}

#[test]
fn filtered_out_dataset_degrades_without_errors() {
    let dataset = parse_csv("test://deforestacion.csv", CSV.as_bytes()).unwrap();
    let mut params = params();
    params
        .filters
        .insert(Field::Altitude, 9000.0, 9999.0)
        .unwrap();

    let output = process(&dataset, None, &params);

    // Zero rows is a terminal state, not an error: empty layers, empty
    // series, clustering skipped.
    assert!(output.markers.is_empty());
    assert!(output.series.is_empty());
    assert!(output.clusters.is_none());
    assert!(output.cluster_markers.is_none());
    assert!(output.view.is_none());
    assert_eq!(output.summary.records, 0);
}

#[test]
fn filter_narrows_before_clustering() {
    let dataset = parse_csv("test://deforestacion.csv", CSV.as_bytes()).unwrap();
    let mut params = params();
    // Keep only the Selva band.
    params
        .filters
        .insert(Field::Precipitation, 2000.0, 2500.0)
        .unwrap();
    params.cluster = Some(ClusterParams {
        features: vec![Field::Latitude, Field::Longitude],
        k: 2,
        seed: 7,
    });

    let output = process(&dataset, None, &params);
    assert_eq!(output.markers.len(), 3);
    assert_eq!(output.summary.records, 3);
    let clusters = output.clusters.expect("three rows support k=2");
    assert_eq!(clusters.labels().iter().flatten().count(), 3);
}
