//! Map-marker and chart-series construction.
//!
//! These are the read-only view objects an external rendering surface
//! consumes; nothing here draws anything. One marker is emitted per record
//! with both coordinates present; a column never collapses into a single
//! marker.

use crate::cluster::ClusterAssignment;
use crate::types::{
    Dataset, DatasetSummary, Field, MapViewDescriptor, MarkerDescriptor, SeriesDescriptor,
    VegetationType,
};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Color for markers whose colored field carries no value.
const FALLBACK_COLOR: &str = "gray";

/// Initial zoom of the map viewport.
const DEFAULT_ZOOM: u8 = 6;

/// Cluster marker colors, cycled by cluster id.
pub const CLUSTER_PALETTE: [&str; 8] = [
    "red",
    "blue",
    "green",
    "purple",
    "orange",
    "darkred",
    "cadetblue",
    "darkgreen",
];

/// How a record's value maps to a marker color.
#[derive(Debug, Clone)]
pub enum ColorRule {
    /// Exact category lookup with a default for anything unlisted.
    Categorical {
        colors: HashMap<String, String>,
        default: String,
    },
    /// Ascending threshold buckets for a continuous field: the first stop
    /// whose bound exceeds the value wins, `overflow` covers the rest.
    Threshold {
        stops: Vec<(f64, String)>,
        overflow: String,
    },
}

impl ColorRule {
    fn color_for(&self, record: &crate::types::PointRecord, field: Field) -> String {
        match self {
            ColorRule::Categorical { colors, default } => {
                let Some(value) = record.display_value(field) else {
                    return FALLBACK_COLOR.to_string();
                };
                colors.get(&value).unwrap_or(default).clone()
            }
            ColorRule::Threshold { stops, overflow } => {
                let Some(value) = record.numeric(field) else {
                    return FALLBACK_COLOR.to_string();
                };
                for (bound, color) in stops {
                    if value < *bound {
                        return color.clone();
                    }
                }
                overflow.clone()
            }
        }
    }
}

/// Stock color rule for the fields analysts usually map.
pub fn default_color_rule(field: Field) -> Option<ColorRule> {
    let rule = match field {
        Field::VegetationType => ColorRule::Categorical {
            colors: [
                (VegetationType::Bosque.name(), "green"),
                (VegetationType::Selva.name(), "darkgreen"),
                (VegetationType::Pastizales.name(), "yellow"),
                (VegetationType::Desierto.name(), "brown"),
            ]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
            default: "gray".to_string(),
        },
        Field::Altitude => threshold(&[(1000.0, "blue"), (2000.0, "orange")], "red"),
        Field::Precipitation => threshold(&[(1000.0, "blue"), (2000.0, "yellow")], "red"),
        Field::DeforestedArea => threshold(&[(50.0, "green"), (100.0, "orange")], "red"),
        _ => return None,
    };
    Some(rule)
}

fn threshold(stops: &[(f64, &str)], overflow: &str) -> ColorRule {
    ColorRule::Threshold {
        stops: stops
            .iter()
            .map(|(b, c)| (*b, c.to_string()))
            .collect(),
        overflow: overflow.to_string(),
    }
}

/// One marker per record with both coordinates, colored by `field` under
/// `rule` and labeled with the field's value.
pub fn build_point_layer(
    dataset: &Dataset,
    field: Field,
    rule: &ColorRule,
) -> Vec<MarkerDescriptor> {
    let markers: Vec<MarkerDescriptor> = dataset
        .records()
        .iter()
        .filter_map(|record| {
            let (lat, lon) = (record.latitude?, record.longitude?);
            let value = record
                .display_value(field)
                .unwrap_or_else(|| "n/a".to_string());
            Some(MarkerDescriptor {
                latitude: lat,
                longitude: lon,
                color: rule.color_for(record, field),
                label: format!("{}: {value}", field.name()),
            })
        })
        .collect();

    debug!(field = %field, markers = markers.len(), "built point layer");
    markers
}

/// Markers colored by cluster id. Records the fit dropped (missing feature
/// values) or that carry no coordinates are skipped.
pub fn build_cluster_layer(
    dataset: &Dataset,
    assignment: &ClusterAssignment,
) -> Vec<MarkerDescriptor> {
    dataset
        .records()
        .iter()
        .zip(assignment.labels())
        .filter_map(|(record, label)| {
            let cluster = (*label)?;
            let (lat, lon) = (record.latitude?, record.longitude?);
            let color = CLUSTER_PALETTE[cluster as usize % CLUSTER_PALETTE.len()];
            Some(MarkerDescriptor {
                latitude: lat,
                longitude: lon,
                color: color.to_string(),
                label: format!("cluster {cluster}"),
            })
        })
        .collect()
}

/// Aggregation applied per group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    /// Number of records per group.
    Count,
    /// Sum of a numeric field per group.
    Sum(Field),
    /// Mean of a numeric field per group.
    Mean(Field),
}

/// Aggregate series grouped by `group_by`, ordered by group key.
///
/// Grouping by [`Field::Date`] buckets per calendar month (`YYYY-MM` keys),
/// which sort chronologically; any other field groups by its displayed
/// value. Records without a group key, and records without the aggregated
/// value, are skipped. An empty dataset produces an empty series.
pub fn build_aggregate_chart(
    dataset: &Dataset,
    group_by: Field,
    agg: Aggregate,
) -> Vec<SeriesDescriptor> {
    let mut groups: BTreeMap<String, (f64, usize)> = BTreeMap::new();

    for record in dataset.records() {
        let key = match group_by {
            Field::Date => record.date.map(|d| d.format("%Y-%m").to_string()),
            other => record.display_value(other),
        };
        let Some(key) = key else {
            continue;
        };

        let sample = match agg {
            Aggregate::Count => Some(1.0),
            Aggregate::Sum(field) | Aggregate::Mean(field) => record.numeric(field),
        };
        let Some(sample) = sample else {
            continue;
        };

        let entry = groups.entry(key).or_insert((0.0, 0));
        entry.0 += sample;
        entry.1 += 1;
    }

    groups
        .into_iter()
        .map(|(key, (sum, n))| {
            let value = match agg {
                Aggregate::Count => n as f64,
                Aggregate::Sum(_) => sum,
                Aggregate::Mean(_) => sum / n as f64,
            };
            SeriesDescriptor { key, value }
        })
        .collect()
}

/// Initial viewport centered on the mean of the present coordinates.
/// `None` when no record is locatable.
pub fn map_view(dataset: &Dataset) -> Option<MapViewDescriptor> {
    let (lat, lon) = crate::geometry::mean_center(dataset)?;
    Some(MapViewDescriptor {
        center_latitude: lat,
        center_longitude: lon,
        zoom: DEFAULT_ZOOM,
    })
}

/// Headline statistics: record count, total deforested area, mean rate.
pub fn summarize(dataset: &Dataset) -> DatasetSummary {
    let total_deforested_area = dataset
        .records()
        .iter()
        .filter_map(|r| r.deforested_area)
        .sum();

    let rates: Vec<f64> = dataset
        .records()
        .iter()
        .filter_map(|r| r.deforestation_rate)
        .collect();
    let mean_deforestation_rate = if rates.is_empty() {
        None
    } else {
        Some(rates.iter().sum::<f64>() / rates.len() as f64)
    };

    DatasetSummary {
        records: dataset.len(),
        total_deforested_area,
        mean_deforestation_rate,
    }
}
