//! The end-to-end analysis pipeline.
//!
//! One explicit, callable function instead of implicit whole-script
//! re-execution: the caller decides when to run, and re-running with the
//! same parameters is side-effect-free apart from populating the fetch
//! cache. Every stage consumes an immutable snapshot and produces a new
//! one, so concurrent runs never share mutable state.

use crate::cluster::{self, ClusterAssignment, ClusterParams};
use crate::error::Result;
use crate::fetch::ResourceFetcher;
use crate::filter::{self, FilterSpec};
use crate::geometry;
use crate::interpolate::{self, Method};
use crate::layers::{self, Aggregate, ColorRule};
use crate::types::{
    BaseMapLayer, Dataset, DatasetSummary, Field, MapViewDescriptor, MarkerDescriptor,
    SeriesDescriptor,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Everything one invocation needs: source URLs plus filter, cluster and
/// view parameters.
#[derive(Debug, Clone)]
pub struct PipelineParams {
    pub csv_url: String,
    pub basemap_url: Option<String>,
    pub interpolation: Option<Method>,
    pub filters: FilterSpec,
    pub cluster: Option<ClusterParams>,
    /// Field the point layer is colored by.
    pub color_by: Field,
    pub chart_group_by: Field,
    pub chart_agg: Aggregate,
}

impl PipelineParams {
    pub fn new(csv_url: impl Into<String>) -> Self {
        Self {
            csv_url: csv_url.into(),
            basemap_url: None,
            interpolation: None,
            filters: FilterSpec::new(),
            cluster: Some(ClusterParams::default()),
            color_by: Field::VegetationType,
            chart_group_by: Field::VegetationType,
            chart_agg: Aggregate::Count,
        }
    }
}

/// Descriptors handed to the rendering surface.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub summary: DatasetSummary,
    pub view: Option<MapViewDescriptor>,
    pub basemap: Option<Arc<BaseMapLayer>>,
    pub markers: Vec<MarkerDescriptor>,
    /// `None` when clustering was disabled or skipped for insufficient rows.
    pub cluster_markers: Option<Vec<MarkerDescriptor>>,
    pub series: Vec<SeriesDescriptor>,
    pub clusters: Option<ClusterAssignment>,
}

pub struct Pipeline {
    fetcher: ResourceFetcher,
}

impl Pipeline {
    pub fn new(fetcher: ResourceFetcher) -> Self {
        Self { fetcher }
    }

    pub fn fetcher(&self) -> &ResourceFetcher {
        &self.fetcher
    }

    /// Runs the full pipeline: fetch, validate, interpolate, project,
    /// filter, cluster, build layers and series.
    ///
    /// Network, archive and schema failures abort before any layer is
    /// built. Insufficient rows for clustering only drop the
    /// cluster-dependent outputs; the filtered data and field-colored
    /// views still come back.
    pub async fn run(&self, params: &PipelineParams) -> Result<PipelineOutput> {
        info!(url = %params.csv_url, "pipeline start");
        let dataset = self.fetcher.fetch_csv(&params.csv_url).await?;

        let basemap = match &params.basemap_url {
            Some(url) => Some(self.fetcher.fetch_basemap(url).await?),
            None => None,
        };

        Ok(process(&dataset, basemap, params))
    }
}

/// The offline tail of the pipeline, from a parsed dataset onwards.
/// Infallible by design: the failures that abort a run all happen during
/// acquisition and validation.
pub fn process(
    dataset: &Dataset,
    basemap: Option<Arc<BaseMapLayer>>,
    params: &PipelineParams,
) -> PipelineOutput {
    let dataset = match params.interpolation {
        Some(method) => interpolate::interpolate(dataset, method),
        None => dataset.clone(),
    };

    let geo = geometry::project(&dataset);
    info!(
        rows = dataset.len(),
        located = geo.present(),
        crs = geo.crs(),
        "projected geometry"
    );

    let filtered = filter::apply(&dataset, &params.filters);
    if filtered.is_empty() {
        warn!("filter matched no rows; layers and series will be empty");
    }

    let clusters = match &params.cluster {
        Some(cp) => match cluster::fit(&filtered, &cp.features, cp.k, cp.seed) {
            Ok(assignment) => Some(assignment),
            Err(e) => {
                warn!(error = %e, "clustering skipped");
                None
            }
        },
        None => None,
    };

    let rule = layers::default_color_rule(params.color_by).unwrap_or(ColorRule::Categorical {
        colors: HashMap::new(),
        default: "blue".to_string(),
    });
    let markers = layers::build_point_layer(&filtered, params.color_by, &rule);
    let cluster_markers = clusters
        .as_ref()
        .map(|a| layers::build_cluster_layer(&filtered, a));
    let series = layers::build_aggregate_chart(&filtered, params.chart_group_by, params.chart_agg);
    let summary = layers::summarize(&filtered);
    let view = layers::map_view(&filtered);

    info!(
        markers = markers.len(),
        series = series.len(),
        clustered = clusters.is_some(),
        "pipeline complete"
    );

    PipelineOutput {
        summary,
        view,
        basemap,
        markers,
        cluster_markers,
        series,
        clusters,
    }
}
