use crate::cluster::{ClusterParams, DEFAULT_K, DEFAULT_SEED};
use crate::filter::FilterSpec;
use crate::interpolate::Method;
use crate::layers::Aggregate;
use crate::pipeline::PipelineParams;
use crate::schema;
use crate::types::Field;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub input: InputConfig,
    #[serde(default)]
    pub interpolation: Option<InterpolationConfig>,
    #[serde(default)]
    pub filter: Vec<FilterEntry>,
    #[serde(default)]
    pub cluster: Option<ClusterConfig>,
    #[serde(default)]
    pub map: MapConfig,
    #[serde(default)]
    pub chart: ChartConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InputConfig {
    pub data_csv_url: String,
    pub basemap_url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InterpolationConfig {
    /// "linear", "polynomial" or "spline"
    pub method: String,
    pub order: Option<usize>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FilterEntry {
    pub field: String,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClusterConfig {
    /// Feature fields; defaults to latitude/longitude/deforested area.
    pub features: Option<Vec<String>>,
    pub k: Option<usize>,
    pub seed: Option<u64>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct MapConfig {
    /// Field markers are colored by; defaults to vegetation type.
    pub color_by: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ChartConfig {
    /// Group key field; defaults to vegetation type.
    pub group_by: Option<String>,
    /// Aggregated value field, required for sum/mean.
    pub value: Option<String>,
    /// "count", "sum" or "mean"; defaults to count.
    pub agg: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    pub dir: PathBuf,
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: AppConfig = toml::from_str(&content)
            .with_context(|| "Failed to parse TOML configuration")?;
        Ok(config)
    }

    /// Resolves the raw configuration into typed pipeline parameters.
    pub fn to_params(&self) -> Result<PipelineParams> {
        let mut filters = FilterSpec::new();
        for entry in &self.filter {
            let field = resolve_field(&entry.field)?;
            filters.insert(field, entry.min, entry.max)?;
        }

        let interpolation = match &self.interpolation {
            Some(cfg) => Some(parse_method(cfg)?),
            None => None,
        };

        let cluster = match &self.cluster {
            Some(cfg) => {
                let features = match &cfg.features {
                    Some(names) => names
                        .iter()
                        .map(|n| resolve_field(n))
                        .collect::<Result<Vec<Field>>>()?,
                    None => ClusterParams::default().features,
                };
                Some(ClusterParams {
                    features,
                    k: cfg.k.unwrap_or(DEFAULT_K),
                    seed: cfg.seed.unwrap_or(DEFAULT_SEED),
                })
            }
            None => Some(ClusterParams::default()),
        };

        let color_by = match &self.map.color_by {
            Some(name) => resolve_field(name)?,
            None => Field::VegetationType,
        };

        let chart_group_by = match &self.chart.group_by {
            Some(name) => resolve_field(name)?,
            None => Field::VegetationType,
        };
        let chart_agg = parse_aggregate(&self.chart)?;

        Ok(PipelineParams {
            csv_url: self.input.data_csv_url.clone(),
            basemap_url: self.input.basemap_url.clone(),
            interpolation,
            filters,
            cluster,
            color_by,
            chart_group_by,
            chart_agg,
        })
    }
}

fn resolve_field(name: &str) -> Result<Field> {
    schema::canonical_field(name)
        .with_context(|| format!("Unknown field name in configuration: {name:?}"))
}

fn parse_method(cfg: &InterpolationConfig) -> Result<Method> {
    let method = match cfg.method.to_ascii_lowercase().as_str() {
        "linear" => Method::Linear,
        "polynomial" => Method::Polynomial {
            order: cfg.order.unwrap_or(2),
        },
        "spline" => Method::Spline {
            order: cfg.order.unwrap_or(3),
        },
        other => bail!("Unknown interpolation method: {other:?}"),
    };
    Ok(method)
}

fn parse_aggregate(cfg: &ChartConfig) -> Result<Aggregate> {
    let value = || -> Result<Field> {
        let name = cfg
            .value
            .as_deref()
            .context("chart.value is required for sum/mean aggregation")?;
        resolve_field(name)
    };

    match cfg.agg.as_deref().unwrap_or("count") {
        "count" => Ok(Aggregate::Count),
        "sum" => Ok(Aggregate::Sum(value()?)),
        "mean" => Ok(Aggregate::Mean(value()?)),
        other => bail!("Unknown aggregation: {other:?}"),
    }
}
