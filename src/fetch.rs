//! Remote-resource acquisition: the CSV dataset and the zipped basemap.
//!
//! Results are memoized per URL for the process lifetime. There is no TTL
//! and no invalidation; only restart clears the cache. Two tasks racing on
//! the same uncached URL may both fetch, and the first stored value wins;
//! the values are `Arc`-shared immutables, so the race is benign.

use crate::error::{PipelineError, Result};
use crate::schema::{self, SchemaMap};
use crate::types::{BaseMapLayer, Dataset, Field, PointRecord, VegetationType};
use chrono::NaiveDate;
use geo::MultiPolygon;
use std::collections::HashMap;
use std::io::{Cursor, Read, Seek, SeekFrom, Write};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

const USER_AGENT: &str = concat!("deforestation-analysis/", env!("CARGO_PKG_VERSION"));
const FETCH_TIMEOUT: Duration = Duration::from_secs(60);

/// URL-keyed cache of fetched resources. Populate-once per key; values are
/// shared snapshots.
#[derive(Default)]
pub struct FetchCache {
    datasets: RwLock<HashMap<String, Arc<Dataset>>>,
    basemaps: RwLock<HashMap<String, Arc<BaseMapLayer>>>,
}

impl FetchCache {
    pub async fn dataset(&self, url: &str) -> Option<Arc<Dataset>> {
        self.datasets.read().await.get(url).cloned()
    }

    pub async fn basemap(&self, url: &str) -> Option<Arc<BaseMapLayer>> {
        self.basemaps.read().await.get(url).cloned()
    }

    /// Stores a dataset unless the key is already populated; returns the
    /// value that ended up in the cache.
    pub async fn store_dataset(&self, url: &str, dataset: Arc<Dataset>) -> Arc<Dataset> {
        self.datasets
            .write()
            .await
            .entry(url.to_string())
            .or_insert(dataset)
            .clone()
    }

    pub async fn store_basemap(&self, url: &str, layer: Arc<BaseMapLayer>) -> Arc<BaseMapLayer> {
        self.basemaps
            .write()
            .await
            .entry(url.to_string())
            .or_insert(layer)
            .clone()
    }
}

/// Downloads and parses the remote inputs, caching per URL.
pub struct ResourceFetcher {
    client: reqwest::Client,
    cache: FetchCache,
}

impl ResourceFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| PipelineError::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            cache: FetchCache::default(),
        })
    }

    /// Fetches and parses the point dataset. Cached per URL.
    pub async fn fetch_csv(&self, url: &str) -> Result<Arc<Dataset>> {
        if let Some(hit) = self.cache.dataset(url).await {
            debug!(url, "dataset cache hit");
            return Ok(hit);
        }

        let bytes = self.download(url).await?;
        let dataset = Arc::new(parse_csv(url, &bytes)?);
        Ok(self.cache.store_dataset(url, dataset).await)
    }

    /// Fetches the zipped basemap and parses its boundary geometry. Cached
    /// per URL.
    ///
    /// The download is spooled through an anonymous temporary file
    /// (`tempfile::tempfile`), which the OS unlinks immediately: the storage
    /// is released on every exit path, success or failure.
    pub async fn fetch_basemap(&self, url: &str) -> Result<Arc<BaseMapLayer>> {
        if let Some(hit) = self.cache.basemap(url).await {
            debug!(url, "basemap cache hit");
            return Ok(hit);
        }

        let bytes = self.download(url).await?;
        let mut spool = tempfile::tempfile()?;
        spool.write_all(&bytes)?;
        spool.seek(SeekFrom::Start(0))?;

        let layer = Arc::new(parse_basemap_archive(url, spool)?);
        info!(url, boundaries = layer.len(), "loaded basemap");
        Ok(self.cache.store_basemap(url, layer).await)
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        debug!(url, "downloading");
        let network = |e: reqwest::Error| PipelineError::Network {
            url: url.to_string(),
            message: e.to_string(),
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(network)?;
        let bytes = response.bytes().await.map_err(network)?;

        info!(url, bytes = bytes.len(), "downloaded");
        Ok(bytes.to_vec())
    }
}

/// Parses CSV bytes into a dataset, validating the schema first.
///
/// `origin` only labels diagnostics. Structural CSV errors fail the parse;
/// bad cell values are repaired to missing instead (the pipeline is
/// exploratory, one mangled cell must not discard a file).
pub fn parse_csv(origin: &str, bytes: &[u8]) -> Result<Dataset> {
    let csv_err = |source: csv::Error| PipelineError::CsvParse {
        url: origin.to_string(),
        source,
    };

    let mut rdr = csv::ReaderBuilder::new().from_reader(bytes);
    let headers = rdr.headers().map_err(csv_err)?.clone();

    let schema = schema::normalize_headers(headers.iter());
    schema::validate_required(&schema, &Field::REQUIRED)?;

    let mut records = Vec::new();
    for row in rdr.records() {
        let row = row.map_err(csv_err)?;
        records.push(parse_record(&schema, &row));
    }

    info!(origin, rows = records.len(), "parsed dataset");
    Ok(Dataset::new(schema, records))
}

fn parse_record(schema: &SchemaMap, row: &csv::StringRecord) -> PointRecord {
    let mut record = PointRecord::default();

    for field in Field::ALL {
        let Some(col) = schema.column(field) else {
            continue;
        };
        let raw = row.get(col.index).unwrap_or("");

        match field {
            Field::VegetationType => record.vegetation = VegetationType::parse(raw),
            Field::Date => record.date = parse_date(raw),
            numeric => record.set_numeric(numeric, parse_numeric(raw)),
        }
    }

    repair(&mut record);
    record
}

fn parse_numeric(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("na") || raw.eq_ignore_ascii_case("nan") {
        return None;
    }
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => Some(v),
        _ => None,
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%d/%m/%Y"))
        .ok()
}

/// Range repair: values that cannot be real are demoted to missing so the
/// row keeps its remaining fields instead of being dropped wholesale.
fn repair(record: &mut PointRecord) {
    if record.latitude.is_some_and(|v| !(-90.0..=90.0).contains(&v)) {
        warn!(value = ?record.latitude, "latitude out of range, treating as missing");
        record.latitude = None;
    }
    if record.longitude.is_some_and(|v| !(-180.0..=180.0).contains(&v)) {
        warn!(value = ?record.longitude, "longitude out of range, treating as missing");
        record.longitude = None;
    }
    if record.deforested_area.is_some_and(|v| v < 0.0) {
        warn!(value = ?record.deforested_area, "negative deforested area, treating as missing");
        record.deforested_area = None;
    }
}

/// Opens a basemap archive and parses its boundary polygons.
///
/// The archive must contain a complete shapefile set: a `.shp` geometry
/// member whose `.shx` index and `.dbf` attribute siblings share its base
/// name. Only the `.shp` geometry is read; boundaries are all this layer
/// needs. Factored over `Read + Seek` so tests drive it with in-memory
/// archives.
pub fn parse_basemap_archive<R: Read + Seek>(origin: &str, reader: R) -> Result<BaseMapLayer> {
    let corrupt = |message: String| PipelineError::ArchiveCorrupt {
        url: origin.to_string(),
        message,
    };

    let mut archive = zip::ZipArchive::new(reader).map_err(|e| corrupt(e.to_string()))?;
    let entries: Vec<String> = archive.file_names().map(str::to_string).collect();

    let Some(shp_name) = find_shapefile_set(&entries) else {
        return Err(PipelineError::MissingShapefileSet {
            url: origin.to_string(),
            entries,
        });
    };
    debug!(origin, member = %shp_name, "found shapefile set");

    let mut shp_bytes = Vec::new();
    archive
        .by_name(&shp_name)
        .map_err(|e| corrupt(e.to_string()))?
        .read_to_end(&mut shp_bytes)?;

    let shapes = shapefile::ShapeReader::new(Cursor::new(shp_bytes))
        .map_err(|e| corrupt(e.to_string()))?
        .read()
        .map_err(|e| corrupt(e.to_string()))?;

    let mut boundaries: Vec<MultiPolygon<f64>> = Vec::new();
    for shape in shapes {
        let polygon = match shape {
            shapefile::Shape::Polygon(p) => p
                .try_into()
                .map_err(|e| corrupt(format!("failed to convert polygon: {e:?}")))?,
            shapefile::Shape::PolygonM(p) => p
                .try_into()
                .map_err(|e| corrupt(format!("failed to convert polygonM: {e:?}")))?,
            shapefile::Shape::PolygonZ(p) => p
                .try_into()
                .map_err(|e| corrupt(format!("failed to convert polygonZ: {e:?}")))?,
            // Points and lines are not boundaries
            _ => continue,
        };
        boundaries.push(polygon);
    }

    let name = shp_name
        .rsplit('/')
        .next()
        .unwrap_or(&shp_name)
        .trim_end_matches(".shp")
        .trim_end_matches(".SHP")
        .to_string();

    Ok(BaseMapLayer::new(name, boundaries))
}

/// Finds a `.shp` member whose `.shx` and `.dbf` siblings are present.
fn find_shapefile_set(entries: &[String]) -> Option<String> {
    for entry in entries {
        let lower = entry.to_ascii_lowercase();
        let Some(base) = lower.strip_suffix(".shp") else {
            continue;
        };
        let sibling = |ext: &str| {
            let want = format!("{base}{ext}");
            entries.iter().any(|e| e.to_ascii_lowercase() == want)
        };
        if sibling(".shx") && sibling(".dbf") {
            return Some(entry.clone());
        }
    }
    None
}
