use chrono::NaiveDate;
use geo::MultiPolygon;
use serde::Serialize;

/// Canonical schema fields.
///
/// Every stage downstream of header normalization references columns through
/// this enum only, never through raw header strings, so datasets whose
/// headers differ in casing, whitespace or language resolve to the same
/// pipeline behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Latitude,
    Longitude,
    DeforestedArea,
    DeforestationRate,
    VegetationType,
    Altitude,
    Slope,
    DistanceToRoad,
    Precipitation,
    Temperature,
    Date,
}

impl Field {
    pub const ALL: [Field; 11] = [
        Field::Latitude,
        Field::Longitude,
        Field::DeforestedArea,
        Field::DeforestationRate,
        Field::VegetationType,
        Field::Altitude,
        Field::Slope,
        Field::DistanceToRoad,
        Field::Precipitation,
        Field::Temperature,
        Field::Date,
    ];

    /// Fields that must be present for the pipeline to run. Date is optional.
    pub const REQUIRED: [Field; 10] = [
        Field::Latitude,
        Field::Longitude,
        Field::DeforestedArea,
        Field::DeforestationRate,
        Field::VegetationType,
        Field::Altitude,
        Field::Slope,
        Field::DistanceToRoad,
        Field::Precipitation,
        Field::Temperature,
    ];

    pub const NUMERIC: [Field; 9] = [
        Field::Latitude,
        Field::Longitude,
        Field::DeforestedArea,
        Field::DeforestationRate,
        Field::Altitude,
        Field::Slope,
        Field::DistanceToRoad,
        Field::Precipitation,
        Field::Temperature,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Field::Latitude => "latitude",
            Field::Longitude => "longitude",
            Field::DeforestedArea => "deforested_area",
            Field::DeforestationRate => "deforestation_rate",
            Field::VegetationType => "vegetation_type",
            Field::Altitude => "altitude",
            Field::Slope => "slope",
            Field::DistanceToRoad => "distance_to_road",
            Field::Precipitation => "precipitation",
            Field::Temperature => "temperature",
            Field::Date => "date",
        }
    }

    pub fn is_numeric(&self) -> bool {
        !matches!(self, Field::VegetationType | Field::Date)
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Vegetation cover categories observed in the source data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum VegetationType {
    Bosque,
    Selva,
    Pastizales,
    Desierto,
    #[default]
    Unknown,
}

impl VegetationType {
    /// Parses a raw CSV cell. Anything outside the known set is `Unknown`.
    pub fn parse(raw: &str) -> Self {
        match crate::schema::normalize_token(raw).as_str() {
            "bosque" | "forest" => VegetationType::Bosque,
            "selva" | "jungle" | "rainforest" => VegetationType::Selva,
            "pastizales" | "pastizal" | "grassland" => VegetationType::Pastizales,
            "desierto" | "desert" => VegetationType::Desierto,
            _ => VegetationType::Unknown,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            VegetationType::Bosque => "Bosque",
            VegetationType::Selva => "Selva",
            VegetationType::Pastizales => "Pastizales",
            VegetationType::Desierto => "Desierto",
            VegetationType::Unknown => "unknown",
        }
    }
}

/// One geotagged deforestation observation.
///
/// Built from a single CSV row and immutable afterwards; stages that change
/// values produce derived copies instead of mutating in place. Numeric
/// fields are `None` where the source cell was empty, unparseable or failed
/// the range repair at load time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointRecord {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub deforested_area: Option<f64>,
    pub deforestation_rate: Option<f64>,
    pub vegetation: VegetationType,
    pub altitude: Option<f64>,
    pub slope: Option<f64>,
    pub distance_to_road: Option<f64>,
    pub precipitation: Option<f64>,
    pub temperature: Option<f64>,
    pub date: Option<NaiveDate>,
}

impl PointRecord {
    /// Value of a numeric canonical field. `None` for missing values and for
    /// the non-numeric fields (vegetation, date).
    pub fn numeric(&self, field: Field) -> Option<f64> {
        match field {
            Field::Latitude => self.latitude,
            Field::Longitude => self.longitude,
            Field::DeforestedArea => self.deforested_area,
            Field::DeforestationRate => self.deforestation_rate,
            Field::Altitude => self.altitude,
            Field::Slope => self.slope,
            Field::DistanceToRoad => self.distance_to_road,
            Field::Precipitation => self.precipitation,
            Field::Temperature => self.temperature,
            Field::VegetationType | Field::Date => None,
        }
    }

    pub(crate) fn set_numeric(&mut self, field: Field, value: Option<f64>) {
        match field {
            Field::Latitude => self.latitude = value,
            Field::Longitude => self.longitude = value,
            Field::DeforestedArea => self.deforested_area = value,
            Field::DeforestationRate => self.deforestation_rate = value,
            Field::Altitude => self.altitude = value,
            Field::Slope => self.slope = value,
            Field::DistanceToRoad => self.distance_to_road = value,
            Field::Precipitation => self.precipitation = value,
            Field::Temperature => self.temperature = value,
            Field::VegetationType | Field::Date => {}
        }
    }

    /// Human-readable value of any field, for marker labels and group keys.
    pub fn display_value(&self, field: Field) -> Option<String> {
        match field {
            Field::VegetationType => Some(self.vegetation.name().to_string()),
            Field::Date => self.date.map(|d| d.to_string()),
            _ => self.numeric(field).map(|v| format!("{v}")),
        }
    }

    pub fn has_coordinates(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }
}

/// Ordered sequence of records sharing one canonical schema.
///
/// Snapshots are immutable: filtering and interpolation return new
/// `Dataset` values carrying the same schema mapping.
#[derive(Debug, Clone)]
pub struct Dataset {
    schema: crate::schema::SchemaMap,
    records: Vec<PointRecord>,
}

impl Dataset {
    pub fn new(schema: crate::schema::SchemaMap, records: Vec<PointRecord>) -> Self {
        Self { schema, records }
    }

    pub fn records(&self) -> &[PointRecord] {
        &self.records
    }

    pub fn schema(&self) -> &crate::schema::SchemaMap {
        &self.schema
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Derived snapshot with the same schema and a new record sequence.
    pub(crate) fn with_records(&self, records: Vec<PointRecord>) -> Dataset {
        Dataset {
            schema: self.schema.clone(),
            records,
        }
    }
}

/// Static collection of boundary polygons used as a map backdrop.
///
/// Loaded once per process from the basemap archive and read-only
/// afterwards; never re-derived from filtered point data.
#[derive(Debug, Clone)]
pub struct BaseMapLayer {
    name: String,
    crs: &'static str,
    boundaries: Vec<MultiPolygon<f64>>,
}

impl BaseMapLayer {
    pub fn new(name: String, boundaries: Vec<MultiPolygon<f64>>) -> Self {
        Self {
            name,
            crs: crate::geometry::WGS84,
            boundaries,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn crs(&self) -> &'static str {
        self.crs
    }

    pub fn boundaries(&self) -> &[MultiPolygon<f64>] {
        &self.boundaries
    }

    pub fn len(&self) -> usize {
        self.boundaries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boundaries.is_empty()
    }
}

/// One renderable map marker. The rendering surface consuming these is an
/// external collaborator; nothing beyond this shape is promised.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkerDescriptor {
    /// Latitude (WGS84).
    pub latitude: f64,
    /// Longitude (WGS84).
    pub longitude: f64,
    /// Marker color name or hex code.
    pub color: String,
    /// Short label shown on hover/popup.
    pub label: String,
}

/// One aggregate chart point: a category or period key and its value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesDescriptor {
    pub key: String,
    pub value: f64,
}

/// Initial viewport for the map widget.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MapViewDescriptor {
    pub center_latitude: f64,
    pub center_longitude: f64,
    pub zoom: u8,
}

/// Headline statistics over a dataset snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DatasetSummary {
    pub records: usize,
    /// Sum of the deforested area over rows where it is present, in hectares.
    pub total_deforested_area: f64,
    /// Mean deforestation rate in percent; `None` when no row carries one.
    pub mean_deforestation_rate: Option<f64>,
}
