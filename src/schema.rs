//! Header normalization and required-field validation.
//!
//! Source files for this dataset circulate with Spanish headers
//! (`Latitud`, `Superficie_Deforestada`, ...) in inconsistent casing and
//! with stray whitespace. Normalization resolves each raw header to a
//! canonical [`Field`] once at load time; the original header text is kept
//! so diagnostics can echo what the file actually said.

use crate::error::{PipelineError, Result};
use crate::types::Field;
use std::collections::HashMap;
use tracing::warn;

/// Original CSV column a canonical field was resolved from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRef {
    /// Zero-based column index in the CSV.
    pub index: usize,
    /// Header text as it appeared in the file, untrimmed.
    pub header: String,
}

/// Mapping from canonical field to source column.
#[derive(Debug, Clone, Default)]
pub struct SchemaMap {
    entries: HashMap<Field, ColumnRef>,
    raw_headers: Vec<String>,
}

impl SchemaMap {
    pub fn column(&self, field: Field) -> Option<&ColumnRef> {
        self.entries.get(&field)
    }

    pub fn contains(&self, field: Field) -> bool {
        self.entries.contains_key(&field)
    }

    /// Header row as it appeared in the file.
    pub fn raw_headers(&self) -> &[String] {
        &self.raw_headers
    }
}

/// Lowercases, trims and strips accents so `" Latitud "`, `"LATITUD"` and
/// `"latitud"` compare equal. Idempotent.
pub(crate) fn normalize_token(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| match c {
            'á' | 'Á' => 'a',
            'é' | 'É' => 'e',
            'í' | 'Í' => 'i',
            'ó' | 'Ó' => 'o',
            'ú' | 'Ú' => 'u',
            'ñ' | 'Ñ' => 'n',
            _ => c.to_ascii_lowercase(),
        })
        .collect()
}

/// Canonical field for a raw header, if the spelling is recognized.
///
/// The alias table covers the Spanish headers of the source dataset and
/// their English equivalents.
pub fn canonical_field(raw: &str) -> Option<Field> {
    match normalize_token(raw).as_str() {
        "latitud" | "latitude" | "lat" => Some(Field::Latitude),
        "longitud" | "longitude" | "lon" | "lng" => Some(Field::Longitude),
        "superficie_deforestada" | "area_deforestada" | "deforested_area" => {
            Some(Field::DeforestedArea)
        }
        "tasa_deforestacion" | "deforestation_rate" => Some(Field::DeforestationRate),
        "tipo_vegetacion" | "vegetacion" | "vegetation_type" => Some(Field::VegetationType),
        "altitud" | "altitude" | "elevation" => Some(Field::Altitude),
        "pendiente" | "slope" => Some(Field::Slope),
        "distancia_carretera" | "distancia_a_carretera" | "distance_to_road" => {
            Some(Field::DistanceToRoad)
        }
        "precipitacion" | "precipitation" => Some(Field::Precipitation),
        "temperatura" | "temperature" => Some(Field::Temperature),
        "fecha" | "date" => Some(Field::Date),
        _ => None,
    }
}

/// Resolves a raw header row into a canonical schema mapping.
///
/// Unrecognized headers are ignored (extra columns are fine); a second
/// column resolving to an already-mapped field is ignored with a warning,
/// so the first occurrence wins.
pub fn normalize_headers<I, S>(headers: I) -> SchemaMap
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut map = SchemaMap::default();

    for (index, header) in headers.into_iter().enumerate() {
        let header = header.as_ref();
        map.raw_headers.push(header.to_string());

        let Some(field) = canonical_field(header) else {
            continue;
        };

        if let Some(existing) = map.entries.get(&field) {
            warn!(
                field = %field,
                first = %existing.header,
                duplicate = %header,
                "duplicate column for canonical field; keeping the first"
            );
            continue;
        }

        map.entries.insert(
            field,
            ColumnRef {
                index,
                header: header.to_string(),
            },
        );
    }

    map
}

/// Checks that every required canonical field resolved to a column.
///
/// On failure the error carries both the missing canonical fields and the
/// columns actually present, so a caller can see at a glance whether the
/// file is truncated or merely spelled differently.
pub fn validate_required(schema: &SchemaMap, required: &[Field]) -> Result<()> {
    let missing: Vec<Field> = required
        .iter()
        .copied()
        .filter(|f| !schema.contains(*f))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(PipelineError::Schema {
            missing,
            available: schema.raw_headers().to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_aliases_are_case_and_whitespace_insensitive() {
        for spelling in ["Latitud", " latitud ", "LATITUD", "latitude"] {
            assert_eq!(canonical_field(spelling), Some(Field::Latitude), "{spelling}");
        }
    }

    #[test]
    fn normalize_token_is_idempotent() {
        let once = normalize_token(" Tasa_Deforestación ");
        assert_eq!(once, "tasa_deforestacion");
        assert_eq!(normalize_token(&once), once);
    }

    #[test]
    fn accented_spanish_headers_resolve() {
        assert_eq!(
            canonical_field("Precipitación"),
            Some(Field::Precipitation)
        );
        assert_eq!(
            canonical_field("Tasa_Deforestación"),
            Some(Field::DeforestationRate)
        );
    }

    #[test]
    fn normalize_headers_keeps_original_text_and_index() {
        let map = normalize_headers(["Fecha", " LATITUD ", "Longitud"]);
        let lat = map.column(Field::Latitude).unwrap();
        assert_eq!(lat.index, 1);
        assert_eq!(lat.header, " LATITUD ");
        assert_eq!(map.raw_headers().len(), 3);
    }

    #[test]
    fn first_duplicate_column_wins() {
        let map = normalize_headers(["Latitud", "latitude"]);
        assert_eq!(map.column(Field::Latitude).unwrap().index, 0);
    }

    #[test]
    fn validate_required_reports_missing_and_available() {
        let map = normalize_headers(["Latitud", "Longitud", "Comentario"]);
        let err = validate_required(&map, &Field::REQUIRED).unwrap_err();
        match err {
            PipelineError::Schema { missing, available } => {
                assert!(missing.contains(&Field::DeforestedArea));
                assert!(!missing.contains(&Field::Latitude));
                assert_eq!(available, vec!["Latitud", "Longitud", "Comentario"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn validate_required_passes_on_full_schema() {
        let headers = [
            "Latitud",
            "Longitud",
            "Superficie_Deforestada",
            "Tasa_Deforestacion",
            "Tipo_Vegetacion",
            "Altitud",
            "Pendiente",
            "Distancia_Carretera",
            "Precipitacion",
            "Temperatura",
            "Fecha",
        ];
        let map = normalize_headers(headers);
        assert!(validate_required(&map, &Field::REQUIRED).is_ok());
        assert!(map.contains(Field::Date));
    }
}
