//! Point geometry construction and the coordinate reference tag.

use crate::types::Dataset;
use geo::Point;

/// All pipeline coordinates are WGS84 lat/lon.
pub const WGS84: &str = "EPSG:4326";

/// Record-aligned point geometry. `None` where either coordinate is missing.
#[derive(Debug, Clone)]
pub struct GeoPointSet {
    crs: &'static str,
    points: Vec<Option<Point<f64>>>,
}

impl GeoPointSet {
    pub fn crs(&self) -> &'static str {
        self.crs
    }

    pub fn points(&self) -> &[Option<Point<f64>>] {
        &self.points
    }

    /// Number of records that actually carry a point.
    pub fn present(&self) -> usize {
        self.points.iter().flatten().count()
    }
}

/// Builds point geometry from the coordinate fields. Points are x=lon,
/// y=lat, matching the axis order of the basemap polygons.
pub fn project(dataset: &Dataset) -> GeoPointSet {
    let points = dataset
        .records()
        .iter()
        .map(|r| match (r.latitude, r.longitude) {
            (Some(lat), Some(lon)) => Some(Point::new(lon, lat)),
            _ => None,
        })
        .collect();

    GeoPointSet {
        crs: WGS84,
        points,
    }
}

/// Mean of the present coordinates, as (lat, lon). `None` on a dataset with
/// no locatable records.
pub fn mean_center(dataset: &Dataset) -> Option<(f64, f64)> {
    let coords: Vec<(f64, f64)> = dataset
        .records()
        .iter()
        .filter_map(|r| Some((r.latitude?, r.longitude?)))
        .collect();

    if coords.is_empty() {
        return None;
    }

    let n = coords.len() as f64;
    let (lat_sum, lon_sum) = coords
        .iter()
        .fold((0.0, 0.0), |(la, lo), (lat, lon)| (la + lat, lo + lon));
    Some((lat_sum / n, lon_sum / n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::parse_csv;

    const CSV: &str = "\
Latitud,Longitud,Superficie_Deforestada,Tasa_Deforestacion,Tipo_Vegetacion,Altitud,Pendiente,Distancia_Carretera,Precipitacion,Temperatura
-2.0,-60.0,10,1,Bosque,500,10,2,1800,26
-4.0,-62.0,20,2,Selva,1500,12,3,2000,25
,-61.0,30,3,Bosque,900,8,1,1500,24
";

    #[test]
    fn project_aligns_points_with_records() {
        let dataset = parse_csv("test://csv", CSV.as_bytes()).unwrap();
        let set = project(&dataset);

        assert_eq!(set.points().len(), 3);
        assert_eq!(set.present(), 2);
        assert_eq!(set.crs(), WGS84);

        let first = set.points()[0].unwrap();
        assert_eq!(first.x(), -60.0); // lon
        assert_eq!(first.y(), -2.0); // lat
        assert!(set.points()[2].is_none());
    }

    #[test]
    fn mean_center_ignores_unlocated_records() {
        let dataset = parse_csv("test://csv", CSV.as_bytes()).unwrap();
        let (lat, lon) = mean_center(&dataset).unwrap();
        assert!((lat - -3.0).abs() < 1e-9);
        assert!((lon - -61.0).abs() < 1e-9);
    }

    #[test]
    fn mean_center_of_unlocatable_dataset_is_none() {
        let csv = "\
Latitud,Longitud,Superficie_Deforestada,Tasa_Deforestacion,Tipo_Vegetacion,Altitud,Pendiente,Distancia_Carretera,Precipitacion,Temperatura
,,10,1,Bosque,500,10,2,1800,26
";
        let dataset = parse_csv("test://csv", csv.as_bytes()).unwrap();
        assert!(mean_center(&dataset).is_none());
    }
}
