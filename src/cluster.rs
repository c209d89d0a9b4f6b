//! Unsupervised partitioning of filtered records with seeded k-means.
//!
//! Rows missing any declared feature are dropped before fitting; imputation
//! belongs to the interpolation stage upstream. Features are z-score
//! standardized so degree-scaled coordinates and hectare-scaled areas weigh
//! comparably in the distance; centroids are reported back in original
//! units. Identical rows, features, k and seed reproduce identical labels.
//! Labels are arbitrary within one fit and carry no cross-fit meaning.

use crate::error::ClusteringError;
use crate::types::{Dataset, Field};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use tracing::debug;

pub const DEFAULT_K: usize = 3;
pub const DEFAULT_SEED: u64 = 42;

const MAX_ITERATIONS: usize = 100;

/// Parameters of one clustering run.
#[derive(Debug, Clone)]
pub struct ClusterParams {
    pub features: Vec<Field>,
    pub k: usize,
    pub seed: u64,
}

impl Default for ClusterParams {
    fn default() -> Self {
        Self {
            features: vec![Field::Latitude, Field::Longitude, Field::DeforestedArea],
            k: DEFAULT_K,
            seed: DEFAULT_SEED,
        }
    }
}

/// Result of one fit, valid only for the dataset it was computed from.
#[derive(Debug, Clone)]
pub struct ClusterAssignment {
    labels: Vec<Option<u32>>,
    centroids: Vec<Vec<f64>>,
    features: Vec<Field>,
}

impl ClusterAssignment {
    /// Record-aligned labels; `None` where the record was dropped for a
    /// missing feature value.
    pub fn labels(&self) -> &[Option<u32>] {
        &self.labels
    }

    /// Centroids in original feature units, one per cluster, components
    /// ordered like [`Self::features`].
    pub fn centroids(&self) -> &[Vec<f64>] {
        &self.centroids
    }

    pub fn features(&self) -> &[Field] {
        &self.features
    }

    pub fn k(&self) -> usize {
        self.centroids.len()
    }
}

/// Partitions the dataset into `k` groups over the given feature subset.
pub fn fit(
    dataset: &Dataset,
    features: &[Field],
    k: usize,
    seed: u64,
) -> std::result::Result<ClusterAssignment, ClusteringError> {
    let eligible: Vec<(usize, Vec<f64>)> = dataset
        .records()
        .iter()
        .enumerate()
        .filter_map(|(i, r)| {
            features
                .iter()
                .map(|f| r.numeric(*f))
                .collect::<Option<Vec<f64>>>()
                .map(|v| (i, v))
        })
        .collect();

    if k == 0 || eligible.len() < k {
        return Err(ClusteringError::InsufficientRows {
            needed: k,
            available: eligible.len(),
        });
    }

    let (points, means) = standardize(&eligible, features.len());
    let labels = lloyd(&points, k, seed);

    debug!(
        rows = eligible.len(),
        k,
        seed,
        "k-means converged"
    );

    // Centroids in original units, from the final labels.
    let dims = features.len();
    let mut sums = vec![vec![0.0; dims]; k];
    let mut counts = vec![0usize; k];
    for (label, (_, raw)) in labels.iter().zip(&eligible) {
        counts[*label] += 1;
        for (d, v) in raw.iter().enumerate() {
            sums[*label][d] += v;
        }
    }
    let centroids = sums
        .into_iter()
        .zip(&counts)
        .map(|(sum, &n)| {
            if n == 0 {
                // An empty cluster after reseating cannot happen, but a
                // defined value beats a NaN centroid.
                means.clone()
            } else {
                sum.into_iter().map(|s| s / n as f64).collect()
            }
        })
        .collect();

    let mut record_labels = vec![None; dataset.len()];
    for ((index, _), label) in eligible.iter().zip(&labels) {
        record_labels[*index] = Some(*label as u32);
    }

    Ok(ClusterAssignment {
        labels: record_labels,
        centroids,
        features: features.to_vec(),
    })
}

/// Z-scores each feature over the eligible rows, returning the scored
/// points and the raw-unit feature means. A constant feature gets a zero
/// score everywhere and drops out of the distance.
fn standardize(eligible: &[(usize, Vec<f64>)], dims: usize) -> (Vec<Vec<f64>>, Vec<f64>) {
    let n = eligible.len() as f64;
    let mut means = vec![0.0; dims];
    for (_, v) in eligible {
        for (d, x) in v.iter().enumerate() {
            means[d] += x;
        }
    }
    for m in &mut means {
        *m /= n;
    }

    let mut stds = vec![0.0; dims];
    for (_, v) in eligible {
        for (d, x) in v.iter().enumerate() {
            stds[d] += (x - means[d]).powi(2);
        }
    }
    for s in &mut stds {
        *s = (*s / n).sqrt();
    }

    let points = eligible
        .iter()
        .map(|(_, v)| {
            v.iter()
                .enumerate()
                .map(|(d, x)| {
                    if stds[d] > 0.0 {
                        (x - means[d]) / stds[d]
                    } else {
                        0.0
                    }
                })
                .collect()
        })
        .collect();

    (points, means)
}

/// Lloyd's algorithm with seeded distinct-row initialization.
fn lloyd(points: &[Vec<f64>], k: usize, seed: u64) -> Vec<usize> {
    let mut rng = StdRng::seed_from_u64(seed);
    let init = rand::seq::index::sample(&mut rng, points.len(), k);
    let mut centroids: Vec<Vec<f64>> = init.iter().map(|i| points[i].clone()).collect();

    let mut labels = assign(points, &centroids);

    for _ in 0..MAX_ITERATIONS {
        update_centroids(points, &labels, &mut centroids);
        reseat_empty(points, &labels, &mut centroids);

        let next = assign(points, &centroids);
        if next == labels {
            break;
        }
        labels = next;
    }

    labels
}

fn assign(points: &[Vec<f64>], centroids: &[Vec<f64>]) -> Vec<usize> {
    points.par_iter().map(|p| nearest(p, centroids)).collect()
}

/// Index of the closest centroid; ties go to the lowest cluster id.
fn nearest(point: &[f64], centroids: &[Vec<f64>]) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (c, centroid) in centroids.iter().enumerate() {
        let dist = squared_distance(point, centroid);
        if dist < best_dist {
            best = c;
            best_dist = dist;
        }
    }
    best
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}

fn update_centroids(points: &[Vec<f64>], labels: &[usize], centroids: &mut [Vec<f64>]) {
    let dims = centroids[0].len();
    let mut counts = vec![0usize; centroids.len()];
    let mut sums = vec![vec![0.0; dims]; centroids.len()];

    for (point, &label) in points.iter().zip(labels) {
        counts[label] += 1;
        for (d, v) in point.iter().enumerate() {
            sums[label][d] += v;
        }
    }

    for (c, centroid) in centroids.iter_mut().enumerate() {
        if counts[c] > 0 {
            for d in 0..dims {
                centroid[d] = sums[c][d] / counts[c] as f64;
            }
        }
        // Empty clusters keep their position until reseated.
    }
}

/// Moves each empty cluster onto the point farthest from its assigned
/// centroid. Deterministic: clusters in id order, ties to the lowest row.
fn reseat_empty(points: &[Vec<f64>], labels: &[usize], centroids: &mut [Vec<f64>]) {
    let mut counts = vec![0usize; centroids.len()];
    for &label in labels {
        counts[label] += 1;
    }

    for c in 0..centroids.len() {
        if counts[c] > 0 {
            continue;
        }
        let mut farthest = 0;
        let mut farthest_dist = -1.0;
        for (i, point) in points.iter().enumerate() {
            let dist = squared_distance(point, &centroids[labels[i]]);
            if dist > farthest_dist {
                farthest = i;
                farthest_dist = dist;
            }
        }
        centroids[c] = points[farthest].clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::parse_csv;
    use crate::types::Dataset;

    /// Two tight groups around (0, 100) and (10, 500), plus one row with a
    /// missing feature value.
    fn dataset() -> Dataset {
        let csv = "\
Latitud,Longitud,Superficie_Deforestada,Tasa_Deforestacion,Tipo_Vegetacion,Altitud,Pendiente,Distancia_Carretera,Precipitacion,Temperatura
0.0,0.1,100,1,Bosque,500,5,1,800,26
0.1,0.0,105,1,Bosque,510,5,1,810,26
0.2,0.1,95,1,Bosque,505,5,1,805,26
10.0,10.1,500,2,Selva,900,8,2,2000,25
10.1,10.0,510,2,Selva,905,8,2,2010,25
10.2,10.2,,2,Selva,910,8,2,2005,25
";
        parse_csv("test://csv", csv.as_bytes()).unwrap()
    }

    const FEATURES: [Field; 3] = [Field::Latitude, Field::Longitude, Field::DeforestedArea];

    #[test]
    fn same_seed_reproduces_identical_labels() {
        let d = dataset();
        let a = fit(&d, &FEATURES, 2, 42).unwrap();
        let b = fit(&d, &FEATURES, 2, 42).unwrap();
        assert_eq!(a.labels(), b.labels());
        assert_eq!(a.centroids(), b.centroids());
    }

    #[test]
    fn rows_missing_a_feature_are_dropped_not_imputed() {
        let d = dataset();
        let assignment = fit(&d, &FEATURES, 2, 42).unwrap();
        assert_eq!(assignment.labels().len(), d.len());
        assert_eq!(assignment.labels()[5], None);
        assert_eq!(assignment.labels().iter().flatten().count(), 5);
    }

    #[test]
    fn separated_groups_land_in_separate_clusters() {
        let d = dataset();
        let assignment = fit(&d, &FEATURES, 2, 42).unwrap();
        let labels = assignment.labels();

        // Within-group labels agree, across-group labels differ.
        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[1], labels[2]);
        assert_eq!(labels[3], labels[4]);
        assert_ne!(labels[0], labels[3]);
    }

    #[test]
    fn centroids_come_back_in_original_units() {
        let d = dataset();
        let assignment = fit(&d, &FEATURES, 2, 42).unwrap();
        assert_eq!(assignment.k(), 2);

        // One centroid near area 100, the other near area 500.
        let mut areas: Vec<f64> = assignment.centroids().iter().map(|c| c[2]).collect();
        areas.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert!((areas[0] - 100.0).abs() < 10.0, "got {areas:?}");
        assert!((areas[1] - 505.0).abs() < 10.0, "got {areas:?}");
    }

    #[test]
    fn fewer_eligible_rows_than_k_is_insufficient() {
        let d = dataset();
        // Only 5 rows carry all three features.
        let err = fit(&d, &FEATURES, 6, 42).unwrap_err();
        match err {
            ClusteringError::InsufficientRows { needed, available } => {
                assert_eq!(needed, 6);
                assert_eq!(available, 5);
            }
        }
    }

    #[test]
    fn empty_dataset_is_insufficient() {
        let d = dataset();
        let empty = crate::filter::apply(&d, &{
            let mut s = crate::filter::FilterSpec::new();
            s.insert(Field::Altitude, 9000.0, 9001.0).unwrap();
            s
        });
        assert!(fit(&empty, &FEATURES, DEFAULT_K, DEFAULT_SEED).is_err());
    }
}
