//! K-Means clustering model implementation

use crate::config::ClusteringConfig;
use crate::error::{PipelineError, Result};
use crate::features::FeatureMatrix;
use linfa::prelude::*;
use linfa_clustering::KMeans;
use linfa_nn::distance::L2Dist;
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, warn};

/// Fitted K-Means model over the scaled feature space
#[derive(Debug, Clone)]
pub struct KMeansModel {
    /// Number of clusters
    pub n_clusters: usize,
    /// Cluster assignment for each feature row
    pub labels: Array1<usize>,
    /// Cluster centroids in scaled space, recomputed as member means
    pub centroids: Array2<f64>,
    /// Within-cluster sum of squares (inertia)
    pub inertia: f64,
}

impl KMeansModel {
    /// Nearest centroid for a scaled feature vector
    pub fn predict(&self, features: &Array1<f64>) -> Result<usize> {
        if features.len() != self.centroids.ncols() {
            return Err(PipelineError::Clustering(format!(
                "feature vector must have exactly {} dimensions",
                self.centroids.ncols()
            )));
        }

        let mut min_distance = f64::INFINITY;
        let mut closest_cluster = 0;

        for (cluster_idx, centroid) in self.centroids.outer_iter().enumerate() {
            let distance = euclidean_distance(&features.view(), &centroid);
            if distance < min_distance {
                min_distance = distance;
                closest_cluster = cluster_idx;
            }
        }

        Ok(closest_cluster)
    }

    /// Get cluster sizes
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.n_clusters];
        for &label in self.labels.iter() {
            if label < self.n_clusters {
                sizes[label] += 1;
            }
        }
        sizes
    }

    /// Compute basic silhouette coefficient for a subset of points (for efficiency)
    pub fn compute_silhouette_sample(&self, features: &Array2<f64>, sample_size: usize) -> f64 {
        let n_samples = features.nrows().min(sample_size);
        if n_samples < 2 {
            return 0.0;
        }

        let mut silhouette_sum = 0.0;

        for i in 0..n_samples {
            let point = features.row(i);
            let cluster_label = self.labels[i];

            let mut same_cluster_distances = Vec::new();
            let mut other_cluster_distances: Vec<Vec<f64>> = vec![Vec::new(); self.n_clusters];

            for j in 0..n_samples {
                if i == j {
                    continue;
                }

                let distance = euclidean_distance(&point, &features.row(j));
                let other_label = self.labels[j];

                if other_label == cluster_label {
                    same_cluster_distances.push(distance);
                } else if other_label < self.n_clusters {
                    other_cluster_distances[other_label].push(distance);
                }
            }

            let a_i = if same_cluster_distances.is_empty() {
                0.0
            } else {
                same_cluster_distances.iter().sum::<f64>() / same_cluster_distances.len() as f64
            };

            let b_i = other_cluster_distances
                .iter()
                .filter(|distances| !distances.is_empty())
                .map(|distances| distances.iter().sum::<f64>() / distances.len() as f64)
                .fold(f64::INFINITY, f64::min);

            let silhouette_i = if b_i.is_infinite() || (a_i == 0.0 && b_i == 0.0) {
                0.0
            } else {
                (b_i - a_i) / a_i.max(b_i)
            };

            silhouette_sum += silhouette_i;
        }

        silhouette_sum / n_samples as f64
    }
}

/// Fit K-Means on the scaled clustering population
///
/// # Arguments
/// * `features` - Selected and standardized listing features
/// * `config` - Cluster count, seed, iteration bound and tolerance
///
/// # Returns
/// * Fitted `KMeansModel`; identical input and seed give identical labels
pub fn fit_kmeans(features: &FeatureMatrix, config: &ClusteringConfig) -> Result<KMeansModel> {
    let n_clusters = config.clusters;
    let n_samples = features.len();

    if n_samples < n_clusters {
        return Err(PipelineError::InsufficientData {
            rows: n_samples,
            clusters: n_clusters,
        });
    }

    let targets: Array1<usize> = Array1::zeros(n_samples);
    let dataset = Dataset::new(features.scaled.clone(), targets);

    let rng = StdRng::seed_from_u64(config.seed);
    let model = KMeans::params_with(n_clusters, rng, L2Dist)
        .max_n_iterations(config.max_iters)
        .tolerance(config.tolerance)
        .fit(&dataset)
        .map_err(|e| PipelineError::Clustering(e.to_string()))?;

    let labels: Array1<usize> = model.predict(dataset.records());
    let centroids = member_centroids(&features.scaled, &labels, model.centroids());
    let inertia = compute_inertia(&features.scaled, &labels, &centroids);
    debug!(n_clusters, inertia, "fitted k-means");

    Ok(KMeansModel {
        n_clusters,
        labels,
        centroids,
        inertia,
    })
}

/// Mean of each cluster's members; an empty cluster keeps its fitted centroid.
fn member_centroids(
    features: &Array2<f64>,
    labels: &Array1<usize>,
    fitted: &Array2<f64>,
) -> Array2<f64> {
    let mut sums = Array2::<f64>::zeros(fitted.raw_dim());
    let mut counts = vec![0usize; fitted.nrows()];

    for (point, &label) in features.outer_iter().zip(labels.iter()) {
        let mut row = sums.row_mut(label);
        row += &point;
        counts[label] += 1;
    }

    let mut centroids = fitted.clone();
    for (cluster, (mut centroid, sum)) in centroids
        .axis_iter_mut(Axis(0))
        .zip(sums.outer_iter())
        .enumerate()
    {
        if counts[cluster] == 0 {
            warn!(cluster, "cluster has no members; keeping fitted centroid");
            continue;
        }
        centroid.assign(&(&sum / counts[cluster] as f64));
    }
    centroids
}

/// Compute within-cluster sum of squares (inertia)
fn compute_inertia(features: &Array2<f64>, labels: &Array1<usize>, centroids: &Array2<f64>) -> f64 {
    let mut inertia = 0.0;

    for (i, &cluster) in labels.iter().enumerate() {
        if cluster < centroids.nrows() {
            let point = features.row(i);
            let centroid = centroids.row(cluster);
            let distance_sq = point
                .iter()
                .zip(centroid.iter())
                .map(|(a, b)| (a - b).powi(2))
                .sum::<f64>();
            inertia += distance_sq;
        }
    }

    inertia
}

/// Calculate Euclidean distance between two points
fn euclidean_distance(point1: &ArrayView1<f64>, point2: &ArrayView1<f64>) -> f64 {
    point1
        .iter()
        .zip(point2.iter())
        .map(|(a, b)| (a - b).powi(2))
        .sum::<f64>()
        .sqrt()
}
