//! Price-ordered tier names for clusters

use crate::error::{PipelineError, Result};
use crate::features::{FeatureMatrix, FeatureScaler, N_FEATURES};
use crate::model::KMeansModel;
use ndarray::{Array2, ArrayView1};
use polars::prelude::IdxSize;
use std::fmt;
use std::str::FromStr;

/// Number of tiers, and therefore of clusters.
pub const TIER_COUNT: usize = 3;

/// Semantic listing tier, ordered from cheapest to most expensive
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tier {
    Economy,
    MidRange,
    Premium,
}

impl Tier {
    /// All tiers in ascending price order.
    pub const ALL: [Tier; TIER_COUNT] = [Tier::Economy, Tier::MidRange, Tier::Premium];

    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Economy => "economy",
            Tier::MidRange => "mid-range",
            Tier::Premium => "premium",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        Tier::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                PipelineError::InvalidConfig(format!(
                    "unknown tier '{}', expected economy, mid-range or premium",
                    s
                ))
            })
    }
}

/// Cluster id → tier mapping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierMap {
    by_cluster: [Tier; TIER_COUNT],
}

impl TierMap {
    pub fn tier(&self, cluster: usize) -> Option<Tier> {
        self.by_cluster.get(cluster).copied()
    }

    /// Like [`TierMap::tier`], but an unknown cluster id is an error.
    pub fn require(&self, cluster: usize) -> Result<Tier> {
        self.tier(cluster)
            .ok_or_else(|| PipelineError::Clustering(format!("cluster {} has no tier", cluster)))
    }

    pub fn cluster(&self, tier: Tier) -> Option<usize> {
        self.by_cluster.iter().position(|t| *t == tier)
    }
}

/// Rank clusters by their unscaled price centroid and name them.
///
/// `centroids` must be in original units with price in column 0. Ties keep
/// cluster-id order.
pub fn assign_tiers(centroids: &Array2<f64>) -> Result<TierMap> {
    if centroids.nrows() != TIER_COUNT {
        return Err(PipelineError::Clustering(format!(
            "expected {} centroids to name, got {}",
            TIER_COUNT,
            centroids.nrows()
        )));
    }

    let mut order: Vec<usize> = (0..centroids.nrows()).collect();
    order.sort_by(|&a, &b| centroids[[a, 0]].total_cmp(&centroids[[b, 0]]));

    let mut by_cluster = Tier::ALL;
    for (tier, cluster) in Tier::ALL.into_iter().zip(order) {
        by_cluster[cluster] = tier;
    }
    Ok(TierMap { by_cluster })
}

/// Cluster result for one listing, keyed by row identity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClusterAssignment {
    pub row_id: IdxSize,
    pub cluster_id: usize,
    pub tier: Tier,
}

/// Summary of one tier in original units
#[derive(Debug, Clone, PartialEq)]
pub struct TierProfile {
    pub tier: Tier,
    pub cluster_id: usize,
    pub size: usize,
    pub price: f64,
    pub rating: f64,
    pub capacity: f64,
}

/// Fitted segmentation: scaler, clusters and tier names together
#[derive(Debug, Clone)]
pub struct Segmentation {
    pub scaler: FeatureScaler,
    pub model: KMeansModel,
    pub tiers: TierMap,
    /// Centroids mapped back to original units
    pub centroids: Array2<f64>,
}

impl Segmentation {
    pub fn new(features: &FeatureMatrix, model: KMeansModel) -> Result<Self> {
        let centroids = features.scaler.inverse_transform(&model.centroids);
        let tiers = assign_tiers(&centroids)?;
        Ok(Self {
            scaler: features.scaler.clone(),
            model,
            tiers,
            centroids,
        })
    }

    /// Tier of each feature row, in feature-matrix order.
    pub fn row_tiers(&self) -> Result<Vec<(usize, Tier)>> {
        self.model
            .labels
            .iter()
            .map(|&cluster| Ok((cluster, self.tiers.require(cluster)?)))
            .collect()
    }

    /// Pair every feature row's identity with its cluster and tier.
    pub fn assignments(&self, row_ids: &[IdxSize]) -> Result<Vec<ClusterAssignment>> {
        Ok(row_ids
            .iter()
            .zip(self.row_tiers()?)
            .map(|(&row_id, (cluster_id, tier))| ClusterAssignment {
                row_id,
                cluster_id,
                tier,
            })
            .collect())
    }

    /// Tier for an unseen (price, rating, capacity) listing.
    pub fn predict_tier(&self, values: &[f64; N_FEATURES]) -> Result<Tier> {
        let scaled = self.scaler.transform_row(ArrayView1::from(&values[..]));
        let cluster = self.model.predict(&scaled)?;
        self.tiers.require(cluster)
    }

    /// Per-tier profiles in ascending tier order.
    pub fn profiles(&self) -> Vec<TierProfile> {
        let sizes = self.model.cluster_sizes();
        Tier::ALL
            .into_iter()
            .filter_map(|tier| {
                let cluster = self.tiers.cluster(tier)?;
                let centroid = self.centroids.row(cluster);
                Some(TierProfile {
                    tier,
                    cluster_id: cluster,
                    size: sizes.get(cluster).copied().unwrap_or(0),
                    price: centroid[0],
                    rating: centroid[1],
                    capacity: centroid[2],
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClusteringConfig;
    use crate::model::fit_kmeans;
    use ndarray::array;

    #[test]
    fn test_centroids_ranked_by_price() {
        let centroids = array![[450.0, 4.9, 6.0], [80.0, 4.2, 2.0], [220.0, 4.6, 3.0]];
        let tiers = assign_tiers(&centroids).unwrap();

        assert_eq!(tiers.tier(1), Some(Tier::Economy));
        assert_eq!(tiers.tier(2), Some(Tier::MidRange));
        assert_eq!(tiers.tier(0), Some(Tier::Premium));
        assert_eq!(tiers.cluster(Tier::Premium), Some(0));
    }

    #[test]
    fn test_price_ties_keep_cluster_order() {
        let centroids = array![[100.0, 4.0, 2.0], [100.0, 4.5, 3.0], [50.0, 3.0, 1.0]];
        let tiers = assign_tiers(&centroids).unwrap();
        assert_eq!(tiers.tier(2), Some(Tier::Economy));
        assert_eq!(tiers.tier(0), Some(Tier::MidRange));
        assert_eq!(tiers.tier(1), Some(Tier::Premium));
    }

    #[test]
    fn test_unknown_cluster_is_an_error() {
        let centroids = array![[450.0, 4.9, 6.0], [80.0, 4.2, 2.0], [220.0, 4.6, 3.0]];
        let tiers = assign_tiers(&centroids).unwrap();
        assert_eq!(tiers.require(2).unwrap(), Tier::MidRange);
        assert_eq!(tiers.tier(3), None);
        assert!(matches!(tiers.require(3), Err(PipelineError::Clustering(_))));
    }

    #[test]
    fn test_wrong_centroid_count() {
        let centroids = array![[100.0, 4.0, 2.0], [200.0, 4.5, 3.0]];
        assert!(assign_tiers(&centroids).is_err());
    }

    #[test]
    fn test_tier_names_parse() {
        assert_eq!("economy".parse::<Tier>().unwrap(), Tier::Economy);
        assert_eq!("Mid-Range".parse::<Tier>().unwrap(), Tier::MidRange);
        assert_eq!(Tier::Premium.to_string(), "premium");
        assert!("luxury".parse::<Tier>().is_err());
    }

    #[test]
    fn test_segmentation_profiles_and_prediction() {
        let raw = array![
            [60.0, 4.1, 2.0],
            [70.0, 4.0, 2.0],
            [65.0, 4.2, 1.0],
            [210.0, 4.6, 4.0],
            [230.0, 4.5, 4.0],
            [220.0, 4.7, 3.0],
            [480.0, 4.9, 8.0],
            [450.0, 4.8, 7.0],
            [470.0, 5.0, 8.0],
        ];
        let scaler = FeatureScaler::fit(&raw).unwrap();
        let features = FeatureMatrix {
            row_ids: (0..9).collect(),
            scaled: scaler.transform(&raw),
            raw,
            scaler,
        };
        let model = fit_kmeans(&features, &ClusteringConfig::default()).unwrap();
        let segmentation = Segmentation::new(&features, model).unwrap();

        let profiles = segmentation.profiles();
        let prices: Vec<f64> = profiles.iter().map(|p| p.price).collect();
        assert!((prices[0] - 65.0).abs() < 1e-6);
        assert!((prices[1] - 220.0).abs() < 1e-6);
        assert!((prices[2] - 466.666_666_7).abs() < 1e-6);
        assert!(profiles.iter().all(|p| p.size == 3));

        assert_eq!(segmentation.predict_tier(&[75.0, 4.0, 2.0]).unwrap(), Tier::Economy);
        assert_eq!(segmentation.predict_tier(&[500.0, 5.0, 8.0]).unwrap(), Tier::Premium);

        let assignments = segmentation.assignments(&features.row_ids).unwrap();
        assert_eq!(assignments.len(), 9);
        assert_eq!(assignments[4].row_id, 4);
        let tiers: Vec<Tier> = assignments.iter().map(|a| a.tier).collect();
        assert_eq!(&tiers[..3], &[Tier::Economy; 3]);
        assert_eq!(&tiers[3..6], &[Tier::MidRange; 3]);
        assert_eq!(&tiers[6..], &[Tier::Premium; 3]);
    }
}
