//! Batch entry point wiring the pipeline stages together

use crate::clean::{clean_listings, CleaningReport};
use crate::config::{ClusteringConfig, PipelineConfig};
use crate::data::load_listings;
use crate::error::Result;
use crate::features::{select_features, FeatureMatrix};
use crate::model::fit_kmeans;
use crate::output::{merge_assignments, write_table};
use crate::tiers::{Segmentation, TierProfile};
use polars::prelude::*;
use std::time::Instant;
use tracing::{info, info_span};

/// Points used for the diagnostic silhouette score.
const SILHOUETTE_SAMPLE: usize = 1_000;

/// Enriched listings plus the fitted segmentation that produced them
#[derive(Debug)]
pub struct Segmented {
    pub listings: DataFrame,
    pub features: FeatureMatrix,
    pub segmentation: Segmentation,
}

/// Outcome of one batch run
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub cleaning: CleaningReport,
    /// Listings that received a tier
    pub clustered: usize,
    /// Cleaned listings skipped for missing features
    pub unclustered: usize,
    pub inertia: f64,
    pub silhouette: f64,
    pub tiers: Vec<TierProfile>,
    pub segmentation: Segmentation,
}

/// Select features, cluster, name tiers and join them onto `cleaned`.
pub fn segment(cleaned: DataFrame, config: &ClusteringConfig) -> Result<Segmented> {
    let features = select_features(&cleaned)?;
    let model = fit_kmeans(&features, config)?;
    let segmentation = Segmentation::new(&features, model)?;
    let assignments = segmentation.assignments(&features.row_ids)?;
    let listings = merge_assignments(cleaned, &assignments)?;

    Ok(Segmented {
        listings,
        features,
        segmentation,
    })
}

/// Run the whole batch: load, clean, segment, write.
///
/// Nothing is written unless every stage succeeds.
pub fn run(config: &PipelineConfig) -> Result<PipelineReport> {
    let _span = info_span!("pipeline", input = %config.input.display()).entered();
    let started = Instant::now();
    config.validate()?;

    let raw = load_listings(&config.input, config.table.as_deref(), &config.columns)?;
    let (cleaned, cleaning) = clean_listings(raw)?;

    let Segmented {
        mut listings,
        features,
        segmentation,
    } = segment(cleaned, &config.clustering)?;

    write_table(&mut listings, &config.output)?;

    let model = &segmentation.model;
    let report = PipelineReport {
        cleaning,
        clustered: features.len(),
        unclustered: cleaning.after_link_filter - features.len(),
        inertia: model.inertia,
        silhouette: model.compute_silhouette_sample(&features.scaled, SILHOUETTE_SAMPLE),
        tiers: segmentation.profiles(),
        segmentation,
    };

    info!(
        clustered = report.clustered,
        unclustered = report.unclustered,
        elapsed_secs = started.elapsed().as_secs_f64(),
        "pipeline complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{CLUSTER_ID, ROW_ID, TIER};

    fn cleaned() -> DataFrame {
        df!(
            ROW_ID => [0u32, 1, 2, 3, 4, 5, 6, 7, 8, 9],
            "price" => [60.0, 70.0, 65.0, 210.0, 230.0, 220.0, 480.0, 450.0, 470.0, 300.0],
            "rating" => [4.1, 4.0, 4.2, 4.6, 4.5, 4.7, 4.9, 4.8, 5.0, 4.4],
            "capacity" => [Some(2.0), Some(2.0), Some(1.0), Some(4.0), Some(4.0), Some(3.0), Some(8.0), Some(7.0), Some(8.0), None]
        )
        .unwrap()
    }

    #[test]
    fn test_segment_keeps_unclustered_rows() {
        let segmented = segment(cleaned(), &ClusteringConfig::default()).unwrap();
        assert_eq!(segmented.listings.height(), 10);
        assert_eq!(segmented.features.len(), 9);

        let tiers = segmented.listings.column(TIER).unwrap();
        assert_eq!(tiers.null_count(), 1);
        assert_eq!(segmented.listings.column(CLUSTER_ID).unwrap().null_count(), 1);

        let last_tier = tiers.as_materialized_series().str().unwrap().get(9);
        assert_eq!(last_tier, None);
        let last_price = segmented
            .listings
            .column("price")
            .unwrap()
            .as_materialized_series()
            .f64()
            .unwrap()
            .get(9);
        assert_eq!(last_price, Some(300.0));
    }

    #[test]
    fn test_segment_is_deterministic() {
        let config = ClusteringConfig::default();
        let first = segment(cleaned(), &config).unwrap();
        let second = segment(cleaned(), &config).unwrap();
        assert!(first.listings.equals_missing(&second.listings));
    }
}
