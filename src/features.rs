//! Feature selection and standardization for clustering

use crate::error::{PipelineError, Result};
use crate::schema::{Field, ROW_ID};
use crate::tiers::TIER_COUNT;
use linfa::prelude::*;
use linfa_preprocessing::linear_scaling::LinearScaler;
use ndarray::{Array1, Array2, ArrayView1, Axis};
use polars::prelude::*;
use tracing::{info, warn};

/// Number of clustering features: price, rating, capacity.
pub const N_FEATURES: usize = Field::FEATURES.len();

/// Per-feature standardization fitted on the clustering population.
///
/// Wraps linfa's standard `LinearScaler` (population standard deviation). A
/// constant feature is fitted as if it were all zeros, so it keeps offset 0
/// and scale 1 and passes through unscaled.
#[derive(Debug, Clone)]
pub struct FeatureScaler {
    inner: LinearScaler<f64>,
    degenerate: Vec<usize>,
}

impl FeatureScaler {
    pub fn fit(records: &Array2<f64>) -> Result<Self> {
        let means = records
            .mean_axis(Axis(0))
            .ok_or(PipelineError::InsufficientData {
                rows: 0,
                clusters: TIER_COUNT,
            })?;
        let stds = records.std_axis(Axis(0), 0.0);

        let degenerate: Vec<usize> = (0..records.ncols())
            .filter(|&j| stds[j] <= f64::EPSILON * means[j].abs().max(1.0))
            .collect();

        let mut fit_records = records.clone();
        for &j in &degenerate {
            fit_records.column_mut(j).fill(0.0);
        }

        let dataset = Dataset::new(fit_records, Array1::<f64>::zeros(records.nrows()));
        let inner = LinearScaler::standard()
            .fit(&dataset)
            .map_err(|e| PipelineError::Scaling(e.to_string()))?;

        Ok(Self { inner, degenerate })
    }

    pub fn transform(&self, records: &Array2<f64>) -> Array2<f64> {
        self.inner.transform(records.to_owned())
    }

    pub fn transform_row(&self, row: ArrayView1<f64>) -> Array1<f64> {
        (&row - self.inner.offsets()) * self.inner.scales()
    }

    pub fn inverse_transform(&self, records: &Array2<f64>) -> Array2<f64> {
        records / self.inner.scales() + self.inner.offsets()
    }

    pub fn offsets(&self) -> &Array1<f64> {
        self.inner.offsets()
    }

    pub fn scales(&self) -> &Array1<f64> {
        self.inner.scales()
    }

    /// Indices of features that were left unscaled.
    pub fn degenerate_features(&self) -> &[usize] {
        &self.degenerate
    }
}

/// Clustering population extracted from the cleaned listings
#[derive(Debug, Clone)]
pub struct FeatureMatrix {
    /// Row identity of each feature row
    pub row_ids: Vec<IdxSize>,
    /// Unscaled (price, rating, capacity)
    pub raw: Array2<f64>,
    /// Standardized features
    pub scaled: Array2<f64>,
    pub scaler: FeatureScaler,
}

impl FeatureMatrix {
    pub fn len(&self) -> usize {
        self.row_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.row_ids.is_empty()
    }

    /// Scale an unseen (price, rating, capacity) triple with the fitted scaler.
    pub fn scale_new(&self, values: &[f64; N_FEATURES]) -> Array1<f64> {
        self.scaler.transform_row(ArrayView1::from(&values[..]))
    }
}

/// Select the clustering features and standardize them.
///
/// Rows with any missing feature are skipped; they stay in the listing table
/// and simply never receive a cluster.
pub fn select_features(df: &DataFrame) -> Result<FeatureMatrix> {
    let row_ids: Vec<Option<IdxSize>> = df
        .column(ROW_ID)?
        .as_materialized_series()
        .idx()?
        .into_iter()
        .collect();

    let mut columns = Vec::with_capacity(N_FEATURES);
    for field in Field::FEATURES {
        let values: Vec<Option<f64>> = df
            .column(field.name())?
            .as_materialized_series()
            .cast(&DataType::Float64)?
            .f64()?
            .into_iter()
            .collect();
        columns.push(values);
    }

    let mut kept_ids = Vec::with_capacity(df.height());
    let mut raw_data = Vec::with_capacity(df.height() * N_FEATURES);
    for (i, row_id) in row_ids.iter().enumerate() {
        let row: Option<Vec<f64>> = columns
            .iter()
            .map(|c| c[i].filter(|v| v.is_finite()))
            .collect();
        if let (Some(row_id), Some(row)) = (row_id, row) {
            kept_ids.push(*row_id);
            raw_data.extend_from_slice(&row);
        }
    }

    let raw = Array2::from_shape_vec((kept_ids.len(), N_FEATURES), raw_data)
        .map_err(|e| PipelineError::Schema(format!("feature matrix shape: {}", e)))?;

    let scaler = FeatureScaler::fit(&raw)?;
    for &j in scaler.degenerate_features() {
        let err = PipelineError::DegenerateFeature {
            feature: Field::FEATURES[j].name(),
            value: raw[[0, j]],
        };
        warn!(error = %err, "leaving feature unscaled");
    }
    let scaled = scaler.transform(&raw);

    info!(
        clustered = kept_ids.len(),
        skipped = df.height() - kept_ids.len(),
        "selected clustering features"
    );

    Ok(FeatureMatrix {
        row_ids: kept_ids,
        raw,
        scaled,
        scaler,
    })
}
