//! listing-tiers: a batch pipeline that segments rental listings into price tiers
//!
//! Raw listings are loaded with Polars, cleaned of priceless and link-spam rows,
//! reduced to standardized (price, rating, capacity) features, clustered with
//! K-Means and labelled economy / mid-range / premium by ascending price.

pub mod analysis;
pub mod clean;
pub mod cli;
pub mod config;
pub mod consumer;
pub mod data;
pub mod error;
pub mod features;
pub mod logging;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod schema;
pub mod tiers;

// Re-export public items for easier access
pub use config::{ClusteringConfig, PipelineConfig};
pub use error::{PipelineError, Result};
pub use model::{fit_kmeans, KMeansModel};
pub use pipeline::{run, segment, PipelineReport};
pub use tiers::{Segmentation, Tier};
