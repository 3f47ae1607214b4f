//! Command-line interface definitions and argument parsing

use crate::analysis::MIN_REVIEWS;
use crate::config::{ConfigFile, PipelineConfig};
use crate::consumer::ListingFilter;
use crate::tiers::Tier;
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

/// Listing segmentation CLI: clean rental listings and group them into price tiers
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Clean, cluster and write the enriched listings table
    Run(RunArgs),
    /// Filter an enriched listings table and summarize its tiers
    Inspect(InspectArgs),
    /// Print neighborhood price and community-score tables
    Analyze(AnalyzeArgs),
}

#[derive(ClapArgs, Debug, Clone, Default)]
pub struct RunArgs {
    /// TOML config file; flags given here override its values
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Listings table (.csv/.parquet) or a directory of tables
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Table to read when the input holds several tables
    #[arg(short, long)]
    pub table: Option<String>,

    /// Destination for the enriched table (.csv/.parquet)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Random seed for centroid initialisation
    #[arg(long)]
    pub seed: Option<u64>,

    /// Maximum iterations for K-Means
    #[arg(long)]
    pub max_iters: Option<u64>,

    /// Tolerance for K-Means convergence
    #[arg(long)]
    pub tolerance: Option<f64>,

    /// Classify a hypothetical listing: "price,rating,capacity"
    /// Example: --predict "150,4.8,2"
    #[arg(short, long)]
    pub predict: Option<String>,
}

impl RunArgs {
    /// Merge the optional config file with the flags given on the command line.
    pub fn resolve_config(&self) -> crate::Result<PipelineConfig> {
        let mut file = match &self.config {
            Some(path) => ConfigFile::load(path)?,
            None => ConfigFile::default(),
        };

        if let Some(input) = &self.input {
            file.input = Some(input.clone());
        }
        if let Some(output) = &self.output {
            file.output = Some(output.clone());
        }
        if let Some(table) = &self.table {
            file.table = Some(table.clone());
        }
        if let Some(seed) = self.seed {
            file.clustering.seed = seed;
        }
        if let Some(max_iters) = self.max_iters {
            file.clustering.max_iters = max_iters;
        }
        if let Some(tolerance) = self.tolerance {
            file.clustering.tolerance = tolerance;
        }

        PipelineConfig::from_file(file)
    }

    /// Parse listing values from the predict string
    /// Expected format: "price,rating,capacity"
    pub fn parse_listing_values(&self) -> anyhow::Result<Option<[f64; 3]>> {
        let Some(ref predict_str) = self.predict else {
            return Ok(None);
        };

        let parts: Vec<&str> = predict_str.split(',').collect();
        if parts.len() != 3 {
            anyhow::bail!("Predict values must be in format 'price,rating,capacity'");
        }

        let mut values = [0.0; 3];
        for ((value, part), name) in values.iter_mut().zip(&parts).zip(["price", "rating", "capacity"]) {
            *value = part
                .trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid {} value: {}", name, part))?;
        }

        Ok(Some(values))
    }
}

#[derive(ClapArgs, Debug, Clone)]
pub struct InspectArgs {
    /// Enriched listings table written by `run`
    #[arg(short, long)]
    pub input: PathBuf,

    /// Keep only this tier (economy, mid-range, premium)
    #[arg(long)]
    pub tier: Option<Tier>,

    /// Keep only this room type
    #[arg(long)]
    pub room_type: Option<String>,

    /// Keep only this neighborhood
    #[arg(long)]
    pub neighborhood: Option<String>,

    /// Lowest price to keep (inclusive)
    #[arg(long, default_value = "0")]
    pub min_price: f64,

    /// Highest price to keep (inclusive)
    #[arg(long, default_value = "10000")]
    pub max_price: f64,

    /// Keep listings without latitude/longitude
    #[arg(long)]
    pub keep_missing_coordinates: bool,
}

impl InspectArgs {
    pub fn filter(&self) -> anyhow::Result<ListingFilter> {
        if self.min_price > self.max_price {
            anyhow::bail!(
                "min-price {} is above max-price {}",
                self.min_price,
                self.max_price
            );
        }
        Ok(ListingFilter {
            tier: self.tier,
            room_type: self.room_type.clone(),
            neighborhood: self.neighborhood.clone(),
            price_range: Some((self.min_price, self.max_price)),
            require_coordinates: !self.keep_missing_coordinates,
        })
    }
}

#[derive(ClapArgs, Debug, Clone)]
pub struct AnalyzeArgs {
    /// Enriched listings table written by `run`
    #[arg(short, long)]
    pub input: PathBuf,

    /// Minimum reviews for a listing to count towards its community score
    #[arg(long, default_value_t = MIN_REVIEWS)]
    pub min_reviews: f64,

    /// Skip the community-score table
    #[arg(long)]
    pub prices_only: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_listing_values() {
        let mut args = RunArgs {
            predict: Some("150,4.8,2".to_string()),
            ..Default::default()
        };

        let result = args.parse_listing_values().unwrap();
        assert_eq!(result, Some([150.0, 4.8, 2.0]));

        args.predict = None;
        assert_eq!(args.parse_listing_values().unwrap(), None);

        args.predict = Some("invalid".to_string());
        assert!(args.parse_listing_values().is_err());

        args.predict = Some("150,great,2".to_string());
        assert!(args.parse_listing_values().is_err());
    }

    #[test]
    fn test_flags_override_config_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "input = \"a.csv\"\noutput = \"b.csv\"\n[clustering]\nseed = 1").unwrap();

        let args = RunArgs {
            config: Some(file.path().to_path_buf()),
            output: Some(PathBuf::from("c.parquet")),
            seed: Some(9),
            ..Default::default()
        };
        let config = args.resolve_config().unwrap();
        assert_eq!(config.input, PathBuf::from("a.csv"));
        assert_eq!(config.output, PathBuf::from("c.parquet"));
        assert_eq!(config.clustering.seed, 9);
    }

    #[test]
    fn test_parse_subcommands() {
        let args = Args::parse_from([
            "listing-tiers",
            "inspect",
            "--input",
            "out.csv",
            "--tier",
            "premium",
            "--max-price",
            "500",
        ]);
        match args.command {
            Command::Inspect(inspect) => {
                let filter = inspect.filter().unwrap();
                assert_eq!(filter.tier, Some(Tier::Premium));
                assert_eq!(filter.price_range, Some((0.0, 500.0)));
                assert!(filter.require_coordinates);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_analyze_defaults() {
        let args = Args::parse_from(["listing-tiers", "analyze", "-i", "out.parquet"]);
        match args.command {
            Command::Analyze(analyze) => {
                assert_eq!(analyze.input, PathBuf::from("out.parquet"));
                assert_eq!(analyze.min_reviews, MIN_REVIEWS);
                assert!(!analyze.prices_only);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
