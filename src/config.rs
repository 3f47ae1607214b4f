//! Batch configuration: an optional TOML file layered under CLI overrides

use crate::error::{PipelineError, Result};
use crate::schema::ColumnAliases;
use crate::tiers::TIER_COUNT;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// K-Means settings. The cluster count is fixed by the tier scheme.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClusteringConfig {
    pub clusters: usize,
    pub seed: u64,
    pub max_iters: u64,
    pub tolerance: f64,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            clusters: TIER_COUNT,
            seed: 42,
            max_iters: 300,
            tolerance: 1e-4,
        }
    }
}

/// Shape of the TOML config file. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub input: Option<PathBuf>,
    pub table: Option<String>,
    pub output: Option<PathBuf>,
    pub clustering: ClusteringConfig,
    pub columns: ColumnAliases,
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            PipelineError::InvalidConfig(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Ok(toml::from_str(&content)?)
    }
}

/// Fully resolved configuration for one batch run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub input: PathBuf,
    pub table: Option<String>,
    pub output: PathBuf,
    pub clustering: ClusteringConfig,
    pub columns: ColumnAliases,
}

impl PipelineConfig {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            table: None,
            output: output.into(),
            clustering: ClusteringConfig::default(),
            columns: ColumnAliases::default(),
        }
    }

    /// Build from a config file, requiring both paths to be present in it.
    pub fn from_file(file: ConfigFile) -> Result<Self> {
        let input = file
            .input
            .ok_or_else(|| PipelineError::InvalidConfig("no input path given".into()))?;
        let output = file
            .output
            .ok_or_else(|| PipelineError::InvalidConfig("no output path given".into()))?;
        Ok(Self {
            input,
            table: file.table,
            output,
            clustering: file.clustering,
            columns: file.columns,
        })
    }

    pub fn validate(&self) -> Result<()> {
        let c = &self.clustering;
        if c.clusters != TIER_COUNT {
            return Err(PipelineError::InvalidConfig(format!(
                "cluster count must be {} to match the tier scheme, got {}",
                TIER_COUNT, c.clusters
            )));
        }
        if c.max_iters == 0 {
            return Err(PipelineError::InvalidConfig(
                "max_iters must be at least 1".into(),
            ));
        }
        if !(c.tolerance.is_finite() && c.tolerance > 0.0) {
            return Err(PipelineError::InvalidConfig(format!(
                "tolerance must be a positive number, got {}",
                c.tolerance
            )));
        }
        if self.input == self.output {
            return Err(PipelineError::InvalidConfig(
                "output path must differ from the input path".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_are_valid() {
        let config = PipelineConfig::new("listings.csv", "clustered.csv");
        assert!(config.validate().is_ok());
        assert_eq!(config.clustering.clusters, 3);
        assert_eq!(config.clustering.seed, 42);
    }

    #[test]
    fn test_rejects_other_cluster_counts() {
        let mut config = PipelineConfig::new("listings.csv", "clustered.csv");
        config.clustering.clusters = 4;
        assert!(matches!(
            config.validate(),
            Err(PipelineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_rejects_output_over_input() {
        let config = PipelineConfig::new("listings.csv", "listings.csv");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_config_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
input = "data/listings.csv"
output = "data/clustered.parquet"

[clustering]
seed = 7

[columns]
capacity = ["guests"]
"#
        )
        .unwrap();

        let parsed = ConfigFile::load(file.path()).unwrap();
        let config = PipelineConfig::from_file(parsed).unwrap();
        assert_eq!(config.input, PathBuf::from("data/listings.csv"));
        assert_eq!(config.clustering.seed, 7);
        assert_eq!(config.clustering.max_iters, 300);
        assert_eq!(config.columns.capacity, vec!["guests".to_string()]);
        assert_eq!(config.table, None);
    }

    #[test]
    fn test_missing_paths_are_reported() {
        let result = PipelineConfig::from_file(ConfigFile::default());
        assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn test_unknown_keys_fail() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "inptu = \"typo.csv\"").unwrap();
        assert!(matches!(
            ConfigFile::load(file.path()),
            Err(PipelineError::Toml(_))
        ));
    }
}
