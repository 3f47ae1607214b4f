//! Joining cluster results onto the cleaned listings and persisting them

use crate::error::{PipelineError, Result};
use crate::schema::{CLUSTER_ID, ROW_ID, TIER};
use crate::tiers::ClusterAssignment;
use polars::prelude::*;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::info;

/// On-disk format of a table artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Csv,
    Parquet,
}

impl TableFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("csv") => Ok(TableFormat::Csv),
            Some("parquet") => Ok(TableFormat::Parquet),
            _ => Err(PipelineError::UnsupportedFormat(path.to_path_buf())),
        }
    }
}

/// Left-join cluster assignments onto `cleaned` by row identity.
///
/// Every cleaned row is kept in its original order. Rows without an assignment
/// get null `cluster_id` and `tier`. The row-identity column is removed.
pub fn merge_assignments(cleaned: DataFrame, assignments: &[ClusterAssignment]) -> Result<DataFrame> {
    let by_row: HashMap<IdxSize, &ClusterAssignment> =
        assignments.iter().map(|a| (a.row_id, a)).collect();

    let row_ids = cleaned.column(ROW_ID)?.as_materialized_series().idx()?;
    let mut cluster_ids: Vec<Option<i32>> = Vec::with_capacity(cleaned.height());
    let mut tiers: Vec<Option<&'static str>> = Vec::with_capacity(cleaned.height());
    for row_id in row_ids.into_iter() {
        match row_id.and_then(|id| by_row.get(&id)) {
            Some(a) => {
                cluster_ids.push(Some(a.cluster_id as i32));
                tiers.push(Some(a.tier.as_str()));
            }
            None => {
                cluster_ids.push(None);
                tiers.push(None);
            }
        }
    }

    let mut enriched = cleaned.drop(ROW_ID)?;
    enriched.with_column(Series::new(CLUSTER_ID.into(), cluster_ids))?;
    enriched.with_column(Series::new(TIER.into(), tiers))?;
    Ok(enriched)
}

/// Write `df` to `path`, replacing any existing file only once the full
/// table has been written.
pub fn write_table(df: &mut DataFrame, path: &Path) -> Result<()> {
    let format = TableFormat::from_path(path)?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(|source| PipelineError::Write {
        path: path.to_path_buf(),
        source,
    })?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(|source| PipelineError::Write {
        path: path.to_path_buf(),
        source,
    })?;

    match format {
        TableFormat::Csv => CsvWriter::new(tmp.as_file_mut())
            .include_header(true)
            .finish(df),
        TableFormat::Parquet => ParquetWriter::new(tmp.as_file_mut()).finish(df).map(|_| ()),
    }
    .map_err(|e| PipelineError::write(path, e))?;

    tmp.as_file()
        .sync_all()
        .map_err(|source| PipelineError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    tmp.persist(path).map_err(|e| PipelineError::Write {
        path: path.to_path_buf(),
        source: e.error,
    })?;

    info!(path = %path.display(), rows = df.height(), "wrote enriched listings");
    Ok(())
}
