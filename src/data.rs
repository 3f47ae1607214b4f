//! Listing table loading using Polars
//!
//! The loader is the only place that knows about source spellings: headers are
//! trimmed, aliases are resolved to canonical names once, numeric fields are
//! coerced to `Float64`, and every row is tagged with its ingestion index.

use crate::clean::hyperlinked_rows;
use crate::error::{PipelineError, Result};
use crate::schema::{ColumnAliases, Field, LINK_FLAG, ROW_ID};
use polars::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File extensions a table can be read from, in lookup order.
pub const TABLE_EXTENSIONS: [&str; 2] = ["csv", "parquet"];

/// Rows sampled by the CSV reader for dtype inference.
const INFER_SCHEMA_ROWS: usize = 10_000;

/// Load the raw listings table addressed by `path` and `table`.
///
/// # Arguments
/// * `path` - A `.csv`/`.parquet` file, or a directory holding `<table>.csv` / `<table>.parquet`
/// * `table` - Table identifier; required for directories, must match the file stem for files
/// * `aliases` - Accepted source spellings for the canonical fields
///
/// # Returns
/// * Frame with canonical column names, a leading row-identity column and a
///   trailing link flag consumed by the hyperlink filter
pub fn load_listings(path: &Path, table: Option<&str>, aliases: &ColumnAliases) -> Result<DataFrame> {
    let table_path = resolve_table_path(path, table)?;
    let mut df = read_table(&table_path)?;
    info!(
        path = %table_path.display(),
        rows = df.height(),
        columns = df.width(),
        "loaded source table"
    );

    trim_headers(&mut df)?;
    resolve_columns(&mut df, aliases)?;

    // Coercion nulls text in numeric columns, so links are looked for first.
    let linked = hyperlinked_rows(&df)?;
    for field in Field::ALL.into_iter().filter(|f| f.is_numeric()) {
        if has_column(&df, field.name()) {
            coerce_numeric(&mut df, field.name())?;
        }
    }
    df.with_column(Series::new(LINK_FLAG.into(), linked))?;

    Ok(df.with_row_index(ROW_ID.into(), None)?)
}

/// Locate the concrete file backing `table` under `path`.
pub fn resolve_table_path(path: &Path, table: Option<&str>) -> Result<PathBuf> {
    if !path.exists() {
        return Err(PipelineError::SourceNotFound(path.to_path_buf()));
    }

    if path.is_dir() {
        let table = table.ok_or_else(|| {
            PipelineError::Schema(format!(
                "{} is a directory; a table name is required",
                path.display()
            ))
        })?;
        return TABLE_EXTENSIONS
            .iter()
            .map(|ext| path.join(format!("{}.{}", table, ext)))
            .find(|candidate| candidate.is_file())
            .ok_or_else(|| {
                PipelineError::Schema(format!(
                    "table '{}' not found in {}",
                    table,
                    path.display()
                ))
            });
    }

    if let Some(table) = table {
        let stem = path.file_stem().and_then(|s| s.to_str());
        if stem != Some(table) {
            return Err(PipelineError::Schema(format!(
                "table '{}' not found: {} holds '{}'",
                table,
                path.display(),
                stem.unwrap_or_default()
            )));
        }
    }

    Ok(path.to_path_buf())
}

/// Read a CSV or Parquet file into a frame, choosing the reader by extension.
pub fn read_table(path: &Path) -> Result<DataFrame> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match extension.as_deref() {
        Some("csv") => Ok(CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(INFER_SCHEMA_ROWS))
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()?),
        Some("parquet") => {
            let file = File::open(path)?;
            Ok(ParquetReader::new(file).finish()?)
        }
        _ => Err(PipelineError::UnsupportedFormat(path.to_path_buf())),
    }
}

/// Strip incidental whitespace from header names.
pub fn trim_headers(df: &mut DataFrame) -> Result<()> {
    for name in column_names(df) {
        let trimmed = name.trim();
        if trimmed != name {
            df.rename(&name, trimmed.into())?;
        }
    }
    Ok(())
}

/// Rename the first matching alias of every canonical field to its canonical name.
fn resolve_columns(df: &mut DataFrame, aliases: &ColumnAliases) -> Result<()> {
    let mut missing = Vec::new();

    for field in Field::ALL {
        let headers = column_names(df);
        match aliases.resolve(field, &headers) {
            Some(source) if source != field.name() => {
                debug!(field = field.name(), source, "resolved column alias");
                df.rename(source, field.name().into())?;
            }
            Some(_) => {}
            None if field.is_required() => missing.push(field.name()),
            None => debug!(field = field.name(), "optional column absent"),
        }
    }

    if missing.is_empty() {
        Ok(())
    } else {
        Err(PipelineError::Schema(format!(
            "required column(s) missing: {}",
            missing.join(", ")
        )))
    }
}

/// Coerce a column to `Float64`, parsing currency-like strings and nulling
/// anything unparseable or non-finite.
pub fn coerce_numeric(df: &mut DataFrame, name: &str) -> Result<()> {
    let series = df.column(name)?.as_materialized_series();
    let values: Vec<Option<f64>> = match series.dtype() {
        DataType::String => series
            .str()?
            .into_iter()
            .map(|v| v.and_then(parse_number))
            .collect(),
        _ => series
            .cast(&DataType::Float64)?
            .f64()?
            .into_iter()
            .map(|v| v.filter(|x| x.is_finite()))
            .collect(),
    };

    df.with_column(Series::new(name.into(), values))?;
    Ok(())
}

/// Parse a numeric cell such as `"$1,250.00"` or `" 4.87 "`.
pub fn parse_number(raw: &str) -> Option<f64> {
    let digits: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    digits.parse::<f64>().ok().filter(|v| v.is_finite())
}

pub(crate) fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect()
}

pub(crate) fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_names().iter().any(|c| c.as_str() == name)
}
