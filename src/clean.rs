//! Row-level cleaning rules: missing prices and hyperlink spam

use crate::data::has_column;
use crate::error::Result;
use crate::schema::{Field, LINK_FLAG};
use once_cell::sync::Lazy;
use polars::prelude::*;
use regex::Regex;
use tracing::{debug, info};

/// `http`/`https` scheme followed by at least one URL character.
static URL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"https?://(?:[a-zA-Z0-9]|[$-_@.&+]|[!*(),]|%[0-9a-fA-F]{2})+")
        .expect("URL pattern is a valid regex")
});

/// Row counts observed while cleaning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CleaningReport {
    pub input_rows: usize,
    pub after_price_filter: usize,
    pub after_link_filter: usize,
}

impl CleaningReport {
    pub fn dropped(&self) -> usize {
        self.input_rows - self.after_link_filter
    }
}

/// Apply both cleaning filters in sequence.
pub fn clean_listings(df: DataFrame) -> Result<(DataFrame, CleaningReport)> {
    let input_rows = df.height();

    let priced = drop_missing_price(df)?;
    let after_price_filter = priced.height();
    debug!(
        dropped = input_rows - after_price_filter,
        "removed listings without a price"
    );

    let cleaned = drop_hyperlinked(priced)?;
    let after_link_filter = cleaned.height();
    debug!(
        dropped = after_price_filter - after_link_filter,
        "removed listings with embedded links"
    );

    let report = CleaningReport {
        input_rows,
        after_price_filter,
        after_link_filter,
    };
    info!(
        input = report.input_rows,
        kept = report.after_link_filter,
        dropped = report.dropped(),
        "cleaned listings"
    );
    Ok((cleaned, report))
}

/// Drop rows whose price is null.
pub fn drop_missing_price(df: DataFrame) -> Result<DataFrame> {
    Ok(df
        .lazy()
        .filter(col(Field::Price.name()).is_not_null())
        .collect()?)
}

/// Drop every row in which any text column contains a URL.
///
/// Rows the loader flagged in [`LINK_FLAG`] are dropped too, and the flag
/// column is removed.
pub fn drop_hyperlinked(df: DataFrame) -> Result<DataFrame> {
    let mut linked = hyperlinked_rows(&df)?;
    let mut df = df;

    if has_column(&df, LINK_FLAG) {
        let flags = df.column(LINK_FLAG)?.as_materialized_series().bool()?;
        for (row, flag) in flags.into_iter().enumerate() {
            if flag == Some(true) {
                linked[row] = true;
            }
        }
        df = df.drop(LINK_FLAG)?;
    }

    if !linked.iter().any(|l| *l) {
        return Ok(df);
    }
    let keep: Vec<bool> = linked.iter().map(|l| !l).collect();
    let mask = BooleanChunked::from_slice("keep".into(), &keep);
    Ok(df.filter(&mask)?)
}

/// Rows in which any `String` column embeds a URL.
pub fn hyperlinked_rows(df: &DataFrame) -> Result<Vec<bool>> {
    let mut linked = vec![false; df.height()];

    for column in df.get_columns() {
        if column.dtype() != &DataType::String {
            continue;
        }
        let values = column.as_materialized_series().str()?;
        for (row, value) in values.into_iter().enumerate() {
            if value.is_some_and(contains_url) {
                linked[row] = true;
            }
        }
    }
    Ok(linked)
}

/// Whether `text` embeds an `http(s)://` link.
pub fn contains_url(text: &str) -> bool {
    URL_PATTERN.is_match(text)
}
