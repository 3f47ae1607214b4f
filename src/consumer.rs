//! Read-side helpers for consumers of the enriched listings artifact

use crate::data::{coerce_numeric, has_column, read_table, trim_headers};
use crate::error::{PipelineError, Result};
use crate::schema::{Field, TIER};
use crate::tiers::Tier;
use polars::prelude::*;
use std::path::Path;
use tracing::debug;

/// Load an enriched artifact the way a dashboard expects it.
///
/// `price` defaults to 0.0 and `latitude`/`longitude` to null when absent;
/// all three are coerced to `Float64`.
pub fn read_enriched(path: &Path) -> Result<DataFrame> {
    if !path.exists() {
        return Err(PipelineError::SourceNotFound(path.to_path_buf()));
    }
    let mut df = read_table(path)?;
    trim_headers(&mut df)?;

    let height = df.height();
    if !has_column(&df, Field::Price.name()) {
        df.with_column(Series::new(Field::Price.name().into(), vec![0.0f64; height]))?;
    }
    for field in [Field::Latitude, Field::Longitude] {
        if !has_column(&df, field.name()) {
            df.with_column(Series::full_null(field.name().into(), height, &DataType::Float64))?;
        }
    }
    for field in [Field::Price, Field::Latitude, Field::Longitude] {
        coerce_numeric(&mut df, field.name())?;
    }
    Ok(df)
}

/// Exact-match and range filters over enriched listings.
///
/// A categorical filter is skipped when its column is absent.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingFilter {
    pub tier: Option<Tier>,
    pub room_type: Option<String>,
    pub neighborhood: Option<String>,
    /// Inclusive bounds
    pub price_range: Option<(f64, f64)>,
    pub require_coordinates: bool,
}

impl Default for ListingFilter {
    fn default() -> Self {
        Self {
            tier: None,
            room_type: None,
            neighborhood: None,
            price_range: None,
            require_coordinates: true,
        }
    }
}

impl ListingFilter {
    pub fn apply(&self, df: DataFrame) -> Result<DataFrame> {
        let mut predicates: Vec<Expr> = Vec::new();

        let categorical = [
            (TIER, self.tier.map(|t| t.as_str().to_string())),
            (Field::RoomType.name(), self.room_type.clone()),
            (Field::Neighborhood.name(), self.neighborhood.clone()),
        ];
        for (column, wanted) in categorical {
            match wanted {
                Some(value) if has_column(&df, column) => {
                    predicates.push(col(column).eq(lit(value)));
                }
                Some(_) => debug!(column, "filter column absent; skipping"),
                None => {}
            }
        }

        if let Some((low, high)) = self.price_range {
            let price = Field::Price.name();
            predicates.push(col(price).gt_eq(lit(low)).and(col(price).lt_eq(lit(high))));
        }

        if self.require_coordinates {
            for field in [Field::Latitude, Field::Longitude] {
                if has_column(&df, field.name()) {
                    predicates.push(col(field.name()).is_not_null());
                }
            }
        }

        let Some(predicate) = predicates.into_iter().reduce(|acc, p| acc.and(p)) else {
            return Ok(df);
        };
        Ok(df.lazy().filter(predicate).collect()?)
    }
}

/// Listing count and mean price for one tier
#[derive(Debug, Clone, PartialEq)]
pub struct TierSummary {
    pub tier: Tier,
    pub listings: usize,
    pub mean_price: Option<f64>,
}

/// Per-tier counts and mean prices, in ascending tier order.
pub fn summarize_tiers(df: &DataFrame) -> Result<Vec<TierSummary>> {
    let tiers = df.column(TIER)?.as_materialized_series().cast(&DataType::String)?;
    let prices = df
        .column(Field::Price.name())?
        .as_materialized_series()
        .cast(&DataType::Float64)?;

    let mut sums = [0.0f64; Tier::ALL.len()];
    let mut priced = [0usize; Tier::ALL.len()];
    let mut counts = [0usize; Tier::ALL.len()];

    for (tier, price) in tiers.str()?.into_iter().zip(prices.f64()?.into_iter()) {
        let Some(tier) = tier.and_then(|t| t.parse::<Tier>().ok()) else {
            continue;
        };
        let slot = tier as usize;
        counts[slot] += 1;
        if let Some(price) = price {
            sums[slot] += price;
            priced[slot] += 1;
        }
    }

    Ok(Tier::ALL
        .into_iter()
        .map(|tier| {
            let slot = tier as usize;
            TierSummary {
                tier,
                listings: counts[slot],
                mean_price: (priced[slot] > 0).then(|| sums[slot] / priced[slot] as f64),
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    fn enriched() -> DataFrame {
        df!(
            "price" => [60.0, 210.0, 470.0, 90.0, 230.0],
            "room_type" => ["Private room", "Entire home/apt", "Entire home/apt", "Private room", "Private room"],
            "neighborhood" => ["Harlem", "Astoria", "Harlem", "Harlem", "Astoria"],
            "latitude" => [Some(40.81), Some(40.76), None, Some(40.80), Some(40.77)],
            "longitude" => [Some(-73.94), Some(-73.92), Some(-73.95), Some(-73.94), Some(-73.91)],
            "tier" => [Some("economy"), Some("mid-range"), Some("premium"), None, Some("mid-range")]
        )
        .unwrap()
    }

    #[test]
    fn test_filter_by_tier_and_room_type() {
        let filter = ListingFilter {
            tier: Some(Tier::MidRange),
            room_type: Some("Private room".into()),
            ..Default::default()
        };
        let df = filter.apply(enriched()).unwrap();
        assert_eq!(df.height(), 1);
    }

    #[test]
    fn test_price_range_is_inclusive() {
        let filter = ListingFilter {
            price_range: Some((60.0, 210.0)),
            require_coordinates: false,
            ..Default::default()
        };
        let df = filter.apply(enriched()).unwrap();
        assert_eq!(df.height(), 3);
    }

    #[test]
    fn test_coordinates_required_by_default() {
        let df = ListingFilter::default().apply(enriched()).unwrap();
        assert_eq!(df.height(), 4);
    }

    #[test]
    fn test_absent_filter_column_is_ignored() {
        let filter = ListingFilter {
            neighborhood: Some("Harlem".into()),
            require_coordinates: false,
            ..Default::default()
        };
        let without_neighborhood = enriched().drop("neighborhood").unwrap();
        assert_eq!(filter.apply(without_neighborhood).unwrap().height(), 5);
        assert_eq!(filter.apply(enriched()).unwrap().height(), 3);
    }

    #[test]
    fn test_summarize_tiers() {
        let summary = summarize_tiers(&enriched()).unwrap();
        assert_eq!(summary.len(), 3);
        assert_eq!(summary[0].listings, 1);
        assert_eq!(summary[1].listings, 2);
        assert_eq!(summary[1].mean_price, Some(220.0));
        assert_eq!(summary[2].mean_price, Some(470.0));
    }

    #[test]
    fn test_read_enriched_synthesizes_defaults() {
        let mut file = Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, " name ,tier").unwrap();
        writeln!(file, "a,economy").unwrap();
        writeln!(file, "b,premium").unwrap();

        let df = read_enriched(file.path()).unwrap();
        assert!(has_column(&df, "name"));
        assert_eq!(df.column("price").unwrap().dtype(), &DataType::Float64);
        assert_eq!(df.column("latitude").unwrap().null_count(), 2);
        assert_eq!(df.column("longitude").unwrap().dtype(), &DataType::Float64);
    }

    #[test]
    fn test_read_enriched_missing_file() {
        assert!(matches!(
            read_enriched(Path::new("/no/such/artifact.csv")),
            Err(PipelineError::SourceNotFound(_))
        ));
    }
}
