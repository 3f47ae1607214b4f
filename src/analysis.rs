//! Neighborhood-level price and community-score tables
//!
//! Both tables are computed from cleaned or enriched listings with Polars
//! group-bys. The price table looks at each neighborhood and room type pair:
//! it excludes hotel rooms and prices above [`PRICE_CAP`], and replaces
//! outliers above the group mean plus [`OUTLIER_STDS`] standard deviations with
//! that mean. The community table balances affordability against rating over
//! listings with at least [`MIN_REVIEWS`] reviews.

use crate::data::has_column;
use crate::error::{PipelineError, Result};
use crate::schema::Field;
use polars::prelude::*;
use tracing::info;

/// Room type left out of the price table.
pub const EXCLUDED_ROOM_TYPE: &str = "Hotel room";
/// Listings priced above this are left out of the price table.
pub const PRICE_CAP: f64 = 800.0;
/// Standard deviations above the group mean beyond which a price is an outlier.
pub const OUTLIER_STDS: f64 = 3.0;
/// Default minimum review count for a listing to count towards its community.
pub const MIN_REVIEWS: f64 = 5.0;

/// Median price of one neighborhood and room type pair
#[derive(Debug, Clone, PartialEq)]
pub struct RoomTypePrice {
    pub neighborhood: String,
    pub room_type: String,
    pub listings: usize,
    pub median_price: f64,
}

/// Affordability and rating score of one neighborhood
#[derive(Debug, Clone, PartialEq)]
pub struct CommunityScore {
    pub neighborhood: String,
    pub listings: usize,
    pub reviews: f64,
    pub mean_price: f64,
    pub mean_rating: f64,
    /// `1 - minmax(mean_price)` across neighborhoods
    pub price_score: f64,
    /// `minmax(mean_rating)` across neighborhoods
    pub rating_score: f64,
    /// Equal-weight blend of the two scores
    pub score: f64,
}

fn require_fields(df: &DataFrame, fields: &[Field], table: &str) -> Result<()> {
    let missing: Vec<&str> = fields
        .iter()
        .map(|f| f.name())
        .filter(|name| !has_column(df, name))
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(PipelineError::Schema(format!(
            "{} needs column(s): {}",
            table,
            missing.join(", ")
        )))
    }
}

/// Listing-level prices after exclusions, the cap and outlier replacement.
pub fn adjusted_prices(df: &DataFrame) -> Result<DataFrame> {
    let (neighborhood, room_type, price) = (
        Field::Neighborhood.name(),
        Field::RoomType.name(),
        Field::Price.name(),
    );
    require_fields(
        df,
        &[Field::Neighborhood, Field::RoomType, Field::Price],
        "price table",
    )?;

    let group = [col(neighborhood), col(room_type)];
    let mean = col(price).mean().over(group.clone());
    let std = col(price).std(1).over(group);

    Ok(df
        .clone()
        .lazy()
        .filter(
            col(neighborhood)
                .is_not_null()
                .and(col(room_type).is_not_null())
                .and(col(room_type).neq(lit(EXCLUDED_ROOM_TYPE))),
        )
        .with_column(col(price).cast(DataType::Float64).fill_null(lit(0.0)))
        .filter(col(price).lt_eq(lit(PRICE_CAP)))
        // Single-listing groups have a null std and are never outliers
        .with_column(
            when(col(price).gt(mean.clone() + lit(OUTLIER_STDS) * std))
                .then(mean)
                .otherwise(col(price))
                .alias(price),
        )
        .collect()?)
}

/// Median adjusted price per neighborhood and room type, sorted by both keys.
pub fn price_table(df: &DataFrame) -> Result<DataFrame> {
    let (neighborhood, room_type, price) = (
        Field::Neighborhood.name(),
        Field::RoomType.name(),
        Field::Price.name(),
    );

    Ok(adjusted_prices(df)?
        .lazy()
        .group_by([col(neighborhood), col(room_type)])
        .agg([
            len().alias("listings"),
            col(price).median().alias("median_price"),
        ])
        .sort([neighborhood, room_type], SortMultipleOptions::default())
        .collect()?)
}

/// [`price_table`] as typed rows.
pub fn room_type_prices(df: &DataFrame) -> Result<Vec<RoomTypePrice>> {
    let table = price_table(df)?;
    let neighborhoods = string_values(&table, Field::Neighborhood.name())?;
    let room_types = string_values(&table, Field::RoomType.name())?;
    let listings = count_values(&table, "listings")?;
    let medians = float_values(&table, "median_price")?;

    let rows: Vec<RoomTypePrice> = neighborhoods
        .into_iter()
        .zip(room_types)
        .zip(listings)
        .zip(medians)
        .map(|(((neighborhood, room_type), listings), median)| RoomTypePrice {
            neighborhood,
            room_type,
            listings,
            median_price: median.unwrap_or(f64::NAN),
        })
        .collect();
    info!(groups = rows.len(), "computed neighborhood price table");
    Ok(rows)
}

/// `(x - min) / (max - min)` over the whole column; a constant column maps to 0.
fn min_max(name: &str) -> Expr {
    let range = col(name).max() - col(name).min();
    when(range.clone().eq(lit(0.0)))
        .then(lit(0.0))
        .otherwise((col(name) - col(name).min()) / range)
}

/// Community score per neighborhood, best first.
///
/// Listings missing price, rating, review count or neighborhood are ignored,
/// as are listings with fewer than `min_reviews` reviews.
pub fn community_table(df: &DataFrame, min_reviews: f64) -> Result<DataFrame> {
    let fields = [
        Field::Neighborhood,
        Field::Price,
        Field::Rating,
        Field::ReviewCount,
    ];
    require_fields(df, &fields, "community score")?;

    let complete = fields
        .iter()
        .map(|f| col(f.name()).is_not_null())
        .reduce(|acc, p| acc.and(p))
        .unwrap_or_else(|| lit(true));
    let (neighborhood, price, rating, reviews) = (
        Field::Neighborhood.name(),
        Field::Price.name(),
        Field::Rating.name(),
        Field::ReviewCount.name(),
    );

    Ok(df
        .clone()
        .lazy()
        .filter(complete)
        .filter(col(reviews).cast(DataType::Float64).gt_eq(lit(min_reviews)))
        .group_by([col(neighborhood)])
        .agg([
            len().alias("listings"),
            col(reviews).cast(DataType::Float64).sum().alias("reviews"),
            col(price).cast(DataType::Float64).mean().alias("mean_price"),
            col(rating).cast(DataType::Float64).mean().alias("mean_rating"),
        ])
        .with_columns([
            (lit(1.0) - min_max("mean_price")).alias("price_score"),
            min_max("mean_rating").alias("rating_score"),
        ])
        .with_column(
            (lit(0.5) * col("price_score") + lit(0.5) * col("rating_score")).alias("score"),
        )
        .sort(
            ["score", neighborhood],
            SortMultipleOptions::default().with_order_descending_multi([true, false]),
        )
        .collect()?)
}

/// [`community_table`] as typed rows.
pub fn community_scores(df: &DataFrame, min_reviews: f64) -> Result<Vec<CommunityScore>> {
    let table = community_table(df, min_reviews)?;
    let neighborhoods = string_values(&table, Field::Neighborhood.name())?;
    let listings = count_values(&table, "listings")?;
    let reviews = float_values(&table, "reviews")?;
    let prices = float_values(&table, "mean_price")?;
    let ratings = float_values(&table, "mean_rating")?;
    let price_scores = float_values(&table, "price_score")?;
    let rating_scores = float_values(&table, "rating_score")?;
    let scores = float_values(&table, "score")?;

    let rows: Vec<CommunityScore> = (0..table.height())
        .map(|i| CommunityScore {
            neighborhood: neighborhoods[i].clone(),
            listings: listings[i],
            reviews: reviews[i].unwrap_or(0.0),
            mean_price: prices[i].unwrap_or(f64::NAN),
            mean_rating: ratings[i].unwrap_or(f64::NAN),
            price_score: price_scores[i].unwrap_or(f64::NAN),
            rating_score: rating_scores[i].unwrap_or(f64::NAN),
            score: scores[i].unwrap_or(f64::NAN),
        })
        .collect();
    info!(
        neighborhoods = rows.len(),
        min_reviews, "computed community scores"
    );
    Ok(rows)
}

fn string_values(df: &DataFrame, name: &str) -> Result<Vec<String>> {
    let series = df
        .column(name)?
        .as_materialized_series()
        .cast(&DataType::String)?;
    Ok(series
        .str()?
        .into_iter()
        .map(|v| v.unwrap_or_default().to_string())
        .collect())
}

fn float_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let series = df
        .column(name)?
        .as_materialized_series()
        .cast(&DataType::Float64)?;
    Ok(series.f64()?.into_iter().collect())
}

fn count_values(df: &DataFrame, name: &str) -> Result<Vec<usize>> {
    let series = df
        .column(name)?
        .as_materialized_series()
        .cast(&DataType::UInt64)?;
    Ok(series
        .u64()?
        .into_iter()
        .map(|v| v.unwrap_or(0) as usize)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn priced_listings() -> DataFrame {
        let mut neighborhood = vec!["Astoria"; 5];
        let mut room_type = vec![
            "Private room",
            "Private room",
            "Private room",
            "Entire home/apt",
            "Entire home/apt",
        ];
        let mut price = vec![50.0, 60.0, 70.0, 100.0, 900.0];

        neighborhood.push("Astoria");
        room_type.push("Hotel room");
        price.push(200.0);

        // Ten ordinary rooms and one far above the group mean
        neighborhood.extend(vec!["Harlem"; 11]);
        room_type.extend(vec!["Private room"; 11]);
        price.extend(vec![100.0; 10]);
        price.push(700.0);

        df!(
            "neighborhood" => neighborhood,
            "room_type" => room_type,
            "price" => price
        )
        .unwrap()
    }

    #[test]
    fn test_price_table_excludes_hotels_and_capped_prices() {
        let rows = room_type_prices(&priced_listings()).unwrap();
        assert_eq!(rows.len(), 3);

        assert_eq!(rows[0].neighborhood, "Astoria");
        assert_eq!(rows[0].room_type, "Entire home/apt");
        assert_eq!(rows[0].listings, 1);
        assert_eq!(rows[0].median_price, 100.0);

        assert_eq!(rows[1].room_type, "Private room");
        assert_eq!(rows[1].median_price, 60.0);

        assert_eq!(rows[2].neighborhood, "Harlem");
        assert_eq!(rows[2].listings, 11);
        assert!(rows.iter().all(|r| r.room_type != EXCLUDED_ROOM_TYPE));
    }

    #[test]
    fn test_outlier_replaced_by_group_mean() {
        let adjusted = adjusted_prices(&priced_listings()).unwrap();
        let prices: Vec<f64> = adjusted
            .column("price")
            .unwrap()
            .as_materialized_series()
            .f64()
            .unwrap()
            .into_no_null_iter()
            .collect();

        assert!(prices.iter().all(|p| *p <= PRICE_CAP));
        assert!(!prices.contains(&700.0));
        let group_mean = 1700.0 / 11.0;
        assert!(prices.iter().any(|p| (p - group_mean).abs() < 1e-9));
        // Small groups keep their prices
        assert!(prices.contains(&50.0) && prices.contains(&70.0));
    }

    #[test]
    fn test_price_table_needs_room_type() {
        let df = df!("neighborhood" => ["Astoria"], "price" => [50.0]).unwrap();
        match price_table(&df) {
            Err(PipelineError::Schema(msg)) => assert!(msg.contains("room_type")),
            other => panic!("expected schema error, got {:?}", other),
        }
    }

    fn reviewed_listings() -> DataFrame {
        df!(
            "neighborhood" => ["Chinatown", "Chinatown", "Midtown", "Harlem", "Astoria", "Astoria"],
            "price" => [100.0, 200.0, 300.0, 50.0, 200.0, 80.0],
            "rating" => [Some(4.0), Some(5.0), Some(4.0), Some(5.0), Some(4.25), None],
            "review_count" => [Some(10i64), Some(10), Some(6), Some(2), Some(5), Some(40)]
        )
        .unwrap()
    }

    #[test]
    fn test_community_scores_blend_price_and_rating() {
        let rows = community_scores(&reviewed_listings(), MIN_REVIEWS).unwrap();
        let names: Vec<&str> = rows.iter().map(|r| r.neighborhood.as_str()).collect();
        assert_eq!(names, vec!["Chinatown", "Astoria", "Midtown"]);

        let chinatown = &rows[0];
        assert_eq!(chinatown.listings, 2);
        assert_eq!(chinatown.reviews, 20.0);
        assert_eq!(chinatown.mean_price, 150.0);
        assert_eq!(chinatown.mean_rating, 4.5);
        assert!((chinatown.score - 1.0).abs() < 1e-9);

        let astoria = &rows[1];
        assert_eq!(astoria.listings, 1);
        assert!((astoria.price_score - 2.0 / 3.0).abs() < 1e-9);
        assert!((astoria.rating_score - 0.5).abs() < 1e-9);
        assert!((astoria.score - 7.0 / 12.0).abs() < 1e-9);

        assert!(rows[2].score.abs() < 1e-9);
    }

    #[test]
    fn test_single_community_scores_zero_range() {
        let rows = community_scores(&reviewed_listings(), 8.0).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].neighborhood, "Chinatown");
        assert_eq!(rows[0].price_score, 1.0);
        assert_eq!(rows[0].rating_score, 0.0);
        assert_eq!(rows[0].score, 0.5);
    }

    #[test]
    fn test_community_needs_review_count() {
        let df = reviewed_listings().drop("review_count").unwrap();
        assert!(matches!(
            community_scores(&df, MIN_REVIEWS),
            Err(PipelineError::Schema(_))
        ));
    }
}
