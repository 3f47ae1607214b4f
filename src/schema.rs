//! Canonical listing fields and the source-alias map resolved at load time

use serde::Deserialize;

/// Hidden column carrying the original 0-based ingestion index of each row.
pub const ROW_ID: &str = "__row_id";
/// Hidden column marking rows whose raw text embedded a link before numeric coercion.
pub const LINK_FLAG: &str = "__has_link";
/// Output column holding the integer cluster id.
pub const CLUSTER_ID: &str = "cluster_id";
/// Output column holding the tier name.
pub const TIER: &str = "tier";

/// Fields the pipeline and its consumers address by canonical name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Price,
    Rating,
    Capacity,
    Neighborhood,
    RoomType,
    Latitude,
    Longitude,
    ReviewCount,
}

impl Field {
    pub const ALL: [Field; 8] = [
        Field::Price,
        Field::Rating,
        Field::Capacity,
        Field::Neighborhood,
        Field::RoomType,
        Field::Latitude,
        Field::Longitude,
        Field::ReviewCount,
    ];

    /// Clustering features, in feature-vector order.
    pub const FEATURES: [Field; 3] = [Field::Price, Field::Rating, Field::Capacity];

    pub fn name(self) -> &'static str {
        match self {
            Field::Price => "price",
            Field::Rating => "rating",
            Field::Capacity => "capacity",
            Field::Neighborhood => "neighborhood",
            Field::RoomType => "room_type",
            Field::Latitude => "latitude",
            Field::Longitude => "longitude",
            Field::ReviewCount => "review_count",
        }
    }

    /// Whether loading fails when the field cannot be resolved.
    pub fn is_required(self) -> bool {
        matches!(self, Field::Price | Field::Rating | Field::Capacity)
    }

    /// Whether the loader coerces the column to `Float64`.
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            Field::Price
                | Field::Rating
                | Field::Capacity
                | Field::Latitude
                | Field::Longitude
                | Field::ReviewCount
        )
    }
}

/// Accepted source spellings for each canonical field.
///
/// The canonical name is always tried first, then the aliases in order.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ColumnAliases {
    pub price: Vec<String>,
    pub rating: Vec<String>,
    pub capacity: Vec<String>,
    pub neighborhood: Vec<String>,
    pub room_type: Vec<String>,
    pub latitude: Vec<String>,
    pub longitude: Vec<String>,
    pub review_count: Vec<String>,
}

impl Default for ColumnAliases {
    fn default() -> Self {
        fn names(list: &[&str]) -> Vec<String> {
            list.iter().map(|s| s.to_string()).collect()
        }

        Self {
            price: names(&["price"]),
            rating: names(&["review_scores_rating", "rating", "review_score"]),
            capacity: names(&["accommodates", "capacity"]),
            neighborhood: names(&["neighborhood", "neighbourhood", "neighbourhood_cleansed"]),
            room_type: names(&["room_type"]),
            latitude: names(&["latitude"]),
            longitude: names(&["longitude"]),
            review_count: names(&["number_of_reviews", "reviews"]),
        }
    }
}

impl ColumnAliases {
    pub fn aliases(&self, field: Field) -> &[String] {
        match field {
            Field::Price => &self.price,
            Field::Rating => &self.rating,
            Field::Capacity => &self.capacity,
            Field::Neighborhood => &self.neighborhood,
            Field::RoomType => &self.room_type,
            Field::Latitude => &self.latitude,
            Field::Longitude => &self.longitude,
            Field::ReviewCount => &self.review_count,
        }
    }

    /// Pick the source header that supplies `field`, if any.
    pub fn resolve<'a>(&self, field: Field, headers: &'a [String]) -> Option<&'a str> {
        std::iter::once(field.name())
            .chain(self.aliases(field).iter().map(String::as_str))
            .find_map(|candidate| headers.iter().find(|h| h.as_str() == candidate))
            .map(String::as_str)
    }
}
