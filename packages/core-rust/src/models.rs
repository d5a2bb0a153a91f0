//! Restaurant and review records.

use serde::{Deserialize, Serialize};

use crate::record::{DocumentSerializable, FieldAccess};
use crate::types::{FieldMap, Value};

/// Collection id of the top-level restaurants collection.
pub const RESTAURANTS: &str = "restaurants";
/// Collection id of the per-restaurant review sub-collection.
pub const RATINGS: &str = "ratings";

/// Inclusive range of accepted review ratings.
pub const RATING_RANGE: std::ops::RangeInclusive<i64> = 1..=5;

/// A restaurant and its cached rating aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Restaurant {
    pub name: String,
    pub category: String,
    pub city: String,
    /// Price tier, 1 to 3.
    pub price: i64,
    /// Stored as `numRatings`.
    pub rating_count: i64,
    /// Stored as `avgRating`.
    pub average_rating: f64,
}

impl Restaurant {
    pub const CITIES: &'static [&'static str] = &[
        "Albuquerque",
        "Arlington",
        "Atlanta",
        "Austin",
        "Baltimore",
        "Boston",
        "Charlotte",
        "Chicago",
        "Cleveland",
        "Colorado Springs",
        "Columbus",
        "Dallas",
        "Denver",
        "Detroit",
        "El Paso",
        "Fort Worth",
        "Fresno",
        "Houston",
        "Indianapolis",
        "Jacksonville",
        "Kansas City",
        "Las Vegas",
        "Long Beach",
        "Los Angeles",
        "Louisville",
        "Memphis",
        "Mesa",
        "Miami",
        "Milwaukee",
        "Nashville",
        "New York",
        "Oakland",
        "Oklahoma",
        "Omaha",
        "Philadelphia",
        "Phoenix",
        "Portland",
        "Raleigh",
        "Sacramento",
        "San Antonio",
        "San Diego",
        "San Francisco",
        "San Jose",
        "Tucson",
        "Tulsa",
        "Virginia Beach",
        "Washington",
    ];

    pub const CATEGORIES: &'static [&'static str] = &[
        "Brunch",
        "Burgers",
        "Coffee",
        "Deli",
        "Dim Sum",
        "Indian",
        "Italian",
        "Mediterranean",
        "Mexican",
        "Pizza",
        "Ramen",
        "Sushi",
    ];

    /// A new restaurant with no ratings.
    #[must_use]
    pub fn new(name: &str, category: &str, city: &str, price: i64) -> Self {
        Self {
            name: name.to_string(),
            category: category.to_string(),
            city: city.to_string(),
            price,
            rating_count: 0,
            average_rating: 0.0,
        }
    }

    /// The aggregate after folding in one more rating.
    ///
    /// `(count * average + rating) / (count + 1)`, computed in floating point.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn with_rating(&self, rating: i64) -> Self {
        let count = self.rating_count as f64;
        let average = (count * self.average_rating + rating as f64) / (count + 1.0);
        Self {
            rating_count: self.rating_count + 1,
            average_rating: average,
            ..self.clone()
        }
    }

    /// Only the aggregate fields, as written back by a rating transaction.
    #[must_use]
    pub fn aggregate_fields(&self) -> FieldMap {
        FieldMap::from([
            ("numRatings".to_string(), Value::Int(self.rating_count)),
            ("avgRating".to_string(), Value::Float(self.average_rating)),
        ])
    }
}

impl DocumentSerializable for Restaurant {
    fn from_fields(fields: &FieldMap) -> Option<Self> {
        Some(Self {
            name: fields.string("name")?,
            category: fields.string("category")?,
            city: fields.string("city")?,
            price: fields.int("price")?,
            rating_count: fields.int("numRatings")?,
            average_rating: fields.float("avgRating")?,
        })
    }

    fn to_fields(&self) -> FieldMap {
        let mut fields = FieldMap::from([
            ("name".to_string(), Value::from(self.name.as_str())),
            ("category".to_string(), Value::from(self.category.as_str())),
            ("city".to_string(), Value::from(self.city.as_str())),
            ("price".to_string(), Value::Int(self.price)),
        ]);
        fields.extend(self.aggregate_fields());
        fields
    }
}

/// The acting user, as supplied by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub user_id: String,
    pub display_name: Option<String>,
}

impl Author {
    #[must_use]
    pub fn new(user_id: &str, display_name: Option<&str>) -> Self {
        Self {
            user_id: user_id.to_string(),
            display_name: display_name.map(str::to_string),
        }
    }

    /// The display name, or `"Anonymous"` when the provider has none.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or("Anonymous")
    }
}

/// A single user review of a restaurant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub rating: i64,
    pub user_id: String,
    pub username: String,
    pub text: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl Review {
    #[must_use]
    pub fn new(rating: i64, author: &Author, text: &str, timestamp: i64) -> Self {
        Self {
            rating,
            user_id: author.user_id.clone(),
            username: author.display_name().to_string(),
            text: text.to_string(),
            timestamp,
        }
    }
}

impl DocumentSerializable for Review {
    fn from_fields(fields: &FieldMap) -> Option<Self> {
        Some(Self {
            rating: fields.int("rating")?,
            user_id: fields.string("userId")?,
            username: fields.string("userName")?,
            text: fields.string("text")?,
            timestamp: fields.timestamp("timestamp")?,
        })
    }

    fn to_fields(&self) -> FieldMap {
        FieldMap::from([
            ("rating".to_string(), Value::Int(self.rating)),
            ("userId".to_string(), Value::from(self.user_id.as_str())),
            ("userName".to_string(), Value::from(self.username.as_str())),
            ("text".to_string(), Value::from(self.text.as_str())),
            ("timestamp".to_string(), Value::Timestamp(self.timestamp)),
        ])
    }
}
