//! Restaurant list filters and their translation into queries.

use fireeats_core::{
    CollectionPath, Error, Query, Restaurant, Result, SortDirection, RESTAURANTS,
};

/// Most restaurants a list query returns.
pub const RESULT_LIMIT: usize = 50;

/// Fields the restaurant list can be sorted by.
pub const SORT_OPTIONS: &[&str] = &["name", "category", "city", "price"];

/// Price tier labels, cheapest first.
pub const PRICE_OPTIONS: &[&str] = &["$", "$$", "$$$"];

/// Categories offered when picking a category filter.
pub const CATEGORY_OPTIONS: &[&str] = Restaurant::CATEGORIES;

/// Cities offered when picking a city filter.
pub const CITY_OPTIONS: &[&str] = Restaurant::CITIES;

/// The unfiltered restaurant list.
#[must_use]
pub fn base_query() -> Query {
    Query::collection(CollectionPath::root(RESTAURANTS)).limit(RESULT_LIMIT)
}

/// Label for a price tier: `1` is `"$"`, `3` is `"$$$"`. Other values have no label.
#[must_use]
pub fn price_string(price: i64) -> &'static str {
    match price {
        1 => "$",
        2 => "$$",
        3 => "$$$",
        _ => "",
    }
}

/// Inverse of [`price_string`].
#[must_use]
pub fn price_from_string(label: &str) -> Option<i64> {
    match label {
        "$" => Some(1),
        "$$" => Some(2),
        "$$$" => Some(3),
        _ => None,
    }
}

/// Filter criteria chosen by the user. Empty strings count as unset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSelection {
    pub category: Option<String>,
    pub city: Option<String>,
    pub price: Option<i64>,
    pub sort_by: Option<String>,
}

fn present(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|s| !s.is_empty())
}

impl FilterSelection {
    #[must_use]
    pub fn category(&self) -> Option<&str> {
        present(self.category.as_ref())
    }

    #[must_use]
    pub fn city(&self) -> Option<&str> {
        present(self.city.as_ref())
    }

    #[must_use]
    pub fn sort_by(&self) -> Option<&str> {
        present(self.sort_by.as_ref())
    }

    /// True when no filter narrows the list. Sorting alone does not count.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.active_labels().is_empty()
    }

    /// Labels of the active filters, in category, city, price order.
    #[must_use]
    pub fn active_labels(&self) -> Vec<String> {
        let mut labels = Vec::new();
        labels.extend(self.category().map(str::to_string));
        labels.extend(self.city().map(str::to_string));
        labels.extend(self.price.map(|p| price_string(p).to_string()));
        labels
    }

    /// The query for this selection, built on [`base_query`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `sort_by` is not one of
    /// [`SORT_OPTIONS`] or the price is not a known tier.
    pub fn to_query(&self) -> Result<Query> {
        let mut query = base_query();

        if let Some(category) = self.category() {
            query = query.where_eq("category", category);
        }
        if let Some(city) = self.city() {
            query = query.where_eq("city", city);
        }
        if let Some(price) = self.price {
            if price_string(price).is_empty() {
                return Err(Error::InvalidArgument(format!("unknown price tier {price}")));
            }
            query = query.where_eq("price", price);
        }
        if let Some(field) = self.sort_by() {
            if !SORT_OPTIONS.contains(&field) {
                return Err(Error::InvalidArgument(format!("cannot sort by {field}")));
            }
            query = query.order_by(field, SortDirection::Asc);
        }

        Ok(query)
    }
}
