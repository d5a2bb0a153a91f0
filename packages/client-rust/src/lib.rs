//! `FireEats` client: the pieces a restaurant-browsing front end is built on.
//!
//! - [`LocalCollection`]: a typed live mirror of one query's result set
//! - [`submit_review`]: adds a review and updates the restaurant's rating
//!   aggregate in one transaction
//! - [`FilterSelection`]: user filter criteria translated into a [`Query`](fireeats_core::Query)
//! - [`seed_restaurants`]: random sample data
//! - [`cli`]: the `fireeats` demo binary

pub mod cli;
pub mod collection;
pub mod filters;
pub mod rating;
pub mod seed;

pub use collection::{ChangeHandler, CollectionUpdate, ListenControl, LocalCollection, Snapshot};
pub use filters::{
    base_query, price_from_string, price_string, FilterSelection, CATEGORY_OPTIONS, CITY_OPTIONS,
    PRICE_OPTIONS, RESULT_LIMIT, SORT_OPTIONS,
};
pub use rating::{submit_review, AddReview};
pub use seed::{random_restaurant, seed_restaurants};
