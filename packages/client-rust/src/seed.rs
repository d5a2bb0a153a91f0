//! Random sample restaurants for an empty store.

use fireeats_core::{
    CollectionPath, DocumentRef, DocumentSerializable, DocumentStore, Restaurant, Result,
    RESTAURANTS,
};
use rand::Rng;

/// Words restaurant names are built from, two at a time.
pub const NAME_WORDS: &[&str] = &[
    "Bar", "Fire", "Grill", "Drive Thru", "Place", "Best", "Spot", "Prime", "Eatin'",
];

pub const SEED_CITIES: &[&str] = &[
    "San Francisco",
    "Mountain View",
    "Palo Alto",
    "Redwood City",
    "San Mateo",
    "Cupertino",
    "San Jose",
    "Daly City",
    "Millbrae",
    "Belmont",
];

pub const SEED_CATEGORIES: &[&str] = &[
    "Pizza", "Burgers", "American", "Dim Sum", "Pho", "Mexican", "Hot Pot",
];

fn pick<'a, R: Rng>(rng: &mut R, options: &[&'a str]) -> &'a str {
    options[rng.random_range(0..options.len())]
}

/// A random, unrated restaurant.
pub fn random_restaurant<R: Rng>(rng: &mut R) -> Restaurant {
    let name = format!("{} {}", pick(rng, NAME_WORDS), pick(rng, NAME_WORDS));
    let category = pick(rng, SEED_CATEGORIES);
    let city = pick(rng, SEED_CITIES);
    let price = rng.random_range(1..=3);
    Restaurant::new(&name, category, city, price)
}

/// Adds `count` random restaurants to the store and returns their references.
///
/// # Errors
///
/// Stops at the first failed write and returns its error. Restaurants
/// written before it stay in the store.
pub async fn seed_restaurants<R: Rng>(
    store: &dyn DocumentStore,
    count: usize,
    rng: &mut R,
) -> Result<Vec<DocumentRef>> {
    let restaurants: Vec<Restaurant> = (0..count).map(|_| random_restaurant(rng)).collect();
    let collection = CollectionPath::root(RESTAURANTS);

    let mut references = Vec::with_capacity(count);
    for restaurant in restaurants {
        references.push(store.add(&collection, restaurant.to_fields()).await?);
    }
    tracing::info!(count, "seeded sample restaurants");
    Ok(references)
}
