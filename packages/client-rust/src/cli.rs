//! The `fireeats` demo: seed an in-memory store, list restaurants for a
//! filter selection, and optionally review the first one.
//!
//! Every flag can also be set through a `FIREEATS_*` environment variable.

use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use clap::Parser;
use fireeats_core::{Author, ClockSource, DocumentStore, Restaurant, Review, SystemClock};
use fireeats_store::{MemoryStore, StoreConfig};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::collection::{CollectionUpdate, LocalCollection};
use crate::filters::{
    price_from_string, price_string, FilterSelection, CATEGORY_OPTIONS, CITY_OPTIONS,
    PRICE_OPTIONS, SORT_OPTIONS,
};
use crate::rating::submit_review;
use crate::seed::seed_restaurants;

/// Browse and review sample restaurants.
#[derive(Debug, Parser)]
#[command(name = "fireeats")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Number of random restaurants to add before listing.
    #[arg(long, env = "FIREEATS_SEED", default_value_t = 20)]
    pub seed: usize,

    /// Seed for the sample-data generator. Random when unset.
    #[arg(long, env = "FIREEATS_RNG_SEED")]
    pub rng_seed: Option<u64>,

    /// Only restaurants of this category.
    #[arg(long, env = "FIREEATS_CATEGORY")]
    pub category: Option<String>,

    /// Only restaurants in this city.
    #[arg(long, env = "FIREEATS_CITY")]
    pub city: Option<String>,

    /// Only restaurants of this price tier: `$`, `$$` or `$$$`.
    #[arg(long, env = "FIREEATS_PRICE", value_parser = parse_price)]
    pub price: Option<i64>,

    /// Sort by `name`, `category`, `city` or `price`.
    #[arg(long, env = "FIREEATS_SORT_BY")]
    pub sort_by: Option<String>,

    /// Submit a review with this rating (1-5) for the first listed restaurant.
    #[arg(long, env = "FIREEATS_RATING")]
    pub rating: Option<i64>,

    /// Review text.
    #[arg(long, env = "FIREEATS_TEXT", default_value = "")]
    pub text: String,

    /// Reviewer's user id.
    #[arg(long, env = "FIREEATS_USER", default_value = "demo-user")]
    pub user: String,

    /// Reviewer's display name.
    #[arg(long, env = "FIREEATS_DISPLAY_NAME")]
    pub display_name: Option<String>,

    /// Output format.
    #[arg(long, env = "FIREEATS_FORMAT", default_value = "text")]
    pub format: OutputFormat,

    /// Print the filter choices and exit.
    #[arg(long)]
    pub list_filters: bool,
}

/// Output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

fn parse_price(label: &str) -> Result<i64, String> {
    price_from_string(label).ok_or_else(|| format!("expected $, $$ or $$$, got {label:?}"))
}

impl Cli {
    #[must_use]
    pub fn filters(&self) -> FilterSelection {
        FilterSelection {
            category: self.category.clone(),
            city: self.city.clone(),
            price: self.price,
            sort_by: self.sort_by.clone(),
        }
    }
}

#[derive(Serialize)]
struct ReviewReport<'a> {
    review: String,
    restaurant: &'a Restaurant,
}

#[derive(Serialize)]
struct FilterChoices {
    categories: &'static [&'static str],
    cities: &'static [&'static str],
    prices: &'static [&'static str],
    sort_by: &'static [&'static str],
}

const FILTER_CHOICES: FilterChoices = FilterChoices {
    categories: CATEGORY_OPTIONS,
    cities: CITY_OPTIONS,
    prices: PRICE_OPTIONS,
    sort_by: SORT_OPTIONS,
};

fn print_filter_choices(format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&FILTER_CHOICES)?),
        OutputFormat::Text => {
            println!("categories: {}", FILTER_CHOICES.categories.join(", "));
            println!("cities: {}", FILTER_CHOICES.cities.join(", "));
            println!("prices: {}", FILTER_CHOICES.prices.join(", "));
            println!("sort by: {}", FILTER_CHOICES.sort_by.join(", "));
        }
    }
    Ok(())
}

type UpdateReceiver = mpsc::UnboundedReceiver<Result<usize, String>>;

async fn next_update(updates: &mut UpdateReceiver) -> anyhow::Result<usize> {
    match updates.recv().await {
        Some(Ok(changes)) => Ok(changes),
        Some(Err(error)) => Err(anyhow!("restaurant subscription failed: {error}")),
        None => bail!("restaurant subscription closed"),
    }
}

fn print_restaurants(restaurants: &[Restaurant], format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(restaurants)?),
        OutputFormat::Text => {
            for (i, r) in restaurants.iter().enumerate() {
                println!(
                    "{:>2}. {} | {} | {} | {} | {:.2} ({} ratings)",
                    i + 1,
                    r.name,
                    r.category,
                    r.city,
                    price_string(r.price),
                    r.average_rating,
                    r.rating_count
                );
            }
        }
    }
    Ok(())
}

/// Runs the demo against a fresh in-memory store.
///
/// # Errors
///
/// Fails on invalid filters, a failed subscription, or a review the store
/// did not accept.
pub async fn run(cli: &Cli) -> anyhow::Result<()> {
    if cli.list_filters {
        return print_filter_choices(cli.format);
    }

    let store = Arc::new(MemoryStore::new(StoreConfig::default()));
    let mut rng = match cli.rng_seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    seed_restaurants(store.as_ref(), cli.seed, &mut rng)
        .await
        .context("seeding sample restaurants")?;

    let selection = cli.filters();
    let query = selection.to_query()?;
    if !selection.is_empty() {
        tracing::info!(filters = ?selection.active_labels(), "filtering restaurants");
    }

    let (tx, mut updates) = mpsc::unbounded_channel();
    let restaurants = LocalCollection::<Restaurant>::new(
        Arc::clone(&store) as Arc<dyn DocumentStore>,
        query,
        move |update, _| {
            let event = match update {
                CollectionUpdate::Changed { changes, .. } => Ok(changes.len()),
                CollectionUpdate::Failed(error) => Err(error.to_string()),
            };
            let _ = tx.send(event);
        },
    );
    restaurants.listen()?;
    next_update(&mut updates).await?;
    print_restaurants(&restaurants.records(), cli.format)?;

    let Some(rating) = cli.rating else {
        return Ok(());
    };
    let Some(target) = restaurants.document(0) else {
        tracing::warn!("no restaurant matches the filters, nothing to review");
        return Ok(());
    };

    let author = Author::new(&cli.user, cli.display_name.as_deref());
    let review = Review::new(rating, &author, &cli.text, SystemClock.now_millis());
    let review_ref = match submit_review(store.as_ref(), &target.reference, &review).await {
        Ok(reference) => reference,
        Err(error) => {
            tracing::error!(restaurant = %target.reference, error = %error, "review was not saved");
            return Err(error.into());
        }
    };

    next_update(&mut updates).await?;
    let index = restaurants
        .index_of(&target.reference)
        .context("reviewed restaurant left the result set")?;
    let updated = restaurants.get(index)?;
    restaurants.stop_listening();

    match cli.format {
        OutputFormat::Json => {
            let report = ReviewReport {
                review: review_ref.path(),
                restaurant: &updated,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Text => println!(
            "{} now averages {:.2} over {} ratings",
            updated.name, updated.average_rating, updated.rating_count
        ),
    }
    Ok(())
}
