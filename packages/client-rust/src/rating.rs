//! Review submission: insert a review and fold it into the restaurant's
//! cached rating aggregate in one transaction.

use async_trait::async_trait;
use fireeats_core::{
    DocumentRef, DocumentSerializable, DocumentStore, Error, Restaurant, Result, Review,
    Transaction, TransactionFunction, RATINGS, RATING_RANGE,
};

/// Transaction body that adds one review to a restaurant.
///
/// Every attempt re-reads the restaurant, so the aggregate it writes is
/// always derived from a read taken in that same attempt.
#[derive(Debug, Clone)]
pub struct AddReview {
    restaurant: DocumentRef,
    review_ref: DocumentRef,
    review: Review,
}

impl AddReview {
    #[must_use]
    pub fn new(restaurant: DocumentRef, review_ref: DocumentRef, review: Review) -> Self {
        Self {
            restaurant,
            review_ref,
            review,
        }
    }

    #[must_use]
    pub fn review_ref(&self) -> &DocumentRef {
        &self.review_ref
    }
}

#[async_trait]
impl TransactionFunction for AddReview {
    async fn run(&self, txn: &mut dyn Transaction) -> Result<()> {
        let path = self.restaurant.path();
        let document = txn
            .get(&self.restaurant)
            .await?
            .ok_or_else(|| Error::NotFound { path: path.clone() })?;
        let current =
            Restaurant::from_fields(&document.fields).ok_or(Error::DataIntegrity { path })?;

        let updated = current.with_rating(self.review.rating);
        tracing::debug!(
            restaurant = %self.restaurant,
            count = updated.rating_count,
            average = updated.average_rating,
            "folding review into aggregate"
        );

        txn.set(&self.review_ref, self.review.to_fields());
        txn.update(&self.restaurant, updated.aggregate_fields());
        Ok(())
    }
}

/// Adds `review` under `<restaurant>/ratings` and updates the restaurant's
/// `numRatings` and `avgRating` atomically. Returns the new review's reference.
///
/// # Errors
///
/// - [`Error::InvalidArgument`] if the rating is outside `1..=5`; nothing is sent
/// - [`Error::NotFound`] / [`Error::DataIntegrity`] if the restaurant is missing
///   or not a valid restaurant
/// - [`Error::Aborted`] if the store gave up after repeated conflicts
/// - any other store error
pub async fn submit_review(
    store: &dyn DocumentStore,
    restaurant: &DocumentRef,
    review: &Review,
) -> Result<DocumentRef> {
    if !RATING_RANGE.contains(&review.rating) {
        return Err(Error::InvalidArgument(format!(
            "rating {} is outside {}..={}",
            review.rating,
            RATING_RANGE.start(),
            RATING_RANGE.end()
        )));
    }

    let review_ref = store.new_document(&restaurant.collection(RATINGS));
    let add = AddReview::new(restaurant.clone(), review_ref, review.clone());
    store.run_transaction(&add).await?;

    tracing::info!(
        restaurant = %restaurant,
        review = %add.review_ref(),
        rating = review.rating,
        "review submitted"
    );
    Ok(add.review_ref)
}
