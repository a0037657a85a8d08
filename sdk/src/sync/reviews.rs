//! Live product reviews.

use chrono::{DateTime, Utc};
use serde::de::{self, Unexpected};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::binding::{decode, Binding, Feature, StateTx};
use super::scope::ScopeKind;
use crate::cache::{keys, QueryCache};
use crate::collections::{Identified, MergedCollection};
use crate::context::RealtimeContext;
use crate::ws::events;
use crate::ws::messages::string_id;

/// A product review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    /// Server id.
    #[serde(rename = "_id", alias = "id", deserialize_with = "string_id")]
    pub id: String,
    /// Display name of the reviewer.
    #[serde(default)]
    pub user_name: Option<String>,
    /// Stars, 1 to 5.
    #[serde(deserialize_with = "star_rating")]
    pub rating: u8,
    /// Review text.
    #[serde(default)]
    pub comment: String,
    /// Server time.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Valid star ratings.
pub const RATING_RANGE: std::ops::RangeInclusive<u8> = 1..=5;

/// Rejects ratings outside [`RATING_RANGE`], so the whole review is dropped.
fn star_rating<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
    let rating = u64::deserialize(deserializer)?;
    u8::try_from(rating)
        .ok()
        .filter(|stars| RATING_RANGE.contains(stars))
        .ok_or_else(|| de::Error::invalid_value(Unexpected::Unsigned(rating), &"1 to 5 stars"))
}

impl Identified for Review {
    fn identity(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Deserialize)]
struct NewReview {
    #[serde(deserialize_with = "string_id")]
    product_id: String,
    review: Review,
}

/// Reviews of one product.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReviewState {
    /// REST snapshot plus reviews posted since.
    pub reviews: MergedCollection<Review>,
}

impl ReviewState {
    /// Newest first, each id once.
    #[must_use]
    pub fn merged(&self) -> Vec<Review> {
        self.reviews.merged()
    }

    /// Mean rating over the merged list. Ratings outside 1 to 5 are not
    /// counted.
    #[must_use]
    pub fn average_rating(&self) -> Option<f64> {
        let ratings: Vec<u64> = self
            .reviews
            .merged()
            .iter()
            .map(|review| review.rating)
            .filter(|rating| RATING_RANGE.contains(rating))
            .map(u64::from)
            .collect();
        if ratings.is_empty() {
            return None;
        }
        let total: u64 = ratings.iter().sum();
        Some(total as f64 / ratings.len() as f64)
    }
}

/// Review feed for one product.
#[derive(Debug)]
pub struct ReviewFeature {
    cache: QueryCache,
}

impl ReviewFeature {
    /// Creates the feature.
    #[must_use]
    pub fn new(cache: QueryCache) -> Self {
        Self { cache }
    }
}

impl Feature for ReviewFeature {
    type State = ReviewState;

    fn scope_kind(&self) -> Option<ScopeKind> {
        Some(ScopeKind::Product)
    }

    fn events(&self) -> &'static [&'static str] {
        &[events::NEW_REVIEW]
    }

    fn initial_state(&self) -> ReviewState {
        ReviewState::default()
    }

    fn on_event(&self, event: &str, payload: &Value, state: &StateTx<ReviewState>) {
        let Some(NewReview { product_id, review }) = decode(event, payload) else {
            return;
        };

        state.send_if_modified(|current| current.reviews.push_realtime(review));
        self.cache.invalidate(&keys::reviews(&product_id));
    }
}

/// Live reviews of one product.
pub type ReviewFeed = Binding<ReviewFeature>;

impl Binding<ReviewFeature> {
    /// Follows the reviews of a product.
    pub fn new(ctx: &RealtimeContext, product_id: Option<String>) -> Self {
        Self::bind(ctx, ReviewFeature::new(ctx.cache().clone()), product_id)
    }

    /// Replaces the REST snapshot after a fetch.
    pub fn apply_snapshot(&self, reviews: Vec<Review>) {
        self.modify(|state| state.reviews.replace_snapshot(reviews));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Harness;
    use serde_json::json;

    fn review(id: &str, rating: u8) -> Review {
        Review {
            id: id.to_string(),
            user_name: None,
            rating,
            comment: String::new(),
            created_at: None,
        }
    }

    fn posted(id: &str, rating: u8) -> Value {
        json!({"product_id": "P1", "review": {"_id": id, "rating": rating, "comment": "ok"}})
    }

    #[tokio::test]
    async fn test_new_review_merged_and_invalidated() {
        let harness = Harness::connected().await;
        let cache = harness.ctx.cache().clone();
        cache.store(keys::reviews("P1"), json!([]));
        let feed = ReviewFeed::new(&harness.ctx, Some("P1".to_string()));
        feed.apply_snapshot(vec![review("r1", 4)]);

        harness.push("new_review", posted("r2", 2)).await;
        harness.push("new_review", posted("r1", 4)).await;

        let state = feed.snapshot();
        let ids: Vec<String> = state.merged().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["r2", "r1"]);
        assert_eq!(state.average_rating(), Some(3.0));
        assert!(cache.is_stale(&keys::reviews("P1")));
    }

    #[tokio::test]
    async fn test_out_of_range_rating_dropped() {
        let harness = Harness::connected().await;
        let feed = ReviewFeed::new(&harness.ctx, Some("P1".to_string()));

        harness.push("new_review", posted("r1", 5)).await;
        harness
            .push(
                "new_review",
                json!({"product_id": "P1", "review": {"_id": "r2", "rating": 200}}),
            )
            .await;
        harness.push("new_review", posted("r3", 0)).await;

        let state = feed.snapshot();
        let ids: Vec<String> = state.merged().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["r1"]);
        assert_eq!(state.average_rating(), Some(5.0));
    }

    #[tokio::test]
    async fn test_average_skips_invalid_snapshot_ratings() {
        let harness = Harness::new();
        let feed = ReviewFeed::new(&harness.ctx, Some("P1".to_string()));
        feed.apply_snapshot(vec![review("r1", 4), review("r2", 255), review("r3", 2)]);

        assert_eq!(feed.snapshot().average_rating(), Some(3.0));
    }

    #[tokio::test]
    async fn test_no_reviews_no_average() {
        let harness = Harness::new();
        let feed = ReviewFeed::new(&harness.ctx, Some("P1".to_string()));
        assert_eq!(feed.snapshot().average_rating(), None);
    }
}
