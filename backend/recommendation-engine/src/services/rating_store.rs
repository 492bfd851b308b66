use crate::error::{RecommendError, Result};
use crate::models::{ItemMetadata, Rating};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{info, warn};

/// In-memory rating index
///
/// Built once from loaded records and read-only afterwards. Lookups never
/// create entries; an absent user or item is reported as `UnknownEntity`.
///
/// The item universe is the union of items with metadata and items that
/// appear in at least one rating.
#[derive(Debug, Clone, Default)]
pub struct RatingStore {
    by_user: BTreeMap<u32, BTreeMap<u32, Rating>>,
    raters_by_item: BTreeMap<u32, BTreeSet<u32>>,
    metadata: BTreeMap<u32, ItemMetadata>,
    item_ids: BTreeSet<u32>,
    rating_count: usize,
}

impl RatingStore {
    /// Index ratings and item metadata
    ///
    /// A repeated (user, item) pair keeps the last rating seen.
    pub fn new<R, I>(ratings: R, items: I) -> Self
    where
        R: IntoIterator<Item = Rating>,
        I: IntoIterator<Item = ItemMetadata>,
    {
        let mut store = Self::default();

        for item in items {
            store.item_ids.insert(item.item_id);
            store.metadata.insert(item.item_id, item);
        }

        for rating in ratings {
            let (user_id, item_id) = (rating.user_id, rating.item_id);
            let previous = store
                .by_user
                .entry(user_id)
                .or_default()
                .insert(item_id, rating);

            if previous.is_some() {
                warn!(user_id, item_id, "Duplicate rating replaced");
            } else {
                store.rating_count += 1;
            }

            store.raters_by_item.entry(item_id).or_default().insert(user_id);
            store.item_ids.insert(item_id);
        }

        info!(
            users = store.by_user.len(),
            items = store.item_ids.len(),
            ratings = store.rating_count,
            "Rating store built"
        );

        store
    }

    pub fn contains_user(&self, user_id: u32) -> bool {
        self.by_user.contains_key(&user_id)
    }

    pub fn contains_item(&self, item_id: u32) -> bool {
        self.item_ids.contains(&item_id)
    }

    /// All ratings made by a user, keyed by item id
    pub fn user_ratings(&self, user_id: u32) -> Result<&BTreeMap<u32, Rating>> {
        self.by_user
            .get(&user_id)
            .ok_or_else(|| RecommendError::unknown_user(user_id))
    }

    /// All ratings received by an item, in ascending user id order
    ///
    /// A known item without ratings yields an empty list.
    pub fn item_ratings(&self, item_id: u32) -> Result<Vec<&Rating>> {
        if !self.contains_item(item_id) {
            return Err(RecommendError::unknown_item(item_id));
        }

        let ratings = self
            .raters_by_item
            .get(&item_id)
            .into_iter()
            .flatten()
            .filter_map(|user_id| self.rating(*user_id, item_id))
            .collect();

        Ok(ratings)
    }

    pub fn rating(&self, user_id: u32, item_id: u32) -> Option<&Rating> {
        self.by_user.get(&user_id).and_then(|items| items.get(&item_id))
    }

    pub fn score(&self, user_id: u32, item_id: u32) -> Option<f64> {
        self.rating(user_id, item_id).map(|r| f64::from(r.score))
    }

    pub fn item(&self, item_id: u32) -> Option<&ItemMetadata> {
        self.metadata.get(&item_id)
    }

    /// User ids in ascending order
    pub fn user_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.by_user.keys().copied()
    }

    /// Item ids in ascending order
    pub fn item_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.item_ids.iter().copied()
    }

    pub fn num_users(&self) -> usize {
        self.by_user.len()
    }

    pub fn num_items(&self) -> usize {
        self.item_ids.len()
    }

    pub fn num_ratings(&self) -> usize {
        self.rating_count
    }
}
