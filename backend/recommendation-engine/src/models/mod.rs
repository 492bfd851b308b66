use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single user's score for an item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub user_id: u32,
    pub item_id: u32,
    pub score: u8,
    pub timestamp: DateTime<Utc>,
}

/// Descriptive item record, opaque to the prediction engine apart from `item_id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemMetadata {
    pub item_id: u32,
    pub title: String,
    pub release: Option<NaiveDate>,
    pub video_release: Option<NaiveDate>,
    pub url: Option<String>,
    pub genres: Vec<bool>,
}

/// Which axis of the rating matrix two entities are compared along
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Dimension {
    /// Two users compared over the items both rated
    Users,
    /// Two items compared over the users who rated both
    Items,
}

impl Dimension {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::Users => "users",
            Dimension::Items => "items",
        }
    }
}

/// Other-dimension id -> (score of a, score of b), restricted to keys both entities rated
pub type SharedPreferenceSet = BTreeMap<u32, (f64, f64)>;

/// An id paired with a similarity or predicted score
pub type ScoredId = (u32, f64);

/// Simple or Bayesian average of one item's ratings
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ItemAverage {
    pub item_id: u32,
    pub average: f64,
    pub count: usize,
}
