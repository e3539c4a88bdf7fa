use chrono::{DateTime, Utc};
use serde::Serialize;

use super::account::AccountJson;
use super::restaurant::RestaurantJson;

pub type BookmarkKey = i64;

/// Note used when a restaurant is bookmarked from the list view.
pub const DEFAULT_NOTE: &str = "try";

/// A user's intent to visit a restaurant ("label").
#[derive(Debug, Clone, PartialEq)]
pub struct Bookmark {
    pub key: BookmarkKey,
    pub owner: String,
    pub restaurant_id: String,
    pub note: String,
    pub invitees: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

impl Bookmark {
    pub fn is_owned_by(&self, identity: &str) -> bool {
        self.owner == identity
    }
}

/// Bookmark with its owner, restaurant and invitees resolved for output.
#[derive(Debug, Clone, Serialize)]
pub struct BookmarkJson {
    pub key: BookmarkKey,
    pub user: AccountJson,
    pub restaurant: RestaurantJson,
    pub text: String,
    pub invitees: Vec<AccountJson>,
}
