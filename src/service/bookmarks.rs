use crate::db::ChowStorage;
use crate::error::ChowError;
use crate::service::users::UserDirectory;
use crate::types::{Account, Bookmark, BookmarkJson, BookmarkKey, Restaurant, RestaurantJson};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// Most bookmarks returned by a listing.
pub const LIST_LIMIT: i64 = 100;

#[derive(Clone)]
pub struct BookmarkLedger {
    storage: ChowStorage,
}

impl BookmarkLedger {
    pub fn new(storage: ChowStorage) -> Self {
        Self { storage }
    }

    /// Bookmark a restaurant. Adding the same (restaurant, note) twice
    /// returns the first bookmark.
    pub async fn add(
        &self,
        account: &Account,
        restaurant: &Restaurant,
        note: &str,
    ) -> Result<Bookmark, ChowError> {
        self.storage.upsert_restaurant(restaurant).await?;
        let bookmark = self
            .storage
            .insert_bookmark_if_absent(account.identity(), &restaurant.restaurant_id, note)
            .await?;
        debug!(
            key = bookmark.key,
            owner = %bookmark.owner,
            restaurant = %bookmark.restaurant_id,
            "bookmark stored"
        );
        Ok(bookmark)
    }

    /// Remove a bookmark owned by `account`. Returns false otherwise.
    pub async fn remove(&self, account: &Account, key: BookmarkKey) -> Result<bool, ChowError> {
        match self.storage.bookmark(key).await? {
            Some(b) if b.is_owned_by(account.identity()) => self.storage.delete_bookmark(key).await,
            _ => Ok(false),
        }
    }

    pub async fn get(&self, key: BookmarkKey) -> Result<Option<Bookmark>, ChowError> {
        self.storage.bookmark(key).await
    }

    pub async fn list_by_owner(&self, account: &Account) -> Result<Vec<Bookmark>, ChowError> {
        self.storage
            .bookmarks_by_owner(account.identity(), LIST_LIMIT)
            .await
    }

    pub async fn list_by_invitee(&self, account: &Account) -> Result<Vec<Bookmark>, ChowError> {
        self.storage
            .bookmarks_by_invitee(account.identity(), LIST_LIMIT)
            .await
    }

    /// Replace the invitee list of a bookmark owned by `account`.
    ///
    /// The owner and repeated identities are dropped. Returns `None` when the
    /// bookmark is missing or belongs to someone else.
    pub async fn set_invitees(
        &self,
        account: &Account,
        key: BookmarkKey,
        identities: &[String],
    ) -> Result<Option<Bookmark>, ChowError> {
        match self.storage.bookmark(key).await? {
            Some(b) if b.is_owned_by(account.identity()) => {}
            _ => return Ok(None),
        }
        let mut seen = HashSet::new();
        let invitees: Vec<String> = identities
            .iter()
            .filter(|id| !id.is_empty() && id.as_str() != account.identity())
            .filter(|id| seen.insert(id.as_str()))
            .cloned()
            .collect();
        self.storage.replace_invitees(key, &invitees).await?;
        info!(key, count = invitees.len(), "invitees updated");
        self.storage.bookmark(key).await
    }

    /// Resolve owners, restaurants and invitees for output.
    ///
    /// Bookmarks whose restaurant row is missing are skipped.
    pub async fn hydrate(
        &self,
        users: &UserDirectory,
        bookmarks: &[Bookmark],
    ) -> Result<Vec<BookmarkJson>, ChowError> {
        let mut identities = Vec::new();
        let mut restaurant_ids = Vec::new();
        for b in bookmarks {
            identities.push(b.owner.clone());
            identities.extend(b.invitees.iter().cloned());
            restaurant_ids.push(b.restaurant_id.clone());
        }
        identities.sort();
        identities.dedup();
        restaurant_ids.sort();
        restaurant_ids.dedup();

        let site = users.site();
        let accounts: HashMap<String, _> = users
            .get_by_identities(&identities)
            .await?
            .into_iter()
            .map(|a| (a.identity().to_string(), a.json(site)))
            .collect();
        let restaurants: HashMap<String, RestaurantJson> = self
            .storage
            .restaurants(&restaurant_ids)
            .await?
            .into_iter()
            .map(|r| (r.restaurant_id.clone(), r.json()))
            .collect();

        Ok(bookmarks
            .iter()
            .filter_map(|b| {
                Some(BookmarkJson {
                    key: b.key,
                    user: accounts.get(&b.owner)?.clone(),
                    restaurant: restaurants.get(&b.restaurant_id)?.clone(),
                    text: b.note.clone(),
                    invitees: b
                        .invitees
                        .iter()
                        .filter_map(|id| accounts.get(id).cloned())
                        .collect(),
                })
            })
            .collect())
    }
}
