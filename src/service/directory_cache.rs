//! Fetch-or-cache wrapper around the people API.
//!
//! Profiles are held in memory only, keyed by identity. Friend pages are keyed
//! by (token digest, start, count) so one viewer's page never leaks to another.

use crate::error::ChowError;
use crate::service::sessions::external_session_key;
use crate::types::{Account, Page, PeopleCollection, Person, RemoteProfile};
use async_trait::async_trait;
use moka::future::Cache;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Largest friends page the remote API is asked for.
pub const MAX_FRIEND_PAGE: usize = 50;

/// The remote people API.
#[async_trait]
pub trait PeopleDirectory: Send + Sync {
    /// One batched lookup by remote person id.
    async fn fetch_people(&self, ids: &[String]) -> Result<Vec<Person>, ChowError>;

    /// The person the auth token belongs to.
    async fn fetch_viewer(&self, auth_token: &str) -> Result<Person, ChowError>;

    async fn fetch_friends(
        &self,
        auth_token: &str,
        start: usize,
        count: usize,
    ) -> Result<PeopleCollection, ChowError>;
}

type FriendsKey = (String, usize, usize);

#[derive(Clone)]
pub struct DirectoryCache {
    remote: Arc<dyn PeopleDirectory>,
    profiles: Cache<String, RemoteProfile>,
    friends: Cache<FriendsKey, Page<Person>>,
}

impl DirectoryCache {
    pub fn new(remote: Arc<dyn PeopleDirectory>, ttl: Duration) -> Self {
        Self {
            remote,
            profiles: Cache::builder()
                .max_capacity(10_000)
                .time_to_live(ttl)
                .build(),
            friends: Cache::builder()
                .max_capacity(1_000)
                .time_to_live(ttl)
                .build(),
        }
    }

    pub async fn cached_profile(&self, identity: &str) -> Option<RemoteProfile> {
        self.profiles.get(identity).await
    }

    async fn remember(&self, person: &Person) {
        self.profiles
            .insert(person.id.clone(), person.profile())
            .await;
    }

    /// Attach profile data to every external account.
    ///
    /// Cache misses are fetched in a single batched call. A failed fetch is
    /// logged and the affected accounts are returned without a profile.
    pub async fn enrich(&self, mut accounts: Vec<Account>) -> Vec<Account> {
        let mut seen = HashSet::new();
        let mut misses = Vec::new();
        for account in &accounts {
            if let Account::External(ext) = account
                && ext.profile.is_none()
                && !self.profiles.contains_key(&ext.identity)
                && seen.insert(ext.identity.clone())
            {
                misses.push(ext.identity.clone());
            }
        }

        if !misses.is_empty() {
            debug!(count = misses.len(), "fetching uncached profiles");
            match self.remote.fetch_people(&misses).await {
                Ok(people) => {
                    for person in &people {
                        self.remember(person).await;
                    }
                }
                Err(e) => {
                    warn!(error = %e, count = misses.len(), "profile lookup failed; continuing without profiles");
                }
            }
        }

        for account in &mut accounts {
            if let Account::External(ext) = account
                && ext.profile.is_none()
            {
                ext.profile = self.profiles.get(&ext.identity).await;
            }
        }
        accounts
    }

    /// Resolve the person behind an auth token and cache their profile.
    pub async fn viewer(&self, auth_token: &str) -> Result<Person, ChowError> {
        let person = self.remote.fetch_viewer(auth_token).await?;
        self.remember(&person).await;
        Ok(person)
    }

    /// One page of the viewer's friends. `count` is clamped to `1..=50`.
    pub async fn friends(
        &self,
        auth_token: &str,
        start: usize,
        count: usize,
    ) -> Result<Page<Person>, ChowError> {
        let count = count.clamp(1, MAX_FRIEND_PAGE);
        let key = (external_session_key(auth_token), start, count);
        if let Some(page) = self.friends.get(&key).await {
            return Ok(page);
        }

        let collection = self.remote.fetch_friends(auth_token, start, count).await?;
        for person in &collection.entry {
            self.remember(person).await;
        }
        let page = Page::new(start, collection.total_results, collection.entry);
        self.friends.insert(key, page.clone()).await;
        Ok(page)
    }
}
