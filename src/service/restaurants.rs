use crate::api::search_api::{SearchApi, lookup_statement, search_statement};
use crate::config::SearchConfig;
use crate::db::ChowStorage;
use crate::error::ChowError;
use crate::types::Restaurant;
use moka::future::Cache;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

/// Restaurant lookups backed by the remote search service.
///
/// Search results are cached per query statement and individual restaurants
/// per id. A restaurant reaches the database only once it is bookmarked.
#[derive(Clone)]
pub struct RestaurantProvider {
    api: SearchApi,
    storage: ChowStorage,
    config: SearchConfig,
    queries: Cache<String, Vec<Restaurant>>,
    restaurants: Cache<String, Restaurant>,
}

impl RestaurantProvider {
    pub fn new(api: SearchApi, storage: ChowStorage, config: SearchConfig) -> Self {
        let ttl = config.cache_ttl();
        Self {
            api,
            storage,
            config,
            queries: Cache::builder().max_capacity(1_000).time_to_live(ttl).build(),
            restaurants: Cache::builder()
                .max_capacity(10_000)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Search near `location`. A remote failure yields an empty list.
    pub async fn search(&self, term: &str, location: &str) -> Vec<Restaurant> {
        let statement = search_statement(term, location, &self.config.category, self.config.results);
        match self.cached_query(&statement).await {
            Ok(found) => found,
            Err(e) => {
                warn!(error = %e, term = %term, location = %location, "restaurant search failed");
                Vec::new()
            }
        }
    }

    /// Memory cache, then the database, then the remote service.
    ///
    /// A failing remote lookup is treated as not found.
    pub async fn get_restaurant(&self, restaurant_id: &str) -> Result<Option<Restaurant>, ChowError> {
        if let Some(hit) = self.restaurants.get(restaurant_id).await {
            return Ok(Some(hit));
        }
        if let Some(stored) = self.storage.restaurant(restaurant_id).await? {
            self.remember(&stored).await;
            return Ok(Some(stored));
        }
        let Some(statement) = lookup_statement(restaurant_id) else {
            debug!(restaurant_id = %restaurant_id, "rejecting malformed restaurant id");
            return Ok(None);
        };
        match self.cached_query(&statement).await {
            Ok(found) => Ok(found.into_iter().find(|r| r.restaurant_id == restaurant_id)),
            Err(e) => {
                warn!(restaurant_id = %restaurant_id, error = %e, "restaurant lookup failed");
                Ok(None)
            }
        }
    }

    async fn cached_query(&self, statement: &str) -> Result<Vec<Restaurant>, ChowError> {
        let key = hex::encode(Sha256::digest(statement.as_bytes()));
        if let Some(hit) = self.queries.get(&key).await {
            return Ok(hit);
        }
        let found = self.api.query(statement).await?;
        for restaurant in &found {
            self.remember(restaurant).await;
        }
        self.queries.insert(key, found.clone()).await;
        Ok(found)
    }

    async fn remember(&self, restaurant: &Restaurant) {
        self.restaurants
            .insert(restaurant.restaurant_id.clone(), restaurant.clone())
            .await;
    }

    /// Seed the restaurant cache, as a search result would.
    pub async fn prime(&self, restaurant: Restaurant) {
        self.remember(&restaurant).await;
    }
}
