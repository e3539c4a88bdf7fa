use crate::db::models::{DbRestaurant, timestamp};
use crate::db::sqlite::ChowStorage;
use crate::error::ChowError;
use crate::types::Restaurant;
use chrono::Utc;

impl ChowStorage {
    /// Upsert by restaurant id, refreshing the provider fields.
    pub async fn upsert_restaurant(&self, r: &Restaurant) -> Result<(), ChowError> {
        let categories = serde_json::to_string(&r.categories)?;
        sqlx::query(
            r#"
            INSERT INTO restaurants (
                restaurant_id, name, address, city, state, rating_average,
                rating_count, url, latitude, longitude, categories, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(restaurant_id) DO UPDATE SET
                name=excluded.name,
                address=excluded.address,
                city=excluded.city,
                state=excluded.state,
                rating_average=excluded.rating_average,
                rating_count=excluded.rating_count,
                url=excluded.url,
                latitude=excluded.latitude,
                longitude=excluded.longitude,
                categories=excluded.categories,
                updated_at=excluded.updated_at
            "#,
        )
        .bind(&r.restaurant_id)
        .bind(&r.name)
        .bind(&r.address)
        .bind(&r.city)
        .bind(&r.state)
        .bind(r.rating_average)
        .bind(r.rating_count)
        .bind(&r.url)
        .bind(r.location.map(|p| p.lat))
        .bind(r.location.map(|p| p.lng))
        .bind(categories)
        .bind(timestamp(Utc::now()))
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn restaurant(&self, restaurant_id: &str) -> Result<Option<Restaurant>, ChowError> {
        let row: Option<DbRestaurant> = sqlx::query_as(
            r#"SELECT restaurant_id, name, address, city, state, rating_average,
               rating_count, url, latitude, longitude, categories
               FROM restaurants WHERE restaurant_id = ?"#,
        )
        .bind(restaurant_id)
        .fetch_optional(self.pool())
        .await?;
        Ok(row.map(Restaurant::try_from).transpose()?)
    }

    pub async fn restaurants(&self, ids: &[String]) -> Result<Vec<Restaurant>, ChowError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<DbRestaurant> = sqlx::query_as(
            r#"SELECT restaurant_id, name, address, city, state, rating_average,
               rating_count, url, latitude, longitude, categories
               FROM restaurants
               WHERE restaurant_id IN (SELECT value FROM json_each(?))"#,
        )
        .bind(serde_json::to_string(ids)?)
        .fetch_all(self.pool())
        .await?;
        Ok(rows
            .into_iter()
            .map(Restaurant::try_from)
            .collect::<Result<Vec<_>, _>>()?)
    }
}
