//! Local-search lookups over the YQL web service.

use crate::api::default_retry_policy;
use crate::error::{ChowError, IsRetryable};
use crate::types::{GeoPoint, Restaurant};
use backon::Retryable;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

const RESTAURANT_FIELDS: &str = "id, Title, Address, City, State, Rating.AverageRating, \
     Rating.TotalRatings, BusinessUrl, Categories, Latitude, Longitude";

#[derive(Clone)]
pub struct SearchApi {
    client: reqwest::Client,
    endpoint: Url,
}

impl SearchApi {
    pub fn new(client: reqwest::Client, endpoint: Url) -> Self {
        Self { client, endpoint }
    }

    /// Run a YQL statement and parse every returned restaurant.
    pub async fn query(&self, yql: &str) -> Result<Vec<Restaurant>, ChowError> {
        debug!(yql = %yql, "fetching yql query");
        let body: YqlEnvelope = (|| async {
            let resp = self
                .client
                .get(self.endpoint.clone())
                .query(&[("q", yql), ("format", "json")])
                .send()
                .await?;
            let status = resp.status();
            if !status.is_success() {
                return Err(ChowError::UpstreamStatus(status));
            }
            Ok::<_, ChowError>(resp.json::<YqlEnvelope>().await?)
        })
        .retry(default_retry_policy())
        .when(|e: &ChowError| e.is_retryable())
        .notify(|err, dur: Duration| {
            warn!("yql query retrying after error {}, sleeping {:?}", err, dur);
        })
        .await?;
        Ok(body.into_restaurants())
    }
}

/// Restaurants matching `term` near `location`, capped at `limit`.
pub fn search_statement(term: &str, location: &str, category: &str, limit: usize) -> String {
    format!(
        r#"select {RESTAURANT_FIELDS} from local.search where query="{}" and location="{}" and category="{}" limit {limit} offset 0"#,
        escape(term),
        escape(location),
        escape(category),
    )
}

/// Single-restaurant lookup. `None` for ids that are not plain tokens.
pub fn lookup_statement(restaurant_id: &str) -> Option<String> {
    let plain = !restaurant_id.is_empty()
        && restaurant_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    plain.then(|| {
        format!("select {RESTAURANT_FIELDS} from local.search(1) where id={restaurant_id}")
    })
}

fn escape(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('"', "\\\"")
}

#[derive(Debug, Deserialize)]
struct YqlEnvelope {
    query: Option<YqlQuery>,
}

#[derive(Debug, Deserialize)]
struct YqlQuery {
    #[serde(default)]
    count: Value,
    results: Option<YqlResults>,
}

#[derive(Debug, Deserialize)]
struct YqlResults {
    #[serde(rename = "Result")]
    result: OneOrMany<YqlRestaurant>,
}

/// The service returns a bare object when there is exactly one result.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => vec![item],
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct YqlRestaurant {
    #[serde(rename = "id")]
    id: String,
    title: String,
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    rating: Option<YqlRating>,
    #[serde(default)]
    business_url: Option<String>,
    #[serde(default)]
    categories: Option<YqlCategories>,
    #[serde(default)]
    latitude: Value,
    #[serde(default)]
    longitude: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct YqlRating {
    #[serde(default)]
    average_rating: Value,
    #[serde(default)]
    total_ratings: Value,
}

#[derive(Debug, Deserialize)]
struct YqlCategories {
    #[serde(rename = "Category")]
    category: Option<OneOrMany<YqlCategory>>,
}

#[derive(Debug, Deserialize)]
struct YqlCategory {
    content: String,
}

/// Numbers arrive either as JSON numbers or as strings such as "NaN".
fn number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|n| n.is_finite())
}

impl YqlEnvelope {
    fn into_restaurants(self) -> Vec<Restaurant> {
        let Some(query) = self.query else {
            return Vec::new();
        };
        if number(&query.count).unwrap_or(0.0) < 1.0 {
            return Vec::new();
        }
        query
            .results
            .map(|r| r.result.into_vec())
            .unwrap_or_default()
            .into_iter()
            .map(Restaurant::from)
            .collect()
    }
}

impl From<YqlRestaurant> for Restaurant {
    fn from(r: YqlRestaurant) -> Self {
        let (rating_average, rating_count) = match &r.rating {
            Some(rating) => (
                number(&rating.average_rating).unwrap_or(-1.0),
                number(&rating.total_ratings).map_or(0, |n| n as i64),
            ),
            None => (-1.0, 0),
        };
        let location = match (number(&r.latitude), number(&r.longitude)) {
            (Some(lat), Some(lng)) => Some(GeoPoint { lat, lng }),
            _ => None,
        };
        let categories = r
            .categories
            .and_then(|c| c.category)
            .map(|c| c.into_vec().into_iter().map(|c| c.content).collect())
            .unwrap_or_default();
        Restaurant {
            restaurant_id: r.id,
            name: r.title,
            address: r.address,
            city: r.city,
            state: r.state,
            rating_average,
            rating_count,
            url: r.business_url,
            location,
            categories,
        }
    }
}
