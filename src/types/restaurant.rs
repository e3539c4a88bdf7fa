use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Restaurant {
    pub restaurant_id: String,
    pub name: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    /// 0.0 to 5.0, or -1.0 when the provider had no usable rating.
    pub rating_average: f64,
    pub rating_count: i64,
    pub url: Option<String>,
    pub location: Option<GeoPoint>,
    pub categories: Vec<String>,
}

impl Restaurant {
    pub fn json(&self) -> RestaurantJson {
        RestaurantJson {
            restaurant_id: self.restaurant_id.clone(),
            name: self.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RestaurantJson {
    pub restaurant_id: String,
    pub name: String,
}
