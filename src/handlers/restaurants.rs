use axum::{
    Form, Json,
    extract::{Query, State},
};
use serde_json::{Map, Value, json};
use tracing::debug;

use super::{Params, required};
use crate::middleware::RequireViewer;
use crate::types::{Account, BookmarkKey, DEFAULT_NOTE};
use crate::{ChowError, router::ChowState};

/// The viewer's own bookmarks ("labels") and the ones they were invited to.
pub async fn restaurants_data(
    state: &ChowState,
    viewer: &Account,
) -> Result<Map<String, Value>, ChowError> {
    let labels = state.bookmarks.list_by_owner(viewer).await?;
    let invites = state.bookmarks.list_by_invitee(viewer).await?;

    let mut data = Map::new();
    data.insert(
        "labels".into(),
        json!(state.bookmarks.hydrate(&state.users, &labels).await?),
    );
    data.insert(
        "invites".into(),
        json!(state.bookmarks.hydrate(&state.users, &invites).await?),
    );
    Ok(data)
}

pub async fn search_json(
    State(state): State<ChowState>,
    Query(params): Query<Params>,
) -> Result<Json<Value>, ChowError> {
    let [term, location] = required(&params, ["term", "location"])?;
    let found = state.restaurants.search(term, location).await;
    Ok(Json(json!({ "restaurants": found })))
}

pub async fn info_json(
    State(state): State<ChowState>,
    Query(params): Query<Params>,
) -> Result<Json<Value>, ChowError> {
    let [restaurant_id] = required(&params, ["restaurant_id"])?;
    let restaurant = state
        .restaurants
        .get_restaurant(restaurant_id)
        .await?
        .ok_or_else(|| ChowError::RestaurantNotFound(restaurant_id.to_string()))?;
    Ok(Json(json!({ "restaurant": restaurant })))
}

pub async fn list_json(
    State(state): State<ChowState>,
    RequireViewer(viewer, _): RequireViewer,
) -> Result<Json<Value>, ChowError> {
    Ok(Json(Value::Object(restaurants_data(&state, &viewer).await?)))
}

/// Bookmark a restaurant with the default note.
pub async fn add_bookmark(
    State(state): State<ChowState>,
    RequireViewer(viewer, _): RequireViewer,
    Form(params): Form<Params>,
) -> Result<Json<Value>, ChowError> {
    let [restaurant_id] = required(&params, ["restaurant_id"])?;
    let restaurant = state
        .restaurants
        .get_restaurant(restaurant_id)
        .await?
        .ok_or_else(|| ChowError::RestaurantNotFound(restaurant_id.to_string()))?;
    state.bookmarks.add(&viewer, &restaurant, DEFAULT_NOTE).await?;
    Ok(Json(Value::Object(restaurants_data(&state, &viewer).await?)))
}

/// Delete one of the viewer's bookmarks. Anything else is left alone.
pub async fn remove_bookmark(
    State(state): State<ChowState>,
    RequireViewer(viewer, _): RequireViewer,
    Query(params): Query<Params>,
) -> Result<Json<Value>, ChowError> {
    let [key] = required(&params, ["key"])?;
    match key.trim().parse::<BookmarkKey>() {
        Ok(key) => {
            if !state.bookmarks.remove(&viewer, key).await? {
                debug!(key, "delete ignored for bookmark not owned by viewer");
            }
        }
        Err(_) => debug!(key = %key, "delete ignored for malformed bookmark key"),
    }
    Ok(Json(Value::Object(restaurants_data(&state, &viewer).await?)))
}
