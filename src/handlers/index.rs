use axum::{
    Json,
    extract::{Query, State},
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use tracing::warn;

use super::Params;
use super::friends::FriendsPage;
use super::restaurants::restaurants_data;
use crate::middleware::RequireViewer;
use crate::{ChowError, router::ChowState};

/// The landing page: viewer, a page of friends and the viewer's restaurants.
///
/// A failing friends fetch leaves the friends keys out rather than failing
/// the whole page.
pub async fn index_json(
    State(state): State<ChowState>,
    RequireViewer(viewer, ctx): RequireViewer,
    Query(params): Query<Params>,
) -> Result<Response, ChowError> {
    let mut data = restaurants_data(&state, &viewer).await?;
    data.insert("viewer".into(), json!(viewer.json(state.site())));
    data.insert("site_title".into(), json!(state.site().title));

    match FriendsPage::load(&state, &viewer, &ctx, &params).await {
        Ok(friends) => {
            let headers = friends.headers();
            data.extend(friends.data());
            Ok((headers, Json(Value::Object(data))).into_response())
        }
        Err(e) => {
            warn!(identity = %viewer.identity(), error = %e, "friends unavailable for index");
            Ok(Json(Value::Object(data)).into_response())
        }
    }
}
