use axum::{
    Form, Json,
    extract::{Query, State},
    http::{HeaderMap, HeaderName, HeaderValue},
    response::{IntoResponse, Response},
};
use futures::future::try_join_all;
use serde::Serialize;
use serde_json::{Map, Value, json};
use tracing::{debug, info};

use super::{Params, number_or, required};
use crate::middleware::RequireViewer;
use crate::service::RequestContext;
use crate::service::directory_cache::MAX_FRIEND_PAGE;
use crate::types::{Account, AccountJson, BookmarkJson, BookmarkKey, Page};
use crate::{ChowError, router::ChowState};

const START_NEXT: HeaderName = HeaderName::from_static("x-start-next");
const START_PREV: HeaderName = HeaderName::from_static("x-start-prev");
const COUNT: HeaderName = HeaderName::from_static("x-count");

/// A friend together with the restaurants they bookmarked.
#[derive(Debug, Clone, Serialize)]
pub struct FriendJson {
    #[serde(flatten)]
    pub user: AccountJson,
    pub labels: Vec<BookmarkJson>,
}

/// One page of the viewer's friends and the paging links around it.
pub struct FriendsPage {
    pub friends: Page<FriendJson>,
    pub count: usize,
}

impl FriendsPage {
    pub async fn load(
        state: &ChowState,
        viewer: &Account,
        ctx: &RequestContext,
        params: &Params,
    ) -> Result<Self, ChowError> {
        let start = number_or(params, "start", 0);
        let count = number_or(params, "count", state.friend_page_size()).clamp(1, MAX_FRIEND_PAGE);
        let page = state
            .users
            .friends_of(viewer, ctx.auth_token.as_deref(), start, count)
            .await?;

        let items = try_join_all(page.items.iter().map(|friend| async move {
            let owned = state.bookmarks.list_by_owner(friend).await?;
            Ok::<_, ChowError>(FriendJson {
                user: friend.json(state.site()),
                labels: state.bookmarks.hydrate(&state.users, &owned).await?,
            })
        }))
        .await?;
        Ok(Self {
            friends: Page::new(page.start, page.total, items),
            count,
        })
    }

    pub fn data(&self) -> Map<String, Value> {
        let mut data = Map::new();
        data.insert("viewer_friends".into(), json!(self.friends));
        data.insert(
            "friends_next_start".into(),
            json!(self.friends.next_start(self.count)),
        );
        data.insert(
            "friends_prev_start".into(),
            json!(self.friends.prev_start(self.count)),
        );
        data.insert("friends_count".into(), json!(self.count));
        data
    }

    /// Paging headers. Missing links are sent as empty strings.
    pub fn headers(&self) -> HeaderMap {
        let link = |start: Option<usize>| {
            start
                .map(HeaderValue::from)
                .unwrap_or_else(|| HeaderValue::from_static(""))
        };
        let mut headers = HeaderMap::new();
        headers.insert(START_NEXT, link(self.friends.next_start(self.count)));
        headers.insert(START_PREV, link(self.friends.prev_start(self.count)));
        headers.insert(COUNT, HeaderValue::from(self.count));
        headers
    }

    fn render(self) -> Response {
        (self.headers(), Json(Value::Object(self.data()))).into_response()
    }
}

pub async fn friends_json(
    State(state): State<ChowState>,
    RequireViewer(viewer, ctx): RequireViewer,
    Query(params): Query<Params>,
) -> Result<Response, ChowError> {
    Ok(FriendsPage::load(&state, &viewer, &ctx, &params)
        .await?
        .render())
}

/// Replace the invitee list of one of the viewer's bookmarks.
pub async fn invite_friends(
    State(state): State<ChowState>,
    RequireViewer(viewer, ctx): RequireViewer,
    Form(params): Form<Params>,
) -> Result<Response, ChowError> {
    let [label_id] = required(&params, ["label_id"])?;
    let invited: Vec<String> = params
        .get("invited_ids")
        .map(|ids| {
            ids.split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    match label_id.trim().parse::<BookmarkKey>() {
        Ok(key) => match state.bookmarks.set_invitees(&viewer, key, &invited).await? {
            Some(_) => info!(key, invited = invited.len(), "friends invited"),
            None => debug!(key, "invite ignored for bookmark not owned by viewer"),
        },
        Err(_) => debug!(label_id = %label_id, "invite ignored for malformed bookmark key"),
    }

    Ok(FriendsPage::load(&state, &viewer, &ctx, &params)
        .await?
        .render())
}
