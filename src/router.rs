use crate::api::{AppTokenSource, RemoteDirectory, SearchApi, build_http_client};
use crate::config::{Config, SessionConfig, SiteConfig};
use crate::db::ChowStorage;
use crate::error::ChowError;
use crate::handlers::{auth, friends, index, restaurants};
use crate::middleware::resolve_viewer;
use crate::service::{
    BookmarkLedger, DirectoryCache, IdentityResolver, PeopleDirectory, RestaurantProvider,
    SessionStore, UserDirectory, merge_actor,
};
use axum::{
    Json, Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use serde_json::{Value, json};
use std::sync::Arc;

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct ChowState {
    pub sessions: SessionStore,
    pub users: UserDirectory,
    pub bookmarks: BookmarkLedger,
    pub restaurants: RestaurantProvider,
    pub identity: IdentityResolver,
    session_cfg: Arc<SessionConfig>,
    auth_cookie_name: Arc<str>,
    friend_page_size: usize,
}

impl ChowState {
    /// Wire the services around an explicit people API and search client.
    pub async fn new(
        cfg: &Config,
        storage: ChowStorage,
        directory: Arc<dyn PeopleDirectory>,
        search: SearchApi,
    ) -> Result<Self, ChowError> {
        let sessions = SessionStore::new(&storage, cfg.session.timeout()).await?;
        let cache = DirectoryCache::new(directory, cfg.directory.cache_ttl());
        let users = UserDirectory::new(storage.clone(), cache, cfg.site.clone());
        let merges = merge_actor::spawn(storage.clone()).await?;
        Ok(Self {
            bookmarks: BookmarkLedger::new(storage.clone()),
            restaurants: RestaurantProvider::new(search, storage.clone(), cfg.search.clone()),
            identity: IdentityResolver::new(sessions.clone(), users.clone(), merges),
            session_cfg: Arc::new(cfg.session.clone()),
            auth_cookie_name: Arc::from(cfg.directory.auth_cookie_name()),
            friend_page_size: cfg.directory.friend_page_size.max(1),
            sessions,
            users,
        })
    }

    /// Connect to the configured database and remote services.
    pub async fn from_config(cfg: &Config) -> Result<Self, ChowError> {
        let storage = ChowStorage::connect(&cfg.basic.database_url).await?;
        let http = build_http_client(cfg.directory.proxy.as_ref())?;
        let app_token = AppTokenSource::new(http.clone(), &cfg.directory)?;
        let directory = Arc::new(RemoteDirectory::new(
            http.clone(),
            cfg.directory.base_url.clone(),
            app_token,
        ));
        let search = SearchApi::new(http, cfg.search.endpoint.clone());
        Self::new(cfg, storage, directory, search).await
    }

    pub fn session_config(&self) -> &SessionConfig {
        &self.session_cfg
    }

    pub fn auth_cookie_name(&self) -> &str {
        &self.auth_cookie_name
    }

    pub fn friend_page_size(&self) -> usize {
        self.friend_page_size
    }

    pub fn site(&self) -> &SiteConfig {
        self.users.site()
    }
}

pub fn chow_router(state: ChowState) -> Router {
    let app = Router::new()
        .route("/login", post(auth::login))
        .route("/register", post(auth::register))
        .route("/logout", get(auth::logout))
        .route("/json/friends", get(friends::friends_json))
        .route("/invite/friends", post(friends::invite_friends))
        .route("/json/restaurants/search", get(restaurants::search_json))
        .route("/json/restaurants/info", get(restaurants::info_json))
        .route(
            "/json/restaurants",
            get(restaurants::list_json)
                .post(restaurants::add_bookmark)
                .delete(restaurants::remove_bookmark),
        )
        .route("/json/index", get(index::index_json))
        .layer(from_fn_with_state(state.clone(), resolve_viewer));

    Router::new()
        .route("/healthz", get(healthz))
        .merge(app)
        .with_state(state)
}

async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
