//! Two-legged access to the people API via the OAuth2 client-credentials grant.

use crate::config::DirectoryConfig;
use crate::error::ChowError;
use chrono::{DateTime, Utc};
use oauth2::basic::BasicClient;
use oauth2::{ClientId, ClientSecret, EndpointNotSet, EndpointSet, TokenResponse, TokenUrl};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

type AppOauth2Client =
    BasicClient<EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Tokens are replaced this long before they actually expire, at most half
/// their lifetime.
const EXPIRY_MARGIN_SECS: i64 = 60;
/// Assumed lifetime when the server does not send `expires_in`.
const DEFAULT_LIFETIME_SECS: i64 = 300;

#[derive(Debug, Clone)]
struct CachedToken {
    secret: String,
    refresh_after: DateTime<Utc>,
}

/// Fetches and caches the application's own access token.
#[derive(Clone)]
pub struct AppTokenSource {
    http: reqwest::Client,
    oauth: Option<AppOauth2Client>,
    cached: Arc<RwLock<Option<CachedToken>>>,
}

impl AppTokenSource {
    pub fn new(http: reqwest::Client, cfg: &DirectoryConfig) -> Result<Self, ChowError> {
        let oauth = if cfg.client_id.is_empty() {
            None
        } else {
            Some(
                BasicClient::new(ClientId::new(cfg.client_id.clone()))
                    .set_client_secret(ClientSecret::new(cfg.client_secret.clone()))
                    .set_token_uri(TokenUrl::new(cfg.token_url.to_string())?),
            )
        };
        Ok(Self {
            http,
            oauth,
            cached: Arc::new(RwLock::new(None)),
        })
    }

    /// A valid app access token, fetched on first use and after expiry.
    pub async fn token(&self) -> Result<String, ChowError> {
        if let Some(t) = self.cached.read().await.as_ref()
            && t.refresh_after > Utc::now()
        {
            return Ok(t.secret.clone());
        }

        let mut guard = self.cached.write().await;
        // Another task may have refreshed while we waited for the lock.
        if let Some(t) = guard.as_ref()
            && t.refresh_after > Utc::now()
        {
            return Ok(t.secret.clone());
        }

        let Some(oauth) = self.oauth.as_ref() else {
            return Err(ChowError::Oauth2Token(
                "client credentials are not configured".to_string(),
            ));
        };
        debug!("requesting app access token");
        let resp = oauth
            .exchange_client_credentials()
            .request_async(&self.http)
            .await?;
        let lifetime = resp
            .expires_in()
            .and_then(|d| chrono::Duration::from_std(d).ok())
            .unwrap_or_else(|| chrono::Duration::seconds(DEFAULT_LIFETIME_SECS));
        let token = CachedToken {
            secret: resp.access_token().secret().clone(),
            refresh_after: refresh_after(Utc::now(), lifetime),
        };
        info!(refresh_after = %token.refresh_after, "app access token acquired");
        let secret = token.secret.clone();
        *guard = Some(token);
        Ok(secret)
    }
}

fn refresh_after(now: DateTime<Utc>, lifetime: chrono::Duration) -> DateTime<Utc> {
    let margin = chrono::Duration::seconds(EXPIRY_MARGIN_SECS).min(lifetime / 2);
    now + lifetime - margin
}
