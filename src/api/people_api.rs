use crate::api::{AppTokenSource, default_retry_policy};
use crate::error::{ChowError, IsRetryable};
use crate::service::directory_cache::PeopleDirectory;
use crate::types::{PeopleBatch, PeopleCollection, Person};
use async_trait::async_trait;
use backon::Retryable;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// People API client. Batch lookups use the app token, viewer calls use the
/// viewer's own auth token.
#[derive(Clone)]
pub struct RemoteDirectory {
    client: reqwest::Client,
    base_url: Url,
    app_token: AppTokenSource,
}

impl RemoteDirectory {
    pub fn new(client: reqwest::Client, base_url: Url, app_token: AppTokenSource) -> Self {
        Self {
            client,
            base_url,
            app_token,
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url, ChowError> {
        // "./" keeps "people:batchGet" from parsing as a scheme.
        Ok(self.base_url.join(&format!("./{path}"))?)
    }

    async fn send_json<T>(
        &self,
        what: &'static str,
        build: impl Fn() -> reqwest::RequestBuilder + Send + Sync,
    ) -> Result<T, ChowError>
    where
        T: DeserializeOwned + Send,
    {
        (|| async {
            let resp = build().send().await?;
            let status = resp.status();
            if !status.is_success() {
                return Err(ChowError::UpstreamStatus(status));
            }
            Ok::<_, ChowError>(resp.json::<T>().await?)
        })
        .retry(default_retry_policy())
        .when(|e: &ChowError| e.is_retryable())
        .notify(|err, dur: Duration| {
            warn!("{} retrying after error {}, sleeping {:?}", what, err, dur);
        })
        .await
    }
}

#[async_trait]
impl PeopleDirectory for RemoteDirectory {
    async fn fetch_people(&self, ids: &[String]) -> Result<Vec<Person>, ChowError> {
        let url = self.endpoint("people:batchGet")?;
        let token = self.app_token.token().await?;
        let body = json!({ "ids": ids, "fields": ["profileUrl"] });
        let batch: PeopleBatch = self
            .send_json("people:batchGet", || {
                self.client
                    .post(url.clone())
                    .bearer_auth(&token)
                    .json(&body)
            })
            .await?;
        debug!(requested = ids.len(), returned = batch.people.len(), "people batch fetched");
        Ok(batch.people)
    }

    async fn fetch_viewer(&self, auth_token: &str) -> Result<Person, ChowError> {
        let url = self.endpoint("people/@me/@self")?;
        self.send_json("people/@me/@self", || {
            self.client
                .get(url.clone())
                .query(&[("fields", "profileUrl")])
                .bearer_auth(auth_token)
        })
        .await
    }

    async fn fetch_friends(
        &self,
        auth_token: &str,
        start: usize,
        count: usize,
    ) -> Result<PeopleCollection, ChowError> {
        let url = self.endpoint("people/@me/@friends")?;
        let (start, count) = (start.to_string(), count.to_string());
        self.send_json("people/@me/@friends", || {
            self.client
                .get(url.clone())
                .query(&[
                    ("startIndex", start.as_str()),
                    ("count", count.as_str()),
                    ("fields", "profileUrl"),
                ])
                .bearer_auth(auth_token)
        })
        .await
    }
}
