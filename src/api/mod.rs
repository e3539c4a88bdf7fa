pub mod app_token;
pub mod people_api;
pub mod search_api;

use crate::error::ChowError;
use backon::ExponentialBuilder;
use std::time::Duration;
use url::Url;

pub use app_token::AppTokenSource;
pub use people_api::RemoteDirectory;
pub use search_api::SearchApi;

pub(crate) fn default_retry_policy() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(200))
        .with_max_delay(Duration::from_secs(2))
        .with_max_times(2)
        .with_jitter()
}

/// Shared outbound HTTP client, optionally routed through a proxy.
pub fn build_http_client(proxy: Option<&Url>) -> Result<reqwest::Client, ChowError> {
    let mut builder = reqwest::Client::builder()
        .user_agent(concat!("chow-down/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(5))
        .timeout(Duration::from_secs(15));
    if let Some(proxy_url) = proxy {
        builder = builder.proxy(reqwest::Proxy::all(proxy_url.as_str())?);
    }
    Ok(builder.build()?)
}
