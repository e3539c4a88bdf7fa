//! Layered configuration: compiled defaults, then `config.toml`, then
//! `CHOWDOWN_*` environment variables (`__` separates sections).

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub basic: BasicConfig,
    pub session: SessionConfig,
    pub directory: DirectoryConfig,
    pub search: SearchConfig,
    pub site: SiteConfig,
}

impl Config {
    pub fn load() -> Result<Self, figment::Error> {
        Self::figment().extract()
    }

    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file("config.toml"))
            .merge(Env::prefixed("CHOWDOWN_").split("__"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BasicConfig {
    pub listen_addr: String,
    pub database_url: String,
    pub loglevel: String,
}

impl Default for BasicConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8000".to_string(),
            database_url: "sqlite:chowdown.sqlite".to_string(),
            loglevel: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub cookie_name: String,
    pub cookie_path: String,
    pub timeout_secs: u64,
    /// How often expired sessions are swept from the store.
    pub purge_interval_secs: u64,
    /// Drop the `Secure` attribute, for plain-HTTP development.
    pub insecure_cookie: bool,
}

impl SessionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn purge_interval(&self) -> Duration {
        Duration::from_secs(self.purge_interval_secs.max(1))
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "sessid".to_string(),
            cookie_path: "/".to_string(),
            timeout_secs: 3600,
            purge_interval_secs: 300,
            insecure_cookie: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    pub base_url: Url,
    pub token_url: Url,
    pub client_id: String,
    pub client_secret: String,
    pub site_id: String,
    /// Overrides the `fcauth<site_id>` default when set.
    pub auth_cookie_name: Option<String>,
    pub cache_ttl_secs: u64,
    pub friend_page_size: usize,
    pub proxy: Option<Url>,
}

impl DirectoryConfig {
    pub fn auth_cookie_name(&self) -> String {
        self.auth_cookie_name
            .clone()
            .unwrap_or_else(|| format!("fcauth{}", self.site_id))
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse("https://people.example.com/api/")
                .expect("static directory url is valid"),
            token_url: Url::parse("https://people.example.com/oauth/token")
                .expect("static token url is valid"),
            client_id: String::new(),
            client_secret: String::new(),
            site_id: String::new(),
            auth_cookie_name: None,
            cache_ttl_secs: 3600,
            friend_page_size: 2,
            proxy: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub endpoint: Url,
    pub results: usize,
    pub category: String,
    pub cache_ttl_secs: u64,
}

impl SearchConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: Url::parse("https://query.yahooapis.com/v1/public/yql")
                .expect("static search url is valid"),
            results: 5,
            // Local-search category code for "Restaurants".
            category: "96926236".to_string(),
            cache_ttl_secs: 3600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub title: String,
    /// `{}` is replaced with the avatar file name.
    pub thumbnail_url_template: String,
    pub default_thumbnail: String,
}

impl SiteConfig {
    pub fn thumbnail_url(&self, image: &str) -> String {
        self.thumbnail_url_template.replace("{}", image)
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: "The Chow Down".to_string(),
            thumbnail_url_template: "/static/profilephotos/{}".to_string(),
            default_thumbnail: "anon01.gif".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_cookie_defaults_to_site_scoped_name() {
        let mut cfg = DirectoryConfig::default();
        cfg.site_id = "0123".to_string();
        assert_eq!(cfg.auth_cookie_name(), "fcauth0123");
        cfg.auth_cookie_name = Some("custom".to_string());
        assert_eq!(cfg.auth_cookie_name(), "custom");
    }

    #[test]
    fn env_overrides_nested_values() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("CHOWDOWN_SESSION__COOKIE_NAME", "sid");
            jail.set_env("CHOWDOWN_DIRECTORY__FRIEND_PAGE_SIZE", "10");
            let cfg = Config::load()?;
            assert_eq!(cfg.session.cookie_name, "sid");
            assert_eq!(cfg.directory.friend_page_size, 10);
            assert_eq!(cfg.search.results, 5);
            Ok(())
        });
    }
}
