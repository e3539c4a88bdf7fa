use serde::{Deserialize, Serialize};

use crate::config::SiteConfig;

/// Profile data fetched from the people API. Lives in memory only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteProfile {
    pub display_name: Option<String>,
    pub thumbnail_url: Option<String>,
    pub profile_url: Option<String>,
}

/// Prefix that keeps local identities apart from remote person ids.
pub const LOCAL_IDENTITY_PREFIX: &str = "local:";

/// The identity a local account registered as `user_name` gets.
pub fn local_identity(user_name: &str) -> String {
    format!("{LOCAL_IDENTITY_PREFIX}{user_name}")
}

/// Whether `identity` lives in the local namespace.
pub fn is_local_identity(identity: &str) -> bool {
    identity.starts_with(LOCAL_IDENTITY_PREFIX)
}

/// A locally registered account. Its identity is `local:<login name>`.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalAccount {
    pub identity: String,
    pub user_name: String,
    pub password_digest: String,
    pub thumbnail_image: String,
}

/// An account authenticated by the social provider.
///
/// The credential fields are only populated once a local account has been
/// merged into this one.
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalAccount {
    pub identity: String,
    pub user_name: Option<String>,
    pub password_digest: Option<String>,
    pub thumbnail_image: Option<String>,
    pub profile: Option<RemoteProfile>,
}

impl ExternalAccount {
    pub fn stub(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            user_name: None,
            password_digest: None,
            thumbnail_image: None,
            profile: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Account {
    Local(LocalAccount),
    External(ExternalAccount),
}

impl Account {
    pub fn identity(&self) -> &str {
        match self {
            Account::Local(a) => &a.identity,
            Account::External(a) => &a.identity,
        }
    }

    pub fn user_name(&self) -> Option<&str> {
        match self {
            Account::Local(a) => Some(&a.user_name),
            Account::External(a) => a.user_name.as_deref(),
        }
    }

    pub fn password_digest(&self) -> Option<&str> {
        match self {
            Account::Local(a) => Some(&a.password_digest),
            Account::External(a) => a.password_digest.as_deref(),
        }
    }

    pub fn thumbnail_image(&self) -> Option<&str> {
        match self {
            Account::Local(a) => Some(&a.thumbnail_image),
            Account::External(a) => a.thumbnail_image.as_deref(),
        }
    }

    pub fn profile(&self) -> Option<&RemoteProfile> {
        match self {
            Account::Local(_) => None,
            Account::External(a) => a.profile.as_ref(),
        }
    }

    /// Human readable name: remote display name, then login name, then identity.
    pub fn display_name(&self) -> &str {
        self.profile()
            .and_then(|p| p.display_name.as_deref())
            .or_else(|| self.user_name())
            .unwrap_or_else(|| self.identity())
    }

    pub fn thumbnail_url(&self, site: &SiteConfig) -> Option<String> {
        if let Some(url) = self.profile().and_then(|p| p.thumbnail_url.clone()) {
            return Some(url);
        }
        self.thumbnail_image().map(|image| site.thumbnail_url(image))
    }

    pub fn user_type(&self) -> &'static str {
        match self {
            Account::Local(_) => "local",
            Account::External(a) if a.profile.is_some() => "external",
            Account::External(_) => "external_unresolved",
        }
    }

    pub fn json(&self, site: &SiteConfig) -> AccountJson {
        AccountJson {
            user_name: self.user_name().map(str::to_string),
            provider_id: self.identity().to_string(),
            display_name: self.display_name().to_string(),
            thumbnail_url: self.thumbnail_url(site),
            user_type: self.user_type(),
            profile_url: self.profile().and_then(|p| p.profile_url.clone()),
        }
    }
}

/// Public projection of an account. Never carries credentials.
#[derive(Debug, Clone, Serialize)]
pub struct AccountJson {
    pub user_name: Option<String>,
    pub provider_id: String,
    pub display_name: String,
    pub thumbnail_url: Option<String>,
    pub user_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_url: Option<String>,
}
