use crate::config::SiteConfig;
use crate::db::ChowStorage;
use crate::error::ChowError;
use crate::service::directory_cache::DirectoryCache;
use crate::service::sessions::Session;
use crate::types::{Account, Page, Person};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use std::collections::HashMap;
use tracing::{debug, info, warn};

pub const NAME_IN_USE: &str = "This name is already in use.";
pub const PASSWORD_MISMATCH: &str = "The passwords you specified do not match.";
pub const UNKNOWN_USER: &str = "You did not specify a valid user.";
pub const WRONG_PASSWORD: &str = "The password you gave was not correct.";

/// Canonical account lookups for both account kinds.
#[derive(Clone)]
pub struct UserDirectory {
    storage: ChowStorage,
    cache: DirectoryCache,
    site: SiteConfig,
}

impl UserDirectory {
    pub fn new(storage: ChowStorage, cache: DirectoryCache, site: SiteConfig) -> Self {
        Self {
            storage,
            cache,
            site,
        }
    }

    pub fn cache(&self) -> &DirectoryCache {
        &self.cache
    }

    pub fn site(&self) -> &SiteConfig {
        &self.site
    }

    /// Create a local account and make it the session viewer.
    pub async fn register(
        &self,
        session: &mut Session,
        user_name: &str,
        password: &str,
        password_again: &str,
        thumbnail_image: Option<&str>,
    ) -> Result<Account, ChowError> {
        if self.storage.account_by_user_name(user_name).await?.is_some() {
            return Err(ChowError::user_visible(NAME_IN_USE));
        }
        if password != password_again {
            return Err(ChowError::user_visible(PASSWORD_MISMATCH));
        }

        let thumbnail = thumbnail_image
            .filter(|t| !t.is_empty())
            .unwrap_or(self.site.default_thumbnail.as_str());
        let digest = hash_password(password)?;
        let account = match self.storage.insert_local(user_name, &digest, thumbnail).await {
            Ok(account) => account,
            Err(ChowError::DatabaseError(sqlx::Error::Database(e))) if e.is_unique_violation() => {
                return Err(ChowError::user_visible(NAME_IN_USE));
            }
            Err(e) => return Err(e),
        };
        session.set_viewer(account.identity());
        info!(user_name = %user_name, "local account registered");
        Ok(account)
    }

    /// Check credentials and make the matching account the session viewer.
    ///
    /// Any account carrying a digest can log in this way, including external
    /// accounts that absorbed a local account.
    pub async fn authenticate(
        &self,
        session: &mut Session,
        user_name: &str,
        password: &str,
    ) -> Result<Account, ChowError> {
        let account = self.storage.account_by_user_name(user_name).await?;
        let Some((account, digest)) = account.and_then(|a| {
            let digest = a.password_digest()?.to_string();
            Some((a, digest))
        }) else {
            return Err(ChowError::user_visible(UNKNOWN_USER));
        };
        if !verify_password(password, &digest) {
            debug!(user_name = %user_name, "password rejected");
            return Err(ChowError::user_visible(WRONG_PASSWORD));
        }
        session.set_viewer(account.identity());
        Ok(self.enrich_one(account).await)
    }

    pub async fn get_by_identity(&self, identity: &str) -> Result<Option<Account>, ChowError> {
        match self.storage.account(identity).await? {
            Some(account) => Ok(Some(self.enrich_one(account).await)),
            None => Ok(None),
        }
    }

    /// Enriched accounts in the order requested. Unknown identities are skipped.
    pub async fn get_by_identities(&self, identities: &[String]) -> Result<Vec<Account>, ChowError> {
        let found = self.cache.enrich(self.storage.accounts(identities).await?).await;
        let mut by_identity: HashMap<String, Account> = found
            .into_iter()
            .map(|a| (a.identity().to_string(), a))
            .collect();
        Ok(identities
            .iter()
            .filter_map(|id| by_identity.remove(id))
            .collect())
    }

    /// Materialize a remote person as an external account, profile attached.
    pub async fn ensure_external(&self, person: &Person) -> Result<Account, ChowError> {
        let mut account = self.storage.ensure_external(&person.id).await?;
        if let Account::External(ext) = &mut account {
            ext.profile = Some(person.profile());
        }
        Ok(account)
    }

    /// One page of the viewer's remote friends. Local viewers have none.
    ///
    /// A failing people API yields an empty page. Friends whose id cannot
    /// name an external account are left out.
    pub async fn friends_of(
        &self,
        viewer: &Account,
        auth_token: Option<&str>,
        start: usize,
        count: usize,
    ) -> Result<Page<Account>, ChowError> {
        let (Account::External(_), Some(token)) = (viewer, auth_token) else {
            return Ok(Page::empty());
        };
        let page = match self.cache.friends(token, start, count).await {
            Ok(page) => page,
            Err(e) => {
                warn!(identity = %viewer.identity(), error = %e, "friends lookup failed");
                return Ok(Page::empty());
            }
        };
        let mut accounts = Vec::with_capacity(page.items.len());
        for person in &page.items {
            match self.ensure_external(person).await {
                Ok(account) => accounts.push(account),
                Err(ChowError::IdentityConflict(id)) => {
                    warn!(identity = %id, "skipping friend with unusable id");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(Page::new(page.start, page.total, accounts))
    }

    async fn enrich_one(&self, account: Account) -> Account {
        self.cache
            .enrich(vec![account.clone()])
            .await
            .pop()
            .unwrap_or(account)
    }
}

fn hash_password(password: &str) -> Result<String, ChowError> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)?
        .to_string())
}

fn verify_password(password: &str, digest: &str) -> bool {
    PasswordHash::new(digest)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}
