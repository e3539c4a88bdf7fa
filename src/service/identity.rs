//! Per-request identity resolution.
//!
//! A request may carry a local session cookie, an external auth cookie, or
//! both. Resolution picks the session the request runs under and merges the
//! local account into the external one when both are signed in as different
//! people.

use crate::error::ChowError;
use crate::service::merge_actor::MergeHandle;
use crate::service::sessions::{Session, SessionStore};
use crate::service::users::UserDirectory;
use crate::types::Account;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionSource {
    Local,
    External,
}

/// Everything a handler needs to know about who is asking.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub session: Session,
    pub source: SessionSource,
    pub viewer: Option<Account>,
    /// The external auth token, when the request carried one.
    pub auth_token: Option<String>,
}

/// What the response must do with the local session cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CookieAction {
    Keep,
    Issue(String),
    Clear,
}

#[derive(Debug, Clone)]
pub struct Resolution {
    pub context: RequestContext,
    pub local_cookie: CookieAction,
}

#[derive(Clone)]
pub struct IdentityResolver {
    sessions: SessionStore,
    users: UserDirectory,
    merges: MergeHandle,
}

impl IdentityResolver {
    pub fn new(sessions: SessionStore, users: UserDirectory, merges: MergeHandle) -> Self {
        Self {
            sessions,
            users,
            merges,
        }
    }

    pub async fn resolve(
        &self,
        local_cookie: Option<&str>,
        auth_token: Option<&str>,
    ) -> Result<Resolution, ChowError> {
        let local = match local_cookie {
            Some(key) => self.sessions.load(key).await?,
            None => None,
        };
        let external = match auth_token {
            Some(token) => Some(self.open_external(token).await?),
            None => None,
        };

        let (context, local_cookie_action) = match (local, external) {
            (None, None) => {
                let session = self.sessions.create().await?;
                let key = session.key().to_string();
                (self.context(session, SessionSource::Local, None, None), CookieAction::Issue(key))
            }
            (Some(mut session), None) => {
                let viewer = self.session_viewer(&mut session).await?;
                (self.context(session, SessionSource::Local, viewer, None), CookieAction::Keep)
            }
            (None, Some((session, viewer))) => {
                // A stale local cookie is dropped when the external session takes over.
                let action = if local_cookie.is_some() {
                    CookieAction::Clear
                } else {
                    CookieAction::Keep
                };
                (self.context(session, SessionSource::External, viewer, auth_token), action)
            }
            (Some(mut local), Some((external, external_viewer))) => {
                let local_viewer = self.session_viewer(&mut local).await?;
                self.reconcile(local, local_viewer, external, external_viewer, auth_token)
                    .await?
            }
        };

        self.sessions.save(&context.session).await?;
        Ok(Resolution {
            context,
            local_cookie: local_cookie_action,
        })
    }

    async fn reconcile(
        &self,
        local: Session,
        local_viewer: Option<Account>,
        external: Session,
        external_viewer: Option<Account>,
        auth_token: Option<&str>,
    ) -> Result<(RequestContext, CookieAction), ChowError> {
        match (local_viewer, external_viewer) {
            (Some(source), Some(destination)) if source.identity() != destination.identity() => {
                let outcome = self
                    .merges
                    .merge(source.identity(), destination.identity())
                    .await?;
                info!(
                    source = %source.identity(),
                    destination = %destination.identity(),
                    plan = ?outcome.plan,
                    "merged local sign-in into external account"
                );
                self.sessions.kill(local.key()).await?;
                // Reload so the absorbed credentials show up.
                let viewer = self
                    .users
                    .get_by_identity(destination.identity())
                    .await?
                    .or(Some(destination));
                Ok((
                    self.context(external, SessionSource::External, viewer, auth_token),
                    CookieAction::Clear,
                ))
            }
            (Some(_), Some(destination)) => {
                debug!(identity = %destination.identity(), "local session duplicates external sign-in");
                self.sessions.kill(local.key()).await?;
                Ok((
                    self.context(external, SessionSource::External, Some(destination), auth_token),
                    CookieAction::Clear,
                ))
            }
            (Some(source), None) => Ok((
                self.context(local, SessionSource::Local, Some(source), None),
                CookieAction::Keep,
            )),
            (None, viewer) => Ok((
                self.context(external, SessionSource::External, viewer, auth_token),
                CookieAction::Keep,
            )),
        }
    }

    fn context(
        &self,
        session: Session,
        source: SessionSource,
        viewer: Option<Account>,
        auth_token: Option<&str>,
    ) -> RequestContext {
        RequestContext {
            session,
            source,
            viewer,
            auth_token: auth_token.map(str::to_string),
        }
    }

    /// Open the session keyed by the token digest and make sure it has a viewer.
    async fn open_external(&self, auth_token: &str) -> Result<(Session, Option<Account>), ChowError> {
        let mut session = self.sessions.open_external(auth_token).await?;
        if let Some(viewer) = self.session_viewer(&mut session).await? {
            return Ok((session, Some(viewer)));
        }
        match self.users.cache().viewer(auth_token).await {
            Ok(person) => {
                let account = self.users.ensure_external(&person).await?;
                session.set_viewer(account.identity());
                debug!(identity = %account.identity(), "external viewer resolved");
                Ok((session, Some(account)))
            }
            Err(e) => {
                warn!(error = %e, "could not resolve external viewer");
                Ok((session, None))
            }
        }
    }

    /// The account named by the session, dropping the attribute if it is gone.
    async fn session_viewer(&self, session: &mut Session) -> Result<Option<Account>, ChowError> {
        let Some(identity) = session.viewer_identity().map(str::to_string) else {
            return Ok(None);
        };
        let viewer = self.users.get_by_identity(&identity).await?;
        if viewer.is_none() {
            debug!(identity = %identity, "session viewer no longer exists");
            session.clear_viewer();
        }
        Ok(viewer)
    }
}
