use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::ChowError;
use crate::service::RequestContext;
use crate::types::Account;

/// The request context resolved by the session middleware.
#[derive(Debug, Clone)]
pub struct CurrentContext(pub RequestContext);

impl<S> FromRequestParts<S> for CurrentContext
where
    S: Send + Sync,
{
    type Rejection = ChowError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .map(CurrentContext)
            .ok_or(ChowError::MissingContext)
    }
}

/// Ensure the request has a signed-in viewer.
/// Rejects with 401 `LOGIN_REQUIRED` otherwise.
#[derive(Debug, Clone)]
pub struct RequireViewer(pub Account, pub RequestContext);

impl<S> FromRequestParts<S> for RequireViewer
where
    S: Send + Sync,
{
    type Rejection = ChowError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let CurrentContext(ctx) = CurrentContext::from_request_parts(parts, state).await?;
        match ctx.viewer.clone() {
            Some(viewer) => Ok(Self(viewer, ctx)),
            None => Err(ChowError::LoginRequired),
        }
    }
}
