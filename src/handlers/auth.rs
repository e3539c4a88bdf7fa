use axum::{
    Form, Json,
    extract::State,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use serde_json::json;
use tracing::info;

use super::{Params, required};
use crate::middleware::session::{removal_cookie, session_cookie};
use crate::middleware::{CurrentContext, RequireViewer};
use crate::service::{RequestContext, Session, SessionSource};
use crate::{ChowError, router::ChowState};

pub async fn login(
    State(state): State<ChowState>,
    CurrentContext(ctx): CurrentContext,
    jar: CookieJar,
    Form(params): Form<Params>,
) -> Result<Response, ChowError> {
    let [user_name, password] = required(&params, ["user_name", "password"])?;
    let (mut session, issued) = local_session(&state, &ctx).await?;
    let account = state
        .users
        .authenticate(&mut session, user_name, password)
        .await?;
    state.sessions.save(&session).await?;
    info!(identity = %account.identity(), "viewer logged in");

    let jar = with_issued_cookie(&state, jar, issued);
    Ok((jar, Json(json!({ "viewer": account.json(state.site()) }))).into_response())
}

pub async fn register(
    State(state): State<ChowState>,
    CurrentContext(ctx): CurrentContext,
    jar: CookieJar,
    Form(params): Form<Params>,
) -> Result<Response, ChowError> {
    let [user_name, password, password_again] =
        required(&params, ["user_name", "password", "password_again"])?;
    let (mut session, issued) = local_session(&state, &ctx).await?;
    let account = state
        .users
        .register(
            &mut session,
            user_name,
            password,
            password_again,
            params.get("thumbnail_image").map(String::as_str),
        )
        .await?;
    state.sessions.save(&session).await?;

    let jar = with_issued_cookie(&state, jar, issued);
    Ok((jar, Json(json!({ "viewer": account.json(state.site()) }))).into_response())
}

/// End the session and drop both cookies.
pub async fn logout(
    State(state): State<ChowState>,
    RequireViewer(viewer, ctx): RequireViewer,
    jar: CookieJar,
) -> Result<Response, ChowError> {
    state.sessions.kill(ctx.session.key()).await?;
    info!(identity = %viewer.identity(), "viewer logged out");

    let cfg = state.session_config();
    let jar = jar
        .remove(removal_cookie(cfg, &cfg.cookie_name))
        .remove(removal_cookie(cfg, state.auth_cookie_name()));
    Ok((jar, Json(json!({ "logged_out": true }))).into_response())
}

/// The local session a password sign-in lands in.
///
/// Requests running under an external session get a fresh local one, so the
/// next request carries both cookies and the accounts are merged.
async fn local_session(
    state: &ChowState,
    ctx: &RequestContext,
) -> Result<(Session, Option<String>), ChowError> {
    match ctx.source {
        SessionSource::Local => Ok((ctx.session.clone(), None)),
        SessionSource::External => {
            let session = state.sessions.create().await?;
            let key = session.key().to_string();
            Ok((session, Some(key)))
        }
    }
}

fn with_issued_cookie(state: &ChowState, jar: CookieJar, issued: Option<String>) -> CookieJar {
    match issued {
        Some(key) => jar.add(session_cookie(state.session_config(), key)),
        None => jar,
    }
}
