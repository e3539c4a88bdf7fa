use crate::router::ChowState;
use crate::service::CookieAction;
use crate::{ChowError, config::SessionConfig};
use axum::{
    extract::{Request, State},
    http::header::SET_COOKIE,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use time::Duration;

/// Resolve the request's session and viewer before the handler runs.
///
/// The resulting `RequestContext` is stored in the request extensions.
/// Cookie changes decided during resolution are applied to the response
/// unless the handler already set the session cookie itself.
pub async fn resolve_viewer(
    State(state): State<ChowState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, ChowError> {
    let cookie_cfg = state.session_config();
    let local = jar
        .get(&cookie_cfg.cookie_name)
        .map(|c| c.value().to_owned())
        .filter(|v| !v.is_empty());
    let token = jar
        .get(state.auth_cookie_name())
        .map(|c| c.value().to_owned())
        .filter(|v| !v.is_empty());

    let resolution = state
        .identity
        .resolve(local.as_deref(), token.as_deref())
        .await?;
    req.extensions_mut().insert(resolution.context);

    let resp = next.run(req).await;
    if handler_set_cookie(&resp, &cookie_cfg.cookie_name) {
        return Ok(resp);
    }
    let jar = match resolution.local_cookie {
        CookieAction::Keep => return Ok(resp),
        CookieAction::Issue(key) => jar.add(session_cookie(cookie_cfg, key)),
        CookieAction::Clear => jar.remove(removal_cookie(cookie_cfg, &cookie_cfg.cookie_name)),
    };
    Ok((jar, resp).into_response())
}

fn handler_set_cookie(resp: &Response, name: &str) -> bool {
    let prefix = format!("{name}=");
    resp.headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.starts_with(&prefix))
}

pub fn session_cookie(cfg: &SessionConfig, key: String) -> Cookie<'static> {
    Cookie::build(Cookie::new(cfg.cookie_name.clone(), key))
        .path(cfg.cookie_path.clone())
        .http_only(true)
        .secure(!cfg.insecure_cookie)
        .same_site(SameSite::Lax)
        .max_age(Duration::seconds(cfg.timeout_secs as i64))
        .build()
}

pub fn removal_cookie(cfg: &SessionConfig, name: &str) -> Cookie<'static> {
    Cookie::build(Cookie::new(name.to_string(), ""))
        .path(cfg.cookie_path.clone())
        .build()
}
