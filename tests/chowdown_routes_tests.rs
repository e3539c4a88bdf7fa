use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header::SET_COOKIE},
    response::Response,
};
use chow_down::ChowError;
use chow_down::api::SearchApi;
use chow_down::config::Config;
use chow_down::db::ChowStorage;
use chow_down::router::{ChowState, chow_router};
use chow_down::service::PeopleDirectory;
use chow_down::types::{PeopleCollection, Person, Restaurant};
use serde_json::Value;
use std::{
    fs,
    path::PathBuf,
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};
use tower::ServiceExt;
use url::Url;

const AUTH_COOKIE: &str = "fcauth0123";

/// People API stand-in: one signed-in viewer whose friends are everyone else.
struct StaticDirectory {
    viewer_token: String,
    viewer: Person,
    friends: Vec<Person>,
}

#[async_trait]
impl PeopleDirectory for StaticDirectory {
    async fn fetch_people(&self, ids: &[String]) -> Result<Vec<Person>, ChowError> {
        Ok(self
            .friends
            .iter()
            .chain(std::iter::once(&self.viewer))
            .filter(|p| ids.contains(&p.id))
            .cloned()
            .collect())
    }

    async fn fetch_viewer(&self, auth_token: &str) -> Result<Person, ChowError> {
        if auth_token == self.viewer_token {
            Ok(self.viewer.clone())
        } else {
            Err(ChowError::UpstreamStatus(StatusCode::UNAUTHORIZED))
        }
    }

    async fn fetch_friends(
        &self,
        _auth_token: &str,
        start: usize,
        count: usize,
    ) -> Result<PeopleCollection, ChowError> {
        Ok(PeopleCollection {
            total_results: self.friends.len(),
            start_index: start,
            entry: self.friends.iter().skip(start).take(count).cloned().collect(),
        })
    }
}

fn person(id: &str, name: &str) -> Person {
    Person {
        id: id.to_string(),
        display_name: Some(name.to_string()),
        thumbnail_url: None,
        profile_url: Some(format!("https://people.example.com/{id}")),
    }
}

struct TestApp {
    app: Router,
    db_path: PathBuf,
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.db_path);
    }
}

async fn test_app(name: &str) -> TestApp {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time before UNIX_EPOCH")
        .as_nanos();
    let mut db_path = std::env::temp_dir();
    db_path.push(format!(
        "chowdown-{name}-{}-{}.sqlite",
        std::process::id(),
        nanos
    ));
    let storage = ChowStorage::connect(&format!("sqlite:{}", db_path.display()))
        .await
        .expect("failed to open storage");

    let mut cfg = Config::default();
    cfg.directory.site_id = "0123".to_string();
    cfg.session.insecure_cookie = true;

    let directory = Arc::new(StaticDirectory {
        viewer_token: "tok-b".to_string(),
        viewer: person("B", "Bea"),
        friends: vec![person("C", "Cy"), person("D", "Di"), person("E", "Ed")],
    });
    // Nothing listens here, so remote searches fail fast.
    let search = SearchApi::new(
        reqwest::Client::new(),
        Url::parse("http://127.0.0.1:9/yql").expect("static url"),
    );
    let state = ChowState::new(&cfg, storage, directory, search)
        .await
        .expect("failed to build state");
    state
        .restaurants
        .prime(Restaurant {
            restaurant_id: "R1".to_string(),
            name: "Noodle Bar".to_string(),
            address: Some("1 Main St".to_string()),
            city: Some("Springfield".to_string()),
            state: Some("CA".to_string()),
            rating_average: 4.5,
            rating_count: 12,
            url: None,
            location: None,
            categories: vec!["Noodles".to_string()],
        })
        .await;

    TestApp {
        app: chow_router(state),
        db_path,
    }
}

fn session_cookie(resp: &Response) -> Option<String> {
    resp.headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("sessid="))
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
}

async fn send(app: &Router, req: Request<Body>) -> Response {
    app.clone().oneshot(req).await.expect("request failed")
}

fn form(uri: &str, cookie: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        builder = builder.header("cookie", cookie);
    }
    builder
        .body(Body::from(body.to_string()))
        .expect("failed to build request")
}

fn bodiless(method: &str, uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header("cookie", cookie);
    }
    builder.body(Body::empty()).expect("failed to build request")
}

fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    bodiless("GET", uri, cookie)
}

fn delete(uri: &str, cookie: Option<&str>) -> Request<Body> {
    bodiless("DELETE", uri, cookie)
}

async fn json_body(resp: Response) -> Value {
    let body = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("failed to read response body");
    serde_json::from_slice(&body).expect("response body was not json")
}

#[tokio::test]
async fn healthz_needs_no_session() {
    let t = test_app("healthz").await;
    let resp = send(&t.app, get("/healthz", None)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(session_cookie(&resp).is_none());
}

#[tokio::test]
async fn missing_fields_are_reported_together() {
    let t = test_app("fields").await;
    let resp = send(&t.app, form("/login", None, "user_name=")).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = json_body(resp).await;
    assert_eq!(body["errors"]["fields"]["user_name"], true);
    assert_eq!(body["errors"]["fields"]["password"], true);
}

#[tokio::test]
async fn bookmark_routes_require_login() {
    let t = test_app("login-required").await;
    let resp = send(&t.app, get("/json/restaurants", None)).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    // A session is still handed out for the next attempt.
    assert!(session_cookie(&resp).is_some());
    let body = json_body(resp).await;
    assert_eq!(body["error"]["code"], "LOGIN_REQUIRED");
}

#[tokio::test]
async fn register_then_bookmark_a_restaurant() {
    let t = test_app("register").await;
    let resp = send(
        &t.app,
        form(
            "/register",
            None,
            "user_name=alice&password=pw&password_again=pw",
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let cookie = session_cookie(&resp).expect("session cookie issued");
    let body = json_body(resp).await;
    assert_eq!(body["viewer"]["provider_id"], "local:alice");
    assert_eq!(body["viewer"]["user_type"], "local");

    let resp = send(
        &t.app,
        form("/json/restaurants", Some(&cookie), "restaurant_id=R1"),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    let labels = body["labels"].as_array().expect("labels list");
    assert_eq!(labels.len(), 1);
    assert_eq!(labels[0]["text"], "try");
    assert_eq!(labels[0]["restaurant"]["name"], "Noodle Bar");

    // Adding again keeps the one bookmark.
    let resp = send(
        &t.app,
        form("/json/restaurants", Some(&cookie), "restaurant_id=R1"),
    )
    .await;
    assert_eq!(json_body(resp).await["labels"].as_array().map(Vec::len), Some(1));

    let resp = send(
        &t.app,
        form(
            "/register",
            None,
            "user_name=alice&password=other&password_again=other",
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(resp).await["error"]["message"],
        "This name is already in use."
    );
}

#[tokio::test]
async fn unknown_restaurant_is_not_found() {
    let t = test_app("info").await;
    let resp = send(
        &t.app,
        get("/json/restaurants/info?restaurant_id=R1", None),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await["restaurant"]["name"], "Noodle Bar");

    let resp = send(
        &t.app,
        get("/json/restaurants/info?restaurant_id=bad%20id", None),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn external_sign_in_absorbs_the_local_account() {
    let t = test_app("merge").await;
    let resp = send(
        &t.app,
        form(
            "/register",
            None,
            "user_name=alice&password=pw&password_again=pw",
        ),
    )
    .await;
    let local = session_cookie(&resp).expect("session cookie issued");
    send(
        &t.app,
        form("/json/restaurants", Some(&local), "restaurant_id=R1"),
    )
    .await;

    // Same browser, now also signed in with the social provider.
    let both = format!("{local}; {AUTH_COOKIE}=tok-b");
    let resp = send(&t.app, get("/json/restaurants", Some(&both))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let cleared = session_cookie(&resp).expect("local cookie cleared");
    assert_eq!(cleared, "sessid=");
    let body = json_body(resp).await;
    let labels = body["labels"].as_array().expect("labels list");
    assert_eq!(labels.len(), 1);
    assert_eq!(labels[0]["user"]["provider_id"], "B");
    assert_eq!(labels[0]["restaurant"]["restaurant_id"], "R1");

    // The old local session no longer signs anyone in.
    let resp = send(&t.app, get("/json/restaurants", Some(&local))).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    // The absorbed password now signs in as the external account.
    let resp = send(&t.app, form("/login", None, "user_name=alice&password=pw")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await["viewer"]["provider_id"], "B");
}

#[tokio::test]
async fn friends_page_carries_paging_headers() {
    let t = test_app("friends").await;
    let auth = format!("{AUTH_COOKIE}=tok-b");
    let resp = send(&t.app, get("/json/friends?count=2", Some(&auth))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["x-start-next"], "2");
    assert_eq!(resp.headers()["x-start-prev"], "");
    assert_eq!(resp.headers()["x-count"], "2");
    let body = json_body(resp).await;
    assert_eq!(body["friends_count"], 2);
    assert_eq!(body["viewer_friends"]["total"], 3);
    let items = body["viewer_friends"]["items"].as_array().expect("friends");
    assert_eq!(items[0]["provider_id"], "C");
    assert_eq!(items[0]["display_name"], "Cy");
    assert!(items[0]["labels"].as_array().is_some_and(Vec::is_empty));
}

fn label_keys(body: &Value) -> Vec<i64> {
    body["labels"]
        .as_array()
        .expect("labels list")
        .iter()
        .filter_map(|l| l["key"].as_i64())
        .collect()
}

#[tokio::test]
async fn index_combines_viewer_restaurants_and_friends() {
    let t = test_app("index").await;
    let auth = format!("{AUTH_COOKIE}=tok-b");
    send(
        &t.app,
        form("/json/restaurants", Some(&auth), "restaurant_id=R1"),
    )
    .await;

    let resp = send(&t.app, get("/json/index?count=2", Some(&auth))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["x-start-next"], "2");
    assert_eq!(resp.headers()["x-count"], "2");
    let body = json_body(resp).await;
    assert_eq!(body["viewer"]["provider_id"], "B");
    assert!(body["site_title"].is_string());
    assert_eq!(label_keys(&body).len(), 1);
    assert!(body["invites"].as_array().is_some_and(Vec::is_empty));
    assert_eq!(body["viewer_friends"]["total"], 3);
    assert_eq!(body["friends_next_start"], 2);
    assert_eq!(body["friends_count"], 2);
}

#[tokio::test]
async fn inviting_friends_replaces_the_invitee_list() {
    let t = test_app("invite").await;
    let auth = format!("{AUTH_COOKIE}=tok-b");
    // Listing friends creates their accounts.
    send(&t.app, get("/json/friends?count=3", Some(&auth))).await;
    let resp = send(
        &t.app,
        form("/json/restaurants", Some(&auth), "restaurant_id=R1"),
    )
    .await;
    let key = label_keys(&json_body(resp).await)[0];

    let resp = send(
        &t.app,
        form(
            "/invite/friends",
            Some(&auth),
            &format!("label_id={key}&invited_ids=C%2CD%2CB&count=2"),
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["x-count"], "2");
    assert_eq!(json_body(resp).await["viewer_friends"]["total"], 3);

    let body = json_body(send(&t.app, get("/json/restaurants", Some(&auth))).await).await;
    let mut invited: Vec<&str> = body["labels"][0]["invitees"]
        .as_array()
        .expect("invitees")
        .iter()
        .filter_map(|i| i["provider_id"].as_str())
        .collect();
    invited.sort();
    assert_eq!(invited, ["C", "D"]);

    let resp = send(&t.app, form("/invite/friends", Some(&auth), "invited_ids=C")).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(resp).await["errors"]["fields"]["label_id"], true);
}

#[tokio::test]
async fn only_the_owner_can_delete_a_bookmark() {
    let t = test_app("delete").await;
    let resp = send(
        &t.app,
        form(
            "/register",
            None,
            "user_name=alice&password=pw&password_again=pw",
        ),
    )
    .await;
    let alice = session_cookie(&resp).expect("session cookie issued");
    let resp = send(
        &t.app,
        form("/json/restaurants", Some(&alice), "restaurant_id=R1"),
    )
    .await;
    let alice_key = label_keys(&json_body(resp).await)[0];

    let auth = format!("{AUTH_COOKIE}=tok-b");
    let resp = send(
        &t.app,
        form("/json/restaurants", Some(&auth), "restaurant_id=R1"),
    )
    .await;
    let bea_key = label_keys(&json_body(resp).await)[0];
    assert_ne!(alice_key, bea_key);

    let resp = send(
        &t.app,
        delete(&format!("/json/restaurants?key={alice_key}"), Some(&auth)),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(label_keys(&json_body(resp).await), [bea_key]);
    let resp = send(&t.app, get("/json/restaurants", Some(&alice))).await;
    assert_eq!(label_keys(&json_body(resp).await), [alice_key]);

    let resp = send(
        &t.app,
        delete(&format!("/json/restaurants?key={bea_key}"), Some(&auth)),
    )
    .await;
    assert!(label_keys(&json_body(resp).await).is_empty());
}
