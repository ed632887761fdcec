use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, Method, StatusCode, Uri, header},
    response::{IntoResponse, Response},
    routing::{any, get, post},
};
use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use smol::Timer;

/// Credentials and token the fake upstream expects.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Accounts {
    pub username: String,
    pub password: String,
    pub token: String,
}

impl Default for Accounts {
    fn default() -> Self {
        Self {
            username: "alice".to_string(),
            password: "secret".to_string(),
            token: "t0k3n".to_string(),
        }
    }
}

impl Accounts {
    fn basic(&self) -> String {
        format!(
            "Basic {}",
            STANDARD.encode(format!("{}:{}", self.username, self.password))
        )
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

/// Requests seen by the protected and token endpoints.
#[derive(Debug, Default)]
pub struct Hits {
    protected: AtomicUsize,
    tokens: AtomicUsize,
}

impl Hits {
    pub fn protected(&self) -> usize {
        self.protected.load(Ordering::SeqCst)
    }

    pub fn tokens(&self) -> usize {
        self.tokens.load(Ordering::SeqCst)
    }
}

#[derive(Clone)]
pub struct AppState {
    accounts: Arc<Accounts>,
    realm: Arc<str>,
    hits: Arc<Hits>,
}

impl AppState {
    /// `base_url` is where the upstream itself is reachable; the token
    /// endpoint is announced relative to it.
    pub fn new(accounts: Accounts, base_url: &str, hits: Arc<Hits>) -> Self {
        Self {
            accounts: Arc::new(accounts),
            realm: Arc::from(format!("{base_url}/token")),
            hits,
        }
    }
}

#[derive(Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
}

pub fn get_app(state: AppState) -> Router {
    Router::new()
        .route("/plain", get(plain))
        .route("/echo", any(echo))
        .route("/basic/{*path}", any(basic))
        .route("/bearer/{*path}", any(bearer))
        .route("/token", get(token))
        .route("/redirect/{hops}", any(redirect))
        .route("/see-other", post(see_other))
        .route("/moved", any(moved))
        .route("/slow", get(slow))
        .with_state(state)
}

async fn plain() -> &'static str {
    "plain response"
}

/// Returns the request body and describes the request in `X-Echo-*`
/// headers.
async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Response {
    let mut response = body.into_response();
    let echoed = response.headers_mut();
    echoed.insert("x-echo-method", header_value(method.as_str()));
    echoed.insert("x-echo-target", header_value(&uri.to_string()));
    if let Some(host) = headers.get(header::HOST) {
        echoed.insert("x-echo-host", host.clone());
    }
    for value in headers.get_all("x-custom") {
        echoed.append("x-echo-custom", value.clone());
    }
    if let Some(credentials) = headers.get(header::AUTHORIZATION) {
        echoed.insert("x-echo-authorization", credentials.clone());
    }
    if let Some(cookie) = headers.get(header::COOKIE) {
        echoed.insert("x-echo-cookie", cookie.clone());
    }
    response
}

fn header_value(value: &str) -> HeaderValue {
    HeaderValue::from_str(value).unwrap_or_else(|_| HeaderValue::from_static("invalid"))
}

fn authorized(headers: &HeaderMap, expected: &str) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .is_some_and(|value| value.as_bytes() == expected.as_bytes())
}

fn unauthorized(challenge: String) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, challenge)],
        "unauthorized",
    )
        .into_response()
}

async fn basic(
    State(state): State<AppState>,
    Path(path): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    state.hits.protected.fetch_add(1, Ordering::SeqCst);
    if !authorized(&headers, &state.accounts.basic()) {
        return unauthorized(r#"Basic realm="fake upstream""#.to_string());
    }
    if body.is_empty() {
        format!("basic {path}").into_response()
    } else {
        body.into_response()
    }
}

async fn bearer(
    State(state): State<AppState>,
    Path(path): Path<String>,
    headers: HeaderMap,
) -> Response {
    state.hits.protected.fetch_add(1, Ordering::SeqCst);
    if !authorized(&headers, &state.accounts.bearer()) {
        return unauthorized(format!(
            r#"Bearer realm="{}",service="fake",scope="repository:{path}:pull""#,
            state.realm
        ));
    }
    format!("bearer {path}").into_response()
}

/// Issues the token to anonymous callers and to callers presenting the
/// right Basic credentials, for the `fake` service only.
async fn token(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    state.hits.tokens.fetch_add(1, Ordering::SeqCst);
    if params.get("service").map(String::as_str) != Some("fake") || !params.contains_key("scope") {
        return (StatusCode::BAD_REQUEST, "unknown service").into_response();
    }
    if headers.contains_key(header::AUTHORIZATION) && !authorized(&headers, &state.accounts.basic())
    {
        return (StatusCode::FORBIDDEN, "bad credentials").into_response();
    }
    Json(TokenResponse {
        access_token: state.accounts.token.clone(),
    })
    .into_response()
}

/// Counts down through relative redirects until `hops` reaches zero.
async fn redirect(Path(hops): Path<u32>) -> Response {
    if hops == 0 {
        return "redirected".into_response();
    }
    (
        StatusCode::FOUND,
        [(header::LOCATION, (hops - 1).to_string())],
        "moving on",
    )
        .into_response()
}

#[derive(Deserialize)]
struct Moved {
    to: String,
}

/// Redirects to the absolute URL given in `to`.
async fn moved(Query(Moved { to }): Query<Moved>) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, to)]).into_response()
}

async fn see_other() -> Response {
    (StatusCode::SEE_OTHER, [(header::LOCATION, "/echo")]).into_response()
}

async fn slow() -> &'static str {
    Timer::after(Duration::from_secs(2)).await;
    "finally"
}

#[cfg(test)]
mod tests {
    use axum::{body::Body, http::Request};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use super::*;

    fn app() -> (Router, Arc<Hits>) {
        let hits = Arc::new(Hits::default());
        let state = AppState::new(Accounts::default(), "http://127.0.0.1:8080", hits.clone());
        (get_app(state), hits)
    }

    async fn call(app: Router, request: Request<Body>) -> (StatusCode, HeaderMap, Bytes) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, headers, body)
    }

    #[test]
    fn test_basic_challenge_and_success() {
        smol::block_on(async {
            let (app, hits) = app();

            let (status, headers, _) = call(
                app.clone(),
                Request::builder()
                    .uri("/basic/repo/file.txt")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(
                headers.get(header::WWW_AUTHENTICATE).unwrap(),
                r#"Basic realm="fake upstream""#
            );

            let (status, _, body) = call(
                app,
                Request::builder()
                    .uri("/basic/repo/file.txt")
                    .header(header::AUTHORIZATION, "Basic YWxpY2U6c2VjcmV0")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body.as_ref(), b"basic repo/file.txt");
            assert_eq!(hits.protected(), 2);
        });
    }

    #[test]
    fn test_bearer_challenge_points_to_token_endpoint() {
        smol::block_on(async {
            let (app, _) = app();

            let (status, headers, _) = call(
                app,
                Request::builder()
                    .uri("/bearer/library/ubuntu")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;

            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(
                headers.get(header::WWW_AUTHENTICATE).unwrap(),
                r#"Bearer realm="http://127.0.0.1:8080/token",service="fake",scope="repository:library/ubuntu:pull""#
            );
        });
    }

    #[test]
    fn test_token_endpoint() {
        smol::block_on(async {
            let (app, hits) = app();

            let (status, _, body) = call(
                app.clone(),
                Request::builder()
                    .uri("/token?service=fake&scope=repository:x:pull")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
            let token: TokenResponse = serde_json::from_slice(&body).unwrap();
            assert_eq!(token.access_token, "t0k3n");

            let (status, _, _) = call(
                app.clone(),
                Request::builder()
                    .uri("/token?service=fake&scope=repository:x:pull")
                    .header(header::AUTHORIZATION, "Basic d3Jvbmc6d3Jvbmc=")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
            assert_eq!(status, StatusCode::FORBIDDEN);

            let (status, _, _) = call(
                app,
                Request::builder()
                    .uri("/token?service=other")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(hits.tokens(), 3);
        });
    }

    #[test]
    fn test_redirect_counts_down() {
        smol::block_on(async {
            let (app, _) = app();

            let (status, headers, _) = call(
                app,
                Request::builder()
                    .uri("/redirect/3")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;

            assert_eq!(status, StatusCode::FOUND);
            assert_eq!(headers.get(header::LOCATION).unwrap(), "2");
        });
    }

    #[test]
    fn test_echo() {
        smol::block_on(async {
            let (app, _) = app();

            let (status, headers, body) = call(
                app,
                Request::builder()
                    .method(Method::PUT)
                    .uri("/echo?x=1")
                    .header(header::HOST, "example.com")
                    .header("x-custom", "one")
                    .header("x-custom", "two")
                    .body(Body::from("payload"))
                    .unwrap(),
            )
            .await;

            assert_eq!(status, StatusCode::OK);
            assert_eq!(body.as_ref(), b"payload");
            assert_eq!(headers.get("x-echo-method").unwrap(), "PUT");
            assert_eq!(headers.get("x-echo-target").unwrap(), "/echo?x=1");
            assert_eq!(headers.get("x-echo-host").unwrap(), "example.com");
            assert_eq!(headers.get_all("x-echo-custom").iter().count(), 2);
        });
    }

    #[test]
    fn test_moved_points_to_given_url() {
        smol::block_on(async {
            let (app, _) = app();

            let (status, headers, _) = call(
                app,
                Request::builder()
                    .uri("/moved?to=http://127.0.0.1:9/echo")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;

            assert_eq!(status, StatusCode::FOUND);
            assert_eq!(headers.get(header::LOCATION).unwrap(), "http://127.0.0.1:9/echo");
        });
    }
}
