//! Shared helpers for the integration tests

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, Response},
    Router,
};
use http_body_util::BodyExt;
use tempfile::NamedTempFile;
use tower::ServiceExt;

use content_shortener::database::EmbeddedStore;
use content_shortener::route::create_app;
use content_shortener::state::AppState;

pub const BOUNDARY: &str = "----content-shortener-test-boundary";

/// Creates a test application backed by a temporary embedded store
pub fn setup_test_app() -> (Router, NamedTempFile) {
    let temp_db = NamedTempFile::new().expect("Failed to create temp file");
    let store = EmbeddedStore::open(temp_db.path()).expect("Failed to open test store");
    let state = AppState::embedded(store).expect("Failed to build app state");
    (create_app(state), temp_db)
}

/// Multipart body with text fields and an optional `file` part
pub fn multipart_body(fields: &[(&str, &str)], file: Option<(&str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((filename, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

/// `POST /shorten` as the given session (or anonymously)
pub fn shorten_request(
    fields: &[(&str, &str)],
    file: Option<(&str, &[u8])>,
    cookie: Option<&str>,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/shorten")
        .header(header::HOST, "localhost")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        );
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder
        .body(Body::from(multipart_body(fields, file)))
        .unwrap()
}

pub fn get_request(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("GET")
        .uri(uri)
        .header(header::HOST, "localhost");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

/// URL-encoded form POST against the given host
pub fn form_request_on(host: &str, uri: &str, form: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::HOST, host)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(form.to_string())).unwrap()
}

pub fn form_request(uri: &str, form: &str, cookie: Option<&str>) -> Request<Body> {
    form_request_on("localhost", uri, form, cookie)
}

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .expect("Failed to read response body")
        .to_bytes()
        .to_vec()
}

/// Response body as text with HTML-escaped slashes restored
pub async fn body_text(response: Response<Body>) -> String {
    String::from_utf8(body_bytes(response).await)
        .expect("Response body is not UTF-8")
        .replace("&#x2F;", "/")
}

pub fn location(response: &Response<Body>) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

pub fn set_cookie(response: &Response<Body>) -> String {
    response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// `session_id=<token>` pair from a `Set-Cookie` header, ready for `Cookie`
pub fn session_pair(response: &Response<Body>) -> String {
    set_cookie(response)
        .split(';')
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Short code shown in the result link of the shorten page
pub fn short_code_from(html: &str) -> String {
    let marker = "id=\"short-url\" href=\"http://localhost/";
    let start = html.find(marker).expect("No short url in page") + marker.len();
    html[start..]
        .split('"')
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Registers a user and returns the session cookie pair
pub async fn register(app: &Router, email: &str, password: &str) -> String {
    let form = format!("email={}&password={password}", urlencoding::encode(email));
    let response = send(app, form_request("/register", &form, None)).await;
    assert_eq!(response.status().as_u16(), 303);
    session_pair(&response)
}
