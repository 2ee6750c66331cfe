#![allow(dead_code)]

use axum::{
    body::{Body, Bytes},
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use todo_api::{app, AppState, Entity, Settings, Todo};
use tower::ServiceExt;

pub const JSON: &str = "application/json";

pub const SEED: [&str; 3] = ["First task", "Second task", "Third task"];

pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Reply {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("json body")
    }
}

pub async fn open_state(settings: Settings) -> AppState {
    AppState::open(settings, vec![Todo::schema()]).await.expect("open state")
}

pub async fn open(settings: Settings) -> Router {
    app(open_state(settings).await)
}

pub async fn seed(app: &Router) {
    for title in SEED {
        let body = serde_json::json!({ "title": title });
        let r = send(app, Method::POST, "/todo", Some(body)).await;
        assert_eq!(r.status, StatusCode::CREATED);
    }
}

/// App backed by a fresh in-memory store, seeded with three todos.
pub async fn seeded(settings: Settings) -> Router {
    let app = open(settings).await;
    seed(&app).await;
    app
}

pub async fn request(app: &Router, req: Request<Body>) -> Reply {
    let resp = app.clone().oneshot(req).await.expect("infallible");
    let status = resp.status();
    let headers = resp.headers().clone();
    let body = resp.into_body().collect().await.expect("body").to_bytes();
    Reply { status, headers, body }
}

pub async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> Reply {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::ACCEPT, JSON);
    let req = match body {
        Some(v) => builder
            .header(header::CONTENT_TYPE, JSON)
            .body(Body::from(v.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("request");
    request(app, req).await
}

pub async fn get(app: &Router, uri: &str) -> Reply {
    send(app, Method::GET, uri, None).await
}

pub async fn num_todos(app: &Router) -> u64 {
    get(app, "/todo").await.json()["num_results"].as_u64().expect("num_results")
}
