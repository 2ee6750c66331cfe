mod common;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use chrono::{DateTime, Duration, Utc};
use common::*;
use serde_json::json;
use todo_api::{app, Settings};

#[tokio::test]
async fn index_welcomes() {
    let app = seeded(Settings::test()).await;
    let r = get(&app, "/").await;
    assert_eq!(r.status, StatusCode::OK);
    assert_eq!(&r.body[..], b"Welcome to the TodoMVC API!");
}

#[tokio::test]
async fn delete_decrements_count() {
    let app = seeded(Settings::test()).await;
    let old = num_todos(&app).await;
    let r = send(&app, Method::DELETE, "/todo/1", None).await;
    assert_eq!(r.status, StatusCode::NO_CONTENT);
    assert_eq!(num_todos(&app).await, old - 1);
}

#[tokio::test]
async fn cors_mirrors_origin() {
    let app = seeded(Settings::test()).await;
    let req = Request::builder()
        .uri("/")
        .header(header::ORIGIN, "www.example.com")
        .body(Body::empty())
        .unwrap();
    let r = request(&app, req).await;
    assert_eq!(r.headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "www.example.com");
}

#[tokio::test]
async fn new_todo_properties() {
    let app = seeded(Settings::test()).await;
    let r = send(&app, Method::POST, "/todo", Some(json!({"title": "different text"}))).await;
    assert_eq!(r.status, StatusCode::CREATED);
    let body = r.json();
    assert_eq!(body["completed"], json!(false));
    assert!(body["id"].as_i64().unwrap() > 0);
    assert_eq!(body["status"], "Created");
    assert_eq!(body["utc_created"], body["utc_updated"]);
}

#[tokio::test]
async fn listed_todos_have_properties() {
    let app = seeded(Settings::test()).await;
    let body = get(&app, "/todo").await.json();
    let first = &body["objects"][0];
    assert_eq!(first["title"], "First task");
    assert!(first.get("completed").is_some() && first.get("id").is_some());
    assert_eq!(body["page"], 1);
    assert_eq!(body["total_pages"], 1);
}

#[tokio::test]
async fn patching_title() {
    let app = seeded(Settings::test()).await;
    assert_eq!(get(&app, "/todo/1").await.json()["title"], "First task");
    let r = send(&app, Method::PATCH, "/todo/1", Some(json!({"title": "different text"}))).await;
    assert_eq!(r.status, StatusCode::OK);
    assert_eq!(r.json()["title"], "different text");
    assert_eq!(get(&app, "/todo/1").await.json()["title"], "different text");
}

#[tokio::test]
async fn patching_completedness() {
    let app = seeded(Settings::test()).await;
    assert_eq!(get(&app, "/todo/1").await.json()["completed"], json!(false));
    let r = send(&app, Method::PATCH, "/todo/1", Some(json!({"completed": true}))).await;
    assert_eq!(r.json()["completed"], json!(true));
    assert_eq!(get(&app, "/todo/1").await.json()["completed"], json!(true));
}

#[tokio::test]
async fn put_is_patch() {
    let app = seeded(Settings::test()).await;
    let r = send(&app, Method::PUT, "/todo/2", Some(json!({"completed": true}))).await;
    assert_eq!(r.status, StatusCode::OK);
    assert_eq!(r.json()["title"], "Second task");
}

#[tokio::test]
async fn deleted_todo_is_gone() {
    let app = seeded(Settings::test()).await;
    let r = send(&app, Method::DELETE, "/todo/1", None).await;
    assert_eq!(r.status, StatusCode::NO_CONTENT);
    assert!(r.body.is_empty());
    let r = get(&app, "/todo/1").await;
    assert_eq!(r.status, StatusCode::NOT_FOUND);
    assert_eq!(r.json()["status"], "Not Found");
    let r = send(&app, Method::DELETE, "/todo/1", None).await;
    assert_eq!(r.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_only_touches_referenced_todo() {
    let app = seeded(Settings::test()).await;
    assert_eq!(send(&app, Method::DELETE, "/todo/1", None).await.status, StatusCode::NO_CONTENT);
    let r = get(&app, "/todo/2").await;
    assert_eq!(r.status, StatusCode::OK);
    assert_eq!(r.json()["title"], "Second task");
}

#[tokio::test]
async fn pagination_reports_true_total() {
    let app = seeded(Settings::test()).await;
    let body = get(&app, "/todo?results_per_page=2&page=2").await.json();
    assert_eq!(body["num_results"], 3);
    assert_eq!(body["total_pages"], 2);
    assert_eq!(body["page"], 2);
    assert_eq!(body["objects"].as_array().unwrap().len(), 1);
    assert_eq!(body["objects"][0]["title"], "Third task");
}

#[tokio::test]
async fn filters_and_ordering() {
    let app = seeded(Settings::test()).await;
    send(&app, Method::PATCH, "/todo/2", Some(json!({"completed": true}))).await;
    let body = get(&app, "/todo?completed=true").await.json();
    assert_eq!(body["num_results"], 1);
    assert_eq!(body["objects"][0]["id"], 2);

    let q = r#"{"filters":[{"name":"title","op":"like","val":"%task"}],
               "order_by":[{"field":"id","direction":"desc"}]}"#;
    let uri = format!("/todo?q={}", urlencode(q));
    let body = get(&app, &uri).await.json();
    let ids: Vec<i64> = body["objects"]
        .as_array()
        .unwrap()
        .iter()
        .map(|o| o["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, [3, 2, 1]);
}

#[tokio::test]
async fn unknown_filter_field_is_rejected() {
    let app = seeded(Settings::test()).await;
    let r = get(&app, "/todo?colour=red").await;
    assert_eq!(r.status, StatusCode::BAD_REQUEST);
    assert_eq!(r.json()["validation_errors"]["colour"], "unknown field");
}

#[tokio::test]
async fn round_trip() {
    let app = seeded(Settings::test()).await;
    let payload = json!({"title": "Round", "completed": true});
    let created = send(&app, Method::POST, "/todo", Some(payload)).await.json();
    let fetched = get(&app, &format!("/todo/{}", created["id"])).await.json();
    assert_eq!(fetched["title"], "Round");
    assert_eq!(fetched["completed"], json!(true));
    assert_eq!(fetched["utc_created"], created["utc_created"]);
}

fn stamp(v: &serde_json::Value) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(v.as_str().unwrap()).unwrap().with_timezone(&Utc)
}

#[tokio::test]
async fn utc_updated_strictly_increases() {
    let app = seeded(Settings::test()).await;
    let mut previous = stamp(&get(&app, "/todo/1").await.json()["utc_updated"]);
    for _ in 0..3 {
        let body = send(&app, Method::PATCH, "/todo/1", Some(json!({}))).await.json();
        let next = stamp(&body["utc_updated"]);
        assert!(next > previous);
        assert!(next >= stamp(&body["utc_created"]));
        previous = next;
    }
}

#[tokio::test]
async fn bulk_patch_moves_utc_updated_past_stored_stamps() {
    let state = open_state(Settings::test()).await;
    let app = app(state.clone());
    seed(&app).await;
    let ahead = Utc::now() + Duration::seconds(60);
    sqlx::query("UPDATE todo SET utc_updated = ?1 WHERE id = 1")
        .bind(ahead)
        .execute(&state.pool)
        .await
        .unwrap();
    let before = stamp(&get(&app, "/todo/1").await.json()["utc_updated"]);
    assert!(before > Utc::now());

    let r = send(&app, Method::PATCH, "/todo", Some(json!({"completed": true}))).await;
    assert_eq!(r.json()["num_modified"], 3);
    for id in 1..=3 {
        let after = stamp(&get(&app, &format!("/todo/{}", id)).await.json()["utc_updated"]);
        assert!(after > before);
    }
}

#[tokio::test]
async fn oversized_body_gets_json_413() {
    let mut settings = Settings::test();
    settings.body_limit = 64;
    let app = seeded(settings).await;
    let payload = json!({ "title": "x".repeat(500) }).to_string();

    let declared = Request::builder()
        .method(Method::POST)
        .uri("/todo")
        .header(header::CONTENT_TYPE, JSON)
        .header(header::CONTENT_LENGTH, payload.len())
        .body(Body::from(payload.clone()))
        .unwrap();
    let streamed = Request::builder()
        .method(Method::POST)
        .uri("/todo")
        .header(header::CONTENT_TYPE, JSON)
        .body(Body::from(payload))
        .unwrap();
    for req in [declared, streamed] {
        let r = request(&app, req).await;
        assert_eq!(r.status, StatusCode::PAYLOAD_TOO_LARGE);
        let ct = r.headers[header::CONTENT_TYPE].to_str().unwrap();
        assert!(ct.starts_with("application/json"));
        let body = r.json();
        assert_eq!(body["status"], "Payload Too Large");
        assert!(body["message"].as_str().is_some_and(|m| !m.is_empty()));
    }
    assert_eq!(num_todos(&app).await, 3);
}

#[tokio::test]
async fn oversized_page_size_is_clamped() {
    let app = seeded(Settings::test()).await;
    let r = get(&app, "/todo?results_per_page=99999999999").await;
    assert_eq!(r.status, StatusCode::OK);
    assert_eq!(r.json()["objects"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn validation_errors_name_the_field() {
    let app = seeded(Settings::test()).await;
    let r = send(&app, Method::POST, "/todo", Some(json!({"completed": true}))).await;
    assert_eq!(r.status, StatusCode::BAD_REQUEST);
    let body = r.json();
    assert_eq!(body["status"], "Bad Request");
    assert_eq!(body["validation_errors"]["title"], "is required");

    let r = send(&app, Method::PATCH, "/todo/1", Some(json!({"title": ""}))).await;
    assert_eq!(r.status, StatusCode::BAD_REQUEST);
    let r = send(&app, Method::PATCH, "/todo/1", Some(json!({"id": 9}))).await;
    assert_eq!(r.json()["validation_errors"]["id"], "field is read-only");
    assert_eq!(get(&app, "/todo/1").await.json()["title"], "First task");
}

#[tokio::test]
async fn bulk_operations() {
    let app = seeded(Settings::test()).await;
    let r = send(&app, Method::PATCH, "/todo?id=1", Some(json!({"completed": true}))).await;
    assert_eq!(r.status, StatusCode::OK);
    assert_eq!(r.json()["num_modified"], 1);
    let r = send(&app, Method::PATCH, "/todo", Some(json!({"completed": true}))).await;
    assert_eq!(r.json()["num_modified"], 3);

    let r = send(&app, Method::DELETE, "/todo?completed=true", None).await;
    assert_eq!(r.json()["num_deleted"], 3);
    assert_eq!(num_todos(&app).await, 0);
}

#[tokio::test]
async fn disabled_bulk_operations_are_405() {
    let mut settings = Settings::test();
    settings.allow_patch_many = false;
    settings.allow_delete_many = false;
    let app = seeded(settings).await;
    for method in [Method::DELETE, Method::PATCH] {
        let r = send(&app, method, "/todo", Some(json!({"completed": true}))).await;
        assert_eq!(r.status, StatusCode::METHOD_NOT_ALLOWED);
        let body = r.json();
        assert_eq!(body["message"], "The method is not allowed for the requested URL.");
        assert_eq!(body["status"], "Method Not Allowed");
    }
    assert_eq!(num_todos(&app).await, 3);
}

#[tokio::test]
async fn unconfigured_and_unrouted_methods_are_405() {
    let mut settings = Settings::test();
    settings.methods = vec![Method::GET, Method::POST];
    let app = seeded(settings).await;
    let r = send(&app, Method::DELETE, "/todo/1", None).await;
    assert_eq!(r.status, StatusCode::METHOD_NOT_ALLOWED);

    let r = send(&app, Method::POST, "/todo/1", Some(json!({"title": "x"}))).await;
    assert_eq!(r.status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(r.json()["status"], "Method Not Allowed");
}

#[tokio::test]
async fn unknown_path_is_json_404() {
    let app = seeded(Settings::test()).await;
    let r = get(&app, "/nothing/here").await;
    assert_eq!(r.status, StatusCode::NOT_FOUND);
    assert_eq!(r.json()["status"], "Not Found");
    assert_eq!(get(&app, "/todo/abc").await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn reset_empties_store() {
    let app = seeded(Settings::test()).await;
    let r = get(&app, "/reset/").await;
    assert_eq!(r.status, StatusCode::OK);
    assert_eq!(r.json()["message"], "Database reset!");
    assert_eq!(num_todos(&app).await, 0);
}

#[tokio::test]
async fn bodies_have_sorted_keys_and_validators() {
    let app = seeded(Settings::test()).await;
    let r = get(&app, "/todo/1").await;
    assert!(r.headers[header::CONTENT_TYPE].to_str().unwrap().starts_with("application/json"));
    assert!(r.headers.contains_key(header::ETAG));
    assert!(r.headers.contains_key(header::LAST_MODIFIED));
    let text = String::from_utf8(r.body.to_vec()).unwrap();
    let keys = ["completed", "id", "status", "title", "utc_created", "utc_updated"];
    let positions: Vec<usize> = keys
        .iter()
        .map(|k| text.find(&format!("\"{}\"", k)).unwrap())
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));
}

#[tokio::test]
async fn https_redirect_when_configured() {
    let mut settings = Settings::test();
    settings.debug = false;
    settings.testing = false;
    settings.server_name = Some("todo.example.com".into());
    let app = open(settings).await;
    let r = get(&app, "/todo?page=1").await;
    assert_eq!(r.status, StatusCode::MOVED_PERMANENTLY);
    assert_eq!(r.headers[header::LOCATION], "https://todo.example.com/todo?page=1");

    let req = Request::builder()
        .uri("/")
        .header("x-forwarded-proto", "https")
        .body(Body::empty())
        .unwrap();
    assert_eq!(request(&app, req).await.status, StatusCode::OK);
}

fn urlencode(s: &str) -> String {
    s.bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                (b as char).to_string()
            }
            _ => format!("%{:02X}", b),
        })
        .collect()
}
