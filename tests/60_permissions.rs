mod common;

use std::sync::Arc;

use axum::http::{Method, StatusCode};
use serde_json::{json, Value};

use common::{assert_error, TableGate, TestApp};
use metastore_api::permissions::Action;

const ALL: [Action; 9] = [
    Action::DatabasesRead,
    Action::DatabasesWriteAdd,
    Action::DatabasesWriteUpdate,
    Action::DatabasesWriteDelete,
    Action::MetadataRead,
    Action::MetadataReadSecret,
    Action::MetadataWriteAdd,
    Action::MetadataWriteUpdate,
    Action::MetadataWriteDelete,
];

const DATABASES: [&str; 5] = ["a1", "a2", "b1", "a3", "b2"];

fn gate() -> TableGate {
    let mut gate = TableGate::default();
    for db in DATABASES {
        gate = gate.allow("admin", db, &ALL);
    }
    for db in ["a1", "a2", "a3"] {
        gate = gate.allow("alice", db, &[Action::DatabasesRead, Action::MetadataRead]);
    }
    gate.hide("a1", &["weather"])
}

async fn as_user(app: &TestApp, token: &str, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    app.request_as(method, uri, body, Some(token)).await
}

async fn seeded() -> TestApp {
    let app = TestApp::with_gate(Arc::new(gate()));
    for db in DATABASES {
        let (status, body) = as_user(&app, "admin", Method::POST, "/databases", Some(json!({"database_id": db}))).await;
        assert_eq!(status, StatusCode::OK, "{}", body);
    }
    app
}

#[tokio::test]
async fn listing_paginates_after_filtering() {
    let app = seeded().await;

    let (status, page) = as_user(&app, "alice", Method::GET, "/databases?per_page=2", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], json!(3));
    assert_eq!(page["number_of_pages"], json!(2));
    assert_eq!(page["length"], json!(2));

    let (_, page) = as_user(&app, "alice", Method::GET, "/databases?per_page=2&page=2", None).await;
    assert_eq!(page["data"], json!([{"database_id": "a3"}]));

    let (_, page) = as_user(&app, "admin", Method::GET, "/databases", None).await;
    assert_eq!(page["total"], json!(5));

    let (_, page) = as_user(&app, "nobody", Method::GET, "/databases", None).await;
    assert_eq!(page["total"], json!(0));
}

#[tokio::test]
async fn denied_actions_are_403() {
    let app = seeded().await;

    let (status, body) = as_user(&app, "alice", Method::GET, "/databases/b1", None).await;
    assert_error(status, &body, StatusCode::FORBIDDEN);
    let (status, body) = as_user(&app, "alice", Method::DELETE, "/databases/a1", None).await;
    assert_error(status, &body, StatusCode::FORBIDDEN);
    let (status, body) =
        as_user(&app, "alice", Method::POST, "/databases/a1/records", Some(json!({"record_id": "r"}))).await;
    assert_error(status, &body, StatusCode::FORBIDDEN);
    let (status, body) =
        as_user(&app, "alice", Method::PATCH, "/databases/a1/config", Some(json!({"index_columns": ["x"]}))).await;
    assert_error(status, &body, StatusCode::FORBIDDEN);

    let (status, _) = as_user(&app, "alice", Method::GET, "/databases/a1/config", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn hidden_and_secret_columns_are_stripped() {
    let app = seeded().await;
    let (_, config) = as_user(&app, "admin", Method::GET, "/databases/a1/config", None).await;
    let mut columns = config["columns"].as_array().cloned().unwrap();
    columns.push(json!({"name": "password", "dtype": "string", "aggregation": "first", "is_secret": true}));
    let (status, body) =
        as_user(&app, "admin", Method::PATCH, "/databases/a1/config", Some(json!({"columns": columns}))).await;
    assert_eq!(status, StatusCode::OK, "{}", body);

    let record = json!({"record_id": "r", "weather": "rain", "password": "hunter2", "note": "n"});
    let (status, body) = as_user(&app, "admin", Method::POST, "/databases/a1/records", Some(record)).await;
    assert_eq!(status, StatusCode::OK, "{}", body);

    let (status, seen) = as_user(&app, "alice", Method::GET, "/databases/a1/records/r", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(seen.get("weather").is_none());
    assert!(seen.get("password").is_none());
    assert_eq!(seen["note"], json!("n"));

    let (_, page) = as_user(&app, "alice", Method::GET, "/databases/a1/records", None).await;
    assert!(page["data"][0].get("password").is_none());

    let (_, seen) = as_user(&app, "admin", Method::GET, "/databases/a1/records/r", None).await;
    assert_eq!(seen["password"], json!("hunter2"));
    assert!(seen.get("weather").is_none());
}

#[tokio::test]
async fn failing_gate_is_403() {
    let app = TestApp::with_gate(Arc::new(TableGate::broken()));
    let (status, body) = app.post("/databases", json!({"database_id": "a"})).await;
    assert_error(status, &body, StatusCode::FORBIDDEN);
    let (status, body) = app.get("/databases/a").await;
    assert_error(status, &body, StatusCode::FORBIDDEN);
    let (status, page) = app.get("/databases").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], json!(0));
}
