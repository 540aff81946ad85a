//! LookupClient and health probe tests against a mock inventory backend
//!
//! The mock binds to 127.0.0.1:0 and checks the credential headers on every
//! request.

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tally_common::{ApiConfig, HealthState, LookupResult, ScanEntry};
use tally_scan::health;
use tally_scan::lookup::{InventoryBackend, LookupClient};

const PNG_1X1: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

#[derive(Clone, Default)]
struct MockState {
    exports: Arc<Mutex<Vec<Value>>>,
}

fn authorized(headers: &HeaderMap) -> bool {
    headers.get("authorization").and_then(|v| v.to_str().ok()) == Some("secret")
        && headers.get("branch").and_then(|v| v.to_str().ok()) == Some("HN")
}

async fn mock_health(headers: HeaderMap) -> StatusCode {
    if authorized(&headers) {
        StatusCode::OK
    } else {
        StatusCode::UNAUTHORIZED
    }
}

async fn mock_product(headers: HeaderMap, Query(query): Query<HashMap<String, String>>) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let code = query.get("productName").cloned().unwrap_or_default();
    match code.as_str() {
        "GH1" => Json(json!({
            "productName": "Nhan bac 925",
            "price": 250000,
            "base64": format!("data:image/png;base64,{}", PNG_1X1),
            "isWarning": true,
            "linkPostFB": "https://facebook.com/post/1"
        }))
        .into_response(),
        "BAD-IMAGE" => Json(json!({
            "productName": "Vong tay",
            "base64": "***"
        }))
        .into_response(),
        "MISSING" => StatusCode::NOT_FOUND.into_response(),
        "BROKEN" => "this is not json".into_response(),
        // Echo the code back so query encoding can be checked
        other => Json(json!({ "productName": other })).into_response(),
    }
}

async fn mock_export(
    State(state): State<MockState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> StatusCode {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED;
    }
    state.exports.lock().unwrap().push(body);
    StatusCode::OK
}

async fn start_mock() -> (SocketAddr, MockState) {
    let state = MockState::default();
    let app = Router::new()
        .route("/api/health", get(mock_health))
        .route("/api/product", get(mock_product))
        .route("/api/copy-scan-result", post(mock_export))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, state)
}

fn config_for(addr: SocketAddr) -> ApiConfig {
    // Trailing slash is tolerated
    ApiConfig::new(format!("http://{}/", addr), "HN", "secret")
}

fn client() -> LookupClient {
    LookupClient::new(Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_lookup_found_product() {
    let (addr, _) = start_mock().await;

    let result = client().lookup(&config_for(addr), "GH1").await;
    let LookupResult::Found(info) = result else {
        panic!("expected a product, got {:?}", result);
    };

    assert_eq!(info.product_name.as_deref(), Some("Nhan bac 925"));
    assert_eq!(info.price, Some(250000.0));
    assert!(info.is_warning);
    assert!(info.image.is_some());
    assert_eq!(info.link_url.as_deref(), Some("https://facebook.com/post/1"));
    assert_eq!(info.summary_line(), "Nhan bac 925 - Price: 250.000\u{a0}₫");
}

#[tokio::test]
async fn test_lookup_encodes_code_in_query() {
    let (addr, _) = start_mock().await;

    let code = "NHAN 1&2=3";
    let result = client().lookup(&config_for(addr), code).await;
    let LookupResult::Found(info) = result else {
        panic!("expected a product, got {:?}", result);
    };
    assert_eq!(info.product_name.as_deref(), Some(code));
}

#[tokio::test]
async fn test_lookup_drops_malformed_image() {
    let (addr, _) = start_mock().await;

    let result = client().lookup(&config_for(addr), "BAD-IMAGE").await;
    let LookupResult::Found(info) = result else {
        panic!("expected a product, got {:?}", result);
    };
    assert_eq!(info.product_name.as_deref(), Some("Vong tay"));
    assert!(info.image.is_none());
}

#[tokio::test]
async fn test_lookup_non_success_status_fails() {
    let (addr, _) = start_mock().await;

    let result = client().lookup(&config_for(addr), "MISSING").await;
    let message = result.error_message().expect("lookup should fail");
    assert!(message.contains("404"), "unexpected message: {}", message);
}

#[tokio::test]
async fn test_lookup_malformed_body_fails() {
    let (addr, _) = start_mock().await;

    let result = client().lookup(&config_for(addr), "BROKEN").await;
    assert!(matches!(result, LookupResult::Failed { .. }));
}

#[tokio::test]
async fn test_lookup_wrong_credentials_fails() {
    let (addr, _) = start_mock().await;
    let config = ApiConfig::new(format!("http://{}", addr), "HN", "wrong");

    let result = client().lookup(&config, "GH1").await;
    assert!(result.error_message().unwrap().contains("401"));
}

#[tokio::test]
async fn test_lookup_unreachable_backend_fails() {
    // Bind then drop to get a port nobody listens on
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let result = client().lookup(&config_for(addr), "GH1").await;
    assert!(matches!(result, LookupResult::Failed { .. }));
}

#[tokio::test]
async fn test_health_probe_against_backend() {
    let (addr, _) = start_mock().await;
    let client = client();

    assert!(client.check_health(&config_for(addr)).await.is_ok());
    assert_eq!(health::probe(&client, &config_for(addr)).await, HealthState::Healthy);

    let wrong_branch = ApiConfig::new(format!("http://{}", addr), "HCM", "secret");
    assert!(client.check_health(&wrong_branch).await.is_err());
    assert_eq!(health::probe(&client, &wrong_branch).await, HealthState::Unhealthy);
}

#[tokio::test]
async fn test_export_posts_items() {
    let (addr, state) = start_mock().await;

    let mut merged = ScanEntry::new("A");
    merged.count = 2;
    let items = vec![ScanEntry::new("B"), merged];

    client()
        .export_scan_result(&config_for(addr), &items)
        .await
        .unwrap();

    let exports = state.exports.lock().unwrap().clone();
    assert_eq!(
        exports,
        vec![json!({
            "items": [
                { "value": "B", "count": 1 },
                { "value": "A", "count": 2 }
            ]
        })]
    );
}
