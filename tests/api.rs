use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use drowsiness_dashboard::{
    api::ApiClient,
    config::{ApiConfig, ApiTarget},
    errors::DashboardError,
    models::DrowsinessLevel,
};

#[tokio::test]
async fn test_latest_reading_with_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/devices/device_01/data"))
        .and(header("authorization", "Bearer tok-1"))
        .and(header("cache-control", "no-store"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "device_id": "device_01",
            "eye_closure": 0.42,
            "drowsiness_level": "Medium",
            "status": "tired",
            "timestamp": "2024-12-16T13:10:00Z"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = ApiClient::new(&format!("{}/api/", server.uri())).unwrap();
    client.set_token(Some("tok-1".to_string()));

    let reading = client.device_latest("device_01").await.unwrap();
    assert_eq!(reading.drowsiness_level, DrowsinessLevel::Medium);
    assert_eq!(reading.eye_closure, Some(0.42));
}

#[tokio::test]
async fn test_unknown_device_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/devices/nope/data"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = ApiClient::new(&format!("{}/api", server.uri())).unwrap();
    let result = client.device_latest("nope").await;
    assert!(matches!(result, Err(DashboardError::NotFound)));
}

#[tokio::test]
async fn test_plain_text_error_body_is_kept() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/admin/drivers"))
        .respond_with(ResponseTemplate::new(500).set_body_string("database offline"))
        .mount(&server)
        .await;

    let client = ApiClient::new(&format!("{}/api", server.uri())).unwrap();
    match client.admin_drivers().await {
        Err(DashboardError::Api { status, message }) => {
            assert_eq!(status, 500);
            assert_eq!(message, "database offline");
        }
        other => panic!("unexpected result: {:?}", other.map(|r| r.drivers.len())),
    }
}

#[tokio::test]
async fn test_non_list_drivers_read_as_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/admin/drivers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"drivers": {"oops": 1}})))
        .mount(&server)
        .await;

    let client = ApiClient::new(&format!("{}/api", server.uri())).unwrap();
    assert!(client.admin_drivers().await.unwrap().drivers.is_empty());
}

#[test]
fn test_client_from_config_resolves_target() {
    let config = ApiConfig {
        target: ApiTarget::Deployed,
        timeout: Duration::from_secs(5),
        ..ApiConfig::default()
    };
    let client = ApiClient::from_config(&config).unwrap();
    assert_eq!(
        client.base_url(),
        "https://driver-drowsiness-api.onrender.com/api"
    );
}
