use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use drowsiness_dashboard::{
    api::ApiClient,
    config::{ApiConfig, PollingConfig},
    dashboard::{self, DeviceHistorySource, FleetDashboard, FleetQuery},
    errors::DashboardError,
    models::{DrowsinessLevel, Severity},
    polling::{PollSource, PollingService, SystemClock},
    reducer::DrivingStatus,
};

fn client_for(server: &MockServer) -> ApiClient {
    ApiClient::new(&format!("{}/api", server.uri())).unwrap()
}

fn history_body() -> serde_json::Value {
    json!({
        "device_id": "device_01",
        "count": 3,
        "data": [
            {"id": 3, "device_id": "device_01", "drowsiness_level": "HIGH", "status": "drowsy", "timestamp": "2024-12-16T19:45:00Z"},
            {"id": 2, "device_id": "device_01", "drowsiness_level": "medium", "status": "tired", "timestamp": "2024-12-16T13:10:00Z"},
            {"id": 1, "device_id": "device_01", "drowsiness_level": "low", "status": null, "timestamp": "2024-12-16T07:00:00Z"}
        ]
    })
}

async fn mount_history(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/devices/device_01/history"))
        .and(query_param("limit", "300"))
        .respond_with(ResponseTemplate::new(200).set_body_json(history_body()))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_history_to_dashboard_state() {
    let server = MockServer::start().await;
    mount_history(&server).await;

    let source = DeviceHistorySource::new(
        client_for(&server),
        "device_01",
        300,
        Arc::new(SystemClock),
    );
    let snapshot = source.fetch().await.unwrap();

    let latest = snapshot.summary.latest.as_ref().unwrap();
    assert_eq!(latest.drowsiness_level, DrowsinessLevel::High);
    assert_eq!(latest.driving_status, DrivingStatus::RestImmediately);

    let events = &snapshot.summary.events;
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].time, "19:45:00");
    assert_eq!(events[0].severity, Severity::Danger);
    assert_eq!(events[1].time, "13:10:00");
    assert_eq!(events[1].label, "Caution");

    let counts: Vec<(&str, u32)> = snapshot
        .histogram
        .iter()
        .map(|bar| (bar.label.as_str(), bar.total()))
        .collect();
    assert_eq!(
        counts,
        vec![
            ("06-09", 0),
            ("09-12", 0),
            ("12-15", 1),
            ("15-18", 0),
            ("18-21", 1),
            ("21-24", 0),
        ]
    );

    assert!(snapshot.last_critical_at.is_some());
    assert_eq!(source.boost_anchor(&snapshot), snapshot.last_critical_at);
}

#[tokio::test]
async fn test_danger_stamp_holds_within_cooldown() {
    let server = MockServer::start().await;
    mount_history(&server).await;

    let source = DeviceHistorySource::new(
        client_for(&server),
        "device_01",
        300,
        Arc::new(SystemClock),
    );
    let first = source.fetch().await.unwrap();
    let second = source.fetch().await.unwrap();

    assert_eq!(first.last_critical_at, second.last_critical_at);
}

#[tokio::test]
async fn test_null_history_is_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/devices/device_09/history"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"device_id": "device_09", "count": 0, "data": null})),
        )
        .mount(&server)
        .await;

    let source = DeviceHistorySource::new(
        client_for(&server),
        "device_09",
        300,
        Arc::new(SystemClock),
    );
    let snapshot = source.fetch().await.unwrap();

    assert!(snapshot.summary.latest.is_none());
    assert_eq!(snapshot.summary.last_event(), "-");
    assert!(snapshot.last_critical_at.is_none());
    assert!(snapshot.histogram.iter().all(|bar| bar.height == 8.0));
}

#[tokio::test]
async fn test_watch_driver_shares_poller() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/devices/device_01/history"))
        .respond_with(ResponseTemplate::new(200).set_body_json(history_body()))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let service = PollingService::new();
    let api = ApiConfig::default();
    let polling = PollingConfig::default();

    let mut first = dashboard::watch_driver(&service, &client, "device_01", &api, &polling).unwrap();
    let second = dashboard::watch_driver(&service, &client, "device_01", &api, &polling).unwrap();
    assert_eq!(service.active(), 1);

    let snapshot = first.next().await.unwrap();
    assert_eq!(snapshot.summary.events_today(), 2);
    assert_eq!(second.latest(), Some(snapshot));

    drop(first);
    drop(second);
    assert_eq!(service.active(), 0);
}

async fn mount_admin(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/admin/overview"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total_drivers": 3,
            "active_drivers": "two",
            "total_devices": 3,
            "alerts_today": 9,
            "critical_alerts_today": 4
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/admin/drivers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "drivers": [
                {"id": "1", "name": "Aiko Sato", "device_id": "device_01", "is_online": true, "critical_alerts_today": 3, "source": "real"},
                {"id": "2", "name": "Kenji Mori", "device_id": "device_02", "is_online": false, "critical_alerts_today": 1, "source": "mock"},
                {"id": "3", "name": "Sakura Ito", "device_id": "device_03"}
            ]
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/admin/recent-alerts"))
        .and(query_param("limit", "20"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "alerts": [
                {"time": "19:45", "driver": "Aiko Sato", "type": "high", "severity": "danger", "vehicleId": "TRK-01"},
                {"driver": null}
            ]
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/admin/alert-slots"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "slots": [{"label": "18-20", "count": 6}, {"label": "12-14", "count": 3}, {"label": "02-04", "count": 9}],
            "peak_slot": "18-20",
            "peak_count": 6
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/admin/alert-levels"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "high_count": 4,
            "medium_count": 5,
            "high_pct": 20.0,
            "medium_pct": 25.0
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_fleet_view_assembles_admin_resources() {
    let server = MockServer::start().await;
    mount_admin(&server).await;

    let client = client_for(&server);
    let service = PollingService::new();
    let mut fleet = FleetDashboard::watch(
        &service,
        &client,
        &ApiConfig::default(),
        &PollingConfig::default(),
    )
    .unwrap();
    assert_eq!(service.active(), 5);
    assert!(fleet.ready().await);

    // Let the remaining first fetches land
    let mut view = fleet.view(&FleetQuery::default());
    for _ in 0..50 {
        if view.overview.is_some()
            && view.slots.is_some()
            && view.levels.is_some()
            && view.alerts.total > 0
        {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        view = fleet.view(&FleetQuery::default());
    }

    let overview = view.overview.unwrap();
    assert_eq!(overview.total_drivers, 3);
    assert_eq!(overview.active_drivers, 0);

    assert_eq!(view.drivers.total, 3);
    assert_eq!(view.drivers.items[2].name, "Sakura Ito");
    assert!(!view.drivers.items[2].is_online);

    assert_eq!(view.alerts.total, 2);
    assert_eq!(view.alerts.items[0].vehicle_id, "TRK-01");
    assert_eq!(view.alerts.items[1].driver, "unknown driver");
    assert_eq!(view.alerts.items[1].severity, "info");

    let slots = view.slots.unwrap();
    assert_eq!(slots.bars.len(), 9);
    assert_eq!(slots.peak_slot, "18-20");
    assert_eq!(slots.bars[6].count, 6);
    assert_eq!(slots.bars[3].count, 3);
    assert_eq!(slots.bars.iter().map(|b| b.count).sum::<u32>(), 9);

    let levels = view.levels.unwrap();
    assert_eq!(levels.high_count, 4);
    assert_eq!(levels.safe_pct, 100.0);

    let searched = fleet.view(&FleetQuery {
        search: "DEVICE_02".to_string(),
        ..FleetQuery::default()
    });
    assert_eq!(searched.drivers.total, 1);
    assert_eq!(searched.drivers.items[0].name, "Kenji Mori");
}

#[tokio::test]
async fn test_server_errors_surface_from_single_fetch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/admin/alert-slots"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"slots": "oops"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/admin/overview"))
        .respond_with(ResponseTemplate::new(503).set_body_string(""))
        .mount(&server)
        .await;

    let client = client_for(&server);

    let slots = dashboard::AlertSlotsSource(client.clone()).fetch().await;
    assert!(matches!(slots, Err(DashboardError::EmptyPoll(_))));

    let overview = dashboard::OverviewSource(client).fetch().await.unwrap_err();
    assert_eq!(overview.inline_message(), "Request failed: 503");
}
