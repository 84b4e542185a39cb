#![allow(clippy::unwrap_used)]
// End-to-end: coordinator driving a real `GpsClient` against wiremock.

use std::time::Duration;

use serde_json::json;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use trackline_core::{
    Command, Coordinator, CoordinatorConfig, CoordinatorState, CoreError, DeviceLookup,
    PollSettings,
};

const LOGIN_PAGE: &str =
    r#"<html><head><meta name="csrf-token" content="tok-login" /></head></html>"#;
const DEVICE_PAGE: &str =
    r#"<html><head><meta name="csrf-token" content="tok-page" /></head></html>"#;

async fn portal() -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/auth/users/sign_in"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "_iadmin=PREAUTH; path=/")
                .set_body_raw(LOGIN_PAGE, "text/html"),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/users/sign_in"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("location", "/")
                .insert_header("set-cookie", "_iadmin=SESSION; path=/; HttpOnly"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/users/4242/devices"))
        .mount(&server)
        .await;

    server
}

fn config(server: &MockServer) -> CoordinatorConfig {
    let mut cfg = CoordinatorConfig::new("parent@example.com", "hunter2".to_string().into());
    cfg.base_url = Some(Url::parse(&server.uri()).unwrap());
    cfg.poll = PollSettings {
        update_interval: Duration::ZERO,
        cycle_timeout: Duration::from_secs(5),
    };
    cfg
}

#[tokio::test]
async fn test_session_loss_keeps_snapshot_and_recovers() {
    let server = portal().await;

    Mock::given(method("GET"))
        .and(path("/users/4242/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "device": { "uuid": "u-1", "name": "Emma" } },
            { "device": { "uuid": "u-2", "name": "Noah" } }
        ])))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users/4242/devices"))
        .respond_with(ResponseTemplate::new(401))
        .up_to_n_times(1)
        .with_priority(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users/4242/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "device": { "uuid": "u-1", "name": "Emma" } }
        ])))
        .with_priority(3)
        .mount(&server)
        .await;

    let coordinator = Coordinator::from_config(&config(&server)).unwrap();
    coordinator.start().await.unwrap();
    assert_eq!(coordinator.current_state(), CoordinatorState::Ready);
    assert_eq!(coordinator.snapshot().len(), 2);

    let err = coordinator.refresh().await.unwrap_err();
    assert!(matches!(err, CoreError::RefreshFailed { .. }), "got {err:?}");
    assert!(coordinator.current_state().is_stale());
    assert_eq!(coordinator.snapshot().len(), 2);

    let snapshot = coordinator.refresh().await.unwrap();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(coordinator.current_state(), CoordinatorState::Ready);

    coordinator.shutdown().await;
}

#[tokio::test]
async fn test_oneshot_locate_by_name() {
    let server = portal().await;

    Mock::given(method("GET"))
        .and(path("/users/4242/devices"))
        .and(wiremock::matchers::header("accept", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "device": { "uuid": "u-1", "name": "Emma" } }
        ])))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users/4242/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(DEVICE_PAGE, "text/html"))
        .with_priority(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/devices/u-1/functions"))
        .and(wiremock::matchers::body_string_contains("function%5Bcode%5D=0039"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let cfg = config(&server);
    let result = Coordinator::oneshot(cfg.build_client().unwrap(), cfg.poll, |c| async move {
        c.execute(Command::RefreshLocation {
            device_id: "Emma".into(),
        })
        .await
    })
    .await
    .unwrap();

    assert_eq!(result.device_id, "u-1");
    assert!(result.accepted);
}

#[tokio::test]
async fn test_rejected_credentials_abort_start() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/users/sign_in"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(LOGIN_PAGE, "text/html"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/users/sign_in"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(LOGIN_PAGE, "text/html"))
        .mount(&server)
        .await;

    let coordinator = Coordinator::from_config(&config(&server)).unwrap();
    let err = coordinator.start().await.unwrap_err();

    assert!(matches!(err, CoreError::AuthenticationFailed { .. }), "got {err:?}");
    assert_eq!(coordinator.current_state(), CoordinatorState::Uninitialized);
}
