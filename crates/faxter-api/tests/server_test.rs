//! Server creation against a mocked Faxter API

use faxter_api::resources::ServerHandler;
use faxter_api::{ApiError, FaxterClient, ResourceHandler};
use faxter_cloud::state::ATTR_IP_ADDRESSES;
use faxter_cloud::{PollConfig, ReconcileError, ResourceConfig, ResourceKind, ResourceStatus};
use serde_json::json;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{bearer_token, body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_poll() -> PollConfig {
    PollConfig {
        deadline: Duration::from_secs(5),
        interval: Duration::from_millis(10),
    }
}

fn web_server() -> ResourceConfig {
    ResourceConfig::new(
        ResourceKind::Server,
        "web",
        json!({"key_name": "deploy", "request_floating_ip": true}),
    )
}

async fn mount_create(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/servers/"))
        .and(bearer_token("secret"))
        .and(body_partial_json(json!({
            "project": "default",
            "name": "web",
            "key_name": "deploy",
            "flavor": "copper",
            "request_floating_ip": true
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            {"name": "web", "status": "BUILD"}
        ])))
        .expect(1)
        .mount(server)
        .await;
}

fn status_body(status: &str) -> serde_json::Value {
    json!({
        "name": "web",
        "status": status,
        "properties": {"ip_addresses": ["203.0.113.7"], "request_floating_ip": true}
    })
}

#[tokio::test]
async fn test_create_waits_until_online() {
    let server = MockServer::start().await;
    mount_create(&server).await;

    Mock::given(method("GET"))
        .and(path("/servers/web"))
        .and(query_param("project_name", "default"))
        .respond_with(ResponseTemplate::new(200).set_body_json(status_body("BUILD")))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/servers/web"))
        .respond_with(ResponseTemplate::new(200).set_body_json(status_body("online")))
        .mount(&server)
        .await;

    let client = FaxterClient::new(&server.uri(), "secret").unwrap();
    let handler = ServerHandler::new(fast_poll());

    let state = handler
        .create(&client, &web_server(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(state.id, "web");
    assert_eq!(state.status, ResourceStatus::Active);
    assert_eq!(
        state.get_attribute::<Vec<String>>(ATTR_IP_ADDRESSES),
        Some(vec!["203.0.113.7".to_string()])
    );
}

#[tokio::test]
async fn test_create_reports_provision_failure() {
    let server = MockServer::start().await;
    mount_create(&server).await;

    Mock::given(method("GET"))
        .and(path("/servers/web"))
        .respond_with(ResponseTemplate::new(200).set_body_json(status_body("error")))
        .expect(1)
        .mount(&server)
        .await;

    let client = FaxterClient::new(&server.uri(), "secret").unwrap();
    let err = ServerHandler::new(fast_poll())
        .create(&client, &web_server(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ApiError::Reconcile(ReconcileError::ProvisionFailed { ref handle }) if handle == "web"
    ));
}

#[tokio::test]
async fn test_create_times_out() {
    let server = MockServer::start().await;
    mount_create(&server).await;

    Mock::given(method("GET"))
        .and(path("/servers/web"))
        .respond_with(ResponseTemplate::new(200).set_body_json(status_body("BUILD")))
        .mount(&server)
        .await;

    let client = FaxterClient::new(&server.uri(), "secret").unwrap();
    let poll = PollConfig {
        deadline: Duration::from_millis(60),
        interval: Duration::from_millis(20),
    };
    let err = ServerHandler::new(poll)
        .create(&client, &web_server(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Reconcile(ReconcileError::Timeout { .. })));
}

#[tokio::test]
async fn test_create_server_vanishes() {
    let server = MockServer::start().await;
    mount_create(&server).await;

    Mock::given(method("GET"))
        .and(path("/servers/web"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = FaxterClient::new(&server.uri(), "secret").unwrap();
    let err = ServerHandler::new(fast_poll())
        .create(&client, &web_server(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_create_cancelled() {
    let server = MockServer::start().await;
    mount_create(&server).await;

    Mock::given(method("GET"))
        .and(path("/servers/web"))
        .respond_with(ResponseTemplate::new(200).set_body_json(status_body("BUILD")))
        .mount(&server)
        .await;

    let client = FaxterClient::new(&server.uri(), "secret").unwrap();
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let poll = PollConfig {
        deadline: Duration::from_secs(30),
        interval: Duration::from_millis(10),
    };
    let err = ServerHandler::new(poll)
        .create(&client, &web_server(), &cancel)
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
}

#[tokio::test]
async fn test_error_detail_surfaces() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/servers/"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"detail": "Flavor gold does not exist"})),
        )
        .mount(&server)
        .await;

    let client = FaxterClient::new(&server.uri(), "secret").unwrap();
    let err = ServerHandler::new(fast_poll())
        .create(&client, &web_server(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(err.to_string().contains("Flavor gold does not exist"));
    assert!(matches!(err, ApiError::Status { status, .. } if status.as_u16() == 400));
}

#[tokio::test]
async fn test_read_refreshes_attributes() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/servers/web"))
        .and(query_param("project_name", "default"))
        .respond_with(ResponseTemplate::new(200).set_body_json(status_body("error")))
        .mount(&server)
        .await;

    let client = FaxterClient::new(&server.uri(), "secret").unwrap();
    let mut state = faxter_cloud::ResourceState::new("web", &web_server());

    ServerHandler::new(fast_poll())
        .read(&client, &mut state)
        .await
        .unwrap();

    assert_eq!(state.status, ResourceStatus::Error);
    assert_eq!(state.get_attribute::<String>("status").as_deref(), Some("error"));
}
