//! Integration tests for the HTTP transport.
//!
//! These tests verify the end-to-end flow:
//!   IosDriver -> HttpCommandExecutor -> HTTP -> mock server -> response
//!
//! The mock server answers one request per connection from a canned script
//! and records what it received.

mod common;

use std::sync::Arc;
use std::time::Duration;

use reqwest::Url;
use serde_json::json;

use common::{mock_http_server, ok, recorded, CountingClientFactory};

use iosdrive_core::alert::Alert;
use iosdrive_core::capabilities::Capabilities;
use iosdrive_core::command::{Command, DriverCommand, SessionId};
use iosdrive_core::executor::{CommandError, CommandExecutor};
use iosdrive_core::http::HttpCommandExecutor;
use iosdrive_core::ios::{DriverConfig, IosDriver, SessionTarget};
use iosdrive_core::session::TargetLocator;

fn base_url(addr: std::net::SocketAddr) -> Url {
    format!("http://{addr}/").parse().unwrap()
}

// ---------------------------------------------------------------------------
// Driver over HTTP
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_remote_driver_session_lifecycle() {
    let (addr, requests) = mock_http_server(vec![
        ok(json!({"sessionId": "s-1", "capabilities": {"platformName": "iOS"}})),
        ok(json!(null)),
        ok(json!("Allow access?")),
        ok(json!(null)),
    ])
    .await;

    let config = DriverConfig::new(SessionTarget::Remote(base_url(addr)));
    let caps = Capabilities::new().with("appium:automationName", "XCUITest");
    let driver: IosDriver = IosDriver::new(config, caps).await.unwrap();
    assert_eq!(driver.session_id().as_str(), "s-1");

    driver
        .run_app_in_background(Duration::from_millis(1500))
        .await
        .unwrap();
    let text = driver.switch_to().alert().text().await.unwrap();
    assert_eq!(text, "Allow access?");
    driver.quit().await.unwrap();

    let requests = recorded(&requests);
    assert_eq!(requests.len(), 4);

    assert_eq!(requests[0].method, "POST");
    assert_eq!(requests[0].path, "/session");
    assert_eq!(
        requests[0].json()["capabilities"]["alwaysMatch"]["platformName"],
        "iOS"
    );

    assert_eq!(requests[1].method, "POST");
    assert_eq!(requests[1].path, "/session/s-1/appium/app/background");
    assert_eq!(requests[1].json(), json!({"seconds": {"timeout": 1500}}));

    assert_eq!(requests[2].method, "GET");
    assert_eq!(requests[2].path, "/session/s-1/alert/text");
    assert!(requests[2].body.is_empty());

    assert_eq!(requests[3].method, "DELETE");
    assert_eq!(requests[3].path, "/session/s-1");
}

#[tokio::test]
async fn test_remote_driver_surfaces_server_error() {
    let (addr, _requests) = mock_http_server(vec![
        ok(json!({"sessionId": "s-2"})),
        common::error(404, "no such alert", "no alert open"),
    ])
    .await;

    let config = DriverConfig::new(SessionTarget::Remote(base_url(addr)));
    let driver: IosDriver = IosDriver::new(config, Capabilities::new()).await.unwrap();

    let err = driver.switch_to().alert().dismiss().await.unwrap_err();
    assert_eq!(
        err,
        CommandError::Server {
            status: Some(404),
            error: "no such alert".into(),
            message: "no alert open".into(),
        }
    );
}

#[tokio::test]
async fn test_remote_target_uses_supplied_client_factory() {
    let (addr, requests) = mock_http_server(vec![
        ok(json!({"sessionId": "s-f", "capabilities": {}})),
        ok(json!(null)),
    ])
    .await;

    let factory = Arc::new(CountingClientFactory::default());
    let config = DriverConfig::new(SessionTarget::Remote(base_url(addr)))
        .with_http_client_factory(factory.clone());
    let driver: IosDriver = IosDriver::new(config, Capabilities::new()).await.unwrap();
    driver.shake().await.unwrap();

    assert_eq!(factory.created(), 1);

    let requests = recorded(&requests);
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].path, "/session");
    assert_eq!(
        requests[0].json()["capabilities"]["alwaysMatch"]["platformName"],
        "iOS"
    );
    assert_eq!(requests[1].path, "/session/s-f/appium/device/shake");
}

// ---------------------------------------------------------------------------
// Local service targets
// ---------------------------------------------------------------------------

#[cfg(unix)]
mod local_service {
    use super::*;

    use iosdrive_core::service::AppiumServiceBuilder;

    use crate::common::stub_appium;

    /// Replies for startup readiness, `newSession` and `quit`, in that order.
    fn service_replies(session_id: &str) -> Vec<(u16, String)> {
        vec![
            ok(json!({"ready": true})),
            ok(json!({"sessionId": session_id, "capabilities": {}})),
            ok(json!(null)),
        ]
    }

    fn assert_started_then_created(requests: &[common::RecordedRequest]) {
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].method, "GET");
        assert_eq!(requests[0].path, "/status");
        assert_eq!(requests[1].method, "POST");
        assert_eq!(requests[1].path, "/session");
        assert_eq!(
            requests[1].json()["capabilities"]["alwaysMatch"]["platformName"],
            "iOS"
        );
        assert_eq!(requests[2].method, "DELETE");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_builder_target_starts_service_and_creates_session() {
        let (addr, requests) = mock_http_server(service_replies("svc-b")).await;

        let builder = AppiumServiceBuilder::new()
            .with_binary(stub_appium())
            .using_port(addr.port());
        let config = DriverConfig::new(SessionTarget::Builder(builder));
        let driver: IosDriver = IosDriver::new(config, Capabilities::new()).await.unwrap();

        assert_eq!(driver.session_id().as_str(), "svc-b");
        assert!(driver.service().is_some());
        driver.quit().await.unwrap();

        let requests = recorded(&requests);
        assert_started_then_created(&requests);
        assert_eq!(requests[2].path, "/session/svc-b");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_service_target_starts_service_and_creates_session() {
        let (addr, requests) = mock_http_server(service_replies("svc-s")).await;

        let service = AppiumServiceBuilder::new()
            .with_binary(stub_appium())
            .using_port(addr.port())
            .build()
            .unwrap();
        let config = DriverConfig::new(SessionTarget::Service(service));
        let driver: IosDriver = IosDriver::new(config, Capabilities::new()).await.unwrap();

        assert_eq!(driver.session_id().as_str(), "svc-s");
        assert!(driver.service().is_some());
        driver.quit().await.unwrap();

        let requests = recorded(&requests);
        assert_started_then_created(&requests);
        assert_eq!(requests[2].path, "/session/svc-s");
    }
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_executor_expands_element_path() {
    let (addr, requests) = mock_http_server(vec![ok(json!(null))]).await;
    let executor = HttpCommandExecutor::new(base_url(addr)).unwrap();

    let mut params = serde_json::Map::new();
    params.insert("id".into(), json!("el-9"));
    params.insert("value".into(), json!("typed"));
    executor
        .execute(Command::new(
            Some(SessionId::new("s-3")),
            DriverCommand::SetValue,
            params,
        ))
        .await
        .unwrap();

    let requests = recorded(&requests);
    assert_eq!(requests[0].path, "/session/s-3/appium/element/el-9/value");
    assert_eq!(requests[0].json(), json!({"value": "typed"}));
}

#[tokio::test]
async fn test_executor_legacy_status_failure() {
    let (addr, _requests) = mock_http_server(vec![(
        200,
        json!({"status": 27, "value": {"message": "no alert"}}).to_string(),
    )])
    .await;
    let executor = HttpCommandExecutor::new(base_url(addr)).unwrap();

    let err = executor
        .execute(Command::new(
            Some(SessionId::new("s")),
            DriverCommand::AcceptAlert,
            serde_json::Map::new(),
        ))
        .await
        .unwrap_err();

    assert_eq!(err.server_error_code(), Some("status 27"));
}

#[tokio::test]
async fn test_executor_connection_refused() {
    // Bind and drop to obtain a port with nothing listening.
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let executor = HttpCommandExecutor::new(base_url(addr)).unwrap();

    let err = executor
        .execute(Command::new(None, DriverCommand::Status, serde_json::Map::new()))
        .await
        .unwrap_err();

    assert!(err.is_connection_error(), "got {err:?}");
}
