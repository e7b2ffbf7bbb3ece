use super::*;
use crate::config::HikwatchConfig;
use crate::error::HikwatchError;
use crate::events::CameraEvent;
use crate::session::ReconnectPolicy;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::time::timeout;

fn create_test_config(port: u16) -> HikwatchConfig {
    let mut config = HikwatchConfig::default();
    config.camera.host = "127.0.0.1".to_string();
    config.camera.port = port;
    config.camera.password = "secret".to_string();
    config
}

#[test]
fn test_app_creation_validates_config() {
    let result = HikwatchApp::new(HikwatchConfig::default(), OutputFormat::Text);
    assert!(matches!(result, Err(HikwatchError::Config(_))));

    let app = HikwatchApp::new(create_test_config(80), OutputFormat::Json).unwrap();
    assert_eq!(app.client().config().camera.host, "127.0.0.1");
}

#[test]
fn test_shutdown_reason_exit_codes() {
    assert_eq!(ShutdownReason::UserRequest.exit_code(), 0);
    assert_eq!(ShutdownReason::Signal("SIGTERM".to_string()).exit_code(), 0);
    assert_eq!(ShutdownReason::Error("boom".to_string()).exit_code(), 1);
    assert_eq!(
        ShutdownReason::Signal("SIGINT".to_string()).to_string(),
        "received SIGINT"
    );
}

#[tokio::test]
async fn test_shutdown_handle_fires_once() {
    let app = HikwatchApp::new(create_test_config(80), OutputFormat::Text).unwrap();
    let handle = app.shutdown_handle();

    assert!(handle.trigger(ShutdownReason::UserRequest).await);
    assert!(!handle.trigger(ShutdownReason::UserRequest).await);
}

#[tokio::test]
async fn test_run_until_shutdown_request() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let config = create_test_config(listener.local_addr().unwrap().port());
    let mut app = HikwatchApp::new(config, OutputFormat::Json)
        .unwrap()
        .with_reconnect_policy(ReconnectPolicy::fixed(Duration::from_secs(3600)));
    let handle = app.shutdown_handle();
    let mut events = app.client().subscribe();

    let run = tokio::spawn(async move { app.run().await });

    let (mut socket, _) = timeout(Duration::from_secs(5), listener.accept())
        .await
        .unwrap()
        .unwrap();
    let mut buf = [0u8; 1024];
    let _ = socket.read(&mut buf).await.unwrap();
    socket
        .write_all(b"HTTP/1.1 200 OK\r\n\r\n")
        .await
        .unwrap();

    let connected = timeout(Duration::from_secs(5), events.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(connected, CameraEvent::Connected { .. }));

    assert!(handle.trigger(ShutdownReason::Error("test".to_string())).await);
    let exit_code = timeout(Duration::from_secs(5), run)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(exit_code, 1);
}

#[tokio::test]
async fn test_run_twice_is_rejected() {
    let mut app = HikwatchApp::new(create_test_config(1), OutputFormat::Text)
        .unwrap()
        .with_reconnect_policy(ReconnectPolicy::fixed(Duration::from_secs(3600)));
    let handle = app.shutdown_handle();

    handle.trigger(ShutdownReason::UserRequest).await;
    assert_eq!(app.run().await.unwrap(), 0);

    assert!(matches!(app.run().await, Err(HikwatchError::System { .. })));
}
