use httpmock::prelude::*;
use privchat_offline_callback::{CallbackConfig, HttpWebhookTransport, NotificationPayload, WebhookTransport};
use serde_json::json;

fn config_for(server: &MockServer) -> CallbackConfig {
    CallbackConfig::new(server.url("/user/offline/callback"), "secret-token")
}

#[tokio::test]
async fn test_http_transport_sends_token_and_json_body() {
    let server = MockServer::start_async().await;
    let hook = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/user/offline/callback")
                .header("authorization", "secret-token")
                .header("content-type", "application/json")
                .json_body(json!({
                    "from": "alice@example.com",
                    "to": "bob@example.com",
                    "body": "hello"
                }));
            then.status(200);
        })
        .await;

    let transport = HttpWebhookTransport::new(&config_for(&server)).expect("transport");
    let payload = NotificationPayload::new("alice@example.com", "bob@example.com", Some("hello".to_string()));

    let status = transport.post(&payload).await.expect("post");
    assert_eq!(status, 200);
    hook.assert_async().await;
}

#[tokio::test]
async fn test_http_transport_omits_body_field() {
    let server = MockServer::start_async().await;
    let hook = server
        .mock_async(|when, then| {
            when.method(POST).path("/user/offline/callback").json_body(json!({
                "from": "alice@example.com",
                "to": "bob@example.com"
            }));
            then.status(204);
        })
        .await;

    let transport = HttpWebhookTransport::new(&config_for(&server)).expect("transport");
    let payload = NotificationPayload::new("alice@example.com", "bob@example.com", None);

    assert_eq!(transport.post(&payload).await.expect("post"), 204);
    hook.assert_async().await;
}

#[tokio::test]
async fn test_http_transport_reports_error_status() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/user/offline/callback");
            then.status(503).body("unavailable");
        })
        .await;

    let transport = HttpWebhookTransport::new(&config_for(&server)).expect("transport");
    let payload = NotificationPayload::new("alice@example.com", "bob@example.com", None);

    assert_eq!(transport.post(&payload).await.expect("post"), 503);
}

#[tokio::test]
async fn test_http_transport_fails_on_unreachable_endpoint() {
    // 端口 9 通常没有监听
    let config = CallbackConfig::new("http://127.0.0.1:9/callback", "secret-token");
    let transport = HttpWebhookTransport::new(&config).expect("transport");
    let payload = NotificationPayload::new("alice@example.com", "bob@example.com", None);

    assert!(transport.post(&payload).await.is_err());
}
