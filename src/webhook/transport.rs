use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::header::AUTHORIZATION;
use reqwest::Client;
use tracing::{debug, info};

use crate::config::CallbackConfig;
use crate::error::{CallbackError, Result};
use crate::webhook::types::NotificationPayload;

/// Webhook 传输接口
#[async_trait]
pub trait WebhookTransport: Send + Sync {
    /// 发送负载，返回 HTTP 状态码；网络层失败返回错误
    async fn post(&self, payload: &NotificationPayload) -> Result<u16>;
}

/// 基于 reqwest 的 HTTP 传输
///
/// `Client` 内部带连接池，可被任意多个并发发送共享。
pub struct HttpWebhookTransport {
    client: Client,
    url: String,
    token: String,
}

impl HttpWebhookTransport {
    pub fn new(config: &CallbackConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(Duration::from_secs(5))
            .build()?;

        Ok(Self {
            client,
            url: config.url.clone(),
            token: config.token.clone(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl WebhookTransport for HttpWebhookTransport {
    async fn post(&self, payload: &NotificationPayload) -> Result<u16> {
        debug!("[CALLBACK HTTP] POST {} to={}", self.url, payload.to);

        let response = self
            .client
            .post(&self.url)
            .header(AUTHORIZATION, self.token.as_str())
            .json(payload)
            .send()
            .await
            .map_err(|e| CallbackError::Network(format!("callback request failed: {}", e)))?;

        Ok(response.status().as_u16())
    }
}

/// Mock 传输（测试用）
///
/// 不发网络请求，只记录负载并返回预设状态码。
pub struct MockWebhookTransport {
    sent: Mutex<Vec<NotificationPayload>>,
    status: Mutex<Option<u16>>,
}

impl MockWebhookTransport {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            status: Mutex::new(Some(200)),
        }
    }

    /// 之后的调用返回给定状态码
    pub fn respond_with(&self, status: u16) {
        *self.status.lock() = Some(status);
    }

    /// 之后的调用模拟网络失败
    pub fn fail_requests(&self) {
        *self.status.lock() = None;
    }

    pub fn sent(&self) -> Vec<NotificationPayload> {
        self.sent.lock().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().len()
    }
}

impl Default for MockWebhookTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WebhookTransport for MockWebhookTransport {
    async fn post(&self, payload: &NotificationPayload) -> Result<u16> {
        info!(
            "[MOCK CALLBACK] from={}, to={}, body={:?}",
            payload.from, payload.to, payload.body
        );
        self.sent.lock().push(payload.clone());

        let status = *self.status.lock();
        status.ok_or_else(|| CallbackError::Network("simulated connection failure".to_string()))
    }
}
