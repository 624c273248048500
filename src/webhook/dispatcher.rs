use std::sync::Arc;

use tokio::runtime::Handle;
use tracing::{debug, warn};

use crate::config::CallbackConfig;
use crate::error::{CallbackError, Result};
use crate::infra::metrics;
use crate::infra::AvailabilityOracle;
use crate::model::InboundEvent;
use crate::webhook::transport::WebhookTransport;
use crate::webhook::types::{DispatchOutcome, DispatchPath, NotificationPayload};

/// Webhook 通知发送器
///
/// 职责：
/// - 发送前再次确认接收方不可达（重复调用安全，可达时不发送）
/// - 构造负载并在独立任务中 POST，调用方不等待响应
/// - debug 开启时在该任务里记录响应状态或失败原因
///
/// 不重试；失败只记录，不影响消息投递。
pub struct NotificationDispatcher {
    config: Arc<CallbackConfig>,
    oracle: AvailabilityOracle,
    transport: Arc<dyn WebhookTransport>,
    runtime: Handle,
}

impl NotificationDispatcher {
    pub fn new(
        config: Arc<CallbackConfig>,
        oracle: AvailabilityOracle,
        transport: Arc<dyn WebhookTransport>,
        runtime: Handle,
    ) -> Self {
        Self {
            config,
            oracle,
            transport,
            runtime,
        }
    }

    /// 接收方不可达时发出通知
    pub fn dispatch(&self, event: &InboundEvent, path: DispatchPath) -> Result<DispatchOutcome> {
        let to = event
            .to
            .as_ref()
            .ok_or_else(|| CallbackError::UserNotFound("<missing recipient>".to_string()))?;
        let available = self.oracle.is_reachable(to)?;

        if self.config.debug {
            debug!(
                "[CALLBACK DISPATCH] intercepted message from {} to {}, recipient is available {}",
                event.from.bare(),
                to.bare(),
                available
            );
        }

        if available {
            metrics::record_dispatch_skipped();
            return Ok(DispatchOutcome::RecipientReachable);
        }

        let payload = NotificationPayload::from_event(event, self.config.send_body)?;
        self.spawn_send(payload, path);
        Ok(DispatchOutcome::Sent)
    }

    fn spawn_send(&self, payload: NotificationPayload, path: DispatchPath) {
        let transport = Arc::clone(&self.transport);
        let url = self.config.url.clone();
        let diagnostics = self.config.debug;

        if diagnostics {
            debug!(
                "[CALLBACK DISPATCH] sending request to url='{}' path={} payload={:?}",
                url,
                path.as_str(),
                payload
            );
        }
        metrics::record_dispatch_sent(path.as_str());

        self.runtime.spawn(async move {
            match transport.post(&payload).await {
                Ok(status) if (200..300).contains(&status) => {
                    if diagnostics {
                        debug!(
                            "[CALLBACK DISPATCH] got response status url='{}' status='{}'",
                            url, status
                        );
                    }
                }
                Ok(status) => {
                    metrics::record_dispatch_failed();
                    if diagnostics {
                        warn!(
                            "[CALLBACK DISPATCH] callback rejected url='{}' status='{}' to={}",
                            url, status, payload.to
                        );
                    }
                }
                Err(e) => {
                    metrics::record_dispatch_failed();
                    if diagnostics {
                        warn!(
                            "[CALLBACK DISPATCH] can't get response status url='{}': {}",
                            url, e
                        );
                    }
                }
            }
        });
    }
}
