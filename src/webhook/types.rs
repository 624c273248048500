use serde::{Deserialize, Serialize};

use crate::error::{CallbackError, Result};
use crate::model::InboundEvent;

/// Webhook 负载
///
/// `body` 在关闭正文转发时不出现在 JSON 中。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl NotificationPayload {
    pub fn new(from: impl Into<String>, to: impl Into<String>, body: Option<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            body,
        }
    }

    /// 由入站事件构造，发送方/接收方取 bare 地址
    pub fn from_event(event: &InboundEvent, send_body: bool) -> Result<Self> {
        let to = event
            .to
            .as_ref()
            .ok_or_else(|| CallbackError::UserNotFound("<missing recipient>".to_string()))?;
        let body = if send_body {
            event.text().map(str::to_string)
        } else {
            None
        };

        Ok(Self::new(event.from.bare(), to.bare(), body))
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// 一次发送调用的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// 已发出（不等待响应）
    Sent,
    /// 调用时接收方可达，未发送
    RecipientReachable,
}

impl DispatchOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, DispatchOutcome::Sent)
    }
}

/// 发送来自哪条判定路径
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchPath {
    /// 到达时接收方已不可达
    Inline,
    /// 延迟复查后不可达
    Recheck,
}

impl DispatchPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchPath::Inline => "inline",
            DispatchPath::Recheck => "recheck",
        }
    }
}
