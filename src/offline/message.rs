use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{InboundEvent, MessageKind};

/// 交给宿主离线存储的消息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfflineMessage {
    /// 消息ID；原消息没有 id 时生成一个
    pub id: String,
    /// 发送方完整地址
    pub from: String,
    /// 接收方 bare 地址
    pub to: String,
    pub kind: MessageKind,
    pub body: String,
    /// 写入时间
    pub stored_at: DateTime<Utc>,
}

impl OfflineMessage {
    /// 由入站事件构造；缺少接收方或正文时返回 None
    pub fn from_event(event: &InboundEvent) -> Option<Self> {
        let to = event.to.as_ref()?;
        let body = event.text()?;

        Some(Self {
            id: event
                .message_id
                .clone()
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            from: event.from.to_string(),
            to: to.bare(),
            kind: event.kind,
            body: body.to_string(),
            stored_at: Utc::now(),
        })
    }
}
