use serde::{Deserialize, Serialize};

use super::jid::Jid;

/// 消息类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// 一对一聊天
    Chat,
    /// 群聊
    GroupChat,
    /// 广播/通知类
    Headline,
    Normal,
    Error,
}

/// 宿主消息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Option<String>,
    pub from: Jid,
    pub to: Option<Jid>,
    pub kind: MessageKind,
    pub body: Option<String>,
}

impl Message {
    /// 创建一对一聊天消息
    pub fn chat(from: Jid, to: Jid, body: impl Into<String>) -> Self {
        Self {
            id: None,
            from,
            to: Some(to),
            kind: MessageKind::Chat,
            body: Some(body.into()),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_kind(mut self, kind: MessageKind) -> Self {
        self.kind = kind;
        self
    }
}

/// 宿主拦截链上流转的数据包
#[derive(Debug, Clone)]
pub enum Packet {
    Message(Message),
    Presence { from: Jid, to: Option<Jid> },
    Iq { from: Jid, to: Option<Jid> },
}

impl Packet {
    pub fn as_message(&self) -> Option<&Message> {
        match self {
            Packet::Message(message) => Some(message),
            _ => None,
        }
    }
}

/// 一次消息投递的不可变视图
///
/// 每个数据包构造一次，由处理调用独占；进入延迟复查时整体移交给调度器。
#[derive(Debug, Clone)]
pub struct InboundEvent {
    pub message_id: Option<String>,
    pub from: Jid,
    pub to: Option<Jid>,
    pub kind: MessageKind,
    pub body: Option<String>,
    /// 传输层是否已经处理（投递）过
    pub processed: bool,
    /// 是否为入站方向
    pub incoming: bool,
}

impl InboundEvent {
    /// 从拦截到的数据包构造；非消息包返回 None
    pub fn from_packet(packet: &Packet, incoming: bool, processed: bool) -> Option<Self> {
        let message = packet.as_message()?;
        Some(Self {
            message_id: message.id.clone(),
            from: message.from.clone(),
            to: message.to.clone(),
            kind: message.kind,
            body: message.body.clone(),
            processed,
            incoming,
        })
    }

    /// 非空消息正文
    pub fn text(&self) -> Option<&str> {
        self.body.as_deref().filter(|body| !body.is_empty())
    }
}
