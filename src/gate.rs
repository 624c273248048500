use tracing::trace;

use crate::model::{InboundEvent, MessageKind};

/// 消息过滤
///
/// 只放行已处理的入站一对一聊天消息，且接收方存在、正文非空；
/// 配置了本地域时，接收方必须属于本地域。
#[derive(Debug, Clone, Default)]
pub struct MessageGate {
    local_domain: Option<String>,
}

impl MessageGate {
    pub fn new(local_domain: Option<String>) -> Self {
        Self {
            local_domain: local_domain.map(|domain| domain.to_lowercase()),
        }
    }

    pub fn accepts(&self, event: &InboundEvent) -> bool {
        let Some(to) = event.to.as_ref() else {
            trace!("[CALLBACK GATE] no recipient, from={}", event.from);
            return false;
        };

        let accepted = event.processed
            && event.incoming
            && event.kind == MessageKind::Chat
            && event.text().is_some()
            && self
                .local_domain
                .as_deref()
                .map_or(true, |domain| to.domain() == domain);

        if !accepted {
            trace!(
                "[CALLBACK GATE] skipped {:?} message from={} to={} processed={} incoming={}",
                event.kind,
                event.from,
                to,
                event.processed,
                event.incoming
            );
        }
        accepted
    }
}
