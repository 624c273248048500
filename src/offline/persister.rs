use std::sync::Arc;

use tracing::{debug, warn};

use super::message::OfflineMessage;
use super::storage::OfflineStore;
use crate::infra::metrics;
use crate::model::InboundEvent;

/// 离线消息落盘
///
/// 尽力而为：Webhook 通知才是主要保证，存储失败只记录日志，不回滚也不重试。
#[derive(Clone)]
pub struct OfflinePersister {
    store: Arc<dyn OfflineStore>,
}

impl OfflinePersister {
    pub fn new(store: Arc<dyn OfflineStore>) -> Self {
        Self { store }
    }

    /// 存储消息，返回是否成功
    pub async fn store(&self, event: &InboundEvent) -> bool {
        let Some(message) = OfflineMessage::from_event(event) else {
            debug!("[CALLBACK OFFLINE] nothing to store for message from {}", event.from);
            return false;
        };

        match self.store.store(&message).await {
            Ok(()) => {
                debug!("[CALLBACK OFFLINE] stored message {} for {}", message.id, message.to);
                true
            }
            Err(e) => {
                metrics::record_persist_failed();
                warn!(
                    "[CALLBACK OFFLINE] Error saving offline message {} for {}: {}",
                    message.id, message.to, e
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Message, Packet};
    use crate::offline::storage::MemoryOfflineStore;

    fn event() -> InboundEvent {
        let message = Message::chat(
            "alice@example.com/laptop".parse().unwrap(),
            "bob@example.com/phone".parse().unwrap(),
            "hello",
        )
        .with_id("msg-1");
        InboundEvent::from_packet(&Packet::Message(message), true, true).unwrap()
    }

    #[tokio::test]
    async fn test_store_captures_message() {
        let store = Arc::new(MemoryOfflineStore::new());
        let persister = OfflinePersister::new(store.clone());

        assert!(persister.store(&event()).await);

        let stored = store.messages_for("bob@example.com").await;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, "msg-1");
        assert_eq!(stored[0].from, "alice@example.com/laptop");
        assert_eq!(stored[0].body, "hello");
    }

    #[tokio::test]
    async fn test_store_failure_is_swallowed() {
        let store = Arc::new(MemoryOfflineStore::new());
        store.fail_writes(true);
        let persister = OfflinePersister::new(store.clone());

        assert!(!persister.store(&event()).await);
        assert_eq!(store.total().await, 0);
    }
}
