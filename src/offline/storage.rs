use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::message::OfflineMessage;
use crate::error::{CallbackError, Result};

/// 宿主离线消息存储接口
#[async_trait]
pub trait OfflineStore: Send + Sync {
    /// 存储离线消息
    async fn store(&self, message: &OfflineMessage) -> Result<()>;
}

/// 内存存储后端（用于测试和开发）
#[derive(Default)]
pub struct MemoryOfflineStore {
    /// 接收方 bare 地址 -> 消息列表
    messages: RwLock<HashMap<String, Vec<OfflineMessage>>>,
    fail_writes: AtomicBool,
}

impl MemoryOfflineStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 之后的写入全部失败
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub async fn messages_for(&self, bare_jid: &str) -> Vec<OfflineMessage> {
        self.messages
            .read()
            .await
            .get(bare_jid)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn total(&self) -> usize {
        self.messages.read().await.values().map(Vec::len).sum()
    }
}

#[async_trait]
impl OfflineStore for MemoryOfflineStore {
    async fn store(&self, message: &OfflineMessage) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CallbackError::Storage("simulated write failure".to_string()));
        }

        self.messages
            .write()
            .await
            .entry(message.to.clone())
            .or_default()
            .push(message.clone());

        debug!("Stored offline message {} for {}", message.id, message.to);
        Ok(())
    }
}

/// Sled 持久化存储后端
pub struct SledOfflineStore {
    db: sled::Db,
    path: String,
}

impl SledOfflineStore {
    pub fn open(path: &str) -> Result<Self> {
        let db = sled::open(path)
            .map_err(|e| CallbackError::Storage(format!("Failed to open sled database: {}", e)))?;

        info!("Opened offline store at: {}", path);

        Ok(Self {
            db,
            path: path.to_string(),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// 接收方的键前缀
    fn recipient_prefix(bare_jid: &str) -> String {
        format!("offline:{}:", bare_jid)
    }

    /// 完整键：按写入时间有序
    fn message_key(message: &OfflineMessage) -> String {
        format!(
            "{}{:020}:{}",
            Self::recipient_prefix(&message.to),
            message.stored_at.timestamp_micros().max(0),
            message.id
        )
    }

    /// 按写入顺序读取某个接收方的离线消息
    pub fn messages_for(&self, bare_jid: &str) -> Result<Vec<OfflineMessage>> {
        let mut messages = Vec::new();
        for entry in self.db.scan_prefix(Self::recipient_prefix(bare_jid)) {
            let (_key, value) = entry?;
            messages.push(bincode::deserialize(&value)?);
        }
        Ok(messages)
    }

    pub fn len(&self) -> usize {
        self.db.len()
    }

    pub fn is_empty(&self) -> bool {
        self.db.is_empty()
    }
}

#[async_trait]
impl OfflineStore for SledOfflineStore {
    async fn store(&self, message: &OfflineMessage) -> Result<()> {
        let key = Self::message_key(message);
        let value = bincode::serialize(message)?;

        self.db.insert(key.as_bytes(), value)?;
        self.db.flush_async().await?;

        debug!("Stored offline message {} for {} in Sled", message.id, message.to);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MessageKind;
    use chrono::{Duration, Utc};

    fn message(id: &str, to: &str, body: &str, offset_ms: i64) -> OfflineMessage {
        OfflineMessage {
            id: id.to_string(),
            from: "alice@example.com/laptop".to_string(),
            to: to.to_string(),
            kind: MessageKind::Chat,
            body: body.to_string(),
            stored_at: Utc::now() + Duration::milliseconds(offset_ms),
        }
    }

    #[tokio::test]
    async fn test_sled_store_keeps_order_per_recipient() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = SledOfflineStore::open(temp_dir.path().to_str().unwrap()).unwrap();

        store.store(&message("m2", "bob@example.com", "second", 5)).await.unwrap();
        store.store(&message("m1", "bob@example.com", "first", 0)).await.unwrap();
        store.store(&message("m3", "carol@example.com", "other", 0)).await.unwrap();

        let bob = store.messages_for("bob@example.com").unwrap();
        assert_eq!(bob.iter().map(|m| m.id.as_str()).collect::<Vec<_>>(), vec!["m1", "m2"]);
        assert_eq!(store.len(), 3);
    }

    #[tokio::test]
    async fn test_memory_store_failure_toggle() {
        let store = MemoryOfflineStore::new();
        store.fail_writes(true);
        assert!(store.store(&message("m1", "bob@example.com", "hi", 0)).await.is_err());

        store.fail_writes(false);
        store.store(&message("m1", "bob@example.com", "hi", 0)).await.unwrap();
        assert_eq!(store.messages_for("bob@example.com").await.len(), 1);
    }
}
