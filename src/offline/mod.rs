// 离线消息落盘
// 延迟复查确认接收方仍不可达后，把消息交给宿主的离线存储

pub mod message;
pub mod persister;
pub mod storage;

pub use message::OfflineMessage;
pub use persister::OfflinePersister;
pub use storage::{MemoryOfflineStore, OfflineStore, SledOfflineStore};
