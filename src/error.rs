use thiserror::Error;

/// 回调插件错误类型
///
/// 所有错误都在发生处终结（最多记录日志），不会回传到宿主的消息投递路径。
#[derive(Debug, Error)]
pub enum CallbackError {
    /// 用户未找到（远端/联邦用户属于正常情况）
    #[error("User not found: {0}")]
    UserNotFound(String),
    /// 无效的地址
    #[error("Invalid JID: {0}")]
    InvalidJid(String),
    /// 配置错误
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// 网络错误（Webhook 调用失败）
    #[error("Network error: {0}")]
    Network(String),
    /// 序列化错误
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// 离线存储错误
    #[error("Storage error: {0}")]
    Storage(String),
    /// 复查队列已满
    #[error("Recheck rejected: {0}")]
    RecheckRejected(String),
    /// 插件正在停止
    #[error("Shutting down")]
    ShuttingDown,
    /// IO 错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CallbackError {
    /// 是否为预期内的"用户不存在"
    pub fn is_user_not_found(&self) -> bool {
        matches!(self, CallbackError::UserNotFound(_))
    }
}

impl From<serde_json::Error> for CallbackError {
    fn from(err: serde_json::Error) -> Self {
        CallbackError::Serialization(err.to_string())
    }
}

impl From<bincode::Error> for CallbackError {
    fn from(err: bincode::Error) -> Self {
        CallbackError::Serialization(err.to_string())
    }
}

impl From<sled::Error> for CallbackError {
    fn from(err: sled::Error) -> Self {
        CallbackError::Storage(err.to_string())
    }
}

impl From<reqwest::Error> for CallbackError {
    fn from(err: reqwest::Error) -> Self {
        CallbackError::Network(err.to_string())
    }
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, CallbackError>;
