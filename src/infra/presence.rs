use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::error::{CallbackError, Result};
use crate::model::Jid;

/// 宿主账号
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAccount {
    /// 用户名（Jid 的 node 部分）
    pub username: String,
}

impl UserAccount {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
        }
    }
}

/// 宿主的用户/在线状态查询接口（由宿主平台提供）
pub trait PresenceDirectory: Send + Sync {
    /// 宿主服务的域名；其他域的地址都不是本地账号
    fn server_domain(&self) -> &str;

    /// 按用户名查找账号；未知用户返回 None
    fn resolve_user(&self, username: &str) -> Option<UserAccount>;

    /// 账号当前是否有活跃的在线会话
    fn is_available(&self, user: &UserAccount) -> bool;
}

/// 在线状态判定
///
/// 每次调用都实时查询宿主，不做缓存：首次判定与延迟复查之间状态随时可能变化。
#[derive(Clone)]
pub struct AvailabilityOracle {
    directory: Arc<dyn PresenceDirectory>,
}

impl AvailabilityOracle {
    pub fn new(directory: Arc<dyn PresenceDirectory>) -> Self {
        Self { directory }
    }

    /// 解析本地账号；非本地域、无 node 或账号不存在时返回 `UserNotFound`
    pub fn resolve(&self, jid: &Jid) -> Result<UserAccount> {
        if !jid.domain().eq_ignore_ascii_case(self.directory.server_domain()) {
            return Err(CallbackError::UserNotFound(jid.bare()));
        }
        let node = jid
            .node()
            .ok_or_else(|| CallbackError::UserNotFound(jid.bare()))?;
        self.directory
            .resolve_user(node)
            .ok_or_else(|| CallbackError::UserNotFound(node.to_string()))
    }

    /// 接收方当前是否可达
    pub fn is_reachable(&self, jid: &Jid) -> Result<bool> {
        let user = self.resolve(jid)?;
        let available = self.directory.is_available(&user);
        debug!("[CALLBACK PRESENCE] {} available={}", jid.bare(), available);
        Ok(available)
    }
}

/// 内存在线状态目录
///
/// 记录每个账号的在线会话数，会话数大于 0 即视为在线。供测试及不接数据库的嵌入场景使用。
pub struct MemoryPresenceDirectory {
    domain: String,
    /// username -> 在线会话数
    users: DashMap<String, usize>,
}

impl MemoryPresenceDirectory {
    pub fn new(domain: &str) -> Self {
        Self {
            domain: domain.to_lowercase(),
            users: DashMap::new(),
        }
    }

    /// 注册账号（初始离线）
    pub fn add_user(&self, username: &str) {
        self.users.entry(username.to_lowercase()).or_insert(0);
    }

    pub fn remove_user(&self, username: &str) {
        self.users.remove(&username.to_lowercase());
    }

    /// 会话上线
    pub fn session_online(&self, username: &str) {
        if let Some(mut sessions) = self.users.get_mut(&username.to_lowercase()) {
            *sessions += 1;
        }
    }

    /// 会话下线
    pub fn session_offline(&self, username: &str) {
        if let Some(mut sessions) = self.users.get_mut(&username.to_lowercase()) {
            *sessions = sessions.saturating_sub(1);
        }
    }

    /// 直接设置在线状态
    pub fn set_online(&self, username: &str, online: bool) {
        self.users
            .insert(username.to_lowercase(), if online { 1 } else { 0 });
    }
}

impl PresenceDirectory for MemoryPresenceDirectory {
    fn server_domain(&self) -> &str {
        &self.domain
    }

    fn resolve_user(&self, username: &str) -> Option<UserAccount> {
        self.users
            .contains_key(&username.to_lowercase())
            .then(|| UserAccount::new(username.to_lowercase()))
    }

    fn is_available(&self, user: &UserAccount) -> bool {
        self.users
            .get(&user.username)
            .map(|sessions| *sessions > 0)
            .unwrap_or(false)
    }
}
