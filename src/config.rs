use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{CallbackError, Result};

pub const PROPERTY_URL: &str = "callback_on_offline.url";
pub const PROPERTY_TOKEN: &str = "callback_on_offline.token";
pub const PROPERTY_SEND_BODY: &str = "callback_on_offline.send_body";
pub const PROPERTY_DEBUG: &str = "callback_on_offline.debug";
pub const PROPERTY_RECHECK_DELAY_SECS: &str = "callback_on_offline.recheck_delay_secs";
pub const PROPERTY_MAX_CONCURRENT_RECHECKS: &str = "callback_on_offline.max_concurrent_rechecks";
pub const PROPERTY_MAX_PENDING_RECHECKS: &str = "callback_on_offline.max_pending_rechecks";
pub const PROPERTY_REQUEST_TIMEOUT_SECS: &str = "callback_on_offline.request_timeout_secs";
pub const PROPERTY_LOCAL_DOMAIN: &str = "callback_on_offline.local_domain";

/// 未配置时写回的占位 URL
pub const DEFAULT_CALLBACK_URL: &str = "http://localhost/user/offline/callback/url";

/// 宿主配置存储（由宿主平台提供）
///
/// 插件只在启动时读取一次；缺失的 url/token 会生成默认值后写回，保证重启后不变。
pub trait PropertyStore: Send + Sync {
    /// 读取属性，未设置时返回 None
    fn get_property(&self, key: &str) -> Option<String>;

    /// 写入并持久化属性
    fn set_property(&self, key: &str, value: &str) -> Result<()>;
}

/// 回调配置
///
/// 启动时加载一次，之后只读，通过 `Arc` 显式传给各组件。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackConfig {
    /// Webhook 地址
    pub url: String,
    /// 放在 Authorization 头里的凭证
    pub token: String,
    /// 是否在负载中携带消息正文
    pub send_body: bool,
    /// 诊断日志：等待并记录 Webhook 响应状态
    pub debug: bool,
    /// 延迟复查时间（秒）
    pub recheck_delay_secs: u64,
    /// 同时执行的复查任务上限
    pub max_concurrent_rechecks: usize,
    /// 等待中的复查任务上限
    pub max_pending_rechecks: usize,
    /// Webhook 请求超时（秒）
    pub request_timeout_secs: u64,
    /// 本地域名；设置后只处理发往本域的消息
    pub local_domain: Option<String>,
}

impl Default for CallbackConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_CALLBACK_URL.to_string(),
            token: String::new(),
            send_body: true,
            debug: false,
            recheck_delay_secs: 7,
            max_concurrent_rechecks: 64,
            max_pending_rechecks: 10_000,
            request_timeout_secs: 10,
            local_domain: None,
        }
    }
}

impl CallbackConfig {
    /// 直接构造（测试或嵌入场景）
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
            ..Self::default()
        }
    }

    /// 从宿主配置存储加载；url/token 缺失时生成并写回
    pub fn load(store: &dyn PropertyStore) -> Result<Self> {
        let defaults = Self::default();

        let url = property_or_persist(store, PROPERTY_URL, || DEFAULT_CALLBACK_URL.to_string())?;
        let token = property_or_persist(store, PROPERTY_TOKEN, || Uuid::new_v4().to_string())?;

        let config = Self {
            url,
            token,
            send_body: parsed_property(store, PROPERTY_SEND_BODY, defaults.send_body),
            debug: parsed_property(store, PROPERTY_DEBUG, defaults.debug),
            recheck_delay_secs: parsed_property(store, PROPERTY_RECHECK_DELAY_SECS, defaults.recheck_delay_secs),
            max_concurrent_rechecks: parsed_property(
                store,
                PROPERTY_MAX_CONCURRENT_RECHECKS,
                defaults.max_concurrent_rechecks,
            ),
            max_pending_rechecks: parsed_property(
                store,
                PROPERTY_MAX_PENDING_RECHECKS,
                defaults.max_pending_rechecks,
            ),
            request_timeout_secs: parsed_property(
                store,
                PROPERTY_REQUEST_TIMEOUT_SECS,
                defaults.request_timeout_secs,
            ),
            local_domain: store
                .get_property(PROPERTY_LOCAL_DOMAIN)
                .filter(|domain| !domain.is_empty())
                .map(|domain| domain.to_lowercase()),
        };

        config.validate()?;
        Ok(config)
    }

    /// 环境变量覆盖（PRIVCHAT_CALLBACK_ 前缀），覆盖值不会写回存储
    pub fn merge_from_env(&mut self) -> Result<()> {
        if let Ok(url) = env::var("PRIVCHAT_CALLBACK_URL") {
            self.url = url;
        }
        if let Ok(token) = env::var("PRIVCHAT_CALLBACK_TOKEN") {
            self.token = token;
        }
        if let Ok(send_body) = env::var("PRIVCHAT_CALLBACK_SEND_BODY") {
            self.send_body = send_body.parse().unwrap_or(self.send_body);
        }
        if let Ok(debug) = env::var("PRIVCHAT_CALLBACK_DEBUG") {
            self.debug = debug.parse().unwrap_or(self.debug);
        }

        self.validate()
    }

    /// 校验配置
    pub fn validate(&self) -> Result<()> {
        let parsed = url::Url::parse(&self.url)
            .map_err(|e| CallbackError::Configuration(format!("invalid callback url '{}': {}", self.url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(CallbackError::Configuration(format!(
                "callback url must be http or https: {}",
                self.url
            )));
        }
        if self.token.is_empty() {
            return Err(CallbackError::Configuration("callback token is empty".to_string()));
        }
        if self.max_concurrent_rechecks == 0 || self.max_pending_rechecks == 0 {
            return Err(CallbackError::Configuration(
                "recheck limits must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn recheck_delay(&self) -> Duration {
        Duration::from_secs(self.recheck_delay_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// 用于展示的副本（token 打码）
    pub fn masked(&self) -> Self {
        let mut masked = self.clone();
        masked.token = mask_token(&self.token);
        masked
    }
}

fn mask_token(token: &str) -> String {
    let visible: String = token.chars().take(4).collect();
    format!("{}****", visible)
}

fn property_or_persist(
    store: &dyn PropertyStore,
    key: &str,
    default_value: impl FnOnce() -> String,
) -> Result<String> {
    match store.get_property(key) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => {
            let value = default_value();
            store.set_property(key, &value)?;
            info!("[CALLBACK CONFIG] {} not set, persisted default", key);
            Ok(value)
        }
    }
}

fn parsed_property<T>(store: &dyn PropertyStore, key: &str, default_value: T) -> T
where
    T: std::str::FromStr + std::fmt::Display,
{
    match store.get_property(key) {
        Some(raw) => match raw.trim().to_lowercase().parse() {
            Ok(value) => value,
            Err(_) => {
                warn!(
                    "[CALLBACK CONFIG] invalid value '{}' for {}, using {}",
                    raw, key, default_value
                );
                default_value
            }
        },
        None => default_value,
    }
}

/// 内存配置存储（测试用）
#[derive(Default)]
pub struct MemoryPropertyStore {
    properties: Mutex<HashMap<String, String>>,
}

impl MemoryPropertyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_property(self, key: &str, value: &str) -> Self {
        self.properties.lock().insert(key.to_string(), value.to_string());
        self
    }
}

impl PropertyStore for MemoryPropertyStore {
    fn get_property(&self, key: &str) -> Option<String> {
        self.properties.lock().get(key).cloned()
    }

    fn set_property(&self, key: &str, value: &str) -> Result<()> {
        self.properties.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// TOML 文件配置存储
///
/// 属性键 `section.field` 对应文件中的 `[section]` 表：
///
/// ```toml
/// [callback_on_offline]
/// url = "https://push.example.com/offline"
/// send_body = false
/// ```
pub struct TomlPropertyStore {
    path: PathBuf,
    table: Mutex<toml::Table>,
}

impl TomlPropertyStore {
    /// 打开配置文件；文件不存在时从空配置开始，首次写入时创建
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let table = if path.exists() {
            let content = fs::read_to_string(&path)?;
            content.parse::<toml::Table>().map_err(|e| {
                CallbackError::Configuration(format!("配置文件格式错误 {:?}: {}", path, e))
            })?
        } else {
            toml::Table::new()
        };

        Ok(Self {
            path,
            table: Mutex::new(table),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn split_key(key: &str) -> (&str, &str) {
        key.split_once('.').unwrap_or(("", key))
    }

    fn save(&self, table: &toml::Table) -> Result<()> {
        let content = toml::to_string_pretty(table)
            .map_err(|e| CallbackError::Serialization(e.to_string()))?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, content)?;
        Ok(())
    }
}

fn value_to_string(value: &toml::Value) -> Option<String> {
    match value {
        toml::Value::String(s) => Some(s.clone()),
        toml::Value::Boolean(b) => Some(b.to_string()),
        toml::Value::Integer(i) => Some(i.to_string()),
        toml::Value::Float(f) => Some(f.to_string()),
        _ => None,
    }
}

impl PropertyStore for TomlPropertyStore {
    fn get_property(&self, key: &str) -> Option<String> {
        let table = self.table.lock();
        let (section, field) = Self::split_key(key);
        let value = if section.is_empty() {
            table.get(field)
        } else {
            table.get(section)?.as_table()?.get(field)
        };
        value.and_then(value_to_string)
    }

    fn set_property(&self, key: &str, value: &str) -> Result<()> {
        let mut table = self.table.lock();
        let (section, field) = Self::split_key(key);
        let value = toml::Value::String(value.to_string());

        if section.is_empty() {
            table.insert(field.to_string(), value);
        } else {
            let entry = table
                .entry(section.to_string())
                .or_insert(toml::Value::Table(toml::Table::new()));
            match entry.as_table_mut() {
                Some(section_table) => {
                    section_table.insert(field.to_string(), value);
                }
                None => {
                    return Err(CallbackError::Configuration(format!(
                        "{} is not a table in {:?}",
                        section, self.path
                    )));
                }
            }
        }

        self.save(&table)
    }
}
