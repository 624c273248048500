use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CallbackError;

/// 用户地址：`node@domain/resource`
///
/// - `node`: 本地用户名，用于查找账号
/// - `domain`: 服务器域名
/// - `resource`: 会话（设备）标识，可选
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Jid {
    node: Option<String>,
    domain: String,
    resource: Option<String>,
}

impl Jid {
    pub fn new(node: Option<&str>, domain: &str, resource: Option<&str>) -> Result<Self, CallbackError> {
        if domain.is_empty() {
            return Err(CallbackError::InvalidJid("empty domain".to_string()));
        }
        if node.is_some_and(str::is_empty) || resource.is_some_and(str::is_empty) {
            return Err(CallbackError::InvalidJid(format!(
                "empty node or resource for domain {}",
                domain
            )));
        }

        Ok(Self {
            node: node.map(|n| n.to_lowercase()),
            domain: domain.to_lowercase(),
            resource: resource.map(str::to_string),
        })
    }

    pub fn node(&self) -> Option<&str> {
        self.node.as_deref()
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn resource(&self) -> Option<&str> {
        self.resource.as_deref()
    }

    /// 去掉 resource 后的地址（`node@domain`）
    pub fn to_bare(&self) -> Jid {
        Jid {
            node: self.node.clone(),
            domain: self.domain.clone(),
            resource: None,
        }
    }

    /// Webhook 负载中使用的字符串形式
    pub fn bare(&self) -> String {
        match &self.node {
            Some(node) => format!("{}@{}", node, self.domain),
            None => self.domain.clone(),
        }
    }
}

impl FromStr for Jid {
    type Err = CallbackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(CallbackError::InvalidJid("empty address".to_string()));
        }

        // resource 中允许出现 '@'，所以先切 '/'
        let (rest, resource) = match s.split_once('/') {
            Some((rest, resource)) => (rest, Some(resource)),
            None => (s, None),
        };
        let (node, domain) = match rest.split_once('@') {
            Some((node, domain)) => (Some(node), domain),
            None => (None, rest),
        };

        Jid::new(node, domain, resource).map_err(|_| CallbackError::InvalidJid(s.to_string()))
    }
}

impl fmt::Display for Jid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.resource {
            Some(resource) => write!(f, "{}/{}", self.bare(), resource),
            None => f.write_str(&self.bare()),
        }
    }
}

impl Serialize for Jid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Jid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
