use crate::error::UyuniError;
use crate::types::ConnectionConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 清单（inventory）配置
///
/// 识别的键与 YAML 清单文件一致。`only_powered_on` 为兼容保留：
/// 客户端没有电源状态查询，填充时不会生效。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryConfig {
    pub host: String,
    pub user: String,
    pub password: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_true")]
    pub verify_ssl: bool,
    #[serde(default = "default_true")]
    pub only_powered_on: bool,
    #[serde(default)]
    pub ipv6_only: bool,
    #[serde(default)]
    pub show_custom_values: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<String>>,
    #[serde(default)]
    pub pending_reboot_only: bool,
}

fn default_port() -> u16 {
    443
}

fn default_true() -> bool {
    true
}

fn default_delay() -> u64 {
    60
}

impl InventoryConfig {
    /// 从YAML文件加载配置
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, UyuniError> {
        let content = std::fs::read_to_string(&path)
            .map_err(|e| UyuniError::Config(format!("Failed to read config file: {e}")))?;

        serde_yaml::from_str(&content)
            .map_err(|e| UyuniError::Config(format!("Failed to parse YAML: {e}")))
    }

    /// 从JSON文件加载配置
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, UyuniError> {
        let content = std::fs::read_to_string(&path)
            .map_err(|e| UyuniError::Config(format!("Failed to read config file: {e}")))?;

        serde_json::from_str(&content)
            .map_err(|e| UyuniError::Config(format!("Failed to parse JSON: {e}")))
    }

    /// 保存配置到YAML文件
    pub fn save_to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), UyuniError> {
        let yaml_content = serde_yaml::to_string(self)
            .map_err(|e| UyuniError::Config(format!("Failed to serialize to YAML: {e}")))?;

        std::fs::write(path, yaml_content)
            .map_err(|e| UyuniError::Config(format!("Failed to write file: {e}")))
    }

    /// 转成客户端连接配置
    pub fn connection(&self) -> ConnectionConfig {
        ConnectionConfig {
            hostname: self.host.clone(),
            port: self.port,
            username: self.user.clone(),
            password: self.password.clone(),
            verify_ssl: self.verify_ssl,
        }
    }
}

/// 事件源参数
///
/// 与 rulebook 里事件源的参数键一致：hostname、username、password、
/// delay（秒）、hosts（主机名列表）、port、verify。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSourceArgs {
    pub hostname: String,
    pub username: String,
    pub password: String,
    #[serde(default = "default_delay")]
    pub delay: u64,
    #[serde(default)]
    pub hosts: Vec<String>,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_true")]
    pub verify: bool,
}

impl EventSourceArgs {
    pub fn connection(&self) -> ConnectionConfig {
        ConnectionConfig {
            hostname: self.hostname.clone(),
            port: self.port,
            username: self.username.clone(),
            password: self.password.clone(),
            verify_ssl: self.verify,
        }
    }
}
