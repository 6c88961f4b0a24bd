use crate::error::UyuniError;
use crate::rpc::RpcValue;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 连接配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub hostname: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub verify_ssl: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            hostname: String::new(),
            port: 443,
            username: String::new(),
            password: String::new(),
            verify_ssl: true,
        }
    }
}

impl ConnectionConfig {
    pub fn builder() -> ConnectionConfigBuilder {
        ConnectionConfigBuilder::new()
    }
}

#[derive(Default)]
pub struct ConnectionConfigBuilder {
    config: ConnectionConfig,
}

impl ConnectionConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ConnectionConfig::default(),
        }
    }

    pub fn hostname(mut self, hostname: &str) -> Self {
        self.config.hostname = hostname.to_string();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn username(mut self, username: &str) -> Self {
        self.config.username = username.to_string();
        self
    }

    pub fn password(mut self, password: &str) -> Self {
        self.config.password = password.to_string();
        self
    }

    pub fn verify_ssl(mut self, verify_ssl: bool) -> Self {
        self.config.verify_ssl = verify_ssl;
        self
    }

    pub fn build(self) -> ConnectionConfig {
        self.config
    }
}

/// 主机引用：名称或数字 profile ID
///
/// 在边界处解析一次，内部统一使用数字 ID（见 `helpers::resolve_host_id`）。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HostRef {
    Id(i64),
    Name(String),
}

impl HostRef {
    /// 纯数字字符串视为 profile ID，其余视为主机名
    pub fn parse(raw: &str) -> Self {
        match raw.trim().parse::<i64>() {
            Ok(id) => HostRef::Id(id),
            Err(_) => HostRef::Name(raw.trim().to_string()),
        }
    }
}

impl From<i64> for HostRef {
    fn from(id: i64) -> Self {
        HostRef::Id(id)
    }
}

/// 补丁引用：advisory 名称（如 openSUSE-2020-1001）或数字 ID
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PatchRef {
    Id(i64),
    Name(String),
}

impl PatchRef {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().parse::<i64>() {
            Ok(id) => PatchRef::Id(id),
            Err(_) => PatchRef::Name(raw.trim().to_string()),
        }
    }
}

/// system.listSystems 返回的主机摘要
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemSummary {
    pub id: i64,
    pub name: String,
    pub last_checkin: Option<String>,
}

impl SystemSummary {
    pub(crate) fn from_rpc(value: &RpcValue) -> Result<Self, UyuniError> {
        Ok(Self {
            id: required_i64(value, "id")?,
            name: required_str(value, "name")?,
            last_checkin: value.get_str("last_checkin").map(str::to_string),
        })
    }
}

/// system.getDetails 返回的主机详情
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemDetails {
    pub id: i64,
    pub profile_name: String,
    pub hostname: Option<String>,
    pub minion_id: Option<String>,
    pub last_boot: Option<String>,
    pub outdated_pkg_count: i64,
}

impl SystemDetails {
    pub(crate) fn from_rpc(value: &RpcValue) -> Result<Self, UyuniError> {
        Ok(Self {
            id: required_i64(value, "id")?,
            profile_name: value
                .get_str("profile_name")
                .or_else(|| value.get_str("name"))
                .unwrap_or_default()
                .to_string(),
            hostname: value.get_str("hostname").map(str::to_string),
            minion_id: value.get_str("minion_id").map(str::to_string),
            last_boot: value.get_str("last_boot").map(str::to_string),
            outdated_pkg_count: value.get_i64("outdated_pkg_count").unwrap_or(0),
        })
    }
}

/// system.getNetwork 返回的网络信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkInfo {
    pub ip: String,
    pub ip6: String,
    pub hostname: Option<String>,
}

impl NetworkInfo {
    pub(crate) fn from_rpc(value: &RpcValue) -> Result<Self, UyuniError> {
        Ok(Self {
            ip: value.get_str("ip").unwrap_or_default().to_string(),
            ip6: value.get_str("ip6").unwrap_or_default().to_string(),
            hostname: value.get_str("hostname").map(str::to_string),
        })
    }
}

/// 补丁（erratum）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patch {
    pub id: i64,
    pub name: String,
    pub synopsis: Option<String>,
    pub advisory_type: Option<String>,
    pub date: Option<String>,
}

impl Patch {
    /// system.getRelevantErrata 条目
    pub(crate) fn from_relevant(value: &RpcValue) -> Result<Self, UyuniError> {
        Ok(Self {
            id: required_i64(value, "id")?,
            name: value
                .get_str("advisory_name")
                .or_else(|| value.get_str("name"))
                .unwrap_or_default()
                .to_string(),
            synopsis: value.get_str("advisory_synopsis").map(str::to_string),
            advisory_type: value.get_str("advisory_type").map(str::to_string),
            date: value.get_str("date").map(str::to_string),
        })
    }

    /// errata.getDetails 不回传 advisory 名称，由调用方补上
    pub(crate) fn from_details(name: &str, value: &RpcValue) -> Result<Self, UyuniError> {
        Ok(Self {
            id: required_i64(value, "id")?,
            name: name.to_string(),
            synopsis: value.get_str("synopsis").map(str::to_string),
            advisory_type: value.get_str("type").map(str::to_string),
            date: value.get_str("issue_date").map(str::to_string),
        })
    }
}

/// 可升级软件包（不属于任何 erratum 的部分见 `get_host_upgrades`）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageUpgrade {
    pub name: String,
    pub arch: Option<String>,
    pub from_version: Option<String>,
    pub to_version: Option<String>,
    pub to_package_id: i64,
    pub package_id: Option<i64>,
}

impl PackageUpgrade {
    pub(crate) fn from_rpc(value: &RpcValue) -> Result<Self, UyuniError> {
        Ok(Self {
            name: required_str(value, "name")?,
            arch: value.get_str("arch").map(str::to_string),
            from_version: value.get_str("from_version").map(str::to_string),
            to_version: value.get_str("to_version").map(str::to_string),
            to_package_id: required_i64(value, "to_package_id")?,
            package_id: value.get_i64("package_id"),
        })
    }

    /// 安装时使用的包 ID
    pub fn install_id(&self) -> i64 {
        self.package_id.unwrap_or(self.to_package_id)
    }
}

/// packages.findByNvrea 返回的软件包
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageInfo {
    pub id: i64,
    pub name: String,
    pub version: String,
    pub release: String,
    pub epoch: String,
    pub arch_label: Option<String>,
}

impl PackageInfo {
    pub(crate) fn from_rpc(value: &RpcValue) -> Result<Self, UyuniError> {
        Ok(Self {
            id: required_i64(value, "id")?,
            name: required_str(value, "name")?,
            version: value.get_str("version").unwrap_or_default().to_string(),
            release: value.get_str("release").unwrap_or_default().to_string(),
            epoch: value.get_str("epoch").unwrap_or_default().to_string(),
            arch_label: value.get_str("arch_label").map(str::to_string),
        })
    }
}

/// system.listSystemEvents 返回的动作状态
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionStatus {
    pub id: i64,
    pub name: String,
    pub action_type: Option<String>,
    pub successful_count: i64,
    pub failed_count: i64,
    pub completed_date: Option<String>,
    pub additional_info: Vec<ActionDetail>,
}

impl ActionStatus {
    pub(crate) fn from_rpc(value: &RpcValue) -> Result<Self, UyuniError> {
        let additional_info = match value.get("additional_info").and_then(RpcValue::as_array) {
            Some(entries) => entries
                .iter()
                .map(ActionDetail::from_rpc)
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };
        Ok(Self {
            id: required_i64(value, "id")?,
            name: value.get_str("name").unwrap_or_default().to_string(),
            action_type: value.get_str("action_type").map(str::to_string),
            successful_count: value.get_i64("successful_count").unwrap_or(0),
            failed_count: value.get_i64("failed_count").unwrap_or(0),
            completed_date: value.get_str("completed_date").map(str::to_string),
            additional_info,
        })
    }

    /// 动作是否已经结束（成功或失败）
    pub fn is_terminal(&self) -> bool {
        self.successful_count + self.failed_count > 0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionDetail {
    pub detail: String,
    pub result: Option<String>,
}

impl ActionDetail {
    pub(crate) fn from_rpc(value: &RpcValue) -> Result<Self, UyuniError> {
        Ok(Self {
            detail: value.get_str("detail").unwrap_or_default().to_string(),
            result: value.get_str("result").map(str::to_string),
        })
    }
}

/// actionchain.listChains 返回的动作链摘要
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainSummary {
    pub id: Option<i64>,
    pub label: String,
    pub entry_count: i64,
}

impl ChainSummary {
    pub(crate) fn from_rpc(value: &RpcValue) -> Result<Self, UyuniError> {
        Ok(Self {
            id: value.get_i64("id"),
            label: required_str(value, "label")?,
            entry_count: value.get_i64("entrycount").unwrap_or(0),
        })
    }
}

/// actionchain.listChainActions 返回的链内动作
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainAction {
    pub id: i64,
    pub label: String,
    pub action_type: Option<String>,
}

impl ChainAction {
    pub(crate) fn from_rpc(value: &RpcValue) -> Result<Self, UyuniError> {
        Ok(Self {
            id: required_i64(value, "id")?,
            label: value.get_str("label").unwrap_or_default().to_string(),
            action_type: value.get_str("type").map(str::to_string),
        })
    }
}

/// system.listGroups 返回的组成员关系
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupMembership {
    pub name: String,
    pub subscribed: bool,
}

impl GroupMembership {
    pub(crate) fn from_rpc(value: &RpcValue) -> Result<Self, UyuniError> {
        Ok(Self {
            name: required_str(value, "system_group_name")?,
            subscribed: value.get_i64("subscribed") == Some(1),
        })
    }
}

/// systemgroup.getDetails 返回的系统组
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemGroup {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub org_id: Option<i64>,
    pub system_count: i64,
}

impl SystemGroup {
    pub(crate) fn from_rpc(value: &RpcValue) -> Result<Self, UyuniError> {
        Ok(Self {
            id: required_i64(value, "id")?,
            name: required_str(value, "name")?,
            description: value.get_str("description").unwrap_or_default().to_string(),
            org_id: value.get_i64("org_id"),
            system_count: value.get_i64("system_count").unwrap_or(0),
        })
    }
}

/// user.getDetails 返回的用户信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserDetails {
    pub org_name: String,
    pub org_id: Option<i64>,
    pub email: Option<String>,
}

impl UserDetails {
    pub(crate) fn from_rpc(value: &RpcValue) -> Result<Self, UyuniError> {
        Ok(Self {
            org_name: required_str(value, "org_name")?,
            org_id: value.get_i64("org_id"),
            email: value.get_str("email").map(str::to_string),
        })
    }
}

/// 事件源产生的事件
///
/// 真实事件源带主机名，mock 事件源只有 `requires_reboot`。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebootEvent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    pub requires_reboot: bool,
}

/// 主机自定义变量（custom info values）
pub type CustomValues = HashMap<String, String>;

pub(crate) fn required_i64(value: &RpcValue, field: &str) -> Result<i64, UyuniError> {
    value.get_i64(field).ok_or_else(|| missing_field(field))
}

pub(crate) fn required_str(value: &RpcValue, field: &str) -> Result<String, UyuniError> {
    value
        .get_str(field)
        .map(str::to_string)
        .ok_or_else(|| missing_field(field))
}

pub(crate) fn expect_array(value: &RpcValue) -> Result<&[RpcValue], UyuniError> {
    value.as_array().ok_or_else(|| {
        UyuniError::Session("Malformed server response: expected array".to_string())
    })
}

fn missing_field(field: &str) -> UyuniError {
    UyuniError::Session(format!(
        "Malformed server response: missing field {field:?}"
    ))
}
