//! 模块层：声明式的运维操作
//!
//! 每个模块对应一种对托管主机的操作：解析参数、调用一两个客户端
//! 操作、报告 changed/unchanged 结果。失败通过 `UyuniError` 上抛，
//! 由调用方决定如何呈现。

use crate::api::{UyuniClient, DEFAULT_POLL_INTERVAL, DEFAULT_WAIT_TIMEOUT};
use crate::error::UyuniError;
use crate::helpers::{is_blocklisted, resolve_host_id, resolve_patch_id};
use crate::types::{HostRef, PatchRef};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// 模块执行结果
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ModuleOutcome {
    pub changed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub action_ids: Vec<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reboot_required: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub installed_updates: Option<i64>,
}

impl ModuleOutcome {
    pub fn changed() -> Self {
        Self {
            changed: true,
            ..Self::default()
        }
    }

    pub fn unchanged() -> Self {
        Self::default()
    }

    pub fn with_msg(mut self, msg: impl Into<String>) -> Self {
        self.msg = Some(msg.into());
        self
    }

    pub fn with_action_ids(mut self, action_ids: Vec<i64>) -> Self {
        self.action_ids = action_ids;
        self
    }
}

/// 系统组目标状态
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GroupState {
    #[default]
    Present,
    Absent,
}

/// 模块及其参数
///
/// `name` 一律接受主机名或数字 profile ID。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "module")]
pub enum ModuleSpec {
    #[serde(rename = "install_patches")]
    InstallPatches {
        name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        include_patches: Option<Vec<String>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        exclude_patches: Option<Vec<String>>,
    },
    #[serde(rename = "install_upgrades")]
    InstallUpgrades {
        name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        include_upgrades: Option<Vec<String>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        exclude_upgrades: Option<Vec<String>>,
    },
    #[serde(rename = "reboot_host")]
    RebootHost { name: String },
    #[serde(rename = "apply_highstate")]
    ApplyHighstate {
        name: String,
        #[serde(default)]
        test_mode: bool,
    },
    #[serde(rename = "openscap_run")]
    OpenscapRun {
        name: String,
        document: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        arguments: Option<String>,
    },
    #[serde(rename = "is_reboot_required")]
    IsRebootRequired { name: String },
    #[serde(rename = "full_pkg_update")]
    FullPkgUpdate { name: String },
    #[serde(rename = "system_group")]
    SystemGroup {
        name: String,
        description: String,
        #[serde(default)]
        state: GroupState,
    },
}

impl ModuleSpec {
    pub fn install_patches(name: &str) -> Self {
        ModuleSpec::InstallPatches {
            name: name.to_string(),
            include_patches: None,
            exclude_patches: None,
        }
    }

    pub fn reboot_host(name: &str) -> Self {
        ModuleSpec::RebootHost {
            name: name.to_string(),
        }
    }

    pub fn apply_highstate(name: &str, test_mode: bool) -> Self {
        ModuleSpec::ApplyHighstate {
            name: name.to_string(),
            test_mode,
        }
    }

    pub fn is_reboot_required(name: &str) -> Self {
        ModuleSpec::IsRebootRequired {
            name: name.to_string(),
        }
    }
}

/// 模块执行器
pub struct ModuleRunner<'a> {
    client: &'a UyuniClient,
}

impl<'a> ModuleRunner<'a> {
    pub fn new(client: &'a UyuniClient) -> Self {
        Self { client }
    }

    /// 分发执行一个模块
    pub async fn run(&self, spec: &ModuleSpec) -> Result<ModuleOutcome, UyuniError> {
        match spec {
            ModuleSpec::InstallPatches {
                name,
                include_patches,
                exclude_patches,
            } => {
                self.install_patches(name, include_patches.as_deref(), exclude_patches.as_deref())
                    .await
            }
            ModuleSpec::InstallUpgrades {
                name,
                include_upgrades,
                exclude_upgrades,
            } => {
                self.install_upgrades(
                    name,
                    include_upgrades.as_deref(),
                    exclude_upgrades.as_deref(),
                )
                .await
            }
            ModuleSpec::RebootHost { name } => self.reboot_host(name).await,
            ModuleSpec::ApplyHighstate { name, test_mode } => {
                self.apply_highstate(name, *test_mode).await
            }
            ModuleSpec::OpenscapRun {
                name,
                document,
                arguments,
            } => self.openscap_run(name, document, arguments.as_deref()).await,
            ModuleSpec::IsRebootRequired { name } => self.is_reboot_required(name).await,
            ModuleSpec::FullPkgUpdate { name } => self.full_pkg_update(name).await,
            ModuleSpec::SystemGroup {
                name,
                description,
                state,
            } => self.system_group(name, description, *state).await,
        }
    }

    /// 安装补丁，支持 include/exclude 过滤（二者互斥）
    pub async fn install_patches(
        &self,
        name: &str,
        include_patches: Option<&[String]>,
        exclude_patches: Option<&[String]>,
    ) -> Result<ModuleOutcome, UyuniError> {
        if include_patches.is_some() && exclude_patches.is_some() {
            return Err(UyuniError::UnsupportedFilter(
                "Only supply include_patches OR exclude_patches".to_string(),
            ));
        }

        let host = resolve_host_id(self.client, &HostRef::parse(name)).await?;
        let include = self.resolve_patch_filter(include_patches).await?;
        let exclude = self.resolve_patch_filter(exclude_patches).await?;

        // 取全部可用补丁再按过滤器裁剪
        let all_patches = self.client.get_host_patches(host).await?;
        let patches: Vec<i64> = match (&include, &exclude) {
            (_, Some(exclude)) => all_patches
                .iter()
                .map(|patch| patch.id)
                .filter(|id| !exclude.contains(id))
                .collect(),
            (Some(include), _) => all_patches
                .iter()
                .map(|patch| patch.id)
                .filter(|id| include.contains(id))
                .collect(),
            (None, None) => all_patches.iter().map(|patch| patch.id).collect(),
        };

        let action_ids = self.client.install_patches(host, patches).await?;
        info!("Scheduled patch installation for {}", name);
        Ok(ModuleOutcome::changed().with_action_ids(action_ids))
    }

    async fn resolve_patch_filter(
        &self,
        patches: Option<&[String]>,
    ) -> Result<Option<Vec<i64>>, UyuniError> {
        let Some(patches) = patches else {
            return Ok(None);
        };
        let mut ids = Vec::with_capacity(patches.len());
        for patch in patches {
            ids.push(resolve_patch_id(self.client, &PatchRef::parse(patch)).await?);
        }
        Ok(Some(ids))
    }

    /// 安装不属于补丁的包升级，include/exclude 按名称子串过滤
    pub async fn install_upgrades(
        &self,
        name: &str,
        include_upgrades: Option<&[String]>,
        exclude_upgrades: Option<&[String]>,
    ) -> Result<ModuleOutcome, UyuniError> {
        if include_upgrades.is_some() && exclude_upgrades.is_some() {
            return Err(UyuniError::UnsupportedFilter(
                "Only supply include_upgrades OR exclude_upgrades".to_string(),
            ));
        }

        let host = resolve_host_id(self.client, &HostRef::parse(name)).await?;
        let all_upgrades = self.client.get_host_upgrades(host).await?;

        let upgrades: Vec<i64> = match (include_upgrades, exclude_upgrades) {
            (_, Some(exclude)) => all_upgrades
                .iter()
                .filter(|upgrade| !is_blocklisted(&upgrade.name, exclude))
                .map(|upgrade| upgrade.install_id())
                .collect(),
            (Some(include), _) => all_upgrades
                .iter()
                .filter(|upgrade| is_blocklisted(&upgrade.name, include))
                .map(|upgrade| upgrade.install_id())
                .collect(),
            (None, None) => all_upgrades
                .iter()
                .map(|upgrade| upgrade.install_id())
                .collect(),
        };

        if upgrades.is_empty() {
            // 没有可安装的升级不算失败
            return Ok(ModuleOutcome::unchanged().with_msg("No upgrades available"));
        }

        let action_ids = self.client.install_upgrades(host, upgrades).await?;
        info!("Scheduled package upgrades for {}", name);
        Ok(ModuleOutcome::changed().with_action_ids(action_ids))
    }

    /// 重启主机
    pub async fn reboot_host(&self, name: &str) -> Result<ModuleOutcome, UyuniError> {
        let host = resolve_host_id(self.client, &HostRef::parse(name)).await?;
        let action_id = self.client.reboot_host(host).await?;
        info!("Scheduled reboot for {}", name);
        Ok(ModuleOutcome::changed().with_action_ids(vec![action_id]))
    }

    /// 应用 highstate
    pub async fn apply_highstate(
        &self,
        name: &str,
        test_mode: bool,
    ) -> Result<ModuleOutcome, UyuniError> {
        let host = resolve_host_id(self.client, &HostRef::parse(name)).await?;
        let action_id = self.client.apply_highstate(host, test_mode).await?;
        Ok(ModuleOutcome::changed().with_action_ids(vec![action_id]))
    }

    /// 调度 OpenSCAP 扫描
    pub async fn openscap_run(
        &self,
        name: &str,
        document: &str,
        arguments: Option<&str>,
    ) -> Result<ModuleOutcome, UyuniError> {
        let host = resolve_host_id(self.client, &HostRef::parse(name)).await?;
        let action_id = self
            .client
            .schedule_openscap_run(&[host], document, arguments)
            .await?;
        Ok(ModuleOutcome::changed().with_action_ids(vec![action_id]))
    }

    /// 查询主机是否需要重启
    ///
    /// 需要重启报告为 changed，便于 playbook 按结果触发后续动作。
    pub async fn is_reboot_required(&self, name: &str) -> Result<ModuleOutcome, UyuniError> {
        let host = resolve_host_id(self.client, &HostRef::parse(name)).await?;
        let required = self.client.is_reboot_required(host).await?;
        let mut outcome = if required {
            ModuleOutcome::changed()
        } else {
            ModuleOutcome::unchanged()
        };
        outcome.reboot_required = Some(required);
        Ok(outcome)
    }

    /// 完整包更新：调度并等待完成
    pub async fn full_pkg_update(&self, name: &str) -> Result<ModuleOutcome, UyuniError> {
        let host = resolve_host_id(self.client, &HostRef::parse(name)).await?;

        if self.client.is_reboot_required(host).await? {
            return Err(UyuniError::UnsupportedRequest(
                "Cannot install updates. Host must be rebooted first.".to_string(),
            ));
        }

        let upgrades = self.client.get_outdated_pkgs(host).await?;
        if upgrades == 0 {
            return Ok(ModuleOutcome::unchanged());
        }

        let action_id = self.client.full_pkg_update(host).await?;
        self.client
            .wait_for_action(action_id, host, DEFAULT_WAIT_TIMEOUT, DEFAULT_POLL_INTERVAL)
            .await?;
        let mut outcome = ModuleOutcome::changed().with_action_ids(vec![action_id]);
        outcome.installed_updates = Some(upgrades);
        Ok(outcome)
    }

    /// 系统组对账：present 创建或更新，absent 删除
    pub async fn system_group(
        &self,
        name: &str,
        description: &str,
        state: GroupState,
    ) -> Result<ModuleOutcome, UyuniError> {
        if state == GroupState::Absent {
            return match self.client.remove_system_group(name).await {
                Ok(()) => Ok(ModuleOutcome::changed()),
                // 组不存在即目标状态已达成
                Err(UyuniError::EmptySet(_)) => Ok(ModuleOutcome::unchanged()),
                Err(err) => Err(err),
            };
        }

        match self.client.add_system_group(name, description).await {
            Ok(_) => Ok(ModuleOutcome::changed()),
            Err(UyuniError::AlreadyExists(_)) => {
                let current = self.client.get_system_group_details(name).await?;
                if current.description != description {
                    self.client.update_system_group(name, description).await?;
                    Ok(ModuleOutcome::changed())
                } else {
                    Ok(ModuleOutcome::unchanged())
                }
            }
            Err(err) => {
                warn!("Failed to create system group {:?}: {}", name, err);
                Err(err)
            }
        }
    }
}
