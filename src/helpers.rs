//! 客户端之上的辅助函数
//!
//! 无状态的便捷封装：名称/ID 解析、黑名单过滤、已安装检查、
//! 统一的连接构造。

use crate::api::UyuniClient;
use crate::error::UyuniError;
use crate::types::{ConnectionConfig, HostRef, PatchRef};
use tracing::debug;

/// 解析主机引用为 profile ID
///
/// 已经是数字 ID 时不发起远程调用，名称则恰好查询一次。
pub async fn resolve_host_id(
    client: &UyuniClient,
    target: &HostRef,
) -> Result<i64, UyuniError> {
    match target {
        HostRef::Id(id) => Ok(*id),
        HostRef::Name(name) => client.get_host_id(name).await,
    }
}

/// 解析补丁引用为补丁 ID
pub async fn resolve_patch_id(
    client: &UyuniClient,
    patch: &PatchRef,
) -> Result<i64, UyuniError> {
    match patch {
        PatchRef::Id(id) => Ok(*id),
        PatchRef::Name(name) => Ok(client.get_patch_by_name(name).await?.id),
    }
}

/// 升级名称是否被黑名单里的任一子串命中
pub fn is_blocklisted(upgrade: &str, blacklist: &[String]) -> bool {
    blacklist.iter().any(|entry| upgrade.contains(entry.as_str()))
}

/// 检查给定补丁是否都已经安装过
///
/// 通过动作历史交叉比对（成功的 Patch Update 动作）。
pub async fn patch_already_installed(
    client: &UyuniClient,
    system_id: i64,
    patches: &[i64],
) -> Result<bool, UyuniError> {
    let installed = get_recently_installed_patches(client, system_id).await?;
    Ok(patches.iter().all(|patch| installed.contains(patch)))
}

/// 从动作历史里收集最近成功安装的补丁 ID
pub async fn get_recently_installed_patches(
    client: &UyuniClient,
    system_id: i64,
) -> Result<Vec<i64>, UyuniError> {
    let actions = client.get_host_actions(system_id).await?;
    let mut patches = Vec::new();
    for action in actions {
        if !action.name.to_lowercase().contains("patch update") || action.successful_count != 1 {
            continue;
        }
        // 动作详情第一行的首个单词是 advisory 名称
        let advisory = action
            .additional_info
            .first()
            .and_then(|info| info.detail.split_whitespace().next())
            .unwrap_or_default();
        if advisory.is_empty() {
            continue;
        }
        patches.push(client.get_patch_by_name(advisory).await?.id);
    }
    debug!(
        "Found {} recently installed patches for {}",
        patches.len(),
        system_id
    );
    Ok(patches)
}

/// 按连接参数构造客户端
///
/// 所有构造失败统一包装为连接错误，原始错误保留在 `source` 里，
/// 调用方仍能区分证书问题和其他失败。
pub async fn configure_connection(
    config: &ConnectionConfig,
) -> Result<UyuniClient, UyuniError> {
    UyuniClient::connect(config).await.map_err(|err| {
        let message = match &err {
            UyuniError::SslVerification(_) => "Failed to verify SSL certificate".to_string(),
            other => format!("Failed to create API connection: {other}"),
        };
        UyuniError::Connection {
            message,
            source: Box::new(err),
        }
    })
}
