use crate::api::client::UyuniClient;
use crate::api::fault::{
    classify, session_error, INSTALL_PATCHES, INSTALL_UPGRADES, PACKAGE_LOOKUP, PATCH_LOOKUP,
    SYSTEM_SCOPED,
};
use crate::error::UyuniError;
use crate::rpc::{now_datetime, RpcValue};
use crate::types::{expect_array, PackageInfo, PackageUpgrade, Patch};
use crate::utils::split_rpm_filename;
use tracing::debug;

impl UyuniClient {
    /// 返回某台主机当前可安装的补丁
    pub async fn get_host_patches(&self, system_id: i64) -> Result<Vec<Patch>, UyuniError> {
        let value = self
            .call("system.getRelevantErrata", vec![RpcValue::Int(system_id)])
            .await
            .map_err(|e| classify(e, SYSTEM_SCOPED))?;
        expect_array(&value)?.iter().map(Patch::from_relevant).collect()
    }

    /// 按 advisory 名称查询补丁
    pub async fn get_patch_by_name(&self, patch_name: &str) -> Result<Patch, UyuniError> {
        let value = self
            .call("errata.getDetails", vec![RpcValue::string(patch_name)])
            .await
            .map_err(|e| classify(e, PATCH_LOOKUP))?;
        Patch::from_details(patch_name, &value)
    }

    /// 按 RPM 文件名查询软件包（如 foo-1.0-1.i386.rpm）
    pub async fn get_package_by_file_name(
        &self,
        file_name: &str,
    ) -> Result<Vec<PackageInfo>, UyuniError> {
        let nvrea = split_rpm_filename(file_name)?;
        let value = self
            .call(
                "packages.findByNvrea",
                vec![
                    RpcValue::string(nvrea.name),
                    RpcValue::string(nvrea.version),
                    RpcValue::string(nvrea.release),
                    RpcValue::string(nvrea.epoch),
                    RpcValue::string(nvrea.architecture),
                ],
            )
            .await
            .map_err(|e| classify(e, PACKAGE_LOOKUP))?;
        let packages = expect_array(&value)?;
        if packages.is_empty() {
            return Err(UyuniError::EmptySet(format!(
                "Package not found: {file_name:?}"
            )));
        }
        packages.iter().map(PackageInfo::from_rpc).collect()
    }

    /// 返回某台主机可用的包升级
    ///
    /// 已被某个 erratum 覆盖的升级会被剔除，避免和补丁安装重复调度。
    pub async fn get_host_upgrades(
        &self,
        system_id: i64,
    ) -> Result<Vec<PackageUpgrade>, UyuniError> {
        let value = self
            .call(
                "system.listLatestUpgradablePackages",
                vec![RpcValue::Int(system_id)],
            )
            .await
            .map_err(|e| classify(e, SYSTEM_SCOPED))?;

        let mut upgrades = Vec::new();
        for entry in expect_array(&value)? {
            let upgrade = PackageUpgrade::from_rpc(entry)?;
            let errata = self
                .call(
                    "packages.listProvidingErrata",
                    vec![RpcValue::Int(upgrade.to_package_id)],
                )
                .await
                .map_err(session_error)?;
            if expect_array(&errata)?.is_empty() {
                upgrades.push(upgrade);
            }
        }
        debug!(
            "Found {} upgrades for {}",
            upgrades.len(),
            system_id
        );
        Ok(upgrades)
    }

    /// 返回某台主机过期软件包的数量
    pub async fn get_outdated_pkgs(&self, system_id: i64) -> Result<i64, UyuniError> {
        Ok(self.get_host_details(system_id).await?.outdated_pkg_count)
    }

    /// 在主机上调度补丁安装，返回动作 ID 数组
    pub async fn install_patches(
        &self,
        system_id: i64,
        patches: Vec<i64>,
    ) -> Result<Vec<i64>, UyuniError> {
        let ids = patches.into_iter().map(RpcValue::Int).collect();
        let value = self
            .call(
                "system.scheduleApplyErrata",
                vec![RpcValue::Int(system_id), RpcValue::Array(ids)],
            )
            .await
            .map_err(|e| classify(e, INSTALL_PATCHES))?;
        expect_array(&value)?
            .iter()
            .map(|action| {
                action.as_i64().ok_or_else(|| {
                    UyuniError::Session(
                        "Malformed server response: expected action ID".to_string(),
                    )
                })
            })
            .collect()
    }

    /// 在主机上调度包升级安装
    ///
    /// 返回单元素数组，与 `install_patches` 的返回形状保持一致。
    pub async fn install_upgrades(
        &self,
        system_id: i64,
        upgrades: Vec<i64>,
    ) -> Result<Vec<i64>, UyuniError> {
        if upgrades.is_empty() {
            debug!("No upgrades for {}", system_id);
            return Err(UyuniError::EmptySet("No upgrades supplied".to_string()));
        }

        let ids = upgrades.into_iter().map(RpcValue::Int).collect();
        let value = self
            .call(
                "system.schedulePackageInstall",
                vec![
                    RpcValue::Int(system_id),
                    RpcValue::Array(ids),
                    now_datetime(),
                ],
            )
            .await
            .map_err(|e| classify(e, INSTALL_UPGRADES))?;
        let action_id = value.as_i64().ok_or_else(|| {
            UyuniError::Session("Malformed server response: expected action ID".to_string())
        })?;
        Ok(vec![action_id])
    }

    /// 调度一次完整的包更新
    pub async fn full_pkg_update(&self, system_id: i64) -> Result<i64, UyuniError> {
        let value = self
            .call(
                "system.schedulePackageUpdate",
                vec![
                    RpcValue::Array(vec![RpcValue::Int(system_id)]),
                    now_datetime(),
                ],
            )
            .await
            .map_err(|e| classify(e, SYSTEM_SCOPED))?;
        value.as_i64().ok_or_else(|| {
            UyuniError::Session("Malformed server response: expected action ID".to_string())
        })
    }
}
