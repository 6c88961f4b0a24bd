//! 动作链操作
//!
//! 链按 label 标识，逐个追加动作后整体调度执行。服务端按追加顺序
//! 执行，客户端无法重排或删除单个动作，只能删除整条链。

use crate::api::client::UyuniClient;
use crate::api::fault::{
    classify, session_error, CHAIN_ADD_PATCHES, CHAIN_ADD_UPGRADES, CHAIN_CREATE, CHAIN_LOOKUP,
};
use crate::error::UyuniError;
use crate::rpc::{now_datetime, RpcValue};
use crate::types::{expect_array, ChainAction, ChainSummary};
use crate::utils::ensure_shebang;
use base64::Engine as _;

/// 链内脚本的执行超时（秒）
const SCRIPT_TIMEOUT: i64 = 600;

impl UyuniClient {
    /// 返回所有已定义的动作链
    pub async fn get_actionchains(&self) -> Result<Vec<ChainSummary>, UyuniError> {
        let value = self
            .call("actionchain.listChains", vec![])
            .await
            .map_err(session_error)?;
        expect_array(&value)?.iter().map(ChainSummary::from_rpc).collect()
    }

    /// 返回某条动作链里的动作
    pub async fn get_actionchain_actions(
        &self,
        chain_label: &str,
    ) -> Result<Vec<ChainAction>, UyuniError> {
        let value = self
            .call(
                "actionchain.listChainActions",
                vec![RpcValue::string(chain_label)],
            )
            .await
            .map_err(session_error)?;
        let actions = expect_array(&value)?;
        if actions.is_empty() {
            return Err(UyuniError::EmptySet("Action chain is empty".to_string()));
        }
        actions.iter().map(ChainAction::from_rpc).collect()
    }

    /// 创建一条空的动作链，返回链 ID
    pub async fn add_actionchain(&self, label: &str) -> Result<i64, UyuniError> {
        let value = self
            .call("actionchain.createChain", vec![RpcValue::string(label)])
            .await
            .map_err(|e| classify(e, CHAIN_CREATE))?;
        expect_chain_id(&value)
    }

    /// 调度执行一条动作链（立即生效）
    pub async fn run_actionchain(&self, chain_label: &str) -> Result<i64, UyuniError> {
        let value = self
            .call(
                "actionchain.scheduleChain",
                vec![RpcValue::string(chain_label), now_datetime()],
            )
            .await
            .map_err(|e| classify(e, CHAIN_LOOKUP))?;
        expect_chain_id(&value)
    }

    /// 删除整条动作链
    pub async fn delete_actionchain(&self, chain_label: &str) -> Result<(), UyuniError> {
        self.call(
            "actionchain.deleteChain",
            vec![RpcValue::string(chain_label)],
        )
        .await
        .map_err(|e| classify(e, CHAIN_LOOKUP))?;
        Ok(())
    }

    /// 向链中追加补丁安装
    pub async fn actionchain_add_patches(
        &self,
        chain_label: &str,
        system_id: i64,
        patches: Vec<i64>,
    ) -> Result<i64, UyuniError> {
        let ids = patches.into_iter().map(RpcValue::Int).collect();
        let value = self
            .call(
                "actionchain.addErrataUpdate",
                vec![
                    RpcValue::Int(system_id),
                    RpcValue::Array(ids),
                    RpcValue::string(chain_label),
                ],
            )
            .await
            .map_err(|e| classify(e, CHAIN_ADD_PATCHES))?;
        expect_chain_id(&value)
    }

    /// 向链中追加包升级
    pub async fn actionchain_add_upgrades(
        &self,
        chain_label: &str,
        system_id: i64,
        upgrades: Vec<i64>,
    ) -> Result<i64, UyuniError> {
        if upgrades.is_empty() {
            return Err(UyuniError::EmptySet("No upgrades defined".to_string()));
        }
        let ids = upgrades.into_iter().map(RpcValue::Int).collect();
        let value = self
            .call(
                "actionchain.addPackageUpgrade",
                vec![
                    RpcValue::Int(system_id),
                    RpcValue::Array(ids),
                    RpcValue::string(chain_label),
                ],
            )
            .await
            .map_err(|e| classify(e, CHAIN_ADD_UPGRADES))?;
        expect_chain_id(&value)
    }

    /// 向链中追加脚本执行
    ///
    /// 脚本体按协议要求 base64 编码传输。
    pub async fn actionchain_add_command(
        &self,
        chain_label: &str,
        system_id: i64,
        command: &str,
        user: &str,
        group: &str,
    ) -> Result<i64, UyuniError> {
        if command.is_empty() {
            return Err(UyuniError::EmptySet("Command is empty".to_string()));
        }
        let script = ensure_shebang(command);
        let encoded = base64::engine::general_purpose::STANDARD.encode(script.as_bytes());
        let value = self
            .call(
                "actionchain.addScriptRun",
                vec![
                    RpcValue::Int(system_id),
                    RpcValue::string(chain_label),
                    RpcValue::string(user),
                    RpcValue::string(group),
                    RpcValue::Int(SCRIPT_TIMEOUT),
                    RpcValue::string(encoded),
                ],
            )
            .await
            .map_err(|e| classify(e, CHAIN_LOOKUP))?;
        expect_chain_id(&value)
    }

    /// 向链中追加重启
    pub async fn actionchain_add_reboot(
        &self,
        chain_label: &str,
        system_id: i64,
    ) -> Result<i64, UyuniError> {
        let value = self
            .call(
                "actionchain.addSystemReboot",
                vec![RpcValue::Int(system_id), RpcValue::string(chain_label)],
            )
            .await
            .map_err(|e| classify(e, CHAIN_LOOKUP))?;
        expect_chain_id(&value)
    }
}

fn expect_chain_id(value: &RpcValue) -> Result<i64, UyuniError> {
    value.as_i64().ok_or_else(|| {
        UyuniError::Session("Malformed server response: expected action ID".to_string())
    })
}
