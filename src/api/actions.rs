use crate::api::client::UyuniClient;
use crate::api::fault::{classify, REBOOT, RUN_COMMAND, SYSTEM_SCOPED};
use crate::error::UyuniError;
use crate::rpc::{now_datetime, RpcValue};
use crate::types::{expect_array, ActionStatus};
use crate::utils::ensure_shebang;
use std::time::Duration;
use tracing::{debug, info};

/// `wait_for_action` 的默认超时
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(3600);

/// `wait_for_action` 的默认轮询间隔
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// 远程脚本的执行超时（秒），与服务端调度参数一致
const SCRIPT_TIMEOUT: i64 = 600;

impl UyuniClient {
    /// 调度主机重启，返回动作 ID
    pub async fn reboot_host(&self, system_id: i64) -> Result<i64, UyuniError> {
        let value = self
            .call(
                "system.scheduleReboot",
                vec![RpcValue::Int(system_id), now_datetime()],
            )
            .await
            .map_err(|e| classify(e, REBOOT))?;
        expect_action_id(&value)
    }

    /// 在主机上调度一段脚本，返回动作 ID
    ///
    /// 命令没有 shebang 时补上 `#!/bin/sh`。
    pub async fn host_run_command(
        &self,
        system_id: i64,
        command: &str,
        user: &str,
        group: &str,
    ) -> Result<i64, UyuniError> {
        let script = ensure_shebang(command);
        let value = self
            .call(
                "system.scheduleScriptRun",
                vec![
                    RpcValue::Int(system_id),
                    RpcValue::string(user),
                    RpcValue::string(group),
                    RpcValue::Int(SCRIPT_TIMEOUT),
                    RpcValue::string(script),
                    now_datetime(),
                ],
            )
            .await
            .map_err(|e| classify(e, RUN_COMMAND))?;
        expect_action_id(&value)
    }

    /// 调度 highstate 应用，`test_mode` 为 true 时只做模拟
    pub async fn apply_highstate(
        &self,
        system_id: i64,
        test_mode: bool,
    ) -> Result<i64, UyuniError> {
        let value = self
            .call(
                "system.scheduleApplyHighstate",
                vec![
                    RpcValue::Int(system_id),
                    now_datetime(),
                    RpcValue::Bool(test_mode),
                ],
            )
            .await
            .map_err(|e| classify(e, SYSTEM_SCOPED))?;
        expect_action_id(&value)
    }

    /// 调度一次 OpenSCAP（XCCDF）合规扫描
    pub async fn schedule_openscap_run(
        &self,
        system_ids: &[i64],
        document: &str,
        arguments: Option<&str>,
    ) -> Result<i64, UyuniError> {
        let ids = system_ids.iter().map(|id| RpcValue::Int(*id)).collect();
        let value = self
            .call(
                "system.scap.scheduleXccdfScan",
                vec![
                    RpcValue::Array(ids),
                    RpcValue::string(document),
                    RpcValue::string(arguments.unwrap_or_default()),
                ],
            )
            .await
            .map_err(|e| classify(e, SYSTEM_SCOPED))?;
        expect_action_id(&value)
    }

    /// 返回主机的全部动作历史
    pub async fn get_host_actions(
        &self,
        system_id: i64,
    ) -> Result<Vec<ActionStatus>, UyuniError> {
        let value = self
            .call("system.listSystemEvents", vec![RpcValue::Int(system_id)])
            .await
            .map_err(|e| classify(e, SYSTEM_SCOPED))?;
        expect_array(&value)?.iter().map(ActionStatus::from_rpc).collect()
    }

    /// 按类型返回主机动作
    pub async fn get_action_by_type(
        &self,
        system_id: i64,
        action_type: &str,
    ) -> Result<Vec<ActionStatus>, UyuniError> {
        let value = self
            .call(
                "system.listSystemEvents",
                vec![RpcValue::Int(system_id), RpcValue::string(action_type)],
            )
            .await
            .map_err(|e| classify(e, SYSTEM_SCOPED))?;
        expect_array(&value)?.iter().map(ActionStatus::from_rpc).collect()
    }

    /// 补丁安装动作的状态
    pub async fn get_errata_task_status(
        &self,
        system_id: i64,
    ) -> Result<Vec<ActionStatus>, UyuniError> {
        self.get_action_by_type(system_id, "Patch Update").await
    }

    /// 包升级动作的状态
    pub async fn get_upgrade_task_status(
        &self,
        system_id: i64,
    ) -> Result<Vec<ActionStatus>, UyuniError> {
        self.get_action_by_type(system_id, "Package Install").await
    }

    /// 脚本执行动作的状态
    pub async fn get_script_task_status(
        &self,
        system_id: i64,
    ) -> Result<Vec<ActionStatus>, UyuniError> {
        self.get_action_by_type(system_id, "Run an arbitrary script")
            .await
    }

    /// 返回某个具体动作的状态
    pub async fn get_host_action(
        &self,
        system_id: i64,
        action_id: i64,
    ) -> Result<ActionStatus, UyuniError> {
        let actions = self.get_host_actions(system_id).await?;
        actions
            .into_iter()
            .find(|action| action.id == action_id)
            .ok_or_else(|| UyuniError::EmptySet(format!("Action not found: {action_id:?}")))
    }

    /// 等待动作结束
    ///
    /// 协作式轮询：每次查询之间 `tokio::time::sleep`，随时可以通过
    /// 丢弃 future 取消等待。`successful_count + failed_count > 0`
    /// 即视为结束，超时则报本地超时错误。
    pub async fn wait_for_action(
        &self,
        action_id: i64,
        system_id: i64,
        timeout: Duration,
        interval: Duration,
    ) -> Result<ActionStatus, UyuniError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let status = self.get_host_action(system_id, action_id).await?;
            if status.is_terminal() {
                info!(
                    "Action {} finished: {} successful, {} failed",
                    action_id, status.successful_count, status.failed_count
                );
                return Ok(status);
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(UyuniError::Timeout(format!(
                    "Action {} did not complete within {} seconds",
                    action_id,
                    timeout.as_secs()
                )));
            }
            debug!("Action {} still running, sleeping {:?}", action_id, interval);
            tokio::time::sleep(interval).await;
        }
    }
}

fn expect_action_id(value: &RpcValue) -> Result<i64, UyuniError> {
    value.as_i64().ok_or_else(|| {
        UyuniError::Session("Malformed server response: expected action ID".to_string())
    })
}
