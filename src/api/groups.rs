use crate::api::client::UyuniClient;
use crate::api::fault::{classify, GROUP_CREATE, GROUP_LOOKUP};
use crate::error::UyuniError;
use crate::rpc::RpcValue;
use crate::types::SystemGroup;

impl UyuniClient {
    /// 创建系统组
    pub async fn add_system_group(
        &self,
        name: &str,
        description: &str,
    ) -> Result<SystemGroup, UyuniError> {
        let value = self
            .call(
                "systemgroup.create",
                vec![RpcValue::string(name), RpcValue::string(description)],
            )
            .await
            .map_err(|e| classify(e, GROUP_CREATE))?;
        SystemGroup::from_rpc(&value)
    }

    /// 更新系统组描述
    pub async fn update_system_group(
        &self,
        name: &str,
        description: &str,
    ) -> Result<SystemGroup, UyuniError> {
        let value = self
            .call(
                "systemgroup.update",
                vec![RpcValue::string(name), RpcValue::string(description)],
            )
            .await
            .map_err(|e| classify(e, GROUP_LOOKUP))?;
        SystemGroup::from_rpc(&value)
    }

    /// 删除系统组
    pub async fn remove_system_group(&self, name: &str) -> Result<(), UyuniError> {
        self.call("systemgroup.delete", vec![RpcValue::string(name)])
            .await
            .map_err(|e| classify(e, GROUP_LOOKUP))?;
        Ok(())
    }

    /// 查询系统组详情
    pub async fn get_system_group_details(
        &self,
        name: &str,
    ) -> Result<SystemGroup, UyuniError> {
        let value = self
            .call("systemgroup.getDetails", vec![RpcValue::string(name)])
            .await
            .map_err(|e| classify(e, GROUP_LOOKUP))?;
        SystemGroup::from_rpc(&value)
    }
}
