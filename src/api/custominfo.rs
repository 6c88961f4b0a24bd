//! 自定义变量（custom info keys）
//!
//! 键在组织层面定义，然后以键值对的形式赋给单台主机。
//! 给主机赋值前必须先 `create_custom_variable` 定义键。

use crate::api::client::UyuniClient;
use crate::api::fault::{
    classify, session_error, CUSTOM_KEY_CREATE, CUSTOM_KEY_MODIFY, CUSTOM_VALUE,
};
use crate::error::UyuniError;
use crate::rpc::RpcValue;
use crate::types::expect_array;
use std::collections::HashMap;

impl UyuniClient {
    /// 返回所有已定义的自定义变量（label → description）
    pub async fn get_custom_variables(&self) -> Result<HashMap<String, String>, UyuniError> {
        let value = self
            .call("system.custominfo.listAllKeys", vec![])
            .await
            .map_err(session_error)?;
        let mut variables = HashMap::new();
        for entry in expect_array(&value)? {
            if let Some(label) = entry.get_str("label") {
                variables.insert(
                    label.to_string(),
                    entry.get_str("description").unwrap_or_default().to_string(),
                );
            }
        }
        Ok(variables)
    }

    /// 定义一个自定义变量
    pub async fn create_custom_variable(
        &self,
        label: &str,
        description: &str,
    ) -> Result<(), UyuniError> {
        self.call(
            "system.custominfo.createKey",
            vec![RpcValue::string(label), RpcValue::string(description)],
        )
        .await
        .map_err(|e| classify(e, CUSTOM_KEY_CREATE))?;
        Ok(())
    }

    /// 更新自定义变量的描述
    pub async fn update_custom_variable(
        &self,
        label: &str,
        description: &str,
    ) -> Result<(), UyuniError> {
        self.call(
            "system.custominfo.updateKey",
            vec![RpcValue::string(label), RpcValue::string(description)],
        )
        .await
        .map_err(|e| classify(e, CUSTOM_KEY_MODIFY))?;
        Ok(())
    }

    /// 删除自定义变量定义
    pub async fn delete_custom_variable(&self, label: &str) -> Result<(), UyuniError> {
        self.call(
            "system.custominfo.deleteKey",
            vec![RpcValue::string(label)],
        )
        .await
        .map_err(|e| classify(e, CUSTOM_KEY_MODIFY))?;
        Ok(())
    }

    /// 给主机设置一个自定义变量值
    pub async fn host_add_custom_variable(
        &self,
        system_id: i64,
        label: &str,
        value: &str,
    ) -> Result<(), UyuniError> {
        let mut values = HashMap::new();
        values.insert(label.to_string(), RpcValue::string(value));
        self.call(
            "system.setCustomValues",
            vec![RpcValue::Int(system_id), RpcValue::Struct(values)],
        )
        .await
        .map_err(|e| classify(e, CUSTOM_VALUE))?;
        Ok(())
    }

    /// 更新主机的自定义变量值（与设置等价）
    pub async fn host_update_custom_variable(
        &self,
        system_id: i64,
        label: &str,
        value: &str,
    ) -> Result<(), UyuniError> {
        self.host_add_custom_variable(system_id, label, value).await
    }

    /// 删除主机上的自定义变量值
    pub async fn host_delete_custom_variable(
        &self,
        system_id: i64,
        label: &str,
    ) -> Result<(), UyuniError> {
        self.call(
            "system.deleteCustomValues",
            vec![
                RpcValue::Int(system_id),
                RpcValue::Array(vec![RpcValue::string(label)]),
            ],
        )
        .await
        .map_err(|e| classify(e, CUSTOM_VALUE))?;
        Ok(())
    }
}
