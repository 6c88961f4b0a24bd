use crate::api::client::UyuniClient;
use crate::api::fault::{
    classify, session_error, HOSTGROUP_LOOKUP, SYSTEM_LOOKUP, SYSTEM_SCOPED, USER_LOOKUP,
};
use crate::error::UyuniError;
use crate::rpc::RpcValue;
use crate::types::{
    expect_array, required_i64, CustomValues, GroupMembership, NetworkInfo, SystemDetails,
    SystemSummary, UserDetails,
};
use tracing::debug;

impl UyuniClient {
    /// 返回所有系统的 profile ID
    pub async fn get_hosts(&self) -> Result<Vec<i64>, UyuniError> {
        let value = self
            .call("system.listSystems", vec![])
            .await
            .map_err(session_error)?;
        let hosts = expect_array(&value)?;
        if hosts.is_empty() {
            return Err(UyuniError::EmptySet("No systems found".to_string()));
        }
        hosts
            .iter()
            .map(|host| required_i64(host, "id"))
            .collect()
    }

    /// 返回所有系统的名称和 ID
    pub async fn get_all_hosts(&self) -> Result<Vec<SystemSummary>, UyuniError> {
        let value = self
            .call("system.listSystems", vec![])
            .await
            .map_err(session_error)?;
        let hosts = expect_array(&value)?;
        if hosts.is_empty() {
            return Err(UyuniError::EmptySet("No systems found".to_string()));
        }
        hosts.iter().map(SystemSummary::from_rpc).collect()
    }

    /// 返回所有系统组名称
    pub async fn get_all_hostgroups(&self) -> Result<Vec<String>, UyuniError> {
        let value = self
            .call("systemgroup.listAllGroups", vec![])
            .await
            .map_err(session_error)?;
        let groups = expect_array(&value)?;
        if groups.is_empty() {
            return Err(UyuniError::EmptySet("No groups found".to_string()));
        }
        Ok(groups
            .iter()
            .filter_map(|group| group.get_str("name").map(str::to_string))
            .collect())
    }

    /// 返回某台主机订阅的系统组
    pub async fn get_hostgroups_by_host(
        &self,
        system_id: i64,
    ) -> Result<Vec<String>, UyuniError> {
        let value = self
            .call("system.listGroups", vec![RpcValue::Int(system_id)])
            .await
            .map_err(session_error)?;
        let groups = expect_array(&value)?;
        if groups.is_empty() {
            return Err(UyuniError::EmptySet("No groups found".to_string()));
        }
        Ok(groups
            .iter()
            .filter(|group| group.get_i64("subscribed") == Some(1))
            .filter_map(|group| group.get_str("system_group_name").map(str::to_string))
            .collect())
    }

    /// 返回某台主机的所有组（含未订阅的，带订阅标记）
    pub async fn get_host_groups(
        &self,
        system_id: i64,
    ) -> Result<Vec<GroupMembership>, UyuniError> {
        let value = self
            .call("system.listGroups", vec![RpcValue::Int(system_id)])
            .await
            .map_err(|e| classify(e, SYSTEM_SCOPED))?;
        let groups = expect_array(&value)?;
        groups.iter().map(GroupMembership::from_rpc).collect()
    }

    /// 返回某个系统组内所有主机的 ID
    pub async fn get_hosts_by_hostgroup(
        &self,
        hostgroup: &str,
    ) -> Result<Vec<i64>, UyuniError> {
        let value = self
            .call(
                "systemgroup.listSystems",
                vec![RpcValue::string(hostgroup)],
            )
            .await
            .map_err(|e| classify(e, HOSTGROUP_LOOKUP))?;
        let hosts = expect_array(&value)?;
        if hosts.is_empty() {
            return Err(UyuniError::EmptySet("No systems found".to_string()));
        }
        hosts
            .iter()
            .map(|host| required_i64(host, "id"))
            .collect()
    }

    /// 返回所有需要重启的主机名
    ///
    /// 没有主机需要重启是正常情况，返回空列表而不是错误。
    pub async fn get_hosts_by_required_reboot(&self) -> Result<Vec<String>, UyuniError> {
        let value = self
            .call("system.listSuggestedReboot", vec![])
            .await
            .map_err(session_error)?;
        let hosts = expect_array(&value)?;
        Ok(hosts
            .iter()
            .filter_map(|host| host.get_str("name").map(str::to_string))
            .collect())
    }

    /// 按组织过滤主机
    ///
    /// Uyuni API 不支持该过滤器，这里按既有行为返回全部主机。
    pub async fn get_hosts_by_organization(
        &self,
        organization: &str,
    ) -> Result<Vec<i64>, UyuniError> {
        debug!("Organization filter {:?} is not supported, returning all hosts", organization);
        self.get_hosts().await
    }

    /// 按位置过滤主机
    ///
    /// Uyuni API 不支持该过滤器，这里按既有行为返回全部主机。
    pub async fn get_hosts_by_location(&self, location: &str) -> Result<Vec<i64>, UyuniError> {
        debug!("Location filter {:?} is not supported, returning all hosts", location);
        self.get_hosts().await
    }

    /// 按主机名查询 profile ID
    pub async fn get_host_id(&self, hostname: &str) -> Result<i64, UyuniError> {
        let value = self
            .call("system.getId", vec![RpcValue::string(hostname)])
            .await
            .map_err(|e| classify(e, SYSTEM_LOOKUP))?;
        let hosts = expect_array(&value)?;
        match hosts.first() {
            Some(host) => required_i64(host, "id"),
            None => Err(UyuniError::EmptySet(format!(
                "System not found: {hostname:?}"
            ))),
        }
    }

    /// 按 profile ID 查询主机名
    pub async fn get_hostname_by_id(&self, system_id: i64) -> Result<String, UyuniError> {
        let value = self
            .call("system.getName", vec![RpcValue::Int(system_id)])
            .await
            .map_err(|e| classify(e, SYSTEM_LOOKUP))?;
        value
            .get_str("name")
            .map(str::to_string)
            .ok_or_else(|| UyuniError::EmptySet(format!("System not found: {system_id:?}")))
    }

    /// 返回主机详情
    pub async fn get_host_details(&self, system_id: i64) -> Result<SystemDetails, UyuniError> {
        let value = self
            .call("system.getDetails", vec![RpcValue::Int(system_id)])
            .await
            .map_err(|e| classify(e, SYSTEM_SCOPED))?;
        SystemDetails::from_rpc(&value)
    }

    /// 返回主机网络信息（v4/v6 地址）
    pub async fn get_host_network(&self, system_id: i64) -> Result<NetworkInfo, UyuniError> {
        let value = self
            .call("system.getNetwork", vec![RpcValue::Int(system_id)])
            .await
            .map_err(|e| classify(e, SYSTEM_SCOPED))?;
        NetworkInfo::from_rpc(&value)
    }

    /// 返回主机的自定义变量键值
    pub async fn get_host_params(&self, system_id: i64) -> Result<CustomValues, UyuniError> {
        let value = self
            .call("system.getCustomValues", vec![RpcValue::Int(system_id)])
            .await
            .map_err(|e| classify(e, SYSTEM_SCOPED))?;
        let members = value.as_struct().ok_or_else(|| {
            UyuniError::Session("Malformed server response: expected struct".to_string())
        })?;
        Ok(members
            .iter()
            .filter_map(|(key, member)| {
                member.as_str().map(|text| (key.clone(), text.to_string()))
            })
            .collect())
    }

    /// `get_host_params` 的别名，与自定义变量操作配套
    pub async fn get_host_custom_variables(
        &self,
        system_id: i64,
    ) -> Result<CustomValues, UyuniError> {
        self.get_host_params(system_id).await
    }

    /// 检查某台主机是否需要重启
    pub async fn is_reboot_required(&self, system_id: i64) -> Result<bool, UyuniError> {
        let value = self
            .call("system.listSuggestedReboot", vec![])
            .await
            .map_err(session_error)?;
        let hosts = expect_array(&value)?;
        Ok(hosts
            .iter()
            .any(|host| host.get_i64("id") == Some(system_id)))
    }

    /// 查询用户信息
    pub async fn get_user(&self, user_name: &str) -> Result<UserDetails, UyuniError> {
        let value = self
            .call("user.getDetails", vec![RpcValue::string(user_name)])
            .await
            .map_err(|e| classify(e, USER_LOOKUP))?;
        UserDetails::from_rpc(&value)
    }

    /// 当前登录用户所属组织
    pub async fn get_organization(&self) -> Result<String, UyuniError> {
        let username = self.username().to_string();
        Ok(self.get_user(&username).await?.org_name)
    }

    /// 当前位置
    ///
    /// Uyuni 没有位置概念，返回组织名。
    pub async fn get_location(&self) -> Result<String, UyuniError> {
        self.get_organization().await
    }
}
